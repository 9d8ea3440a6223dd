// Best-effort parsing of identity lists typed by administrators
//
// Bulk input like `/bl_add 1 2 oops 3` keeps every valid entry and reports
// the rest instead of rejecting the whole command.

use crate::models::Identity;
use regex::Regex;
use std::sync::OnceLock;

/// Outcome of parsing a batch of identity tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIdentities {
    /// Tokens that parsed as identities, in input order.
    pub valid: Vec<Identity>,

    /// Tokens that were not valid identities (`InvalidIdentity`), in input order.
    pub skipped: Vec<String>,
}

impl ParsedIdentities {
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Parse each token as an identity, skipping the ones that are not integers.
pub fn parse_identities<I, S>(tokens: I) -> ParsedIdentities
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = ParsedIdentities::default();

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<Identity>() {
            Ok(id) => parsed.valid.push(id),
            Err(_) => {
                tracing::debug!("Skipping invalid identity: {:?}", token);
                parsed.skipped.push(token.to_string());
            }
        }
    }

    parsed
}

/// Split free text on commas and whitespace, then parse every piece.
pub fn parse_identity_text(text: &str) -> ParsedIdentities {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    let separator = SEPARATOR.get_or_init(|| Regex::new(r"[\s,]+").expect("valid separator regex"));

    parse_identities(separator.split(text))
}
