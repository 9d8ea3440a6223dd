//! Authorization policy.
//!
//! A pure decision over a configuration snapshot. Admin status is resolved
//! by the caller from the static admin list in [`crate::models::Settings`].

use crate::models::{ConfigurationDocument, Identity};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Decide whether `identity` may use the service.
///
/// First match wins:
/// 1. blacklisted → deny, even for admins and when public access is on
/// 2. admin → allow
/// 3. public access enabled → allow
/// 4. whitelisted → allow
/// 5. deny
pub fn authorize(identity: Identity, is_admin: bool, config: &ConfigurationDocument) -> Decision {
    if config.blacklist.contains(&identity) {
        return Decision::Deny;
    }
    if is_admin || config.public_enabled || config.whitelist.contains(&identity) {
        return Decision::Allow;
    }
    Decision::Deny
}
