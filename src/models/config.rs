use crate::identity::{ParsedIdentities, parse_identity_text};
use crate::models::Identity;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Process settings, loaded once at startup by [`crate::config::ConfigManager`].
///
/// These are static for the lifetime of the process. Anything an
/// administrator can change at runtime lives in the persisted document
/// instead (see [`crate::models::ConfigurationDocument`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bot_token: String,

    /// Privileged identities. Accepts a list or a comma separated string.
    #[serde(default)]
    pub admin_ids: AdminIds,

    /// Seeds `public_enabled` when the state document is first created.
    #[serde(default = "default_public_enabled", deserialize_with = "deserialize_flag")]
    pub public_enabled: bool,

    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_render_width")]
    pub render_width: u32,

    #[serde(default = "default_state_path")]
    pub state_path: Utf8PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: Utf8PathBuf,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: AdminIds::default(),
            public_enabled: default_public_enabled(),
            api_host: default_api_host(),
            api_port: default_api_port(),
            api_token: String::new(),
            render_width: default_render_width(),
            state_path: default_state_path(),
            log_dir: default_log_dir(),
            debug_mode: false,
        }
    }
}

impl Settings {
    /// Admin identities that parsed as integers.
    pub fn admin_identities(&self) -> Vec<Identity> {
        self.admin_ids.parse().valid
    }

    /// Whether an HTTP caller presenting `presented` (the `X-API-Key`
    /// header) may use the API.
    ///
    /// With no `api_token` configured the API is closed to everyone.
    pub fn api_key_allows(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(key) if !self.api_token.is_empty() => key == self.api_token,
            _ => false,
        }
    }

    /// Log the effective settings, warning about admin ids that were skipped.
    ///
    /// Call once the tracing subscriber is installed.
    pub fn log_summary(&self) {
        let admins = self.admin_ids.parse();
        if admins.has_skipped() {
            tracing::warn!("Ignoring invalid admin identities: {:?}", admins.skipped);
        }
        if self.api_token.is_empty() {
            tracing::warn!("No api_token configured, HTTP API requests will be rejected");
        }

        tracing::info!(
            "Settings: admins={}, public_enabled={}, api={}:{}, render_width={}, state={}",
            admins.valid.len(),
            self.public_enabled,
            self.api_host,
            self.api_port,
            self.render_width,
            self.state_path
        );
    }
}

/// Raw admin identity setting as found in a file or the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AdminIds {
    One(Identity),
    Many(Vec<Identity>),
    Text(String),
}

impl AdminIds {
    pub fn parse(&self) -> ParsedIdentities {
        match self {
            AdminIds::One(id) => ParsedIdentities {
                valid: vec![*id],
                skipped: Vec::new(),
            },
            AdminIds::Many(ids) => ParsedIdentities {
                valid: ids.clone(),
                skipped: Vec::new(),
            },
            AdminIds::Text(text) => parse_identity_text(text),
        }
    }
}

impl Default for AdminIds {
    fn default() -> Self {
        AdminIds::Many(Vec::new())
    }
}

/// Interpret a truthy setting (`1`, `true`, `yes`, `on`).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(b) => b,
        RawFlag::Int(i) => i != 0,
        RawFlag::Text(s) => parse_flag(&s),
    })
}

fn default_public_enabled() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_render_width() -> u32 {
    1024
}

fn default_state_path() -> Utf8PathBuf {
    Utf8PathBuf::from("storage/state.json")
}

fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("logs")
}
