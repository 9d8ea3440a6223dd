use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Identifier of a caller (chat user, channel, or equivalent).
///
/// Signed because chat platforms hand out negative identifiers for channels
/// and groups.
pub type Identity = i64;

/// Name of the module activated when a fresh document is created.
pub const DEFAULT_MODULE: &str = "channel_autoconvert";

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The complete persisted document.
///
/// This is the only thing written to disk. Every field carries a serde
/// default so documents written by earlier versions keep loading after new
/// fields are added.
///
/// # Related Types
///
/// - [`crate::store::StateStore`]: Reads and atomically replaces the document
/// - [`crate::state::StateManager`]: Serializes read-modify-write cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Creation time of the store, Unix seconds. Never updated.
    #[serde(default = "unix_now")]
    pub created_at: u64,

    #[serde(default)]
    pub stats: StatisticsDocument,

    #[serde(default)]
    pub config: ConfigurationDocument,
}

impl PersistedState {
    /// A fresh document stamped with the current time.
    pub fn new() -> Self {
        Self {
            created_at: unix_now(),
            stats: StatisticsDocument::default(),
            config: ConfigurationDocument::default(),
        }
    }

    /// A fresh document whose public flag starts at `public_enabled`.
    pub fn seeded(public_enabled: bool) -> Self {
        let mut state = Self::new();
        state.config.public_enabled = public_enabled;
        state
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Access configuration and module selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    /// When true, every identity that is not blacklisted is authorized.
    #[serde(default = "default_public_enabled")]
    pub public_enabled: bool,

    #[serde(default)]
    pub whitelist: BTreeSet<Identity>,

    #[serde(default)]
    pub blacklist: BTreeSet<Identity>,

    /// Modules to activate at startup, in activation order.
    #[serde(default = "default_enabled_modules", alias = "enabled_plugins")]
    pub enabled_modules: Vec<String>,
}

impl ConfigurationDocument {
    pub fn list(&self, name: ListName) -> &BTreeSet<Identity> {
        match name {
            ListName::Whitelist => &self.whitelist,
            ListName::Blacklist => &self.blacklist,
        }
    }

    pub fn list_mut(&mut self, name: ListName) -> &mut BTreeSet<Identity> {
        match name {
            ListName::Whitelist => &mut self.whitelist,
            ListName::Blacklist => &mut self.blacklist,
        }
    }
}

impl Default for ConfigurationDocument {
    fn default() -> Self {
        Self {
            public_enabled: default_public_enabled(),
            whitelist: BTreeSet::new(),
            blacklist: BTreeSet::new(),
            enabled_modules: default_enabled_modules(),
        }
    }
}

fn default_public_enabled() -> bool {
    true
}

fn default_enabled_modules() -> Vec<String> {
    vec![DEFAULT_MODULE.to_string()]
}

/// Usage counters. Only ever incremented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsDocument {
    #[serde(default)]
    pub total_requests: u64,

    #[serde(default)]
    pub render_success: u64,

    #[serde(default)]
    pub render_failed: u64,

    /// Per-caller counters, created on the first event for an identity.
    #[serde(default, alias = "per_user")]
    pub per_identity: BTreeMap<Identity, IdentityStats>,
}

/// Counters kept for a single identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStats {
    #[serde(default)]
    pub requests: u64,

    #[serde(default)]
    pub render_success: u64,
}

impl IdentityStats {
    pub fn counter_mut(&mut self, kind: IdentityCounter) -> &mut u64 {
        match kind {
            IdentityCounter::Requests => &mut self.requests,
            IdentityCounter::RenderSuccess => &mut self.render_success,
        }
    }
}

/// Which per-identity counter an event increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityCounter {
    Requests,
    RenderSuccess,
}

/// The two identity lists held by the configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListName {
    Whitelist,
    Blacklist,
}

impl ListName {
    pub fn as_str(self) -> &'static str {
        match self {
            ListName::Whitelist => "whitelist",
            ListName::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown list name: {0}")]
pub struct ListNameError(pub String);

impl FromStr for ListName {
    type Err = ListNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whitelist" | "wl" => Ok(ListName::Whitelist),
            "blacklist" | "bl" => Ok(ListName::Blacklist),
            other => Err(ListNameError(other.to_string())),
        }
    }
}
