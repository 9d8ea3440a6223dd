use crate::identity::parse_identities;
use crate::models::{ConfigurationDocument, Identity, ListName, StatisticsDocument};
use crate::state::StateManager;
use crate::store::Result;
use serde::Serialize;
use std::collections::BTreeSet;

/// Result of a bulk list edit typed by an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEdit {
    pub list: ListName,

    /// Identities that were applied, in input order
    pub applied: Vec<Identity>,

    /// Tokens that were not valid identities
    pub skipped: Vec<String>,

    /// The list after the edit, ascending
    pub entries: Vec<Identity>,
}

/// Direction of a bulk list edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOp {
    Add,
    Remove,
}

/// Summary behind the admin `/status` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub uptime_seconds: u64,
    pub public_enabled: bool,
    pub whitelist_len: usize,
    pub blacklist_len: usize,
    pub total_requests: u64,
    pub render_success: u64,
    pub render_failed: u64,
}

/// Body of the `/stats` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub uptime_seconds: u64,
    pub stats: StatisticsDocument,
    pub config: ConfigurationDocument,
}

/// Body of the `/healthz` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub ok: bool,
}

/// Apply `(current ∪ add) \ remove` in place. Removal wins when an identity
/// is in both `add` and `remove`.
pub fn apply_list_edit(current: &mut BTreeSet<Identity>, add: &[Identity], remove: &[Identity]) {
    current.extend(add.iter().copied());
    for id in remove {
        current.remove(id);
    }
}

/// Control surface shared by the chat and HTTP front ends
///
/// Callers are responsible for admin-gating the mutating operations.
#[derive(Clone)]
pub struct ControlService {
    state: StateManager,
}

impl ControlService {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    pub fn get_public_status(&self) -> Result<bool> {
        self.state.read(|s| s.config.public_enabled)
    }

    /// Overwrite the public flag and return the persisted value
    pub fn set_public_status(&self, enabled: bool) -> Result<bool> {
        let state = self.state.mutate(|s| s.config.public_enabled = enabled)?;
        tracing::info!("Public access set to {}", state.config.public_enabled);
        Ok(state.config.public_enabled)
    }

    /// Current contents of `list`, ascending
    pub fn get_list(&self, list: ListName) -> Result<Vec<Identity>> {
        self.state
            .read(|s| s.config.list(list).iter().copied().collect())
    }

    /// Add and remove identities, returning the resulting list ascending
    pub fn modify_list(
        &self,
        list: ListName,
        add: &[Identity],
        remove: &[Identity],
    ) -> Result<Vec<Identity>> {
        let state = self
            .state
            .mutate(|s| apply_list_edit(s.config.list_mut(list), add, remove))?;
        let entries: Vec<Identity> = state.config.list(list).iter().copied().collect();

        tracing::info!(
            "Modified {}: +{:?} -{:?} ({} entries)",
            list,
            add,
            remove,
            entries.len()
        );
        Ok(entries)
    }

    /// Apply an add or remove edit from raw admin tokens, skipping tokens
    /// that are not identities
    pub fn modify_list_from_tokens<I, S>(&self, list: ListName, op: ListOp, tokens: I) -> Result<ListEdit>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = parse_identities(tokens);
        if parsed.has_skipped() {
            tracing::warn!("Ignoring invalid identities for {}: {:?}", list, parsed.skipped);
        }

        let entries = match op {
            ListOp::Add => self.modify_list(list, &parsed.valid, &[])?,
            ListOp::Remove => self.modify_list(list, &[], &parsed.valid)?,
        };

        Ok(ListEdit {
            list,
            applied: parsed.valid,
            skipped: parsed.skipped,
            entries,
        })
    }

    /// Replace the module activation list. Takes effect on the next start.
    pub fn set_enabled_modules(&self, modules: Vec<String>) -> Result<Vec<String>> {
        let state = self.state.mutate(|s| s.config.enabled_modules = modules)?;
        tracing::info!("Enabled modules set to {:?}", state.config.enabled_modules);
        Ok(state.config.enabled_modules)
    }

    /// Liveness probe; `ok` is false while the state document cannot be read
    pub fn health(&self) -> HealthReport {
        HealthReport {
            ok: self.state.snapshot().is_ok(),
        }
    }

    pub fn get_stats(&self) -> Result<StatisticsDocument> {
        self.state.read(|s| s.stats.clone())
    }

    pub fn status(&self) -> Result<StatusReport> {
        let uptime_seconds = self.uptime_seconds();
        self.state.read(|s| StatusReport {
            uptime_seconds,
            public_enabled: s.config.public_enabled,
            whitelist_len: s.config.whitelist.len(),
            blacklist_len: s.config.blacklist.len(),
            total_requests: s.stats.total_requests,
            render_success: s.stats.render_success,
            render_failed: s.stats.render_failed,
        })
    }

    pub fn stats(&self) -> Result<StatsReport> {
        let uptime_seconds = self.uptime_seconds();
        let state = self.state.snapshot()?;
        Ok(StatsReport {
            uptime_seconds,
            stats: state.stats,
            config: state.config,
        })
    }

    fn uptime_seconds(&self) -> u64 {
        self.state.metrics().uptime().as_secs()
    }
}
