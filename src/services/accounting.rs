use crate::models::{Identity, IdentityCounter};
use crate::state::StateManager;
use crate::store::Result;

/// Usage accounting over the persisted statistics
///
/// Every method is one independent mutation. An attempt and its outcome are
/// separate increments, so the aggregate and per-identity totals can differ
/// briefly under load, but no increment is ever lost.
#[derive(Clone)]
pub struct UsageAccounting {
    state: StateManager,
}

impl UsageAccounting {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    /// Count a render request (`total_requests`)
    pub fn record_attempt(&self) -> Result<()> {
        let state = self.state.mutate(|s| {
            s.stats.total_requests = s.stats.total_requests.saturating_add(1);
        })?;
        tracing::trace!("total_requests={}", state.stats.total_requests);
        Ok(())
    }

    /// Count the result of a render (`render_success` or `render_failed`)
    pub fn record_outcome(&self, success: bool) -> Result<()> {
        self.state.mutate(|s| {
            let counter = if success {
                &mut s.stats.render_success
            } else {
                &mut s.stats.render_failed
            };
            *counter = counter.saturating_add(1);
        })?;
        tracing::trace!("Recorded render outcome success={}", success);
        Ok(())
    }

    /// Count an event for a single identity, creating its entry on first use
    pub fn record_identity_event(&self, identity: Identity, kind: IdentityCounter) -> Result<()> {
        self.state.mutate(|s| {
            let counter = s
                .stats
                .per_identity
                .entry(identity)
                .or_default()
                .counter_mut(kind);
            *counter = counter.saturating_add(1);
        })?;
        tracing::trace!("Recorded {:?} for identity {}", kind, identity);
        Ok(())
    }
}
