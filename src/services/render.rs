use crate::models::{Identity, IdentityCounter};
use crate::policy::{Decision, authorize};
use crate::services::UsageAccounting;
use crate::state::StateManager;
use crate::store::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// External Markdown → PNG renderer
///
/// Implemented outside this crate (HTML templating plus a headless browser).
/// Front ends never call it directly; they go through [`RenderService`] so
/// that authorization and accounting are applied.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `markdown` to PNG bytes at the given viewport width in pixels
    async fn render_markdown(&self, markdown: &str, width: u32) -> anyhow::Result<Vec<u8>>;
}

/// Errors that can occur while serving a render request
#[derive(Error, Debug)]
pub enum RenderRequestError {
    #[error("identity {0} is not authorized")]
    Unauthorized(Identity),

    #[error("nothing to render")]
    EmptyInput,

    #[error("render failed: {0:#}")]
    Render(#[from] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Render requests with authorization and usage accounting applied
#[derive(Clone)]
pub struct RenderService {
    state: StateManager,
    accounting: UsageAccounting,
    renderer: Arc<dyn Renderer>,
    admins: Arc<HashSet<Identity>>,
    default_width: u32,
}

impl RenderService {
    pub fn new<I>(
        state: StateManager,
        renderer: Arc<dyn Renderer>,
        admins: I,
        default_width: u32,
    ) -> Self
    where
        I: IntoIterator<Item = Identity>,
    {
        Self {
            accounting: UsageAccounting::new(state.clone()),
            state,
            renderer,
            admins: Arc::new(admins.into_iter().collect()),
            default_width,
        }
    }

    /// Whether `identity` is in the static admin set
    pub fn is_admin(&self, identity: Identity) -> bool {
        self.admins.contains(&identity)
    }

    /// Authorize `identity` against the current configuration
    pub fn authorize(&self, identity: Identity) -> Result<Decision, StoreError> {
        let is_admin = self.is_admin(identity);
        self.state
            .read(|s| authorize(identity, is_admin, &s.config))
    }

    /// Render on behalf of a known caller
    ///
    /// Denied callers and blank input are rejected before anything is
    /// counted. Otherwise the attempt is counted against the aggregate and
    /// the caller, and the outcome once the renderer returns.
    pub async fn render_for(
        &self,
        identity: Identity,
        markdown: &str,
        width: Option<u32>,
    ) -> Result<Vec<u8>, RenderRequestError> {
        if !self.authorize(identity)?.is_allowed() {
            tracing::debug!("Rejected render request from identity {}", identity);
            return Err(RenderRequestError::Unauthorized(identity));
        }
        let markdown = prepare_markdown(markdown).ok_or(RenderRequestError::EmptyInput)?;

        self.accounting.record_attempt()?;
        self.accounting
            .record_identity_event(identity, IdentityCounter::Requests)?;

        let png = self.render_counted(markdown, width).await?;
        self.accounting
            .record_identity_event(identity, IdentityCounter::RenderSuccess)?;

        Ok(png)
    }

    /// Render for a caller without a chat identity (API key holders,
    /// channel posts). Only the aggregate counters move.
    ///
    /// HTTP callers must pass [`Settings::api_key_allows`](crate::models::Settings::api_key_allows)
    /// first.
    pub async fn render_unattributed(
        &self,
        markdown: &str,
        width: Option<u32>,
    ) -> Result<Vec<u8>, RenderRequestError> {
        let markdown = prepare_markdown(markdown).ok_or(RenderRequestError::EmptyInput)?;

        self.accounting.record_attempt()?;
        self.render_counted(markdown, width).await
    }

    async fn render_counted(
        &self,
        markdown: &str,
        width: Option<u32>,
    ) -> Result<Vec<u8>, RenderRequestError> {
        let width = width.unwrap_or(self.default_width);

        match self.renderer.render_markdown(markdown, width).await {
            Ok(png) => {
                self.accounting.record_outcome(true)?;
                tracing::debug!("Rendered {} bytes of markdown to {} byte PNG", markdown.len(), png.len());
                Ok(png)
            }
            Err(e) => {
                self.accounting.record_outcome(false)?;
                tracing::warn!("Render failed: {:#}", e);
                Err(RenderRequestError::Render(e))
            }
        }
    }
}

/// Strip a pasted byte-order mark; `None` if nothing printable remains
fn prepare_markdown(markdown: &str) -> Option<&str> {
    let markdown = markdown.trim_start_matches('\u{feff}');
    if markdown.trim().is_empty() {
        None
    } else {
        Some(markdown)
    }
}
