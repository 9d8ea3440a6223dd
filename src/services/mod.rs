//! Services module - the operations front ends call.
//!
//! Every service holds a clone of the [`StateManager`](crate::state::StateManager)
//! it was built with; none of them touch the state file directly. The
//! services are transport-agnostic: the chat bot and the HTTP API only
//! translate their requests into these calls and format the results.
//!
//! # Components
//!
//! - [`UsageAccounting`]: Aggregate and per-identity counter increments
//! - [`ControlService`]: Public flag, whitelist/blacklist edits, module list,
//!   status and stats reports. Mutating calls must be admin-gated by the caller.
//! - [`RenderService`]: Authorization, accounting and the external
//!   [`Renderer`] collaborator tied together for one render request
//! - [`ModuleRegistry`]: Static name → factory table resolved from the
//!   persisted `enabled_modules` list at startup
//!
//! # Usage Example
//!
//! ```ignore
//! use md2image::services::{ControlService, RenderService};
//! use md2image::models::ListName;
//!
//! let control = ControlService::new(state.clone());
//! control.modify_list(ListName::Blacklist, &[42], &[])?;
//!
//! let render = RenderService::new(state.clone(), renderer, settings.admin_identities(), 1024);
//! let png = render.render_for(user_id, "# Hello", None).await?;
//! ```

pub mod accounting;
pub mod control;
pub mod modules;
pub mod render;

pub use accounting::UsageAccounting;
pub use control::{ControlService, HealthReport, ListEdit, ListOp, StatsReport, StatusReport, apply_list_edit};
pub use modules::{
    Activation, CHANNEL_AUTOCONVERT, ChannelAutoconvert, Module, ModuleContext, ModuleFactory,
    ModuleRegistry,
};
pub use render::{RenderRequestError, RenderService, Renderer};
