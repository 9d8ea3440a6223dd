//! Data models for md2image.
//!
//! - [`PersistedState`]: The document on disk, holding [`ConfigurationDocument`]
//!   (public flag, identity lists, enabled modules) and [`StatisticsDocument`]
//!   (aggregate and per-identity counters)
//! - [`Settings`]: Static process settings loaded from file and environment
//!
//! # Architecture Note
//!
//! The persisted document is never edited directly. Reads go through
//! [`StateManager::snapshot`](crate::state::StateManager::snapshot) and every
//! change goes through [`StateManager::mutate`](crate::state::StateManager::mutate).

pub mod config;
pub mod document;

pub use config::{AdminIds, Settings, parse_flag};
pub use document::{
    ConfigurationDocument, DEFAULT_MODULE, Identity, IdentityCounter, IdentityStats, ListName,
    ListNameError, PersistedState, StatisticsDocument, unix_now,
};
