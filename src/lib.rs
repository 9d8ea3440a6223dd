// md2image - access control and usage accounting for a Markdown-to-image service
//
// This is the library crate containing the persisted state store, the
// authorization policy and the services the chat and HTTP front ends call.
// The binary crate (main.rs) wires them together at startup.

pub mod config;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod services;
pub mod state;
pub mod store;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use identity::{ParsedIdentities, parse_identities, parse_identity_text};
pub use models::{ConfigurationDocument, Identity, ListName, PersistedState, Settings, StatisticsDocument};
pub use policy::{Decision, authorize};
pub use state::{StateChange, StateManager};
pub use store::{StateStore, StoreError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
