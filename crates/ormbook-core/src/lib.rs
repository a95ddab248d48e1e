//! # ormbook-core
//!
//! Core types shared by every ormbook crate: the workspace error type, the
//! settings struct and its loaders, and tracing-based logging setup.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Runtime settings with sensible defaults
//! - [`settings_loader`] - Loading settings from TOML and the environment
//! - [`logging`] - Tracing subscriber setup and spans

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{OrmError, OrmResult, ValidationError};
pub use settings::{DatabaseSettings, Settings};
