//! # Core Logic - Shared Utilities for the Bot Workspace
//!
//! This crate provides the ambient pieces every bot crate in the workspace
//! uses: typed errors, logger setup, credential loading and the sleep seam.
//!
//! ## Modules
//!
//! - [`config`] - Credential and proxy structures
//! - [`error`] - Typed error handling with thiserror
//! - [`traits`] - Core trait definitions
//! - [`utils`] - Utility modules (logger, credential loader, sleeper)

pub mod config;
pub mod error;
pub mod traits;
pub(crate) mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Credential, ProxyConfig};
pub use error::{ConfigError, CoreError, NetworkError};
pub use traits::{CountdownDisplay, Sleeper};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{
    countdown, setup_logger, CredentialLoader, TerminalCountdown, TokioSleeper, EVENT_TARGET,
};
