//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod credential_loader;
pub(crate) mod logger;
pub(crate) mod sleeper;

pub use credential_loader::CredentialLoader;
pub use logger::{setup_logger, EVENT_TARGET};
pub use sleeper::{countdown, TerminalCountdown, TokioSleeper};
