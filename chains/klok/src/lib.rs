//! # Klok chat bot
//!
//! Keeps a set of (session token, proxy) accounts chatting with the Klok API
//! within their server-announced rate limits.
//!
//! - [`prompt`] - random message text
//! - [`client`] - session client trait and its HTTP implementation
//! - [`account`] - per-account state machine
//! - [`scheduler`] - round loop and inter-round waits
//! - [`events`] - operator-facing event stream

pub mod account;
pub mod client;
pub mod config;
pub mod events;
pub mod prompt;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod mock;

pub use account::{Account, AccountEnv, TickOutcome};
pub use config::KlokConfig;
pub use scheduler::{Driver, RoundSummary, WaitPlan};
