//! Remote session capability: the five chat API operations plus the proxy
//! IP diagnostic, bound to one (token, proxy) pair.

pub mod http;

use async_trait::async_trait;
use core_logic::{Credential, NetworkError};
use serde::{Deserialize, Serialize};

pub use http::{HttpSessionFactory, KlokClient};

pub type ThreadId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub has_remaining: bool,
    pub remaining: i64,
    /// Seconds until the window resets; 0 when unknown or not limited.
    pub reset_seconds: u64,
}

impl RateLimitStatus {
    /// What a failed rate-limit request means: limited, reset unknown.
    pub fn unknown() -> Self {
        Self {
            has_remaining: false,
            remaining: 0,
            reset_seconds: 0,
        }
    }

    pub fn from_wire(remaining: i64, reset_time: u64) -> Self {
        if remaining <= 0 {
            Self {
                has_remaining: false,
                remaining: 0,
                reset_seconds: reset_time,
            }
        } else {
            Self {
                has_remaining: true,
                remaining,
                reset_seconds: 0,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PointsInfo {
    #[serde(default)]
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The full reply was read.
    Delivered(String),
    /// The reply stream broke after the request went out. The server most
    /// likely processed the message, so callers count this as sent.
    StreamAborted,
}

#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn check_rate_limit(&self) -> Result<RateLimitStatus, NetworkError>;

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, NetworkError>;

    async fn create_thread(&self, initial_message: &str) -> Result<ThreadId, NetworkError>;

    async fn send_message(&self, thread_id: &str, text: &str)
        -> Result<SendOutcome, NetworkError>;

    async fn get_points(&self) -> Result<PointsInfo, NetworkError>;

    async fn resolve_proxy_ip(&self) -> Result<String, NetworkError>;
}

/// Builds a fresh session client for a credential.
pub trait SessionFactory: Send + Sync {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn SessionClient>, NetworkError>;
}
