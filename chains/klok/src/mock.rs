//! Scripted in-memory session client used by the unit tests.

use crate::client::{
    PointsInfo, RateLimitStatus, SendOutcome, SessionClient, SessionFactory, ThreadId,
    ThreadSummary,
};
use async_trait::async_trait;
use core_logic::{Credential, NetworkError, ProxyConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    RateLimit,
    ListThreads,
    CreateThread,
    Send { thread_id: String },
    Points,
    ResolveIp,
}

#[derive(Debug)]
pub struct MockState {
    pub fail_connect: bool,
    /// Consumed first; `rate_limit` answers once empty. `None` fails the call.
    pub rate_limits: VecDeque<Option<RateLimitStatus>>,
    pub rate_limit: RateLimitStatus,
    pub points: VecDeque<Option<i64>>,
    pub points_default: Option<i64>,
    pub threads: Vec<ThreadSummary>,
    pub create_fails: bool,
    pub sends: VecDeque<Option<SendOutcome>>,
    pub ip: Option<String>,
    pub calls: Vec<Call>,
    created: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            fail_connect: false,
            rate_limits: VecDeque::new(),
            rate_limit: RateLimitStatus::from_wire(10, 0),
            points: VecDeque::new(),
            points_default: Some(100),
            threads: Vec::new(),
            create_fails: false,
            sends: VecDeque::new(),
            ip: Some("203.0.113.7".to_string()),
            calls: Vec::new(),
            created: 0,
        }
    }
}

fn server_error(endpoint: &str) -> NetworkError {
    NetworkError::HttpError {
        status_code: 500,
        endpoint: endpoint.to_string(),
    }
}

/// Shared handle to one account's scripted server.
#[derive(Debug, Clone, Default)]
pub struct MockAccount {
    state: Arc<Mutex<MockState>>,
}

impl MockAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limited(reset_seconds: u64) -> Self {
        let account = Self::new();
        account.edit(|s| s.rate_limit = RateLimitStatus::from_wire(0, reset_seconds));
        account
    }

    pub fn edit(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn sends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .count()
    }
}

struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, MockState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl SessionClient for MockClient {
    async fn check_rate_limit(&self) -> Result<RateLimitStatus, NetworkError> {
        let mut state = self.record(Call::RateLimit);
        match state.rate_limits.pop_front() {
            Some(Some(status)) => Ok(status),
            Some(None) => Err(server_error("/rate-limit")),
            None => Ok(state.rate_limit),
        }
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, NetworkError> {
        let state = self.record(Call::ListThreads);
        Ok(state.threads.clone())
    }

    async fn create_thread(&self, _initial_message: &str) -> Result<ThreadId, NetworkError> {
        let mut state = self.record(Call::CreateThread);
        if state.create_fails {
            return Err(server_error("/chat"));
        }
        state.created += 1;
        Ok(format!("thread-new-{}", state.created))
    }

    async fn send_message(&self, thread_id: &str, _text: &str) -> Result<SendOutcome, NetworkError> {
        let mut state = self.record(Call::Send {
            thread_id: thread_id.to_string(),
        });
        match state.sends.pop_front() {
            Some(Some(outcome)) => Ok(outcome),
            Some(None) => Err(server_error("/chat")),
            None => Ok(SendOutcome::Delivered("ok".to_string())),
        }
    }

    async fn get_points(&self) -> Result<PointsInfo, NetworkError> {
        let mut state = self.record(Call::Points);
        let points = match state.points.pop_front() {
            Some(points) => points,
            None => state.points_default,
        };
        points
            .map(|total_points| PointsInfo { total_points })
            .ok_or_else(|| server_error("/points"))
    }

    async fn resolve_proxy_ip(&self) -> Result<String, NetworkError> {
        let state = self.record(Call::ResolveIp);
        state.ip.clone().ok_or(NetworkError::Timeout {
            timeout_ms: 10_000,
            endpoint: "ip-check".to_string(),
        })
    }
}

/// Hands out clients bound to the scripted account registered for a token.
#[derive(Debug, Default)]
pub struct MockFactory {
    accounts: Mutex<HashMap<String, MockAccount>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: &str, account: MockAccount) {
        self.accounts
            .lock()
            .unwrap()
            .insert(token.to_string(), account);
    }
}

impl SessionFactory for MockFactory {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn SessionClient>, NetworkError> {
        let account = self
            .accounts
            .lock()
            .unwrap()
            .get(&credential.token)
            .cloned()
            .unwrap_or_default();

        let fail = {
            let mut state = account.state.lock().unwrap();
            state.calls.push(Call::Connect);
            state.fail_connect
        };
        if fail {
            return Err(NetworkError::InvalidProxy {
                proxy: credential.proxy.url.clone(),
                reason: "scripted failure".to_string(),
            });
        }

        Ok(Box::new(MockClient {
            state: account.state.clone(),
        }))
    }
}

pub fn credential(token: &str) -> Credential {
    Credential {
        token: token.to_string(),
        proxy: ProxyConfig {
            url: format!("http://{}.proxy.test:8080", token),
            username: None,
            password: None,
        },
    }
}
