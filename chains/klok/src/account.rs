//! Per-account lifecycle.
//!
//! An [`Account`] is created once per credential and mutated in place every
//! round. Each [`Account::tick`] decides whether the account may act and, if
//! so, runs one create-or-reuse-thread, send, verify-points cycle.

use crate::client::{
    PointsInfo, RateLimitStatus, SendOutcome, SessionClient, SessionFactory, ThreadId,
};
use crate::config::AccountPolicy;
use crate::events::{EventKind, EventSink, EventSinkExt};
use crate::prompt::PromptSource;
use core_logic::{Credential, NetworkError};
use rand::Rng;
use std::sync::Arc;

const UNKNOWN_IP: &str = "Unknown";
const ERROR_IP: &str = "Error";

/// Collaborators shared by every account.
pub struct AccountEnv {
    pub factory: Arc<dyn SessionFactory>,
    pub events: Arc<dyn EventSink>,
    pub prompts: PromptSource,
    pub policy: AccountPolicy,
}

/// What a single tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Account is in the permanent error state.
    Skipped,
    /// Building the session failed; state left as it was.
    Fault,
    Limited,
    NoPoints,
    ThreadCreateFailed,
    /// The send produced nothing usable. `rotated` is set when this failure
    /// hit the limit and the thread was dropped.
    SendFailed { rotated: bool },
    /// Sent, but the points total did not move; the thread was dropped.
    PointsStalled,
    Rewarded,
}

pub struct Account {
    index: usize,
    credential: Credential,
    client: Option<Box<dyn SessionClient>>,
    proxy_ip: String,
    current_thread_id: Option<ThreadId>,
    rate_limited: bool,
    reset_time: u64,
    remaining_chats: i64,
    failed_attempts: u32,
    points: i64,
    has_error: bool,
}

impl Account {
    fn new(index: usize, credential: Credential) -> Self {
        Self {
            index,
            credential,
            client: None,
            proxy_ip: UNKNOWN_IP.to_string(),
            current_thread_id: None,
            rate_limited: false,
            reset_time: 0,
            remaining_chats: 0,
            failed_attempts: 0,
            points: 0,
            has_error: false,
        }
    }

    /// Builds the account and runs its one-time setup. A setup fault leaves
    /// the account permanently in the error state.
    pub async fn initialize(index: usize, credential: Credential, env: &AccountEnv) -> Self {
        let mut account = Self::new(index, credential);
        env.events
            .account(index, EventKind::Info, "Processing account...");

        if let Err(e) = account.setup(env).await {
            env.events
                .account(index, EventKind::Error, format!("Setup failed: {}", e));
            account.mark_error();
        }
        account
    }

    async fn setup(&mut self, env: &AccountEnv) -> Result<(), NetworkError> {
        let client = env.factory.connect(&self.credential)?;

        self.refresh_proxy_ip(client.as_ref(), env, "Using proxy IP").await;

        let points = self.report_points(client.as_ref(), env).await;
        self.points = points.map(|p| p.total_points).unwrap_or(0);

        let status = self.fetch_rate_limit(client.as_ref(), env).await;
        self.apply_rate_limit(&status);

        if !self.rate_limited {
            self.adopt_or_create_thread(client.as_ref(), env).await;
        }

        self.client = Some(client);
        Ok(())
    }

    async fn adopt_or_create_thread(&mut self, client: &dyn SessionClient, env: &AccountEnv) {
        let threads = match client.list_threads().await {
            Ok(threads) => threads,
            Err(e) => {
                env.events.account(
                    self.index,
                    EventKind::Error,
                    format!("Could not list threads: {}", e.short()),
                );
                Vec::new()
            }
        };

        if let Some(first) = threads.into_iter().next() {
            env.events.account(
                self.index,
                EventKind::Success,
                format!("Using existing thread: {}", first.id),
            );
            self.current_thread_id = Some(first.id);
            return;
        }

        match client.create_thread(&env.policy.bootstrap_message).await {
            Ok(id) => {
                env.events.account(
                    self.index,
                    EventKind::Success,
                    format!("Started new thread: {}", id),
                );
                self.current_thread_id = Some(id);
            }
            Err(e) => env.events.account(
                self.index,
                EventKind::Error,
                format!("Could not create thread: {}", e.short()),
            ),
        }
    }

    fn mark_error(&mut self) {
        self.has_error = true;
        self.rate_limited = true;
        self.proxy_ip = ERROR_IP.to_string();
        self.current_thread_id = None;
        self.client = None;
    }

    /// One scheduling tick. Accounts in the error state make no calls.
    pub async fn tick<R: Rng + ?Sized>(&mut self, env: &AccountEnv, rng: &mut R) -> TickOutcome {
        if self.has_error {
            return TickOutcome::Skipped;
        }

        let client = match env.factory.connect(&self.credential) {
            Ok(client) => client,
            Err(e) => {
                self.recover_from_fault(env, e).await;
                return TickOutcome::Fault;
            }
        };

        let outcome = self.run_cycle(client.as_ref(), env, rng).await;
        self.client = Some(client);
        outcome
    }

    async fn run_cycle<R: Rng + ?Sized>(
        &mut self,
        client: &dyn SessionClient,
        env: &AccountEnv,
        rng: &mut R,
    ) -> TickOutcome {
        let status = self.fetch_rate_limit(client, env).await;
        self.apply_rate_limit(&status);
        if self.rate_limited {
            return TickOutcome::Limited;
        }

        let points_before = match self.report_points(client, env).await {
            Some(p) if p.total_points > 0 => p.total_points,
            _ => {
                env.events
                    .account(self.index, EventKind::Warning, "No points available...");
                return TickOutcome::NoPoints;
            }
        };
        self.points = points_before;

        let thread_id = match self.current_thread_id.clone() {
            Some(id) => id,
            None => {
                env.events.account(
                    self.index,
                    EventKind::Warning,
                    "No active thread available. Creating a new one...",
                );
                match client.create_thread(&env.policy.bootstrap_message).await {
                    Ok(id) => {
                        env.events.account(
                            self.index,
                            EventKind::Success,
                            format!("New thread created with ID: {}", id),
                        );
                        self.current_thread_id = Some(id.clone());
                        self.failed_attempts = 0;
                        id
                    }
                    Err(e) => {
                        env.events.account(
                            self.index,
                            EventKind::Error,
                            format!("Could not create thread: {}", e.short()),
                        );
                        return TickOutcome::ThreadCreateFailed;
                    }
                }
            }
        };

        let prompt = env.prompts.next_prompt(rng);
        env.events.account(
            self.index,
            EventKind::Info,
            format!("Sending message: \"{}\"", prompt),
        );

        let sent = match client.send_message(&thread_id, &prompt).await {
            Ok(SendOutcome::Delivered(_)) => {
                env.events.account(
                    self.index,
                    EventKind::Success,
                    format!("Message sent to thread: {}", thread_id),
                );
                true
            }
            Ok(SendOutcome::StreamAborted) => {
                env.events.account(
                    self.index,
                    EventKind::Info,
                    "Reply stream aborted, counting message as sent",
                );
                true
            }
            Err(e) => {
                env.events.account(
                    self.index,
                    EventKind::Error,
                    format!("Error sending message: {}", e.short()),
                );
                false
            }
        };

        let status_after = self.fetch_rate_limit(client, env).await;
        self.remaining_chats = status_after.remaining;
        let points_after = self.report_points(client, env).await;

        if !sent {
            return self.record_failed_send(env);
        }

        match points_after {
            Some(after) if after.total_points <= points_before => {
                env.events.account(
                    self.index,
                    EventKind::Warning,
                    "Points did not increase after sending. Starting a new thread.",
                );
                self.current_thread_id = None;
                TickOutcome::PointsStalled
            }
            other => {
                self.failed_attempts = 0;
                if let Some(after) = other {
                    self.points = after.total_points;
                }
                let shown = other
                    .map(|p| p.total_points.to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                env.events.account(
                    self.index,
                    EventKind::Success,
                    format!("Reply received. Current points: {}", shown),
                );
                TickOutcome::Rewarded
            }
        }
    }

    fn record_failed_send(&mut self, env: &AccountEnv) -> TickOutcome {
        let max = env.policy.max_failed_attempts;
        self.failed_attempts += 1;
        env.events.account(
            self.index,
            EventKind::Warning,
            format!("No reply. Attempt {}/{}", self.failed_attempts, max),
        );

        if self.failed_attempts >= max {
            env.events.account(
                self.index,
                EventKind::Warning,
                format!("No reply {} times in a row. Starting a new thread.", max),
            );
            self.current_thread_id = None;
            self.failed_attempts = 0;
            return TickOutcome::SendFailed { rotated: true };
        }
        TickOutcome::SendFailed { rotated: false }
    }

    async fn recover_from_fault(&mut self, env: &AccountEnv, error: NetworkError) {
        env.events.account(
            self.index,
            EventKind::Error,
            format!("Error processing account: {}", error),
        );

        let Some(client) = self.client.take() else {
            env.events.account(
                self.index,
                EventKind::Warning,
                "Proxy may be broken: no session available to check it",
            );
            return;
        };

        match client.resolve_proxy_ip().await {
            Ok(ip) => {
                env.events.account(
                    self.index,
                    EventKind::Success,
                    format!("Refreshed proxy IP: {}", ip),
                );
                self.proxy_ip = ip;
            }
            Err(e) => env.events.account(
                self.index,
                EventKind::Warning,
                format!("Proxy may be broken: {}", e),
            ),
        }
        self.client = Some(client);
    }

    async fn refresh_proxy_ip(
        &mut self,
        client: &dyn SessionClient,
        env: &AccountEnv,
        label: &str,
    ) {
        match client.resolve_proxy_ip().await {
            Ok(ip) => {
                env.events
                    .account(self.index, EventKind::Success, format!("{}: {}", label, ip));
                self.proxy_ip = ip;
            }
            Err(e) => env.events.account(
                self.index,
                EventKind::Warning,
                format!("Could not check proxy IP: {}", e),
            ),
        }
    }

    async fn fetch_rate_limit(
        &self,
        client: &dyn SessionClient,
        env: &AccountEnv,
    ) -> RateLimitStatus {
        match client.check_rate_limit().await {
            Ok(status) => status,
            Err(e) => {
                env.events.account(
                    self.index,
                    EventKind::Error,
                    format!("Rate limit check failed: {}", e.short()),
                );
                RateLimitStatus::unknown()
            }
        }
    }

    async fn report_points(
        &self,
        client: &dyn SessionClient,
        env: &AccountEnv,
    ) -> Option<PointsInfo> {
        match client.get_points().await {
            Ok(points) => {
                env.events.account(
                    self.index,
                    EventKind::Custom,
                    format!("IP: {} | Points: {}", self.proxy_ip, points.total_points),
                );
                Some(points)
            }
            Err(e) => {
                env.events.account(
                    self.index,
                    EventKind::Error,
                    format!("Could not read points: {}", e.short()),
                );
                None
            }
        }
    }

    fn apply_rate_limit(&mut self, status: &RateLimitStatus) {
        self.rate_limited = !status.has_remaining;
        self.reset_time = status.reset_seconds;
        self.remaining_chats = status.remaining;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn proxy_ip(&self) -> &str {
        &self.proxy_ip
    }

    pub fn current_thread_id(&self) -> Option<&str> {
        self.current_thread_id.as_deref()
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    pub fn reset_time(&self) -> u64 {
        self.reset_time
    }

    pub fn remaining_chats(&self) -> i64 {
        self.remaining_chats
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }
}
