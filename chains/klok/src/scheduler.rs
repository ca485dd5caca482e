//! Round-based driver.
//!
//! One round visits every account in input order, one at a time, then waits:
//! until the earliest known rate-limit reset when every account is limited,
//! otherwise a random interval.

use crate::account::{Account, AccountEnv, TickOutcome};
use crate::config::ScheduleConfig;
use crate::events::{EventKind, EventSinkExt};
use core_logic::{countdown, CountdownDisplay, Credential, Sleeper};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPlan {
    /// Every account limited and the soonest reset is known.
    UntilReset(u64),
    /// Every account limited, no usable reset time.
    Fallback(u64),
    /// At least one account could still act.
    NextRound(Duration),
}

impl WaitPlan {
    /// Whole seconds the countdown will run.
    pub fn seconds(&self) -> u64 {
        match *self {
            WaitPlan::UntilReset(secs) | WaitPlan::Fallback(secs) => secs,
            WaitPlan::NextRound(interval) => (interval.as_millis() as u64 + 999) / 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub all_limited: bool,
    pub min_reset_secs: u64,
    pub wait: WaitPlan,
    pub outcomes: Vec<TickOutcome>,
}

pub fn plan_wait<R: Rng + ?Sized>(
    all_limited: bool,
    min_reset_secs: u64,
    schedule: &ScheduleConfig,
    rng: &mut R,
) -> WaitPlan {
    if all_limited {
        if min_reset_secs > 0 && min_reset_secs < schedule.fallback_wait_secs {
            WaitPlan::UntilReset(min_reset_secs)
        } else {
            WaitPlan::Fallback(schedule.fallback_wait_secs)
        }
    } else {
        let min = schedule.min_interval.as_millis() as u64;
        let max = schedule.max_interval.as_millis() as u64;
        WaitPlan::NextRound(Duration::from_millis(rng.gen_range(min..=max.max(min))))
    }
}

pub struct Driver<R: Rng> {
    accounts: Vec<Account>,
    env: AccountEnv,
    schedule: ScheduleConfig,
    sleeper: Arc<dyn Sleeper>,
    display: Arc<dyn CountdownDisplay>,
    rng: R,
}

impl<R: Rng> Driver<R> {
    /// Initializes one account per credential, sequentially and in order.
    pub async fn bootstrap(
        credentials: Vec<Credential>,
        env: AccountEnv,
        schedule: ScheduleConfig,
        sleeper: Arc<dyn Sleeper>,
        display: Arc<dyn CountdownDisplay>,
        rng: R,
    ) -> Self {
        let mut accounts = Vec::with_capacity(credentials.len());
        for (index, credential) in credentials.into_iter().enumerate() {
            accounts.push(Account::initialize(index, credential, &env).await);
        }

        Self {
            accounts,
            env,
            schedule,
            sleeper,
            display,
            rng,
        }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Runs forever; the process is stopped from outside.
    pub async fn run(&mut self) {
        loop {
            self.run_round().await;
        }
    }

    pub async fn run_round(&mut self) -> RoundSummary {
        let mut all_limited = true;
        let mut min_reset_secs = self.schedule.fallback_wait_secs;
        let mut outcomes = Vec::with_capacity(self.accounts.len());

        for account in self.accounts.iter_mut() {
            if account.has_error() {
                self.env.events.account(
                    account.index(),
                    EventKind::Warning,
                    "Skipping account due to an earlier error",
                );
                outcomes.push(TickOutcome::Skipped);
                continue;
            }

            let outcome = account.tick(&self.env, &mut self.rng).await;

            if !account.is_rate_limited() {
                all_limited = false;
            } else if account.reset_time() > 0 && account.reset_time() < min_reset_secs {
                min_reset_secs = account.reset_time();
            }
            outcomes.push(outcome);

            self.sleeper.sleep(self.schedule.account_delay).await;
        }

        let wait = plan_wait(all_limited, min_reset_secs, &self.schedule, &mut self.rng);
        self.announce(&wait);
        countdown(wait.seconds(), self.sleeper.as_ref(), self.display.as_ref()).await;

        RoundSummary {
            all_limited,
            min_reset_secs,
            wait,
            outcomes,
        }
    }

    fn announce(&self, wait: &WaitPlan) {
        let events = &self.env.events;
        match wait {
            WaitPlan::UntilReset(secs) => {
                events.global(
                    EventKind::Warning,
                    "All accounts have reached their limit. Waiting before retrying.",
                );
                events.global(
                    EventKind::Custom,
                    format!(
                        "Waiting {} minutes until the rate limit resets...",
                        (secs + 59) / 60
                    ),
                );
            }
            WaitPlan::Fallback(secs) => {
                events.global(
                    EventKind::Warning,
                    "All accounts have reached their limit. Waiting before retrying.",
                );
                events.global(
                    EventKind::Custom,
                    format!("Waiting {} hours before retrying...", secs / 3600),
                );
            }
            WaitPlan::NextRound(_) => events.global(
                EventKind::Info,
                format!("Next conversation in {} seconds", wait.seconds()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RateLimitStatus;
    use crate::config::AccountPolicy;
    use crate::events::RecordingSink;
    use crate::mock::{credential, MockAccount, MockFactory};
    use crate::prompt::PromptSource;
    use core_logic::testing::{SilentCountdown, VirtualSleeper};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DELAY: Duration = Duration::from_secs(5);

    fn schedule() -> ScheduleConfig {
        ScheduleConfig {
            min_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(30),
            account_delay: DELAY,
            fallback_wait_secs: 86_400,
        }
    }

    async fn driver(
        servers: &[(&str, MockAccount)],
    ) -> (Driver<StdRng>, Arc<VirtualSleeper>, Arc<RecordingSink>) {
        let factory = MockFactory::new();
        for (token, server) in servers {
            factory.register(token, server.clone());
        }
        let events = Arc::new(RecordingSink::new());
        let sleeper = Arc::new(VirtualSleeper::new());
        let env = AccountEnv {
            factory: Arc::new(factory),
            events: events.clone(),
            prompts: PromptSource::new(),
            policy: AccountPolicy {
                max_failed_attempts: 3,
                bootstrap_message: "Starting new conversation".to_string(),
            },
        };
        let credentials = servers.iter().map(|(t, _)| credential(t)).collect();

        let driver = Driver::bootstrap(
            credentials,
            env,
            schedule(),
            sleeper.clone(),
            Arc::new(SilentCountdown),
            StdRng::seed_from_u64(5),
        )
        .await;
        for (_, server) in servers {
            server.clear_calls();
        }
        (driver, sleeper, events)
    }

    #[test]
    fn test_plan_wait_uses_soonest_reset() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            plan_wait(true, 45, &schedule(), &mut rng),
            WaitPlan::UntilReset(45)
        );
    }

    #[test]
    fn test_plan_wait_falls_back_without_reset() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            plan_wait(true, 86_400, &schedule(), &mut rng),
            WaitPlan::Fallback(86_400)
        );
        assert_eq!(
            plan_wait(true, 0, &schedule(), &mut rng),
            WaitPlan::Fallback(86_400)
        );
    }

    #[test]
    fn test_plan_wait_random_interval_within_window() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            match plan_wait(false, 45, &schedule(), &mut rng) {
                WaitPlan::NextRound(d) => {
                    assert!(d >= Duration::from_secs(10) && d <= Duration::from_secs(30))
                }
                other => panic!("Expected NextRound, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_next_round_seconds_round_up() {
        assert_eq!(WaitPlan::NextRound(Duration::from_millis(12_345)).seconds(), 13);
        assert_eq!(WaitPlan::NextRound(Duration::from_millis(10_000)).seconds(), 10);
    }

    #[tokio::test]
    async fn test_all_limited_waits_for_soonest_reset() {
        let (mut driver, sleeper, _) = driver(&[
            ("a", MockAccount::limited(120)),
            ("b", MockAccount::limited(45)),
        ])
        .await;
        sleeper.reset();

        let summary = driver.run_round().await;

        assert!(summary.all_limited);
        assert_eq!(summary.min_reset_secs, 45);
        assert_eq!(summary.wait, WaitPlan::UntilReset(45));
        assert_eq!(sleeper.total(), DELAY * 2 + Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_all_limited_without_reset_waits_a_day() {
        let (mut driver, sleeper, _) = driver(&[
            ("a", MockAccount::limited(0)),
            ("b", MockAccount::limited(0)),
        ])
        .await;

        let summary = driver.run_round().await;

        assert_eq!(summary.min_reset_secs, 86_400);
        assert_eq!(summary.wait, WaitPlan::Fallback(86_400));
        assert_eq!(sleeper.total(), DELAY * 2 + Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn test_one_active_account_uses_random_interval() {
        let active = MockAccount::new();
        let (mut driver, sleeper, _) =
            driver(&[("a", MockAccount::limited(45)), ("b", active.clone())]).await;
        active.edit(|s| s.points.extend([Some(100), Some(110)]));

        let summary = driver.run_round().await;

        assert!(!summary.all_limited);
        assert_eq!(
            summary.outcomes,
            vec![TickOutcome::Limited, TickOutcome::Rewarded]
        );
        let waited = sleeper.total() - DELAY * 2;
        assert!(waited >= Duration::from_secs(10) && waited <= Duration::from_secs(30));
        assert_eq!(active.sends(), 1);
    }

    #[tokio::test]
    async fn test_delay_follows_every_tick_regardless_of_outcome() {
        let no_points = MockAccount::new();
        no_points.edit(|s| s.points_default = Some(0));
        let (mut driver, sleeper, _) = driver(&[
            ("a", MockAccount::limited(45)),
            ("b", no_points),
            ("c", MockAccount::new()),
        ])
        .await;

        driver.run_round().await;

        let calls = sleeper.calls();
        assert_eq!(&calls[..3], &[DELAY, DELAY, DELAY]);
        assert!(calls[3..].iter().all(|d| *d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_error_account_is_skipped_and_silent() {
        let broken = MockAccount::new();
        broken.edit(|s| s.fail_connect = true);
        let (mut driver, sleeper, events) =
            driver(&[("a", broken.clone()), ("b", MockAccount::limited(30))]).await;
        assert!(driver.accounts()[0].has_error());

        broken.edit(|s| s.fail_connect = false);
        for _ in 0..3 {
            sleeper.reset();
            let summary = driver.run_round().await;
            assert_eq!(summary.outcomes[0], TickOutcome::Skipped);
            assert_eq!(summary.wait, WaitPlan::UntilReset(30));
            assert_eq!(sleeper.total(), DELAY + Duration::from_secs(30));
        }

        assert!(broken.calls().is_empty());
        assert!(driver.accounts()[0].has_error());
        let skips = events
            .events()
            .into_iter()
            .filter(|e| e.account == Some(0) && e.kind == EventKind::Warning)
            .count();
        assert_eq!(skips, 3);
    }

    #[tokio::test]
    async fn test_all_error_round_waits_fallback() {
        let broken = MockAccount::new();
        broken.edit(|s| s.fail_connect = true);
        let (mut driver, sleeper, _) = driver(&[("a", broken)]).await;

        let summary = driver.run_round().await;

        assert!(summary.all_limited);
        assert_eq!(summary.wait, WaitPlan::Fallback(86_400));
        assert_eq!(sleeper.total(), Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn test_limit_lifts_on_later_round() {
        let server = MockAccount::limited(60);
        let (mut driver, _, _) = driver(&[("a", server.clone())]).await;

        let first = driver.run_round().await;
        assert_eq!(first.wait, WaitPlan::UntilReset(60));
        assert_eq!(server.sends(), 0);

        server.edit(|s| {
            s.rate_limit = RateLimitStatus::from_wire(5, 0);
            s.points.extend([Some(100), Some(110)]);
        });
        let second = driver.run_round().await;

        assert!(!second.all_limited);
        assert_eq!(second.outcomes, vec![TickOutcome::Rewarded]);
        // No thread was created at init while limited.
        assert_eq!(driver.accounts()[0].current_thread_id(), Some("thread-new-1"));
        assert_eq!(server.sends(), 1);
    }
}
