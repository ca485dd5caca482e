//! Test doubles shared by the workspace crates (enabled with the `testing`
//! feature).

use crate::traits::{CountdownDisplay, Sleeper};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Records requested sleeps instead of waiting.
#[derive(Debug, Default)]
pub struct VirtualSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl VirtualSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.slept.lock().unwrap().clear();
    }
}

#[async_trait]
impl Sleeper for VirtualSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCountdown;

impl CountdownDisplay for SilentCountdown {
    fn render(&self, _remaining_secs: u64) {}
    fn clear(&self) {}
}
