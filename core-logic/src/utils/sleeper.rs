use crate::traits::{CountdownDisplay, Sleeper};
use async_trait::async_trait;
use chrono::Local;
use nu_ansi_term::Color;
use std::io::Write;
use std::time::Duration;

/// Real-time sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Rewrites a single stdout line each second.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalCountdown;

impl CountdownDisplay for TerminalCountdown {
    fn render(&self, remaining_secs: u64) {
        let timestamp = Local::now().format("%H:%M:%S");
        let line = format!(
            "[{}] [*] Waiting {} seconds to continue...",
            timestamp, remaining_secs
        );
        let mut stdout = std::io::stdout().lock();
        // Console output is best effort.
        let _ = write!(stdout, "\r\x1b[2K{}", Color::Magenta.paint(line));
        let _ = stdout.flush();
    }

    fn clear(&self) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r\x1b[2K");
        let _ = stdout.flush();
    }
}

/// Waits `seconds` in one-second steps, rendering the remaining time before
/// each step.
pub async fn countdown(seconds: u64, sleeper: &dyn Sleeper, display: &dyn CountdownDisplay) {
    for remaining in (1..=seconds).rev() {
        display.render(remaining);
        sleeper.sleep(Duration::from_secs(1)).await;
    }
    display.clear();
}
