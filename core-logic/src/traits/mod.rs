use async_trait::async_trait;
use std::time::Duration;

/// Every deliberate wait in the bot goes through this seam so a virtual
/// clock can stand in for tokio's timer.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Presentation of a one-line countdown. `render` is called once per
/// remaining second, `clear` once at the end.
pub trait CountdownDisplay: Send + Sync {
    fn render(&self, remaining_secs: u64);
    fn clear(&self);
}
