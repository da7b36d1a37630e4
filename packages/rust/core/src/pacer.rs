//! Fixed pacing delays between pipeline steps.
//!
//! The help-center and the ingestion API are both shared infrastructure;
//! the pacer spaces our requests out so a large run stays polite.

use std::time::Duration;

use helpsync_shared::config::PacingConfig;

/// Fixed delays applied at the pipeline's throttle points.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    item_delay: Duration,
    drain_delay: Duration,
    settle_delay: Duration,
}

impl Pacer {
    /// Pacer with all delays disabled (tests, local rehearsals).
    pub fn none() -> Self {
        Self {
            item_delay: Duration::ZERO,
            drain_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }

    /// Delay between reference-processing steps.
    pub async fn between_items(&self) {
        sleep_nonzero(self.item_delay).await;
    }

    /// Delay after a batch drain, before iteration resumes.
    pub async fn after_drain(&self) {
        sleep_nonzero(self.drain_delay).await;
    }

    /// Settle delay after writing a staging artifact.
    pub async fn after_write(&self) {
        sleep_nonzero(self.settle_delay).await;
    }
}

impl From<&PacingConfig> for Pacer {
    fn from(config: &PacingConfig) -> Self {
        Self {
            item_delay: Duration::from_millis(config.item_delay_ms),
            drain_delay: Duration::from_millis(config.drain_delay_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

async fn sleep_nonzero(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn delays_follow_the_config() {
        let pacer = Pacer::from(&PacingConfig {
            item_delay_ms: 500,
            drain_delay_ms: 2000,
            settle_delay_ms: 0,
        });

        let start = tokio::time::Instant::now();
        pacer.between_items().await;
        assert!(start.elapsed() >= Duration::from_millis(500));

        let start = tokio::time::Instant::now();
        pacer.after_drain().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));

        // Zero delay never touches the timer.
        let start = tokio::time::Instant::now();
        pacer.after_write().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn none_is_immediate() {
        let pacer = Pacer::none();
        pacer.between_items().await;
        pacer.after_drain().await;
        pacer.after_write().await;
    }
}
