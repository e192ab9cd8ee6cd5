use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::config::Pacing;

/// Randomized pauses between upstream calls so the account does not act in
/// machine-regular bursts
#[derive(Debug, Clone)]
pub struct Pacer {
    settings: Pacing,
}

impl Pacer {
    pub fn new(settings: Pacing) -> Self {
        Self { settings }
    }

    /// A pacer that never sleeps
    pub fn disabled() -> Self {
        Self::new(Pacing {
            enabled: false,
            upsert_every: 0,
            upsert_min_ms: 0,
            upsert_max_ms: 0,
            target_min_ms: 0,
            target_max_ms: 0,
            review_min_ms: 0,
            review_max_ms: 0,
            publish_min_ms: 0,
            publish_max_ms: 0,
        })
    }

    /// Pause after every `upsert_every`-th registry write
    pub async fn after_upsert(&self, count: usize) {
        let every = self.settings.upsert_every;
        if every > 0 && count > 0 && count % every == 0 {
            self.pause("upsert", self.settings.upsert_min_ms, self.settings.upsert_max_ms)
                .await;
        }
    }

    pub async fn before_target(&self) {
        self.pause("target", self.settings.target_min_ms, self.settings.target_max_ms)
            .await;
    }

    pub async fn between_reviews(&self) {
        self.pause("review", self.settings.review_min_ms, self.settings.review_max_ms)
            .await;
    }

    pub async fn before_publish(&self) {
        self.pause("publish", self.settings.publish_min_ms, self.settings.publish_max_ms)
            .await;
    }

    async fn pause(&self, stage: &'static str, min_ms: u64, max_ms: u64) {
        if !self.settings.enabled {
            return;
        }
        let delay = jitter(min_ms, max_ms);
        if delay.is_zero() {
            return;
        }
        debug!(stage, delay_ms = delay.as_millis() as u64, "Pacing");
        tokio::time::sleep(delay).await;
    }
}

/// Uniform delay in `[min_ms, max_ms]`; a reversed range is treated as `max..=min`
pub fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms {
        (min_ms, max_ms)
    } else {
        (max_ms, min_ms)
    };
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_jitter_stays_in_range() {
        for _ in 0..200 {
            let d = jitter(800, 2000).as_millis();
            assert!((800..=2000).contains(&d));
        }
        assert_eq!(jitter(5, 5), Duration::from_millis(5));
        let reversed = jitter(30, 10).as_millis();
        assert!((10..=30).contains(&reversed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_pause_only_on_multiples() {
        let mut pacing = Settings::defaults().unwrap().pacing;
        pacing.upsert_every = 3;
        pacing.upsert_min_ms = 1000;
        pacing.upsert_max_ms = 1000;
        let pacer = Pacer::new(pacing);

        let start = tokio::time::Instant::now();
        pacer.after_upsert(1).await;
        pacer.after_upsert(2).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        pacer.after_upsert(3).await;
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_pacer_never_sleeps() {
        let pacer = Pacer::disabled();
        let start = tokio::time::Instant::now();
        pacer.before_target().await;
        pacer.between_reviews().await;
        pacer.before_publish().await;
        pacer.after_upsert(3).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
