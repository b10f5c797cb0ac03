use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::library::fallback_headline;
use crate::engine::types::{Difficulty, Headline};

const LOG_TARGET: &str = "truth_wars::content::source";

/// External supplier of headlines. Must tolerate concurrent draws from many games.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn draw(&self, difficulty: Difficulty) -> anyhow::Result<Headline>;
}

pub type SharedHeadlineSource = Arc<dyn HeadlineSource>;

/// Wraps a source with a deadline and falls back to the built-in deck.
#[derive(Clone)]
pub struct BoundedHeadlineSource {
    inner: SharedHeadlineSource,
    timeout: Duration,
}

impl BoundedHeadlineSource {
    pub fn new(inner: SharedHeadlineSource, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Never fails and never waits longer than the configured timeout.
    pub async fn draw_or_fallback(&self, difficulty: Difficulty) -> Headline {
        match tokio::time::timeout(self.timeout, self.inner.draw(difficulty)).await {
            Ok(Ok(headline)) => headline,
            Ok(Err(err)) => {
                warn!(target: LOG_TARGET, error = %err, "headline source failed; using fallback");
                Self::fallback(difficulty)
            }
            Err(_) => {
                warn!(
                    target: LOG_TARGET,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "headline source timed out; using fallback"
                );
                Self::fallback(difficulty)
            }
        }
    }

    fn fallback(difficulty: Difficulty) -> Headline {
        fallback_headline(difficulty, &Default::default(), &mut rand::thread_rng())
    }
}

#[async_trait]
impl HeadlineSource for BoundedHeadlineSource {
    async fn draw(&self, difficulty: Difficulty) -> anyhow::Result<Headline> {
        Ok(self.draw_or_fallback(difficulty).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::library::fallback_deck;

    struct Failing;

    #[async_trait]
    impl HeadlineSource for Failing {
        async fn draw(&self, _difficulty: Difficulty) -> anyhow::Result<Headline> {
            Err(anyhow::anyhow!("content service unavailable"))
        }
    }

    struct Stalled;

    #[async_trait]
    impl HeadlineSource for Stalled {
        async fn draw(&self, _difficulty: Difficulty) -> anyhow::Result<Headline> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn from_deck(headline: &Headline) -> bool {
        fallback_deck().iter().any(|h| h.id == headline.id)
    }

    #[tokio::test]
    async fn failing_source_falls_back() {
        let source = BoundedHeadlineSource::new(Arc::new(Failing), Duration::from_millis(50));
        let headline = source.draw_or_fallback(Difficulty::Medium).await;
        assert!(from_deck(&headline));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_source_times_out() {
        let source = BoundedHeadlineSource::new(Arc::new(Stalled), Duration::from_millis(200));
        let headline = source.draw(Difficulty::Hard).await.expect("bounded draw");
        assert!(from_deck(&headline));
    }
}
