//! Built-in fallback headlines and an in-memory library source.

use std::collections::BTreeSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;

use super::source::HeadlineSource;
use crate::engine::types::{Difficulty, Headline, HeadlineId};

static FALLBACK_DECK: Lazy<Vec<Headline>> = Lazy::new(|| {
    vec![
        Headline::new(
            "Scientists discover chocolate consumption linked to improved memory",
            true,
            "Nature Neuroscience",
            "Based on a published study about flavonoids in chocolate and cognition.",
        )
        .with_category("health")
        .with_difficulty(Difficulty::Easy),
        Headline::new(
            "Breaking: Local man trains squirrels to deliver mail",
            false,
            "The Onion",
            "A satirical headline from a well-known satire publication.",
        )
        .with_difficulty(Difficulty::Easy),
        Headline::new(
            "New AI system achieves 95% accuracy in detecting fake news",
            true,
            "MIT Technology Review",
            "Reflects ongoing research into automated misinformation detection.",
        )
        .with_category("technology"),
        Headline::new(
            "Doctors hate this one weird trick: woman loses 50 pounds in 2 weeks with a kitchen spice",
            false,
            "HealthClickbait.com",
            "Classic clickbait promising impossible results.",
        )
        .with_category("health")
        .with_difficulty(Difficulty::Easy),
        Headline::new(
            "Scientists create method to turn plastic bottles into vanilla flavoring",
            true,
            "BBC Science",
            "Researchers used engineered bacteria to convert plastic waste into vanillin.",
        )
        .with_category("science")
        .with_difficulty(Difficulty::Hard),
    ]
});

pub fn fallback_deck() -> &'static [Headline] {
    &FALLBACK_DECK
}

/// Picks from `pool`, preferring unused headlines of the requested difficulty.
pub fn pick_headline<R: Rng + ?Sized>(
    pool: &[Headline],
    difficulty: Difficulty,
    used: &BTreeSet<HeadlineId>,
    rng: &mut R,
) -> Option<Headline> {
    let fresh: Vec<&Headline> = pool.iter().filter(|h| !used.contains(&h.id)).collect();
    let matching: Vec<&Headline> = fresh
        .iter()
        .copied()
        .filter(|h| h.difficulty == difficulty)
        .collect();

    let candidates = if !matching.is_empty() {
        matching
    } else if !fresh.is_empty() {
        fresh
    } else {
        pool.iter().collect()
    };
    candidates.choose(rng).map(|h| (*h).clone())
}

/// Draws from the fallback deck. Never fails.
pub fn fallback_headline<R: Rng + ?Sized>(
    difficulty: Difficulty,
    used: &BTreeSet<HeadlineId>,
    rng: &mut R,
) -> Headline {
    match pick_headline(fallback_deck(), difficulty, used, rng) {
        Some(headline) => headline,
        // deck is never empty
        None => FALLBACK_DECK[0].clone(),
    }
}

/// Headline source backed by a list held in memory.
#[derive(Default)]
pub struct HeadlineLibrary {
    headlines: RwLock<Vec<Headline>>,
}

impl HeadlineLibrary {
    pub fn new(headlines: Vec<Headline>) -> Self {
        Self {
            headlines: RwLock::new(headlines),
        }
    }

    pub fn with_fallback_deck() -> Self {
        Self::new(fallback_deck().to_vec())
    }

    pub fn add(&self, headline: Headline) {
        self.headlines.write().push(headline);
    }

    pub fn len(&self) -> usize {
        self.headlines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.headlines.read().is_empty()
    }
}

#[async_trait]
impl HeadlineSource for HeadlineLibrary {
    async fn draw(&self, difficulty: Difficulty) -> anyhow::Result<Headline> {
        let headlines = self.headlines.read();
        // thread-local RNG keeps draws from different games uncorrelated
        let mut rng = rand::thread_rng();
        pick_headline(&headlines, difficulty, &BTreeSet::new(), &mut rng)
            .ok_or_else(|| anyhow::anyhow!("headline library is empty"))
    }
}
