use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;

pub type PlayerId = u64;
pub type SessionId = Uuid;
pub type HeadlineId = Uuid;
pub type Reputation = u32;
pub type RoundNo = u32; // 1-based once the game starts, 0 before

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    TruthSeekers,
    Adversaries,
}

impl Faction {
    pub fn opponent(self) -> Faction {
        match self {
            Faction::TruthSeekers => Faction::Adversaries,
            Faction::Adversaries => Faction::TruthSeekers,
        }
    }
}

/// The two mutually exclusive judgements a player can make on a headline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Trust,
    Flag,
}

impl VoteChoice {
    /// Trust is correct for a real headline, flag for a fake one.
    pub fn is_correct(self, headline_is_real: bool) -> bool {
        matches!(
            (self, headline_is_real),
            (VoteChoice::Trust, true) | (VoteChoice::Flag, false)
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// A true/false statement judged during one round. Immutable once drawn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub id: HeadlineId,
    pub text: String,
    pub is_real: bool,
    pub source: String,
    pub explanation: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

fn default_category() -> String {
    "general".to_string()
}

impl Headline {
    pub fn new(
        text: impl Into<String>,
        is_real: bool,
        source: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            is_real,
            source: source.into(),
            explanation: explanation.into(),
            category: default_category(),
            difficulty: Difficulty::default(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// The part of the headline that may be shown to everyone while the round is open.
    pub fn public_view(&self) -> PublicHeadline {
        PublicHeadline {
            id: self.id,
            text: self.text.clone(),
            source: self.source.clone(),
            category: self.category.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicHeadline {
    pub id: HeadlineId,
    pub text: String,
    pub source: String,
    pub category: String,
}

/// Entry of the roster handed to session creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub display_name: String,
}

impl RosterEntry {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub reputation: Reputation,
    pub role: Role,
    pub active: bool,
    /// Rounds of shadow ban left, counting the round in which it was imposed.
    pub shadow_ban_rounds: u8,
}

impl Player {
    pub fn new(entry: RosterEntry, reputation: Reputation) -> Self {
        Self {
            id: entry.id,
            display_name: entry.display_name,
            reputation,
            role: Role::Ordinary,
            active: true,
            shadow_ban_rounds: 0,
        }
    }

    pub fn faction(&self) -> Faction {
        self.role.faction()
    }

    pub fn vote_weight(&self) -> u32 {
        self.role.vote_weight()
    }

    pub fn is_ghost(&self) -> bool {
        self.reputation == 0
    }

    pub fn is_shadow_banned(&self) -> bool {
        self.shadow_ban_rounds > 0
    }

    /// Silenced players are either ghosts or shadow-banned.
    pub fn is_silenced(&self) -> bool {
        self.is_ghost() || self.is_shadow_banned()
    }

    /// Counted toward "everyone has acted" checks.
    pub fn is_eligible(&self) -> bool {
        self.active && !self.is_silenced()
    }

    pub fn can_speak(&self) -> bool {
        self.is_eligible()
    }

    /// Bans take effect immediately and also cover the current round.
    pub fn impose_shadow_ban(&mut self, rounds: u8) {
        let total = rounds.saturating_add(1);
        self.shadow_ban_rounds = self.shadow_ban_rounds.max(total);
    }

    /// Returns true when the ban expired with this step.
    pub fn tick_shadow_ban(&mut self) -> bool {
        if self.shadow_ban_rounds == 0 {
            return false;
        }
        self.shadow_ban_rounds -= 1;
        self.shadow_ban_rounds == 0
    }

    pub fn adjust_reputation(&mut self, delta: i64) -> Reputation {
        let next = (self.reputation as i64 + delta).max(0);
        self.reputation = next as Reputation;
        self.reputation
    }
}

/// Points accumulated by each faction across resolved rounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionScores {
    pub truth_seekers: u32,
    pub adversaries: u32,
}

impl FactionScores {
    pub fn get(&self, faction: Faction) -> u32 {
        match faction {
            Faction::TruthSeekers => self.truth_seekers,
            Faction::Adversaries => self.adversaries,
        }
    }

    pub fn award(&mut self, faction: Faction) {
        match faction {
            Faction::TruthSeekers => self.truth_seekers += 1,
            Faction::Adversaries => self.adversaries += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.truth_seekers + self.adversaries
    }
}
