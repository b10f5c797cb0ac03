use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::events::GameOutcome;
use crate::engine::resolution::{ChangeReason, Majority, Tally};
use crate::engine::roles::Ability;
use crate::engine::types::{
    Faction, FactionScores, HeadlineId, PlayerId, Reputation, RoundNo, SessionId, VoteChoice,
};

/// Write-only facts produced by a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LedgerRecord {
    VoteCast {
        round: RoundNo,
        player: PlayerId,
        choice: VoteChoice,
        weight: u32,
    },
    VoteScored {
        round: RoundNo,
        player: PlayerId,
        headline_id: HeadlineId,
        choice: VoteChoice,
        weight: u32,
        is_correct: bool,
        reputation_before: Reputation,
        reputation_after: Reputation,
    },
    ReputationChanged {
        round: RoundNo,
        player: PlayerId,
        before: Reputation,
        after: Reputation,
        change: i64,
        reason: ChangeReason,
        headline_id: HeadlineId,
        vote: Option<VoteChoice>,
        headline_truth: bool,
    },
    RoundSummary {
        round: RoundNo,
        headline_id: HeadlineId,
        tally: Tally,
        majority: Majority,
        point: Option<Faction>,
    },
    AbilityUsed {
        round: RoundNo,
        player: PlayerId,
        ability: Ability,
        target: Option<PlayerId>,
        succeeded: Option<bool>,
    },
    AccusationResolved {
        round: RoundNo,
        target: Option<PlayerId>,
        votes: Vec<(PlayerId, u32)>,
    },
    GameFinished {
        outcome: GameOutcome,
        rounds_played: RoundNo,
        scores: FactionScores,
    },
}

impl LedgerRecord {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerRecord::VoteCast { .. } => "vote_cast",
            LedgerRecord::VoteScored { .. } => "vote_scored",
            LedgerRecord::ReputationChanged { .. } => "reputation_changed",
            LedgerRecord::RoundSummary { .. } => "round_summary",
            LedgerRecord::AbilityUsed { .. } => "ability_used",
            LedgerRecord::AccusationResolved { .. } => "accusation_resolved",
            LedgerRecord::GameFinished { .. } => "game_finished",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub session_id: SessionId,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: LedgerRecord,
}
