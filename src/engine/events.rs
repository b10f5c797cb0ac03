use serde::{Deserialize, Serialize};

use super::phases::Phase;
use super::resolution::{Majority, ReputationChange, Tally};
use super::roles::RoleKind;
use super::rules::Verdict;
use super::types::{Faction, FactionScores, PlayerId, PublicHeadline, Reputation, RoundNo};

/// How a truth hint reached a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintSource {
    RoleInsight,
    Peek,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanCause {
    Strike,
    FailedStrike,
    Accusation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GameOutcome {
    Won(Verdict),
    /// Lobby closed without enough players.
    Cancelled,
    /// Creator ended the game early.
    Aborted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReveal {
    pub player: PlayerId,
    pub role: RoleKind,
    pub reputation: Reputation,
}

/// Something the transport should tell players. The engine only describes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationIntent {
    PhaseChanged {
        from: Phase,
        to: Phase,
        round: RoundNo,
        deadline_secs: Option<u64>,
    },
    PlayerJoined {
        player: PlayerId,
        player_count: usize,
    },
    PlayerLeft {
        player: PlayerId,
    },
    /// Private.
    RoleAssigned {
        player: PlayerId,
        role: RoleKind,
        faction: Faction,
        teammates: Vec<PlayerId>,
    },
    HeadlinePosted {
        round: RoundNo,
        headline: PublicHeadline,
        swapped: bool,
    },
    /// Private.
    TruthHint {
        player: PlayerId,
        round: RoundNo,
        is_real: bool,
        source: HintSource,
    },
    RoundResolved {
        round: RoundNo,
        is_real: bool,
        explanation: String,
        tally: Tally,
        majority: Majority,
        point: Option<Faction>,
        scores: FactionScores,
        changes: Vec<ReputationChange>,
    },
    PlayerGhosted {
        player: PlayerId,
    },
    PlayerBanned {
        player: PlayerId,
        rounds: u8,
        cause: BanCause,
    },
    BanLifted {
        player: PlayerId,
    },
    AbilityWindowOpened {
        round: RoundNo,
        strikers: Vec<PlayerId>,
    },
    AccusationResolved {
        round: RoundNo,
        target: Option<PlayerId>,
        votes: Vec<(PlayerId, u32)>,
    },
    GameEnded {
        outcome: GameOutcome,
        scores: FactionScores,
        roles: Vec<RoleReveal>,
    },
}

impl NotificationIntent {
    /// Recipient of a private notice; `None` means the whole group.
    pub fn recipient(&self) -> Option<PlayerId> {
        match self {
            NotificationIntent::RoleAssigned { player, .. }
            | NotificationIntent::TruthHint { player, .. } => Some(*player),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            NotificationIntent::PhaseChanged { .. } => "phase_changed",
            NotificationIntent::PlayerJoined { .. } => "player_joined",
            NotificationIntent::PlayerLeft { .. } => "player_left",
            NotificationIntent::RoleAssigned { .. } => "role_assigned",
            NotificationIntent::HeadlinePosted { .. } => "headline_posted",
            NotificationIntent::TruthHint { .. } => "truth_hint",
            NotificationIntent::RoundResolved { .. } => "round_resolved",
            NotificationIntent::PlayerGhosted { .. } => "player_ghosted",
            NotificationIntent::PlayerBanned { .. } => "player_banned",
            NotificationIntent::BanLifted { .. } => "ban_lifted",
            NotificationIntent::AbilityWindowOpened { .. } => "ability_window_opened",
            NotificationIntent::AccusationResolved { .. } => "accusation_resolved",
            NotificationIntent::GameEnded { .. } => "game_ended",
        }
    }
}
