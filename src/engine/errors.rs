use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::phases::Phase;
use super::types::PlayerId;

/// Why an inbound player action was turned down. Always reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    #[error("action is not available during {0:?}")]
    WrongPhase(Phase),
    #[error("player already voted this round")]
    AlreadyVoted,
    #[error("ability already used")]
    AlreadyUsed,
    #[error("ability is cooling down")]
    Cooldown,
    #[error("player {0} is not part of this session")]
    UnknownPlayer(PlayerId),
    #[error("player is no longer active")]
    Inactive,
    #[error("player has no reputation left")]
    Ghost,
    #[error("player is shadow-banned")]
    ShadowBanned,
    #[error("role cannot use this ability")]
    IneligibleRole,
    #[error("target is not valid")]
    InvalidTarget,
    #[error("elimination cap reached")]
    EliminationCapReached,
    #[error("only the creator may do this")]
    NotCreator,
    #[error("lobby is full")]
    LobbyFull,
    #[error("player already joined")]
    AlreadyJoined,
    #[error("need {need} players to start, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },
    #[error("message must be between 1 and {max} characters")]
    MessageLength { max: usize },
    #[error("game is over")]
    GameOver,
    #[error("no such session")]
    UnknownSession,
}

impl Rejection {
    /// Stable, machine-friendly reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::WrongPhase(_) => "wrong_phase",
            Rejection::AlreadyVoted => "already_voted",
            Rejection::AlreadyUsed => "already_used",
            Rejection::Cooldown => "cooldown",
            Rejection::UnknownPlayer(_) => "unknown_player",
            Rejection::Inactive => "inactive",
            Rejection::Ghost => "ghost",
            Rejection::ShadowBanned => "shadow_banned",
            Rejection::IneligibleRole => "ineligible_role",
            Rejection::InvalidTarget => "invalid_target",
            Rejection::EliminationCapReached => "elimination_cap",
            Rejection::NotCreator => "not_creator",
            Rejection::LobbyFull => "lobby_full",
            Rejection::AlreadyJoined => "already_joined",
            Rejection::NotEnoughPlayers { .. } => "not_enough_players",
            Rejection::MessageLength { .. } => "message_length",
            Rejection::GameOver => "game_over",
            Rejection::UnknownSession => "unknown_session",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
}

pub trait InvariantCheck {
    fn validate_invariants(&self) -> Result<(), StateError>;
}
