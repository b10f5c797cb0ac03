use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{InvariantCheck, Rejection, StateError};
use super::events::GameOutcome;
use super::phases::{Phase, TransitionSnapshot};
use super::resolution::RoundOutcome;
use super::rules::{Standing, Verdict};
use super::types::{
    Faction, FactionScores, Headline, HeadlineId, Player, PlayerId, RosterEntry, RoundNo,
    SessionId, VoteChoice,
};
use crate::config::GameConfig;

/// Aggregate root of one running game. Owned by exactly one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub creator: PlayerId,
    pub config: GameConfig,
    pub created_at: DateTime<Utc>,

    pub players: Vec<Player>,
    pub roles_assigned: bool,

    pub phase: Phase,
    pub phase_entered_at: DateTime<Utc>,
    pub round: RoundNo,

    pub headline: Option<Headline>,
    pub votes: BTreeMap<PlayerId, VoteChoice>,
    /// accuser -> accused
    pub accusations: BTreeMap<PlayerId, PlayerId>,
    pub strike_used_this_round: bool,

    pub scores: FactionScores,
    pub eliminations: u32,
    pub verdict: Option<Verdict>,
    pub outcome: Option<GameOutcome>,
    pub finished_at: Option<DateTime<Utc>>,
    pub history: Vec<RoundOutcome>,

    /// Pre-drawn headlines waiting to be used.
    pub headline_queue: VecDeque<Headline>,
    pub used_headlines: BTreeSet<HeadlineId>,
}

impl Session {
    pub fn new(
        id: SessionId,
        roster: Vec<RosterEntry>,
        config: GameConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let creator = roster.first().map(|e| e.id).unwrap_or_default();
        let players = roster
            .into_iter()
            .map(|entry| Player::new(entry, config.starting_reputation))
            .collect();
        Self {
            id,
            creator,
            config,
            created_at: now,
            players,
            roles_assigned: false,
            phase: Phase::Lobby,
            phase_entered_at: now,
            round: 0,
            headline: None,
            votes: BTreeMap::new(),
            accusations: BTreeMap::new(),
            strike_used_this_round: false,
            scores: FactionScores::default(),
            eliminations: 0,
            verdict: None,
            outcome: None,
            finished_at: None,
            history: Vec::new(),
            headline_queue: VecDeque::new(),
            used_headlines: BTreeSet::new(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Known and still active, or the matching rejection.
    pub fn active_player(&self, id: PlayerId) -> Result<&Player, Rejection> {
        let player = self.player(id).ok_or(Rejection::UnknownPlayer(id))?;
        if !player.active {
            return Err(Rejection::Inactive);
        }
        Ok(player)
    }

    /// Players who may still act (active, not a ghost, not shadow-banned).
    pub fn eligible_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_eligible())
    }

    pub fn elimination_cap(&self) -> u32 {
        self.players.len().saturating_sub(2) as u32
    }

    pub fn elimination_allowed(&self) -> bool {
        self.eliminations < self.elimination_cap()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.phase_entered_at).to_std().unwrap_or(Duration::ZERO)
    }

    fn all_eligible(&self, acted: impl Fn(PlayerId) -> bool) -> bool {
        let mut eligible = self.eligible_players().peekable();
        eligible.peek().is_some() && eligible.all(|p| acted(p.id))
    }

    pub fn all_eligible_voted(&self) -> bool {
        self.all_eligible(|id| self.votes.contains_key(&id))
    }

    pub fn all_eligible_accused(&self) -> bool {
        self.all_eligible(|id| self.accusations.contains_key(&id))
    }

    /// Allies who could still strike this window.
    pub fn available_strikers(&self) -> Vec<PlayerId> {
        self.eligible_players()
            .filter(|p| p.role.has_unused_strike())
            .map(|p| p.id)
            .collect()
    }

    pub fn members_of(&self, faction: Faction) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.faction() == faction)
            .map(|p| p.id)
            .collect()
    }

    fn phase_complete(&self) -> bool {
        match self.phase {
            Phase::Discussion | Phase::Voting => self.all_eligible_voted(),
            Phase::GroupAccusationVote => self.all_eligible_accused(),
            Phase::AbilityWindow => {
                self.strike_used_this_round || self.available_strikers().is_empty()
            }
            _ => false,
        }
    }

    pub fn transition_snapshot(&self, now: DateTime<Utc>) -> TransitionSnapshot {
        TransitionSnapshot {
            phase: self.phase,
            elapsed: self.elapsed(now),
            round: self.round,
            round_cap: self.config.round_cap,
            enough_players: self.players.iter().filter(|p| p.active).count()
                >= self.config.min_players,
            all_roles_assigned: self.roles_assigned,
            all_eligible_acted: self.phase_complete(),
            verdict_reached: self.verdict.is_some(),
            ability_round: self.config.is_ability_round(self.round),
            strike_used_this_round: self.strike_used_this_round,
        }
    }

    pub fn standing(&self) -> Standing<'_> {
        Standing {
            scores: self.scores,
            rounds_completed: self.history.len() as RoundNo,
            round_cap: self.config.round_cap,
            score_to_win: self.config.score_to_win,
            players: &self.players,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}

impl InvariantCheck for Session {
    fn validate_invariants(&self) -> Result<(), StateError> {
        if self.roles_assigned && self.eliminations > self.elimination_cap() {
            return Err(StateError::InvariantViolation(
                "eliminations exceed the elimination cap",
            ));
        }
        if self.round > self.config.round_cap {
            return Err(StateError::InvariantViolation("round past the round cap"));
        }
        if self.scores.total() as usize > self.history.len() {
            return Err(StateError::InvariantViolation(
                "more faction points than resolved rounds",
            ));
        }
        if self.votes.keys().any(|id| self.player(*id).is_none()) {
            return Err(StateError::InvariantViolation("vote from unknown player"));
        }
        if self
            .accusations
            .iter()
            .any(|(from, to)| from == to || self.player(*to).is_none())
        {
            return Err(StateError::InvariantViolation("invalid accusation recorded"));
        }
        if self.phase.needs_round() && self.round == 0 {
            return Err(StateError::InvariantViolation("round phase before round 1"));
        }
        Ok(())
    }
}
