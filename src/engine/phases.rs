//! Phase definitions, timing table and transition rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::StateError;
use super::types::RoundNo;

/// Phases a session moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for players and the creator's start signal
    Lobby,
    /// Roles are dealt and delivered privately
    RoleAssignment,
    /// A fresh headline is shown
    HeadlineReveal,
    /// Players argue and may already vote
    Discussion,
    /// Last call for votes
    Voting,
    /// Votes are resolved and scores announced
    RoundResults,
    /// Targeted strikes may be attempted
    AbilityWindow,
    /// Players vote to silence a suspect
    GroupAccusationVote,
    /// Terminal
    GameEnd,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::GameEnd)
    }

    /// The game has started and not yet finished.
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Lobby | Phase::GameEnd)
    }

    /// Phases in which the current headline is still open for judgement.
    pub fn headline_open(&self) -> bool {
        matches!(
            self,
            Phase::HeadlineReveal | Phase::Discussion | Phase::Voting
        )
    }

    pub fn accepts_votes(&self) -> bool {
        matches!(self, Phase::Discussion | Phase::Voting)
    }

    /// Phases that only make sense once a round is underway.
    pub fn needs_round(&self) -> bool {
        matches!(
            self,
            Phase::HeadlineReveal
                | Phase::Discussion
                | Phase::Voting
                | Phase::RoundResults
                | Phase::AbilityWindow
                | Phase::GroupAccusationVote
        )
    }

    /// Edges the machine may take on its own. Forced transitions are not limited by this.
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Lobby, RoleAssignment)
                | (Lobby, GameEnd)
                | (RoleAssignment, HeadlineReveal)
                | (HeadlineReveal, Discussion)
                | (Discussion, Voting)
                | (Voting, RoundResults)
                | (RoundResults, AbilityWindow)
                | (RoundResults, HeadlineReveal)
                | (RoundResults, GameEnd)
                | (AbilityWindow, GroupAccusationVote)
                | (AbilityWindow, HeadlineReveal)
                | (AbilityWindow, GameEnd)
                | (GroupAccusationVote, HeadlineReveal)
                | (GroupAccusationVote, GameEnd)
        ) || (self.is_active() && target == GameEnd)
    }

    /// Same as `can_transition_to`, as an error for callers that must not proceed.
    pub fn ensure_transition(self, target: Phase) -> Result<(), StateError> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(StateError::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phase::Lobby => "Waiting for players",
            Phase::RoleAssignment => "Assigning secret roles",
            Phase::HeadlineReveal => "Revealing the headline",
            Phase::Discussion => "Discussing the headline",
            Phase::Voting => "Voting on the headline",
            Phase::RoundResults => "Announcing round results",
            Phase::AbilityWindow => "Fact checker may strike",
            Phase::GroupAccusationVote => "Voting on a suspect",
            Phase::GameEnd => "Game over",
        }
    }
}

/// Per-phase time limits in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseTimings {
    pub lobby_secs: u64,
    pub role_assignment_secs: u64,
    pub role_assignment_min_dwell_secs: u64,
    pub headline_reveal_secs: u64,
    pub discussion_secs: u64,
    pub voting_secs: u64,
    pub round_results_secs: u64,
    pub ability_window_secs: u64,
    pub group_accusation_secs: u64,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            lobby_secs: 180,
            role_assignment_secs: 45,
            role_assignment_min_dwell_secs: 20,
            headline_reveal_secs: 1,
            discussion_secs: 120,
            voting_secs: 45,
            round_results_secs: 15,
            ability_window_secs: 60,
            group_accusation_secs: 45,
        }
    }
}

impl PhaseTimings {
    /// Hard limit for a phase; `None` for the terminal phase.
    pub fn limit(&self, phase: Phase) -> Option<Duration> {
        let secs = match phase {
            Phase::Lobby => self.lobby_secs,
            Phase::RoleAssignment => self.role_assignment_secs,
            Phase::HeadlineReveal => self.headline_reveal_secs,
            Phase::Discussion => self.discussion_secs,
            Phase::Voting => self.voting_secs,
            Phase::RoundResults => self.round_results_secs,
            Phase::AbilityWindow => self.ability_window_secs,
            Phase::GroupAccusationVote => self.group_accusation_secs,
            Phase::GameEnd => return None,
        };
        Some(Duration::from_secs(secs))
    }

    pub fn role_assignment_min_dwell(&self) -> Duration {
        Duration::from_secs(self.role_assignment_min_dwell_secs)
    }

    /// Every timed phase paired with its configured seconds.
    pub fn entries(&self) -> [(Phase, u64); 8] {
        [
            (Phase::Lobby, self.lobby_secs),
            (Phase::RoleAssignment, self.role_assignment_secs),
            (Phase::HeadlineReveal, self.headline_reveal_secs),
            (Phase::Discussion, self.discussion_secs),
            (Phase::Voting, self.voting_secs),
            (Phase::RoundResults, self.round_results_secs),
            (Phase::AbilityWindow, self.ability_window_secs),
            (Phase::GroupAccusationVote, self.group_accusation_secs),
        ]
    }

    /// Same limits with every phase scaled down to `secs` at most. Handy for simulations.
    pub fn capped(&self, secs: u64) -> Self {
        let cap = |v: u64| v.min(secs).max(1);
        Self {
            lobby_secs: cap(self.lobby_secs),
            role_assignment_secs: cap(self.role_assignment_secs),
            role_assignment_min_dwell_secs: self.role_assignment_min_dwell_secs.min(secs),
            headline_reveal_secs: cap(self.headline_reveal_secs),
            discussion_secs: cap(self.discussion_secs),
            voting_secs: cap(self.voting_secs),
            round_results_secs: cap(self.round_results_secs),
            ability_window_secs: cap(self.ability_window_secs),
            group_accusation_secs: cap(self.group_accusation_secs),
        }
    }
}

/// Read-only view of the session used to evaluate transition predicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionSnapshot {
    pub phase: Phase,
    pub elapsed: Duration,
    pub round: RoundNo,
    pub round_cap: RoundNo,
    pub enough_players: bool,
    pub all_roles_assigned: bool,
    pub all_eligible_acted: bool,
    pub verdict_reached: bool,
    pub ability_round: bool,
    pub strike_used_this_round: bool,
}

/// Stateless rules for leaving a phase and picking the next one.
#[derive(Clone, Debug)]
pub struct PhaseMachine {
    timings: PhaseTimings,
}

impl PhaseMachine {
    pub fn new(timings: PhaseTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    fn expired(&self, snapshot: &TransitionSnapshot) -> bool {
        self.timings
            .limit(snapshot.phase)
            .map_or(false, |limit| snapshot.elapsed >= limit)
    }

    /// Whether the current phase should be left. False is an ordinary answer, not an error.
    pub fn should_leave(&self, snapshot: &TransitionSnapshot) -> bool {
        if snapshot.phase.is_terminal() {
            return false;
        }
        if snapshot.verdict_reached && snapshot.phase.is_active() {
            return true;
        }
        match snapshot.phase {
            Phase::RoleAssignment => {
                self.expired(snapshot)
                    || (snapshot.all_roles_assigned
                        && snapshot.elapsed >= self.timings.role_assignment_min_dwell())
            }
            Phase::Discussion
            | Phase::Voting
            | Phase::AbilityWindow
            | Phase::GroupAccusationVote => self.expired(snapshot) || snapshot.all_eligible_acted,
            Phase::Lobby | Phase::HeadlineReveal | Phase::RoundResults => self.expired(snapshot),
            Phase::GameEnd => false,
        }
    }

    /// Phase to enter once the current one is left.
    pub fn successor(&self, snapshot: &TransitionSnapshot) -> Phase {
        if snapshot.verdict_reached && snapshot.phase.is_active() {
            return Phase::GameEnd;
        }
        match snapshot.phase {
            Phase::Lobby if snapshot.enough_players => Phase::RoleAssignment,
            Phase::Lobby => Phase::GameEnd,
            Phase::RoleAssignment => Phase::HeadlineReveal,
            Phase::HeadlineReveal => Phase::Discussion,
            Phase::Discussion => Phase::Voting,
            Phase::Voting => Phase::RoundResults,
            Phase::RoundResults if snapshot.ability_round => Phase::AbilityWindow,
            Phase::RoundResults => Self::next_round(snapshot),
            Phase::AbilityWindow if snapshot.strike_used_this_round => Self::next_round(snapshot),
            Phase::AbilityWindow => Phase::GroupAccusationVote,
            Phase::GroupAccusationVote => Self::next_round(snapshot),
            Phase::GameEnd => Phase::GameEnd,
        }
    }

    fn next_round(snapshot: &TransitionSnapshot) -> Phase {
        if snapshot.round >= snapshot.round_cap {
            Phase::GameEnd
        } else {
            Phase::HeadlineReveal
        }
    }

    pub fn remaining(&self, phase: Phase, elapsed: Duration) -> Option<Duration> {
        self.timings
            .limit(phase)
            .map(|limit| limit.saturating_sub(elapsed))
    }
}
