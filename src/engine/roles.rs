//! Roles, their factions and the ability bookkeeping each one carries.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::Rejection;
use super::phases::Phase;
use super::types::{Faction, RoundNo};

pub const DEFAULT_PEEK_USES: u8 = 3;

/// State owned by the Informed Ally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyState {
    /// The single round without an automatic truth hint.
    pub blind_round: RoundNo,
    pub peeks_left: u8,
    pub last_peek_round: Option<RoundNo>,
    pub strike_used: bool,
}

impl AllyState {
    pub fn new(blind_round: RoundNo, peeks: u8) -> Self {
        Self {
            blind_round,
            peeks_left: peeks,
            last_peek_round: None,
            strike_used: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdversaryState {
    pub swap_used: bool,
}

/// Closed set of roles. Each variant carries its own ability state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    InformedAlly(AllyState),
    Adversary(AdversaryState),
    Amplifier,
    Ordinary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    InformedAlly,
    Adversary,
    Amplifier,
    Ordinary,
}

/// Special actions a role may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Peek,
    Strike,
    SwapHeadline,
}

/// Presentation data for a role. The engine never interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub kind: RoleKind,
    pub name: &'static str,
    pub faction: Faction,
    pub description: &'static str,
    pub win_condition: &'static str,
    pub abilities: &'static [Ability],
}

impl RoleKind {
    pub fn faction(self) -> Faction {
        match self {
            RoleKind::Adversary => Faction::Adversaries,
            RoleKind::InformedAlly | RoleKind::Amplifier | RoleKind::Ordinary => {
                Faction::TruthSeekers
            }
        }
    }

    pub fn info(self) -> RoleInfo {
        match self {
            RoleKind::InformedAlly => RoleInfo {
                kind: self,
                name: "🧠 Fact Checker",
                faction: self.faction(),
                description: "You see whether each headline is real, except during one secret round. \
                              You may peek at the truth a few times and strike one suspected scammer.",
                win_condition: "Help the group judge headlines correctly and expose the scammers.",
                abilities: &[Ability::Peek, Ability::Strike],
            },
            RoleKind::Adversary => RoleInfo {
                kind: self,
                name: "😈 Scammer",
                faction: self.faction(),
                description: "You always know the truth. Mislead the group and swap one headline \
                              for a fresh one when it suits you.",
                win_condition: "Get the group to trust fake news or flag real news.",
                abilities: &[Ability::SwapHeadline],
            },
            RoleKind::Amplifier => RoleInfo {
                kind: self,
                name: "🎭 Influencer",
                faction: self.faction(),
                description: "No inside information, but your vote counts twice.",
                win_condition: "Help the group judge headlines correctly.",
                abilities: &[],
            },
            RoleKind::Ordinary => RoleInfo {
                kind: self,
                name: "🧍 Misinformed User",
                faction: self.faction(),
                description: "No special powers. Read carefully and vote wisely.",
                win_condition: "Help the group judge headlines correctly.",
                abilities: &[],
            },
        }
    }
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::InformedAlly(_) => RoleKind::InformedAlly,
            Role::Adversary(_) => RoleKind::Adversary,
            Role::Amplifier => RoleKind::Amplifier,
            Role::Ordinary => RoleKind::Ordinary,
        }
    }

    pub fn faction(&self) -> Faction {
        self.kind().faction()
    }

    pub fn vote_weight(&self) -> u32 {
        match self {
            Role::Amplifier => 2,
            _ => 1,
        }
    }

    /// Whether the role is told the truth of the active headline this round.
    pub fn should_receive_truth_hint(&self, round: RoundNo) -> bool {
        match self {
            Role::InformedAlly(state) => round != state.blind_round,
            Role::Adversary(_) => true,
            Role::Amplifier | Role::Ordinary => false,
        }
    }

    /// True when at least one ability could be used right now.
    pub fn can_act_now(&self, round: RoundNo, phase: Phase) -> bool {
        [Ability::Peek, Ability::Strike, Ability::SwapHeadline]
            .into_iter()
            .any(|ability| self.check_ability(ability, round, phase).is_ok())
    }

    /// Role-level eligibility for an ability. Never mutates.
    pub fn check_ability(
        &self,
        ability: Ability,
        round: RoundNo,
        phase: Phase,
    ) -> Result<(), Rejection> {
        match (self, ability) {
            (Role::InformedAlly(state), Ability::Peek) => {
                if state.peeks_left == 0 {
                    return Err(Rejection::AlreadyUsed);
                }
                if !phase.headline_open() {
                    return Err(Rejection::WrongPhase(phase));
                }
                match state.last_peek_round {
                    Some(last) if round < last.saturating_add(2) => Err(Rejection::Cooldown),
                    _ => Ok(()),
                }
            }
            (Role::InformedAlly(state), Ability::Strike) => {
                if state.strike_used {
                    return Err(Rejection::AlreadyUsed);
                }
                if phase != Phase::AbilityWindow {
                    return Err(Rejection::WrongPhase(phase));
                }
                Ok(())
            }
            (Role::Adversary(state), Ability::SwapHeadline) => {
                if state.swap_used {
                    return Err(Rejection::AlreadyUsed);
                }
                if !phase.headline_open() {
                    return Err(Rejection::WrongPhase(phase));
                }
                Ok(())
            }
            _ => Err(Rejection::IneligibleRole),
        }
    }

    /// Records that an ability fired. Call only after `check_ability` passed.
    pub fn record_use(&mut self, ability: Ability, round: RoundNo) {
        match (self, ability) {
            (Role::InformedAlly(state), Ability::Peek) => {
                state.peeks_left = state.peeks_left.saturating_sub(1);
                state.last_peek_round = Some(round);
            }
            (Role::InformedAlly(state), Ability::Strike) => state.strike_used = true,
            (Role::Adversary(state), Ability::SwapHeadline) => state.swap_used = true,
            _ => {}
        }
    }

    pub fn has_unused_strike(&self) -> bool {
        matches!(self, Role::InformedAlly(state) if !state.strike_used)
    }
}

/// Role counts for a table of `player_count` players.
pub fn role_layout(player_count: usize) -> Vec<RoleKind> {
    let mut layout = Vec::with_capacity(player_count);
    if player_count == 0 {
        return layout;
    }
    layout.push(RoleKind::InformedAlly);
    if player_count >= 7 {
        layout.extend([RoleKind::Adversary, RoleKind::Adversary, RoleKind::Amplifier]);
    } else if player_count >= 2 {
        layout.push(RoleKind::Adversary);
    }
    while layout.len() < player_count {
        layout.push(RoleKind::Ordinary);
    }
    layout
}

/// Builds shuffled roles for `player_count` seats. The ally's blind round is
/// drawn from `blind_rng` so it stays independent of the seat shuffle.
pub fn deal_roles<R: Rng, B: Rng>(
    player_count: usize,
    round_cap: RoundNo,
    peeks: u8,
    rng: &mut R,
    blind_rng: &mut B,
) -> Vec<Role> {
    let mut kinds = role_layout(player_count);
    kinds.shuffle(rng);
    kinds
        .into_iter()
        .map(|kind| match kind {
            RoleKind::InformedAlly => {
                let blind_round = blind_rng.gen_range(1..=round_cap.max(1));
                Role::InformedAlly(AllyState::new(blind_round, peeks))
            }
            RoleKind::Adversary => Role::Adversary(AdversaryState::default()),
            RoleKind::Amplifier => Role::Amplifier,
            RoleKind::Ordinary => Role::Ordinary,
        })
        .collect()
}
