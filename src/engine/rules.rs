//! Win-condition evaluation. Pure: reads session facts, returns a verdict.

use serde::{Deserialize, Serialize};

use super::types::{Faction, FactionScores, Player, RoundNo};

pub const DEFAULT_SCORE_TO_WIN: u32 = 3;
pub const DEFAULT_ROUND_CAP: RoundNo = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum WinReason {
    ScoreThreshold { score: u32 },
    RoundCapReputation { truth_seekers: u64, adversaries: u64 },
    OpponentsSilenced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: Faction,
    pub reason: WinReason,
}

/// Inputs the evaluator needs.
pub struct Standing<'a> {
    pub scores: FactionScores,
    pub rounds_completed: RoundNo,
    pub round_cap: RoundNo,
    pub score_to_win: u32,
    pub players: &'a [Player],
}

fn reputation_total(players: &[Player], faction: Faction) -> u64 {
    players
        .iter()
        .filter(|p| p.active && p.faction() == faction)
        .map(|p| p.reputation as u64)
        .sum()
}

/// True when every member of `faction` is silenced while an opponent can still act.
fn silenced_out(players: &[Player], faction: Faction) -> bool {
    let mut members = players.iter().filter(|p| p.faction() == faction).peekable();
    if members.peek().is_none() {
        return false;
    }
    let all_silenced = members.all(|p| !p.active || p.is_silenced());
    let opponent_standing = players
        .iter()
        .any(|p| p.faction() == faction.opponent() && p.is_eligible());
    all_silenced && opponent_standing
}

/// Checks the win rules in precedence order: score threshold, round cap, silenced faction.
pub fn evaluate(standing: &Standing<'_>) -> Option<Verdict> {
    for faction in [Faction::TruthSeekers, Faction::Adversaries] {
        let score = standing.scores.get(faction);
        if score >= standing.score_to_win {
            return Some(Verdict {
                winner: faction,
                reason: WinReason::ScoreThreshold { score },
            });
        }
    }

    if standing.rounds_completed >= standing.round_cap {
        let truth_seekers = reputation_total(standing.players, Faction::TruthSeekers);
        let adversaries = reputation_total(standing.players, Faction::Adversaries);
        let winner = if adversaries > truth_seekers {
            Faction::Adversaries
        } else {
            Faction::TruthSeekers
        };
        return Some(Verdict {
            winner,
            reason: WinReason::RoundCapReputation {
                truth_seekers,
                adversaries,
            },
        });
    }

    if silenced_out(standing.players, Faction::Adversaries) {
        return Some(Verdict {
            winner: Faction::TruthSeekers,
            reason: WinReason::OpponentsSilenced,
        });
    }
    if silenced_out(standing.players, Faction::TruthSeekers) {
        return Some(Verdict {
            winner: Faction::Adversaries,
            reason: WinReason::OpponentsSilenced,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::roles::{AdversaryState, Role};
    use crate::engine::types::{PlayerId, Reputation, RosterEntry};

    fn player(id: PlayerId, role: Role, reputation: Reputation) -> Player {
        let mut p = Player::new(RosterEntry::new(id, format!("p{id}")), reputation);
        p.role = role;
        p
    }

    fn table() -> Vec<Player> {
        vec![
            player(1, Role::Ordinary, 3),
            player(2, Role::Ordinary, 3),
            player(3, Role::Adversary(AdversaryState::default()), 3),
        ]
    }

    fn standing(players: &[Player], scores: FactionScores, rounds: RoundNo) -> Standing<'_> {
        Standing {
            scores,
            rounds_completed: rounds,
            round_cap: DEFAULT_ROUND_CAP,
            score_to_win: DEFAULT_SCORE_TO_WIN,
            players,
        }
    }

    #[test]
    fn no_verdict_mid_game() {
        let players = table();
        assert_eq!(evaluate(&standing(&players, FactionScores::default(), 2)), None);
    }

    #[test]
    fn score_threshold_beats_round_cap() {
        let players = table();
        let scores = FactionScores {
            truth_seekers: 1,
            adversaries: 3,
        };
        let verdict = evaluate(&standing(&players, scores, 5)).expect("verdict");
        assert_eq!(verdict.winner, Faction::Adversaries);
        assert!(matches!(verdict.reason, WinReason::ScoreThreshold { score: 3 }));
    }

    #[test]
    fn round_cap_compares_reputation() {
        let mut players = table();
        players[0].reputation = 0;
        players[1].reputation = 1;
        let scores = FactionScores {
            truth_seekers: 2,
            adversaries: 2,
        };
        let verdict = evaluate(&standing(&players, scores, 5)).expect("verdict");
        assert_eq!(verdict.winner, Faction::Adversaries);
    }

    #[test]
    fn silenced_adversaries_lose() {
        let mut players = table();
        players[2].impose_shadow_ban(1);
        let verdict = evaluate(&standing(&players, FactionScores::default(), 1)).expect("verdict");
        assert_eq!(verdict.winner, Faction::TruthSeekers);
        assert_eq!(verdict.reason, WinReason::OpponentsSilenced);
    }

    #[test]
    fn everyone_silenced_is_not_a_win() {
        let mut players = table();
        for p in players.iter_mut() {
            p.reputation = 0;
        }
        assert_eq!(evaluate(&standing(&players, FactionScores::default(), 1)), None);
    }
}
