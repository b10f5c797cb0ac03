//! Vote tallying and reputation updates for a closed round.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Faction, Headline, HeadlineId, Player, PlayerId, Reputation, RoundNo, VoteChoice};

const LOG_TARGET: &str = "truth_wars::engine::resolution";

/// Weighted vote sums.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub trust: u32,
    pub flag: u32,
}

impl Tally {
    pub fn majority(&self) -> Majority {
        match self.trust.cmp(&self.flag) {
            std::cmp::Ordering::Greater => Majority::Trust,
            std::cmp::Ordering::Less => Majority::Flag,
            std::cmp::Ordering::Equal => Majority::Tie,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Majority {
    Trust,
    Flag,
    Tie,
}

impl Majority {
    pub fn choice(self) -> Option<VoteChoice> {
        match self {
            Majority::Trust => Some(VoteChoice::Trust),
            Majority::Flag => Some(VoteChoice::Flag),
            Majority::Tie => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    CorrectVote,
    IncorrectVote,
    AdversaryBonus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationChange {
    pub player: PlayerId,
    pub before: Reputation,
    pub after: Reputation,
    pub reason: ChangeReason,
    pub vote: Option<VoteChoice>,
}

impl ReputationChange {
    pub fn delta(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}

/// One counted ballot with its weight and correctness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedVote {
    pub player: PlayerId,
    pub choice: VoteChoice,
    pub weight: u32,
    pub is_correct: bool,
    pub reputation_before: Reputation,
    pub reputation_after: Reputation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: RoundNo,
    pub headline_id: HeadlineId,
    pub headline_is_real: bool,
    pub tally: Tally,
    pub majority: Majority,
    /// `None` on a tie.
    pub majority_correct: Option<bool>,
    pub point: Option<Faction>,
    pub votes: Vec<CountedVote>,
    pub changes: Vec<ReputationChange>,
    pub newly_ghosted: Vec<PlayerId>,
}

/// Weighted sums over the votes of active players.
pub fn tally(players: &[Player], votes: &BTreeMap<PlayerId, VoteChoice>) -> Tally {
    let mut tally = Tally::default();
    for (player_id, choice) in votes {
        let Some(player) = players.iter().find(|p| p.id == *player_id && p.active) else {
            continue;
        };
        match choice {
            VoteChoice::Trust => tally.trust += player.vote_weight(),
            VoteChoice::Flag => tally.flag += player.vote_weight(),
        }
    }
    tally
}

/// Resolves a round against the headline's truth and applies every reputation
/// change to `players`. The caller clears the vote buffer afterwards.
pub fn resolve_round(
    round: RoundNo,
    players: &mut [Player],
    votes: &BTreeMap<PlayerId, VoteChoice>,
    headline: &Headline,
) -> RoundOutcome {
    let tally = tally(players, votes);
    let majority = tally.majority();
    let majority_correct = majority
        .choice()
        .map(|choice| choice.is_correct(headline.is_real));
    let point = majority_correct.map(|correct| {
        if correct {
            Faction::TruthSeekers
        } else {
            Faction::Adversaries
        }
    });

    let starting: BTreeMap<PlayerId, Reputation> =
        players.iter().map(|p| (p.id, p.reputation)).collect();

    let mut counted = Vec::with_capacity(votes.len());
    let mut changes = Vec::new();

    for player in players.iter_mut().filter(|p| p.active) {
        let Some(choice) = votes.get(&player.id).copied() else {
            continue;
        };
        let is_correct = choice.is_correct(headline.is_real);
        let before = player.reputation;
        let after = player.adjust_reputation(if is_correct { 1 } else { -1 });
        changes.push(ReputationChange {
            player: player.id,
            before,
            after,
            reason: if is_correct {
                ChangeReason::CorrectVote
            } else {
                ChangeReason::IncorrectVote
            },
            vote: Some(choice),
        });
        counted.push(CountedVote {
            player: player.id,
            choice,
            weight: player.vote_weight(),
            is_correct,
            reputation_before: before,
            reputation_after: after,
        });
    }

    if majority_correct == Some(false) {
        for player in players
            .iter_mut()
            .filter(|p| p.active && p.faction() == Faction::Adversaries)
        {
            let before = player.reputation;
            let after = player.adjust_reputation(1);
            changes.push(ReputationChange {
                player: player.id,
                before,
                after,
                reason: ChangeReason::AdversaryBonus,
                vote: votes.get(&player.id).copied(),
            });
        }
    }

    for vote in counted.iter_mut() {
        if let Some(player) = players.iter().find(|p| p.id == vote.player) {
            vote.reputation_after = player.reputation;
        }
    }

    let newly_ghosted: Vec<PlayerId> = players
        .iter()
        .filter(|p| p.is_ghost() && starting.get(&p.id).is_some_and(|before| *before > 0))
        .map(|p| p.id)
        .collect();

    debug!(
        target: LOG_TARGET,
        round,
        trust = tally.trust,
        flag = tally.flag,
        ?majority,
        ?point,
        ghosted = newly_ghosted.len(),
        "round resolved"
    );

    RoundOutcome {
        round,
        headline_id: headline.id,
        headline_is_real: headline.is_real,
        tally,
        majority,
        majority_correct,
        point,
        votes: counted,
        changes,
        newly_ghosted,
    }
}
