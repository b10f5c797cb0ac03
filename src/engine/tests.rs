//! End-to-end rule checks driven through the session manager.

#![cfg(test)]

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::config::GameConfig;
use crate::engine::{
    AbilityArgs, BanCause, ChangeReason, Faction, GameOutcome, HintSource, Majority,
    NotificationIntent, Phase, Rejection, Role, RoleKind, Verdict, WinReason,
};
use crate::game::game_manager::GameManager;
use crate::ledger::LedgerRecord;
use crate::test_utils::serde::assert_round_trip_eq;
use crate::test_utils::{
    adversary, ally, count_kind, fake_headline, quick_config, real_headline, roster, t0, Table,
};

use crate::engine::VoteChoice::{Flag, Trust};

fn five_seats() -> Vec<Role> {
    vec![ally(5), adversary(), Role::Ordinary, Role::Ordinary, Role::Ordinary]
}

fn no_ability_rounds() -> GameConfig {
    GameConfig {
        ability_rounds: BTreeSet::new(),
        ..quick_config()
    }
}

#[test]
fn wrong_majority_scores_for_adversaries() {
    let mut table = Table::started(five_seats(), quick_config(), fake_headline("Moon sold"));
    let intents = table.ballots(&[(2, Trust), (3, Trust), (4, Trust), (1, Flag), (5, Flag)]);

    assert_eq!(table.phase(), Phase::RoundResults);
    let resolved = intents
        .iter()
        .find_map(|i| match i {
            NotificationIntent::RoundResolved {
                tally,
                majority,
                point,
                ..
            } => Some((*tally, *majority, *point)),
            _ => None,
        })
        .expect("round resolved");
    assert_eq!(resolved.0.trust, 3);
    assert_eq!(resolved.0.flag, 2);
    assert_eq!(resolved.1, Majority::Trust);
    assert_eq!(resolved.2, Some(Faction::Adversaries));

    // adversary loses one for the wrong vote, then gets the bonus back
    assert_eq!(table.reputation(2), 3);
    assert_eq!(table.reputation(3), 2);
    assert_eq!(table.reputation(4), 2);
    assert_eq!(table.reputation(1), 4);
    assert_eq!(table.reputation(5), 4);
    assert_eq!(table.session().scores.adversaries, 1);
    assert_eq!(table.session().scores.truth_seekers, 0);

    let outcome = &table.session().history[0];
    assert!(outcome
        .changes
        .iter()
        .any(|c| c.player == 2 && c.reason == ChangeReason::AdversaryBonus));
}

#[test]
fn failed_strike_bans_the_striker_for_one_round() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Rain"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    let opened = table.leave_results();
    assert_eq!(table.phase(), Phase::AbilityWindow);
    assert!(opened.iter().any(|i| matches!(
        i,
        NotificationIntent::AbilityWindowOpened { strikers, .. } if strikers == &vec![1]
    )));

    let intents = table
        .ability(1, AbilityArgs::Strike { target: 3 })
        .expect("strike accepted");
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::PlayerBanned { player: 1, cause: BanCause::FailedStrike, .. }
    )));
    let target = table.session().player(3).expect("target");
    assert!(!target.is_shadow_banned());
    assert_eq!(target.reputation, 4);
    assert_eq!(table.session().eliminations, 0);

    // a used strike skips the accusation vote and opens round two
    assert_eq!(table.phase(), Phase::HeadlineReveal);
    assert_eq!(table.session().round, 2);
    assert!(table.session().player(1).expect("ally").is_shadow_banned());
    assert_eq!(
        table.manager.authorize_message(1, "it was me"),
        Err(Rejection::ShadowBanned)
    );

    table.wait(1);
    table.ballots(&[(2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    assert_eq!(table.phase(), Phase::RoundResults);
    table.leave_results();
    // no strikers left, so the window closes at once
    assert_eq!(table.phase(), Phase::GroupAccusationVote);

    let intents = table.wait(15);
    assert_eq!(table.phase(), Phase::HeadlineReveal);
    assert_eq!(table.session().round, 3);
    assert!(intents
        .iter()
        .any(|i| matches!(i, NotificationIntent::BanLifted { player: 1 })));
    assert!(!table.session().player(1).expect("ally").is_shadow_banned());
}

#[test]
fn strike_on_the_adversary_silences_them_and_ends_the_game() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Hail"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    table.leave_results();
    assert_eq!(table.phase(), Phase::AbilityWindow);

    let intents = table
        .ability(1, AbilityArgs::Strike { target: 2 })
        .expect("strike accepted");
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::PlayerBanned { player: 2, cause: BanCause::Strike, .. }
    )));
    assert!(table.session().player(2).expect("adversary").is_shadow_banned());
    assert!(!table.session().player(1).expect("ally").is_shadow_banned());
    assert_eq!(table.session().eliminations, 1);
    assert_eq!(table.phase(), Phase::GameEnd);
    assert_eq!(
        table.session().outcome,
        Some(GameOutcome::Won(Verdict {
            winner: Faction::TruthSeekers,
            reason: WinReason::OpponentsSilenced,
        }))
    );

    let records = table.manager.drain_records();
    assert!(records.iter().any(|e| matches!(
        e.record,
        LedgerRecord::AbilityUsed { player: 1, target: Some(2), succeeded: Some(true), .. }
    )));
}

#[test]
fn forcing_results_again_does_not_resolve_the_round_twice() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Mist"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    assert_eq!(table.phase(), Phase::RoundResults);
    let reputation = table.reputation(3);

    let now = table.now;
    for _ in 0..4 {
        table
            .manager
            .force_transition(Phase::AbilityWindow, now)
            .expect("forced");
        let intents = table
            .manager
            .force_transition(Phase::RoundResults, now)
            .expect("forced");
        assert_eq!(count_kind(&intents, "round_resolved"), 0);
    }

    assert_eq!(table.phase(), Phase::RoundResults);
    assert_eq!(table.session().round, 1);
    assert_eq!(table.session().history.len(), 1);
    assert_eq!(table.session().scores.total(), 1);
    assert_eq!(table.reputation(3), reputation);
    assert_eq!(table.session().outcome, None);
}

#[test]
fn accusations_against_a_departed_player_are_dropped() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Sleet"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    table.leave_results();
    table.wait(15);
    assert_eq!(table.phase(), Phase::GroupAccusationVote);

    table.accuse(1, 4).expect("accuse");
    table.accuse(3, 4).expect("accuse");
    let now = table.now;
    table.manager.leave(4, now).expect("leave");
    table.manager.drain_records();

    let intents = table.wait(15);
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::AccusationResolved { target: None, .. }
    )));
    let departed = table.session().player(4).expect("departed");
    assert!(!departed.active);
    assert!(!departed.is_shadow_banned());
    assert_eq!(table.session().eliminations, 0);

    let records = table.manager.drain_records();
    assert!(records.iter().any(|e| matches!(
        &e.record,
        LedgerRecord::AccusationResolved { round: 1, target: None, votes } if votes.is_empty()
    )));
}

#[test]
fn tied_vote_awards_no_point() {
    let roles = vec![ally(5), adversary(), Role::Amplifier, Role::Ordinary, Role::Ordinary];
    let mut table = Table::started(roles, quick_config(), real_headline("Bees dance"));
    let left = table.manager.leave(3, table.now).expect("amplifier leaves");
    assert_eq!(count_kind(&left, "player_left"), 1);

    table.ballots(&[(1, Trust), (4, Trust), (2, Flag), (5, Flag)]);
    assert_eq!(table.phase(), Phase::RoundResults);

    let outcome = &table.session().history[0];
    assert_eq!(outcome.majority, Majority::Tie);
    assert_eq!(outcome.point, None);
    assert_eq!(outcome.majority_correct, None);
    assert!(outcome
        .changes
        .iter()
        .all(|c| c.reason != ChangeReason::AdversaryBonus));
    assert_eq!(table.session().scores.total(), 0);
    assert_eq!(table.reputation(2), 2);
    assert_eq!(table.reputation(3), 3);
}

#[test]
fn score_threshold_ends_the_game_before_the_cap() {
    let mut table = Table::seat(five_seats(), no_ability_rounds());
    table
        .manager
        .offer_headlines([real_headline("One"), real_headline("Two")]);
    let mut table = Table::start(table, real_headline("Three"));
    // the queued headlines come first; order does not matter for scoring
    let votes = [(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)];

    for round in 1..=2 {
        table.ballots(&votes);
        assert_eq!(table.session().scores.truth_seekers, round);
        table.leave_results();
        table.wait(1);
        assert_eq!(table.phase(), Phase::Discussion);
    }

    let intents = table.ballots(&votes);
    assert_eq!(table.phase(), Phase::GameEnd);
    assert_eq!(table.session().round, 3);
    let verdict = Verdict {
        winner: Faction::TruthSeekers,
        reason: WinReason::ScoreThreshold { score: 3 },
    };
    assert_eq!(table.session().outcome, Some(GameOutcome::Won(verdict)));
    assert_eq!(count_kind(&intents, "game_ended"), 1);

    let records = table.manager.drain_records();
    assert!(records
        .iter()
        .any(|e| matches!(e.record, LedgerRecord::GameFinished { rounds_played: 3, .. })));
}

#[test]
fn round_cap_with_tied_reputation_goes_to_truth_seekers() {
    let roles = vec![Role::Ordinary, Role::Ordinary, adversary()];
    let table = Table::seat_with(roles, no_ability_rounds(), |session| {
        session.players[0].reputation = 1;
        session.players[1].reputation = 2;
    });
    let mut table = Table::start(table, real_headline("Quiet"));

    for _ in 1..=4 {
        assert_eq!(table.phase(), Phase::Discussion);
        table.wait(30);
        table.wait(20);
        table.leave_results();
        table.wait(1);
    }

    assert_eq!(table.session().round, 5);
    table.wait(30);
    // the verdict lands as round five resolves, skipping the results dwell
    let intents = table.wait(20);
    assert_eq!(table.phase(), Phase::GameEnd);
    let ended = intents
        .iter()
        .find_map(|i| match i {
            NotificationIntent::GameEnded { outcome, roles, .. } => Some((*outcome, roles.len())),
            _ => None,
        })
        .expect("game ended");
    assert_eq!(
        ended.0,
        GameOutcome::Won(Verdict {
            winner: Faction::TruthSeekers,
            reason: WinReason::RoundCapReputation {
                truth_seekers: 3,
                adversaries: 3,
            },
        })
    );
    assert_eq!(ended.1, 3);
}

#[test]
fn first_vote_wins_and_repeats_are_rejected() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Snow"));
    table.vote(3, Flag).expect("first vote");
    assert_eq!(table.vote(3, Trust), Err(Rejection::AlreadyVoted));
    assert_eq!(table.session().votes.get(&3), Some(&Flag));
}

#[test]
fn votes_outside_open_phases_are_rejected() {
    let mut table = Table::seat(five_seats(), quick_config());
    assert_eq!(table.vote(1, Trust), Err(Rejection::WrongPhase(Phase::Lobby)));
    assert_eq!(
        table.vote(99, Trust),
        Err(Rejection::WrongPhase(Phase::Lobby))
    );

    let mut table = Table::started(five_seats(), quick_config(), real_headline("Fog"));
    assert_eq!(table.vote(99, Trust), Err(Rejection::UnknownPlayer(99)));
    assert_eq!(
        table.accuse(1, 2),
        Err(Rejection::WrongPhase(Phase::Discussion))
    );
}

#[test]
fn one_time_swap_cannot_fire_twice() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Tides"));
    table.vote(3, Trust).expect("vote");

    let intents = table
        .ability(2, AbilityArgs::SwapHeadline)
        .expect("swap accepted");
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::HeadlinePosted { swapped: true, .. }
    )));
    assert!(table.session().votes.is_empty());
    assert_eq!(
        table.ability(2, AbilityArgs::SwapHeadline),
        Err(Rejection::AlreadyUsed)
    );
    assert_eq!(
        table.ability(3, AbilityArgs::SwapHeadline),
        Err(Rejection::IneligibleRole)
    );
}

#[test]
fn peek_respects_cooldown_and_strike_needs_its_window() {
    let mut table = Table::started(five_seats(), quick_config(), fake_headline("Owls"));
    let intents = table.ability(1, AbilityArgs::Peek).expect("peek");
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::TruthHint { player: 1, is_real: false, source: HintSource::Peek, .. }
    )));
    assert_eq!(table.ability(1, AbilityArgs::Peek), Err(Rejection::Cooldown));
    assert_eq!(
        table.ability(1, AbilityArgs::Strike { target: 2 }),
        Err(Rejection::WrongPhase(Phase::Discussion))
    );
}

#[test]
fn strike_is_refused_once_the_cap_is_reached() {
    let table = Table::seat_with(five_seats(), quick_config(), |session| {
        session.eliminations = session.elimination_cap();
    });
    let mut table = Table::start(table, real_headline("Cap"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    table.leave_results();
    assert_eq!(table.phase(), Phase::AbilityWindow);
    assert_eq!(
        table.ability(1, AbilityArgs::Strike { target: 1 }),
        Err(Rejection::InvalidTarget)
    );
    assert_eq!(
        table.ability(1, AbilityArgs::Strike { target: 2 }),
        Err(Rejection::EliminationCapReached)
    );
    assert!(table.session().player(1).expect("ally").role.has_unused_strike());
}

#[test]
fn accusing_the_last_adversary_silences_them_and_ends_the_game() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Comet"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    table.leave_results();
    table.wait(15);
    assert_eq!(table.phase(), Phase::GroupAccusationVote);

    assert_eq!(table.accuse(3, 3), Err(Rejection::InvalidTarget));
    table.accuse(1, 2).expect("accuse");
    assert_eq!(table.accuse(1, 3), Err(Rejection::AlreadyVoted));
    table.accuse(3, 2).expect("accuse");
    table.accuse(4, 2).expect("accuse");
    table.accuse(5, 1).expect("accuse");
    let intents = table.accuse(2, 5).expect("accuse");

    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::AccusationResolved { target: Some(2), .. }
    )));
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::PlayerBanned { player: 2, cause: BanCause::Accusation, .. }
    )));
    assert_eq!(table.session().eliminations, 1);
    assert_eq!(table.phase(), Phase::GameEnd);
    assert_eq!(
        table.session().outcome,
        Some(GameOutcome::Won(Verdict {
            winner: Faction::TruthSeekers,
            reason: WinReason::OpponentsSilenced,
        }))
    );
}

#[test]
fn split_accusation_bans_nobody() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Wind"));
    table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Trust), (5, Trust)]);
    table.leave_results();
    table.wait(15);
    assert_eq!(table.phase(), Phase::GroupAccusationVote);

    table.accuse(1, 2).expect("accuse");
    table.accuse(3, 4).expect("accuse");
    let intents = table.wait(15);
    assert!(intents.iter().any(|i| matches!(
        i,
        NotificationIntent::AccusationResolved { target: None, .. }
    )));
    assert_eq!(table.session().eliminations, 0);
    assert_eq!(table.phase(), Phase::HeadlineReveal);
}

#[test]
fn reputation_stops_at_zero_and_ghosts_stay_quiet() {
    let table = Table::seat_with(five_seats(), quick_config(), |session| {
        session.players[3].reputation = 1;
    });
    let mut table = Table::start(table, real_headline("Frost"));
    table.manager.offer_headlines([real_headline("Thaw")]);
    let intents = table.ballots(&[(1, Trust), (2, Flag), (3, Trust), (4, Flag), (5, Trust)]);
    assert_eq!(table.reputation(4), 0);
    assert!(intents
        .iter()
        .any(|i| matches!(i, NotificationIntent::PlayerGhosted { player: 4 })));
    assert_eq!(table.manager.authorize_message(4, "hello"), Err(Rejection::Ghost));

    table.leave_results();
    table.wait(15);
    table.wait(15);
    table.wait(1);
    assert_eq!(table.phase(), Phase::Discussion);
    // ghosts still vote, but cannot go below zero
    table.vote(4, Flag).expect("ghost vote");
    table.wait(30);
    table.wait(20);
    assert_eq!(table.reputation(4), 0);
}

#[test]
fn message_gate_checks_length() {
    let table = Table::started(five_seats(), quick_config(), real_headline("Ink"));
    let max = table.session().config.max_message_chars;
    assert!(table.manager.authorize_message(3, "looks fake to me").is_ok());
    assert_eq!(
        table.manager.authorize_message(3, "   "),
        Err(Rejection::MessageLength { max })
    );
    let long = "x".repeat(max + 1);
    assert_eq!(
        table.manager.authorize_message(3, &long),
        Err(Rejection::MessageLength { max })
    );
}

#[test]
fn forcing_the_current_phase_is_a_no_op() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Dust"));
    let now = table.now;
    assert_eq!(
        table.manager.force_transition(Phase::Discussion, now),
        Ok(Vec::new())
    );
    assert_eq!(
        table.manager.force_transition(Phase::Lobby, now),
        Err(Rejection::WrongPhase(Phase::Discussion))
    );
    table
        .manager
        .force_transition(Phase::Voting, now)
        .expect("forced");
    assert_eq!(table.phase(), Phase::Voting);
}

#[test]
fn creator_controls_are_restricted() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Sand"));
    let now = table.now;
    assert_eq!(table.manager.advance(2, now), Err(Rejection::NotCreator));
    table.manager.advance(1, now).expect("advance");
    assert_eq!(table.phase(), Phase::Voting);

    let intents = table.manager.end_game(1, now).expect("end");
    assert_eq!(table.phase(), Phase::GameEnd);
    assert_eq!(table.session().outcome, Some(GameOutcome::Aborted));
    assert_eq!(count_kind(&intents, "game_ended"), 1);
    assert_eq!(table.manager.end_game(1, now), Ok(Vec::new()));
    assert_eq!(table.vote(3, Trust), Err(Rejection::GameOver));
}

#[test]
fn lobby_join_leave_and_timeout() {
    let now = t0();
    let mut manager =
        GameManager::create(Uuid::new_v4(), roster(2), quick_config(), now).expect("create");
    let joined = manager
        .join(crate::engine::RosterEntry::new(3, "late"))
        .expect("join");
    assert_eq!(count_kind(&joined, "player_joined"), 1);
    assert_eq!(
        manager.join(crate::engine::RosterEntry::new(3, "again")),
        Err(Rejection::AlreadyJoined)
    );
    assert_eq!(manager.leave(1, now), Err(Rejection::NotCreator));
    manager.leave(3, now).expect("leave");
    assert_eq!(
        manager.force_start(1, now),
        Err(Rejection::NotEnoughPlayers { have: 2, need: 3 })
    );

    manager.tick(now + chrono::Duration::seconds(60));
    assert_eq!(manager.session().phase, Phase::GameEnd);
    assert_eq!(manager.session().outcome, Some(GameOutcome::Cancelled));
}

#[test]
fn dealt_roles_follow_the_layout() {
    let now = t0();
    let mut manager =
        GameManager::create(Uuid::new_v4(), roster(7), quick_config(), now).expect("create");
    assert!(manager.role_info(1).is_none());
    let intents = manager.force_start(1, now).expect("start");

    let assigned: Vec<_> = intents
        .iter()
        .filter_map(|i| match i {
            NotificationIntent::RoleAssigned {
                player,
                role,
                teammates,
                ..
            } => Some((*player, *role, teammates.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(assigned.len(), 7);
    let adversaries: Vec<_> = assigned
        .iter()
        .filter(|(_, role, _)| *role == RoleKind::Adversary)
        .collect();
    assert_eq!(adversaries.len(), 2);
    assert!(adversaries.iter().all(|(_, _, mates)| mates.len() == 1));
    assert_eq!(
        assigned
            .iter()
            .filter(|(_, role, _)| *role == RoleKind::Amplifier)
            .count(),
        1
    );
    assert!(manager.role_info(1).is_some());
}

#[test]
fn exported_session_resumes_where_it_stopped() {
    let mut table = Table::started(five_seats(), quick_config(), real_headline("Gulls"));
    table.vote(3, Trust).expect("vote");
    let exported = table.manager.snapshot();
    assert_round_trip_eq(&exported);

    let json = serde_json::to_string(&exported).expect("serialize");
    let session: crate::engine::Session = serde_json::from_str(&json).expect("deserialize");
    let mut restored = GameManager::restore(session).expect("restore");
    assert_eq!(restored.session(), table.session());

    let now = table.now;
    assert_eq!(
        restored.submit_vote(3, Flag, now),
        Err(Rejection::AlreadyVoted)
    );
    restored.submit_vote(4, Trust, now).expect("vote after restore");
}
