//! Shared fixtures for session tests.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::engine::{
    AbilityArgs, AdversaryState, AllyState, Headline, NotificationIntent, Phase, PhaseTimings,
    PlayerAction, PlayerId, Rejection, Role, RosterEntry, Session, VoteChoice,
};
use crate::game::game_manager::GameManager;

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn roster(count: usize) -> Vec<RosterEntry> {
    (1..=count as PlayerId)
        .map(|id| RosterEntry::new(id, format!("player-{id}")))
        .collect()
}

/// Deterministic config with short phases.
pub fn quick_config() -> GameConfig {
    GameConfig {
        rng_seed: Some(7),
        timings: PhaseTimings {
            lobby_secs: 60,
            role_assignment_secs: 10,
            role_assignment_min_dwell_secs: 2,
            headline_reveal_secs: 1,
            discussion_secs: 30,
            voting_secs: 20,
            round_results_secs: 5,
            ability_window_secs: 15,
            group_accusation_secs: 15,
        },
        ..GameConfig::default()
    }
}

pub fn ally(blind_round: u32) -> Role {
    Role::InformedAlly(AllyState::new(blind_round, 3))
}

pub fn adversary() -> Role {
    Role::Adversary(AdversaryState::default())
}

pub fn real_headline(text: &str) -> Headline {
    Headline::new(text, true, "Test Wire", "It happened.")
}

pub fn fake_headline(text: &str) -> Headline {
    Headline::new(text, false, "Test Wire", "It did not happen.")
}

/// A seated game driven with an explicit clock.
pub struct Table {
    pub manager: GameManager,
    pub now: DateTime<Utc>,
}

impl Table {
    /// Seats one player per role, ids starting at 1, still in the lobby.
    pub fn seat(roles: Vec<Role>, config: GameConfig) -> Self {
        Self::seat_with(roles, config, |_| {})
    }

    /// Like `seat`, letting the caller adjust the session before the manager takes it.
    pub fn seat_with(roles: Vec<Role>, config: GameConfig, tweak: impl FnOnce(&mut Session)) -> Self {
        let now = t0();
        let mut session = Session::new(Uuid::new_v4(), roster(roles.len()), config, now);
        for (player, role) in session.players.iter_mut().zip(roles) {
            player.role = role;
        }
        session.roles_assigned = true;
        tweak(&mut session);
        let manager = GameManager::restore(session).expect("valid config");
        Self { manager, now }
    }

    /// Seats the table and plays up to the first discussion, with `first` as round one's headline.
    pub fn started(roles: Vec<Role>, config: GameConfig, first: Headline) -> Self {
        Self::start(Self::seat(roles, config), first)
    }

    pub fn start(mut table: Self, first: Headline) -> Self {
        table.manager.offer_headlines([first]);
        table.manager.force_start(1, table.now).expect("force start");
        table.wait(2);
        assert_eq!(table.phase(), Phase::HeadlineReveal);
        table.wait(1);
        assert_eq!(table.phase(), Phase::Discussion);
        table
    }

    pub fn phase(&self) -> Phase {
        self.manager.session().phase
    }

    pub fn session(&self) -> &Session {
        self.manager.session()
    }

    pub fn reputation(&self, player: PlayerId) -> u32 {
        self.session()
            .player(player)
            .map(|p| p.reputation)
            .expect("known player")
    }

    pub fn wait(&mut self, secs: i64) -> Vec<NotificationIntent> {
        self.now += chrono::Duration::seconds(secs);
        self.manager.tick(self.now)
    }

    pub fn vote(
        &mut self,
        player: PlayerId,
        choice: VoteChoice,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.manager
            .apply_action(player, PlayerAction::Vote { choice }, self.now)
    }

    pub fn ability(
        &mut self,
        player: PlayerId,
        args: AbilityArgs,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.manager
            .apply_action(player, PlayerAction::UseAbility { args }, self.now)
    }

    pub fn accuse(
        &mut self,
        player: PlayerId,
        target: PlayerId,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.manager
            .apply_action(player, PlayerAction::Accuse { target }, self.now)
    }

    /// Casts every listed ballot, expecting each to be accepted.
    pub fn ballots(&mut self, votes: &[(PlayerId, VoteChoice)]) -> Vec<NotificationIntent> {
        votes
            .iter()
            .flat_map(|(player, choice)| self.vote(*player, *choice).expect("vote accepted"))
            .collect()
    }

    /// Moves through the results screen into the next phase.
    pub fn leave_results(&mut self) -> Vec<NotificationIntent> {
        assert_eq!(self.phase(), Phase::RoundResults);
        self.wait(5)
    }
}

pub fn count_kind(intents: &[NotificationIntent], kind: &str) -> usize {
    intents.iter().filter(|i| i.kind_name() == kind).count()
}
