//! Single-session game driver: phase progression, action routing and side effects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{ensure_roster, validate_game_config, ConfigError, GameConfig};
use crate::content::library::fallback_headline;
use crate::engine::{
    deal_roles, evaluate, resolve_round, Ability, AbilityArgs, BanCause, Faction, FactionScores,
    GameOutcome, Headline, HintSource, InvariantCheck, NotificationIntent, Phase, PhaseMachine,
    Player, PlayerAction, PlayerId, Rejection, RoleInfo, RoleKind, RoleReveal, RosterEntry, RoundNo,
    Session, SessionId, VoteChoice,
};
use crate::ledger::records::{LedgerEntry, LedgerRecord};

const LOG_TARGET: &str = "truth_wars::game::manager";
const MAX_TRANSITIONS_PER_TICK: usize = 16;

/// Read-only view returned by status queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: SessionId,
    pub phase: Phase,
    pub round: RoundNo,
    pub round_cap: RoundNo,
    pub seconds_remaining: Option<u64>,
    pub scores: FactionScores,
    pub player_count: usize,
    pub active_players: usize,
    pub eliminations: u32,
    pub elimination_cap: u32,
    pub outcome: Option<GameOutcome>,
}

/// Owns one session and applies every mutation to it in order.
pub struct GameManager {
    session: Session,
    machine: PhaseMachine,
    rng: StdRng,
    records: Vec<LedgerEntry>,
}

impl GameManager {
    pub fn create(
        id: SessionId,
        roster: Vec<RosterEntry>,
        config: GameConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        validate_game_config(&config)?;
        ensure_roster(&config, &roster)?;
        let session = Session::new(id, roster, config, now);
        info!(
            target: LOG_TARGET,
            session_id = %id,
            players = session.players.len(),
            creator = session.creator,
            "session created"
        );
        Ok(Self::from_parts(session, 0))
    }

    /// Resumes a previously exported session.
    pub fn restore(session: Session) -> Result<Self, ConfigError> {
        validate_game_config(&session.config)?;
        let salt = session.round as u64;
        Ok(Self::from_parts(session, salt))
    }

    fn from_parts(session: Session, salt: u64) -> Self {
        let rng = match session.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(salt)),
            None => StdRng::from_entropy(),
        };
        let machine = PhaseMachine::new(session.config.timings.clone());
        Self {
            session,
            machine,
            rng,
            records: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    /// Serializable copy of the full session state.
    pub fn snapshot(&self) -> Session {
        self.session.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    pub fn status(&self, now: DateTime<Utc>) -> StatusSnapshot {
        let s = &self.session;
        StatusSnapshot {
            session_id: s.id,
            phase: s.phase,
            round: s.round,
            round_cap: s.config.round_cap,
            seconds_remaining: self
                .machine
                .remaining(s.phase, s.elapsed(now))
                .map(|d| d.as_secs()),
            scores: s.scores,
            player_count: s.players.len(),
            active_players: s.players.iter().filter(|p| p.active).count(),
            eliminations: s.eliminations,
            elimination_cap: s.elimination_cap(),
            outcome: s.outcome,
        }
    }

    pub fn role_info(&self, player: PlayerId) -> Option<RoleInfo> {
        if !self.session.roles_assigned {
            return None;
        }
        self.session.player(player).map(|p| p.role.kind().info())
    }

    /// Persistence records produced since the last drain.
    pub fn drain_records(&mut self) -> Vec<LedgerEntry> {
        std::mem::take(&mut self.records)
    }

    /// How many more headlines the buffer wants to hold `depth` unused ones.
    pub fn headlines_wanted(&self, depth: usize) -> usize {
        if self.session.is_finished() {
            return 0;
        }
        depth.saturating_sub(self.session.headline_queue.len())
    }

    /// Adds pre-drawn headlines, skipping ones already used or queued. Returns how many were kept.
    pub fn offer_headlines(&mut self, headlines: impl IntoIterator<Item = Headline>) -> usize {
        let mut kept = 0;
        for headline in headlines {
            let queued = self
                .session
                .headline_queue
                .iter()
                .any(|h| h.id == headline.id);
            if queued || self.session.used_headlines.contains(&headline.id) {
                debug!(
                    target: LOG_TARGET,
                    session_id = %self.session.id,
                    headline_id = %headline.id,
                    "skipping duplicate headline"
                );
                continue;
            }
            self.session.headline_queue.push_back(headline);
            kept += 1;
        }
        kept
    }

    fn record(&mut self, now: DateTime<Utc>, record: LedgerRecord) {
        self.records.push(LedgerEntry {
            session_id: self.session.id,
            recorded_at: now,
            record,
        });
    }

    fn require_creator(&self, by: PlayerId) -> Result<(), Rejection> {
        if by != self.session.creator {
            return Err(Rejection::NotCreator);
        }
        Ok(())
    }

    // ----- clock driven progression -----

    /// Applies every transition whose predicate holds at `now`. Empty when nothing is due.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let mut intents = Vec::new();
        for _ in 0..MAX_TRANSITIONS_PER_TICK {
            let snapshot = self.session.transition_snapshot(now);
            if !self.machine.should_leave(&snapshot) {
                break;
            }
            let from = self.session.phase;
            let target = self.machine.successor(&self.session.transition_snapshot(now));
            if let Err(err) = from.ensure_transition(target) {
                error!(
                    target: LOG_TARGET,
                    session_id = %self.session.id,
                    error = %err,
                    "refusing transition outside the edge table"
                );
                break;
            }
            intents.extend(self.exit_phase(from, now));
            // exit effects can settle the game, which changes the successor
            let target = self.machine.successor(&self.session.transition_snapshot(now));
            intents.extend(self.enter_phase(target, now));
        }
        intents
    }

    /// Moves to `target` regardless of predicates, still running exit and entry effects.
    /// Requesting the current phase is a no-op.
    pub fn force_transition(
        &mut self,
        target: Phase,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        let current = self.session.phase;
        if target == current {
            return Ok(Vec::new());
        }
        if current.is_terminal() {
            return Err(Rejection::GameOver);
        }
        let from_lobby_ok = matches!(target, Phase::RoleAssignment | Phase::GameEnd);
        if target == Phase::Lobby || (current == Phase::Lobby && !from_lobby_ok) {
            return Err(Rejection::WrongPhase(current));
        }
        if target.needs_round() && target != Phase::HeadlineReveal && self.session.round == 0 {
            return Err(Rejection::WrongPhase(current));
        }
        info!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            from = ?current,
            to = ?target,
            "forcing transition"
        );
        let mut intents = self.exit_phase(current, now);
        intents.extend(self.enter_phase(target, now));
        Ok(intents)
    }

    pub fn force_start(
        &mut self,
        by: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.require_creator(by)?;
        if self.session.phase != Phase::Lobby {
            return Err(Rejection::WrongPhase(self.session.phase));
        }
        let have = self.session.players.iter().filter(|p| p.active).count();
        let need = self.session.config.min_players;
        if have < need {
            return Err(Rejection::NotEnoughPlayers { have, need });
        }
        self.force_transition(Phase::RoleAssignment, now)
    }

    /// Creator override that skips to the natural successor of the current phase.
    pub fn advance(
        &mut self,
        by: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.require_creator(by)?;
        if self.session.phase == Phase::Lobby {
            return self.force_start(by, now);
        }
        let target = self
            .machine
            .successor(&self.session.transition_snapshot(now));
        self.force_transition(target, now)
    }

    /// Ends the game early. Repeated calls after the end are no-ops.
    pub fn end_game(
        &mut self,
        by: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.require_creator(by)?;
        self.force_transition(Phase::GameEnd, now)
    }

    // ----- lobby -----

    pub fn join(
        &mut self,
        entry: RosterEntry,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        if self.session.phase != Phase::Lobby {
            return Err(Rejection::WrongPhase(self.session.phase));
        }
        if self.session.player(entry.id).is_some() {
            return Err(Rejection::AlreadyJoined);
        }
        if self.session.players.len() >= self.session.config.max_players {
            return Err(Rejection::LobbyFull);
        }
        let player = entry.id;
        let reputation = self.session.config.starting_reputation;
        self.session.players.push(Player::new(entry, reputation));
        Ok(vec![NotificationIntent::PlayerJoined {
            player,
            player_count: self.session.players.len(),
        }])
    }

    /// Leaving the lobby drops the seat; leaving mid-game deactivates the player.
    pub fn leave(
        &mut self,
        player: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.session.active_player(player)?;
        match self.session.phase {
            Phase::Lobby => {
                if player == self.session.creator {
                    return Err(Rejection::NotCreator);
                }
                self.session.players.retain(|p| p.id != player);
                Ok(vec![NotificationIntent::PlayerLeft { player }])
            }
            Phase::GameEnd => Err(Rejection::GameOver),
            _ => Ok(self.remove_player(player, now)),
        }
    }

    fn remove_player(&mut self, player: PlayerId, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        if let Some(p) = self.session.player_mut(player) {
            p.active = false;
        }
        self.session.votes.remove(&player);
        self.session.accusations.remove(&player);
        self.session.accusations.retain(|_, accused| *accused != player);
        info!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            player,
            "player removed mid-game"
        );
        self.refresh_verdict();
        let mut intents = vec![NotificationIntent::PlayerLeft { player }];
        intents.extend(self.tick(now));
        intents
    }

    // ----- player actions -----

    /// Routes an inbound action according to the current phase.
    pub fn apply_action(
        &mut self,
        player: PlayerId,
        action: PlayerAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        let result = match action {
            PlayerAction::Vote { choice } => self.submit_vote(player, choice, now),
            PlayerAction::UseAbility { args } => self.use_ability(player, args, now),
            PlayerAction::Accuse { target } => self.accuse(player, target, now),
        };
        if let Err(rejection) = &result {
            debug!(
                target: LOG_TARGET,
                session_id = %self.session.id,
                player,
                phase = ?self.session.phase,
                reason = rejection.code(),
                "action rejected"
            );
        }
        result
    }

    /// First vote wins; later votes in the same round are rejected.
    pub fn submit_vote(
        &mut self,
        player: PlayerId,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        let phase = self.session.phase;
        if !phase.accepts_votes() {
            return Err(if phase.is_terminal() {
                Rejection::GameOver
            } else {
                Rejection::WrongPhase(phase)
            });
        }
        let weight = self.session.active_player(player)?.vote_weight();
        if self.session.votes.contains_key(&player) {
            return Err(Rejection::AlreadyVoted);
        }
        self.session.votes.insert(player, choice);
        let round = self.session.round;
        self.record(
            now,
            LedgerRecord::VoteCast {
                round,
                player,
                choice,
                weight,
            },
        );
        Ok(self.tick(now))
    }

    /// Validates actor, then role, then arguments; only then mutates.
    pub fn use_ability(
        &mut self,
        player: PlayerId,
        args: AbilityArgs,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        let phase = self.session.phase;
        let round = self.session.round;
        if phase.is_terminal() {
            return Err(Rejection::GameOver);
        }
        let actor = self.session.active_player(player)?;
        if actor.is_shadow_banned() {
            return Err(Rejection::ShadowBanned);
        }
        if actor.is_ghost() {
            return Err(Rejection::Ghost);
        }
        actor.role.check_ability(args.ability(), round, phase)?;

        let mut intents = match args {
            AbilityArgs::Peek => self.run_peek(player, now),
            AbilityArgs::Strike { target } => {
                let valid_target = self
                    .session
                    .player(target)
                    .is_some_and(|t| t.active && t.id != player);
                if !valid_target {
                    return Err(Rejection::InvalidTarget);
                }
                if !self.session.elimination_allowed() {
                    return Err(Rejection::EliminationCapReached);
                }
                self.run_strike(player, target, now)
            }
            AbilityArgs::SwapHeadline => self.run_swap(player, now),
        };
        intents.extend(self.tick(now));
        Ok(intents)
    }

    fn mark_used(&mut self, player: PlayerId, ability: Ability) {
        let round = self.session.round;
        if let Some(p) = self.session.player_mut(player) {
            p.role.record_use(ability, round);
        }
    }

    fn run_peek(&mut self, player: PlayerId, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        self.mark_used(player, Ability::Peek);
        let round = self.session.round;
        self.record(
            now,
            LedgerRecord::AbilityUsed {
                round,
                player,
                ability: Ability::Peek,
                target: None,
                succeeded: None,
            },
        );
        match &self.session.headline {
            Some(headline) => vec![NotificationIntent::TruthHint {
                player,
                round,
                is_real: headline.is_real,
                source: HintSource::Peek,
            }],
            None => Vec::new(),
        }
    }

    fn run_strike(
        &mut self,
        player: PlayerId,
        target: PlayerId,
        now: DateTime<Utc>,
    ) -> Vec<NotificationIntent> {
        self.mark_used(player, Ability::Strike);
        self.session.strike_used_this_round = true;
        let round = self.session.round;
        let hit = self
            .session
            .player(target)
            .is_some_and(|t| t.faction() == Faction::Adversaries);

        let (banned, rounds, cause) = if hit {
            self.session.eliminations += 1;
            (target, self.session.config.strike_ban_rounds, BanCause::Strike)
        } else {
            (
                player,
                self.session.config.failed_strike_ban_rounds,
                BanCause::FailedStrike,
            )
        };
        if let Some(p) = self.session.player_mut(banned) {
            p.impose_shadow_ban(rounds);
        }
        info!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            round,
            striker = player,
            target,
            hit,
            "strike resolved"
        );
        self.record(
            now,
            LedgerRecord::AbilityUsed {
                round,
                player,
                ability: Ability::Strike,
                target: Some(target),
                succeeded: Some(hit),
            },
        );
        self.refresh_verdict();
        vec![NotificationIntent::PlayerBanned {
            player: banned,
            rounds,
            cause,
        }]
    }

    fn run_swap(&mut self, player: PlayerId, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        self.mark_used(player, Ability::SwapHeadline);
        let round = self.session.round;
        self.session.votes.clear();
        self.record(
            now,
            LedgerRecord::AbilityUsed {
                round,
                player,
                ability: Ability::SwapHeadline,
                target: None,
                succeeded: None,
            },
        );
        info!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            round,
            "headline swapped; votes cleared"
        );
        self.post_headline(true)
    }

    pub fn accuse(
        &mut self,
        player: PlayerId,
        target: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        let phase = self.session.phase;
        if phase != Phase::GroupAccusationVote {
            return Err(Rejection::WrongPhase(phase));
        }
        self.session.active_player(player)?;
        let valid_target = target != player
            && self
                .session
                .player(target)
                .is_some_and(|t| t.active);
        if !valid_target {
            return Err(Rejection::InvalidTarget);
        }
        if self.session.accusations.contains_key(&player) {
            return Err(Rejection::AlreadyVoted);
        }
        self.session.accusations.insert(player, target);
        Ok(self.tick(now))
    }

    /// Gate for chat messages relayed by the transport.
    pub fn authorize_message(&self, player: PlayerId, text: &str) -> Result<(), Rejection> {
        let speaker = self.session.active_player(player)?;
        if speaker.is_ghost() {
            return Err(Rejection::Ghost);
        }
        if speaker.is_shadow_banned() {
            return Err(Rejection::ShadowBanned);
        }
        let max = self.session.config.max_message_chars;
        let len = text.trim().chars().count();
        if len == 0 || len > max {
            return Err(Rejection::MessageLength { max });
        }
        Ok(())
    }

    // ----- phase side effects -----

    fn refresh_verdict(&mut self) {
        if self.session.verdict.is_none() && self.session.phase.is_active() {
            self.session.verdict = evaluate(&self.session.standing());
            if let Some(verdict) = &self.session.verdict {
                info!(
                    target: LOG_TARGET,
                    session_id = %self.session.id,
                    winner = ?verdict.winner,
                    reason = ?verdict.reason,
                    "win condition met"
                );
            }
        }
    }

    fn exit_phase(&mut self, phase: Phase, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        match phase {
            Phase::GroupAccusationVote => self.resolve_accusations(now),
            _ => Vec::new(),
        }
    }

    fn enter_phase(&mut self, target: Phase, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let from = self.session.phase;
        self.session.phase = target;
        self.session.phase_entered_at = now;

        let mut intents = Vec::new();
        let entry = match target {
            Phase::RoleAssignment => self.assign_roles(),
            Phase::HeadlineReveal => self.open_round(),
            Phase::RoundResults => self.close_round(now),
            Phase::AbilityWindow => vec![NotificationIntent::AbilityWindowOpened {
                round: self.session.round,
                strikers: self.session.available_strikers(),
            }],
            Phase::GroupAccusationVote => {
                self.session.accusations.clear();
                Vec::new()
            }
            Phase::GameEnd => self.finish(from, now),
            Phase::Lobby | Phase::Discussion | Phase::Voting => Vec::new(),
        };

        info!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            ?from,
            to = ?target,
            round = self.session.round,
            "phase transition"
        );
        if let Err(err) = self.session.validate_invariants() {
            warn!(
                target: LOG_TARGET,
                session_id = %self.session.id,
                error = %err,
                "session invariant violated"
            );
        }

        intents.push(NotificationIntent::PhaseChanged {
            from,
            to: target,
            round: self.session.round,
            deadline_secs: self.machine.timings().limit(target).map(|d| d.as_secs()),
        });
        intents.extend(entry);
        intents
    }

    fn assign_roles(&mut self) -> Vec<NotificationIntent> {
        if self.session.roles_assigned {
            return Vec::new();
        }
        let mut blind_rng = StdRng::seed_from_u64(self.rng.gen());
        let roles = deal_roles(
            self.session.players.len(),
            self.session.config.round_cap,
            self.session.config.peek_uses,
            &mut self.rng,
            &mut blind_rng,
        );
        for (player, role) in self.session.players.iter_mut().zip(roles) {
            player.role = role;
        }
        self.session.roles_assigned = true;

        let adversaries = self.session.members_of(Faction::Adversaries);
        self.session
            .players
            .iter()
            .map(|p| {
                let kind = p.role.kind();
                let teammates = if kind == RoleKind::Adversary {
                    adversaries.iter().copied().filter(|id| *id != p.id).collect()
                } else {
                    Vec::new()
                };
                NotificationIntent::RoleAssigned {
                    player: p.id,
                    role: kind,
                    faction: kind.faction(),
                    teammates,
                }
            })
            .collect()
    }

    fn next_headline(&mut self) -> Headline {
        let difficulty = self.session.config.difficulty;
        while let Some(headline) = self.session.headline_queue.pop_front() {
            if !self.session.used_headlines.contains(&headline.id) {
                return headline;
            }
        }
        debug!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            "headline buffer empty; drawing from fallback deck"
        );
        fallback_headline(difficulty, &self.session.used_headlines, &mut self.rng)
    }

    fn post_headline(&mut self, swapped: bool) -> Vec<NotificationIntent> {
        let headline = self.next_headline();
        self.session.used_headlines.insert(headline.id);
        let round = self.session.round;

        let mut intents = vec![NotificationIntent::HeadlinePosted {
            round,
            headline: headline.public_view(),
            swapped,
        }];
        intents.extend(
            self.session
                .players
                .iter()
                .filter(|p| p.active && p.role.should_receive_truth_hint(round))
                .map(|p| NotificationIntent::TruthHint {
                    player: p.id,
                    round,
                    is_real: headline.is_real,
                    source: HintSource::RoleInsight,
                }),
        );
        self.session.headline = Some(headline);
        intents
    }

    fn open_round(&mut self) -> Vec<NotificationIntent> {
        self.session.round = (self.session.round + 1).min(self.session.config.round_cap);
        self.session.votes.clear();
        self.session.accusations.clear();
        self.session.strike_used_this_round = false;

        let mut intents = Vec::new();
        for player in self.session.players.iter_mut() {
            if player.tick_shadow_ban() {
                intents.push(NotificationIntent::BanLifted { player: player.id });
            }
        }
        intents.extend(self.post_headline(false));
        intents
    }

    fn close_round(&mut self, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let Some(headline) = self.session.headline.clone() else {
            warn!(
                target: LOG_TARGET,
                session_id = %self.session.id,
                "round closed without a headline"
            );
            return Vec::new();
        };
        let round = self.session.round;
        if self.session.history.last().map(|o| o.round) == Some(round) {
            debug!(
                target: LOG_TARGET,
                session_id = %self.session.id,
                round,
                "round already resolved"
            );
            return Vec::new();
        }
        let votes = std::mem::take(&mut self.session.votes);
        let outcome = resolve_round(round, &mut self.session.players, &votes, &headline);
        if let Some(faction) = outcome.point {
            self.session.scores.award(faction);
        }

        for vote in &outcome.votes {
            self.record(
                now,
                LedgerRecord::VoteScored {
                    round,
                    player: vote.player,
                    headline_id: headline.id,
                    choice: vote.choice,
                    weight: vote.weight,
                    is_correct: vote.is_correct,
                    reputation_before: vote.reputation_before,
                    reputation_after: vote.reputation_after,
                },
            );
        }
        for change in &outcome.changes {
            self.record(
                now,
                LedgerRecord::ReputationChanged {
                    round,
                    player: change.player,
                    before: change.before,
                    after: change.after,
                    change: change.delta(),
                    reason: change.reason,
                    headline_id: headline.id,
                    vote: change.vote,
                    headline_truth: headline.is_real,
                },
            );
        }
        self.record(
            now,
            LedgerRecord::RoundSummary {
                round,
                headline_id: headline.id,
                tally: outcome.tally,
                majority: outcome.majority,
                point: outcome.point,
            },
        );

        let mut intents = vec![NotificationIntent::RoundResolved {
            round,
            is_real: headline.is_real,
            explanation: headline.explanation.clone(),
            tally: outcome.tally,
            majority: outcome.majority,
            point: outcome.point,
            scores: self.session.scores,
            changes: outcome.changes.clone(),
        }];
        intents.extend(
            outcome
                .newly_ghosted
                .iter()
                .map(|player| NotificationIntent::PlayerGhosted { player: *player }),
        );
        self.session.history.push(outcome);
        self.refresh_verdict();
        intents
    }

    fn resolve_accusations(&mut self, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let round = self.session.round;
        let accusations = std::mem::take(&mut self.session.accusations);

        let mut weights: BTreeMap<PlayerId, u32> = BTreeMap::new();
        for (accuser, accused) in &accusations {
            let Some(weight) = self
                .session
                .player(*accuser)
                .filter(|p| p.active)
                .map(|p| p.vote_weight())
            else {
                continue;
            };
            if !self.session.player(*accused).is_some_and(|p| p.active) {
                continue;
            }
            *weights.entry(*accused).or_default() += weight;
        }

        let mut ranked: Vec<(PlayerId, u32)> = weights.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let leader = match ranked.as_slice() {
            [(first, top), rest @ ..] if rest.first().map_or(true, |(_, w)| w < top) => {
                Some(*first)
            }
            _ => None,
        };
        let target = leader.filter(|_| self.session.elimination_allowed());
        self.record(
            now,
            LedgerRecord::AccusationResolved {
                round,
                target,
                votes: ranked.clone(),
            },
        );

        let mut intents = vec![NotificationIntent::AccusationResolved {
            round,
            target,
            votes: ranked,
        }];
        if let Some(accused) = target {
            let rounds = self.session.config.accusation_ban_rounds;
            if let Some(p) = self.session.player_mut(accused) {
                p.impose_shadow_ban(rounds);
            }
            self.session.eliminations += 1;
            info!(
                target: LOG_TARGET,
                session_id = %self.session.id,
                round,
                accused,
                "group accusation succeeded"
            );
            intents.push(NotificationIntent::PlayerBanned {
                player: accused,
                rounds,
                cause: BanCause::Accusation,
            });
            self.refresh_verdict();
        }
        intents
    }

    fn finish(&mut self, from: Phase, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let outcome = match (self.session.verdict, from) {
            (Some(verdict), _) => GameOutcome::Won(verdict),
            (None, Phase::Lobby) => GameOutcome::Cancelled,
            (None, _) => GameOutcome::Aborted,
        };
        self.session.outcome = Some(outcome);
        self.session.finished_at = Some(now);
        self.session.headline_queue.clear();

        let rounds_played = self.session.history.len() as RoundNo;
        let scores = self.session.scores;
        self.record(
            now,
            LedgerRecord::GameFinished {
                outcome,
                rounds_played,
                scores,
            },
        );
        info!(
            target: LOG_TARGET,
            session_id = %self.session.id,
            ?outcome,
            rounds_played,
            "game finished"
        );

        let roles = if self.session.roles_assigned {
            self.session
                .players
                .iter()
                .map(|p| RoleReveal {
                    player: p.id,
                    role: p.role.kind(),
                    reputation: p.reputation,
                })
                .collect()
        } else {
            Vec::new()
        };
        vec![NotificationIntent::GameEnded {
            outcome,
            scores,
            roles,
        }]
    }
}
