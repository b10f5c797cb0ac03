use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::worker::{
    Lifecycle, SessionCommand, SessionHandle, SessionNotice, SessionWorker, WorkerSettings,
};
use crate::clock::SharedClock;
use crate::config::{ConfigError, CoordinatorConfig, GameConfig};
use crate::content::{BoundedHeadlineSource, SharedHeadlineSource};
use crate::engine::{
    AbilityArgs, NotificationIntent, Phase, PlayerAction, PlayerId, Rejection, RoleInfo,
    RosterEntry, Session, SessionId, VoteChoice,
};
use crate::game::game_manager::{GameManager, StatusSnapshot};
use crate::ledger::LedgerSink;
use crate::tokio_tools::spawn_named_task;

const LOG_TARGET: &str = "truth_wars::game::coordinator";
const NOTICE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("session limit of {max} reached")]
    CapacityReached { max: usize },
    #[error("session {0} already running")]
    DuplicateSession(SessionId),
}

pub struct GameCoordinatorConfig {
    pub settings: CoordinatorConfig,
    pub headlines: SharedHeadlineSource,
    pub ledger: LedgerSink,
    pub clock: SharedClock,
}

/// Registry of running sessions. Each session lives in its own worker task.
pub struct GameCoordinator {
    settings: CoordinatorConfig,
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
    headlines: BoundedHeadlineSource,
    ledger: LedgerSink,
    clock: SharedClock,
    notices: broadcast::Sender<SessionNotice>,
    shutdown: CancellationToken,
    cleanup_handle: Option<JoinHandle<()>>,
}

impl GameCoordinator {
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: GameCoordinatorConfig) -> Result<Self, CoordinatorError> {
        config.settings.require_valid()?;
        let headlines =
            BoundedHeadlineSource::new(config.headlines, config.settings.headline_timeout());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let sessions = Arc::new(DashMap::new());
        let shutdown = CancellationToken::new();
        let cleanup_handle = Self::start_cleanup_task(
            Arc::clone(&sessions),
            Arc::clone(&config.clock),
            config.settings.clone(),
            shutdown.clone(),
        );

        info!(
            target: LOG_TARGET,
            max_sessions = config.settings.max_sessions,
            tick_ms = config.settings.tick_interval_ms,
            auto_tick = config.settings.auto_tick,
            "game coordinator started"
        );

        Ok(Self {
            settings: config.settings,
            sessions,
            headlines,
            ledger: config.ledger,
            clock: config.clock,
            notices,
            shutdown,
            cleanup_handle: Some(cleanup_handle),
        })
    }

    fn start_cleanup_task(
        sessions: Arc<DashMap<SessionId, SessionHandle>>,
        clock: SharedClock,
        settings: CoordinatorConfig,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        spawn_named_task("session-cleanup", async move {
            let period = std::time::Duration::from_secs(settings.cleanup_interval_secs);
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        evict_finished(&sessions, clock.now(), &settings);
                    }
                }
            }
        })
    }

    /// Feed of every intent produced by every session.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn create_session(
        &self,
        roster: Vec<RosterEntry>,
        config: GameConfig,
    ) -> Result<SessionId, CoordinatorError> {
        self.ensure_capacity()?;
        let manager = GameManager::create(Uuid::new_v4(), roster, config, self.clock.now())?;
        Ok(self.launch(manager))
    }

    /// Resumes an exported session under its original id.
    pub fn restore_session(&self, session: Session) -> Result<SessionId, CoordinatorError> {
        if self.sessions.contains_key(&session.id) {
            return Err(CoordinatorError::DuplicateSession(session.id));
        }
        self.ensure_capacity()?;
        let manager = GameManager::restore(session)?;
        Ok(self.launch(manager))
    }

    fn ensure_capacity(&self) -> Result<(), CoordinatorError> {
        if self.sessions.len() >= self.settings.max_sessions {
            return Err(CoordinatorError::CapacityReached {
                max: self.settings.max_sessions,
            });
        }
        Ok(())
    }

    fn launch(&self, manager: GameManager) -> SessionId {
        let id = manager.id();
        let settings = WorkerSettings {
            tick_every: self
                .settings
                .auto_tick
                .then(|| self.settings.tick_interval()),
            headline_buffer: self.settings.headline_buffer,
            command_capacity: self.settings.command_capacity,
        };
        let handle = SessionWorker::spawn(
            manager,
            Arc::clone(&self.clock),
            self.headlines.clone(),
            self.ledger.clone(),
            self.notices.clone(),
            settings,
            self.shutdown.child_token(),
        );
        self.sessions.insert(id, handle);
        debug!(
            target: LOG_TARGET,
            session_id = %id,
            total_sessions = self.sessions.len(),
            "session launched"
        );
        id
    }

    fn handle(&self, id: SessionId) -> Result<SessionHandle, Rejection> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(Rejection::UnknownSession)
    }

    pub fn lifecycle(&self, id: SessionId) -> Result<Lifecycle, Rejection> {
        Ok(self.handle(id)?.lifecycle())
    }

    pub async fn submit_action(
        &self,
        id: SessionId,
        player: PlayerId,
        action: PlayerAction,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::Action {
                player,
                action,
                reply,
            })
            .await
    }

    pub async fn submit_vote(
        &self,
        id: SessionId,
        player: PlayerId,
        choice: VoteChoice,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.submit_action(id, player, PlayerAction::Vote { choice })
            .await
    }

    pub async fn use_ability(
        &self,
        id: SessionId,
        player: PlayerId,
        args: AbilityArgs,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.submit_action(id, player, PlayerAction::UseAbility { args })
            .await
    }

    pub async fn accuse(
        &self,
        id: SessionId,
        player: PlayerId,
        target: PlayerId,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.submit_action(id, player, PlayerAction::Accuse { target })
            .await
    }

    pub async fn join(
        &self,
        id: SessionId,
        entry: RosterEntry,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::Join { entry, reply })
            .await
    }

    pub async fn leave(
        &self,
        id: SessionId,
        player: PlayerId,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::Leave { player, reply })
            .await
    }

    pub async fn force_start(
        &self,
        id: SessionId,
        by: PlayerId,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::ForceStart { by, reply })
            .await
    }

    pub async fn advance(
        &self,
        id: SessionId,
        by: PlayerId,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::Advance { by, reply })
            .await
    }

    pub async fn end_game(
        &self,
        id: SessionId,
        by: PlayerId,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::EndGame { by, reply })
            .await
    }

    /// Admin override; bypasses transition predicates.
    pub async fn force_transition(
        &self,
        id: SessionId,
        target: Phase,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .act(|reply| SessionCommand::ForceTransition { target, reply })
            .await
    }

    pub async fn authorize_message(
        &self,
        id: SessionId,
        player: PlayerId,
        text: impl Into<String>,
    ) -> Result<(), Rejection> {
        let text = text.into();
        self.handle(id)?
            .request(|reply| SessionCommand::AuthorizeMessage {
                player,
                text,
                reply,
            })
            .await?
    }

    pub async fn tick(&self, id: SessionId) -> Result<Vec<NotificationIntent>, Rejection> {
        self.handle(id)?
            .request(|reply| SessionCommand::Tick { reply })
            .await
    }

    pub async fn status(&self, id: SessionId) -> Result<StatusSnapshot, Rejection> {
        self.handle(id)?
            .request(|reply| SessionCommand::Status { reply })
            .await
    }

    pub async fn role_info(
        &self,
        id: SessionId,
        player: PlayerId,
    ) -> Result<Option<RoleInfo>, Rejection> {
        self.handle(id)?
            .request(|reply| SessionCommand::RoleInfo { player, reply })
            .await
    }

    pub async fn snapshot(&self, id: SessionId) -> Result<Session, Rejection> {
        self.handle(id)?
            .request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Drops finished sessions older than the retention period.
    pub fn evict_finished(&self) -> usize {
        evict_finished(&self.sessions, self.clock.now(), &self.settings)
    }

    pub fn remove_session(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn evict_finished(
    sessions: &DashMap<SessionId, SessionHandle>,
    now: DateTime<Utc>,
    settings: &CoordinatorConfig,
) -> usize {
    let retention = chrono::Duration::from_std(settings.finished_retention())
        .unwrap_or_else(|_| chrono::Duration::zero());
    let before = sessions.len();
    sessions.retain(|id, handle| {
        let expired = handle
            .lifecycle()
            .finished_at
            .is_some_and(|at| now - at >= retention);
        if expired {
            debug!(target: LOG_TARGET, session_id = %id, "evicting finished session");
        }
        !expired
    });
    let evicted = before - sessions.len();
    if evicted > 0 {
        info!(
            target: LOG_TARGET,
            evicted,
            remaining = sessions.len(),
            "cleaned up finished sessions"
        );
    }
    evicted
}

impl Drop for GameCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.cleanup_handle.take() {
            handle.abort();
        }
    }
}
