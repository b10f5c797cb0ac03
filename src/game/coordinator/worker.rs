//! One task per session: serializes every mutation and drives the session clock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::content::BoundedHeadlineSource;
use crate::engine::{
    Headline, NotificationIntent, Phase, PlayerAction, PlayerId, Rejection, RoleInfo, RosterEntry,
    Session, SessionId,
};
use crate::game::game_manager::{GameManager, StatusSnapshot};
use crate::ledger::LedgerSink;
use crate::tokio_tools::spawn_session_task;

const LOG_TARGET: &str = "truth_wars::game::coordinator::worker";

pub type Reply<T> = oneshot::Sender<T>;
pub type ActionReply = Reply<Result<Vec<NotificationIntent>, Rejection>>;

/// Requests processed in arrival order by a session worker.
pub enum SessionCommand {
    Action {
        player: PlayerId,
        action: PlayerAction,
        reply: ActionReply,
    },
    Join {
        entry: RosterEntry,
        reply: ActionReply,
    },
    Leave {
        player: PlayerId,
        reply: ActionReply,
    },
    ForceStart {
        by: PlayerId,
        reply: ActionReply,
    },
    Advance {
        by: PlayerId,
        reply: ActionReply,
    },
    EndGame {
        by: PlayerId,
        reply: ActionReply,
    },
    ForceTransition {
        target: Phase,
        reply: ActionReply,
    },
    AuthorizeMessage {
        player: PlayerId,
        text: String,
        reply: Reply<Result<(), Rejection>>,
    },
    Tick {
        reply: Reply<Vec<NotificationIntent>>,
    },
    Status {
        reply: Reply<StatusSnapshot>,
    },
    RoleInfo {
        player: PlayerId,
        reply: Reply<Option<RoleInfo>>,
    },
    Snapshot {
        reply: Reply<Session>,
    },
    OfferHeadlines(Vec<Headline>),
}

/// An intent tagged with the session that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionNotice {
    pub session_id: SessionId,
    pub intent: NotificationIntent,
}

/// Lifecycle facts the coordinator reads without a round-trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lifecycle {
    pub phase: Phase,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Cheap, cloneable address of a running session worker.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<SessionCommand>,
    lifecycle: watch::Receiver<Lifecycle>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Sends a command and waits for the worker's answer.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, Rejection> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| Rejection::UnknownSession)?;
        rx.await.map_err(|_| Rejection::UnknownSession)
    }

    pub async fn act(
        &self,
        build: impl FnOnce(ActionReply) -> SessionCommand,
    ) -> Result<Vec<NotificationIntent>, Rejection> {
        self.request(build).await?
    }
}

pub struct WorkerSettings {
    pub tick_every: Option<Duration>,
    pub headline_buffer: usize,
    pub command_capacity: usize,
}

pub struct SessionWorker {
    manager: GameManager,
    commands: mpsc::Receiver<SessionCommand>,
    self_tx: mpsc::WeakSender<SessionCommand>,
    clock: SharedClock,
    headlines: BoundedHeadlineSource,
    ledger: LedgerSink,
    notices: broadcast::Sender<SessionNotice>,
    lifecycle: watch::Sender<Lifecycle>,
    settings: WorkerSettings,
    refill_in_flight: bool,
    /// Used-headline count when a refill last came back with nothing new.
    refill_stalled_at: Option<usize>,
    shutdown: CancellationToken,
}

impl SessionWorker {
    /// Starts the worker task and returns its handle.
    pub fn spawn(
        manager: GameManager,
        clock: SharedClock,
        headlines: BoundedHeadlineSource,
        ledger: LedgerSink,
        notices: broadcast::Sender<SessionNotice>,
        settings: WorkerSettings,
        shutdown: CancellationToken,
    ) -> SessionHandle {
        let id = manager.id();
        let (tx, commands) = mpsc::channel(settings.command_capacity.max(1));
        let (lifecycle, lifecycle_rx) = watch::channel(Lifecycle {
            phase: manager.session().phase,
            finished_at: manager.session().finished_at,
        });
        let worker = SessionWorker {
            manager,
            commands,
            self_tx: tx.downgrade(),
            clock,
            headlines,
            ledger,
            notices,
            lifecycle,
            settings,
            refill_in_flight: false,
            refill_stalled_at: None,
            shutdown,
        };
        spawn_session_task(id, worker.run());
        SessionHandle {
            id,
            tx,
            lifecycle: lifecycle_rx,
        }
    }

    async fn run(mut self) {
        let id = self.manager.id();
        info!(target: LOG_TARGET, session_id = %id, "session worker started");
        self.request_headlines();

        let period = self.settings.tick_every.unwrap_or(Duration::from_secs(3600));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let auto_tick = self.settings.tick_every.is_some();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = interval.tick(), if auto_tick => {
                    let intents = self.manager.tick(self.clock.now());
                    self.publish(&intents);
                }
            }
            self.after_step();
        }
        info!(target: LOG_TARGET, session_id = %id, "session worker stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        let now = self.clock.now();
        match command {
            SessionCommand::Action {
                player,
                action,
                reply,
            } => {
                let result = self.manager.apply_action(player, action, now);
                self.answer(reply, result);
            }
            SessionCommand::Join { entry, reply } => {
                let result = self.manager.join(entry);
                self.answer(reply, result);
            }
            SessionCommand::Leave { player, reply } => {
                let result = self.manager.leave(player, now);
                self.answer(reply, result);
            }
            SessionCommand::ForceStart { by, reply } => {
                let result = self.manager.force_start(by, now);
                self.answer(reply, result);
            }
            SessionCommand::Advance { by, reply } => {
                let result = self.manager.advance(by, now);
                self.answer(reply, result);
            }
            SessionCommand::EndGame { by, reply } => {
                let result = self.manager.end_game(by, now);
                self.answer(reply, result);
            }
            SessionCommand::ForceTransition { target, reply } => {
                let result = self.manager.force_transition(target, now);
                self.answer(reply, result);
            }
            SessionCommand::AuthorizeMessage {
                player,
                text,
                reply,
            } => {
                let _ = reply.send(self.manager.authorize_message(player, &text));
            }
            SessionCommand::Tick { reply } => {
                let intents = self.manager.tick(now);
                self.publish(&intents);
                let _ = reply.send(intents);
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.manager.status(now));
            }
            SessionCommand::RoleInfo { player, reply } => {
                let _ = reply.send(self.manager.role_info(player));
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.manager.snapshot());
            }
            SessionCommand::OfferHeadlines(headlines) => {
                self.refill_in_flight = false;
                if self.manager.offer_headlines(headlines) == 0 {
                    self.refill_stalled_at = Some(self.manager.session().used_headlines.len());
                }
            }
        }
    }

    fn answer(
        &self,
        reply: ActionReply,
        result: Result<Vec<NotificationIntent>, Rejection>,
    ) {
        if let Ok(intents) = &result {
            self.publish(intents);
        }
        if reply.send(result).is_err() {
            debug!(
                target: LOG_TARGET,
                session_id = %self.manager.id(),
                "caller went away before the reply"
            );
        }
    }

    fn publish(&self, intents: &[NotificationIntent]) {
        let session_id = self.manager.id();
        for intent in intents {
            // no subscribers is fine; the caller still gets the intents back
            let _ = self.notices.send(SessionNotice {
                session_id,
                intent: intent.clone(),
            });
        }
    }

    fn after_step(&mut self) {
        let records = self.manager.drain_records();
        if !records.is_empty() {
            if let Err(err) = self.ledger.submit(records) {
                warn!(
                    target: LOG_TARGET,
                    session_id = %self.manager.id(),
                    error = %err,
                    "dropping session records"
                );
            }
        }
        let session = self.manager.session();
        let next = Lifecycle {
            phase: session.phase,
            finished_at: session.finished_at,
        };
        self.lifecycle.send_if_modified(|current| {
            let changed = *current != next;
            *current = next;
            changed
        });
        self.request_headlines();
    }

    /// Tops up the headline buffer off the worker's critical path.
    fn request_headlines(&mut self) {
        let used = self.manager.session().used_headlines.len();
        if self.refill_in_flight || self.refill_stalled_at == Some(used) {
            return;
        }
        let wanted = self.manager.headlines_wanted(self.settings.headline_buffer);
        if wanted == 0 {
            return;
        }
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        self.refill_in_flight = true;
        let source = self.headlines.clone();
        let difficulty = self.manager.session().config.difficulty;
        tokio::spawn(async move {
            let draws = (0..wanted).map(|_| source.draw_or_fallback(difficulty));
            let headlines = join_all(draws).await;
            let _ = tx.send(SessionCommand::OfferHeadlines(headlines)).await;
        });
    }
}
