use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::engine::types::SessionId;

/// Spawn a Tokio task inside a span named after the task.
pub fn spawn_named_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name_owned = name.into();
    let span = tracing::info_span!("task", task_name = %name_owned);
    tokio::spawn(future.instrument(span))
}

/// Spawn the worker of one session so every log line carries its id.
pub fn spawn_session_task<F>(session_id: SessionId, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let span = tracing::info_span!("session", %session_id);
    tokio::spawn(future.instrument(span))
}
