pub mod manager;
pub mod worker;


pub use manager::{CoordinatorError, GameCoordinator, GameCoordinatorConfig};
pub use worker::{Lifecycle, SessionCommand, SessionHandle, SessionNotice, SessionWorker};
