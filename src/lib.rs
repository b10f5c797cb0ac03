pub mod clock;
pub mod config;
pub mod content;
pub mod engine;
pub mod game;
pub mod ledger;
pub mod tokio_tools;

#[cfg(test)]
pub mod test_utils;

pub use config::{CoordinatorConfig, GameConfig};
pub use engine::{NotificationIntent, Phase, PlayerAction, Rejection, Session};
pub use game::{GameCoordinator, GameManager};
