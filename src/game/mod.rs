//! Session drivers: the synchronous per-session manager and the async coordinator around it.

pub mod coordinator;
pub mod game_manager;

pub use coordinator::*;
pub use game_manager::*;
