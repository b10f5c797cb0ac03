pub mod actions;
pub mod errors;
pub mod events;
pub mod phases;
pub mod resolution;
pub mod roles;
pub mod rules;
pub mod state;
pub mod types;

pub use actions::*;
pub use errors::*;
pub use events::*;
pub use phases::*;
pub use resolution::*;
pub use roles::*;
pub use rules::*;
pub use state::*;
pub use types::*;

#[cfg(test)]
mod tests;
