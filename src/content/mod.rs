pub mod library;
pub mod source;

pub use library::{fallback_deck, fallback_headline, pick_headline, HeadlineLibrary};
pub use source::{BoundedHeadlineSource, HeadlineSource, SharedHeadlineSource};
