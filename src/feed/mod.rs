//! The `feed` module materializes content items for connections: a
//! deterministic walk over each topic's templates followed by randomized
//! generation that never repeats an id for the same connection.

pub mod cursor;
pub mod item;

pub use cursor::{CursorService, MAX_UNIQUE_ATTEMPTS};
pub use item::{ContentItem, IdSource, RandomHexIds};

#[cfg(test)]
mod tests;
