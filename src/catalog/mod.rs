//! The `catalog` module holds the immutable seed content every feed is
//! derived from: `Template` records grouped by topic.

pub mod store;
pub mod template;

pub use store::{Catalog, TemplateStore};
pub use template::Template;
