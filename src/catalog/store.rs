//! Template catalog
//!
//! The catalog is loaded once at startup and never mutated afterwards, so it
//! is shared between the cursor service and request handlers without locking.
//! Loading failures degrade to an empty catalog: the server still starts and
//! every topic simply has no content.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::catalog::template::Template;
use crate::utils::{FeedError, Result};

/// Read-only lookup of templates by topic.
pub trait TemplateStore: Send + Sync {
    /// Templates for `topic` in catalog order. Unknown topics yield an empty slice.
    fn templates_for(&self, topic: &str) -> &[Template];

    /// Every topic with at least one template, sorted.
    fn topics(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    by_topic: BTreeMap<String, Vec<Template>>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Groups templates by topic, keeping their relative order.
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut by_topic: BTreeMap<String, Vec<Template>> = BTreeMap::new();
        for template in templates {
            by_topic
                .entry(template.topic.clone())
                .or_default()
                .push(template);
        }
        Self { by_topic }
    }

    /// Reads a JSON array of templates from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| FeedError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        let templates: Vec<Template> =
            serde_json::from_str(&raw).map_err(|source| FeedError::CatalogFormat {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_templates(templates))
    }

    /// Like [`Catalog::load`], but a missing or corrupt file yields an empty catalog.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(catalog) => {
                info!(
                    templates = catalog.len(),
                    topics = catalog.by_topic.len(),
                    "loaded template catalog"
                );
                catalog
            }
            Err(e) => {
                error!("{e}; continuing with an empty catalog");
                Self::empty()
            }
        }
    }

    /// Total number of templates across all topics.
    pub fn len(&self) -> usize {
        self.by_topic.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_topic.is_empty()
    }
}

impl TemplateStore for Catalog {
    fn templates_for(&self, topic: &str) -> &[Template] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    fn topics(&self) -> Vec<String> {
        self.by_topic.keys().cloned().collect()
    }
}
