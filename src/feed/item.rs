use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Template;

/// Inclusive range for the randomized like counter.
pub const LIKE_COUNT_RANGE: (u32, u32) = (10, 500);
/// Inclusive range for the randomized comment counter.
pub const COMMENTS_COUNT_RANGE: (u32, u32) = (0, 100);

/// Field names an item always sets itself; template values under these keys are dropped.
const RESERVED_FIELDS: [&str; 6] = [
    "id",
    "topic",
    "template_id",
    "timestamp",
    "like_count",
    "comments_count",
];

/// A connection-specific instance of a template.
///
/// Serialized flat: the template's body fields sit next to the fixed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub topic: String,
    pub template_id: String,
    pub timestamp: DateTime<Utc>,
    pub like_count: u32,
    pub comments_count: u32,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentItem {
    /// Copies `template` and overrides the id, timestamp and engagement counters.
    pub fn materialize<R: Rng + ?Sized>(template: &Template, id: String, rng: &mut R) -> Self {
        let mut fields = template.fields.clone();
        for key in RESERVED_FIELDS {
            fields.remove(key);
        }

        Self {
            id,
            topic: template.topic.clone(),
            template_id: template.id.clone(),
            timestamp: Utc::now(),
            like_count: rng.gen_range(LIKE_COUNT_RANGE.0..=LIKE_COUNT_RANGE.1),
            comments_count: rng.gen_range(COMMENTS_COUNT_RANGE.0..=COMMENTS_COUNT_RANGE.1),
            fields,
        }
    }
}

/// Source of fresh item ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

impl<F> IdSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// 12 lowercase hex characters drawn from 48 random bits.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomHexIds;

impl IdSource for RandomHexIds {
    fn next_id(&self) -> String {
        let bits: u64 = rand::thread_rng().r#gen::<u64>() & 0xffff_ffff_ffff;
        format!("{bits:012x}")
    }
}
