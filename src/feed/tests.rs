use super::item::{COMMENTS_COUNT_RANGE, LIKE_COUNT_RANGE};
use super::{ContentItem, CursorService, IdSource, RandomHexIds};
use crate::catalog::{Catalog, Template};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn tech_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_templates(vec![
        Template::new("t0", "tech").with_field("content", "rust 2024 is out"),
        Template::new("t1", "tech").with_field("content", "async traits"),
        Template::new("t2", "tech").with_field("content", "borrow checker tips"),
        Template::new("s0", "sports").with_field("content", "final score"),
    ]))
}

/// Hands out `fresh` distinct ids, then repeats the last one forever.
fn ids_then_repeat(fresh: usize) -> impl IdSource {
    let counter = AtomicUsize::new(0);
    move || {
        let n = counter.fetch_add(1, Ordering::SeqCst).min(fresh - 1);
        format!("id-{n}")
    }
}

#[test]
fn test_materialize_overrides_fixed_fields() {
    let template = Template::new("t0", "tech")
        .with_field("author", "ada")
        .with_field("like_count", 7)
        .with_field("timestamp", "2001-01-01T00:00:00Z");
    let item = ContentItem::materialize(&template, "abc".to_string(), &mut rand::thread_rng());

    assert_eq!(item.id, "abc");
    assert_eq!(item.topic, "tech");
    assert_eq!(item.template_id, "t0");
    assert_eq!(item.fields.get("author"), Some(&json!("ada")));
    assert!(!item.fields.contains_key("like_count"));
    assert!(!item.fields.contains_key("timestamp"));
    assert!((LIKE_COUNT_RANGE.0..=LIKE_COUNT_RANGE.1).contains(&item.like_count));
    assert!((COMMENTS_COUNT_RANGE.0..=COMMENTS_COUNT_RANGE.1).contains(&item.comments_count));
}

#[test]
fn test_item_serializes_flat() {
    let template = Template::new("t0", "tech").with_field("author", "ada");
    let item = ContentItem::materialize(&template, "abc".to_string(), &mut rand::thread_rng());
    let value = serde_json::to_value(&item).unwrap();

    assert_eq!(value["id"], "abc");
    assert_eq!(value["author"], "ada");
    assert!(value["timestamp"].is_string());

    let back: ContentItem = serde_json::from_value(value).unwrap();
    assert_eq!(back, item);
}

#[test]
fn test_random_hex_ids_shape() {
    let id = RandomHexIds.next_id();
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_first_items_walk_templates_in_order() {
    let service = CursorService::new(tech_catalog());
    let mut ids = HashSet::new();
    for expected in ["t0", "t1", "t2"] {
        let batch = service.next_batch("c1", "tech", 1);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].template_id, expected);
        assert!(ids.insert(batch[0].id.clone()));
    }
    assert_eq!(service.cursor_position("c1", "tech"), Some(3));
}

#[test]
fn test_batch_past_pool_generates_unseen_items() {
    let service = CursorService::new(tech_catalog());
    let batch = service.next_batch("c1", "tech", 5);

    assert_eq!(batch.len(), 5);
    let sources: Vec<_> = batch[..3].iter().map(|i| i.template_id.as_str()).collect();
    assert_eq!(sources, vec!["t0", "t1", "t2"]);

    let walked: HashSet<_> = batch[..3].iter().map(|i| i.id.clone()).collect();
    for generated in &batch[3..] {
        assert!(!walked.contains(&generated.id));
        assert!(["t0", "t1", "t2"].contains(&generated.template_id.as_str()));
        assert_eq!(generated.topic, "tech");
    }
    let all: HashSet<_> = batch.iter().map(|i| i.id.clone()).collect();
    assert_eq!(all.len(), 5);
    assert_eq!(service.cursor_position("c1", "tech"), Some(5));
}

#[test]
fn test_cursors_are_independent_per_connection_and_topic() {
    let service = CursorService::new(tech_catalog());
    service.next_batch("c1", "tech", 2);

    let other = service.next_batch("c2", "tech", 1);
    assert_eq!(other[0].template_id, "t0");

    let sports = service.next_batch("c1", "sports", 1);
    assert_eq!(sports[0].template_id, "s0");
    assert_eq!(service.cursor_position("c1", "tech"), Some(2));
}

#[test]
fn test_empty_topic_returns_nothing_and_creates_no_cursor() {
    let service = CursorService::new(tech_catalog());
    assert!(service.next_batch("c1", "cooking", 5).is_empty());
    assert_eq!(service.cursor_position("c1", "cooking"), None);
}

#[test]
fn test_reset_cursor_replays_template_order() {
    let service = CursorService::new(tech_catalog());
    let first: Vec<_> = service
        .next_batch("c1", "tech", 4)
        .into_iter()
        .map(|i| i.template_id)
        .collect();

    service.reset_cursor("c1", "tech");
    assert_eq!(service.cursor_position("c1", "tech"), Some(0));

    let replay: Vec<_> = service
        .next_batch("c1", "tech", 3)
        .into_iter()
        .map(|i| i.template_id)
        .collect();
    assert_eq!(replay, first[..3]);
}

#[test]
fn test_reset_unknown_cursor_is_noop() {
    let service = CursorService::new(tech_catalog());
    service.reset_cursor("nobody", "tech");
    assert_eq!(service.cursor_position("nobody", "tech"), None);
}

#[test]
fn test_exhausted_id_space_yields_short_batch() {
    // Three fresh ids cover the walk; every later id collides.
    let service = CursorService::with_id_source(tech_catalog(), ids_then_repeat(3));
    let batch = service.next_batch("c1", "tech", 5);

    assert_eq!(batch.len(), 3);
    assert_eq!(service.cursor_position("c1", "tech"), Some(3));
}

#[test]
fn test_generation_recovers_after_collisions() {
    let calls = AtomicUsize::new(0);
    // Walk uses a, b, c. Generation then sees a, a, a before a fresh d.
    let service = CursorService::with_id_source(tech_catalog(), move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        match n {
            0 => "a".to_string(),
            1 => "b".to_string(),
            2 => "c".to_string(),
            3..=5 => "a".to_string(),
            _ => format!("fresh-{n}"),
        }
    });

    let batch = service.next_batch("c1", "tech", 4);
    assert_eq!(batch.len(), 4);
    assert_eq!(batch[3].id, "fresh-6");
}

#[test]
fn test_forget_connection_drops_only_its_cursors() {
    let service = CursorService::new(tech_catalog());
    service.next_batch("c1", "tech", 1);
    service.next_batch("c1", "sports", 1);
    service.next_batch("c2", "tech", 1);

    service.forget_connection("c1");
    assert_eq!(service.cursor_position("c1", "tech"), None);
    assert_eq!(service.cursor_position("c1", "sports"), None);
    assert_eq!(service.cursor_position("c2", "tech"), Some(1));
}

#[test]
fn test_count_templates_and_topics() {
    let service = CursorService::new(tech_catalog());
    assert_eq!(service.count_templates("tech"), 3);
    assert_eq!(service.count_templates("cooking"), 0);
    assert_eq!(service.topics(), vec!["sports", "tech"]);
}

#[test]
fn test_concurrent_batches_on_one_key_never_repeat() {
    let service = Arc::new(CursorService::new(tech_catalog()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || service.next_batch("c1", "tech", 25))
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for item in handle.join().unwrap() {
            assert!(ids.insert(item.id));
        }
    }

    assert_eq!(ids.len(), 100);
    assert_eq!(service.cursor_position("c1", "tech"), Some(100));
}
