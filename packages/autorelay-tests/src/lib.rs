//! Shared fixtures for the `autorelay` integration tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Once;

use async_trait::async_trait;
use autorelay::{
    paging::FetchWindow,
    resolve::{FetchPage, StoreAdapter},
};
use serde_json::{json, Value};

/// Install the tracing subscriber once for the whole test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory store adapter over named relations of JSON rows.
///
/// Rows carrying an `ownerId` are filtered against the owning entity's `id`
/// when one is supplied, mimicking a related-rows fetch.
#[derive(Default)]
pub struct MemoryStore {
    relations: HashMap<String, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relation(mut self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.relations.insert(name.into(), rows);
        self
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn fetch_related(
        &self,
        owner: Option<&Value>,
        relation: &str,
        window: &FetchWindow,
        order: Option<&str>,
    ) -> anyhow::Result<FetchPage> {
        let rows = self
            .relations
            .get(relation)
            .ok_or_else(|| anyhow::anyhow!("unknown relation: {relation}"))?;

        let mut rows: Vec<Value> = rows.to_vec();
        if let Some(owner_id) = owner.and_then(|o| o.get("id")) {
            rows.retain(|row| row.get("ownerId").map_or(true, |id| id == owner_id));
        }
        if let Some(order) = order {
            rows.sort_by(|a, b| json_cmp(a.get(order), b.get(order)));
        }

        let total_count = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();
        Ok(FetchPage { items, total_count })
    }
}

fn json_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Five books, titles already in their id order.
pub fn book_rows() -> Vec<Value> {
    [
        "A Canticle for Leibowitz",
        "Blindsight",
        "Diaspora",
        "Solaris",
        "The Dispossessed",
    ]
    .iter()
    .enumerate()
    .map(|(id, title)| json!({ "id": id, "title": title }))
    .collect()
}

/// Club membership rows as a store would return them from a join: the
/// member's own columns plus the association's metadata.
pub fn membership_rows() -> Vec<Value> {
    vec![
        json!({ "id": 10, "ownerId": 1, "name": "ada", "role": "owner" }),
        json!({ "id": 11, "ownerId": 1, "name": "grace", "role": "guest" }),
        json!({ "id": 12, "ownerId": 2, "name": "edsger", "role": "owner" }),
    ]
}
