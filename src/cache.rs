//! Price Cache - latest normalized record per source
//!
//! Last-write-wins keyed by source, with monotonic `captured_at` protection
//! against out-of-order data. The cache is the only shared mutable resource
//! in the monitor; writes are serialized behind a RwLock and readers always
//! receive clones, never references into the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::types::CacheEntry;

/// Outcome of an upsert attempt
#[derive(Debug)]
pub enum UpsertOutcome {
    /// Entry stored; carries the superseded entry, if any
    Applied { previous: Option<CacheEntry> },
    /// Incoming `captured_at` was older than the stored entry; ignored
    Stale,
}

impl UpsertOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, UpsertOutcome::Applied { .. })
    }
}

#[derive(Debug, Default)]
pub struct PriceCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    out_of_order_drops: AtomicU64,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `entry.record.source`, last-write-wins by
    /// `captured_at`. Strictly older records are dropped and counted; a
    /// retransmission with an equal timestamp re-applies identically, so the
    /// operation stays idempotent.
    pub async fn upsert(&self, entry: CacheEntry) -> UpsertOutcome {
        let mut entries = self.entries.write().await;
        let source = entry.record.source.clone();

        if let Some(existing) = entries.get(&source) {
            if entry.record.captured_at < existing.record.captured_at {
                self.out_of_order_drops.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    source = %source,
                    incoming = entry.record.captured_at,
                    stored = existing.record.captured_at,
                    "Dropping out-of-order record"
                );
                return UpsertOutcome::Stale;
            }
        }

        let previous = entries.insert(source, entry);
        UpsertOutcome::Applied { previous }
    }

    pub async fn get(&self, source: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(source).cloned()
    }

    /// All entries, sorted by source for deterministic output
    pub async fn all(&self) -> Vec<CacheEntry> {
        let mut all: Vec<CacheEntry> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.record.source.cmp(&b.record.source));
        all
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of records dropped by the monotonicity check
    pub fn out_of_order_drops(&self) -> u64 {
        self.out_of_order_drops.load(Ordering::Relaxed)
    }
}
