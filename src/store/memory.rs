//! In-process record store with per-entry TTL. Used by the test suite and
//! for local runs without a KeyDB instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{AppError, AppResult};

use super::RecordStore;

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// Map-backed store. Sets preserve insertion order, which keeps scan-order
/// assertions in tests deterministic; the trait itself promises no order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<RwLock<HashMap<String, Entry>>>,
    sets: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<String> {
        // Expired entries are reaped lazily on access.
        let mut map = self.map.write();
        match map.get(key) {
            Some(entry) if entry.expired() => {
                map.remove(key);
                Err(AppError::not_found("not_found", format!("key '{key}' not present")))
            }
            Some(entry) => Ok(entry.value.clone()),
            None => Err(AppError::not_found("not_found", format!("key '{key}' not present"))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.map.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn add_member(&self, set_key: &str, member: &str) -> AppResult<()> {
        let mut sets = self.sets.write();
        let set = sets.entry(set_key.to_string()).or_default();
        if !set.iter().any(|m| m == member) {
            set.push(member.to_string());
        }
        Ok(())
    }

    async fn members(&self, set_key: &str) -> AppResult<Vec<String>> {
        Ok(self.sets.read().get(set_key).cloned().unwrap_or_default())
    }
}
