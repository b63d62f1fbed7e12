//!
//! Record store adapter
//! --------------------
//! The engines only ever need three operations against the backing store:
//! fetch a value by key, write a value (optionally with a TTL), and read or
//! extend the membership of the index set that lists every known record key.
//! `RecordStore` captures exactly that contract; durability and replication
//! are the backing store's problem.
//!
//! Two implementations ship: `KeyDbStore` over a fred connection pool for
//! production, and `MemoryStore` for tests and storeless local runs.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the serialized record stored under `key`. A missing key is a
    /// distinct `NotFound` error, not a generic store failure.
    async fn get(&self, key: &str) -> AppResult<String>;

    /// Write `value` under `key`. `None` TTL means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// Add `member` to the set stored under `set_key`.
    async fn add_member(&self, set_key: &str, member: &str) -> AppResult<()>;

    /// All members of the set under `set_key`. A missing set is an empty
    /// membership, not an error. Iteration order is whatever the backing
    /// store yields; callers must not rely on it being stable.
    async fn members(&self, set_key: &str) -> AppResult<Vec<String>>;
}

pub mod keydb;
pub mod memory;

pub use keydb::KeyDbStore;
pub use memory::MemoryStore;
