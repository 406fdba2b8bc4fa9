//! Key/value cache used for the edge-insertion dedup window.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::CacheError;

pub mod memory;

pub use memory::MemoryCache;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether the key was present.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}
