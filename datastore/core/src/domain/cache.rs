// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cache Contract
//!
//! Key/value cache consumed by the datastore's cached queries. Concrete
//! backends (Redis, in-process) live with the host application.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation failed: {0}")]
    Operation(String),
}

/// String-keyed cache; a `None` TTL means no expiry
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// `Ok(None)` on a miss
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Expire `key` immediately
    async fn expire(&self, key: &str) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set_bytes(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Drop every key in the cache namespace
    async fn flush_db(&self) -> Result<(), CacheError>;
}
