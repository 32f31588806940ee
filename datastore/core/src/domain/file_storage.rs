// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File Storage Contract
//!
//! Provides abstraction over the upload store (bucket, local disk) so the
//! datastore can hand it to request handlers without knowing the backend.

use async_trait::async_trait;
use thiserror::Error;

/// A stored file as returned by [`FileStorage::open_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// File contents
    pub bytes: Vec<u8>,
    /// Backend identifier (may differ from the requested identifier)
    pub file_id: String,
    /// Public URL
    pub url: String,
}

/// Identifier and URL of a newly saved file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub file_id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Upload storage used by request handlers
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Read a file by identifier
    async fn open_file(&self, file_identifier: &str) -> Result<StoredFile, StorageError>;

    /// Public URL for an identifier; does not check existence
    fn get_url(&self, file_identifier: &str) -> String;

    /// Save a file
    ///
    /// # Arguments
    /// * `file_identifier` - Requested identifier or path
    /// * `bytes` - File contents
    /// * `sanitize_path` - Normalize the identifier into a safe path first
    async fn save_file(
        &self,
        file_identifier: &str,
        bytes: Vec<u8>,
        sanitize_path: bool,
    ) -> Result<SavedFile, StorageError>;
}
