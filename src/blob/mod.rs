// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Blob Relay
//!
//! Moves already-encrypted evidence bytes to and from an object store and
//! hands back stable locators.
//!
//! ## Backends
//!
//! - [`DriveBlobStore`]: Google Drive v3 (folders per block, public-read grants)
//! - [`LocalBlobStore`]: directories on the local filesystem
//!
//! Both treat a partially successful upload (object stored, grant failed) as
//! a failed upload and remove the object again.

pub mod drive;
pub mod local;

pub use drive::{DriveBlobStore, DriveCredentials};
pub use local::LocalBlobStore;

use async_trait::async_trait;

/// Error type for blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("blob provider authentication failed: {0}")]
    Auth(String),

    #[error("blob provider request failed: {0}")]
    Request(String),

    #[error("blob provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("public read grant failed for {file_name}: {reason}")]
    PermissionGrant { file_name: String, reason: String },

    #[error("blob provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Result type for blob store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// External object store organised into named folders.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create a folder grouping one block's files under `parent_id`.
    async fn create_folder(&self, name: &str, parent_id: &str) -> StorageResult<String>;

    /// Upload encrypted bytes, grant public read, return the retrieval locator.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        media_type: &str,
        folder_id: &str,
    ) -> StorageResult<String>;

    /// Fetch the raw (still encrypted) bytes behind a locator.
    async fn download(&self, locator: &str) -> StorageResult<Vec<u8>>;

    /// Remove a folder and everything uploaded into it.
    async fn delete_folder(&self, folder_id: &str) -> StorageResult<()>;

    /// Display locator stored in `Block::folder_locator`.
    fn folder_locator(&self, folder_id: &str) -> String;
}
