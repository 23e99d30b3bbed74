// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem blob store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//!   {parent}/                # one per chain (configured parent folder)
//!     {folder}/              # one per block
//!       {file_name}          # encrypted evidence
//! ```
//!
//! Locators have the form `local://{parent}/{folder}/{file_name}`. Every path
//! component is sanitised so caller-supplied names cannot escape the root.
//! There is no access control layer, so the public-read grant is implicit.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::{BlobStore, StorageError, StorageResult};

const LOCATOR_SCHEME: &str = "local://";

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create the store, creating `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory for all blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a `/`-separated relative id under the root.
    fn resolve(&self, relative: &str) -> StorageResult<PathBuf> {
        let mut path = self.root.clone();
        for component in relative.split('/') {
            check_component(component)?;
            path.push(component);
        }
        Ok(path)
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn check_component(component: &str) -> StorageResult<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || sanitize_component(component) != component
    {
        return Err(StorageError::InvalidName(component.to_string()));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create_folder(&self, name: &str, parent_id: &str) -> StorageResult<String> {
        let folder = sanitize_component(name);
        check_component(&folder)?;
        fs::create_dir_all(self.resolve(parent_id)?)?;

        // Folder names only carry millisecond precision, so two creations
        // can ask for the same one. Each caller must own its folder because
        // cleanup deletes it wholesale.
        let folder_id = format!("{parent_id}/{folder}");
        match fs::create_dir(self.resolve(&folder_id)?) {
            Ok(()) => Ok(folder_id),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let folder_id = format!("{parent_id}/{folder}_{}", Uuid::new_v4().simple());
                fs::create_dir(self.resolve(&folder_id)?)?;
                Ok(folder_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        _media_type: &str,
        folder_id: &str,
    ) -> StorageResult<String> {
        check_component(file_name)?;
        let relative = format!("{folder_id}/{file_name}");
        let path = self.resolve(&relative)?;

        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                return Err(StorageError::NotFound(format!("folder {folder_id}")));
            }
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, &path)?;

        Ok(format!("{LOCATOR_SCHEME}{relative}"))
    }

    async fn download(&self, locator: &str) -> StorageResult<Vec<u8>> {
        let relative = locator
            .strip_prefix(LOCATOR_SCHEME)
            .ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))?;
        let path = self
            .resolve(relative)
            .map_err(|_| StorageError::InvalidLocator(locator.to_string()))?;

        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_folder(&self, folder_id: &str) -> StorageResult<()> {
        let path = self.resolve(folder_id)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn folder_locator(&self, folder_id: &str) -> String {
        format!("{LOCATOR_SCHEME}{folder_id}")
    }
}
