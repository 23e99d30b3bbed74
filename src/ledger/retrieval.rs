// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File lookup across chains and decryption of stored evidence.

use std::sync::Arc;

use super::{LedgerError, LedgerResult};
use crate::blob::BlobStore;
use crate::crypto::FileCipher;
use crate::models::{Block, ChainScope, FileRef, MediaType};
use crate::storage::ChainStore;

/// Decrypted evidence ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    pub file_name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

/// Read-only view over committed blocks and their blobs.
#[derive(Clone)]
pub struct RetrievalResolver {
    store: Arc<dyn ChainStore>,
    blobs: Arc<dyn BlobStore>,
    cipher: Arc<FileCipher>,
}

impl RetrievalResolver {
    pub fn new(
        store: Arc<dyn ChainStore>,
        blobs: Arc<dyn BlobStore>,
        cipher: Arc<FileCipher>,
    ) -> Self {
        Self {
            store,
            blobs,
            cipher,
        }
    }

    /// Find the block holding `file_name`. The first chain in scope order
    /// that has it wins.
    pub fn locate(&self, scope: ChainScope, file_name: &str) -> LedgerResult<(Block, FileRef)> {
        for chain in scope.chains() {
            if let Some(block) = self.store.find_by_file_name(chain, file_name)? {
                if let Some(file) = block.find_file(file_name).cloned() {
                    return Ok((block, file));
                }
            }
        }
        Err(LedgerError::NotFound(format!("file {file_name}")))
    }

    /// Download and decrypt a file.
    pub async fn resolve_content(&self, file: &FileRef) -> LedgerResult<(Vec<u8>, MediaType)> {
        let media_type = MediaType::parse(&file.media_type)
            .ok_or_else(|| LedgerError::UnsupportedMediaType(file.media_type.clone()))?;

        let encrypted = self.blobs.download(&file.storage_locator).await?;
        let bytes = self.cipher.decrypt(&encrypted)?;
        Ok((bytes, media_type))
    }

    pub async fn get_file(&self, scope: ChainScope, file_name: &str) -> LedgerResult<ServedFile> {
        let (block, file) = self.locate(scope, file_name)?;
        let (bytes, media_type) = self.resolve_content(&file).await?;

        tracing::info!(
            chain = %block.chain_id,
            height = block.height,
            file_name,
            size = bytes.len(),
            "Serving decrypted file"
        );

        Ok(ServedFile {
            file_name: file.file_name,
            media_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::LocalBlobStore;
    use crate::models::{fixtures, ChainId, GENESIS_SENTINEL};
    use crate::storage::InMemoryChainStore;

    struct Fixture {
        resolver: RetrievalResolver,
        store: Arc<InMemoryChainStore>,
        blobs: Arc<LocalBlobStore>,
        cipher: Arc<FileCipher>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryChainStore::new());
        let blobs = Arc::new(LocalBlobStore::new(dir.path()).unwrap());
        let cipher = Arc::new(FileCipher::new([3u8; 32]));
        Fixture {
            resolver: RetrievalResolver::new(store.clone(), blobs.clone(), cipher.clone()),
            store,
            blobs,
            cipher,
            _dir: dir,
        }
    }

    /// Store `plaintext` encrypted and commit a block referencing it.
    async fn commit_file(
        f: &Fixture,
        chain: ChainId,
        file_name: &str,
        media_type: &str,
        plaintext: &[u8],
    ) -> Block {
        let folder = f.blobs.create_folder("case", chain.as_str()).await.unwrap();
        let locator = f
            .blobs
            .upload(f.cipher.encrypt(plaintext).unwrap(), file_name, media_type, &folder)
            .await
            .unwrap();

        let mut block = fixtures::block(chain, 1, GENESIS_SENTINEL, file_name);
        block.files[0].storage_locator = locator;
        block.files[0].media_type = media_type.to_string();
        block.hash = block.compute_hash().unwrap();
        f.store.insert_unchecked(block.clone()).unwrap();
        block
    }

    #[tokio::test]
    async fn wildcard_scope_finds_file_in_any_chain() {
        let f = fixture();
        commit_file(&f, ChainId::BlockPdfAudio, "55.mpeg", "audio/mpeg", b"recording").await;

        let served = f.resolver.get_file(ChainScope::All, "55.mpeg").await.unwrap();
        assert_eq!(served.bytes, b"recording");
        assert_eq!(served.media_type, MediaType::Mpeg);
        assert_eq!(served.file_name, "55.mpeg");
    }

    #[tokio::test]
    async fn single_chain_scope_does_not_search_others() {
        let f = fixture();
        commit_file(&f, ChainId::BlockPdfAudio, "55.mpeg", "audio/mpeg", b"recording").await;

        let result = f
            .resolver
            .get_file(ChainScope::Chain(ChainId::BlockPdf), "55.mpeg")
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn first_chain_in_enumeration_order_wins() {
        let f = fixture();
        commit_file(&f, ChainId::BlockPdfVideo, "7.pdf", "application/pdf", b"video chain").await;
        commit_file(&f, ChainId::BlockPdfAudio, "7.pdf", "application/pdf", b"audio chain").await;

        let (block, _) = f.resolver.locate(ChainScope::All, "7.pdf").unwrap();
        assert_eq!(block.chain_id, ChainId::BlockPdfAudio);
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let f = fixture();
        let result = f.resolver.get_file(ChainScope::All, "nope.pdf").await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn unsupported_media_type_is_refused() {
        let f = fixture();
        commit_file(&f, ChainId::BlockPdf, "1.png", "image/png", b"pixels").await;

        let result = f.resolver.get_file(ChainScope::All, "1.png").await;
        assert!(matches!(result, Err(LedgerError::UnsupportedMediaType(t)) if t == "image/png"));
    }

    #[tokio::test]
    async fn foreign_ciphertext_is_a_crypto_error() {
        let f = fixture();
        let block = commit_file(&f, ChainId::BlockPdf, "1.pdf", "application/pdf", b"x").await;

        let other = RetrievalResolver::new(
            f.store.clone(),
            f.blobs.clone(),
            Arc::new(FileCipher::new([4u8; 32])),
        );
        let result = other.resolve_content(&block.files[0]).await;
        assert!(matches!(result, Err(LedgerError::Crypto(_))));
    }
}
