// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The node's ledger service: record creation, listing and retrieval.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;

use super::{
    validation, BlockAssembler, LedgerError, LedgerResult, PeerValidator, RetrievalResolver,
    ServedFile, ValidationVerdict, Verdict,
};
use crate::blob::BlobStore;
use crate::crypto::FileCipher;
use crate::models::{Block, ChainId, ChainScope, FileRef, IncidentMetadata, MediaType, RawFile};
use crate::storage::{ChainStore, ChainStoreError};

/// Stored file names are a random number below this bound plus the extension.
const FILE_NAME_SPACE: u64 = 1_000_000_000_000_000;

/// Ledger service shared by all request handlers.
pub struct Ledger {
    store: Arc<dyn ChainStore>,
    blobs: Arc<dyn BlobStore>,
    cipher: Arc<FileCipher>,
    assembler: BlockAssembler,
    resolver: RetrievalResolver,
    peer: Option<Arc<dyn PeerValidator>>,
    /// Parent blob folder per chain, indexed by `ChainId::index`.
    parent_folders: [String; 4],
    cleanup_rejected: bool,
    /// Held from head read through insert.
    chain_locks: [Mutex<()>; 4],
}

impl Ledger {
    pub fn new(
        store: Arc<dyn ChainStore>,
        blobs: Arc<dyn BlobStore>,
        cipher: Arc<FileCipher>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            assembler: BlockAssembler::new(store.clone(), node_id),
            resolver: RetrievalResolver::new(store.clone(), blobs.clone(), cipher.clone()),
            store,
            blobs,
            cipher,
            peer: None,
            parent_folders: ChainId::ALL.map(|chain| chain.as_str().to_string()),
            cleanup_rejected: true,
            chain_locks: Default::default(),
        }
    }

    /// Require a peer's acceptance before every commit.
    pub fn with_peer(mut self, peer: Arc<dyn PeerValidator>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_parent_folders(mut self, folders: [String; 4]) -> Self {
        self.parent_folders = folders;
        self
    }

    /// Whether uploads of uncommitted blocks are deleted again.
    pub fn with_cleanup(mut self, cleanup_rejected: bool) -> Self {
        self.cleanup_rejected = cleanup_rejected;
        self
    }

    pub fn node_id(&self) -> &str {
        self.assembler.origin_node()
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn store(&self) -> &Arc<dyn ChainStore> {
        &self.store
    }

    /// Encrypt and upload `files`, then append a block referencing them.
    pub async fn create_block(
        &self,
        chain: ChainId,
        metadata: IncidentMetadata,
        files: Vec<RawFile>,
    ) -> LedgerResult<Block> {
        let media_types = check_inputs(&metadata, &files)?;

        let folder_name = format!("{}_{}", metadata.name, Utc::now().timestamp_millis());
        let folder_id = self
            .blobs
            .create_folder(&folder_name, &self.parent_folders[chain.index()])
            .await?;

        let result = self
            .upload_and_commit(chain, metadata, files, media_types, &folder_id)
            .await;

        if let Err(e) = &result {
            tracing::warn!(chain = %chain, folder_id, error = %e, "Block not committed");
            if self.cleanup_rejected {
                if let Err(cleanup) = self.blobs.delete_folder(&folder_id).await {
                    tracing::error!(folder_id, error = %cleanup, "Failed to remove orphaned uploads");
                }
            }
        }
        result
    }

    async fn upload_and_commit(
        &self,
        chain: ChainId,
        metadata: IncidentMetadata,
        files: Vec<RawFile>,
        media_types: Vec<MediaType>,
        folder_id: &str,
    ) -> LedgerResult<Block> {
        let mut file_refs = Vec::with_capacity(files.len());
        for (file, media_type) in files.into_iter().zip(media_types) {
            let file_name = random_file_name(media_type);
            let encrypted = self.cipher.encrypt(&file.bytes)?;
            let storage_locator = self
                .blobs
                .upload(encrypted, &file_name, media_type.as_str(), folder_id)
                .await?;

            tracing::debug!(
                file_name,
                original_name = file.original_name.as_deref().unwrap_or(""),
                size = file.bytes.len(),
                "Uploaded encrypted file"
            );
            file_refs.push(FileRef {
                file_name,
                storage_locator,
                media_type: media_type.as_str().to_string(),
            });
        }

        let _guard = self.chain_locks[chain.index()].lock().await;

        let block = self.assembler.assemble(
            chain,
            metadata,
            file_refs,
            self.blobs.folder_locator(folder_id),
        )?;

        if let Some(peer) = &self.peer {
            match peer.submit(&block).await {
                Verdict::Accepted => {
                    tracing::debug!(chain = %chain, height = block.height, "Peer accepted block");
                }
                Verdict::Rejected(reason) => {
                    tracing::warn!(chain = %chain, height = block.height, reason, "Peer rejected block");
                    return Err(LedgerError::PeerRejected(reason));
                }
                Verdict::Unreachable(reason) => {
                    tracing::warn!(chain = %chain, height = block.height, reason, "Peer unreachable");
                    return Err(LedgerError::PeerUnreachable(reason));
                }
            }
        }

        self.store.insert(&block)?;

        tracing::info!(
            chain = %chain,
            height = block.height,
            hash = %block.hash,
            files = block.files.len(),
            "Block committed"
        );

        // Still under the chain lock, so the peer sees blocks in height order.
        // The local commit stands either way; a peer that missed this block
        // rejects later candidates until it is brought back in step.
        if let Some(peer) = &self.peer {
            match peer.replicate(&block).await {
                Verdict::Accepted => {
                    tracing::debug!(chain = %chain, height = block.height, "Peer stored block");
                }
                Verdict::Rejected(reason) | Verdict::Unreachable(reason) => {
                    tracing::warn!(
                        chain = %chain,
                        height = block.height,
                        reason,
                        "Peer did not store committed block"
                    );
                }
            }
        }
        Ok(block)
    }

    /// Latest block per chain authored by this node, falling back to the
    /// chain's head when this node has authored none.
    pub fn latest_per_chain(&self) -> LedgerResult<BTreeMap<ChainId, Option<Block>>> {
        let mut latest = BTreeMap::new();
        for chain in ChainId::ALL {
            let block = match self.store.find_head_by_origin(chain, self.node_id())? {
                Some(block) => Some(block),
                None => self.store.find_head(chain)?,
            };
            latest.insert(chain, block);
        }
        Ok(latest)
    }

    pub async fn get_file(&self, scope: ChainScope, file_name: &str) -> LedgerResult<ServedFile> {
        self.resolver.get_file(scope, file_name).await
    }

    /// Judge a candidate submitted by another node.
    pub fn validate_candidate(&self, block: &Block) -> LedgerResult<ValidationVerdict> {
        let verdict = validation::validate_candidate(self.store.as_ref(), block)?;
        tracing::info!(
            chain = %block.chain_id,
            height = block.height,
            origin = %block.origin_node,
            valid = verdict.valid,
            reason = verdict.reason.as_deref().unwrap_or(""),
            "Validated candidate block"
        );
        Ok(verdict)
    }

    /// Store a block another node committed after this node accepted it.
    ///
    /// Receiving the current head again is accepted, so a retried
    /// replication is harmless.
    pub fn replicate_block(&self, block: &Block) -> LedgerResult<ValidationVerdict> {
        if let Some(head) = self.store.find_head(block.chain_id)? {
            if head.hash == block.hash {
                return Ok(ValidationVerdict::accept());
            }
        }

        let mut verdict = validation::validate_candidate(self.store.as_ref(), block)?;
        if verdict.valid {
            match self.store.insert(block) {
                Ok(()) => {}
                Err(
                    e @ (ChainStoreError::HeightConflict { .. }
                    | ChainStoreError::LinkMismatch { .. }
                    | ChainStoreError::DuplicateFileName { .. }),
                ) => verdict = ValidationVerdict::reject(e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            chain = %block.chain_id,
            height = block.height,
            origin = %block.origin_node,
            stored = verdict.valid,
            reason = verdict.reason.as_deref().unwrap_or(""),
            "Replicated peer block"
        );
        Ok(verdict)
    }
}

/// Reject bad input before anything touches the blob store.
fn check_inputs(metadata: &IncidentMetadata, files: &[RawFile]) -> LedgerResult<Vec<MediaType>> {
    let missing = metadata.missing_fields();
    if !missing.is_empty() {
        return Err(LedgerError::ValidationInput(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    if files.is_empty() {
        return Err(LedgerError::ValidationInput(
            "at least one file is required".to_string(),
        ));
    }
    files
        .iter()
        .map(|file| {
            MediaType::parse(&file.media_type).ok_or_else(|| {
                LedgerError::ValidationInput(format!(
                    "unsupported media type {}",
                    file.media_type
                ))
            })
        })
        .collect()
}

fn random_file_name(media_type: MediaType) -> String {
    let id = rand::thread_rng().gen_range(0..FILE_NAME_SPACE);
    format!("{id}.{}", media_type.extension())
}
