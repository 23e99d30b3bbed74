// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Candidate block construction.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use super::LedgerResult;
use crate::models::{Block, ChainId, FileRef, IncidentMetadata, GENESIS_SENTINEL};
use crate::storage::ChainStore;

/// Builds not-yet-persisted blocks linked to the current chain head.
///
/// Callers that intend to commit the result must hold the chain's append
/// lock from `assemble` until the insert, otherwise the head can move.
#[derive(Clone)]
pub struct BlockAssembler {
    store: Arc<dyn ChainStore>,
    origin_node: String,
}

impl BlockAssembler {
    pub fn new(store: Arc<dyn ChainStore>, origin_node: impl Into<String>) -> Self {
        Self {
            store,
            origin_node: origin_node.into(),
        }
    }

    pub fn origin_node(&self) -> &str {
        &self.origin_node
    }

    /// Assemble a block stamped with the current time (millisecond precision).
    pub fn assemble(
        &self,
        chain: ChainId,
        metadata: IncidentMetadata,
        files: Vec<FileRef>,
        folder_locator: String,
    ) -> LedgerResult<Block> {
        self.assemble_at(chain, metadata, files, folder_locator, Utc::now().trunc_subsecs(3))
    }

    pub fn assemble_at(
        &self,
        chain: ChainId,
        metadata: IncidentMetadata,
        files: Vec<FileRef>,
        folder_locator: String,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<Block> {
        let (height, previous_hash) = match self.store.find_head(chain)? {
            Some(head) => (head.height + 1, head.hash),
            None => (1, GENESIS_SENTINEL.to_string()),
        };
        let id = self.store.count_records(chain)? + 1;

        let mut block = Block {
            id,
            chain_id: chain,
            height,
            timestamp,
            previous_hash,
            hash: String::new(),
            metadata,
            files,
            origin_node: self.origin_node.clone(),
            folder_locator,
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }
}
