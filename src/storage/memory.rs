// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory chain store.
//!
//! Used by tests. Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{check_extends, ChainStore, ChainStoreError, ChainStoreResult};
use crate::models::{Block, ChainId};

#[derive(Default)]
pub struct InMemoryChainStore {
    chains: RwLock<HashMap<ChainId, Vec<Block>>>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block without the head check (fixture loading).
    pub fn insert_unchecked(&self, block: Block) -> ChainStoreResult<()> {
        let mut chains = self.chains.write().map_err(|_| ChainStoreError::Poisoned)?;
        let blocks = chains.entry(block.chain_id).or_default();
        blocks.push(block);
        blocks.sort_by_key(|b| b.height);
        Ok(())
    }

    fn with_chain<T>(
        &self,
        chain: ChainId,
        f: impl FnOnce(&[Block]) -> T,
    ) -> ChainStoreResult<T> {
        let chains = self.chains.read().map_err(|_| ChainStoreError::Poisoned)?;
        Ok(f(chains.get(&chain).map(Vec::as_slice).unwrap_or_default()))
    }
}

impl ChainStore for InMemoryChainStore {
    fn find_head(&self, chain: ChainId) -> ChainStoreResult<Option<Block>> {
        self.with_chain(chain, |blocks| blocks.last().cloned())
    }

    fn find_head_by_origin(
        &self,
        chain: ChainId,
        origin_node: &str,
    ) -> ChainStoreResult<Option<Block>> {
        self.with_chain(chain, |blocks| {
            blocks
                .iter()
                .rev()
                .find(|b| b.origin_node == origin_node)
                .cloned()
        })
    }

    fn count_records(&self, chain: ChainId) -> ChainStoreResult<u64> {
        self.with_chain(chain, |blocks| blocks.len() as u64)
    }

    fn insert(&self, block: &Block) -> ChainStoreResult<()> {
        let mut chains = self.chains.write().map_err(|_| ChainStoreError::Poisoned)?;
        let blocks = chains.entry(block.chain_id).or_default();

        let head = blocks.last().map(|b| (b.height, b.hash.as_str()));
        check_extends(head, block)?;

        for file in &block.files {
            if blocks.iter().any(|b| b.find_file(&file.file_name).is_some()) {
                return Err(ChainStoreError::DuplicateFileName {
                    chain: block.chain_id,
                    file_name: file.file_name.clone(),
                });
            }
        }

        blocks.push(block.clone());
        Ok(())
    }

    fn find_by_file_name(
        &self,
        chain: ChainId,
        file_name: &str,
    ) -> ChainStoreResult<Option<Block>> {
        self.with_chain(chain, |blocks| {
            blocks
                .iter()
                .find(|b| b.find_file(file_name).is_some())
                .cloned()
        })
    }

    fn health_check(&self) -> ChainStoreResult<()> {
        self.chains
            .read()
            .map(|_| ())
            .map_err(|_| ChainStoreError::Poisoned)
    }
}
