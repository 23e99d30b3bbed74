// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain Store
//!
//! Durable home of committed blocks, one logical collection per [`ChainId`].
//!
//! Two backends implement [`ChainStore`]:
//!
//! - [`ChainDatabase`]: embedded redb database (pure Rust, ACID)
//! - [`InMemoryChainStore`]: process-local store for tests and ephemeral nodes
//!
//! ## Append Semantics
//!
//! `insert` is a compare-and-swap on the chain head: a block is stored only
//! if it sits exactly one above the current head and its `previousHash`
//! matches the head's hash (or the genesis sentinel on an empty chain).
//! A writer that assembled against a stale head gets
//! [`ChainStoreError::HeightConflict`] instead of forking the chain.

pub mod ledger_db;
pub mod memory;

pub use ledger_db::ChainDatabase;
pub use memory::InMemoryChainStore;

use crate::models::{Block, ChainId, GENESIS_SENTINEL};

#[derive(Debug, thiserror::Error)]
pub enum ChainStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chain {chain} moved: block height {height} does not extend head at height {head_height}")]
    HeightConflict {
        chain: ChainId,
        height: u64,
        head_height: u64,
    },

    #[error("chain {chain}: previous hash of block {height} does not match the head")]
    LinkMismatch { chain: ChainId, height: u64 },

    #[error("chain {chain} already holds a file named {file_name}")]
    DuplicateFileName { chain: ChainId, file_name: String },

    #[error("chain store lock poisoned")]
    Poisoned,
}

pub type ChainStoreResult<T> = Result<T, ChainStoreError>;

/// Keyed-collection store of committed blocks.
///
/// Every call is individually atomic. Implementations are synchronous, like
/// the redb transactions underneath them.
pub trait ChainStore: Send + Sync {
    /// Highest-height block of `chain`.
    fn find_head(&self, chain: ChainId) -> ChainStoreResult<Option<Block>>;

    /// Highest-height block of `chain` authored by `origin_node`.
    fn find_head_by_origin(
        &self,
        chain: ChainId,
        origin_node: &str,
    ) -> ChainStoreResult<Option<Block>>;

    fn count_records(&self, chain: ChainId) -> ChainStoreResult<u64>;

    /// Append `block` to its chain (compare-and-swap on the head).
    fn insert(&self, block: &Block) -> ChainStoreResult<()>;

    /// The block of `chain` that carries a file named `file_name`.
    fn find_by_file_name(&self, chain: ChainId, file_name: &str)
        -> ChainStoreResult<Option<Block>>;

    fn health_check(&self) -> ChainStoreResult<()>;
}

/// Check that `block` extends a head at `head` (`(height, hash)`).
pub(crate) fn check_extends(head: Option<(u64, &str)>, block: &Block) -> ChainStoreResult<()> {
    let (head_height, head_hash) = head.unwrap_or((0, GENESIS_SENTINEL));

    if block.height != head_height + 1 {
        return Err(ChainStoreError::HeightConflict {
            chain: block.chain_id,
            height: block.height,
            head_height,
        });
    }
    if block.previous_hash != head_hash {
        return Err(ChainStoreError::LinkMismatch {
            chain: block.chain_id,
            height: block.height,
        });
    }
    Ok(())
}
