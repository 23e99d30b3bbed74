// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded chain database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - one table per chain (`block_pdf`, `block_pdf_audio`, ...): height → serialized Block
//! - `file_index`: composite key (chain|file_name) → height
//! - `origin_index`: composite key (chain|origin_node) → height of that node's latest block

use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};

use super::{check_extends, ChainStore, ChainStoreError, ChainStoreResult};
use crate::models::{Block, ChainId};

// =============================================================================
// Table Definitions
// =============================================================================

/// Index: `chain|file_name` → height of the block carrying the file.
const FILE_INDEX: TableDefinition<&str, u64> = TableDefinition::new("file_index");

/// Index: `chain|origin_node` → height of the latest block authored there.
const ORIGIN_INDEX: TableDefinition<&str, u64> = TableDefinition::new("origin_index");

/// Per-chain table: height → serialized Block (JSON bytes).
fn chain_table(chain: ChainId) -> TableDefinition<'static, u64, &'static [u8]> {
    TableDefinition::new(chain.as_str())
}

fn file_key(chain: ChainId, file_name: &str) -> String {
    format!("{}|{file_name}", chain.as_str())
}

fn origin_key(chain: ChainId, origin_node: &str) -> String {
    format!("{}|{origin_node}", chain.as_str())
}

// =============================================================================
// ChainDatabase
// =============================================================================

/// Durable chain store.
pub struct ChainDatabase {
    db: Database,
}

impl ChainDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> ChainStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            for chain in ChainId::ALL {
                let _ = write_txn.open_table(chain_table(chain))?;
            }
            let _ = write_txn.open_table(FILE_INDEX)?;
            let _ = write_txn.open_table(ORIGIN_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn get_block(&self, chain: ChainId, height: u64) -> ChainStoreResult<Option<Block>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(chain_table(chain))?;
        match table.get(height)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

impl ChainStore for ChainDatabase {
    fn find_head(&self, chain: ChainId) -> ChainStoreResult<Option<Block>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(chain_table(chain))?;
        let head = match table.last()? {
            Some((_, value)) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        };
        head
    }

    fn find_head_by_origin(
        &self,
        chain: ChainId,
        origin_node: &str,
    ) -> ChainStoreResult<Option<Block>> {
        let height = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(ORIGIN_INDEX)?;
            let key = origin_key(chain, origin_node);
            match index.get(key.as_str())? {
                Some(v) => v.value(),
                None => return Ok(None),
            }
        };
        self.get_block(chain, height)
    }

    fn count_records(&self, chain: ChainId) -> ChainStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(chain_table(chain))?;
        Ok(table.len()?)
    }

    fn insert(&self, block: &Block) -> ChainStoreResult<()> {
        let json = serde_json::to_vec(block)?;
        let chain = block.chain_id;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(chain_table(chain))?;

            // Read the head inside the write transaction so the check and
            // the insert are atomic.
            let head = match table.last()? {
                Some((key, value)) => {
                    let head: Block = serde_json::from_slice(value.value())?;
                    Some((key.value(), head.hash))
                }
                None => None,
            };
            check_extends(head.as_ref().map(|(h, hash)| (*h, hash.as_str())), block)?;

            let mut index = write_txn.open_table(FILE_INDEX)?;
            for file in &block.files {
                let key = file_key(chain, &file.file_name);
                if index.get(key.as_str())?.is_some() {
                    return Err(ChainStoreError::DuplicateFileName {
                        chain,
                        file_name: file.file_name.clone(),
                    });
                }
                index.insert(key.as_str(), block.height)?;
            }

            let mut origins = write_txn.open_table(ORIGIN_INDEX)?;
            let key = origin_key(chain, &block.origin_node);
            origins.insert(key.as_str(), block.height)?;

            table.insert(block.height, json.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!(
            chain = %chain,
            height = block.height,
            hash = %block.hash,
            "Block persisted"
        );
        Ok(())
    }

    fn find_by_file_name(
        &self,
        chain: ChainId,
        file_name: &str,
    ) -> ChainStoreResult<Option<Block>> {
        let height = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(FILE_INDEX)?;
            let key = file_key(chain, file_name);
            match index.get(key.as_str())? {
                Some(v) => v.value(),
                None => return Ok(None),
            }
        };
        self.get_block(chain, height)
    }

    fn health_check(&self) -> ChainStoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(FILE_INDEX)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
