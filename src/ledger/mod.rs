// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Pipeline
//!
//! Block assembly, cross-node validation and retrieval.
//!
//! ## Record Creation
//!
//! 1. Inputs are checked before any side effect.
//! 2. Each file is encrypted and uploaded into a fresh blob folder.
//! 3. Under the chain's append lock, the [`BlockAssembler`] links the block
//!    to the current head and hashes it.
//! 4. In the multi-node variant a [`PeerValidator`] must accept the block.
//! 5. The chain store commits it (compare-and-swap on the head).
//! 6. The peer receives the committed block so its head stays in step.
//!
//! Any failure after the folder exists removes the folder again unless
//! cleanup is disabled.

pub mod assembler;
pub mod retrieval;
pub mod service;
pub mod validation;

pub use assembler::BlockAssembler;
pub use retrieval::{RetrievalResolver, ServedFile};
pub use service::Ledger;
pub use validation::{HttpPeerValidator, PeerValidator, ValidationVerdict, Verdict};

use crate::blob::StorageError;
use crate::crypto::CryptoError;
use crate::storage::ChainStoreError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    ValidationInput(String),

    #[error("blob storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    #[error("chain store failure: {0}")]
    Store(#[from] ChainStoreError),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("peer rejected block: {0}")]
    PeerRejected(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
