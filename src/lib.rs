// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Incident Ledger - Hash-Linked Evidence Ledger Node
//!
//! Each node appends incident records to four named hash chains. Evidence
//! files are encrypted under a node-wide key and kept in an external blob
//! store; blocks only reference them. A second node can be required to
//! co-validate every block before it is committed.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blob` - Blob storage backends (Google Drive, local filesystem)
//! - `crypto` - File encryption and block hashing
//! - `ledger` - Block assembly, peer validation and retrieval
//! - `storage` - Chain store (redb, in-memory)

pub mod api;
pub mod blob;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod models;
pub mod state;
pub mod storage;
