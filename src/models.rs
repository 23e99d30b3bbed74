// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Data Models
//!
//! Core record types shared by the chain store, the assembler, the peer
//! validation protocol and the HTTP API. The persisted layout of a [`Block`]
//! is also its wire shape when it is sent to a peer for validation, so every
//! field is serialized in camelCase.
//!
//! ## Model Categories
//!
//! - **Chains**: the fixed set of evidence categories ([`ChainId`])
//! - **Blocks**: committed incident records ([`Block`], [`FileRef`])
//! - **Requests**: raw inputs to block creation ([`IncidentMetadata`], [`RawFile`])

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crypto::hash_of;

/// Placeholder previous-hash for the first block of every chain.
pub const GENESIS_SENTINEL: &str = "0512001705";

// =============================================================================
// Chains
// =============================================================================

/// Evidence category that names an independent hash chain.
///
/// The declaration order is the enumeration order used by wildcard lookups
/// and by the latest-block listing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ChainId {
    BlockPdf,
    BlockPdfAudio,
    BlockPdfVideo,
    BlockPdfAudioVideo,
}

impl ChainId {
    /// All chains, in enumeration order.
    pub const ALL: [ChainId; 4] = [
        ChainId::BlockPdf,
        ChainId::BlockPdfAudio,
        ChainId::BlockPdfVideo,
        ChainId::BlockPdfAudioVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::BlockPdf => "block_pdf",
            ChainId::BlockPdfAudio => "block_pdf_audio",
            ChainId::BlockPdfVideo => "block_pdf_video",
            ChainId::BlockPdfAudioVideo => "block_pdf_audio_video",
        }
    }

    /// Position in [`ChainId::ALL`].
    pub fn index(&self) -> usize {
        match self {
            ChainId::BlockPdf => 0,
            ChainId::BlockPdfAudio => 1,
            ChainId::BlockPdfVideo => 2,
            ChainId::BlockPdfAudioVideo => 3,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain: {0}")]
pub struct UnknownChain(pub String);

impl FromStr for ChainId {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainId::ALL
            .into_iter()
            .find(|chain| chain.as_str() == s)
            .ok_or_else(|| UnknownChain(s.to_string()))
    }
}

/// Which chains a file lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainScope {
    /// Every chain, in enumeration order.
    All,
    Chain(ChainId),
}

impl ChainScope {
    pub fn chains(&self) -> Vec<ChainId> {
        match self {
            ChainScope::All => ChainId::ALL.to_vec(),
            ChainScope::Chain(chain) => vec![*chain],
        }
    }
}

impl FromStr for ChainScope {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(ChainScope::All)
        } else {
            s.parse().map(ChainScope::Chain)
        }
    }
}

// =============================================================================
// Media Types
// =============================================================================

/// Evidence media types the ledger accepts and serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Mpeg,
    Mp4,
}

impl MediaType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "application/pdf" => Some(MediaType::Pdf),
            "audio/mpeg" => Some(MediaType::Mpeg),
            "video/mp4" => Some(MediaType::Mp4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Mpeg => "audio/mpeg",
            MediaType::Mp4 => "video/mp4",
        }
    }

    /// File extension used for stored names (the MIME subtype).
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Mpeg => "mpeg",
            MediaType::Mp4 => "mp4",
        }
    }
}

// =============================================================================
// Block Models
// =============================================================================

/// Caller-supplied description of an incident. All fields are required.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IncidentMetadata {
    pub name: String,
    pub description: String,
    pub location: String,
    pub incident_type: String,
    pub digital_signature: String,
}

impl IncidentMetadata {
    /// Names of required fields that are empty or whitespace.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("description", &self.description),
            ("location", &self.location),
            ("incidentType", &self.incident_type),
            ("digitalSignature", &self.digital_signature),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// Reference to one encrypted evidence file held by the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Random numeric identifier plus the media type's extension.
    pub file_name: String,
    /// Opaque blob store locator (URL or ID).
    pub storage_locator: String,
    /// MIME type of the plaintext.
    pub media_type: String,
}

/// A committed (or candidate) incident record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: u64,
    pub chain_id: ChainId,
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub previous_hash: String,
    pub hash: String,
    pub metadata: IncidentMetadata,
    pub files: Vec<FileRef>,
    pub origin_node: String,
    pub folder_locator: String,
}

/// Hashed view of a block: every field except `id`, `hash` and
/// `folderLocator`, in a fixed order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalBlock<'a> {
    chain_id: ChainId,
    height: u64,
    timestamp: &'a DateTime<Utc>,
    previous_hash: &'a str,
    metadata: &'a IncidentMetadata,
    files: &'a [FileRef],
    origin_node: &'a str,
}

impl Block {
    /// Canonical content bytes the block hash is computed over.
    pub fn canonical_content(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&CanonicalBlock {
            chain_id: self.chain_id,
            height: self.height,
            timestamp: &self.timestamp,
            previous_hash: &self.previous_hash,
            metadata: &self.metadata,
            files: &self.files,
            origin_node: &self.origin_node,
        })
    }

    /// Recompute the content hash from the block's current fields.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        Ok(hash_of(&self.canonical_content()?))
    }

    pub fn find_file(&self, file_name: &str) -> Option<&FileRef> {
        self.files.iter().find(|file| file.file_name == file_name)
    }
}

// =============================================================================
// Request Models
// =============================================================================

/// One uploaded evidence file before encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// Name the client sent, only used for logging.
    pub original_name: Option<String>,
    pub media_type: String,
    pub bytes: Vec<u8>,
}
