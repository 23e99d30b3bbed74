// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cross-node block validation.
//!
//! ## Protocol
//!
//! The authoring node POSTs the full candidate [`Block`] as JSON to
//! `{peer}/validate-block`. The peer answers `{"valid": bool, "reason": ...}`.
//!
//! ## Verdicts
//!
//! - `valid: true` → [`Verdict::Accepted`]
//! - `valid: false` → [`Verdict::Rejected`]
//! - network error, timeout, non-2xx, unparsable body → [`Verdict::Unreachable`]
//!
//! There is no retry. The request is cancelled when the timeout elapses.
//!
//! ## Replication
//!
//! Once the authoring node has committed an accepted block, it POSTs the
//! same block to `{peer}/commit-block`. The peer appends it to its own store
//! through the usual compare-and-swap and answers with the same verdict body.
//! This keeps the peer's head in step so it can judge the next candidate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::LedgerResult;
use crate::models::{Block, MediaType, GENESIS_SENTINEL};
use crate::storage::ChainStore;

/// Default bound on the peer round trip.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of submitting a candidate to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(String),
    Unreachable(String),
}

/// Wire body of a peer's answer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationVerdict {
    pub fn accept() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Something that can co-validate a candidate block.
#[async_trait]
pub trait PeerValidator: Send + Sync {
    /// Ask the peer to judge a candidate before it is committed.
    async fn submit(&self, block: &Block) -> Verdict;

    /// Hand a block this node has committed to the peer's store.
    async fn replicate(&self, block: &Block) -> Verdict;
}

/// Peer validator speaking the HTTP protocol above.
#[derive(Debug, Clone)]
pub struct HttpPeerValidator {
    endpoint: String,
    commit_endpoint: String,
    http: Client,
}

impl HttpPeerValidator {
    /// `peer_url` is the peer's base URL, e.g. `http://node-b:3002`.
    pub fn new(peer_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        let base = peer_url.trim_end_matches('/');
        Ok(Self {
            endpoint: format!("{base}/validate-block"),
            commit_endpoint: format!("{base}/commit-block"),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn commit_endpoint(&self) -> &str {
        &self.commit_endpoint
    }

    async fn post_block(&self, url: &str, block: &Block, action: &str) -> Verdict {
        let response = match self.http.post(url).json(block).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("peer {action} timed out")
                } else {
                    format!("peer request failed: {e}")
                };
                return Verdict::Unreachable(reason);
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Verdict::Unreachable(format!("peer answered HTTP {status}"));
        }

        match response.json::<ValidationVerdict>().await {
            Ok(ValidationVerdict { valid: true, .. }) => Verdict::Accepted,
            Ok(ValidationVerdict { reason, .. }) => {
                Verdict::Rejected(reason.unwrap_or_else(|| "no reason given".to_string()))
            }
            Err(e) => Verdict::Unreachable(format!("invalid peer response: {e}")),
        }
    }
}

#[async_trait]
impl PeerValidator for HttpPeerValidator {
    async fn submit(&self, block: &Block) -> Verdict {
        self.post_block(&self.endpoint, block, "validation").await
    }

    async fn replicate(&self, block: &Block) -> Verdict {
        self.post_block(&self.commit_endpoint, block, "replication").await
    }
}

/// Peer-side check of a candidate against this node's view of the chain.
pub fn validate_candidate(store: &dyn ChainStore, block: &Block) -> LedgerResult<ValidationVerdict> {
    if block.compute_hash()? != block.hash {
        return Ok(ValidationVerdict::reject("hash does not match block content"));
    }

    let missing = block.metadata.missing_fields();
    if !missing.is_empty() {
        return Ok(ValidationVerdict::reject(format!(
            "missing metadata: {}",
            missing.join(", ")
        )));
    }

    if block.files.is_empty() {
        return Ok(ValidationVerdict::reject("block has no files"));
    }
    if let Some(file) = block
        .files
        .iter()
        .find(|f| MediaType::parse(&f.media_type).is_none())
    {
        return Ok(ValidationVerdict::reject(format!(
            "unsupported media type {}",
            file.media_type
        )));
    }

    let (head_height, head_hash) = match store.find_head(block.chain_id)? {
        Some(head) => (head.height, head.hash),
        None => (0, GENESIS_SENTINEL.to_string()),
    };
    if block.height != head_height + 1 {
        return Ok(ValidationVerdict::reject(format!(
            "height {} does not extend head at {head_height}",
            block.height
        )));
    }
    if block.previous_hash != head_hash {
        return Ok(ValidationVerdict::reject("previous hash does not match chain head"));
    }

    Ok(ValidationVerdict::accept())
}
