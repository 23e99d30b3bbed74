// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{error::ApiError, ledger::ValidationVerdict, models::Block, state::AppState};

/// Peer side of cross-node validation: judge a candidate another node
/// wants to commit.
#[utoipa::path(
    post,
    path = "/validate-block",
    request_body = Block,
    tag = "Validation",
    responses(
        (status = 200, description = "Verdict on the candidate", body = ValidationVerdict),
        (status = 500, body = crate::error::ErrorBody)
    )
)]
pub async fn validate_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<Json<ValidationVerdict>, ApiError> {
    Ok(Json(state.ledger.validate_candidate(&block)?))
}

/// Peer side of replication: append a block another node has committed
/// after this node accepted it.
#[utoipa::path(
    post,
    path = "/commit-block",
    request_body = Block,
    tag = "Validation",
    responses(
        (status = 200, description = "`valid` tells whether the block is now part of this node's chain", body = ValidationVerdict),
        (status = 500, body = crate::error::ErrorBody)
    )
)]
pub async fn commit_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<Json<ValidationVerdict>, ApiError> {
    Ok(Json(state.ledger.replicate_block(&block)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::blob::LocalBlobStore;
    use crate::crypto::FileCipher;
    use crate::ledger::{HttpPeerValidator, Ledger, PeerValidator, Verdict};
    use crate::models::{fixtures, ChainId, IncidentMetadata, RawFile, GENESIS_SENTINEL};
    use crate::state::test_support;
    use crate::storage::{ChainStore, InMemoryChainStore};
    use axum::{routing::post, Router};
    use std::sync::Arc;
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn handler_accepts_extending_candidate() {
        let (state, _dir) = test_support::state();
        let candidate = fixtures::block(ChainId::BlockPdf, 1, GENESIS_SENTINEL, "1.pdf");

        let Json(verdict) = validate_block(State(state), Json(candidate)).await.unwrap();
        assert!(verdict.valid);
    }

    #[tokio::test]
    async fn http_validator_round_trips_through_handler() {
        let (state, _dir) = test_support::state();
        let app = Router::new()
            .route("/validate-block", post(validate_block))
            .with_state(state);

        let validator = HttpPeerValidator::new(&serve(app).await, Duration::from_secs(5)).unwrap();

        let good = fixtures::block(ChainId::BlockPdfAudio, 1, GENESIS_SENTINEL, "1.pdf");
        assert_eq!(validator.submit(&good).await, Verdict::Accepted);

        let stale = fixtures::block(ChainId::BlockPdfAudio, 4, "deadbeef", "1.pdf");
        assert!(matches!(validator.submit(&stale).await, Verdict::Rejected(_)));
    }

    #[tokio::test]
    async fn handler_stores_replicated_block() {
        let (state, _dir) = test_support::state();
        let block = fixtures::block(ChainId::BlockPdf, 1, GENESIS_SENTINEL, "1.pdf");

        let Json(verdict) = commit_block(State(state.clone()), Json(block.clone()))
            .await
            .unwrap();
        assert!(verdict.valid);
        let head = state.ledger.store().find_head(ChainId::BlockPdf).unwrap();
        assert_eq!(head, Some(block));
    }

    #[tokio::test]
    async fn two_nodes_keep_appending_with_peer_validation() {
        let (peer_state, _peer_dir) = test_support::state();
        let peer_url = serve(router(peer_state.clone(), 1 << 20)).await;

        let dir = tempfile::tempdir().unwrap();
        let author = Ledger::new(
            Arc::new(InMemoryChainStore::new()),
            Arc::new(LocalBlobStore::new(dir.path()).unwrap()),
            Arc::new(FileCipher::new([7u8; 32])),
            "node-a",
        )
        .with_peer(Arc::new(
            HttpPeerValidator::new(&peer_url, Duration::from_secs(5)).unwrap(),
        ));

        let mut last = None;
        for i in 0..3u8 {
            let block = author
                .create_block(
                    ChainId::BlockPdfAudio,
                    IncidentMetadata {
                        name: format!("Report {i}"),
                        description: "Broken window".into(),
                        location: "Depot".into(),
                        incident_type: "vandalism".into(),
                        digital_signature: "sig".into(),
                    },
                    vec![RawFile {
                        original_name: None,
                        media_type: "application/pdf".into(),
                        bytes: vec![i],
                    }],
                )
                .await
                .unwrap();
            assert_eq!(block.height, u64::from(i) + 1);
            last = Some(block);
        }

        let author_head = author.store().find_head(ChainId::BlockPdfAudio).unwrap();
        let peer_head = peer_state
            .ledger
            .store()
            .find_head(ChainId::BlockPdfAudio)
            .unwrap();
        assert_eq!(author_head, last);
        assert_eq!(peer_head, author_head);
        assert_eq!(
            peer_state
                .ledger
                .store()
                .count_records(ChainId::BlockPdfAudio)
                .unwrap(),
            3
        );
    }
}
