// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    ledger::ValidationVerdict,
    models::{Block, ChainId, FileRef, IncidentMetadata},
    state::AppState,
};

pub mod blocks;
pub mod files;
pub mod health;
pub mod validation;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let routes = Router::new()
        .route(
            "/receive-data",
            post(blocks::receive_data).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/get-blocks", get(blocks::get_blocks))
        .route("/validate-block", post(validation::validate_block))
        .route("/commit-block", post(validation::commit_block))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/{chain}/{entry}", get(files::get_file))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        blocks::receive_data,
        blocks::get_blocks,
        validation::validate_block,
        validation::commit_block,
        files::get_file,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Block,
            ChainId,
            FileRef,
            IncidentMetadata,
            ValidationVerdict,
            ErrorBody,
            blocks::CreateBlockResponse,
            blocks::ReceiveDataForm,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Blocks", description = "Incident record creation and listing"),
        (name = "Files", description = "Decrypted evidence retrieval"),
        (name = "Validation", description = "Cross-node block validation and replication"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
