// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    models::{Block, ChainId, IncidentMetadata, RawFile},
    state::AppState,
};

/// Multipart form accepted by `POST /receive-data`.
#[allow(dead_code)]
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct ReceiveDataForm {
    pub name: String,
    pub description: String,
    pub location: String,
    pub incident_type: String,
    /// One of `block_pdf`, `block_pdf_audio`, `block_pdf_video`, `block_pdf_audio_video`.
    pub chain: String,
    pub digital_signature: String,
    /// Accepted for compatibility with existing clients and logged only.
    pub user_id: Option<String>,
    /// One or more evidence files (`application/pdf`, `audio/mpeg`, `video/mp4`).
    #[schema(value_type = Vec<String>, format = Binary)]
    pub file: Vec<Vec<u8>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlockResponse {
    pub success: bool,
    pub message: String,
    pub node: String,
    pub block_data: Block,
}

#[derive(Default)]
struct UploadForm {
    name: String,
    description: String,
    location: String,
    incident_type: String,
    chain: Option<String>,
    digital_signature: String,
    user_id: Option<String>,
    files: Vec<RawFile>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or_default().to_string();
            if field_name == "file" {
                let original_name = field.file_name().map(str::to_string);
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.files.push(RawFile {
                    original_name,
                    media_type,
                    bytes: bytes.to_vec(),
                });
                continue;
            }

            let value = field.text().await.map_err(multipart_error)?;
            match field_name.as_str() {
                "name" => form.name = value,
                "description" => form.description = value,
                "location" => form.location = value,
                "incidentType" => form.incident_type = value,
                "chain" => form.chain = Some(value),
                "digitalSignature" => form.digital_signature = value,
                "userId" => form.user_id = Some(value),
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), "invalid_multipart", err.body_text())
}

#[utoipa::path(
    post,
    path = "/receive-data",
    request_body(content = ReceiveDataForm, content_type = "multipart/form-data"),
    tag = "Blocks",
    responses(
        (status = 200, description = "Block committed", body = CreateBlockResponse),
        (status = 400, description = "Missing fields, no files, unknown chain or unsupported file type", body = crate::error::ErrorBody),
        (status = 409, description = "Chain advanced concurrently", body = crate::error::ErrorBody),
        (status = 422, description = "Peer did not accept the block", body = crate::error::ErrorBody),
        (status = 502, description = "Blob storage failed", body = crate::error::ErrorBody)
    )
)]
pub async fn receive_data(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CreateBlockResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;

    let chain: ChainId = form
        .chain
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing required fields: chain"))?
        .parse()
        .map_err(|e| ApiError::bad_request(format!("{e}")))?;

    tracing::info!(
        chain = %chain,
        user_id = form.user_id.as_deref().unwrap_or(""),
        files = form.files.len(),
        "Received incident upload"
    );

    let metadata = IncidentMetadata {
        name: form.name,
        description: form.description,
        location: form.location,
        incident_type: form.incident_type,
        digital_signature: form.digital_signature,
    };
    let block = state.ledger.create_block(chain, metadata, form.files).await?;

    Ok(Json(CreateBlockResponse {
        success: true,
        message: "Block uploaded successfully".to_string(),
        node: state.ledger.node_id().to_string(),
        block_data: block,
    }))
}

/// Latest block per chain, keyed by chain name (`null` for empty chains).
#[utoipa::path(
    get,
    path = "/get-blocks",
    tag = "Blocks",
    responses(
        (status = 200, body = BTreeMap<String, Option<Block>>),
        (status = 500, body = crate::error::ErrorBody)
    )
)]
pub async fn get_blocks(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<ChainId, Option<Block>>>, ApiError> {
    Ok(Json(state.ledger.latest_per_chain()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (content_type, content) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"evidence\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::post("/receive-data")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/receive-data", post(receive_data))
            .with_state(state)
    }

    const FIELDS: [(&str, &str); 7] = [
        ("name", "Warehouse fire"),
        ("description", "Smoke near the loading bay"),
        ("location", "Dock 4"),
        ("incidentType", "fire"),
        ("chain", "block_pdf_audio"),
        ("userId", "user-7"),
        ("digitalSignature", "sig-1"),
    ];

    #[tokio::test]
    async fn receive_data_commits_block() {
        let (state, _dir) = test_support::state();
        let body = multipart_body(
            &FIELDS,
            &[("application/pdf", "%PDF-1.7"), ("audio/mpeg", "ID3")],
        );

        let response = app(state.clone()).oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["node"], "node-test");
        assert_eq!(json["blockData"]["height"], 1);
        assert_eq!(json["blockData"]["chainId"], "block_pdf_audio");
        assert_eq!(json["blockData"]["files"].as_array().unwrap().len(), 2);

        let latest = state.ledger.latest_per_chain().unwrap();
        assert!(latest[&ChainId::BlockPdfAudio].is_some());
    }

    #[tokio::test]
    async fn receive_data_without_files_is_bad_request() {
        let (state, _dir) = test_support::state();
        let response = app(state)
            .oneshot(upload_request(multipart_body(&FIELDS, &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn receive_data_with_unknown_chain_is_bad_request() {
        let (state, _dir) = test_support::state();
        let mut fields = FIELDS;
        fields[4] = ("chain", "block_gif");
        let response = app(state)
            .oneshot(upload_request(multipart_body(
                &fields,
                &[("application/pdf", "%PDF")],
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "invalid_input");
    }

    #[tokio::test]
    async fn get_blocks_lists_every_chain() {
        let (state, _dir) = test_support::state();
        let Json(latest) = get_blocks(State(state)).await.unwrap();

        let json = serde_json::to_value(&latest).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 4);
        assert!(object["block_pdf"].is_null());
        assert!(object.contains_key("block_pdf_audio_video"));
    }
}
