// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::{error::ApiError, models::ChainScope, state::AppState};

/// The stored file name is the part after the last `-`; anything before it
/// is a display name chosen by the client.
fn file_name_from_entry(entry: &str) -> &str {
    entry.rsplit('-').next().unwrap_or(entry)
}

#[utoipa::path(
    get,
    path = "/{chain}/{entry}",
    params(
        ("chain" = String, Path, description = "Chain name, or `all` to search every chain"),
        ("entry" = String, Path, description = "`<name>-<fileName>`, e.g. `report-481516234200.pdf`")
    ),
    tag = "Files",
    responses(
        (status = 200, description = "Decrypted file with its stored media type as Content-Type"),
        (status = 404, description = "Unknown chain or file", body = crate::error::ErrorBody),
        (status = 415, description = "Stored media type cannot be served", body = crate::error::ErrorBody)
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path((chain, entry)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let scope: ChainScope = chain
        .parse()
        .map_err(|_| ApiError::not_found(format!("Chain {chain} not found")))?;
    let file_name = file_name_from_entry(&entry);

    let served = state.ledger.get_file(scope, file_name).await?;

    Ok((
        [
            (header::CONTENT_TYPE, served.media_type.as_str().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", served.file_name),
            ),
        ],
        served.bytes,
    ))
}
