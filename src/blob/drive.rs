// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google Drive v3 blob store.
//!
//! Folders are Drive folders, uploads use `uploadType=multipart`, and every
//! uploaded file gets a `reader`/`anyone` permission so its locator
//! (`https://drive.google.com/uc?id=<fileId>`) is link-accessible.
//!
//! ## Authentication
//!
//! A service account signs an RS256 JWT assertion which is exchanged for an
//! access token at the OAuth token endpoint. The token is cached until one
//! minute before it expires. A static access token can be used instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use super::{BlobStore, StorageError, StorageResult};

const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How the store authenticates against Drive.
#[derive(Clone)]
pub enum DriveCredentials {
    ServiceAccount {
        client_email: String,
        private_key_pem: String,
    },
    AccessToken(String),
}

impl std::fmt::Debug for DriveCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveCredentials::ServiceAccount { client_email, .. } => f
                .debug_struct("ServiceAccount")
                .field("client_email", client_email)
                .finish_non_exhaustive(),
            DriveCredentials::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

pub struct DriveBlobStore {
    http: Client,
    api_base_url: String,
    token_uri: String,
    credentials: DriveCredentials,
    token: RwLock<Option<CachedToken>>,
}

impl DriveBlobStore {
    pub fn new(credentials: DriveCredentials) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            credentials,
            token: RwLock::new(None),
        })
    }

    /// Point API and upload calls at another host (used by tests).
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/drive/v3/files/{file_id}", self.api_base_url)
    }

    async fn access_token(&self) -> StorageResult<String> {
        let (client_email, private_key_pem) = match &self.credentials {
            DriveCredentials::AccessToken(token) => return Ok(token.clone()),
            DriveCredentials::ServiceAccount {
                client_email,
                private_key_pem,
            } => (client_email, private_key_pem),
        };

        {
            let cache = self.token.read().await;
            if let Some(entry) = &*cache {
                if entry.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                    return Ok(entry.access_token.clone());
                }
            }
        }

        let assertion = sign_assertion(client_email, private_key_pem, &self.token_uri)?;
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let response = check_status(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        let access_token = token.access_token.clone();
        *self.token.write().await = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        tracing::debug!(expires_in = token.expires_in, "Refreshed Drive access token");

        Ok(access_token)
    }

    async fn grant_public_read(&self, file_id: &str, token: &str) -> StorageResult<()> {
        let response = self
            .http
            .post(format!("{}/permissions", self.file_url(file_id)))
            .bearer_auth(token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> StorageResult<()> {
        let token = self.access_token().await?;
        let response = self
            .http
            .delete(self.file_url(file_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        match check_status(response).await {
            Ok(_) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BlobStore for DriveBlobStore {
    async fn create_folder(&self, name: &str, parent_id: &str) -> StorageResult<String> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.files_url())
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let folder: DriveFile = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        tracing::debug!(folder_id = %folder.id, parent_id, "Created Drive folder");
        Ok(folder.id)
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        media_type: &str,
        folder_id: &str,
    ) -> StorageResult<String> {
        let token = self.access_token().await?;
        let boundary = format!("ledger-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "name": file_name,
            "mimeType": media_type,
            "parents": [folder_id],
        });
        let body = multipart_related_body(&boundary, &metadata, media_type, &bytes);

        let response = self
            .http
            .post(format!(
                "{}/upload/drive/v3/files?uploadType=multipart&fields=id",
                self.api_base_url
            ))
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let file: DriveFile = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if let Err(e) = self.grant_public_read(&file.id, &token).await {
            tracing::warn!(
                file_id = %file.id,
                file_name,
                error = %e,
                "Public read grant failed, removing uploaded file"
            );
            if let Err(cleanup) = self.delete_file(&file.id).await {
                tracing::warn!(file_id = %file.id, error = %cleanup, "Failed to remove file");
            }
            return Err(StorageError::PermissionGrant {
                file_name: file_name.to_string(),
                reason: e.to_string(),
            });
        }

        Ok(file_locator(&file.id))
    }

    async fn download(&self, locator: &str) -> StorageResult<Vec<u8>> {
        let file_id = drive_file_id(locator)?;
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.file_url(&file_id))
            .query(&[("alt", "media")])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete_folder(&self, folder_id: &str) -> StorageResult<()> {
        // Deleting a Drive folder removes the files it contains.
        self.delete_file(folder_id).await
    }

    fn folder_locator(&self, folder_id: &str) -> String {
        format!("https://drive.google.com/drive/folders/{folder_id}")
    }
}

/// Public retrieval URL for a Drive file.
pub fn file_locator(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={file_id}")
}

/// Extract the file ID from a `...?id=<fileId>` locator.
pub fn drive_file_id(locator: &str) -> StorageResult<String> {
    let url = url::Url::parse(locator)
        .map_err(|_| StorageError::InvalidLocator(locator.to_string()))?;
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))
}

fn sign_assertion(client_email: &str, private_key_pem: &str, token_uri: &str) -> StorageResult<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: client_email,
        scope: DRIVE_SCOPE,
        aud: token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| StorageError::Auth(format!("invalid service account key: {e}")))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| StorageError::Auth(format!("failed to sign assertion: {e}")))
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    media_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let metadata = metadata.to_string();
    let mut body = Vec::with_capacity(bytes.len() + metadata.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {media_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn check_status(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Auth(body),
        _ => StorageError::Provider {
            status: status.as_u16(),
            body,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::StatusCode as AxumStatus,
        routing::{get, post},
        Json, Router,
    };

    #[derive(Default)]
    struct FakeDrive {
        fail_permissions: bool,
        deleted: Mutex<Vec<String>>,
        uploads: Mutex<Vec<Vec<u8>>>,
    }

    async fn spawn_fake_drive(fake: Arc<FakeDrive>) -> String {
        let app = Router::new()
            .route(
                "/drive/v3/files",
                post(|| async { Json(json!({ "id": "folder-1" })) }),
            )
            .route(
                "/upload/drive/v3/files",
                post(
                    |State(fake): State<Arc<FakeDrive>>, body: axum::body::Bytes| async move {
                        fake.uploads.lock().unwrap().push(body.to_vec());
                        Json(json!({ "id": "file-1" }))
                    },
                ),
            )
            .route(
                "/drive/v3/files/{id}/permissions",
                post(|State(fake): State<Arc<FakeDrive>>| async move {
                    if fake.fail_permissions {
                        AxumStatus::INTERNAL_SERVER_ERROR
                    } else {
                        AxumStatus::OK
                    }
                }),
            )
            .route(
                "/drive/v3/files/{id}",
                get(|Path(id): Path<String>| async move {
                    if id == "file-1" {
                        Ok(b"encrypted-bytes".to_vec())
                    } else {
                        Err(AxumStatus::NOT_FOUND)
                    }
                })
                .delete(
                    |State(fake): State<Arc<FakeDrive>>, Path(id): Path<String>| async move {
                        fake.deleted.lock().unwrap().push(id);
                        AxumStatus::NO_CONTENT
                    },
                ),
            )
            .with_state(fake);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn store(base: &str) -> DriveBlobStore {
        DriveBlobStore::new(DriveCredentials::AccessToken("test-token".into()))
            .unwrap()
            .with_api_base_url(base)
    }

    #[test]
    fn file_id_is_read_from_locator() {
        assert_eq!(
            drive_file_id("https://drive.google.com/uc?id=abc123").unwrap(),
            "abc123"
        );
        assert!(drive_file_id("https://drive.google.com/uc").is_err());
        assert!(drive_file_id("not a url").is_err());
        assert_eq!(drive_file_id(&file_locator("xyz")).unwrap(), "xyz");
    }

    #[test]
    fn multipart_body_has_both_parts() {
        let body = multipart_related_body(
            "b0",
            &json!({ "name": "1.pdf" }),
            "application/pdf",
            b"\x00\x01",
        );
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--b0\r\nContent-Type: application/json"));
        assert!(text.contains(r#"{"name":"1.pdf"}"#));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n"));
        assert!(text.ends_with("\r\n--b0--\r\n"));
    }

    #[test]
    fn invalid_service_account_key_is_an_auth_error() {
        let result = sign_assertion("svc@example.com", "not a pem", DEFAULT_TOKEN_URI);
        assert!(matches!(result, Err(StorageError::Auth(_))));
    }

    #[tokio::test]
    async fn upload_returns_public_locator() {
        let fake = Arc::new(FakeDrive::default());
        let base = spawn_fake_drive(fake.clone()).await;
        let store = store(&base);

        let folder = store.create_folder("case_1", "parent").await.unwrap();
        assert_eq!(folder, "folder-1");
        assert_eq!(
            store.folder_locator(&folder),
            "https://drive.google.com/drive/folders/folder-1"
        );

        let locator = store
            .upload(b"cipher".to_vec(), "9.pdf", "application/pdf", &folder)
            .await
            .unwrap();
        assert_eq!(locator, "https://drive.google.com/uc?id=file-1");
        assert_eq!(fake.uploads.lock().unwrap().len(), 1);

        let bytes = store.download(&locator).await.unwrap();
        assert_eq!(bytes, b"encrypted-bytes");
    }

    #[tokio::test]
    async fn failed_grant_fails_upload_and_removes_file() {
        let fake = Arc::new(FakeDrive {
            fail_permissions: true,
            ..Default::default()
        });
        let base = spawn_fake_drive(fake.clone()).await;

        let result = store(&base)
            .upload(b"cipher".to_vec(), "9.pdf", "application/pdf", "folder-1")
            .await;
        assert!(matches!(result, Err(StorageError::PermissionGrant { .. })));
        assert_eq!(*fake.deleted.lock().unwrap(), vec!["file-1".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let base = spawn_fake_drive(Arc::new(FakeDrive::default())).await;
        let result = store(&base).download(&file_locator("gone")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
