// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use incident_ledger::{
    api::router,
    blob::{BlobStore, DriveBlobStore, DriveCredentials, LocalBlobStore},
    config::{BlobBackend, LogFormat, NodeConfig, DEFAULT_LOG_FILTER},
    crypto::FileCipher,
    ledger::{HttpPeerValidator, Ledger},
    state::AppState,
    storage::ChainDatabase,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn build_blob_store(config: &NodeConfig) -> Result<Arc<dyn BlobStore>, BoxError> {
    let blobs: Arc<dyn BlobStore> = match &config.blob_backend {
        BlobBackend::Local => Arc::new(LocalBlobStore::new(config.blob_root())?),
        BlobBackend::Drive {
            service_account,
            access_token,
        } => {
            let credentials = match (service_account, access_token) {
                (Some((client_email, private_key_pem)), _) => DriveCredentials::ServiceAccount {
                    client_email: client_email.clone(),
                    private_key_pem: private_key_pem.clone(),
                },
                (None, Some(token)) => DriveCredentials::AccessToken(token.clone()),
                (None, None) => return Err("Drive backend needs credentials".into()),
            };
            Arc::new(DriveBlobStore::new(credentials)?)
        }
    };
    Ok(blobs)
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = NodeConfig::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        node_id = %config.node_id,
        data_dir = %config.data_dir.display(),
        "Incident ledger node starting"
    );

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(ChainDatabase::open(&config.database_path())?);
    let blobs = build_blob_store(&config)?;
    let cipher = Arc::new(FileCipher::from_hex(&config.encryption_key)?);

    let mut ledger = Ledger::new(store, blobs, cipher, config.node_id.clone())
        .with_parent_folders(config.chain_folders.clone())
        .with_cleanup(config.cleanup_rejected_uploads);

    match &config.peer_url {
        Some(peer_url) => {
            let peer = HttpPeerValidator::new(peer_url, config.peer_timeout)?;
            tracing::info!(
                endpoint = peer.endpoint(),
                timeout_secs = config.peer_timeout.as_secs(),
                "Multi-node mode: blocks require peer validation"
            );
            ledger = ledger.with_peer(Arc::new(peer));
        }
        None => tracing::info!("Single-node mode: no peer validation"),
    }

    let state = AppState::new(ledger).with_data_dir(config.data_dir.clone());
    let app = router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Incident ledger listening (docs at /docs)"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
