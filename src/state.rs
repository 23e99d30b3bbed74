// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use crate::ledger::Ledger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    /// Checked by the readiness probe when set.
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            data_dir: None,
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::blob::LocalBlobStore;
    use crate::crypto::FileCipher;
    use crate::storage::InMemoryChainStore;

    /// State backed by an in-memory chain store and a temporary blob root.
    pub fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(
            Arc::new(InMemoryChainStore::new()),
            Arc::new(LocalBlobStore::new(dir.path()).unwrap()),
            Arc::new(FileCipher::new([5u8; 32])),
            "node-test",
        );
        (AppState::new(ledger).with_data_dir(dir.path()), dir)
    }
}
