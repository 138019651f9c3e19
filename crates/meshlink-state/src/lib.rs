//! The `StateStore` port (§6): per-node persistent scalar state, never
//! replicated. Loads and saves always deep-copy through a serialize round
//! trip rather than a hand-written clone, so the no-aliasing guarantee
//! holds even as fields are added to [`meshlink_types::NodeState`].

use std::path::{Path, PathBuf};

use meshlink_types::NodeState;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("no state found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// The on-disk layout of a node's local state. Not object-safe by design —
/// there is exactly one implementation in production; tests construct a
/// `FileStateStore` rooted at a `tempfile::tempdir()`.
pub trait StateStore {
    fn load(&self, data_dir: &Path) -> Result<NodeState>;
    fn save(&self, data_dir: &Path, state: &NodeState) -> Result<()>;
    fn delete(&self, data_dir: &Path) -> Result<()>;
    fn state_path(&self, data_dir: &Path) -> PathBuf;
}

/// Stores state as a single `state.json` file under the data directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStateStore;

impl FileStateStore {
    pub fn new() -> Self {
        Self
    }

    fn deep_copy(state: &NodeState) -> Result<NodeState> {
        let encoded = serde_json::to_vec(state).expect("NodeState always serializes");
        serde_json::from_slice(&encoded).expect("round-trip of just-encoded bytes never fails")
    }
}

impl StateStore for FileStateStore {
    fn state_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join("state.json")
    }

    #[instrument(skip(self))]
    fn load(&self, data_dir: &Path) -> Result<NodeState> {
        let path = self.state_path(data_dir);
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StateError::NotFound(path.clone())
            } else {
                StateError::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let state: NodeState = serde_json::from_slice(&bytes).map_err(|source| StateError::Decode {
            path: path.clone(),
            source,
        })?;
        // Re-encode/decode once more so the returned value shares no
        // buffers with the bytes just read.
        let independent = Self::deep_copy(&state)?;
        debug!(node_id = %independent.node_id, "loaded node state");
        Ok(independent)
    }

    #[instrument(skip(self, state))]
    fn save(&self, data_dir: &Path, state: &NodeState) -> Result<()> {
        std::fs::create_dir_all(data_dir).map_err(|source| StateError::Write {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let copy = Self::deep_copy(state)?;
        let path = self.state_path(data_dir);
        let encoded = serde_json::to_vec_pretty(&copy).expect("deep copy always serializes");
        std::fs::write(&path, encoded).map_err(|source| StateError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(node_id = %copy.node_id, "saved node state");
        Ok(())
    }

    fn delete(&self, data_dir: &Path) -> Result<()> {
        let path = self.state_path(data_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Write { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_types::Keypair;

    fn sample_state() -> NodeState {
        NodeState::new(
            "node-a",
            Keypair {
                public: "pub".into(),
                private: "priv".into(),
            },
            "10.210.0.0/24".parse().unwrap(),
            "plz-default",
            51820,
        )
    }

    #[test]
    fn load_missing_state_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new();
        let err = store.load(dir.path()).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new();
        let state = sample_state();
        store.save(dir.path(), &state).unwrap();
        let loaded = store.load(dir.path()).unwrap();
        assert_eq!(state, loaded);
    }

    #[test]
    fn save_does_not_alias_caller_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new();
        let mut state = sample_state();
        store.save(dir.path(), &state).unwrap();
        state.running = true;
        let loaded = store.load(dir.path()).unwrap();
        assert!(!loaded.running);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new();
        store.delete(dir.path()).unwrap();
        store.save(dir.path(), &sample_state()).unwrap();
        store.delete(dir.path()).unwrap();
        store.delete(dir.path()).unwrap();
        assert!(matches!(
            store.load(dir.path()).unwrap_err(),
            StateError::NotFound(_)
        ));
    }
}
