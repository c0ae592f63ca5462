//! services/engine/src/adapters/fs_state.rs
//!
//! Durable state on the local filesystem, one JSON document per concern:
//! `progress.json`, `prefs.json` and `corpus.json`. Writes go through a
//! temp file and a rename so a crash never leaves a torn document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use tawakkul_core::domain::{CorpusCache, Prefs, ReadProgress};
use tawakkul_core::ports::{PortError, PortResult, StateStore};

const PROGRESS_FILE: &str = "progress.json";
const PREFS_FILE: &str = "prefs.json";
const CORPUS_FILE: &str = "corpus.json";

pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: impl Into<PathBuf>) -> PortResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| PortError::Unexpected(format!("could not create state dir: {}", e)))?;
        Ok(Self { root })
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> PortResult<Option<T>> {
        let path = self.root.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| PortError::Unexpected(format!("could not read {}: {}", name, e)))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| PortError::Unexpected(format!("{} is corrupt: {}", name, e)))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> PortResult<()> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let path = self.root.join(name);
        let tmp = self.root.join(format!("{}.tmp", name));
        std::fs::write(&tmp, content)
            .map_err(|e| PortError::Unexpected(format!("could not write {}: {}", name, e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| PortError::Unexpected(format!("could not commit {}: {}", name, e)))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn load_progress(&self) -> PortResult<Option<ReadProgress>> {
        self.read_json(PROGRESS_FILE)
    }

    async fn save_progress(&self, progress: &ReadProgress) -> PortResult<()> {
        self.write_json(PROGRESS_FILE, progress)
    }

    async fn load_prefs(&self) -> PortResult<Option<Prefs>> {
        self.read_json(PREFS_FILE)
    }

    async fn save_prefs(&self, prefs: &Prefs) -> PortResult<()> {
        self.write_json(PREFS_FILE, prefs)
    }

    async fn load_corpus_cache(&self) -> PortResult<Option<CorpusCache>> {
        self.read_json(CORPUS_FILE)
    }

    async fn save_corpus_cache(&self, cache: &CorpusCache) -> PortResult<()> {
        self.write_json(CORPUS_FILE, cache)
    }
}
