//! services/engine/src/adapters/memory.rs
//!
//! An in-memory `StateStore`, used by the unit tests and as a fallback
//! when no durable state directory is wanted.

use std::sync::Mutex;

use async_trait::async_trait;

use tawakkul_core::domain::{CorpusCache, Prefs, ReadProgress};
use tawakkul_core::ports::{PortResult, StateStore};

#[derive(Default)]
struct MemoryState {
    progress: Option<ReadProgress>,
    prefs: Option<Prefs>,
    corpus_cache: Option<CorpusCache>,
}

#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<MemoryState>,
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_progress(&self) -> PortResult<Option<ReadProgress>> {
        Ok(self.state.lock().unwrap().progress.clone())
    }

    async fn save_progress(&self, progress: &ReadProgress) -> PortResult<()> {
        self.state.lock().unwrap().progress = Some(progress.clone());
        Ok(())
    }

    async fn load_prefs(&self) -> PortResult<Option<Prefs>> {
        Ok(self.state.lock().unwrap().prefs.clone())
    }

    async fn save_prefs(&self, prefs: &Prefs) -> PortResult<()> {
        self.state.lock().unwrap().prefs = Some(prefs.clone());
        Ok(())
    }

    async fn load_corpus_cache(&self) -> PortResult<Option<CorpusCache>> {
        Ok(self.state.lock().unwrap().corpus_cache.clone())
    }

    async fn save_corpus_cache(&self, cache: &CorpusCache) -> PortResult<()> {
        self.state.lock().unwrap().corpus_cache = Some(cache.clone());
        Ok(())
    }
}
