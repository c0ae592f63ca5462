//! services/engine/src/corpus.rs
//!
//! The in-memory verse corpus store. The corpus is fetched once at
//! startup (or revived from a time-boxed durable cache) and then held,
//! immutable, for the process lifetime.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use tawakkul_core::domain::{CorpusCache, Surah, Verse};
use tawakkul_core::ports::{CorpusSource, PortError, PortResult, StateStore};

/// Cached corpus copies older than this are treated as absent.
const CACHE_TTL_HOURS: i64 = 24;

pub struct CorpusStore {
    source: Arc<dyn CorpusSource>,
    state: Arc<dyn StateStore>,
    verses: RwLock<Option<Arc<Vec<Verse>>>>,
}

impl CorpusStore {
    pub fn new(source: Arc<dyn CorpusSource>, state: Arc<dyn StateStore>) -> Self {
        Self {
            source,
            state,
            verses: RwLock::new(None),
        }
    }

    /// Loads the corpus. Idempotent: a second call while already loaded
    /// is a no-op. Tries the durable cache before the network source and
    /// refreshes the cache after a successful fetch.
    pub async fn load(&self) -> PortResult<()> {
        if self.is_loaded().await {
            return Ok(());
        }

        match self.state.load_corpus_cache().await {
            Ok(Some(cache)) if Utc::now() - cache.fetched_at < Duration::hours(CACHE_TTL_HOURS) => {
                let verses = validate(cache.verses)?;
                info!("Corpus revived from durable cache ({} verses).", verses.len());
                self.install(verses).await;
                return Ok(());
            }
            Ok(Some(_)) => info!("Durable corpus cache is stale; refetching."),
            Ok(None) => {}
            Err(e) => warn!("Could not read the durable corpus cache: {}", e),
        }

        let fetched = self
            .source
            .fetch_corpus()
            .await
            .map_err(|e| PortError::Load(e.to_string()))?;
        let verses = validate(fetched)?;
        info!("Corpus fetched ({} verses).", verses.len());

        let cache = CorpusCache {
            fetched_at: Utc::now(),
            verses: verses.clone(),
        };
        if let Err(e) = self.state.save_corpus_cache(&cache).await {
            warn!("Could not persist the corpus cache: {}", e);
        }

        self.install(verses).await;
        Ok(())
    }

    async fn install(&self, verses: Vec<Verse>) {
        *self.verses.write().await = Some(Arc::new(verses));
    }

    pub async fn is_loaded(&self) -> bool {
        self.verses.read().await.is_some()
    }

    pub async fn verse_count(&self) -> usize {
        self.verses
            .read()
            .await
            .as_ref()
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// The verses with ids in `first..=last`, ascending. Empty when the
    /// range is invalid, out of bounds, or the corpus is not loaded.
    pub async fn verses_in_range(&self, first: u32, last: u32) -> Vec<Verse> {
        let guard = self.verses.read().await;
        let Some(verses) = guard.as_ref() else {
            return Vec::new();
        };
        if first == 0 || first > last {
            return Vec::new();
        }
        let start = verses.partition_point(|v| v.id < first);
        let end = verses.partition_point(|v| v.id <= last);
        verses[start..end].to_vec()
    }

    pub async fn verse_by_id(&self, id: u32) -> Option<Verse> {
        self.verses_in_range(id, id).await.into_iter().next()
    }

    /// One `(surah, first verse id)` pair per surah, in corpus order.
    pub async fn surah_index(&self) -> Vec<(Surah, u32)> {
        let guard = self.verses.read().await;
        let Some(verses) = guard.as_ref() else {
            return Vec::new();
        };
        let mut index: Vec<(Surah, u32)> = Vec::new();
        for verse in verses.iter() {
            match index.last() {
                Some((last, _)) if last.number == verse.surah.number => {}
                _ => index.push((verse.surah.clone(), verse.id)),
            }
        }
        index
    }
}

/// A corpus must be non-empty with strictly increasing ids starting at 1;
/// anything else signals a malformed source document.
fn validate(verses: Vec<Verse>) -> PortResult<Vec<Verse>> {
    if verses.is_empty() {
        return Err(PortError::Load("corpus document is empty".to_string()));
    }
    if verses[0].id != 1 {
        return Err(PortError::Load(format!(
            "corpus does not start at verse 1 (got {})",
            verses[0].id
        )));
    }
    for pair in verses.windows(2) {
        if pair[1].id <= pair[0].id {
            return Err(PortError::Load(format!(
                "corpus ids are not strictly increasing at id {}",
                pair[1].id
            )));
        }
    }
    Ok(verses)
}
