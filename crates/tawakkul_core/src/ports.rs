//! crates/tawakkul_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing
//! the core to be independent of specific external implementations such as
//! static-asset hosts, generation endpoints, or the storage backend.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::{CorpusCache, PageSpan, Prefs, ReadProgress, ReferenceEntry, Verse};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (asset host, generation endpoint, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The corpus could not be fetched or parsed. Fatal to startup.
    #[error("Corpus load failed: {0}")]
    Load(String),
    /// A page number outside 1..=604.
    #[error("Page number {0} is out of range")]
    OutOfRange(u16),
    /// A reference-text fetch failed. Callers degrade this to an empty
    /// text, never a user-facing failure.
    #[error("Reference fetch failed: {0}")]
    Fetch(String),
    /// The generation endpoint refused or broke off a request.
    #[error("Generation request failed: {0}")]
    Generation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A finite, ordered sequence of text increments.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Source of the full verse corpus, fetched once at startup.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn fetch_corpus(&self) -> PortResult<Vec<Verse>>;
}

/// The page-metadata oracle: pure table lookups from the 604-page layout.
pub trait PageMetaOracle: Send + Sync {
    /// The inclusive verse-id span of a page.
    fn resolve_page(&self, page: u16) -> PortResult<PageSpan>;

    /// The juz (1..=30) containing a verse id.
    fn juz_of(&self, ayah_id: u32) -> PortResult<u8>;
}

/// Source of the two independent reference-text collections.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// The leader-commentary entries of one surah, keyed by `"surah:ayah"`.
    async fn fetch_commentary_surah(
        &self,
        surah: u16,
    ) -> PortResult<HashMap<String, ReferenceEntry>>;

    /// All occasion-of-revelation entries, keyed by `"surah:ayah"`.
    async fn fetch_occasions(&self) -> PortResult<HashMap<String, ReferenceEntry>>;
}

/// The remote text-generation endpoint.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generates the full interpretation text in one exchange.
    async fn generate(&self, document: &str) -> PortResult<String>;

    /// Generates the interpretation as an ordered stream of text
    /// increments. The concatenation of all increments equals what
    /// [`GenerationService::generate`] would have returned.
    async fn generate_streaming(&self, document: &str) -> PortResult<TextStream>;
}

/// Durable client-side state: progress, preferences and the time-boxed
/// corpus cache.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_progress(&self) -> PortResult<Option<ReadProgress>>;
    async fn save_progress(&self, progress: &ReadProgress) -> PortResult<()>;

    async fn load_prefs(&self) -> PortResult<Option<Prefs>>;
    async fn save_prefs(&self, prefs: &Prefs) -> PortResult<()>;

    async fn load_corpus_cache(&self) -> PortResult<Option<CorpusCache>>;
    async fn save_corpus_cache(&self, cache: &CorpusCache) -> PortResult<()>;
}
