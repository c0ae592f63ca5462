//! services/engine/src/testing.rs
//!
//! In-process stub ports shared by the component unit tests. Fetch
//! counters make the de-duplication and caching properties observable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use tawakkul_core::domain::{ReferenceEntry, Surah, Verse};
use tawakkul_core::ports::{
    CorpusSource, GenerationService, PortError, PortResult, ReferenceSource, TextStream,
};

/// A small synthetic corpus: verse `i` belongs to surah `(i-1)/5 + 1`,
/// ayah `(i-1)%5 + 1`, five ayahs per surah.
pub fn corpus_of(len: u32) -> Vec<Verse> {
    (1..=len).map(test_verse).collect()
}

pub fn test_verse(id: u32) -> Verse {
    let surah_number = ((id - 1) / 5 + 1) as u16;
    let ayah = ((id - 1) % 5 + 1) as u16;
    Verse {
        id,
        id_persian: id.to_string(),
        surah: Surah {
            number: surah_number,
            persian_number: surah_number.to_string(),
            arabic: format!("سورة {}", surah_number),
            english: format!("Surah {}", surah_number),
            farsi: format!("سوره {}", surah_number),
        },
        ayah,
        ayah_persian: ayah.to_string(),
        text: BTreeMap::from([
            (
                tawakkul_core::domain::ARABIC_EDITION.to_string(),
                format!("متن آيه {}", id),
            ),
            (
                tawakkul_core::domain::DEFAULT_TRANSLATION.to_string(),
                format!("ترجمه {}", id),
            ),
        ]),
    }
}

pub struct StubCorpusSource {
    verses: Vec<Verse>,
    pub fetch_count: AtomicUsize,
}

impl StubCorpusSource {
    pub fn new(verses: Vec<Verse>) -> Self {
        Self {
            verses,
            fetch_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CorpusSource for StubCorpusSource {
    async fn fetch_corpus(&self) -> PortResult<Vec<Verse>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.verses.clone())
    }
}

/// A reference source whose two sub-sources can be stocked or told to
/// fail, with a fetch counter per sub-source.
#[derive(Default)]
pub struct StubReferenceSource {
    pub commentary: Mutex<HashMap<String, ReferenceEntry>>,
    pub occasions: Mutex<HashMap<String, ReferenceEntry>>,
    pub fail_commentary: std::sync::atomic::AtomicBool,
    pub fail_occasions: std::sync::atomic::AtomicBool,
    pub commentary_fetches: AtomicUsize,
    pub occasion_fetches: AtomicUsize,
}

impl StubReferenceSource {
    pub fn with_texts(verse_ref: &str, commentary: &str, occasion: &str) -> Self {
        let stub = Self::default();
        stub.commentary.lock().unwrap().insert(
            verse_ref.to_string(),
            ReferenceEntry {
                content: commentary.to_string(),
            },
        );
        stub.occasions.lock().unwrap().insert(
            verse_ref.to_string(),
            ReferenceEntry {
                content: occasion.to_string(),
            },
        );
        stub
    }

    pub fn failing() -> Self {
        let stub = Self::default();
        stub.fail_commentary.store(true, Ordering::SeqCst);
        stub.fail_occasions.store(true, Ordering::SeqCst);
        stub
    }
}

#[async_trait]
impl ReferenceSource for StubReferenceSource {
    async fn fetch_commentary_surah(
        &self,
        _surah: u16,
    ) -> PortResult<HashMap<String, ReferenceEntry>> {
        self.commentary_fetches.fetch_add(1, Ordering::SeqCst);
        // Yield once so concurrent requests genuinely overlap.
        tokio::task::yield_now().await;
        if self.fail_commentary.load(Ordering::SeqCst) {
            return Err(PortError::Fetch("commentary source down".to_string()));
        }
        Ok(self.commentary.lock().unwrap().clone())
    }

    async fn fetch_occasions(&self) -> PortResult<HashMap<String, ReferenceEntry>> {
        self.occasion_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_occasions.load(Ordering::SeqCst) {
            return Err(PortError::Fetch("occasions source down".to_string()));
        }
        Ok(self.occasions.lock().unwrap().clone())
    }
}

/// A deterministic generation endpoint: replays a fixed script of
/// increments, or fails outright.
pub struct StubGenerationService {
    pub chunks: Vec<String>,
    pub fail: bool,
    pub request_count: AtomicUsize,
}

impl StubGenerationService {
    pub fn replaying(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail: false,
            request_count: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            chunks: Vec::new(),
            fail: true,
            request_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GenerationService for StubGenerationService {
    async fn generate(&self, _document: &str) -> PortResult<String> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PortError::Generation("endpoint returned 502".to_string()));
        }
        Ok(self.chunks.concat())
    }

    async fn generate_streaming(&self, _document: &str) -> PortResult<TextStream> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PortError::Generation("endpoint returned 502".to_string()));
        }
        let chunks = self.chunks.clone();
        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok),
        )))
    }
}
