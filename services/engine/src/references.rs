//! services/engine/src/references.rs
//!
//! Tiered retrieval of the two reference-text collections for a verse:
//! leader commentary (one static JSON file per surah) and occasions of
//! revelation (one file total). Results are memoized per verse reference,
//! raw files are memoized per surah, and concurrent requests for the same
//! uncached verse collapse onto a single shared in-flight fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use tawakkul_core::domain::{ReferenceEntry, ReferenceTexts, VerseRef};
use tawakkul_core::ports::ReferenceSource;

type SharedFetch = Shared<BoxFuture<'static, ReferenceTexts>>;

#[derive(Default)]
struct LoaderState {
    by_verse: HashMap<VerseRef, ReferenceTexts>,
    surah_files: HashMap<u16, Arc<HashMap<String, ReferenceEntry>>>,
    occasions: Option<Arc<HashMap<String, ReferenceEntry>>>,
    in_flight: HashMap<VerseRef, SharedFetch>,
}

#[derive(Clone)]
pub struct ReferenceTextLoader {
    source: Arc<dyn ReferenceSource>,
    state: Arc<Mutex<LoaderState>>,
}

impl ReferenceTextLoader {
    pub fn new(source: Arc<dyn ReferenceSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    /// The reference texts for one verse.
    ///
    /// Cached results return without touching the source. An identical
    /// request already in flight is joined rather than duplicated. A
    /// sub-source failure degrades to an empty string for that sub-source
    /// only, and the combined result is cached unconditionally so
    /// known-absent texts are not refetched.
    pub async fn request(&self, verse_ref: VerseRef) -> ReferenceTexts {
        let fetch = {
            let mut state = self.state.lock().unwrap();
            if let Some(hit) = state.by_verse.get(&verse_ref) {
                return hit.clone();
            }
            match state.in_flight.get(&verse_ref) {
                Some(pending) => pending.clone(),
                None => {
                    let fetch =
                        Self::fetch_both(self.source.clone(), self.state.clone(), verse_ref)
                            .boxed()
                            .shared();
                    state.in_flight.insert(verse_ref, fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Withdraws this loader's registration of an in-flight fetch, so a
    /// later request starts fresh. Waiters already polling the shared
    /// fetch are unaffected and still resolve.
    pub fn cancel(&self, verse_ref: VerseRef) {
        let removed = self.state.lock().unwrap().in_flight.remove(&verse_ref);
        if removed.is_some() {
            debug!("Abandoned in-flight reference fetch for {}.", verse_ref);
        }
    }

    pub fn is_cached(&self, verse_ref: VerseRef) -> bool {
        self.state.lock().unwrap().by_verse.contains_key(&verse_ref)
    }

    async fn fetch_both(
        source: Arc<dyn ReferenceSource>,
        state: Arc<Mutex<LoaderState>>,
        verse_ref: VerseRef,
    ) -> ReferenceTexts {
        let (leader_commentary, occasion) = tokio::join!(
            Self::commentary_text(source.clone(), state.clone(), verse_ref),
            Self::occasion_text(source, state.clone(), verse_ref),
        );
        let texts = ReferenceTexts {
            leader_commentary,
            occasion,
        };
        let mut state = state.lock().unwrap();
        state.by_verse.insert(verse_ref, texts.clone());
        state.in_flight.remove(&verse_ref);
        texts
    }

    async fn commentary_text(
        source: Arc<dyn ReferenceSource>,
        state: Arc<Mutex<LoaderState>>,
        verse_ref: VerseRef,
    ) -> String {
        let cached = state
            .lock()
            .unwrap()
            .surah_files
            .get(&verse_ref.surah)
            .cloned();
        let entries = match cached {
            Some(entries) => entries,
            None => match source.fetch_commentary_surah(verse_ref.surah).await {
                Ok(map) => {
                    let entries = Arc::new(map);
                    state
                        .lock()
                        .unwrap()
                        .surah_files
                        .insert(verse_ref.surah, entries.clone());
                    entries
                }
                Err(e) => {
                    warn!(
                        "Could not load commentary for surah {}: {}",
                        verse_ref.surah, e
                    );
                    return String::new();
                }
            },
        };
        lookup(&entries, verse_ref)
    }

    async fn occasion_text(
        source: Arc<dyn ReferenceSource>,
        state: Arc<Mutex<LoaderState>>,
        verse_ref: VerseRef,
    ) -> String {
        let cached = state.lock().unwrap().occasions.clone();
        let entries = match cached {
            Some(entries) => entries,
            None => match source.fetch_occasions().await {
                Ok(map) => {
                    let entries = Arc::new(map);
                    state.lock().unwrap().occasions = Some(entries.clone());
                    entries
                }
                Err(e) => {
                    warn!("Could not load the occasions of revelation: {}", e);
                    return String::new();
                }
            },
        };
        lookup(&entries, verse_ref)
    }
}

fn lookup(entries: &HashMap<String, ReferenceEntry>, verse_ref: VerseRef) -> String {
    entries
        .get(&verse_ref.to_string())
        .map(|entry| entry.content.trim_start().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubReferenceSource;
    use std::sync::atomic::Ordering;

    fn vr(surah: u16, ayah: u16) -> VerseRef {
        VerseRef { surah, ayah }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch_per_sub_source() {
        let source = Arc::new(StubReferenceSource::with_texts("1:1", "تفسیر", "شأن"));
        let loader = ReferenceTextLoader::new(source.clone());

        let (a, b) = tokio::join!(loader.request(vr(1, 1)), loader.request(vr(1, 1)));
        assert_eq!(a, b);
        assert_eq!(a.leader_commentary, "تفسیر");
        assert_eq!(a.occasion, "شأن");
        assert_eq!(source.commentary_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.occasion_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let source = Arc::new(StubReferenceSource::with_texts("2:3", "الف", "ب"));
        let loader = ReferenceTextLoader::new(source.clone());

        loader.request(vr(2, 3)).await;
        assert!(loader.is_cached(vr(2, 3)));
        loader.request(vr(2, 3)).await;
        assert_eq!(source.commentary_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.occasion_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn verses_of_one_surah_reuse_the_surah_file() {
        let source = Arc::new(StubReferenceSource::with_texts("1:1", "تفسیر", "شأن"));
        let loader = ReferenceTextLoader::new(source.clone());

        loader.request(vr(1, 1)).await;
        let other = loader.request(vr(1, 2)).await;
        // 1:2 has no entry in either file; empty, but no refetch.
        assert_eq!(other, ReferenceTexts::default());
        assert_eq!(source.commentary_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.occasion_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sub_source_failures_degrade_to_empty_and_are_cached() {
        let source = Arc::new(StubReferenceSource::failing());
        let loader = ReferenceTextLoader::new(source.clone());

        let texts = loader.request(vr(9, 9)).await;
        assert_eq!(texts, ReferenceTexts::default());

        // Known-absent results are cached too.
        loader.request(vr(9, 9)).await;
        assert_eq!(source.commentary_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.occasion_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_keeps_the_healthy_sub_source() {
        let source = Arc::new(StubReferenceSource::with_texts("4:4", "تفسیر", "نادیده"));
        source.fail_occasions.store(true, Ordering::SeqCst);
        let loader = ReferenceTextLoader::new(source);

        let texts = loader.request(vr(4, 4)).await;
        assert_eq!(texts.leader_commentary, "تفسیر");
        assert_eq!(texts.occasion, "");
    }

    #[tokio::test]
    async fn cancel_does_not_disturb_existing_waiters() {
        let source = Arc::new(StubReferenceSource::with_texts("1:1", "تفسیر", "شأن"));
        let loader = ReferenceTextLoader::new(source.clone());

        let mut first = Box::pin(loader.request(vr(1, 1)));
        let mut second = Box::pin(loader.request(vr(1, 1)));
        assert!(futures::poll!(first.as_mut()).is_pending());
        assert!(futures::poll!(second.as_mut()).is_pending());

        loader.cancel(vr(1, 1));

        let (a, b) = futures::join!(first, second);
        assert_eq!(a, b);
        assert_eq!(a.leader_commentary, "تفسیر");
        assert_eq!(source.commentary_fetches.load(Ordering::SeqCst), 1);
    }
}
