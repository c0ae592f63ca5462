//! services/engine/src/pages.rs
//!
//! Turns a page number into its verse subset and derived metadata. The
//! id-range computation itself belongs to the page-metadata oracle; this
//! module composes it with the corpus and the juz lookup.

use std::sync::Arc;

use tracing::warn;

use tawakkul_core::domain::{PageData, PageMeta, SurahSummary, Verse, TOTAL_PAGES};
use tawakkul_core::ports::{PageMetaOracle, PortError, PortResult};

use crate::corpus::CorpusStore;

pub struct PageResolver {
    oracle: Arc<dyn PageMetaOracle>,
    corpus: Arc<CorpusStore>,
}

impl PageResolver {
    pub fn new(oracle: Arc<dyn PageMetaOracle>, corpus: Arc<CorpusStore>) -> Self {
        Self { oracle, corpus }
    }

    /// Resolves a page number into its metadata.
    ///
    /// The oracle and the corpus are independently versioned, so a span
    /// the corpus cannot populate is not an error: it yields a degenerate
    /// `PageMeta` with zeroed ids.
    pub async fn resolve(&self, page: u16) -> PortResult<PageMeta> {
        self.resolve_with_verses(page).await.map(|(meta, _)| meta)
    }

    /// Assembles everything the shell needs to render one page.
    pub async fn page_data(&self, page: u16) -> PortResult<PageData> {
        let (meta, verses) = self.resolve_with_verses(page).await?;
        Ok(PageData {
            page,
            total_pages: TOTAL_PAGES,
            verses,
            meta,
        })
    }

    async fn resolve_with_verses(&self, page: u16) -> PortResult<(PageMeta, Vec<Verse>)> {
        if !(1..=TOTAL_PAGES).contains(&page) {
            return Err(PortError::OutOfRange(page));
        }
        let span = self.oracle.resolve_page(page)?;
        let verses = self
            .corpus
            .verses_in_range(span.first_ayah_id, span.last_ayah_id)
            .await;

        let Some(first) = verses.first() else {
            warn!("Page {} resolved to an empty verse range.", page);
            return Ok((PageMeta::degenerate(page), verses));
        };
        let last = verses.last().unwrap_or(first);

        let first_juz = self.oracle.juz_of(first.id)?;
        let last_juz = self.oracle.juz_of(last.id)?;
        let meta = PageMeta {
            page,
            surah: first.surah.number,
            ayah: first.ayah,
            first_ayah_id: span.first_ayah_id,
            last_ayah_id: span.last_ayah_id,
            juz: (first_juz..=last_juz).collect(),
        };
        Ok((meta, verses))
    }

    /// The page containing a verse id. Binary search over the page spans,
    /// which partition the corpus in ascending order.
    pub fn page_of(&self, ayah_id: u32) -> PortResult<u16> {
        let mut low: u16 = 1;
        let mut high: u16 = TOTAL_PAGES;
        while low <= high {
            let mid = low + (high - low) / 2;
            let span = match self.oracle.resolve_page(mid) {
                Ok(span) => span,
                // A short oracle table: everything past its end sorts low.
                Err(PortError::OutOfRange(_)) => {
                    high = mid - 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if ayah_id < span.first_ayah_id {
                high = mid - 1;
            } else if ayah_id > span.last_ayah_id {
                low = mid + 1;
            } else {
                return Ok(mid);
            }
        }
        Err(PortError::NotFound(format!(
            "no page contains verse id {}",
            ayah_id
        )))
    }

    /// The chapter listing: one summary per surah, derived by a single
    /// corpus scan plus the inverse page lookup.
    pub async fn all_surahs(&self) -> PortResult<Vec<SurahSummary>> {
        let mut summaries = Vec::new();
        for (surah, first_ayah_id) in self.corpus.surah_index().await {
            summaries.push(SurahSummary {
                number: surah.number,
                name: surah.farsi,
                first_page: self.page_of(first_ayah_id)?,
            });
        }
        Ok(summaries)
    }
}
