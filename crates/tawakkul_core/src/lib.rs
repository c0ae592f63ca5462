pub mod domain;
pub mod ports;

pub use domain::{
    CorpusCache, PageData, PageMeta, PageSpan, Prefs, ReadProgress, ReferenceEntry,
    ReferenceTexts, SourceTexts, Surah, SurahSummary, Theme, Verse, VerseRef, JUZ_COUNT,
    TOTAL_PAGES,
};
pub use ports::{
    CorpusSource, GenerationService, PageMetaOracle, PortError, PortResult, ReferenceSource,
    StateStore, TextStream,
};
