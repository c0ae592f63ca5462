//! crates/tawakkul_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reading engine.
//! These structs are independent of any storage backend or transport.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed number of pages in the mushaf layout.
pub const TOTAL_PAGES: u16 = 604;

/// The number of juz partitions of the corpus.
pub const JUZ_COUNT: u8 = 30;

/// Edition key of the Arabic rendering carried by every verse.
pub const ARABIC_EDITION: &str = "arabic_enhanced";

/// Edition key of the default translation rendering.
pub const DEFAULT_TRANSLATION: &str = "farsi_makarem";

/// A chapter of the corpus, as carried inline on every verse record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surah {
    pub number: u16,
    pub persian_number: String,
    pub arabic: String,
    pub english: String,
    pub farsi: String,
}

/// A single immutable verse record from the corpus.
///
/// `id` is the global sequential verse number (1..N), strictly increasing
/// across surahs. `text` maps edition keys to renderings; the set of keys
/// is fixed per corpus build and always includes [`ARABIC_EDITION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub id: u32,
    pub id_persian: String,
    pub surah: Surah,
    pub ayah: u16,
    pub ayah_persian: String,
    #[serde(rename = "verse")]
    pub text: BTreeMap<String, String>,
}

impl Verse {
    /// The natural reference-text lookup key for this verse.
    pub fn verse_ref(&self) -> VerseRef {
        VerseRef {
            surah: self.surah.number,
            ayah: self.ayah,
        }
    }

    /// Looks up one rendering by edition key.
    pub fn rendering(&self, edition: &str) -> Option<&str> {
        self.text.get(edition).map(String::as_str)
    }

    /// The Arabic rendering, or the empty string if the build lacks it.
    pub fn arabic(&self) -> &str {
        self.rendering(ARABIC_EDITION).unwrap_or("")
    }
}

/// The pair (surah, ayah), serialized as `"surah:ayah"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerseRef {
    pub surah: u16,
    pub ayah: u16,
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surah, self.ayah)
    }
}

impl FromStr for VerseRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (surah, ayah) = s
            .split_once(':')
            .ok_or_else(|| format!("'{}' is not a surah:ayah reference", s))?;
        let surah = surah
            .parse::<u16>()
            .map_err(|e| format!("bad surah in '{}': {}", s, e))?;
        let ayah = ayah
            .parse::<u16>()
            .map_err(|e| format!("bad ayah in '{}': {}", s, e))?;
        Ok(Self { surah, ayah })
    }
}

/// The raw verse-id span of a page, as produced by the page-metadata oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub first_ayah_id: u32,
    pub last_ayah_id: u32,
}

/// Derived metadata for one page. Never persisted.
///
/// A degenerate value (all ids zero, empty juz list) signals that the
/// corpus yielded no verses for the resolved span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u16,
    pub surah: u16,
    pub ayah: u16,
    pub first_ayah_id: u32,
    pub last_ayah_id: u32,
    pub juz: Vec<u8>,
}

impl PageMeta {
    pub fn degenerate(page: u16) -> Self {
        Self {
            page,
            surah: 0,
            ayah: 0,
            first_ayah_id: 0,
            last_ayah_id: 0,
            juz: Vec::new(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.first_ayah_id == 0
    }
}

/// Everything the shell needs to render one page. Produced fresh on every
/// navigation.
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub page: u16,
    pub total_pages: u16,
    pub verses: Vec<Verse>,
    pub meta: PageMeta,
}

/// A one-line surah summary for the chapter listing.
#[derive(Debug, Clone, Serialize)]
pub struct SurahSummary {
    pub number: u16,
    pub name: String,
    pub first_page: u16,
}

/// Durable read-progress state.
///
/// Membership is idempotent: toggling is the only mutator. The page set
/// and the ayah set are linked one-directionally by the auto-complete
/// rule in [`ReadProgress::toggle_ayah`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadProgress {
    pub read_pages: BTreeSet<u16>,
    pub read_ayahs: BTreeSet<u32>,
}

impl ReadProgress {
    pub fn is_page_read(&self, page: u16) -> bool {
        self.read_pages.contains(&page)
    }

    pub fn is_ayah_read(&self, ayah_id: u32) -> bool {
        self.read_ayahs.contains(&ayah_id)
    }

    /// Flips page membership. Returns the new membership state.
    /// Has no effect on the ayah set.
    pub fn toggle_page(&mut self, page: u16) -> bool {
        if !self.read_pages.remove(&page) {
            self.read_pages.insert(page);
            true
        } else {
            false
        }
    }

    /// Flips ayah membership, then applies the auto-complete rule: when
    /// every id in `page_verse_ids` is a member afterwards, `page` joins
    /// the read-page set. The rule is one-directional on purpose:
    /// un-toggling an ayah never retracts a page.
    ///
    /// Returns `true` when the page was auto-marked by this call.
    pub fn toggle_ayah(&mut self, ayah_id: u32, page: u16, page_verse_ids: &[u32]) -> bool {
        if !self.read_ayahs.remove(&ayah_id) {
            self.read_ayahs.insert(ayah_id);
        }
        let all_read = !page_verse_ids.is_empty()
            && page_verse_ids.iter().all(|id| self.read_ayahs.contains(id));
        if all_read {
            self.read_pages.insert(page)
        } else {
            false
        }
    }

    /// Fraction of the 604 pages marked read, for display only.
    pub fn fraction(&self) -> f64 {
        self.read_pages.len() as f64 / TOTAL_PAGES as f64
    }
}

/// One entry of a reference-text JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub content: String,
}

/// The combined reference texts for one verse. Empty strings mean the
/// sub-source had nothing (or failed); both outcomes are cached alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceTexts {
    pub leader_commentary: String,
    pub occasion: String,
}

/// The optional source texts fed into one interpretation request.
/// Exegesis is always user-supplied, never auto-fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceTexts {
    pub leader_commentary: Option<String>,
    pub occasion: Option<String>,
    pub exegesis: Option<String>,
}

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Durable reader preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefs {
    pub current_page: u16,
    pub translation: String,
    pub theme: Theme,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            current_page: 1,
            translation: DEFAULT_TRANSLATION.to_string(),
            theme: Theme::default(),
        }
    }
}

/// A durably cached copy of the corpus, stamped with its fetch time so
/// stale copies can be treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusCache {
    pub fetched_at: DateTime<Utc>,
    pub verses: Vec<Verse>,
}
