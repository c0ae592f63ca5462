//! services/engine/src/interpret.rs
//!
//! Composes one labeled prompt document per interpretation request and
//! drives the generation endpoint, surfacing the response as an ordered,
//! finite sequence of text increments. A regenerate is always a brand-new
//! exchange; stale exchanges are fenced off by [`ViewEpoch`].

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use tawakkul_core::domain::{SourceTexts, Verse, VerseRef};
use tawakkul_core::ports::{GenerationService, PortError, PortResult};

/// The built-in instruction template, user-overridable per request.
pub const DEFAULT_PROMPT: &str = "\
Analyze the provided Quran verse and its Islamic interpretations, and then:
* Provide a detailed, comprehensive, yet concise explanation.
* Rely ONLY on the content inside the <quran-verse> and <interpretation> tags.
* Respond in Persian, using an active and direct style.
* Be truthful and base your response solely on the provided content.
";

/// Fixed user-facing text shown in place of the interpretation when the
/// exchange fails. Replaces any partial streamed content.
pub const FAILURE_MESSAGE: &str = "خطا در دریافت تفسیر هوش مصنوعی";

/// Fixed text for an exchange that succeeded but produced nothing.
pub const EMPTY_RESULT_MESSAGE: &str = "تفسیری یافت نشد";

const LEADER_AUTHOR: &str = "Ayatollah Seyyed Ali Khamenei";
const EXEGESIS_AUTHOR: &str = "Allameh Mohammad Hossein Tabatabaei";

/// One element of an interpretation exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretationChunk {
    /// An ordered text increment.
    Delta(String),
    /// Terminal failure; carries the fixed user-facing message.
    Failure(&'static str),
}

pub type InterpretationStream = Pin<Box<dyn Stream<Item = InterpretationChunk> + Send>>;

/// Builds the single structured document submitted to the endpoint.
/// Section order is fixed: verse, occasion of revelation, leader
/// commentary, exegesis, instruction template. Empty sources are omitted.
pub fn compose_document(
    verse_text: &str,
    verse_ref: VerseRef,
    sources: &SourceTexts,
    prompt: &str,
) -> String {
    let mut document = format!(
        "\n<quran-verse surah=\"{}\" ayah=\"{}\">\n{}\n</quran-verse>\n",
        verse_ref.surah, verse_ref.ayah, verse_text
    );
    if let Some(occasion) = non_empty(&sources.occasion) {
        document.push_str(&format!(
            "\n<occasion-of-revelation>\n{}\n</occasion-of-revelation>\n",
            occasion
        ));
    }
    if let Some(commentary) = non_empty(&sources.leader_commentary) {
        document.push_str(&format!(
            "\n<interpretation author=\"{}\">\n{}\n</interpretation>\n",
            LEADER_AUTHOR, commentary
        ));
    }
    if let Some(exegesis) = non_empty(&sources.exegesis) {
        document.push_str(&format!(
            "\n<interpretation author=\"{}\">\n{}\n</interpretation>\n",
            EXEGESIS_AUTHOR, exegesis
        ));
    }
    document.push_str(&format!("\n\n{}\n", prompt));
    document
}

fn non_empty(source: &Option<String>) -> Option<&str> {
    source.as_deref().filter(|s| !s.trim().is_empty())
}

pub struct InterpretationOrchestrator {
    generation: Arc<dyn GenerationService>,
    streaming: bool,
}

impl InterpretationOrchestrator {
    pub fn new(generation: Arc<dyn GenerationService>, streaming: bool) -> Self {
        Self {
            generation,
            streaming,
        }
    }

    /// Starts one interpretation exchange for a verse.
    ///
    /// The returned sequence is finite and not restartable; concatenating
    /// its deltas in order yields the final interpretation text. Endpoint
    /// failures surface as a single terminal [`InterpretationChunk::Failure`];
    /// there is no automatic retry.
    pub fn request(
        &self,
        verse: &Verse,
        prompt_override: Option<&str>,
        sources: &SourceTexts,
    ) -> PortResult<InterpretationStream> {
        let verse_text = verse.arabic().to_string();
        if verse_text.trim().is_empty() {
            return Err(PortError::Unexpected(format!(
                "verse {} has no Arabic rendering",
                verse.id
            )));
        }
        let prompt = match prompt_override.filter(|p| !p.trim().is_empty()) {
            Some(custom) => custom.to_string(),
            None => DEFAULT_PROMPT.to_string(),
        };
        let document = compose_document(&verse_text, verse.verse_ref(), sources, &prompt);
        info!(
            "Interpretation requested for {} ({} streaming).",
            verse.verse_ref(),
            if self.streaming { "with" } else { "without" }
        );

        let generation = self.generation.clone();
        let streaming = self.streaming;
        Ok(Box::pin(async_stream::stream! {
            if streaming {
                match generation.generate_streaming(&document).await {
                    Ok(mut increments) => {
                        let mut produced = false;
                        let mut failed = false;
                        while let Some(item) = increments.next().await {
                            match item {
                                Ok(chunk) => {
                                    if !chunk.is_empty() {
                                        produced = true;
                                        yield InterpretationChunk::Delta(chunk);
                                    }
                                }
                                Err(e) => {
                                    warn!("Interpretation stream broke off: {}", e);
                                    failed = true;
                                    yield InterpretationChunk::Failure(FAILURE_MESSAGE);
                                    break;
                                }
                            }
                        }
                        if !failed && !produced {
                            yield InterpretationChunk::Delta(EMPTY_RESULT_MESSAGE.to_string());
                        }
                    }
                    Err(e) => {
                        warn!("Interpretation request failed: {}", e);
                        yield InterpretationChunk::Failure(FAILURE_MESSAGE);
                    }
                }
            } else {
                match generation.generate(&document).await {
                    Ok(text) if text.is_empty() => {
                        yield InterpretationChunk::Delta(EMPTY_RESULT_MESSAGE.to_string());
                    }
                    Ok(text) => yield InterpretationChunk::Delta(text),
                    Err(e) => {
                        warn!("Interpretation request failed: {}", e);
                        yield InterpretationChunk::Failure(FAILURE_MESSAGE);
                    }
                }
            }
        }))
    }
}

/// Drains an exchange, returning the final text and whether it failed.
pub async fn collect(mut stream: InterpretationStream) -> (String, bool) {
    let mut text = String::new();
    let mut failed = false;
    while let Some(chunk) = stream.next().await {
        match chunk {
            InterpretationChunk::Delta(delta) => text.push_str(&delta),
            InterpretationChunk::Failure(message) => {
                text = message.to_string();
                failed = true;
            }
        }
    }
    (text, failed)
}

//=========================================================================================
// View epoch and per-verse request lifecycle
//=========================================================================================

/// A monotone counter advanced on every verse navigation. Async
/// consumers capture the epoch at dispatch time and drop results whose
/// epoch has since advanced, so a late response for an abandoned verse
/// can never overwrite the currently displayed one.
#[derive(Clone, Default)]
pub struct ViewEpoch {
    counter: Arc<AtomicU64>,
}

impl ViewEpoch {
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Advances the epoch, invalidating all previously captured tokens.
    pub fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.current() == token
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationStatus {
    #[default]
    Idle,
    Requested,
    Streaming,
    Complete,
    Error,
}

/// Ephemeral per-verse request state, reset whenever the displayed verse
/// changes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterpretationState {
    pub verse_ref: Option<String>,
    pub status: InterpretationStatus,
    pub text: String,
}

impl InterpretationState {
    pub fn begin(&mut self, verse_ref: VerseRef) {
        self.verse_ref = Some(verse_ref.to_string());
        self.status = InterpretationStatus::Requested;
        self.text.clear();
    }

    pub fn apply(&mut self, chunk: &InterpretationChunk) {
        match chunk {
            InterpretationChunk::Delta(delta) => {
                self.status = InterpretationStatus::Streaming;
                self.text.push_str(delta);
            }
            InterpretationChunk::Failure(message) => {
                self.status = InterpretationStatus::Error;
                self.text = message.to_string();
            }
        }
    }

    pub fn finish(&mut self) {
        if matches!(
            self.status,
            InterpretationStatus::Requested | InterpretationStatus::Streaming
        ) {
            self.status = InterpretationStatus::Complete;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_verse, StubGenerationService};

    fn sources_all() -> SourceTexts {
        SourceTexts {
            leader_commentary: Some("تفسیر رهبری".to_string()),
            occasion: Some("شأن نزول".to_string()),
            exegesis: Some("المیزان".to_string()),
        }
    }

    #[test]
    fn document_sections_appear_in_fixed_order() {
        let vr = VerseRef { surah: 2, ayah: 255 };
        let doc = compose_document("آية الكرسي", vr, &sources_all(), DEFAULT_PROMPT);

        let verse_at = doc.find("<quran-verse surah=\"2\" ayah=\"255\">").unwrap();
        let occasion_at = doc.find("<occasion-of-revelation>").unwrap();
        let leader_at = doc.find(LEADER_AUTHOR).unwrap();
        let exegesis_at = doc.find(EXEGESIS_AUTHOR).unwrap();
        let prompt_at = doc.find("Analyze the provided Quran verse").unwrap();
        assert!(verse_at < occasion_at);
        assert!(occasion_at < leader_at);
        assert!(leader_at < exegesis_at);
        assert!(exegesis_at < prompt_at);
    }

    #[test]
    fn empty_sources_are_omitted() {
        let vr = VerseRef { surah: 1, ayah: 1 };
        let sources = SourceTexts {
            leader_commentary: Some("  ".to_string()),
            occasion: None,
            exegesis: None,
        };
        let doc = compose_document("بسم الله", vr, &sources, DEFAULT_PROMPT);
        assert!(!doc.contains("<interpretation"));
        assert!(!doc.contains("<occasion-of-revelation>"));
    }

    #[tokio::test]
    async fn streaming_concatenation_matches_whole_response() {
        let chunks = ["تفسیر ", "این ", "آیه"];
        let verse = test_verse(1);
        let sources = sources_all();

        let streamed = InterpretationOrchestrator::new(
            Arc::new(StubGenerationService::replaying(&chunks)),
            true,
        );
        let whole = InterpretationOrchestrator::new(
            Arc::new(StubGenerationService::replaying(&chunks)),
            false,
        );

        let (streamed_text, streamed_failed) =
            collect(streamed.request(&verse, None, &sources).unwrap()).await;
        let (whole_text, whole_failed) =
            collect(whole.request(&verse, None, &sources).unwrap()).await;
        assert_eq!(streamed_text, whole_text);
        assert_eq!(streamed_text, "تفسیر این آیه");
        assert!(!streamed_failed && !whole_failed);
    }

    #[tokio::test]
    async fn endpoint_failure_yields_the_fixed_message() {
        let orchestrator =
            InterpretationOrchestrator::new(Arc::new(StubGenerationService::failing()), true);
        let verse = test_verse(3);
        let mut stream = orchestrator
            .request(&verse, None, &SourceTexts::default())
            .unwrap();
        assert_eq!(
            stream.next().await,
            Some(InterpretationChunk::Failure(FAILURE_MESSAGE))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn empty_output_maps_to_nothing_found() {
        let orchestrator =
            InterpretationOrchestrator::new(Arc::new(StubGenerationService::replaying(&[])), true);
        let verse = test_verse(2);
        let (text, failed) = collect(
            orchestrator
                .request(&verse, None, &SourceTexts::default())
                .unwrap(),
        )
        .await;
        assert_eq!(text, EMPTY_RESULT_MESSAGE);
        assert!(!failed);
    }

    #[tokio::test]
    async fn verse_without_arabic_text_is_rejected() {
        let orchestrator =
            InterpretationOrchestrator::new(Arc::new(StubGenerationService::replaying(&[])), true);
        let mut verse = test_verse(1);
        verse.text.clear();
        assert!(orchestrator
            .request(&verse, None, &SourceTexts::default())
            .is_err());
    }

    #[test]
    fn custom_prompt_replaces_the_template() {
        let vr = VerseRef { surah: 1, ayah: 2 };
        let doc = compose_document("متن", vr, &SourceTexts::default(), "پاسخ کوتاه بده");
        assert!(doc.contains("پاسخ کوتاه بده"));
        assert!(!doc.contains("Analyze the provided Quran verse"));
    }

    #[test]
    fn advancing_the_epoch_invalidates_captured_tokens() {
        let epoch = ViewEpoch::default();
        let token = epoch.current();
        assert!(epoch.is_current(token));
        epoch.advance();
        assert!(!epoch.is_current(token));
        assert!(epoch.is_current(epoch.current()));
    }

    #[test]
    fn request_lifecycle_transitions() {
        let mut state = InterpretationState::default();
        assert_eq!(state.status, InterpretationStatus::Idle);

        state.begin(VerseRef { surah: 1, ayah: 1 });
        assert_eq!(state.status, InterpretationStatus::Requested);

        state.apply(&InterpretationChunk::Delta("الف".to_string()));
        state.apply(&InterpretationChunk::Delta(" ب".to_string()));
        assert_eq!(state.status, InterpretationStatus::Streaming);
        assert_eq!(state.text, "الف ب");

        state.finish();
        assert_eq!(state.status, InterpretationStatus::Complete);

        state.apply(&InterpretationChunk::Failure(FAILURE_MESSAGE));
        assert_eq!(state.status, InterpretationStatus::Error);
        assert_eq!(state.text, FAILURE_MESSAGE);

        state.reset();
        assert_eq!(state.status, InterpretationStatus::Idle);
        assert!(state.verse_ref.is_none());
    }
}
