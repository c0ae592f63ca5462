//! services/engine/src/web/rest.rs
//!
//! Axum handlers for the engine's REST and SSE endpoints. This layer is
//! the stand-in for the presentation shell: it only translates between
//! HTTP and the engine components.

use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use tawakkul_core::domain::{Prefs, SourceTexts, VerseRef, TOTAL_PAGES};
use tawakkul_core::ports::PortError;

use crate::interpret::{InterpretationChunk, InterpretationState, InterpretationStream, ViewEpoch};
use crate::web::state::AppState;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize)]
pub struct ProgressResponse {
    pub fraction: f64,
    pub read_pages: Vec<u16>,
    pub read_ayahs: Vec<u32>,
}

#[derive(Serialize)]
pub struct PageToggleResponse {
    pub page: u16,
    pub read: bool,
}

#[derive(Serialize)]
pub struct AyahToggleResponse {
    pub ayah_id: u32,
    pub page: u16,
    pub ayah_read: bool,
    pub page_completed: bool,
}

/// The request payload for starting an interpretation exchange.
#[derive(Deserialize)]
pub struct InterpretationRequestBody {
    pub verse_id: u32,
    /// Replaces the built-in instruction template when present.
    pub prompt: Option<String>,
    /// User-supplied scholarly exegesis; never auto-fetched.
    pub exegesis: Option<String>,
}

fn ensure_page_in_range(page: u16) -> Result<(), PortError> {
    if (1..=TOTAL_PAGES).contains(&page) {
        Ok(())
    } else {
        Err(PortError::OutOfRange(page))
    }
}

fn port_error(e: PortError) -> (StatusCode, String) {
    let status = match &e {
        PortError::OutOfRange(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", e);
    }
    (status, e.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns one page of verses. Navigating also persists the current page,
/// advances the view epoch and resets the displayed interpretation.
pub async fn get_page_handler(
    State(app_state): State<Arc<AppState>>,
    Path(page): Path<u16>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let data = app_state.resolver.page_data(page).await.map_err(port_error)?;

    app_state.epoch.advance();
    {
        let mut interpretation = app_state.interpretation.lock().await;
        if let Some(previous) = interpretation.verse_ref.as_deref() {
            if let Ok(verse_ref) = VerseRef::from_str(previous) {
                app_state.references.cancel(verse_ref);
            }
        }
        interpretation.reset();
    }

    let mut prefs = app_state.prefs().await;
    prefs.current_page = page;
    if let Err(e) = app_state.state_store.save_prefs(&prefs).await {
        error!("Could not persist the current page: {}", e);
    }

    Ok(Json(data))
}

pub async fn list_surahs_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let surahs = app_state.resolver.all_surahs().await.map_err(port_error)?;
    Ok(Json(surahs))
}

pub async fn get_progress_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = app_state.progress.snapshot().await;
    Json(ProgressResponse {
        fraction: snapshot.fraction(),
        read_pages: snapshot.read_pages.into_iter().collect(),
        read_ayahs: snapshot.read_ayahs.into_iter().collect(),
    })
}

pub async fn toggle_page_handler(
    State(app_state): State<Arc<AppState>>,
    Path(page): Path<u16>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_page_in_range(page).map_err(port_error)?;
    let read = app_state
        .progress
        .toggle_page_read(page)
        .await
        .map_err(port_error)?;
    Ok(Json(PageToggleResponse { page, read }))
}

/// Toggles one ayah. The owning page and its full verse-id set are
/// resolved here so the auto-complete rule always sees the right page.
pub async fn toggle_ayah_handler(
    State(app_state): State<Arc<AppState>>,
    Path(ayah_id): Path<u32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = app_state.resolver.page_of(ayah_id).map_err(port_error)?;
    let data = app_state.resolver.page_data(page).await.map_err(port_error)?;
    let page_verse_ids: Vec<u32> = data.verses.iter().map(|v| v.id).collect();

    let outcome = app_state
        .progress
        .toggle_ayah_read(ayah_id, page, &page_verse_ids)
        .await
        .map_err(port_error)?;
    Ok(Json(AyahToggleResponse {
        ayah_id,
        page,
        ayah_read: outcome.ayah_read,
        page_completed: outcome.page_completed,
    }))
}

pub async fn get_references_handler(
    State(app_state): State<Arc<AppState>>,
    Path((surah, ayah)): Path<(u16, u16)>,
) -> impl IntoResponse {
    let texts = app_state.references.request(VerseRef { surah, ayah }).await;
    Json(texts)
}

pub async fn get_prefs_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.prefs().await)
}

pub async fn put_prefs_handler(
    State(app_state): State<Arc<AppState>>,
    Json(prefs): Json<Prefs>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    ensure_page_in_range(prefs.current_page).map_err(port_error)?;
    app_state
        .state_store
        .save_prefs(&prefs)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Interpretation SSE Handler
//=========================================================================================

/// Starts one interpretation exchange and streams its increments as
/// server-sent events. The epoch token is captured at dispatch; once the
/// user navigates away, remaining increments are dropped instead of being
/// applied to the newly displayed page.
pub async fn interpretation_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<InterpretationRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let verse = app_state
        .corpus
        .verse_by_id(body.verse_id)
        .await
        .ok_or_else(|| {
            port_error(PortError::NotFound(format!(
                "no verse with id {}",
                body.verse_id
            )))
        })?;
    let verse_ref = verse.verse_ref();
    let token = app_state.epoch.current();

    // The reference texts are fetched (or served from cache) before the
    // exchange; an identical auto-load already in flight is joined, not
    // duplicated.
    let references = app_state.references.request(verse_ref).await;
    let sources = SourceTexts {
        leader_commentary: Some(references.leader_commentary),
        occasion: Some(references.occasion),
        exegesis: body.exegesis,
    };

    app_state.interpretation.lock().await.begin(verse_ref);
    info!("Interpretation exchange opened for {}.", verse_ref);

    let chunks = app_state
        .orchestrator
        .request(&verse, body.prompt.as_deref(), &sources)
        .map_err(port_error)?;

    let events = fenced_event_stream(
        app_state.epoch.clone(),
        token,
        verse_ref,
        chunks,
        app_state.interpretation.clone(),
    );
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Drains one exchange into SSE events, applying each increment to the
/// displayed interpretation. The token was captured at dispatch; once the
/// epoch advances past it the remaining increments are dropped and the
/// exchange is never marked complete.
fn fenced_event_stream(
    epoch: ViewEpoch,
    token: u64,
    verse_ref: VerseRef,
    mut chunks: InterpretationStream,
    interpretation: Arc<Mutex<InterpretationState>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(chunk) = chunks.next().await {
            if !epoch.is_current(token) {
                info!("Dropping stale interpretation increments for {}.", verse_ref);
                return;
            }
            interpretation.lock().await.apply(&chunk);
            match chunk {
                InterpretationChunk::Delta(delta) => {
                    yield Ok(Event::default().event("delta").data(delta));
                }
                InterpretationChunk::Failure(message) => {
                    yield Ok(Event::default().event("error").data(message));
                }
            }
        }
        if epoch.is_current(token) {
            interpretation.lock().await.finish();
            yield Ok(Event::default().event("done").data(""));
        }
    }
}
