//! services/engine/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use tokio::sync::Mutex;

use tawakkul_core::domain::Prefs;
use tawakkul_core::ports::StateStore;

use crate::corpus::CorpusStore;
use crate::interpret::{InterpretationOrchestrator, InterpretationState, ViewEpoch};
use crate::pages::PageResolver;
use crate::progress::ProgressStore;
use crate::references::ReferenceTextLoader;

/// The shared application state, created once at startup and passed to
/// all handlers. The stores are explicitly constructed instances, never
/// ambient globals, so tests can build isolated copies.
#[derive(Clone)]
pub struct AppState {
    pub corpus: Arc<CorpusStore>,
    pub resolver: Arc<PageResolver>,
    pub progress: Arc<ProgressStore>,
    pub references: Arc<ReferenceTextLoader>,
    pub orchestrator: Arc<InterpretationOrchestrator>,
    pub state_store: Arc<dyn StateStore>,
    /// Advanced on every page navigation; fences stale async results.
    pub epoch: ViewEpoch,
    /// The single ephemeral interpretation exchange being displayed.
    pub interpretation: Arc<Mutex<InterpretationState>>,
}

impl AppState {
    pub async fn prefs(&self) -> Prefs {
        self.state_store
            .load_prefs()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}
