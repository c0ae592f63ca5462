//! services/engine/src/bin/engine.rs

use engine_lib::{
    adapters::{
        assets::AssetClient, fs_state::FsStateStore, generation::OpenAiGenerationAdapter,
        page_index::PageIndex,
    },
    config::Config,
    corpus::CorpusStore,
    error::EngineError,
    interpret::{InterpretationOrchestrator, InterpretationState, ViewEpoch},
    pages::PageResolver,
    progress::ProgressStore,
    references::ReferenceTextLoader,
    web::{
        get_page_handler, get_prefs_handler, get_progress_handler, get_references_handler,
        interpretation_handler, list_surahs_handler, put_prefs_handler, state::AppState,
        toggle_ayah_handler, toggle_page_handler,
    },
};

use async_openai::{config::OpenAIConfig, Client};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting engine...");

    // --- 2. Durable State & Static Assets ---
    let state_store = Arc::new(FsStateStore::new(&config.state_dir)?);
    let assets = Arc::new(AssetClient::new(
        &config.asset_base_url,
        config.fetch_timeout,
    )?);

    info!("Loading page index...");
    let page_index = Arc::new(PageIndex::new(assets.fetch_page_index().await?)?);

    // A corpus failure here is fatal: the shell shows a blocking error
    // state instead of content, with no automatic retry.
    info!("Loading verse corpus...");
    let corpus = Arc::new(CorpusStore::new(assets.clone(), state_store.clone()));
    corpus.load().await?;
    info!("Corpus ready ({} verses).", corpus.verse_count().await);

    // --- 3. Core Components ---
    let resolver = Arc::new(PageResolver::new(page_index, corpus.clone()));
    let progress = Arc::new(ProgressStore::open(state_store.clone()).await?);
    let references = Arc::new(ReferenceTextLoader::new(assets.clone()));

    let openai_config = OpenAIConfig::new()
        .with_api_base(&config.ai_base_url)
        .with_api_key(config.ai_api_key.clone().unwrap_or_default());
    let generation = Arc::new(OpenAiGenerationAdapter::new(
        Client::with_config(openai_config),
        config.ai_model.clone(),
        config.ai_temperature,
    ));
    let orchestrator = Arc::new(InterpretationOrchestrator::new(
        generation,
        config.ai_streaming,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        corpus,
        resolver,
        progress,
        references,
        orchestrator,
        state_store,
        epoch: ViewEpoch::default(),
        interpretation: Arc::new(Mutex::new(InterpretationState::default())),
    });

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .route("/pages/{n}", get(get_page_handler))
        .route("/surahs", get(list_surahs_handler))
        .route("/progress", get(get_progress_handler))
        .route("/progress/pages/{n}/toggle", post(toggle_page_handler))
        .route("/progress/ayahs/{id}/toggle", post(toggle_ayah_handler))
        .route("/references/{surah}/{ayah}", get(get_references_handler))
        .route("/interpretations", post(interpretation_handler))
        .route("/prefs", get(get_prefs_handler).put(put_prefs_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // --- 6. Start the Server ---
    info!("Starting engine on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
