//! services/engine/src/progress.rs
//!
//! The durable read-progress store. The set rules themselves live on
//! `ReadProgress` in the core crate; this wrapper serializes toggles and
//! persists every mutation through the state-store port before returning.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use tawakkul_core::domain::ReadProgress;
use tawakkul_core::ports::{PortResult, StateStore};

/// Outcome of one ayah toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AyahToggle {
    pub ayah_read: bool,
    pub page_completed: bool,
}

pub struct ProgressStore {
    state: Arc<dyn StateStore>,
    progress: Mutex<ReadProgress>,
}

impl ProgressStore {
    /// Opens the store, reviving any previously persisted progress.
    pub async fn open(state: Arc<dyn StateStore>) -> PortResult<Self> {
        let progress = state.load_progress().await?.unwrap_or_default();
        info!(
            "Progress restored: {} pages, {} ayahs marked read.",
            progress.read_pages.len(),
            progress.read_ayahs.len()
        );
        Ok(Self {
            state,
            progress: Mutex::new(progress),
        })
    }

    pub async fn is_page_read(&self, page: u16) -> bool {
        self.progress.lock().await.is_page_read(page)
    }

    pub async fn is_ayah_read(&self, ayah_id: u32) -> bool {
        self.progress.lock().await.is_ayah_read(ayah_id)
    }

    /// Flips page membership and persists. Returns the new membership.
    pub async fn toggle_page_read(&self, page: u16) -> PortResult<bool> {
        let mut progress = self.progress.lock().await;
        let now_read = progress.toggle_page(page);
        self.state.save_progress(&progress).await?;
        Ok(now_read)
    }

    /// Flips ayah membership, applies the auto-complete rule against
    /// `page_verse_ids` (the full verse-id set of the owning page, which
    /// the caller is responsible for supplying), and persists.
    pub async fn toggle_ayah_read(
        &self,
        ayah_id: u32,
        page: u16,
        page_verse_ids: &[u32],
    ) -> PortResult<AyahToggle> {
        let mut progress = self.progress.lock().await;
        let page_completed = progress.toggle_ayah(ayah_id, page, page_verse_ids);
        let ayah_read = progress.is_ayah_read(ayah_id);
        self.state.save_progress(&progress).await?;
        if page_completed {
            info!("Every ayah of page {} is read; page auto-marked.", page);
        }
        Ok(AyahToggle {
            ayah_read,
            page_completed,
        })
    }

    /// Fraction of pages read, always in `[0, 1]`.
    pub async fn progress_fraction(&self) -> f64 {
        self.progress.lock().await.fraction()
    }

    pub async fn snapshot(&self) -> ReadProgress {
        self.progress.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStateStore;

    #[tokio::test]
    async fn toggles_persist_across_reopen() {
        let state = Arc::new(MemoryStateStore::default());
        {
            let store = ProgressStore::open(state.clone()).await.unwrap();
            store.toggle_page_read(12).await.unwrap();
            store.toggle_ayah_read(7, 2, &[6, 7]).await.unwrap();
        }
        let reopened = ProgressStore::open(state).await.unwrap();
        assert!(reopened.is_page_read(12).await);
        assert!(reopened.is_ayah_read(7).await);
    }

    #[tokio::test]
    async fn page_toggle_leaves_ayahs_untouched() {
        let store = ProgressStore::open(Arc::new(MemoryStateStore::default()))
            .await
            .unwrap();
        store.toggle_ayah_read(3, 1, &[1, 2, 3]).await.unwrap();
        assert!(store.toggle_page_read(1).await.unwrap());
        assert!(!store.toggle_page_read(1).await.unwrap());
        assert!(store.is_ayah_read(3).await);
    }

    #[tokio::test]
    async fn completing_a_page_reports_the_auto_mark() {
        let store = ProgressStore::open(Arc::new(MemoryStateStore::default()))
            .await
            .unwrap();
        let ids = [4u32, 5, 6];
        let first = store.toggle_ayah_read(5, 2, &ids).await.unwrap();
        assert!(first.ayah_read);
        assert!(!first.page_completed);

        store.toggle_ayah_read(4, 2, &ids).await.unwrap();
        let last = store.toggle_ayah_read(6, 2, &ids).await.unwrap();
        assert!(last.page_completed);
        assert!(store.is_page_read(2).await);

        // The rule is one-directional.
        let undone = store.toggle_ayah_read(5, 2, &ids).await.unwrap();
        assert!(!undone.ayah_read);
        assert!(store.is_page_read(2).await);
    }

    #[tokio::test]
    async fn fraction_reflects_the_page_set() {
        let store = ProgressStore::open(Arc::new(MemoryStateStore::default()))
            .await
            .unwrap();
        assert_eq!(store.progress_fraction().await, 0.0);
        store.toggle_page_read(1).await.unwrap();
        let fraction = store.progress_fraction().await;
        assert!(fraction > 0.0 && fraction < 1.0);
    }
}
