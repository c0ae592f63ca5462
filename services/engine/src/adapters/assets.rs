//! services/engine/src/adapters/assets.rs
//!
//! Fetches the static JSON documents the engine depends on: the verse
//! corpus, the page-index table and the two reference-text collections.
//! Implements the `CorpusSource` and `ReferenceSource` ports.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use tawakkul_core::domain::{ReferenceEntry, Verse};
use tawakkul_core::ports::{CorpusSource, PortError, PortResult, ReferenceSource};

use super::page_index::PageIndexFile;

/// An adapter over a static-asset host serving the build's JSON files.
#[derive(Clone)]
pub struct AssetClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssetClient {
    pub fn new(base_url: &str, timeout: Duration) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Fetch(format!("GET {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(PortError::Fetch(format!(
                "GET {} returned status {}",
                url,
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Fetch(format!("GET {} returned bad JSON: {}", url, e)))
    }

    /// The raw page-index table backing the page-metadata oracle.
    pub async fn fetch_page_index(&self) -> PortResult<PageIndexFile> {
        self.get_json("page-index.json").await
    }
}

#[async_trait]
impl CorpusSource for AssetClient {
    async fn fetch_corpus(&self) -> PortResult<Vec<Verse>> {
        self.get_json("quran.json").await
    }
}

#[async_trait]
impl ReferenceSource for AssetClient {
    async fn fetch_commentary_surah(
        &self,
        surah: u16,
    ) -> PortResult<HashMap<String, ReferenceEntry>> {
        self.get_json(&format!("khamenei-interpretations/{}.json", surah))
            .await
    }

    async fn fetch_occasions(&self) -> PortResult<HashMap<String, ReferenceEntry>> {
        self.get_json("saan-nuzul.json").await
    }
}
