//! Recipe lookup collaborators
//!
//! A [`RecipeSource`] answers "give me the raw record for this id". It does
//! no normalization; that is the resolver's job.

use std::collections::HashMap;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::error::SourceError;
use crate::models::normalize_item_id;

/// Per-item recipe records. `Ok(None)` means the item does not exist,
/// which is a normal outcome rather than a failure.
#[allow(async_fn_in_trait)]
pub trait RecipeSource {
    async fn fetch(&self, item_id: &str) -> Result<Option<Value>, SourceError>;
}

impl<S: RecipeSource> RecipeSource for &S {
    async fn fetch(&self, item_id: &str) -> Result<Option<Value>, SourceError> {
        (**self).fetch(item_id).await
    }
}

/// In-memory records keyed by canonical id.
#[derive(Debug, Default, Clone)]
pub struct StaticRecipeSource {
    records: HashMap<String, Value>,
}

impl StaticRecipeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item_id: &str, record: Value) {
        self.records.insert(normalize_item_id(item_id), record);
    }

    pub fn with(mut self, item_id: &str, record: Value) -> Self {
        self.insert(item_id, record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecipeSource for StaticRecipeSource {
    async fn fetch(&self, item_id: &str) -> Result<Option<Value>, SourceError> {
        Ok(self.records.get(item_id).cloned())
    }
}

/// Fetches `{base_url}{ID}.json` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRecipeSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecipeSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, item_id: &str) -> String {
        format!("{}{}.json", self.base_url, item_id)
    }
}

impl RecipeSource for HttpRecipeSource {
    async fn fetch(&self, item_id: &str) -> Result<Option<Value>, SourceError> {
        let url = self.url_for(item_id);
        debug!(%url, "fetching recipe");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(Some(response.json::<Value>().await?))
    }
}
