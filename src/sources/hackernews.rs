// src/sources/hackernews.rs
//! Sequential-ID source: the Hacker News Firebase API. Items are
//! addressed by a monotonically increasing integer id, so "new since
//! last poll" is the id range `(cursor, maxitem]`, fetched one item per
//! request (the API has no batch endpoint).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PollError;
use crate::sources::{normalize_text, Item, ItemWalk, SourceAdapter};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

const SOURCE: &str = "hackernews";

/// Raw item payload as the Firebase API returns it. Deleted or missing
/// ids come back as JSON `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub time: Option<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

/// The two endpoints the walk needs. Seam for tests and for pointing at
/// a different base URL.
#[async_trait]
pub trait HnApi: Send + Sync {
    async fn max_item(&self) -> Result<u64, PollError>;
    async fn item(&self, id: u64) -> Result<Option<HnItem>, PollError>;
}

pub struct HttpHnApi {
    base: String,
    client: reqwest::Client,
}

impl HttpHnApi {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base(client, DEFAULT_BASE_URL)
    }

    pub fn with_base(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client,
        }
    }
}

#[async_trait]
impl HnApi for HttpHnApi {
    async fn max_item(&self) -> Result<u64, PollError> {
        let url = format!("{}/maxitem.json", self.base);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::fetch(SOURCE, e))?
            .error_for_status()
            .map_err(|e| PollError::fetch(SOURCE, e))?;
        resp.json::<u64>()
            .await
            .map_err(|e| PollError::fetch(SOURCE, e))
    }

    async fn item(&self, id: u64) -> Result<Option<HnItem>, PollError> {
        let url = format!("{}/item/{}.json", self.base, id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::fetch(SOURCE, e))?
            .error_for_status()
            .map_err(|e| PollError::fetch(SOURCE, e))?;
        resp.json::<Option<HnItem>>()
            .await
            .map_err(|e| PollError::fetch(SOURCE, e))
    }
}

pub struct HackerNewsSource {
    id: String,
    api: Arc<dyn HnApi>,
}

impl HackerNewsSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_api(SOURCE, Arc::new(HttpHnApi::new(client)))
    }

    pub fn with_api(id: impl Into<String>, api: Arc<dyn HnApi>) -> Self {
        Self { id: id.into(), api }
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(
        &self,
        cursor: Option<&str>,
        _keyword: &str,
    ) -> Result<Box<dyn ItemWalk + Send>, PollError> {
        let max = self.api.max_item().await?;

        // Cold start: no backfill. Baseline to the current max and walk
        // an empty range; cost is one request regardless of history.
        let floor = match cursor {
            None => max,
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| PollError::cursor(&self.id, format!("bad id {raw:?}: {e}")))?,
        };

        Ok(Box::new(IdWalk {
            api: Arc::clone(&self.api),
            next: floor.saturating_add(1),
            last: max,
            // The cursor never rewinds, even if the source reports a
            // smaller max than we have already processed.
            end: max.max(floor),
        }))
    }
}

/// Walks ids `[next, last]` ascending, fetching each item lazily.
struct IdWalk {
    api: Arc<dyn HnApi>,
    next: u64,
    last: u64,
    end: u64,
}

#[async_trait]
impl ItemWalk for IdWalk {
    async fn next_item(&mut self) -> Result<Option<Item>, PollError> {
        while self.next <= self.last {
            let id = self.next;
            self.next += 1;
            match self.api.item(id).await? {
                // Deleted/missing ids are skipped, not failed; the walk
                // keeps going.
                None => continue,
                Some(raw) if raw.deleted || raw.dead => continue,
                Some(raw) => return Ok(Some(item_from(raw))),
            }
        }
        Ok(None)
    }

    fn end_cursor(&self) -> Option<String> {
        Some(self.end.to_string())
    }
}

fn item_from(raw: HnItem) -> Item {
    let text = raw
        .title
        .as_deref()
        .or(raw.text.as_deref())
        .unwrap_or_default();
    Item {
        text: normalize_text(text),
        url: raw
            .url
            .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", raw.id)),
        id: raw.id.to_string(),
        kind: raw.kind.unwrap_or_else(|| "item".to_string()),
        published_at: raw.time.unwrap_or(0),
    }
}
