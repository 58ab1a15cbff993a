// src/sources/reddit.rs
//! Search-feed source: the Reddit OAuth search API. There is no id
//! arithmetic here; the cursor is the fullname of the newest item
//! already processed, passed back as the `before` pagination bound.
//! Two instantiations of this adapter run side by side, one for posts
//! and one for comments, each with its own cursor and channel.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PollError;
use crate::sources::{normalize_text, Item, ItemWalk, SourceAdapter};

pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_SEARCH_URL: &str = "https://oauth.reddit.com/search/";

const SOURCE: &str = "reddit";
const USER_AGENT: &str = "social-listening-bot/0.1";

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl RedditCredentials {
    /// All four secrets come from the environment; `None` when any is
    /// missing, which disables the Reddit pollers.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            client_id: std::env::var("REDDIT_PERSONAL_USE_SCRIPT").ok()?,
            client_secret: std::env::var("REDDIT_SECRET").ok()?,
            username: std::env::var("REDDIT_USERNAME").ok()?,
            password: std::env::var("REDDIT_PASSWORD").ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Posts,
    Comments,
}

impl SearchScope {
    /// Extra `type` query parameter; the posts search is the default
    /// shape and sends none.
    fn type_param(self) -> Option<&'static str> {
        match self {
            Self::Posts => None,
            Self::Comments => Some("comment"),
        }
    }

    pub fn kind_label(self) -> &'static str {
        match self {
            Self::Posts => "post",
            Self::Comments => "comment",
        }
    }
}

/// One entry of a search listing, reduced to the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub name: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub permalink: Option<String>,
    pub created_utc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: FeedEntry,
}

/// Decode a search response body into entries, newest-first as the API
/// returns them.
pub fn parse_listing(body: &str) -> Result<Vec<FeedEntry>, serde_json::Error> {
    let listing: Listing = serde_json::from_str(body)?;
    Ok(listing.data.children.into_iter().map(|c| c.data).collect())
}

/// The one call a cycle makes against Reddit. Seam for tests.
#[async_trait]
pub trait SearchFeed: Send + Sync {
    /// Fetch the newest-first page of results for `keyword`, bounded to
    /// items more recent than `before` when a cursor exists.
    async fn fetch_page(
        &self,
        keyword: &str,
        scope: SearchScope,
        before: Option<&str>,
    ) -> Result<Vec<FeedEntry>, PollError>;
}

pub struct HttpSearchFeed {
    client: reqwest::Client,
    creds: RedditCredentials,
    token_url: String,
    search_url: String,
}

impl HttpSearchFeed {
    pub fn new(client: reqwest::Client, creds: RedditCredentials) -> Self {
        Self {
            client,
            creds,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
        }
    }

    pub fn with_urls(
        mut self,
        token_url: impl Into<String>,
        search_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.search_url = search_url.into();
        self
    }

    /// Password-grant token exchange, once per poll cycle; a cycle
    /// either holds a fresh token or does not run at all.
    async fn authenticate(&self) -> Result<String, PollError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: Option<String>,
        }

        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&[
                ("grant_type", "password"),
                ("username", self.creds.username.as_str()),
                ("password", self.creds.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PollError::auth(SOURCE, e))?
            .error_for_status()
            .map_err(|e| PollError::auth(SOURCE, e))?;

        let token: TokenResponse = resp.json().await.map_err(|e| PollError::auth(SOURCE, e))?;
        token
            .access_token
            .ok_or_else(|| PollError::auth(SOURCE, "token exchange returned no access_token"))
    }
}

#[async_trait]
impl SearchFeed for HttpSearchFeed {
    async fn fetch_page(
        &self,
        keyword: &str,
        scope: SearchScope,
        before: Option<&str>,
    ) -> Result<Vec<FeedEntry>, PollError> {
        let token = self.authenticate().await?;

        let mut query: Vec<(&str, &str)> = vec![("q", keyword), ("sort", "new")];
        if let Some(t) = scope.type_param() {
            query.push(("type", t));
        }
        // Reddit's naming is inverted relative to time: `before` bounds
        // the listing to entries newer than the given fullname.
        if let Some(b) = before {
            query.push(("before", b));
        }

        let body = self
            .client
            .get(&self.search_url)
            .query(&query)
            .bearer_auth(&token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| PollError::fetch(SOURCE, e))?
            .error_for_status()
            .map_err(|e| PollError::fetch(SOURCE, e))?
            .text()
            .await
            .map_err(|e| PollError::fetch(SOURCE, e))?;

        parse_listing(&body).map_err(|e| PollError::fetch(SOURCE, format!("bad listing: {e}")))
    }
}

pub struct RedditSearchSource {
    id: String,
    scope: SearchScope,
    feed: Arc<dyn SearchFeed>,
}

impl RedditSearchSource {
    pub fn posts(client: reqwest::Client, creds: RedditCredentials) -> Self {
        Self::with_feed(
            "reddit_posts",
            SearchScope::Posts,
            Arc::new(HttpSearchFeed::new(client, creds)),
        )
    }

    pub fn comments(client: reqwest::Client, creds: RedditCredentials) -> Self {
        Self::with_feed(
            "reddit_comments",
            SearchScope::Comments,
            Arc::new(HttpSearchFeed::new(client, creds)),
        )
    }

    pub fn with_feed(id: impl Into<String>, scope: SearchScope, feed: Arc<dyn SearchFeed>) -> Self {
        Self {
            id: id.into(),
            scope,
            feed,
        }
    }
}

#[async_trait]
impl SourceAdapter for RedditSearchSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(
        &self,
        cursor: Option<&str>,
        keyword: &str,
    ) -> Result<Box<dyn ItemWalk + Send>, PollError> {
        let page = self.feed.fetch_page(keyword, self.scope, cursor).await?;

        // The page arrives newest-first; emission must be oldest-first
        // so the cursor lands on the newest item last.
        let items: VecDeque<Item> = page
            .into_iter()
            .rev()
            .map(|e| item_from(e, self.scope))
            .collect();

        // An empty page means "nothing to do": the cursor stays put.
        let end = items.back().map(|i| i.id.clone());

        Ok(Box::new(FeedWalk { items, end }))
    }
}

struct FeedWalk {
    items: VecDeque<Item>,
    end: Option<String>,
}

#[async_trait]
impl ItemWalk for FeedWalk {
    async fn next_item(&mut self) -> Result<Option<Item>, PollError> {
        Ok(self.items.pop_front())
    }

    fn end_cursor(&self) -> Option<String> {
        self.end.clone()
    }
}

fn item_from(entry: FeedEntry, scope: SearchScope) -> Item {
    let text = entry
        .title
        .as_deref()
        .or(entry.body.as_deref())
        .unwrap_or_default();
    let url = entry
        .url
        .or_else(|| entry.permalink.map(|p| format!("https://www.reddit.com{p}")))
        .unwrap_or_else(|| format!("https://www.reddit.com/by_id/{}", entry.name));
    Item {
        text: normalize_text(text),
        url,
        id: entry.name,
        kind: scope.kind_label().to_string(),
        published_at: entry.created_utc.map(|t| t as u64).unwrap_or(0),
    }
}
