// src/sources/mod.rs
pub mod hackernews;
pub mod reddit;

use crate::error::PollError;

/// One record pulled from a source, already reduced to what the rest of
/// the pipeline needs. Not retained after the poll cycle ends.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct Item {
    /// Source-native identifier; doubles as the replay key at dispatch.
    pub id: String,
    /// Type tag as the source reports it: "story", "comment", "post", ...
    pub kind: String,
    /// Native URL when the source has one, else a synthesized permalink.
    pub url: String,
    /// Normalized free text used for keyword filtering.
    pub text: String,
    /// Unix seconds, 0 when the source does not say.
    pub published_at: u64,
}

/// An [`Item`] bound to its notification destination. Exists only
/// transiently between the keyword filter and the dispatcher.
#[derive(Debug, Clone)]
pub struct Match {
    pub item: Item,
    pub channel: String,
}

/// One external source with its own pagination model.
///
/// `open` starts a walk over everything newer than `cursor`, oldest
/// first. The walk is lazy: items surface one at a time, so filtering
/// and dispatch interleave with fetching, and an abort mid-range leaves
/// the cursor where it was.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable id, also the cursor-store key for this instantiation.
    fn id(&self) -> &str;

    async fn open(
        &self,
        cursor: Option<&str>,
        keyword: &str,
    ) -> Result<Box<dyn ItemWalk + Send>, PollError>;
}

/// A finite, ordered pass over new items.
#[async_trait::async_trait]
pub trait ItemWalk: Send {
    /// Next item, oldest first. `Ok(None)` ends the walk.
    async fn next_item(&mut self) -> Result<Option<Item>, PollError>;

    /// Cursor to persist once the whole cycle has succeeded.
    /// `None` means "nothing to do" and no cursor write.
    fn end_cursor(&self) -> Option<String>;
}

/// Normalize text before filtering: decode HTML entities, strip tags,
/// collapse whitespace. Hacker News bodies and Reddit selftext both
/// arrive with markup in them.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Length cap: titles and bodies past this point add nothing to a
    // substring match.
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}
