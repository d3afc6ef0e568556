//! Hacker News connector backed by the Algolia search API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{clean_body, SourceConnector, SourcePost, SourceSettings, DEFAULT_EXTRA_RATIO};
use crate::error::SourceError;
use crate::types::{RawPost, Source};

const SEARCH_URL: &str = "https://hn.algolia.com/api/v1/search";
const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";
const MAX_HITS_PER_PAGE: usize = 100;
const COMMENT_TITLE_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HnItemKind {
    Story,
    Comment,
}

impl HnItemKind {
    fn tag(self) -> &'static str {
        match self {
            HnItemKind::Story => "story",
            HnItemKind::Comment => "comment",
        }
    }
}

/// A story or comment hit from Algolia.
#[derive(Debug, Clone, PartialEq)]
pub struct HackerNewsPost {
    pub object_id: String,
    pub kind: HnItemKind,
    pub title: Option<String>,
    pub story_title: Option<String>,
    /// `story_text` for stories, `comment_text` for comments.
    pub text: Option<String>,
    pub points: Option<i64>,
    pub num_comments: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
}

impl HackerNewsPost {
    pub(super) fn into_raw(self) -> RawPost {
        let title = match self.kind {
            HnItemKind::Story => self.title.unwrap_or_default(),
            HnItemKind::Comment => {
                let story: String = self
                    .story_title
                    .unwrap_or_default()
                    .chars()
                    .take(COMMENT_TITLE_CHARS)
                    .collect();
                format!("Comment on: {story}")
            }
        };
        RawPost {
            permalink: format!("{ITEM_URL}{}", self.object_id),
            source_id: self.object_id,
            source: Source::HackerNews,
            title,
            body: clean_body(self.text),
            raw_score: self.points.unwrap_or(0),
            comment_count: self.num_comments.unwrap_or(0),
            extra_ratio: DEFAULT_EXTRA_RATIO,
            created_at: self.created_at,
            community: "hackernews".to_string(),
            author: self.author.unwrap_or_else(|| "[unknown]".to_string()),
            matched_brand: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    story_title: Option<String>,
    story_text: Option<String>,
    comment_text: Option<String>,
    points: Option<i64>,
    num_comments: Option<u64>,
    created_at_i: i64,
    author: Option<String>,
}

impl Hit {
    fn into_post(self, kind: HnItemKind) -> Option<HackerNewsPost> {
        let created_at = DateTime::from_timestamp(self.created_at_i, 0)?;
        let text = match kind {
            HnItemKind::Story => self.story_text,
            HnItemKind::Comment => self.comment_text,
        };
        Some(HackerNewsPost {
            object_id: self.object_id,
            kind,
            title: self.title,
            story_title: self.story_title,
            text,
            points: self.points,
            num_comments: self.num_comments,
            created_at,
            author: self.author,
        })
    }
}

pub struct HackerNewsConnector {
    http: reqwest::Client,
    search_url: String,
    settings: SourceSettings,
}

impl HackerNewsConnector {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(settings: SourceSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("brandpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            search_url: SEARCH_URL.to_string(),
            settings,
        })
    }

    #[must_use]
    pub fn with_search_url(mut self, url: &str) -> Self {
        self.search_url = url.to_string();
        self
    }

    async fn search(
        &self,
        entity: &str,
        kind: HnItemKind,
        limit: usize,
    ) -> Result<Vec<HackerNewsPost>, SourceError> {
        let params = [
            ("query", entity.to_string()),
            ("tags", kind.tag().to_string()),
            (
                "hitsPerPage",
                limit.saturating_mul(2).min(MAX_HITS_PER_PAGE).to_string(),
            ),
            (
                "numericFilters",
                format!("created_at_i>{}", self.settings.min_timestamp()),
            ),
        ];

        let response = self.http.get(&self.search_url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::HackerNews(format!(
                "search ({}) failed with status {}",
                kind.tag(),
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::HackerNews(format!("search response parse error: {e}")))?;

        Ok(body
            .hits
            .into_iter()
            .filter_map(|hit| hit.into_post(kind))
            .collect())
    }
}

#[async_trait]
impl SourceConnector for HackerNewsConnector {
    fn source(&self) -> Source {
        Source::HackerNews
    }

    async fn fetch(&self, entity: &str, limit: usize) -> Result<Vec<SourcePost>, SourceError> {
        let min_ts = self.settings.min_timestamp();
        let mut posts = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for kind in [HnItemKind::Story, HnItemKind::Comment] {
            match self.search(entity, kind, limit).await {
                Ok(hits) => {
                    succeeded += 1;
                    for post in hits {
                        if posts.len() >= limit {
                            break;
                        }
                        // Algolia applies the filter too; re-check locally.
                        if post.created_at.timestamp() <= min_ts {
                            continue;
                        }
                        if seen.insert(post.object_id.clone()) {
                            posts.push(SourcePost::HackerNews(post));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        brand = entity,
                        source = %Source::HackerNews,
                        tag = kind.tag(),
                        error = %e,
                        "Hacker News search failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                tracing::debug!(brand = entity, count = posts.len(), "collected Hacker News posts");
                Ok(posts)
            }
        }
    }
}
