//! Source connectors: producers of raw posts for a tracked entity.

mod hackernews;
mod reddit;

use std::sync::Arc;

use async_trait::async_trait;
use brandpulse_core::AppConfig;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{SetupError, SourceError};
use crate::types::{RawPost, Source};

pub use hackernews::{HackerNewsConnector, HackerNewsPost, HnItemKind};
pub use reddit::{RedditConnector, RedditPost, DEFAULT_SUBREDDITS};

/// Knobs shared by every connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    pub timeout_secs: u64,
    /// Posts created before January 1st of this year are discarded.
    pub min_post_year: i32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            min_post_year: 2020,
        }
    }
}

impl SourceSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.source_timeout_secs,
            min_post_year: config.min_post_year,
        }
    }

    /// Unix timestamp of the first second of `min_post_year`.
    #[must_use]
    pub fn min_timestamp(&self) -> i64 {
        NaiveDate::from_ymd_opt(self.min_post_year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(0, |dt| dt.and_utc().timestamp())
    }
}

/// A platform that can be searched for posts mentioning an entity.
///
/// Implementations return whatever they collected when only some requests
/// fail, and an error only when nothing could be fetched at all.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, entity: &str, limit: usize) -> Result<Vec<SourcePost>, SourceError>;
}

/// Connector-native post shapes, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePost {
    Reddit(RedditPost),
    HackerNews(HackerNewsPost),
}

impl SourcePost {
    #[must_use]
    pub fn source(&self) -> Source {
        match self {
            SourcePost::Reddit(_) => Source::Reddit,
            SourcePost::HackerNews(_) => Source::HackerNews,
        }
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            SourcePost::Reddit(p) => p.created_at,
            SourcePost::HackerNews(p) => p.created_at,
        }
    }

    /// Normalize into the pipeline's common shape. A missing quality ratio
    /// becomes `1.0` here and nowhere else.
    #[must_use]
    pub fn into_raw(self) -> RawPost {
        match self {
            SourcePost::Reddit(p) => p.into_raw(),
            SourcePost::HackerNews(p) => p.into_raw(),
        }
    }
}

/// Default `extra_ratio` for platforms without an upvote ratio.
pub const DEFAULT_EXTRA_RATIO: f64 = 1.0;

/// Build every connector the configuration enables.
///
/// Reddit is skipped with a warning when no credentials are configured.
///
/// # Errors
///
/// Returns [`SetupError::Http`] if an HTTP client cannot be constructed.
pub fn build_connectors(config: &AppConfig) -> Result<Vec<Arc<dyn SourceConnector>>, SetupError> {
    let settings = SourceSettings::from_app_config(config);
    let mut connectors: Vec<Arc<dyn SourceConnector>> = Vec::new();

    match &config.reddit {
        Some(credentials) => {
            connectors.push(Arc::new(RedditConnector::new(credentials.clone(), settings)?));
        }
        None => {
            tracing::warn!(
                source = %Source::Reddit,
                "REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET not set; Reddit source disabled"
            );
        }
    }

    connectors.push(Arc::new(HackerNewsConnector::new(settings)?));
    Ok(connectors)
}

/// Blank, `[deleted]` and `[removed]` bodies carry no text.
pub(crate) fn clean_body(body: Option<String>) -> Option<String> {
    body.map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty() && b != "[deleted]" && b != "[removed]")
}
