//! Reddit search connector (client-credentials OAuth).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use brandpulse_core::RedditCredentials;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{clean_body, SourceConnector, SourcePost, SourceSettings};
use crate::error::SourceError;
use crate::types::{RawPost, Source};

/// Advertising and marketing communities searched for mentions.
pub const DEFAULT_SUBREDDITS: &[&str] = &[
    "advertising",
    "marketing",
    "PPC",
    "adops",
    "programmatic",
    "digital_marketing",
    "adtech",
    "startups",
    "technology",
    "business",
    "socialmediamarketing",
];

const SORTS: [&str; 3] = ["new", "hot", "relevance"];
const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_URL: &str = "https://oauth.reddit.com";
const WEB_URL: &str = "https://www.reddit.com";
/// Reddit caps a single listing page at 100 items.
const MAX_PAGE: usize = 100;

/// A Reddit submission as returned by the search listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub selftext: Option<String>,
    pub score: i64,
    pub num_comments: u64,
    pub upvote_ratio: Option<f64>,
    pub created_at: DateTime<Utc>,
    /// Path relative to reddit.com, e.g. `/r/adops/comments/abc/...`.
    pub permalink: String,
    pub subreddit: String,
    pub author: String,
}

impl RedditPost {
    pub(super) fn into_raw(self) -> RawPost {
        let permalink = if self.permalink.starts_with("http") {
            self.permalink
        } else {
            format!("{WEB_URL}{}", self.permalink)
        };
        RawPost {
            source_id: self.id,
            source: Source::Reddit,
            title: self.title,
            body: clean_body(self.selftext),
            raw_score: self.score,
            comment_count: self.num_comments,
            extra_ratio: self
                .upvote_ratio
                .map_or(super::DEFAULT_EXTRA_RATIO, |r| r.clamp(0.0, 1.0)),
            created_at: self.created_at,
            permalink,
            community: self.subreddit,
            author: self.author,
            matched_brand: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: ChildData,
}

#[derive(Debug, Deserialize)]
struct ChildData {
    id: String,
    #[serde(default)]
    title: String,
    selftext: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    upvote_ratio: Option<f64>,
    created_utc: f64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    subreddit: String,
    author: Option<String>,
}

impl ChildData {
    #[allow(clippy::cast_possible_truncation)]
    fn into_post(self) -> Option<RedditPost> {
        let created_at = DateTime::from_timestamp(self.created_utc as i64, 0)?;
        Some(RedditPost {
            id: self.id,
            title: self.title,
            selftext: self.selftext,
            score: self.score,
            num_comments: self.num_comments,
            upvote_ratio: self.upvote_ratio,
            created_at,
            permalink: self.permalink,
            subreddit: self.subreddit,
            author: self.author.unwrap_or_else(|| "[deleted]".to_string()),
        })
    }
}

pub struct RedditConnector {
    http: reqwest::Client,
    credentials: RedditCredentials,
    auth_url: String,
    api_url: String,
    subreddits: Vec<String>,
    settings: SourceSettings,
    token: Mutex<Option<String>>,
}

impl RedditConnector {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(
        credentials: RedditCredentials,
        settings: SourceSettings,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(credentials.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            credentials,
            auth_url: AUTH_URL.to_string(),
            api_url: API_URL.to_string(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(ToString::to_string).collect(),
            settings,
            token: Mutex::new(None),
        })
    }

    /// Point the connector at other endpoints (used by tests).
    #[must_use]
    pub fn with_base_urls(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_subreddits(mut self, subreddits: Vec<String>) -> Self {
        self.subreddits = subreddits;
        self
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Reddit(format!(
                "token exchange failed with status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Reddit(format!("token parse error: {e}")))?;

        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    async fn search(
        &self,
        token: &str,
        entity: &str,
        sort: &str,
        limit: usize,
    ) -> Result<Vec<RedditPost>, SourceError> {
        let endpoint = format!("{}/r/{}/search", self.api_url, self.subreddits.join("+"));
        let params = [
            ("q", format!("\"{entity}\"")),
            ("restrict_sr", "true".to_string()),
            ("sort", sort.to_string()),
            ("t", "all".to_string()),
            ("type", "link".to_string()),
            ("limit", limit.min(MAX_PAGE).to_string()),
            ("raw_json", "1".to_string()),
        ];

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.forget_token().await;
        }
        if !status.is_success() {
            return Err(SourceError::Reddit(format!(
                "search ({sort}) failed with status {status}"
            )));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| SourceError::Reddit(format!("search response parse error: {e}")))?;

        Ok(listing
            .data
            .children
            .into_iter()
            .filter_map(|child| child.data.into_post())
            .collect())
    }
}

#[async_trait]
impl SourceConnector for RedditConnector {
    fn source(&self) -> Source {
        Source::Reddit
    }

    async fn fetch(&self, entity: &str, limit: usize) -> Result<Vec<SourcePost>, SourceError> {
        let token = self.access_token().await?;
        let min_ts = self.settings.min_timestamp();

        let mut posts = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for sort in SORTS {
            if posts.len() >= limit {
                break;
            }
            match self.search(&token, entity, sort, limit).await {
                Ok(page) => {
                    succeeded += 1;
                    for post in page {
                        if posts.len() >= limit {
                            break;
                        }
                        if post.created_at.timestamp() < min_ts {
                            continue;
                        }
                        if seen.insert(post.id.clone()) {
                            posts.push(SourcePost::Reddit(post));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        brand = entity,
                        source = %Source::Reddit,
                        sort,
                        error = %e,
                        "Reddit search failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                tracing::debug!(brand = entity, count = posts.len(), "collected Reddit posts");
                Ok(posts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn post(upvote_ratio: Option<f64>, selftext: Option<&str>) -> RedditPost {
        RedditPost {
            id: "abc".to_string(),
            title: "Taboola payouts".to_string(),
            selftext: selftext.map(ToString::to_string),
            score: 10,
            num_comments: 5,
            upvote_ratio,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            permalink: "/r/adops/comments/abc/taboola_payouts/".to_string(),
            subreddit: "adops".to_string(),
            author: "pub".to_string(),
        }
    }

    #[test]
    fn into_raw_builds_absolute_permalink() {
        let raw = post(Some(0.9), None).into_raw();
        assert_eq!(
            raw.permalink,
            "https://www.reddit.com/r/adops/comments/abc/taboola_payouts/"
        );
        assert_eq!(raw.source, Source::Reddit);
        assert_eq!(raw.community, "adops");
    }

    #[test]
    fn missing_upvote_ratio_defaults_to_one() {
        assert_eq!(post(None, None).into_raw().extra_ratio, 1.0);
        assert_eq!(post(Some(0.9), None).into_raw().extra_ratio, 0.9);
    }

    #[test]
    fn removed_selftext_becomes_none() {
        assert_eq!(post(None, Some("[removed]")).into_raw().body, None);
    }

    #[test]
    fn child_without_valid_timestamp_is_skipped() {
        let data = ChildData {
            id: "x".to_string(),
            title: "t".to_string(),
            selftext: None,
            score: 0,
            num_comments: 0,
            upvote_ratio: None,
            created_utc: f64::MAX,
            permalink: String::new(),
            subreddit: String::new(),
            author: None,
        };
        assert!(data.into_post().is_none());
    }
}
