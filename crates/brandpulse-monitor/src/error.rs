use thiserror::Error;

/// A source connector could not retrieve posts. Never fatal on its own.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reddit API error: {0}")]
    Reddit(String),

    #[error("Hacker News API error: {0}")]
    HackerNews(String),
}

/// Transport-level failure talking to the model provider.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model provider response could not be decoded: {0}")]
    Envelope(String),
}

/// Model output that does not match the validation result schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("model returned an empty response")]
    Empty,

    #[error("response does not match the validation schema: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("sentiment_score is not a finite number")]
    NonFinite,
}

/// Failures that abort a refresh. The previously published snapshot is kept.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("all {failures} source fetches failed; last error: {last_error}")]
    AllSourcesFailed { failures: usize, last_error: String },

    #[error("no tracked entity produced a relevant post")]
    NoValidPosts,

    #[error("refresh was cancelled")]
    Cancelled,

    #[error("a refresh is already in progress")]
    RefreshInProgress,
}

/// Entity matching rules that cannot be built.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("invalid entity matcher pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("ambiguous entity '{entity}' has no context keywords")]
    MissingContext { entity: String },
}

/// Errors building the pipeline's collaborators from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("HTTP client construction failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
