use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Reddit script-app credentials. The Reddit source is skipped when absent.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub entities_path: PathBuf,
    pub openai_api_key: String,
    pub model: String,
    pub model_base_url: String,
    pub model_temperature: f32,
    pub model_timeout_secs: u64,
    pub model_max_retries: u32,
    pub model_backoff_base_ms: u64,
    pub max_concurrent_validations: usize,
    pub post_text_limit: usize,
    pub fetch_limit: usize,
    pub source_timeout_secs: u64,
    pub min_post_year: i32,
    pub top_posts: usize,
    pub category_posts: usize,
    pub artifacts_dir: Option<PathBuf>,
    pub refresh_cron: Option<String>,
    pub cors_origins: Vec<String>,
    pub reddit: Option<RedditCredentials>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("entities_path", &self.entities_path)
            .field("openai_api_key", &"[redacted]")
            .field("model", &self.model)
            .field("model_base_url", &self.model_base_url)
            .field("model_temperature", &self.model_temperature)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("model_max_retries", &self.model_max_retries)
            .field("model_backoff_base_ms", &self.model_backoff_base_ms)
            .field(
                "max_concurrent_validations",
                &self.max_concurrent_validations,
            )
            .field("post_text_limit", &self.post_text_limit)
            .field("fetch_limit", &self.fetch_limit)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("min_post_year", &self.min_post_year)
            .field("top_posts", &self.top_posts)
            .field("category_posts", &self.category_posts)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("refresh_cron", &self.refresh_cron)
            .field("cors_origins", &self.cors_origins)
            .field("reddit", &self.reddit)
            .finish()
    }
}
