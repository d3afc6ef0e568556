use crate::app_config::{AppConfig, Environment, RedditCredentials};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`
/// lookup.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let openai_api_key = require("OPENAI_API_KEY")?;

    let env = parse_environment(&or_default("BRANDPULSE_ENV", "development"))?;

    let bind_addr = or_default("BRANDPULSE_BIND_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("BRANDPULSE_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("BRANDPULSE_LOG_LEVEL", "info");
    let entities_path = PathBuf::from(or_default(
        "BRANDPULSE_ENTITIES_PATH",
        "./config/entities.yaml",
    ));

    let model = or_default("BRANDPULSE_MODEL", "gpt-4o-mini");
    let model_base_url = or_default("BRANDPULSE_MODEL_BASE_URL", "https://api.openai.com/v1");
    let model_temperature = or_default("BRANDPULSE_MODEL_TEMPERATURE", "0.1")
        .parse::<f32>()
        .map_err(|e| invalid("BRANDPULSE_MODEL_TEMPERATURE", e.to_string()))?;
    if !(0.0..=2.0).contains(&model_temperature) {
        return Err(invalid(
            "BRANDPULSE_MODEL_TEMPERATURE",
            format!("{model_temperature} is outside [0, 2]"),
        ));
    }
    let model_timeout_secs = parse_u64("BRANDPULSE_MODEL_TIMEOUT_SECS", "30")?;
    let model_max_retries = parse_u32("BRANDPULSE_MODEL_MAX_RETRIES", "3")?;
    let model_backoff_base_ms = parse_u64("BRANDPULSE_MODEL_BACKOFF_BASE_MS", "500")?;
    let max_concurrent_validations = parse_usize("BRANDPULSE_MAX_CONCURRENT_VALIDATIONS", "4")?;
    if max_concurrent_validations == 0 {
        return Err(invalid(
            "BRANDPULSE_MAX_CONCURRENT_VALIDATIONS",
            "must be at least 1".to_string(),
        ));
    }
    let post_text_limit = parse_usize("BRANDPULSE_POST_TEXT_LIMIT", "1500")?;

    let fetch_limit = parse_usize("BRANDPULSE_FETCH_LIMIT", "30")?;
    let source_timeout_secs = parse_u64("BRANDPULSE_SOURCE_TIMEOUT_SECS", "10")?;
    let min_post_year = or_default("BRANDPULSE_MIN_POST_YEAR", "2020")
        .parse::<i32>()
        .map_err(|e| invalid("BRANDPULSE_MIN_POST_YEAR", e.to_string()))?;

    let top_posts = parse_usize("BRANDPULSE_TOP_POSTS", "10")?;
    let category_posts = parse_usize("BRANDPULSE_CATEGORY_POSTS", "3")?;

    let artifacts_dir = optional("BRANDPULSE_ARTIFACTS_DIR").map(PathBuf::from);
    let refresh_cron = optional("BRANDPULSE_REFRESH_CRON");
    let cors_origins = optional("BRANDPULSE_CORS_ORIGINS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let reddit = match (
        optional("REDDIT_CLIENT_ID"),
        optional("REDDIT_CLIENT_SECRET"),
    ) {
        (Some(client_id), Some(client_secret)) => Some(RedditCredentials {
            client_id,
            client_secret,
            user_agent: or_default("REDDIT_USER_AGENT", "brandpulse/0.1 (brand-monitoring)"),
        }),
        _ => None,
    };

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        entities_path,
        openai_api_key,
        model,
        model_base_url,
        model_temperature,
        model_timeout_secs,
        model_max_retries,
        model_backoff_base_ms,
        max_concurrent_validations,
        post_text_limit,
        fetch_limit,
        source_timeout_secs,
        min_post_year,
        top_posts,
        category_posts,
        artifacts_dir,
        refresh_cron,
        cors_origins,
        reddit,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BRANDPULSE_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
