//! Model-backed relevance, topic and sentiment classification.
//!
//! Each (post, entity) pair goes through a small protocol:
//!
//! ```text
//! Attempt ─┬─ parsed ─────────────────────────────── Validated
//!          ├─ schema failure ─ corrective retry ─┬── Repaired
//!          │                                     └── Fallback (safe default)
//!          └─ transport failure (after back-off) ─── Dropped
//! ```

pub mod openai;
pub mod prompt;
mod retry;
pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use brandpulse_core::{AppConfig, EntityConfig};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{ModelError, SchemaError};
use crate::types::{RawPost, ValidationResult};

pub use openai::OpenAiClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One constrained-output completion request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    pub schema_name: String,
    pub schema: serde_json::Value,
}

/// A language model that answers with raw JSON text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorSettings {
    pub model: String,
    pub temperature: f32,
    /// Maximum characters of post body sent to the model.
    pub text_limit: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_in_flight: usize,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            text_limit: 1500,
            max_retries: 3,
            backoff_base_ms: 500,
            max_in_flight: 4,
        }
    }
}

impl ValidatorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.model_temperature,
            text_limit: config.post_text_limit,
            max_retries: config.model_max_retries,
            backoff_base_ms: config.model_backoff_base_ms,
            max_in_flight: config.max_concurrent_validations,
        }
    }
}

/// How a single validation ended.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// First reply parsed.
    Validated(ValidationResult),
    /// First reply was malformed; the corrective retry parsed.
    Repaired(ValidationResult),
    /// Both replies were malformed; carries [`ValidationResult::FALLBACK`].
    Fallback {
        result: ValidationResult,
        reason: String,
    },
    /// The provider could not be reached; the post is discarded.
    Dropped { error: ModelError },
}

impl ValidationOutcome {
    /// The verdict to act on, if any.
    #[must_use]
    pub fn result(&self) -> Option<ValidationResult> {
        match self {
            Self::Validated(r) | Self::Repaired(r) | Self::Fallback { result: r, .. } => Some(*r),
            Self::Dropped { .. } => None,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Parse a model reply into a normalized [`ValidationResult`].
///
/// # Errors
///
/// Returns [`SchemaError`] for empty replies, invalid JSON, missing or unknown
/// fields, out-of-set enum values and non-finite scores.
pub fn parse_result(reply: &str) -> Result<ValidationResult, SchemaError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(SchemaError::Empty);
    }
    let result: ValidationResult = serde_json::from_str(trimmed)?;
    if !result.sentiment_score.is_finite() {
        return Err(SchemaError::NonFinite);
    }
    Ok(result.normalized())
}

pub struct Validator {
    client: Arc<dyn ModelClient>,
    settings: ValidatorSettings,
    descriptions: HashMap<String, String>,
    schema_name: String,
    schema: serde_json::Value,
}

impl Validator {
    #[must_use]
    pub fn new(
        client: Arc<dyn ModelClient>,
        settings: ValidatorSettings,
        entities: &[EntityConfig],
    ) -> Self {
        let descriptions = entities
            .iter()
            .filter_map(|e| e.description.clone().map(|d| (e.name.clone(), d)))
            .collect();
        Self {
            client,
            settings,
            descriptions,
            schema_name: schema::schema_name::<ValidationResult>(),
            schema: schema::strict_schema::<ValidationResult>(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Classify one post for its `matched_brand`.
    pub async fn validate(&self, post: &RawPost) -> ValidationOutcome {
        let entity = post.brand();
        let description = self.descriptions.get(entity).map(String::as_str);
        let mut messages =
            prompt::initial_messages(post, entity, description, self.settings.text_limit);

        let reply = match self.call(&messages).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    brand = entity,
                    source = %post.source,
                    post_id = %post.source_id,
                    error = %error,
                    "model call failed, dropping post"
                );
                return ValidationOutcome::Dropped { error };
            }
        };

        let first_error = match parse_result(&reply) {
            Ok(result) => return ValidationOutcome::Validated(result),
            Err(e) => e,
        };

        tracing::debug!(
            brand = entity,
            post_id = %post.source_id,
            error = %first_error,
            "malformed model reply, sending corrective retry"
        );
        messages.push(ChatMessage::assistant(reply));
        messages.push(prompt::corrective_message(&first_error.to_string()));

        let retry_reply = match self.call(&messages).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    brand = entity,
                    source = %post.source,
                    post_id = %post.source_id,
                    error = %error,
                    "model call failed during repair, dropping post"
                );
                return ValidationOutcome::Dropped { error };
            }
        };

        match parse_result(&retry_reply) {
            Ok(result) => ValidationOutcome::Repaired(result),
            Err(e) => {
                tracing::warn!(
                    brand = entity,
                    source = %post.source,
                    post_id = %post.source_id,
                    error = %e,
                    "model reply malformed after repair, using fallback"
                );
                ValidationOutcome::Fallback {
                    result: ValidationResult::FALLBACK,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Validate many posts with at most `max_in_flight` model calls running.
    /// Outcomes are returned in input order.
    pub async fn validate_batch(&self, posts: &[RawPost]) -> Vec<ValidationOutcome> {
        let pending: Vec<_> = posts.iter().map(|post| self.validate(post)).collect();
        stream::iter(pending)
            .buffered(self.settings.max_in_flight.max(1))
            .collect()
            .await
    }

    async fn call(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let request = ModelRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            messages: messages.to_vec(),
            schema_name: self.schema_name.clone(),
            schema: self.schema.clone(),
        };
        retry::retry_with_backoff(
            self.settings.max_retries,
            self.settings.backoff_base_ms,
            || self.client.complete(&request),
        )
        .await
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
