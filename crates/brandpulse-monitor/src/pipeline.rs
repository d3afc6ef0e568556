//! Refresh orchestration: fetch → match → dedup → validate → rank → aggregate.

use std::sync::Arc;

use brandpulse_core::{AppConfig, EntityConfig};
use chrono::Utc;

use crate::aggregator::{aggregate, AggregateLimits};
use crate::dedup::Deduplicator;
use crate::error::{PipelineError, SetupError};
use crate::matcher::EntityMatcher;
use crate::ranker::rank;
use crate::sources::{build_connectors, SourceConnector};
use crate::types::{RankedPost, RawPost, RejectedPost, RunMetadata, Snapshot, SourceFailure};
use crate::validator::{
    ModelClient, OpenAiClient, ValidationOutcome, Validator, ValidatorSettings,
};

pub struct Pipeline {
    connectors: Vec<Arc<dyn SourceConnector>>,
    matcher: EntityMatcher,
    validator: Validator,
    entities: Vec<String>,
    fetch_limit: usize,
    limits: AggregateLimits,
}

impl Pipeline {
    /// # Errors
    ///
    /// Returns [`SetupError::Matcher`] if the entity matching rules cannot be built.
    pub fn new(
        connectors: Vec<Arc<dyn SourceConnector>>,
        entities: &[EntityConfig],
        validator: Validator,
        fetch_limit: usize,
        limits: AggregateLimits,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            connectors,
            matcher: EntityMatcher::new(entities)?,
            validator,
            entities: entities.iter().map(|e| e.name.clone()).collect(),
            fetch_limit,
            limits,
        })
    }

    /// Wire the production connectors and the OpenAI-compatible model client.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if an HTTP client or the matcher cannot be built.
    pub fn from_config(config: &AppConfig, entities: &[EntityConfig]) -> Result<Self, SetupError> {
        let client = OpenAiClient::new(&config.openai_api_key, config.model_timeout_secs)?
            .with_base_url(&config.model_base_url);
        let client: Arc<dyn ModelClient> = Arc::new(client);
        let validator = Validator::new(client, ValidatorSettings::from_app_config(config), entities);
        let limits = AggregateLimits {
            top_posts: Some(config.top_posts),
            per_category: Some(config.category_posts),
        };
        Self::new(
            build_connectors(config)?,
            entities,
            validator,
            config.fetch_limit,
            limits,
        )
    }

    #[must_use]
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    #[must_use]
    pub fn matcher(&self) -> &EntityMatcher {
        &self.matcher
    }

    /// Run one full refresh. `dedup` is cleared first.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AllSourcesFailed`] when no connector invocation succeeded.
    /// - [`PipelineError::NoValidPosts`] when no entity ended up with a relevant post.
    pub async fn run(&self, dedup: &mut Deduplicator) -> Result<Snapshot, PipelineError> {
        dedup.clear();
        let mut metadata = RunMetadata::started(Utc::now());

        let raw = self.fetch_all(&mut metadata).await?;
        metadata.fetched = raw.len();

        let matched = self.matcher.match_all(&raw);
        metadata.matched = matched.len();

        let (candidates, dropped) = dedup.filter(matched);
        metadata.duplicates_dropped = dropped;

        tracing::info!(
            fetched = metadata.fetched,
            matched = metadata.matched,
            duplicates = dropped,
            candidates = candidates.len(),
            "validating candidate posts"
        );

        let outcomes = self.validator.validate_batch(&candidates).await;

        let mut ranked: Vec<RankedPost> = Vec::new();
        let mut rejected: Vec<RejectedPost> = Vec::new();
        for (post, outcome) in candidates.into_iter().zip(outcomes) {
            let (validation, fallback) = match outcome {
                ValidationOutcome::Validated(result) => {
                    metadata.validated += 1;
                    (result, false)
                }
                ValidationOutcome::Repaired(result) => {
                    metadata.validated += 1;
                    metadata.repaired += 1;
                    (result, false)
                }
                ValidationOutcome::Fallback { result, .. } => {
                    metadata.fallbacks += 1;
                    (result, true)
                }
                ValidationOutcome::Dropped { .. } => {
                    metadata.transport_failures += 1;
                    continue;
                }
            };

            if validation.is_relevant {
                ranked.push(rank(post, validation));
            } else {
                metadata.irrelevant += 1;
                rejected.push(RejectedPost {
                    post,
                    validation,
                    fallback,
                });
            }
        }
        metadata.ranked = ranked.len();

        if ranked.is_empty() {
            tracing::warn!(
                validated = metadata.validated,
                fallbacks = metadata.fallbacks,
                transport_failures = metadata.transport_failures,
                irrelevant = metadata.irrelevant,
                "refresh produced no relevant posts"
            );
            return Err(PipelineError::NoValidPosts);
        }

        let aggregates = aggregate(&self.entities, &ranked, self.limits);
        metadata.finished_at = Utc::now();

        tracing::info!(
            ranked = metadata.ranked,
            irrelevant = metadata.irrelevant,
            repaired = metadata.repaired,
            fallbacks = metadata.fallbacks,
            transport_failures = metadata.transport_failures,
            source_failures = metadata.source_failures.len(),
            "refresh complete"
        );

        Ok(Snapshot {
            aggregates,
            rejected,
            last_updated: metadata.finished_at,
            metadata,
        })
    }

    /// Fetch every (connector, entity) pair sequentially, recording failures.
    async fn fetch_all(&self, metadata: &mut RunMetadata) -> Result<Vec<RawPost>, PipelineError> {
        let mut raw = Vec::new();
        let mut invocations = 0usize;
        let mut last_error = None;

        for connector in &self.connectors {
            let source = connector.source();
            for entity in &self.entities {
                invocations += 1;
                match connector.fetch(entity, self.fetch_limit).await {
                    Ok(posts) => {
                        tracing::debug!(
                            brand = %entity,
                            source = %source,
                            count = posts.len(),
                            "fetched posts"
                        );
                        raw.extend(posts.into_iter().map(|p| p.into_raw()));
                    }
                    Err(e) => {
                        tracing::warn!(
                            brand = %entity,
                            source = %source,
                            error = %e,
                            "source fetch failed"
                        );
                        let error = e.to_string();
                        metadata.source_failures.push(SourceFailure {
                            source,
                            entity: entity.clone(),
                            error: error.clone(),
                        });
                        last_error = Some(error);
                    }
                }
            }
        }

        if metadata.source_failures.len() == invocations {
            return Err(PipelineError::AllSourcesFailed {
                failures: invocations,
                last_error: last_error
                    .unwrap_or_else(|| "no source connectors configured".to_string()),
            });
        }
        Ok(raw)
    }
}
