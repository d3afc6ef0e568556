//! Brand mention monitoring pipeline.
//!
//! Collects posts mentioning tracked entities from Reddit and Hacker News,
//! filters them lexically, classifies relevance, topic and sentiment with a
//! language model under a strict output schema, scores engagement, and rolls
//! results up per entity into a [`Snapshot`] held by [`SnapshotStore`].

pub mod aggregator;
pub mod artifacts;
pub mod dedup;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod ranker;
pub mod sources;
pub mod store;
pub mod types;
pub mod validator;

pub use aggregator::{aggregate, AggregateLimits};
pub use artifacts::ArtifactWriter;
pub use dedup::Deduplicator;
pub use error::{
    ArtifactError, MatcherError, ModelError, PipelineError, SchemaError, SetupError, SourceError,
};
pub use matcher::EntityMatcher;
pub use pipeline::Pipeline;
pub use ranker::{engagement_score, rank};
pub use sources::{build_connectors, SourceConnector, SourcePost, SourceSettings};
pub use store::SnapshotStore;
pub use types::{
    CategoryStats, EntityAggregate, RankedPost, RawPost, RejectedPost, RunMetadata, Sentiment,
    SentimentBreakdown, Snapshot, Source, SourceFailure, Subject, ValidationResult,
};
pub use validator::{
    ModelClient, ModelRequest, OpenAiClient, ValidationOutcome, Validator, ValidatorSettings,
};
