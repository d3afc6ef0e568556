//! End-to-end refresh tests with in-memory connectors and a scripted model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use brandpulse_core::EntityConfig;
use brandpulse_monitor::sources::RedditPost;
use brandpulse_monitor::{
    AggregateLimits, ModelClient, ModelError, ModelRequest, Pipeline, PipelineError,
    SnapshotStore, Source, SourceConnector, SourceError, SourcePost, Subject, Validator,
    ValidatorSettings,
};
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn entities() -> Vec<EntityConfig> {
    vec![
        EntityConfig {
            name: "Taboola".to_string(),
            description: Some("Native advertising platform".to_string()),
            ambiguous: false,
            context_keywords: vec![],
        },
        EntityConfig {
            name: "Realize".to_string(),
            description: Some("Taboola's performance advertising platform".to_string()),
            ambiguous: true,
            context_keywords: vec!["platform".to_string(), "advertising".to_string()],
        },
    ]
}

fn reddit_post(id: &str, title: &str, score: i64, comments: u64, ratio: f64) -> SourcePost {
    SourcePost::Reddit(RedditPost {
        id: id.to_string(),
        title: title.to_string(),
        selftext: None,
        score,
        num_comments: comments,
        upvote_ratio: Some(ratio),
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        permalink: format!("/r/adops/comments/{id}/"),
        subreddit: "adops".to_string(),
        author: "someone".to_string(),
    })
}

/// Returns fixed posts per entity; can be switched to fail.
struct FixtureConnector {
    posts: HashMap<String, Vec<SourcePost>>,
    failing: AtomicBool,
}

impl FixtureConnector {
    fn new(posts: Vec<(&str, Vec<SourcePost>)>) -> Arc<Self> {
        Arc::new(Self {
            posts: posts
                .into_iter()
                .map(|(entity, posts)| (entity.to_string(), posts))
                .collect(),
            failing: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl SourceConnector for FixtureConnector {
    fn source(&self) -> Source {
        Source::Reddit
    }

    async fn fetch(&self, entity: &str, _limit: usize) -> Result<Vec<SourcePost>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Reddit("simulated outage".to_string()));
        }
        Ok(self.posts.get(entity).cloned().unwrap_or_default())
    }
}

/// Blocks inside `fetch` until released.
struct GatedConnector {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SourceConnector for GatedConnector {
    fn source(&self) -> Source {
        Source::HackerNews
    }

    async fn fetch(&self, _entity: &str, _limit: usize) -> Result<Vec<SourcePost>, SourceError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Vec::new())
    }
}

/// Answers every request with the same reply.
struct ConstantModel(&'static str);

#[async_trait]
impl ModelClient for ConstantModel {
    async fn complete(&self, _request: &ModelRequest) -> Result<String, ModelError> {
        Ok(self.0.to_string())
    }
}

const RELEVANT: &str =
    r#"{"is_relevant":true,"subject":"Performance","sentiment":"positive","sentiment_score":0.7}"#;
const IRRELEVANT: &str =
    r#"{"is_relevant":false,"subject":"General","sentiment":"neutral","sentiment_score":0.0}"#;

/// Replies according to a marker word in the post title:
/// `outage` always fails with a 503, `garbled` is never valid JSON,
/// `shaky` is garbled once and fixed on the corrective retry.
struct MarkerModel;

#[async_trait]
impl ModelClient for MarkerModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let prompt = &request.messages[1].content;
        if prompt.contains("outage") {
            return Err(ModelError::Status {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        let first_attempt = request.messages.len() == 2;
        if prompt.contains("garbled") || (prompt.contains("shaky") && first_attempt) {
            return Ok("{\"is_relevant\": tru".to_string());
        }
        Ok(RELEVANT.to_string())
    }
}

fn pipeline_with(
    connectors: Vec<Arc<dyn SourceConnector>>,
    model: Arc<dyn ModelClient>,
) -> Pipeline {
    let settings = ValidatorSettings {
        backoff_base_ms: 0,
        ..ValidatorSettings::default()
    };
    let validator = Validator::new(model, settings, &entities());
    Pipeline::new(connectors, &entities(), validator, 30, AggregateLimits::default())
        .expect("pipeline should build")
}

fn pipeline(connectors: Vec<Arc<dyn SourceConnector>>, reply: &'static str) -> Pipeline {
    pipeline_with(connectors, Arc::new(ConstantModel(reply)))
}

fn scenario_connector() -> Arc<FixtureConnector> {
    FixtureConnector::new(vec![
        (
            "Taboola",
            vec![
                reddit_post("p1", "Taboola doubled our RPM", 100, 20, 0.95),
                reddit_post("p1", "Taboola doubled our RPM", 100, 20, 0.95),
            ],
        ),
        (
            "Realize",
            vec![reddit_post("p2", "Trying the Realize platform", 5, 1, 0.5)],
        ),
    ])
}

#[tokio::test]
async fn duplicate_posts_are_ranked_once() {
    let store = SnapshotStore::new(pipeline(vec![scenario_connector()], RELEVANT), None);
    let snapshot = store
        .refresh(&CancellationToken::new())
        .await
        .expect("refresh should succeed");

    assert_eq!(snapshot.aggregates["Taboola"].total_posts, 1);
    assert_eq!(snapshot.aggregates["Realize"].total_posts, 1);
    assert_eq!(snapshot.metadata.duplicates_dropped, 1);

    let top = &snapshot.aggregates["Taboola"].top_posts[0];
    assert_eq!(top.post.source_id, "p1");
    assert!((top.engagement_score - 149.5).abs() < 1e-9);

    let realize = &snapshot.aggregates["Realize"].top_posts[0];
    assert!((realize.engagement_score - 12.0).abs() < 1e-9);
    assert_eq!(
        snapshot.aggregates["Realize"].category_distribution[&Subject::Performance].percentage,
        100.0
    );
}

#[tokio::test]
async fn all_sources_failing_keeps_previous_snapshot() {
    let connector = scenario_connector();
    let store = SnapshotStore::new(pipeline(vec![connector.clone()], RELEVANT), None);
    let cancel = CancellationToken::new();

    let first = store.refresh(&cancel).await.unwrap();

    connector.failing.store(true, Ordering::SeqCst);
    let err = store.refresh(&cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::AllSourcesFailed { failures: 2, .. }));

    let cached = store.get_cached_aggregates().await.expect("snapshot kept");
    assert!(Arc::ptr_eq(&first, &cached));
}

#[tokio::test]
async fn no_relevant_posts_is_a_failure() {
    let store = SnapshotStore::new(pipeline(vec![scenario_connector()], IRRELEVANT), None);
    let err = store.refresh(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoValidPosts));
    assert!(store.get_cached_aggregates().await.is_none());
}

#[tokio::test]
async fn seen_set_tracks_the_last_run() {
    let pipeline = pipeline(vec![scenario_connector()], IRRELEVANT);
    let mut dedup = brandpulse_monitor::Deduplicator::new();
    assert!(pipeline.run(&mut dedup).await.is_err());
    // the seen-set reflects the run: p1 once for Taboola, p2 once for Realize
    assert_eq!(dedup.len(), 2);
}

#[tokio::test]
async fn no_connectors_means_all_sources_failed() {
    let store = SnapshotStore::new(pipeline(Vec::new(), RELEVANT), None);
    let err = store.refresh(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, PipelineError::AllSourcesFailed { failures: 0, .. }));
}

#[tokio::test]
async fn partial_source_failure_is_recorded() {
    let failing = FixtureConnector::new(Vec::new());
    failing.failing.store(true, Ordering::SeqCst);
    let store = SnapshotStore::new(
        pipeline(vec![scenario_connector(), failing], RELEVANT),
        None,
    );
    let snapshot = store.refresh(&CancellationToken::new()).await.unwrap();
    assert_eq!(snapshot.metadata.source_failures.len(), 2);
    assert_eq!(snapshot.metadata.ranked, 2);
}

#[tokio::test]
async fn try_refresh_rejects_concurrent_runs() {
    let gated = Arc::new(GatedConnector {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let store = Arc::new(SnapshotStore::new(pipeline(vec![gated.clone()], RELEVANT), None));

    let background = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.refresh(&CancellationToken::new()).await })
    };
    gated.entered.notified().await;

    let err = store
        .try_refresh(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::RefreshInProgress));

    // two entities, so the gate is passed twice
    gated.release.notify_one();
    gated.entered.notified().await;
    gated.release.notify_one();
    let result = background.await.unwrap();
    assert!(matches!(result, Err(PipelineError::NoValidPosts)));
}

#[tokio::test]
async fn cancelled_refresh_publishes_nothing() {
    let gated = Arc::new(GatedConnector {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let store = Arc::new(SnapshotStore::new(pipeline(vec![gated.clone()], RELEVANT), None));
    let cancel = CancellationToken::new();

    let background = {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        tokio::spawn(async move { store.refresh(&cancel).await })
    };
    gated.entered.notified().await;
    cancel.cancel();

    let result = background.await.unwrap();
    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert!(store.get_cached_aggregates().await.is_none());

    // clear needs the run lock, so this only returns once it was released
    store.clear().await;
}

#[tokio::test]
async fn clear_drops_the_published_snapshot() {
    let store = SnapshotStore::new(pipeline(vec![scenario_connector()], RELEVANT), None);
    store.refresh(&CancellationToken::new()).await.unwrap();
    assert!(store.get_cached_aggregates().await.is_some());

    store.clear().await;
    assert!(store.get_cached_aggregates().await.is_none());
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn refresh_futures_are_send() {
    let store = SnapshotStore::new(pipeline(vec![scenario_connector()], RELEVANT), None);
    let cancel = CancellationToken::new();
    assert_send(&store.refresh(&cancel));
    assert_send(&store.try_refresh(&cancel));
}

#[tokio::test]
async fn metadata_tallies_each_validation_outcome() {
    let connector = FixtureConnector::new(vec![(
        "Taboola",
        vec![
            reddit_post("ok", "Taboola payouts arrived early", 10, 2, 0.9),
            reddit_post("down", "Taboola outage thread", 50, 9, 0.9),
            reddit_post("bad", "Taboola garbled reply bait", 40, 8, 0.9),
            reddit_post("fix", "Taboola shaky first answer", 5, 1, 0.9),
        ],
    )]);
    let store = SnapshotStore::new(pipeline_with(vec![connector], Arc::new(MarkerModel)), None);
    let snapshot = store.refresh(&CancellationToken::new()).await.unwrap();
    let meta = &snapshot.metadata;

    assert_eq!(meta.matched, 4);
    assert_eq!(meta.validated, 2);
    assert_eq!(meta.repaired, 1);
    assert_eq!(meta.fallbacks, 1);
    assert_eq!(meta.transport_failures, 1);
    assert_eq!(meta.irrelevant, 1);
    assert_eq!(meta.ranked, 2);

    let ranked_ids: Vec<&str> = snapshot.aggregates["Taboola"]
        .all_posts
        .iter()
        .map(|p| p.post.source_id.as_str())
        .collect();
    assert_eq!(ranked_ids.len(), 2);
    assert!(ranked_ids.contains(&"ok"));
    assert!(ranked_ids.contains(&"fix"));

    assert_eq!(snapshot.rejected.len(), 1);
    let rejected = &snapshot.rejected[0];
    assert_eq!(rejected.post.source_id, "bad");
    assert!(rejected.fallback);
    assert!(!rejected.validation.is_relevant);
    assert_eq!(rejected.validation.subject, Subject::General);
}
