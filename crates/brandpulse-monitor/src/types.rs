use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Platform a post was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reddit,
    HackerNews,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Reddit => write!(f, "reddit"),
            Source::HackerNews => write!(f, "hackernews"),
        }
    }
}

/// A post normalized from a source connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    /// Source-native identifier, unique within `source`.
    #[serde(rename = "id")]
    pub source_id: String,
    pub source: Source,
    pub title: String,
    pub body: Option<String>,
    /// Upvotes/points as reported by the platform.
    pub raw_score: i64,
    pub comment_count: u64,
    /// Platform quality signal in `[0, 1]`; `1.0` where the platform has none.
    pub extra_ratio: f64,
    pub created_at: DateTime<Utc>,
    pub permalink: String,
    /// Subreddit name, or `hackernews`.
    pub community: String,
    pub author: String,
    /// Tracked entity this copy of the post was matched to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_brand: Option<String>,
}

impl RawPost {
    /// Title and body joined by a space, as seen by the matcher and the model.
    #[must_use]
    pub fn text(&self) -> String {
        match self.body.as_deref().map(str::trim) {
            Some(body) if !body.is_empty() => format!("{} {body}", self.title),
            _ => self.title.clone(),
        }
    }

    #[must_use]
    pub fn brand(&self) -> &str {
        self.matched_brand.as_deref().unwrap_or_default()
    }
}

/// Closed set of topics a relevant post can be classified under. `General`
/// is the default for irrelevant or unclassified posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Subject {
    Pricing,
    Performance,
    Support,
    Features,
    Integration,
    #[serde(rename = "User Experience")]
    UserExperience,
    #[serde(rename = "General Discussion")]
    GeneralDiscussion,
    Complaints,
    Recommendations,
    General,
}

impl Subject {
    /// Labels offered to the model for relevant posts.
    pub const CLASSIFIABLE: [Subject; 9] = [
        Subject::Pricing,
        Subject::Performance,
        Subject::Support,
        Subject::Features,
        Subject::Integration,
        Subject::UserExperience,
        Subject::GeneralDiscussion,
        Subject::Complaints,
        Subject::Recommendations,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Subject::Pricing => "Pricing",
            Subject::Performance => "Performance",
            Subject::Support => "Support",
            Subject::Features => "Features",
            Subject::Integration => "Integration",
            Subject::UserExperience => "User Experience",
            Subject::GeneralDiscussion => "General Discussion",
            Subject::Complaints => "Complaints",
            Subject::Recommendations => "Recommendations",
            Subject::General => "General",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Mixed,
    ];
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Mixed => write!(f, "mixed"),
        }
    }
}

/// Largest magnitude a `neutral` sentiment score may carry.
pub const NEUTRAL_TOLERANCE: f64 = 0.2;

/// Structured verdict the model returns for one (post, entity) pair.
///
/// This is also the wire schema handed to the model, so it must stay
/// exactly these four fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidationResult {
    /// Whether the post discusses the tracked company, not a homonym.
    pub is_relevant: bool,
    /// Main topic of the post.
    pub subject: Subject,
    /// Overall sentiment toward the company.
    pub sentiment: Sentiment,
    /// Sentiment strength from -1.0 (very negative) to 1.0 (very positive).
    pub sentiment_score: f64,
}

impl ValidationResult {
    /// Safe default used when the model never produced a usable answer.
    pub const FALLBACK: ValidationResult = ValidationResult {
        is_relevant: false,
        subject: Subject::General,
        sentiment: Sentiment::Neutral,
        sentiment_score: 0.0,
    };

    /// Clamp the score into `[-1, 1]` and into the range its sentiment label
    /// allows, and force irrelevant results onto the `General` subject.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let score = self.sentiment_score.clamp(-1.0, 1.0);
        self.sentiment_score = match self.sentiment {
            Sentiment::Positive => score.max(0.0),
            Sentiment::Negative => score.min(0.0),
            Sentiment::Neutral => score.clamp(-NEUTRAL_TOLERANCE, NEUTRAL_TOLERANCE),
            Sentiment::Mixed => score,
        };
        if !self.is_relevant {
            self.subject = Subject::General;
        }
        self
    }
}

/// A relevant post with its classification and engagement score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    #[serde(flatten)]
    pub post: RawPost,
    pub validation: ValidationResult,
    pub engagement_score: f64,
}

/// A post the model judged irrelevant, kept for dropped-post analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedPost {
    #[serde(flatten)]
    pub post: RawPost,
    pub validation: ValidationResult,
    /// Set when the verdict is the schema fallback rather than a model answer.
    pub fallback: bool,
}

/// Per-sentiment percentages within one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SentimentBreakdown {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub mixed: f64,
}

impl SentimentBreakdown {
    #[must_use]
    pub fn get(&self, sentiment: Sentiment) -> f64 {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
            Sentiment::Mixed => self.mixed,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.positive + self.negative + self.neutral + self.mixed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    /// Share of the entity's posts, in percent, one decimal.
    pub percentage: f64,
    pub sentiment_breakdown: SentimentBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityAggregate {
    pub total_posts: usize,
    /// Topics in first-seen order.
    pub category_distribution: IndexMap<Subject, CategoryStats>,
    pub top_posts: Vec<RankedPost>,
    pub top_posts_by_category: IndexMap<Subject, Vec<RankedPost>>,
    /// Every ranked post for the entity, newest first.
    pub all_posts: Vec<RankedPost>,
}

impl EntityAggregate {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_posts: 0,
            category_distribution: IndexMap::new(),
            top_posts: Vec::new(),
            top_posts_by_category: IndexMap::new(),
            all_posts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: Source,
    pub entity: String,
    pub error: String,
}

/// Counters describing one refresh run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub matched: usize,
    pub duplicates_dropped: usize,
    pub validated: usize,
    pub repaired: usize,
    pub fallbacks: usize,
    pub transport_failures: usize,
    pub irrelevant: usize,
    pub ranked: usize,
    pub source_failures: Vec<SourceFailure>,
}

impl RunMetadata {
    #[must_use]
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            fetched: 0,
            matched: 0,
            duplicates_dropped: 0,
            validated: 0,
            repaired: 0,
            fallbacks: 0,
            transport_failures: 0,
            irrelevant: 0,
            ranked: 0,
            source_failures: Vec::new(),
        }
    }
}

/// One published refresh result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Aggregates keyed by entity name, in configured entity order.
    pub aggregates: IndexMap<String, EntityAggregate>,
    pub rejected: Vec<RejectedPost>,
    pub metadata: RunMetadata,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_wrong_sign_scores() {
        let positive = ValidationResult {
            is_relevant: true,
            subject: Subject::Pricing,
            sentiment: Sentiment::Positive,
            sentiment_score: -0.4,
        }
        .normalized();
        assert_eq!(positive.sentiment_score, 0.0);

        let negative = ValidationResult {
            sentiment: Sentiment::Negative,
            sentiment_score: 0.7,
            ..positive
        }
        .normalized();
        assert_eq!(negative.sentiment_score, 0.0);
    }

    #[test]
    fn normalized_pulls_neutral_toward_zero() {
        let neutral = ValidationResult {
            is_relevant: true,
            subject: Subject::Support,
            sentiment: Sentiment::Neutral,
            sentiment_score: 0.9,
        }
        .normalized();
        assert_eq!(neutral.sentiment_score, NEUTRAL_TOLERANCE);
    }

    #[test]
    fn normalized_leaves_mixed_alone_but_bounds_range() {
        let mixed = ValidationResult {
            is_relevant: true,
            subject: Subject::Features,
            sentiment: Sentiment::Mixed,
            sentiment_score: -3.0,
        }
        .normalized();
        assert_eq!(mixed.sentiment_score, -1.0);
    }

    #[test]
    fn irrelevant_results_use_general_subject() {
        let result = ValidationResult {
            is_relevant: false,
            subject: Subject::Complaints,
            sentiment: Sentiment::Negative,
            sentiment_score: -0.5,
        }
        .normalized();
        assert_eq!(result.subject, Subject::General);
    }

    #[test]
    fn subject_serializes_with_display_labels() {
        let json = serde_json::to_string(&Subject::UserExperience).unwrap();
        assert_eq!(json, "\"User Experience\"");
        let parsed: Subject = serde_json::from_str("\"General Discussion\"").unwrap();
        assert_eq!(parsed, Subject::GeneralDiscussion);
    }

    #[test]
    fn validation_result_rejects_extra_fields() {
        let raw = r#"{"is_relevant":true,"subject":"Pricing","sentiment":"positive","sentiment_score":0.5,"confidence":0.9}"#;
        assert!(serde_json::from_str::<ValidationResult>(raw).is_err());
    }

    #[test]
    fn raw_post_text_skips_blank_body() {
        let post = RawPost {
            source_id: "a1".to_string(),
            source: Source::Reddit,
            title: "Taboola results".to_string(),
            body: Some("  ".to_string()),
            raw_score: 1,
            comment_count: 0,
            extra_ratio: 1.0,
            created_at: Utc::now(),
            permalink: "https://reddit.com/r/x/a1".to_string(),
            community: "advertising".to_string(),
            author: "someone".to_string(),
            matched_brand: None,
        };
        assert_eq!(post.text(), "Taboola results");
        assert_eq!(post.brand(), "");
    }
}
