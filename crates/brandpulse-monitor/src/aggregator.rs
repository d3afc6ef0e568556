//! Per-entity rollups of ranked posts.

use indexmap::IndexMap;

use crate::ranker::{by_engagement, by_recency};
use crate::types::{
    CategoryStats, EntityAggregate, RankedPost, Sentiment, SentimentBreakdown, Subject,
};

/// Slice sizes for the representative post lists. `None` keeps every post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateLimits {
    pub top_posts: Option<usize>,
    pub per_category: Option<usize>,
}

impl Default for AggregateLimits {
    fn default() -> Self {
        Self {
            top_posts: Some(10),
            per_category: Some(3),
        }
    }
}

/// Build one aggregate per tracked entity, in the order given.
///
/// Entities without posts get [`EntityAggregate::empty`]. Posts whose
/// `matched_brand` is not a tracked entity are ignored.
#[must_use]
pub fn aggregate(
    entities: &[String],
    posts: &[RankedPost],
    limits: AggregateLimits,
) -> IndexMap<String, EntityAggregate> {
    entities
        .iter()
        .map(|entity| {
            let own: Vec<&RankedPost> = posts.iter().filter(|p| p.post.brand() == entity).collect();
            (entity.clone(), aggregate_entity(&own, limits))
        })
        .collect()
}

/// Aggregate the posts of a single entity.
#[must_use]
pub fn aggregate_entity(posts: &[&RankedPost], limits: AggregateLimits) -> EntityAggregate {
    if posts.is_empty() {
        return EntityAggregate::empty();
    }

    let mut by_subject: IndexMap<Subject, Vec<&RankedPost>> = IndexMap::new();
    for post in posts {
        by_subject.entry(post.validation.subject).or_default().push(post);
    }

    let category_distribution = category_distribution(&by_subject, posts.len());

    let top_posts = sorted_slice(posts, limits.top_posts);
    let top_posts_by_category = by_subject
        .iter()
        .map(|(subject, group)| (*subject, sorted_slice(group, limits.per_category)))
        .collect();

    let mut all_posts: Vec<RankedPost> = posts.iter().map(|p| (*p).clone()).collect();
    all_posts.sort_by(by_recency);

    EntityAggregate {
        total_posts: posts.len(),
        category_distribution,
        top_posts,
        top_posts_by_category,
        all_posts,
    }
}

fn sorted_slice(posts: &[&RankedPost], limit: Option<usize>) -> Vec<RankedPost> {
    let mut sorted: Vec<&RankedPost> = posts.to_vec();
    sorted.sort_by(|a, b| by_engagement(a, b));
    sorted
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn category_distribution(
    by_subject: &IndexMap<Subject, Vec<&RankedPost>>,
    total: usize,
) -> IndexMap<Subject, CategoryStats> {
    let counts: Vec<usize> = by_subject.values().map(Vec::len).collect();
    let percentages = balanced_percentages(&counts, total);

    by_subject
        .iter()
        .zip(percentages)
        .map(|((subject, group), percentage)| {
            let stats = CategoryStats {
                count: group.len(),
                percentage,
                sentiment_breakdown: sentiment_breakdown(group),
            };
            (*subject, stats)
        })
        .collect()
}

fn sentiment_breakdown(group: &[&RankedPost]) -> SentimentBreakdown {
    let counts: Vec<usize> = Sentiment::ALL
        .iter()
        .map(|s| group.iter().filter(|p| p.validation.sentiment == *s).count())
        .collect();
    let pct = balanced_percentages(&counts, group.len());
    SentimentBreakdown {
        positive: pct[0],
        negative: pct[1],
        neutral: pct[2],
        mixed: pct[3],
    }
}

/// Percent shares rounded to one decimal, nudged so the non-empty set sums
/// to within `[99.0, 101.0]`. Residual goes onto the largest bucket.
#[allow(clippy::cast_precision_loss)]
fn balanced_percentages(counts: &[usize], total: usize) -> Vec<f64> {
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    let mut pct: Vec<f64> = counts
        .iter()
        .map(|&c| round1(c as f64 / total as f64 * 100.0))
        .collect();

    let sum: f64 = pct.iter().sum();
    if !(99.0..=101.0).contains(&sum) {
        if let Some(largest) = counts
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .map(|(i, _)| i)
        {
            pct[largest] = round1(pct[largest] + (100.0 - sum));
        }
    }
    pct
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
