//! Engagement scoring and the canonical post ordering.

use std::cmp::Ordering;

use crate::types::{RankedPost, RawPost, ValidationResult};

/// Weight per platform upvote/point.
pub const SCORE_WEIGHT: f64 = 1.0;
/// Weight per comment; discussion counts double.
pub const COMMENT_WEIGHT: f64 = 2.0;
/// Weight of the `[0, 1]` quality ratio.
pub const RATIO_WEIGHT: f64 = 10.0;

/// Engagement score from raw platform signals.
///
/// `raw_score × 1.0 + comment_count × 2.0 + extra_ratio × 10.0`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_score(raw_score: i64, comment_count: u64, extra_ratio: f64) -> f64 {
    raw_score as f64 * SCORE_WEIGHT + comment_count as f64 * COMMENT_WEIGHT + extra_ratio * RATIO_WEIGHT
}

#[must_use]
pub fn score_post(post: &RawPost) -> f64 {
    engagement_score(post.raw_score, post.comment_count, post.extra_ratio)
}

/// Attach a validation result and engagement score to a post.
#[must_use]
pub fn rank(post: RawPost, validation: ValidationResult) -> RankedPost {
    let engagement_score = score_post(&post);
    RankedPost {
        post,
        validation,
        engagement_score,
    }
}

/// Higher score first, then newer first, then `(source, source_id)`.
#[must_use]
pub fn by_engagement(a: &RankedPost, b: &RankedPost) -> Ordering {
    b.engagement_score
        .total_cmp(&a.engagement_score)
        .then_with(|| b.post.created_at.cmp(&a.post.created_at))
        .then_with(|| a.post.source.cmp(&b.post.source))
        .then_with(|| a.post.source_id.cmp(&b.post.source_id))
}

/// Newer first, then the engagement ordering.
#[must_use]
pub fn by_recency(a: &RankedPost, b: &RankedPost) -> Ordering {
    b.post
        .created_at
        .cmp(&a.post.created_at)
        .then_with(|| by_engagement(a, b))
}
