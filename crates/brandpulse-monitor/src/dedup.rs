//! Run-scoped duplicate suppression keyed by source-native identifiers.

use std::collections::HashSet;

use crate::types::{RawPost, Source};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeenKey {
    brand: String,
    source: Source,
    source_id: String,
}

/// Tracks `(source, source_id)` pairs already admitted for each matched
/// entity. A post matched to two entities is admitted once per entity.
///
/// Cleared at the start of every refresh and whenever the cache is cleared.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<SeenKey>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a post is offered, `false` afterwards.
    pub fn admit(&mut self, post: &RawPost) -> bool {
        self.seen.insert(SeenKey {
            brand: post.brand().to_string(),
            source: post.source,
            source_id: post.source_id.clone(),
        })
    }

    /// Keep first occurrences; returns the survivors and how many were dropped.
    pub fn filter(&mut self, posts: Vec<RawPost>) -> (Vec<RawPost>, usize) {
        let before = posts.len();
        let kept: Vec<RawPost> = posts.into_iter().filter(|p| self.admit(p)).collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
