//! Plain-text ranking report for a refresh snapshot.

use std::fmt;

use brandpulse_monitor::{EntityAggregate, RankedPost, Snapshot, Subject};
use chrono::{DateTime, Utc};

/// Categories whose top posts are listed under each entity.
const REPORT_CATEGORIES: usize = 3;
const TITLE_WIDTH: usize = 70;

/// The whole snapshot rendered as text; print it or call `to_string()`.
pub(crate) struct Report<'a> {
    snapshot: &'a Snapshot,
    generated: DateTime<Utc>,
}

impl<'a> Report<'a> {
    pub(crate) fn new(snapshot: &'a Snapshot, generated: DateTime<Utc>) -> Self {
        Self {
            snapshot,
            generated,
        }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.snapshot.metadata;

        writeln!(f, "# Brand Mention Rankings")?;
        writeln!(f)?;
        writeln!(f, "Generated: {}", self.generated.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(
            f,
            "Fetched {} posts, {} matched, {} ranked ({} irrelevant, {} duplicates, {} fallbacks)",
            meta.fetched,
            meta.matched,
            meta.ranked,
            meta.irrelevant,
            meta.duplicates_dropped,
            meta.fallbacks
        )?;
        for failure in &meta.source_failures {
            writeln!(
                f,
                "warning: {} fetch for {} failed: {}",
                failure.source, failure.entity, failure.error
            )?;
        }

        for (entity, aggregate) in &self.snapshot.aggregates {
            writeln!(f)?;
            write_entity(f, entity, aggregate)?;
        }
        Ok(())
    }
}

fn write_entity(
    f: &mut fmt::Formatter<'_>,
    entity: &str,
    aggregate: &EntityAggregate,
) -> fmt::Result {
    writeln!(f, "## {entity} ({} posts)", aggregate.total_posts)?;
    if aggregate.total_posts == 0 {
        return writeln!(f, "no relevant mentions");
    }

    writeln!(f)?;
    writeln!(
        f,
        "{:<22}{:>6}{:>8}{:>8}{:>8}{:>8}{:>8}",
        "CATEGORY", "POSTS", "SHARE", "POS", "NEG", "NEU", "MIX"
    )?;
    for (subject, stats) in &aggregate.category_distribution {
        let s = &stats.sentiment_breakdown;
        writeln!(
            f,
            "{:<22}{:>6}{:>7.1}%{:>7.1}%{:>7.1}%{:>7.1}%{:>7.1}%",
            subject.label(),
            stats.count,
            stats.percentage,
            s.positive,
            s.negative,
            s.neutral,
            s.mixed
        )?;
    }

    writeln!(f)?;
    writeln!(f, "Top posts:")?;
    for (i, post) in aggregate.top_posts.iter().enumerate() {
        writeln!(f, "{:>3}. {}", i + 1, post_line(post))?;
    }

    let subjects = top_categories(aggregate);
    if !subjects.is_empty() {
        writeln!(f)?;
        writeln!(f, "Top categories:")?;
        for subject in subjects {
            writeln!(f, "  {}:", subject.label())?;
            for post in aggregate
                .top_posts_by_category
                .get(&subject)
                .into_iter()
                .flatten()
            {
                writeln!(f, "    - {}", post_line(post))?;
            }
        }
    }
    Ok(())
}

/// Largest categories first; ties keep first-seen order.
fn top_categories(aggregate: &EntityAggregate) -> Vec<Subject> {
    let mut subjects: Vec<(Subject, usize)> = aggregate
        .category_distribution
        .iter()
        .map(|(subject, stats)| (*subject, stats.count))
        .collect();
    subjects.sort_by(|a, b| b.1.cmp(&a.1));
    subjects
        .into_iter()
        .take(REPORT_CATEGORIES)
        .map(|(subject, _)| subject)
        .collect()
}

fn post_line(post: &RankedPost) -> String {
    format!(
        "[{:.1}] {} ({}, {}; {} {:+.2}) {}",
        post.engagement_score,
        truncate(&post.post.title, TITLE_WIDTH),
        post.post.source,
        post.post.community,
        post.validation.sentiment,
        post.validation.sentiment_score,
        post.post.permalink
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
