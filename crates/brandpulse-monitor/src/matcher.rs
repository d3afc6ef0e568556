//! Cheap lexical entity matching, run before any model call is spent.

use brandpulse_core::{EntityConfig, MatchPolicy};
use regex::Regex;

use crate::error::MatcherError;
use crate::types::RawPost;

struct Rule {
    name: String,
    lowered: String,
    kind: RuleKind,
}

enum RuleKind {
    Substring,
    /// Name must appear capitalized as a whole word and share the text with
    /// at least one context keyword.
    Ambiguous { capitalized: Regex, context: Regex },
}

/// Decides which tracked entities a post plausibly mentions.
pub struct EntityMatcher {
    rules: Vec<Rule>,
}

impl EntityMatcher {
    /// Compile matching rules for the tracked entities.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError::MissingContext`] for an ambiguous entity with
    /// no non-blank context keyword, and [`MatcherError::Pattern`] if a
    /// generated pattern fails to compile.
    pub fn new(entities: &[EntityConfig]) -> Result<Self, MatcherError> {
        let mut rules = Vec::with_capacity(entities.len());
        for entity in entities {
            let kind = match entity.policy() {
                MatchPolicy::Unambiguous => RuleKind::Substring,
                MatchPolicy::Ambiguous { context_keywords } => {
                    let capitalized = Regex::new(&format!(r"\b{}\b", regex::escape(&entity.name)))?;
                    let keywords: Vec<String> = context_keywords
                        .iter()
                        .map(|kw| kw.trim())
                        .filter(|kw| !kw.is_empty())
                        .map(regex::escape)
                        .collect();
                    if keywords.is_empty() {
                        return Err(MatcherError::MissingContext {
                            entity: entity.name.clone(),
                        });
                    }
                    let alternatives = keywords.join("|");
                    let context = Regex::new(&format!(r"(?i)\b(?:{alternatives})\b"))?;
                    RuleKind::Ambiguous {
                        capitalized,
                        context,
                    }
                }
            };
            rules.push(Rule {
                name: entity.name.clone(),
                lowered: entity.name.to_lowercase(),
                kind,
            });
        }
        Ok(Self { rules })
    }

    /// Names of every entity the text mentions, in configured order.
    #[must_use]
    pub fn matching_entities(&self, text: &str) -> Vec<&str> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| {
                if !lowered.contains(&rule.lowered) {
                    return false;
                }
                match &rule.kind {
                    RuleKind::Substring => true,
                    RuleKind::Ambiguous {
                        capitalized,
                        context,
                    } => capitalized.is_match(text) && context.is_match(text),
                }
            })
            .map(|rule| rule.name.as_str())
            .collect()
    }

    /// One copy of `post` per matched entity, each with `matched_brand` set.
    /// An empty result means the post is dropped.
    #[must_use]
    pub fn match_post(&self, post: &RawPost) -> Vec<RawPost> {
        self.matching_entities(&post.text())
            .into_iter()
            .map(|name| RawPost {
                matched_brand: Some(name.to_string()),
                ..post.clone()
            })
            .collect()
    }

    #[must_use]
    pub fn match_all(&self, posts: &[RawPost]) -> Vec<RawPost> {
        posts.iter().flat_map(|post| self.match_post(post)).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::Source;

    fn entities() -> Vec<EntityConfig> {
        vec![
            EntityConfig {
                name: "Taboola".to_string(),
                description: None,
                ambiguous: false,
                context_keywords: vec![],
            },
            EntityConfig {
                name: "Realize".to_string(),
                description: None,
                ambiguous: true,
                context_keywords: vec![
                    "advertising".to_string(),
                    "platform".to_string(),
                    "ad".to_string(),
                ],
            },
        ]
    }

    fn post(title: &str, body: Option<&str>) -> RawPost {
        RawPost {
            source_id: "p1".to_string(),
            source: Source::Reddit,
            title: title.to_string(),
            body: body.map(ToString::to_string),
            raw_score: 3,
            comment_count: 1,
            extra_ratio: 0.9,
            created_at: Utc::now(),
            permalink: "https://reddit.com/r/adops/p1".to_string(),
            community: "adops".to_string(),
            author: "someone".to_string(),
            matched_brand: None,
        }
    }

    #[test]
    fn unambiguous_name_matches_case_insensitively() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        assert_eq!(
            matcher.matching_entities("anyone tried TABOOLA widgets?"),
            vec!["Taboola"]
        );
    }

    #[test]
    fn lowercase_ambiguous_mention_with_keyword_does_not_match() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        assert!(matcher
            .matching_entities("I didn't realize advertising was this expensive")
            .is_empty());
    }

    #[test]
    fn capitalized_ambiguous_mention_without_keyword_does_not_match() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        assert!(matcher
            .matching_entities("Realize your dreams this summer")
            .is_empty());
    }

    #[test]
    fn capitalized_ambiguous_mention_with_keyword_matches() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        assert_eq!(
            matcher.matching_entities("Has anyone used the Realize platform for campaigns?"),
            vec!["Realize"]
        );
    }

    #[test]
    fn keywords_only_count_as_whole_words() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        // "already" contains "ad" but is not the keyword.
        assert!(matcher
            .matching_entities("Realize already shipped it")
            .is_empty());
    }

    #[test]
    fn capitalized_name_must_be_whole_word() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        assert!(matcher
            .matching_entities("Realized gains on the advertising budget")
            .is_empty());
    }

    #[test]
    fn post_mentioning_both_entities_is_duplicated() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        let copies = matcher.match_post(&post(
            "Taboola vs Realize",
            Some("Comparing the advertising reach of both"),
        ));
        let brands: Vec<_> = copies.iter().map(RawPost::brand).collect();
        assert_eq!(brands, vec!["Taboola", "Realize"]);
        assert!(copies.iter().all(|c| c.source_id == "p1"));
    }

    #[test]
    fn body_text_participates_in_matching() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        let copies = matcher.match_post(&post("Native ads question", Some("We moved off taboola")));
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].brand(), "Taboola");
    }

    #[test]
    fn ambiguous_entity_without_keywords_is_rejected() {
        let entities = vec![EntityConfig {
            name: "Realize".to_string(),
            description: None,
            ambiguous: true,
            context_keywords: vec!["  ".to_string()],
        }];
        let err = EntityMatcher::new(&entities).err().expect("should be rejected");
        assert!(matches!(
            err,
            MatcherError::MissingContext { ref entity } if entity == "Realize"
        ));
    }

    #[test]
    fn unmatched_posts_are_dropped() {
        let matcher = EntityMatcher::new(&entities()).unwrap();
        let posts = vec![post("Nothing to see", None), post("Taboola CPMs", None)];
        let matched = matcher.match_all(&posts);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Taboola CPMs");
    }
}
