use crate::types::{RawPost, Subject};

use super::ChatMessage;

const SYSTEM_PROMPT: &str = "You are an expert at deciding whether social media posts \
refer to a specific company, and at classifying what they say about it. \
Answer only with JSON matching the provided schema.";

/// Truncate to at most `limit` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Opening conversation for one (post, entity) pair.
#[must_use]
pub fn initial_messages(
    post: &RawPost,
    entity: &str,
    description: Option<&str>,
    text_limit: usize,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(post, entity, description, text_limit)),
    ]
}

fn user_prompt(
    post: &RawPost,
    entity: &str,
    description: Option<&str>,
    text_limit: usize,
) -> String {
    let subjects = Subject::CLASSIFIABLE
        .iter()
        .map(|s| s.label())
        .collect::<Vec<_>>()
        .join(", ");
    // title and body share the character budget, title first
    let title = truncate_chars(&post.title, text_limit);
    let remaining = text_limit.saturating_sub(title.chars().count());
    let content = truncate_chars(post.body.as_deref().unwrap_or_default(), remaining);
    let context = description.unwrap_or("(no description configured)");

    format!(
        "Decide whether this post genuinely discusses the company {entity}.\n\
         \n\
         Company context:\n{context}\n\
         \n\
         Post ({source}, {community}):\n\
         Title: {title}\n\
         Content: {content}\n\
         \n\
         Instructions:\n\
         1. Set is_relevant to true only if the post is about {entity} the company or platform, \
         not a homonym or an ordinary word with the same spelling.\n\
         2. If relevant, pick the main subject from: {subjects}. Otherwise use General.\n\
         3. Give the overall sentiment toward {entity} (positive, negative, neutral or mixed) \
         and a sentiment_score from -1.0 (very negative) to 1.0 (very positive). \
         Neutral posts score close to 0.",
        source = post.source,
        community = post.community,
    )
}

/// Follow-up turn asking the model to fix a reply that failed to parse.
#[must_use]
pub fn corrective_message(error: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "Your previous reply could not be used: {error}. \
         Reply again with a single JSON object containing exactly the fields \
         is_relevant, subject, sentiment and sentiment_score, using only the allowed values."
    ))
}
