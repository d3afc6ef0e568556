//! On-disk copies of a published snapshot.
//!
//! - `posts.jsonl`: one line per ranked post
//! - `aggregates.json`: the per-entity aggregate map
//!
//! Each file is written to a temporary sibling and renamed into place.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ArtifactError;
use crate::types::{Snapshot, Source, ValidationResult};

pub const POSTS_FILE: &str = "posts.jsonl";
pub const AGGREGATES_FILE: &str = "aggregates.json";

#[derive(Debug, Serialize)]
struct PostRecord<'a> {
    id: &'a str,
    source: Source,
    brand: &'a str,
    title: &'a str,
    validation: &'a ValidationResult,
}

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write both artifacts for `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on any I/O or serialization failure.
    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut lines = Vec::new();
        for post in snapshot.aggregates.values().flat_map(|a| a.all_posts.iter()) {
            let record = PostRecord {
                id: &post.post.source_id,
                source: post.post.source,
                brand: post.post.brand(),
                title: &post.post.title,
                validation: &post.validation,
            };
            serde_json::to_writer(&mut lines, &record)?;
            lines.push(b'\n');
        }
        self.replace(POSTS_FILE, &lines).await?;

        let aggregates = serde_json::to_vec_pretty(&snapshot.aggregates)?;
        self.replace(AGGREGATES_FILE, &aggregates).await?;

        tracing::debug!(dir = %self.dir.display(), "artifacts written");
        Ok(())
    }

    async fn replace(&self, name: &str, contents: &[u8]) -> Result<(), ArtifactError> {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }
}
