//! Process-lifetime cache of the last successful refresh.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactWriter;
use crate::dedup::Deduplicator;
use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::types::Snapshot;

/// Holds the published [`Snapshot`] and serializes refreshes.
///
/// Only one refresh runs at a time; the run lock also owns the dedup seen-set.
/// A new snapshot replaces the old one in a single swap, and a failed or
/// cancelled refresh leaves the published snapshot untouched.
pub struct SnapshotStore {
    pipeline: Pipeline,
    current: RwLock<Option<Arc<Snapshot>>>,
    run_lock: Mutex<Deduplicator>,
    artifacts: Option<ArtifactWriter>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(pipeline: Pipeline, artifacts: Option<ArtifactWriter>) -> Self {
        Self {
            pipeline,
            current: RwLock::new(None),
            run_lock: Mutex::new(Deduplicator::new()),
            artifacts,
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The last published snapshot, if any refresh has succeeded.
    pub async fn get_cached_aggregates(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    /// Run a refresh, waiting for any in-flight one to finish first.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's [`PipelineError`], or [`PipelineError::Cancelled`]
    /// if `cancel` fires before the run completes.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Arc<Snapshot>, PipelineError> {
        let mut dedup = self.run_lock.lock().await;
        self.run_locked(&mut dedup, cancel).await
    }

    /// Like [`refresh`](Self::refresh) but fails immediately with
    /// [`PipelineError::RefreshInProgress`] if another refresh holds the lock.
    ///
    /// # Errors
    ///
    /// See [`refresh`](Self::refresh).
    pub async fn try_refresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Snapshot>, PipelineError> {
        let mut dedup = self
            .run_lock
            .try_lock()
            .map_err(|_| PipelineError::RefreshInProgress)?;
        self.run_locked(&mut dedup, cancel).await
    }

    /// Drop the published snapshot and forget every seen post.
    pub async fn clear(&self) {
        let mut dedup = self.run_lock.lock().await;
        dedup.clear();
        *self.current.write().await = None;
        tracing::info!("snapshot cache cleared");
    }

    async fn run_locked(
        &self,
        dedup: &mut Deduplicator,
        cancel: &CancellationToken,
    ) -> Result<Arc<Snapshot>, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("refresh cancelled; keeping previous snapshot");
                return Err(PipelineError::Cancelled);
            }
            result = self.pipeline.run(dedup) => match result {
                Ok(snapshot) => Arc::new(snapshot),
                Err(e) => {
                    tracing::warn!(error = %e, "refresh failed; keeping previous snapshot");
                    return Err(e);
                }
            },
        };

        *self.current.write().await = Some(Arc::clone(&snapshot));

        if let Some(writer) = &self.artifacts {
            if let Err(e) = writer.write(&snapshot).await {
                tracing::warn!(dir = %writer.dir().display(), error = %e, "failed to write artifacts");
            }
        }

        Ok(snapshot)
    }
}
