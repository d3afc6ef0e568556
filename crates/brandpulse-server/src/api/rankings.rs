use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension, Json,
};
use brandpulse_monitor::{EntityAggregate, PipelineError, RejectedPost, RunMetadata, Snapshot};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub(super) struct RankingsView<'a> {
    rankings: &'a IndexMap<String, EntityAggregate>,
    rejected: &'a [RejectedPost],
    metadata: &'a RunMetadata,
    last_updated: DateTime<Utc>,
}

impl<'a> RankingsView<'a> {
    fn of(snapshot: &'a Snapshot) -> Self {
        Self {
            rankings: &snapshot.aggregates,
            rejected: &snapshot.rejected,
            metadata: &snapshot.metadata,
            last_updated: snapshot.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
struct Cleared {
    cleared: bool,
}

/// Cached rankings, or `data: null` before the first successful refresh.
pub(super) async fn get_rankings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Response {
    let snapshot = state.store.get_cached_aggregates().await;
    Json(ApiResponse {
        data: snapshot.as_deref().map(RankingsView::of),
        meta: ResponseMeta::new(req_id.0),
    })
    .into_response()
}

/// Run the pipeline now and return the new rankings.
pub(super) async fn refresh_rankings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Response, ApiError> {
    tracing::info!(request_id = %req_id.0, "refresh requested");
    match state.store.try_refresh(&state.shutdown).await {
        Ok(snapshot) => Ok(Json(ApiResponse {
            data: Some(RankingsView::of(&snapshot)),
            meta: ResponseMeta::new(req_id.0),
        })
        .into_response()),
        Err(e) => Err(map_pipeline_error(req_id.0, &e)),
    }
}

pub(super) async fn clear_rankings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Response {
    state.store.clear().await;
    Json(ApiResponse {
        data: Cleared { cleared: true },
        meta: ResponseMeta::new(req_id.0),
    })
    .into_response()
}

pub(super) fn map_pipeline_error(request_id: String, error: &PipelineError) -> ApiError {
    let code = match error {
        PipelineError::RefreshInProgress => "conflict",
        PipelineError::Cancelled => "unavailable",
        PipelineError::AllSourcesFailed { .. } | PipelineError::NoValidPosts => "upstream_failure",
    };
    tracing::warn!(error = %error, code, "refresh request failed");
    ApiError::new(request_id, code, error.to_string())
}
