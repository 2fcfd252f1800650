use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiError;
use crate::{
    app_state::AppState,
    domain::search::{BackfillStats, ContentChange, EntityKind, IndexEvent},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:kind/:id", post(enqueue_entity))
        .route("/changes", post(enqueue_change))
        .route("/backfill", post(backfill))
        .route("/stale", post(reindex_stale))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Enqueued {
    queued: usize,
}

#[derive(Debug, Deserialize)]
struct KindQuery {
    kind: Option<String>,
}

#[instrument(name = "POST /index/:kind/:id", skip(app_state))]
async fn enqueue_entity(
    State(app_state): State<AppState>,
    Path((kind, id)): Path<(String, i32)>,
) -> Result<(StatusCode, Json<Enqueued>), ApiError> {
    let kind = parse_kind(&kind)?;
    let queued = app_state.index_queue.publish(IndexEvent::new(kind, id));

    Ok((
        StatusCode::ACCEPTED,
        Json(Enqueued {
            queued: usize::from(queued),
        }),
    ))
}

#[instrument(name = "POST /index/changes", skip(app_state))]
async fn enqueue_change(
    State(app_state): State<AppState>,
    Json(change): Json<ContentChange>,
) -> (StatusCode, Json<Enqueued>) {
    let queued = app_state.index_queue.publish_change(&change);

    (StatusCode::ACCEPTED, Json(Enqueued { queued }))
}

#[instrument(name = "POST /index/backfill", skip(app_state))]
async fn backfill(
    State(app_state): State<AppState>,
    Query(query): Query<KindQuery>,
) -> Result<Json<BackfillStats>, ApiError> {
    let stats = match query.kind.as_deref().map(parse_kind).transpose()? {
        Some(kind) => {
            let mut stats = BackfillStats::default();
            stats.record(kind, app_state.indexer.backfill(kind).await?);
            stats
        }
        None => app_state.indexer.index_all().await,
    };

    Ok(Json(stats))
}

#[instrument(name = "POST /index/stale", skip(app_state))]
async fn reindex_stale(
    State(app_state): State<AppState>,
    Query(query): Query<KindQuery>,
) -> Result<Json<BackfillStats>, ApiError> {
    let stats = match query.kind.as_deref().map(parse_kind).transpose()? {
        Some(kind) => {
            let mut stats = BackfillStats::default();
            stats.record(kind, app_state.indexer.reindex_stale(kind).await?);
            stats
        }
        None => app_state.indexer.reindex_all_stale().await,
    };

    Ok(Json(stats))
}

fn parse_kind(raw: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_str(raw.trim())
        .map_err(|_| ApiError::bad_request(format!("Unknown entity type: {raw}")))
}
