use std::str::FromStr;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::ApiError;
use crate::{
    app_state::AppState,
    domain::search::{group_for_palette, EntityKind, IndexCoverage, PaletteGroup, SearchResults},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search))
        .route("/palette", get(palette))
        .route("/stats", get(stats))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    q: Option<String>,
    limit: Option<i64>,
    types: Option<String>,
}

impl SearchQuery {
    fn text(&self) -> Result<&str, ApiError> {
        self.q
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Missing query parameter: q"))
    }
}

#[instrument(name = "GET /search", skip(app_state))]
async fn search(
    State(app_state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResults>, ApiError> {
    let Query(query) = query?;
    let types = parse_types(query.types.as_deref())?;
    let results = app_state
        .search
        .search(query.text()?, query.limit, &types)
        .await?;

    Ok(Json(results))
}

#[instrument(name = "GET /search/palette", skip(app_state))]
async fn palette(
    State(app_state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<PaletteGroup>>, ApiError> {
    let Query(query) = query?;
    let types = parse_types(query.types.as_deref())?;
    let results = app_state
        .search
        .search(query.text()?, query.limit, &types)
        .await?;

    Ok(Json(group_for_palette(
        results,
        app_state.search.similarity_floor(),
    )))
}

#[instrument(name = "GET /search/stats", skip(app_state))]
async fn stats(State(app_state): State<AppState>) -> Result<Json<Vec<IndexCoverage>>, ApiError> {
    Ok(Json(app_state.search.stats().await?))
}

/// Parse a comma separated type list, defaulting to every type.
fn parse_types(raw: Option<&str>) -> Result<Vec<EntityKind>, ApiError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(EntityKind::ALL.to_vec());
    };

    let mut types = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = EntityKind::from_str(part)
            .map_err(|_| ApiError::bad_request(format!("Unknown entity type: {part}")))?;
        if !types.contains(&kind) {
            types.push(kind);
        }
    }

    Ok(types)
}
