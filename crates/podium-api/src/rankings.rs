use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use podium_types::api::{
    CreateRankingRequest, CreateRankingResponse, NextRankResponse, RankingDetailResponse,
    UpdateRankingRequest,
};
use podium_types::models::Ranking;

use crate::convert::{item_from_row, ranking_from_row};
use crate::error::ApiError;
use crate::extract::{AuthUser, MaybeUser};
use crate::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    /// `desc` flips the item order to worst-to-best, used by the reveal
    /// viewer. Anything else (including absent) means ascending.
    pub order: Option<String>,
}

/// Public rankings, plus the viewer's own when authenticated. Newest first.
pub async fn list_rankings(
    State(state): State<AppState>,
    MaybeUser(claims): MaybeUser,
) -> Result<Json<Vec<Ranking>>, ApiError> {
    let viewer = claims.map(|c| c.sub.to_string());
    let db = state.db.clone();
    let rows = blocking(move || db.list_rankings(viewer.as_deref())).await?;
    Ok(Json(rows.into_iter().map(ranking_from_row).collect()))
}

pub async fn create_ranking(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateRankingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let description = normalize_description(req.description);

    let id = Uuid::new_v4();
    {
        let db = state.db.clone();
        let rid = id.to_string();
        let owner = claims.sub.to_string();
        blocking(move || {
            db.create_ranking(&rid, &title, description.as_deref(), req.is_public, &owner)
        })
        .await?;
    }

    info!("Ranking {} created by {}", id, claims.sub);
    Ok((StatusCode::CREATED, Json(CreateRankingResponse { id })))
}

/// Ranking row and item list, fetched as two concurrent lookups. The item
/// list defaults to empty; a missing (or invisible) ranking is a 404.
pub async fn ranking_detail(
    State(state): State<AppState>,
    Path(ranking_id): Path<Uuid>,
    Query(query): Query<DetailQuery>,
    MaybeUser(claims): MaybeUser,
) -> Result<Json<RankingDetailResponse>, ApiError> {
    let viewer = claims.map(|c| c.sub.to_string());
    let descending = query.order.as_deref() == Some("desc");

    let ranking_fut = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        blocking(move || db.get_ranking(&rid, viewer.as_deref()))
    };
    let items_fut = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        blocking(move || db.list_items(&rid, descending))
    };

    let (ranking, items) = tokio::join!(ranking_fut, items_fut);
    let ranking = ranking?.ok_or(ApiError::NotFound)?;
    let items = items?;

    Ok(Json(RankingDetailResponse {
        ranking: ranking_from_row(ranking),
        items: items.into_iter().map(item_from_row).collect(),
    }))
}

/// Only title and description are mutable; the UPDATE is scoped to the
/// owner, so someone else's ranking looks like it does not exist.
pub async fn update_ranking(
    State(state): State<AppState>,
    Path(ranking_id): Path<Uuid>,
    AuthUser(claims): AuthUser,
    Json(req): Json<UpdateRankingRequest>,
) -> Result<Json<Ranking>, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let description = normalize_description(req.description);

    let updated = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        let owner = claims.sub.to_string();
        blocking(move || db.update_ranking(&rid, &owner, &title, description.as_deref())).await?
    };
    if !updated {
        return Err(ApiError::NotFound);
    }

    let row = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        let owner = claims.sub.to_string();
        blocking(move || db.get_ranking(&rid, Some(&owner))).await?
    }
    .ok_or(ApiError::NotFound)?;

    Ok(Json(ranking_from_row(row)))
}

/// Default rank for the new-item form: one past the highest rank in use.
pub async fn next_rank(
    State(state): State<AppState>,
    Path(ranking_id): Path<Uuid>,
    AuthUser(claims): AuthUser,
) -> Result<Json<NextRankResponse>, ApiError> {
    let db = state.db.clone();
    let rid = ranking_id.to_string();
    let owner = claims.sub.to_string();
    let next = blocking(move || {
        if !db.ranking_owned_by(&rid, &owner)? {
            return Ok(None);
        }
        Ok(Some(db.max_rank(&rid)? + 1))
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(NextRankResponse { next_rank: next }))
}

/// Blank descriptions are stored as NULL, matching the create form.
pub(crate) fn normalize_description(description: Option<String>) -> Option<String> {
    description.and_then(|d| {
        let trimmed = d.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
