use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use podium_types::api::{Claims, ItemListResponse};

use crate::convert::item_from_row;
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::rankings::normalize_description;
use crate::{AppState, blocking};

/// Multipart fields of the item create/edit forms. The optional `image` part
/// carries the original filename used for the object path.
struct ItemForm {
    rank: Option<i64>,
    title: Option<String>,
    comment: Option<String>,
    url: Option<String>,
    image: Option<(String, Bytes)>,
}

/// Create an item. Validation (rank ≥ 1, non-empty title, duplicate-rank
/// check) happens before any write; if an image is attached, its upload runs
/// first and a failed upload aborts the whole create.
pub async fn create_item(
    State(state): State<AppState>,
    Path(ranking_id): Path<Uuid>,
    AuthUser(claims): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    require_owner(&state, ranking_id, &claims).await?;

    let form = read_form(multipart).await?;
    let (rank, title) = validate_form(&form)?;

    let taken = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        blocking(move || db.rank_taken(&rid, rank, None)).await?
    };
    if taken {
        return Err(ApiError::Conflict(
            "an item with this rank already exists".into(),
        ));
    }

    let image_url = match &form.image {
        Some((file_name, data)) => Some(
            state
                .media
                .store(ranking_id, file_name, data)
                .await
                .map_err(ApiError::Upload)?,
        ),
        None => None,
    };

    let item_id = Uuid::new_v4();
    {
        let db = state.db.clone();
        let iid = item_id.to_string();
        let rid = ranking_id.to_string();
        let comment = normalize_description(form.comment.clone());
        let url = normalize_description(form.url.clone());
        let title = title.clone();
        blocking(move || {
            db.insert_item(
                &iid,
                &rid,
                rank,
                &title,
                comment.as_deref(),
                image_url.as_deref(),
                url.as_deref(),
            )
        })
        .await?;
    }

    info!("Item {} added to ranking {} at rank {}", item_id, ranking_id, rank);
    Ok((StatusCode::CREATED, item_list(&state, ranking_id).await?))
}

/// Edit an item. The duplicate-rank check excludes the item itself so it can
/// keep its rank; a replacement image is uploaded before any write and the
/// stored URL only changes once the upload succeeded.
pub async fn update_item(
    State(state): State<AppState>,
    Path((ranking_id, item_id)): Path<(Uuid, Uuid)>,
    AuthUser(claims): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    require_owner(&state, ranking_id, &claims).await?;

    let existing = {
        let db = state.db.clone();
        let iid = item_id.to_string();
        let rid = ranking_id.to_string();
        blocking(move || db.get_item(&iid, &rid)).await?
    };
    if existing.is_none() {
        return Err(ApiError::NotFound);
    }

    let form = read_form(multipart).await?;
    let (rank, title) = validate_form(&form)?;

    let taken = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        let iid = item_id.to_string();
        blocking(move || db.rank_taken(&rid, rank, Some(&iid))).await?
    };
    if taken {
        return Err(ApiError::Conflict(
            "an item with this rank already exists".into(),
        ));
    }

    let new_image_url = match &form.image {
        Some((file_name, data)) => Some(
            state
                .media
                .store(ranking_id, file_name, data)
                .await
                .map_err(ApiError::Upload)?,
        ),
        None => None,
    };

    {
        let db = state.db.clone();
        let iid = item_id.to_string();
        let rid = ranking_id.to_string();
        let comment = normalize_description(form.comment.clone());
        let url = normalize_description(form.url.clone());
        let title = title.clone();
        let updated = blocking(move || {
            if !db.update_item(&iid, &rid, rank, &title, comment.as_deref(), url.as_deref())? {
                return Ok(false);
            }
            if let Some(image_url) = new_image_url {
                db.set_item_image(&iid, &rid, &image_url)?;
            }
            Ok(true)
        })
        .await?;
        if !updated {
            return Err(ApiError::NotFound);
        }
    }

    Ok((StatusCode::OK, item_list(&state, ranking_id).await?))
}

pub(crate) async fn require_owner(
    state: &AppState,
    ranking_id: Uuid,
    claims: &Claims,
) -> Result<(), ApiError> {
    let db = state.db.clone();
    let rid = ranking_id.to_string();
    let owner = claims.sub.to_string();
    let owned = blocking(move || db.ranking_owned_by(&rid, &owner)).await?;
    if !owned {
        // Someone else's ranking is indistinguishable from a missing one.
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub(crate) async fn item_list(
    state: &AppState,
    ranking_id: Uuid,
) -> Result<Json<ItemListResponse>, ApiError> {
    let db = state.db.clone();
    let rid = ranking_id.to_string();
    let rows = blocking(move || db.list_items(&rid, false)).await?;
    Ok(Json(ItemListResponse {
        items: rows.into_iter().map(item_from_row).collect(),
    }))
}

async fn read_form(mut multipart: Multipart) -> Result<ItemForm, ApiError> {
    let mut form = ItemForm {
        rank: None,
        title: None,
        comment: None,
        url: None,
        image: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed form: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "rank" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("malformed form: {e}")))?;
                let rank = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ApiError::Validation("rank must be a number".into()))?;
                form.rank = Some(rank);
            }
            "title" | "comment" | "url" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("malformed form: {e}")))?;
                match name.as_str() {
                    "title" => form.title = Some(text),
                    "comment" => form.comment = Some(text),
                    _ => form.url = Some(text),
                }
            }
            "image" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("malformed form: {e}")))?;
                // An empty file input submits a zero-length part; treat it
                // as "no image".
                if !data.is_empty() {
                    form.image = Some((file_name, data));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn validate_form(form: &ItemForm) -> Result<(i64, String), ApiError> {
    let rank = form
        .rank
        .ok_or_else(|| ApiError::Validation("rank is required".into()))?;
    if rank < 1 {
        return Err(ApiError::Validation("rank must be at least 1".into()));
    }

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }

    Ok((rank, title))
}
