use axum::{Json, extract::State};
use tracing::info;

use podium_types::api::UpsertProfileRequest;
use podium_types::models::Profile;

use crate::convert::profile_from_row;
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::{AppState, blocking};

/// The profile row of the authenticated user. 404 when none exists yet;
/// callers fall back to showing the account email.
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let db = state.db.clone();
    let uid = claims.sub.to_string();
    let row = blocking(move || db.get_profile(&uid))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(profile_from_row(row)))
}

/// Create or overwrite the display name, keyed on the user id.
pub async fn upsert_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let display_name = req.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::Validation("display name is required".into()));
    }

    let row = {
        let db = state.db.clone();
        let uid = claims.sub.to_string();
        let name = display_name.clone();
        blocking(move || {
            db.upsert_profile(&uid, &name)?;
            db.get_profile(&uid)
        })
        .await?
    }
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("profile missing after upsert")))?;

    info!("Profile updated for {}", claims.sub);
    Ok(Json(profile_from_row(row)))
}
