use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Ranking, RankingItem};

// -- JWT Claims --

/// JWT claims carried by every authenticated session token.
/// `jti` identifies the session row so sign-out can revoke individual tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub jti: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Mirror of the authenticated identity behind a token.
#[derive(Debug, Serialize)]
pub struct CurrentSessionResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkRequest {
    pub email: String,
}

/// The one-time token is returned in the response; delivering it by mail is
/// outside this service.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub token: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedeemLinkRequest {
    pub token: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignOutScope {
    /// Revoke only the session presenting the token.
    Local,
    /// Revoke every session belonging to the user.
    All,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignOutRequest {
    pub scope: SignOutScope,
}

// -- Rankings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRankingRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateRankingResponse {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRankingRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A ranking paired with its items (empty when none exist yet).
#[derive(Debug, Serialize)]
pub struct RankingDetailResponse {
    pub ranking: Ranking,
    pub items: Vec<RankingItem>,
}

#[derive(Debug, Serialize)]
pub struct NextRankResponse {
    pub next_rank: i64,
}

// -- Items --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveItemRequest {
    pub direction: MoveDirection,
}

/// Returned by item mutations: the full item list of the ranking, ascending
/// by rank, so callers can re-render without a second fetch.
#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<RankingItem>,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub display_name: String,
}
