use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-owned, titled ordered list of items. Visible to non-owners only
/// when `is_public` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub owner_id: Uuid,
    /// Owner's display name, falling back to their email when no profile row exists.
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One entry within a ranking. `rank` is the sole ordering key and is
/// intended to be unique per ranking (enforced before insert, not by the
/// database).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingItem {
    pub id: Uuid,
    pub ranking_id: Uuid,
    pub rank: i64,
    pub title: String,
    pub comment: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
}
