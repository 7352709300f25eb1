/// Database row types — these map directly to SQLite rows.
/// Distinct from podium-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    /// Argon2 hash; None until the user sets a password (email-link accounts).
    pub password: Option<String>,
    pub created_at: String,
}

pub struct RankingRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub owner_id: String,
    /// Display name joined from profiles, falling back to the owner's email.
    pub author_name: Option<String>,
    pub created_at: String,
}

pub struct ItemRow {
    pub id: String,
    pub ranking_id: String,
    pub rank: i64,
    pub title: String,
    pub comment: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
}

pub struct ProfileRow {
    pub user_id: String,
    pub display_name: String,
}
