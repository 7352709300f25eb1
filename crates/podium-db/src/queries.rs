use crate::Database;
use crate::models::{ItemRow, ProfileRow, RankingRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

const RANKING_COLUMNS: &str = "r.id, r.title, r.description, r.is_public, r.owner_id, \
     COALESCE(p.display_name, u.email), r.created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, email, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn set_user_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                rusqlite::params![password_hash, id],
            )?;
            Ok(n == 1)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, jti: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (jti, user_id) VALUES (?1, ?2)",
                rusqlite::params![jti, user_id],
            )?;
            Ok(())
        })
    }

    pub fn session_exists(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE jti = ?1",
                [jti],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Returns true if a row was deleted. Deleting an absent session is not
    /// an error: sign-out of an already-revoked token is treated as success.
    pub fn delete_session(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE jti = ?1", [jti])?;
            Ok(n == 1)
        })
    }

    pub fn delete_user_sessions(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
            Ok(n)
        })
    }

    // -- Login tokens --

    pub fn create_login_token(&self, token: &str, user_id: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO login_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![token, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    /// Single-use redemption: the row is deleted whether or not it is still
    /// valid. Returns the user id only for an unexpired token.
    pub fn redeem_login_token(&self, token: &str, now: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT user_id, expires_at FROM login_tokens WHERE token = ?1",
                    [token],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((user_id, expires_at)) = row else {
                return Ok(None);
            };

            conn.execute("DELETE FROM login_tokens WHERE token = ?1", [token])?;

            if expires_at < now {
                return Ok(None);
            }
            Ok(Some(user_id))
        })
    }

    // -- Profiles --

    pub fn upsert_profile(&self, user_id: &str, display_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (user_id, display_name) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name",
                rusqlite::params![user_id, display_name],
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, display_name FROM profiles WHERE user_id = ?1",
                    [user_id],
                    |row| {
                        Ok(ProfileRow {
                            user_id: row.get(0)?,
                            display_name: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Rankings --

    pub fn create_ranking(
        &self,
        id: &str,
        title: &str,
        description: Option<&str>,
        is_public: bool,
        owner_id: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rankings (id, title, description, is_public, owner_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, title, description, is_public, owner_id],
            )?;
            Ok(())
        })
    }

    /// Visibility rule: an authenticated viewer sees public rankings plus
    /// their own; everyone else sees only public rankings. Newest first.
    pub fn list_rankings(&self, viewer_id: Option<&str>) -> Result<Vec<RankingRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RANKING_COLUMNS}
                 FROM rankings r
                 LEFT JOIN profiles p ON p.user_id = r.owner_id
                 LEFT JOIN users u ON u.id = r.owner_id
                 WHERE r.is_public = 1{}
                 ORDER BY r.created_at DESC, r.rowid DESC",
                if viewer_id.is_some() { " OR r.owner_id = ?1" } else { "" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let map = |row: &rusqlite::Row<'_>| read_ranking_row(row);
            let rows = match viewer_id {
                Some(viewer) => stmt.query_map([viewer], map)?.collect::<std::result::Result<Vec<_>, _>>()?,
                None => stmt.query_map([], map)?.collect::<std::result::Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })
    }

    /// Fetch a single ranking, applying the same visibility rule as the list.
    pub fn get_ranking(&self, id: &str, viewer_id: Option<&str>) -> Result<Option<RankingRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RANKING_COLUMNS}
                 FROM rankings r
                 LEFT JOIN profiles p ON p.user_id = r.owner_id
                 LEFT JOIN users u ON u.id = r.owner_id
                 WHERE r.id = ?1 AND (r.is_public = 1{})",
                if viewer_id.is_some() { " OR r.owner_id = ?2" } else { "" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let map = |row: &rusqlite::Row<'_>| read_ranking_row(row);
            let row = match viewer_id {
                Some(viewer) => stmt.query_row(rusqlite::params![id, viewer], map),
                None => stmt.query_row([id], map),
            }
            .optional()?;
            Ok(row)
        })
    }

    /// Only title and description are mutable, and only by the owner.
    pub fn update_ranking(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE rankings SET title = ?1, description = ?2
                 WHERE id = ?3 AND owner_id = ?4",
                rusqlite::params![title, description, id, owner_id],
            )?;
            Ok(n == 1)
        })
    }

    pub fn ranking_owned_by(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM rankings WHERE id = ?1 AND owner_id = ?2",
                rusqlite::params![id, owner_id],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    // -- Ranking items --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_item(
        &self,
        id: &str,
        ranking_id: &str,
        rank: i64,
        title: &str,
        comment: Option<&str>,
        image_url: Option<&str>,
        url: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ranking_items (id, ranking_id, rank, title, comment, image_url, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, ranking_id, rank, title, comment, image_url, url],
            )?;
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_item(
        &self,
        id: &str,
        ranking_id: &str,
        rank: i64,
        title: &str,
        comment: Option<&str>,
        url: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE ranking_items SET rank = ?1, title = ?2, comment = ?3, url = ?4
                 WHERE id = ?5 AND ranking_id = ?6",
                rusqlite::params![rank, title, comment, url, id, ranking_id],
            )?;
            Ok(n == 1)
        })
    }

    pub fn set_item_image(&self, id: &str, ranking_id: &str, image_url: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE ranking_items SET image_url = ?1 WHERE id = ?2 AND ranking_id = ?3",
                rusqlite::params![image_url, id, ranking_id],
            )?;
            Ok(n == 1)
        })
    }

    /// One step of the reorder protocol. Scoped by both item id and ranking
    /// id so a swap can never touch an item in another ranking.
    pub fn set_item_rank(&self, id: &str, ranking_id: &str, rank: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE ranking_items SET rank = ?1 WHERE id = ?2 AND ranking_id = ?3",
                rusqlite::params![rank, id, ranking_id],
            )?;
            Ok(n == 1)
        })
    }

    pub fn list_items(&self, ranking_id: &str, descending: bool) -> Result<Vec<ItemRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, ranking_id, rank, title, comment, image_url, url
                 FROM ranking_items WHERE ranking_id = ?1
                 ORDER BY rank {}",
                if descending { "DESC" } else { "ASC" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([ranking_id], read_item_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_item(&self, id: &str, ranking_id: &str) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, ranking_id, rank, title, comment, image_url, url
                     FROM ranking_items WHERE id = ?1 AND ranking_id = ?2",
                    rusqlite::params![id, ranking_id],
                    read_item_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn count_items(&self, ranking_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM ranking_items WHERE ranking_id = ?1",
                [ranking_id],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }

    /// Highest rank in use, 0 when the ranking has no items.
    pub fn max_rank(&self, ranking_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let max: Option<i64> = conn.query_row(
                "SELECT MAX(rank) FROM ranking_items WHERE ranking_id = ?1",
                [ranking_id],
                |row| row.get(0),
            )?;
            Ok(max.unwrap_or(0))
        })
    }

    /// Duplicate-rank pre-check. `exclude_id` lets item edits keep their own
    /// rank without tripping the check.
    pub fn rank_taken(&self, ranking_id: &str, rank: i64, exclude_id: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = match exclude_id {
                Some(exclude) => conn.query_row(
                    "SELECT COUNT(*) FROM ranking_items
                     WHERE ranking_id = ?1 AND rank = ?2 AND id != ?3",
                    rusqlite::params![ranking_id, rank, exclude],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM ranking_items WHERE ranking_id = ?1 AND rank = ?2",
                    rusqlite::params![ranking_id, rank],
                    |row| row.get(0),
                )?,
            };
            Ok(n > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, email, password, created_at FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn read_ranking_row(row: &rusqlite::Row<'_>) -> std::result::Result<RankingRow, rusqlite::Error> {
    Ok(RankingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        is_public: row.get(3)?,
        owner_id: row.get(4)?,
        author_name: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn read_item_row(row: &rusqlite::Row<'_>) -> std::result::Result<ItemRow, rusqlite::Error> {
    Ok(ItemRow {
        id: row.get(0)?,
        ranking_id: row.get(1)?,
        rank: row.get(2)?,
        title: row.get(3)?,
        comment: row.get(4)?,
        image_url: row.get(5)?,
        url: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use uuid::Uuid;

    fn user(db: &Database, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, email, None).unwrap();
        id
    }

    fn ranking(db: &Database, owner: &str, title: &str, public: bool) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_ranking(&id, title, None, public, owner).unwrap();
        id
    }

    fn item(db: &Database, ranking_id: &str, rank: i64, title: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_item(&id, ranking_id, rank, title, None, None, None)
            .unwrap();
        id
    }

    #[test]
    fn anonymous_list_never_contains_private_rankings() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner@example.com");
        ranking(&db, &owner, "public", true);
        ranking(&db, &owner, "secret", false);

        let rows = db.list_rankings(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.iter().all(|r| r.is_public));
    }

    #[test]
    fn authenticated_list_is_union_of_public_and_owned() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        ranking(&db, &alice, "alice public", true);
        ranking(&db, &alice, "alice private", false);
        ranking(&db, &bob, "bob private", false);

        let rows = db.list_rankings(Some(&alice)).unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(rows.len(), 2);
        assert!(titles.contains(&"alice public"));
        assert!(titles.contains(&"alice private"));

        // Bob sees alice's public ranking plus his own private one.
        let rows = db.list_rankings(Some(&bob)).unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(rows.len(), 2);
        assert!(titles.contains(&"alice public"));
        assert!(titles.contains(&"bob private"));
    }

    #[test]
    fn private_ranking_hidden_from_other_viewers() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let id = ranking(&db, &alice, "private", false);

        assert!(db.get_ranking(&id, None).unwrap().is_none());
        assert!(db.get_ranking(&id, Some(&bob)).unwrap().is_none());
        assert!(db.get_ranking(&id, Some(&alice)).unwrap().is_some());
    }

    #[test]
    fn author_name_falls_back_to_email() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner@example.com");
        let id = ranking(&db, &owner, "r", true);

        let row = db.get_ranking(&id, None).unwrap().unwrap();
        assert_eq!(row.author_name.as_deref(), Some("owner@example.com"));

        db.upsert_profile(&owner, "Owner").unwrap();
        let row = db.get_ranking(&id, None).unwrap().unwrap();
        assert_eq!(row.author_name.as_deref(), Some("Owner"));
    }

    #[test]
    fn update_ranking_requires_ownership() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");
        let id = ranking(&db, &alice, "before", true);

        assert!(!db.update_ranking(&id, &bob, "after", None).unwrap());
        assert!(db.update_ranking(&id, &alice, "after", Some("desc")).unwrap());

        let row = db.get_ranking(&id, None).unwrap().unwrap();
        assert_eq!(row.title, "after");
        assert_eq!(row.description.as_deref(), Some("desc"));
    }

    #[test]
    fn item_ordering_and_max_rank() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "o@example.com");
        let rid = ranking(&db, &owner, "r", true);
        item(&db, &rid, 2, "B");
        item(&db, &rid, 1, "A");
        item(&db, &rid, 3, "C");

        let asc = db.list_items(&rid, false).unwrap();
        let titles: Vec<_> = asc.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);

        let desc = db.list_items(&rid, true).unwrap();
        let titles: Vec<_> = desc.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B", "A"]);

        assert_eq!(db.max_rank(&rid).unwrap(), 3);
        assert_eq!(db.max_rank("missing").unwrap(), 0);
    }

    #[test]
    fn rank_taken_respects_exclusion() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "o@example.com");
        let rid = ranking(&db, &owner, "r", true);
        let a = item(&db, &rid, 1, "A");

        assert!(db.rank_taken(&rid, 1, None).unwrap());
        assert!(!db.rank_taken(&rid, 2, None).unwrap());
        // An item keeps its own rank during edit without tripping the check.
        assert!(!db.rank_taken(&rid, 1, Some(&a)).unwrap());
    }

    #[test]
    fn set_item_rank_is_scoped_to_the_ranking() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "o@example.com");
        let rid = ranking(&db, &owner, "r", true);
        let other = ranking(&db, &owner, "other", true);
        let a = item(&db, &rid, 1, "A");

        assert!(!db.set_item_rank(&a, &other, 5).unwrap());
        assert!(db.set_item_rank(&a, &rid, 5).unwrap());
        assert_eq!(db.get_item(&a, &rid).unwrap().unwrap().rank, 5);
    }

    #[test]
    fn profile_upsert_overwrites() {
        let db = Database::open_in_memory().unwrap();
        let uid = user(&db, "u@example.com");

        assert!(db.get_profile(&uid).unwrap().is_none());
        db.upsert_profile(&uid, "First").unwrap();
        db.upsert_profile(&uid, "Second").unwrap();
        let profile = db.get_profile(&uid).unwrap().unwrap();
        assert_eq!(profile.display_name, "Second");
    }

    #[test]
    fn login_token_is_single_use_and_expires() {
        let db = Database::open_in_memory().unwrap();
        let uid = user(&db, "u@example.com");

        let token = Uuid::new_v4().to_string();
        db.create_login_token(&token, &uid, 1_000).unwrap();
        assert_eq!(db.redeem_login_token(&token, 999).unwrap(), Some(uid.clone()));
        // Second redemption fails: the row is gone.
        assert_eq!(db.redeem_login_token(&token, 999).unwrap(), None);

        let expired = Uuid::new_v4().to_string();
        db.create_login_token(&expired, &uid, 1_000).unwrap();
        assert_eq!(db.redeem_login_token(&expired, 1_001).unwrap(), None);
    }

    #[test]
    fn sessions_support_local_and_global_signout() {
        let db = Database::open_in_memory().unwrap();
        let uid = user(&db, "u@example.com");
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        db.create_session(&a, &uid).unwrap();
        db.create_session(&b, &uid).unwrap();

        assert!(db.delete_session(&a).unwrap());
        // Revoking an absent session reports "already gone", not an error.
        assert!(!db.delete_session(&a).unwrap());
        assert!(db.session_exists(&b).unwrap());

        assert_eq!(db.delete_user_sessions(&uid).unwrap(), 1);
        assert!(!db.session_exists(&b).unwrap());
    }

    #[test]
    fn database_opens_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("podium.db")).unwrap();
        let uid = user(&db, "disk@example.com");
        assert!(db.get_user_by_id(&uid).unwrap().is_some());
    }
}
