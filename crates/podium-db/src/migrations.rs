use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sessions (
            jti         TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id);

        CREATE TABLE IF NOT EXISTS login_tokens (
            token       TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            expires_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id      TEXT PRIMARY KEY REFERENCES users(id),
            display_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rankings (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT,
            is_public   INTEGER NOT NULL DEFAULT 0,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_rankings_owner
            ON rankings(owner_id, created_at);

        -- No UNIQUE(ranking_id, rank): rank uniqueness is checked before
        -- insert by the application, and the reorder protocol parks an item
        -- at a sentinel rank mid-swap.
        CREATE TABLE IF NOT EXISTS ranking_items (
            id          TEXT PRIMARY KEY,
            ranking_id  TEXT NOT NULL REFERENCES rankings(id),
            rank        INTEGER NOT NULL,
            title       TEXT NOT NULL,
            comment     TEXT,
            image_url   TEXT,
            url         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_items_ranking
            ON ranking_items(ranking_id, rank);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
