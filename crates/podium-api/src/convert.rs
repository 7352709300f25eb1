use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use podium_db::models::{ItemRow, ProfileRow, RankingRow};
use podium_types::models::{Profile, Ranking, RankingItem};

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC when the RFC 3339 parse fails.
pub(crate) fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

pub(crate) fn parse_id(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

pub(crate) fn ranking_from_row(row: RankingRow) -> Ranking {
    Ranking {
        id: parse_id(&row.id, "ranking"),
        title: row.title,
        description: row.description,
        is_public: row.is_public,
        owner_id: parse_id(&row.owner_id, "ranking owner"),
        author_name: row.author_name,
        created_at: parse_timestamp(&row.created_at, "ranking"),
    }
}

pub(crate) fn item_from_row(row: ItemRow) -> RankingItem {
    RankingItem {
        id: parse_id(&row.id, "ranking item"),
        ranking_id: parse_id(&row.ranking_id, "ranking item"),
        rank: row.rank,
        title: row.title,
        comment: row.comment,
        image_url: row.image_url,
        url: row.url,
    }
}

pub(crate) fn profile_from_row(row: ProfileRow) -> Profile {
    Profile {
        user_id: parse_id(&row.user_id, "profile"),
        display_name: row.display_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_default_timestamps() {
        let ts = parse_timestamp("2026-08-28 12:34:56", "test");
        assert_eq!(ts.to_rfc3339(), "2026-08-28T12:34:56+00:00");
    }

    #[test]
    fn corrupt_values_fall_back_instead_of_panicking() {
        assert_eq!(parse_id("not-a-uuid", "test"), Uuid::default());
        assert_eq!(parse_timestamp("garbage", "test"), DateTime::<Utc>::default());
    }
}
