use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use podium_db::models::ItemRow;
use podium_types::api::{ItemListResponse, MoveDirection, MoveItemRequest};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::items::{item_list, require_owner};
use crate::{AppState, blocking};

/// Parking rank used mid-swap. Real ranks are ≥ 1, so the sentinel can never
/// collide with one.
pub const SENTINEL_RANK: i64 = -1;

/// Move an item one position up or down by exchanging ranks with its
/// neighbor. Up on the first item and down on the last are no-ops, as is a
/// move for an item whose previous reorder is still in flight.
pub async fn move_item(
    State(state): State<AppState>,
    Path((ranking_id, item_id)): Path<(Uuid, Uuid)>,
    AuthUser(claims): AuthUser,
    Json(req): Json<MoveItemRequest>,
) -> Result<Json<ItemListResponse>, ApiError> {
    require_owner(&state, ranking_id, &claims).await?;

    let _guard = ReorderGuard::acquire(&state, item_id)?;
    perform_move(&state, ranking_id, item_id, req.direction).await
}

/// Holds the single-flight slot for an item while its move is in flight.
/// Releases on drop, so a request cancelled at an await point inside the
/// move still frees the item.
struct ReorderGuard {
    state: AppState,
    item_id: Uuid,
}

impl ReorderGuard {
    fn acquire(state: &AppState, item_id: Uuid) -> Result<Self, ApiError> {
        let mut locks = state
            .reorder_locks
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("reorder lock poisoned")))?;
        if !locks.insert(item_id) {
            return Err(ApiError::Conflict(
                "a reorder for this item is already in progress".into(),
            ));
        }
        Ok(Self {
            state: state.clone(),
            item_id,
        })
    }
}

impl Drop for ReorderGuard {
    fn drop(&mut self) {
        let mut locks = match self.state.reorder_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.remove(&self.item_id);
    }
}

async fn perform_move(
    state: &AppState,
    ranking_id: Uuid,
    item_id: Uuid,
    direction: MoveDirection,
) -> Result<Json<ItemListResponse>, ApiError> {
    let items = {
        let db = state.db.clone();
        let rid = ranking_id.to_string();
        blocking(move || db.list_items(&rid, false)).await?
    };

    let item_key = item_id.to_string();
    let index = items
        .iter()
        .position(|i| i.id == item_key)
        .ok_or(ApiError::NotFound)?;

    let neighbor = match direction {
        MoveDirection::Up => index.checked_sub(1),
        MoveDirection::Down => {
            if index + 1 < items.len() {
                Some(index + 1)
            } else {
                None
            }
        }
    };

    let Some(neighbor) = neighbor else {
        // Already at the boundary.
        return item_list(state, ranking_id).await;
    };

    swap_ranks(state, ranking_id, &items[index], &items[neighbor]).await?;
    info!(
        "Swapped ranks {} <-> {} in ranking {}",
        items[index].rank, items[neighbor].rank, ranking_id
    );

    item_list(state, ranking_id).await
}

/// Exchange the ranks of two items via three sequential conditional writes.
/// The naive two-step swap would momentarily duplicate a rank, so the source
/// is parked at the sentinel first. A failed step aborts immediately with no
/// compensating rollback; the source can be left at the sentinel rank.
async fn swap_ranks(
    state: &AppState,
    ranking_id: Uuid,
    source: &ItemRow,
    target: &ItemRow,
) -> Result<(), ApiError> {
    swap_step(state, ranking_id, &source.id, SENTINEL_RANK, "park source").await?;
    swap_step(state, ranking_id, &target.id, source.rank, "update target").await?;
    swap_step(state, ranking_id, &source.id, target.rank, "update source").await?;
    Ok(())
}

async fn swap_step(
    state: &AppState,
    ranking_id: Uuid,
    item_id: &str,
    rank: i64,
    what: &str,
) -> Result<(), ApiError> {
    let db = state.db.clone();
    let iid = item_id.to_string();
    let rid = ranking_id.to_string();
    let updated = blocking(move || db.set_item_rank(&iid, &rid, rank)).await?;
    if !updated {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "rank swap aborted: failed to {what} (item {item_id})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use crate::media::MediaStore;
    use podium_db::Database;
    use podium_types::api::Claims;
    use std::sync::Arc;

    struct Fixture {
        state: AppState,
        ranking_id: Uuid,
        claims: Claims,
        // Keeps the media directory alive for the lifetime of the test.
        _media_dir: tempfile::TempDir,
    }

    async fn fixture(titles: &[&str]) -> (Fixture, Vec<Uuid>) {
        let media_dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(media_dir.path().to_path_buf(), "http://localhost:3000")
            .await
            .unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());

        let owner = Uuid::new_v4();
        db.create_user(&owner.to_string(), "owner@example.com", None)
            .unwrap();
        let ranking_id = Uuid::new_v4();
        db.create_ranking(&ranking_id.to_string(), "r", None, true, &owner.to_string())
            .unwrap();

        let mut ids = Vec::new();
        for (i, title) in titles.iter().enumerate() {
            let id = Uuid::new_v4();
            db.insert_item(
                &id.to_string(),
                &ranking_id.to_string(),
                (i + 1) as i64,
                title,
                None,
                None,
                None,
            )
            .unwrap();
            ids.push(id);
        }

        let state = Arc::new(AppStateInner::new(db, media, "secret".into()));
        let claims = Claims {
            sub: owner,
            email: "owner@example.com".into(),
            jti: Uuid::new_v4(),
            exp: 0,
        };
        (
            Fixture {
                state,
                ranking_id,
                claims,
                _media_dir: media_dir,
            },
            ids,
        )
    }

    fn titles_by_rank(fx: &Fixture) -> Vec<(i64, String)> {
        fx.state
            .db
            .list_items(&fx.ranking_id.to_string(), false)
            .unwrap()
            .into_iter()
            .map(|i| (i.rank, i.title))
            .collect()
    }

    #[tokio::test]
    async fn move_up_swaps_with_predecessor() {
        let (fx, ids) = fixture(&["A", "B", "C"]).await;

        perform_move(&fx.state, fx.ranking_id, ids[1], MoveDirection::Up)
            .await
            .unwrap();

        assert_eq!(
            titles_by_rank(&fx),
            vec![
                (1, "B".to_string()),
                (2, "A".to_string()),
                (3, "C".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn third_item_is_untouched_by_a_swap() {
        let (fx, ids) = fixture(&["A", "B", "C"]).await;
        let before_c = fx
            .state
            .db
            .get_item(&ids[2].to_string(), &fx.ranking_id.to_string())
            .unwrap()
            .unwrap();

        perform_move(&fx.state, fx.ranking_id, ids[0], MoveDirection::Down)
            .await
            .unwrap();

        let after_c = fx
            .state
            .db
            .get_item(&ids[2].to_string(), &fx.ranking_id.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(before_c.rank, after_c.rank);
    }

    #[tokio::test]
    async fn swap_twice_restores_the_original_order() {
        let (fx, ids) = fixture(&["A", "B", "C"]).await;
        let original = titles_by_rank(&fx);

        perform_move(&fx.state, fx.ranking_id, ids[1], MoveDirection::Up)
            .await
            .unwrap();
        perform_move(&fx.state, fx.ranking_id, ids[1], MoveDirection::Down)
            .await
            .unwrap();

        assert_eq!(titles_by_rank(&fx), original);
    }

    #[tokio::test]
    async fn boundary_moves_are_noops() {
        let (fx, ids) = fixture(&["A", "B"]).await;

        perform_move(&fx.state, fx.ranking_id, ids[0], MoveDirection::Up)
            .await
            .unwrap();
        perform_move(&fx.state, fx.ranking_id, ids[1], MoveDirection::Down)
            .await
            .unwrap();

        assert_eq!(
            titles_by_rank(&fx),
            vec![(1, "A".to_string()), (2, "B".to_string())]
        );
    }

    #[tokio::test]
    async fn concurrent_move_on_same_item_is_rejected() {
        let (fx, ids) = fixture(&["A", "B"]).await;

        fx.state
            .reorder_locks
            .lock()
            .unwrap()
            .insert(ids[1]);

        let result = move_item(
            State(fx.state.clone()),
            Path((fx.ranking_id, ids[1])),
            AuthUser(fx.claims.clone()),
            Json(MoveItemRequest {
                direction: MoveDirection::Up,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Conflict(_))));
        // Order is unchanged.
        assert_eq!(
            titles_by_rank(&fx),
            vec![(1, "A".to_string()), (2, "B".to_string())]
        );
    }

    #[tokio::test]
    async fn dropping_an_in_flight_move_releases_the_lock() {
        let (fx, ids) = fixture(&["A", "B"]).await;

        let guard = ReorderGuard::acquire(&fx.state, ids[0]).unwrap();
        let in_flight = async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        };
        // While the future holds the guard, a second move conflicts.
        assert!(matches!(
            ReorderGuard::acquire(&fx.state, ids[0]),
            Err(ApiError::Conflict(_))
        ));

        // A client disconnect drops the request future mid-flight; the
        // guard's Drop must still free the item.
        drop(in_flight);
        assert!(ReorderGuard::acquire(&fx.state, ids[0]).is_ok());
    }

    #[tokio::test]
    async fn poisoned_lock_is_an_error_not_a_panic() {
        let (fx, ids) = fixture(&["A"]).await;

        let state = fx.state.clone();
        let _ = std::thread::spawn(move || {
            let _locks = state.reorder_locks.lock().unwrap();
            panic!("poison the reorder lock");
        })
        .join();

        let result = ReorderGuard::acquire(&fx.state, ids[0]);
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn move_for_unknown_item_is_not_found() {
        let (fx, _ids) = fixture(&["A"]).await;
        let result =
            perform_move(&fx.state, fx.ranking_id, Uuid::new_v4(), MoveDirection::Up).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }
}
