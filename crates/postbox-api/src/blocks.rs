use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use postbox_types::api::{ApiSuccess, BlockRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::rows;

pub async fn block_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.blocked_id == current.id {
        return Err(ApiError::Validation("You cannot block yourself".to_string()));
    }

    let db = state.clone();
    let blocker_id = current.id.to_string();
    let blocked_id = req.blocked_id.to_string();
    let row = tokio::task::spawn_blocking(move || {
        if db.db.get_user_by_id(&blocked_id)?.is_none() {
            return Err(ApiError::NotFound("User to block not found".to_string()));
        }

        if db.db.is_blocked(&blocker_id, &blocked_id)? {
            return Err(ApiError::Conflict("User is already blocked".to_string()));
        }

        // The (blocker_id, blocked_id) UNIQUE constraint backstops the race
        // between the check above and this insert.
        Ok(db.db.insert_block(&blocker_id, &blocked_id)?)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(ApiSuccess::new(rows::block(row)))))
}

/// Path id is the blocked user's id, mirroring the block request.
pub async fn unblock_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(blocked_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let blocker_id = current.id.to_string();
    let removed = tokio::task::spawn_blocking(move || {
        db.db.delete_block(&blocker_id, &blocked_id.to_string())
    })
    .await??;

    if !removed {
        return Err(ApiError::NotFound("Block not found".to_string()));
    }

    Ok(Json(ApiSuccess::new(serde_json::json!({}))))
}

pub async fn get_blocked_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let blocker_id = current.id.to_string();
    let blocks = tokio::task::spawn_blocking(move || db.db.list_blocks(&blocker_id)).await??;

    let blocks: Vec<_> = blocks.into_iter().map(rows::block).collect();
    Ok(Json(ApiSuccess::new(blocks)))
}
