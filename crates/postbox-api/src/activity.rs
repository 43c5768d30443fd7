use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use postbox_types::api::{ActivityPage, ApiSuccess, CreateActivityRequest, Pagination};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::rows;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Audit-sink write for the other components. Fire-and-forget: a failed
/// write is logged and dropped, never surfaced to the originating request.
pub fn record(state: &AppState, user_id: Uuid, action: &str) {
    let db = state.clone();
    let user_id = user_id.to_string();
    let action = action.to_string();

    tokio::task::spawn_blocking(move || {
        if let Err(err) = db.db.insert_activity(&user_id, &action) {
            warn!("Dropped activity record '{}' for {}: {}", action, user_id, err);
        }
    });
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn get_activity_logs(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(limit);

    let db = state.clone();
    let user_id = current.id.to_string();
    let (logs, total_items) = tokio::task::spawn_blocking(move || {
        let logs = db.db.list_activity(&user_id, limit, offset)?;
        let total = db.db.count_activity(&user_id)?;
        Ok::<_, anyhow::Error>((logs, total))
    })
    .await??;

    Ok(Json(ApiSuccess::new(ActivityPage {
        logs: logs.into_iter().map(rows::activity).collect(),
        pagination: Pagination::new(page, limit, total_items),
    })))
}

/// The one place an activity write is the primary operation: its failure
/// propagates instead of being swallowed.
pub async fn create_activity_log(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.action.trim().is_empty() {
        return Err(ApiError::Validation("Action is required".to_string()));
    }

    let db = state.clone();
    let user_id = current.id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.insert_activity(&user_id, &req.action))
        .await??;

    Ok((StatusCode::CREATED, Json(ApiSuccess::new(rows::activity(row)))))
}
