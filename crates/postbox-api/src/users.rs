use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use postbox_types::api::{ApiSuccess, UpdateProfileRequest};

use crate::auth::{self, AppState};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::rows;

const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub username: Option<String>,
}

pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    fetch_profile(&state, current.id).await
}

pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    fetch_profile(&state, user_id).await
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(email) = &req.email
        && !email.contains('@')
    {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if let Some(password) = &req.password
        && password.len() < 8
    {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    // Same explicit hashing step as registration, before anything is stored
    let password_hash = req.password.as_deref().map(auth::hash_password).transpose()?;

    let db = state.clone();
    let user_id = current.id.to_string();
    tokio::task::spawn_blocking(move || {
        db.db
            .update_user(&user_id, req.email.as_deref(), password_hash.as_deref())
    })
    .await??;

    fetch_profile(&state, current.id).await
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let term = query
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Validation("Username query parameter is required".to_string()))?;

    let db = state.clone();
    let hits = tokio::task::spawn_blocking(move || db.db.search_users(&term, SEARCH_LIMIT)).await??;

    let users: Vec<_> = hits.into_iter().map(rows::user_summary).collect();
    Ok(Json(ApiSuccess::new(users)))
}

async fn fetch_profile(state: &AppState, user_id: Uuid) -> Result<impl IntoResponse + use<>, ApiError> {
    let db = state.clone();
    let id = user_id.to_string();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_id(&id))
        .await??
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiSuccess::new(rows::user_profile(user))))
}
