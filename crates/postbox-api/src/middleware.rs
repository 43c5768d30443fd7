use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::token::verify_token;

/// The authenticated caller, resolved once per request and threaded to
/// handlers as an extension. Always carries current store state: the token is
/// a capability over an id, not a cache of attributes.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

/// Extract and validate the bearer token, then re-fetch the identity it
/// asserts. Every failure path yields the same unauthenticated response.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let claims = verify_token(&state.jwt_secret, token).ok_or(ApiError::Unauthenticated)?;

    let db = state.clone();
    let user_id = claims.sub.to_string();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_id(&user_id))
        .await??
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        username: user.username,
    });
    Ok(next.run(req).await)
}
