use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;
use uuid::Uuid;

use postbox_db::Database;
use postbox_types::api::{ApiSuccess, AuthResponse, LoginRequest, RegisterRequest};

use crate::activity;
use crate::error::ApiError;
use crate::token::{issue_token, registration_ttl, session_ttl};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Explicit pre-persistence transformation: callers hash before any insert or
/// update touches the store. Argon2id with a fresh per-credential salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Opaque credential check; the stored PHC string is never inspected beyond
/// this boundary.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 50 {
        return Err(ApiError::Validation(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let db = state.clone();
    let (username, email) = (req.username.clone(), req.email.clone());
    let uid = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        // Pre-checks give named conflicts; the UNIQUE constraints remain the
        // backstop for concurrent registration of the same handle.
        if db.db.get_user_by_username(&username)?.is_some() {
            return Err(ApiError::Conflict("Username already exists".to_string()));
        }
        if db.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }
        db.db.create_user(&uid, &username, &email, &password_hash)?;
        Ok(())
    })
    .await??;

    activity::record(&state, user_id, "User registered");

    let token = issue_token(&state.jwt_secret, user_id, &req.username, registration_ttl())?;

    Ok((
        StatusCode::CREATED,
        Json(ApiSuccess::new(AuthResponse {
            id: user_id,
            username: req.username,
            email: req.email,
            token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_username(&username))
        .await??
        .ok_or_else(|| {
            warn!("Invalid login attempt for username: {}", req.username);
            ApiError::InvalidCredentials
        })?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e)))?;

    if !verify_password(&req.password, &user.password) {
        warn!("Invalid login attempt for user: {}", user.id);
        activity::record(&state, user_id, "Invalid login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    activity::record(&state, user_id, "User logged in");

    let token = issue_token(&state.jwt_secret, user_id, &user.username, session_ttl())?;

    Ok(Json(ApiSuccess::new(AuthResponse {
        id: user_id,
        username: user.username,
        email: user.email,
        token,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert_ne!(hash, "correct horse battery staple");

        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("correct horse battery stapl", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn rehashing_the_same_password_salts_differently() {
        let first = hash_password("hunter2hunter2").unwrap();
        let second = hash_password("hunter2hunter2").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("hunter2hunter2", &first));
        assert!(verify_password("hunter2hunter2", &second));
    }

    #[test]
    fn garbage_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
