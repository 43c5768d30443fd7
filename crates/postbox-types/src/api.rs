use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Response envelope --

/// Every successful response body: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Every failure body: `{"success": false, "message": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFailure {
    pub success: bool,
    pub message: String,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// -- JWT Claims --

/// JWT claims shared between token issuance (auth handlers) and verification
/// (request middleware). Canonical definition lives here in postbox-types to
/// eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}

// -- Users --

/// Full profile, only ever returned for lookups scoped to authenticated
/// callers. The password hash never leaves the db layer.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Attribute projection used wherever another user appears inside a payload
/// (message participants, block targets, conversation counterparties).
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver_username: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender: UserRef,
    pub receiver: UserRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One inbox group: a counterparty and the caller's recent messages with them.
#[derive(Debug, Serialize)]
pub struct Conversation {
    pub user: UserRef,
    pub messages: Vec<MessageResponse>,
}

// -- Blocks --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockRequest {
    pub blocked_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub id: i64,
    pub blocker_id: Uuid,
    pub blocked_id: Uuid,
    pub blocked: UserRef,
    pub created_at: DateTime<Utc>,
}

// -- Activity --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateActivityRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActivityPage {
    pub logs: Vec<ActivityRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// `limit` must be non-zero; handlers clamp it before building a page.
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_up_partial_pages() {
        let p = Pagination::new(1, 20, 41);
        assert_eq!(p.total_pages, 3);
    }

    #[test]
    fn pagination_exact_multiple() {
        let p = Pagination::new(2, 20, 40);
        assert_eq!(p.total_pages, 2);
    }

    #[test]
    fn pagination_empty_set_has_zero_pages() {
        let p = Pagination::new(1, 20, 0);
        assert_eq!(p.total_pages, 0);
    }
}
