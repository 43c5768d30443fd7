use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use postbox_db::models::MessageRow;
use postbox_types::api::{ApiSuccess, Conversation, SendMessageRequest, UserRef};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::rows;

/// Inbox fetch window: conversations are assembled from this many of the
/// caller's most recent messages.
const INBOX_WINDOW: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub username: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation(
            "Message content must not be empty".to_string(),
        ));
    }

    // Resolve, gate, persist in one blocking hop off the async runtime
    let db = state.clone();
    let sender_id = current.id.to_string();
    let row = tokio::task::spawn_blocking(move || {
        let receiver = db
            .db
            .get_user_by_username(&req.receiver_username)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "User with username \"{}\" not found",
                    req.receiver_username
                ))
            })?;

        // Delivery gate: has the receiver blocked the sender?
        if db.db.is_blocked(&receiver.id, &sender_id)? {
            return Err(ApiError::Forbidden);
        }

        Ok(db.db.insert_message(&sender_id, &receiver.id, &req.content)?)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(ApiSuccess::new(rows::message(row)))))
}

/// Two-party thread, oldest first: a conversation reads top-to-bottom
/// chronologically, unlike the inbox view.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ThreadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let username = query
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Validation("Username query parameter is required".to_string()))?;

    let db = state.clone();
    let current_id = current.id.to_string();
    let thread = tokio::task::spawn_blocking(move || {
        let other = db.db.get_user_by_username(&username)?.ok_or_else(|| {
            ApiError::NotFound(format!("User with username \"{}\" not found", username))
        })?;

        Ok::<_, ApiError>(db.db.get_thread(&current_id, &other.id)?)
    })
    .await??;

    let messages: Vec<_> = thread.into_iter().map(rows::message).collect();
    Ok(Json(ApiSuccess::new(messages)))
}

/// Inbox: recent messages in either direction, grouped per counterparty.
pub async fn get_user_messages(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = current.id.to_string();
    let recent = {
        let user_id = user_id.clone();
        tokio::task::spawn_blocking(move || db.db.get_recent_messages(&user_id, INBOX_WINDOW))
            .await??
    };

    let conversations = group_conversations(&user_id, recent);
    Ok(Json(ApiSuccess::new(conversations)))
}

/// Group a descending message window by counterparty. Each message lands in
/// exactly one group; groups come out in first-seen (most-recent-activity)
/// order and keep the window's descending order inside.
fn group_conversations(user_id: &str, window: Vec<MessageRow>) -> Vec<Conversation> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Conversation> = HashMap::new();

    for row in window {
        let (other_id, other_username) = if row.sender_id == user_id {
            (row.receiver_id.clone(), row.receiver_username.clone())
        } else {
            (row.sender_id.clone(), row.sender_username.clone())
        };

        let group = groups.entry(other_id.clone()).or_insert_with(|| {
            order.push(other_id.clone());
            Conversation {
                user: UserRef {
                    id: rows::parse_uuid(&other_id),
                    username: other_username,
                },
                messages: Vec::new(),
            }
        });
        group.messages.push(rows::message(row));
    }

    order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, sender: (&str, &str), receiver: (&str, &str)) -> MessageRow {
        MessageRow {
            id,
            sender_id: sender.0.to_string(),
            sender_username: sender.1.to_string(),
            receiver_id: receiver.0.to_string(),
            receiver_username: receiver.1.to_string(),
            content: format!("msg {id}"),
            created_at: "2026-08-08 12:00:00".to_string(),
        }
    }

    const ALICE: (&str, &str) = ("aaaaaaaa-0000-0000-0000-000000000001", "alice");
    const BOB: (&str, &str) = ("bbbbbbbb-0000-0000-0000-000000000002", "bob");
    const CAROL: (&str, &str) = ("cccccccc-0000-0000-0000-000000000003", "carol");

    #[test]
    fn groups_by_counterparty_in_first_seen_order() {
        // Descending window as the db returns it
        let window = vec![
            row(5, BOB, ALICE),
            row(4, ALICE, CAROL),
            row(3, CAROL, ALICE),
            row(2, ALICE, BOB),
        ];

        let groups = group_conversations(ALICE.0, window);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].user.username, "bob");
        assert_eq!(groups[1].user.username, "carol");

        let bob_ids: Vec<_> = groups[0].messages.iter().map(|m| m.id).collect();
        assert_eq!(bob_ids, [5, 2]);
        let carol_ids: Vec<_> = groups[1].messages.iter().map(|m| m.id).collect();
        assert_eq!(carol_ids, [4, 3]);
    }

    #[test]
    fn every_message_lands_in_exactly_one_group() {
        let window = vec![
            row(9, BOB, ALICE),
            row(8, ALICE, BOB),
            row(7, CAROL, ALICE),
            row(6, ALICE, CAROL),
            row(5, BOB, ALICE),
        ];

        let groups = group_conversations(ALICE.0, window);

        let mut seen: Vec<i64> = groups
            .iter()
            .flat_map(|g| g.messages.iter().map(|m| m.id))
            .collect();
        assert_eq!(seen.len(), 5);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn counterparty_is_the_other_side_in_both_directions() {
        let sent = group_conversations(ALICE.0, vec![row(1, ALICE, BOB)]);
        assert_eq!(sent[0].user.username, "bob");

        let received = group_conversations(ALICE.0, vec![row(2, BOB, ALICE)]);
        assert_eq!(received[0].user.username, "bob");
    }

    #[test]
    fn self_messages_group_under_the_caller() {
        let groups = group_conversations(ALICE.0, vec![row(1, ALICE, ALICE)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].user.username, "alice");
        assert_eq!(groups[0].messages.len(), 1);
    }

    #[test]
    fn empty_window_yields_no_groups() {
        assert!(group_conversations(ALICE.0, Vec::new()).is_empty());
    }
}
