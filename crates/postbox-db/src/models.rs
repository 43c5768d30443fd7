/// Database row types — these map directly to SQLite rows.
/// Distinct from the postbox-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// Participant usernames are joined in at query time so callers never do a
/// second lookup per message.
pub struct MessageRow {
    pub id: i64,
    pub sender_id: String,
    pub sender_username: String,
    pub receiver_id: String,
    pub receiver_username: String,
    pub content: String,
    pub created_at: String,
}

pub struct BlockRow {
    pub id: i64,
    pub blocker_id: String,
    pub blocked_id: String,
    pub blocked_username: String,
    pub created_at: String,
}

pub struct ActivityRow {
    pub id: i64,
    pub user_id: String,
    pub action: String,
    pub timestamp: String,
}
