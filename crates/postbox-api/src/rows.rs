//! Row-to-payload conversions. Projection to (id, username) for embedded
//! users happens here and nowhere else, so full rows never leak through a
//! response body.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use postbox_db::models::{ActivityRow, BlockRow, MessageRow, UserRow};
use postbox_types::api::{ActivityRecord, BlockResponse, MessageResponse, UserProfile, UserRef, UserSummary};

pub(crate) fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: parse_uuid(&row.id),
        username: row.username,
        email: row.email,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn user_summary(row: UserRow) -> UserSummary {
    UserSummary {
        id: parse_uuid(&row.id),
        username: row.username,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn message(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        sender: UserRef {
            id: parse_uuid(&row.sender_id),
            username: row.sender_username,
        },
        receiver: UserRef {
            id: parse_uuid(&row.receiver_id),
            username: row.receiver_username,
        },
        content: row.content,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn block(row: BlockRow) -> BlockResponse {
    BlockResponse {
        id: row.id,
        blocker_id: parse_uuid(&row.blocker_id),
        blocked_id: parse_uuid(&row.blocked_id),
        blocked: UserRef {
            id: parse_uuid(&row.blocked_id),
            username: row.blocked_username,
        },
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn activity(row: ActivityRow) -> ActivityRecord {
    ActivityRecord {
        id: row.id,
        user_id: parse_uuid(&row.user_id),
        action: row.action,
        timestamp: parse_timestamp(&row.timestamp),
    }
}

pub(crate) fn parse_uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_datetime_format() {
        let ts = parse_timestamp("2026-08-08 12:34:56");
        assert_eq!(ts.to_rfc3339(), "2026-08-08T12:34:56+00:00");
    }

    #[test]
    fn parses_rfc3339() {
        let ts = parse_timestamp("2026-08-08T12:34:56Z");
        assert_eq!(ts.to_rfc3339(), "2026-08-08T12:34:56+00:00");
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("not a date"), DateTime::<Utc>::default());
    }

    #[test]
    fn corrupt_uuid_falls_back_to_nil() {
        assert_eq!(parse_uuid("not-a-uuid"), Uuid::default());
    }
}
