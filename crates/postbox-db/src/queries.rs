use crate::Database;
use crate::models::{ActivityRow, BlockRow, MessageRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Partial update: absent fields keep their stored value.
    pub fn update_user(&self, id: &str, email: Option<&str>, password_hash: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users
                 SET email = COALESCE(?2, email), password = COALESCE(?3, password)
                 WHERE id = ?1",
                (id, email, password_hash),
            )?;
            Ok(())
        })
    }

    /// Substring match on username, lexically ordered so unpaginated search
    /// results are reproducible.
    pub fn search_users(&self, term: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = format!("%{}%", term);
            let mut stmt = conn.prepare(
                "SELECT id, username, email, password, created_at FROM users
                 WHERE username LIKE ?1
                 ORDER BY username ASC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map((pattern, limit), user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert and return the stored row, participant usernames attached.
    pub fn insert_message(&self, sender_id: &str, receiver_id: &str, content: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, receiver_id, content) VALUES (?1, ?2, ?3)",
                (sender_id, receiver_id, content),
            )?;
            let id = conn.last_insert_rowid();

            query_message_by_id(conn, id)?
                .ok_or_else(|| anyhow!("Inserted message {} not found", id))
        })
    }

    /// All messages between the two users, oldest first. Ordering key is
    /// (created_at, id): datetime('now') has one-second resolution, so the
    /// monotonic rowid breaks ties.
    pub fn get_thread(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
                    OR (m.sender_id = ?2 AND m.receiver_id = ?1)
                 ORDER BY m.created_at ASC, m.id ASC",
            ))?;

            let rows = stmt
                .query_map((user_a, user_b), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The user's most recent messages in either direction, newest first.
    pub fn get_recent_messages(&self, user_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE m.sender_id = ?1 OR m.receiver_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2",
            ))?;

            let rows = stmt
                .query_map((user_id, limit), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Blocks --

    /// True iff `blocker_id` has an active block against `blocked_id`.
    /// Directional: the reverse relation is a separate row.
    pub fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM blocked_users WHERE blocker_id = ?1 AND blocked_id = ?2
                 )",
                (blocker_id, blocked_id),
                |row| row.get(0),
            )?;
            Ok(exists == 1)
        })
    }

    pub fn insert_block(&self, blocker_id: &str, blocked_id: &str) -> Result<BlockRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO blocked_users (blocker_id, blocked_id) VALUES (?1, ?2)",
                (blocker_id, blocked_id),
            )?;
            let id = conn.last_insert_rowid();

            let mut stmt = conn.prepare(&format!("{BLOCK_SELECT} WHERE b.id = ?1"))?;
            stmt.query_row([id], block_from_row)
                .optional()?
                .ok_or_else(|| anyhow!("Inserted block {} not found", id))
        })
    }

    /// Returns false when no such relation existed.
    pub fn delete_block(&self, blocker_id: &str, blocked_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM blocked_users WHERE blocker_id = ?1 AND blocked_id = ?2",
                (blocker_id, blocked_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// The blocker's relations in creation order.
    pub fn list_blocks(&self, blocker_id: &str) -> Result<Vec<BlockRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{BLOCK_SELECT}
                 WHERE b.blocker_id = ?1
                 ORDER BY b.created_at ASC, b.id ASC",
            ))?;

            let rows = stmt
                .query_map([blocker_id], block_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Activity --

    pub fn insert_activity(&self, user_id: &str, action: &str) -> Result<ActivityRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO activity_log (user_id, action) VALUES (?1, ?2)",
                (user_id, action),
            )?;
            let id = conn.last_insert_rowid();

            conn.query_row(
                "SELECT id, user_id, action, timestamp FROM activity_log WHERE id = ?1",
                [id],
                activity_from_row,
            )
            .optional()?
            .ok_or_else(|| anyhow!("Inserted activity record {} not found", id))
        })
    }

    /// Newest first; same one-second-resolution tie-break as messages.
    pub fn list_activity(&self, user_id: &str, limit: u32, offset: u32) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, action, timestamp FROM activity_log
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map((user_id, limit, offset), activity_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_activity(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM activity_log WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

// JOIN users on both sides to fetch participant usernames in a single query
// (eliminates N+1).
const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, s.username, m.receiver_id, r.username, m.content, m.created_at
     FROM messages m
     LEFT JOIN users s ON m.sender_id = s.id
     LEFT JOIN users r ON m.receiver_id = r.id";

const BLOCK_SELECT: &str = "SELECT b.id, b.blocker_id, b.blocked_id, u.username, b.created_at
     FROM blocked_users b
     LEFT JOIN users u ON b.blocked_id = u.id";

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, email, password, created_at FROM users WHERE {} = ?1",
        column
    ))?;

    let row = stmt.query_row([value], user_from_row).optional()?;

    Ok(row)
}

fn query_message_by_id(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"))?;

    let row = stmt.query_row([id], message_from_row).optional()?;

    Ok(row)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_username: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
        receiver_id: row.get(3)?,
        receiver_username: row.get::<_, Option<String>>(4)?.unwrap_or_else(|| "unknown".to_string()),
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn block_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<BlockRow, rusqlite::Error> {
    Ok(BlockRow {
        id: row.get(0)?,
        blocker_id: row.get(1)?,
        blocked_id: row.get(2)?,
        blocked_username: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        created_at: row.get(4)?,
    })
}

fn activity_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ActivityRow, rusqlite::Error> {
    Ok(ActivityRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use tempfile::TempDir;

    fn open_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn seed_user(db: &Database, id: &str, username: &str) {
        db.create_user(id, username, &format!("{username}@example.com"), "hash")
            .unwrap();
    }

    #[test]
    fn user_roundtrip() {
        let (_dir, db) = open_db();
        seed_user(&db, "u1", "alice");

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, "u1");
        assert_eq!(by_name.email, "alice@example.com");

        let by_id = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected_by_constraint() {
        let (_dir, db) = open_db();
        seed_user(&db, "u1", "alice");

        let result = db.create_user("u2", "alice", "other@example.com", "hash");
        assert!(result.is_err());
    }

    #[test]
    fn update_user_keeps_absent_fields() {
        let (_dir, db) = open_db();
        seed_user(&db, "u1", "alice");

        db.update_user("u1", Some("new@example.com"), None).unwrap();

        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.password, "hash");
    }

    #[test]
    fn search_is_lexical_and_limited() {
        let (_dir, db) = open_db();
        seed_user(&db, "u1", "carol");
        seed_user(&db, "u2", "alice");
        seed_user(&db, "u3", "alicia");

        let hits = db.search_users("ali", 10).unwrap();
        let names: Vec<_> = hits.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["alice", "alicia"]);

        let capped = db.search_users("a", 1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn thread_is_ascending_and_scoped_to_the_pair() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");
        seed_user(&db, "b", "bob");
        seed_user(&db, "c", "carol");

        db.insert_message("a", "b", "one").unwrap();
        db.insert_message("b", "a", "two").unwrap();
        db.insert_message("a", "c", "unrelated").unwrap();
        db.insert_message("a", "b", "three").unwrap();

        let thread = db.get_thread("a", "b").unwrap();
        let contents: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);

        // ids break same-second timestamp ties, so order is strictly ascending
        assert!(thread.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(thread[0].sender_username, "alice");
        assert_eq!(thread[1].sender_username, "bob");
    }

    #[test]
    fn recent_messages_are_descending_and_capped() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");
        seed_user(&db, "b", "bob");

        db.insert_message("a", "b", "one").unwrap();
        db.insert_message("b", "a", "two").unwrap();
        db.insert_message("a", "b", "three").unwrap();

        let recent = db.get_recent_messages("a", 100).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["three", "two", "one"]);

        let capped = db.get_recent_messages("a", 2).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].content, "three");
    }

    #[test]
    fn blocks_are_directional() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");
        seed_user(&db, "b", "bob");

        db.insert_block("b", "a").unwrap();

        assert!(db.is_blocked("b", "a").unwrap());
        assert!(!db.is_blocked("a", "b").unwrap());
    }

    #[test]
    fn duplicate_block_rejected_by_constraint() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");
        seed_user(&db, "b", "bob");

        db.insert_block("a", "b").unwrap();
        assert!(db.insert_block("a", "b").is_err());

        // the failed insert must not have created a second row
        assert_eq!(db.list_blocks("a").unwrap().len(), 1);
    }

    #[test]
    fn delete_block_reports_whether_a_row_existed() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");
        seed_user(&db, "b", "bob");

        db.insert_block("a", "b").unwrap();
        assert!(db.delete_block("a", "b").unwrap());
        assert!(!db.delete_block("a", "b").unwrap());
        assert!(!db.is_blocked("a", "b").unwrap());
    }

    #[test]
    fn list_blocks_joins_the_blocked_username() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");
        seed_user(&db, "b", "bob");
        seed_user(&db, "c", "carol");

        db.insert_block("a", "b").unwrap();
        db.insert_block("a", "c").unwrap();

        let blocks = db.list_blocks("a").unwrap();
        let names: Vec<_> = blocks.iter().map(|b| b.blocked_username.as_str()).collect();
        assert_eq!(names, ["bob", "carol"]);
    }

    #[test]
    fn activity_pagination_is_newest_first() {
        let (_dir, db) = open_db();
        seed_user(&db, "a", "alice");

        db.insert_activity("a", "User registered").unwrap();
        db.insert_activity("a", "User logged in").unwrap();
        db.insert_activity("a", "Blocked user").unwrap();

        assert_eq!(db.count_activity("a").unwrap(), 3);

        let first_page = db.list_activity("a", 2, 0).unwrap();
        let actions: Vec<_> = first_page.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, ["Blocked user", "User logged in"]);

        let second_page = db.list_activity("a", 2, 2).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].action, "User registered");
    }
}
