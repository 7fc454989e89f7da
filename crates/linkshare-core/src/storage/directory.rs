//! Users, follow edges and tag resolution
//!
//! The core treats users and tags as identities that already exist. This
//! module is the thin layer that creates and looks them up, so callers can
//! turn a username or a tag title into an id before calling the service.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{unique_violation, CoreError, CoreResult};
use crate::models::Tag;

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// User registration and follow edges
pub struct UserDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> UserDirectory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Register a user
    pub fn register(&self, username: &str, email: &str) -> CoreResult<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(CoreError::validation("Username cannot be empty"));
        }
        if !email.contains('@') {
            return Err(CoreError::validation("Enter a valid email"));
        }

        self.conn
            .execute(
                "INSERT INTO users (username, email, created_at) VALUES (?, ?, ?)",
                params![username, email, Utc::now().timestamp_millis()],
            )
            .map_err(|e| match unique_violation(&e) {
                Some(_) => CoreError::validation("Username or email already registered"),
                None => CoreError::storage(e, "registering user"),
            })?;

        let id = self.conn.last_insert_rowid();
        info!(user_id = id, "Registered user");
        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Look up a user by id
    pub fn get(&self, id: i64) -> CoreResult<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, username, email FROM users WHERE id = ?",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| CoreError::storage(e, "reading user"))
    }

    /// Record that `follower_id` follows `followed_id`
    ///
    /// Following twice is a no-op.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> CoreResult<()> {
        if follower_id == followed_id {
            return Err(CoreError::validation("You cannot follow yourself"));
        }

        self.conn
            .execute(
                r#"
                INSERT OR IGNORE INTO connections (initiator_id, recipient_id, created_at)
                VALUES (?, ?, ?)
                "#,
                params![follower_id, followed_id, Utc::now().timestamp_millis()],
            )
            .map_err(|e| CoreError::storage(e, "following user"))?;
        Ok(())
    }

    /// Whether `follower_id` follows `followed_id`
    pub fn follows(&self, follower_id: i64, followed_id: i64) -> CoreResult<bool> {
        self.conn
            .prepare("SELECT 1 FROM connections WHERE initiator_id = ? AND recipient_id = ?")
            .and_then(|mut stmt| stmt.exists(params![follower_id, followed_id]))
            .map_err(|e| CoreError::storage(e, "reading follow edge"))
    }
}

/// Tag title resolution
pub struct TagDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> TagDirectory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Resolve titles to tags, creating any that do not exist yet
    ///
    /// Titles are normalized first; blank titles are rejected.
    pub fn resolve_or_create(&self, titles: &[String]) -> CoreResult<Vec<Tag>> {
        titles
            .iter()
            .map(|raw| {
                let title = normalized(raw)?;
                self.conn
                    .execute(
                        "INSERT OR IGNORE INTO tags (title) VALUES (?)",
                        params![title],
                    )
                    .map_err(|e| CoreError::storage(e, "creating tag"))?;
                self.find(&title)?
                    .ok_or_else(|| CoreError::validation(format!("Unknown tag: {}", title)))
            })
            .collect()
    }

    /// Resolve titles to existing tags only
    pub fn resolve_existing(&self, titles: &[String]) -> CoreResult<Vec<Tag>> {
        titles
            .iter()
            .map(|raw| {
                let title = normalized(raw)?;
                self.find(&title)?
                    .ok_or_else(|| CoreError::validation(format!("Unknown tag: {}", title)))
            })
            .collect()
    }

    /// Get tags with usage counts
    pub fn with_counts(&self) -> CoreResult<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT t.title, COUNT(rt.resource_id) as count
                FROM tags t
                LEFT JOIN resource_tags rt ON t.id = rt.tag_id
                GROUP BY t.id
                ORDER BY count DESC, t.title
                "#,
            )
            .map_err(|e| CoreError::storage(e, "counting tags"))?;

        let tags = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .and_then(|rows| rows.collect::<Result<Vec<(String, i64)>, _>>())
            .map_err(|e| CoreError::storage(e, "counting tags"))?;
        Ok(tags)
    }

    fn find(&self, title: &str) -> CoreResult<Option<Tag>> {
        self.conn
            .query_row(
                "SELECT id, title FROM tags WHERE title = ?",
                params![title],
                |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| CoreError::storage(e, "reading tag"))
    }
}

fn normalized(raw: &str) -> CoreResult<String> {
    let title = Tag::normalize_title(raw);
    if title.is_empty() {
        return Err(CoreError::validation("Tag title cannot be empty"));
    }
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_register_and_get_user() {
        let conn = setup();
        let users = UserDirectory::new(&conn);

        let alice = users.register(" alice ", "alice@example.com").unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(users.get(alice.id).unwrap(), Some(alice));
        assert_eq!(users.get(999).unwrap(), None);
    }

    #[test]
    fn test_register_validation() {
        let conn = setup();
        let users = UserDirectory::new(&conn);

        assert!(users.register("", "a@a.com").is_err());
        assert!(users.register("a", "not-an-email").is_err());

        users.register("a", "a@a.com").unwrap();
        let err = users.register("a", "b@b.com").unwrap_err();
        assert_eq!(err.to_string(), "Username or email already registered");
    }

    #[test]
    fn test_follow() {
        let conn = setup();
        let users = UserDirectory::new(&conn);
        let a = users.register("a", "a@a.com").unwrap();
        let b = users.register("b", "b@b.com").unwrap();

        assert!(!users.follows(a.id, b.id).unwrap());
        users.follow(a.id, b.id).unwrap();
        users.follow(a.id, b.id).unwrap();
        assert!(users.follows(a.id, b.id).unwrap());
        assert!(!users.follows(b.id, a.id).unwrap());

        assert!(users.follow(a.id, a.id).is_err());
    }

    #[test]
    fn test_resolve_or_create_normalizes() {
        let conn = setup();
        let tags = TagDirectory::new(&conn);

        let first = tags
            .resolve_or_create(&["Rust".to_string(), " web ".to_string()])
            .unwrap();
        assert_eq!(first[0].title, "rust");
        assert_eq!(first[1].title, "web");

        let again = tags.resolve_or_create(&["RUST".to_string()]).unwrap();
        assert_eq!(again[0], first[0]);
    }

    #[test]
    fn test_resolve_existing_rejects_unknown() {
        let conn = setup();
        let tags = TagDirectory::new(&conn);
        tags.resolve_or_create(&["rust".to_string()]).unwrap();

        assert_eq!(tags.resolve_existing(&["Rust".to_string()]).unwrap().len(), 1);
        let err = tags.resolve_existing(&["go".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown tag: go");
        assert!(tags.resolve_existing(&["  ".to_string()]).is_err());
    }

    #[test]
    fn test_with_counts() {
        let conn = setup();
        let tags = TagDirectory::new(&conn);
        tags.resolve_or_create(&["unused".to_string()]).unwrap();

        let counts = tags.with_counts().unwrap();
        assert_eq!(counts, vec![("unused".to_string(), 0)]);
    }
}
