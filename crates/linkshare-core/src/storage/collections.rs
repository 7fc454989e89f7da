//! Collection store

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::{unique_violation, ConflictKind, CoreError, CoreResult};
use crate::models::{Collection, NewCollection};

const NAME_COLUMNS: &str = "collections.user_id, collections.name";

/// Access to collection rows over one connection or transaction
pub struct CollectionStore<'c> {
    conn: &'c Connection,
}

impl<'c> CollectionStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create a collection owned by `owner_id`
    ///
    /// Names are unique per owner; two users may use the same name.
    pub fn create(&self, owner_id: i64, collection: &NewCollection) -> CoreResult<Collection> {
        let now = Utc::now().timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO collections (user_id, name, created_at) VALUES (?, ?, ?)",
                params![owner_id, collection.name, now],
            )
            .map_err(|e| {
                if unique_violation(&e) == Some(NAME_COLUMNS) {
                    CoreError::Conflict(ConflictKind::CollectionExists)
                } else {
                    CoreError::storage(e, "creating collection")
                }
            })?;

        let id = self.conn.last_insert_rowid();
        info!(collection_id = id, owner_id, "Created collection");

        Ok(Collection {
            id,
            owner_id,
            name: collection.name.clone(),
            created_at: timestamp(now),
        })
    }

    /// Collections owned by `owner_id`, ordered by name
    pub fn list_for_owner(&self, owner_id: i64) -> CoreResult<Vec<Collection>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, user_id, name, created_at FROM collections
                WHERE user_id = ?
                ORDER BY name
                "#,
            )
            .map_err(|e| CoreError::storage(e, "listing collections"))?;

        let collections = stmt
            .query_map(params![owner_id], |row| {
                Ok(Collection {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: timestamp(row.get(3)?),
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| CoreError::storage(e, "listing collections"))?;
        Ok(collections)
    }
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
