//! Resource-tag associations
//!
//! Owns the `resource_tags` join table. Callers run these inside the same
//! transaction as the rest of their change.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::models::ResourceTagAssociation;

/// Access to association rows over one connection or transaction
pub struct AssociationStore<'c> {
    conn: &'c Connection,
}

impl<'c> AssociationStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert association rows
    ///
    /// Any constraint violation, including an existing pair, is an internal
    /// error: the reconciler never produces duplicates, so one showing up
    /// means the stored state is not what the caller assumed.
    pub fn bulk_insert(&self, pairs: &[ResourceTagAssociation]) -> CoreResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO resource_tags (resource_id, tag_id) VALUES (?, ?)")
            .map_err(|e| CoreError::storage(e, "attaching tags to the resource"))?;

        for pair in pairs {
            stmt.execute(params![pair.resource_id, pair.tag_id])
                .map_err(|e| CoreError::storage(e, "attaching tags to the resource"))?;
        }

        debug!(count = pairs.len(), "Inserted resource tags");
        Ok(())
    }

    /// Detach tags from one resource
    ///
    /// Tag ids that are not attached are skipped; this is not an error.
    /// Returns the number of rows removed.
    pub fn bulk_delete(&self, resource_id: i64, tag_ids: &[i64]) -> CoreResult<usize> {
        if tag_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; tag_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM resource_tags WHERE resource_id = ? AND tag_id IN ({})",
            placeholders
        );

        let values = std::iter::once(Value::Integer(resource_id))
            .chain(tag_ids.iter().map(|id| Value::Integer(*id)));

        let removed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| CoreError::storage(e, "detaching removed tags from the resource"))?;

        debug!(resource_id, removed, "Deleted resource tags");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::schema::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO users (id, username, email, created_at) VALUES (1, 'alice', 'a@a.com', 0);
            INSERT INTO resources (id, user_id, title, link, type, created_at, updated_at)
                VALUES (10, 1, 'One', 'https://one.com', 'site', 0, 0),
                       (11, 1, 'Two', 'https://two.com', 'site', 0, 0);
            INSERT INTO tags (id, title) VALUES (1, 'rust'), (2, 'web'), (3, 'db');
            "#,
        )
        .unwrap();
        conn
    }

    fn pair(resource_id: i64, tag_id: i64) -> ResourceTagAssociation {
        ResourceTagAssociation {
            resource_id,
            tag_id,
        }
    }

    fn tag_ids(conn: &Connection, resource_id: i64) -> Vec<i64> {
        conn.prepare("SELECT tag_id FROM resource_tags WHERE resource_id = ? ORDER BY tag_id")
            .unwrap()
            .query_map(params![resource_id], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<i64>, _>>()
            .unwrap()
    }

    #[test]
    fn test_bulk_insert() {
        let conn = setup();
        let store = AssociationStore::new(&conn);

        store.bulk_insert(&[pair(10, 1), pair(10, 2)]).unwrap();
        assert_eq!(tag_ids(&conn, 10), vec![1, 2]);
    }

    #[test]
    fn test_bulk_insert_empty_is_noop() {
        let conn = setup();
        AssociationStore::new(&conn).bulk_insert(&[]).unwrap();
        assert!(tag_ids(&conn, 10).is_empty());
    }

    #[test]
    fn test_bulk_insert_duplicate_is_surfaced() {
        let conn = setup();
        let store = AssociationStore::new(&conn);
        store.bulk_insert(&[pair(10, 1)]).unwrap();

        let err = store.bulk_insert(&[pair(10, 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_bulk_insert_unknown_tag_is_surfaced() {
        let conn = setup();
        let err = AssociationStore::new(&conn)
            .bulk_insert(&[pair(10, 99)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_bulk_delete_scoped_to_resource() {
        let conn = setup();
        let store = AssociationStore::new(&conn);
        store
            .bulk_insert(&[pair(10, 1), pair(10, 2), pair(11, 1)])
            .unwrap();

        let removed = store.bulk_delete(10, &[1]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(tag_ids(&conn, 10), vec![2]);
        assert_eq!(tag_ids(&conn, 11), vec![1]);
    }

    #[test]
    fn test_bulk_delete_is_idempotent() {
        let conn = setup();
        let store = AssociationStore::new(&conn);
        store.bulk_insert(&[pair(10, 1)]).unwrap();

        assert_eq!(store.bulk_delete(10, &[1, 3]).unwrap(), 1);
        assert_eq!(store.bulk_delete(10, &[1, 3]).unwrap(), 0);
        assert_eq!(store.bulk_delete(10, &[]).unwrap(), 0);
    }
}
