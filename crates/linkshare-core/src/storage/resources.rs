//! Resource store
//!
//! Owns the `resources` table. Every mutation is scoped by owner in its
//! WHERE clause, and a scoped statement that matches nothing reports
//! [`CoreError::NotFoundOrForbidden`] whether the row is missing or belongs
//! to somebody else.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{named_params, params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{unique_violation, ConflictKind, CoreError, CoreResult};
use crate::models::{
    NewResource, Privacy, Resource, ResourceDetails, ResourceField, ResourceFieldDiff,
    ResourceOwner, Tag,
};
use crate::visibility::{can_view, ACCESS_PREDICATE};

const RESOURCE_COLUMNS: &str =
    "id, user_id, title, link, type, privacy, recommendations, created_at, updated_at";

const LINK_COLUMN: &str = "resources.link";

/// Access to resource rows over one connection or transaction
pub struct ResourceStore<'c> {
    conn: &'c Connection,
}

impl<'c> ResourceStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a new resource owned by `owner_id`
    ///
    /// Fails with a link conflict if any resource, whoever owns it, already
    /// uses the same link.
    pub fn create(&self, owner_id: i64, resource: &NewResource) -> CoreResult<Resource> {
        let now = Utc::now().timestamp_millis();

        self.conn
            .execute(
                r#"
                INSERT INTO resources (user_id, title, link, type, privacy, recommendations, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, 0, ?, ?)
                "#,
                params![
                    owner_id,
                    resource.title,
                    resource.link,
                    resource.kind,
                    resource.privacy,
                    now,
                    now,
                ],
            )
            .map_err(|e| link_conflict_or(e, "creating resource"))?;

        let id = self.conn.last_insert_rowid();
        info!(resource_id = id, owner_id, "Created resource");

        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM resources WHERE id = ?", RESOURCE_COLUMNS),
                params![id],
                ResourceRow::from_row,
            )
            .map_err(|e| CoreError::storage(e, "reading created resource"))?;

        Ok(row.into_resource(Vec::new()))
    }

    /// Change the fields named in `diff` on a resource owned by `owner_id`
    ///
    /// Returns the row as it is after the update, tags included. An empty
    /// diff writes nothing and returns the current row.
    pub fn update_fields(
        &self,
        resource_id: i64,
        owner_id: i64,
        diff: &ResourceFieldDiff,
    ) -> CoreResult<Resource> {
        let fields = diff.fields();
        if fields.is_empty() {
            return self.fetch_owned(resource_id, owner_id);
        }

        let mut assignments = Vec::with_capacity(fields.len() + 1);
        let mut values = Vec::with_capacity(fields.len() + 3);
        for field in &fields {
            assignments.push(format!("{} = ?", field.column()));
            values.push(field_value(diff, *field));
        }
        assignments.push("updated_at = ?".to_string());
        values.push(Value::Integer(Utc::now().timestamp_millis()));
        values.push(Value::Integer(resource_id));
        values.push(Value::Integer(owner_id));

        let sql = format!(
            "UPDATE resources SET {} WHERE id = ? AND user_id = ? RETURNING {}",
            assignments.join(", "),
            RESOURCE_COLUMNS
        );
        debug!(resource_id, owner_id, ?fields, "Updating resource fields");

        let row = self
            .conn
            .query_row(&sql, params_from_iter(values), ResourceRow::from_row)
            .optional()
            .map_err(|e| link_conflict_or(e, "updating resource"))?
            .ok_or(CoreError::NotFoundOrForbidden)?;

        let tags = self.tags_for(resource_id)?;
        Ok(row.into_resource(tags))
    }

    /// Read a resource only if `owner_id` owns it
    pub fn fetch_owned(&self, resource_id: i64, owner_id: i64) -> CoreResult<Resource> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM resources WHERE id = ? AND user_id = ?",
                    RESOURCE_COLUMNS
                ),
                params![resource_id, owner_id],
                ResourceRow::from_row,
            )
            .optional()
            .map_err(|e| CoreError::storage(e, "reading resource"))?
            .ok_or(CoreError::NotFoundOrForbidden)?;

        let tags = self.tags_for(resource_id)?;
        Ok(row.into_resource(tags))
    }

    /// Delete a resource owned by `owner_id`
    ///
    /// Associations and recommendations go with it through foreign-key
    /// cascades.
    pub fn delete(&self, resource_id: i64, owner_id: i64) -> CoreResult<()> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM resources WHERE id = ? AND user_id = ?",
                params![resource_id, owner_id],
            )
            .map_err(|e| CoreError::storage(e, "deleting resource"))?;

        if affected == 0 {
            return Err(CoreError::NotFoundOrForbidden);
        }

        info!(resource_id, owner_id, "Deleted resource");
        Ok(())
    }

    /// Read a resource with its owner and tags, if `requester_id` may see it
    ///
    /// The visibility rule is part of the query, so a hidden resource is
    /// never loaded.
    pub fn fetch_with_access_check(
        &self,
        resource_id: i64,
        requester_id: i64,
    ) -> CoreResult<ResourceDetails> {
        let sql = format!(
            r#"
            SELECT r.id, r.user_id, r.title, r.link, r.type, r.privacy, r.recommendations,
                   r.created_at, r.updated_at, u.username, u.email,
                   EXISTS (
                       SELECT 1 FROM connections c
                       WHERE c.initiator_id = :requester AND c.recipient_id = r.user_id
                   )
            FROM resources r
            JOIN users u ON u.id = r.user_id
            WHERE r.id = :id AND {}
            "#,
            ACCESS_PREDICATE
        );

        let found = self
            .conn
            .query_row(
                &sql,
                named_params! { ":id": resource_id, ":requester": requester_id },
                |row| {
                    let resource = ResourceRow::from_row(row)?;
                    let owner = ResourceOwner {
                        id: resource.user_id,
                        username: row.get(9)?,
                        email: row.get(10)?,
                    };
                    let follows_owner: bool = row.get(11)?;
                    Ok((resource, owner, follows_owner))
                },
            )
            .optional()
            .map_err(|e| CoreError::storage(e, "fetching resource"))?;

        let Some((row, owner, follows_owner)) = found else {
            debug!(resource_id, requester_id, "Resource hidden or missing");
            return Err(CoreError::NotFoundOrForbidden);
        };

        // The query and the in-process rule must agree on every row served
        debug_assert!(can_view(
            row.user_id,
            row.privacy,
            requester_id,
            follows_owner
        ));

        let tags = self.tags_for(resource_id)?;
        Ok(ResourceDetails {
            resource: row.into_resource(tags),
            owner,
        })
    }

    /// Tags attached to a resource, ordered by title
    pub fn tags_for(&self, resource_id: i64) -> CoreResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT t.id, t.title FROM tags t
                JOIN resource_tags rt ON t.id = rt.tag_id
                WHERE rt.resource_id = ?
                ORDER BY t.title
                "#,
            )
            .map_err(|e| CoreError::storage(e, "reading resource tags"))?;

        let tags = stmt
            .query_map(params![resource_id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| CoreError::storage(e, "reading resource tags"))?;
        Ok(tags)
    }
}

// ==================== Internal helpers ====================

struct ResourceRow {
    id: i64,
    user_id: i64,
    title: String,
    link: String,
    kind: String,
    privacy: Privacy,
    recommendations: i64,
    created_at: i64,
    updated_at: i64,
}

impl ResourceRow {
    /// Map the first nine columns, in `RESOURCE_COLUMNS` order
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            link: row.get(3)?,
            kind: row.get(4)?,
            privacy: row.get(5)?,
            recommendations: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_resource(self, tags: Vec<Tag>) -> Resource {
        Resource {
            id: self.id,
            owner_id: self.user_id,
            title: self.title,
            link: self.link,
            kind: self.kind,
            privacy: self.privacy,
            recommendations: self.recommendations,
            tags,
            created_at: timestamp(self.created_at),
            updated_at: timestamp(self.updated_at),
        }
    }
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

fn field_value(diff: &ResourceFieldDiff, field: ResourceField) -> Value {
    let text = match field {
        ResourceField::Title => diff.title.clone(),
        ResourceField::Link => diff.link.clone(),
        ResourceField::Kind => diff.kind.clone(),
        ResourceField::Privacy => diff.privacy.map(|p| p.as_str().to_string()),
    };
    text.map(Value::Text).unwrap_or(Value::Null)
}

fn link_conflict_or(err: rusqlite::Error, context: &str) -> CoreError {
    if unique_violation(&err) == Some(LINK_COLUMN) {
        CoreError::Conflict(ConflictKind::LinkTaken)
    } else {
        CoreError::storage(err, context)
    }
}
