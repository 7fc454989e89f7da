//! Recommendation ledger
//!
//! A recommendation is two writes that must never drift apart: the counter on
//! the resource row and one ledger row per (user, resource). Both happen in a
//! single write transaction that holds the database write lock from the
//! counter read to the commit, so concurrent recommendations cannot lose an
//! increment, and a duplicate ledger row rolls the increment back.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{unique_violation, ConflictKind, CoreError, CoreResult};
use crate::storage::begin_write;

const LEDGER_KEY: &str = "recommendations.user_id, recommendations.resource_id";

/// Records recommendations over one connection
pub struct RecommendationLedger<'c> {
    conn: &'c Connection,
}

impl<'c> RecommendationLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Recommend `resource_id` on behalf of `user_id`
    ///
    /// Returns the new counter value. Any user, the owner included, may
    /// recommend a resource once.
    pub fn recommend(&self, resource_id: i64, user_id: i64) -> CoreResult<i64> {
        let tx = begin_write(self.conn)?;

        let current: i64 = tx
            .query_row(
                "SELECT recommendations FROM resources WHERE id = ?",
                params![resource_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::storage(e, "reading recommendation count"))?
            .ok_or(CoreError::NotFound)?;

        let count = current + 1;

        tx.execute(
            "INSERT INTO recommendations (user_id, resource_id, created_at) VALUES (?, ?, ?)",
            params![user_id, resource_id, Utc::now().timestamp_millis()],
        )
        .map_err(|e| {
            if unique_violation(&e) == Some(LEDGER_KEY) {
                warn!(resource_id, user_id, "Duplicate recommendation rejected");
                CoreError::Conflict(ConflictKind::AlreadyRecommended)
            } else {
                CoreError::storage(e, "recording recommendation")
            }
        })?;

        tx.execute(
            "UPDATE resources SET recommendations = ? WHERE id = ?",
            params![count, resource_id],
        )
        .map_err(|e| CoreError::storage(e, "updating recommendation count"))?;

        tx.commit()
            .map_err(|e| CoreError::storage(e, "committing recommendation"))?;

        info!(resource_id, user_id, count, "Recommended resource");
        Ok(count)
    }

    /// Number of ledger rows for a resource
    pub fn ledger_count(&self, resource_id: i64) -> CoreResult<i64> {
        let count = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM recommendations WHERE resource_id = ?",
                params![resource_id],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::storage(e, "counting recommendations"))?;
        debug!(resource_id, count, "Counted ledger rows");
        Ok(count)
    }
}
