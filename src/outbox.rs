//! Transactional outbox.
//!
//! Events are written in the same transaction as the state change that caused
//! them; the notification relay delivers them after commit.

use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{CreateOutboxEntity, OutboxEntity},
    schema::outbox,
};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SENT: &str = "SENT";
pub const STATUS_FAILED: &str = "FAILED";

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Failed to serialize outbox payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write outbox row: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Queues `payload` under `event_type`. Call inside the caller's transaction.
pub async fn publish<T: Serialize>(
    conn: &mut AsyncPgConnection,
    event_type: &str,
    payload: &T,
) -> Result<OutboxEntity, OutboxError> {
    let payload = serde_json::to_string(payload)?;

    let row = diesel::insert_into(outbox::table)
        .values(CreateOutboxEntity {
            event_type: event_type.to_string(),
            payload,
            idempotency_key: Uuid::new_v4(),
            status: STATUS_PENDING.into(),
        })
        .returning(OutboxEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(row)
}

/// Claims up to `limit` pending rows that are due, oldest first, and leases
/// them until `lease_until` so no other relay picks them up meanwhile. Rows
/// locked by another relay are skipped.
///
/// Commit before delivering; a relay that dies mid-batch leaves its rows to be
/// claimed again once the lease expires.
pub async fn claim_due(
    conn: &mut AsyncPgConnection,
    limit: i64,
    lease_until: DateTime<Utc>,
) -> QueryResult<Vec<OutboxEntity>> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let mut rows: Vec<OutboxEntity> = outbox::table
                .filter(outbox::status.eq(STATUS_PENDING))
                .filter(outbox::next_attempt_at.le(diesel::dsl::now))
                .order_by(outbox::id.asc())
                .limit(limit)
                .select(OutboxEntity::as_select())
                .for_update()
                .skip_locked()
                .load(conn)
                .await?;

            if rows.is_empty() {
                return Ok::<_, diesel::result::Error>(rows);
            }

            let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
            diesel::update(outbox::table.filter(outbox::id.eq_any(ids)))
                .set(outbox::next_attempt_at.eq(lease_until))
                .execute(conn)
                .await?;

            for row in &mut rows {
                row.next_attempt_at = lease_until;
            }
            Ok::<_, diesel::result::Error>(rows)
        })
    })
    .await
}

/// Records one delivery attempt. `next_attempt_at` only matters while the row
/// stays `PENDING`.
pub async fn record_attempt(
    conn: &mut AsyncPgConnection,
    id: i32,
    status: &str,
    last_error: Option<String>,
    next_attempt_at: DateTime<Utc>,
) -> QueryResult<usize> {
    diesel::update(outbox::table.find(id))
        .set((
            outbox::status.eq(status),
            outbox::attempts.eq(outbox::attempts + 1),
            outbox::last_error.eq(last_error),
            outbox::next_attempt_at.eq(next_attempt_at),
            outbox::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
}
