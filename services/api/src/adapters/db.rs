//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, a concrete implementation of the
//! `StorageService` port backed by PostgreSQL through `sqlx`. Slots are rows of
//! the `board_slots` table and every batch is applied inside one transaction.

use async_trait::async_trait;
use resource_board_core::ports::{PortError, PortResult, SlotBatch, SlotMap, StorageService};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StorageService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SlotRecord {
    slot: String,
    value: String,
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `StorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StorageService for DbAdapter {
    async fn read_slots(&self) -> PortResult<SlotMap> {
        let records = sqlx::query_as::<_, SlotRecord>("SELECT slot, value FROM board_slots")
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| (r.slot, r.value)).collect())
    }

    async fn commit(&self, batch: SlotBatch) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        for key in &batch.removals {
            sqlx::query("DELETE FROM board_slots WHERE slot = $1")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        for (key, value) in &batch.writes {
            sqlx::query(
                "INSERT INTO board_slots (slot, value, updated_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT (slot) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}
