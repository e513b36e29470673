//! `SQLite` implementation of [`TriggerHistoryRepository`].
//!
//! Rows and their records are also written from inside a batch item
//! transaction, so the insert and back-fill statements work on any
//! [`SqliteConnection`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use certflow_app::ports::TriggerHistoryRepository;
use certflow_domain::error::CertflowError;
use certflow_domain::id::{
    ConditionId, ExecutionId, TriggerAssociationId, TriggerHistoryId, TriggerHistoryRecordId,
    TriggerId,
};
use certflow_domain::trigger::{TriggerHistory, TriggerHistoryRecord};

use crate::error::StorageError;
use crate::row;

struct Wrapper(TriggerHistory);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let trigger_id: uuid::Uuid = row.try_get("trigger_id")?;
        let association: Option<uuid::Uuid> = row.try_get("trigger_association_id")?;
        Ok(Self(TriggerHistory {
            id: TriggerHistoryId::from_uuid(id),
            trigger_id: TriggerId::from_uuid(trigger_id),
            trigger_association_id: association.map(TriggerAssociationId::from_uuid),
            object_uuid: row.try_get("object_uuid")?,
            reference_object_uuid: row.try_get("reference_object_uuid")?,
            conditions_matched: row.try_get("conditions_matched")?,
            actions_performed: row.try_get("actions_performed")?,
            triggered_at: row::timestamp(row, "triggered_at")?,
            message: row.try_get("message")?,
            records: Vec::new(),
        }))
    }
}

struct RecordWrapper(TriggerHistoryRecord);

impl<'r> FromRow<'r, SqliteRow> for RecordWrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let condition_id: Option<uuid::Uuid> = row.try_get("condition_id")?;
        let execution_id: Option<uuid::Uuid> = row.try_get("execution_id")?;
        Ok(Self(TriggerHistoryRecord {
            id: TriggerHistoryRecordId::from_uuid(id),
            condition_id: condition_id.map(ConditionId::from_uuid),
            execution_id: execution_id.map(ExecutionId::from_uuid),
            message: row.try_get("message")?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO trigger_history (
        id, trigger_id, trigger_association_id, object_uuid, reference_object_uuid,
        conditions_matched, actions_performed, triggered_at, message
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const INSERT_RECORD: &str = r"
    INSERT INTO trigger_history_records (id, trigger_history_id, condition_id, execution_id, message)
    VALUES (?, ?, ?, ?, ?)
";

const BACKFILL: &str = r"
    UPDATE trigger_history SET object_uuid = ?
    WHERE reference_object_uuid = ? AND object_uuid IS NULL
";

const SELECT_RECORDS: &str = r"
    SELECT * FROM trigger_history_records WHERE trigger_history_id = ? ORDER BY seq
";

/// Insert one history row together with its records.
pub(crate) async fn insert_history(
    conn: &mut SqliteConnection,
    history: &TriggerHistory,
) -> Result<(), StorageError> {
    sqlx::query(INSERT)
        .bind(history.id.as_uuid())
        .bind(history.trigger_id.as_uuid())
        .bind(history.trigger_association_id.map(TriggerAssociationId::as_uuid))
        .bind(history.object_uuid)
        .bind(history.reference_object_uuid)
        .bind(history.conditions_matched)
        .bind(history.actions_performed)
        .bind(history.triggered_at.to_rfc3339())
        .bind(&history.message)
        .execute(&mut *conn)
        .await?;

    for record in &history.records {
        sqlx::query(INSERT_RECORD)
            .bind(record.id.as_uuid())
            .bind(history.id.as_uuid())
            .bind(record.condition_id.map(ConditionId::as_uuid))
            .bind(record.execution_id.map(ExecutionId::as_uuid))
            .bind(&record.message)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Point rows recorded against `reference_uuid` at `object_uuid`.
///
/// Rows that already carry an object are left alone.
pub(crate) async fn backfill_history(
    conn: &mut SqliteConnection,
    reference_uuid: uuid::Uuid,
    object_uuid: uuid::Uuid,
) -> Result<u64, StorageError> {
    let result = sqlx::query(BACKFILL)
        .bind(object_uuid)
        .bind(reference_uuid)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// `SQLite`-backed trigger history ledger.
pub struct SqliteTriggerHistoryRepository {
    pool: SqlitePool,
}

impl SqliteTriggerHistoryRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_where(
        &self,
        column: &'static str,
        value: uuid::Uuid,
    ) -> Result<Vec<TriggerHistory>, StorageError> {
        let sql = format!("SELECT * FROM trigger_history WHERE {column} = ? ORDER BY seq");
        let rows: Vec<Wrapper> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        let mut histories = Vec::with_capacity(rows.len());
        for Wrapper(mut history) in rows {
            let records: Vec<RecordWrapper> = sqlx::query_as(SELECT_RECORDS)
                .bind(history.id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
            history.records = records.into_iter().map(|w| w.0).collect();
            histories.push(history);
        }
        Ok(histories)
    }
}

impl TriggerHistoryRepository for SqliteTriggerHistoryRepository {
    async fn append(&self, history: TriggerHistory) -> Result<(), CertflowError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        insert_history(&mut tx, &history).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }

    async fn find_by_object(
        &self,
        object_uuid: uuid::Uuid,
    ) -> Result<Vec<TriggerHistory>, CertflowError> {
        Ok(self.find_where("object_uuid", object_uuid).await?)
    }

    async fn find_by_reference_object(
        &self,
        reference_uuid: uuid::Uuid,
    ) -> Result<Vec<TriggerHistory>, CertflowError> {
        Ok(self
            .find_where("reference_object_uuid", reference_uuid)
            .await?)
    }

    async fn backfill_object(
        &self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> Result<u64, CertflowError> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        Ok(backfill_history(&mut conn, reference_uuid, object_uuid).await?)
    }
}
