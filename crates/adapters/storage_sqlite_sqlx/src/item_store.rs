//! `SQLite` implementation of [`ItemStore`]: one database transaction per
//! discovery candidate.

use sqlx::{Sqlite, SqlitePool, Transaction};

use certflow_app::ports::{HistorySink, ItemStore, ItemTransaction};
use certflow_domain::certificate::Certificate;
use certflow_domain::error::{BatchFatalError, CertflowError};
use certflow_domain::id::{CertificateId, DiscoveryCertificateId};
use certflow_domain::trigger::TriggerHistory;

use crate::certificate_repo::{insert_certificate, update_certificate};
use crate::discovery_repo::complete_candidate;
use crate::error::StorageError;
use crate::history_repo::{backfill_history, insert_history};

/// Opens per-candidate transactions on a connection pool.
#[derive(Clone)]
pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ItemStore for SqliteItemStore {
    type Tx = SqliteItemTransaction;

    /// A pool that hands out no connection aborts the whole batch.
    async fn begin(&self) -> Result<SqliteItemTransaction, CertflowError> {
        let tx = self.pool.begin().await.map_err(|err| match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                CertflowError::from(BatchFatalError::StorageExhausted(err.to_string()))
            }
            other => StorageError::from(other).into(),
        })?;
        Ok(SqliteItemTransaction { tx })
    }
}

/// An open candidate transaction. Dropping it without commit rolls back.
pub struct SqliteItemTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl HistorySink for SqliteItemTransaction {
    async fn append(&mut self, history: TriggerHistory) -> Result<(), CertflowError> {
        Ok(insert_history(&mut self.tx, &history).await?)
    }
}

impl ItemTransaction for SqliteItemTransaction {
    async fn insert_certificate(
        &mut self,
        certificate: Certificate,
    ) -> Result<Certificate, CertflowError> {
        Ok(insert_certificate(&mut self.tx, certificate).await?)
    }

    async fn update_certificate(&mut self, certificate: &Certificate) -> Result<(), CertflowError> {
        Ok(update_certificate(&mut self.tx, certificate).await?)
    }

    async fn backfill_history_object(
        &mut self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> Result<u64, CertflowError> {
        Ok(backfill_history(&mut self.tx, reference_uuid, object_uuid).await?)
    }

    async fn complete_candidate(
        &mut self,
        id: DiscoveryCertificateId,
        certificate_id: Option<CertificateId>,
    ) -> Result<(), CertflowError> {
        Ok(complete_candidate(&mut self.tx, id, certificate_id).await?)
    }

    async fn commit(self) -> Result<(), CertflowError> {
        self.tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), CertflowError> {
        self.tx.rollback().await.map_err(StorageError::from)?;
        Ok(())
    }
}
