//! `SQLite` implementation of [`DiscoveryRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use certflow_app::ports::DiscoveryRepository;
use certflow_domain::discovery::{
    DiscoveryCertificate, DiscoveryHistory, DiscoveryStatus, progress_message,
};
use certflow_domain::error::CertflowError;
use certflow_domain::id::{CertificateId, DiscoveryCertificateId, DiscoveryId};

use crate::error::StorageError;
use crate::row::{self, Attributes};

struct Wrapper(DiscoveryHistory);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        Ok(Self(DiscoveryHistory {
            id: DiscoveryId::from_uuid(id),
            name: row.try_get("name")?,
            status: row::parsed(row, "status")?,
            total_certificates_discovered: row::count(row, "total_certificates_discovered")?,
            processed_certificates: row::count(row, "processed_certificates")?,
            message: row.try_get("message")?,
            created_at: row::timestamp(row, "created_at")?,
        }))
    }
}

struct CandidateWrapper(DiscoveryCertificate);

impl<'r> FromRow<'r, SqliteRow> for CandidateWrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let discovery_id: uuid::Uuid = row.try_get("discovery_id")?;
        let certificate_id: Option<uuid::Uuid> = row.try_get("certificate_id")?;
        let metadata: Attributes = row::json(row, "metadata")?;
        Ok(Self(DiscoveryCertificate {
            id: DiscoveryCertificateId::from_uuid(id),
            discovery_id: DiscoveryId::from_uuid(discovery_id),
            common_name: row.try_get("common_name")?,
            fingerprint: row.try_get("fingerprint")?,
            content: row.try_get("content")?,
            metadata,
            newly_discovered: row.try_get("newly_discovered")?,
            processed: row.try_get("processed")?,
            processed_error: row.try_get("processed_error")?,
            certificate_id: certificate_id.map(CertificateId::from_uuid),
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO discovery_history (
        id, name, status, total_certificates_discovered, processed_certificates, message, created_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const INSERT_CANDIDATE: &str = r"
    INSERT INTO discovery_certificates (
        id, discovery_id, common_name, fingerprint, content, metadata,
        newly_discovered, processed, processed_error, certificate_id
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_UNPROCESSED: &str = r"
    SELECT * FROM discovery_certificates
    WHERE discovery_id = ? AND newly_discovered = 1 AND processed = 0
    ORDER BY seq
";

/// Progress never moves backwards; a lower or equal count is ignored.
const UPDATE_PROGRESS: &str = r"
    UPDATE discovery_history
    SET processed_certificates = ?, total_certificates_discovered = ?, message = ?
    WHERE id = ? AND processed_certificates < ?
";

const COMPLETE_CANDIDATE: &str = r"
    UPDATE discovery_certificates
    SET processed = 1, processed_error = NULL, certificate_id = ?
    WHERE id = ?
";

/// Mark a candidate processed and link the certificate it produced.
pub(crate) async fn complete_candidate(
    conn: &mut SqliteConnection,
    id: DiscoveryCertificateId,
    certificate_id: Option<CertificateId>,
) -> Result<(), StorageError> {
    let result = sqlx::query(COMPLETE_CANDIDATE)
        .bind(certificate_id.map(CertificateId::as_uuid))
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::MissingRow {
            table: "discovery_certificates",
            id: id.as_uuid(),
        });
    }
    Ok(())
}

/// `SQLite`-backed discovery jobs and candidates.
pub struct SqliteDiscoveryRepository {
    pool: SqlitePool,
}

impl SqliteDiscoveryRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn set_outcome(
        &self,
        id: DiscoveryCertificateId,
        processed: bool,
        error: Option<String>,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE discovery_certificates SET processed = ?, processed_error = ? WHERE id = ?")
            .bind(processed)
            .bind(error)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl DiscoveryRepository for SqliteDiscoveryRepository {
    async fn create_discovery(
        &self,
        discovery: DiscoveryHistory,
    ) -> Result<DiscoveryHistory, CertflowError> {
        sqlx::query(INSERT)
            .bind(discovery.id.as_uuid())
            .bind(&discovery.name)
            .bind(discovery.status.as_str())
            .bind(row::to_i64(discovery.total_certificates_discovered))
            .bind(row::to_i64(discovery.processed_certificates))
            .bind(&discovery.message)
            .bind(discovery.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(discovery)
    }

    async fn get_discovery(
        &self,
        id: DiscoveryId,
    ) -> Result<Option<DiscoveryHistory>, CertflowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM discovery_history WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn add_candidate(
        &self,
        candidate: DiscoveryCertificate,
    ) -> Result<DiscoveryCertificate, CertflowError> {
        sqlx::query(INSERT_CANDIDATE)
            .bind(candidate.id.as_uuid())
            .bind(candidate.discovery_id.as_uuid())
            .bind(&candidate.common_name)
            .bind(&candidate.fingerprint)
            .bind(&candidate.content)
            .bind(row::to_json(&candidate.metadata).map_err(StorageError::from)?)
            .bind(candidate.newly_discovered)
            .bind(candidate.processed)
            .bind(&candidate.processed_error)
            .bind(candidate.certificate_id.map(CertificateId::as_uuid))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(candidate)
    }

    async fn find_unprocessed_candidates(
        &self,
        discovery_id: DiscoveryId,
    ) -> Result<Vec<DiscoveryCertificate>, CertflowError> {
        let rows: Vec<CandidateWrapper> = sqlx::query_as(SELECT_UNPROCESSED)
            .bind(discovery_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_candidates(
        &self,
        discovery_id: DiscoveryId,
    ) -> Result<Vec<DiscoveryCertificate>, CertflowError> {
        let rows: Vec<CandidateWrapper> =
            sqlx::query_as("SELECT * FROM discovery_certificates WHERE discovery_id = ? ORDER BY seq")
                .bind(discovery_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn mark_processed(
        &self,
        id: DiscoveryCertificateId,
        error: Option<String>,
    ) -> Result<(), CertflowError> {
        Ok(self.set_outcome(id, true, error).await?)
    }

    async fn mark_interrupted(
        &self,
        id: DiscoveryCertificateId,
        reason: String,
    ) -> Result<(), CertflowError> {
        Ok(self.set_outcome(id, false, Some(reason)).await?)
    }

    async fn update_progress(
        &self,
        id: DiscoveryId,
        processed: u64,
        total: u64,
    ) -> Result<bool, CertflowError> {
        let processed_count = row::to_i64(processed);
        let result = sqlx::query(UPDATE_PROGRESS)
            .bind(processed_count)
            .bind(row::to_i64(total))
            .bind(progress_message(processed, total))
            .bind(id.as_uuid())
            .bind(processed_count)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(&self, id: DiscoveryId, status: DiscoveryStatus) -> Result<(), CertflowError> {
        sqlx::query("UPDATE discovery_history SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
