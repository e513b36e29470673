//! `SQLite` implementation of [`CertificateRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use certflow_app::ports::CertificateRepository;
use certflow_domain::certificate::Certificate;
use certflow_domain::error::CertflowError;
use certflow_domain::id::{CertificateId, KeyId};

use crate::error::StorageError;
use crate::row::{self, Attributes};

struct Wrapper(Certificate);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let key_id: Option<uuid::Uuid> = row.try_get("key_id")?;
        let metadata: Attributes = row::json(row, "metadata")?;
        let custom_attributes: Attributes = row::json(row, "custom_attributes")?;
        Ok(Self(Certificate {
            id: Some(CertificateId::from_uuid(id)),
            common_name: row.try_get("common_name")?,
            subject_dn: row.try_get("subject_dn")?,
            issuer_dn: row.try_get("issuer_dn")?,
            serial_number: row.try_get("serial_number")?,
            fingerprint: row.try_get("fingerprint")?,
            public_key_fingerprint: row.try_get("public_key_fingerprint")?,
            not_before: row::timestamp(row, "not_before")?,
            not_after: row::timestamp(row, "not_after")?,
            subject_alternative_names: row::json(row, "subject_alternative_names")?,
            key_algorithm: row.try_get("key_algorithm")?,
            group: row.try_get("group_name")?,
            owner: row.try_get("owner")?,
            state: row::parsed(row, "state")?,
            metadata,
            custom_attributes,
            key_id: key_id.map(KeyId::from_uuid),
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO certificates (
        id, common_name, subject_dn, issuer_dn, serial_number, fingerprint,
        public_key_fingerprint, not_before, not_after, subject_alternative_names,
        key_algorithm, group_name, owner, state, metadata, custom_attributes, key_id
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

/// Identity and X.509 fields never change once stored.
const UPDATE: &str = r"
    UPDATE certificates
    SET group_name = ?, owner = ?, state = ?, metadata = ?, custom_attributes = ?, key_id = ?
    WHERE id = ?
";

/// Persist a new certificate, assigning an id when it has none.
pub(crate) async fn insert_certificate(
    conn: &mut SqliteConnection,
    mut certificate: Certificate,
) -> Result<Certificate, StorageError> {
    let id = *certificate.id.get_or_insert_with(CertificateId::new);
    sqlx::query(INSERT)
        .bind(id.as_uuid())
        .bind(&certificate.common_name)
        .bind(&certificate.subject_dn)
        .bind(&certificate.issuer_dn)
        .bind(&certificate.serial_number)
        .bind(&certificate.fingerprint)
        .bind(&certificate.public_key_fingerprint)
        .bind(certificate.not_before.to_rfc3339())
        .bind(certificate.not_after.to_rfc3339())
        .bind(row::to_json(&certificate.subject_alternative_names)?)
        .bind(&certificate.key_algorithm)
        .bind(&certificate.group)
        .bind(&certificate.owner)
        .bind(certificate.state.as_str())
        .bind(row::to_json(&certificate.metadata)?)
        .bind(row::to_json(&certificate.custom_attributes)?)
        .bind(certificate.key_id.map(KeyId::as_uuid))
        .execute(&mut *conn)
        .await?;
    Ok(certificate)
}

/// Save the mutable fields of a stored certificate.
///
/// # Errors
///
/// Returns [`StorageError::MissingRow`] when the certificate has no id or
/// no stored row.
pub(crate) async fn update_certificate(
    conn: &mut SqliteConnection,
    certificate: &Certificate,
) -> Result<(), StorageError> {
    let id = certificate.id.map_or_else(uuid::Uuid::nil, CertificateId::as_uuid);
    let result = sqlx::query(UPDATE)
        .bind(&certificate.group)
        .bind(&certificate.owner)
        .bind(certificate.state.as_str())
        .bind(row::to_json(&certificate.metadata)?)
        .bind(row::to_json(&certificate.custom_attributes)?)
        .bind(certificate.key_id.map(KeyId::as_uuid))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::MissingRow {
            table: "certificates",
            id,
        });
    }
    Ok(())
}

/// `SQLite`-backed certificate inventory.
pub struct SqliteCertificateRepository {
    pool: SqlitePool,
}

impl SqliteCertificateRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CertificateRepository for SqliteCertificateRepository {
    async fn create(&self, certificate: Certificate) -> Result<Certificate, CertflowError> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        Ok(insert_certificate(&mut conn, certificate).await?)
    }

    async fn get_by_id(&self, id: CertificateId) -> Result<Option<Certificate>, CertflowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM certificates WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(&self, certificate: Certificate) -> Result<Certificate, CertflowError> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        update_certificate(&mut conn, &certificate).await?;
        Ok(certificate)
    }

    async fn get_all(&self) -> Result<Vec<Certificate>, CertflowError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM certificates ORDER BY common_name, fingerprint")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
