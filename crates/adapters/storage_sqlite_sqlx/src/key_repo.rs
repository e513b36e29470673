//! `SQLite` implementation of [`KeyRepository`].

use sqlx::{SqliteConnection, SqlitePool};

use certflow_app::ports::KeyRepository;
use certflow_domain::error::CertflowError;
use certflow_domain::id::{CertificateId, KeyId};
use certflow_domain::key::CryptographicKey;

use crate::error::StorageError;

const SELECT_KEY: &str = "SELECT id FROM cryptographic_keys WHERE public_key_fingerprint = ?";

const SELECT_LINKED: &str = "SELECT id FROM certificates WHERE key_id = ? ORDER BY rowid";

/// `SQLite`-backed key inventory.
pub struct SqliteKeyRepository {
    pool: SqlitePool,
}

impl SqliteKeyRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn load(
    conn: &mut SqliteConnection,
    public_key_fingerprint: &str,
) -> Result<Option<CryptographicKey>, StorageError> {
    let id: Option<uuid::Uuid> = sqlx::query_scalar(SELECT_KEY)
        .bind(public_key_fingerprint)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(id) = id else {
        return Ok(None);
    };
    let linked: Vec<uuid::Uuid> = sqlx::query_scalar(SELECT_LINKED)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(Some(CryptographicKey {
        id: KeyId::from_uuid(id),
        public_key_fingerprint: public_key_fingerprint.to_string(),
        certificate_ids: linked.into_iter().map(CertificateId::from_uuid).collect(),
    }))
}

impl KeyRepository for SqliteKeyRepository {
    #[tracing::instrument(skip(self, certificate_ids), fields(certificates = certificate_ids.len()))]
    async fn reconcile(
        &self,
        public_key_fingerprint: &str,
        certificate_ids: &[CertificateId],
    ) -> Result<CryptographicKey, CertflowError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        let key_id = match load(&mut tx, public_key_fingerprint).await? {
            Some(key) => key.id,
            None => {
                let key = CryptographicKey::new(public_key_fingerprint);
                sqlx::query(
                    "INSERT INTO cryptographic_keys (id, public_key_fingerprint) VALUES (?, ?)",
                )
                .bind(key.id.as_uuid())
                .bind(&key.public_key_fingerprint)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
                tracing::debug!(key_id = %key.id, "created key");
                key.id
            }
        };

        for id in certificate_ids {
            sqlx::query("UPDATE certificates SET key_id = ? WHERE id = ?")
                .bind(key_id.as_uuid())
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }

        let key = load(&mut tx, public_key_fingerprint)
            .await?
            .ok_or(StorageError::MissingRow {
                table: "cryptographic_keys",
                id: key_id.as_uuid(),
            })?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(key)
    }

    async fn get_by_fingerprint(
        &self,
        public_key_fingerprint: &str,
    ) -> Result<Option<CryptographicKey>, CertflowError> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        Ok(load(&mut conn, public_key_fingerprint).await?)
    }
}
