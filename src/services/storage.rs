use chrono::Utc;

use crate::{db::DbPool, error::AppError};

/// Key-value store backing everything the client keeps between runs: the
/// persisted session and the per-day alert markers.
#[derive(Clone)]
pub struct StorageService {
    db: DbPool,
}

impl StorageService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM local_storage WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(value)
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM local_storage WHERE key = ?1")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn temp_storage() -> (StorageService, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("storage.sqlite").display());
    let pool = crate::db::init_pool(&url).await.expect("pool");
    crate::db::run_migrations(&pool).await.expect("migrations");
    (StorageService::new(pool), dir)
}
