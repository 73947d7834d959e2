//! PostgreSQL implementation of the advertisement repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::Advertisement;
use crate::domain::repositories::AdRepository;
use crate::error::AppError;

/// PostgreSQL repository for the `ads` table.
pub struct PgAdRepository {
    pool: Arc<PgPool>,
}

impl PgAdRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdRepository for PgAdRepository {
    async fn fetch_all(&self) -> Result<Vec<Advertisement>, AppError> {
        let ads = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT id, image_url, target_url
            FROM ads
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ads)
    }

    async fn exists(&self, ad_id: &str) -> Result<bool, AppError> {
        // EXISTS always yields one row, so a missing ad is `false`, never RowNotFound.
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM ads WHERE id = $1)
            "#,
        )
        .bind(ad_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn health_check(&self) -> bool {
        match sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                false
            }
        }
    }
}
