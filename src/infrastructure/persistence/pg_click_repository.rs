//! PostgreSQL implementation of the click repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::NewClick;
use crate::domain::repositories::ClickRepository;
use crate::error::AppError;

/// PostgreSQL repository for the `clicks` table.
///
/// The rate window is evaluated against the database clock, the same clock
/// that the `timestamp` column is compared with.
pub struct PgClickRepository {
    pool: Arc<PgPool>,
}

impl PgClickRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClickRepository for PgClickRepository {
    async fn count_recent_by_ip(&self, ip: IpAddr, window: Duration) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM clicks
            WHERE ip = $1
              AND timestamp > NOW() - make_interval(secs => $2)
            "#,
        )
        .bind(ip.to_string())
        .bind(window.as_secs_f64())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn save(&self, click: &NewClick) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO clicks (ad_id, timestamp, ip, playback_time)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&click.ad_id)
        .bind(click.timestamp)
        .bind(click.ip.to_string())
        .bind(i32::from(click.playback_time))
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
