//! Resource usage counters backed by the platform's business tables.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use wisp_core::authority::UsageCounts;
use wisp_core::ports::UsageProvider;
use wisp_core::{Error, Result};

/// Counts clients, administrator users, and enabled plugins for plan-limit
/// comparisons.
pub struct PgUsageProvider {
    pool: PgPool,
}

impl PgUsageProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, query: &str) -> Result<u64> {
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row.get::<i64, _>(0) as u64)
    }
}

#[async_trait]
impl UsageProvider for PgUsageProvider {
    async fn usage_counts(&self) -> Result<UsageCounts> {
        Ok(UsageCounts {
            clients: self
                .count("SELECT COUNT(*) FROM clients WHERE archived = FALSE")
                .await?,
            users: self.count("SELECT COUNT(*) FROM administrators").await?,
            plugins: self
                .count("SELECT COUNT(*) FROM plugins WHERE enabled = TRUE")
                .await?,
        })
    }
}
