//! PostgreSQL implementation of LicenseRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use wisp_core::license::{
    LicenseMetadata, LicenseRecord, LicenseStatus, PlanLimits, PlanType,
};
use wisp_core::ports::LicenseRepository;
use wisp_core::{Error, Result};

const LICENSE_COLUMNS: &str = "id, license_key, hardware_id, plan_type, client_limit, user_limit, plugin_limit, features_enabled, status, active, activated_at, expires_at, last_validated, last_heartbeat, metadata, created_at";

pub struct PgLicenseRepository {
    pool: PgPool,
}

impl PgLicenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn status_to_str(status: &LicenseStatus) -> &'static str {
        match status {
            LicenseStatus::Active => "active",
            LicenseStatus::Suspended => "suspended",
            LicenseStatus::Inactive => "inactive",
        }
    }

    fn str_to_status(s: &str) -> LicenseStatus {
        match s {
            "suspended" => LicenseStatus::Suspended,
            "inactive" => LicenseStatus::Inactive,
            _ => LicenseStatus::Active,
        }
    }

    fn row_to_record(&self, r: &sqlx::postgres::PgRow) -> Result<LicenseRecord> {
        let features: std::collections::HashMap<String, bool> =
            serde_json::from_value(r.get("features_enabled"))
                .map_err(|e| Error::Serialization(e.to_string()))?;
        let metadata: LicenseMetadata = serde_json::from_value(r.get("metadata"))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let plan_str: String = r.get("plan_type");
        let status_str: String = r.get("status");
        Ok(LicenseRecord {
            id: r.get("id"),
            license_key: r.get("license_key"),
            hardware_id: r.get("hardware_id"),
            plan_type: PlanType::parse(&plan_str),
            limits: PlanLimits::new(
                r.get("client_limit"),
                r.get("user_limit"),
                r.get("plugin_limit"),
            ),
            features_enabled: features,
            status: Self::str_to_status(&status_str),
            active: r.get("active"),
            activated_at: r.get("activated_at"),
            expires_at: r.get("expires_at"),
            last_validated: r.get("last_validated"),
            last_heartbeat: r.get("last_heartbeat"),
            metadata,
            created_at: r.get("created_at"),
        })
    }
}

#[async_trait]
impl LicenseRepository for PgLicenseRepository {
    async fn current(&self) -> Result<Option<LicenseRecord>> {
        let query = format!(
            "SELECT {LICENSE_COLUMNS} FROM system_licenses WHERE active = TRUE ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        match row {
            Some(r) => Ok(Some(self.row_to_record(&r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_key(&self, license_key: &str) -> Result<Option<LicenseRecord>> {
        let query = format!(
            "SELECT {LICENSE_COLUMNS} FROM system_licenses WHERE license_key = $1 ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(license_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        match row {
            Some(r) => Ok(Some(self.row_to_record(&r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &LicenseRecord) -> Result<()> {
        let features_json = serde_json::to_value(&record.features_enabled)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let metadata_json = serde_json::to_value(&record.metadata)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        // A new current record supersedes any previous one; rows are never
        // hard-deleted.
        sqlx::query("UPDATE system_licenses SET active = FALSE, updated_at = NOW() WHERE active = TRUE")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query("INSERT INTO system_licenses (id, license_key, hardware_id, plan_type, client_limit, user_limit, plugin_limit, features_enabled, status, active, activated_at, expires_at, last_validated, last_heartbeat, metadata, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)")
            .bind(record.id)
            .bind(&record.license_key)
            .bind(&record.hardware_id)
            .bind(record.plan_type.as_str())
            .bind(record.limits.client_limit)
            .bind(record.limits.user_limit)
            .bind(record.limits.plugin_limit)
            .bind(&features_json)
            .bind(Self::status_to_str(&record.status))
            .bind(record.active)
            .bind(record.activated_at)
            .bind(record.expires_at)
            .bind(record.last_validated)
            .bind(record.last_heartbeat)
            .bind(&metadata_json)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, record: &LicenseRecord) -> Result<()> {
        let features_json = serde_json::to_value(&record.features_enabled)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let metadata_json = serde_json::to_value(&record.metadata)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        sqlx::query("UPDATE system_licenses SET plan_type = $2, client_limit = $3, user_limit = $4, plugin_limit = $5, features_enabled = $6, status = $7, active = $8, expires_at = $9, last_validated = $10, last_heartbeat = $11, metadata = $12, updated_at = NOW() WHERE id = $1")
            .bind(record.id)
            .bind(record.plan_type.as_str())
            .bind(record.limits.client_limit)
            .bind(record.limits.user_limit)
            .bind(record.limits.plugin_limit)
            .bind(&features_json)
            .bind(Self::status_to_str(&record.status))
            .bind(record.active)
            .bind(record.expires_at)
            .bind(record.last_validated)
            .bind(record.last_heartbeat)
            .bind(&metadata_json)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
