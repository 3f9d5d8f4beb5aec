use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::config::TenantSettings;
use crate::traits::{SettingsProvider, WatchStore};
use crate::types::WatchKey;

/// Postgres-backed watch store and settings lookup.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a bounded pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl WatchStore for PostgresStore {
    async fn set_active(&self, key: &WatchKey, active: bool) -> Result<u64> {
        // Filtered by the full composite key so concurrent checks for other
        // watches, owners, or tenants are never touched.
        let result = sqlx::query(
            r#"
            UPDATE watches
            SET active = $4
            WHERE tenant_id = $1 AND owner_id = $2 AND name = $3
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.owner_id)
        .bind(&key.name)
        .bind(active)
        .execute(&self.pool)
        .await
        .context("Failed to update watch active flag")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SettingsProvider for PostgresStore {
    async fn settings(&self, tenant_id: &str) -> Result<TenantSettings> {
        let row = sqlx::query(
            r#"
            SELECT timeout_secs
            FROM tenant_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load tenant settings")?;

        Ok(row
            .map(|r| TenantSettings::new(r.get::<i64, _>("timeout_secs") as u64))
            .unwrap_or_default())
    }
}
