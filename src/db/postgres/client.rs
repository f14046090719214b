use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::info;
use tokio_postgres::NoTls;

use crate::config::PostgresSettings;

/// PostgreSQL client with connection pooling.
///
/// Stores normalized procurement entities, the raw response archive and
/// sync checkpoints. Uses `deadpool-postgres` for connection management.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL");

        let mut retries = 0;
        let max_retries = 3;
        #[allow(unused_assignments)]
        let mut last_error: Option<anyhow::Error> = None;

        loop {
            let mut pg_config = tokio_postgres::Config::new();
            pg_config
                .host(&settings.host)
                .port(settings.port)
                .user(&settings.user)
                .password(&settings.password)
                .dbname(&settings.database);

            let mgr_config = ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            };

            let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
            let pool = Pool::builder(mgr)
                .max_size(settings.pool_size)
                .build()
                .context("Failed to create PostgreSQL connection pool")?;

            // Test the connection
            match pool.get().await {
                Ok(_conn) => {
                    info!("Successfully connected to PostgreSQL");
                    return Ok(Self { pool });
                },
                Err(e) => {
                    let error_msg = e.to_string();
                    last_error = Some(anyhow::anyhow!("{}", error_msg));
                    retries += 1;

                    if retries >= max_retries {
                        break;
                    }

                    let delay = std::time::Duration::from_millis(100 * 2_u64.pow(retries));
                    log::warn!(
                        "Failed to connect to PostgreSQL (attempt {}/{}), retrying in {:?}...",
                        retries,
                        max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }

        Err(anyhow::anyhow!(
            "Failed to connect to PostgreSQL after {} attempts: {}",
            max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        ))
    }

    /// Apply `schema/postgres.sql` statement by statement.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        info!("Running PostgreSQL migrations");
        let client = self.pool.get().await?;

        let schema = tokio::fs::read_to_string("schema/postgres.sql")
            .await
            .context("Failed to read schema/postgres.sql")?;

        for stmt in schema.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            client
                .execute(stmt, &[])
                .await
                .with_context(|| format!("Failed to execute migration statement: {}", stmt))?;
        }

        info!("PostgreSQL schema applied successfully");
        Ok(())
    }
}
