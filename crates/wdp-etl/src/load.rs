//! Load stage
//!
//! Appends the rows of the most recent artifact to the `weather_readings`
//! table. Append-only: never truncates, never deduplicates, never records
//! which artifact was loaded — re-loading the same artifact duplicates its
//! rows (documented behavior; the table asserts no primary key).

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::config::DbConfig;
use crate::error::Result;
use crate::models::WeatherRecord;
use crate::staging::StagingStore;

/// Target table for appended rows
pub const TARGET_TABLE: &str = "weather_readings";

/// Rows per INSERT statement. 7 binds per row keeps this far under the
/// Postgres bind limit.
const ROW_CHUNK_SIZE: usize = 1000;

/// Connection attempt timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Outcome of one load run
#[derive(Debug)]
pub struct LoadOutcome {
    pub rows_loaded: usize,
}

/// Table loader over a staging store
pub struct TableLoader<S> {
    staging: S,
    db: DbConfig,
}

impl<S: StagingStore> TableLoader<S> {
    pub fn new(staging: S, db: DbConfig) -> Self {
        Self { staging, db }
    }

    /// Run one load pass.
    ///
    /// A failed connection and a missing artifact are both fatal to this
    /// run and propagate to the scheduler; retrying is the scheduler's job,
    /// not this component's. An empty artifact succeeds trivially with
    /// zero rows.
    pub async fn run(&self) -> Result<LoadOutcome> {
        info!("Starting load");

        let pool = PgPoolOptions::new()
            .max_connections(self.db.max_connections)
            .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .connect(&self.db.connection_url())
            .await?;
        info!(
            host = %self.db.host,
            database = %self.db.database,
            "Connected to PostgreSQL"
        );

        let artifact = self.staging.latest_artifact()?;
        info!(artifact = %artifact.name, "Found latest artifact");

        let rows = self.staging.read_artifact(&artifact)?;
        if rows.is_empty() {
            info!("Artifact holds no rows; nothing to load");
            return Ok(LoadOutcome { rows_loaded: 0 });
        }

        let rows_loaded = append_rows(&pool, &rows).await?;
        info!(
            rows = rows_loaded,
            table = TARGET_TABLE,
            "Load completed"
        );

        Ok(LoadOutcome { rows_loaded })
    }
}

/// Append all rows inside one transaction.
///
/// A mid-append failure rolls the whole artifact back, so the table never
/// holds a partial batch.
pub async fn append_rows(pool: &PgPool, rows: &[WeatherRecord]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    // The original store auto-created the table on first write; schema
    // migration proper is out of scope.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_readings (
            city TEXT NOT NULL,
            timestamp_utc TEXT NOT NULL,
            temperature_celsius DOUBLE PRECISION NOT NULL,
            temperature_fahrenheit DOUBLE PRECISION NOT NULL,
            humidity_percent DOUBLE PRECISION NOT NULL,
            wind_speed_ms DOUBLE PRECISION NOT NULL,
            weather_description TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for chunk in rows.chunks(ROW_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO weather_readings (
                city,
                timestamp_utc,
                temperature_celsius,
                temperature_fahrenheit,
                humidity_percent,
                wind_speed_ms,
                weather_description
            ) ",
        );

        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.city)
                .push_bind(&row.timestamp_utc)
                .push_bind(row.temperature_celsius)
                .push_bind(row.temperature_fahrenheit)
                .push_bind(row.humidity_percent)
                .push_bind(row.wind_speed_ms)
                .push_bind(&row.weather_description);
        });

        query_builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    Ok(rows.len())
}

// ============================================================================
// Tests
// ============================================================================
