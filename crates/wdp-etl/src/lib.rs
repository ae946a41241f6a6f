//! WDP ETL Library
//!
//! A three-stage batch ETL pipeline for weather observations:
//!
//! - **extract**: fetch one raw JSON observation per configured city into
//!   the staging raw zone
//! - **transform**: normalize every pending raw observation and consolidate
//!   the survivors into one timestamp-named artifact
//! - **load**: append the newest artifact's rows to the `weather_readings`
//!   table
//!
//! Stages hand work off through the [`staging`] zones and run strictly in
//! order; the [`pipeline`] module carries the scheduling contract.
//!
//! # Example
//!
//! ```no_run
//! use wdp_etl::config::EtlConfig;
//! use wdp_etl::pipeline::PipelineOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EtlConfig::load()?;
//!     let outcome = PipelineOrchestrator::new(config).run_cycle().await?;
//!     println!("loaded {} rows", outcome.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod staging;
pub mod transform;

// Re-export main types
pub use config::{DbConfig, EtlConfig};
pub use error::{EtlError, Result};
pub use extract::{ExtractOutcome, Extractor};
pub use load::{LoadOutcome, TableLoader};
pub use models::{RawObservation, WeatherRecord};
pub use normalize::{normalize, normalize_json, NormalizeError};
pub use pipeline::{CycleOutcome, PipelineOrchestrator, RunState};
pub use staging::{ArtifactHandle, FsStagingStore, MemStagingStore, RawHandle, StagingStore};
pub use transform::{BatchTransformer, TransformOutcome};
