//! Transform stage
//!
//! Discovers pending raw observations, normalizes each independently, and
//! consolidates the survivors into one new artifact. One bad file never
//! aborts the batch: per-file failures are counted and skipped, expressed
//! as a fold accumulating successes and rejections rather than control-flow
//! escapes.

use thiserror::Error;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::WeatherRecord;
use crate::normalize::{normalize_json, NormalizeError};
use crate::staging::{ArtifactHandle, RawHandle, StagingStore};

/// Outcome of one transform run.
///
/// `artifact` is `Some` exactly when at least one record survived; a run
/// writes 0 or 1 artifacts, never more, and never mutates raw inputs.
#[derive(Debug)]
pub struct TransformOutcome {
    pub artifact: Option<ArtifactHandle>,
    /// Records written to the artifact
    pub processed: usize,
    /// Raw files skipped (unreadable, malformed, or incomplete)
    pub rejected: usize,
}

/// Why one raw file was skipped. Absorbed here; never propagated.
#[derive(Error, Debug)]
enum RecordFailure {
    #[error("{0}")]
    Unreadable(#[from] crate::error::EtlError),
    #[error("{0}")]
    Invalid(#[from] NormalizeError),
}

/// Batch transformer over a staging store
pub struct BatchTransformer<S> {
    staging: S,
}

impl<S: StagingStore> BatchTransformer<S> {
    pub fn new(staging: S) -> Self {
        Self { staging }
    }

    /// Run one transform pass.
    ///
    /// Fails fast when the raw zone does not exist (extract never ran).
    /// Zero raw files, or zero survivors, is a no-op success: nothing is
    /// written and the outcome reports what happened.
    pub fn run(&self) -> Result<TransformOutcome> {
        info!("Starting transformation");

        self.staging.ensure_processed_zone()?;
        let files = self.staging.list_raw()?;

        if files.is_empty() {
            info!("No raw observation files to process");
            return Ok(TransformOutcome {
                artifact: None,
                processed: 0,
                rejected: 0,
            });
        }

        let (records, rejected) = files.iter().fold(
            (Vec::new(), 0usize),
            |(mut records, rejected), handle| match self.process_file(handle) {
                Ok(record) => {
                    records.push(record);
                    (records, rejected)
                },
                Err(failure) => {
                    warn!(file = %handle.name, error = %failure, "skipping raw file");
                    (records, rejected + 1)
                },
            },
        );

        if records.is_empty() {
            info!(rejected, "No records survived normalization; nothing written");
            return Ok(TransformOutcome {
                artifact: None,
                processed: 0,
                rejected,
            });
        }

        let artifact = self.staging.write_artifact(&records)?;
        info!(
            artifact = %artifact.name,
            processed = records.len(),
            rejected,
            "Transformation completed"
        );

        Ok(TransformOutcome {
            artifact: Some(artifact),
            processed: records.len(),
            rejected,
        })
    }

    fn process_file(&self, handle: &RawHandle) -> std::result::Result<WeatherRecord, RecordFailure> {
        let contents = self.staging.read_raw(handle)?;
        Ok(normalize_json(&contents)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::staging::MemStagingStore;

    const VALID: &str = r#"{"name":"Testville","dt":1700000000,
        "main":{"temp":293.15,"humidity":50},
        "wind":{"speed":3.5},
        "weather":[{"description":"clear sky"}]}"#;

    const INCOMPLETE: &str = r#"{"name":"Gapville","dt":1700000000,
        "main":{"humidity":50},
        "wind":{"speed":3.5},
        "weather":[{"description":"clear sky"}]}"#;

    fn store_with(files: &[(&str, &str)]) -> MemStagingStore {
        let store = MemStagingStore::new();
        store.create_raw_zone();
        for (name, contents) in files {
            store.write_raw(name, contents).unwrap();
        }
        store
    }

    #[test]
    fn test_missing_raw_zone_aborts() {
        let transformer = BatchTransformer::new(MemStagingStore::new());
        assert!(matches!(
            transformer.run(),
            Err(EtlError::RawZoneMissing(_))
        ));
    }

    #[test]
    fn test_empty_raw_zone_is_noop_success() {
        let transformer = BatchTransformer::new(store_with(&[]));
        let outcome = transformer.run().unwrap();
        assert!(outcome.artifact.is_none());
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn test_batch_isolation_bad_files_are_counted_not_fatal() {
        let store = store_with(&[
            ("a.json", VALID),
            ("b.json", "{broken"),
            ("c.json", VALID),
            ("d.json", INCOMPLETE),
            ("e.json", VALID),
        ]);
        let transformer = BatchTransformer::new(store);

        let outcome = transformer.run().unwrap();
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.rejected, 2);

        let artifact = outcome.artifact.unwrap();
        let rows = transformer.staging.read_artifact(&artifact).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.city == "Testville"));
    }

    #[test]
    fn test_all_rejected_writes_nothing() {
        let store = store_with(&[("a.json", "{broken"), ("b.json", INCOMPLETE)]);
        let transformer = BatchTransformer::new(store);

        let outcome = transformer.run().unwrap();
        assert!(outcome.artifact.is_none());
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.rejected, 2);
        assert!(matches!(
            transformer.staging.latest_artifact(),
            Err(EtlError::NoArtifact(_))
        ));
    }

    #[test]
    fn test_each_run_writes_at_most_one_artifact() {
        let store = store_with(&[("a.json", VALID), ("b.json", VALID)]);
        let transformer = BatchTransformer::new(store);

        let first = transformer.run().unwrap().artifact.unwrap();
        // Raw files are never consumed; a second run re-processes them into
        // a new, strictly newer artifact.
        let second = transformer.run().unwrap().artifact.unwrap();
        assert!(first.name < second.name);
        assert_eq!(transformer.staging.latest_artifact().unwrap(), second);
    }
}
