//! Pipeline orchestration
//!
//! One scheduled run walks `Idle → Extracting → Transforming → Loading →
//! Done`, falling to `Failed` from any stage on an unrecovered error. A
//! failed stage halts the run; downstream stages never start. Each stage
//! gets one automatic retry after a fixed delay. Cycles execute strictly
//! sequentially inside one loop, so runs never overlap and the staging
//! zones have a single writer.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{DbConfig, EtlConfig};
use crate::error::Result;
use crate::extract::Extractor;
use crate::load::TableLoader;
use crate::staging::FsStagingStore;
use crate::transform::BatchTransformer;

/// State of one scheduled run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Extracting => "extracting",
            RunState::Transforming => "transforming",
            RunState::Loading => "loading",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Summary of one completed cycle
#[derive(Debug)]
pub struct CycleOutcome {
    pub run_id: Uuid,
    pub fetched: usize,
    pub processed: usize,
    pub rejected: usize,
    pub rows_loaded: usize,
}

/// The scheduler's view of the pipeline: three ordered stages on a fixed
/// cadence.
pub struct PipelineOrchestrator {
    config: EtlConfig,
}

impl PipelineOrchestrator {
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    fn staging(&self) -> FsStagingStore {
        FsStagingStore::new(&self.config.staging_dir)
    }

    /// Run one full cycle: extract → transform → load.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let run_id = Uuid::new_v4();
        let retry_delay = Duration::from_secs(self.config.scheduler.retry_delay_secs);
        let mut state = RunState::Idle;
        info!(%run_id, "Pipeline run starting");

        state = transition(run_id, state, RunState::Extracting);
        let extracted = match with_retry("extract", retry_delay, || async {
            let extractor = Extractor::new(self.staging(), self.config.provider.clone())?;
            extractor.run().await
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                transition(run_id, state, RunState::Failed);
                return Err(e);
            },
        };

        state = transition(run_id, state, RunState::Transforming);
        let transformed = match with_retry("transform", retry_delay, || async {
            BatchTransformer::new(self.staging()).run()
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                transition(run_id, state, RunState::Failed);
                return Err(e);
            },
        };

        state = transition(run_id, state, RunState::Loading);
        let loaded = match with_retry("load", retry_delay, || async {
            let db = DbConfig::from_env()?;
            TableLoader::new(self.staging(), db).run().await
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                transition(run_id, state, RunState::Failed);
                return Err(e);
            },
        };

        transition(run_id, state, RunState::Done);
        let outcome = CycleOutcome {
            run_id,
            fetched: extracted.fetched,
            processed: transformed.processed,
            rejected: transformed.rejected,
            rows_loaded: loaded.rows_loaded,
        };
        info!(
            %run_id,
            fetched = outcome.fetched,
            processed = outcome.processed,
            rejected = outcome.rejected,
            rows_loaded = outcome.rows_loaded,
            "Pipeline run completed"
        );

        Ok(outcome)
    }

    /// Run cycles forever on the configured cadence.
    ///
    /// Missed ticks are skipped, never backfilled; a failed cycle is logged
    /// and the scheduler waits for the next tick.
    pub async fn run_scheduled(&self) -> Result<()> {
        let period = Duration::from_secs(self.config.scheduler.interval_hours * 3600);
        info!(
            interval_hours = self.config.scheduler.interval_hours,
            "Scheduler started"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            // The cycle reaches a terminal state before the next tick is
            // observed, so runs never overlap.
            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Pipeline cycle failed; waiting for next tick");
            }
        }
    }
}

fn transition(run_id: Uuid, from: RunState, to: RunState) -> RunState {
    info!(%run_id, %from, %to, "Run state transition");
    to
}

/// Attempt a stage, once more after `delay` on failure.
async fn with_retry<T, F, Fut>(stage: &str, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(
                stage,
                error = %first,
                delay_secs = delay.as_secs(),
                "Stage failed; retrying once"
            );
            tokio::time::sleep(delay).await;
            op().await.map_err(|second| {
                error!(stage, error = %second, "Stage failed after retry");
                second
            })
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_single_failure() {
        let attempts = AtomicUsize::new(0);
        let result = with_retry("test", Duration::from_secs(300), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(EtlError::config("transient"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_second_failure() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = with_retry("test", Duration::from_secs(300), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(EtlError::config("persistent")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_extract_halts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EtlConfig::default();
        config.staging_dir = dir.path().to_path_buf();
        config.provider.api_key = None; // extract cannot start
        config.scheduler.retry_delay_secs = 0;

        let orchestrator = PipelineOrchestrator::new(config);
        let result = orchestrator.run_cycle().await;

        assert!(matches!(result, Err(EtlError::Config(_))));
        // Downstream stages never ran: the transform stage would have
        // created the processed zone.
        assert!(!dir.path().join("processed").exists());
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Idle.to_string(), "idle");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }
}
