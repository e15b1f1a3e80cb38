//! Batch execution of independent runs on a bounded worker pool.
//!
//! Each job builds its own strategy and owns its records; the dataset and
//! calendar are shared by reference. A cancel flag is checked before each
//! job starts: jobs that have not started report `Cancelled`, jobs already
//! running finish normally.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use portlab_core::calendar::TradingCalendar;
use portlab_core::data::PriceDataset;

use crate::data_loader::dataset_fingerprint;
use crate::result::BacktestResult;
use crate::runner::{run_with_fingerprint, RunError, RunJob};

/// Worker pool settings for a batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchOptions<'a> {
    /// Worker threads; 0 uses rayon's default (one per core).
    pub threads: usize,
    /// Optional flag to stop pending jobs cooperatively.
    pub cancel: Option<&'a AtomicBool>,
}

/// Outcome of one job.
#[derive(Debug)]
pub enum BatchOutcome {
    Completed(Box<BacktestResult>),
    Failed(RunError),
    Cancelled,
}

impl BatchOutcome {
    pub fn result(&self) -> Option<&BacktestResult> {
        match self {
            Self::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Run every job; outcomes come back in submission order.
pub fn run_batch(
    dataset: &PriceDataset,
    calendar: &TradingCalendar,
    jobs: &[RunJob],
    options: &BatchOptions<'_>,
) -> Result<Vec<BatchOutcome>, RunError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .map_err(|e| RunError::ThreadPool(e.to_string()))?;

    let fingerprint = dataset_fingerprint(dataset);
    info!(
        jobs = jobs.len(),
        threads = pool.current_num_threads(),
        "batch started"
    );

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                if options.cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                    debug!(label = %job.label, "job cancelled before start");
                    return BatchOutcome::Cancelled;
                }
                match run_with_fingerprint(dataset, calendar, job, &fingerprint) {
                    Ok(result) => BatchOutcome::Completed(Box::new(result)),
                    Err(err) => {
                        warn!(label = %job.label, error = %err, "job failed");
                        BatchOutcome::Failed(err)
                    }
                }
            })
            .collect()
    });

    let completed = outcomes.iter().filter(|o| o.result().is_some()).count();
    let cancelled = outcomes.iter().filter(|o| o.is_cancelled()).count();
    info!(
        completed,
        failed = outcomes.len() - completed - cancelled,
        cancelled,
        "batch finished"
    );
    Ok(outcomes)
}
