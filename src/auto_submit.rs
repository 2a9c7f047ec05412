// Periodic submission loop.
//
// Each round submits the whole results file, then records every line the
// ledger has not seen yet, then sleeps. The server decides what counts as a
// duplicate; the ledger only keeps `<id>.submitted` free of repeats.
//
// The results and ledger files are not locked. Editing them from another
// process while a round is running gives unspecified results.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::api::{check_id, ApiClient, SubmissionReport};
use crate::error::{ClientError, Result};
use crate::ledger::{result_lines, Ledger};

/// Set to true to stop the loop at its next check.
pub type CancelToken = Arc<AtomicBool>;

const SLEEP_SLICE: Duration = Duration::from_millis(200);

pub fn cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

fn is_cancelled(cancel: &CancelToken) -> bool {
    cancel.load(Ordering::SeqCst)
}

/// Sleeps for `total` unless cancelled first. Returns false when cancelled.
/// A pause too long to represent as an `Instant` lasts until cancellation.
pub fn sleep_unless_cancelled(total: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now().checked_add(total);
    loop {
        if is_cancelled(cancel) {
            return false;
        }
        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return true;
                }
                SLEEP_SLICE.min(deadline - now)
            }
            None => SLEEP_SLICE,
        };
        thread::sleep(slice);
    }
}

#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round: u64,
    pub report: SubmissionReport,
    /// Lines newly written to the ledger this round.
    pub appended: usize,
    pub ledger_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub rounds: u64,
    pub appended: usize,
}

pub struct AutoSubmitter<'a> {
    client: &'a ApiClient,
    id: String,
    results_path: PathBuf,
    ledger: Ledger,
    interval: Duration,
}

impl<'a> AutoSubmitter<'a> {
    pub fn new(
        client: &'a ApiClient,
        id: &str,
        results_path: impl Into<PathBuf>,
        ledger: Ledger,
        interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client,
            id: check_id(id)?.to_string(),
            results_path: results_path.into(),
            ledger,
            interval,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// One load / submit / record pass. Any error leaves the ledger as last
    /// written.
    pub fn run_round(&self, round: u64) -> Result<RoundOutcome> {
        let mut seen = self.ledger.load()?;
        debug!(round, known = seen.len(), ledger = %self.ledger.path().display(), "ledger loaded");

        let report = self.client.submit(&self.id, &self.results_path)?;

        let content = std::fs::read(&self.results_path)
            .map_err(|e| ClientError::io(&self.results_path, e))?;
        let appended = self.ledger.append_new(result_lines(&content), &mut seen)?;

        info!(
            round,
            hash_list = %self.id,
            appended,
            ledger_size = seen.len(),
            rejected = report.is_rejected(),
            "submission round finished"
        );

        Ok(RoundOutcome {
            round,
            report,
            appended,
            ledger_size: seen.len(),
        })
    }

    /// Runs rounds until `cancel` is set or a round fails. `on_round` sees
    /// every finished round before the pause.
    pub fn run<F>(&self, cancel: &CancelToken, mut on_round: F) -> Result<LoopSummary>
    where
        F: FnMut(&RoundOutcome),
    {
        let mut summary = LoopSummary::default();
        while !is_cancelled(cancel) {
            let outcome = self.run_round(summary.rounds + 1)?;
            summary.rounds += 1;
            summary.appended += outcome.appended;
            on_round(&outcome);

            debug!(interval_secs = self.interval.as_secs(), "waiting for next round");
            if !sleep_unless_cancelled(self.interval, cancel) {
                break;
            }
        }
        info!(rounds = summary.rounds, appended = summary.appended, "auto-submit stopped");
        Ok(summary)
    }
}
