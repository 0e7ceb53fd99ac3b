pub mod session;

use crate::config::EvaluationSettings;
use crate::dataset::{DatasetWalker, SessionDescriptor};
use crate::quality::panic_message;
use crate::report::store::{ReportStore, StoreError, persist_to_file};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use session::{SessionOutcome, evaluate_signal, load_checked, process_session};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluateError {
    #[error("could not start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("report error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: u64,
    pub recorded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunSummary {
    fn tally(&mut self, outcome: &SessionOutcome) {
        self.total += 1;
        match outcome {
            SessionOutcome::Recorded => self.recorded += 1,
            SessionOutcome::Skipped(_) => self.skipped += 1,
            SessionOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Run one session with a panic boundary so a fault never reaches the pool.
pub fn run_task(
    session: &SessionDescriptor,
    settings: &EvaluationSettings,
    store: &ReportStore,
) -> SessionOutcome {
    match catch_unwind(AssertUnwindSafe(|| process_session(session, settings, store))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            log::error!("[{}] Task failed: {}", session, reason);
            SessionOutcome::Failed(reason)
        }
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Evaluate every session under the walker's root on a bounded rayon pool.
///
/// Blocks until every task has either recorded a report, been skipped or
/// failed in isolation. Only failing to start the pool is an error.
pub fn evaluate_dataset(
    walker: &DatasetWalker,
    store: &ReportStore,
    settings: &EvaluationSettings,
) -> Result<RunSummary, EvaluateError> {
    let sessions: Vec<SessionDescriptor> = walker.sessions().collect();

    if sessions.is_empty() {
        log::info!("No sessions found under {}", walker.root().display());
        return Ok(RunSummary::default());
    }

    log::info!(
        "Evaluating {} sessions with {} workers",
        sessions.len(),
        settings.workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.workers)
        .build()?;

    let pb = progress_bar(sessions.len() as u64);
    let outcomes: Vec<SessionOutcome> = pool.install(|| {
        sessions
            .par_iter()
            .map(|session| {
                let outcome = run_task(session, settings, store);
                pb.inc(1);
                outcome
            })
            .collect()
    });

    let mut summary = RunSummary::default();
    for outcome in &outcomes {
        summary.tally(outcome);
    }

    pb.finish_with_message(format!(
        "Done: {} recorded, {} skipped, {} failed",
        summary.recorded, summary.skipped, summary.failed
    ));

    Ok(summary)
}

/// Evaluate a single ECG file and write its report to `output`.
pub fn evaluate_file(
    ecg: &Path,
    output: &Path,
    settings: &EvaluationSettings,
) -> Result<SessionOutcome, EvaluateError> {
    let ctx = ecg.display();
    let raw = match load_checked(ecg, settings) {
        Ok(raw) => raw,
        Err(reason) => {
            log::warn!("[{}] Skipping file: {}", ctx, reason);
            return Ok(SessionOutcome::Skipped(reason));
        }
    };

    let report = evaluate_signal(&raw, settings, &ctx);
    persist_to_file(output, &report)?;
    log::info!("Saved metrics to {}", output.display());
    Ok(SessionOutcome::Recorded)
}
