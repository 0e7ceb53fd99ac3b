//! The per-session pipeline: load → clean → score → normalize → aggregate → persist.

use crate::config::EvaluationSettings;
use crate::dataset::SessionDescriptor;
use crate::preprocess::clean_all;
use crate::quality::score_all;
use crate::report::store::ReportStore;
use crate::report::{QualityReport, ReportBuilder};
use crate::signal::{self, RawSignal, SignalError};
use std::fmt::Display;
use std::path::Path;
use thiserror::Error;

/// Relative difference between configured and timestamp-derived rates that triggers a warning.
const RATE_MISMATCH_TOLERANCE: f64 = 0.1;

/// Why a session produced no report.
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("session path does not exist or is not a directory")]
    MissingSession,
    #[error("invalid ECG signal: {0}")]
    AbsentSignal(#[from] SignalError),
    #[error("{samples} samples is below the minimum of {minimum}")]
    InsufficientLength { samples: usize, minimum: usize },
    #[error("no scoring methods registered")]
    EmptyReport,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Recorded,
    Skipped(SkipReason),
    Failed(String),
}

/// Load an ECG file and enforce the minimum length.
pub fn load_checked(path: &Path, settings: &EvaluationSettings) -> Result<RawSignal, SkipReason> {
    let raw = signal::load(path, settings.sampling_rate)?;
    if raw.len() < settings.min_samples {
        return Err(SkipReason::InsufficientLength {
            samples: raw.len(),
            minimum: settings.min_samples,
        });
    }
    Ok(raw)
}

/// Score a validated signal with every registered method.
pub fn evaluate_signal(
    raw: &RawSignal,
    settings: &EvaluationSettings,
    ctx: &dyn Display,
) -> QualityReport {
    let fs = raw.sampling_rate;
    if let Some(estimated) = raw.estimated_sampling_rate() {
        if ((estimated - fs) / fs).abs() > RATE_MISMATCH_TOLERANCE {
            log::warn!(
                "[{}] Timestamps suggest {:.1} Hz but {:.1} Hz is configured",
                ctx,
                estimated,
                fs
            );
        }
    }

    let cleaned = clean_all(&raw.samples, fs, settings.registry.variants());
    let scored = score_all(&settings.registry, &cleaned, fs, &settings.labels, ctx);

    let mut builder = ReportBuilder::for_registry(&settings.registry);
    builder.extend(scored);
    builder.build()
}

/// Build the report for one session without writing anything.
pub fn evaluate_session(
    session: &SessionDescriptor,
    settings: &EvaluationSettings,
) -> Result<QualityReport, SkipReason> {
    if !session.path.is_dir() {
        return Err(SkipReason::MissingSession);
    }
    let raw = load_checked(&session.ecg_path(), settings)?;
    log::debug!("[{}] {} samples at {} Hz", session, raw.len(), raw.sampling_rate);
    Ok(evaluate_signal(&raw, settings, session))
}

/// Evaluate one session and persist its report.
pub fn process_session(
    session: &SessionDescriptor,
    settings: &EvaluationSettings,
    store: &ReportStore,
) -> SessionOutcome {
    log::debug!("[{}] Processing", session);
    let report = match evaluate_session(session, settings) {
        Ok(r) => r,
        Err(reason) => {
            log::warn!("[{}] Skipping session: {}", session, reason);
            return SessionOutcome::Skipped(reason);
        }
    };

    match store.persist(session, &report) {
        Ok(true) => {
            log::info!(
                "[{}] Recorded {} scores ({} missing)",
                session,
                report.entries().count(),
                report.missing_count()
            );
            SessionOutcome::Recorded
        }
        Ok(false) => {
            log::warn!("[{}] Skipping session: {}", session, SkipReason::EmptyReport);
            SessionOutcome::Skipped(SkipReason::EmptyReport)
        }
        Err(e) => {
            log::error!("[{}] Failed to write report: {}", session, e);
            SessionOutcome::Failed(e.to_string())
        }
    }
}
