pub mod timestamp;

use chrono::NaiveDateTime;
use std::path::Path;
use thiserror::Error;

/// Name of the amplitude column in a session's ECG file.
pub const ECG_COLUMN: &str = "ecg";
/// Name of the optional timestamp column.
pub const TIMESTAMP_COLUMN: &str = "ts";

/// Rows at the end of a file whose values may be truncated by the recorder.
const TRAILING_ROW_TOLERANCE: usize = 2;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file is empty: {0}")]
    Empty(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no header row")]
    NoHeader,
    #[error("no '{ECG_COLUMN}' column in header")]
    MissingColumn,
    #[error("malformed row {row}: {message}")]
    Malformed { row: usize, message: String },
    #[error("no samples after header")]
    NoSamples,
}

/// A session's raw waveform, only alive for the duration of one task.
#[derive(Debug, Clone)]
pub struct RawSignal {
    pub samples: Vec<f64>,
    pub sampling_rate: f64,
    pub timestamps: Option<Vec<NaiveDateTime>>,
}

impl RawSignal {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sampling rate implied by the timestamp column (median interval), if present.
    pub fn estimated_sampling_rate(&self) -> Option<f64> {
        self.timestamps.as_deref().and_then(timestamp::estimate_rate)
    }
}

/// Load and validate an ECG file.
///
/// Every failure is returned as a `SignalError`; callers treat any error as
/// "absent signal" and skip the session.
pub fn load(path: &Path, sampling_rate: f64) -> Result<RawSignal, SignalError> {
    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(SignalError::NotFound(path.display().to_string())),
    };
    if meta.len() == 0 {
        return Err(SignalError::Empty(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let contents = String::from_utf8_lossy(&bytes);
    parse(&contents, sampling_rate)
}

/// Parse tab-separated ECG content with a header row.
pub fn parse(contents: &str, sampling_rate: f64) -> Result<RawSignal, SignalError> {
    let mut lines = contents
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or(SignalError::NoHeader)?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let ecg_idx = columns
        .iter()
        .position(|c| *c == ECG_COLUMN)
        .ok_or(SignalError::MissingColumn)?;
    let ts_idx = columns.iter().position(|c| *c == TIMESTAMP_COLUMN);

    let rows: Vec<&str> = lines.collect();
    if rows.is_empty() {
        return Err(SignalError::NoSamples);
    }

    let mut samples = Vec::with_capacity(rows.len());
    let mut raw_timestamps: Vec<&str> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let fields: Vec<&str> = row.split('\t').collect();
        let value = fields
            .get(ecg_idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite());

        match value {
            Some(v) => {
                samples.push(v);
                if let Some(idx) = ts_idx {
                    raw_timestamps.push(fields.get(idx).map(|s| s.trim()).unwrap_or(""));
                }
            }
            // Truncated trailing writes are dropped, anything earlier is corrupt.
            None if i + TRAILING_ROW_TOLERANCE >= rows.len() => {
                log::debug!("Dropping unparsable trailing row {}", i + 2);
            }
            None => {
                return Err(SignalError::Malformed {
                    row: i + 2,
                    message: format!("non-numeric '{ECG_COLUMN}' value"),
                });
            }
        }
    }

    if samples.is_empty() {
        return Err(SignalError::NoSamples);
    }

    let timestamps = if ts_idx.is_some() {
        timestamp::parse_all(&raw_timestamps)
    } else {
        None
    };

    Ok(RawSignal {
        samples,
        sampling_rate,
        timestamps,
    })
}
