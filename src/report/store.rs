use super::{MetricsDocument, QualityReport};
use crate::dataset::SessionDescriptor;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Permission bits of a written report.
#[cfg(unix)]
const REPORT_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Filesystem-backed report persistence.
///
/// Reports live next to the session they describe:
/// ```text
/// <output_root>/<iteration>/<subject>/<session>/metrics.json
/// ```
/// With `output_root` equal to the dataset root the report sits beside `ECG.csv`.
#[derive(Debug, Clone)]
pub struct ReportStore {
    output_root: PathBuf,
}

impl ReportStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn path_for(&self, session: &SessionDescriptor) -> PathBuf {
        self.output_root
            .join(session.relative_dir())
            .join(crate::METRICS_FILE_NAME)
    }

    /// Write (or overwrite) a session's report. Empty reports are not written;
    /// returns whether a file was produced.
    pub fn persist(
        &self,
        session: &SessionDescriptor,
        report: &QualityReport,
    ) -> Result<bool, StoreError> {
        if report.is_empty() {
            log::debug!("[{}] Empty report, nothing written", session);
            return Ok(false);
        }
        persist_to_file(&self.path_for(session), report)?;
        Ok(true)
    }

    /// Read a session's report back, `None` if it has never been written.
    pub fn load(&self, session: &SessionDescriptor) -> Result<Option<QualityReport>, StoreError> {
        let path = self.path_for(session);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let doc: MetricsDocument = serde_json::from_str(&contents)?;
        Ok(Some(doc.ecg_signal_quality))
    }
}

/// Serialize with four-space indentation.
pub fn to_json(report: &QualityReport) -> Result<Vec<u8>, StoreError> {
    let doc = MetricsDocument {
        ecg_signal_quality: report.clone(),
    };
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser)?;
    Ok(buf)
}

/// Write a report to an explicit path via a temporary file in the same
/// directory and a rename, so readers never observe a partial file.
pub fn persist_to_file(path: &Path, report: &QualityReport) -> Result<(), StoreError> {
    let json = to_json(report)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    // Temp files are created owner-only; reports are shared with other readers.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(REPORT_MODE))?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
