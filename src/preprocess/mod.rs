pub mod filter;

use filter::{FilterError, butter_bandpass, butter_highpass, notch};
use std::collections::BTreeMap;

/// Mains frequency removed by the general-purpose cleaner.
pub const POWERLINE_HZ: f64 = 50.0;
const POWERLINE_Q: f64 = 30.0;

/// A cleaned rendition of the raw waveform, each feeding one scoring family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CleanVariant {
    /// Baseline-wander and powerline removal for beat-morphology scoring.
    General,
    /// QRS-band isolation for spectral indices.
    Qrs,
    /// The raw samples, untouched.
    Raw,
}

impl CleanVariant {
    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Qrs => "qrs",
            Self::Raw => "raw",
        }
    }
}

/// Produce one cleaned variant of `samples`.
pub fn clean(samples: &[f64], fs: f64, variant: CleanVariant) -> Result<Vec<f64>, FilterError> {
    match variant {
        CleanVariant::General => {
            let highpassed = butter_highpass(5, 0.5, fs)?.filtfilt(samples)?;
            if POWERLINE_HZ < fs / 2.0 {
                notch(POWERLINE_HZ, POWERLINE_Q, fs)?.filtfilt(&highpassed)
            } else {
                Ok(highpassed)
            }
        }
        CleanVariant::Qrs => butter_bandpass(4, 3.0, 45.0, fs)?.filtfilt(samples),
        CleanVariant::Raw => Ok(samples.to_vec()),
    }
}

/// Produce every requested variant independently; one failing does not affect the others.
pub fn clean_all(
    samples: &[f64],
    fs: f64,
    variants: impl IntoIterator<Item = CleanVariant>,
) -> BTreeMap<CleanVariant, Result<Vec<f64>, FilterError>> {
    variants
        .into_iter()
        .map(|v| (v, clean(samples, fs, v)))
        .collect()
}
