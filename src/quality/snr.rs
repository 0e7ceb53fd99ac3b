//! Band-pass signal-to-noise estimate on the raw waveform.

use super::{MethodFault, MethodOutput, QualityMethod};
use crate::preprocess::filter::butter_bandpass;
use serde::Deserialize;

pub const FAMILY: &str = "SNR";

/// Pass band used to separate signal from noise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnrConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
}

impl Default for SnrConfig {
    fn default() -> Self {
        Self {
            low_hz: 0.5,
            high_hz: 40.0,
            order: 4,
        }
    }
}

/// `10 * log10(P(filtered) / P(raw - filtered))` in decibels.
#[derive(Debug, Clone)]
pub struct CustomSnr {
    low_hz: f64,
    high_hz: f64,
    order: usize,
}

impl From<&SnrConfig> for CustomSnr {
    fn from(c: &SnrConfig) -> Self {
        Self {
            low_hz: c.low_hz,
            high_hz: c.high_hz,
            order: c.order,
        }
    }
}

fn power(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64
}

impl QualityMethod for CustomSnr {
    fn name(&self) -> &'static str {
        "CustomSNR"
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        let sos = butter_bandpass(self.order, self.low_hz, self.high_hz, fs)?;
        let filtered = sos.filtfilt(signal)?;
        let noise: Vec<f64> = signal.iter().zip(&filtered).map(|(s, f)| s - f).collect();

        let db = 10.0 * (power(&filtered) / power(&noise)).log10();
        if db.is_finite() {
            Ok(MethodOutput::scalar(db))
        } else {
            Err(MethodFault::NonFinite)
        }
    }
}
