//! Whole-signal spectral and statistical indices on the QRS-band cleaned signal.

use super::labels::{BAD, GOOD, MEDIUM};
use super::{MethodFault, MethodOutput, QualityMethod, sqi};

pub const FAMILY: &str = "BioSPPy";

/// Three-level classification of the whole recording.
pub struct Level3;

impl QualityMethod for Level3 {
    fn name(&self) -> &'static str {
        "Level3"
    }

    fn labels(&self) -> &'static [&'static str] {
        &[GOOD, MEDIUM, BAD]
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        Ok(MethodOutput::label(sqi::classify_segment(signal, fs)?))
    }
}

pub struct PSqi;

impl QualityMethod for PSqi {
    fn name(&self) -> &'static str {
        "pSQI"
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        Ok(MethodOutput::scalar(sqi::psqi(&sqi::welch(signal, fs)?)?))
    }
}

pub struct KSqi;

impl QualityMethod for KSqi {
    fn name(&self) -> &'static str {
        "kSQI"
    }

    fn compute(&self, signal: &[f64], _fs: f64) -> Result<MethodOutput, MethodFault> {
        Ok(MethodOutput::scalar(sqi::ksqi(signal)?))
    }
}

pub struct FSqi;

impl QualityMethod for FSqi {
    fn name(&self) -> &'static str {
        "fSQI"
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        Ok(MethodOutput::scalar(sqi::fsqi(&sqi::welch(signal, fs)?)?))
    }
}
