//! Beat-morphology quality indices computed on the general-purpose cleaned signal.

use super::labels::{BAD, GOOD, MEDIUM, UNKNOWN};
use super::peaks::{average_beat, detect_rpeaks, extract_beats};
use super::{MethodFault, MethodOutput, QualityMethod, sqi};

pub const FAMILY: &str = "NeuroKit";

/// Window length of the per-segment classification.
pub const ZHAO_WINDOW_S: f64 = 10.0;

/// Detected beats, requiring at least two to compare against their average.
fn beats(signal: &[f64], fs: f64) -> Result<Vec<Vec<f64>>, MethodFault> {
    let peaks = detect_rpeaks(signal, fs);
    let beats = extract_beats(signal, &peaks, fs);
    if beats.len() < 2 {
        return Err(MethodFault::InsufficientBeats { found: beats.len() });
    }
    Ok(beats)
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let ma = a.iter().sum::<f64>() / n as f64;
    let mb = b.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    let denom = (va * vb).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

/// Per-window Good/Medium/Bad classification from pSQI, kSQI and basSQI.
/// Windows whose indices cannot be computed are labelled Unknown.
pub struct Zhao2018;

impl QualityMethod for Zhao2018 {
    fn name(&self) -> &'static str {
        "zhao2018"
    }

    fn labels(&self) -> &'static [&'static str] {
        &[GOOD, MEDIUM, BAD, UNKNOWN]
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        let window = (ZHAO_WINDOW_S * fs).round() as usize;
        let windows: Vec<&[f64]> = if window == 0 || signal.len() <= window {
            vec![signal]
        } else {
            signal.chunks_exact(window).collect()
        };

        let mut labels = Vec::with_capacity(windows.len());
        let mut first_fault = None;
        for w in windows {
            match sqi::classify_segment(w, fs) {
                Ok(label) => labels.push(label.to_string()),
                Err(fault) => {
                    log::debug!("zhao2018 window of {} samples: {}", w.len(), fault);
                    first_fault.get_or_insert(fault);
                    labels.push(UNKNOWN.to_string());
                }
            }
        }

        match first_fault {
            Some(fault) if labels.iter().all(|l| l == UNKNOWN) => Err(fault),
            _ => Ok(MethodOutput::Labels(labels)),
        }
    }
}

/// Distance of each beat from the average beat, rescaled so the closest beat
/// scores 1 and the farthest 0.
pub struct AverageQrs;

impl QualityMethod for AverageQrs {
    fn name(&self) -> &'static str {
        "averageQRS"
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        let beats = beats(signal, fs)?;
        let template = average_beat(&beats);
        let distances: Vec<f64> = beats
            .iter()
            .map(|b| {
                b.iter()
                    .zip(&template)
                    .map(|(x, t)| (x - t).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();

        let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
        let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;
        let quality = if span <= 1e-9 * (1.0 + max.abs()) {
            vec![1.0; distances.len()]
        } else {
            distances.iter().map(|d| 1.0 - (d - min) / span).collect()
        };
        Ok(MethodOutput::Numeric(quality))
    }
}

/// Correlation of each beat with the average beat, clamped to [0, 1].
pub struct TemplateMatch;

impl QualityMethod for TemplateMatch {
    fn name(&self) -> &'static str {
        "templatematch"
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault> {
        let beats = beats(signal, fs)?;
        let template = average_beat(&beats);
        let correlations: Vec<f64> = beats
            .iter()
            .map(|b| pearson(b, &template).unwrap_or(0.0).clamp(0.0, 1.0))
            .collect();
        Ok(MethodOutput::Numeric(correlations))
    }
}
