//! Spectral and statistical signal-quality indices shared by the scoring families.
//!
//! Band powers come from a Welch periodogram: Hann window, 50% overlap,
//! per-segment mean removal, segment length the next power of two at or
//! above two seconds of signal (or the whole signal when shorter).

use super::MethodFault;
use super::labels::{BAD, GOOD, MEDIUM};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Fewest samples a spectral estimate is attempted on.
const MIN_SPECTRAL_SAMPLES: usize = 16;
const EPSILON: f64 = 1e-20;

/// One-sided power spectral density.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub psd: Vec<f64>,
}

impl Spectrum {
    /// Integrated power between `low` and `high` Hz, inclusive.
    pub fn band_power(&self, low: f64, high: f64) -> f64 {
        let df = if self.freqs.len() > 1 {
            self.freqs[1] - self.freqs[0]
        } else {
            1.0
        };
        self.freqs
            .iter()
            .zip(&self.psd)
            .filter(|(f, _)| **f >= low && **f <= high)
            .map(|(_, p)| p * df)
            .sum()
    }

    pub fn nyquist(&self) -> f64 {
        self.freqs.last().copied().unwrap_or(0.0)
    }
}

pub fn welch(x: &[f64], fs: f64) -> Result<Spectrum, MethodFault> {
    if x.len() < MIN_SPECTRAL_SAMPLES {
        return Err(MethodFault::Degenerate(format!(
            "{} samples is too short for a spectrum",
            x.len()
        )));
    }

    let nperseg = ((2.0 * fs).ceil() as usize).next_power_of_two().min(x.len());
    let step = (nperseg / 2).max(1);
    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / nperseg as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * window_power);

    let bins = nperseg / 2 + 1;
    let mut psd = vec![0.0; bins];
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let mut buf: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); nperseg];

    let mut segments = 0usize;
    let mut start = 0;
    while start + nperseg <= x.len() {
        let seg = &x[start..start + nperseg];
        let mean = seg.iter().sum::<f64>() / nperseg as f64;
        for ((b, &v), &w) in buf.iter_mut().zip(seg).zip(&window) {
            *b = Complex::new((v - mean) * w, 0.0);
        }
        fft.process(&mut buf);
        for (k, p) in psd.iter_mut().enumerate() {
            *p += buf[k].norm_sqr();
        }
        segments += 1;
        start += step;
    }

    for (k, p) in psd.iter_mut().enumerate() {
        *p *= scale / segments as f64;
        let is_edge = k == 0 || (nperseg % 2 == 0 && k == bins - 1);
        if !is_edge {
            *p *= 2.0;
        }
    }

    let freqs = (0..bins).map(|k| k as f64 * fs / nperseg as f64).collect();
    Ok(Spectrum { freqs, psd })
}

fn ratio(num: f64, den: f64, what: &str) -> Result<f64, MethodFault> {
    if den <= EPSILON {
        return Err(MethodFault::Degenerate(format!("no power in {what} band")));
    }
    Ok(num / den)
}

/// QRS-band energy ratio: P(5–15 Hz) / P(5–40 Hz).
pub fn psqi(spectrum: &Spectrum) -> Result<f64, MethodFault> {
    ratio(
        spectrum.band_power(5.0, 15.0),
        spectrum.band_power(5.0, 40.0),
        "5-40 Hz",
    )
}

/// Relative power outside the baseline: 1 − P(0–1 Hz) / P(0–40 Hz).
pub fn bassqi(spectrum: &Spectrum) -> Result<f64, MethodFault> {
    let upper = 40.0_f64.min(spectrum.nyquist());
    let r = ratio(
        spectrum.band_power(0.0, 1.0),
        spectrum.band_power(0.0, upper),
        "0-40 Hz",
    )?;
    Ok(1.0 - r)
}

/// P(5–20 Hz) over the power of the whole spectrum.
pub fn fsqi(spectrum: &Spectrum) -> Result<f64, MethodFault> {
    ratio(
        spectrum.band_power(5.0, 20.0),
        spectrum.band_power(0.0, spectrum.nyquist()),
        "full",
    )
}

/// Pearson (non-excess) kurtosis.
pub fn ksqi(x: &[f64]) -> Result<f64, MethodFault> {
    if x.is_empty() {
        return Err(MethodFault::Degenerate("empty signal".into()));
    }
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let m2 = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m4 = x.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    if m2 <= EPSILON {
        return Err(MethodFault::Degenerate("constant signal".into()));
    }
    Ok(m4 / (m2 * m2))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Optimal,
    Suspicious,
    Unqualified,
}

pub fn grade_psqi(v: f64) -> Grade {
    if (0.5..=0.8).contains(&v) {
        Grade::Optimal
    } else if (0.4..0.5).contains(&v) || (v > 0.8 && v <= 0.9) {
        Grade::Suspicious
    } else {
        Grade::Unqualified
    }
}

pub fn grade_ksqi(v: f64) -> Grade {
    if v > 5.0 {
        Grade::Optimal
    } else {
        Grade::Unqualified
    }
}

pub fn grade_bassqi(v: f64) -> Grade {
    if (0.95..=1.0).contains(&v) {
        Grade::Optimal
    } else if (0.9..0.95).contains(&v) {
        Grade::Suspicious
    } else {
        Grade::Unqualified
    }
}

/// Three-level classification from pSQI, kSQI and basSQI.
pub fn classify(psqi: f64, ksqi: f64, bassqi: f64) -> &'static str {
    let grades = [grade_psqi(psqi), grade_ksqi(ksqi), grade_bassqi(bassqi)];
    let unqualified = grades.iter().filter(|g| **g == Grade::Unqualified).count();
    if grades.iter().all(|g| *g == Grade::Optimal) {
        GOOD
    } else if unqualified >= 2 {
        BAD
    } else {
        MEDIUM
    }
}

/// Classify a segment of cleaned signal.
pub fn classify_segment(x: &[f64], fs: f64) -> Result<&'static str, MethodFault> {
    let spectrum = welch(x, fs)?;
    Ok(classify(psqi(&spectrum)?, ksqi(x)?, bassqi(&spectrum)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_welch_peak_at_tone() {
        let fs = 128.0;
        let s = welch(&sine(16.0, fs, 2048), fs).unwrap();
        let (peak, _) = s
            .psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert!((s.freqs[peak] - 16.0).abs() < 1e-9);
        assert_eq!(s.nyquist(), 64.0);
    }

    #[test]
    fn test_welch_parseval() {
        // Total power of a unit sine is 0.5.
        let fs = 128.0;
        let s = welch(&sine(16.0, fs, 4096), fs).unwrap();
        let total = s.band_power(0.0, s.nyquist());
        assert!((total - 0.5).abs() < 0.02, "total {total}");
    }

    #[test]
    fn test_welch_too_short() {
        assert!(welch(&[1.0; 4], 130.0).is_err());
    }

    #[test]
    fn test_psqi_of_qrs_band_tone() {
        let fs = 128.0;
        let s = welch(&sine(10.0, fs, 4096), fs).unwrap();
        assert!(psqi(&s).unwrap() > 0.99);
        let s = welch(&sine(30.0, fs, 4096), fs).unwrap();
        assert!(psqi(&s).unwrap() < 0.01);
    }

    #[test]
    fn test_bassqi_flags_baseline() {
        let fs = 128.0;
        let s = welch(&sine(0.5, fs, 8192), fs).unwrap();
        assert!(bassqi(&s).unwrap() < 0.5);
        let s = welch(&sine(10.0, fs, 8192), fs).unwrap();
        assert!(bassqi(&s).unwrap() > 0.99);
    }

    #[test]
    fn test_fsqi_bounds() {
        let fs = 128.0;
        let s = welch(&sine(10.0, fs, 4096), fs).unwrap();
        let v = fsqi(&s).unwrap();
        assert!(v > 0.99 && v <= 1.0 + 1e-12);
    }

    #[test]
    fn test_silence_is_degenerate() {
        let s = welch(&[0.0; 512], 128.0).unwrap();
        assert!(matches!(psqi(&s), Err(MethodFault::Degenerate(_))));
        assert!(matches!(ksqi(&[2.0; 64]), Err(MethodFault::Degenerate(_))));
    }

    #[test]
    fn test_ksqi_of_sine() {
        // Kurtosis of a sinusoid is 1.5.
        let k = ksqi(&sine(5.0, 100.0, 1000)).unwrap();
        assert!((k - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(0.6, 8.0, 0.99), GOOD);
        assert_eq!(classify(0.45, 8.0, 0.99), MEDIUM);
        assert_eq!(classify(0.6, 2.0, 0.99), MEDIUM);
        assert_eq!(classify(0.2, 2.0, 0.99), BAD);
        assert_eq!(classify(0.2, 2.0, 0.5), BAD);
    }
}
