//! Zero-phase IIR filtering with second-order sections.
//!
//! Butterworth sections are designed with the bilinear transform (cutoff
//! prewarped) and applied forward and backward with odd-reflection padding
//! and steady-state initial conditions, so a constant input passes through a
//! low-pass filter without a start-up transient.

use std::f64::consts::PI;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("invalid sampling rate: {0}")]
    InvalidSamplingRate(f64),
    #[error("cutoff {cutoff} Hz outside (0, {nyquist}) Hz")]
    InvalidCutoff { cutoff: f64, nyquist: f64 },
    #[error("band edges out of order: {low} Hz >= {high} Hz")]
    InvalidBand { low: f64, high: f64 },
    #[error("filter order must be >= 1")]
    InvalidOrder,
    #[error("signal of {len} samples is too short for padding of {padlen}")]
    SignalTooShort { len: usize, padlen: usize },
    #[error("filter is numerically unstable")]
    Unstable,
}

/// One biquad, normalized so that a0 == 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Direct form II transposed state for a constant input `u`.
    fn steady_state(&self, u: f64) -> ([f64; 2], f64) {
        let y = self.dc_gain() * u;
        let s2 = self.b2 * u - self.a2 * y;
        let s1 = self.b1 * u - self.a1 * y + s2;
        ([s1, s2], y)
    }
}

/// A cascade of second-order sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sos {
    pub sections: Vec<Biquad>,
}

impl Sos {
    pub fn then(mut self, other: Sos) -> Sos {
        self.sections.extend(other.sections);
        self
    }

    /// Edge padding used by `filtfilt`.
    pub fn padlen(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Single forward pass starting from the steady state of `x[0]`.
    pub fn filter(&self, x: &[f64]) -> Result<Vec<f64>, FilterError> {
        let mut y = x.to_vec();
        let Some(&first) = x.first() else {
            return Ok(y);
        };

        let mut u = first;
        for sec in &self.sections {
            let ([mut s1, mut s2], steady) = sec.steady_state(u);
            if !s1.is_finite() || !s2.is_finite() {
                return Err(FilterError::Unstable);
            }
            for v in y.iter_mut() {
                let input = *v;
                let out = sec.b0 * input + s1;
                s1 = sec.b1 * input - sec.a1 * out + s2;
                s2 = sec.b2 * input - sec.a2 * out;
                *v = out;
            }
            u = steady;
        }

        if y.iter().all(|v| v.is_finite()) {
            Ok(y)
        } else {
            Err(FilterError::Unstable)
        }
    }

    /// Zero-phase forward-backward filtering.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>, FilterError> {
        let padlen = self.padlen();
        if x.len() <= padlen {
            return Err(FilterError::SignalTooShort {
                len: x.len(),
                padlen,
            });
        }

        let n = x.len();
        let mut ext = Vec::with_capacity(n + 2 * padlen);
        let (head, tail) = (x[0], x[n - 1]);
        ext.extend((1..=padlen).rev().map(|i| 2.0 * head - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=padlen).map(|i| 2.0 * tail - x[n - 1 - i]));

        let mut y = self.filter(&ext)?;
        y.reverse();
        let mut y = self.filter(&y)?;
        y.reverse();

        Ok(y[padlen..padlen + n].to_vec())
    }
}

fn check_rate(fs: f64) -> Result<f64, FilterError> {
    if fs.is_finite() && fs > 0.0 {
        Ok(fs / 2.0)
    } else {
        Err(FilterError::InvalidSamplingRate(fs))
    }
}

fn check_cutoff(cutoff: f64, fs: f64) -> Result<f64, FilterError> {
    let nyquist = check_rate(fs)?;
    if cutoff.is_finite() && cutoff > 0.0 && cutoff < nyquist {
        Ok((PI * cutoff / fs).tan())
    } else {
        Err(FilterError::InvalidCutoff { cutoff, nyquist })
    }
}

/// Quality factors of the conjugate pole pairs of an order-`order` Butterworth prototype.
fn butterworth_qs(order: usize) -> Vec<f64> {
    let n = order as f64;
    if order % 2 == 0 {
        (0..order / 2)
            .map(|k| 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2.0 * n)).cos()))
            .collect()
    } else {
        (1..=order / 2)
            .map(|k| 1.0 / (2.0 * (k as f64 * PI / n).cos()))
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Pass {
    Low,
    High,
}

fn butterworth(order: usize, cutoff: f64, fs: f64, pass: Pass) -> Result<Sos, FilterError> {
    if order == 0 {
        return Err(FilterError::InvalidOrder);
    }
    let k = check_cutoff(cutoff, fs)?;
    let k2 = k * k;

    let mut sections: Vec<Biquad> = butterworth_qs(order)
        .into_iter()
        .map(|q| {
            let norm = 1.0 / (1.0 + k / q + k2);
            let a1 = 2.0 * (k2 - 1.0) * norm;
            let a2 = (1.0 - k / q + k2) * norm;
            match pass {
                Pass::Low => Biquad {
                    b0: k2 * norm,
                    b1: 2.0 * k2 * norm,
                    b2: k2 * norm,
                    a1,
                    a2,
                },
                Pass::High => Biquad {
                    b0: norm,
                    b1: -2.0 * norm,
                    b2: norm,
                    a1,
                    a2,
                },
            }
        })
        .collect();

    if order % 2 == 1 {
        let norm = 1.0 / (1.0 + k);
        let (b0, b1) = match pass {
            Pass::Low => (k * norm, k * norm),
            Pass::High => (norm, -norm),
        };
        sections.push(Biquad {
            b0,
            b1,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        });
    }

    Ok(Sos { sections })
}

pub fn butter_lowpass(order: usize, cutoff: f64, fs: f64) -> Result<Sos, FilterError> {
    butterworth(order, cutoff, fs, Pass::Low)
}

pub fn butter_highpass(order: usize, cutoff: f64, fs: f64) -> Result<Sos, FilterError> {
    butterworth(order, cutoff, fs, Pass::High)
}

/// Band-pass as a high-pass/low-pass cascade of the same order.
pub fn butter_bandpass(order: usize, low: f64, high: f64, fs: f64) -> Result<Sos, FilterError> {
    if low >= high {
        return Err(FilterError::InvalidBand { low, high });
    }
    Ok(butter_highpass(order, low, fs)?.then(butter_lowpass(order, high, fs)?))
}

/// Second-order notch (band-stop) at `freq` with quality factor `q`.
pub fn notch(freq: f64, q: f64, fs: f64) -> Result<Sos, FilterError> {
    check_cutoff(freq, fs)?;
    let w0 = 2.0 * PI * freq / fs;
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    let cos = w0.cos();
    Ok(Sos {
        sections: vec![Biquad {
            b0: 1.0 / a0,
            b1: -2.0 * cos / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_butterworth_qs() {
        let q2 = butterworth_qs(2);
        assert_eq!(q2.len(), 1);
        assert!((q2[0] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);

        let q5 = butterworth_qs(5);
        assert_eq!(q5.len(), 2);
        assert!((q5[0] - 0.618034).abs() < 1e-5);
        assert!((q5[1] - 1.618034).abs() < 1e-5);
    }

    #[test]
    fn test_section_count() {
        assert_eq!(butter_highpass(5, 0.5, 130.0).unwrap().sections.len(), 3);
        assert_eq!(butter_bandpass(4, 0.5, 40.0, 130.0).unwrap().sections.len(), 4);
    }

    #[test]
    fn test_lowpass_passes_constant() {
        let sos = butter_lowpass(4, 10.0, 100.0).unwrap();
        let y = sos.filtfilt(&vec![3.0; 200]).unwrap();
        assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_highpass_removes_offset() {
        let fs = 250.0;
        let x: Vec<f64> = sine(10.0, fs, 2000).iter().map(|v| v + 5.0).collect();
        let y = butter_highpass(4, 0.5, fs).unwrap().filtfilt(&x).unwrap();
        let mean = y[500..1500].iter().sum::<f64>() / 1000.0;
        assert!(mean.abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_bandpass_keeps_inband_and_rejects_outband() {
        let fs = 250.0;
        let sos = butter_bandpass(4, 0.5, 40.0, fs).unwrap();

        let inband = sos.filtfilt(&sine(10.0, fs, 2500)).unwrap();
        let ratio = rms(&inband[500..2000]) / rms(&sine(10.0, fs, 2500)[500..2000]);
        assert!((ratio - 1.0).abs() < 0.05, "in-band ratio {ratio}");

        let outband = sos.filtfilt(&sine(100.0, fs, 2500)).unwrap();
        assert!(rms(&outband[500..2000]) < 0.05);
    }

    #[test]
    fn test_notch_rejects_powerline() {
        let fs = 500.0;
        let y = notch(50.0, 30.0, fs).unwrap().filtfilt(&sine(50.0, fs, 5000)).unwrap();
        assert!(rms(&y[1000..4000]) < 0.05);
    }

    #[test]
    fn test_cutoff_above_nyquist() {
        let err = butter_lowpass(4, 40.0, 60.0).unwrap_err();
        assert_eq!(err, FilterError::InvalidCutoff { cutoff: 40.0, nyquist: 30.0 });
    }

    #[test]
    fn test_invalid_band_order() {
        assert!(matches!(
            butter_bandpass(4, 40.0, 0.5, 130.0),
            Err(FilterError::InvalidBand { .. })
        ));
    }

    #[test]
    fn test_signal_too_short() {
        let sos = butter_bandpass(4, 0.5, 40.0, 130.0).unwrap();
        let err = sos.filtfilt(&[1.0; 10]).unwrap_err();
        assert_eq!(err, FilterError::SignalTooShort { len: 10, padlen: 27 });
    }

    #[test]
    fn test_zero_order_rejected() {
        assert_eq!(butter_lowpass(0, 10.0, 100.0).unwrap_err(), FilterError::InvalidOrder);
    }
}
