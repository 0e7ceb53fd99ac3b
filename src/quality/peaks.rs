//! R-peak detection and beat segmentation.
//!
//! Pan–Tompkins style: five-point derivative, squaring, 150 ms moving-window
//! integration, then maxima above a fraction of the 98th percentile kept at
//! least one refractory period apart. Candidates are refined to the maximum
//! of the input signal nearby.

const INTEGRATION_WINDOW_S: f64 = 0.15;
const REFRACTORY_S: f64 = 0.3;
const REFINE_S: f64 = 0.15;
const THRESHOLD_FRACTION: f64 = 0.3;

/// Beat window around each R peak.
pub const BEAT_BEFORE_S: f64 = 0.2;
pub const BEAT_AFTER_S: f64 = 0.4;

fn seconds(s: f64, fs: f64) -> usize {
    (s * fs).round().max(1.0) as usize
}

fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}

fn integrate(x: &[f64], fs: f64) -> Vec<f64> {
    let n = x.len();
    let mut energy = vec![0.0; n];
    for i in 2..n - 2 {
        let d = (-x[i - 2] - 2.0 * x[i - 1] + 2.0 * x[i + 1] + x[i + 2]) / 8.0;
        energy[i] = d * d;
    }

    let half = seconds(INTEGRATION_WINDOW_S, fs) / 2;
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for e in &energy {
        prefix.push(prefix.last().copied().unwrap_or(0.0) + e);
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Keep peaks at least `gap` apart, preferring the larger `score` of two close ones.
fn enforce_refractory(peaks: Vec<usize>, score: impl Fn(usize) -> f64, gap: usize) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(peaks.len());
    for p in peaks {
        match kept.last_mut() {
            Some(last) if p - *last < gap => {
                if score(p) > score(*last) {
                    *last = p;
                }
            }
            _ => kept.push(p),
        }
    }
    kept
}

/// Sample indices of detected R peaks, ascending.
pub fn detect_rpeaks(x: &[f64], fs: f64) -> Vec<usize> {
    if x.len() < 5 || !(fs > 0.0) {
        return Vec::new();
    }

    let mwi = integrate(x, fs);
    let threshold = THRESHOLD_FRACTION * percentile(&mwi, 0.98);
    if !(threshold > 0.0) {
        return Vec::new();
    }

    let candidates: Vec<usize> = (1..mwi.len() - 1)
        .filter(|&i| mwi[i] > threshold && mwi[i] >= mwi[i - 1] && mwi[i] > mwi[i + 1])
        .collect();
    let refractory = seconds(REFRACTORY_S, fs);
    let candidates = enforce_refractory(candidates, |i| mwi[i], refractory);

    let reach = seconds(REFINE_S, fs);
    let mut refined: Vec<usize> = candidates
        .into_iter()
        .map(|c| {
            let lo = c.saturating_sub(reach);
            let hi = (c + reach + 1).min(x.len());
            (lo..hi)
                .max_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap_or(c)
        })
        .collect();
    refined.dedup();

    enforce_refractory(refined, |i| x[i], refractory)
}

/// Fixed-length windows around each peak that lies fully inside the signal.
pub fn extract_beats(x: &[f64], peaks: &[usize], fs: f64) -> Vec<Vec<f64>> {
    let before = seconds(BEAT_BEFORE_S, fs);
    let after = seconds(BEAT_AFTER_S, fs);
    peaks
        .iter()
        .filter(|&&p| p >= before && p + after <= x.len())
        .map(|&p| x[p - before..p + after].to_vec())
        .collect()
}

/// Sample-wise mean of equally long beats.
pub fn average_beat(beats: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = beats.first() else {
        return Vec::new();
    };
    let mut avg = vec![0.0; first.len()];
    for beat in beats {
        for (a, v) in avg.iter_mut().zip(beat) {
            *a += v;
        }
    }
    let n = beats.len() as f64;
    avg.iter_mut().for_each(|a| *a /= n);
    avg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{CleanVariant, clean};
    use crate::quality::tests::synthetic_ecg;

    #[test]
    fn test_detects_every_beat() {
        let fs = 130.0;
        // 60 bpm for 20 s, R peaks at 0.5 s, 1.5 s, ...
        let x = clean(&synthetic_ecg(2600, fs, 60.0), fs, CleanVariant::General).unwrap();
        let peaks = detect_rpeaks(&x, fs);
        assert_eq!(peaks.len(), 20, "{peaks:?}");
        for (k, p) in peaks.iter().enumerate() {
            let expected = (k as f64 + 0.5) * fs;
            assert!((*p as f64 - expected).abs() <= 2.0, "peak {k} at {p}");
        }
    }

    #[test]
    fn test_flat_signal_has_no_peaks() {
        assert!(detect_rpeaks(&[0.0; 500], 130.0).is_empty());
        assert!(detect_rpeaks(&[1.0; 3], 130.0).is_empty());
    }

    #[test]
    fn test_refractory_keeps_larger() {
        let kept = enforce_refractory(vec![10, 12, 50], |i| if i == 12 { 2.0 } else { 1.0 }, 5);
        assert_eq!(kept, vec![12, 50]);
    }

    #[test]
    fn test_extract_beats_skips_edges() {
        let fs = 10.0;
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        // before = 2, after = 4
        let beats = extract_beats(&x, &[1, 10, 27], fs);
        assert_eq!(beats, vec![vec![8.0, 9.0, 10.0, 11.0, 12.0, 13.0]]);
    }

    #[test]
    fn test_average_beat() {
        let avg = average_beat(&[vec![1.0, 2.0], vec![3.0, 6.0]]);
        assert_eq!(avg, vec![2.0, 4.0]);
        assert!(average_beat(&[]).is_empty());
    }
}
