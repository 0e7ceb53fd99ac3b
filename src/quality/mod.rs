pub mod biosppy;
pub mod labels;
pub mod neurokit;
pub mod peaks;
pub mod snr;
pub mod sqi;

use crate::preprocess::CleanVariant;
use crate::preprocess::filter::FilterError;
use labels::LabelMapping;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// A single method's score after reduction.
///
/// Serializes as a JSON number, string or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Numeric(f64),
    Label(String),
    Missing,
}

impl ScoreValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// What a scoring method hands back before reduction to a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutput {
    /// Per-beat, per-segment or scalar numeric quality.
    Numeric(Vec<f64>),
    /// Per-segment categorical labels.
    Labels(Vec<String>),
}

impl MethodOutput {
    pub fn scalar(v: f64) -> Self {
        Self::Numeric(vec![v])
    }

    pub fn label(l: &str) -> Self {
        Self::Labels(vec![l.to_string()])
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MethodFault {
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("only {found} complete beats detected")]
    InsufficientBeats { found: usize },
    #[error("degenerate input: {0}")]
    Degenerate(String),
    #[error("non-finite result")]
    NonFinite,
    #[error("cleaned signal unavailable: {0}")]
    VariantUnavailable(FilterError),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// A named signal-quality algorithm. Implementations must be pure functions of
/// their input so they can run on any worker thread.
pub trait QualityMethod: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every categorical label this method can emit.
    fn labels(&self) -> &'static [&'static str] {
        &[]
    }

    fn compute(&self, signal: &[f64], fs: f64) -> Result<MethodOutput, MethodFault>;
}

/// Methods that share one cleaned variant of the waveform.
pub struct Family {
    pub name: String,
    pub variant: CleanVariant,
    pub methods: Vec<Box<dyn QualityMethod>>,
}

impl Family {
    pub fn new(name: impl Into<String>, variant: CleanVariant) -> Self {
        Self {
            name: name.into(),
            variant,
            methods: Vec::new(),
        }
    }

    pub fn with(mut self, method: impl QualityMethod + 'static) -> Self {
        self.methods.push(Box::new(method));
        self
    }

    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.iter().map(|m| m.name())
    }
}

/// The active scoring configuration.
#[derive(Default)]
pub struct Registry {
    families: Vec<Family>,
}

impl Registry {
    pub fn new(families: Vec<Family>) -> Self {
        Self { families }
    }

    /// NeuroKit-style morphology indices, BioSPPy-style spectral indices and the band-pass SNR.
    pub fn standard(snr: &snr::SnrConfig) -> Self {
        Self::new(vec![
            Family::new(neurokit::FAMILY, CleanVariant::General)
                .with(neurokit::Zhao2018)
                .with(neurokit::AverageQrs)
                .with(neurokit::TemplateMatch),
            Family::new(biosppy::FAMILY, CleanVariant::Qrs)
                .with(biosppy::Level3)
                .with(biosppy::PSqi)
                .with(biosppy::KSqi)
                .with(biosppy::FSqi),
            Family::new(snr::FAMILY, CleanVariant::Raw).with(snr::CustomSnr::from(snr)),
        ])
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn variants(&self) -> BTreeSet<CleanVariant> {
        self.families.iter().map(|f| f.variant).collect()
    }

    pub fn method_count(&self) -> usize {
        self.families.iter().map(|f| f.methods.len()).sum()
    }
}

/// One (family, method, value) triple produced for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub family: String,
    pub method: &'static str,
    pub value: ScoreValue,
}

/// Run a method, turning both errors and panics into a `MethodFault`.
pub fn run_method(
    method: &dyn QualityMethod,
    signal: &[f64],
    fs: f64,
) -> Result<MethodOutput, MethodFault> {
    match catch_unwind(AssertUnwindSafe(|| method.compute(signal, fs))) {
        Ok(result) => result,
        Err(payload) => Err(MethodFault::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Score every registered method against its family's cleaned variant.
///
/// Never fails: faults are logged against `ctx` and recorded as Missing.
pub fn score_all(
    registry: &Registry,
    cleaned: &BTreeMap<CleanVariant, Result<Vec<f64>, FilterError>>,
    fs: f64,
    mapping: &LabelMapping,
    ctx: &dyn Display,
) -> Vec<Scored> {
    let mut scored = Vec::with_capacity(registry.method_count());

    for family in registry.families() {
        let signal = match cleaned.get(&family.variant) {
            Some(Ok(s)) => Ok(s.as_slice()),
            Some(Err(e)) => Err(MethodFault::VariantUnavailable(e.clone())),
            None => Err(MethodFault::Degenerate(format!(
                "variant '{}' was not prepared",
                family.variant.label()
            ))),
        };
        if let Err(fault) = &signal {
            log::warn!("[{}] {}: {}", ctx, family.name, fault);
        }

        for method in &family.methods {
            let value = match signal {
                Ok(s) => match run_method(method.as_ref(), s, fs) {
                    Ok(output) => mapping.aggregate(output),
                    Err(fault) => {
                        log::error!("[{}] {}/{}: {}", ctx, family.name, method.name(), fault);
                        ScoreValue::Missing
                    }
                },
                Err(_) => ScoreValue::Missing,
            };
            scored.push(Scored {
                family: family.name.clone(),
                method: method.name(),
                value,
            });
        }
    }

    scored
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::preprocess::clean_all;
    use std::f64::consts::PI;

    /// Synthetic ECG: Gaussian R waves and T waves at `bpm`, slow baseline wander
    /// and a little high-frequency ripple.
    pub fn synthetic_ecg(n: usize, fs: f64, bpm: f64) -> Vec<f64> {
        let period = 60.0 / bpm;
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let phase = (t % period) - period / 2.0;
                let r = (-(phase * phase) / (2.0 * 0.015 * 0.015)).exp();
                let tp = phase - 0.25;
                let tw = 0.3 * (-(tp * tp) / (2.0 * 0.04 * 0.04)).exp();
                let wander = 0.2 * (2.0 * PI * 0.2 * t).sin();
                let ripple = 0.02 * (2.0 * PI * 55.0 * t).sin();
                r + tw + wander + ripple
            })
            .collect()
    }

    struct Constant(f64);

    impl QualityMethod for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }
        fn compute(&self, _: &[f64], _: f64) -> Result<MethodOutput, MethodFault> {
            Ok(MethodOutput::scalar(self.0))
        }
    }

    struct Failing;

    impl QualityMethod for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn compute(&self, _: &[f64], _: f64) -> Result<MethodOutput, MethodFault> {
            Err(MethodFault::Degenerate("injected".into()))
        }
    }

    struct Panicking;

    impl QualityMethod for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn compute(&self, _: &[f64], _: f64) -> Result<MethodOutput, MethodFault> {
            panic!("injected panic")
        }
    }

    fn ctx() -> String {
        "test".to_string()
    }

    #[test]
    fn test_score_value_json() {
        let values = vec![
            ScoreValue::Numeric(0.5),
            ScoreValue::Label("Good".into()),
            ScoreValue::Missing,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[0.5,"Good",null]"#);
        let back: Vec<ScoreValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_run_method_catches_panic() {
        let fault = run_method(&Panicking, &[1.0], 130.0).unwrap_err();
        assert_eq!(fault, MethodFault::Panicked("injected panic".into()));
    }

    #[test]
    fn test_faults_are_isolated_per_method() {
        let registry = Registry::new(vec![
            Family::new("F", CleanVariant::Raw)
                .with(Constant(0.25))
                .with(Failing)
                .with(Panicking)
                .with(Constant(0.75)),
        ]);
        let cleaned = clean_all(&[1.0, 2.0], 130.0, registry.variants());
        let scored = score_all(&registry, &cleaned, 130.0, &LabelMapping::default(), &ctx());

        let values: Vec<_> = scored.iter().map(|s| s.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                ScoreValue::Numeric(0.25),
                ScoreValue::Missing,
                ScoreValue::Missing,
                ScoreValue::Numeric(0.75),
            ]
        );
    }

    #[test]
    fn test_failed_variant_marks_only_its_family_missing() {
        let registry = Registry::new(vec![
            Family::new("Filtered", CleanVariant::Qrs).with(Constant(1.0)),
            Family::new("Raw", CleanVariant::Raw).with(Constant(1.0)),
        ]);
        // Too short for the band-pass padding.
        let cleaned = clean_all(&[1.0; 10], 130.0, registry.variants());
        let scored = score_all(&registry, &cleaned, 130.0, &LabelMapping::default(), &ctx());

        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].family, "Filtered");
        assert!(scored[0].value.is_missing());
        assert_eq!(scored[1].value, ScoreValue::Numeric(1.0));
    }

    #[test]
    fn test_standard_registry_layout() {
        let registry = Registry::standard(&snr::SnrConfig::default());
        let names: Vec<(&str, Vec<&str>)> = registry
            .families()
            .iter()
            .map(|f| (f.name.as_str(), f.method_names().collect()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("NeuroKit", vec!["zhao2018", "averageQRS", "templatematch"]),
                ("BioSPPy", vec!["Level3", "pSQI", "kSQI", "fSQI"]),
                ("SNR", vec!["CustomSNR"]),
            ]
        );
        assert_eq!(registry.method_count(), 8);
    }

    #[test]
    fn test_standard_registry_on_synthetic_ecg() {
        let fs = 130.0;
        let signal = synthetic_ecg(3000, fs, 72.0);
        let registry = Registry::standard(&snr::SnrConfig::default());
        let cleaned = clean_all(&signal, fs, registry.variants());
        let scored = score_all(&registry, &cleaned, fs, &LabelMapping::default(), &ctx());

        assert_eq!(scored.len(), 8);
        for s in &scored {
            let v = s.value.as_f64();
            assert!(
                v.is_some_and(f64::is_finite),
                "{}/{} = {:?}",
                s.family,
                s.method,
                s.value
            );
        }
    }
}
