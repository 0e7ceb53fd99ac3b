pub mod store;
pub mod summary;

use crate::quality::{Registry, ScoreValue, Scored};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scores of one session: family → method → value.
///
/// Ordered maps keep serialization byte-stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityReport {
    families: BTreeMap<String, BTreeMap<String, ScoreValue>>,
}

impl QualityReport {
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn get(&self, family: &str, method: &str) -> Option<&ScoreValue> {
        self.families.get(family)?.get(method)
    }

    pub fn families(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, ScoreValue>)> {
        self.families.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All (family, method, value) entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &ScoreValue)> {
        self.families.iter().flat_map(|(f, methods)| {
            methods
                .iter()
                .map(move |(m, v)| (f.as_str(), m.as_str(), v))
        })
    }

    pub fn missing_count(&self) -> usize {
        self.entries().filter(|(_, _, v)| v.is_missing()).count()
    }
}

/// On-disk shape of `metrics.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub ecg_signal_quality: QualityReport,
}

/// Assembles a report so that every registered method has an entry.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: QualityReport,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with every method of every registered family marked Missing.
    pub fn for_registry(registry: &Registry) -> Self {
        let mut builder = Self::new();
        for family in registry.families() {
            for method in family.method_names() {
                builder.record(&family.name, method, ScoreValue::Missing);
            }
        }
        builder
    }

    pub fn record(&mut self, family: &str, method: &str, value: ScoreValue) -> &mut Self {
        self.report
            .families
            .entry(family.to_string())
            .or_default()
            .insert(method.to_string(), value);
        self
    }

    pub fn extend(&mut self, scored: impl IntoIterator<Item = Scored>) -> &mut Self {
        for s in scored {
            self.record(&s.family, s.method, s.value);
        }
        self
    }

    pub fn build(self) -> QualityReport {
        self.report
    }
}
