//! Aggregate view over reports already written for a dataset.

use super::QualityReport;
use super::store::ReportStore;
use crate::dataset::DatasetWalker;
use std::collections::BTreeMap;

/// Running statistics for one (family, method) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodStats {
    pub count: usize,
    pub sum: f64,
    pub missing: usize,
}

impl MethodStats {
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

#[derive(Debug, Default)]
pub struct DatasetSummary {
    pub sessions: usize,
    pub reports: usize,
    pub unreadable: usize,
    pub methods: BTreeMap<(String, String), MethodStats>,
}

impl DatasetSummary {
    pub fn add(&mut self, report: &QualityReport) {
        self.reports += 1;
        for (family, method, value) in report.entries() {
            let stats = self
                .methods
                .entry((family.to_string(), method.to_string()))
                .or_default();
            match value.as_f64() {
                Some(v) => {
                    stats.count += 1;
                    stats.sum += v;
                }
                None => stats.missing += 1,
            }
        }
    }
}

/// Load every report under the store for the sessions the walker finds.
pub fn summarize(walker: &DatasetWalker, store: &ReportStore) -> DatasetSummary {
    let mut summary = DatasetSummary::default();
    for session in walker.sessions() {
        summary.sessions += 1;
        match store.load(&session) {
            Ok(Some(report)) => summary.add(&report),
            Ok(None) => {}
            Err(e) => {
                log::warn!("[{}] Unreadable report: {}", session, e);
                summary.unreadable += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SessionDescriptor;
    use crate::quality::ScoreValue;
    use crate::report::ReportBuilder;
    use std::fs;

    #[test]
    fn test_mean_and_missing() {
        let mut summary = DatasetSummary::default();
        let mut a = ReportBuilder::new();
        a.record("SNR", "CustomSNR", ScoreValue::Numeric(10.0));
        let mut b = ReportBuilder::new();
        b.record("SNR", "CustomSNR", ScoreValue::Numeric(20.0));
        let mut c = ReportBuilder::new();
        c.record("SNR", "CustomSNR", ScoreValue::Missing);
        summary.add(&a.build());
        summary.add(&b.build());
        summary.add(&c.build());

        let stats = &summary.methods[&("SNR".to_string(), "CustomSNR".to_string())];
        assert_eq!(stats.count, 2);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.mean(), Some(15.0));
        assert_eq!(summary.reports, 3);
    }

    #[test]
    fn test_all_missing_has_no_mean() {
        assert_eq!(MethodStats::default().mean(), None);
    }

    #[test]
    fn test_summarize_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for rel in ["it/a/s1", "it/a/s2", "it/b/s1"] {
            fs::create_dir_all(root.join(rel)).unwrap();
        }
        let store = ReportStore::new(root);

        let s1 = SessionDescriptor::from_path(root, &root.join("it/a/s1")).unwrap();
        let mut b = ReportBuilder::new();
        b.record("BioSPPy", "fSQI", ScoreValue::Numeric(0.5));
        store.persist(&s1, &b.build()).unwrap();

        // A truncated report is counted, not fatal.
        fs::write(root.join("it/b/s1/metrics.json"), "{\"ecg_signal_").unwrap();

        let summary = summarize(&DatasetWalker::new(root), &store);
        assert_eq!(summary.sessions, 3);
        assert_eq!(summary.reports, 1);
        assert_eq!(summary.unreadable, 1);
        assert_eq!(summary.methods.len(), 1);
    }
}
