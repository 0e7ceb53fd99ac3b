pub mod config;
pub mod dataset;
pub mod evaluate;
pub mod preprocess;
pub mod quality;
pub mod report;
pub mod signal;

/// Recording file expected in every session directory
pub const ECG_FILE_NAME: &str = "ECG.csv";

/// Report file written next to (or mirroring) each session
pub const METRICS_FILE_NAME: &str = "metrics.json";

/// Application name for XDG paths
pub const APP_NAME: &str = "ecg-quality";
