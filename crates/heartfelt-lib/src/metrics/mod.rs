pub mod beats;
pub mod cardiac;
pub mod sqi;

pub use beats::{beat_similarity, SimilarityScore};
pub use cardiac::{estimate_spo2, pulse_rate, CardiacMetrics, SpO2Calibration, SpO2Estimate};
pub use sqi::{evaluate_window, estimate_snr, has_flat_line, QualityVerdict, SnrEstimate};
