pub mod order;
pub mod outliers;
pub mod peaks;

pub use order::repair_order;
pub use outliers::{quarantine_signal, remove_peak_outliers, Quarantine};
pub use peaks::{detect_peaks, detect_peaks_and_troughs, detect_troughs, PeakDetectorConfig};
