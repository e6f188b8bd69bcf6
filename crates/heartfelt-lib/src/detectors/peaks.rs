use crate::signal::{mean, PeakIndexSet};
use serde::{Deserialize, Serialize};

/// Samples repeated at each edge before detection.
pub const EDGE_PAD: usize = 19;

/// Rolling-threshold detector settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakDetectorConfig {
    /// Rolling mean window (seconds).
    pub windowsize: f64,
    /// Percentage the rolling mean is raised by before comparing samples against it.
    pub ma_perc: f64,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            windowsize: 1.0,
            ma_perc: 20.0,
        }
    }
}

/// Detect peaks: the maximum of every run of samples lying above the raised rolling mean.
pub fn detect_peaks(signal: &[f64], fs: f64, cfg: &PeakDetectorConfig) -> Vec<usize> {
    if signal.is_empty() {
        return Vec::new();
    }
    let padded = pad_edges(signal, EDGE_PAD);
    let window = ((cfg.windowsize * fs) as usize).clamp(1, padded.len());
    let scale = 1.0 + cfg.ma_perc / 100.0;
    let threshold: Vec<f64> = rolling_mean(&padded, window)
        .into_iter()
        .map(|m| m * scale)
        .collect();

    let offset = (EDGE_PAD + 1) as isize;
    run_maxima(&padded, &threshold)
        .into_iter()
        .map(|idx| idx as isize - offset)
        .filter(|&idx| idx >= 0 && (idx as usize) < signal.len())
        .map(|idx| idx as usize)
        .collect()
}

/// Detect troughs by running the peak detector on the flipped signal.
pub fn detect_troughs(signal: &[f64], fs: f64, cfg: &PeakDetectorConfig) -> Vec<usize> {
    detect_peaks(&flip(signal), fs, cfg)
}

pub fn detect_peaks_and_troughs(signal: &[f64], fs: f64, cfg: &PeakDetectorConfig) -> PeakIndexSet {
    PeakIndexSet::new(
        detect_peaks(signal, fs, cfg),
        detect_troughs(signal, fs, cfg),
    )
}

/// Mirror a signal about its maximum so troughs become peaks.
pub fn flip(signal: &[f64]) -> Vec<f64> {
    let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    signal.iter().map(|x| max - x).collect()
}

fn pad_edges(signal: &[f64], width: usize) -> Vec<f64> {
    let (first, last) = match (signal.first(), signal.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Vec::new(),
    };
    let mut out = Vec::with_capacity(signal.len() + 2 * width);
    out.extend(std::iter::repeat(first).take(width));
    out.extend_from_slice(signal);
    out.extend(std::iter::repeat(last).take(width));
    out
}

/// Centred moving average; positions the full window cannot cover take the global mean.
pub(crate) fn rolling_mean(data: &[f64], win: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let win = win.clamp(1, data.len());
    let fill = mean(data);
    let lead = (win - 1) / 2;
    let mut out = vec![fill; data.len()];
    let mut acc: f64 = data[..win].iter().sum();
    out[lead] = acc / win as f64;
    for i in win..data.len() {
        acc += data[i] - data[i - win];
        out[lead + i + 1 - win] = acc / win as f64;
    }
    out
}

/// Index of the first maximum of each contiguous run where `data > threshold`.
fn run_maxima(data: &[f64], threshold: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut best: Option<usize> = None;
    for (i, (&x, &t)) in data.iter().zip(threshold).enumerate() {
        if x > t {
            best = match best {
                Some(b) if data[b] >= x => Some(b),
                _ => Some(i),
            };
        } else if let Some(b) = best.take() {
            peaks.push(b);
        }
    }
    if let Some(b) = best {
        peaks.push(b);
    }
    peaks
}
