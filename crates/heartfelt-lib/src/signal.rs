use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }

    /// Build a series with every NaN sample replaced by zero.
    pub fn sanitized(fs: f64, data: &[f64]) -> Self {
        Self {
            fs,
            data: sanitize(data),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Peak and trough sample indices of one signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakIndexSet {
    pub peaks: Vec<usize>,
    pub troughs: Vec<usize>,
}

impl PeakIndexSet {
    pub fn new(peaks: Vec<usize>, troughs: Vec<usize>) -> Self {
        Self { peaks, troughs }
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty() && self.troughs.is_empty()
    }

    /// True when every peak is followed by a trough and vice versa.
    pub fn alternates(&self) -> bool {
        let mut merged: Vec<(usize, bool)> = self
            .peaks
            .iter()
            .map(|&p| (p, true))
            .chain(self.troughs.iter().map(|&t| (t, false)))
            .collect();
        merged.sort_unstable();
        merged
            .windows(2)
            .all(|w| w[0].0 != w[1].0 && w[0].1 != w[1].1)
    }
}

/// Replace NaN samples with zero.
pub fn sanitize(data: &[f64]) -> Vec<f64> {
    data.iter()
        .map(|&x| if x.is_nan() { 0.0 } else { x })
        .collect()
}

/// Discrete gradient: central differences inside, one-sided differences at the edges.
pub fn gradient(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let mut out = vec![0.0; n];
    out[0] = data[1] - data[0];
    out[n - 1] = data[n - 1] - data[n - 2];
    for i in 1..n - 1 {
        out[i] = (data[i + 1] - data[i - 1]) / 2.0;
    }
    out
}

/// First (VPG) and second (APG) derivative of a PPG window.
pub fn ppg_derivatives(ppg: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let vpg = gradient(ppg);
    let apg = gradient(&vpg);
    (vpg, apg)
}

pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

pub(crate) fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_nan() {
        let ts = TimeSeries::sanitized(125.0, &[1.0, f64::NAN, 3.0]);
        assert_eq!(ts.data, vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn gradient_matches_central_differences() {
        let g = gradient(&[1.0, 2.0, 4.0, 7.0, 11.0]);
        assert_eq!(g, vec![1.0, 1.5, 2.5, 3.5, 4.0]);
    }

    #[test]
    fn gradient_of_short_input_is_zero() {
        assert_eq!(gradient(&[3.0]), vec![0.0]);
        assert!(gradient(&[]).is_empty());
    }

    #[test]
    fn alternation_check() {
        assert!(PeakIndexSet::new(vec![2, 8], vec![5, 11]).alternates());
        assert!(!PeakIndexSet::new(vec![2, 4], vec![5, 11]).alternates());
        assert!(!PeakIndexSet::new(vec![5], vec![5]).alternates());
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }
}
