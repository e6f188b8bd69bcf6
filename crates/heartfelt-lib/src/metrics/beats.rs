use crate::detectors::peaks::{detect_peaks_and_troughs, PeakDetectorConfig};
use crate::signal::PeakIndexSet;
use serde::{Deserialize, Serialize};

/// Outcome of beat-to-beat similarity scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimilarityScore {
    /// Normalised sum of pairwise correlations, within `[-1, 1]`.
    Score(f64),
    /// Fewer than two peaks or troughs, or a peak coinciding with a trough.
    Insufficient,
    /// Peaks and troughs do not alternate.
    OutOfOrder,
    /// Every segmented beat was too short to score.
    NoBeats,
}

impl SimilarityScore {
    /// Numeric form; failures map to -1, -2 and -3.
    ///
    /// A score clamped to exactly -1 reads the same as `Insufficient` here;
    /// match on the enum when the two must be told apart.
    pub fn value(&self) -> f64 {
        match self {
            SimilarityScore::Score(s) => *s,
            SimilarityScore::Insufficient => -1.0,
            SimilarityScore::OutOfOrder => -2.0,
            SimilarityScore::NoBeats => -3.0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, SimilarityScore::Score(_))
    }
}

/// Detect peaks and troughs on `signal`, then score how alike its beats are.
pub fn beat_similarity(signal: &[f64], fs: f64, cfg: &PeakDetectorConfig) -> SimilarityScore {
    let idx = detect_peaks_and_troughs(signal, fs, cfg);
    score_beats(signal, &idx, fs)
}

/// Score beat similarity from already detected peaks and troughs.
pub fn score_beats(signal: &[f64], idx: &PeakIndexSet, fs: f64) -> SimilarityScore {
    let (peaks, troughs) = (&idx.peaks, &idx.troughs);
    if peaks.len() < 2 || troughs.len() < 2 || peaks.iter().any(|p| troughs.contains(p)) {
        log::debug!(
            "beat similarity: {} peaks / {} troughs, cannot segment",
            peaks.len(),
            troughs.len()
        );
        return SimilarityScore::Insufficient;
    }
    if !troughs_interleave(peaks, troughs) {
        return SimilarityScore::OutOfOrder;
    }

    let beats: Vec<Vec<f64>> = aligned_beats(signal, peaks, troughs)
        .into_iter()
        .filter(|b| b.iter().filter(|&&x| x != 0.0).count() as f64 >= fs / 2.0)
        .collect();
    if beats.is_empty() {
        return SimilarityScore::NoBeats;
    }

    let mut total = 0.0;
    for i in 0..beats.len() {
        for j in (i + 1)..beats.len() {
            total += pearson(&beats[i], &beats[j]);
        }
    }
    // Pair sum over beat count, clamped to [-1, 1].
    let score = total / beats.len() as f64;
    if !score.is_finite() {
        return SimilarityScore::NoBeats;
    }
    SimilarityScore::Score(score.clamp(-1.0, 1.0))
}

/// Consecutive troughs must enclose exactly one peak.
fn troughs_interleave(peaks: &[usize], troughs: &[usize]) -> bool {
    let bins: Vec<usize> = troughs
        .iter()
        .map(|&t| peaks.partition_point(|&p| p <= t))
        .collect();
    bins.windows(2).all(|w| w[1] == w[0] + 1)
}

/// Split the signal into beats at trough boundaries and left-pad every beat with
/// zeros to the length of the longest one. Longest beats come first.
pub fn aligned_beats(signal: &[f64], peaks: &[usize], troughs: &[usize]) -> Vec<Vec<f64>> {
    let cuts: &[usize] = if peaks.len() <= troughs.len() {
        troughs
    } else {
        &troughs[1..]
    };

    let mut beats = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts {
        let cut = cut.min(signal.len());
        beats.push(&signal[start.min(cut)..cut]);
        start = cut;
    }
    beats.push(&signal[start.min(signal.len())..]);
    // Stable sort keeps segment order among equal lengths.
    beats.sort_by(|a, b| b.len().cmp(&a.len()));

    let longest = beats.first().map_or(0, |b| b.len());
    beats
        .into_iter()
        .map(|b| {
            let mut padded = vec![0.0; longest - b.len()];
            padded.extend_from_slice(b);
            padded
        })
        .collect()
}

/// Pearson correlation; the shorter input is zero-padded at the end.
/// Zero when either input has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().max(y.len());
    if n == 0 {
        return 0.0;
    }
    let at = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);
    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = at(x, i) - mx;
        let dy = at(y, i) - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return 0.0;
    }
    cov / (vx * vy).sqrt()
}
