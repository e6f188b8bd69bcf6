use crate::signal::{mean, median};
use serde::{Deserialize, Serialize};

/// A contiguous stretch of equal mask values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub value: bool,
    pub start: usize,
    pub len: usize,
}

impl Run {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Signal with everything outside its longest clean stretch replaced by the median.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quarantine {
    pub signal: Vec<f64>,
    /// Retained run, half-open `[start, end)`. Empty when no sample was clean.
    pub start: usize,
    pub end: usize,
}

impl Quarantine {
    pub fn retained(&self) -> usize {
        self.end - self.start
    }
}

/// Run-length encode a boolean mask.
pub fn run_lengths(mask: &[bool]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (i, &value) in mask.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.value == value => run.len += 1,
            _ => runs.push(Run {
                value,
                start: i,
                len: 1,
            }),
        }
    }
    runs
}

/// Longest run of `true`; the earliest one wins a tie.
pub fn longest_true_run(mask: &[bool]) -> Option<Run> {
    run_lengths(mask)
        .into_iter()
        .filter(|r| r.value)
        .fold(None, |best: Option<Run>, r| match best {
            Some(b) if b.len >= r.len => Some(b),
            _ => Some(r),
        })
}

/// Keep the longest stretch of samples within `amp_thresh` of the median and
/// overwrite the rest with the median.
pub fn quarantine_signal(signal: &[f64], amp_thresh: f64) -> Quarantine {
    let center = median(signal);
    let good: Vec<bool> = signal
        .iter()
        .map(|x| (x - center).abs() <= amp_thresh)
        .collect();

    let (start, end) = match longest_true_run(&good) {
        Some(run) => (run.start, run.end()),
        None => (0, 0),
    };
    if end - start < signal.len() {
        log::debug!(
            "quarantined {} of {} samples outside [{start}, {end})",
            signal.len() - (end - start),
            signal.len()
        );
    }

    let cleaned = signal
        .iter()
        .enumerate()
        .map(|(i, &x)| if (start..end).contains(&i) { x } else { center })
        .collect();
    Quarantine {
        signal: cleaned,
        start,
        end,
    }
}

/// Drop peak (or trough) indices with outlying amplitude, then keep the first
/// regularly spaced cluster.
///
/// Indices whose amplitude lies further than `amp_thresh` from the mean
/// amplitude go first. The survivors are then scanned left to right: an index
/// is accepted while the gap to its predecessor stays within
/// `mean_gap + dist_thresh` (the very first accepted index only needs a
/// regular gap to its successor). The first irregular gap after something has
/// been accepted ends the scan, so a second clean cluster further right is
/// discarded.
pub fn remove_peak_outliers(
    signal: &[f64],
    indices: &[usize],
    amp_thresh: f64,
    dist_thresh: f64,
) -> Vec<usize> {
    let mut in_range: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| i < signal.len())
        .collect();
    in_range.sort_unstable();
    in_range.dedup();
    if in_range.is_empty() {
        return in_range;
    }

    let amplitudes: Vec<f64> = in_range.iter().map(|&i| signal[i]).collect();
    let center = mean(&amplitudes);
    let kept: Vec<usize> = in_range
        .iter()
        .zip(&amplitudes)
        .filter(|&(_, &a)| (a - center).abs() <= amp_thresh)
        .map(|(&i, _)| i)
        .collect();
    if kept.len() < 2 {
        return kept;
    }

    let gaps: Vec<f64> = kept.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let limit = mean(&gaps) + dist_thresh;
    let regular = |gap: Option<&f64>| gap.map_or(false, |&g| g <= limit);

    let mut accepted = Vec::with_capacity(kept.len());
    for (k, &idx) in kept.iter().enumerate() {
        let left = if k > 0 { gaps.get(k - 1) } else { None };
        let right = gaps.get(k);
        if regular(left) || (accepted.is_empty() && regular(right)) {
            accepted.push(idx);
        } else if !accepted.is_empty() {
            break;
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_run_prefers_longer_later_run() {
        let mask = [true, true, false, false, true, true, true, false];
        let run = longest_true_run(&mask).unwrap();
        assert_eq!((run.start, run.len), (4, 3));
    }

    #[test]
    fn longest_run_tie_goes_to_first() {
        let mask = [true, true, false, true, true];
        assert_eq!(longest_true_run(&mask).unwrap().start, 0);
        assert!(longest_true_run(&[false, false]).is_none());
    }

    #[test]
    fn run_lengths_encodes_mask() {
        let runs = run_lengths(&[true, false, false, true]);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1], Run { value: false, start: 1, len: 2 });
    }

    #[test]
    fn quarantine_replaces_outside_longest_run() {
        let signal = [0.0, 50.0, 1.0, 2.0, 1.0, 0.0, -40.0, 1.0];
        let q = quarantine_signal(&signal, 5.0);
        assert_eq!((q.start, q.end), (2, 6));
        let center = median(&signal);
        assert_eq!(q.signal[0], center);
        assert_eq!(q.signal[1], center);
        assert_eq!(&q.signal[2..6], &signal[2..6]);
        assert_eq!(q.signal[7], center);
        assert_eq!(q.retained(), 4);
    }

    #[test]
    fn peak_amplitude_outliers_are_dropped() {
        let mut signal = vec![0.0; 60];
        for i in [5, 15, 25, 35, 45] {
            signal[i] = 1.0;
        }
        signal[25] = 9.0;
        let kept = remove_peak_outliers(&signal, &[5, 15, 25, 35, 45], 2.0, 10.0);
        assert_eq!(kept, vec![5, 15, 35, 45]);
    }

    #[test]
    fn scan_stops_at_first_irregular_gap() {
        let signal = vec![1.0; 200];
        // Two regular clusters separated by a long gap.
        let idx = [10, 20, 30, 40, 140, 150, 160];
        let kept = remove_peak_outliers(&signal, &idx, 1.0, 5.0);
        assert_eq!(kept, vec![10, 20, 30, 40]);
    }

    #[test]
    fn leading_stray_index_is_skipped() {
        let signal = vec![1.0; 200];
        let idx = [2, 100, 110, 120, 130, 140];
        let kept = remove_peak_outliers(&signal, &idx, 1.0, 0.0);
        assert_eq!(kept, vec![100, 110, 120, 130, 140]);
    }

    #[test]
    fn empty_indices_stay_empty() {
        assert!(remove_peak_outliers(&[1.0, 2.0], &[], 1.0, 1.0).is_empty());
    }
}
