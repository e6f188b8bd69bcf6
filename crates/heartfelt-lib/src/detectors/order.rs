use crate::signal::PeakIndexSet;

/// Remove out-of-order peaks and troughs so the two sequences strictly alternate.
///
/// Whichever sequence starts earlier leads. A leading element is kept together
/// with the current trailing element only when the trailing one falls between
/// it and the next leading element; the last leading element is kept with the
/// trailing element after it.
pub fn repair_order(idx: &PeakIndexSet) -> PeakIndexSet {
    let (peaks, troughs) = (&idx.peaks, &idx.troughs);
    if peaks.is_empty() || troughs.is_empty() {
        return PeakIndexSet::default();
    }

    let peaks_lead = peaks[0] < troughs[0];
    let (first, second) = if peaks_lead {
        (peaks, troughs)
    } else {
        (troughs, peaks)
    };

    let mut kept_first = Vec::new();
    let mut kept_second = Vec::new();
    let (mut i, mut j) = (0, 0);
    for _ in 0..first.len() {
        let (Some(&lead), Some(&trail)) = (first.get(i), second.get(j)) else {
            break;
        };
        if lead < trail {
            match first.get(i + 1) {
                Some(&next) if trail < next => {
                    kept_first.push(lead);
                    kept_second.push(trail);
                    i += 1;
                    j += 1;
                }
                Some(_) => i += 1,
                None => {
                    kept_first.push(lead);
                    kept_second.push(trail);
                    break;
                }
            }
        } else {
            j += 1;
        }
    }

    kept_first.sort_unstable();
    kept_first.dedup();
    kept_second.sort_unstable();
    kept_second.dedup();

    if peaks_lead {
        PeakIndexSet::new(kept_first, kept_second)
    } else {
        PeakIndexSet::new(kept_second, kept_first)
    }
}
