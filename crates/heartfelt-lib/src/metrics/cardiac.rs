use crate::signal::PeakIndexSet;
use serde::{Deserialize, Serialize};

pub const PULSE_RATE_SENTINEL: i64 = -1;

/// Calibration curve mapping the ratio-of-ratios to SpO2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpO2Calibration {
    /// `104 - 17 R`
    #[default]
    Linear,
    /// `1.596 R^2 - 34.670 R + 112.690`
    Quadratic,
}

impl SpO2Calibration {
    pub fn apply(&self, r: f64) -> f64 {
        match self {
            SpO2Calibration::Linear => 104.0 - 17.0 * r,
            SpO2Calibration::Quadratic => 1.596 * r * r - 34.670 * r + 112.690,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpO2Estimate {
    pub spo2_pct: f64,
    pub r_ratio: f64,
}

impl SpO2Estimate {
    pub const SENTINEL: SpO2Estimate = SpO2Estimate {
        spo2_pct: -1.0,
        r_ratio: -1.0,
    };

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardiacMetrics {
    pub pulse_rate_bpm: i64,
    pub spo2_pct: f64,
    pub r_ratio: f64,
}

impl CardiacMetrics {
    pub fn new(pulse_rate_bpm: i64, spo2: SpO2Estimate) -> Self {
        Self {
            pulse_rate_bpm,
            spo2_pct: spo2.spo2_pct,
            r_ratio: spo2.r_ratio,
        }
    }
}

/// Beats per minute from the mean peak spacing; -1 with fewer than two peaks.
pub fn pulse_rate(peaks: &[usize], fs: f64) -> i64 {
    if peaks.len() < 2 {
        return PULSE_RATE_SENTINEL;
    }
    let gaps: Vec<f64> = peaks
        .windows(2)
        .map(|w| w[1] as f64 - w[0] as f64)
        .collect();
    let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean_gap <= 0.0 {
        return PULSE_RATE_SENTINEL;
    }
    (fs / mean_gap * 60.0).round() as i64
}

/// AC over DC of one channel at the representative cycle.
fn perfusion_ratio(signal: &[f64], idx: &PeakIndexSet, cycle: usize) -> Option<f64> {
    let peak = *signal.get(*idx.peaks.get(cycle)?)?;
    let trough = *signal.get(*idx.troughs.get(cycle)?)?;
    let ac = peak - trough;
    let dc = trough;
    if dc == 0.0 {
        return None;
    }
    Some(ac / dc)
}

/// Ratio-of-ratios SpO2 from paired red and infrared channels.
///
/// The representative cycle is the midpoint of the shortest of the four index
/// lists. Empty lists, indices outside the signals or a zero denominator give
/// the `(-1, -1)` sentinel.
pub fn estimate_spo2(
    red: &[f64],
    red_idx: &PeakIndexSet,
    ir: &[f64],
    ir_idx: &PeakIndexSet,
    calibration: SpO2Calibration,
) -> SpO2Estimate {
    let shortest = [
        red_idx.peaks.len(),
        red_idx.troughs.len(),
        ir_idx.peaks.len(),
        ir_idx.troughs.len(),
    ]
    .into_iter()
    .min()
    .unwrap_or(0);
    if shortest == 0 {
        return SpO2Estimate::SENTINEL;
    }
    let cycle = shortest / 2;

    let ratios = perfusion_ratio(red, red_idx, cycle).zip(perfusion_ratio(ir, ir_idx, cycle));
    match ratios {
        Some((red_ratio, ir_ratio)) if ir_ratio != 0.0 => {
            let r = red_ratio / ir_ratio;
            SpO2Estimate {
                spo2_pct: calibration.apply(r),
                r_ratio: r,
            }
        }
        _ => {
            log::warn!("SpO2 undefined at cycle {cycle}");
            SpO2Estimate::SENTINEL
        }
    }
}
