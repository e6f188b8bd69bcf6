use crate::config::{FrameConfig, ValidationConfig};
use crate::detectors::{
    detect_peaks_and_troughs, quarantine_signal, remove_peak_outliers, repair_order,
    PeakDetectorConfig,
};
use crate::error::Result;
use crate::filters::bandpass;
use crate::metrics::cardiac::{estimate_spo2, pulse_rate, CardiacMetrics, SpO2Estimate};
use crate::metrics::sqi::{evaluate_window, QualityVerdict};
use crate::scaler::{Channel, Scaler};
use crate::signal::{mean, ppg_derivatives, sanitize, PeakIndexSet, TimeSeries};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Valid,
    Invalid,
}

/// Min-max normalised model inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledChannels {
    pub ppg: Vec<f64>,
    pub vpg: Vec<f64>,
    pub apg: Vec<f64>,
}

/// Everything produced while validating one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    pub status: WindowStatus,
    pub fs: f64,
    /// Bandpassed PPG.
    pub ppg: Vec<f64>,
    pub vpg: Vec<f64>,
    pub apg: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaled: Option<ScaledChannels>,
    /// Heart rate estimate from the fundamental frequency (bpm).
    pub hr: f64,
    pub snr: f64,
    pub beat_sim: f64,
    pub verdict: QualityVerdict,
}

impl WindowReport {
    pub fn is_valid(&self) -> bool {
        self.status == WindowStatus::Valid
    }
}

/// Sanitise, bandpass and validate a raw window, then derive VPG/APG and, when
/// a scaler is given, their normalised forms.
pub fn validate_window(
    raw: &[f64],
    cfg: &ValidationConfig,
    scaler: Option<&Scaler>,
) -> Result<WindowReport> {
    cfg.validate()?;
    if raw.len() != cfg.win_len {
        log::warn!(
            "window has {} samples, expected {}",
            raw.len(),
            cfg.win_len
        );
    }

    let sanitized = TimeSeries::sanitized(cfg.fs, raw);
    let [low, high] = cfg.freq_band;
    let ppg = bandpass(&sanitized.data, low, high, cfg.fs, cfg.filter)?;
    let filtered = TimeSeries::new(cfg.fs, ppg);

    let verdict = evaluate_window(&filtered, cfg);
    let (vpg, apg) = ppg_derivatives(&filtered.data);
    let scaled = scaler.map(|s| ScaledChannels {
        ppg: s.normalize(Channel::Ppg, &filtered.data),
        vpg: s.normalize(Channel::Vpg, &vpg),
        apg: s.normalize(Channel::Apg, &apg),
    });

    let status = if verdict.valid {
        WindowStatus::Valid
    } else {
        WindowStatus::Invalid
    };
    log::debug!(
        "window {:?}: snr {:.2} dB, f0 {:.3} Hz, beat similarity {:.3}",
        status,
        verdict.snr_db,
        verdict.fundamental_hz,
        verdict.beat_similarity
    );

    Ok(WindowReport {
        status,
        fs: filtered.fs,
        ppg: filtered.data,
        vpg,
        apg,
        scaled,
        hr: verdict.fundamental_hz * 60.0,
        snr: verdict.snr_db,
        beat_sim: verdict.beat_similarity,
        verdict,
    })
}

/// Input to the external ABP model: three parallel normalised channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub ppg: Vec<f64>,
    pub vpg: Vec<f64>,
    pub apg: Vec<f64>,
}

impl InferenceRequest {
    /// Take the first `win_len` samples of each scaled channel.
    pub fn from_scaled(scaled: &ScaledChannels, win_len: usize) -> Self {
        let head = |v: &[f64]| v.iter().take(win_len).copied().collect();
        Self {
            ppg: head(&scaled.ppg),
            vpg: head(&scaled.vpg),
            apg: head(&scaled.apg),
        }
    }

    /// Column-vector instance form: `{"ppg": [[x0], [x1], ...], ...}`.
    pub fn to_instance(&self) -> serde_json::Value {
        let column = |v: &[f64]| -> Vec<[f64; 1]> { v.iter().map(|&x| [x]).collect() };
        serde_json::json!({
            "ppg": column(&self.ppg),
            "vpg": column(&self.vpg),
            "apg": column(&self.apg),
        })
    }
}

/// Blood pressure read off a predicted arterial waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureEstimate {
    pub abp: Vec<f64>,
    /// Mean pressure at waveform peaks, -1 if none.
    pub systolic: f64,
    /// Mean pressure at waveform troughs, -1 if none.
    pub diastolic: f64,
}

/// Rescale a normalised ABP prediction and take systolic/diastolic from its
/// peaks and troughs.
pub fn estimate_pressure(
    prediction: &[f64],
    scaler: &Scaler,
    fs: f64,
    detector: &PeakDetectorConfig,
) -> PressureEstimate {
    let abp = scaler.denormalize(Channel::Abp, prediction);
    let idx = detect_peaks_and_troughs(&abp, fs, detector);
    let level = |positions: &[usize]| -> f64 {
        if positions.is_empty() {
            return -1.0;
        }
        let values: Vec<f64> = positions.iter().map(|&i| abp[i]).collect();
        mean(&values)
    };
    let systolic = level(&idx.peaks);
    let diastolic = level(&idx.troughs);
    PressureEstimate {
        abp,
        systolic,
        diastolic,
    }
}

/// Optical channels of a raw device capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameChannels {
    Ppg(Vec<f64>),
    RedIr { red: Vec<f64>, ir: Vec<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Device sampling frequency (Hz).
    pub fs: f64,
    pub channels: FrameChannels,
}

/// One frame channel after cleaning and peak extraction.
#[derive(Debug, Clone)]
pub struct CleanedChannel {
    /// Raw samples with outlying regions replaced by the median.
    pub cleaned: Vec<f64>,
    pub filtered: Vec<f64>,
    /// Alternating peaks and troughs.
    pub idx: PeakIndexSet,
}

pub fn clean_channel(raw: &[f64], fs: f64, cfg: &FrameConfig) -> Result<CleanedChannel> {
    let sanitized = sanitize(raw);
    let cleaned = match cfg.signal_amp_thresh {
        Some(thresh) => quarantine_signal(&sanitized, thresh).signal,
        None => sanitized,
    };
    let [low, high] = cfg.freq_band;
    let filtered = bandpass(&cleaned, low, high, fs, cfg.filter)?;

    let mut idx = detect_peaks_and_troughs(&filtered, fs, &cfg.peak_detector());
    if cfg.peak_amp_thresh.is_some() || cfg.peak_dist_thresh.is_some() {
        let amp = cfg.peak_amp_thresh.unwrap_or(f64::INFINITY);
        let dist = cfg.peak_dist_thresh.unwrap_or(f64::INFINITY);
        idx = PeakIndexSet::new(
            remove_peak_outliers(&filtered, &idx.peaks, amp, dist),
            remove_peak_outliers(&filtered, &idx.troughs, amp, dist),
        );
    }
    let idx = repair_order(&idx);
    Ok(CleanedChannel {
        cleaned,
        filtered,
        idx,
    })
}

/// Pulse rate and, for red/IR captures, SpO2 of a raw frame.
pub fn frame_vitals(frame: &Frame, cfg: &FrameConfig) -> Result<CardiacMetrics> {
    match &frame.channels {
        FrameChannels::Ppg(ppg) => {
            let ch = clean_channel(ppg, frame.fs, cfg)?;
            let rate = pulse_rate(&ch.idx.peaks, frame.fs);
            Ok(CardiacMetrics::new(rate, SpO2Estimate::SENTINEL))
        }
        FrameChannels::RedIr { red, ir } => {
            let red = clean_channel(red, frame.fs, cfg)?;
            let ir = clean_channel(ir, frame.fs, cfg)?;
            let rate = pulse_rate(&ir.idx.peaks, frame.fs);
            let spo2 = estimate_spo2(
                &red.cleaned,
                &red.idx,
                &ir.cleaned,
                &ir.idx,
                cfg.spo2_method,
            );
            Ok(CardiacMetrics::new(rate, spo2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeartfeltError;
    use crate::scaler::Bounds;
    use std::f64::consts::PI;

    fn scaler() -> Scaler {
        Scaler::new(
            Bounds { min: -1.0, max: 1.0 },
            Bounds { min: -0.1, max: 0.1 },
            Bounds { min: -0.01, max: 0.01 },
            Bounds { min: 20.0, max: 220.0 },
        )
        .unwrap()
    }

    fn pulse_wave(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                (2.0 * PI * freq * t).sin() + 0.3 * (4.0 * PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn report_carries_all_channels() {
        let cfg = ValidationConfig::default();
        let raw = pulse_wave(1.25, cfg.fs, cfg.win_len);
        let report = validate_window(&raw, &cfg, Some(&scaler())).unwrap();
        assert_eq!(report.ppg.len(), 256);
        assert_eq!(report.vpg.len(), 256);
        assert_eq!(report.apg.len(), 256);
        let scaled = report.scaled.as_ref().unwrap();
        assert_eq!(scaled.ppg.len(), 256);
        assert_eq!(report.is_valid(), report.verdict.valid);
        assert_eq!(report.hr, report.verdict.fundamental_hz * 60.0);
    }

    #[test]
    fn nan_samples_are_tolerated() {
        let cfg = ValidationConfig::default();
        let mut raw = pulse_wave(1.25, cfg.fs, cfg.win_len);
        raw[17] = f64::NAN;
        raw[200] = f64::NAN;
        let report = validate_window(&raw, &cfg, None).unwrap();
        assert!(report.ppg.iter().all(|x| x.is_finite()));
        assert!(report.scaled.is_none());
        assert!(!report.snr.is_nan());
    }

    #[test]
    fn validation_is_repeatable() {
        let cfg = ValidationConfig::default();
        let raw = pulse_wave(1.1, cfg.fs, cfg.win_len);
        let a = validate_window(&raw, &cfg, None).unwrap();
        let b = validate_window(&raw, &cfg, None).unwrap();
        assert_eq!(a.verdict, b.verdict);
        assert_eq!(a.ppg, b.ppg);
    }

    #[test]
    fn malformed_band_is_an_error() {
        let cfg = ValidationConfig {
            freq_band: [8.0, 0.5],
            ..ValidationConfig::default()
        };
        let err = validate_window(&[0.0; 256], &cfg, None).unwrap_err();
        assert!(matches!(err, HeartfeltError::InvalidBand { .. }));
    }

    #[test]
    fn request_uses_column_instances() {
        let scaled = ScaledChannels {
            ppg: vec![0.1, 0.2, 0.3],
            vpg: vec![0.4, 0.5, 0.6],
            apg: vec![0.7, 0.8, 0.9],
        };
        let req = InferenceRequest::from_scaled(&scaled, 2);
        assert_eq!(req.ppg, vec![0.1, 0.2]);
        let instance = req.to_instance();
        assert_eq!(instance["vpg"], serde_json::json!([[0.4], [0.5]]));
    }

    #[test]
    fn pressure_from_predicted_waveform() {
        let fs = 125.0;
        let prediction: Vec<f64> = (0..256)
            .map(|i| 0.5 + 0.25 * (2.0 * PI * 1.25 * i as f64 / fs).sin())
            .collect();
        let est = estimate_pressure(&prediction, &scaler(), fs, &PeakDetectorConfig::default());
        assert_eq!(est.abp.len(), 256);
        assert!((est.systolic - 170.0).abs() < 1.0, "sbp {}", est.systolic);
        assert!(est.diastolic > 60.0 && est.diastolic < 90.0, "dbp {}", est.diastolic);
    }

    #[test]
    fn pressure_without_peaks_is_sentinel() {
        let est = estimate_pressure(&[], &scaler(), 125.0, &PeakDetectorConfig::default());
        assert_eq!(est.systolic, -1.0);
        assert_eq!(est.diastolic, -1.0);
    }

    fn red_ir_frame(fs: f64, seconds: f64, rate_hz: f64) -> Frame {
        let n = (fs * seconds) as usize;
        let wave: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * rate_hz * i as f64 / fs).sin())
            .collect();
        Frame {
            fs,
            channels: FrameChannels::RedIr {
                red: wave.iter().map(|w| 1000.0 + 5.0 * w).collect(),
                ir: wave.iter().map(|w| 1000.0 + 10.0 * w).collect(),
            },
        }
    }

    #[test]
    fn frame_vitals_from_red_ir() {
        let cfg = FrameConfig::default();
        let frame = red_ir_frame(200.0, 10.0, 1.2);
        let vitals = frame_vitals(&frame, &cfg).unwrap();
        assert!((vitals.pulse_rate_bpm - 72).abs() <= 3, "{vitals:?}");
        assert!(vitals.r_ratio > 0.4 && vitals.r_ratio < 0.6, "{vitals:?}");
        assert!(vitals.spo2_pct > 90.0 && vitals.spo2_pct < 100.0, "{vitals:?}");
    }

    #[test]
    fn frame_vitals_survive_a_spike() {
        let cfg = FrameConfig {
            signal_amp_thresh: Some(50.0),
            peak_dist_thresh: Some(40.0),
            ..FrameConfig::default()
        };
        let mut frame = red_ir_frame(200.0, 10.0, 1.2);
        if let FrameChannels::RedIr { red, ir } = &mut frame.channels {
            red[100] = 1.0e5;
            ir[100] = 1.0e5;
        }
        let vitals = frame_vitals(&frame, &cfg).unwrap();
        // Filter ringing next to the quarantined stretch may add a beat.
        assert!((vitals.pulse_rate_bpm - 72).abs() <= 6, "{vitals:?}");
        assert!(vitals.spo2_pct > 90.0 && vitals.spo2_pct < 100.0, "{vitals:?}");
    }

    #[test]
    fn ppg_frame_has_no_spo2() {
        let fs = 200.0;
        let frame = Frame {
            fs,
            channels: FrameChannels::Ppg(pulse_wave(1.0, fs, 2000)),
        };
        let vitals = frame_vitals(&frame, &FrameConfig::default()).unwrap();
        assert_eq!(vitals.spo2_pct, -1.0);
        assert_eq!(vitals.r_ratio, -1.0);
        assert!((vitals.pulse_rate_bpm - 60).abs() <= 3, "{vitals:?}");
    }
}
