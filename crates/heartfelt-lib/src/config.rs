use crate::detectors::peaks::PeakDetectorConfig;
use crate::error::{HeartfeltError, Result};
use crate::filters::FilterMethod;
use crate::metrics::cardiac::SpO2Calibration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Individual checks a window must pass to be declared valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    /// Spectral SNR at or above the threshold.
    Snr,
    /// Fundamental frequency inside the heart-rate band.
    Hr,
    /// No three identical consecutive samples.
    Flat,
    /// Beat similarity at or above the threshold.
    Beat,
}

/// Settings for validating a fixed-length PPG window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Sampling frequency (Hz).
    pub fs: f64,
    /// Window length the inference model expects.
    pub win_len: usize,
    /// Bandpass edges (Hz).
    pub freq_band: [f64; 2],
    pub filter: FilterMethod,
    /// Half-width (Hz) of the band integrated around each harmonic.
    pub df: f64,
    pub nfft: usize,
    /// Minimum SNR (dB).
    pub snr: f64,
    /// Valid fundamental frequency range (Hz).
    pub hr_freq_band: [f64; 2],
    /// Rolling mean window for peak detection (seconds).
    pub windowsize: f64,
    pub ma_perc: f64,
    /// Minimum beat similarity.
    pub beat_sim: f64,
    pub checks: Vec<QualityCheck>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fs: 125.0,
            win_len: 256,
            freq_band: [0.5, 8.0],
            filter: FilterMethod::default(),
            df: 0.2,
            nfft: 2048,
            snr: 2.0,
            hr_freq_band: [0.667, 3.0],
            windowsize: 1.0,
            ma_perc: 20.0,
            beat_sim: 0.2,
            checks: vec![
                QualityCheck::Snr,
                QualityCheck::Hr,
                QualityCheck::Flat,
                QualityCheck::Beat,
            ],
        }
    }
}

impl ValidationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_config(path)?)
    }

    pub fn peak_detector(&self) -> PeakDetectorConfig {
        PeakDetectorConfig {
            windowsize: self.windowsize,
            ma_perc: self.ma_perc,
        }
    }

    /// Reject settings that can only come from a configuration mistake.
    pub fn validate(&self) -> Result<()> {
        check_band(self.freq_band, self.fs)?;
        check_positive("windowsize", self.windowsize)?;
        check_positive("df", self.df)?;
        if self.win_len == 0 {
            return invalid("win_len must be positive");
        }
        if self.nfft < 2 {
            return invalid("nfft must be at least 2");
        }
        let [lo, hi] = self.hr_freq_band;
        if !(lo < hi) {
            return invalid(format!("hr_freq_band [{lo}, {hi}] is inverted"));
        }
        Ok(())
    }
}

/// Settings for extracting vitals from raw device frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Device sampling frequency (Hz).
    pub fs: f64,
    pub freq_band: [f64; 2],
    pub filter: FilterMethod,
    pub windowsize: f64,
    pub ma_perc: f64,
    /// Maximum distance from the median before a raw sample is quarantined.
    pub signal_amp_thresh: Option<f64>,
    /// Maximum distance from the mean peak amplitude.
    pub peak_amp_thresh: Option<f64>,
    /// Allowed excess (samples) over the mean peak spacing.
    pub peak_dist_thresh: Option<f64>,
    pub spo2_method: SpO2Calibration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fs: 200.0,
            freq_band: [0.5, 8.0],
            filter: FilterMethod::default(),
            windowsize: 0.75,
            ma_perc: 20.0,
            signal_amp_thresh: None,
            peak_amp_thresh: None,
            peak_dist_thresh: None,
            spo2_method: SpO2Calibration::Linear,
        }
    }
}

impl FrameConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_config(path)?)
    }

    pub fn peak_detector(&self) -> PeakDetectorConfig {
        PeakDetectorConfig {
            windowsize: self.windowsize,
            ma_perc: self.ma_perc,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_band(self.freq_band, self.fs)?;
        check_positive("windowsize", self.windowsize)?;
        for (name, value) in [
            ("signal_amp_thresh", self.signal_amp_thresh),
            ("peak_amp_thresh", self.peak_amp_thresh),
            ("peak_dist_thresh", self.peak_dist_thresh),
        ] {
            if let Some(v) = value {
                if v.is_nan() || v < 0.0 {
                    return invalid(format!("{name} must be non-negative, got {v}"));
                }
            }
        }
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| HeartfeltError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn check_band([low, high]: [f64; 2], fs: f64) -> Result<()> {
    check_positive("fs", fs)?;
    let nyquist = fs / 2.0;
    if !(low > 0.0 && low < high && high < nyquist) {
        return Err(HeartfeltError::InvalidBand { low, high, nyquist });
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return invalid(format!("{name} must be positive, got {value}"));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> Result<()> {
    Err(HeartfeltError::InvalidConfig(msg.into()))
}
