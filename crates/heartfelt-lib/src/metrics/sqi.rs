use crate::config::{QualityCheck, ValidationConfig};
use crate::metrics::beats::{beat_similarity, SimilarityScore};
use crate::signal::TimeSeries;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// One-sided power spectral density.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Periodogram {
    pub freqs: Vec<f64>,
    pub psd: Vec<f64>,
}

impl Periodogram {
    pub fn resolution(&self) -> f64 {
        if self.freqs.len() < 2 {
            return 0.0;
        }
        self.freqs[1] - self.freqs[0]
    }

    /// Integrate the density over `[low, high]` with Simpson's rule.
    pub fn band_power(&self, low: f64, high: f64) -> f64 {
        let band: Vec<f64> = self
            .freqs
            .iter()
            .zip(&self.psd)
            .filter(|&(&f, _)| f >= low && f <= high)
            .map(|(_, &p)| p)
            .collect();
        simpson(&band, self.resolution())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnrEstimate {
    pub snr_db: f64,
    /// Fundamental frequency (Hz).
    pub f0_hz: f64,
}

impl SnrEstimate {
    pub const SENTINEL_DB: f64 = -10.0;
    pub const SENTINEL: SnrEstimate = SnrEstimate {
        snr_db: Self::SENTINEL_DB,
        f0_hz: 0.0,
    };
}

/// Validation outcome for a single window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub valid: bool,
    pub snr_db: f64,
    pub fundamental_hz: f64,
    /// Similarity score or one of the -1/-2/-3 sentinels.
    pub beat_similarity: f64,
    pub flat: bool,
}

/// True when any three consecutive samples are identical.
pub fn has_flat_line(data: &[f64]) -> bool {
    data.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Boxcar periodogram with constant detrending, zero-padded (or truncated) to `nfft`.
pub fn periodogram(data: &[f64], fs: f64, nfft: usize) -> Periodogram {
    let n = data.len().min(nfft);
    if n == 0 || nfft < 2 {
        return Periodogram::default();
    }
    let segment = &data[..n];
    let mean = segment.iter().sum::<f64>() / n as f64;
    let mut buffer = vec![0.0; nfft];
    for (dst, &x) in buffer.iter_mut().zip(segment) {
        *dst = x - mean;
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut spectrum = fft.make_output_vec();
    if let Err(err) = fft.process(&mut buffer, &mut spectrum) {
        log::warn!("periodogram FFT failed: {err}");
        return Periodogram::default();
    }

    let scale = 1.0 / (fs * n as f64);
    let last = spectrum.len() - 1;
    let psd = spectrum
        .iter()
        .enumerate()
        .map(|(k, c)| {
            let p = c.norm_sqr() * scale;
            // DC and (for even sizes) Nyquist appear once in the one-sided spectrum.
            if k == 0 || (k == last && nfft % 2 == 0) {
                p
            } else {
                2.0 * p
            }
        })
        .collect();
    let freqs = (0..spectrum.len())
        .map(|k| k as f64 * fs / nfft as f64)
        .collect();
    Periodogram { freqs, psd }
}

/// Composite Simpson integration of uniformly spaced samples. Even sample
/// counts average the two ways of closing the last interval with a trapezoid.
pub fn simpson(y: &[f64], dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0.0,
        2 => 0.5 * dx * (y[0] + y[1]),
        _ if n % 2 == 1 => simpson_odd(y, dx),
        _ => {
            let head = simpson_odd(&y[..n - 1], dx) + 0.5 * dx * (y[n - 2] + y[n - 1]);
            let tail = simpson_odd(&y[1..], dx) + 0.5 * dx * (y[0] + y[1]);
            0.5 * (head + tail)
        }
    }
}

fn simpson_odd(y: &[f64], dx: f64) -> f64 {
    let mut acc = 0.0;
    let mut i = 0;
    while i + 2 < y.len() {
        acc += y[i] + 4.0 * y[i + 1] + y[i + 2];
        i += 2;
    }
    acc * dx / 3.0
}

/// Local maxima of the spectrum (rising then non-rising slope).
fn spectral_peaks(psd: &[f64]) -> Vec<usize> {
    (1..psd.len().saturating_sub(1))
        .filter(|&k| psd[k] - psd[k - 1] > 0.0 && psd[k + 1] - psd[k] <= 0.0)
        .collect()
}

/// SNR over the cardiac band and fundamental frequency.
///
/// The three strongest spectral peaks, ordered by frequency, are taken as the
/// fundamental and two harmonics. Power within `±df` of each is signal; the
/// rest of `[low, high]` is noise.
pub fn estimate_snr(data: &[f64], fs: f64, low: f64, high: f64, df: f64, nfft: usize) -> SnrEstimate {
    let pgram = periodogram(data, fs, nfft);
    let mut peaks = spectral_peaks(&pgram.psd);
    if peaks.len() < 3 {
        log::warn!("only {} spectral peaks, SNR falls back to sentinel", peaks.len());
        return SnrEstimate::SENTINEL;
    }
    peaks.sort_by(|&a, &b| pgram.psd[b].total_cmp(&pgram.psd[a]));
    peaks.truncate(3);
    peaks.sort_unstable();
    let harmonics: Vec<f64> = peaks.iter().map(|&k| pgram.freqs[k]).collect();
    let f0 = harmonics[0];

    let signal_power: f64 = harmonics
        .iter()
        .map(|&f| pgram.band_power(f - df, f + df))
        .sum();
    let cardiac_power = pgram.band_power(low, high);
    let noise_power = cardiac_power - signal_power;

    let snr_db = if noise_power <= 0.0 {
        SnrEstimate::SENTINEL_DB
    } else {
        let ratio = signal_power / noise_power;
        if ratio.is_finite() && ratio > 0.0 {
            10.0 * ratio.log10()
        } else {
            SnrEstimate::SENTINEL_DB
        }
    };
    SnrEstimate { snr_db, f0_hz: f0 }
}

/// Run every quality metric on an already filtered window and combine the
/// enabled checks into a verdict.
pub fn evaluate_window(window: &TimeSeries, cfg: &ValidationConfig) -> QualityVerdict {
    let [low, high] = cfg.freq_band;
    let snr = estimate_snr(&window.data, window.fs, low, high, cfg.df, cfg.nfft);
    let flat = has_flat_line(&window.data);
    let similarity = beat_similarity(&window.data, window.fs, &cfg.peak_detector());
    combine(snr, flat, similarity, cfg)
}

fn combine(
    snr: SnrEstimate,
    flat: bool,
    similarity: SimilarityScore,
    cfg: &ValidationConfig,
) -> QualityVerdict {
    let beat = similarity.value();
    let [hr_low, hr_high] = cfg.hr_freq_band;
    let no_nan = !(snr.snr_db.is_nan() || snr.f0_hz.is_nan() || beat.is_nan());

    let valid = no_nan
        && cfg.checks.iter().all(|check| {
            let passed = match check {
                QualityCheck::Snr => snr.snr_db >= cfg.snr,
                QualityCheck::Hr => snr.f0_hz >= hr_low && snr.f0_hz <= hr_high,
                QualityCheck::Flat => !flat,
                QualityCheck::Beat => beat >= cfg.beat_sim,
            };
            if !passed {
                log::debug!("window failed {check:?} check");
            }
            passed
        });

    QualityVerdict {
        valid,
        snr_db: snr.snr_db,
        fundamental_hz: snr.f0_hz,
        beat_similarity: beat,
        flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn harmonic_signal(fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                (2.0 * PI * 1.2 * t).sin()
                    + 0.6 * (2.0 * PI * 2.4 * t).sin()
                    + 0.4 * (2.0 * PI * 3.6 * t).sin()
            })
            .collect()
    }

    #[test]
    fn flat_line_detection() {
        assert!(has_flat_line(&[1.0, 2.0, 2.0, 2.0, 3.0]));
        assert!(!has_flat_line(&[1.0, 2.0, 3.0, 2.0, 1.0]));
        assert!(!has_flat_line(&[1.0, 1.0]));
    }

    #[test]
    fn simpson_integrates_polynomials() {
        // x^2 on [0, 2] sampled at 0, 0.5, ..., 2
        let y: Vec<f64> = (0..5).map(|i| (i as f64 * 0.5).powi(2)).collect();
        assert!((simpson(&y, 0.5) - 8.0 / 3.0).abs() < 1e-12);
        // linear data is exact for the even-count variant as well
        let y = [0.0, 1.0, 2.0, 3.0];
        assert!((simpson(&y, 1.0) - 4.5).abs() < 1e-12);
        assert_eq!(simpson(&[5.0], 1.0), 0.0);
    }

    #[test]
    fn periodogram_locates_tone() {
        let fs = 128.0;
        let x: Vec<f64> = (0..256)
            .map(|i| (2.0 * PI * 8.0 * i as f64 / fs).sin())
            .collect();
        let pgram = periodogram(&x, fs, 256);
        assert_eq!(pgram.freqs.len(), 129);
        let (k, _) = pgram
            .psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((pgram.freqs[k] - 8.0).abs() < 1e-9);
        // Parseval: total power equals the variance (0.5 for a unit sine).
        let power: f64 = pgram.psd.iter().sum::<f64>() * pgram.resolution();
        assert!((power - 0.5).abs() < 1e-9);
    }

    /// Harmonics plus weaker tones spread over the cardiac band.
    fn harmonics_over_background(fs: f64, n: usize) -> Vec<f64> {
        let background = [0.7, 1.8, 3.0, 4.2, 4.9, 5.6, 6.3, 7.0, 7.6];
        harmonic_signal(fs, n)
            .into_iter()
            .enumerate()
            .map(|(i, x)| {
                let t = i as f64 / fs;
                x + background
                    .iter()
                    .enumerate()
                    .map(|(k, &f)| 0.3 * (2.0 * PI * f * t + k as f64).sin())
                    .sum::<f64>()
            })
            .collect()
    }

    #[test]
    fn snr_finds_fundamental() {
        let fs = 125.0;
        let x = harmonics_over_background(fs, 2048);
        let est = estimate_snr(&x, fs, 0.5, 8.0, 0.2, 2048);
        assert!((est.f0_hz - 1.2207).abs() < 0.01, "f0 {}", est.f0_hz);
        assert!(est.snr_db > 3.0 && est.snr_db < 7.0, "snr {}", est.snr_db);
    }

    #[test]
    fn harmonics_alone_leave_no_noise() {
        // Simpson weights over the harmonic bands exceed the whole band, so the
        // noise power is not positive.
        let fs = 125.0;
        let x = harmonic_signal(fs, 2048);
        let est = estimate_snr(&x, fs, 0.5, 8.0, 0.2, 2048);
        assert_eq!(est.snr_db, SnrEstimate::SENTINEL_DB);
        assert!((est.f0_hz - 1.2207).abs() < 0.01, "f0 {}", est.f0_hz);
    }

    #[test]
    fn snr_of_silence_is_sentinel() {
        let est = estimate_snr(&[0.0; 256], 125.0, 0.5, 8.0, 0.2, 2048);
        assert_eq!(est, SnrEstimate::SENTINEL);
    }

    #[test]
    fn any_failing_check_invalidates() {
        let cfg = ValidationConfig::default();
        let good = SnrEstimate {
            snr_db: 5.0,
            f0_hz: 1.2,
        };
        assert!(combine(good, false, SimilarityScore::Score(0.8), &cfg).valid);
        assert!(!combine(good, true, SimilarityScore::Score(0.8), &cfg).valid);
        assert!(!combine(good, false, SimilarityScore::OutOfOrder, &cfg).valid);
        let slow = SnrEstimate {
            snr_db: 5.0,
            f0_hz: 0.2,
        };
        assert!(!combine(slow, false, SimilarityScore::Score(0.8), &cfg).valid);
        let noisy = SnrEstimate {
            snr_db: 1.0,
            f0_hz: 1.2,
        };
        assert!(!combine(noisy, false, SimilarityScore::Score(0.8), &cfg).valid);
        let nan = SnrEstimate {
            snr_db: f64::NAN,
            f0_hz: 1.2,
        };
        assert!(!combine(nan, false, SimilarityScore::Score(0.8), &cfg).valid);
    }

    #[test]
    fn disabled_checks_are_ignored() {
        let cfg = ValidationConfig {
            checks: vec![QualityCheck::Snr],
            ..ValidationConfig::default()
        };
        let good = SnrEstimate {
            snr_db: 5.0,
            f0_hz: 0.1,
        };
        assert!(combine(good, true, SimilarityScore::NoBeats, &cfg).valid);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let fs = 125.0;
        let x = TimeSeries::new(fs, harmonic_signal(fs, 256));
        let cfg = ValidationConfig::default();
        let a = evaluate_window(&x, &cfg);
        let b = evaluate_window(&x, &cfg);
        assert_eq!(a.valid, b.valid);
        assert_eq!(a.snr_db.to_bits(), b.snr_db.to_bits());
        assert_eq!(a.fundamental_hz.to_bits(), b.fundamental_hz.to_bits());
        assert_eq!(a.beat_similarity.to_bits(), b.beat_similarity.to_bits());
    }
}
