use crate::error::{HeartfeltError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// IIR design used for the cardiac bandpass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FilterMethod {
    /// Chebyshev type II; the band edges are where attenuation first reaches `rs_db`.
    Cheby2 { order: usize, rs_db: f64 },
    /// Butterworth; the band edges are the -3 dB points.
    Butter { order: usize },
}

impl Default for FilterMethod {
    fn default() -> Self {
        FilterMethod::Cheby2 {
            order: 4,
            rs_db: 20.0,
        }
    }
}

/// One biquad in transposed direct form II, `a0` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondOrderSection {
    pub b: [f64; 3],
    pub a: [f64; 2],
}

impl SecondOrderSection {
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Steady-state delay line for a unit step input.
    fn step_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z2 = self.b[2] - self.a[1] * g;
        let z1 = self.b[1] - self.a[0] * g + z2;
        [z1, z2]
    }
}

/// Zero-phase bandpass: designs the filter and runs it forward and backward
/// without edge padding, so the output has the input's length and no lag.
pub fn bandpass(data: &[f64], low: f64, high: f64, fs: f64, method: FilterMethod) -> Result<Vec<f64>> {
    let sos = design_bandpass(method, low, high, fs)?;
    Ok(sosfiltfilt(&sos, data))
}

/// Digital bandpass as cascaded second-order sections.
pub fn design_bandpass(
    method: FilterMethod,
    low: f64,
    high: f64,
    fs: f64,
) -> Result<Vec<SecondOrderSection>> {
    let nyquist = fs / 2.0;
    let band_ok = low.is_finite() && high.is_finite() && low > 0.0 && low < high && high < nyquist;
    if !band_ok {
        return Err(HeartfeltError::InvalidBand { low, high, nyquist });
    }

    let (z, p, k) = match method {
        FilterMethod::Cheby2 { order, rs_db } => {
            if order == 0 {
                return Err(HeartfeltError::InvalidOrder);
            }
            if !(rs_db > 0.0) {
                return Err(HeartfeltError::InvalidConfig(format!(
                    "stop-band attenuation must be positive, got {rs_db}"
                )));
            }
            cheby2_prototype(order, rs_db)
        }
        FilterMethod::Butter { order } => {
            if order == 0 {
                return Err(HeartfeltError::InvalidOrder);
            }
            butter_prototype(order)
        }
    };

    // Pre-warp with a design rate of 2 so the digital edges land on the requested ones.
    let warp = |f: f64| 4.0 * (PI * (f / nyquist) / 2.0).tan();
    let (w_low, w_high) = (warp(low), warp(high));
    let bw = w_high - w_low;
    let wo = (w_low * w_high).sqrt();

    let (z, p, k) = lowpass_to_bandpass(&z, &p, k, wo, bw);
    let (z, p, k) = bilinear(&z, &p, k, 2.0);
    Ok(zpk_to_sos(&z, &p, k))
}

fn cheby2_prototype(order: usize, rs_db: f64) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let n = order as f64;
    let de = 1.0 / (10f64.powf(0.1 * rs_db) - 1.0).sqrt();
    let mu = (1.0 / de).asinh() / n;

    let zeros: Vec<Complex64> = odd_steps(order)
        .filter(|&m| m != 0)
        .map(|m| Complex64::new(0.0, 1.0 / (m as f64 * PI / (2.0 * n)).sin()))
        .collect();

    let poles: Vec<Complex64> = odd_steps(order)
        .map(|m| {
            let base = -Complex64::from_polar(1.0, PI * m as f64 / (2.0 * n));
            let stretched = Complex64::new(mu.sinh() * base.re, mu.cosh() * base.im);
            stretched.inv()
        })
        .collect();

    let num: Complex64 = poles.iter().map(|&p| -p).product();
    let den: Complex64 = zeros.iter().map(|&z| -z).product();
    let k = (num / den).re;
    (zeros, poles, k)
}

fn butter_prototype(order: usize) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let n = order as f64;
    let poles = odd_steps(order)
        .map(|m| -Complex64::from_polar(1.0, PI * m as f64 / (2.0 * n)))
        .collect();
    (Vec::new(), poles, 1.0)
}

/// -N+1, -N+3, ..., N-1
fn odd_steps(order: usize) -> impl Iterator<Item = i64> {
    let n = order as i64;
    (0..n).map(move |i| -n + 1 + 2 * i)
}

fn lowpass_to_bandpass(
    z: &[Complex64],
    p: &[Complex64],
    k: f64,
    wo: f64,
    bw: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let degree = p.len() - z.len();
    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let scaled: Vec<Complex64> = roots.iter().map(|&r| r * (bw / 2.0)).collect();
        let upper = scaled.iter().map(|&r| r + (r * r - wo * wo).sqrt());
        let lower = scaled.iter().map(|&r| r - (r * r - wo * wo).sqrt());
        upper.chain(lower).collect()
    };
    let mut z_bp = split(z);
    z_bp.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));
    let p_bp = split(p);
    (z_bp, p_bp, k * bw.powi(degree as i32))
}

fn bilinear(
    z: &[Complex64],
    p: &[Complex64],
    k: f64,
    fs: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let degree = p.len() - z.len();
    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let mut z_d: Vec<Complex64> = z.iter().map(|&r| (fs2 + r) / (fs2 - r)).collect();
    z_d.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let p_d = p.iter().map(|&r| (fs2 + r) / (fs2 - r)).collect();
    let num: Complex64 = z.iter().map(|&r| fs2 - r).product();
    let den: Complex64 = p.iter().map(|&r| fs2 - r).product();
    (z_d, p_d, k * (num / den).re)
}

const IMAG_EPS: f64 = 1e-10;

/// Group roots into conjugate pairs (or pairs of real roots, outermost with innermost).
fn root_pairs(roots: &[Complex64]) -> Vec<(Complex64, Option<Complex64>)> {
    let mut pairs: Vec<(Complex64, Option<Complex64>)> = roots
        .iter()
        .filter(|r| r.im > IMAG_EPS)
        .map(|r| (*r, Some(r.conj())))
        .collect();
    let mut reals: Vec<f64> = roots
        .iter()
        .filter(|r| r.im.abs() <= IMAG_EPS)
        .map(|r| r.re)
        .collect();
    reals.sort_by(|a, b| a.total_cmp(b));
    while !reals.is_empty() {
        let lo = reals.remove(0);
        let hi = reals.pop();
        pairs.push((
            Complex64::new(lo, 0.0),
            hi.map(|h| Complex64::new(h, 0.0)),
        ));
    }
    pairs
}

fn pair_poly(pair: &(Complex64, Option<Complex64>)) -> [f64; 3] {
    match pair.1 {
        Some(second) => [1.0, -(pair.0 + second).re, (pair.0 * second).re],
        None => [1.0, -pair.0.re, 0.0],
    }
}

fn zpk_to_sos(z: &[Complex64], p: &[Complex64], k: f64) -> Vec<SecondOrderSection> {
    let mut pole_pairs = root_pairs(p);
    // Poles nearest the unit circle get first pick of the zeros.
    pole_pairs.sort_by(|a, b| b.0.norm().total_cmp(&a.0.norm()));
    let mut zero_pairs: Vec<Option<(Complex64, Option<Complex64>)>> =
        root_pairs(z).into_iter().map(Some).collect();

    let mut sections = Vec::with_capacity(pole_pairs.len());
    for pole in &pole_pairs {
        let nearest = zero_pairs
            .iter()
            .enumerate()
            .filter_map(|(i, zp)| zp.as_ref().map(|zp| (i, (zp.0 - pole.0).norm())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        let b = match nearest.and_then(|i| zero_pairs[i].take()) {
            Some(zp) => pair_poly(&zp),
            None => [1.0, 0.0, 0.0],
        };
        let a = pair_poly(pole);
        sections.push(SecondOrderSection {
            b,
            a: [a[1], a[2]],
        });
    }
    if let Some(first) = sections.first_mut() {
        for coeff in first.b.iter_mut() {
            *coeff *= k;
        }
    }
    sections
}

/// Run the cascade once over `data`, starting from the given delay lines.
fn sosfilt(sos: &[SecondOrderSection], data: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    for &x in data {
        let mut v = x;
        for (s, zi) in sos.iter().zip(state.iter_mut()) {
            let y = s.b[0] * v + zi[0];
            zi[0] = s.b[1] * v - s.a[0] * y + zi[1];
            zi[1] = s.b[2] * v - s.a[1] * y;
            v = y;
        }
        out.push(v);
    }
    out
}

/// Initial delay lines matching a constant input of `level`.
fn steady_state(sos: &[SecondOrderSection], level: f64) -> Vec<[f64; 2]> {
    let mut scale = level;
    sos.iter()
        .map(|s| {
            let zi = s.step_state();
            let out = [zi[0] * scale, zi[1] * scale];
            scale *= s.dc_gain();
            out
        })
        .collect()
}

/// Forward-backward filtering with no padding.
pub fn sosfiltfilt(sos: &[SecondOrderSection], data: &[f64]) -> Vec<f64> {
    if data.is_empty() || sos.is_empty() {
        return data.to_vec();
    }
    let mut state = steady_state(sos, data[0]);
    let mut forward = sosfilt(sos, data, &mut state);
    forward.reverse();
    let mut state = steady_state(sos, forward[0]);
    let mut backward = sosfilt(sos, &forward, &mut state);
    backward.reverse();
    backward
}
