//! Digital Butterworth design in second-order sections.
//!
//! Analog prototype poles are transformed to the requested band in
//! zeros/poles/gain form, mapped through the bilinear transform and finally
//! grouped into biquads. Each row of the resulting matrix is
//! `[b0, b1, b2, a0, a1, a2]` with `a0 == 1`.

use std::cmp::Ordering;
use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;

/// Sampling rate of the normalized digital domain used during design.
const NORMALIZED_FS: f64 = 2.0;

/// Below this magnitude an imaginary part is treated as zero.
const REAL_TOLERANCE: f64 = 1e-10;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("filter order must be at least 1")]
    InvalidOrder,
    #[error("sampling rate {0} Hz is not positive")]
    InvalidSamplingRate(f64),
    #[error("critical frequency {freq} Hz must lie inside (0, {nyquist}) Hz")]
    InvalidFrequency { freq: f64, nyquist: f64 },
    #[error("band edges {low} Hz and {high} Hz are not increasing")]
    InvalidBand { low: f64, high: f64 },
}

/// Band shape in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    Lowpass(f64),
    Highpass(f64),
    Bandstop(f64, f64),
}

#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

impl Zpk {
    fn degree(&self) -> usize {
        self.poles.len().saturating_sub(self.zeros.len())
    }
}

fn product<'a>(roots: impl Iterator<Item = &'a Complex64>, shift: Complex64) -> Complex64 {
    roots.fold(Complex64::new(1.0, 0.0), |acc, root| acc * (shift - *root))
}

/// Designs a digital Butterworth filter of `order` for `band` at `fs`.
pub fn butter_sos(order: usize, band: Band, fs: f64) -> Result<Array2<f64>, DesignError> {
    if order == 0 {
        return Err(DesignError::InvalidOrder);
    }
    if !(fs.is_finite() && fs > 0.0) {
        return Err(DesignError::InvalidSamplingRate(fs));
    }
    let nyquist = fs / 2.0;
    let check = |freq: f64| {
        if freq.is_finite() && freq > 0.0 && freq < nyquist {
            Ok(prewarp(freq, fs))
        } else {
            Err(DesignError::InvalidFrequency { freq, nyquist })
        }
    };

    let prototype = analog_prototype(order);
    let analog = match band {
        Band::Lowpass(freq) => to_lowpass(prototype, check(freq)?),
        Band::Highpass(freq) => to_highpass(prototype, check(freq)?),
        Band::Bandstop(low, high) => {
            if low >= high {
                return Err(DesignError::InvalidBand { low, high });
            }
            let (w1, w2) = (check(low)?, check(high)?);
            to_bandstop(prototype, (w1 * w2).sqrt(), w2 - w1)
        }
    };
    Ok(zpk_to_sos(&bilinear(analog)))
}

fn prewarp(freq: f64, fs: f64) -> f64 {
    let normalized = 2.0 * freq / fs;
    2.0 * NORMALIZED_FS * (PI * normalized / NORMALIZED_FS).tan()
}

fn analog_prototype(order: usize) -> Zpk {
    let n = order as f64;
    let poles = (0..order)
        .map(|i| {
            let m = 2.0 * i as f64 - n + 1.0;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn to_lowpass(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.degree();
    Zpk {
        zeros: zpk.zeros.iter().map(|z| *z * wo).collect(),
        poles: zpk.poles.iter().map(|p| *p * wo).collect(),
        gain: zpk.gain * wo.powi(degree as i32),
    }
}

fn to_highpass(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.degree();
    let origin = Complex64::new(0.0, 0.0);
    let gain = zpk.gain * (product(zpk.zeros.iter(), origin) / product(zpk.poles.iter(), origin)).re;

    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|z| wo / *z).collect();
    zeros.extend(std::iter::repeat(origin).take(degree));
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| wo / *p).collect(),
        gain,
    }
}

fn to_bandstop(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = zpk.degree();
    let origin = Complex64::new(0.0, 0.0);
    let gain = zpk.gain * (product(zpk.zeros.iter(), origin) / product(zpk.poles.iter(), origin)).re;

    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let scaled: Vec<Complex64> = roots.iter().map(|r| (bw / 2.0) / *r).collect();
        let mut out = Vec::with_capacity(roots.len() * 2);
        for &r in &scaled {
            out.push(r + (r * r - wo * wo).sqrt());
        }
        for &r in &scaled {
            out.push(r - (r * r - wo * wo).sqrt());
        }
        out
    };

    let mut zeros = split(&zpk.zeros);
    zeros.extend(std::iter::repeat(Complex64::new(0.0, wo)).take(degree));
    zeros.extend(std::iter::repeat(Complex64::new(0.0, -wo)).take(degree));
    Zpk {
        zeros,
        poles: split(&zpk.poles),
        gain,
    }
}

fn bilinear(zpk: Zpk) -> Zpk {
    let degree = zpk.degree();
    let fs2 = Complex64::new(2.0 * NORMALIZED_FS, 0.0);
    let gain = zpk.gain * (product(zpk.zeros.iter(), fs2) / product(zpk.poles.iter(), fs2)).re;

    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect(),
        gain,
    }
}

/// One or two roots that together form a real polynomial.
#[derive(Debug, Clone, Copy)]
enum RootGroup {
    Conjugate(Complex64),
    RealPair(f64, f64),
    Real(f64),
}

impl RootGroup {
    fn width(self) -> usize {
        match self {
            RootGroup::Real(_) => 1,
            _ => 2,
        }
    }

    fn anchor(self) -> Complex64 {
        match self {
            RootGroup::Conjugate(c) => c,
            RootGroup::RealPair(a, _) | RootGroup::Real(a) => Complex64::new(a, 0.0),
        }
    }

    fn polynomial(self) -> [f64; 3] {
        match self {
            RootGroup::Conjugate(c) => [1.0, -2.0 * c.re, c.norm_sqr()],
            RootGroup::RealPair(a, b) => [1.0, -(a + b), a * b],
            RootGroup::Real(a) => [1.0, -a, 0.0],
        }
    }
}

fn is_real(root: &Complex64) -> bool {
    root.im.abs() <= REAL_TOLERANCE * root.norm().max(1.0)
}

fn group_roots(roots: &[Complex64]) -> Vec<RootGroup> {
    let mut groups: Vec<RootGroup> = roots
        .iter()
        .filter(|r| !is_real(r) && r.im > 0.0)
        .map(|r| RootGroup::Conjugate(*r))
        .collect();

    let mut reals: Vec<f64> = roots.iter().filter(|r| is_real(r)).map(|r| r.re).collect();
    reals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mut chunks = reals.chunks_exact(2);
    groups.extend(chunks.by_ref().map(|pair| RootGroup::RealPair(pair[0], pair[1])));
    groups.extend(chunks.remainder().iter().map(|&r| RootGroup::Real(r)));
    groups
}

fn zpk_to_sos(zpk: &Zpk) -> Array2<f64> {
    let origin = Complex64::new(0.0, 0.0);
    let mut zeros = zpk.zeros.clone();
    let mut poles = zpk.poles.clone();
    zeros.resize(zeros.len().max(poles.len()), origin);
    poles.resize(zeros.len(), origin);

    // Poles nearest the unit circle end up in the last sections.
    let mut pole_groups = group_roots(&poles);
    pole_groups.sort_by(|a, b| {
        let da = (1.0 - a.anchor().norm()).abs();
        let db = (1.0 - b.anchor().norm()).abs();
        db.partial_cmp(&da).unwrap_or(Ordering::Equal)
    });
    let mut zero_groups = group_roots(&zeros);

    let mut sos = Array2::<f64>::zeros((pole_groups.len().max(1), 6));
    for (row, pole_group) in pole_groups.iter().enumerate() {
        let target = pole_group.anchor();
        let nearest = zero_groups
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let key = |g: &RootGroup| {
                    (
                        usize::from(g.width() != pole_group.width()),
                        (g.anchor() - target).norm(),
                    )
                };
                key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal)
            })
            .map(|(idx, _)| idx);
        let numerator = match nearest {
            Some(idx) => zero_groups.swap_remove(idx).polynomial(),
            None => [1.0, 0.0, 0.0],
        };
        let denominator = pole_group.polynomial();
        for k in 0..3 {
            sos[[row, k]] = numerator[k];
            sos[[row, 3 + k]] = denominator[k];
        }
    }
    if pole_groups.is_empty() {
        sos[[0, 0]] = 1.0;
        sos[[0, 3]] = 1.0;
    }

    for k in 0..3 {
        sos[[0, k]] *= zpk.gain;
    }
    sos
}

/// Magnitude of the frequency response of `sos` at `freq` Hz.
pub fn gain_at(sos: &Array2<f64>, freq: f64, fs: f64) -> f64 {
    let w = 2.0 * PI * freq / fs;
    let z1 = Complex64::from_polar(1.0, -w);
    let z2 = z1 * z1;
    sos.rows()
        .into_iter()
        .map(|row| {
            let num = row[0] + z1 * row[1] + z2 * row[2];
            let den = row[3] + z1 * row[4] + z2 * row[5];
            (num / den).norm()
        })
        .product()
}
