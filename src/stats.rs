//! Per-star time-series statistics.
//!
//! One star's light curve in one band is a sequence of magnitudes with
//! per-point uncertainties. [`BandStats`] bundles the descriptive numbers a
//! variability search wants per band; [`stetson_index`] measures correlated
//! variability across simultaneously observed bands.

use itertools::Itertools;
use ndarray::{Array1, ArrayView1};

use crate::Float;
use crate::robust::{remove_outliers, robust_mean, robust_std, DEFAULT_NITER, DEFAULT_NSIGMA};

/// Reduced chi-square of a series against its own mean.
///
/// `(1 / (n - 1)) * sum((x - mean)^2 / sigma^2)`; a noise-dominated,
/// constant-brightness star comes out near 1. Returns 0 for fewer than two
/// points.
///
/// # Panics
/// Panics if `values` and `errors` have different lengths.
///
/// # Example:
/// ```
/// # use ndarray::array;
/// # use skymatch::stats::reduced_chisq;
/// let values = array![1.0_f64, 2.0, 3.0];
/// let errors = array![1.0, 1.0, 1.0];
/// assert!((reduced_chisq(values.view(), errors.view()) - 1.0).abs() < 1e-12);
/// ```
pub fn reduced_chisq<F: Float>(values: ArrayView1<'_, F>, errors: ArrayView1<'_, F>) -> F {
    let n = values.len();
    if n < 2 {
        return F::zero();
    }
    let mean = values.sum() / F::from_usize(n).unwrap();
    let resid = values.mapv(|x| (x - mean) * (x - mean));
    let weighted = &resid / &errors.mapv(|e| e * e);
    weighted.sum() / F::from_usize(n - 1).unwrap()
}

fn min_of<F: Float>(data: ArrayView1<'_, F>) -> F {
    *data
        .iter()
        .min_by(|a, b| a.partial_cmp(b).expect("found nan"))
        .expect("empty series")
}

fn max_of<F: Float>(data: ArrayView1<'_, F>) -> F {
    *data
        .iter()
        .max_by(|a, b| a.partial_cmp(b).expect("found nan"))
        .expect("empty series")
}

/// Sigma-clipped counterparts of the plain [`BandStats`] fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobustBandStats<F> {
    /// Clipped mean magnitude.
    pub mean: F,
    /// Clipped RMS scatter.
    pub rms: F,
    /// Clipped brightest magnitude.
    pub min: F,
    /// Clipped faintest magnitude.
    pub max: F,
    /// Clipped peak-to-trough amplitude.
    pub peak_trough: F,
}

/// Descriptive statistics of one band's light curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandStats<F> {
    /// Number of observations.
    pub n: usize,
    /// Mean magnitude.
    pub mean: F,
    /// RMS scatter about the mean.
    pub rms: F,
    /// Brightest (numerically smallest) magnitude.
    pub min: F,
    /// Faintest magnitude.
    pub max: F,
    /// Peak-to-trough amplitude, `max - min`.
    pub peak_trough: F,
    /// Mean photometric uncertainty.
    pub mean_err: F,
    /// Reduced chi-square against constant brightness.
    pub rchi2: F,
    /// Sigma-clipped variants, when requested.
    pub robust: Option<RobustBandStats<F>>,
}

impl<F: Float> BandStats<F> {
    /// Compute statistics for one band. Returns `None` for an empty series.
    ///
    /// # Panics
    /// Panics if `mag` and `err` have different lengths.
    pub fn from_series(mag: ArrayView1<'_, F>, err: ArrayView1<'_, F>) -> Option<Self> {
        assert_eq!(mag.len(), err.len(), "magnitude/error length mismatch");
        let n = mag.len();
        if n == 0 {
            return None;
        }

        let len = F::from_usize(n).unwrap();
        let mean = mag.sum() / len;
        let rms = (mag.mapv(|x| (x - mean) * (x - mean)).sum() / len).sqrt();
        let min = min_of(mag);
        let max = max_of(mag);

        Some(Self {
            n,
            mean,
            rms,
            min,
            max,
            peak_trough: max - min,
            mean_err: err.sum() / len,
            rchi2: reduced_chisq(mag, err),
            robust: None,
        })
    }

    /// [`from_series`](BandStats::from_series), plus the sigma-clipped
    /// variants (3 sigma, 2 passes).
    pub fn from_series_robust(mag: ArrayView1<'_, F>, err: ArrayView1<'_, F>) -> Option<Self> {
        let mut stats = Self::from_series(mag, err)?;
        let clipped = remove_outliers(mag, F::from_f64(DEFAULT_NSIGMA).unwrap(), DEFAULT_NITER);
        let min = min_of(clipped.view());
        let max = max_of(clipped.view());
        stats.robust = Some(RobustBandStats {
            mean: robust_mean(mag),
            rms: robust_std(mag),
            min,
            max,
            peak_trough: max - min,
        });
        Some(stats)
    }
}

/// Stetson variability index for simultaneously observed bands.
///
/// Each `(magnitudes, errors)` pair is one band, sampled at the same epochs
/// as the others. Per band the residuals are scaled to
/// `delta_i = sqrt(n / (n - 1)) * (m_i - mean) / sigma_i`; the index is the
/// mean over all epoch-wise band pairs of `sgn(p) * sqrt(|p|)` with
/// `p = delta_b * delta_b'` (Stetson 1996). Uncorrelated noise averages to
/// zero; brightness changes shared across bands drive it positive.
///
/// Returns 0 when fewer than two bands or two epochs are given.
///
/// # Panics
/// Panics if the bands have differing numbers of epochs.
pub fn stetson_index<F: Float>(bands: &[(ArrayView1<'_, F>, ArrayView1<'_, F>)]) -> F {
    let n = match bands.first() {
        Some((mag, _)) => mag.len(),
        None => return F::zero(),
    };
    if bands.len() < 2 || n < 2 {
        return F::zero();
    }

    let scale = (F::from_usize(n).unwrap() / F::from_usize(n - 1).unwrap()).sqrt();
    let deltas = bands
        .iter()
        .map(|(mag, err)| {
            assert_eq!(mag.len(), n, "bands must share their epochs");
            assert_eq!(err.len(), n, "bands must share their epochs");
            let mean = mag.sum() / F::from_usize(n).unwrap();
            Array1::from_iter(
                mag.iter()
                    .zip(err.iter())
                    .map(|(&m, &e)| scale * (m - mean) / e),
            )
        })
        .collect_vec();

    let mut sum = F::zero();
    let mut pairs = 0usize;
    for (d1, d2) in deltas.iter().tuple_combinations() {
        for i in 0..n {
            let p = d1[i] * d2[i];
            let term = if p >= F::zero() {
                p.sqrt()
            } else {
                -(-p).sqrt()
            };
            sum = sum + term;
            pairs += 1;
        }
    }
    sum / F::from_usize(pairs).unwrap()
}
