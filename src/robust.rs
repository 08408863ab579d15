//! Outlier-resistant statistics via iterative sigma clipping.
//!
//! Photometric time series routinely carry a handful of bad measurements
//! (cosmic rays, seeing blow-ups, chip-edge frames) that wreck plain means
//! and standard deviations. Clipping a few sigma for a couple of passes is
//! the standard remedy.

use ndarray::{Array1, ArrayView1};

use crate::Float;

/// Clipping threshold used by [`robust_mean`] and [`robust_std`], in sigma.
pub const DEFAULT_NSIGMA: f64 = 3.;
/// Number of clipping passes used by [`robust_mean`] and [`robust_std`].
pub const DEFAULT_NITER: usize = 2;

fn mean_of<F: Float>(data: &[F]) -> F {
    data.iter().copied().fold(F::zero(), |a, b| a + b) / F::from_usize(data.len()).unwrap()
}

fn std_of<F: Float>(data: &[F], mean: F) -> F {
    let var = data
        .iter()
        .map(|&x| (x - mean) * (x - mean))
        .fold(F::zero(), |a, b| a + b)
        / F::from_usize(data.len()).unwrap();
    var.sqrt()
}

/// Drop points more than `nsigma` standard deviations from the mean,
/// recomputing mean and deviation on each of `niter` passes.
///
/// Clipping stops early once a pass removes nothing. The mean itself always
/// survives a pass, so the result is never empty for non-empty input.
pub fn remove_outliers<F: Float>(data: ArrayView1<'_, F>, nsigma: F, niter: usize) -> Array1<F> {
    let mut kept: Vec<F> = data.iter().copied().collect();
    for _ in 0..niter {
        if kept.len() < 2 {
            break;
        }
        let mean = mean_of(&kept);
        let cut = nsigma * std_of(&kept, mean);
        let clipped: Vec<F> = kept.iter().copied().filter(|&x| (x - mean).abs() <= cut).collect();
        if clipped.len() == kept.len() {
            break;
        }
        kept = clipped;
    }
    Array1::from_vec(kept)
}

/// Sigma-clipped mean (3 sigma, 2 passes).
pub fn robust_mean<F: Float>(data: ArrayView1<'_, F>) -> F {
    let kept = remove_outliers(data, F::from_f64(DEFAULT_NSIGMA).unwrap(), DEFAULT_NITER);
    mean_of(kept.as_slice().unwrap())
}

/// Sigma-clipped population standard deviation (3 sigma, 2 passes).
pub fn robust_std<F: Float>(data: ArrayView1<'_, F>) -> F {
    let kept = remove_outliers(data, F::from_f64(DEFAULT_NSIGMA).unwrap(), DEFAULT_NITER);
    let mean = mean_of(kept.as_slice().unwrap());
    std_of(kept.as_slice().unwrap(), mean)
}
