//! In-memory source catalogs.
//!
//! A [`Catalog`] is the positional view of a source table: one `(ra, dec)`
//! pair per record, in degrees, in the row order of the file it was loaded
//! from. Record indices are stable for the duration of a run, so match
//! results can be joined back onto the photometric columns by the caller.
//!
//! Unit mismatches between survey catalogs are a recurring hazard (WFCAM
//! tables carry coordinates in radians, 2MASS in degrees), so conversion
//! happens here, at construction, and never inside the matching algorithm.

use ndarray::{Array2, ArrayView2, Axis};

use crate::Float;
use crate::geometry::rad_to_deg;

/// Types that can be consumed as an `(n, 2)` coordinate table.
pub trait IntoCoords<F: Float> {
    /// Convert into an `(n, 2)` array of `(ra, dec)` rows.
    fn into_coords(self) -> Array2<F>;
}

impl<F: Float> IntoCoords<F> for Array2<F> {
    fn into_coords(self) -> Array2<F> {
        assert_eq!(self.ncols(), 2, "coordinate array must have shape (n, 2)");
        self
    }
}

impl<F: Float> IntoCoords<F> for Vec<[F; 2]> {
    fn into_coords(self) -> Array2<F> {
        let n = self.len();
        Array2::from_shape_vec((n, 2), self.into_iter().flatten().collect()).unwrap()
    }
}

impl<F: Float> IntoCoords<F> for &[[F; 2]] {
    fn into_coords(self) -> Array2<F> {
        self.to_vec().into_coords()
    }
}

/// Positions of one source catalog, `(ra, dec)` in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog<F: Float> {
    /// Shape `(n_records, 2)`, columns `[ra, dec]`.
    coords: Array2<F>,
}

impl<F: Float> Catalog<F> {
    /// Build a catalog from coordinates already in degrees.
    pub fn from_degrees<C: IntoCoords<F>>(coords: C) -> Self {
        Self {
            coords: coords.into_coords(),
        }
    }

    /// Build a catalog from coordinates in radians, converting to degrees.
    ///
    /// # Example:
    /// ```
    /// # use skymatch::Catalog;
    /// let cat = Catalog::from_radians(vec![[std::f64::consts::FRAC_PI_2, 0.0]]);
    /// assert!((cat.ra(0) - 90.0).abs() < 1e-12);
    /// ```
    pub fn from_radians<C: IntoCoords<F>>(coords: C) -> Self {
        Self {
            coords: coords.into_coords().mapv(rad_to_deg),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.coords.nrows()
    }

    /// Whether the catalog has no records.
    pub fn is_empty(&self) -> bool {
        self.coords.nrows() == 0
    }

    /// Right ascension of record `index`, degrees.
    pub fn ra(&self, index: usize) -> F {
        self.coords[[index, 0]]
    }

    /// Declination of record `index`, degrees.
    pub fn dec(&self, index: usize) -> F {
        self.coords[[index, 1]]
    }

    /// `(ra, dec)` of record `index`, degrees.
    pub fn position(&self, index: usize) -> (F, F) {
        (self.ra(index), self.dec(index))
    }

    /// View of the underlying `(n, 2)` coordinate array.
    pub fn coords(&self) -> ArrayView2<'_, F> {
        self.coords.view()
    }

    /// Mean declination over all records, degrees.
    pub(crate) fn mean_dec(&self) -> F {
        let dec = self.coords.index_axis(Axis(1), 1);
        dec.sum() / F::from_usize(self.len()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn from_degrees_accessors() {
        let cat = Catalog::from_degrees(array![[10.0, 20.0], [11.5, -3.25]]);
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.position(1), (11.5, -3.25));
    }

    #[test]
    fn from_radians_converts() {
        let cat = Catalog::from_radians(vec![
            [std::f64::consts::PI, -std::f64::consts::FRAC_PI_4],
            [0.0, 0.0],
        ]);
        assert_abs_diff_eq!(cat.ra(0), 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cat.dec(0), -45.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cat.ra(1), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn slice_input() {
        let rows = [[1.0_f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let cat = Catalog::from_degrees(&rows[..]);
        assert_eq!(cat.len(), 3);
        assert_eq!(cat.dec(2), 6.0);
    }

    #[test]
    fn mean_dec_over_records() {
        let cat = Catalog::from_degrees(vec![[0.0, 10.0], [0.0, 30.0]]);
        assert_abs_diff_eq!(cat.mean_dec(), 20.0, epsilon = 1e-12);
    }

    #[test]
    #[should_panic]
    fn rejects_wrong_shape() {
        let _ = Catalog::from_degrees(Array2::<f64>::zeros((3, 3)));
    }
}
