//! Spherical geometry on the celestial sphere.

use nalgebra::Vector3;

use crate::Float;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.;

pub(crate) fn deg_to_rad<F: Float>(deg: F) -> F {
    deg * F::pi() / F::from_f64(180.).unwrap()
}

pub(crate) fn rad_to_deg<F: Float>(rad: F) -> F {
    rad * F::from_f64(180.).unwrap() / F::pi()
}

/// Unit vector of an equatorial position given in degrees.
pub(crate) fn unit_vector<F: Float>(ra_deg: F, dec_deg: F) -> Vector3<F> {
    let ra = deg_to_rad(ra_deg);
    let dec = deg_to_rad(dec_deg);
    Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
}

/// Great-circle separation of two equatorial positions, in arcseconds.
///
/// Both positions are given as `(ra, dec)` in degrees. The separation is
/// computed from the 3-vector cross and dot products, which stays accurate
/// for both very small separations (where `acos` of a dot product loses
/// precision) and antipodal ones.
///
/// # Example:
/// ```
/// # use skymatch::geometry::angular_separation_arcsec;
/// let sep = angular_separation_arcsec(10.0_f64, 0.0, 11.0, 0.0);
/// assert!((sep - 3600.0).abs() < 1e-6);
/// ```
pub fn angular_separation_arcsec<F: Float>(ra1: F, dec1: F, ra2: F, dec2: F) -> F {
    let u = unit_vector(ra1, dec1);
    let v = unit_vector(ra2, dec2);
    let sep_rad = u.cross(&v).norm().atan2(u.dot(&v));
    rad_to_deg(sep_rad) * F::from_f64(ARCSEC_PER_DEG).unwrap()
}
