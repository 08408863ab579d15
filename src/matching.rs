//! Catalog cross-matching: the main interface of this library.
//!
//! For every record of a reference catalog, the matcher finds the nearest
//! record of a comparison catalog within a search radius. Candidates are
//! first cut down by a rectangular box in RA/Dec (cheap half-plane
//! comparisons), then ranked by exact great-circle separation, so the
//! quadratic all-pairs distance computation is avoided for spatially sparse
//! catalogs.

use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::Float;
use crate::catalog::Catalog;
use crate::geometry::{ARCSEC_PER_DEG, angular_separation_arcsec, deg_to_rad};

/// Search radius used when none is given, in arcseconds.
pub const DEFAULT_RADIUS_ARCSEC: f64 = 1.;

/// Which of the two input catalogs an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogRole {
    /// The catalog being matched from.
    Reference,
    /// The catalog being matched into.
    Comparison,
}

impl std::fmt::Display for CatalogRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogRole::Reference => write!(f, "reference"),
            CatalogRole::Comparison => write!(f, "comparison"),
        }
    }
}

/// Fatal input problems. Malformed coordinates invalidate the whole run,
/// so matching aborts instead of skipping records.
#[derive(Debug, Error)]
pub enum MatchError {
    /// One of the input catalogs has no records.
    #[error("{role} catalog has no records")]
    EmptyCatalog {
        /// The offending catalog.
        role: CatalogRole,
    },
    /// A coordinate is non-finite or outside its valid range.
    #[error("{role} catalog record {index}: {detail}")]
    InvalidCoordinate {
        /// The offending catalog.
        role: CatalogRole,
        /// Record index within that catalog.
        index: usize,
        /// Which condition was violated.
        detail: &'static str,
    },
}

/// Nearest comparison-catalog neighbour of one reference record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match<F> {
    /// Index into the comparison catalog.
    pub index: usize,
    /// Great-circle separation to that record, arcseconds.
    pub separation_arcsec: F,
}

/// One entry per reference record, in reference-catalog order.
/// `None` is the normal "no neighbour within the radius" outcome, not an
/// error.
pub type MatchResults<F> = Vec<Option<Match<F>>>;

// NaN fails the self-comparison, infinities the subtraction.
fn finite<F: Float>(x: F) -> bool {
    x == x && x - x == F::zero()
}

fn validate<F: Float>(catalog: &Catalog<F>, role: CatalogRole) -> Result<(), MatchError> {
    if catalog.is_empty() {
        return Err(MatchError::EmptyCatalog { role });
    }
    let ninety = F::from_f64(90.).unwrap();
    for index in 0..catalog.len() {
        let (ra, dec) = catalog.position(index);
        if !finite(ra) || !finite(dec) {
            return Err(MatchError::InvalidCoordinate {
                role,
                index,
                detail: "non-finite coordinate",
            });
        }
        if dec < -ninety || dec > ninety {
            return Err(MatchError::InvalidCoordinate {
                role,
                index,
                detail: "declination outside [-90, 90] degrees",
            });
        }
    }
    Ok(())
}

/// Shared per-run state: the box half-widths and the single global RA
/// correction factor.
struct BoxMatcher<'a, F: Float> {
    reference: &'a Catalog<F>,
    comparison: &'a Catalog<F>,
    radius_arcsec: F,
    /// Declination half-width of the pre-filter box, degrees.
    boxsize: F,
    /// RA half-width, widened by `1 / cos(mean reference dec)`, degrees.
    ra_halfwidth: F,
}

impl<'a, F: Float> BoxMatcher<'a, F> {
    fn new(reference: &'a Catalog<F>, comparison: &'a Catalog<F>, radius_arcsec: F) -> Self {
        debug_assert!(radius_arcsec > F::zero());
        let boxsize = radius_arcsec / F::from_f64(ARCSEC_PER_DEG).unwrap();
        // One correction factor for the whole run, from the mean reference
        // declination. Individual records far from the mean get a slightly
        // mis-sized RA box; the exact distance check below still decides.
        let delta = deg_to_rad(reference.mean_dec()).cos();
        Self {
            reference,
            comparison,
            radius_arcsec,
            boxsize,
            ra_halfwidth: boxsize / delta,
        }
    }

    fn match_one(&self, s1: usize) -> Option<Match<F>> {
        let (ra0, dec0) = self.reference.position(s1);

        let candidates = (0..self.comparison.len())
            .filter(|&s2| {
                let (ra, dec) = self.comparison.position(s2);
                dec < dec0 + self.boxsize
                    && dec > dec0 - self.boxsize
                    && ra < ra0 + self.ra_halfwidth
                    && ra > ra0 - self.ra_halfwidth
            })
            .collect_vec();

        if candidates.is_empty() {
            debug!("source {s1}: no candidates in box");
            return None;
        }

        // First occurrence wins on exact ties, so equal-distance candidates
        // resolve to the lowest comparison index.
        let (index, separation_arcsec) = candidates
            .iter()
            .map(|&s2| {
                let (ra, dec) = self.comparison.position(s2);
                (s2, angular_separation_arcsec(ra0, dec0, ra, dec))
            })
            .min_by(|(_, d1), (_, d2)| d1.partial_cmp(d2).expect("found nan"))
            .expect("candidate set is non-empty");

        // The box corners stick out past the circular radius; prune here.
        if separation_arcsec > self.radius_arcsec {
            debug!("source {s1}: nearest of {} candidates is outside the radius", candidates.len());
            return None;
        }

        debug!(
            "source {s1}: matched comparison record {index} at {separation_arcsec:?} arcsec ({} candidates)",
            candidates.len()
        );
        Some(Match {
            index,
            separation_arcsec,
        })
    }
}

/// Find the nearest comparison-catalog record within `radius_arcsec` of
/// every reference record.
///
/// Returns one result per reference record, in reference order. Candidates
/// are pre-filtered by a rectangular RA/Dec box of half-width
/// `radius_arcsec` (the RA side widened by the cosine of the mean reference
/// declination), then ranked by exact great-circle separation; ties break
/// to the lowest comparison index.
///
/// The box filter does not wrap right ascension at the 0°/360° boundary and
/// keeps a single RA width for the whole run, so true neighbours straddling
/// the wrap, or very close to the poles, can be missed. This mirrors the
/// behavior of the survey pipelines this routine was built against; callers
/// working near the wrap should rotate their coordinates first.
///
/// # Errors
/// Fails fast on an empty catalog or on any non-finite or out-of-range
/// coordinate; a record with no neighbour is reported as `None`, never as
/// an error.
///
/// # Example:
/// ```
/// # use ndarray::array;
/// # use skymatch::{match_catalogs, Catalog};
/// let reference = Catalog::from_degrees(array![[120.0, -45.0], [121.0, -45.0]]);
/// let comparison = Catalog::from_degrees(array![[121.0, -45.0]]);
/// let matches = match_catalogs(&reference, &comparison, 1.0).unwrap();
/// assert!(matches[0].is_none());
/// assert_eq!(matches[1].unwrap().index, 0);
/// ```
pub fn match_catalogs<F: Float>(
    reference: &Catalog<F>,
    comparison: &Catalog<F>,
    radius_arcsec: F,
) -> Result<MatchResults<F>, MatchError> {
    validate(reference, CatalogRole::Reference)?;
    validate(comparison, CatalogRole::Comparison)?;

    info!(
        "cross-matching {} reference sources against {} comparison sources within {radius_arcsec:?} arcsec",
        reference.len(),
        comparison.len()
    );
    let matcher = BoxMatcher::new(reference, comparison, radius_arcsec);
    let results = (0..reference.len()).map(|s1| matcher.match_one(s1)).collect_vec();

    let found = results.iter().filter(|m| m.is_some()).count();
    info!("matched {found} of {} reference sources", reference.len());
    Ok(results)
}

/// The central struct of this library.
///
/// Owns the two catalogs and the matching options; consume it with
/// [`run`](SkyMatch::run) (or [`run_par`](SkyMatch::run_par) with the
/// `parallel` feature).
///
/// # Example:
/// ```
/// # use ndarray::array;
/// # use skymatch::{Catalog, SkyMatch};
/// let reference = Catalog::from_degrees(array![[10.0, 20.0]]);
/// let comparison = Catalog::from_degrees(array![[10.0001, 20.0]]);
/// let matches = SkyMatch::new(reference, comparison)
///     .with_radius_arcsec(2.0)
///     .run()
///     .unwrap();
/// assert_eq!(matches[0].unwrap().index, 0);
/// ```
#[derive(Clone, Debug)]
pub struct SkyMatch<F: Float> {
    reference: Catalog<F>,
    comparison: Catalog<F>,
    radius_arcsec: F,
}

impl<F: Float> SkyMatch<F> {
    /// Match `reference` against `comparison` with the default radius of
    /// 1 arcsecond.
    pub fn new(reference: Catalog<F>, comparison: Catalog<F>) -> Self {
        Self {
            reference,
            comparison,
            radius_arcsec: F::from_f64(DEFAULT_RADIUS_ARCSEC).unwrap(),
        }
    }

    /// Set the search radius in arcseconds.
    pub fn with_radius_arcsec(mut self, radius_arcsec: F) -> Self {
        self.radius_arcsec = radius_arcsec;
        self
    }

    /// Run the match. See [`match_catalogs`] for the algorithm and error
    /// behavior.
    pub fn run(self) -> Result<MatchResults<F>, MatchError> {
        match_catalogs(&self.reference, &self.comparison, self.radius_arcsec)
    }
}

#[cfg(feature = "parallel")]
pub use parallel::*;

#[cfg(feature = "parallel")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    /// Parallel [`match_catalogs`]: one rayon task per reference record.
    ///
    /// Per-record matches are independent, and the indexed collect restores
    /// reference-catalog order, so the output is identical to the serial
    /// version.
    pub fn match_catalogs_par<F: Float + Send + Sync>(
        reference: &Catalog<F>,
        comparison: &Catalog<F>,
        radius_arcsec: F,
    ) -> Result<MatchResults<F>, MatchError> {
        validate(reference, CatalogRole::Reference)?;
        validate(comparison, CatalogRole::Comparison)?;

        info!(
            "cross-matching {} reference sources against {} comparison sources within {radius_arcsec:?} arcsec (parallel)",
            reference.len(),
            comparison.len()
        );
        let matcher = BoxMatcher::new(reference, comparison, radius_arcsec);
        let results: Vec<_> = (0..reference.len())
            .into_par_iter()
            .map(|s1| matcher.match_one(s1))
            .collect();

        let found = results.iter().filter(|m| m.is_some()).count();
        info!("matched {found} of {} reference sources", reference.len());
        Ok(results)
    }

    impl<F: Float + Send + Sync> SkyMatch<F> {
        /// Run the match in parallel. Output is identical to
        /// [`run`](SkyMatch::run).
        pub fn run_par(self) -> Result<MatchResults<F>, MatchError> {
            match_catalogs_par(&self.reference, &self.comparison, self.radius_arcsec)
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;
    use crate::geometry::angular_separation_arcsec;

    fn reference_single(ra: f64, dec: f64) -> Catalog<f64> {
        Catalog::from_degrees(vec![[ra, dec]])
    }

    #[test]
    fn output_aligned_with_reference_order() {
        let reference = Catalog::from_degrees(array![
            [150.0, 5.0],
            [150.1, 5.0],
            [150.2, 5.0],
        ]);
        let comparison = Catalog::from_degrees(array![[150.2, 5.0], [150.0, 5.0]]);

        let matches = match_catalogs(&reference, &comparison, 1.0).unwrap();

        assert_eq!(matches.len(), reference.len());
        assert_eq!(matches[0].unwrap().index, 1);
        assert!(matches[1].is_none());
        assert_eq!(matches[2].unwrap().index, 0);
    }

    #[test]
    fn offset_is_exact_separation() {
        let reference = reference_single(200.0, -30.0);
        let comparison = Catalog::from_degrees(vec![[200.0001, -30.0001]]);

        let matches = match_catalogs(&reference, &comparison, 2.0).unwrap();

        let m = matches[0].unwrap();
        let expected = angular_separation_arcsec(200.0, -30.0, 200.0001, -30.0001);
        assert_abs_diff_eq!(m.separation_arcsec, expected, epsilon = 1e-9);
    }

    #[test]
    fn just_outside_radius_is_no_match() {
        // ~1.01" away on the sky; outside a 1" radius, inside 2"
        let reference = reference_single(10.0, 20.0);
        let comparison = Catalog::from_degrees(vec![[10.0003, 20.0]]);

        let tight = match_catalogs(&reference, &comparison, 1.0).unwrap();
        assert!(tight[0].is_none());

        let loose = match_catalogs(&reference, &comparison, 2.0).unwrap();
        let m = loose[0].unwrap();
        assert_eq!(m.index, 0);
        assert!(m.separation_arcsec > 1.0 && m.separation_arcsec < 1.08);
    }

    #[test]
    fn coincident_source_matches_at_zero_offset() {
        let reference = reference_single(321.5, 48.2);
        let comparison = Catalog::from_degrees(vec![[321.5, 48.2]]);

        let matches = match_catalogs(&reference, &comparison, 1.0).unwrap();

        let m = matches[0].unwrap();
        assert_eq!(m.index, 0);
        assert_abs_diff_eq!(m.separation_arcsec, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn comparison_in_radians_matches_degrees() {
        let reference = Catalog::from_degrees(vec![[45.0, 10.0], [46.0, 10.0]]);
        let degrees: Vec<[f64; 2]> = vec![[46.0, 10.0], [45.0, 10.0]];
        let radians = degrees
            .iter()
            .map(|&[ra, dec]| [ra.to_radians(), dec.to_radians()])
            .collect::<Vec<_>>();

        let from_deg =
            match_catalogs(&reference, &Catalog::from_degrees(degrees), 1.0).unwrap();
        let from_rad =
            match_catalogs(&reference, &Catalog::from_radians(radians), 1.0).unwrap();

        assert_eq!(from_deg[0].unwrap().index, 1);
        assert_eq!(from_deg[1].unwrap().index, 0);
        for (d, r) in from_deg.iter().zip(&from_rad) {
            assert_eq!(d.unwrap().index, r.unwrap().index);
            assert_abs_diff_eq!(
                d.unwrap().separation_arcsec,
                r.unwrap().separation_arcsec,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn equidistant_tie_breaks_to_lowest_index() {
        let reference = reference_single(180.0, 0.0);
        // duplicated record: separations are bit-identical
        let comparison = Catalog::from_degrees(vec![[180.0002, 0.0], [180.0002, 0.0]]);

        let matches = match_catalogs(&reference, &comparison, 1.0).unwrap();

        assert_eq!(matches[0].unwrap().index, 0);
    }

    #[test]
    fn minimality_over_box_candidates() {
        let reference = reference_single(60.0, 15.0);
        // all candidates inside the box for a 5" radius
        let comparison = Catalog::from_degrees(vec![
            [60.0008, 15.0002],
            [60.0002, 15.0001],
            [59.9996, 15.0003],
            [60.0001, 14.9998],
        ]);

        let matches = match_catalogs(&reference, &comparison, 5.0).unwrap();

        let m = matches[0].unwrap();
        for s2 in 0..comparison.len() {
            let (ra, dec) = comparison.position(s2);
            let sep = angular_separation_arcsec(60.0, 15.0, ra, dec);
            assert!(m.separation_arcsec <= sep + 1e-12);
        }
    }

    #[test]
    fn no_candidates_in_box_is_none() {
        let reference = reference_single(10.0, 0.0);
        let comparison = Catalog::from_degrees(vec![[190.0, 0.0], [10.0, 45.0]]);

        let matches = match_catalogs(&reference, &comparison, 1.0).unwrap();

        assert!(matches[0].is_none());
    }

    #[test]
    fn box_does_not_wrap_in_ra() {
        // 0.72" apart on the sky, but on opposite sides of RA 0
        let reference = reference_single(0.0001, 0.0);
        let comparison = Catalog::from_degrees(vec![[359.9999, 0.0]]);
        assert!(angular_separation_arcsec(0.0001, 0.0, 359.9999, 0.0) < 1.0);

        let matches = match_catalogs(&reference, &comparison, 1.0).unwrap();

        assert!(matches[0].is_none());
    }

    #[test]
    fn idempotent_over_reruns() {
        let reference = Catalog::from_degrees(vec![[82.1, -5.4], [82.2, -5.4], [82.3, -5.4]]);
        let comparison =
            Catalog::from_degrees(vec![[82.2999, -5.4001], [82.1002, -5.3999], [90.0, 0.0]]);

        let first = match_catalogs(&reference, &comparison, 2.0).unwrap();
        let second = match_catalogs(&reference, &comparison, 2.0).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn empty_catalogs_are_fatal() {
        let empty = Catalog::<f64>::from_degrees(Vec::<[f64; 2]>::new());
        let cat = reference_single(1.0, 2.0);

        match match_catalogs(&empty, &cat, 1.0) {
            Err(MatchError::EmptyCatalog {
                role: CatalogRole::Reference,
            }) => {}
            other => panic!("expected reference EmptyCatalog, got {other:?}"),
        }
        match match_catalogs(&cat, &empty, 1.0) {
            Err(MatchError::EmptyCatalog {
                role: CatalogRole::Comparison,
            }) => {}
            other => panic!("expected comparison EmptyCatalog, got {other:?}"),
        }
    }

    #[test]
    fn malformed_coordinates_are_fatal() {
        let reference = reference_single(1.0, 2.0);

        let nan = Catalog::from_degrees(vec![[3.0, 4.0], [f64::NAN, 4.0]]);
        match match_catalogs(&reference, &nan, 1.0) {
            Err(MatchError::InvalidCoordinate {
                role: CatalogRole::Comparison,
                index: 1,
                ..
            }) => {}
            other => panic!("expected InvalidCoordinate, got {other:?}"),
        }

        let out_of_range = Catalog::from_degrees(vec![[3.0, 95.0]]);
        match match_catalogs(&out_of_range, &reference_single(3.0, 4.0), 1.0) {
            Err(MatchError::InvalidCoordinate {
                role: CatalogRole::Reference,
                index: 0,
                ..
            }) => {}
            other => panic!("expected InvalidCoordinate, got {other:?}"),
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_serial() {
        use rand::Rng;

        let mut rng = rand::rng();
        let reference = Catalog::from_degrees(
            (0..200)
                .map(|_| {
                    [
                        rng.random_range(140.0..141.0),
                        rng.random_range(-20.0..-19.0),
                    ]
                })
                .collect::<Vec<_>>(),
        );
        let comparison = Catalog::from_degrees(
            (0..300)
                .map(|_| {
                    [
                        rng.random_range(140.0..141.0),
                        rng.random_range(-20.0..-19.0),
                    ]
                })
                .collect::<Vec<_>>(),
        );

        let serial = match_catalogs(&reference, &comparison, 5.0).unwrap();
        let parallel = match_catalogs_par(&reference, &comparison, 5.0).unwrap();

        assert_eq!(serial, parallel);
    }
}
