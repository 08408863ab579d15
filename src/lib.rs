#![warn(missing_docs)]

//! Positional cross-matching and variability statistics for photometric
//! source catalogs. \
//! Built for pairing an infrared survey catalog (WFCAM/UKIRT) with a
//! reference catalog (2MASS) and analyzing the resulting per-star time
//! series. No table I/O or plotting is included: catalogs arrive as
//! in-memory coordinate arrays and results leave as plain vectors, so any
//! table format can sit on either side.
//!
//! ## Interface
//! The central struct of this library is [`SkyMatch`]. It owns the
//! reference and comparison [`Catalog`]s, carries the matching parameters,
//! and produces one [`Match`] option per reference record. \
//! Construct catalogs with [`Catalog::from_degrees`] or
//! [`Catalog::from_radians`] — unit conversion happens at that boundary,
//! never inside the matcher.
//!
//! Example:
//! ```rust
//! use ndarray::array;
//! use skymatch::{Catalog, SkyMatch};
//!
//! let reference = Catalog::from_degrees(array![[10.0, 20.0], [10.1, 20.0]]);
//! // survey tables often carry radians; converted here, at the boundary
//! let comparison = Catalog::from_radians(array![[0.17453292519943295, 0.3490658503988659]]);
//!
//! let matches = SkyMatch::new(reference, comparison)
//!     .with_radius_arcsec(2.0)
//!     .run()
//!     .unwrap();
//! assert_eq!(matches[0].unwrap().index, 0);
//! assert!(matches[1].is_none());
//! ```
//!
//! With the `parallel` feature (default), [`SkyMatch::run_par`] matches
//! reference records on a rayon pool; output is identical to the serial
//! run.
//!
//! ## Beyond matching
//! The [`stats`] module computes per-band light-curve statistics (mean,
//! RMS, reduced chi-square, sigma-clipped variants via [`robust`], and the
//! Stetson variability index), and [`periodogram`] estimates dominant
//! frequencies either natively (Lomb-Scargle) or through an external
//! period-search program.

pub mod catalog;
pub mod geometry;
pub mod matching;
pub mod periodogram;
pub mod robust;
pub mod stats;

pub use catalog::{Catalog, IntoCoords};
#[cfg(feature = "parallel")]
pub use matching::match_catalogs_par;
pub use matching::{Match, MatchError, MatchResults, SkyMatch, match_catalogs};

/// A generic float trait such that the library is generic over `f32`/`f64`.
///
/// This trait is automatically implemented for all types implementing the
/// supertraits. Particularly, this includes `f32` and `f64`.
/// [`num_traits::Float`] is not a supertrait as its redundant definitions of
/// the basic math functions would clash with `nalgebra::RealField`'s.
pub trait Float: Copy + Default + nalgebra::RealField + num_traits::FromPrimitive {}

impl<F> Float for F where F: Copy + Default + nalgebra::RealField + num_traits::FromPrimitive {}
