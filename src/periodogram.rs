//! Period search for unevenly sampled light curves.
//!
//! Everything downstream only needs one capability: the best-fitting
//! frequency for a `(time, value, error)` series. [`FrequencyEstimator`]
//! captures that, with two providers: [`LombScargle`], a native normalized
//! periodogram, and [`RunChi2`], a wrapper around an external chi-square
//! period-search program. The external tool's input formatting and output
//! parsing are plain functions, so the fragile text handling is testable
//! without ever launching a process.

use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use log::debug;
use ndarray::{Array1, ArrayView1};
use thiserror::Error;

use crate::Float;

/// Period-search failures.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// Input arrays disagree on length.
    #[error("time, value, and error arrays must have matching lengths")]
    LengthMismatch,
    /// Not enough points for a frequency estimate.
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints {
        /// Minimum usable number of points.
        needed: usize,
        /// Number of points supplied.
        got: usize,
    },
    /// All time samples coincide.
    #[error("all time samples coincide")]
    ZeroBaseline,
    /// The series is constant; no frequency is meaningful.
    #[error("signal has zero variance")]
    ZeroVariance,
    /// Launching or reading the external tool failed.
    #[error("failed to run period-search tool: {0}")]
    Tool(#[from] std::io::Error),
    /// The external tool ran but reported failure.
    #[error("period-search tool exited with failure: {stderr}")]
    ToolFailed {
        /// Captured standard error, trimmed.
        stderr: String,
    },
    /// The external tool's output could not be parsed.
    #[error("unparseable period-search output line: {line:?}")]
    MalformedOutput {
        /// The offending line (empty if the output had none).
        line: String,
    },
}

/// Anything that can estimate the dominant frequency of a time series.
///
/// Frequencies are in cycles per unit of `time` (cycles/day for MJD input).
pub trait FrequencyEstimator<F: Float> {
    /// Best-fitting frequency for the series.
    fn best_frequency(
        &self,
        time: ArrayView1<'_, F>,
        value: ArrayView1<'_, F>,
        error: ArrayView1<'_, F>,
    ) -> Result<F, PeriodError>;
}

/// Normalized Lomb-Scargle periodogram (Scargle 1982).
///
/// Unweighted: per-point errors are ignored, as is usual for this
/// statistic. The frequency grid runs from `1 / (T * oversampling)` up to
/// `hifac` times the mean Nyquist frequency `n / (2T)`, in steps of the
/// grid minimum.
#[derive(Clone, Copy, Debug)]
pub struct LombScargle {
    /// Frequency grid oversampling factor.
    pub oversampling: f64,
    /// Highest-frequency factor relative to the mean Nyquist frequency.
    pub hifac: f64,
}

impl Default for LombScargle {
    fn default() -> Self {
        Self {
            oversampling: 6.,
            hifac: 6.,
        }
    }
}

impl LombScargle {
    /// Periodogram with the given oversampling and high-frequency factors.
    pub fn new(oversampling: f64, hifac: f64) -> Self {
        Self {
            oversampling,
            hifac,
        }
    }

    /// Evaluate the periodogram, returning `(frequencies, power)`.
    pub fn periodogram<F: Float>(
        &self,
        time: ArrayView1<'_, F>,
        value: ArrayView1<'_, F>,
    ) -> Result<(Array1<F>, Array1<F>), PeriodError> {
        let n = time.len();
        if n != value.len() {
            return Err(PeriodError::LengthMismatch);
        }
        if n < 2 {
            return Err(PeriodError::TooFewPoints { needed: 2, got: n });
        }

        let span = {
            let mut tmin = time[0];
            let mut tmax = time[0];
            for &t in time.iter() {
                if t < tmin {
                    tmin = t;
                }
                if t > tmax {
                    tmax = t;
                }
            }
            tmax - tmin
        };
        if span <= F::zero() {
            return Err(PeriodError::ZeroBaseline);
        }

        let len = F::from_usize(n).unwrap();
        let mean = value.sum() / len;
        let var = value.mapv(|y| (y - mean) * (y - mean)).sum() / len;
        if var <= F::zero() {
            return Err(PeriodError::ZeroVariance);
        }

        let nf = (0.5 * self.oversampling * self.hifac * n as f64) as usize;
        if nf == 0 {
            return Err(PeriodError::TooFewPoints { needed: 2, got: n });
        }
        let df = F::one() / (span * F::from_f64(self.oversampling).unwrap());
        let two = F::from_f64(2.).unwrap();

        let mut freqs = Array1::zeros(nf);
        let mut power = Array1::zeros(nf);
        for k in 0..nf {
            let f = df * F::from_usize(k + 1).unwrap();
            let omega = F::two_pi() * f;

            // per-frequency time offset tau makes the fit phase-invariant
            let mut s2 = F::zero();
            let mut c2 = F::zero();
            for &t in time.iter() {
                let arg = two * omega * t;
                s2 = s2 + arg.sin();
                c2 = c2 + arg.cos();
            }
            let tau = s2.atan2(c2) / (two * omega);

            let mut yc = F::zero();
            let mut ys = F::zero();
            let mut cc = F::zero();
            let mut ss = F::zero();
            for (&t, &y) in time.iter().zip(value.iter()) {
                let arg = omega * (t - tau);
                let c = arg.cos();
                let s = arg.sin();
                let dy = y - mean;
                yc = yc + dy * c;
                ys = ys + dy * s;
                cc = cc + c * c;
                ss = ss + s * s;
            }

            let mut p = F::zero();
            if cc > F::zero() {
                p = p + yc * yc / cc;
            }
            if ss > F::zero() {
                p = p + ys * ys / ss;
            }
            freqs[k] = f;
            power[k] = p / (two * var);
        }

        Ok((freqs, power))
    }
}

impl<F: Float> FrequencyEstimator<F> for LombScargle {
    fn best_frequency(
        &self,
        time: ArrayView1<'_, F>,
        value: ArrayView1<'_, F>,
        _error: ArrayView1<'_, F>,
    ) -> Result<F, PeriodError> {
        let (freqs, power) = self.periodogram(time, value)?;
        // first occurrence wins on ties
        let best = power
            .iter()
            .enumerate()
            .reduce(|acc, p| if acc.1 >= p.1 { acc } else { p })
            .expect("frequency grid is non-empty")
            .0;
        debug!("periodogram peak at grid point {best} of {}", freqs.len());
        Ok(freqs[best])
    }
}

/// Render a series in the external tool's input layout: a name line, a
/// count line, then one `time <tab> value <tab> error` row per point.
pub fn format_input<F: Float + Display>(
    name: &str,
    time: ArrayView1<'_, F>,
    value: ArrayView1<'_, F>,
    error: ArrayView1<'_, F>,
) -> Result<String, PeriodError> {
    if time.len() != value.len() || time.len() != error.len() {
        return Err(PeriodError::LengthMismatch);
    }

    let mut out = String::new();
    out.push_str(&format!("{name}\n"));
    out.push_str(&format!("{}\n", time.len()));
    for ((&t, &x), &e) in time.iter().zip(value.iter()).zip(error.iter()) {
        out.push_str(&format!("{t:.6} \t {x:.6} \t {e:.6}\n"));
    }
    Ok(out)
}

fn malformed(line: &str) -> PeriodError {
    PeriodError::MalformedOutput {
        line: line.to_string(),
    }
}

/// Extract the best frequency from the external tool's stdout.
///
/// The tool prints banner and progress lines first and its result last: a
/// tab-separated line of `name`, best frequency, and the fit statistic.
pub fn parse_output<F: Float>(stdout: &str) -> Result<F, PeriodError> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| malformed(""))?;

    let mut fields = line.split('\t');
    let _name = fields.next();
    let freq = fields.next().ok_or_else(|| malformed(line))?;
    let freq: f64 = freq.trim().parse().map_err(|_| malformed(line))?;
    F::from_f64(freq).ok_or_else(|| malformed(line))
}

/// Search bounds passed to the external tool when none are given.
pub const DEFAULT_SEARCH_RANGE: (u32, u32) = (3, 12);

/// External chi-square period-search program, one invocation per series.
///
/// Writes the series to `scratch_dir`, runs
/// `<program> <low> <high> -i <file>`, and parses the reported frequency
/// from stdout. Give each concurrently analyzed source its own label: the
/// label names both the scratch file and the series header.
#[derive(Clone, Debug)]
pub struct RunChi2 {
    program: PathBuf,
    scratch_dir: PathBuf,
    label: String,
    range: (u32, u32),
}

impl RunChi2 {
    /// Wrapper around a `runchi2` found on `PATH`, writing its input files
    /// into `scratch_dir`.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("runchi2"),
            scratch_dir: scratch_dir.into(),
            label: "skymatch".to_string(),
            range: DEFAULT_SEARCH_RANGE,
        }
    }

    /// Use an explicit program path instead of `runchi2` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Label the series; also names the scratch file.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the tool's search bounds.
    pub fn with_range(mut self, low: u32, high: u32) -> Self {
        self.range = (low, high);
        self
    }
}

impl<F: Float + Display> FrequencyEstimator<F> for RunChi2 {
    fn best_frequency(
        &self,
        time: ArrayView1<'_, F>,
        value: ArrayView1<'_, F>,
        error: ArrayView1<'_, F>,
    ) -> Result<F, PeriodError> {
        let input = format_input(&self.label, time, value, error)?;
        let path = self.scratch_dir.join(format!("{}.dat", self.label));
        fs::write(&path, input)?;

        debug!("running {:?} on {path:?}", self.program);
        let output = Command::new(&self.program)
            .arg(self.range.0.to_string())
            .arg(self.range.1.to_string())
            .arg("-i")
            .arg(&path)
            .output()?;
        if !output.status.success() {
            return Err(PeriodError::ToolFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}
