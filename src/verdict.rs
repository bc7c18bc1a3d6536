//! Tolerance policy, verification outcome and aggregation across iterations
use crate::{Error, ImageOwned, LinColor, RGBA, VerificationArguments, VerificationMode};
use std::fmt;

/// Per-channel comparison threshold for a channel of `bits` depth, in 8-bit units
pub fn channel_threshold(bits: u32) -> u8 {
    let bits = bits.clamp(1, 8);
    (1u32 << (8 - bits)).min(255) as u8
}

/// Thresholds for red, green and blue channels
pub fn channel_thresholds(args: &VerificationArguments) -> [u8; 3] {
    args.channel_bits().map(channel_threshold)
}

/// Whether every color channel of `actual` is within `threshold` of `expected`
pub(crate) fn within_threshold(
    actual: RGBA,
    expected: RGBA,
    threshold: [u8; 3],
    headroom: u8,
) -> bool {
    let actual = actual.to_rgb();
    let expected = expected.to_rgb();
    (0..3).all(|index| {
        actual[index].abs_diff(expected[index]) as u32 <= threshold[index] as u32 + headroom as u32
    })
}

/// Whether every color channel of `actual` is inside `[lo, hi]` widened by `threshold`
pub(crate) fn within_range(
    actual: RGBA,
    lo: LinColor,
    hi: LinColor,
    threshold: [u8; 3],
    headroom: u8,
) -> bool {
    let actual = actual.to_rgb();
    let lo = RGBA::from(lo).to_rgb();
    let hi = RGBA::from(hi).to_rgb();
    (0..3).all(|index| {
        let slack = threshold[index] as u32 + headroom as u32;
        let value = actual[index] as u32;
        value + slack >= lo[index] as u32 && value <= hi[index] as u32 + slack
    })
}

/// How ambiguous pixels are treated by a verification mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceWindow {
    /// Ambiguous pixels may take any value inside of their acceptance range
    pub accept_ambiguous: bool,
    /// Acceptance ranges are extended to neighbours within this many pixels
    pub band: usize,
    /// Fraction of band pixels allowed to be outside of their range
    pub outlier_fraction: f64,
}

impl ToleranceWindow {
    pub fn new(mode: VerificationMode, num_samples: u32) -> Self {
        match mode {
            VerificationMode::Strict => Self {
                accept_ambiguous: num_samples > 0,
                band: 0,
                outlier_fraction: 0.0,
            },
            VerificationMode::Weak | VerificationMode::Smooth => Self {
                accept_ambiguous: true,
                band: 1,
                outlier_fraction: 0.0,
            },
            VerificationMode::Weaker => Self {
                accept_ambiguous: true,
                band: 2,
                outlier_fraction: 0.05,
            },
        }
    }

    /// Number of band pixels that may be outliers
    pub fn allowed_outliers(&self, band_pixels: usize) -> usize {
        (self.outlier_fraction * band_pixels as f64).floor() as usize
    }
}

/// Outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VerdictStatus {
    #[default]
    Pass,
    /// Image is acceptable only under relaxed tolerances
    QualityWarning,
    Fail,
}

impl VerdictStatus {
    /// Combine outcomes of two checks, failure dominates warning which dominates pass
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Pass => write!(f, "pass"),
            VerdictStatus::QualityWarning => write!(f, "quality warning"),
            VerdictStatus::Fail => write!(f, "fail"),
        }
    }
}

/// First pixel that did not match the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mismatch {
    pub x: usize,
    pub y: usize,
    pub expected: RGBA,
    pub actual: RGBA,
}

/// Worst interpolation error found inside of a primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationFailure {
    pub primitive: usize,
    pub x: usize,
    pub y: usize,
    pub expected: LinColor,
    pub actual: LinColor,
    pub delta: f32,
}

pub const ERROR_MASK_OK: RGBA = RGBA::new(0, 255, 0, 255);
pub const ERROR_MASK_ERROR: RGBA = RGBA::new(255, 0, 0, 255);
/// Pixel differs from the reference but is accepted as an outlier
pub const ERROR_MASK_OUTLIER: RGBA = RGBA::new(255, 255, 0, 255);

/// Images attached to a failed verdict
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub actual: ImageOwned<RGBA>,
    pub expected: ImageOwned<RGBA>,
    /// Green for accepted pixels and red for mismatches
    pub error_mask: ImageOwned<RGBA>,
}

impl Diagnostics {
    /// Write `actual.png`, `expected.png` and `error.png` into the directory
    #[cfg(feature = "png")]
    pub fn write_png(&self, dir: impl AsRef<std::path::Path>) -> Result<(), Error> {
        use crate::Image;

        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        for (name, image) in [
            ("actual.png", &self.actual),
            ("expected.png", &self.expected),
            ("error.png", &self.error_mask),
        ] {
            let file = std::fs::File::create(dir.join(name))?;
            let mut encoder = png::Encoder::new(
                std::io::BufWriter::new(file),
                image.width() as u32,
                image.height() as u32,
            );
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(bytemuck::cast_slice(image.data()))?;
            tracing::debug!(path = ?dir.join(name), "diagnostic image written");
        }
        Ok(())
    }
}

/// Result of a verification
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub message: String,
    pub first_mismatch: Option<Mismatch>,
    pub mismatch_count: usize,
    pub interpolation_failures: Vec<InterpolationFailure>,
    pub diagnostics: Option<Diagnostics>,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Fail,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == VerdictStatus::Fail
    }

    /// Downgrade passing verdict obtained with relaxed tolerances
    pub fn into_quality_warning(self, reason: &str) -> Self {
        if self.status != VerdictStatus::Pass {
            return self;
        }
        Self {
            status: VerdictStatus::QualityWarning,
            message: format!("{}: {}", reason, self.message),
            ..self
        }
    }

    /// Summary of the verdict without diagnostic images
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        let failures: Vec<_> = self
            .interpolation_failures
            .iter()
            .map(|failure| {
                serde_json::json!({
                    "primitive": failure.primitive,
                    "x": failure.x,
                    "y": failure.y,
                    "expected": <[f32; 4]>::from(failure.expected),
                    "actual": <[f32; 4]>::from(failure.actual),
                    "delta": failure.delta,
                })
            })
            .collect();
        serde_json::json!({
            "status": self.status,
            "message": self.message,
            "first_mismatch": self.first_mismatch,
            "mismatch_count": self.mismatch_count,
            "interpolation_failures": failures,
        })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)?;
        if let Some(mismatch) = &self.first_mismatch {
            write!(
                f,
                " (first mismatch at {},{}: expected {} actual {})",
                mismatch.x, mismatch.y, mismatch.expected, mismatch.actual
            )?;
        }
        Ok(())
    }
}

/// Fold of verdicts produced by multiple iterations of the same check
///
/// Starts in the initial state with no iterations, any failure makes the
/// aggregate fail and a quality warning downgrades a pass.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    iterations: usize,
    status: VerdictStatus,
    warnings: usize,
    first_failure: Option<(usize, Verdict)>,
    first_warning: Option<(usize, Verdict)>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Status so far, `None` if no iteration was recorded
    pub fn status(&self) -> Option<VerdictStatus> {
        (self.iterations > 0).then_some(self.status)
    }

    pub fn push(mut self, verdict: Verdict) -> Self {
        let iteration = self.iterations;
        tracing::debug!(iteration, status = ?verdict.status, "{}", verdict.message);
        self.iterations += 1;
        self.status = self.status.combine(verdict.status);
        match verdict.status {
            VerdictStatus::Pass => {}
            VerdictStatus::QualityWarning => {
                self.warnings += 1;
                self.first_warning.get_or_insert((iteration, verdict));
            }
            VerdictStatus::Fail => {
                self.first_failure.get_or_insert((iteration, verdict));
            }
        }
        self
    }

    /// Final verdict, details are taken from the first iteration with the final status
    pub fn finish(self) -> Result<Verdict, Error> {
        if self.iterations == 0 {
            return Err(Error::NoIterations);
        }
        let verdict = match self.status {
            VerdictStatus::Pass => Verdict::pass(format!(
                "all {} iterations passed",
                self.iterations
            )),
            VerdictStatus::QualityWarning => {
                let (iteration, verdict) = self.first_warning.unwrap_or_default();
                Verdict {
                    message: format!(
                        "{} of {} iterations passed with quality warnings, first at iteration {}: {}",
                        self.warnings, self.iterations, iteration, verdict.message
                    ),
                    ..verdict
                }
            }
            VerdictStatus::Fail => {
                let (iteration, verdict) = self.first_failure.unwrap_or_default();
                Verdict {
                    message: format!(
                        "iteration {} of {} failed: {}",
                        iteration, self.iterations, verdict.message
                    ),
                    ..verdict
                }
            }
        };
        tracing::info!(
            status = ?verdict.status,
            iterations = self.iterations,
            "{}",
            verdict.message
        );
        Ok(verdict)
    }
}

/// Run check in the given mode and once more with relaxed tolerance if it fails
///
/// Verdict that only passes after relaxation is downgraded to a quality warning.
pub(crate) fn with_relaxed_retry<F>(
    mode: VerificationMode,
    what: &str,
    mut check: F,
) -> Result<Verdict, Error>
where
    F: FnMut(VerificationMode) -> Result<Verdict, Error>,
{
    let verdict = check(mode)?;
    if !verdict.is_fail() {
        return Ok(verdict);
    }
    let Some(relaxed) = mode.relaxed() else {
        return Ok(verdict);
    };
    tracing::warn!(?mode, ?relaxed, "{} failed, retrying with relaxed tolerance", what);
    let retry = check(relaxed)?;
    if retry.is_fail() {
        return Ok(verdict);
    }
    tracing::warn!(?relaxed, "{} only passes with relaxed tolerance", what);
    Ok(retry.into_quality_warning("passed with relaxed tolerance"))
}

/// Run a check for every iteration input and aggregate the verdicts
pub fn verify_iterations<I, F>(iterations: I, mut verify: F) -> Result<Verdict, Error>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Result<Verdict, Error>,
{
    iterations
        .into_iter()
        .try_fold(Aggregate::new(), |aggregate, item| {
            Ok::<_, Error>(aggregate.push(verify(item)?))
        })?
        .finish()
}
