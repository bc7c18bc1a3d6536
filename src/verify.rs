//! Verification of rasterized primitives against a reference derived from the scene
use crate::{
    CoverageContext, Error, Footprint, Image, ImageMut, ImageOwned, LinColor, LineMode,
    PreparedPrimitive, PrimitiveKind, RGBA, Rule, Scene, Size, VerificationArguments,
    VerificationMode,
    coverage::Coverage,
    interpolate::{
        INTERPOLATION_EPSILON, verify_line_interpolation, verify_triangle_interpolation,
    },
    utils::{dilate, pixel_span},
    verdict::{
        Diagnostics, ERROR_MASK_ERROR, ERROR_MASK_OK, ERROR_MASK_OUTLIER, Mismatch,
        ToleranceWindow, Verdict, channel_thresholds, with_relaxed_retry, within_range,
        within_threshold,
    },
};

/// Expected value of a single pixel
#[derive(Debug, Clone, Copy, PartialEq)]
struct ReferencePixel {
    color: LinColor,
    /// Acceptance range, only used for ambiguous pixels
    lo: LinColor,
    hi: LinColor,
    ambiguous: bool,
    /// Extra tolerance (8-bit units) for interpolated colors
    headroom: u8,
}

impl ReferencePixel {
    fn new(color: LinColor) -> Self {
        Self {
            color,
            lo: color,
            hi: color,
            ambiguous: false,
            headroom: 0,
        }
    }

    fn full(&mut self, color: LinColor, headroom: u8) {
        *self = Self {
            headroom,
            ..Self::new(color)
        };
    }

    fn partial(&mut self, color: LinColor, weight: f32, ambiguous: bool, headroom: u8) {
        let blended = self.color.lerp(color, weight);
        if ambiguous {
            self.lo = self.lo.min(self.color).min(color).min(blended);
            self.hi = self.hi.max(self.color).max(color).max(blended);
            self.ambiguous = true;
        } else if self.ambiguous {
            self.lo = self.lo.min(blended);
            self.hi = self.hi.max(blended);
        } else {
            self.lo = blended;
            self.hi = blended;
        }
        self.color = blended;
        self.headroom = self.headroom.max(headroom);
    }

    /// Pixel may also take the provided color
    fn allow(&mut self, color: LinColor) {
        self.lo = self.lo.min(self.color).min(color);
        self.hi = self.hi.max(self.color).max(color);
        self.ambiguous = true;
    }

    /// Edge pixel of a multisample image, any blend of the current and provided colors
    fn resolve(&mut self, color: LinColor, center_covered: bool, headroom: u8) {
        self.allow(color);
        if center_covered {
            self.color = color;
        }
        self.headroom = self.headroom.max(headroom);
    }
}

/// Reference image accumulated from all primitives of a scene
#[derive(Debug, Clone)]
pub struct Reference {
    size: Size,
    pixels: Vec<ReferencePixel>,
}

impl Reference {
    /// Accumulate primitives in scene order
    pub fn build(ctx: &CoverageContext<'_>, prepared: &[PreparedPrimitive]) -> Self {
        let size = ctx.size();
        let scene = ctx.scene();
        let background = scene.background_color();
        let grid = ctx.grid();
        let mut pixels = vec![ReferencePixel::new(background); size.area()];
        let interpolation_headroom = (INTERPOLATION_EPSILON * 255.0).ceil() as u8;
        let multisampled = ctx.is_multisampled();
        let mut joints = Vec::new();

        for primitive in prepared {
            let headroom = if primitive.varying {
                interpolation_headroom
            } else {
                0
            };
            let (cols, rows) = ctx.pixel_range(primitive);
            for row in rows {
                for col in cols.clone() {
                    let pixel = &mut pixels[row * size.width + col];
                    let center = grid.pixel_center(col, row);
                    if ctx.rule() != Rule::Standard {
                        // must-cover and may-cover classification separated by the safety margin
                        if !primitive.stipple_drawn(center, grid.units()) {
                            continue;
                        }
                        let color = primitive.color_at(center);
                        if ctx.conservative_covers(primitive, col, row, -ctx.margin()) {
                            pixel.full(color, headroom);
                        } else if ctx.conservative_covers(primitive, col, row, ctx.margin()) {
                            pixel.allow(color);
                        }
                        continue;
                    }
                    let coverage = ctx.classify(primitive, col, row);
                    if multisampled
                        && coverage.coverage != Coverage::None
                        && !primitive.footprint.contains_rect(&grid.pixel(col, row))
                    {
                        // sample locations of the implementation are unknown
                        let covered = primitive.footprint.covers(center);
                        pixel.resolve(primitive.color_at(center), covered, headroom);
                        continue;
                    }
                    match coverage.coverage {
                        Coverage::None => {}
                        Coverage::Full => {
                            let color = primitive.color_at(center);
                            let previous = pixel.color;
                            pixel.full(color, headroom);
                            if let Footprint::Stepped(line) = &primitive.footprint {
                                // inclusion of the end fragments depends on the exit rule
                                if line.is_end(center) {
                                    pixel.allow(previous);
                                }
                            }
                        }
                        Coverage::Partial => {
                            let ambiguous = primitive
                                .footprint
                                .open_edge_touches_rect(&grid.pixel(col, row));
                            pixel.partial(
                                primitive.color_at(center),
                                coverage.weight(),
                                ambiguous,
                                headroom,
                            );
                        }
                    }
                }
            }
            for joint in &primitive.joints {
                joints.push((*joint, primitive.half_size, primitive.flat_color));
            }
        }

        // strip joints are resolved after all segments are drawn
        for (joint, half_size, color) in joints {
            let reach = half_size + grid.units();
            let cols = pixel_span(joint.x - reach, joint.x + reach, grid.units(), size.width);
            let rows = pixel_span(joint.y - reach, joint.y + reach, grid.units(), size.height);
            for row in rows {
                for col in cols.clone() {
                    let pixel = &mut pixels[row * size.width + col];
                    pixel.allow(color);
                    pixel.allow(background);
                }
            }
        }
        Self { size, pixels }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Expected colors quantized to 8 bits
    pub fn expected_image(&self) -> ImageOwned<RGBA> {
        ImageOwned::new_with(self.size.height, self.size.width, |row, col| {
            self.pixels[row * self.size.width + col].color.into()
        })
    }

    /// Number of pixels whose value is not uniquely determined
    pub fn ambiguous_count(&self) -> usize {
        self.pixels.iter().filter(|pixel| pixel.ambiguous).count()
    }
}

/// Render the reference image of the scene, useful as the expected image of a test
pub fn render_reference(
    scene: &Scene,
    args: &VerificationArguments,
    size: Size,
) -> Result<ImageOwned<RGBA>, Error> {
    let ctx = CoverageContext::new(scene, args, size)?;
    let prepared = ctx.prepare()?;
    Ok(Reference::build(&ctx, &prepared).expected_image())
}

fn pixel_at<I: Image<Pixel = RGBA>>(image: &I, row: usize, col: usize) -> RGBA {
    image.get(row, col).copied().unwrap_or_default()
}

/// Anti-aliased images must contain at least one pixel with fractional alpha
fn has_fractional_alpha<I: Image<Pixel = RGBA>>(image: &I) -> bool {
    (0..image.height()).any(|row| {
        (0..image.width()).any(|col| {
            let alpha = pixel_at(image, row, col).alpha();
            alpha > 0 && alpha < 255
        })
    })
}

/// Compare actual image with the reference under the tolerance window
fn compare<I: Image<Pixel = RGBA>>(
    image: &I,
    reference: &Reference,
    window: ToleranceWindow,
    thresholds: [u8; 3],
) -> Verdict {
    let Size { width, height } = reference.size;
    let pixels = &reference.pixels;

    // acceptance ranges of ambiguous pixels extended to the band around them
    let mut ranges: Vec<Option<(LinColor, LinColor)>> = vec![None; pixels.len()];
    if window.accept_ambiguous {
        let ambiguous: Vec<bool> = pixels.iter().map(|pixel| pixel.ambiguous).collect();
        let band = dilate(&ambiguous, width, height, window.band);
        for row in 0..height {
            for col in 0..width {
                let index = row * width + col;
                if !band[index] {
                    continue;
                }
                let own = &pixels[index];
                let mut range = (own.lo, own.hi);
                let rows = row.saturating_sub(window.band)..(row + window.band + 1).min(height);
                for other_row in rows {
                    let cols = col.saturating_sub(window.band)..(col + window.band + 1).min(width);
                    for other_col in cols {
                        let other = &pixels[other_row * width + other_col];
                        if other.ambiguous {
                            range = (range.0.min(other.lo), range.1.max(other.hi));
                        }
                    }
                }
                ranges[index] = Some(range);
            }
        }
    }
    let band_pixels = ranges.iter().filter(|range| range.is_some()).count();

    let mut errors = Vec::new();
    let mut outliers = Vec::new();
    for row in 0..height {
        for col in 0..width {
            let index = row * width + col;
            let pixel = &pixels[index];
            let actual = pixel_at(image, row, col);
            if within_threshold(actual, pixel.color.into(), thresholds, pixel.headroom) {
                continue;
            }
            match ranges[index] {
                Some((lo, hi)) if within_range(actual, lo, hi, thresholds, pixel.headroom) => {}
                Some(_) => outliers.push(index),
                None => errors.push(index),
            }
        }
    }
    let allowed = window.allowed_outliers(band_pixels);
    let tolerated = outliers.len() <= allowed;
    if !tolerated {
        errors.append(&mut outliers);
        errors.sort_unstable();
    }
    tracing::debug!(
        errors = errors.len(),
        outliers = outliers.len(),
        band_pixels,
        ambiguous = reference.ambiguous_count(),
        "image compared"
    );

    let Some(first) = errors.first().copied() else {
        let mut message = String::from("image is valid");
        if !outliers.is_empty() {
            message = format!(
                "image is valid, {} of {} allowed outliers",
                outliers.len(),
                allowed
            );
        }
        return Verdict::pass(message);
    };

    let expected = reference.expected_image();
    let mut error_mask = ImageOwned::new_with(height, width, |_, _| ERROR_MASK_OK);
    let mask = error_mask.data_mut();
    for index in &outliers {
        mask[*index] = ERROR_MASK_OUTLIER;
    }
    for index in &errors {
        mask[*index] = ERROR_MASK_ERROR;
    }
    let (y, x) = (first / width, first % width);
    let first_mismatch = Mismatch {
        x,
        y,
        expected: pixel_at(&expected, y, x),
        actual: pixel_at(image, y, x),
    };
    Verdict {
        message: format!("{} pixels differ from the reference", errors.len()),
        first_mismatch: Some(first_mismatch),
        mismatch_count: errors.len(),
        diagnostics: Some(Diagnostics {
            actual: image.to_packed(),
            expected,
            error_mask,
        }),
        ..Verdict::fail("")
    }
}

pub(crate) fn check_kind(
    scene: &Scene,
    check: &'static str,
    expected: PrimitiveKind,
) -> Result<(), Error> {
    match scene.validate()? {
        Some(kind) if kind != expected => Err(Error::UnsupportedScene { check, kind }),
        _ => Ok(()),
    }
}

fn verify_coverage<I: Image<Pixel = RGBA>>(
    image: &I,
    scene: &Scene,
    args: &VerificationArguments,
    mode: VerificationMode,
) -> Result<Verdict, Error> {
    tracing::debug_span!("[verify]", kind = ?scene.kind(), ?mode).in_scope(|| {
        let ctx = CoverageContext::new(scene, args, image.size())?;
        let prepared = ctx.prepare()?;
        let reference = Reference::build(&ctx, &prepared);
        if mode == VerificationMode::Smooth && !has_fractional_alpha(image) {
            return Ok(Verdict::fail(
                "anti-aliased rendering expected but no pixel has fractional alpha",
            ));
        }
        let window = ToleranceWindow::new(mode, args.num_samples);
        Ok(compare(image, &reference, window, channel_thresholds(args)))
    })
}

/// Verify image of a triangle scene
pub fn verify_triangle_group<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    check_kind(scene, "triangle verification", PrimitiveKind::Triangle)?;
    verify_coverage(&image, scene, args, scene.verification_mode)
}

/// Verify image of a line scene
///
/// Bresenham lines are never multisampled, so the sample count is ignored for them.
pub fn verify_line_group<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    check_kind(scene, "line verification", PrimitiveKind::Line)?;
    verify_lines(&image, scene, args, scene.verification_mode)
}

fn verify_lines<I: Image<Pixel = RGBA>>(
    image: &I,
    scene: &Scene,
    args: &VerificationArguments,
    mode: VerificationMode,
) -> Result<Verdict, Error> {
    if scene.line_mode == LineMode::Bresenham && args.num_samples != 0 {
        let args = args.with_samples(0);
        return verify_coverage(image, scene, &args, mode);
    }
    verify_coverage(image, scene, args, mode)
}

/// Verify line scene, retrying once with relaxed tolerances
///
/// Image that only passes the relaxed check yields a quality warning.
pub fn verify_relaxed_line_group<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    check_kind(scene, "line verification", PrimitiveKind::Line)?;
    with_relaxed_retry(scene.verification_mode, "line verification", |mode| {
        verify_lines(&image, scene, args, mode)
    })
}

/// Verify image of a point scene
pub fn verify_point_group<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    check_kind(scene, "point verification", PrimitiveKind::Point)?;
    verify_coverage(&image, scene, args, scene.verification_mode)
}

/// What the fill rule verification requires of every pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillRuleCoverage {
    /// Triangles cover only part of the image, only overdraw is checked
    Partial,
    /// Triangles cover the whole image, background pixels are gaps
    Full,
}

/// Verify that additively blended triangles of a single color neither overlap nor leave gaps
///
/// Stops at the first offending pixel.
pub fn verify_fill_rule<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
    coverage: FillRuleCoverage,
) -> Result<Verdict, Error> {
    check_kind(scene, "fill rule verification", PrimitiveKind::Triangle)?;
    args.validate()?;
    let size = image.size();
    if size.is_empty() {
        return Err(Error::EmptyImage(size));
    }
    scene.check_viewport(size)?;
    tracing::debug_span!("[fill-rule]", ?coverage).in_scope(|| {
        let color: RGBA = scene
            .primitives
            .first()
            .map_or(scene.background_color(), |primitive| {
                primitive.provoking_vertex().lin_color()
            })
            .into();
        let thresholds = channel_thresholds(args);
        let expected = color.to_rgb();
        for row in 0..size.height {
            for col in 0..size.width {
                let actual = pixel_at(&image, row, col);
                let channels = actual.to_rgb();
                let overdraw = (0..3).any(|index| {
                    channels[index] as u32 > expected[index] as u32 + thresholds[index] as u32
                });
                let missing = coverage == FillRuleCoverage::Full
                    && (0..3).any(|index| channels[index] <= thresholds[index]);
                if !overdraw && !missing {
                    continue;
                }
                let message = if overdraw {
                    format!("overdraw at {},{}: {} exceeds {}", col, row, actual, color)
                } else {
                    format!("missing fragment at {},{}: {}", col, row, actual)
                };
                let mut error_mask =
                    ImageOwned::new_with(size.height, size.width, |_, _| ERROR_MASK_OK);
                error_mask.data_mut()[row * size.width + col] = ERROR_MASK_ERROR;
                return Ok(Verdict {
                    first_mismatch: Some(Mismatch {
                        x: col,
                        y: row,
                        expected: color,
                        actual,
                    }),
                    mismatch_count: 1,
                    diagnostics: Some(Diagnostics {
                        actual: image.to_packed(),
                        expected: ImageOwned::new_with(size.height, size.width, |_, _| color),
                        error_mask,
                    }),
                    ..Verdict::fail(message)
                });
            }
        }
        Ok(Verdict::pass("no overdraw or missing fragments"))
    })
}

/// Verification strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Check {
    /// Coverage of triangles, lines or points depending on the scene
    Coverage,
    /// Line coverage with a single relaxed retry
    RelaxedLines,
    FillRule(FillRuleCoverage),
    /// Attribute interpolation of triangles or lines
    Interpolation,
}

/// Run the selected check on the image
pub fn verify<I: Image<Pixel = RGBA>>(
    check: Check,
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    let kind = scene.validate()?;
    match (check, kind) {
        (Check::Coverage, None | Some(PrimitiveKind::Triangle)) => {
            verify_triangle_group(image, scene, args)
        }
        (Check::Coverage, Some(PrimitiveKind::Line)) => verify_line_group(image, scene, args),
        (Check::Coverage, Some(PrimitiveKind::Point)) => verify_point_group(image, scene, args),
        (Check::RelaxedLines, _) => verify_relaxed_line_group(image, scene, args),
        (Check::FillRule(coverage), _) => verify_fill_rule(image, scene, args, coverage),
        (Check::Interpolation, Some(PrimitiveKind::Line)) => {
            verify_line_interpolation(image, scene, args)
        }
        (Check::Interpolation, Some(PrimitiveKind::Point)) => Err(Error::UnsupportedScene {
            check: "interpolation verification",
            kind: PrimitiveKind::Point,
        }),
        (Check::Interpolation, _) => verify_triangle_interpolation(image, scene, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConservativeConfig, ConservativeMode, CoordinateSpace, ImageMut, LinePrimitive,
        TrianglePrimitive, Vertex, VerdictStatus,
    };
    use rand::{Rng, SeedableRng, rngs::StdRng};

    const WHITE: RGBA = RGBA::new(255, 255, 255, 255);
    const BLACK: RGBA = RGBA::new(0, 0, 0, 255);

    fn square_scene() -> Scene {
        let a = Vertex::xy(-1.0, -1.0);
        let b = Vertex::xy(1.0, -1.0);
        let c = Vertex::xy(1.0, 1.0);
        let d = Vertex::xy(-1.0, 1.0);
        Scene::triangles([
            TrianglePrimitive::new([a, b, c]).with_shared_edges([false, false, true]),
            TrianglePrimitive::new([a, c, d]).with_shared_edges([true, false, false]),
        ])
    }

    fn args() -> VerificationArguments {
        VerificationArguments::new(8, [8, 8, 8])
    }

    fn filled(size: usize, color: RGBA) -> ImageOwned<RGBA> {
        ImageOwned::new_with(size, size, |_, _| color)
    }

    #[test]
    fn test_shared_edge_square() -> Result<(), Error> {
        let scene = square_scene();
        let verdict = verify_triangle_group(&filled(8, WHITE), &scene, &args())?;
        assert_eq!(verdict.status, VerdictStatus::Pass, "{}", verdict);
        assert!(verdict.diagnostics.is_none());

        let mut image = filled(8, WHITE);
        *image.get_mut(3, 5).unwrap() = BLACK;
        let verdict = verify_triangle_group(&image, &scene, &args())?;
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.mismatch_count, 1);
        assert_eq!(
            verdict.first_mismatch,
            Some(Mismatch {
                x: 5,
                y: 3,
                expected: WHITE,
                actual: BLACK
            })
        );
        let diagnostics = verdict.diagnostics.unwrap();
        assert_eq!(diagnostics.error_mask.get(3, 5), Some(&ERROR_MASK_ERROR));
        assert_eq!(diagnostics.error_mask.get(0, 0), Some(&ERROR_MASK_OK));
        assert_eq!(diagnostics.expected.get(3, 5), Some(&WHITE));
        assert_eq!(diagnostics.actual.get(3, 5), Some(&BLACK));
        Ok(())
    }

    #[test]
    fn test_reference_passes() -> Result<(), Error> {
        let mut rng = StdRng::seed_from_u64(11);
        let size = Size::new(16, 16);
        for _ in 0..16 {
            let mut vertex = || {
                Vertex::xy(rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2)).with_color([
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                    1.0,
                ])
            };
            let triangles = Scene::triangles([
                TrianglePrimitive::new([vertex(), vertex(), vertex()]),
                TrianglePrimitive::new([vertex(), vertex(), vertex()]),
            ]);
            let lines =
                Scene::lines([LinePrimitive::new([vertex(), vertex()])]).with_line_width(2.5);
            let points = Scene::points([vertex().with_size(3.0), vertex()]);
            for scene in [triangles, lines, points] {
                for samples in [0, 4] {
                    let args = args().with_samples(samples);
                    let image = render_reference(&scene, &args, size)?;
                    let verdict = verify(Check::Coverage, &image, &scene, &args)?;
                    assert!(verdict.is_pass(), "{}", verdict);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_ambiguous_edge() -> Result<(), Error> {
        // hypotenuse cuts pixels of column 1 in the lower rows
        let scene = Scene::triangles([TrianglePrimitive::new([
            Vertex::xy(0.0, 0.0),
            Vertex::xy(2.5, 0.0),
            Vertex::xy(2.5, 4.0),
        ])])
        .with_coordinates(CoordinateSpace::Window);
        let mut image = render_reference(&scene, &args(), Size::new(4, 4))?;
        // anti-aliased value of a pixel cut by the hypotenuse
        let gray = RGBA::new(128, 128, 128, 255);
        *image.get_mut(2, 1).unwrap() = gray;

        let strict = verify_triangle_group(&image, &scene, &args())?;
        assert!(strict.is_fail());
        let weak_scene = scene.clone().with_mode(VerificationMode::Weak);
        let weak = verify_triangle_group(&image, &weak_scene, &args())?;
        assert!(weak.is_pass(), "{}", weak);
        // resolved multisample images accept ambiguous pixels even in strict mode
        let samples = verify_triangle_group(&image, &scene, &args().with_samples(4))?;
        assert!(samples.is_pass(), "{}", samples);
        Ok(())
    }

    #[test]
    fn test_multisample_shared_edge_resolve() -> Result<(), Error> {
        let (red, blue) = ([1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]);
        let a = Vertex::xy(-1.0, -1.0);
        let b = Vertex::xy(1.0, -1.0);
        let c = Vertex::xy(1.0, 1.0);
        let d = Vertex::xy(-1.0, 1.0);
        let scene = Scene::triangles([
            TrianglePrimitive::new([a, b, c].map(|v| v.with_color(red)))
                .with_shared_edges([false, false, true]),
            TrianglePrimitive::new([a, c, d].map(|v| v.with_color(blue)))
                .with_shared_edges([true, false, false]),
        ]);
        let args = args().with_samples(4);
        let mut image = render_reference(&scene, &args, Size::new(8, 8))?;
        // diagonal pixels resolve to a mix of both triangles
        let purple = RGBA::new(128, 0, 128, 255);
        for i in 0..8 {
            *image.get_mut(i, i).unwrap() = purple;
        }
        for mode in [
            VerificationMode::Strict,
            VerificationMode::Weak,
            VerificationMode::Weaker,
        ] {
            let scene = scene.clone().with_mode(mode);
            let verdict = verify_triangle_group(&image, &scene, &args)?;
            assert!(verdict.is_pass(), "{:?}: {}", mode, verdict);
        }

        *image.get_mut(3, 3).unwrap() = RGBA::new(0, 255, 0, 255);
        assert!(verify_triangle_group(&image, &scene, &args)?.is_fail());
        // without multisampling the diagonal is owned by a single triangle
        assert!(verify_triangle_group(&image, &scene, &args.with_samples(0))?.is_fail());
        Ok(())
    }

    #[test]
    fn test_weaker_outliers() -> Result<(), Error> {
        let gray = [0.5, 0.5, 0.5, 1.0];
        let scene = Scene::triangles([TrianglePrimitive::new([
            Vertex::xy(-1.0, -1.0).with_color(gray),
            Vertex::xy(1.0, -1.0).with_color(gray),
            Vertex::xy(-1.0, 1.0).with_color(gray),
        ])]);
        let mut image = render_reference(&scene, &args(), Size::new(32, 32))?;
        // pixel next to the hypotenuse gets a color outside of any range
        *image.get_mut(15, 15).unwrap() = WHITE;
        let weak_scene = scene.clone().with_mode(VerificationMode::Weak);
        let weak = verify_triangle_group(&image, &weak_scene, &args())?;
        assert!(weak.is_fail());
        let weaker_scene = scene.clone().with_mode(VerificationMode::Weaker);
        let weaker = verify_triangle_group(&image, &weaker_scene, &args())?;
        assert!(weaker.is_pass(), "{}", weaker);
        assert!(weaker.message.contains("outliers"));
        Ok(())
    }

    #[test]
    fn test_relaxed_line_retry() -> Result<(), Error> {
        let line = LinePrimitive::new([Vertex::xy(0.0, 2.0), Vertex::xy(8.0, 2.0)]);
        let scene = Scene::lines([line]).with_coordinates(CoordinateSpace::Window);
        let reference = render_reference(&scene, &args(), Size::new(8, 4))?;
        assert_eq!(reference.get(2, 0), Some(&WHITE));
        assert_eq!(reference.get(1, 0), Some(&BLACK));
        assert!(verify_relaxed_line_group(&reference, &scene, &args())?.is_pass());

        // line drawn one row lower
        let shifted = ImageOwned::new_with(4, 8, |row, _| if row == 1 { WHITE } else { BLACK });
        let strict = verify_line_group(&shifted, &scene, &args())?;
        assert!(strict.is_fail());
        let relaxed = verify_relaxed_line_group(&shifted, &scene, &args())?;
        assert_eq!(relaxed.status, VerdictStatus::QualityWarning, "{}", relaxed);

        // fragments two rows away fail even after the retry
        let thick = ImageOwned::new_with(4, 8, |row, _| if row >= 2 { WHITE } else { BLACK });
        let relaxed = verify_relaxed_line_group(&thick, &scene, &args())?;
        assert!(relaxed.is_fail());
        Ok(())
    }

    #[test]
    fn test_strip_joint() -> Result<(), Error> {
        let scene = Scene::lines([
            LinePrimitive::new([Vertex::xy(0.5, 0.5), Vertex::xy(4.5, 4.5)]),
            LinePrimitive::new([Vertex::xy(4.5, 4.5), Vertex::xy(7.5, 0.5)]),
        ])
        .with_strip(true)
        .with_line_width(2.0)
        .with_coordinates(CoordinateSpace::Window);
        let mut image = render_reference(&scene, &args(), Size::new(8, 8))?;
        let joint = image.get(4, 4).copied().unwrap_or_default();
        *image.get_mut(4, 4).unwrap() = if joint == WHITE { BLACK } else { WHITE };
        let verdict = verify_line_group(&image, &scene, &args().with_samples(4))?;
        assert!(verdict.is_pass(), "{}", verdict);
        Ok(())
    }

    #[test]
    fn test_smooth_requires_alpha() -> Result<(), Error> {
        let line = LinePrimitive::new([Vertex::xy(0.0, 2.0), Vertex::xy(8.0, 2.0)]);
        let scene = Scene::lines([line])
            .with_coordinates(CoordinateSpace::Window)
            .with_smooth(true)
            .with_mode(VerificationMode::Smooth);
        let mut image = render_reference(&scene, &args(), Size::new(8, 4))?;
        let verdict = verify_line_group(&image, &scene, &args())?;
        assert!(verdict.is_fail());
        assert!(verdict.message.contains("fractional alpha"));

        *image.get_mut(1, 3).unwrap() = RGBA::new(128, 128, 128, 128);
        let verdict = verify_line_group(&image, &scene, &args())?;
        assert!(verdict.is_pass(), "{}", verdict);
        Ok(())
    }

    #[test]
    fn test_degenerate_policy() -> Result<(), Error> {
        let scene = Scene::triangles([
            TrianglePrimitive::new([
                Vertex::xy(1.0, 1.0),
                Vertex::xy(3.0, 3.0),
                Vertex::xy(2.0, 2.0),
            ]),
            TrianglePrimitive::new([
                Vertex::xy(0.5, 3.0),
                Vertex::xy(3.5, 3.0),
                Vertex::xy(2.0, 3.0),
            ]),
        ])
        .with_coordinates(CoordinateSpace::Window);
        let config = ConservativeConfig::new(ConservativeMode::Overestimate, 0.0, 0.0, false)
            .with_degenerate_primitives(true);
        for config in [None, Some(config)] {
            let args = args().with_conservative(config);
            let mut image = filled(4, BLACK);
            assert!(verify_triangle_group(&image, &scene, &args)?.is_pass());
            *image.get_mut(2, 2).unwrap() = WHITE;
            assert!(verify_triangle_group(&image, &scene, &args)?.is_fail());
        }

        // rasterized degenerates must cover the pixels they touch
        let rasterized = ConservativeConfig {
            degenerate_rasterized: true,
            ..config
        };
        let args = args().with_conservative(Some(rasterized));
        let verdict = verify_triangle_group(&filled(4, BLACK), &scene, &args)?;
        assert!(verdict.is_fail());
        Ok(())
    }

    #[test]
    fn test_conservative_overestimate() -> Result<(), Error> {
        let scene = Scene::triangles([TrianglePrimitive::new([
            Vertex::xy(2.1, 2.1),
            Vertex::xy(2.15, 2.1),
            Vertex::xy(2.1, 2.15),
        ])])
        .with_coordinates(CoordinateSpace::Window);
        let config = ConservativeConfig::new(ConservativeMode::Overestimate, 0.0, 0.0, false);
        let args = args().with_conservative(Some(config));
        // touched pixels are the four pixels around the corner (2, 2)
        let image = ImageOwned::new_with(4, 4, |row, col| {
            if (1..=2).contains(&row) && (1..=2).contains(&col) {
                WHITE
            } else {
                BLACK
            }
        });
        let verdict = verify_triangle_group(&image, &scene, &args)?;
        assert!(verdict.is_fail(), "pixel (2, 2) is the only one touched");
        let image = ImageOwned::new_with(4, 4, |row, col| {
            if (row, col) == (2, 2) { WHITE } else { BLACK }
        });
        assert!(verify_triangle_group(&image, &scene, &args)?.is_pass());
        Ok(())
    }

    #[test]
    fn test_fill_rule() -> Result<(), Error> {
        let gray = [0.5, 0.5, 0.5, 1.0];
        let mut scene = square_scene();
        for primitive in &mut scene.primitives {
            if let crate::Primitive::Triangle(triangle) = primitive {
                for vertex in &mut triangle.vertices {
                    vertex.color = Some(gray);
                }
            }
        }
        let color = RGBA::from(LinColor::from(gray));
        let coverage = FillRuleCoverage::Full;
        assert!(verify_fill_rule(&filled(8, color), &scene, &args(), coverage)?.is_pass());

        let mut image = filled(8, color);
        *image.get_mut(4, 4).unwrap() = WHITE;
        let verdict = verify_fill_rule(&image, &scene, &args(), coverage)?;
        assert!(verdict.is_fail());
        assert!(verdict.message.starts_with("overdraw"));
        assert_eq!(verdict.first_mismatch.map(|m| (m.x, m.y)), Some((4, 4)));

        let mut image = filled(8, color);
        *image.get_mut(1, 6).unwrap() = BLACK;
        let verdict = verify_fill_rule(&image, &scene, &args(), coverage)?;
        assert!(verdict.message.starts_with("missing"));
        assert!(verify_fill_rule(&image, &scene, &args(), FillRuleCoverage::Partial)?.is_pass());

        let lines =
            Scene::lines([LinePrimitive::new([Vertex::xy(0.0, 0.0), Vertex::xy(1.0, 0.0)])]);
        assert!(matches!(
            verify(Check::FillRule(coverage), &image, &lines, &args()),
            Err(Error::UnsupportedScene { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_configuration_errors() {
        let scene = square_scene();
        let empty: ImageOwned<RGBA> = ImageOwned::new_default(0, 0);
        assert!(matches!(
            verify_triangle_group(&empty, &scene, &args()),
            Err(Error::EmptyImage(_))
        ));
        assert!(matches!(
            verify_triangle_group(
                &filled(4, BLACK),
                &scene,
                &VerificationArguments::new(30, [8, 8, 8])
            ),
            Err(Error::SubpixelBits(30))
        ));
        assert!(matches!(
            verify_point_group(&filled(4, BLACK), &scene, &args()),
            Err(Error::UnsupportedScene { .. })
        ));
    }

    #[test]
    fn test_idempotent_across_threads() -> Result<(), Error> {
        let scene = square_scene().with_mode(VerificationMode::Weak);
        let mut image = filled(16, WHITE);
        *image.get_mut(7, 3).unwrap() = BLACK;
        let args = args().with_samples(4);
        let expected = verify(Check::Coverage, &image, &scene, &args)?;
        assert_eq!(verify(Check::Coverage, &image, &scene, &args)?, expected);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| verify(Check::Coverage, &image, &scene, &args)))
                .collect();
            for handle in handles {
                let verdict = handle.join().expect("verification thread panicked");
                assert_eq!(verdict.ok().as_ref(), Some(&expected));
            }
        });
        Ok(())
    }
}
