//! Verification of perspective-correct attribute interpolation
use crate::{
    CoverageContext, Error, FixedPoint, Image, ImageMut, ImageOwned, LinColor, PreparedPrimitive,
    PrimitiveKind, RGBA, Rule, Scene, VerificationArguments, VerificationMode,
    coverage::Coverage,
    verdict::{
        Diagnostics, ERROR_MASK_ERROR, ERROR_MASK_OK, InterpolationFailure, Mismatch, Verdict,
        channel_thresholds, with_relaxed_retry, within_threshold,
    },
    verify::{Reference, check_kind},
};

/// Largest accepted per-channel error of an interpolated color in strict mode
pub const INTERPOLATION_EPSILON: f32 = 1.0 / 32.0;

/// Interpolation tolerance, doubled with each relaxation step
pub fn interpolation_epsilon(mode: VerificationMode) -> f32 {
    INTERPOLATION_EPSILON * (1u32 << mode.relaxation()) as f32
}

/// Verify attribute interpolation of a triangle scene
pub fn verify_triangle_interpolation<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    check_kind(scene, "interpolation verification", PrimitiveKind::Triangle)?;
    with_relaxed_retry(scene.verification_mode, "interpolation", |mode| {
        check_interpolation(&image, scene, args, mode)
    })
}

/// Verify attribute interpolation of a line scene, wide lines are treated as a pair of triangles
pub fn verify_line_interpolation<I: Image<Pixel = RGBA>>(
    image: I,
    scene: &Scene,
    args: &VerificationArguments,
) -> Result<Verdict, Error> {
    check_kind(scene, "interpolation verification", PrimitiveKind::Line)?;
    with_relaxed_retry(scene.verification_mode, "interpolation", |mode| {
        check_interpolation(&image, scene, args, mode)
    })
}

/// Counter-clockwise outline of the shaded area
fn outline(primitive: &PreparedPrimitive) -> Vec<FixedPoint> {
    match primitive.shading.as_slice() {
        [triangle] => triangle.points.to_vec(),
        [first, second] => vec![
            first.points[0],
            first.points[1],
            first.points[2],
            second.points[2],
        ],
        _ => Vec::new(),
    }
}

/// Pixels whose value is checked for the primitive, in row-major order
fn sample_pixels(ctx: &CoverageContext<'_>, primitive: &PreparedPrimitive) -> Vec<(usize, usize)> {
    let grid = ctx.grid();
    let size = ctx.size();
    let units = grid.units();
    let outline = outline(primitive);
    if outline.is_empty() {
        return Vec::new();
    }

    let count = outline.len() as i64;
    let sum = outline
        .iter()
        .fold(FixedPoint::new(0, 0), |sum, point| sum + *point);
    let centroid = FixedPoint::new(sum.x.div_euclid(count), sum.y.div_euclid(count));
    let mut points = vec![centroid];
    for (index, a) in outline.iter().enumerate() {
        let b = outline[(index + 1) % outline.len()];
        for quarter in 1..4 {
            let on_edge = FixedPoint::new(
                a.x + (b.x - a.x) * quarter / 4,
                a.y + (b.y - a.y) * quarter / 4,
            );
            // pulled towards the centroid to stay away from the edge
            points.push(FixedPoint::new(
                on_edge.x + (centroid.x - on_edge.x) / 4,
                on_edge.y + (centroid.y - on_edge.y) / 4,
            ));
        }
    }
    let mut pixels: Vec<(usize, usize)> = points
        .into_iter()
        .filter_map(|point| {
            let col = usize::try_from(point.x.div_euclid(units)).ok()?;
            let row = usize::try_from(point.y.div_euclid(units)).ok()?;
            (col < size.width && row < size.height).then_some((col, row))
        })
        .collect();

    let (cols, rows) = ctx.pixel_range(primitive);
    for row in rows {
        for col in cols.clone() {
            let inside = match primitive.kind {
                PrimitiveKind::Line => primitive.footprint.covers(grid.pixel_center(col, row)),
                _ => primitive.footprint.contains_rect(&grid.pixel(col, row)),
            };
            if inside {
                pixels.push((col, row));
            }
        }
    }
    pixels.sort_unstable_by_key(|(col, row)| (*row, *col));
    pixels.dedup();
    // only pixels producing a fragment have a defined value
    pixels.retain(|(col, row)| {
        let center = grid.pixel_center(*col, *row);
        primitive.footprint.covers(center) && primitive.stipple_drawn(center, units)
    });
    pixels
}

fn check_interpolation<I: Image<Pixel = RGBA>>(
    image: &I,
    scene: &Scene,
    args: &VerificationArguments,
    mode: VerificationMode,
) -> Result<Verdict, Error> {
    tracing::debug_span!("[interpolate]", kind = ?scene.kind(), ?mode).in_scope(|| {
        let ctx = CoverageContext::new(scene, args, image.size())?.with_rule(Rule::Standard);
        let prepared = ctx.prepare()?;
        let size = ctx.size();
        let grid = ctx.grid();
        let epsilon = interpolation_epsilon(mode);
        let thresholds = channel_thresholds(args);

        // last primitive producing any coverage of each pixel
        let mut owners = vec![None; size.area()];
        for primitive in &prepared {
            let (cols, rows) = ctx.pixel_range(primitive);
            for row in rows {
                for col in cols.clone() {
                    if ctx.classify(primitive, col, row).coverage != Coverage::None {
                        owners[row * size.width + col] = Some(primitive.index);
                    }
                }
            }
        }

        let mut checked = 0;
        let mut failures: Vec<InterpolationFailure> = Vec::new();
        let mut failed = Vec::new();
        for primitive in &prepared {
            if primitive.degenerate {
                continue;
            }
            let mut worst: Option<InterpolationFailure> = None;
            for (col, row) in sample_pixels(&ctx, primitive) {
                let index = row * size.width + col;
                if owners[index] != Some(primitive.index) {
                    continue;
                }
                checked += 1;
                let pixel = image.get(row, col).copied().unwrap_or_default();
                let actual = LinColor::from(pixel);
                let (expected, valid) = if primitive.varying {
                    let expected = primitive.color_at(grid.pixel_center(col, row));
                    (expected, actual.rgb_distance(expected) <= epsilon)
                } else {
                    let expected = primitive.flat_color;
                    (expected, within_threshold(pixel, expected.into(), thresholds, 0))
                };
                if valid {
                    continue;
                }
                failed.push(index);
                let delta = actual.rgb_distance(expected);
                if worst.is_none_or(|worst| delta > worst.delta) {
                    worst = Some(InterpolationFailure {
                        primitive: primitive.index,
                        x: col,
                        y: row,
                        expected,
                        actual,
                        delta,
                    });
                }
            }
            if let Some(failure) = worst {
                tracing::debug!(
                    primitive = failure.primitive,
                    x = failure.x,
                    y = failure.y,
                    delta = failure.delta,
                    "interpolation mismatch"
                );
                failures.push(failure);
            }
        }

        let Some(first) = failures.first().copied() else {
            return Ok(Verdict::pass(format!(
                "{} samples of {} primitives interpolated correctly",
                checked,
                prepared.len()
            )));
        };
        failed.sort_unstable();
        failed.dedup();
        let worst = failures
            .iter()
            .map(|failure| failure.delta)
            .fold(0.0f32, f32::max);
        let expected = Reference::build(&ctx, &prepared).expected_image();
        let mut error_mask = ImageOwned::new_with(size.height, size.width, |_, _| ERROR_MASK_OK);
        for index in &failed {
            error_mask.data_mut()[*index] = ERROR_MASK_ERROR;
        }
        Ok(Verdict {
            message: format!(
                "{} of {} primitives interpolated incorrectly, largest error {:.4} with tolerance {:.4}",
                failures.len(),
                prepared.len(),
                worst,
                epsilon
            ),
            first_mismatch: Some(Mismatch {
                x: first.x,
                y: first.y,
                expected: first.expected.into(),
                actual: first.actual.into(),
            }),
            mismatch_count: failed.len(),
            interpolation_failures: failures,
            diagnostics: Some(Diagnostics {
                actual: image.to_packed(),
                expected,
                error_mask,
            }),
            ..Verdict::fail("")
        })
    })
}
