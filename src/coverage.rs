//! Classification of pixels covered by a primitive
use crate::{
    ConservativeMode, Error, FixedPoint, FixedRect, LinColor, LineMode, LineStipple, Point,
    Primitive, PrimitiveKind, Scalar, Scene, Size, SubpixelGrid, VerificationArguments,
    fixed::{ConvexPolygon, barycentric, segment_touches_rect},
    geometry::{perspective_correct, project},
    utils::pixel_span,
};
use std::ops::Range;

/// How much of a pixel is covered by a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Coverage {
    None,
    Partial,
    Full,
}

/// Coverage of a single pixel together with the number of covered reference samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoverage {
    pub coverage: Coverage,
    pub covered: u32,
    pub samples: u32,
}

impl PixelCoverage {
    pub fn none(samples: u32) -> Self {
        Self {
            coverage: Coverage::None,
            covered: 0,
            samples,
        }
    }

    pub fn full(samples: u32) -> Self {
        Self {
            coverage: Coverage::Full,
            covered: samples,
            samples,
        }
    }

    /// Fraction of covered samples
    pub fn weight(&self) -> f32 {
        match self.coverage {
            Coverage::None => 0.0,
            Coverage::Full => 1.0,
            Coverage::Partial => self.covered as f32 / self.samples.max(1) as f32,
        }
    }
}

/// Rasterization rule used to classify pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rule {
    #[default]
    Standard,
    Overestimate,
    Underestimate,
}

impl From<ConservativeMode> for Rule {
    fn from(mode: ConservativeMode) -> Self {
        match mode {
            ConservativeMode::Overestimate => Rule::Overestimate,
            ConservativeMode::Underestimate => Rule::Underestimate,
        }
    }
}

/// Region of device space covered by a primitive, in sub-pixel units
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    /// Triangles, rectangular lines and square points
    Polygon(ConvexPolygon),
    /// Rounded lines and smooth points, segment grown by `radius` units
    Capsule {
        a: FixedPoint,
        b: FixedPoint,
        radius: Scalar,
    },
    /// Bresenham line
    Stepped(SteppedLine),
}

impl Footprint {
    pub fn bounds(&self) -> Option<FixedRect> {
        match self {
            Footprint::Polygon(polygon) => polygon.bbox(),
            Footprint::Capsule { a, b, radius } => {
                FixedRect::from_points([*a, *b]).map(|rect| rect.grow(radius.ceil() as i64))
            }
            Footprint::Stepped(line) => line.bounds(),
        }
    }

    /// Whether sample is covered
    pub fn covers(&self, p: FixedPoint) -> bool {
        match self {
            Footprint::Polygon(polygon) => polygon.covers(p),
            Footprint::Capsule { a, b, radius } => point_segment_dist(p, *a, *b) < *radius,
            Footprint::Stepped(line) => line.covers(p),
        }
    }

    pub fn contains_rect(&self, rect: &FixedRect) -> bool {
        match self {
            Footprint::Polygon(polygon) => polygon.contains_rect(rect),
            Footprint::Capsule { a, b, radius } => rect
                .corners()
                .into_iter()
                .all(|corner| point_segment_dist(corner, *a, *b) <= *radius),
            Footprint::Stepped(line) => line.covers(FixedPoint::new(
                (rect.min.x + rect.max.x).div_euclid(2),
                (rect.min.y + rect.max.y).div_euclid(2),
            )),
        }
    }

    pub fn overlaps_rect(&self, rect: &FixedRect) -> bool {
        match self {
            Footprint::Polygon(polygon) => polygon.overlaps_rect(rect),
            Footprint::Capsule { a, b, radius } => rect_segment_dist(rect, *a, *b) < *radius,
            Footprint::Stepped(line) => line.bounds().is_some_and(|bounds| bounds.overlaps(rect)),
        }
    }

    /// Closed intersection test, also valid for degenerate shapes
    pub fn touches_rect(&self, rect: &FixedRect) -> bool {
        match self {
            Footprint::Polygon(polygon) => polygon.touches_rect(rect),
            Footprint::Capsule { a, b, radius } => rect_segment_dist(rect, *a, *b) <= *radius,
            Footprint::Stepped(line) => line.bounds().is_some_and(|bounds| bounds.touches(rect)),
        }
    }

    /// Whether rectangle is cut by a boundary that is not shared with another primitive
    pub fn open_edge_touches_rect(&self, rect: &FixedRect) -> bool {
        match self {
            Footprint::Polygon(polygon) => polygon.open_edge_touches_rect(rect),
            Footprint::Capsule { .. } => true,
            Footprint::Stepped(_) => false,
        }
    }
}

fn point_segment_dist(p: FixedPoint, a: FixedPoint, b: FixedPoint) -> Scalar {
    let point = |p: FixedPoint| Point::new(p.x as Scalar, p.y as Scalar);
    point(p).segment_dist(point(a), point(b))
}

fn rect_segment_dist(rect: &FixedRect, a: FixedPoint, b: FixedPoint) -> Scalar {
    if segment_touches_rect(a, b, rect) {
        return 0.0;
    }
    rect.corners()
        .into_iter()
        .map(|corner| point_segment_dist(corner, a, b))
        .chain([rect.point_dist(a), rect.point_dist(b)])
        .fold(Scalar::INFINITY, Scalar::min)
}

/// Line drawn by stepping along its major axis, one pixel (times thickness) per step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedLine {
    a: FixedPoint,
    b: FixedPoint,
    x_major: bool,
    thickness: i64,
    units: i64,
}

impl SteppedLine {
    fn new(a: FixedPoint, b: FixedPoint, width: Scalar, units: i64) -> Self {
        let d = b - a;
        Self {
            a,
            b,
            x_major: d.x.abs() >= d.y.abs(),
            thickness: (width.round() as i64).max(1),
            units,
        }
    }

    /// Split point into (major, minor) components
    fn axes(&self, p: FixedPoint) -> (i64, i64) {
        if self.x_major { (p.x, p.y) } else { (p.y, p.x) }
    }

    fn bounds(&self) -> Option<FixedRect> {
        FixedRect::from_points([self.a, self.b]).map(|rect| rect.grow(self.thickness * self.units))
    }

    /// Whether pixel containing the point is part of the stepped path
    fn covers(&self, p: FixedPoint) -> bool {
        let (a_major, a_minor) = self.axes(self.a);
        let (b_major, b_minor) = self.axes(self.b);
        let (major, minor) = self.axes(p);
        if a_major == b_major {
            return false;
        }
        // fragments are generated for pixel centers in the half-open major span
        let center = major.div_euclid(self.units) * self.units + self.units / 2;
        if center < a_major.min(b_major) || center >= a_major.max(b_major) {
            return false;
        }
        let t = (center - a_major) as Scalar / (b_major - a_major) as Scalar;
        let ideal = a_minor as Scalar + t * (b_minor - a_minor) as Scalar;
        let first = (ideal / self.units as Scalar).floor() as i64 - (self.thickness - 1) / 2;
        let row = minor.div_euclid(self.units);
        first <= row && row < first + self.thickness
    }

    /// Whether pixel is in the first or the last column of the major span
    pub fn is_end(&self, p: FixedPoint) -> bool {
        let (a_major, _) = self.axes(self.a);
        let (b_major, _) = self.axes(self.b);
        let (major, _) = self.axes(p);
        let center = major.div_euclid(self.units) * self.units + self.units / 2;
        (center - a_major).abs() <= self.units || (center - b_major).abs() <= self.units
    }
}

/// Triangle with per-vertex `w` and colors used to interpolate attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadedTriangle {
    pub points: [FixedPoint; 3],
    pub w: [Scalar; 3],
    pub colors: [LinColor; 3],
}

impl ShadedTriangle {
    /// Perspective-correct weights, `None` for a degenerate triangle
    pub fn weights(&self, p: FixedPoint) -> Option<[Scalar; 3]> {
        barycentric(&self.points, p).map(|b| perspective_correct(b, self.w))
    }

    pub fn color(&self, weights: [Scalar; 3]) -> LinColor {
        let [c0, c1, c2] = self.colors;
        c0 * weights[0] as f32 + c1 * weights[1] as f32 + c2 * weights[2] as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StippleState {
    stipple: LineStipple,
    origin: FixedPoint,
    x_major: bool,
    /// Fragments generated by the preceding segments of a strip
    offset: i64,
}

/// Primitive projected, quantized and ready to be classified
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPrimitive {
    pub index: usize,
    pub kind: PrimitiveKind,
    pub footprint: Footprint,
    /// Zero area (or zero length) at sub-pixel precision
    pub degenerate: bool,
    /// Color used when attributes are not interpolated
    pub flat_color: LinColor,
    /// Color is interpolated and differs between vertices
    pub varying: bool,
    /// Triangles used for attribute interpolation (two for a line quad)
    pub shading: Vec<ShadedTriangle>,
    /// Strip joints shared with adjacent lines
    pub joints: Vec<FixedPoint>,
    /// Half of the line width or point size in sub-pixel units
    pub half_size: i64,
    stipple: Option<StippleState>,
}

impl PreparedPrimitive {
    /// Interpolated color at the point, weights are clamped for points outside of the primitive
    pub fn color_at(&self, p: FixedPoint) -> LinColor {
        if !self.varying {
            return self.flat_color;
        }
        let best = self
            .shading
            .iter()
            .filter_map(|triangle| {
                let b = barycentric(&triangle.points, p)?;
                let inside = b[0].min(b[1]).min(b[2]);
                Some((inside, triangle, b))
            })
            .max_by(|(a, ..), (b, ..)| a.total_cmp(b));
        let Some((_, triangle, b)) = best else {
            return self.flat_color;
        };
        let b = b.map(|v| v.max(0.0));
        let sum = b[0] + b[1] + b[2];
        if sum <= 0.0 {
            return self.flat_color;
        }
        let b = [b[0] / sum, b[1] / sum, b[2] / sum];
        triangle.color(perspective_correct(b, triangle.w))
    }

    /// Whether stipple pattern allows fragment at the pixel
    pub(crate) fn stipple_drawn(&self, center: FixedPoint, units: i64) -> bool {
        let Some(state) = &self.stipple else {
            return true;
        };
        let distance = if state.x_major {
            center.x - state.origin.x
        } else {
            center.y - state.origin.y
        };
        state
            .stipple
            .is_drawn(distance.abs().div_euclid(units) + state.offset)
    }
}

/// Everything needed to classify pixels of a scene rendered to an image of given size
#[derive(Debug, Clone)]
pub struct CoverageContext<'a> {
    scene: &'a Scene,
    args: &'a VerificationArguments,
    grid: SubpixelGrid,
    size: Size,
    rule: Rule,
    pattern: &'static [[u8; 2]],
    /// Conservative overestimation in sub-pixel units
    bloat: i64,
    /// Conservative safety margin in sub-pixel units
    margin: i64,
}

impl<'a> CoverageContext<'a> {
    pub fn new(
        scene: &'a Scene,
        args: &'a VerificationArguments,
        size: Size,
    ) -> Result<Self, Error> {
        args.validate()?;
        scene.validate()?;
        if size.is_empty() {
            return Err(Error::EmptyImage(size));
        }
        scene.check_viewport(size)?;
        let grid = args.grid()?;
        scene.check_extents(grid)?;
        let (rule, bloat, margin) = match &args.conservative {
            None => (Rule::Standard, 0, 0),
            Some(config) => (
                Rule::from(config.mode),
                grid.ceil_units(config.overestimation_size()),
                config.margin_units(),
            ),
        };
        Ok(Self {
            scene,
            args,
            grid,
            size,
            rule,
            pattern: args.sample_pattern()?,
            bloat,
            margin,
        })
    }

    /// Override rule selected by the arguments
    pub fn with_rule(self, rule: Rule) -> Self {
        Self { rule, ..self }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn grid(&self) -> SubpixelGrid {
        self.grid
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn margin(&self) -> i64 {
        self.margin
    }

    /// Image is a resolved multisample image
    pub fn is_multisampled(&self) -> bool {
        self.args.num_samples > 0
    }

    fn degenerate_rasterized(&self) -> bool {
        self.args
            .conservative
            .is_some_and(|config| config.degenerate_rasterized)
    }

    fn quantize(
        &self,
        index: usize,
        vertex: usize,
        position: [Scalar; 4],
    ) -> Result<FixedPoint, Error> {
        project(position, self.size, self.scene.coordinates)
            .and_then(|point| self.grid.quantize(point))
            .ok_or(Error::InvalidPosition {
                primitive: index,
                vertex,
            })
    }

    /// Device space distance converted to sub-pixel units
    fn device_units(&self, pixels: Scalar) -> Scalar {
        pixels * self.grid.units() as Scalar
    }

    /// Project and quantize all primitives of the scene
    pub fn prepare(&self) -> Result<Vec<PreparedPrimitive>, Error> {
        let mut stipple_offset = 0;
        let count = self.scene.primitives.len();
        let mut prepared = Vec::with_capacity(count);
        for (index, primitive) in self.scene.primitives.iter().enumerate() {
            let mut item = self.prepare_primitive(index, primitive)?;
            if let Some(state) = &mut item.stipple {
                if self.scene.is_strip {
                    state.offset = stipple_offset;
                    stipple_offset += self.major_length(primitive, index)?;
                }
            }
            if self.scene.is_strip && item.kind == PrimitiveKind::Line {
                if let Primitive::Line(line) = primitive {
                    if index > 0 {
                        item.joints.push(self.quantize(index, 0, line.vertices[0].position)?);
                    }
                    if index + 1 < count {
                        item.joints.push(self.quantize(index, 1, line.vertices[1].position)?);
                    }
                }
            }
            if let Some(config) = &self.args.conservative {
                if config.degenerate_primitives && !item.degenerate {
                    return Err(Error::NotDegenerate(index));
                }
            }
            prepared.push(item);
        }
        Ok(prepared)
    }

    /// Number of fragments generated along the major axis of a line
    fn major_length(&self, primitive: &Primitive, index: usize) -> Result<i64, Error> {
        let Primitive::Line(line) = primitive else {
            return Ok(0);
        };
        let a = self.quantize(index, 0, line.vertices[0].position)?;
        let b = self.quantize(index, 1, line.vertices[1].position)?;
        let d = b - a;
        let major = d.x.abs().max(d.y.abs());
        Ok((major + self.grid.units() / 2).div_euclid(self.grid.units()))
    }

    fn prepare_primitive(
        &self,
        index: usize,
        primitive: &Primitive,
    ) -> Result<PreparedPrimitive, Error> {
        let scene = self.scene;
        let vertices = primitive.vertices();
        let points = vertices
            .iter()
            .enumerate()
            .map(|(vertex, v)| self.quantize(index, vertex, v.position))
            .collect::<Result<Vec<_>, _>>()?;
        let colors: Vec<LinColor> = vertices.iter().map(|v| v.lin_color()).collect();
        let flat_color = primitive.provoking_vertex().lin_color();
        let varying =
            !scene.flat_shading && colors.iter().any(|color| *color != colors[0]);

        let mut shading = Vec::new();
        let mut stipple = None;
        let mut half_size = 0;
        let footprint = match primitive {
            Primitive::Triangle(triangle) => {
                shading.push(ShadedTriangle {
                    points: [points[0], points[1], points[2]],
                    w: [vertices[0].w(), vertices[1].w(), vertices[2].w()],
                    colors: [colors[0], colors[1], colors[2]],
                });
                Footprint::Polygon(ConvexPolygon::new_with_shared(
                    points.clone(),
                    triangle.shared_edges.to_vec(),
                ))
            }
            Primitive::Line(line) => {
                let mut width = line.vertices[0]
                    .size
                    .or(line.vertices[1].size)
                    .unwrap_or(scene.line_width);
                if let Some(max_width) = self.args.max_line_width {
                    width = width.min(max_width);
                }
                let (a, b) = (points[0], points[1]);
                let half = self.device_units(width) / 2.0;
                half_size = half.ceil() as i64;
                let mode = match (self.rule, scene.line_mode) {
                    (Rule::Standard, mode) => mode,
                    // conservative rasterization of lines uses their exact area
                    (_, LineMode::Bresenham) => LineMode::Rectangular,
                    (_, mode) => mode,
                };
                let quad = match mode {
                    LineMode::Parallelogram => parallelogram_quad(a, b, half),
                    _ => line_quad(a, b, half),
                };
                if let Some(quad) = quad {
                    let [w0, w1] = [line.vertices[0].w(), line.vertices[1].w()];
                    shading.push(ShadedTriangle {
                        points: [quad[0], quad[1], quad[2]],
                        w: [w0, w1, w1],
                        colors: [colors[0], colors[1], colors[1]],
                    });
                    shading.push(ShadedTriangle {
                        points: [quad[0], quad[2], quad[3]],
                        w: [w0, w1, w0],
                        colors: [colors[0], colors[1], colors[0]],
                    });
                }
                let d = b - a;
                stipple = scene.stipple.map(|stipple| StippleState {
                    stipple,
                    origin: a,
                    x_major: d.x.abs() >= d.y.abs(),
                    offset: 0,
                });
                match mode {
                    LineMode::Rectangular | LineMode::Parallelogram => Footprint::Polygon(
                        ConvexPolygon::new(quad.unwrap_or([a, a, a, a])),
                    ),
                    LineMode::Rounded => Footprint::Capsule { a, b, radius: half },
                    LineMode::Bresenham => {
                        Footprint::Stepped(SteppedLine::new(a, b, width, self.grid.units()))
                    }
                }
            }
            Primitive::Point(point) => {
                let mut size = point.vertex.size.unwrap_or(scene.point_size);
                if let Some(max_size) = self.args.max_point_size {
                    size = size.min(max_size);
                }
                let half = self.device_units(size) / 2.0;
                half_size = half.ceil() as i64;
                let center = points[0];
                if scene.is_smooth {
                    Footprint::Capsule {
                        a: center,
                        b: center,
                        radius: half,
                    }
                } else {
                    let half = half.round() as i64;
                    Footprint::Polygon(ConvexPolygon::new([
                        FixedPoint::new(center.x - half, center.y - half),
                        FixedPoint::new(center.x + half, center.y - half),
                        FixedPoint::new(center.x + half, center.y + half),
                        FixedPoint::new(center.x - half, center.y + half),
                    ]))
                }
            }
        };
        let degenerate = match &footprint {
            Footprint::Polygon(polygon) => polygon.is_degenerate(),
            Footprint::Capsule { a, b, radius } => {
                (primitive.kind() == PrimitiveKind::Line && a == b) || *radius <= 0.0
            }
            Footprint::Stepped(line) => line.a == line.b,
        };
        Ok(PreparedPrimitive {
            index,
            kind: primitive.kind(),
            footprint,
            degenerate,
            flat_color,
            varying,
            shading,
            joints: Vec::new(),
            half_size,
            stipple,
        })
    }

    /// Pixels that can possibly be classified as covered by the primitive
    pub fn pixel_range(&self, primitive: &PreparedPrimitive) -> (Range<usize>, Range<usize>) {
        let Some(bounds) = primitive.footprint.bounds() else {
            return (0..0, 0..0);
        };
        let bounds = bounds.grow(self.bloat + self.margin + 1);
        let units = self.grid.units();
        (
            pixel_span(bounds.min.x, bounds.max.x, units, self.size.width),
            pixel_span(bounds.min.y, bounds.max.y, units, self.size.height),
        )
    }

    /// Classify pixel according to the rule of the context
    pub fn classify(&self, primitive: &PreparedPrimitive, col: usize, row: usize) -> PixelCoverage {
        let samples = self.pattern.len() as u32;
        let center = self.grid.pixel_center(col, row);
        if !primitive.stipple_drawn(center, self.grid.units()) {
            return PixelCoverage::none(samples);
        }
        let covered = match self.rule {
            Rule::Standard => return self.classify_standard(primitive, col, row),
            Rule::Overestimate => self.conservative_covers(primitive, col, row, self.margin),
            Rule::Underestimate => self.conservative_covers(primitive, col, row, 0),
        };
        if covered {
            PixelCoverage::full(samples)
        } else {
            PixelCoverage::none(samples)
        }
    }

    fn classify_standard(
        &self,
        primitive: &PreparedPrimitive,
        col: usize,
        row: usize,
    ) -> PixelCoverage {
        let samples = self.pattern.len() as u32;
        if primitive.degenerate {
            return PixelCoverage::none(samples);
        }
        let footprint = &primitive.footprint;
        let pixel = self.grid.pixel(col, row);
        if let Footprint::Stepped(line) = footprint {
            return if line.covers(self.grid.pixel_center(col, row)) {
                PixelCoverage::full(samples)
            } else {
                PixelCoverage::none(samples)
            };
        }
        if !footprint.overlaps_rect(&pixel) {
            return PixelCoverage::none(samples);
        }
        if footprint.contains_rect(&pixel) {
            return PixelCoverage::full(samples);
        }
        let covered = self
            .pattern
            .iter()
            .filter(|offset| footprint.covers(self.grid.sample(col, row, **offset)))
            .count() as u32;
        if covered == samples {
            PixelCoverage::full(samples)
        } else {
            PixelCoverage {
                coverage: Coverage::Partial,
                covered,
                samples,
            }
        }
    }

    /// Conservative coverage with the pixel grown (or shrunk) by `margin` sub-pixel units
    ///
    /// Positive margin makes the test more permissive for both conservative modes.
    pub(crate) fn conservative_covers(
        &self,
        primitive: &PreparedPrimitive,
        col: usize,
        row: usize,
        margin: i64,
    ) -> bool {
        if primitive.degenerate && !self.degenerate_rasterized() {
            return false;
        }
        let pixel = self.grid.pixel(col, row);
        match self.rule {
            Rule::Overestimate => primitive
                .footprint
                .touches_rect(&pixel.grow(self.bloat + margin)),
            Rule::Underestimate => {
                !primitive.degenerate && primitive.footprint.contains_rect(&pixel.grow(-margin))
            }
            Rule::Standard => {
                self.classify_standard(primitive, col, row).coverage == Coverage::Full
            }
        }
    }
}

/// Corners of a line extruded perpendicular by `half` units, `None` for zero length lines
fn line_quad(a: FixedPoint, b: FixedPoint, half: Scalar) -> Option<[FixedPoint; 4]> {
    let d = Point::new((b.x - a.x) as Scalar, (b.y - a.y) as Scalar);
    let n = half * d.normal().normalize()?;
    let offset = |p: FixedPoint, sign: Scalar| {
        FixedPoint::new(
            (p.x as Scalar + sign * n.x()).round() as i64,
            (p.y as Scalar + sign * n.y()).round() as i64,
        )
    };
    Some([offset(a, 1.0), offset(b, 1.0), offset(b, -1.0), offset(a, -1.0)])
}

/// Corners of a line extruded along its minor axis by `half` units, `None` for zero length lines
fn parallelogram_quad(a: FixedPoint, b: FixedPoint, half: Scalar) -> Option<[FixedPoint; 4]> {
    let d = b - a;
    if d == FixedPoint::default() {
        return None;
    }
    let half = half.round() as i64;
    let n = if d.x.abs() >= d.y.abs() {
        FixedPoint::new(0, half)
    } else {
        FixedPoint::new(half, 0)
    };
    Some([a + n, b + n, b - n, a - n])
}
