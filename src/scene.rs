//! Declarative description of a draw call whose result is verified
use crate::{Error, LinColor, Scalar, Size, SubpixelGrid};

/// Single vertex as it leaves the vertex pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    /// Clip space position `[x, y, z, w]` (or window space, see [`CoordinateSpace`])
    pub position: [Scalar; 4],
    /// Color with channels in `[0, 1]`, white if not specified
    #[cfg_attr(feature = "serde", serde(default))]
    pub color: Option<[f32; 4]>,
    /// Overrides scene point size or line width
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: Option<Scalar>,
}

impl Vertex {
    pub fn new(x: Scalar, y: Scalar, z: Scalar, w: Scalar) -> Self {
        Self {
            position: [x, y, z, w],
            color: None,
            size: None,
        }
    }

    /// Vertex with `z = 0` and `w = 1`
    pub fn xy(x: Scalar, y: Scalar) -> Self {
        Self::new(x, y, 0.0, 1.0)
    }

    pub fn with_color(self, color: [f32; 4]) -> Self {
        Self {
            color: Some(color),
            ..self
        }
    }

    pub fn with_size(self, size: Scalar) -> Self {
        Self {
            size: Some(size),
            ..self
        }
    }

    pub fn w(&self) -> Scalar {
        self.position[3]
    }

    pub fn lin_color(&self) -> LinColor {
        self.color.map_or(LinColor::WHITE, LinColor::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrianglePrimitive {
    pub vertices: [Vertex; 3],
    /// Edge `i` goes from vertex `i` to vertex `(i + 1) % 3`, shared edges
    /// belong to another triangle of the same draw as well
    #[cfg_attr(feature = "serde", serde(default))]
    pub shared_edges: [bool; 3],
    /// Index of the vertex providing color for flat shading
    #[cfg_attr(feature = "serde", serde(default))]
    pub provoking: usize,
}

impl TrianglePrimitive {
    pub fn new(vertices: [Vertex; 3]) -> Self {
        Self {
            vertices,
            shared_edges: [false; 3],
            provoking: 0,
        }
    }

    pub fn with_shared_edges(self, shared_edges: [bool; 3]) -> Self {
        Self {
            shared_edges,
            ..self
        }
    }

    pub fn with_provoking(self, provoking: usize) -> Self {
        Self { provoking, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinePrimitive {
    pub vertices: [Vertex; 2],
    #[cfg_attr(feature = "serde", serde(default))]
    pub provoking: usize,
}

impl LinePrimitive {
    pub fn new(vertices: [Vertex; 2]) -> Self {
        Self {
            vertices,
            provoking: 0,
        }
    }

    pub fn with_provoking(self, provoking: usize) -> Self {
        Self { provoking, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointPrimitive {
    pub vertex: Vertex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Primitive {
    Triangle(TrianglePrimitive),
    Line(LinePrimitive),
    Point(PointPrimitive),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Triangle(_) => PrimitiveKind::Triangle,
            Primitive::Line(_) => PrimitiveKind::Line,
            Primitive::Point(_) => PrimitiveKind::Point,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        match self {
            Primitive::Triangle(triangle) => &triangle.vertices,
            Primitive::Line(line) => &line.vertices,
            Primitive::Point(point) => std::slice::from_ref(&point.vertex),
        }
    }

    /// Vertex used for flat shading
    pub fn provoking_vertex(&self) -> &Vertex {
        let vertices = self.vertices();
        let provoking = match self {
            Primitive::Triangle(triangle) => triangle.provoking,
            Primitive::Line(line) => line.provoking,
            Primitive::Point(_) => 0,
        };
        &vertices[provoking.min(vertices.len() - 1)]
    }
}

impl From<TrianglePrimitive> for Primitive {
    fn from(triangle: TrianglePrimitive) -> Self {
        Primitive::Triangle(triangle)
    }
}

impl From<LinePrimitive> for Primitive {
    fn from(line: LinePrimitive) -> Self {
        Primitive::Line(line)
    }
}

impl From<PointPrimitive> for Primitive {
    fn from(point: PointPrimitive) -> Self {
        Primitive::Point(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    Triangle,
    Line,
    Point,
}

/// Line rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineMode {
    /// Segment extruded perpendicular by half of the width, no end caps
    #[default]
    Rectangular,
    /// Segment with round caps (Minkowski sum with a disk)
    Rounded,
    /// Non-strict line, segment extruded along the minor axis by half of the width
    Parallelogram,
    /// Stepped path along the major axis, never anti-aliased
    Bresenham,
}

/// Fixed-function line stipple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineStipple {
    /// Number of consecutive fragments that use the same pattern bit (1..=256)
    pub factor: u32,
    pub pattern: u16,
}

impl LineStipple {
    pub fn new(factor: u32, pattern: u16) -> Self {
        Self { factor, pattern }
    }

    /// Whether fragment at distance `s` (in pixels along the major axis) is drawn
    pub fn is_drawn(&self, s: i64) -> bool {
        let bit = (s.max(0) / self.factor.max(1) as i64) % 16;
        (self.pattern >> bit) & 1 == 1
    }
}

/// How forgiving image comparison is around ambiguous pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VerificationMode {
    #[default]
    Strict,
    Weak,
    Weaker,
    /// Anti-aliased rendering, requires fractional alpha in the image
    Smooth,
}

impl VerificationMode {
    /// Next more permissive mode used when a check is retried
    pub fn relaxed(self) -> Option<Self> {
        match self {
            VerificationMode::Strict => Some(VerificationMode::Weak),
            VerificationMode::Weak | VerificationMode::Smooth => Some(VerificationMode::Weaker),
            VerificationMode::Weaker => None,
        }
    }

    /// Number of relaxation steps from [`VerificationMode::Strict`]
    pub fn relaxation(self) -> u32 {
        match self {
            VerificationMode::Strict => 0,
            VerificationMode::Weak | VerificationMode::Smooth => 1,
            VerificationMode::Weaker => 2,
        }
    }
}

/// Space vertex positions are specified in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateSpace {
    /// Clip space, normalized device coordinates are mapped to the whole image
    #[default]
    Clip,
    /// Window space, positions are in pixels after the perspective divide
    Window,
}

/// Ordered primitives of a single kind together with the state of the draw
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Scene {
    pub primitives: Vec<Primitive>,
    /// Primitives were assembled from a strip
    pub is_strip: bool,
    /// Anti-aliased lines or points
    pub is_smooth: bool,
    pub line_mode: LineMode,
    pub stipple: Option<LineStipple>,
    pub line_width: Scalar,
    pub point_size: Scalar,
    pub verification_mode: VerificationMode,
    pub flat_shading: bool,
    pub coordinates: CoordinateSpace,
    /// Color of pixels not covered by any primitive
    pub background: [f32; 4],
    /// Viewport the scene was drawn with, must match the verified image
    pub viewport: Option<Size>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            primitives: Vec::new(),
            is_strip: false,
            is_smooth: false,
            line_mode: LineMode::Rectangular,
            stipple: None,
            line_width: 1.0,
            point_size: 1.0,
            verification_mode: VerificationMode::Strict,
            flat_shading: false,
            coordinates: CoordinateSpace::Clip,
            background: [0.0, 0.0, 0.0, 1.0],
            viewport: None,
        }
    }
}

impl Scene {
    pub fn new(primitives: impl IntoIterator<Item = Primitive>) -> Self {
        Self {
            primitives: primitives.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn triangles(triangles: impl IntoIterator<Item = TrianglePrimitive>) -> Self {
        Self::new(triangles.into_iter().map(Primitive::Triangle))
    }

    pub fn lines(lines: impl IntoIterator<Item = LinePrimitive>) -> Self {
        Self::new(lines.into_iter().map(Primitive::Line))
    }

    pub fn points(points: impl IntoIterator<Item = Vertex>) -> Self {
        Self::new(
            points
                .into_iter()
                .map(|vertex| Primitive::Point(PointPrimitive { vertex })),
        )
    }

    pub fn with_strip(self, is_strip: bool) -> Self {
        Self { is_strip, ..self }
    }

    pub fn with_smooth(self, is_smooth: bool) -> Self {
        Self { is_smooth, ..self }
    }

    pub fn with_line_mode(self, line_mode: LineMode) -> Self {
        Self { line_mode, ..self }
    }

    pub fn with_stipple(self, stipple: Option<LineStipple>) -> Self {
        Self { stipple, ..self }
    }

    pub fn with_line_width(self, line_width: Scalar) -> Self {
        Self { line_width, ..self }
    }

    pub fn with_point_size(self, point_size: Scalar) -> Self {
        Self { point_size, ..self }
    }

    pub fn with_mode(self, verification_mode: VerificationMode) -> Self {
        Self {
            verification_mode,
            ..self
        }
    }

    pub fn with_flat_shading(self, flat_shading: bool) -> Self {
        Self {
            flat_shading,
            ..self
        }
    }

    pub fn with_coordinates(self, coordinates: CoordinateSpace) -> Self {
        Self {
            coordinates,
            ..self
        }
    }

    pub fn with_background(self, background: [f32; 4]) -> Self {
        Self { background, ..self }
    }

    pub fn with_viewport(self, viewport: Option<Size>) -> Self {
        Self { viewport, ..self }
    }

    pub fn is_rectangular(&self) -> bool {
        self.line_mode == LineMode::Rectangular
    }

    pub fn background_color(&self) -> LinColor {
        self.background.into()
    }

    /// Check that image has the size of the viewport, if one was specified
    pub fn check_viewport(&self, size: Size) -> Result<(), Error> {
        match self.viewport {
            Some(expected) if expected != size => Err(Error::SizeMismatch {
                expected,
                found: size,
            }),
            _ => Ok(()),
        }
    }

    /// Kind of the primitives, `None` for an empty scene
    pub fn kind(&self) -> Option<PrimitiveKind> {
        self.primitives.first().map(Primitive::kind)
    }

    /// Check that primitives are homogeneous and scene parameters are sane
    pub fn validate(&self) -> Result<Option<PrimitiveKind>, Error> {
        let kind = self.kind();
        if let Some(expected) = kind {
            for (index, primitive) in self.primitives.iter().enumerate() {
                let found = primitive.kind();
                if found != expected {
                    return Err(Error::MixedPrimitives {
                        index,
                        expected,
                        found,
                    });
                }
                for (vertex_index, vertex) in primitive.vertices().iter().enumerate() {
                    let w = vertex.w();
                    if w == 0.0 || !w.is_finite() {
                        return Err(Error::InvalidW {
                            primitive: index,
                            vertex: vertex_index,
                            w,
                        });
                    }
                    if vertex.position.iter().any(|value| !value.is_finite()) {
                        return Err(Error::InvalidPosition {
                            primitive: index,
                            vertex: vertex_index,
                        });
                    }
                    if let Some(size) = vertex.size {
                        check_size("vertex size", size)?;
                    }
                }
            }
        }
        check_size("line width", self.line_width)?;
        check_size("point size", self.point_size)?;
        if let Some(stipple) = self.stipple {
            if !(1..=256).contains(&stipple.factor) {
                return Err(Error::StippleFactor(stipple.factor));
            }
        }
        Ok(kind)
    }

    /// Check that line widths and point sizes fit into the range of the sub-pixel grid
    pub fn check_extents(&self, grid: SubpixelGrid) -> Result<(), Error> {
        grid.check_extent("line width", self.line_width)?;
        grid.check_extent("point size", self.point_size)?;
        for primitive in &self.primitives {
            for vertex in primitive.vertices() {
                if let Some(size) = vertex.size {
                    grid.check_extent("vertex size", size)?;
                }
            }
        }
        Ok(())
    }
}

fn check_size(what: &'static str, value: Scalar) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidSize { what, value })
    }
}
