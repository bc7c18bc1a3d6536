//! Exact fixed-point device coordinates and the convex shapes built from them
use crate::{Error, Point, Scalar};
use std::ops::{Add, Sub};

pub const MIN_SUBPIXEL_BITS: u32 = 4;
pub const MAX_SUBPIXEL_BITS: u32 = 24;
/// Largest magnitude of a quantized coordinate, keeps edge functions far from `i128` overflow
pub const MAX_FIXED_COORD: i64 = 1 << 40;

/// Sample positions inside a pixel in 1/16 pixel units, indexed by sample count
pub const SAMPLE_PATTERN_1: [[u8; 2]; 1] = [[8, 8]];
pub const SAMPLE_PATTERN_2: [[u8; 2]; 2] = [[12, 12], [4, 4]];
pub const SAMPLE_PATTERN_4: [[u8; 2]; 4] = [[6, 2], [14, 6], [2, 10], [10, 14]];
pub const SAMPLE_PATTERN_8: [[u8; 2]; 8] = [
    [9, 5],
    [7, 11],
    [13, 9],
    [5, 3],
    [3, 13],
    [1, 7],
    [11, 15],
    [15, 1],
];
pub const SAMPLE_PATTERN_16: [[u8; 2]; 16] = [
    [9, 9],
    [7, 5],
    [5, 10],
    [12, 7],
    [3, 6],
    [10, 13],
    [13, 11],
    [11, 3],
    [6, 14],
    [8, 1],
    [4, 2],
    [2, 12],
    [0, 8],
    [15, 4],
    [14, 15],
    [1, 0],
];

/// Standard sample pattern, `0` means single sampled rendering (pixel center)
pub fn sample_pattern(num_samples: u32) -> Result<&'static [[u8; 2]], Error> {
    match num_samples {
        0 | 1 => Ok(&SAMPLE_PATTERN_1),
        2 => Ok(&SAMPLE_PATTERN_2),
        4 => Ok(&SAMPLE_PATTERN_4),
        8 => Ok(&SAMPLE_PATTERN_8),
        16 => Ok(&SAMPLE_PATTERN_16),
        _ => Err(Error::SampleCount(num_samples)),
    }
}

/// Point in device space measured in sub-pixel units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FixedPoint {
    pub x: i64,
    pub y: i64,
}

impl FixedPoint {
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl Add for FixedPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Edge function `E(a, b, p)`, positive when `p` is on the left of `a -> b`
#[inline]
pub fn edge_function(a: FixedPoint, b: FixedPoint, p: FixedPoint) -> i128 {
    (b.x - a.x) as i128 * (p.y - a.y) as i128 - (b.y - a.y) as i128 * (p.x - a.x) as i128
}

/// Tie rule for samples lying exactly on an edge of a counter-clockwise polygon.
///
/// Of two polygons sharing an edge exactly one sees it as inclusive, since
/// the edge direction is reversed between them.
#[inline]
pub fn is_top_left(a: FixedPoint, b: FixedPoint) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dy < 0 || (dy == 0 && dx < 0)
}

/// Twice the signed area of a polygon, positive for counter-clockwise winding
pub fn signed_area2(points: &[FixedPoint]) -> i128 {
    let Some(first) = points.first().copied() else {
        return 0;
    };
    points
        .windows(2)
        .map(|pair| edge_function(first, pair[0], pair[1]))
        .sum()
}

/// Axis aligned rectangle in sub-pixel units with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedRect {
    pub min: FixedPoint,
    pub max: FixedPoint,
}

impl FixedRect {
    pub fn from_points(points: impl IntoIterator<Item = FixedPoint>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |rect, p| Self {
            min: FixedPoint::new(rect.min.x.min(p.x), rect.min.y.min(p.y)),
            max: FixedPoint::new(rect.max.x.max(p.x), rect.max.y.max(p.y)),
        }))
    }

    pub fn new(min: FixedPoint, max: FixedPoint) -> Self {
        Self { min, max }
    }

    pub fn corners(&self) -> [FixedPoint; 4] {
        [
            self.min,
            FixedPoint::new(self.max.x, self.min.y),
            self.max,
            FixedPoint::new(self.min.x, self.max.y),
        ]
    }

    /// Grow (or shrink for negative `units`) rectangle in every direction
    pub fn grow(&self, units: i64) -> Self {
        let min = FixedPoint::new(self.min.x - units, self.min.y - units);
        let max = FixedPoint::new(self.max.x + units, self.max.y + units);
        if min.x > max.x || min.y > max.y {
            let center = FixedPoint::new(
                (self.min.x + self.max.x).div_euclid(2),
                (self.min.y + self.max.y).div_euclid(2),
            );
            return Self::new(center, center);
        }
        Self { min, max }
    }

    /// Closed intersection test
    pub fn touches(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Intersection with positive area
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Distance between rectangle and a point (zero if point is inside)
    pub fn point_dist(&self, p: FixedPoint) -> Scalar {
        let dx = (self.min.x - p.x).max(p.x - self.max.x).max(0) as Scalar;
        let dy = (self.min.y - p.y).max(p.y - self.max.y).max(0) as Scalar;
        dx.hypot(dy)
    }
}

/// Closed intersection test between segment `[a, b]` and a rectangle
pub fn segment_touches_rect(a: FixedPoint, b: FixedPoint, rect: &FixedRect) -> bool {
    let Some(bbox) = FixedRect::from_points([a, b]) else {
        return false;
    };
    if !bbox.touches(rect) {
        return false;
    }
    let mut positive = false;
    let mut negative = false;
    for corner in rect.corners() {
        match edge_function(a, b, corner).signum() {
            1 => positive = true,
            -1 => negative = true,
            _ => return true,
        }
    }
    positive && negative
}

/// Quantization of device space coordinates to a `2^bits` sub-pixel grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubpixelGrid {
    bits: u32,
}

impl SubpixelGrid {
    pub fn new(bits: u32) -> Result<Self, Error> {
        if !(MIN_SUBPIXEL_BITS..=MAX_SUBPIXEL_BITS).contains(&bits) {
            return Err(Error::SubpixelBits(bits));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of sub-pixel units per pixel
    #[inline]
    pub fn units(&self) -> i64 {
        1 << self.bits
    }

    /// Round device space point to the nearest grid point
    pub fn quantize(&self, point: Point) -> Option<FixedPoint> {
        let scale = self.units() as Scalar;
        let quantize = |value: Scalar| {
            let value = (value * scale).round();
            (value.is_finite() && value.abs() <= MAX_FIXED_COORD as Scalar).then_some(value as i64)
        };
        Some(FixedPoint::new(quantize(point.x())?, quantize(point.y())?))
    }

    /// Convert pixel distance to sub-pixel units rounding up
    pub fn ceil_units(&self, pixels: Scalar) -> i64 {
        (pixels * self.units() as Scalar).ceil() as i64
    }

    /// Check that a size in pixels stays within the range of quantized coordinates
    pub fn check_extent(&self, what: &'static str, pixels: Scalar) -> Result<(), Error> {
        let units = (pixels * self.units() as Scalar).abs().ceil();
        if units.is_finite() && units <= MAX_FIXED_COORD as Scalar {
            Ok(())
        } else {
            Err(Error::InvalidSize {
                what,
                value: pixels,
            })
        }
    }

    /// Square `[col, col + 1] x [row, row + 1]` covered by a pixel
    pub fn pixel(&self, col: usize, row: usize) -> FixedRect {
        let units = self.units();
        let (x, y) = (col as i64 * units, row as i64 * units);
        FixedRect::new(FixedPoint::new(x, y), FixedPoint::new(x + units, y + units))
    }

    pub fn pixel_center(&self, col: usize, row: usize) -> FixedPoint {
        self.sample(col, row, [8, 8])
    }

    /// Sample position given in 1/16 pixel units
    pub fn sample(&self, col: usize, row: usize, offset: [u8; 2]) -> FixedPoint {
        let units = self.units();
        FixedPoint::new(
            col as i64 * units + offset[0] as i64 * units / 16,
            row as i64 * units + offset[1] as i64 * units / 16,
        )
    }
}

/// Convex polygon with counter-clockwise winding
///
/// Each edge `i` runs from point `i` to point `i + 1` and carries a flag that
/// is set when the edge is shared with another primitive of the same draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvexPolygon {
    points: Vec<FixedPoint>,
    shared: Vec<bool>,
    area2: i128,
}

impl ConvexPolygon {
    pub fn new(points: impl IntoIterator<Item = FixedPoint>) -> Self {
        let points: Vec<_> = points.into_iter().collect();
        let shared = vec![false; points.len()];
        Self::new_with_shared(points, shared)
    }

    /// Create polygon with shared edge flags, points can be in any winding order
    pub fn new_with_shared(mut points: Vec<FixedPoint>, mut shared: Vec<bool>) -> Self {
        shared.resize(points.len(), false);
        let area2 = signed_area2(&points);
        if area2 < 0 {
            // reversing points moves edge `i` to position `(2n - 2 - i) % n`
            let count = points.len();
            points.reverse();
            shared = (0..count)
                .map(|index| shared[(2 * count - 2 - index) % count])
                .collect();
        }
        Self {
            points,
            shared,
            area2: area2.abs(),
        }
    }

    /// Twice the area of the polygon
    pub fn area2(&self) -> i128 {
        self.area2
    }

    pub fn is_degenerate(&self) -> bool {
        self.area2 == 0
    }

    pub fn bbox(&self) -> Option<FixedRect> {
        FixedRect::from_points(self.points.iter().copied())
    }

    /// Iterator over edges as `(start, end, is_shared)`
    pub fn edges(&self) -> impl Iterator<Item = (FixedPoint, FixedPoint, bool)> + '_ {
        let count = self.points.len();
        (0..count).map(move |index| {
            (
                self.points[index],
                self.points[(index + 1) % count],
                self.shared[index],
            )
        })
    }

    /// Sample coverage with the top-left tie rule
    pub fn covers(&self, p: FixedPoint) -> bool {
        !self.is_degenerate()
            && self.edges().all(|(a, b, _)| {
                let e = edge_function(a, b, p);
                e > 0 || (e == 0 && is_top_left(a, b))
            })
    }

    /// Whether rectangle lies completely inside the polygon (boundary included)
    pub fn contains_rect(&self, rect: &FixedRect) -> bool {
        !self.is_degenerate()
            && rect
                .corners()
                .into_iter()
                .all(|corner| self.edges().all(|(a, b, _)| edge_function(a, b, corner) >= 0))
    }

    /// Whether intersection with the rectangle has positive area
    pub fn overlaps_rect(&self, rect: &FixedRect) -> bool {
        if self.is_degenerate() || !self.bbox().is_some_and(|bbox| bbox.overlaps(rect)) {
            return false;
        }
        let corners = rect.corners();
        self.edges().all(|(a, b, _)| {
            corners
                .iter()
                .any(|corner| edge_function(a, b, *corner) > 0)
        })
    }

    /// Closed intersection test, also valid for degenerate polygons
    pub fn touches_rect(&self, rect: &FixedRect) -> bool {
        if !self.bbox().is_some_and(|bbox| bbox.touches(rect)) {
            return false;
        }
        if self.is_degenerate() {
            return self.edges().any(|(a, b, _)| segment_touches_rect(a, b, rect));
        }
        let corners = rect.corners();
        self.edges().all(|(a, b, _)| {
            corners
                .iter()
                .any(|corner| edge_function(a, b, *corner) >= 0)
        })
    }

    /// Whether an edge that is not shared with other primitive touches the rectangle
    pub fn open_edge_touches_rect(&self, rect: &FixedRect) -> bool {
        self.edges()
            .any(|(a, b, shared)| !shared && segment_touches_rect(a, b, rect))
    }
}

/// Screen space barycentric weights of `p` relative to a triangle
///
/// Computed from exact edge functions normalized by twice the signed area,
/// returns `None` for degenerate triangles.
pub fn barycentric(triangle: &[FixedPoint; 3], p: FixedPoint) -> Option<[Scalar; 3]> {
    let [a, b, c] = *triangle;
    let area2 = edge_function(a, b, c);
    if area2 == 0 {
        return None;
    }
    let area2 = area2 as Scalar;
    Some([
        edge_function(b, c, p) as Scalar / area2,
        edge_function(c, a, p) as Scalar / area2,
        edge_function(a, b, p) as Scalar / area2,
    ])
}
