use crate::{CoordinateSpace, Size};
use std::{
    fmt,
    ops::{Add, Mul, Sub},
};

pub type Scalar = f64;
pub const EPSILON: f64 = f64::EPSILON;

/// Format floats in a compact way suitable for diagnostic messages
pub fn scalar_fmt(f: &mut fmt::Formatter<'_>, value: Scalar) -> fmt::Result {
    let value_abs = value.abs();
    if value_abs.fract() < EPSILON {
        write!(f, "{}", value.trunc() as i64)
    } else if value_abs > 9999.0 || value_abs <= 0.0001 {
        write!(f, "{:.3e}", value)
    } else {
        let ten: Scalar = 10.0;
        let round = ten.powi(6 - (value_abs.trunc() + 1.0).log10().ceil() as i32);
        write!(f, "{}", (value * round).round() / round)
    }
}

/// Value representing a 2D point or vector in device (pixel) space.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Point(pub [Scalar; 2]);

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Point([x, y]) = self;
        scalar_fmt(f, *x)?;
        write!(f, ",")?;
        scalar_fmt(f, *y)?;
        Ok(())
    }
}

impl Point {
    #[inline]
    pub fn new(x: Scalar, y: Scalar) -> Self {
        Self([x, y])
    }

    /// Get `x` component of the point
    #[inline]
    pub fn x(&self) -> Scalar {
        self.0[0]
    }

    /// Get `y` compenent of the point
    #[inline]
    pub fn y(&self) -> Scalar {
        self.0[1]
    }

    /// Get length of the vector (distance from the origin)
    pub fn length(self) -> Scalar {
        let Self([x, y]) = self;
        x.hypot(y)
    }

    /// Dot product between two vectors
    pub fn dot(self, other: Self) -> Scalar {
        let Self([x0, y0]) = self;
        let Self([x1, y1]) = other;
        x0 * x1 + y0 * y1
    }

    /// Get vector normal (not a unit sized), pointing to the left of the vector
    pub fn normal(self) -> Point {
        let Self([x, y]) = self;
        Self([-y, x])
    }

    /// Convert vector to a unit size vector, if length is not zero
    pub fn normalize(self) -> Option<Point> {
        let Self([x, y]) = self;
        let length = self.length();
        if length < EPSILON {
            None
        } else {
            Some(Self([x / length, y / length]))
        }
    }

    /// Distance from the point to the segment `[a, b]`
    pub fn segment_dist(self, a: Point, b: Point) -> Scalar {
        let ab = b - a;
        let len2 = ab.dot(ab);
        if len2 < EPSILON {
            return (self - a).length();
        }
        let t = ((self - a).dot(ab) / len2).clamp(0.0, 1.0);
        (self - (a + t * ab)).length()
    }
}

impl Mul<Point> for Scalar {
    type Output = Point;

    #[inline]
    fn mul(self, other: Point) -> Self::Output {
        let Point([x, y]) = other;
        Point([self * x, self * y])
    }
}

impl Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, other: Point) -> Self::Output {
        let Point([x0, y0]) = self;
        let Point([x1, y1]) = other;
        Point([x0 + x1, y0 + y1])
    }
}

impl Sub for Point {
    type Output = Point;

    #[inline]
    fn sub(self, other: Point) -> Self::Output {
        let Point([x0, y0]) = self;
        let Point([x1, y1]) = other;
        Point([x0 - x1, y0 - y1])
    }
}

/// Perspective divide followed by the viewport transform.
///
/// Clip space coordinates are mapped so that `x = -1` is the left border and
/// `y = -1` is the first image row. Window space positions are only divided
/// by `w`. Returns `None` if `w` is zero or the result is not finite.
pub fn project(position: [Scalar; 4], size: Size, space: CoordinateSpace) -> Option<Point> {
    let [x, y, _, w] = position;
    if w == 0.0 || !w.is_finite() {
        return None;
    }
    let (x, y) = (x / w, y / w);
    let point = match space {
        CoordinateSpace::Clip => Point::new(
            (x + 1.0) * 0.5 * size.width as Scalar,
            (y + 1.0) * 0.5 * size.height as Scalar,
        ),
        CoordinateSpace::Window => Point::new(x, y),
    };
    (point.x().is_finite() && point.y().is_finite()).then_some(point)
}

/// Convert screen-space barycentric weights into perspective-correct ones.
///
/// Each weight is divided by the `w` of its vertex and the result is
/// re-normalized so that weights sum up to one.
pub fn perspective_correct(weights: [Scalar; 3], w: [Scalar; 3]) -> [Scalar; 3] {
    let q = [weights[0] / w[0], weights[1] / w[1], weights[2] / w[2]];
    let sum = q[0] + q[1] + q[2];
    if sum.abs() < EPSILON {
        return weights;
    }
    [q[0] / sum, q[1] / sum, q[2] / sum]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    #[test]
    fn test_project() {
        let size = Size {
            width: 8,
            height: 4,
        };
        let p = project([-1.0, -1.0, 0.0, 1.0], size, CoordinateSpace::Clip).unwrap();
        assert_approx_eq!(p.x(), 0.0);
        assert_approx_eq!(p.y(), 0.0);

        let p = project([0.5, 1.0, 0.0, 0.5], size, CoordinateSpace::Clip).unwrap();
        assert_approx_eq!(p.x(), 8.0);
        assert_approx_eq!(p.y(), 4.0);

        let p = project([3.0, 5.0, 0.0, 2.0], size, CoordinateSpace::Window).unwrap();
        assert_approx_eq!(p.x(), 1.5);
        assert_approx_eq!(p.y(), 2.5);

        assert!(project([0.0, 0.0, 0.0, 0.0], size, CoordinateSpace::Clip).is_none());
        assert!(project([f64::NAN, 0.0, 0.0, 1.0], size, CoordinateSpace::Clip).is_none());
    }

    #[test]
    fn test_perspective_correct() {
        // equal w does not change weights
        let b = perspective_correct([0.2, 0.3, 0.5], [2.0, 2.0, 2.0]);
        assert_approx_eq!(b[0], 0.2, 1e-12);
        assert_approx_eq!(b[1], 0.3, 1e-12);
        assert_approx_eq!(b[2], 0.5, 1e-12);

        // vertex far away (large w) gets less weight
        let b = perspective_correct([0.5, 0.5, 0.0], [1.0, 3.0, 1.0]);
        assert_approx_eq!(b[0], 0.75, 1e-12);
        assert_approx_eq!(b[1], 0.25, 1e-12);
        assert_approx_eq!(b[2], 0.0, 1e-12);
    }

    #[test]
    fn test_segment_dist() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(4.0, 0.0);
        assert_approx_eq!(Point::new(2.0, 3.0).segment_dist(a, b), 3.0);
        assert_approx_eq!(Point::new(7.0, 4.0).segment_dist(a, b), 5.0);
        assert_approx_eq!(Point::new(1.0, 1.0).segment_dist(a, a), 2.0f64.sqrt());
    }
}
