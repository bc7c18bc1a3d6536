//! Conformance verification of rasterized images.
//!
//! Given a scene of triangles, lines or points and an image produced by the
//! rasterizer under test, decides whether the image is a legal rasterization
//! of the scene. Expected coverage is re-derived independently in fixed-point
//! device coordinates.
//!
//! Main features:
//!  - Triangle, line and point coverage with fill rule, anti-aliasing and multisample tolerance
//!  - Conservative overestimate and underestimate rasterization
//!  - Line modes (rectangular, rounded, bresenham) and stippling
//!  - Perspective-correct and flat attribute interpolation
//!  - Topology assembly and face culling of vertex streams
//!
mod args;
mod color;
mod coverage;
mod error;
mod fixed;
mod geometry;
mod image;
mod interpolate;
mod scene;
mod topology;
mod utils;
mod verdict;
mod verify;

pub use args::{
    ConservativeConfig, ConservativeMode, DEFAULT_SAFETY_MARGIN, ExtraOverestimation,
    MAX_CHANNEL_BITS, MIN_CHANNEL_BITS, VerificationArguments,
};
pub use color::{ColorError, LinColor, RGBA};
pub use coverage::{
    Coverage, CoverageContext, Footprint, PixelCoverage, PreparedPrimitive, Rule, ShadedTriangle,
    SteppedLine,
};
pub use error::Error;
pub use fixed::{
    ConvexPolygon, FixedPoint, FixedRect, MAX_FIXED_COORD, MAX_SUBPIXEL_BITS, MIN_SUBPIXEL_BITS,
    SubpixelGrid, barycentric, edge_function, is_top_left, sample_pattern,
};
pub use geometry::{EPSILON, Point, Scalar, perspective_correct, project, scalar_fmt};
pub use image::{Image, ImageMut, ImageOwned, ImageRef, Shape, Size};
pub use interpolate::{
    INTERPOLATION_EPSILON, interpolation_epsilon, verify_line_interpolation,
    verify_triangle_interpolation,
};
pub use scene::{
    CoordinateSpace, LineMode, LinePrimitive, LineStipple, PointPrimitive, Primitive,
    PrimitiveKind, Scene, TrianglePrimitive, VerificationMode, Vertex,
};
pub use topology::{
    CullMode, FrontFace, ProvokingVertex, Topology, assemble, cull, polygon_lines,
    polygon_points, signed_area,
};
pub use verdict::{
    Aggregate, Diagnostics, ERROR_MASK_ERROR, ERROR_MASK_OK, ERROR_MASK_OUTLIER,
    InterpolationFailure, Mismatch, ToleranceWindow, Verdict, VerdictStatus, channel_threshold,
    channel_thresholds, verify_iterations,
};
pub use verify::{
    Check, FillRuleCoverage, Reference, render_reference, verify, verify_fill_rule,
    verify_line_group, verify_point_group, verify_relaxed_line_group, verify_triangle_group,
};
