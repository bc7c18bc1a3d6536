use crate::{PrimitiveKind, Size};

/// Errors reported by the verification engine
///
/// A verification that runs to completion never returns an error, a failed
/// check is a [`Verdict`](crate::Verdict) with [`Fail`](crate::VerdictStatus::Fail)
/// status. Errors signal malformed inputs (a bug in the caller) or I/O failures
/// while writing diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("primitive {index} is a {found:?} but scene contains {expected:?} primitives")]
    MixedPrimitives {
        index: usize,
        expected: PrimitiveKind,
        found: PrimitiveKind,
    },
    #[error("image is empty: {}x{}", .0.width, .0.height)]
    EmptyImage(Size),
    #[error(
        "image size {}x{} does not match expected {}x{}",
        found.width,
        found.height,
        expected.width,
        expected.height
    )]
    SizeMismatch { expected: Size, found: Size },
    #[error("vertex {vertex} of primitive {primitive} has invalid w: {w}")]
    InvalidW {
        primitive: usize,
        vertex: usize,
        w: f64,
    },
    #[error("vertex {vertex} of primitive {primitive} has non-finite or out of range position")]
    InvalidPosition { primitive: usize, vertex: usize },
    #[error("unsupported sub-pixel precision: {0} bits")]
    SubpixelBits(u32),
    #[error("unsupported {channel} channel depth: {bits} bits")]
    ChannelBits { channel: &'static str, bits: u32 },
    #[error("unsupported sample count: {0}")]
    SampleCount(u32),
    #[error("invalid {what}: {value}")]
    InvalidSize { what: &'static str, value: f64 },
    #[error("invalid line stipple factor: {0}")]
    StippleFactor(u32),
    #[error("primitive {0} is expected to be degenerate at sub-pixel precision")]
    NotDegenerate(usize),
    #[error("{check} does not support {kind:?} scenes")]
    UnsupportedScene {
        check: &'static str,
        kind: PrimitiveKind,
    },
    #[error("no iterations to aggregate")]
    NoIterations,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "png")]
    #[error(transparent)]
    Png(#[from] png::EncodingError),
}

impl Error {
    /// Whether the error is caused by malformed scene or arguments
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Io(_) => false,
            #[cfg(feature = "png")]
            Error::Png(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configuration() {
        assert!(Error::SampleCount(3).is_configuration());
        assert!(Error::EmptyImage(Size::new(0, 4)).is_configuration());
        let error = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(!error.is_configuration());
        assert_eq!(error.to_string(), "disk full");
        assert_eq!(
            Error::InvalidSize {
                what: "line width",
                value: 1e19
            }
            .to_string(),
            "invalid line width: 10000000000000000000"
        );
    }
}
