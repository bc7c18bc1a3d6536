//! Capabilities and precision of the rasterizer under test
use crate::{Error, MAX_FIXED_COORD, Scalar, SubpixelGrid, fixed::sample_pattern};

/// Default margin between must-cover and may-cover conservative classification,
/// in sub-pixel units. Rounded up to a whole unit when applied.
pub const DEFAULT_SAFETY_MARGIN: Scalar = 0.125;

pub const MIN_CHANNEL_BITS: u32 = 1;
pub const MAX_CHANNEL_BITS: u32 = 16;

/// Conservative rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConservativeMode {
    /// Every pixel touched by the primitive grown by the overestimation size is covered
    Overestimate,
    /// Only pixels fully inside of the primitive are covered
    Underestimate,
}

/// Extra overestimation size requested by the draw
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtraOverestimation {
    /// Explicit size in pixels
    Size(Scalar),
    /// Smallest size supported (zero)
    #[default]
    Minimum,
    /// Largest size reported by the implementation
    Maximum,
}

#[cfg(feature = "serde")]
fn default_safety_margin() -> Scalar {
    DEFAULT_SAFETY_MARGIN
}

/// Conservative rasterization state of the draw and the properties reported for it
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConservativeConfig {
    pub mode: ConservativeMode,
    /// Overestimation size reported by the implementation, in pixels
    pub primitive_overestimation_size: Scalar,
    #[cfg_attr(feature = "serde", serde(default))]
    pub extra_overestimation: ExtraOverestimation,
    /// Largest extra overestimation size reported by the implementation
    pub max_extra_overestimation_size: Scalar,
    /// Scene is intended to contain only primitives degenerate at sub-pixel precision
    #[cfg_attr(feature = "serde", serde(default))]
    pub degenerate_primitives: bool,
    /// Implementation rasterizes degenerate primitives
    pub degenerate_rasterized: bool,
    /// Margin separating must-cover and may-cover classification, in sub-pixel units
    #[cfg_attr(feature = "serde", serde(default = "default_safety_margin"))]
    pub safety_margin: Scalar,
}

impl ConservativeConfig {
    /// Create configuration from the properties reported by the implementation
    pub fn new(
        mode: ConservativeMode,
        primitive_overestimation_size: Scalar,
        max_extra_overestimation_size: Scalar,
        degenerate_rasterized: bool,
    ) -> Self {
        Self {
            mode,
            primitive_overestimation_size,
            extra_overestimation: ExtraOverestimation::Minimum,
            max_extra_overestimation_size,
            degenerate_primitives: false,
            degenerate_rasterized,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    /// Extra overestimation size requested by the draw
    pub fn with_extra_overestimation(self, extra_overestimation: ExtraOverestimation) -> Self {
        Self {
            extra_overestimation,
            ..self
        }
    }

    pub fn with_degenerate_primitives(self, degenerate_primitives: bool) -> Self {
        Self {
            degenerate_primitives,
            ..self
        }
    }

    pub fn with_safety_margin(self, safety_margin: Scalar) -> Self {
        Self {
            safety_margin,
            ..self
        }
    }

    /// Resolved extra overestimation size in pixels
    pub fn extra_overestimation_size(&self) -> Scalar {
        match self.extra_overestimation {
            ExtraOverestimation::Size(size) => size,
            ExtraOverestimation::Minimum => 0.0,
            ExtraOverestimation::Maximum => self.max_extra_overestimation_size,
        }
    }

    /// Total overestimation size in pixels
    pub fn overestimation_size(&self) -> Scalar {
        match self.mode {
            ConservativeMode::Overestimate => {
                self.primitive_overestimation_size + self.extra_overestimation_size()
            }
            ConservativeMode::Underestimate => 0.0,
        }
    }

    /// Safety margin rounded up to whole sub-pixel units
    pub fn margin_units(&self) -> i64 {
        self.safety_margin.max(0.0).ceil() as i64
    }

    /// Check sizes against the implementation limits and the range of the sub-pixel grid
    pub fn validate(&self, grid: SubpixelGrid) -> Result<(), Error> {
        let sizes = [
            ("primitive overestimation size", self.primitive_overestimation_size),
            ("max extra overestimation size", self.max_extra_overestimation_size),
            ("safety margin", self.safety_margin),
        ];
        for (what, value) in sizes {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidSize { what, value });
            }
        }
        let extra = self.extra_overestimation_size();
        if !extra.is_finite() || extra < 0.0 || extra > self.max_extra_overestimation_size {
            return Err(Error::InvalidSize {
                what: "extra overestimation size",
                value: extra,
            });
        }
        grid.check_extent("overestimation size", self.overestimation_size())?;
        if self.safety_margin > MAX_FIXED_COORD as Scalar {
            return Err(Error::InvalidSize {
                what: "safety margin",
                value: self.safety_margin,
            });
        }
        Ok(())
    }
}

/// Precision and capabilities of the rasterizer under test
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VerificationArguments {
    /// `0` for single sampled images, otherwise number of samples of a resolved image
    #[cfg_attr(feature = "serde", serde(default))]
    pub num_samples: u32,
    pub subpixel_bits: u32,
    pub red_bits: u32,
    pub green_bits: u32,
    pub blue_bits: u32,
    /// Point size clamp reported by the implementation
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_point_size: Option<Scalar>,
    /// Upper bound of the line width range reported by the implementation
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_line_width: Option<Scalar>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub conservative: Option<ConservativeConfig>,
}

impl VerificationArguments {
    pub fn new(subpixel_bits: u32, [red_bits, green_bits, blue_bits]: [u32; 3]) -> Self {
        Self {
            num_samples: 0,
            subpixel_bits,
            red_bits,
            green_bits,
            blue_bits,
            max_point_size: None,
            max_line_width: None,
            conservative: None,
        }
    }

    pub fn with_samples(self, num_samples: u32) -> Self {
        Self {
            num_samples,
            ..self
        }
    }

    pub fn with_max_point_size(self, max_point_size: Option<Scalar>) -> Self {
        Self {
            max_point_size,
            ..self
        }
    }

    pub fn with_max_line_width(self, max_line_width: Option<Scalar>) -> Self {
        Self {
            max_line_width,
            ..self
        }
    }

    pub fn with_conservative(self, conservative: Option<ConservativeConfig>) -> Self {
        Self {
            conservative,
            ..self
        }
    }

    pub fn channel_bits(&self) -> [u32; 3] {
        [self.red_bits, self.green_bits, self.blue_bits]
    }

    pub fn grid(&self) -> Result<SubpixelGrid, Error> {
        SubpixelGrid::new(self.subpixel_bits)
    }

    /// Sample positions (in 1/16 pixel units) used as reference samples of each pixel
    pub fn sample_pattern(&self) -> Result<&'static [[u8; 2]], Error> {
        sample_pattern(self.num_samples)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let grid = self.grid()?;
        self.sample_pattern()?;
        let channels = ["red", "green", "blue"];
        for (channel, bits) in channels.into_iter().zip(self.channel_bits()) {
            if !(MIN_CHANNEL_BITS..=MAX_CHANNEL_BITS).contains(&bits) {
                return Err(Error::ChannelBits { channel, bits });
            }
        }
        let limits = [
            ("max point size", self.max_point_size),
            ("max line width", self.max_line_width),
        ];
        for (what, limit) in limits {
            let Some(value) = limit else {
                continue;
            };
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidSize { what, value });
            }
            grid.check_extent(what, value)?;
        }
        if let Some(conservative) = &self.conservative {
            conservative.validate(grid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let args = VerificationArguments::new(8, [8, 8, 8]);
        assert!(args.validate().is_ok());
        assert!(args.with_samples(4).validate().is_ok());
        assert!(matches!(
            args.with_samples(3).validate(),
            Err(Error::SampleCount(3))
        ));
        assert!(matches!(
            VerificationArguments::new(2, [8, 8, 8]).validate(),
            Err(Error::SubpixelBits(2))
        ));
        assert!(matches!(
            VerificationArguments::new(8, [8, 0, 8]).validate(),
            Err(Error::ChannelBits {
                channel: "green",
                bits: 0
            })
        ));
        assert!(
            args.with_max_point_size(Some(-1.0))
                .validate()
                .is_err()
        );
        assert!(args.with_max_line_width(Some(10.0)).validate().is_ok());
        assert!(matches!(
            args.with_max_line_width(Some(f64::INFINITY)).validate(),
            Err(Error::InvalidSize {
                what: "max line width",
                ..
            })
        ));
        // 2^40 sub-pixel units at 8 bits of precision is 2^32 pixels
        assert!(args.with_max_point_size(Some(4e9)).validate().is_ok());
        assert!(matches!(
            args.with_max_point_size(Some(1e19)).validate(),
            Err(Error::InvalidSize {
                what: "max point size",
                ..
            })
        ));
    }

    #[test]
    fn test_conservative() -> Result<(), Error> {
        let grid = SubpixelGrid::new(8)?;
        let config = ConservativeConfig::new(ConservativeMode::Overestimate, 0.5, 0.75, false)
            .with_extra_overestimation(ExtraOverestimation::Maximum);
        assert_eq!(config.extra_overestimation_size(), 0.75);
        assert_eq!(config.overestimation_size(), 1.25);
        assert_eq!(config.margin_units(), 1);
        assert!(config.validate(grid).is_ok());

        let config = config.with_extra_overestimation(ExtraOverestimation::Size(1.0));
        assert!(config.validate(grid).is_err());

        let config = ConservativeConfig::new(ConservativeMode::Underestimate, 0.5, 0.0, false);
        assert_eq!(config.overestimation_size(), 0.0);
        assert_eq!(config.with_safety_margin(2.5).margin_units(), 3);
        assert!(config.with_safety_margin(-1.0).validate(grid).is_err());
        assert!(config.with_safety_margin(1e13).validate(grid).is_err());
        Ok(())
    }

    #[test]
    fn test_conservative_extent() -> Result<(), Error> {
        let grid = SubpixelGrid::new(8)?;
        // finite and positive, but does not fit into sub-pixel coordinates
        let config = ConservativeConfig::new(ConservativeMode::Overestimate, 1e17, 0.0, false);
        assert!(matches!(
            config.validate(grid),
            Err(Error::InvalidSize {
                what: "overestimation size",
                ..
            })
        ));
        let args = VerificationArguments::new(8, [8, 8, 8]).with_conservative(Some(config));
        assert!(args.validate().is_err());

        let config = ConservativeConfig::new(ConservativeMode::Overestimate, 0.5, 1e17, false)
            .with_extra_overestimation(ExtraOverestimation::Maximum);
        assert!(config.validate(grid).is_err());
        Ok(())
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_conservative_serde() -> Result<(), serde_json::Error> {
        let config: ConservativeConfig = serde_json::from_str(
            r#"{
                "mode": "Overestimate",
                "primitive_overestimation_size": 0.5,
                "max_extra_overestimation_size": 0.75,
                "degenerate_rasterized": true
            }"#,
        )?;
        assert_eq!(config.extra_overestimation, ExtraOverestimation::Minimum);
        assert_eq!(config.safety_margin, DEFAULT_SAFETY_MARGIN);
        assert!(config.degenerate_rasterized);
        // reported properties have no defaults
        let missing = serde_json::from_str::<ConservativeConfig>(
            r#"{"mode": "Overestimate", "primitive_overestimation_size": 0.5}"#,
        );
        assert!(missing.is_err());
        Ok(())
    }
}
