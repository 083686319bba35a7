//! Parameter types for image operations.
//!
//! These values describe *where* and *how well* an operation should run, not
//! what it does. They are passed by value into the
//! [`Dispatcher`](super::dispatch::Dispatcher), which picks the execution path.
//!
//! ## Types
//!
//! - [`GpuVariant`]: Accelerator backends a host may offer.
//! - [`RenderDestination`]: `auto`, `cpu` or a specific `gpu:<variant>`.
//! - [`InterpolationQuality`]: Resampling quality for the CPU path.
//! - [`RenderOption`]: Destination + quality, with named presets.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseOptionError {
    #[error("unknown render destination '{0}' (expected auto, cpu, gpu:primary or gpu:compatibility)")]
    Destination(String),
    #[error("unknown interpolation quality '{0}' (expected none, low, medium, high or default)")]
    Quality(String),
}

/// Accelerator backends.
///
/// `Primary` is the preferred low-overhead API; when a host cannot build a
/// primary context the pool substitutes `Compatibility`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpuVariant {
    Primary,
    Compatibility,
}

impl GpuVariant {
    pub const ALL: [GpuVariant; 2] = [GpuVariant::Primary, GpuVariant::Compatibility];

    /// Variant to try when this one cannot be constructed.
    pub fn fallback(self) -> Option<GpuVariant> {
        match self {
            GpuVariant::Primary => Some(GpuVariant::Compatibility),
            GpuVariant::Compatibility => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GpuVariant::Primary => "primary",
            GpuVariant::Compatibility => "compatibility",
        }
    }
}

impl FromStr for GpuVariant {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(GpuVariant::Primary),
            "compatibility" | "compat" => Ok(GpuVariant::Compatibility),
            _ => Err(ParseOptionError::Destination(format!("gpu:{s}"))),
        }
    }
}

/// Where a pixel operation executes.
///
/// - `Auto` tries the accelerated path and silently retries on the CPU.
/// - `Cpu` never touches an accelerator.
/// - `Gpu(v)` requires `v` (or its designated fallback variant); no CPU retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderDestination {
    Auto,
    #[default]
    Cpu,
    Gpu(GpuVariant),
}

impl RenderDestination {
    /// Whether this destination is served by a cached render context.
    pub fn uses_context(self) -> bool {
        !matches!(self, RenderDestination::Cpu)
    }
}

impl fmt::Display for RenderDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderDestination::Auto => f.write_str("auto"),
            RenderDestination::Cpu => f.write_str("cpu"),
            RenderDestination::Gpu(v) => write!(f, "gpu:{}", v.name()),
        }
    }
}

impl FromStr for RenderDestination {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "auto" => Ok(RenderDestination::Auto),
            "cpu" => Ok(RenderDestination::Cpu),
            "gpu" => Ok(RenderDestination::Gpu(GpuVariant::Primary)),
            other => match other.strip_prefix("gpu:") {
                Some(variant) => variant
                    .parse()
                    .map(RenderDestination::Gpu)
                    .map_err(|_| ParseOptionError::Destination(s.to_string())),
                None => Err(ParseOptionError::Destination(s.to_string())),
            },
        }
    }
}

// Config files spell destinations the same way the CLI does.
impl Serialize for RenderDestination {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RenderDestination {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Resampling quality used by the CPU path when it scales pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationQuality {
    None,
    Low,
    Medium,
    High,
    #[default]
    Default,
}

impl InterpolationQuality {
    pub fn filter_type(self) -> FilterType {
        match self {
            InterpolationQuality::None => FilterType::Nearest,
            InterpolationQuality::Low | InterpolationQuality::Default => FilterType::Triangle,
            InterpolationQuality::Medium => FilterType::CatmullRom,
            InterpolationQuality::High => FilterType::Lanczos3,
        }
    }

    /// Whether point sampling should interpolate between neighbours.
    pub fn smooth(self) -> bool {
        !matches!(self, InterpolationQuality::None)
    }
}

impl FromStr for InterpolationQuality {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(InterpolationQuality::None),
            "low" => Ok(InterpolationQuality::Low),
            "medium" => Ok(InterpolationQuality::Medium),
            "high" => Ok(InterpolationQuality::High),
            "default" => Ok(InterpolationQuality::Default),
            _ => Err(ParseOptionError::Quality(s.to_string())),
        }
    }
}

/// Render configuration for a single call: destination + interpolation.
///
/// Immutable and `Copy`; build one per call with the presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RenderOption {
    pub destination: RenderDestination,
    pub quality: InterpolationQuality,
}

impl RenderOption {
    pub fn new(destination: RenderDestination, quality: InterpolationQuality) -> Self {
        Self {
            destination,
            quality,
        }
    }

    /// Direct pixel path with default interpolation.
    pub fn cpu() -> Self {
        Self::new(RenderDestination::Cpu, InterpolationQuality::Default)
    }

    /// Direct pixel path with explicit interpolation.
    pub fn cpu_with(quality: InterpolationQuality) -> Self {
        Self::new(RenderDestination::Cpu, quality)
    }

    /// Accelerated when possible, CPU otherwise.
    pub fn auto() -> Self {
        Self::new(RenderDestination::Auto, InterpolationQuality::Default)
    }

    /// A specific accelerator, no CPU fallback.
    pub fn gpu(variant: GpuVariant) -> Self {
        Self::new(RenderDestination::Gpu(variant), InterpolationQuality::Default)
    }

    /// Same quality, different destination.
    pub fn with_destination(self, destination: RenderDestination) -> Self {
        Self {
            destination,
            ..self
        }
    }
}

impl FromStr for RenderOption {
    type Err = ParseOptionError;

    /// Accepts `<destination>` or `<destination>@<quality>`, e.g. `cpu@high`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((dest, quality)) => Ok(Self::new(dest.parse()?, quality.parse()?)),
            None => Ok(Self::new(s.parse()?, InterpolationQuality::Default)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_structurally_equal() {
        assert_eq!(RenderOption::cpu(), RenderOption::default());
        assert_eq!(
            RenderOption::cpu_with(InterpolationQuality::Default),
            RenderOption::cpu()
        );
        assert_ne!(RenderOption::auto(), RenderOption::cpu());
        assert_ne!(
            RenderOption::gpu(GpuVariant::Primary),
            RenderOption::gpu(GpuVariant::Compatibility)
        );
    }

    #[test]
    fn destination_round_trips_through_display() {
        for dest in [
            RenderDestination::Auto,
            RenderDestination::Cpu,
            RenderDestination::Gpu(GpuVariant::Primary),
            RenderDestination::Gpu(GpuVariant::Compatibility),
        ] {
            assert_eq!(dest.to_string().parse::<RenderDestination>(), Ok(dest));
        }
    }

    #[test]
    fn bare_gpu_means_primary() {
        assert_eq!(
            "GPU".parse::<RenderDestination>(),
            Ok(RenderDestination::Gpu(GpuVariant::Primary))
        );
    }

    #[test]
    fn unknown_destination_is_rejected() {
        assert!(matches!(
            "gpu:quantum".parse::<RenderDestination>(),
            Err(ParseOptionError::Destination(s)) if s == "gpu:quantum"
        ));
        assert!("vulkan".parse::<RenderDestination>().is_err());
    }

    #[test]
    fn option_parses_quality_suffix() {
        let option: RenderOption = "cpu@high".parse().unwrap();
        assert_eq!(option, RenderOption::cpu_with(InterpolationQuality::High));
        assert!("cpu@ultra".parse::<RenderOption>().is_err());
    }

    #[test]
    fn only_cpu_skips_the_context_pool() {
        assert!(!RenderDestination::Cpu.uses_context());
        assert!(RenderDestination::Auto.uses_context());
        assert!(RenderDestination::Gpu(GpuVariant::Compatibility).uses_context());
    }

    #[test]
    fn primary_falls_back_to_compatibility() {
        assert_eq!(GpuVariant::Primary.fallback(), Some(GpuVariant::Compatibility));
        assert_eq!(GpuVariant::Compatibility.fallback(), None);
    }

    #[test]
    fn no_interpolation_is_nearest() {
        assert_eq!(InterpolationQuality::None.filter_type(), FilterType::Nearest);
        assert!(!InterpolationQuality::None.smooth());
        assert!(InterpolationQuality::High.smooth());
    }
}
