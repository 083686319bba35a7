//! Render-destination dispatch.
//!
//! [`Dispatcher::render`] runs one [`Operation`] on a [`PixelBuffer`] along
//! the path the [`RenderOption`] names:
//!
//! - `Cpu`: the direct pixel path, with the option's interpolation quality.
//! - `Gpu(v)`: the filter backend with `v`'s context. Failures propagate.
//! - `Auto`: the filter backend with the `Auto` context; a backend failure
//!   is retried once on the CPU path.
//!
//! Geometry is validated before either path runs, so degenerate input fails
//! the same way everywhere and never reaches a backend.

use super::backend::{FilterRequest, RenderError};
use super::buffer::PixelBuffer;
use super::context::RenderContextPool;
use super::cpu;
use super::params::{InterpolationQuality, RenderDestination, RenderOption};
use crate::geometry::{Affine, Rect, Size};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

impl FromStr for FlipAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Ok(FlipAxis::Horizontal),
            "vertical" | "v" => Ok(FlipAxis::Vertical),
            _ => Err(format!("unknown flip axis '{s}' (expected horizontal or vertical)")),
        }
    }
}

/// One pixel operation. Geometry is in pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Crop(Rect),
    Resize(Size),
    /// Radians, clockwise on screen.
    Rotate(f64),
    Flip(FlipAxis),
    Affine(Affine),
    /// Corner radius.
    Round(f64),
    Filter(FilterRequest),
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::Crop(_) => "crop",
            Operation::Resize(_) => "resize",
            Operation::Rotate(_) => "rotate",
            Operation::Flip(_) => "flip",
            Operation::Affine(_) => "affine",
            Operation::Round(_) => "round",
            Operation::Filter(request) => &request.name,
        }
    }

    /// Reject degenerate geometry up front.
    pub fn validate(&self) -> Result<(), RenderError> {
        match self {
            Operation::Crop(rect) if !rect.size.is_drawable() => Err(RenderError::invalid(
                format!("crop rect {}x{} is empty", rect.width(), rect.height()),
            )),
            Operation::Resize(size) if !size.is_drawable() => Err(RenderError::invalid(format!(
                "resize target {}x{} is empty",
                size.width, size.height
            ))),
            Operation::Resize(size) => {
                let (w, h) = size.ceil_pixels();
                cpu::check_output("resize target", w as u64, h as u64)
            }
            Operation::Rotate(radians) if !radians.is_finite() => {
                Err(RenderError::invalid("rotation angle must be finite"))
            }
            Operation::Affine(affine) if affine.invert().is_none() => {
                Err(RenderError::invalid("transform is not invertible"))
            }
            Operation::Round(radius) if !radius.is_finite() || *radius < 0.0 => Err(
                RenderError::invalid(format!("corner radius {radius} must be non-negative")),
            ),
            _ => Ok(()),
        }
    }

    /// The filter request the accelerated path runs for this operation.
    pub fn to_request(&self, quality: InterpolationQuality) -> FilterRequest {
        let quality = match quality {
            InterpolationQuality::None => "none",
            InterpolationQuality::Low => "low",
            InterpolationQuality::Medium => "medium",
            InterpolationQuality::High => "high",
            InterpolationQuality::Default => "default",
        };
        let affine = |m: Affine, quality: &str| {
            FilterRequest::new(cpu::AFFINE)
                .with("transform", vec![m.a, m.b, m.c, m.d, m.tx, m.ty])
                .with("quality", quality)
        };
        match self {
            Operation::Crop(rect) => FilterRequest::new(cpu::CROP).with("rect", *rect),
            Operation::Resize(size) => FilterRequest::new(cpu::RESIZE)
                .with("size", vec![size.width, size.height])
                .with("quality", quality),
            Operation::Rotate(radians) => affine(Affine::rotation(*radians), quality),
            // Mirroring lands exactly on pixel centres; no interpolation needed.
            Operation::Flip(FlipAxis::Horizontal) => affine(Affine::scaling(-1.0, 1.0), "none"),
            Operation::Flip(FlipAxis::Vertical) => affine(Affine::scaling(1.0, -1.0), "none"),
            Operation::Affine(m) => affine(*m, quality),
            Operation::Round(radius) => {
                FilterRequest::new(cpu::ROUND_CORNERS).with("radius", *radius)
            }
            Operation::Filter(request) => request.clone(),
        }
    }

    /// Run on the direct pixel path.
    pub fn apply_cpu(
        &self,
        src: &RgbaImage,
        quality: InterpolationQuality,
    ) -> Result<RgbaImage, RenderError> {
        match self {
            Operation::Crop(rect) => cpu::crop(src, *rect),
            Operation::Resize(size) => {
                let (w, h) = size.ceil_pixels();
                cpu::resize(src, w, h, quality)
            }
            Operation::Rotate(radians) => cpu::rotate(src, *radians, quality),
            Operation::Flip(axis) => Ok(cpu::flip(src, *axis)),
            Operation::Affine(m) => cpu::transform(src, m, quality),
            Operation::Round(radius) => cpu::round_corners(src, *radius),
            Operation::Filter(request) => cpu::apply_filter(Some(src), request, quality),
        }
    }
}

/// Executes operations per render destination against a shared context pool.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<RenderContextPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<RenderContextPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RenderContextPool {
        &self.pool
    }

    /// Run `operation` on `buffer`. The result keeps the source's scale and
    /// orientation.
    pub fn render(
        &self,
        buffer: &PixelBuffer,
        operation: &Operation,
        option: RenderOption,
    ) -> Result<PixelBuffer, RenderError> {
        operation.validate()?;
        if buffer.pixels.width() == 0 || buffer.pixels.height() == 0 {
            return Err(RenderError::invalid(format!(
                "{} needs an image with pixels",
                operation.name()
            )));
        }
        let pixels = match option.destination {
            RenderDestination::Cpu => operation.apply_cpu(&buffer.pixels, option.quality)?,
            RenderDestination::Gpu(_) => self.accelerated(&buffer.pixels, operation, option)?,
            RenderDestination::Auto => match self.accelerated(&buffer.pixels, operation, option) {
                Ok(pixels) => pixels,
                Err(e) if e.is_recoverable() => {
                    debug!(operation = operation.name(), error = %e, "accelerated render failed, retrying on cpu");
                    operation.apply_cpu(&buffer.pixels, option.quality)?
                }
                Err(e) => return Err(e),
            },
        };
        Ok(buffer.derive(pixels))
    }

    fn accelerated(
        &self,
        src: &RgbaImage,
        operation: &Operation,
        option: RenderOption,
    ) -> Result<RgbaImage, RenderError> {
        let shared = self
            .pool
            .get(option.destination)
            .ok_or(RenderError::BackendUnavailable(option.destination))?;
        let mut context = shared.lock();
        let backend = self.pool.backend();
        let request = operation.to_request(option.quality);

        let image = backend.apply_filter(&mut context, Some(src), &request)?;
        let pixels = backend.render(&mut context, &image)?;
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(RenderError::BufferExtractionFailed(format!(
                "{} produced an empty image",
                request.name
            )));
        }
        Ok(pixels)
    }
}
