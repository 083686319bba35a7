//! Software filter backend.
//!
//! Implements [`FilterBackend`] on the host CPU by running each request
//! through the [`cpu`](super::cpu) kernels. Which accelerator variants it
//! reports as available is configurable, so a host can be described as
//! "primary + compatibility", "compatibility only" or "no accelerator".

use super::backend::{FilterBackend, FilterImage, FilterRequest, RenderContext, RenderError};
use super::cpu;
use super::params::{GpuVariant, InterpolationQuality, RenderDestination};
use crate::geometry::Rect;
use image::RgbaImage;
use std::collections::BTreeSet;
use tracing::trace;

/// Per-context state: how many filters the context has run.
#[derive(Debug, Default)]
pub struct SoftwareContext {
    pub filters_applied: u64,
}

struct SoftwareImage(RgbaImage);

pub struct SoftwareBackend {
    accelerators: BTreeSet<GpuVariant>,
}

impl SoftwareBackend {
    /// Every accelerator variant available.
    pub fn new() -> Self {
        Self::with_accelerators(&GpuVariant::ALL)
    }

    pub fn with_accelerators(variants: &[GpuVariant]) -> Self {
        Self {
            accelerators: variants.iter().copied().collect(),
        }
    }

    /// A host with no accelerator: every context request fails.
    pub fn without_accelerators() -> Self {
        Self::with_accelerators(&[])
    }

    pub fn accelerators(&self) -> Vec<GpuVariant> {
        self.accelerators.iter().copied().collect()
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn request_quality(request: &FilterRequest) -> Result<InterpolationQuality, RenderError> {
    match request.params.get("quality") {
        None => Ok(InterpolationQuality::Default),
        Some(_) => request
            .text("quality")?
            .parse()
            .map_err(|e| RenderError::filter(&request.name, format!("{e}"))),
    }
}

impl FilterBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn is_available(&self, variant: GpuVariant) -> bool {
        self.accelerators.contains(&variant)
    }

    fn create_context(&self, variant: GpuVariant) -> Result<RenderContext, RenderError> {
        if !self.is_available(variant) {
            return Err(RenderError::BackendUnavailable(RenderDestination::Gpu(
                variant,
            )));
        }
        Ok(RenderContext::new(variant, SoftwareContext::default()))
    }

    fn apply_filter(
        &self,
        context: &mut RenderContext,
        input: Option<&RgbaImage>,
        request: &FilterRequest,
    ) -> Result<FilterImage, RenderError> {
        let variant = context.variant();
        let state = context
            .handle_mut::<SoftwareContext>()
            .ok_or_else(|| RenderError::filter(&request.name, "context was not built by this backend"))?;
        state.filters_applied += 1;

        let quality = request_quality(request)?;
        let pixels = cpu::apply_filter(input, request, quality)?;
        trace!(filter = %request.name, ?variant, width = pixels.width(), height = pixels.height(), "software filter applied");

        let extent = Rect::new(0.0, 0.0, pixels.width() as f64, pixels.height() as f64);
        Ok(FilterImage::new(extent, SoftwareImage(pixels)))
    }

    fn render(
        &self,
        _context: &mut RenderContext,
        image: &FilterImage,
    ) -> Result<RgbaImage, RenderError> {
        image
            .handle::<SoftwareImage>()
            .map(|img| img.0.clone())
            .ok_or_else(|| {
                RenderError::BufferExtractionFailed("image was not produced by this backend".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::cpu::{EXPOSURE, ROUND_CORNERS};
    use crate::test_helpers::{RED, solid};

    #[test]
    fn reports_configured_accelerators() {
        let backend = SoftwareBackend::with_accelerators(&[GpuVariant::Compatibility]);
        assert!(!backend.is_available(GpuVariant::Primary));
        assert!(backend.is_available(GpuVariant::Compatibility));
        assert_eq!(backend.accelerators(), vec![GpuVariant::Compatibility]);
    }

    #[test]
    fn unavailable_variant_cannot_build_context() {
        let backend = SoftwareBackend::without_accelerators();
        assert!(matches!(
            backend.create_context(GpuVariant::Primary),
            Err(RenderError::BackendUnavailable(RenderDestination::Gpu(GpuVariant::Primary)))
        ));
    }

    #[test]
    fn filters_match_the_cpu_kernels() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.create_context(GpuVariant::Primary).unwrap();
        let img = solid(12, 12, RED);
        let request = FilterRequest::new(ROUND_CORNERS).with("radius", 4.0);

        let out = backend.apply_filter(&mut ctx, Some(&img), &request).unwrap();
        let pixels = backend.render(&mut ctx, &out).unwrap();

        assert_eq!(pixels, cpu::round_corners(&img, 4.0).unwrap());
        assert_eq!(ctx.handle::<SoftwareContext>().unwrap().filters_applied, 1);
    }

    #[test]
    fn foreign_context_is_rejected() {
        let backend = SoftwareBackend::new();
        let mut ctx = RenderContext::new(GpuVariant::Primary, "not ours");
        let img = solid(2, 2, RED);
        assert!(matches!(
            backend.apply_filter(&mut ctx, Some(&img), &FilterRequest::new(EXPOSURE)),
            Err(RenderError::FilterApplicationFailed { .. })
        ));
    }

    #[test]
    fn foreign_image_cannot_be_extracted() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.create_context(GpuVariant::Primary).unwrap();
        let foreign = FilterImage::new(Rect::new(0.0, 0.0, 1.0, 1.0), 0u8);
        assert!(matches!(
            backend.render(&mut ctx, &foreign),
            Err(RenderError::BufferExtractionFailed(_))
        ));
    }

    #[test]
    fn bad_quality_parameter_fails_the_filter() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.create_context(GpuVariant::Compatibility).unwrap();
        let request = FilterRequest::new(EXPOSURE).with("quality", "ultra");
        assert!(backend
            .apply_filter(&mut ctx, Some(&solid(1, 1, RED)), &request)
            .is_err());
    }
}
