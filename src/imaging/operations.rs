//! High-level image operations.
//!
//! [`Imaging`] is the public facade. It takes geometry in points, converts
//! it to pixels with each frame's scale, and hands the resulting
//! [`Operation`]s to the [`Dispatcher`]. Layout math comes from
//! [`calculations`](super::calculations); compositing happens on a
//! [`Canvas`].
//!
//! Every operation maps over all frames of a [`RichImage`] (in parallel)
//! and keeps the animation duration. The first failing frame fails the
//! whole call; inputs are never modified.

use super::backend::{FilterBackend, FilterRequest, RenderError};
use super::buffer::{PixelBuffer, RichImage};
use super::calculations::{
    MergingMode, ResizingMode, centred_square, crop_rect_fitting, merge_layout, resize_size,
};
use super::canvas::Canvas;
use super::context::RenderContextPool;
use super::cpu;
use super::dispatch::{Dispatcher, FlipAxis, Operation};
use super::params::RenderOption;
use super::software::SoftwareBackend;
use crate::geometry::{Affine, Point, Rect, Size};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tracing::trace;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, RenderError>;

fn require_drawable(what: &str, size: Size) -> Result<()> {
    if size.is_drawable() {
        Ok(())
    } else {
        Err(RenderError::invalid(format!(
            "{what} {}x{} must be finite and positive",
            size.width, size.height
        )))
    }
}

fn require_radius(radius: f64) -> Result<()> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(RenderError::invalid(format!(
            "corner radius {radius} must be finite and non-negative"
        )))
    }
}

/// Entry point for every pixel operation.
#[derive(Clone)]
pub struct Imaging {
    dispatcher: Dispatcher,
}

impl Imaging {
    pub fn new(backend: Arc<dyn FilterBackend>) -> Self {
        Self::with_pool(Arc::new(RenderContextPool::new(backend)))
    }

    pub fn with_pool(pool: Arc<RenderContextPool>) -> Self {
        Self {
            dispatcher: Dispatcher::new(pool),
        }
    }

    /// Backed by the software filter backend with every variant available.
    pub fn software() -> Self {
        Self::new(Arc::new(SoftwareBackend::new()))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn pool(&self) -> &RenderContextPool {
        self.dispatcher.pool()
    }

    fn each_frame<F>(&self, image: &RichImage, op: F) -> Result<RichImage>
    where
        F: Fn(&PixelBuffer) -> Result<PixelBuffer> + Sync + Send,
    {
        image.try_map_frames(op)
    }

    fn dispatch(
        &self,
        frame: &PixelBuffer,
        operation: &Operation,
        option: RenderOption,
    ) -> Result<PixelBuffer> {
        self.dispatcher.render(frame, operation, option)
    }

    // =========================================================================
    // Cropping and resizing
    // =========================================================================

    /// Crop to `rect` (points). The rect is snapped outwards to whole pixels
    /// and must overlap the image.
    pub fn crop(&self, image: &RichImage, rect: Rect, option: RenderOption) -> Result<RichImage> {
        require_drawable("crop rect", rect.size)?;
        self.each_frame(image, |frame| self.crop_frame(frame, rect, option))
    }

    fn crop_frame(&self, frame: &PixelBuffer, rect: Rect, option: RenderOption) -> Result<PixelBuffer> {
        let pixels = rect.scale(frame.scale).integral();
        self.dispatch(frame, &Operation::Crop(pixels), option)
    }

    /// Fit the image to `size` (points) per `mode`: stretch for
    /// `ScaleToFill`, uniform scale for the aspect modes, and an anchored
    /// crop for the directional modes.
    pub fn crop_fitting(
        &self,
        image: &RichImage,
        size: Size,
        mode: ResizingMode,
        option: RenderOption,
    ) -> Result<RichImage> {
        require_drawable("target size", size)?;
        match mode {
            ResizingMode::ScaleToFill => self.resize_fill(image, size, option),
            ResizingMode::ScaleAspectFit | ResizingMode::ScaleAspectFill => {
                self.resize_fit(image, size, mode, option)
            }
            _ => self.each_frame(image, |frame| {
                let rect = crop_rect_fitting(frame.size(), size, mode)?;
                self.crop_frame(frame, rect, option)
            }),
        }
    }

    /// Stretch to exactly `size` (points).
    pub fn resize_fill(&self, image: &RichImage, size: Size, option: RenderOption) -> Result<RichImage> {
        require_drawable("target size", size)?;
        self.each_frame(image, |frame| {
            self.dispatch(frame, &Operation::Resize(size.scale(frame.scale)), option)
        })
    }

    /// Resize towards `size` (points). Aspect modes scale uniformly; other
    /// modes stretch.
    pub fn resize_fit(
        &self,
        image: &RichImage,
        size: Size,
        mode: ResizingMode,
        option: RenderOption,
    ) -> Result<RichImage> {
        require_drawable("target size", size)?;
        self.each_frame(image, |frame| {
            let target = resize_size(frame.size(), size, mode)?;
            self.dispatch(frame, &Operation::Resize(target.scale(frame.scale)), option)
        })
    }

    // =========================================================================
    // Geometric transforms
    // =========================================================================

    /// Rotate clockwise by `radians`; the canvas grows to fit.
    pub fn rotate(&self, image: &RichImage, radians: f64, option: RenderOption) -> Result<RichImage> {
        self.each_frame(image, |frame| {
            self.dispatch(frame, &Operation::Rotate(radians), option)
        })
    }

    pub fn flip(&self, image: &RichImage, axis: FlipAxis, option: RenderOption) -> Result<RichImage> {
        self.each_frame(image, |frame| self.dispatch(frame, &Operation::Flip(axis), option))
    }

    /// Apply an affine transform given in points.
    pub fn transform(
        &self,
        image: &RichImage,
        transform: Affine,
        option: RenderOption,
    ) -> Result<RichImage> {
        self.each_frame(image, |frame| {
            let pixels = Affine {
                tx: transform.tx * frame.scale,
                ty: transform.ty * frame.scale,
                ..transform
            };
            self.dispatch(frame, &Operation::Affine(pixels), option)
        })
    }

    /// Round the corners with `radius` points (clamped to half the short
    /// side).
    pub fn round(&self, image: &RichImage, radius: f64, option: RenderOption) -> Result<RichImage> {
        require_radius(radius)?;
        self.each_frame(image, |frame| {
            self.dispatch(frame, &Operation::Round(radius * frame.scale), option)
        })
    }

    /// Round with half the short side as radius: squares become circles.
    pub fn cornered(&self, image: &RichImage, option: RenderOption) -> Result<RichImage> {
        self.each_frame(image, |frame| {
            let size = frame.size();
            let radius = size.width.min(size.height) * 0.5;
            self.dispatch(frame, &Operation::Round(radius * frame.scale), option)
        })
    }

    // =========================================================================
    // Compositing
    // =========================================================================

    /// Merge `others` into `image` one after another per `mode`.
    ///
    /// Each frame of `image` is merged with the first frame of every other
    /// image. The canvas uses the base frame's scale; `option` only selects
    /// the interpolation used when drawing.
    pub fn merge(
        &self,
        image: &RichImage,
        others: &[RichImage],
        mode: MergingMode,
        option: RenderOption,
    ) -> Result<RichImage> {
        let incoming = others
            .iter()
            .map(|other| {
                other
                    .first()
                    .ok_or_else(|| RenderError::invalid("cannot merge an image without frames"))
            })
            .collect::<Result<Vec<&PixelBuffer>>>()?;
        self.each_frame(image, |frame| merge_frame(frame, &incoming, mode, option))
    }

    /// Square thumbnail: aspect-fill to `side` points, centre crop, then an
    /// optional transparent border and rounded corners.
    pub fn thumbnail(
        &self,
        image: &RichImage,
        side: f64,
        border: f64,
        corner_radius: f64,
        option: RenderOption,
    ) -> Result<RichImage> {
        require_drawable("thumbnail", Size::new(side, side))?;
        require_radius(corner_radius)?;
        if !border.is_finite() || border < 0.0 {
            return Err(RenderError::invalid(format!("border {border} must be non-negative")));
        }
        self.each_frame(image, |frame| {
            let target = resize_size(frame.size(), Size::new(side, side), ResizingMode::ScaleAspectFill)?;
            let resized = self.dispatch(frame, &Operation::Resize(target.scale(frame.scale)), option)?;
            let square = centred_square(resized.size(), side);
            let mut thumb = self.crop_frame(&resized, square, option)?;
            if border > 0.0 {
                thumb = bordered_frame(&thumb, border)?;
            }
            if corner_radius > 0.0 {
                thumb = self.dispatch(&thumb, &Operation::Round(corner_radius * thumb.scale), option)?;
            }
            Ok(thumb)
        })
    }

    /// Scale down (or up) so the longer side is `max_side` points.
    pub fn thumbnail_fitting(
        &self,
        image: &RichImage,
        max_side: f64,
        option: RenderOption,
    ) -> Result<RichImage> {
        self.resize_fit(
            image,
            Size::new(max_side, max_side),
            ResizingMode::ScaleAspectFit,
            option,
        )
    }

    /// Add a transparent border `width` points wide. CPU only.
    pub fn bordered(&self, image: &RichImage, width: f64) -> Result<RichImage> {
        if !width.is_finite() || width < 0.0 {
            return Err(RenderError::invalid(format!("border {width} must be non-negative")));
        }
        self.each_frame(image, |frame| bordered_frame(frame, width))
    }

    /// Run one of [`cpu::NAMED_FILTERS`]. Geometric filter ids are reached
    /// through their own operations instead.
    pub fn filter(
        &self,
        image: &RichImage,
        request: &FilterRequest,
        option: RenderOption,
    ) -> Result<RichImage> {
        if !cpu::NAMED_FILTERS.contains(&request.name.as_str()) {
            return Err(RenderError::filter(&request.name, "not a named filter"));
        }
        let operation = Operation::Filter(request.clone());
        self.each_frame(image, |frame| self.dispatch(frame, &operation, option))
    }

    // =========================================================================
    // Sampling and generation
    // =========================================================================

    /// RGBA of the first frame at `point` (points), `None` outside the image.
    pub fn color_at(image: &RichImage, point: Point) -> Option<Rgba<u8>> {
        let frame = image.first()?;
        let x = (point.x * frame.scale).floor();
        let y = (point.y * frame.scale).floor();
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= frame.pixels.width() || y >= frame.pixels.height() {
            return None;
        }
        Some(*frame.pixels.get_pixel(x, y))
    }

    /// Solid-colour still of `size` points at `scale`.
    pub fn filled(color: Rgba<u8>, size: Size, scale: f64) -> Result<RichImage> {
        require_drawable("fill size", size)?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::invalid(format!("scale {scale} must be positive")));
        }
        let (w, h) = size.scale(scale).ceil_pixels();
        cpu::check_output("fill size", w as u64, h as u64)?;
        Ok(RichImage::still(PixelBuffer::with_scale(
            RgbaImage::from_pixel(w, h, color),
            scale,
        )))
    }
}

fn bordered_frame(frame: &PixelBuffer, width: f64) -> Result<PixelBuffer> {
    if frame.pixels.width() == 0 || frame.pixels.height() == 0 {
        return Err(RenderError::invalid("cannot border an image without pixels"));
    }
    let px = (width * frame.scale).round();
    if px > u32::MAX as f64 {
        return Err(RenderError::invalid(format!("border {width} is too wide")));
    }
    Ok(frame.derive(cpu::bordered(&frame.pixels, px as u32)?))
}

fn merge_frame(
    base: &PixelBuffer,
    incoming: &[&PixelBuffer],
    mode: MergingMode,
    option: RenderOption,
) -> Result<PixelBuffer> {
    let mut merged = base.clone();
    for other in incoming {
        let layout = merge_layout(merged.size(), other.size(), mode)?;
        trace!(%mode, canvas = ?layout.canvas, "merging frame");
        let mut canvas = Canvas::new(layout.canvas, merged.scale, option.quality)?;
        canvas.draw_into(&merged.pixels, layout.base)?;
        canvas.draw_into(&other.pixels, layout.incoming)?;
        merged = merged.derive(canvas.extract());
    }
    Ok(merged)
}
