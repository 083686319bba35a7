//! CPU drawing surface used to composite merged images.
//!
//! A [`Canvas`] is sized in points and backed by transparent RGBA pixels at
//! a fixed scale. Buffers are drawn source-over into point rects; the
//! finished pixels are taken out with [`Canvas::extract`].

use super::backend::RenderError;
use super::cpu::check_output;
use super::params::InterpolationQuality;
use crate::geometry::{Rect, Size};
use image::{RgbaImage, imageops};

pub struct Canvas {
    pixels: RgbaImage,
    scale: f64,
    quality: InterpolationQuality,
}

// Layout values are whole points in practice; round rather than floor/ceil
// so 299.9999 stays 300.
fn to_pixels(v: f64) -> i64 {
    v.round() as i64
}

impl Canvas {
    pub fn new(size: Size, scale: f64, quality: InterpolationQuality) -> Result<Self, RenderError> {
        let pixels = size.scale(scale);
        if !pixels.is_drawable() || !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::invalid(format!(
                "canvas {}x{} at scale {scale} is empty",
                size.width, size.height
            )));
        }
        let (w, h) = (to_pixels(pixels.width).max(1), to_pixels(pixels.height).max(1));
        check_output("canvas", w as u64, h as u64)?;
        Ok(Self {
            pixels: RgbaImage::new(w as u32, h as u32),
            scale,
            quality,
        })
    }

    pub fn pixel_dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Draw `buffer` stretched into `target` (points), blending source-over.
    /// Parts outside the canvas are clipped.
    pub fn draw_into(&mut self, buffer: &RgbaImage, target: Rect) -> Result<(), RenderError> {
        if !target.size.is_drawable() {
            return Err(RenderError::invalid(format!(
                "draw rect {}x{} is empty",
                target.width(),
                target.height()
            )));
        }
        if buffer.width() == 0 || buffer.height() == 0 {
            return Err(RenderError::invalid("cannot draw an image without pixels"));
        }
        let px = target.scale(self.scale);
        let x = to_pixels(px.x());
        let y = to_pixels(px.y());
        let (w, h) = (to_pixels(px.width()).max(1), to_pixels(px.height()).max(1));
        check_output("draw rect", w as u64, h as u64)?;
        let (w, h) = (w as u32, h as u32);

        if buffer.dimensions() == (w, h) {
            imageops::overlay(&mut self.pixels, buffer, x, y);
        } else {
            let scaled = imageops::resize(buffer, w, h, self.quality.filter_type());
            imageops::overlay(&mut self.pixels, &scaled, x, y);
        }
        Ok(())
    }

    /// Finish drawing and take the pixels.
    pub fn extract(self) -> RgbaImage {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{BLUE, CLEAR, RED, solid};

    #[test]
    fn new_canvas_is_transparent_at_pixel_scale() {
        let canvas = Canvas::new(Size::new(10.0, 5.0), 2.0, InterpolationQuality::Default).unwrap();
        assert_eq!(canvas.pixel_dimensions(), (20, 10));
        let pixels = canvas.extract();
        assert!(pixels.pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        assert!(Canvas::new(Size::new(0.0, 5.0), 1.0, InterpolationQuality::Default).is_err());
        assert!(Canvas::new(Size::new(5.0, 5.0), 0.0, InterpolationQuality::Default).is_err());
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let result = Canvas::new(Size::new(9_000_001.0, 3000.0), 1.0, InterpolationQuality::Default);
        assert!(matches!(result, Err(RenderError::InvalidGeometry(_))));
        let result = Canvas::new(Size::new(1e30, 1e30), 1.0, InterpolationQuality::Default);
        assert!(matches!(result, Err(RenderError::InvalidGeometry(_))));
    }

    #[test]
    fn oversized_draw_is_rejected_before_resampling() {
        let mut canvas = Canvas::new(Size::new(4.0, 4.0), 1.0, InterpolationQuality::None).unwrap();
        let result = canvas.draw_into(&solid(1, 1, RED), Rect::new(0.0, 0.0, 9_000_001.0, 3000.0));
        assert!(matches!(result, Err(RenderError::InvalidGeometry(_))));
    }

    #[test]
    fn empty_buffer_is_not_drawn() {
        let mut canvas = Canvas::new(Size::new(4.0, 4.0), 1.0, InterpolationQuality::None).unwrap();
        let result = canvas.draw_into(&RgbaImage::new(0, 0), Rect::new(0.0, 0.0, 4.0, 4.0));
        assert!(matches!(result, Err(RenderError::InvalidGeometry(_))));
    }

    #[test]
    fn draw_scales_points_to_pixels() {
        let mut canvas = Canvas::new(Size::new(4.0, 2.0), 2.0, InterpolationQuality::None).unwrap();
        canvas
            .draw_into(&solid(1, 1, RED), Rect::new(2.0, 0.0, 2.0, 2.0))
            .unwrap();
        let out = canvas.extract();
        assert_eq!(out.get_pixel(3, 3)[3], 0);
        assert_eq!(*out.get_pixel(4, 0), RED);
        assert_eq!(*out.get_pixel(7, 3), RED);
    }

    #[test]
    fn later_draws_cover_earlier_ones() {
        let mut canvas = Canvas::new(Size::new(2.0, 2.0), 1.0, InterpolationQuality::None).unwrap();
        canvas.draw_into(&solid(2, 2, RED), Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
        canvas.draw_into(&solid(1, 1, BLUE), Rect::new(1.0, 1.0, 1.0, 1.0)).unwrap();
        let out = canvas.extract();
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(1, 1), BLUE);
    }

    #[test]
    fn draws_are_clipped_to_the_canvas() {
        let mut canvas = Canvas::new(Size::new(2.0, 2.0), 1.0, InterpolationQuality::None).unwrap();
        canvas.draw_into(&solid(4, 4, RED), Rect::new(-1.0, -1.0, 4.0, 4.0)).unwrap();
        assert!(canvas.extract().pixels().all(|p| *p == RED));
    }
}
