//! Pixel buffers and the multi-frame image wrapper.

use crate::geometry::{Rect, Size};
use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Display orientation tag. Carried through every operation unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

/// RGBA8 pixels plus the point-to-pixel `scale` and an orientation tag.
///
/// Geometry handed to the high-level operations is in points; the pixel
/// extent is `points × scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub pixels: RgbaImage,
    pub scale: f64,
    pub orientation: Orientation,
}

impl PixelBuffer {
    pub fn new(pixels: RgbaImage) -> Self {
        Self::with_scale(pixels, 1.0)
    }

    pub fn with_scale(pixels: RgbaImage, scale: f64) -> Self {
        Self {
            pixels,
            scale,
            orientation: Orientation::Up,
        }
    }

    /// New pixels, same scale and orientation.
    pub fn derive(&self, pixels: RgbaImage) -> Self {
        Self {
            pixels,
            scale: self.scale,
            orientation: self.orientation,
        }
    }

    pub fn pixel_size(&self) -> Size {
        Size::from_pixels(self.pixels.width(), self.pixels.height())
    }

    /// Size in points.
    pub fn size(&self) -> Size {
        self.pixel_size().scale(1.0 / self.scale)
    }

    pub fn pixel_bounds(&self) -> Rect {
        Rect::from_size(self.pixel_size())
    }
}

/// One or more frames; more than one means animated.
#[derive(Debug, Clone, PartialEq)]
pub struct RichImage {
    pub frames: Vec<PixelBuffer>,
    /// Total animation duration, `None` for stills.
    pub duration: Option<Duration>,
}

impl RichImage {
    pub fn still(buffer: PixelBuffer) -> Self {
        Self {
            frames: vec![buffer],
            duration: None,
        }
    }

    pub fn animated(frames: Vec<PixelBuffer>, duration: Duration) -> Self {
        Self {
            frames,
            duration: Some(duration),
        }
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn first(&self) -> Option<&PixelBuffer> {
        self.frames.first()
    }

    /// Size in points of the first frame.
    pub fn size(&self) -> Option<Size> {
        self.first().map(PixelBuffer::size)
    }

    /// Apply `op` to every frame in parallel. The first error aborts the
    /// whole image; the duration is kept.
    pub fn try_map_frames<E, F>(&self, op: F) -> Result<RichImage, E>
    where
        E: Send,
        F: Fn(&PixelBuffer) -> Result<PixelBuffer, E> + Sync + Send,
    {
        let frames = self
            .frames
            .par_iter()
            .map(op)
            .collect::<Result<Vec<_>, E>>()?;
        Ok(RichImage {
            frames,
            duration: self.duration,
        })
    }
}

impl From<PixelBuffer> for RichImage {
    fn from(buffer: PixelBuffer) -> Self {
        RichImage::still(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame(w: u32, h: u32, v: u8) -> PixelBuffer {
        PixelBuffer::with_scale(RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255])), 2.0)
    }

    #[test]
    fn size_is_in_points() {
        let buf = frame(200, 100, 0);
        assert_eq!(buf.pixel_size(), Size::new(200.0, 100.0));
        assert_eq!(buf.size(), Size::new(100.0, 50.0));
    }

    #[test]
    fn derive_keeps_scale_and_orientation() {
        let mut buf = frame(4, 4, 0);
        buf.orientation = Orientation::LeftMirrored;
        let out = buf.derive(RgbaImage::new(2, 2));
        assert_eq!(out.scale, 2.0);
        assert_eq!(out.orientation, Orientation::LeftMirrored);
    }

    #[test]
    fn map_frames_keeps_order_and_duration() {
        let image = RichImage::animated(
            vec![frame(2, 2, 10), frame(2, 2, 20), frame(2, 2, 30)],
            Duration::from_millis(300),
        );

        let out = image
            .try_map_frames(|f| Ok::<_, ()>(f.derive(RgbaImage::from_pixel(1, 1, *f.pixels.get_pixel(0, 0)))))
            .unwrap();

        assert_eq!(out.frames.len(), 3);
        assert_eq!(out.duration, Some(Duration::from_millis(300)));
        let firsts: Vec<u8> = out.frames.iter().map(|f| f.pixels.get_pixel(0, 0)[0]).collect();
        assert_eq!(firsts, vec![10, 20, 30]);
    }

    #[test]
    fn map_frames_aborts_on_first_error() {
        let image = RichImage::animated(vec![frame(2, 2, 0), frame(2, 2, 1)], Duration::ZERO);
        let result = image.try_map_frames(|f| {
            if f.pixels.get_pixel(0, 0)[0] == 1 {
                Err("bad frame")
            } else {
                Ok(f.clone())
            }
        });
        assert_eq!(result, Err("bad frame"));
    }

    #[test]
    fn single_frame_is_still() {
        let image = RichImage::from(frame(1, 1, 0));
        assert!(!image.is_animated());
        assert!(image.duration.is_none());
    }
}
