//! Shared test utilities for the rich-image test suite.
//!
//! Provides synthetic pixel fixtures so tests never depend on files on disk.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let img = two_tone(4, 2);            // left half red, right half blue
//! let buf = buffer(solid(8, 8, RED), 2.0);
//! assert_eq!(buf.size(), Size::new(4.0, 4.0));
//! ```

use crate::imaging::{PixelBuffer, RichImage};
use image::{Rgba, RgbaImage};
use std::time::Duration;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

// =========================================================================
// Pixel fixtures
// =========================================================================

pub fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

/// Left half red, right half blue (the middle column of odd widths is red).
pub fn two_tone(width: u32, height: u32) -> RgbaImage {
    let split = width.div_ceil(2);
    RgbaImage::from_fn(width, height, |x, _| if x < split { RED } else { BLUE })
}

/// Every pixel distinct, handy for catching transposed coordinates.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 16 % 256) as u8, (y * 16 % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

// =========================================================================
// Buffer fixtures
// =========================================================================

pub fn buffer(pixels: RgbaImage, scale: f64) -> PixelBuffer {
    PixelBuffer::with_scale(pixels, scale)
}

/// `frames` solid frames of increasing grey, 100 ms each.
pub fn animated(width: u32, height: u32, frames: u32) -> RichImage {
    let buffers = (0..frames)
        .map(|i| {
            let v = (i * 40 % 256) as u8;
            PixelBuffer::new(solid(width, height, Rgba([v, v, v, 255])))
        })
        .collect();
    RichImage::animated(buffers, Duration::from_millis(100 * frames as u64))
}
