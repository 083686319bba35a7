//! Reading and writing [`RichImage`]s.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode stills (JPEG, PNG, WebP, GIF) | `image::ImageReader` |
//! | Decode animated GIF | `image::codecs::gif::GifDecoder` + `AnimationDecoder` |
//! | Encode PNG / WebP | `RgbaImage::save_with_format` |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` (alpha dropped) |
//! | Encode animated GIF | `image::codecs::gif::GifEncoder`, infinite loop |
//!
//! GIF frame delays shorter than 100 ms are raised to 100 ms, the way
//! browsers treat "as fast as possible" frames.

use super::buffer::{PixelBuffer, RichImage};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::{
    AnimationDecoder, Delay, DynamicImage, ExtendedColorType, Frame, ImageEncoder, ImageFormat,
    ImageReader, RgbaImage,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported format: {0}")]
    Unsupported(String),
    #[error("Image has no frames")]
    Empty,
}

/// Shortest delay a GIF frame is shown for.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(100);

const JPEG_START_QUALITY: u8 = 90;
const JPEG_QUALITY_STEP: u8 = 2;

fn format_of(path: &Path) -> Result<ImageFormat, CodecError> {
    ImageFormat::from_path(path)
        .map_err(|_| CodecError::Unsupported(path.display().to_string()))
}

/// Load an image at scale 1.
pub fn load(path: &Path) -> Result<RichImage, CodecError> {
    load_scaled(path, 1.0)
}

/// Load an image whose pixels represent points at `scale`.
///
/// Multi-frame GIFs become animated images; everything else is a still.
pub fn load_scaled(path: &Path, scale: f64) -> Result<RichImage, CodecError> {
    if format_of(path)? == ImageFormat::Gif {
        return load_gif(path, scale);
    }
    let pixels = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    debug!(path = %path.display(), width = pixels.width(), height = pixels.height(), "decoded still");
    Ok(RichImage::still(PixelBuffer::with_scale(pixels, scale)))
}

fn clamp_delay(delay: Delay) -> Duration {
    let (numer, denom) = delay.numer_denom_ms();
    let ms = if denom == 0 { 0 } else { numer / denom };
    Duration::from_millis(ms as u64).max(MIN_FRAME_DELAY)
}

fn load_gif(path: &Path, scale: f64) -> Result<RichImage, CodecError> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder.into_frames().collect_frames()?;
    if frames.is_empty() {
        return Err(CodecError::Empty);
    }

    let duration: Duration = frames.iter().map(|f| clamp_delay(f.delay())).sum();
    let buffers: Vec<PixelBuffer> = frames
        .into_iter()
        .map(|f| PixelBuffer::with_scale(f.into_buffer(), scale))
        .collect();
    debug!(path = %path.display(), frames = buffers.len(), ?duration, "decoded gif");

    if buffers.len() == 1 {
        Ok(RichImage {
            frames: buffers,
            duration: None,
        })
    } else {
        Ok(RichImage::animated(buffers, duration))
    }
}

/// Write `image` to `path`, format chosen by extension.
///
/// GIFs keep every frame with the duration spread evenly; other formats
/// store the first frame.
pub fn save(image: &RichImage, path: &Path) -> Result<(), CodecError> {
    let first = image.first().ok_or(CodecError::Empty)?;
    match format_of(path)? {
        ImageFormat::Gif => save_gif(image, path),
        ImageFormat::Jpeg => {
            let bytes = encode_jpeg(&first.pixels, JPEG_START_QUALITY)?;
            std::fs::write(path, bytes)?;
            Ok(())
        }
        format @ (ImageFormat::Png | ImageFormat::WebP) => {
            first.pixels.save_with_format(path, format)?;
            Ok(())
        }
        other => Err(CodecError::Unsupported(format!("{other:?}"))),
    }
}

fn save_gif(image: &RichImage, path: &Path) -> Result<(), CodecError> {
    let count = image.frames.len().max(1) as u32;
    let per_frame = image
        .duration
        .map(|d| d / count)
        .unwrap_or(MIN_FRAME_DELAY);
    let delay = Delay::from_saturating_duration(per_frame);

    let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(
        image
            .frames
            .iter()
            .map(|f| Frame::from_parts(f.pixels.clone(), 0, 0, delay)),
    )?;
    Ok(())
}

fn encode_jpeg(pixels: &RgbaImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Encode as JPEG, lowering quality from 90 in steps of 2 until the result
/// is at most `max_bytes`.
///
/// When even the lowest quality is too large, that smallest encoding is
/// returned anyway.
pub fn compress_jpeg(buffer: &PixelBuffer, max_bytes: usize) -> Result<Vec<u8>, CodecError> {
    if max_bytes == 0 {
        return Err(CodecError::Unsupported("a zero-byte JPEG".into()));
    }
    let mut quality = JPEG_START_QUALITY;
    let mut bytes = encode_jpeg(&buffer.pixels, quality)?;
    while bytes.len() > max_bytes && quality > JPEG_QUALITY_STEP {
        quality -= JPEG_QUALITY_STEP;
        bytes = encode_jpeg(&buffer.pixels, quality)?;
    }
    if bytes.len() > max_bytes {
        warn!(max_bytes, len = bytes.len(), "jpeg still exceeds the size limit at lowest quality");
    } else {
        debug!(quality, len = bytes.len(), "jpeg compressed");
    }
    Ok(bytes)
}
