//! Direct pixel path.
//!
//! Every function takes concrete RGBA pixels and pixel-space geometry and
//! returns new pixels. The same kernels back the
//! [`SoftwareBackend`](super::software::SoftwareBackend) filter graph, so
//! both execution paths agree on output.
//!
//! ## Crate mapping
//!
//! | Operation | Implementation |
//! |---|---|
//! | Crop | `image::imageops::crop_imm` on the integral rect |
//! | Resize | `image::imageops::resize` with the quality's `FilterType` |
//! | Rotate / affine | inverse-mapped warp, rows in parallel (rayon) |
//! | Flip | `image::imageops::flip_horizontal` / `flip_vertical` |
//! | Rounded corners | coverage mask from [`corner_coverage`] |
//! | Gaussian blur | `image::imageops::blur` |
//! | Colour filters | per-pixel arithmetic in `[0, 1]` |

use super::backend::{FilterRequest, RenderError};
use super::dispatch::FlipAxis;
use super::params::InterpolationQuality;
use crate::geometry::{Affine, Point, Rect, Size};
use image::{Rgba, RgbaImage, imageops};
use rayon::prelude::*;

pub const CROP: &str = "crop";
pub const RESIZE: &str = "resize";
pub const AFFINE: &str = "affine";
pub const ROUND_CORNERS: &str = "round-corners";
pub const CONSTANT_COLOR: &str = "constant-color";
pub const GAUSSIAN_BLUR: &str = "gaussian-blur";
pub const COLOR_CLAMP: &str = "color-clamp";
pub const COLOR_CONTROLS: &str = "color-controls";
pub const EXPOSURE: &str = "exposure";

/// Filters a caller may request by name.
pub const NAMED_FILTERS: &[&str] = &[GAUSSIAN_BLUR, COLOR_CLAMP, COLOR_CONTROLS, EXPOSURE];

/// Upper bound on the pixel count of any produced image.
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 28;

/// Reject a `width × height` output above [`MAX_OUTPUT_PIXELS`].
pub fn check_output(what: &str, width: u64, height: u64) -> Result<(), RenderError> {
    match width.checked_mul(height) {
        Some(n) if n <= MAX_OUTPUT_PIXELS => Ok(()),
        _ => Err(RenderError::invalid(format!("{what} {width}x{height} is too large"))),
    }
}

fn pixel_bounds(src: &RgbaImage) -> Rect {
    Rect::from_size(Size::from_pixels(src.width(), src.height()))
}

/// Crop to the integral hull of `rect`, clipped to the image.
pub fn crop(src: &RgbaImage, rect: Rect) -> Result<RgbaImage, RenderError> {
    if !rect.size.is_drawable() {
        return Err(RenderError::invalid(format!(
            "crop rect {}x{} is empty",
            rect.width(),
            rect.height()
        )));
    }
    let clipped = rect
        .integral()
        .intersection(&pixel_bounds(src))
        .ok_or_else(|| RenderError::invalid("crop rect lies outside the image"))?;
    Ok(imageops::crop_imm(
        src,
        clipped.x() as u32,
        clipped.y() as u32,
        clipped.width() as u32,
        clipped.height() as u32,
    )
    .to_image())
}

pub fn resize(
    src: &RgbaImage,
    width: u32,
    height: u32,
    quality: InterpolationQuality,
) -> Result<RgbaImage, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::invalid(format!(
            "resize target {width}x{height} is empty"
        )));
    }
    check_output("resize target", width as u64, height as u64)?;
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }
    Ok(imageops::resize(src, width, height, quality.filter_type()))
}

// Trig results like cos(π/2) land a hair off whole pixels.
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < 1e-6 { r } else { v }
}

/// Apply `transform`. The output covers the bounding box of the transformed
/// image rounded up to whole pixels and centred on it, so nothing is clipped
/// and translation does not move the result.
pub fn transform(
    src: &RgbaImage,
    transform: &Affine,
    quality: InterpolationQuality,
) -> Result<RgbaImage, RenderError> {
    let inverse = transform
        .invert()
        .ok_or_else(|| RenderError::invalid("transform is not invertible"))?;
    let raw = pixel_bounds(src).transformed_bounds(transform);
    if !raw.size.is_drawable() {
        return Err(RenderError::invalid("transformed image is empty"));
    }
    let span = Size::new(snap(raw.width()).ceil(), snap(raw.height()).ceil());
    let origin = Point::new(
        raw.x() - (span.width - raw.width()) * 0.5,
        raw.y() - (span.height - raw.height()) * 0.5,
    );
    let (width, height) = (span.width as u32, span.height as u32);
    check_output("transformed image", width as u64, height as u64)?;

    let smooth = quality.smooth();
    let mut out = RgbaImage::new(width, height);
    let raw_out: &mut [u8] = &mut out;
    raw_out
        .par_chunks_mut(width as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let dest = Point::new(origin.x + x as f64 + 0.5, origin.y + y as f64 + 0.5);
                let at = inverse.apply(dest);
                px.copy_from_slice(&sample(src, at, smooth).0);
            }
        });
    Ok(out)
}

/// Rotate by `radians` (clockwise on screen). The canvas grows to the
/// rotated bounding box; uncovered pixels are transparent.
pub fn rotate(
    src: &RgbaImage,
    radians: f64,
    quality: InterpolationQuality,
) -> Result<RgbaImage, RenderError> {
    if !radians.is_finite() {
        return Err(RenderError::invalid("rotation angle must be finite"));
    }
    transform(src, &Affine::rotation(radians), quality)
}

pub fn flip(src: &RgbaImage, axis: FlipAxis) -> RgbaImage {
    match axis {
        FlipAxis::Horizontal => imageops::flip_horizontal(src),
        FlipAxis::Vertical => imageops::flip_vertical(src),
    }
}

/// Sample `src` at a continuous position (pixel centres at `i + 0.5`).
/// Positions outside the image read as transparent.
fn sample(src: &RgbaImage, at: Point, smooth: bool) -> Rgba<u8> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let texel = |x: i64, y: i64| {
        if x < 0 || y < 0 || x >= w || y >= h {
            None
        } else {
            Some(*src.get_pixel(x as u32, y as u32))
        }
    };

    if !smooth {
        return texel(at.x.floor() as i64, at.y.floor() as i64).unwrap_or(Rgba([0, 0, 0, 0]));
    }

    let gx = at.x - 0.5;
    let gy = at.y - 0.5;
    let x0 = gx.floor();
    let y0 = gy.floor();
    let fx = gx - x0;
    let fy = gy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    // Premultiplied accumulation keeps transparent taps from darkening edges.
    let mut alpha = 0.0;
    let mut color = [0.0f64; 3];
    for (dx, dy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        if let Some(p) = texel(x0 + dx, y0 + dy) {
            let a = weight * p[3] as f64;
            alpha += a;
            for c in 0..3 {
                color[c] += a * p[c] as f64;
            }
        }
    }
    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([
        to_u8(color[0] / alpha),
        to_u8(color[1] / alpha),
        to_u8(color[2] / alpha),
        to_u8(alpha),
    ])
}

fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Coverage in `[0, 1]` of pixel `(x, y)` inside a `width × height` rounded
/// rect with corner `radius` (clamped to half the short side).
pub fn corner_coverage(x: u32, y: u32, width: u32, height: u32, radius: f64) -> f64 {
    if radius <= 0.0 {
        return 1.0;
    }
    let (w, h) = (width as f64, height as f64);
    let r = radius.min(w.min(h) * 0.5);
    let px = x as f64 + 0.5;
    let py = y as f64 + 0.5;
    let dx = px - px.clamp(r, w - r);
    let dy = py - py.clamp(r, h - r);
    if dx == 0.0 || dy == 0.0 {
        return 1.0;
    }
    (r - dx.hypot(dy) + 0.5).clamp(0.0, 1.0)
}

/// Clip to a rounded rect: alpha outside the corners fades to zero.
pub fn round_corners(src: &RgbaImage, radius: f64) -> Result<RgbaImage, RenderError> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(RenderError::invalid(format!(
            "corner radius {radius} must be finite and non-negative"
        )));
    }
    let (w, h) = src.dimensions();
    let mut out = src.clone();
    if radius == 0.0 {
        return Ok(out);
    }
    for (x, y, px) in out.enumerate_pixels_mut() {
        let coverage = corner_coverage(x, y, w, h, radius);
        if coverage < 1.0 {
            px[3] = to_u8(px[3] as f64 * coverage);
        }
    }
    Ok(out)
}

/// Surround with a transparent border `width` pixels wide.
pub fn bordered(src: &RgbaImage, width: u32) -> Result<RgbaImage, RenderError> {
    if width == 0 {
        return Ok(src.clone());
    }
    let grow = |side: u32| width.checked_mul(2).and_then(|b| side.checked_add(b));
    let (Some(w), Some(h)) = (grow(src.width()), grow(src.height())) else {
        return Err(RenderError::invalid(format!("border {width} is too wide")));
    };
    check_output("bordered image", w as u64, h as u64)?;
    let mut out = RgbaImage::new(w, h);
    imageops::replace(&mut out, src, width as i64, width as i64);
    Ok(out)
}

pub fn gaussian_blur(src: &RgbaImage, radius: f64) -> Result<RgbaImage, RenderError> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(RenderError::filter(
            GAUSSIAN_BLUR,
            format!("radius {radius} must be finite and non-negative"),
        ));
    }
    if radius == 0.0 {
        return Ok(src.clone());
    }
    Ok(imageops::blur(src, radius as f32))
}

fn map_channels(src: &RgbaImage, f: impl Fn([f64; 4]) -> [f64; 4]) -> RgbaImage {
    let mut out = src.clone();
    for px in out.pixels_mut() {
        let unit = px.0.map(|c| c as f64 / 255.0);
        px.0 = f(unit).map(|c| to_u8(c * 255.0));
    }
    out
}

pub fn color_clamp(src: &RgbaImage, min: [f64; 4], max: [f64; 4]) -> RgbaImage {
    map_channels(src, |c| std::array::from_fn(|i| c[i].clamp(min[i], max[i].max(min[i]))))
}

/// Saturation around Rec. 709 luma, then additive brightness, then contrast
/// around mid-grey. Alpha is untouched.
pub fn color_controls(src: &RgbaImage, saturation: f64, brightness: f64, contrast: f64) -> RgbaImage {
    map_channels(src, |[r, g, b, a]| {
        let luma = 0.2125 * r + 0.7154 * g + 0.0721 * b;
        let adjust = |c: f64| ((luma + (c - luma) * saturation + brightness) - 0.5) * contrast + 0.5;
        [adjust(r), adjust(g), adjust(b), a]
    })
}

pub fn exposure(src: &RgbaImage, ev: f64) -> RgbaImage {
    let gain = 2f64.powf(ev);
    map_channels(src, |[r, g, b, a]| [r * gain, g * gain, b * gain, a])
}

fn vector4_or(request: &FilterRequest, key: &str, default: [f64; 4]) -> Result<[f64; 4], RenderError> {
    if request.params.get(key).is_none() {
        return Ok(default);
    }
    let v = request.vector(key, 4)?;
    Ok([v[0], v[1], v[2], v[3]])
}

/// Run a filter request on concrete pixels. Generator filters take no input.
pub fn apply_filter(
    input: Option<&RgbaImage>,
    request: &FilterRequest,
    quality: InterpolationQuality,
) -> Result<RgbaImage, RenderError> {
    let input = || {
        input.ok_or_else(|| RenderError::filter(&request.name, "requires an input image"))
    };
    match request.name.as_str() {
        CROP => crop(input()?, request.rect("rect")?),
        RESIZE => {
            let size = request.vector("size", 2)?;
            let target = Size::new(size[0], size[1]);
            if !target.is_drawable() {
                return Err(RenderError::invalid(format!(
                    "resize target {}x{} is empty",
                    target.width, target.height
                )));
            }
            let (w, h) = target.ceil_pixels();
            resize(input()?, w, h, quality)
        }
        AFFINE => {
            let m = request.vector("transform", 6)?;
            let affine = Affine {
                a: m[0],
                b: m[1],
                c: m[2],
                d: m[3],
                tx: m[4],
                ty: m[5],
            };
            transform(input()?, &affine, quality)
        }
        ROUND_CORNERS => round_corners(input()?, request.number("radius")?),
        CONSTANT_COLOR => {
            let color = vector4_or(request, "color", [0.0, 0.0, 0.0, 1.0])?;
            let extent = request.rect("extent")?;
            if !extent.size.is_drawable() {
                return Err(RenderError::invalid("constant colour extent is empty"));
            }
            let (w, h) = extent.size.ceil_pixels();
            check_output("constant colour extent", w as u64, h as u64)?;
            Ok(RgbaImage::from_pixel(w, h, Rgba(color.map(|c| to_u8(c * 255.0)))))
        }
        GAUSSIAN_BLUR => gaussian_blur(input()?, request.number_or("radius", 10.0)?),
        COLOR_CLAMP => {
            let min = vector4_or(request, "min", [0.0; 4])?;
            let max = vector4_or(request, "max", [1.0; 4])?;
            Ok(color_clamp(input()?, min, max))
        }
        COLOR_CONTROLS => Ok(color_controls(
            input()?,
            request.number_or("saturation", 1.0)?,
            request.number_or("brightness", 0.0)?,
            request.number_or("contrast", 1.0)?,
        )),
        EXPOSURE => Ok(exposure(input()?, request.number_or("ev", 0.5)?)),
        other => Err(RenderError::filter(other, "unknown filter")),
    }
}
