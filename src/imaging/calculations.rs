//! Pure layout geometry for compositing, cropping and resizing.
//!
//! Nothing here touches pixels: every function maps sizes and rects to other
//! sizes and rects, so the whole module is testable without images.
//!
//! ## Merge layouts
//!
//! [`merge_layout`] places a *base* rect and an *incoming* rect on a shared
//! canvas according to a [`MergingMode`]:
//!
//! | Mode | Canvas | Placement |
//! |---|---|---|
//! | `Overlay(m)` | `(max w, max h)` | both rects resized or anchored per `m` |
//! | `Horizontal(dir, m)` | `(w₁ + w₂, max h)` | side by side, order per `dir` |
//! | `Vertical(dir, m)` | `(max w, h₁ + h₂)` | stacked, order per `dir` |
//!
//! On the stacking axis the aspect modes co-scale the two rects to a common
//! height (or width) with [`scale_to_equal_height`] / [`scale_to_equal_width`].
//! Anchors that pin both rects to an edge across the stacking axis
//! (`Left`/`Right` for horizontal, `Top`/`Bottom` for vertical, and every
//! corner) fall back to an overlay on a `(max w, max h)` canvas.

use super::backend::RenderError;
use crate::geometry::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseLayoutError {
    #[error("unknown resizing mode '{0}'")]
    ResizingMode(String),
    #[error("unknown merging mode '{0}' (expected overlay, horizontal[-rtl] or vertical[-btt], optionally followed by ':<resizing-mode>')")]
    MergingMode(String),
}

/// How a rect is sized or placed inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizingMode {
    ScaleToFill,
    ScaleAspectFit,
    ScaleAspectFill,
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizingMode {
    pub const ALL: [ResizingMode; 12] = [
        ResizingMode::ScaleToFill,
        ResizingMode::ScaleAspectFit,
        ResizingMode::ScaleAspectFill,
        ResizingMode::Center,
        ResizingMode::Top,
        ResizingMode::Bottom,
        ResizingMode::Left,
        ResizingMode::Right,
        ResizingMode::TopLeft,
        ResizingMode::TopRight,
        ResizingMode::BottomLeft,
        ResizingMode::BottomRight,
    ];

    /// Fractions of the free space placed before the rect on each axis, or
    /// `None` for the three scaling modes.
    pub fn anchor(self) -> Option<(f64, f64)> {
        match self {
            ResizingMode::ScaleToFill
            | ResizingMode::ScaleAspectFit
            | ResizingMode::ScaleAspectFill => None,
            ResizingMode::Center => Some((0.5, 0.5)),
            ResizingMode::Top => Some((0.5, 0.0)),
            ResizingMode::Bottom => Some((0.5, 1.0)),
            ResizingMode::Left => Some((0.0, 0.5)),
            ResizingMode::Right => Some((1.0, 0.5)),
            ResizingMode::TopLeft => Some((0.0, 0.0)),
            ResizingMode::TopRight => Some((1.0, 0.0)),
            ResizingMode::BottomLeft => Some((0.0, 1.0)),
            ResizingMode::BottomRight => Some((1.0, 1.0)),
        }
    }

    pub fn is_aspect(self) -> bool {
        matches!(
            self,
            ResizingMode::ScaleAspectFit | ResizingMode::ScaleAspectFill
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ResizingMode::ScaleToFill => "scale-to-fill",
            ResizingMode::ScaleAspectFit => "scale-aspect-fit",
            ResizingMode::ScaleAspectFill => "scale-aspect-fill",
            ResizingMode::Center => "center",
            ResizingMode::Top => "top",
            ResizingMode::Bottom => "bottom",
            ResizingMode::Left => "left",
            ResizingMode::Right => "right",
            ResizingMode::TopLeft => "top-left",
            ResizingMode::TopRight => "top-right",
            ResizingMode::BottomLeft => "bottom-left",
            ResizingMode::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for ResizingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResizingMode {
    type Err = ParseLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        ResizingMode::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| ParseLayoutError::ResizingMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HorizontalDirection {
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerticalDirection {
    TopToBottom,
    BottomToTop,
}

/// How two images are composited onto one canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergingMode {
    Overlay(ResizingMode),
    Horizontal(HorizontalDirection, ResizingMode),
    Vertical(VerticalDirection, ResizingMode),
}

impl fmt::Display for MergingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergingMode::Overlay(m) => write!(f, "overlay:{m}"),
            MergingMode::Horizontal(HorizontalDirection::LeftToRight, m) => {
                write!(f, "horizontal:{m}")
            }
            MergingMode::Horizontal(HorizontalDirection::RightToLeft, m) => {
                write!(f, "horizontal-rtl:{m}")
            }
            MergingMode::Vertical(VerticalDirection::TopToBottom, m) => write!(f, "vertical:{m}"),
            MergingMode::Vertical(VerticalDirection::BottomToTop, m) => {
                write!(f, "vertical-btt:{m}")
            }
        }
    }
}

impl FromStr for MergingMode {
    type Err = ParseLayoutError;

    /// Parses `<kind>[:<resizing-mode>]`, e.g. `vertical:scale-aspect-fit` or
    /// `horizontal-rtl:center`. The resizing mode defaults to `center`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, mode) = match s.split_once(':') {
            Some((kind, mode)) => (kind, mode.parse()?),
            None => (s, ResizingMode::Center),
        };
        match kind.trim().to_ascii_lowercase().as_str() {
            "overlay" => Ok(MergingMode::Overlay(mode)),
            "horizontal" | "horizontal-ltr" => Ok(MergingMode::Horizontal(
                HorizontalDirection::LeftToRight,
                mode,
            )),
            "horizontal-rtl" => Ok(MergingMode::Horizontal(
                HorizontalDirection::RightToLeft,
                mode,
            )),
            "vertical" | "vertical-ttb" => {
                Ok(MergingMode::Vertical(VerticalDirection::TopToBottom, mode))
            }
            "vertical-btt" => Ok(MergingMode::Vertical(VerticalDirection::BottomToTop, mode)),
            _ => Err(ParseLayoutError::MergingMode(s.to_string())),
        }
    }
}

/// Result of a merge layout: the canvas and where each image is drawn on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeLayout {
    pub canvas: Size,
    pub base: Rect,
    pub incoming: Rect,
}

fn check_drawable(label: &str, size: Size) -> Result<(), RenderError> {
    if size.is_drawable() {
        Ok(())
    } else {
        Err(RenderError::invalid(format!(
            "{label} size {}x{} must be finite and positive",
            size.width, size.height
        )))
    }
}

/// Compute where `base` and `incoming` land when merged with `mode`.
///
/// Fails with [`RenderError::InvalidGeometry`] when either size is empty,
/// negative or non-finite.
pub fn merge_layout(
    base: Size,
    incoming: Size,
    mode: MergingMode,
) -> Result<MergeLayout, RenderError> {
    check_drawable("base", base)?;
    check_drawable("incoming", incoming)?;

    let layout = match mode {
        MergingMode::Overlay(m) => overlay(base, incoming, m),
        MergingMode::Horizontal(dir, m) => horizontal(base, incoming, dir, m)?,
        MergingMode::Vertical(dir, m) => vertical(base, incoming, dir, m)?,
    };
    trace!(%mode, ?layout, "merge layout");
    Ok(layout)
}

fn overlay(base: Size, incoming: Size, mode: ResizingMode) -> MergeLayout {
    let canvas = base.max(incoming);
    let place = |size: Size| match mode {
        ResizingMode::ScaleToFill => Rect::from_size(canvas),
        ResizingMode::ScaleAspectFit => aspect_fit_rect(size, canvas),
        ResizingMode::ScaleAspectFill => aspect_fill_rect(size, canvas),
        _ => Rect {
            origin: anchor_origin(mode, canvas, size),
            size,
        },
    };
    MergeLayout {
        canvas,
        base: place(base),
        incoming: place(incoming),
    }
}

fn horizontal(
    base: Size,
    incoming: Size,
    dir: HorizontalDirection,
    mode: ResizingMode,
) -> Result<MergeLayout, RenderError> {
    let ltr = dir == HorizontalDirection::LeftToRight;
    match mode {
        ResizingMode::ScaleAspectFit | ResizingMode::ScaleAspectFill => {
            let (lead, trail) = if ltr {
                (base, incoming)
            } else {
                (incoming, base)
            };
            let (lead, trail) =
                scale_to_equal_height(Rect::from_size(lead), Rect::from_size(trail))?;
            let canvas = Size::new(lead.width() + trail.width(), lead.height());
            let (base, incoming) = if ltr { (lead, trail) } else { (trail, lead) };
            Ok(MergeLayout {
                canvas,
                base,
                incoming,
            })
        }
        ResizingMode::ScaleToFill | ResizingMode::Center | ResizingMode::Top | ResizingMode::Bottom => {
            let height = base.height.max(incoming.height);
            let canvas = Size::new(base.width + incoming.width, height);
            let (base_x, incoming_x) = if ltr {
                (0.0, base.width)
            } else {
                (incoming.width, 0.0)
            };
            let place = |x: f64, size: Size| match mode.anchor() {
                None => Rect::new(x, 0.0, size.width, height),
                Some((_, fy)) => Rect::new(x, (height - size.height) * fy, size.width, size.height),
            };
            Ok(MergeLayout {
                canvas,
                base: place(base_x, base),
                incoming: place(incoming_x, incoming),
            })
        }
        _ => Ok(overlay(base, incoming, mode)),
    }
}

fn vertical(
    base: Size,
    incoming: Size,
    dir: VerticalDirection,
    mode: ResizingMode,
) -> Result<MergeLayout, RenderError> {
    let ttb = dir == VerticalDirection::TopToBottom;
    match mode {
        ResizingMode::ScaleAspectFit | ResizingMode::ScaleAspectFill => {
            let (lead, trail) = if ttb {
                (base, incoming)
            } else {
                (incoming, base)
            };
            let (lead, trail) = scale_to_equal_width(Rect::from_size(lead), Rect::from_size(trail))?;
            let canvas = Size::new(lead.width(), lead.height() + trail.height());
            let (base, incoming) = if ttb { (lead, trail) } else { (trail, lead) };
            Ok(MergeLayout {
                canvas,
                base,
                incoming,
            })
        }
        ResizingMode::ScaleToFill | ResizingMode::Center | ResizingMode::Left | ResizingMode::Right => {
            let width = base.width.max(incoming.width);
            let canvas = Size::new(width, base.height + incoming.height);
            let (base_y, incoming_y) = if ttb {
                (0.0, base.height)
            } else {
                (incoming.height, 0.0)
            };
            let place = |y: f64, size: Size| match mode.anchor() {
                None => Rect::new(0.0, y, width, size.height),
                Some((fx, _)) => Rect::new((width - size.width) * fx, y, size.width, size.height),
            };
            Ok(MergeLayout {
                canvas,
                base: place(base_y, base),
                incoming: place(incoming_y, incoming),
            })
        }
        _ => Ok(overlay(base, incoming, mode)),
    }
}

/// Scale the shorter of two rects up to the taller one's height, keeping its
/// aspect ratio, and place them side by side: `a` at `y = 0`, `b` at
/// `(a.width, 0)`.
///
/// The taller rect keeps its size. Empty or non-finite sizes are rejected
/// before any ratio is taken.
pub fn scale_to_equal_height(a: Rect, b: Rect) -> Result<(Rect, Rect), RenderError> {
    check_drawable("co-scaled", a.size)?;
    check_drawable("co-scaled", b.size)?;
    let (mut a, mut b) = (a, b);
    if a.height() >= b.height() {
        let ratio = a.height() / b.height();
        b.size = Size::new(b.width() * ratio, a.height());
    } else {
        let ratio = b.height() / a.height();
        a.size = Size::new(a.width() * ratio, b.height());
    }
    a.origin.y = 0.0;
    b.origin = Point::new(a.width(), 0.0);
    Ok((a, b))
}

/// Width counterpart of [`scale_to_equal_height`]: `a` at `x = 0`, `b` at
/// `(0, a.height)`.
pub fn scale_to_equal_width(a: Rect, b: Rect) -> Result<(Rect, Rect), RenderError> {
    check_drawable("co-scaled", a.size)?;
    check_drawable("co-scaled", b.size)?;
    let (mut a, mut b) = (a, b);
    if a.width() >= b.width() {
        let ratio = a.width() / b.width();
        b.size = Size::new(a.width(), b.height() * ratio);
    } else {
        let ratio = b.width() / a.width();
        a.size = Size::new(b.width(), a.height() * ratio);
    }
    a.origin.x = 0.0;
    b.origin = Point::new(0.0, a.height());
    Ok((a, b))
}

/// Origin that anchors `size` inside `container` per `mode`. Scaling modes
/// centre.
pub fn anchor_origin(mode: ResizingMode, container: Size, size: Size) -> Point {
    let (fx, fy) = mode.anchor().unwrap_or((0.5, 0.5));
    Point::new(
        (container.width - size.width) * fx,
        (container.height - size.height) * fy,
    )
}

/// Largest rect with `size`'s aspect ratio inside `container`, centred.
pub fn aspect_fit_rect(size: Size, container: Size) -> Rect {
    let ratio = (container.width / size.width).min(container.height / size.height);
    centred(size.scale(ratio), container)
}

/// Smallest rect with `size`'s aspect ratio covering `container`, centred.
pub fn aspect_fill_rect(size: Size, container: Size) -> Rect {
    let ratio = (container.width / size.width).max(container.height / size.height);
    centred(size.scale(ratio), container)
}

fn centred(size: Size, container: Size) -> Rect {
    Rect {
        origin: anchor_origin(ResizingMode::Center, container, size),
        size,
    }
}

/// Output size of a resize towards `target` under `mode`.
///
/// Aspect modes scale uniformly by the smaller (fit) or larger (fill) of the
/// two axis ratios and round to whole points; every other mode stretches to
/// `target` exactly.
pub fn resize_size(source: Size, target: Size, mode: ResizingMode) -> Result<Size, RenderError> {
    check_drawable("source", source)?;
    check_drawable("target", target)?;

    let horizontal = target.width / source.width;
    let vertical = target.height / source.height;
    let ratio = match mode {
        ResizingMode::ScaleAspectFit => horizontal.min(vertical),
        ResizingMode::ScaleAspectFill => horizontal.max(vertical),
        _ => return Ok(target),
    };
    let scaled = source.scale(ratio);
    Ok(Size::new(
        scaled.width.round().max(1.0),
        scaled.height.round().max(1.0),
    ))
}

/// Crop rect of `target` size anchored inside `source` per a directional
/// `mode`. Scaling modes are handled by resizing instead, so they centre.
pub fn crop_rect_fitting(
    source: Size,
    target: Size,
    mode: ResizingMode,
) -> Result<Rect, RenderError> {
    check_drawable("source", source)?;
    check_drawable("crop", target)?;
    Ok(Rect {
        origin: anchor_origin(mode, source, target),
        size: target,
    })
}

/// Centred square crop of side `side` from an image of `size`; the origin
/// is rounded so later pixel snapping keeps the side intact.
pub fn centred_square(size: Size, side: f64) -> Rect {
    Rect::new(
        ((size.width - side) * 0.5).round(),
        ((size.height - side) * 0.5).round(),
        side,
        side,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn size(w: f64, h: f64) -> Size {
        Size::new(w, h)
    }

    // =========================================================================
    // overlay tests
    // =========================================================================

    #[test]
    fn overlay_center_centres_both() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(40.0, 80.0),
            MergingMode::Overlay(ResizingMode::Center),
        )
        .unwrap();
        assert_eq!(layout.canvas, size(100.0, 80.0));
        assert_eq!(layout.base, Rect::new(0.0, 15.0, 100.0, 50.0));
        assert_eq!(layout.incoming, Rect::new(30.0, 0.0, 40.0, 80.0));
    }

    #[test]
    fn overlay_scale_to_fill_stretches_both() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(40.0, 80.0),
            MergingMode::Overlay(ResizingMode::ScaleToFill),
        )
        .unwrap();
        let full = Rect::new(0.0, 0.0, 100.0, 80.0);
        assert_eq!(layout.base, full);
        assert_eq!(layout.incoming, full);
    }

    #[test]
    fn overlay_fit_keeps_aspect_inside_canvas() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(40.0, 80.0),
            MergingMode::Overlay(ResizingMode::ScaleAspectFit),
        )
        .unwrap();
        // Canvas 100x80; the 40x80 incoming is already as tall as the canvas.
        assert_eq!(layout.incoming, Rect::new(30.0, 0.0, 40.0, 80.0));
        // The 2:1 base fills the width and centres vertically.
        assert_eq!(layout.base, Rect::new(0.0, 15.0, 100.0, 50.0));
    }

    #[test]
    fn overlay_fill_covers_canvas() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(40.0, 80.0),
            MergingMode::Overlay(ResizingMode::ScaleAspectFill),
        )
        .unwrap();
        assert_relative_eq!(layout.base.height(), 80.0);
        assert_relative_eq!(layout.base.width(), 160.0);
        assert_relative_eq!(layout.base.x(), -30.0);
        assert_relative_eq!(layout.incoming.width(), 100.0);
        assert_relative_eq!(layout.incoming.height(), 200.0);
    }

    #[test]
    fn overlay_corner_anchors() {
        let layout = merge_layout(
            size(100.0, 100.0),
            size(20.0, 10.0),
            MergingMode::Overlay(ResizingMode::BottomRight),
        )
        .unwrap();
        assert_eq!(layout.incoming.origin, Point::new(80.0, 90.0));
        assert_eq!(layout.base.origin, Point::ZERO);
    }

    // =========================================================================
    // horizontal tests
    // =========================================================================

    #[test]
    fn horizontal_fill_stretches_heights() {
        let layout = merge_layout(
            size(30.0, 20.0),
            size(50.0, 60.0),
            MergingMode::Horizontal(HorizontalDirection::LeftToRight, ResizingMode::ScaleToFill),
        )
        .unwrap();
        assert_eq!(layout.canvas, size(80.0, 60.0));
        assert_eq!(layout.base, Rect::new(0.0, 0.0, 30.0, 60.0));
        assert_eq!(layout.incoming, Rect::new(30.0, 0.0, 50.0, 60.0));
    }

    #[test]
    fn horizontal_rtl_puts_incoming_first() {
        let layout = merge_layout(
            size(30.0, 20.0),
            size(50.0, 60.0),
            MergingMode::Horizontal(HorizontalDirection::RightToLeft, ResizingMode::Bottom),
        )
        .unwrap();
        assert_eq!(layout.canvas, size(80.0, 60.0));
        assert_eq!(layout.incoming, Rect::new(0.0, 0.0, 50.0, 60.0));
        assert_eq!(layout.base, Rect::new(50.0, 40.0, 30.0, 20.0));
    }

    #[test]
    fn horizontal_fit_co_scales_heights() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(20.0, 100.0),
            MergingMode::Horizontal(HorizontalDirection::LeftToRight, ResizingMode::ScaleAspectFit),
        )
        .unwrap();
        assert_eq!(layout.base, Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(layout.incoming, Rect::new(200.0, 0.0, 20.0, 100.0));
        assert_eq!(layout.canvas, size(220.0, 100.0));
    }

    #[test]
    fn horizontal_left_overlays_on_left_edge() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(40.0, 80.0),
            MergingMode::Horizontal(HorizontalDirection::LeftToRight, ResizingMode::Left),
        )
        .unwrap();
        assert_eq!(layout.canvas, size(100.0, 80.0));
        assert_eq!(layout.base.origin, Point::new(0.0, 15.0));
        assert_eq!(layout.incoming.origin, Point::new(0.0, 0.0));
    }

    // =========================================================================
    // vertical tests
    // =========================================================================

    #[test]
    fn vertical_fit_scenario() {
        // 100x50 on top of 200x200: the base widens to 200x100.
        let layout = merge_layout(
            size(100.0, 50.0),
            size(200.0, 200.0),
            MergingMode::Vertical(VerticalDirection::TopToBottom, ResizingMode::ScaleAspectFit),
        )
        .unwrap();
        assert_eq!(layout.base, Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(layout.incoming, Rect::new(0.0, 100.0, 200.0, 200.0));
        assert_eq!(layout.canvas, size(200.0, 300.0));
    }

    #[test]
    fn vertical_btt_puts_incoming_on_top() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(60.0, 30.0),
            MergingMode::Vertical(VerticalDirection::BottomToTop, ResizingMode::Right),
        )
        .unwrap();
        assert_eq!(layout.canvas, size(100.0, 80.0));
        assert_eq!(layout.incoming, Rect::new(40.0, 0.0, 60.0, 30.0));
        assert_eq!(layout.base, Rect::new(0.0, 30.0, 100.0, 50.0));
    }

    #[test]
    fn vertical_top_overlays_on_top_edge() {
        let layout = merge_layout(
            size(100.0, 50.0),
            size(60.0, 30.0),
            MergingMode::Vertical(VerticalDirection::TopToBottom, ResizingMode::Top),
        )
        .unwrap();
        assert_eq!(layout.canvas, size(100.0, 50.0));
        assert_eq!(layout.incoming.origin, Point::new(20.0, 0.0));
    }

    // =========================================================================
    // guards and helpers
    // =========================================================================

    #[test]
    fn degenerate_sizes_are_rejected() {
        let mode = MergingMode::Overlay(ResizingMode::Center);
        for bad in [size(0.0, 10.0), size(10.0, -1.0), size(f64::INFINITY, 1.0)] {
            assert!(matches!(
                merge_layout(bad, size(1.0, 1.0), mode),
                Err(RenderError::InvalidGeometry(_))
            ));
            assert!(merge_layout(size(1.0, 1.0), bad, mode).is_err());
        }
    }

    #[test]
    fn equal_height_scales_the_shorter() {
        let a = Rect::new(0.0, 0.0, 40.0, 100.0);
        let b = Rect::new(0.0, 0.0, 30.0, 50.0);
        let (a2, b2) = scale_to_equal_height(a, b).unwrap();
        assert_eq!(a2, a);
        assert_eq!(b2, Rect::new(40.0, 0.0, 60.0, 100.0));

        let (b3, a3) = scale_to_equal_height(b, a).unwrap();
        assert_eq!(b3, Rect::new(0.0, 0.0, 60.0, 100.0));
        assert_eq!(a3, Rect::new(60.0, 0.0, 40.0, 100.0));
    }

    #[test]
    fn equal_width_stacks_below() {
        let (a, b) = scale_to_equal_width(
            Rect::new(0.0, 0.0, 50.0, 10.0),
            Rect::new(0.0, 0.0, 25.0, 25.0),
        )
        .unwrap();
        assert_eq!(a, Rect::new(0.0, 0.0, 50.0, 10.0));
        assert_eq!(b, Rect::new(0.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn co_scaling_rejects_empty_sides() {
        let ok = Rect::new(0.0, 0.0, 10.0, 10.0);
        for bad in [
            Rect::new(0.0, 0.0, 5.0, 0.0),
            Rect::new(0.0, 0.0, 0.0, 0.0),
            Rect::new(0.0, 0.0, 0.0, 5.0),
            Rect::new(0.0, 0.0, f64::NAN, 5.0),
        ] {
            for result in [
                scale_to_equal_height(ok, bad),
                scale_to_equal_height(bad, ok),
                scale_to_equal_width(ok, bad),
                scale_to_equal_width(bad, ok),
            ] {
                assert!(matches!(result, Err(RenderError::InvalidGeometry(_))), "{bad:?}");
            }
        }
    }

    #[test]
    fn resize_fit_uses_both_axes() {
        // Portrait source into a landscape box: the height ratio wins.
        let out = resize_size(size(100.0, 200.0), size(300.0, 100.0), ResizingMode::ScaleAspectFit)
            .unwrap();
        assert_eq!(out, size(50.0, 100.0));
    }

    #[test]
    fn resize_fill_covers_target() {
        let out = resize_size(size(100.0, 200.0), size(300.0, 100.0), ResizingMode::ScaleAspectFill)
            .unwrap();
        assert_eq!(out, size(300.0, 600.0));
    }

    #[test]
    fn resize_other_modes_stretch() {
        let out = resize_size(size(100.0, 200.0), size(30.0, 10.0), ResizingMode::TopLeft).unwrap();
        assert_eq!(out, size(30.0, 10.0));
    }

    #[test]
    fn resize_rejects_empty_target() {
        assert!(resize_size(size(10.0, 10.0), size(0.0, 10.0), ResizingMode::ScaleToFill).is_err());
    }

    #[test]
    fn crop_rect_anchors() {
        let source = size(100.0, 60.0);
        let target = size(40.0, 20.0);
        let at = |mode| crop_rect_fitting(source, target, mode).unwrap().origin;
        assert_eq!(at(ResizingMode::Center), Point::new(30.0, 20.0));
        assert_eq!(at(ResizingMode::Top), Point::new(30.0, 0.0));
        assert_eq!(at(ResizingMode::BottomRight), Point::new(60.0, 40.0));
        assert_eq!(at(ResizingMode::Left), Point::new(0.0, 20.0));
    }

    #[test]
    fn centred_square_rounds_origin() {
        assert_eq!(
            centred_square(size(101.0, 50.0), 50.0),
            Rect::new(26.0, 0.0, 50.0, 50.0)
        );
    }

    // =========================================================================
    // parsing
    // =========================================================================

    #[test]
    fn resizing_mode_parses_kebab_and_snake_case() {
        assert_eq!("top-left".parse::<ResizingMode>(), Ok(ResizingMode::TopLeft));
        assert_eq!("scale_aspect_fit".parse::<ResizingMode>(), Ok(ResizingMode::ScaleAspectFit));
        assert!("middle".parse::<ResizingMode>().is_err());
    }

    #[test]
    fn merging_mode_round_trips_through_display() {
        for mode in [
            MergingMode::Overlay(ResizingMode::ScaleAspectFill),
            MergingMode::Horizontal(HorizontalDirection::LeftToRight, ResizingMode::Top),
            MergingMode::Horizontal(HorizontalDirection::RightToLeft, ResizingMode::Center),
            MergingMode::Vertical(VerticalDirection::TopToBottom, ResizingMode::ScaleToFill),
            MergingMode::Vertical(VerticalDirection::BottomToTop, ResizingMode::BottomLeft),
        ] {
            assert_eq!(mode.to_string().parse::<MergingMode>(), Ok(mode));
        }
    }

    #[test]
    fn merging_mode_defaults_to_center() {
        assert_eq!(
            "vertical-btt".parse::<MergingMode>(),
            Ok(MergingMode::Vertical(
                VerticalDirection::BottomToTop,
                ResizingMode::Center
            ))
        );
        assert!("diagonal:center".parse::<MergingMode>().is_err());
    }
}
