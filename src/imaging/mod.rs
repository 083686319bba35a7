//! Image processing with a CPU path and an accelerated filter path.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Crop** | `image::imageops::crop_imm` |
//! | **Resize** | `image::imageops::resize`, filter from [`InterpolationQuality`] |
//! | **Rotate / affine** | inverse-mapped warp over `rayon` row chunks |
//! | **Round corners** | analytic corner coverage on alpha |
//! | **Merge** | [`calculations::merge_layout`] + `image::imageops::overlay` |
//! | **Named filters** | `image::imageops::blur` + per-channel maps |
//! | **Load / save** | `image` codecs (see [`codec`]) |
//!
//! The module is split into:
//! - **Calculations**: pure layout and sizing math (unit testable)
//! - **Parameters**: render destinations, quality and [`RenderOption`]
//! - **Backend**: the [`FilterBackend`] trait and its request/image types
//! - **Software**: [`SoftwareBackend`], a host implementation of the trait
//! - **Context**: [`RenderContextPool`], lazily built shared contexts
//! - **Dispatch**: [`Dispatcher`], choosing CPU or backend per call
//! - **Operations**: [`Imaging`], the point-based facade over everything

pub mod backend;
pub mod buffer;
pub mod calculations;
mod canvas;
pub mod codec;
pub mod context;
pub mod cpu;
pub mod dispatch;
pub mod operations;
pub mod params;
pub mod software;

pub use backend::{FilterBackend, FilterImage, FilterRequest, FilterValue, RenderContext, RenderError};
pub use buffer::{Orientation, PixelBuffer, RichImage};
pub use calculations::{
    HorizontalDirection, MergeLayout, MergingMode, ResizingMode, VerticalDirection, merge_layout,
};
pub use codec::CodecError;
pub use context::{ContextStatus, RenderContextPool};
pub use dispatch::{Dispatcher, FlipAxis, Operation};
pub use operations::Imaging;
pub use params::{GpuVariant, InterpolationQuality, RenderDestination, RenderOption};
pub use software::SoftwareBackend;
