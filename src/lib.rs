//! # Rich Image
//!
//! Image compositing and geometry over plain RGBA pixel buffers, with every
//! pixel operation able to run either directly on the CPU or through a
//! filter backend ("accelerator").
//!
//! # Architecture: Two Execution Paths
//!
//! Each call carries a [`RenderOption`](imaging::RenderOption): a render
//! destination and an interpolation quality.
//!
//! ```text
//! Imaging (points)  →  Dispatcher  ─┬─ cpu  →  imaging::cpu kernels
//!                                   └─ auto / gpu  →  RenderContextPool
//!                                                     →  FilterBackend
//! ```
//!
//! - `cpu` never touches a backend.
//! - `auto` uses an accelerator when a context can be built and retries once
//!   on the CPU when the accelerated path fails.
//! - `gpu:<variant>` uses that accelerator (primary falls back to
//!   compatibility) and reports failures instead of substituting CPU output.
//!
//! Contexts are expensive, so [`RenderContextPool`](imaging::RenderContextPool)
//! builds each at most once and shares it behind a per-context lock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | Points, sizes, rects and affine transforms |
//! | [`imaging`] | Buffers, layout math, backends, context pool, dispatch, codecs |
//! | [`config`] | `config.toml` loading, stock defaults, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Points, Not Pixels
//!
//! Callers give geometry in points. Each frame carries a scale, and the
//! facade converts to pixels right before dispatch, so the same call does
//! the same thing to a 1x and a 2x image.
//!
//! ## Merging Is a Fold
//!
//! Merging several images folds them pairwise into the base: each step asks
//! [`imaging::merge_layout`] for a canvas and two rects, draws the base and
//! then the incoming image, and the result becomes the next base.
//!
//! ## Same Kernels on Both Paths
//!
//! The bundled [`SoftwareBackend`](imaging::SoftwareBackend) runs filter
//! requests through the same kernels as the CPU path, so the two agree pixel
//! for pixel and `auto` fallback is invisible in the output.

pub mod config;
pub mod geometry;
pub mod imaging;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
