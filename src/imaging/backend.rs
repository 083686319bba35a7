//! Accelerated filter backend trait and shared types.
//!
//! The [`FilterBackend`] trait is the seam between the dispatcher and
//! whatever executes filter graphs on a given host. It has four operations:
//!
//! | Operation | Purpose |
//! |---|---|
//! | `is_available` | Can this host build a context for a [`GpuVariant`]? |
//! | `create_context` | Build the (expensive) per-variant [`RenderContext`] |
//! | `apply_filter` | Run one [`FilterRequest`] and return a lazy [`FilterImage`] |
//! | `render` | Extract a `FilterImage` into concrete RGBA pixels |
//!
//! The shipped implementation is
//! [`SoftwareBackend`](super::software::SoftwareBackend). Platform backends
//! are injected by the embedding application.

use super::params::{GpuVariant, RenderDestination};
use crate::geometry::{Point, Rect};
use image::RgbaImage;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("no render context available for {0}")]
    BackendUnavailable(RenderDestination),
    #[error("filter '{filter}' failed: {reason}")]
    FilterApplicationFailed { filter: String, reason: String },
    #[error("could not extract pixels: {0}")]
    BufferExtractionFailed(String),
}

impl RenderError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        RenderError::InvalidGeometry(reason.into())
    }

    pub fn filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        RenderError::FilterApplicationFailed {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// Backend-side failures that an `auto` render may retry on the CPU.
    ///
    /// Geometry errors are the caller's fault and fail identically on
    /// every path.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RenderError::InvalidGeometry(_))
    }
}

/// A per-variant accelerator context.
///
/// Records the variant it was actually built for (a `Primary` request may
/// be served by a `Compatibility` context) and an opaque backend handle.
pub struct RenderContext {
    variant: GpuVariant,
    handle: Box<dyn Any + Send>,
}

impl RenderContext {
    pub fn new<T: Any + Send>(variant: GpuVariant, handle: T) -> Self {
        Self {
            variant,
            handle: Box::new(handle),
        }
    }

    pub fn variant(&self) -> GpuVariant {
        self.variant
    }

    pub fn handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref()
    }

    pub fn handle_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.handle.downcast_mut()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

/// One typed filter parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Point(Point),
    Vector(Vec<f64>),
    Rect(Rect),
    Buffer(Arc<RgbaImage>),
    Text(String),
}

impl FilterValue {
    fn kind(&self) -> &'static str {
        match self {
            FilterValue::Number(_) => "number",
            FilterValue::Point(_) => "point",
            FilterValue::Vector(_) => "vector",
            FilterValue::Rect(_) => "rect",
            FilterValue::Buffer(_) => "buffer",
            FilterValue::Text(_) => "text",
        }
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Number(v)
    }
}

impl From<Point> for FilterValue {
    fn from(v: Point) -> Self {
        FilterValue::Point(v)
    }
}

impl From<Vec<f64>> for FilterValue {
    fn from(v: Vec<f64>) -> Self {
        FilterValue::Vector(v)
    }
}

impl From<Rect> for FilterValue {
    fn from(v: Rect) -> Self {
        FilterValue::Rect(v)
    }
}

impl From<Arc<RgbaImage>> for FilterValue {
    fn from(v: Arc<RgbaImage>) -> Self {
        FilterValue::Buffer(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

/// Named filter parameters, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams(BTreeMap<String, FilterValue>);

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A filter id plus its parameters.
///
/// Typed getters fail with [`RenderError::FilterApplicationFailed`] naming
/// this filter when a key is missing or holds the wrong kind of value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub name: String,
    pub params: FilterParams,
}

impl FilterRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: FilterParams::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.params.insert(key, value);
        self
    }

    fn value(&self, key: &str) -> Result<&FilterValue, RenderError> {
        self.params
            .get(key)
            .ok_or_else(|| RenderError::filter(&self.name, format!("missing parameter '{key}'")))
    }

    fn mistyped(&self, key: &str, expected: &str, found: &FilterValue) -> RenderError {
        RenderError::filter(
            &self.name,
            format!("parameter '{key}' must be a {expected}, got {}", found.kind()),
        )
    }

    pub fn number(&self, key: &str) -> Result<f64, RenderError> {
        match self.value(key)? {
            FilterValue::Number(n) => Ok(*n),
            other => Err(self.mistyped(key, "number", other)),
        }
    }

    /// Like [`number`](Self::number) but absent keys fall back to `default`.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, RenderError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(_) => self.number(key),
        }
    }

    pub fn point(&self, key: &str) -> Result<Point, RenderError> {
        match self.value(key)? {
            FilterValue::Point(p) => Ok(*p),
            other => Err(self.mistyped(key, "point", other)),
        }
    }

    /// A vector of exactly `len` components.
    pub fn vector(&self, key: &str, len: usize) -> Result<&[f64], RenderError> {
        match self.value(key)? {
            FilterValue::Vector(v) if v.len() == len => Ok(v),
            FilterValue::Vector(v) => Err(RenderError::filter(
                &self.name,
                format!("parameter '{key}' needs {len} components, got {}", v.len()),
            )),
            other => Err(self.mistyped(key, "vector", other)),
        }
    }

    pub fn rect(&self, key: &str) -> Result<Rect, RenderError> {
        match self.value(key)? {
            FilterValue::Rect(r) => Ok(*r),
            other => Err(self.mistyped(key, "rect", other)),
        }
    }

    pub fn buffer(&self, key: &str) -> Result<&Arc<RgbaImage>, RenderError> {
        match self.value(key)? {
            FilterValue::Buffer(b) => Ok(b),
            other => Err(self.mistyped(key, "buffer", other)),
        }
    }

    pub fn text(&self, key: &str) -> Result<&str, RenderError> {
        match self.value(key)? {
            FilterValue::Text(t) => Ok(t),
            other => Err(self.mistyped(key, "text", other)),
        }
    }
}

/// The lazy output of [`FilterBackend::apply_filter`].
///
/// Only the backend that produced it knows what the handle holds;
/// [`FilterBackend::render`] turns it into pixels.
pub struct FilterImage {
    /// Pixel extent of the result.
    pub extent: Rect,
    handle: Box<dyn Any + Send>,
}

impl FilterImage {
    pub fn new<T: Any + Send>(extent: Rect, handle: T) -> Self {
        Self {
            extent,
            handle: Box::new(handle),
        }
    }

    pub fn handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref()
    }
}

impl fmt::Debug for FilterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterImage")
            .field("extent", &self.extent)
            .finish_non_exhaustive()
    }
}

/// Trait for accelerated filter backends.
///
/// Implementations must be shareable across threads; per-context state lives
/// in the [`RenderContext`] handle, which callers lock for the duration of a
/// call.
pub trait FilterBackend: Send + Sync {
    /// Short name for logs and the `backends` report.
    fn name(&self) -> &str;

    /// Whether this host can build a context for `variant`.
    fn is_available(&self, variant: GpuVariant) -> bool;

    /// Build a context for `variant`. Expensive; the pool caches the result.
    fn create_context(&self, variant: GpuVariant) -> Result<RenderContext, RenderError>;

    /// Apply one filter. `input` is `None` for generator filters.
    fn apply_filter(
        &self,
        context: &mut RenderContext,
        input: Option<&RgbaImage>,
        request: &FilterRequest,
    ) -> Result<FilterImage, RenderError>;

    /// Extract a filter result into concrete pixels.
    fn render(
        &self,
        context: &mut RenderContext,
        image: &FilterImage,
    ) -> Result<RgbaImage, RenderError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Colour every successful mock render is filled with, so tests can tell
    /// accelerated output from CPU output.
    pub const MOCK_MARKER: Rgba<u8> = Rgba([255, 0, 255, 255]);

    /// Mock backend that records operations instead of filtering.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub available: HashSet<GpuVariant>,
        pub fail_filters: bool,
        pub fail_render: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        CreateContext(GpuVariant),
        Apply { filter: String, variant: GpuVariant },
        Render(GpuVariant),
    }

    struct MockResult {
        width: u32,
        height: u32,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::with_variants(&GpuVariant::ALL)
        }

        pub fn with_variants(variants: &[GpuVariant]) -> Self {
            Self {
                available: variants.iter().copied().collect(),
                ..Self::default()
            }
        }

        /// Every context builds, every filter fails.
        pub fn failing() -> Self {
            Self {
                fail_filters: true,
                ..Self::new()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn contexts_created(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::CreateContext(_)))
                .count()
        }
    }

    impl FilterBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn is_available(&self, variant: GpuVariant) -> bool {
            self.available.contains(&variant)
        }

        fn create_context(&self, variant: GpuVariant) -> Result<RenderContext, RenderError> {
            if !self.is_available(variant) {
                return Err(RenderError::BackendUnavailable(RenderDestination::Gpu(
                    variant,
                )));
            }
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::CreateContext(variant));
            Ok(RenderContext::new(variant, ()))
        }

        fn apply_filter(
            &self,
            context: &mut RenderContext,
            input: Option<&RgbaImage>,
            request: &FilterRequest,
        ) -> Result<FilterImage, RenderError> {
            self.operations.lock().unwrap().push(RecordedOp::Apply {
                filter: request.name.clone(),
                variant: context.variant(),
            });
            if self.fail_filters {
                return Err(RenderError::filter(&request.name, "mock failure"));
            }
            let (width, height) = input.map(|i| i.dimensions()).unwrap_or((1, 1));
            Ok(FilterImage::new(
                Rect::new(0.0, 0.0, width as f64, height as f64),
                MockResult { width, height },
            ))
        }

        fn render(
            &self,
            context: &mut RenderContext,
            image: &FilterImage,
        ) -> Result<RgbaImage, RenderError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Render(context.variant()));
            if self.fail_render {
                return Err(RenderError::BufferExtractionFailed("mock failure".into()));
            }
            let result = image
                .handle::<MockResult>()
                .ok_or_else(|| RenderError::BufferExtractionFailed("foreign image".into()))?;
            Ok(RgbaImage::from_pixel(result.width, result.height, MOCK_MARKER))
        }
    }

    #[test]
    fn mock_records_context_creation() {
        let backend = MockBackend::with_variants(&[GpuVariant::Compatibility]);

        assert!(backend.create_context(GpuVariant::Primary).is_err());
        let ctx = backend.create_context(GpuVariant::Compatibility).unwrap();
        assert_eq!(ctx.variant(), GpuVariant::Compatibility);

        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::CreateContext(GpuVariant::Compatibility)]
        );
    }

    #[test]
    fn mock_records_filter_and_render() {
        let backend = MockBackend::new();
        let mut ctx = backend.create_context(GpuVariant::Primary).unwrap();
        let input = RgbaImage::new(4, 3);

        let out = backend
            .apply_filter(&mut ctx, Some(&input), &FilterRequest::new("exposure"))
            .unwrap();
        let pixels = backend.render(&mut ctx, &out).unwrap();

        assert_eq!(pixels.dimensions(), (4, 3));
        assert_eq!(*pixels.get_pixel(0, 0), MOCK_MARKER);
        assert!(matches!(
            &backend.get_operations()[1],
            RecordedOp::Apply { filter, variant: GpuVariant::Primary } if filter == "exposure"
        ));
    }

    #[test]
    fn typed_getters_name_the_filter() {
        let request = FilterRequest::new("gaussian-blur").with("radius", "wide");

        let err = request.number("radius").unwrap_err();
        assert!(matches!(
            &err,
            RenderError::FilterApplicationFailed { filter, reason }
                if filter == "gaussian-blur" && reason.contains("text")
        ));
        assert!(request.number("sigma").is_err());
        assert_eq!(request.number_or("sigma", 1.5), Ok(1.5));
    }

    #[test]
    fn vector_getter_checks_length() {
        let request = FilterRequest::new("color-clamp").with("min", vec![0.0, 0.0, 0.0]);
        assert!(request.vector("min", 4).is_err());
        assert_eq!(request.vector("min", 3).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn context_handle_downcasts() {
        let mut ctx = RenderContext::new(GpuVariant::Primary, 7u32);
        assert_eq!(ctx.handle::<u32>(), Some(&7));
        assert!(ctx.handle::<String>().is_none());
        *ctx.handle_mut::<u32>().unwrap() += 1;
        assert_eq!(ctx.handle::<u32>(), Some(&8));
    }

    #[test]
    fn only_geometry_errors_are_unrecoverable() {
        assert!(!RenderError::invalid("zero width").is_recoverable());
        assert!(RenderError::BackendUnavailable(RenderDestination::Auto).is_recoverable());
        assert!(RenderError::filter("crop", "x").is_recoverable());
        assert!(RenderError::BufferExtractionFailed("x".into()).is_recoverable());
    }
}
