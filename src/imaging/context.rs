//! Lazily built, cached render contexts.
//!
//! Building an accelerator context is expensive, so the pool builds each one
//! at most once per destination key and hands out shared handles. The
//! outcome of construction is cached, including "no accelerator here";
//! [`RenderContextPool::replace`] overrides either.
//!
//! Each key has its own slot lock. A slow build for one key never blocks
//! callers of another.
//!
//! | Key | Construction order |
//! |---|---|
//! | `Auto` | `Primary`, then `Compatibility` |
//! | `Gpu(Primary)` | `Primary`, then `Compatibility` |
//! | `Gpu(Compatibility)` | `Compatibility` |
//! | `Cpu` | never built |

use super::backend::{FilterBackend, RenderContext};
use super::params::{GpuVariant, RenderDestination};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// A context shared between callers. Lock it for the whole accelerated call.
pub type SharedContext = Arc<Mutex<RenderContext>>;

/// What the pool currently holds for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "variant", rename_all = "kebab-case")]
pub enum ContextStatus {
    /// Not requested yet.
    Pending,
    /// Construction was attempted and nothing could be built.
    Unavailable,
    /// Built; carries the variant actually in use.
    Ready(GpuVariant),
    /// The CPU path never has a context.
    NotApplicable,
}

/// Outer `None`: never requested. Inner `None`: nothing could be built.
type Slot = Mutex<Option<Option<SharedContext>>>;

pub struct RenderContextPool {
    backend: Arc<dyn FilterBackend>,
    slots: HashMap<RenderDestination, Slot>,
}

impl RenderContextPool {
    pub fn new(backend: Arc<dyn FilterBackend>) -> Self {
        let slots = std::iter::once(RenderDestination::Auto)
            .chain(GpuVariant::ALL.map(RenderDestination::Gpu))
            .map(|destination| (destination, Mutex::new(None)))
            .collect();
        Self { backend, slots }
    }

    pub fn backend(&self) -> &dyn FilterBackend {
        self.backend.as_ref()
    }

    /// Cached context for `destination`, building it on first access.
    ///
    /// `None` for `Cpu` and when no accelerator variant could be built.
    pub fn get(&self, destination: RenderDestination) -> Option<SharedContext> {
        let slot = self.slots.get(&destination)?;
        // Held across the build so concurrent first callers wait for it.
        let mut entry = slot.lock();
        if let Some(cached) = entry.as_ref() {
            return cached.clone();
        }
        let built = self.build(destination);
        *entry = Some(built.clone());
        built
    }

    fn build(&self, destination: RenderDestination) -> Option<SharedContext> {
        let candidates: Vec<GpuVariant> = match destination {
            RenderDestination::Cpu => return None,
            RenderDestination::Auto => GpuVariant::ALL.to_vec(),
            RenderDestination::Gpu(v) => std::iter::once(v).chain(v.fallback()).collect(),
        };

        let started = Instant::now();
        for variant in candidates {
            if !self.backend.is_available(variant) {
                debug!(%destination, ?variant, "accelerator variant not available");
                continue;
            }
            match self.backend.create_context(variant) {
                Ok(context) => {
                    debug!(
                        %destination,
                        variant = ?context.variant(),
                        backend = self.backend.name(),
                        elapsed = ?started.elapsed(),
                        "render context created"
                    );
                    return Some(Arc::new(Mutex::new(context)));
                }
                Err(e) => {
                    warn!(%destination, ?variant, error = %e, "render context construction failed");
                }
            }
        }
        debug!(%destination, elapsed = ?started.elapsed(), "no render context available");
        None
    }

    /// Install `context` for `destination`, overriding whatever is cached.
    /// Returns `false` (and installs nothing) for `Cpu`.
    pub fn replace(&self, context: RenderContext, destination: RenderDestination) -> bool {
        let Some(slot) = self.slots.get(&destination) else {
            return false;
        };
        debug!(%destination, variant = ?context.variant(), "render context replaced");
        *slot.lock() = Some(Some(Arc::new(Mutex::new(context))));
        true
    }

    /// Build contexts for `destinations` up front and report the outcome.
    pub fn warm(&self, destinations: &[RenderDestination]) -> Vec<(RenderDestination, ContextStatus)> {
        destinations
            .iter()
            .map(|&destination| {
                let started = Instant::now();
                self.get(destination);
                let status = self.status(destination);
                debug!(%destination, ?status, elapsed = ?started.elapsed(), "warmed render context");
                (destination, status)
            })
            .collect()
    }

    /// Current state for `destination` without building anything.
    pub fn status(&self, destination: RenderDestination) -> ContextStatus {
        let Some(slot) = self.slots.get(&destination) else {
            return ContextStatus::NotApplicable;
        };
        let entry = slot.lock().clone();
        match entry {
            None => ContextStatus::Pending,
            Some(None) => ContextStatus::Unavailable,
            Some(Some(ctx)) => ContextStatus::Ready(ctx.lock().variant()),
        }
    }
}
