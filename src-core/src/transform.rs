//! Compositing transform state.
//!
//! The transform is mutated by UI input (drag, wheel, numeric fields)
//! and read once per draw tick by the compositor. It is shared through
//! a [`TransformCell`]; a lightweight lock stands in for the original
//! single-threaded cooperative access.

use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// Smallest accepted scale factor.
pub const MIN_SCALE: f64 = 0.01;

/// Largest accepted scale factor.
pub const MAX_SCALE: f64 = 64.0;

/// Position and scale applied when drawing source frames onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Destination x of the frame's top-left corner, in canvas pixels
    pub x: f64,
    /// Destination y of the frame's top-left corner, in canvas pixels
    pub y: f64,
    /// Scale relative to the frame's native display dimensions
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// Partial update to a [`Transform`]; unset fields keep their value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub scale: Option<f64>,
}

/// Shared, mutable transform with an explicit redraw signal.
///
/// Mutations outside the normal frame-driven render cycle would never
/// become visible until the next source frame arrives, so every `set`
/// also notifies a redraw waiter. Consumers that re-render the surface
/// on demand await [`TransformCell::redraw_requested`].
#[derive(Clone, Default)]
pub struct TransformCell {
    inner: Arc<TransformShared>,
}

#[derive(Default)]
struct TransformShared {
    value: RwLock<Transform>,
    redraw: Notify,
}

impl TransformCell {
    pub fn new(initial: Transform) -> Self {
        Self {
            inner: Arc::new(TransformShared {
                value: RwLock::new(initial),
                redraw: Notify::new(),
            }),
        }
    }

    /// Read the current transform.
    pub async fn get(&self) -> Transform {
        *self.inner.value.read().await
    }

    /// Replace the fields present in `patch` and signal a redraw.
    ///
    /// Scale is clamped to `[MIN_SCALE, MAX_SCALE]`; unclamped input
    /// could collapse the draw to nothing or overflow the canvas.
    pub async fn set(&self, patch: TransformPatch) -> Transform {
        let mut value = self.inner.value.write().await;
        if let Some(x) = patch.x {
            value.x = x;
        }
        if let Some(y) = patch.y {
            value.y = y;
        }
        if let Some(scale) = patch.scale {
            value.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        }
        let updated = *value;
        drop(value);
        self.inner.redraw.notify_waiters();
        updated
    }

    /// Wait until a mutation requests a redraw.
    pub async fn redraw_requested(&self) {
        self.inner.redraw.notified().await;
    }
}

impl std::fmt::Debug for TransformCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCell").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn patch_replaces_only_given_fields() {
        let cell = TransformCell::new(Transform::default());
        cell.set(TransformPatch {
            x: Some(10.0),
            y: Some(20.0),
            scale: None,
        })
        .await;
        cell.set(TransformPatch {
            scale: Some(2.0),
            ..Default::default()
        })
        .await;

        let t = cell.get().await;
        assert_eq!(t.x, 10.0);
        assert_eq!(t.y, 20.0);
        assert_eq!(t.scale, 2.0);
    }

    #[tokio::test]
    async fn scale_is_clamped() {
        let cell = TransformCell::new(Transform::default());

        let t = cell
            .set(TransformPatch {
                scale: Some(0.0),
                ..Default::default()
            })
            .await;
        assert_eq!(t.scale, MIN_SCALE);

        let t = cell
            .set(TransformPatch {
                scale: Some(-3.0),
                ..Default::default()
            })
            .await;
        assert_eq!(t.scale, MIN_SCALE);

        let t = cell
            .set(TransformPatch {
                scale: Some(1e9),
                ..Default::default()
            })
            .await;
        assert_eq!(t.scale, MAX_SCALE);
    }

    #[tokio::test]
    async fn set_signals_redraw() {
        let cell = TransformCell::new(Transform::default());
        let waiter = cell.clone();
        let waited = tokio::spawn(async move {
            waiter.redraw_requested().await;
        });
        // Give the waiter time to register before notifying.
        tokio::task::yield_now().await;
        cell.set(TransformPatch {
            x: Some(1.0),
            ..Default::default()
        })
        .await;
        waited.await.unwrap();
    }
}
