use super::{LayoutParams, OverlayView, ViewId, WindowError};
use crate::drivers::WindowDriver;

/// An attached overlay window plus the layout we last asked for.
///
/// Mutations return `Result` so callers decide what to do with failures;
/// in practice every caller discards them through [`DiscardStale`].
#[derive(Debug, Clone)]
pub struct WindowHandle {
    id: ViewId,
    params: LayoutParams,
}

impl WindowHandle {
    pub fn attach(
        driver: &mut dyn WindowDriver,
        view: OverlayView,
        params: LayoutParams,
    ) -> Result<Self, WindowError> {
        let id = driver.add_view(view, &params)?;
        Ok(Self { id, params })
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn position(&self) -> (i32, i32) {
        (self.params.x, self.params.y)
    }

    /// Records the new position and pushes it to the window manager. The
    /// recorded position is kept even if the push fails.
    pub fn move_to(
        &mut self,
        driver: &mut dyn WindowDriver,
        x: i32,
        y: i32,
    ) -> Result<(), WindowError> {
        self.params.x = x;
        self.params.y = y;
        driver.update_view_layout(self.id, &self.params)
    }

    pub fn is_attached(&self, driver: &dyn WindowDriver) -> bool {
        driver.is_attached(self.id)
    }

    pub fn detach(self, driver: &mut dyn WindowDriver) -> Result<(), WindowError> {
        driver.remove_view(self.id)
    }
}

/// Swallows window-manager failures after logging them.
pub trait DiscardStale {
    fn discard_stale(self, op: &str);
}

impl DiscardStale for Result<(), WindowError> {
    fn discard_stale(self, op: &str) {
        match self {
            Ok(()) => {}
            Err(err) if err.is_stale() => tracing::debug!(op, "ignoring stale window: {err}"),
            Err(err) => tracing::warn!(op, "ignoring window manager failure: {err}"),
        }
    }
}
