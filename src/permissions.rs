//! Overlay and notification permission checks.
//!
//! There is no completion callback for the request flow: the caller sends
//! the user to the settings screen and re-checks when it regains focus.

use crate::constants::{SDK_OVERLAY_PERMISSION, SDK_POST_NOTIFICATIONS};
use crate::drivers::SystemDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionState {
    pub can_draw_overlay: bool,
    pub notifications_granted: bool,
    pub persistent_enablement_flag: bool,
}

#[derive(Debug, Clone)]
pub struct PermissionGate<S> {
    system: S,
}

impl<S: SystemDriver> PermissionGate<S> {
    pub fn new(system: S) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn check_can_draw_overlay(&self) -> bool {
        if self.system.sdk_level() < SDK_OVERLAY_PERMISSION {
            return true;
        }
        self.system.overlay_allowed()
    }

    /// Fire-and-forget. Failures to reach the settings screen are logged.
    pub fn request_can_draw_overlay(&self) {
        if self.system.sdk_level() < SDK_OVERLAY_PERMISSION {
            return;
        }
        if let Err(err) = self.system.open_overlay_settings() {
            tracing::warn!("could not open overlay settings: {err}");
        }
    }

    pub fn check_notifications_granted(&self) -> bool {
        if self.system.sdk_level() < SDK_POST_NOTIFICATIONS {
            return true;
        }
        self.system.notifications_allowed()
    }

    pub fn state(&self, persistent_enablement_flag: bool) -> PermissionState {
        PermissionState {
            can_draw_overlay: self.check_can_draw_overlay(),
            notifications_granted: self.check_notifications_granted(),
            persistent_enablement_flag,
        }
    }
}
