//! The background service host.
//!
//! Lives on its own thread for as long as the overlay session runs. It must
//! promote itself to a foreground task before anything is shown; a host that
//! cannot do so tears down and reports failure.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::OverlayConfig;
use crate::constants::{
    FOREGROUND_NOTIFICATION_ID, NOTIFICATION_CHANNEL_ID, NOTIFICATION_CHANNEL_NAME,
    NOTIFICATION_TEXT, NOTIFICATION_TITLE, SDK_NOTIFICATION_CHANNELS,
};
use crate::control::HostEvent;
use crate::drivers::{
    HostDrivers, Importance, Notification, NotificationDriver, NotificationError, SystemDriver,
};
use crate::overlay::{OverlayController, OverlaySessionState};
use crate::store::ServiceStore;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("foreground promotion failed: {0}")]
    Promotion(#[from] NotificationError),
    #[error("foreground promotion took {elapsed:?}, allowed {window:?}")]
    PromotionTimeout { elapsed: Duration, window: Duration },
}

pub fn foreground_notification() -> Notification {
    Notification {
        id: FOREGROUND_NOTIFICATION_ID,
        channel_id: NOTIFICATION_CHANNEL_ID.to_string(),
        title: NOTIFICATION_TITLE.to_string(),
        text: NOTIFICATION_TEXT.to_string(),
        ongoing: true,
    }
}

pub struct BackgroundServiceHost {
    controller: OverlayController,
    notifications: Box<dyn NotificationDriver>,
    promotion_window: Duration,
    running: bool,
}

impl BackgroundServiceHost {
    pub fn new(drivers: HostDrivers, store: ServiceStore, config: OverlayConfig) -> Self {
        let promotion_window = config.promotion_window();
        let (overlay, notifications) = drivers.split();
        Self {
            controller: OverlayController::new(overlay, store, config),
            notifications,
            promotion_window,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn controller(&self) -> &OverlayController {
        &self.controller
    }

    pub fn session(&self) -> OverlaySessionState {
        self.controller.session()
    }

    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.running {
            return Ok(());
        }
        if self.controller.gate().system().sdk_level() >= SDK_NOTIFICATION_CHANNELS {
            self.notifications.create_channel(
                NOTIFICATION_CHANNEL_ID,
                NOTIFICATION_CHANNEL_NAME,
                Importance::Low,
            );
        }

        let began = Instant::now();
        let promoted = self
            .notifications
            .start_foreground(&foreground_notification())
            .map_err(ServiceError::from)
            .and_then(|()| {
                let elapsed = began.elapsed();
                if elapsed > self.promotion_window {
                    Err(ServiceError::PromotionTimeout {
                        elapsed,
                        window: self.promotion_window,
                    })
                } else {
                    Ok(())
                }
            });
        if let Err(err) = promoted {
            tracing::error!("overlay service could not start: {err}");
            self.teardown();
            return Err(err);
        }

        self.running = true;
        tracing::info!("overlay service started");
        if self.controller.gate().check_can_draw_overlay() {
            self.controller.show_bubble();
        } else {
            tracing::info!("running without a visible window until permission is granted");
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.teardown();
        self.running = false;
        tracing::info!("overlay service stopped");
    }

    fn teardown(&mut self) {
        self.controller.remove_all();
        let stopped = self
            .notifications
            .stop_foreground(FOREGROUND_NOTIFICATION_ID);
        if let Err(err) = stopped {
            tracing::warn!("could not remove foreground notification: {err}");
        }
    }

    /// Routes one input event to the controller. Ignored while stopped.
    pub fn handle(&mut self, event: HostEvent) {
        if !self.running {
            tracing::debug!(?event, "ignoring event on stopped host");
            return;
        }
        match event {
            HostEvent::BubbleTouch(touch) => {
                self.controller.handle_bubble_touch(touch);
            }
            HostEvent::SheetHit(hit) => self.controller.handle_sheet_hit(hit),
            HostEvent::DismissSheet => self.controller.remove_sheet(),
            HostEvent::DisplayChanged => self.controller.refresh_after_display_change(),
            HostEvent::OpenPicker => {
                self.controller.open_picker();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::MemoryDrivers;
    use crate::overlay::sheet::SheetHit;
    use crate::window::ScreenSize;

    fn host(sdk: u32, window_ms: u64) -> (tempfile::TempDir, MemoryDrivers, BackgroundServiceHost) {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(sdk, ScreenSize::new(400, 800));
        let config = OverlayConfig {
            density: 1.0,
            picker_uri: None,
            promotion_window_ms: window_ms,
            ..OverlayConfig::default()
        };
        let store = ServiceStore::open(dir.path().join("svc.json"));
        let host = BackgroundServiceHost::new(mem.host_drivers(), store, config);
        (dir, mem, host)
    }

    #[test]
    fn start_promotes_then_shows_bubble() {
        let (_dir, mem, mut host) = host(34, 5000);
        host.start().unwrap();
        assert!(host.is_running());
        assert_eq!(mem.notifications.active(), vec![foreground_notification()]);
        let channel = ("overlay_channel".to_string(), "Overlay".to_string(), Importance::Low);
        assert_eq!(mem.notifications.channels(), vec![channel]);
        assert_eq!(mem.windows.bubble_count(), 1);

        host.start().unwrap();
        assert_eq!(mem.windows.bubble_count(), 1);
    }

    #[test]
    fn old_platforms_skip_channel_creation() {
        let (_dir, mem, mut host) = host(25, 5000);
        host.start().unwrap();
        assert!(mem.notifications.channels().is_empty());
    }

    #[test]
    fn start_without_permission_has_no_window() {
        let (_dir, mem, mut host) = host(34, 5000);
        mem.system.set_overlay_allowed(false);
        host.start().unwrap();
        assert!(host.is_running());
        assert!(mem.windows.is_empty());
        assert!(!host.session().bubble_visible);
    }

    #[test]
    fn refused_promotion_is_reported_and_cleaned_up() {
        let (_dir, mem, mut host) = host(34, 5000);
        mem.notifications.refuse(Some("background start refused"));
        let err = host.start().unwrap_err();
        assert!(matches!(err, ServiceError::Promotion(_)));
        assert!(!host.is_running());
        assert!(mem.windows.is_empty());
        assert!(mem.notifications.active().is_empty());
    }

    #[test]
    fn slow_promotion_counts_as_failure() {
        let (_dir, mem, mut host) = host(34, 5);
        mem.notifications.delay(Duration::from_millis(40));
        assert!(matches!(
            host.start(),
            Err(ServiceError::PromotionTimeout { .. })
        ));
        assert!(mem.notifications.active().is_empty());
    }

    #[test]
    fn stop_is_idempotent_and_releases_everything() {
        let (_dir, mem, mut host) = host(34, 5000);
        host.stop();
        host.start().unwrap();
        host.handle(HostEvent::OpenPicker);
        assert!(mem.windows.sheet().is_some());
        host.stop();
        host.stop();
        assert!(mem.windows.is_empty());
        assert!(mem.notifications.active().is_empty());
        assert!(!host.is_running());
    }

    #[test]
    fn events_are_ignored_while_stopped() {
        let (_dir, mem, mut host) = host(34, 5000);
        host.handle(HostEvent::OpenPicker);
        assert!(mem.windows.is_empty());
        host.start().unwrap();
        host.handle(HostEvent::OpenPicker);
        host.handle(HostEvent::SheetHit(SheetHit::Scrim));
        assert!(mem.windows.sheet().is_none());
    }
}
