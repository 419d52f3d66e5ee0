//! Restoring the overlay after a restart.
//!
//! Permissions may have been revoked while the machine was off, so the saved
//! enablement flag alone is not enough.

use crate::control::OverlayControl;
use crate::drivers::SystemDriver;
use crate::permissions::PermissionGate;
use crate::store::ServiceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    Disabled,
    OverlayPermissionMissing,
    NotificationPermissionMissing,
    Start,
}

pub fn decide<S: SystemDriver>(enabled: bool, gate: &PermissionGate<S>) -> BootDecision {
    if !enabled {
        BootDecision::Disabled
    } else if !gate.check_can_draw_overlay() {
        BootDecision::OverlayPermissionMissing
    } else if !gate.check_notifications_granted() {
        BootDecision::NotificationPermissionMissing
    } else {
        BootDecision::Start
    }
}

/// Starts the host if the saved state and current permissions allow it.
/// Resolves to whether the host is running afterwards.
pub async fn restore<S: SystemDriver>(
    store: &ServiceStore,
    gate: &PermissionGate<S>,
    control: &mut OverlayControl,
) -> bool {
    let decision = decide(store.enabled(), gate);
    tracing::info!(?decision, "boot restore");
    if decision != BootDecision::Start {
        return false;
    }
    control.start().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;

    use super::*;
    use crate::config::OverlayConfig;
    use crate::control::DriverFactory;
    use crate::drivers::memory::{MemoryDrivers, MemorySystem};
    use crate::window::ScreenSize;

    #[test]
    fn decision_order() {
        let system = MemorySystem::new(34);
        let gate = PermissionGate::new(system.clone());
        assert_eq!(decide(false, &gate), BootDecision::Disabled);
        assert_eq!(decide(true, &gate), BootDecision::Start);

        system.set_notifications_allowed(false);
        assert_eq!(
            decide(true, &gate),
            BootDecision::NotificationPermissionMissing
        );
        system.set_overlay_allowed(false);
        assert_eq!(decide(true, &gate), BootDecision::OverlayPermissionMissing);
        assert_eq!(decide(false, &gate), BootDecision::Disabled);
    }

    #[test]
    fn notification_grant_is_not_needed_on_older_platforms() {
        let system = MemorySystem::new(30);
        system.set_notifications_allowed(false);
        let gate = PermissionGate::new(system);
        assert_eq!(decide(true, &gate), BootDecision::Start);
    }

    fn control(mem: &MemoryDrivers, store: &ServiceStore) -> OverlayControl {
        let drivers = mem.clone();
        let factory: DriverFactory = Arc::new(move || drivers.host_drivers());
        OverlayControl::new(factory, store.clone(), OverlayConfig::default())
    }

    #[test]
    fn revoked_overlay_permission_blocks_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServiceStore::open(dir.path().join("svc.json"));
        store.set_enabled(true).unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(80, 48));
        mem.system.set_overlay_allowed(false);
        let mut control = control(&mem, &store);

        let gate = PermissionGate::new(mem.system.clone());
        assert!(!block_on(restore(&store, &gate, &mut control)));
        assert!(!control.is_running());
        assert!(mem.notifications.active().is_empty());
    }

    #[test]
    fn enabled_and_permitted_restores() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServiceStore::open(dir.path().join("svc.json"));
        store.set_enabled(true).unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(80, 48));
        let mut control = control(&mem, &store);

        let gate = PermissionGate::new(mem.system.clone());
        assert!(block_on(restore(&store, &gate, &mut control)));
        assert_eq!(mem.windows.bubble_count(), 1);
        block_on(control.stop());
    }
}
