//! In-process drivers.
//!
//! Tests use them as doubles; the terminal host uses `MemoryWindows` as its
//! window table. Each driver is a cheap `Clone` handle over shared state, so
//! one copy can be inspected while the host owns another.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::{
    ClipboardDriver, HostDrivers, Importance, NavigationDriver, NavigationError, Notification,
    NotificationDriver, NotificationError, SystemDriver, ToastDriver, WindowDriver,
};
use crate::clipboard::ClipboardError;
use crate::overlay::sheet::SheetModel;
use crate::window::{LayoutParams, OverlayView, ScreenSize, ViewId, WindowError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct SystemState {
    sdk_level: u32,
    overlay_allowed: bool,
    notifications_allowed: bool,
    settings_opened: usize,
    settings_fail: bool,
}

#[derive(Debug, Clone)]
pub struct MemorySystem {
    state: Arc<Mutex<SystemState>>,
}

impl MemorySystem {
    /// Everything granted at the given SDK level.
    pub fn new(sdk_level: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SystemState {
                sdk_level,
                overlay_allowed: true,
                notifications_allowed: true,
                settings_opened: 0,
                settings_fail: false,
            })),
        }
    }

    pub fn set_overlay_allowed(&self, allowed: bool) {
        lock(&self.state).overlay_allowed = allowed;
    }

    pub fn set_notifications_allowed(&self, allowed: bool) {
        lock(&self.state).notifications_allowed = allowed;
    }

    pub fn fail_settings(&self, fail: bool) {
        lock(&self.state).settings_fail = fail;
    }

    pub fn settings_opened(&self) -> usize {
        lock(&self.state).settings_opened
    }
}

impl SystemDriver for MemorySystem {
    fn sdk_level(&self) -> u32 {
        lock(&self.state).sdk_level
    }

    fn overlay_allowed(&self) -> bool {
        lock(&self.state).overlay_allowed
    }

    fn notifications_allowed(&self) -> bool {
        lock(&self.state).notifications_allowed
    }

    fn open_overlay_settings(&self) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.settings_fail {
            return Err(io::Error::other("settings activity not found"));
        }
        state.settings_opened += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct WindowsState {
    screen: ScreenSize,
    next_id: u64,
    views: BTreeMap<ViewId, (OverlayView, LayoutParams)>,
    reject_adds: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryWindows {
    state: Arc<Mutex<WindowsState>>,
}

impl MemoryWindows {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowsState {
                screen,
                next_id: 1,
                views: BTreeMap::new(),
                reject_adds: false,
            })),
        }
    }

    /// What the platform does on display reconfiguration: every view is
    /// gone, nobody is told.
    pub fn detach_all_out_of_band(&self) {
        lock(&self.state).views.clear();
    }

    pub fn set_screen_size(&self, screen: ScreenSize) {
        lock(&self.state).screen = screen;
    }

    pub fn reject_adds(&self, reject: bool) {
        lock(&self.state).reject_adds = reject;
    }

    pub fn params_of(&self, id: ViewId) -> Option<LayoutParams> {
        lock(&self.state).views.get(&id).map(|(_, params)| *params)
    }

    /// Attached views bottom to top.
    pub fn views(&self) -> Vec<(ViewId, OverlayView, LayoutParams)> {
        lock(&self.state)
            .views
            .iter()
            .map(|(id, (view, params))| (*id, view.clone(), *params))
            .collect()
    }

    pub fn bubble_count(&self) -> usize {
        lock(&self.state)
            .views
            .values()
            .filter(|(view, _)| matches!(view, OverlayView::Bubble))
            .count()
    }

    /// The attached sheet's model, if one is showing.
    pub fn sheet(&self) -> Option<SheetModel> {
        let state = lock(&self.state);
        for (view, _) in state.views.values() {
            if let OverlayView::Sheet(model) = view {
                return Some(model.clone());
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).views.is_empty()
    }
}

impl WindowDriver for MemoryWindows {
    fn screen_size(&self) -> ScreenSize {
        lock(&self.state).screen
    }

    fn add_view(
        &mut self,
        view: OverlayView,
        params: &LayoutParams,
    ) -> Result<ViewId, WindowError> {
        let mut state = lock(&self.state);
        if state.reject_adds {
            let reason = "permission denied for window type";
            return Err(WindowError::Rejected(reason.into()));
        }
        let id = ViewId(state.next_id);
        state.next_id += 1;
        state.views.insert(id, (view, *params));
        Ok(id)
    }

    fn update_view_layout(&mut self, id: ViewId, params: &LayoutParams) -> Result<(), WindowError> {
        let mut state = lock(&self.state);
        match state.views.get_mut(&id) {
            Some((_, current)) => {
                *current = *params;
                Ok(())
            }
            None => Err(WindowError::NotAttached(id)),
        }
    }

    fn remove_view(&mut self, id: ViewId) -> Result<(), WindowError> {
        lock(&self.state)
            .views
            .remove(&id)
            .map(|_| ())
            .ok_or(WindowError::NotAttached(id))
    }

    fn is_attached(&self, id: ViewId) -> bool {
        lock(&self.state).views.contains_key(&id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    copies: Arc<Mutex<Vec<(String, String)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    /// Text of the most recent copy.
    pub fn last(&self) -> Option<String> {
        lock(&self.copies).last().map(|(_, text)| text.clone())
    }

    pub fn copies(&self) -> Vec<(String, String)> {
        lock(&self.copies).clone()
    }
}

impl ClipboardDriver for MemoryClipboard {
    fn set_text(&mut self, label: &str, text: &str) -> Result<(), ClipboardError> {
        if *lock(&self.fail) {
            return Err(ClipboardError::Unavailable("no clipboard owner".into()));
        }
        lock(&self.copies).push((label.to_owned(), text.to_owned()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandOff {
    Accepts,
    NoHandler,
    Fails,
}

#[derive(Debug, Clone)]
pub struct MemoryNavigation {
    mode: Arc<Mutex<HandOff>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl MemoryNavigation {
    pub fn new(mode: HandOff) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_mode(&self, mode: HandOff) {
        *lock(&self.mode) = mode;
    }

    /// URIs that were successfully handed off.
    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

impl NavigationDriver for MemoryNavigation {
    fn open_uri(&mut self, uri: &str) -> Result<(), NavigationError> {
        match *lock(&self.mode) {
            HandOff::Accepts => {
                lock(&self.opened).push(uri.to_owned());
                Ok(())
            }
            HandOff::NoHandler => Err(NavigationError::NoHandler(uri.to_owned())),
            HandOff::Fails => Err(NavigationError::Failed("activity threw".into())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryToasts {
    shown: Arc<Mutex<Vec<String>>>,
}

impl MemoryToasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<String> {
        lock(&self.shown).clone()
    }
}

impl ToastDriver for MemoryToasts {
    fn show_toast(&mut self, text: &str) {
        lock(&self.shown).push(text.to_owned());
    }
}

#[derive(Debug, Default)]
struct NotificationState {
    channels: Vec<(String, String, Importance)>,
    active: BTreeMap<u32, Notification>,
    refuse: Option<String>,
    delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNotifications {
    state: Arc<Mutex<NotificationState>>,
}

impl MemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent promotion fail with `reason`.
    pub fn refuse(&self, reason: Option<&str>) {
        lock(&self.state).refuse = reason.map(str::to_owned);
    }

    /// Makes promotion take this long before it returns.
    pub fn delay(&self, delay: Duration) {
        lock(&self.state).delay = delay;
    }

    pub fn channels(&self) -> Vec<(String, String, Importance)> {
        lock(&self.state).channels.clone()
    }

    pub fn active(&self) -> Vec<Notification> {
        lock(&self.state).active.values().cloned().collect()
    }
}

impl NotificationDriver for MemoryNotifications {
    fn create_channel(&mut self, id: &str, name: &str, importance: Importance) {
        let mut state = lock(&self.state);
        let known = state.channels.iter().any(|(known, _, _)| known == id);
        if !known {
            let channel = (id.to_owned(), name.to_owned(), importance);
            state.channels.push(channel);
        }
    }

    fn start_foreground(&mut self, notification: &Notification) -> Result<(), NotificationError> {
        let delay = lock(&self.state).delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = lock(&self.state);
        if let Some(reason) = &state.refuse {
            return Err(NotificationError::Refused(reason.clone()));
        }
        state.active.insert(notification.id, notification.clone());
        Ok(())
    }

    fn stop_foreground(&mut self, id: u32) -> Result<(), NotificationError> {
        lock(&self.state).active.remove(&id);
        Ok(())
    }
}

/// A full set of in-memory drivers sharing state with the handles here.
#[derive(Debug, Clone)]
pub struct MemoryDrivers {
    pub system: MemorySystem,
    pub windows: MemoryWindows,
    pub clipboard: MemoryClipboard,
    pub navigation: MemoryNavigation,
    pub toasts: MemoryToasts,
    pub notifications: MemoryNotifications,
}

impl MemoryDrivers {
    pub fn new(sdk_level: u32, screen: ScreenSize) -> Self {
        Self {
            system: MemorySystem::new(sdk_level),
            windows: MemoryWindows::new(screen),
            clipboard: MemoryClipboard::new(),
            navigation: MemoryNavigation::new(HandOff::NoHandler),
            toasts: MemoryToasts::new(),
            notifications: MemoryNotifications::new(),
        }
    }

    pub fn host_drivers(&self) -> HostDrivers {
        HostDrivers {
            system: Arc::new(self.system.clone()),
            windows: Box::new(self.windows.clone()),
            clipboard: Box::new(self.clipboard.clone()),
            navigation: Box::new(self.navigation.clone()),
            toasts: Box::new(self.toasts.clone()),
            notifications: Box::new(self.notifications.clone()),
        }
    }
}
