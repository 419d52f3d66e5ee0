//! Seams between the overlay core and the platform it runs on.
//!
//! Everything the core needs from the outside world (settings, the window
//! manager, clipboard, toasts, notifications, and the inter-process hand-off)
//! goes through one of these traits. `memory` implements them in-process;
//! `console` implements them for the terminal host.

pub mod console;
pub mod memory;

use ::crossterm::event::Event;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clipboard::ClipboardError;
use crate::ui::UiFrame;
use crate::window::{LayoutParams, OverlayView, ScreenSize, ViewId, WindowError};

pub trait InputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self) -> io::Result<Event>;
}

impl<T: InputDriver + ?Sized> InputDriver for &mut T {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        (**self).read()
    }
}

pub trait OutputDriver {
    fn enter(&mut self) -> io::Result<()>;
    fn exit(&mut self) -> io::Result<()>;

    fn draw<F>(&mut self, f: F) -> io::Result<()>
    where
        F: FnOnce(UiFrame<'_>);
}

/// Read access to OS settings plus the one settings screen we navigate to.
pub trait SystemDriver {
    fn sdk_level(&self) -> u32;
    /// The "display over other apps" setting for this process.
    fn overlay_allowed(&self) -> bool;
    fn notifications_allowed(&self) -> bool;
    /// Sends the user to the overlay settings screen. Returns once the
    /// navigation was issued, not when the user comes back.
    fn open_overlay_settings(&self) -> io::Result<()>;
}

impl<T: SystemDriver + ?Sized> SystemDriver for Arc<T> {
    fn sdk_level(&self) -> u32 {
        (**self).sdk_level()
    }

    fn overlay_allowed(&self) -> bool {
        (**self).overlay_allowed()
    }

    fn notifications_allowed(&self) -> bool {
        (**self).notifications_allowed()
    }

    fn open_overlay_settings(&self) -> io::Result<()> {
        (**self).open_overlay_settings()
    }
}

/// System-level window manager. Ids may be invalidated at any time by the
/// platform; callers must treat every mutation as fallible.
pub trait WindowDriver {
    fn screen_size(&self) -> ScreenSize;
    fn add_view(&mut self, view: OverlayView, params: &LayoutParams) -> Result<ViewId, WindowError>;
    fn update_view_layout(&mut self, id: ViewId, params: &LayoutParams) -> Result<(), WindowError>;
    fn remove_view(&mut self, id: ViewId) -> Result<(), WindowError>;
    fn is_attached(&self, id: ViewId) -> bool;
}

pub trait ClipboardDriver {
    fn set_text(&mut self, label: &str, text: &str) -> Result<(), ClipboardError>;
}

pub trait ToastDriver {
    fn show_toast(&mut self, text: &str);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no handler for {0}")]
    NoHandler(String),
    #[error("navigation failed: {0}")]
    Failed(String),
}

/// Inter-process navigational signal towards the foreground application.
pub trait NavigationDriver {
    fn open_uri(&mut self, uri: &str) -> Result<(), NavigationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    Low,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u32,
    pub channel_id: String,
    pub title: String,
    pub text: String,
    pub ongoing: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("foreground promotion refused: {0}")]
    Refused(String),
    #[error("notification backend unavailable: {0}")]
    Unavailable(String),
}

pub trait NotificationDriver {
    fn create_channel(&mut self, _id: &str, _name: &str, _importance: Importance) {}
    /// Posts `notification` and marks the caller as a persistent,
    /// user-visible task.
    fn start_foreground(&mut self, notification: &Notification) -> Result<(), NotificationError>;
    fn stop_foreground(&mut self, id: u32) -> Result<(), NotificationError>;
}

/// The subset the overlay window controller drives.
pub struct OverlayDrivers {
    pub system: Arc<dyn SystemDriver + Send + Sync>,
    pub windows: Box<dyn WindowDriver>,
    pub clipboard: Box<dyn ClipboardDriver>,
    pub navigation: Box<dyn NavigationDriver>,
    pub toasts: Box<dyn ToastDriver>,
}

/// Everything a background host needs, created on the host's own thread.
pub struct HostDrivers {
    pub system: Arc<dyn SystemDriver + Send + Sync>,
    pub windows: Box<dyn WindowDriver>,
    pub clipboard: Box<dyn ClipboardDriver>,
    pub navigation: Box<dyn NavigationDriver>,
    pub toasts: Box<dyn ToastDriver>,
    pub notifications: Box<dyn NotificationDriver>,
}

impl HostDrivers {
    pub fn split(self) -> (OverlayDrivers, Box<dyn NotificationDriver>) {
        let overlay = OverlayDrivers {
            system: self.system,
            windows: self.windows,
            clipboard: self.clipboard,
            navigation: self.navigation,
            toasts: self.toasts,
        };
        (overlay, self.notifications)
    }
}
