//! Terminal implementations of the driver seams.
//!
//! The terminal stands in for the display: one column is one pixel wide and
//! one row is two pixels tall, so cells come out roughly square. The main
//! thread owns the terminal and draws whatever [`ConsoleScreen`] holds; the
//! host thread mutates that state through the window, toast and notification
//! drivers below.

use std::io::{self, BufRead, Stdout, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use super::memory::MemoryWindows;
use super::{
    InputDriver, NavigationDriver, NavigationError, Notification, NotificationDriver,
    NotificationError, OutputDriver, SystemDriver, ToastDriver, WindowDriver,
};
use crate::constants::{KEY_CAN_DRAW_OVERLAYS, KEY_POST_NOTIFICATIONS, TOAST_DURATION};
use crate::prefs::{Preferences, PrefsError};
use crate::ui::UiFrame;
use crate::window::{FloatRect, LayoutParams, OverlayView, ScreenSize, ViewId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Display size in pixels for a terminal of `cols` x `rows`.
pub fn screen_for_terminal(cols: u16, rows: u16) -> ScreenSize {
    ScreenSize::new(cols, rows.saturating_mul(2))
}

/// Pointer position in pixels for a mouse event at a cell.
pub fn touch_point(col: u16, row: u16) -> (f32, f32) {
    (col as f32, row as f32 * 2.0)
}

/// The pixel a cell's hit test should use: the middle of the cell.
pub fn hit_point(col: u16, row: u16) -> (i32, i32) {
    (col as i32, row as i32 * 2 + 1)
}

/// Cells covered by a pixel rectangle.
pub fn to_cells(rect: FloatRect) -> FloatRect {
    let top = rect.y.div_euclid(2);
    let bottom = (rect.y + rect.height as i32 + 1).div_euclid(2);
    FloatRect {
        x: rect.x,
        y: top,
        width: rect.width,
        height: (bottom - top).max(0) as u16,
    }
}

pub struct ConsoleInputDriver;

impl Default for ConsoleInputDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleInputDriver {
    pub fn new() -> Self {
        Self
    }
}

impl InputDriver for ConsoleInputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        crossterm::event::poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        loop {
            match crossterm::event::read()? {
                // some terminals report releases; only presses matter here
                Event::Key(key) if key.kind == KeyEventKind::Release => continue,
                evt => return Ok(evt),
            }
        }
    }
}

pub struct ConsoleOutputDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    entered: bool,
}

impl ConsoleOutputDriver {
    pub fn new() -> io::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            entered: false,
        })
    }

    pub fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl OutputDriver for ConsoleOutputDriver {
    fn enter(&mut self) -> io::Result<()> {
        if self.entered {
            return Ok(());
        }
        execute!(
            self.terminal.backend_mut(),
            EnterAlternateScreen,
            EnableMouseCapture
        )?;
        terminal::enable_raw_mode()?;
        self.terminal.hide_cursor()?;
        self.entered = true;
        Ok(())
    }

    fn exit(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        self.entered = false;
        Ok(())
    }

    fn draw<F>(&mut self, f: F) -> io::Result<()>
    where
        F: FnOnce(UiFrame<'_>),
    {
        self.terminal
            .draw(move |frame| f(UiFrame::new(frame)))
            .map(|_| ())
            .map_err(|err| io::Error::other(err.to_string()))
    }
}

impl Drop for ConsoleOutputDriver {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

#[derive(Debug, Default)]
struct Chrome {
    toast: Option<(String, Instant)>,
    notification: Option<Notification>,
}

/// What the main thread needs to draw one frame.
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub screen: ScreenSize,
    /// Bottom to top.
    pub views: Vec<(ViewId, OverlayView, LayoutParams)>,
    pub toast: Option<String>,
    pub notification: Option<Notification>,
}

impl ScreenSnapshot {
    /// The top-most view under a pixel.
    pub fn view_at(&self, x: i32, y: i32) -> Option<&(ViewId, OverlayView, LayoutParams)> {
        self.views
            .iter()
            .rev()
            .find(|(_, _, params)| params.resolve(self.screen).contains(x, y))
    }
}

/// Shared display state between the terminal and the host thread.
#[derive(Debug, Clone)]
pub struct ConsoleScreen {
    windows: MemoryWindows,
    chrome: Arc<Mutex<Chrome>>,
}

impl ConsoleScreen {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            windows: MemoryWindows::new(screen),
            chrome: Arc::new(Mutex::new(Chrome::default())),
        }
    }

    pub fn windows(&self) -> MemoryWindows {
        self.windows.clone()
    }

    pub fn toasts(&self) -> ConsoleToasts {
        ConsoleToasts {
            chrome: Arc::clone(&self.chrome),
        }
    }

    pub fn notifications(&self) -> ConsoleNotifications {
        ConsoleNotifications {
            chrome: Arc::clone(&self.chrome),
        }
    }

    /// The terminal was resized. Like a display change, every attached view
    /// is dropped without telling its owner.
    pub fn reconfigure(&self, screen: ScreenSize) {
        self.windows.set_screen_size(screen);
        self.windows.detach_all_out_of_band();
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        let mut chrome = lock(&self.chrome);
        if chrome
            .toast
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() >= TOAST_DURATION)
        {
            chrome.toast = None;
        }
        ScreenSnapshot {
            screen: self.windows.screen_size(),
            views: self.windows.views(),
            toast: chrome.toast.as_ref().map(|(text, _)| text.clone()),
            notification: chrome.notification.clone(),
        }
    }
}

pub struct ConsoleToasts {
    chrome: Arc<Mutex<Chrome>>,
}

impl ToastDriver for ConsoleToasts {
    fn show_toast(&mut self, text: &str) {
        lock(&self.chrome).toast = Some((text.to_owned(), Instant::now()));
    }
}

/// Shows the foreground notification in the status line.
pub struct ConsoleNotifications {
    chrome: Arc<Mutex<Chrome>>,
}

impl NotificationDriver for ConsoleNotifications {
    fn start_foreground(&mut self, notification: &Notification) -> Result<(), NotificationError> {
        lock(&self.chrome).notification = Some(notification.clone());
        Ok(())
    }

    fn stop_foreground(&mut self, id: u32) -> Result<(), NotificationError> {
        let mut chrome = lock(&self.chrome);
        if chrome.notification.as_ref().is_some_and(|n| n.id == id) {
            chrome.notification = None;
        }
        Ok(())
    }
}

/// OS settings simulated by a preferences file.
#[derive(Debug, Clone)]
pub struct ConsoleSystem {
    settings: Preferences,
    sdk_level: u32,
}

impl ConsoleSystem {
    pub fn new(settings: Preferences, sdk_level: u32) -> Self {
        Self {
            settings,
            sdk_level,
        }
    }

    pub fn set_overlay_allowed(&self, allowed: bool) -> Result<(), PrefsError> {
        self.settings
            .edit()
            .put_bool(KEY_CAN_DRAW_OVERLAYS, allowed)
            .commit()
    }

    pub fn set_notifications_allowed(&self, allowed: bool) -> Result<(), PrefsError> {
        self.settings
            .edit()
            .put_bool(KEY_POST_NOTIFICATIONS, allowed)
            .commit()
    }
}

impl SystemDriver for ConsoleSystem {
    fn sdk_level(&self) -> u32 {
        self.sdk_level
    }

    fn overlay_allowed(&self) -> bool {
        self.settings.get_bool(KEY_CAN_DRAW_OVERLAYS, false)
    }

    fn notifications_allowed(&self) -> bool {
        self.settings.get_bool(KEY_POST_NOTIFICATIONS, false)
    }

    /// The "settings screen" is a prompt on the controlling terminal.
    fn open_overlay_settings(&self) -> io::Result<()> {
        let mut stderr = io::stderr();
        write!(
            stderr,
            "Allow popup-overlay to display over other apps? [y/N] "
        )?;
        stderr.flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        let allowed = matches!(answer.trim(), "y" | "Y" | "yes");
        self.set_overlay_allowed(allowed).map_err(io::Error::other)
    }
}

/// Hands URIs to the desktop's handler.
#[derive(Debug, Default)]
pub struct UriNavigation;

impl NavigationDriver for UriNavigation {
    fn open_uri(&mut self, uri: &str) -> Result<(), NavigationError> {
        webbrowser::open(uri).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::Unsupported => {
                NavigationError::NoHandler(uri.to_owned())
            }
            _ => NavigationError::Failed(err.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NOTIFICATION_TITLE;
    use crate::service::foreground_notification;
    use crate::window::{Extent, Gravity};

    #[test]
    fn pixel_rects_map_to_covering_cells() {
        let rect = FloatRect {
            x: 3,
            y: 3,
            width: 7,
            height: 7,
        };
        // pixels 3..10 cover rows 1..5
        assert_eq!(
            to_cells(rect),
            FloatRect {
                x: 3,
                y: 1,
                width: 7,
                height: 4
            }
        );
        assert_eq!(screen_for_terminal(80, 24), ScreenSize::new(80, 48));
        assert_eq!(touch_point(4, 5), (4.0, 10.0));
    }

    #[test]
    fn reconfigure_drops_views_and_resizes() {
        let screen = ConsoleScreen::new(ScreenSize::new(80, 48));
        let mut windows = screen.windows();
        let params = LayoutParams {
            width: Extent::Px(7),
            height: Extent::Px(7),
            gravity: Gravity::TopEnd,
            x: 2,
            y: 22,
            focusable: false,
            layout_no_limits: true,
        };
        let id = windows.add_view(OverlayView::Bubble, &params).unwrap();
        let snap = screen.snapshot();
        assert_eq!(snap.view_at(80 - 7 - 2, 22).map(|v| v.0), Some(id));
        assert!(snap.view_at(0, 0).is_none());

        screen.reconfigure(ScreenSize::new(40, 20));
        assert!(!windows.is_attached(id));
        assert_eq!(screen.snapshot().screen, ScreenSize::new(40, 20));
    }

    #[test]
    fn chrome_tracks_toast_and_notification() {
        let screen = ConsoleScreen::new(ScreenSize::new(10, 10));
        screen.toasts().show_toast("Copied: Wifi");
        let mut notes = screen.notifications();
        notes.start_foreground(&foreground_notification()).unwrap();
        let snap = screen.snapshot();
        assert_eq!(snap.toast.as_deref(), Some("Copied: Wifi"));
        assert_eq!(
            snap.notification.map(|n| n.title),
            Some(NOTIFICATION_TITLE.to_string())
        );
        notes.stop_foreground(foreground_notification().id).unwrap();
        assert!(screen.snapshot().notification.is_none());
    }

    #[test]
    fn system_settings_default_to_denied() {
        let dir = tempfile::tempdir().unwrap();
        let system = ConsoleSystem::new(Preferences::open(dir.path().join("sys.json")), 34);
        assert!(!system.overlay_allowed());
        assert!(!system.notifications_allowed());
        system.set_overlay_allowed(true).unwrap();
        system.set_notifications_allowed(true).unwrap();
        assert!(system.overlay_allowed());
        assert!(system.notifications_allowed());
    }
}
