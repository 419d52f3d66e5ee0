//! System clipboard access.
//!
//! A thin wrapper over the `arboard` crate so the overlay core only sees the
//! `ClipboardDriver` trait.

use std::time::Instant;

use thiserror::Error;

use crate::drivers::ClipboardDriver;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard backend error: {0}")]
    Backend(#[from] arboard::Error),
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}

/// Set the system clipboard to `text` from a process that is about to exit.
///
/// On Linux the selection is served by its owner, so this blocks until some
/// other client takes the clipboard over.
pub fn set(text: &str) -> Result<(), ClipboardError> {
    hold(text, None)
}

/// Sets the clipboard and, on Linux, keeps serving it until `until` or until
/// it is replaced, whichever comes first. `None` waits for replacement only.
pub fn hold(text: &str, until: Option<Instant>) -> Result<(), ClipboardError> {
    let mut cb = arboard::Clipboard::new()?;
    #[cfg(target_os = "linux")]
    {
        use arboard::SetExtLinux;
        let set = match until {
            Some(deadline) => cb.set().wait_until(deadline),
            None => cb.set().wait(),
        };
        set.text(text.to_owned()).map_err(ClipboardError::from)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = until;
        cb.set_text(text.to_owned()).map_err(ClipboardError::from)
    }
}

/// `ClipboardDriver` backed by the desktop clipboard.
///
/// The backend handle is opened lazily and kept; some platforms drop the
/// selection when the owning handle goes away.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardDriver for SystemClipboard {
    fn set_text(&mut self, label: &str, text: &str) -> Result<(), ClipboardError> {
        let cb = match self.inner.take() {
            Some(cb) => cb,
            None => arboard::Clipboard::new()?,
        };
        let cb = self.inner.insert(cb);
        tracing::debug!(label, "copying item to clipboard");
        cb.set_text(text.to_owned()).map_err(ClipboardError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn has_display() -> bool {
        std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
    }

    #[test]
    fn held_text_is_served_while_the_setter_waits() {
        if !has_display() {
            return;
        }
        let deadline = Instant::now() + Duration::from_millis(600);
        let holder = thread::spawn(move || hold("held by popup-overlay", Some(deadline)));
        thread::sleep(Duration::from_millis(150));
        let read = arboard::Clipboard::new().and_then(|mut cb| cb.get_text());
        holder.join().unwrap().unwrap();
        assert_eq!(read.unwrap(), "held by popup-overlay");
    }
}
