//! The standalone picker behind `popup-overlay pick`.
//!
//! It is also where a bubble tap lands when the hand-off is on: the desktop
//! entry written by [`register`] routes `popupapp://` URIs to `pick`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockWriteGuard};
use thiserror::Error;

use crate::constants::PICKER_URI;

pub const URI_SCHEME: &str = "popupapp";
pub const DESKTOP_FILE: &str = "popup-overlay-picker.desktop";

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("a picker is already open")]
    Busy,
    #[error("not an item number or picker URI: {0:?}")]
    UnknownTarget(String),
    #[error("no item {0}")]
    InvalidIndex(String),
    #[error("picker lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What `pick` was asked to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    Prompt,
    /// 1-based item number.
    Index(usize),
}

impl PickTarget {
    /// Accepts an item number, the hand-off URI, or nothing.
    pub fn parse(arg: Option<&str>) -> Result<Self, PickerError> {
        let Some(arg) = arg.map(str::trim) else {
            return Ok(Self::Prompt);
        };
        if arg.trim_end_matches('/') == PICKER_URI {
            return Ok(Self::Prompt);
        }
        arg.parse::<usize>()
            .map(Self::Index)
            .map_err(|_| PickerError::UnknownTarget(arg.to_owned()))
    }
}

/// Resolves a 1-based choice against a list of `len` items.
pub fn position(choice: &str, len: usize) -> Result<usize, PickerError> {
    choice
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .filter(|&i| i < len)
        .ok_or_else(|| PickerError::InvalidIndex(choice.trim().to_owned()))
}

/// Single-instance guard. The OS drops the lock with the process, so a
/// killed picker never leaves it held.
pub struct PickerLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl PickerLock {
    pub fn open(path: &Path) -> Result<Self, PickerError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| PickerError::Lock {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(file),
        })
    }

    /// Fails with [`PickerError::Busy`] while another picker holds it.
    pub fn try_hold(&mut self) -> Result<RwLockWriteGuard<'_, File>, PickerError> {
        match self.lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Err(PickerError::Busy),
            Err(source) => Err(PickerError::Lock {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Desktop entry that opens `popupapp://` URIs with `exe pick %u`.
pub fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=popup-overlay picker\n\
         Exec={} pick %u\n\
         Terminal=true\n\
         NoDisplay=true\n\
         MimeType=x-scheme-handler/{URI_SCHEME};\n",
        quote_exec_arg(&exe.to_string_lossy())
    )
}

/// Writes the desktop entry into `apps_dir` and returns its path.
pub fn register(apps_dir: &Path, exe: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(apps_dir)?;
    let path = apps_dir.join(DESKTOP_FILE);
    fs::write(&path, desktop_entry(exe))?;
    Ok(path)
}

fn quote_exec_arg(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+".contains(c));
    if plain {
        return arg.to_owned();
    }
    let mut quoted = String::from("\"");
    for c in arg.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
