//! Overlay window geometry and the fallible handle used to mutate windows
//! the window manager may drop behind our back.

mod handle;

pub use handle::{DiscardStale, WindowHandle};

use std::fmt;

use ratatui::prelude::Rect;
use thiserror::Error;

use crate::overlay::sheet::SheetModel;

/// Signed rectangle origin with unsigned size, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatRect {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl FloatRect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }

    /// The part of this rectangle inside `bounds`, if any.
    pub fn clip(&self, bounds: Rect) -> Option<Rect> {
        let x0 = self.x.max(bounds.x as i32);
        let y0 = self.y.max(bounds.y as i32);
        let x1 = (self.x + self.width as i32).min(bounds.x as i32 + bounds.width as i32);
        let y1 = (self.y + self.height as i32).min(bounds.y as i32 + bounds.height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect {
            x: x0 as u16,
            y: y0 as u16,
            width: (x1 - x0) as u16,
            height: (y1 - y0) as u16,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub width: u16,
    pub height: u16,
}

impl ScreenSize {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

/// Opaque identity the window manager hands out for an attached view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Which screen corner `x`/`y` are measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    TopStart,
    /// `x` is the distance from the right edge, so it grows leftwards.
    TopEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    Px(u16),
    MatchParent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutParams {
    pub width: Extent,
    pub height: Extent,
    pub gravity: Gravity,
    pub x: i32,
    pub y: i32,
    pub focusable: bool,
    /// When false the window is kept fully on screen.
    pub layout_no_limits: bool,
}

impl LayoutParams {
    pub fn resolve(&self, screen: ScreenSize) -> FloatRect {
        let width = match self.width {
            Extent::Px(px) => px,
            Extent::MatchParent => screen.width,
        };
        let height = match self.height {
            Extent::Px(px) => px,
            Extent::MatchParent => screen.height,
        };
        let (mut left, mut top) = match (self.width, self.gravity) {
            (Extent::MatchParent, _) => (0, self.y),
            (_, Gravity::TopStart) => (self.x, self.y),
            (_, Gravity::TopEnd) => (screen.width as i32 - width as i32 - self.x, self.y),
        };
        if matches!(self.height, Extent::MatchParent) {
            top = 0;
        }
        if !self.layout_no_limits {
            left = left.clamp(0, (screen.width as i32 - width as i32).max(0));
            top = top.clamp(0, (screen.height as i32 - height as i32).max(0));
        }
        FloatRect {
            x: left,
            y: top,
            width,
            height,
        }
    }
}

/// Content of an overlay window.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayView {
    Bubble,
    Sheet(SheetModel),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("{0} is not attached to the window manager")]
    NotAttached(ViewId),
    #[error("window manager rejected the request: {0}")]
    Rejected(String),
}

impl WindowError {
    /// The window was already torn down out-of-band.
    pub fn is_stale(&self) -> bool {
        matches!(self, WindowError::NotAttached(_))
    }
}
