//! Drag/tap disambiguation for a single pointer.
//!
//! ```text
//! IDLE --down--> PRESSED --move past threshold--> DRAGGING
//!                   |                                |
//!                   +----------------up--------------+--> IDLE
//! ```
//!
//! A release counts as a tap only when it comes within the tap timeout and
//! the pointer never travelled past the drag threshold. Everything else that
//! moved is a finished drag; a slow press without movement does nothing.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer sample in raw screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub raw_x: f32,
    pub raw_y: f32,
    pub at: Instant,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, raw_x: f32, raw_y: f32, at: Instant) -> Self {
        Self {
            phase,
            raw_x,
            raw_y,
            at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Ignored,
    Pressed,
    /// Still below the threshold; the window stays put.
    Holding,
    /// Live drag update: move the window to this anchor.
    MoveTo { x: i32, y: i32 },
    Tap,
    /// Drag finished at this anchor.
    DragEnd { x: i32, y: i32 },
    /// Released without tapping or dragging.
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Press {
    origin: (f32, f32),
    anchor: (i32, i32),
    started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Pressed(Press),
    Dragging(Press),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragTapTracker {
    state: DragState,
    drag_threshold_px: f32,
    tap_timeout: Duration,
    /// Set for end-anchored windows, whose x offset grows leftwards.
    invert_x: bool,
}

impl DragTapTracker {
    pub fn new(drag_threshold_px: f32, tap_timeout: Duration, invert_x: bool) -> Self {
        Self {
            state: DragState::Idle,
            drag_threshold_px,
            tap_timeout,
            invert_x,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Feeds one sample. `anchor` is the window's current position and is
    /// only read on touch-down.
    pub fn on_touch(&mut self, event: TouchEvent, anchor: (i32, i32)) -> GestureOutcome {
        match (event.phase, self.state) {
            (TouchPhase::Down, _) => {
                self.state = DragState::Pressed(Press {
                    origin: (event.raw_x, event.raw_y),
                    anchor,
                    started: event.at,
                });
                GestureOutcome::Pressed
            }
            (TouchPhase::Move, DragState::Pressed(press)) => {
                if self.displacement(&press, &event) > self.drag_threshold_px {
                    self.state = DragState::Dragging(press);
                    let (x, y) = self.anchor_for(&press, &event);
                    GestureOutcome::MoveTo { x, y }
                } else {
                    GestureOutcome::Holding
                }
            }
            (TouchPhase::Move, DragState::Dragging(press)) => {
                let (x, y) = self.anchor_for(&press, &event);
                GestureOutcome::MoveTo { x, y }
            }
            (TouchPhase::Up, DragState::Pressed(press)) => {
                self.state = DragState::Idle;
                let elapsed = event.at.saturating_duration_since(press.started);
                if self.displacement(&press, &event) > self.drag_threshold_px {
                    // The pointer jumped without reporting moves.
                    let (x, y) = self.anchor_for(&press, &event);
                    GestureOutcome::DragEnd { x, y }
                } else if elapsed < self.tap_timeout {
                    GestureOutcome::Tap
                } else {
                    GestureOutcome::Released
                }
            }
            (TouchPhase::Up, DragState::Dragging(press)) => {
                self.state = DragState::Idle;
                let (x, y) = self.anchor_for(&press, &event);
                GestureOutcome::DragEnd { x, y }
            }
            (TouchPhase::Cancel, DragState::Dragging(press)) => {
                self.state = DragState::Idle;
                let (x, y) = self.anchor_for(&press, &event);
                GestureOutcome::DragEnd { x, y }
            }
            (TouchPhase::Cancel, _) => {
                self.state = DragState::Idle;
                GestureOutcome::Released
            }
            (TouchPhase::Move | TouchPhase::Up, DragState::Idle) => GestureOutcome::Ignored,
        }
    }

    fn displacement(&self, press: &Press, event: &TouchEvent) -> f32 {
        (event.raw_x - press.origin.0).abs() + (event.raw_y - press.origin.1).abs()
    }

    fn anchor_for(&self, press: &Press, event: &TouchEvent) -> (i32, i32) {
        let dx = (event.raw_x - press.origin.0) as i32;
        let dy = (event.raw_y - press.origin.1) as i32;
        let dx = if self.invert_x { -dx } else { dx };
        (press.anchor.0 + dx, press.anchor.1 + dy)
    }
}
