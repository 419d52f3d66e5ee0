//! The terminal host: draws the shared screen and turns terminal input into
//! host events.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEventKind};
use futures::channel::mpsc;

use crate::config::OverlayConfig;
use crate::control::{ControlCommand, HostEvent, OverlayControl};
use crate::drivers::console::{
    ConsoleScreen, ScreenSnapshot, hit_point, screen_for_terminal, touch_point,
};
use crate::drivers::{InputDriver, OutputDriver};
use crate::event_loop::{ControlFlow, EventLoop};
use crate::gesture::{TouchEvent, TouchPhase};
use crate::overlay::sheet::{SheetLayout, SheetModel};
use crate::state::ConsoleState;
use crate::ui;
use crate::window::{OverlayView, ScreenSize, ViewId};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Routed {
    Host(HostEvent),
    Reconfigure(ScreenSize),
    Quit,
    Nothing,
}

fn open_sheet(snapshot: &ScreenSnapshot) -> Option<(ViewId, &SheetModel)> {
    for (id, view, _) in snapshot.views.iter().rev() {
        if let OverlayView::Sheet(model) = view {
            return Some((*id, model));
        }
    }
    None
}

fn touch(phase: TouchPhase, col: u16, row: u16, now: Instant) -> Routed {
    let (x, y) = touch_point(col, row);
    Routed::Host(HostEvent::BubbleTouch(TouchEvent::new(phase, x, y, now)))
}

/// Maps one terminal event onto the overlay, given what is on screen.
pub fn route_event(
    event: &Event,
    snapshot: &ScreenSnapshot,
    state: &mut ConsoleState,
    density: f32,
    now: Instant,
) -> Routed {
    let sheet = open_sheet(snapshot);
    match event {
        Event::Resize(cols, rows) => Routed::Reconfigure(screen_for_terminal(*cols, *rows)),
        Event::Key(key) => route_key(key, sheet, snapshot, state, density),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let (x, y) = hit_point(mouse.column, mouse.row);
                match snapshot.view_at(x, y) {
                    Some((_, OverlayView::Sheet(model), _)) => {
                        let layout = SheetLayout::compute(
                            model,
                            snapshot.screen,
                            density,
                            state.sheet_scroll(),
                        );
                        Routed::Host(HostEvent::SheetHit(layout.hit_test(x, y)))
                    }
                    Some((_, OverlayView::Bubble, _)) => {
                        state.set_pointer_on_bubble(true);
                        touch(TouchPhase::Down, mouse.column, mouse.row, now)
                    }
                    None => Routed::Nothing,
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if state.pointer_on_bubble() => {
                touch(TouchPhase::Move, mouse.column, mouse.row, now)
            }
            MouseEventKind::Up(MouseButton::Left) if state.pointer_on_bubble() => {
                state.set_pointer_on_bubble(false);
                touch(TouchPhase::Up, mouse.column, mouse.row, now)
            }
            MouseEventKind::ScrollDown | MouseEventKind::ScrollUp => {
                if let Some((_, model)) = sheet {
                    let down = mouse.kind == MouseEventKind::ScrollDown;
                    let delta = if down { 1 } else { -1 };
                    scroll(state, model, snapshot.screen, density, delta);
                }
                Routed::Nothing
            }
            _ => Routed::Nothing,
        },
        Event::FocusLost if state.pointer_on_bubble() => {
            state.set_pointer_on_bubble(false);
            Routed::Host(HostEvent::BubbleTouch(TouchEvent::new(
                TouchPhase::Cancel,
                0.0,
                0.0,
                now,
            )))
        }
        _ => Routed::Nothing,
    }
}

fn route_key(
    key: &KeyEvent,
    sheet: Option<(ViewId, &SheetModel)>,
    snapshot: &ScreenSnapshot,
    state: &mut ConsoleState,
    density: f32,
) -> Routed {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => Routed::Quit,
        KeyCode::Esc if sheet.is_some() => Routed::Host(HostEvent::DismissSheet),
        KeyCode::Esc => Routed::Quit,
        KeyCode::Char('p') => Routed::Host(HostEvent::OpenPicker),
        KeyCode::Down | KeyCode::Up => {
            if let Some((_, model)) = sheet {
                let delta = if key.code == KeyCode::Down { 1 } else { -1 };
                scroll(state, model, snapshot.screen, density, delta);
            }
            Routed::Nothing
        }
        _ => Routed::Nothing,
    }
}

fn scroll(
    state: &mut ConsoleState,
    model: &SheetModel,
    screen: ScreenSize,
    density: f32,
    delta: isize,
) {
    let max = SheetLayout::compute(model, screen, density, 0).max_scroll(model);
    state.scroll_sheet(delta, max);
}

fn send(control: &OverlayControl, event: HostEvent) {
    let delivered = control.sender().is_some_and(|sender| sender.send(event));
    if !delivered {
        tracing::debug!(?event, "host not running; event dropped");
    }
}

/// Why the terminal host loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The user closed the terminal host; the session is left enabled.
    Closed,
    /// A `stop` command arrived.
    Stopped,
    /// The overlay host went away on its own.
    HostGone,
}

pub struct ConsoleHost {
    screen: ConsoleScreen,
    control: OverlayControl,
    config: OverlayConfig,
    state: ConsoleState,
    commands: Option<mpsc::UnboundedReceiver<ControlCommand>>,
}

impl ConsoleHost {
    pub fn new(
        screen: ConsoleScreen,
        control: OverlayControl,
        config: OverlayConfig,
        commands: Option<mpsc::UnboundedReceiver<ControlCommand>>,
    ) -> Self {
        Self {
            screen,
            control,
            config,
            state: ConsoleState::new(),
            commands,
        }
    }

    pub fn control(&mut self) -> &mut OverlayControl {
        &mut self.control
    }

    /// Applies pending socket commands. Returns `Some` when the loop should end.
    fn drain_commands(&mut self) -> Option<Exit> {
        let commands = self.commands.as_mut()?;
        loop {
            match commands.try_next() {
                Ok(Some(ControlCommand::Stop)) => return Some(Exit::Stopped),
                Ok(Some(ControlCommand::OpenPicker)) => send(&self.control, HostEvent::OpenPicker),
                Ok(None) => {
                    self.commands = None;
                    return None;
                }
                Err(_) => return None,
            }
        }
    }

    pub fn run<D: InputDriver, O: OutputDriver>(
        &mut self,
        input: D,
        output: &mut O,
    ) -> io::Result<Exit> {
        let mut exit = Exit::Closed;
        let mut event_loop = EventLoop::new(input, FRAME_INTERVAL);
        event_loop.run(|_, event| {
            let Some(event) = event else {
                if let Some(reason) = self.drain_commands() {
                    exit = reason;
                    return Ok(ControlFlow::Quit);
                }
                if !self.control.is_running() {
                    exit = Exit::HostGone;
                    return Ok(ControlFlow::Quit);
                }
                let snapshot = self.screen.snapshot();
                let open = open_sheet(&snapshot).map(|(id, _)| id);
                self.state.observe_sheet(open);
                let scroll = self.state.sheet_scroll();
                let density = self.config.density;
                output.draw(|mut frame| {
                    ui::render_screen(&mut frame, &snapshot, scroll, density);
                })?;
                return Ok(ControlFlow::Continue);
            };
            let snapshot = self.screen.snapshot();
            let routed = route_event(
                &event,
                &snapshot,
                &mut self.state,
                self.config.density,
                Instant::now(),
            );
            match routed {
                Routed::Host(host_event) => send(&self.control, host_event),
                Routed::Reconfigure(screen) => {
                    self.screen.reconfigure(screen);
                    send(&self.control, HostEvent::DisplayChanged);
                }
                Routed::Quit => return Ok(ControlFlow::Quit),
                Routed::Nothing => {}
            }
            Ok(ControlFlow::Continue)
        })?;
        Ok(exit)
    }
}
