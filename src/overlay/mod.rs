//! The overlay window controller: at most one bubble, at most one sheet.
//!
//! Every window mutation goes through [`WindowHandle`] and its failures are
//! discarded, since the window manager can drop our views at any time.

pub mod bubble;
pub mod sheet;

use std::sync::Arc;

use crate::config::OverlayConfig;
use crate::drivers::{
    ClipboardDriver, NavigationDriver, OverlayDrivers, SystemDriver, ToastDriver, WindowDriver,
};
use crate::gesture::{GestureOutcome, TouchEvent};
use crate::permissions::PermissionGate;
use crate::store::ServiceStore;
use crate::window::{
    DiscardStale, Extent, Gravity, LayoutParams, OverlayView, WindowHandle,
};

use bubble::BubbleWindow;
use sheet::{SheetHit, SheetModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySessionState {
    pub bubble_position: (i32, i32),
    pub bubble_visible: bool,
    pub sheet_visible: bool,
}

/// Where a tap on the bubble ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerRoute {
    HandedOff,
    Sheet,
}

struct SheetWindow {
    handle: WindowHandle,
    model: SheetModel,
}

pub struct OverlayController {
    gate: PermissionGate<Arc<dyn SystemDriver + Send + Sync>>,
    windows: Box<dyn WindowDriver>,
    clipboard: Box<dyn ClipboardDriver>,
    navigation: Box<dyn NavigationDriver>,
    toasts: Box<dyn ToastDriver>,
    store: ServiceStore,
    config: OverlayConfig,
    bubble: Option<BubbleWindow>,
    sheet: Option<SheetWindow>,
    bubble_position: (i32, i32),
}

impl OverlayController {
    pub fn new(drivers: OverlayDrivers, store: ServiceStore, config: OverlayConfig) -> Self {
        let bubble_position = bubble::initial_position(&config);
        Self {
            gate: PermissionGate::new(drivers.system),
            windows: drivers.windows,
            clipboard: drivers.clipboard,
            navigation: drivers.navigation,
            toasts: drivers.toasts,
            store,
            config,
            bubble: None,
            sheet: None,
            bubble_position,
        }
    }

    pub fn gate(&self) -> &PermissionGate<Arc<dyn SystemDriver + Send + Sync>> {
        &self.gate
    }

    pub fn session(&self) -> OverlaySessionState {
        OverlaySessionState {
            bubble_position: self.bubble_position,
            bubble_visible: self.bubble.is_some(),
            sheet_visible: self.sheet.is_some(),
        }
    }

    pub fn show_bubble(&mut self) {
        if self.bubble.is_some() {
            return;
        }
        if !self.gate.check_can_draw_overlay() {
            tracing::info!("overlay permission missing; bubble not shown");
            return;
        }
        let params = bubble::layout(&self.config, self.bubble_position);
        match WindowHandle::attach(self.windows.as_mut(), OverlayView::Bubble, params) {
            Ok(handle) => {
                tracing::debug!(id = %handle.id(), "bubble attached");
                self.bubble = Some(BubbleWindow::new(handle, &self.config));
            }
            Err(err) => tracing::warn!("could not attach bubble: {err}"),
        }
    }

    /// Feeds one pointer sample that landed on the bubble.
    pub fn handle_bubble_touch(&mut self, event: TouchEvent) -> GestureOutcome {
        let Some(bubble) = self.bubble.as_mut() else {
            return GestureOutcome::Ignored;
        };
        let outcome = bubble.tracker.on_touch(event, bubble.handle.position());
        match outcome {
            GestureOutcome::MoveTo { x, y } | GestureOutcome::DragEnd { x, y } => {
                bubble
                    .handle
                    .move_to(self.windows.as_mut(), x, y)
                    .discard_stale("move bubble");
                self.bubble_position = (x, y);
            }
            GestureOutcome::Tap => {
                self.open_picker();
            }
            GestureOutcome::Ignored
            | GestureOutcome::Pressed
            | GestureOutcome::Holding
            | GestureOutcome::Released => {}
        }
        outcome
    }

    /// Hands off to the application's picker, or shows the sheet when the
    /// application cannot be reached.
    pub fn open_picker(&mut self) -> PickerRoute {
        if let Some(uri) = self.config.picker_uri.as_deref() {
            match self.navigation.open_uri(uri) {
                Ok(()) => {
                    tracing::debug!(uri, "picker handed off");
                    return PickerRoute::HandedOff;
                }
                Err(err) => tracing::debug!(uri, "picker hand-off failed, using sheet: {err}"),
            }
        }
        self.show_sheet();
        PickerRoute::Sheet
    }

    pub fn show_sheet(&mut self) {
        if self.sheet.is_some() || !self.gate.check_can_draw_overlay() {
            return;
        }
        let model = SheetModel::from_items(self.store.items());
        let params = LayoutParams {
            width: Extent::MatchParent,
            height: Extent::MatchParent,
            gravity: Gravity::TopStart,
            x: 0,
            y: 0,
            focusable: true,
            layout_no_limits: false,
        };
        match WindowHandle::attach(
            self.windows.as_mut(),
            OverlayView::Sheet(model.clone()),
            params,
        ) {
            Ok(handle) => {
                let entries = model.entries().len();
                tracing::debug!(id = %handle.id(), entries, "sheet attached");
                self.sheet = Some(SheetWindow { handle, model });
            }
            Err(err) => tracing::warn!("could not attach sheet: {err}"),
        }
    }

    pub fn handle_sheet_hit(&mut self, hit: SheetHit) {
        match hit {
            SheetHit::Item(index) => self.select_item(index),
            SheetHit::Close | SheetHit::Scrim => self.remove_sheet(),
            SheetHit::Card => {}
        }
    }

    /// Copies entry `index` and closes the sheet.
    pub fn select_item(&mut self, index: usize) {
        let Some(entry) = self
            .sheet
            .as_ref()
            .and_then(|sheet| sheet.model.entry(index))
            .cloned()
        else {
            return;
        };
        let label = entry.item.display_label(index);
        match self.clipboard.set_text(&label, entry.item.clip_text()) {
            Ok(()) => self.toasts.show_toast(&format!("Copied: {label}")),
            Err(err) => tracing::warn!("copy failed: {err}"),
        }
        self.remove_sheet();
    }

    pub fn remove_sheet(&mut self) {
        if let Some(sheet) = self.sheet.take() {
            sheet
                .handle
                .detach(self.windows.as_mut())
                .discard_stale("remove sheet");
        }
    }

    pub fn remove_all(&mut self) {
        if let Some(bubble) = self.bubble.take() {
            bubble
                .handle
                .detach(self.windows.as_mut())
                .discard_stale("remove bubble");
        }
        self.remove_sheet();
    }

    /// Forgets views the window manager dropped and brings the bubble back.
    pub fn refresh_after_display_change(&mut self) {
        let screen = self.windows.screen_size();
        if let Some(sheet) = &self.sheet
            && !sheet.handle.is_attached(self.windows.as_ref())
        {
            tracing::debug!("sheet lost on display change");
            self.sheet = None;
        }
        let lost_bubble = self
            .bubble
            .as_ref()
            .is_some_and(|bubble| !bubble.handle.is_attached(self.windows.as_ref()));
        if lost_bubble {
            tracing::debug!("bubble lost on display change");
            self.bubble = None;
            self.bubble_position =
                bubble::clamp_to_screen(&self.config, self.bubble_position, screen);
            self.show_bubble();
        }
    }
}
