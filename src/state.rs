use crate::window::ViewId;

/// View-local state of the terminal host: which pointer gesture is in
/// flight and how far the open sheet is scrolled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleState {
    pointer_on_bubble: bool,
    sheet: Option<ViewId>,
    sheet_scroll: usize,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer_on_bubble(&self) -> bool {
        self.pointer_on_bubble
    }

    pub fn set_pointer_on_bubble(&mut self, on: bool) {
        self.pointer_on_bubble = on;
    }

    pub fn sheet_scroll(&self) -> usize {
        self.sheet_scroll
    }

    /// Tracks which sheet is open; a different (or no) sheet starts at the top.
    pub fn observe_sheet(&mut self, sheet: Option<ViewId>) {
        if self.sheet != sheet {
            self.sheet = sheet;
            self.sheet_scroll = 0;
        }
    }

    pub fn scroll_sheet(&mut self, delta: isize, max: usize) {
        self.sheet_scroll = self.sheet_scroll.saturating_add_signed(delta).min(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_is_clamped_and_reset_per_sheet() {
        let mut s = ConsoleState::new();
        s.observe_sheet(Some(ViewId(3)));
        s.scroll_sheet(-1, 5);
        assert_eq!(s.sheet_scroll(), 0);
        s.scroll_sheet(4, 5);
        s.scroll_sheet(4, 5);
        assert_eq!(s.sheet_scroll(), 5);
        // same sheet keeps its offset
        s.observe_sheet(Some(ViewId(3)));
        assert_eq!(s.sheet_scroll(), 5);
        s.observe_sheet(Some(ViewId(4)));
        assert_eq!(s.sheet_scroll(), 0);
    }

    #[test]
    fn pointer_flag_round_trips() {
        let mut s = ConsoleState::new();
        assert!(!s.pointer_on_bubble());
        s.set_pointer_on_bubble(true);
        assert!(s.pointer_on_bubble());
    }
}
