//! The fallback picker: a full-screen scrim with a bottom-anchored card.
//!
//! Layout is computed in screen pixels so the window manager and the host
//! agree on what a touch at a given point hits.

use crate::constants::{
    SHEET_CARD_MARGIN_DP, SHEET_CARD_PADDING_DP, SHEET_CLOSE_WIDTH_DP, SHEET_EMPTY_HEIGHT_DP,
    SHEET_HEADER_HEIGHT_DP, SHEET_LIST_MAX_HEIGHT_DP, SHEET_ROW_HEIGHT_DP,
};
use crate::items::SavedItem;
use crate::window::{FloatRect, ScreenSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub item: SavedItem,
    pub display: String,
}

/// Snapshot of the items at the moment the sheet opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetModel {
    entries: Vec<SheetEntry>,
}

impl SheetModel {
    pub fn from_items(items: Vec<SavedItem>) -> Self {
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| SheetEntry {
                display: item.display(index),
                item,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SheetEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&SheetEntry> {
        self.entries.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetHit {
    Item(usize),
    Close,
    /// Inside the card but not on anything actionable.
    Card,
    Scrim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub card: FloatRect,
    pub header: FloatRect,
    pub close: FloatRect,
    pub body: FloatRect,
    /// Visible rows as `(entry index, rect)`.
    pub rows: Vec<(usize, FloatRect)>,
    pub row_height: i32,
}

fn dp(value: i32, density: f32) -> i32 {
    ((value as f32 * density).round() as i32).max(1)
}

fn rect(x: i32, y: i32, width: i32, height: i32) -> FloatRect {
    FloatRect {
        x,
        y,
        width: width.max(0) as u16,
        height: height.max(0) as u16,
    }
}

impl SheetLayout {
    pub fn compute(model: &SheetModel, screen: ScreenSize, density: f32, scroll: usize) -> Self {
        let margin = dp(SHEET_CARD_MARGIN_DP, density);
        let padding = dp(SHEET_CARD_PADDING_DP, density);
        let header_h = dp(SHEET_HEADER_HEIGHT_DP, density);
        let row_height = dp(SHEET_ROW_HEIGHT_DP, density);
        let screen_w = screen.width as i32;
        let screen_h = screen.height as i32;

        let body_wanted = if model.is_empty() {
            dp(SHEET_EMPTY_HEIGHT_DP, density)
        } else {
            (row_height * model.entries.len() as i32).min(dp(SHEET_LIST_MAX_HEIGHT_DP, density))
        };
        let card_w = (screen_w - 2 * margin).max(0);
        let chrome = 2 * padding + header_h;
        let card_h = (chrome + body_wanted).min((screen_h - margin).max(0));
        let card = rect(margin, screen_h - margin - card_h, card_w, card_h);

        let inner_x = card.x + padding;
        let inner_w = (card_w - 2 * padding).max(0);
        let header = rect(inner_x, card.y + padding, inner_w, header_h);
        let close_w = dp(SHEET_CLOSE_WIDTH_DP, density).min(inner_w);
        let close = rect(inner_x + inner_w - close_w, header.y, close_w, header_h);
        let body_h = (card_h - chrome).max(0);
        let body = rect(inner_x, header.y + header_h, inner_w, body_h);

        let visible = (body_h / row_height).max(0) as usize;
        let scroll = scroll.min(model.entries.len().saturating_sub(visible));
        let rows = (scroll..model.entries.len())
            .take(visible)
            .enumerate()
            .map(|(slot, index)| {
                let y = body.y + slot as i32 * row_height;
                (index, rect(inner_x, y, inner_w, row_height))
            })
            .collect();

        Self {
            card,
            header,
            close,
            body,
            rows,
            row_height,
        }
    }

    /// Largest useful scroll offset for `model` under this layout.
    pub fn max_scroll(&self, model: &SheetModel) -> usize {
        let visible = (self.body.height as i32 / self.row_height).max(0) as usize;
        model.entries.len().saturating_sub(visible)
    }

    pub fn hit_test(&self, x: i32, y: i32) -> SheetHit {
        if !self.card.contains(x, y) {
            return SheetHit::Scrim;
        }
        if self.close.contains(x, y) {
            return SheetHit::Close;
        }
        self.rows
            .iter()
            .find(|(_, row)| row.contains(x, y))
            .map(|(index, _)| SheetHit::Item(*index))
            .unwrap_or(SheetHit::Card)
    }
}
