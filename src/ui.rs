//! Drawing for the terminal host.
//!
//! `UiFrame` is a thin wrapper around `ratatui::Frame` that clips every draw
//! call to the visible area. Overlay windows are positioned in pixels and may
//! hang off any edge of the display, so nothing here assumes a rectangle fits.
//!
//! The rest of the module paints one [`ScreenSnapshot`]: the status line with
//! the foreground notification, each attached view bottom to top, and the
//! current toast.

use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Clear, Paragraph, Widget};

use crate::constants::{SHEET_CLOSE_LABEL, SHEET_EMPTY_MESSAGE, SHEET_TITLE};
use crate::drivers::console::{ScreenSnapshot, to_cells};
use crate::overlay::sheet::{SheetLayout, SheetModel};
use crate::window::{FloatRect, OverlayView, ScreenSize};

const BUBBLE_COLOR: Color = Color::Cyan;
const CARD_BG: Color = Color::Rgb(30, 30, 36);
const SCRIM_FG: Color = Color::DarkGray;
const ROW_ALT_BG: Color = Color::Rgb(40, 40, 48);
const STATUS_BG: Color = Color::Rgb(20, 20, 24);

pub const HINT: &str =
    "drag the bubble to move it, click it to pick an item | p: pick | Ctrl-Q: quit";

/// Wrapper around `ratatui::Frame` that clamps drawing to the visible area.
pub struct UiFrame<'a> {
    area: Rect,
    buffer: &'a mut Buffer,
}

impl<'a> UiFrame<'a> {
    pub fn new(frame: &'a mut Frame<'_>) -> Self {
        let area = frame.area();
        let buffer = frame.buffer_mut();
        Self { area, buffer }
    }

    /// Construct a `UiFrame` directly from an area and buffer, for drawing
    /// offscreen.
    pub fn from_parts(area: Rect, buffer: &'a mut Buffer) -> Self {
        Self { area, buffer }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        self.buffer
    }

    fn clip_rect(&self, rect: Rect) -> Option<Rect> {
        let clipped = rect.intersection(self.area);
        if clipped.width == 0 || clipped.height == 0 {
            None
        } else {
            Some(clipped)
        }
    }

    pub fn render_widget<W>(&mut self, widget: W, area: Rect)
    where
        W: Widget,
    {
        if let Some(clipped) = self.clip_rect(area) {
            widget.render(clipped, self.buffer);
        }
    }

    /// Renders into the visible part of a rectangle with a signed origin.
    pub fn render_signed<W>(&mut self, widget: W, rect: FloatRect)
    where
        W: Widget,
    {
        if let Some(clipped) = rect.clip(self.area) {
            widget.render(clipped, self.buffer);
        }
    }

    pub fn set_string(&mut self, x: i32, y: i32, text: &str, style: Style) {
        if x < 0 || y < 0 || x > u16::MAX as i32 || y > u16::MAX as i32 {
            return;
        }
        safe_set_string(self.buffer, self.area, x as u16, y as u16, text, style);
    }
}

pub(crate) fn safe_set_string(
    buffer: &mut Buffer,
    bounds: Rect,
    x: u16,
    y: u16,
    text: &str,
    style: Style,
) {
    if bounds.width == 0 || bounds.height == 0 {
        return;
    }
    let max_x = bounds.x.saturating_add(bounds.width);
    let max_y = bounds.y.saturating_add(bounds.height);
    if x < bounds.x || x >= max_x || y < bounds.y || y >= max_y {
        return;
    }
    let available = max_x.saturating_sub(x);
    if available == 0 {
        return;
    }
    let text = truncate_to_width(text, available as usize);
    buffer.set_string(x, y, text, style);
}

pub(crate) fn truncate_to_width(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    value.chars().take(width).collect()
}

/// Single-line form of an entry; multi-line values are joined with spaces.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn render_screen(
    frame: &mut UiFrame<'_>,
    snapshot: &ScreenSnapshot,
    sheet_scroll: usize,
    density: f32,
) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }
    paint_status(frame, snapshot);
    frame.set_string(
        0,
        area.bottom() as i32 - 1,
        HINT,
        Style::default().fg(Color::DarkGray),
    );
    for (_, view, params) in &snapshot.views {
        let rect = params.resolve(snapshot.screen);
        match view {
            OverlayView::Bubble => paint_bubble(frame, to_cells(rect)),
            OverlayView::Sheet(model) => {
                paint_sheet(frame, snapshot.screen, model, sheet_scroll, density)
            }
        }
    }
    if let Some(toast) = &snapshot.toast {
        paint_toast(frame, toast);
    }
}

fn paint_status(frame: &mut UiFrame<'_>, snapshot: &ScreenSnapshot) {
    let area = frame.area();
    let bar = Rect::new(area.x, area.y, area.width, 1);
    frame.render_widget(Block::default().style(Style::default().bg(STATUS_BG)), bar);
    if let Some(notification) = &snapshot.notification {
        let text = format!(" \u{25cf} {}  {}", notification.title, notification.text);
        frame.set_string(
            bar.x as i32,
            bar.y as i32,
            &text,
            Style::default().fg(Color::Gray).bg(STATUS_BG),
        );
    }
}

fn paint_bubble(frame: &mut UiFrame<'_>, cells: FloatRect) {
    let style = Style::default().fg(Color::Black).bg(BUBBLE_COLOR);
    frame.render_signed(Clear, cells);
    frame.render_signed(
        Block::bordered()
            .border_type(BorderType::Rounded)
            .style(style),
        cells,
    );
    let mid_x = cells.x + cells.width as i32 / 2;
    let mid_y = cells.y + cells.height as i32 / 2;
    frame.set_string(mid_x, mid_y, "\u{25c9}", style.add_modifier(Modifier::BOLD));
}

fn paint_sheet(
    frame: &mut UiFrame<'_>,
    screen: ScreenSize,
    model: &SheetModel,
    scroll: usize,
    density: f32,
) {
    let area = frame.area();
    let scrim = Style::default().fg(SCRIM_FG).add_modifier(Modifier::DIM);
    frame.buffer_mut().set_style(area, scrim);

    let layout = SheetLayout::compute(model, screen, density, scroll);
    let card = to_cells(layout.card);
    let card_style = Style::default().fg(Color::White).bg(CARD_BG);
    frame.render_signed(Clear, card);
    frame.render_signed(
        Block::bordered()
            .border_type(BorderType::Rounded)
            .style(card_style),
        card,
    );

    let header = to_cells(layout.header);
    let title_y = header.y + header.height as i32 / 2;
    frame.set_string(
        header.x,
        title_y,
        SHEET_TITLE,
        card_style.add_modifier(Modifier::BOLD),
    );
    let close = to_cells(layout.close);
    frame.set_string(
        close.x,
        title_y,
        &format!("[{SHEET_CLOSE_LABEL}]"),
        card_style.fg(Color::LightCyan),
    );

    let body = to_cells(layout.body);
    if model.is_empty() {
        frame.render_signed(
            Paragraph::new(SHEET_EMPTY_MESSAGE)
                .style(card_style.fg(Color::Gray))
                .alignment(Alignment::Center),
            body,
        );
        return;
    }
    for (index, rect) in &layout.rows {
        let Some(entry) = model.entry(*index) else {
            continue;
        };
        let row = to_cells(*rect);
        let row_style = if index % 2 == 1 {
            card_style.bg(ROW_ALT_BG)
        } else {
            card_style
        };
        frame.render_signed(Block::default().style(row_style), row);
        let text = truncate_to_width(&one_line(&entry.display), row.width as usize);
        frame.set_string(row.x, row.y + row.height as i32 / 2, &text, row_style);
    }
    let hidden = layout.max_scroll(model);
    if hidden > 0 {
        let marker = format!("{}/{}", scroll.min(hidden) + 1, hidden + 1);
        frame.set_string(
            card.x + card.width as i32 - marker.chars().count() as i32 - 2,
            card.y + card.height as i32 - 1,
            &marker,
            card_style.fg(Color::Gray),
        );
    }
}

fn paint_toast(frame: &mut UiFrame<'_>, text: &str) {
    let area = frame.area();
    let width = (text.chars().count() as u16 + 4).min(area.width);
    let rect = Rect::new(
        area.x + (area.width - width) / 2,
        area.bottom().saturating_sub(5),
        width,
        3,
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::bordered().border_type(BorderType::Rounded))
            .style(Style::default().fg(Color::White).bg(Color::Rgb(60, 60, 60))),
        rect,
    );
}
