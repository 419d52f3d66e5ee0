use crate::config::OverlayConfig;
use crate::gesture::DragTapTracker;
use crate::window::{Extent, Gravity, LayoutParams, ScreenSize, WindowHandle};

/// The attached bubble and the gesture state of the pointer on it.
#[derive(Debug)]
pub struct BubbleWindow {
    pub handle: WindowHandle,
    pub tracker: DragTapTracker,
}

impl BubbleWindow {
    pub fn new(handle: WindowHandle, config: &OverlayConfig) -> Self {
        Self {
            handle,
            // x is measured from the right edge
            tracker: DragTapTracker::new(config.drag_threshold_px(), config.tap_timeout(), true),
        }
    }
}

/// Offset from the top-end corner for a fresh session.
pub fn initial_position(config: &OverlayConfig) -> (i32, i32) {
    (
        config.px(config.bubble_margin_end_dp),
        config.px(config.bubble_margin_top_dp),
    )
}

pub fn layout(config: &OverlayConfig, (x, y): (i32, i32)) -> LayoutParams {
    let px = config.px(config.bubble_size_dp);
    let size = px.clamp(1, u16::MAX as i32) as u16;
    LayoutParams {
        width: Extent::Px(size),
        height: Extent::Px(size),
        gravity: Gravity::TopEnd,
        x,
        y,
        focusable: false,
        layout_no_limits: true,
    }
}

/// Pulls a remembered position back on screen, e.g. after the display shrank.
pub fn clamp_to_screen(
    config: &OverlayConfig,
    (x, y): (i32, i32),
    screen: ScreenSize,
) -> (i32, i32) {
    let size = config.px(config.bubble_size_dp);
    let max_x = (screen.width as i32 - size).max(0);
    let max_y = (screen.height as i32 - size).max(0);
    (x.clamp(0, max_x), y.clamp(0, max_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> OverlayConfig {
        OverlayConfig {
            density: 1.0,
            ..OverlayConfig::default()
        }
    }

    #[test]
    fn starts_near_top_end() {
        let cfg = cfg();
        assert_eq!(initial_position(&cfg), (16, 180));
        let params = layout(&cfg, initial_position(&cfg));
        let rect = params.resolve(ScreenSize::new(400, 800));
        assert_eq!((rect.x, rect.y, rect.width), (400 - 56 - 16, 180, 56));
        assert!(!params.focusable);
    }

    #[test]
    fn clamp_keeps_bubble_visible() {
        let cfg = cfg();
        let wide = ScreenSize::new(200, 100);
        assert_eq!(clamp_to_screen(&cfg, (500, -5), wide), (144, 0));
        let tiny = ScreenSize::new(20, 20);
        assert_eq!(clamp_to_screen(&cfg, (10, 10), tiny), (0, 0));
    }
}
