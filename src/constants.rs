//! Shared crate-wide constants.

use std::time::Duration;

/// Upper bound on the number of saved items kept in either namespace.
pub const MAX_ITEMS: usize = 50;

/// Cumulative pointer travel (in dp) after which a press becomes a drag.
///
/// Measured as `|dx| + |dy|` from the touch-down origin. Once crossed, the
/// gesture stays a drag even if the pointer comes back near the origin.
pub const DRAG_THRESHOLD_DP: f32 = 6.0;

/// A press released faster than this, without crossing the drag threshold,
/// counts as a tap.
pub const TAP_TIMEOUT: Duration = Duration::from_millis(250);

/// Diameter of the floating bubble.
pub const BUBBLE_SIZE_DP: i32 = 56;

/// Initial bubble offset from the end (right) edge of the screen.
pub const BUBBLE_MARGIN_END_DP: i32 = 16;

/// Initial bubble offset from the top of the screen.
pub const BUBBLE_MARGIN_TOP_DP: i32 = 180;

/// Maximum height of the scrollable list inside the sheet card.
pub const SHEET_LIST_MAX_HEIGHT_DP: i32 = 360;
pub const SHEET_CARD_MARGIN_DP: i32 = 12;
pub const SHEET_CARD_PADDING_DP: i32 = 16;
pub const SHEET_HEADER_HEIGHT_DP: i32 = 40;
pub const SHEET_CLOSE_WIDTH_DP: i32 = 64;
pub const SHEET_ROW_HEIGHT_DP: i32 = 48;
pub const SHEET_EMPTY_HEIGHT_DP: i32 = 56;

pub const SHEET_TITLE: &str = "Pick an item to copy";
pub const SHEET_CLOSE_LABEL: &str = "Close";
pub const SHEET_EMPTY_MESSAGE: &str =
    "No saved items yet.\nAdd items in the app, then tap the bubble again.";

/// Time the OS grants a freshly started service to post its foreground
/// notification before it is killed.
pub const FOREGROUND_PROMOTION_WINDOW: Duration = Duration::from_secs(5);

pub const FOREGROUND_NOTIFICATION_ID: u32 = 1001;
pub const NOTIFICATION_CHANNEL_ID: &str = "overlay_channel";
pub const NOTIFICATION_CHANNEL_NAME: &str = "Overlay";
pub const NOTIFICATION_TITLE: &str = "Popup assistant is running";
pub const NOTIFICATION_TEXT: &str = "Tap the bubble to pick and copy a saved item.";

/// Address of the foreground application's picker surface.
pub const PICKER_URI: &str = "popupapp://overlay-picker";

/// First SDK level where drawing over other apps needs a runtime grant.
pub const SDK_OVERLAY_PERMISSION: u32 = 23;

/// First SDK level with notification channels.
pub const SDK_NOTIFICATION_CHANNELS: u32 = 26;

/// First SDK level where posting notifications needs a runtime grant.
pub const SDK_POST_NOTIFICATIONS: u32 = 33;

/// Service-side namespace keys.
pub const KEY_OVERLAY_ENABLED: &str = "overlay_enabled";
pub const KEY_ITEMS_JSON: &str = "items_json";

/// Application-side namespace key.
pub const APP_ITEMS_KEY: &str = "saved_items_v1";

/// Simulated system settings keys.
pub const KEY_CAN_DRAW_OVERLAYS: &str = "can_draw_overlays";
pub const KEY_POST_NOTIFICATIONS: &str = "post_notifications";

/// How long a toast stays on screen.
pub const TOAST_DURATION: Duration = Duration::from_millis(2000);
