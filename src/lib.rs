pub mod boot;
pub mod clipboard;
pub mod config;
pub mod constants;
pub mod control;
pub mod drivers;
pub mod event_loop;
pub mod gesture;
#[cfg(unix)]
pub mod ipc;
pub mod items;
pub mod overlay;
pub mod permissions;
pub mod picker;
pub mod prefs;
pub mod runner;
pub mod service;
pub mod state;
pub mod store;
pub mod tracing_sub;
pub mod ui;
pub mod window;
