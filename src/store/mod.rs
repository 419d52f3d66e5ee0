//! The shared item store, split across two durable namespaces.
//!
//! [`ServiceStore`] is the namespace the background host reads; it also holds
//! the persistent enablement flag. [`AppItemStore`] is the application's own
//! namespace and the source of truth: it seeds itself from the service side
//! when empty and pushes every mutation across afterwards.

mod app;
mod service;

pub use app::AppItemStore;
pub use service::ServiceStore;

use thiserror::Error;

use crate::items::{ItemEditError, ItemsError, SavedItem};
use crate::prefs::PrefsError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    MalformedPayload(#[from] ItemsError),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error(transparent)]
    Edit(#[from] ItemEditError),
}

/// The item exchange surface between the application and the service-side
/// namespace.
pub trait ItemExchange {
    fn get_items(&self) -> Vec<SavedItem>;
    fn set_items(&self, items: &[SavedItem]) -> Result<(), StoreError>;
}

impl<T: ItemExchange + ?Sized> ItemExchange for &T {
    fn get_items(&self) -> Vec<SavedItem> {
        (**self).get_items()
    }

    fn set_items(&self, items: &[SavedItem]) -> Result<(), StoreError> {
        (**self).set_items(items)
    }
}
