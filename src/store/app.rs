use std::path::PathBuf;

use super::{ItemExchange, StoreError};
use crate::constants::APP_ITEMS_KEY;
use crate::items::{self, SavedItem};
use crate::prefs::{Locked, Preferences};

/// The application's authoritative copy of the item list.
///
/// Writes land here first and are then mirrored to the service-side
/// namespace through `exchange`. The service never writes back, so the two
/// only ever converge in one direction.
pub struct AppItemStore<E> {
    prefs: Preferences,
    exchange: E,
}

impl<E: ItemExchange> AppItemStore<E> {
    pub fn open(path: impl Into<PathBuf>, exchange: E) -> Self {
        Self {
            prefs: Preferences::open(path),
            exchange,
        }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Reads the list. An empty namespace (first run, reinstall) is seeded
    /// from the service side and written back to both.
    pub fn load(&self) -> Result<Vec<SavedItem>, StoreError> {
        self.prefs.locked(|locked| self.load_locked(locked))
    }

    /// Sanitizes and persists `list`, application namespace first.
    ///
    /// Returns what was stored.
    pub fn save(&self, list: Vec<SavedItem>) -> Result<Vec<SavedItem>, StoreError> {
        self.prefs.locked(|locked| self.save_locked(locked, list))
    }

    /// Re-saves the current list so a stale service replica catches up.
    pub fn resync(&self) -> Result<Vec<SavedItem>, StoreError> {
        self.prefs.locked(|locked| {
            let current = self.load_locked(locked)?;
            self.save_locked(locked, current)
        })
    }

    pub fn add(&self, label: &str, value: &str) -> Result<SavedItem, StoreError> {
        self.prefs.locked(|locked| {
            let mut list = self.load_locked(locked)?;
            let created = items::insert_front(&mut list, label, value)?;
            self.save_locked(locked, list)?;
            Ok(created)
        })
    }

    pub fn update(&self, id: &str, label: &str, value: &str) -> Result<(), StoreError> {
        self.prefs.locked(|locked| {
            let mut list = self.load_locked(locked)?;
            items::replace(&mut list, id, label, value)?;
            self.save_locked(locked, list)?;
            Ok(())
        })
    }

    /// Returns false when no item had `id`.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.prefs.locked(|locked| {
            let mut list = self.load_locked(locked)?;
            let before = list.len();
            list.retain(|item| item.id != id);
            if list.len() == before {
                return Ok(false);
            }
            self.save_locked(locked, list)?;
            Ok(true)
        })
    }

    fn load_locked(&self, locked: &Locked<'_>) -> Result<Vec<SavedItem>, StoreError> {
        // an empty string counts as never written
        let raw = locked.get_string(APP_ITEMS_KEY);
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            let seeded = items::sanitize(self.exchange.get_items());
            if !seeded.is_empty() {
                tracing::info!(
                    count = seeded.len(),
                    "seeding application items from service store"
                );
                return self.save_locked(locked, seeded);
            }
            return Ok(seeded);
        };
        match items::parse(&raw) {
            Ok(parsed) => Ok(items::sanitize(parsed)),
            Err(err) => {
                tracing::warn!("application items are corrupt, showing none: {err}");
                Ok(Vec::new())
            }
        }
    }

    fn save_locked(
        &self,
        locked: &Locked<'_>,
        list: Vec<SavedItem>,
    ) -> Result<Vec<SavedItem>, StoreError> {
        let cleaned = items::sanitize(list);
        locked
            .edit()
            .put_string(APP_ITEMS_KEY, items::serialize(&cleaned))
            .commit()?;
        self.exchange.set_items(&cleaned)?;
        Ok(cleaned)
    }
}
