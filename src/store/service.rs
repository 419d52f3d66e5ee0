use std::path::PathBuf;

use super::{ItemExchange, StoreError};
use crate::constants::{KEY_ITEMS_JSON, KEY_OVERLAY_ENABLED};
use crate::items::{self, SavedItem};
use crate::prefs::Preferences;

/// Service-side namespace: the serialized item list plus the enablement flag.
///
/// The background host only ever calls the read half of this type.
#[derive(Debug, Clone)]
pub struct ServiceStore {
    prefs: Preferences,
}

impl ServiceStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            prefs: Preferences::open(path),
        }
    }

    /// Sanitized items; anything unreadable yields an empty list.
    pub fn items(&self) -> Vec<SavedItem> {
        let raw = self
            .prefs
            .get_string(KEY_ITEMS_JSON)
            .unwrap_or_else(|| "[]".to_owned());
        match items::parse(&raw) {
            Ok(parsed) => items::sanitize(parsed),
            Err(err) => {
                tracing::warn!("stored overlay items are corrupt, showing none: {err}");
                Vec::new()
            }
        }
    }

    /// The stored array as text, or `[]` when the stored value is not a
    /// well-formed array.
    pub fn items_json(&self) -> String {
        match self.prefs.get_string(KEY_ITEMS_JSON) {
            Some(raw) if items::parse(&raw).is_ok() => raw,
            _ => "[]".to_owned(),
        }
    }

    /// Validates and stores a serialized array. Nothing is written when the
    /// payload is malformed.
    pub fn set_items_json(&self, raw: &str) -> Result<(), StoreError> {
        let parsed = items::parse(raw)?;
        self.write_items(&items::sanitize(parsed))
    }

    pub fn write_items(&self, list: &[SavedItem]) -> Result<(), StoreError> {
        let cleaned = items::sanitize(list.iter().cloned());
        self.prefs
            .edit()
            .put_string(KEY_ITEMS_JSON, items::serialize(&cleaned))
            .commit()?;
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.prefs.get_bool(KEY_OVERLAY_ENABLED, false)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.prefs
            .edit()
            .put_bool(KEY_OVERLAY_ENABLED, enabled)
            .commit()?;
        Ok(())
    }
}

impl ItemExchange for ServiceStore {
    fn get_items(&self) -> Vec<SavedItem> {
        self.items()
    }

    fn set_items(&self, items: &[SavedItem]) -> Result<(), StoreError> {
        self.write_items(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn set_then_get_round_trips_example() {
        let dir = tempdir().unwrap();
        let store = ServiceStore::open(dir.path().join("overlay_prefs.json"));
        store
            .set_items_json(r#"[{"id":"1","label":"Wifi","value":"pass123"}]"#)
            .unwrap();
        assert_eq!(
            store.items(),
            vec![SavedItem::with_id("1", "Wifi", "pass123")]
        );
    }

    #[test]
    fn blank_entries_are_dropped() {
        let dir = tempdir().unwrap();
        let store = ServiceStore::open(dir.path().join("overlay_prefs.json"));
        let blank = r#"[{"label":"","value":""}]"#;
        store.set_items_json(blank).unwrap();
        assert!(store.items().is_empty());
    }

    #[test]
    fn malformed_payload_is_rejected_and_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        let store = ServiceStore::open(dir.path().join("overlay_prefs.json"));
        store
            .write_items(&[SavedItem::with_id("1", "keep", "me")])
            .unwrap();
        for bad in ["{\"label\":\"x\"}", "nope", "[1]", ""] {
            let err = store.set_items_json(bad).unwrap_err();
            assert!(matches!(err, StoreError::MalformedPayload(_)), "{bad}");
        }
        assert_eq!(store.items(), vec![SavedItem::with_id("1", "keep", "me")]);
    }

    #[test]
    fn corrupt_stored_items_read_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overlay_prefs.json");
        fs::write(&path, r#"{"items_json":"[{oops","overlay_enabled":true}"#).unwrap();
        let store = ServiceStore::open(&path);
        assert!(store.items().is_empty());
        assert_eq!(store.items_json(), "[]");
        // the flag in the same namespace is still readable
        assert!(store.enabled());
    }

    #[test]
    fn enablement_flag_defaults_off_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overlay_prefs.json");
        let store = ServiceStore::open(&path);
        assert!(!store.enabled());
        store.set_enabled(true).unwrap();
        assert!(ServiceStore::open(&path).enabled());
        store.set_enabled(false).unwrap();
        assert!(!store.enabled());
    }

    #[test]
    fn flag_and_items_written_concurrently_both_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overlay_prefs.json");
        let flag = ServiceStore::open(&path);
        let items = ServiceStore::open(&path);
        let item = SavedItem::with_id("x", "X", "");

        let flagger = std::thread::spawn(move || {
            for _ in 0..50 {
                flag.set_enabled(true).unwrap();
            }
        });
        let expected = item.clone();
        let writer = std::thread::spawn(move || {
            for _ in 0..50 {
                items.write_items(std::slice::from_ref(&expected)).unwrap();
            }
        });
        flagger.join().unwrap();
        writer.join().unwrap();

        let store = ServiceStore::open(&path);
        assert!(store.enabled());
        assert_eq!(store.items(), vec![item]);
    }
}
