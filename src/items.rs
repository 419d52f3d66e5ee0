//! Saved label/value records and the rules every stored list obeys.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MAX_ITEMS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    pub id: String,
    pub label: String,
    pub value: String,
}

impl SavedItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn with_id(
        id: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value: value.into(),
        }
    }

    /// True when both fields are blank after trimming.
    pub fn is_blank(&self) -> bool {
        self.label.trim().is_empty() && self.value.trim().is_empty()
    }

    /// Text placed on the clipboard when the item is picked.
    pub fn clip_text(&self) -> &str {
        if self.value.trim().is_empty() {
            &self.label
        } else {
            &self.value
        }
    }

    /// Label shown in lists; `index` is the item's position.
    pub fn display_label(&self, index: usize) -> String {
        if self.label.trim().is_empty() {
            format!("Item {}", index + 1)
        } else {
            self.label.clone()
        }
    }

    /// One-line row text: `label: value`, or the label alone.
    pub fn display(&self, index: usize) -> String {
        let label = self.display_label(index);
        if self.value.trim().is_empty() {
            label
        } else {
            format!("{label}: {}", self.value)
        }
    }
}

/// Shape accepted on the wire. Every field is optional so foreign writers
/// that omit `id` (or both text fields) still parse.
#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Error)]
pub enum ItemsError {
    #[error("items payload is not a JSON array of objects: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemEditError {
    #[error("you can store up to {MAX_ITEMS} items")]
    LimitReached,
    #[error("enter a label or a value")]
    Empty,
    #[error("no item with id {0:?}")]
    NotFound(String),
}

/// Trims both fields, drops entries that end up blank and caps the list at
/// [`MAX_ITEMS`]. Survivors keep their relative order.
pub fn sanitize(items: impl IntoIterator<Item = SavedItem>) -> Vec<SavedItem> {
    items
        .into_iter()
        .map(|item| SavedItem {
            id: item.id,
            label: item.label.trim().to_owned(),
            value: item.value.trim().to_owned(),
        })
        .filter(|item| !item.label.is_empty() || !item.value.is_empty())
        .take(MAX_ITEMS)
        .collect()
}

/// Parses a serialized array. Entries without an id are given a fresh one.
/// The result is not sanitized.
pub fn parse(raw: &str) -> Result<Vec<SavedItem>, ItemsError> {
    let wire: Vec<WireItem> = serde_json::from_str(raw)?;
    Ok(wire
        .into_iter()
        .map(|w| SavedItem {
            id: w.id.filter(|id| !id.is_empty()).unwrap_or_else(new_id),
            label: w.label.unwrap_or_default(),
            value: w.value.unwrap_or_default(),
        })
        .collect())
}

pub fn serialize(items: &[SavedItem]) -> String {
    // A Vec of plain string structs cannot fail to encode.
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_owned())
}

/// `<unix millis>_<random hex>`, unique within and across processes.
pub fn new_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(millis);
    hasher.write_u64(COUNTER.fetch_add(1, Ordering::Relaxed));
    hasher.write_u32(std::process::id());
    format!("{millis}_{:x}", hasher.finish())
}

/// Prepends a new item, as the editor does for freshly created entries.
pub fn insert_front(
    items: &mut Vec<SavedItem>,
    label: &str,
    value: &str,
) -> Result<SavedItem, ItemEditError> {
    if items.len() >= MAX_ITEMS {
        return Err(ItemEditError::LimitReached);
    }
    let item = SavedItem::new(label.trim(), value.trim());
    if item.is_blank() {
        return Err(ItemEditError::Empty);
    }
    items.insert(0, item.clone());
    Ok(item)
}

/// Replaces an item's text in place; its position is unchanged.
pub fn replace(
    items: &mut [SavedItem],
    id: &str,
    label: &str,
    value: &str,
) -> Result<(), ItemEditError> {
    let (label, value) = (label.trim(), value.trim());
    if label.is_empty() && value.is_empty() {
        return Err(ItemEditError::Empty);
    }
    let slot = items
        .iter_mut()
        .find(|item| item.id == id)
        .ok_or_else(|| ItemEditError::NotFound(id.to_owned()))?;
    slot.label = label.to_owned();
    slot.value = value.to_owned();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, label: &str, value: &str) -> SavedItem {
        SavedItem::with_id(id, label, value)
    }

    #[test]
    fn sanitize_trims_and_drops_blank_entries() {
        let out = sanitize(vec![
            item("1", "  Wifi ", " pass123 "),
            item("2", "   ", "\t"),
            item("3", "", "only value"),
            item("4", "only label", ""),
        ]);
        assert_eq!(
            out,
            vec![
                item("1", "Wifi", "pass123"),
                item("3", "", "only value"),
                item("4", "only label", ""),
            ]
        );
    }

    #[test]
    fn sanitize_caps_length_and_keeps_order() {
        let input: Vec<_> = (0..80)
            .map(|i| {
                if i % 3 == 0 {
                    item(&i.to_string(), "", " ")
                } else {
                    item(&i.to_string(), &format!("l{i}"), "")
                }
            })
            .collect();
        let out = sanitize(input);
        assert_eq!(out.len(), MAX_ITEMS);
        let ids: Vec<usize> = out.iter().map(|i| i.id.parse().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|i| i % 3 != 0));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let items = vec![
            item("a", " x ", ""),
            item("b", "", ""),
            item("c", "y", " z"),
        ];
        let once = sanitize(items);
        let twice = sanitize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn parse_assigns_missing_ids_and_defaults_fields() {
        let raw = r#"[{"label":"A"},{"id":"","value":"v"},{"id":"k","label":"L","value":"V"}]"#;
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(!parsed[0].id.is_empty());
        assert_eq!(parsed[0].value, "");
        assert!(!parsed[1].id.is_empty());
        assert_eq!(parsed[2], item("k", "L", "V"));
    }

    #[test]
    fn parse_rejects_non_arrays_and_wrong_types() {
        assert!(parse("{}").is_err());
        assert!(parse("not json").is_err());
        assert!(parse("[1, 2]").is_err());
        assert!(parse(r#"[{"label": 5}]"#).is_err());
        assert!(parse("[]").unwrap().is_empty());
    }

    #[test]
    fn display_and_clip_text() {
        let full = item("1", "Wifi", "pass123");
        assert_eq!(full.display(0), "Wifi: pass123");
        assert_eq!(full.clip_text(), "pass123");

        let label_only = item("2", "Just label", "  ");
        assert_eq!(label_only.display(1), "Just label");
        assert_eq!(label_only.clip_text(), "Just label");

        let value_only = item("3", "", "secret");
        assert_eq!(value_only.display(2), "Item 3: secret");
        assert_eq!(value_only.clip_text(), "secret");
    }

    #[test]
    fn ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(a.contains('_'));
    }

    #[test]
    fn insert_front_prepends_and_enforces_rules() {
        let mut items = vec![item("old", "Old", "")];
        let created = insert_front(&mut items, " New ", " v ").unwrap();
        assert_eq!(items[0], created);
        assert_eq!(items[0].label, "New");
        assert_eq!(items[1].id, "old");

        assert_eq!(insert_front(&mut items, " ", ""), Err(ItemEditError::Empty));

        let mut full: Vec<_> = (0..MAX_ITEMS)
            .map(|i| item(&i.to_string(), "x", ""))
            .collect();
        assert_eq!(
            insert_front(&mut full, "y", ""),
            Err(ItemEditError::LimitReached)
        );
    }

    #[test]
    fn replace_keeps_position() {
        let mut items = vec![item("a", "A", ""), item("b", "B", ""), item("c", "C", "")];
        replace(&mut items, "b", "B2", " val ").unwrap();
        assert_eq!(items[1], item("b", "B2", "val"));
        assert_eq!(
            replace(&mut items, "zz", "x", ""),
            Err(ItemEditError::NotFound("zz".into()))
        );
        assert_eq!(replace(&mut items, "a", "", ""), Err(ItemEditError::Empty));
    }
}
