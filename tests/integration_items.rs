use indoc::indoc;

use popup_overlay::items::{ItemEditError, SavedItem};
use popup_overlay::store::{AppItemStore, ServiceStore, StoreError};

fn stores(dir: &tempfile::TempDir) -> (ServiceStore, AppItemStore<ServiceStore>) {
    let service = ServiceStore::open(dir.path().join("overlay_prefs.json"));
    let app = AppItemStore::open(dir.path().join("app_prefs.json"), service.clone());
    (service, app)
}

#[test]
fn exchange_accepts_foreign_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = stores(&dir);
    service
        .set_items_json(indoc! {r#"
            [
                {"id": "1", "label": "Wifi", "value": "pass123"},
                {"label": "   ", "value": ""},
                {"label": "Address"}
            ]
        "#})
        .unwrap();

    let items = service.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], SavedItem::with_id("1", "Wifi", "pass123"));
    assert_eq!(items[1].label, "Address");
    assert!(!items[1].id.is_empty());
}

#[test]
fn malformed_payload_keeps_previous_items() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = stores(&dir);
    service
        .set_items_json(r#"[{"id":"1","label":"A","value":"x"}]"#)
        .unwrap();
    let err = service.set_items_json("{not json").unwrap_err();
    assert!(matches!(err, StoreError::MalformedPayload(_)));
    assert_eq!(service.items(), vec![SavedItem::with_id("1", "A", "x")]);
}

#[test]
fn application_seeds_from_service_once() {
    let dir = tempfile::tempdir().unwrap();
    let (service, app) = stores(&dir);
    service
        .write_items(&[SavedItem::with_id("a", "Email", "me@example.com")])
        .unwrap();

    let loaded = app.load().unwrap();
    let email = SavedItem::with_id("a", "Email", "me@example.com");
    assert_eq!(loaded, vec![email]);

    // the application copy now wins; a service-side rewrite is not pulled back
    service.write_items(&[]).unwrap();
    assert_eq!(app.load().unwrap().len(), 1);
    assert_eq!(app.resync().unwrap().len(), 1);
    assert_eq!(service.items().len(), 1);
}

#[test]
fn edits_are_mirrored_to_the_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let (service, app) = stores(&dir);

    let first = app.add("Wifi", "pass123").unwrap();
    let second = app.add(" Door ", " 4321 ").unwrap();
    assert_eq!(second.label, "Door");

    let replica = service.items();
    assert_eq!(
        replica.iter().map(|i| i.label.as_str()).collect::<Vec<_>>(),
        vec!["Door", "Wifi"]
    );

    app.update(&first.id, "Home wifi", "pass456").unwrap();
    let replica = service.items();
    assert_eq!(replica[1].label, "Home wifi");
    assert_eq!(replica[1].id, first.id);

    assert!(app.remove(&second.id).unwrap());
    assert!(!app.remove(&second.id).unwrap());
    assert_eq!(service.items().len(), 1);
}

#[test]
fn editor_rejects_blank_and_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let (_, app) = stores(&dir);
    assert!(matches!(
        app.add("  ", ""),
        Err(StoreError::Edit(ItemEditError::Empty))
    ));

    let full: Vec<SavedItem> = (0..50)
        .map(|i| SavedItem::with_id(i.to_string(), format!("L{i}"), "v"))
        .collect();
    app.save(full).unwrap();
    assert!(matches!(
        app.add("one more", "v"),
        Err(StoreError::Edit(ItemEditError::LimitReached))
    ));
    assert!(matches!(
        app.update("missing", "a", "b"),
        Err(StoreError::Edit(ItemEditError::NotFound(_)))
    ));
}

#[test]
fn corrupt_service_namespace_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlay_prefs.json");
    std::fs::write(&path, r#"{"items_json": "[{oops"}"#).unwrap();
    let service = ServiceStore::open(&path);
    assert!(service.items().is_empty());
    assert_eq!(service.items_json(), "[]");
    assert!(!service.enabled());
}

#[test]
fn exchange_examples() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = stores(&dir);
    service
        .set_items_json(r#"[{"id":"1","label":"Wifi","value":"pass123"}]"#)
        .unwrap();
    let wifi = SavedItem::with_id("1", "Wifi", "pass123");
    assert_eq!(service.items(), vec![wifi]);

    let blank = r#"[{"label":"","value":""}]"#;
    service.set_items_json(blank).unwrap();
    assert!(service.items().is_empty());
    assert_eq!(service.items_json(), "[]");
}
