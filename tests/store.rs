use emstencil::import::{import_rows, ImportOptions, ImportRow};
use emstencil::models::TemplateState;
use emstencil::{StoreError, Tag, Template, TemplateStore};
use pretty_assertions::assert_eq;

fn tag_texts(tags: &[Tag]) -> Vec<&str> {
    tags.iter().map(Tag::text).collect()
}

fn stored_tags(store: &TemplateStore) -> Vec<String> {
    store
        .fetch_all_tags()
        .unwrap()
        .iter()
        .map(|tag| tag.text().to_string())
        .collect()
}

fn seeded() -> TemplateStore {
    let mut store = TemplateStore::open_in_memory().unwrap();
    for (title, body, tags) in [
        ("Welcome", "Hello ${Name}, welcome to ${team}.", "work, urgent"),
        ("Follow up", "Any news on ${topic}?", "work"),
        ("Thanks", "Thank you!", ""),
    ] {
        let mut template = Template::new(title, body).with_tags(tags);
        store.add_template(&mut template).unwrap();
    }
    store
}

#[test]
fn test_add_assigns_ids_and_state() {
    let mut store = TemplateStore::open_in_memory().unwrap();
    let mut template = Template::new("Hi", "Hi ${who}").with_tags("Work");
    assert_eq!(template.state(), TemplateState::New);

    store.add_template(&mut template).unwrap();
    assert_eq!(template.id(), Some(1));
    assert_eq!(template.state(), TemplateState::Existing);
    assert!(template.tags()[0].id().is_some());
    assert_eq!(template.tags()[0].assoc_id(), Some(1));
}

#[test]
fn test_fetch_all_templates_in_insertion_order() {
    let store = seeded();
    let templates = store.fetch_all_templates_with_tags().unwrap();
    let titles: Vec<&str> = templates.iter().map(Template::title).collect();
    assert_eq!(titles, vec!["Welcome", "Follow up", "Thanks"]);
    assert_eq!(tag_texts(templates[0].tags()), vec!["urgent", "work"]);
    assert!(templates[2].tags().is_empty());
    assert_eq!(templates[0].number_of_fields(), 2);
}

#[test]
fn test_fetch_templates_for_tag_normalizes_input() {
    let store = seeded();
    let templates = store.fetch_templates_for_tag(" WORK ").unwrap();
    let titles: Vec<&str> = templates.iter().map(Template::title).collect();
    assert_eq!(titles, vec!["Welcome", "Follow up"]);
    assert!(store.fetch_templates_for_tag("missing").unwrap().is_empty());
}

#[test]
fn test_metadata_requires_identifier() {
    let store = seeded();
    let mut unsaved = Template::new("Draft", "text");
    let err = store.fetch_metadata_for_template(&mut unsaved).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::MissingIdentifier)
    ));
}

#[test]
fn test_delete_removes_orphaned_tags_only() {
    let mut store = seeded();
    let mut welcome = store.fetch_template(1).unwrap().unwrap();
    store.delete_template(&mut welcome).unwrap();

    assert_eq!(welcome.state(), TemplateState::Deleted);
    assert!(store.fetch_template(1).unwrap().is_none());
    assert_eq!(stored_tags(&store), vec!["work".to_string()]);

    let err = store.delete_template(&mut welcome).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound)
    ));
}

#[test]
fn test_duplicate_tags_collapse() {
    let mut store = TemplateStore::open_in_memory().unwrap();
    let mut template = Template::new("T", "body").with_tags("Work, work ,URGENT");
    store.add_template(&mut template).unwrap();

    let fetched = store.fetch_template(1).unwrap().unwrap();
    assert_eq!(tag_texts(fetched.tags()), vec!["urgent", "work"]);
    assert_eq!(
        stored_tags(&store),
        vec!["urgent".to_string(), "work".to_string()]
    );
}

#[test]
fn test_update_relinks_tags_and_content() {
    let mut store = seeded();
    let mut welcome = store.fetch_template(1).unwrap().unwrap();
    welcome.update_content("Welcome aboard", "Hello ${Name}!");
    welcome.set_tags(Tag::parse_list("onboarding"));
    assert_eq!(welcome.state(), TemplateState::Modified);

    store.update_template(&mut welcome).unwrap();
    assert_eq!(welcome.state(), TemplateState::Existing);

    let fetched = store.fetch_template(1).unwrap().unwrap();
    assert_eq!(fetched.title(), "Welcome aboard");
    assert_eq!(fetched.number_of_fields(), 1);
    assert_eq!(tag_texts(fetched.tags()), vec!["onboarding"]);
    assert_eq!(
        stored_tags(&store),
        vec!["onboarding".to_string(), "work".to_string()]
    );
}

#[test]
fn test_update_without_identifier_fails() {
    let mut store = seeded();
    let mut unsaved = Template::new("Draft", "text");
    let err = store.update_template(&mut unsaved).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::MissingIdentifier)
    ));
}

#[test]
fn test_closed_store_rejects_operations() {
    let mut store = seeded();
    store.close().unwrap();
    assert!(!store.is_open());
    store.close().unwrap();

    let err = store.fetch_all_templates().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Closed)
    ));
    let mut template = Template::new("Late", "body");
    assert!(store.add_template(&mut template).is_err());
}

#[test]
fn test_import_rows_reports_counts() {
    let mut store = seeded();
    let rows = vec![
        ImportRow::new("Invoice", "Invoice ${number} attached", "Billing, work"),
        ImportRow::new("Reminder", "Reminder about ${number}", "billing"),
    ];
    let summary = import_rows(&mut store, &rows, &ImportOptions::default()).unwrap();

    assert!(summary.succeeded());
    assert_eq!(summary.templates, 2);
    assert_eq!(summary.tags, 2);
    assert_eq!(summary.links, 3);
    assert_eq!(store.fetch_all_templates().unwrap().len(), 5);
    assert_eq!(store.fetch_templates_for_tag("billing").unwrap().len(), 2);
    assert_eq!(store.fetch_templates_for_tag("work").unwrap().len(), 3);
}

#[test]
fn test_import_rows_replace_clears_store() {
    let mut store = seeded();
    let rows = vec![ImportRow::new("Only", "One body", "")];
    let summary = import_rows(
        &mut store,
        &rows,
        &ImportOptions {
            replace: true,
            ..ImportOptions::default()
        },
    )
    .unwrap();

    assert_eq!(summary.tags, 0);
    let titles: Vec<String> = store
        .fetch_all_templates()
        .unwrap()
        .iter()
        .map(|template| template.title().to_string())
        .collect();
    assert_eq!(titles, vec!["Only".to_string()]);
    assert!(stored_tags(&store).is_empty());
}

#[test]
fn test_repeated_row_tags_count_one_link() {
    let mut store = TemplateStore::open_in_memory().unwrap();
    let mut row = ImportRow::new("Invoice", "Invoice ${number}", "work");
    row.tags.push(Tag::new("WORK"));
    let summary = import_rows(&mut store, &[row], &ImportOptions::default()).unwrap();

    assert_eq!(summary.tags, 1);
    assert_eq!(summary.links, 1);
    let template = store.fetch_template(1).unwrap().unwrap();
    assert_eq!(tag_texts(template.tags()), vec!["work"]);
}

#[test]
fn test_empty_import_is_not_success() {
    let mut store = TemplateStore::open_in_memory().unwrap();
    let summary = import_rows(&mut store, &[], &ImportOptions::default()).unwrap();
    assert!(!summary.succeeded());
}

#[test]
fn test_open_on_disk_reuses_database() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("templates.db");

    let mut store = TemplateStore::open(&path, None).unwrap();
    let mut template = Template::new("Kept", "body").with_tags("x");
    store.add_template(&mut template).unwrap();
    store.close().unwrap();

    let store = TemplateStore::open(&path, None).unwrap();
    let templates = store.fetch_all_templates_with_tags().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(tag_texts(templates[0].tags()), vec!["x"]);
}

#[test]
fn test_missing_schema_file_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let schema = tmp.path().join("absent.sql");
    let err = TemplateStore::open(&tmp.path().join("templates.db"), Some(&schema)).unwrap_err();
    match err.downcast_ref::<StoreError>() {
        Some(StoreError::SchemaSourceMissing { path }) => assert_eq!(path, &schema),
        other => panic!("unexpected error: {other:?}"),
    }
}
