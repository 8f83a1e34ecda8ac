use manos_blocks_core::{
    ARTICLE_VERSION, Article, Document, DocumentStore, Editor, ElementKind, JsonDirStore, Node,
    StoreError,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn article(title: &str) -> Article {
    Article::new(
        title,
        Document {
            children: vec![
                Node::element(ElementKind::heading(1), vec![Node::text(title)]),
                Node::paragraph("body"),
            ],
        },
    )
}

#[test]
fn saved_articles_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path().join(".articles"));

    assert_eq!(store.list().unwrap(), Vec::<String>::new());
    store.save("second", &article("Two")).unwrap();
    store.save("first", &article("One")).unwrap();

    assert_eq!(store.list().unwrap(), vec!["first", "second"]);
    assert_eq!(store.load("first").unwrap(), article("One"));
    assert!(store.root().join("second.json").is_file());
}

#[test]
fn saving_twice_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());

    store.save("a", &article("Old")).unwrap();
    store.save("a", &article("New")).unwrap();
    assert_eq!(store.load("a").unwrap().title, "New");
    assert_eq!(store.list().unwrap(), vec!["a"]);
}

#[test]
fn missing_article_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());
    assert!(matches!(store.load("nope"), Err(StoreError::NotFound(id)) if id == "nope"));
}

#[rstest]
#[case("")]
#[case("..")]
#[case("a/b")]
#[case(".hidden")]
fn path_like_ids_are_refused(#[case] id: &str) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());
    assert!(matches!(
        store.save(id, &article("x")),
        Err(StoreError::InvalidId(_))
    ));
}

#[test]
fn malformed_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{").unwrap();
    let store = JsonDirStore::new(dir.path());
    assert!(matches!(
        store.load("broken"),
        Err(StoreError::Malformed { .. })
    ));
}

#[test]
fn article_json_uses_blocks_and_defaults() {
    let json = article("T").to_json_pretty().unwrap();
    assert!(json.contains("\"blocks\""));
    assert!(json.contains("\"manos-blocks\""));

    let parsed = Article::from_json_str(r#"{"blocks": {"children": []}}"#).unwrap();
    assert_eq!(parsed.schema, "manos-blocks");
    assert_eq!(parsed.version, 1);
    assert!(parsed.into_document().children.is_empty());
}

#[test]
fn newer_versions_are_refused_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());
    let mut future = article("Later");
    future.version = ARTICLE_VERSION + 1;
    store.save("later", &future).unwrap();

    assert!(matches!(
        store.load("later"),
        Err(StoreError::Unsupported { version, .. }) if version == ARTICLE_VERSION + 1
    ));
}

#[test]
fn editor_contents_survive_a_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());
    let mut editor = Editor::empty();
    editor.insert_text("## ");
    editor.insert_text("Notes");

    store
        .save("notes", &Article::from_editor("Notes", &editor))
        .unwrap();
    let reopened = store.load("notes").unwrap().into_editor();
    assert_eq!(reopened.doc(), editor.doc());
    assert_eq!(
        reopened.doc().children,
        vec![Node::element(ElementKind::heading(2), vec![Node::text("Notes")])]
    );
}
