use manos_blocks_core::{
    ClipboardData, Document, Editor, ElementKind, Node, Point, Selection,
};
use pretty_assertions::assert_eq;

fn editor_at(children: Vec<Node>, caret: (Vec<usize>, usize)) -> Editor {
    let selection = Selection::collapsed(Point::new(caret.0, caret.1));
    Editor::new(Document { children }, Some(selection))
}

fn item(text: &str) -> Node {
    Node::element(ElementKind::ListItem, vec![Node::text(text)])
}

fn bullets(items: Vec<Node>) -> Node {
    Node::element(ElementKind::BulletList, items)
}

fn heading(level: u8, text: &str) -> Node {
    Node::element(ElementKind::heading(level), vec![Node::text(text)])
}

fn caret(editor: &Editor) -> (Vec<usize>, usize) {
    let focus = &editor.selection().expect("caret").focus;
    (focus.path.clone(), focus.offset)
}

#[test]
fn bullet_list_replaces_an_empty_paragraph() {
    let mut editor = Editor::empty();
    assert!(editor.change_or_insert_block(&ElementKind::BulletList));

    assert_eq!(editor.doc().children, vec![bullets(vec![item("")])]);
    assert_eq!(caret(&editor), (vec![0, 0, 0], 0));
}

#[test]
fn block_is_inserted_after_a_non_empty_one() {
    let mut editor = editor_at(vec![Node::paragraph("a")], (vec![0, 0], 1));
    assert!(editor.change_or_insert_block(&ElementKind::heading(2)));

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), heading(2, "")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 0));
}

#[test]
fn block_that_cannot_live_in_a_list_goes_after_it() {
    let mut editor = editor_at(vec![bullets(vec![item("x")])], (vec![0, 0, 0], 1));
    assert!(editor.change_or_insert_block(&ElementKind::heading(1)));

    assert_eq!(
        editor.doc().children,
        vec![bullets(vec![item("x")]), heading(1, "")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 0));
}

#[test]
fn container_block_is_inserted_with_its_child() {
    let mut editor = editor_at(vec![Node::paragraph("a")], (vec![0, 0], 0));
    assert!(editor.insert_container_block(&ElementKind::code("rust"), None));
    assert!(!editor.insert_container_block(&ElementKind::Paragraph, None));

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("a"),
            Node::element(
                ElementKind::code("rust"),
                vec![Node::element(ElementKind::CodeLine, vec![Node::text("")])],
            ),
        ]
    );
    assert_eq!(caret(&editor), (vec![1, 0, 0], 0));
}

#[test]
fn insert_without_caret_appends() {
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("a")],
        },
        None,
    );
    assert!(editor.insert_block(&ElementKind::Blockquote, None));
    assert_eq!(editor.doc().children.len(), 2);
    assert_eq!(
        editor.doc().children[1],
        Node::element(ElementKind::Blockquote, vec![Node::text("")])
    );
}

#[test]
fn paragraph_becomes_code_in_place() {
    let mut editor = editor_at(vec![Node::paragraph("let")], (vec![0, 0], 3));
    assert!(editor.change_block_type(&ElementKind::code("tsx")));

    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            ElementKind::code("tsx"),
            vec![Node::element(ElementKind::CodeLine, vec![Node::text("let")])],
        )]
    );
    assert_eq!(caret(&editor), (vec![0, 0, 0], 3));
}

#[test]
fn reset_lifts_a_list_item_out() {
    let mut editor = editor_at(vec![bullets(vec![item("a"), item("b")])], (vec![0, 1, 0], 1));
    assert!(editor.reset_current_element());

    assert_eq!(
        editor.doc().children,
        vec![bullets(vec![item("a")]), Node::paragraph("b")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 1));
}

#[test]
fn break_mid_paragraph_puts_an_empty_paragraph_between_the_halves() {
    let mut editor = editor_at(vec![Node::paragraph("hello")], (vec![0, 0], 2));
    assert!(editor.insert_break());

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("he"),
            Node::paragraph(""),
            Node::paragraph("llo")
        ]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 0));
}

#[test]
fn break_at_heading_start_keeps_the_heading() {
    let mut editor = editor_at(vec![heading(1, "Title")], (vec![0, 0], 0));
    assert!(editor.insert_break());

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph(""), heading(1, "Title")]
    );
    assert_eq!(caret(&editor), (vec![0, 0], 0));
}

#[test]
fn break_mid_heading_keeps_both_halves_headings() {
    let mut editor = editor_at(vec![heading(2, "abcd")], (vec![0, 0], 2));
    assert!(editor.insert_break());

    assert_eq!(
        editor.doc().children,
        vec![heading(2, "ab"), Node::paragraph(""), heading(2, "cd")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 0));
}

#[test]
fn break_after_a_heading_starts_a_paragraph() {
    let mut editor = editor_at(vec![heading(1, "Title")], (vec![0, 0], 5));
    assert!(editor.insert_break());

    assert_eq!(
        editor.doc().children,
        vec![heading(1, "Title"), Node::paragraph("")]
    );
}

#[test]
fn break_in_a_list_item_adds_an_item() {
    let mut editor = editor_at(vec![bullets(vec![item("ab")])], (vec![0, 0, 0], 1));
    assert!(editor.insert_break());

    assert_eq!(editor.doc().children, vec![bullets(vec![item("a"), item("b")])]);
    assert_eq!(caret(&editor), (vec![0, 1, 0], 0));
}

#[test]
fn soft_break_in_a_list_leaves_the_list() {
    let mut editor = editor_at(vec![bullets(vec![item("ab")])], (vec![0, 0, 0], 1));
    assert!(editor.insert_soft_break());

    assert_eq!(
        editor.doc().children,
        vec![bullets(vec![item("a")]), Node::paragraph("b")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 0));
}

#[test]
fn soft_break_in_a_paragraph_inserts_a_newline() {
    let mut editor = editor_at(vec![Node::paragraph("ab")], (vec![0, 0], 1));
    assert!(editor.insert_soft_break());
    assert_eq!(editor.doc().children, vec![Node::paragraph("a\nb")]);
}

#[test]
fn backspace_in_an_empty_item_resets_it() {
    let mut editor = editor_at(vec![bullets(vec![item("a"), item("")])], (vec![0, 1, 0], 0));
    assert!(editor.delete_backward());

    assert_eq!(
        editor.doc().children,
        vec![bullets(vec![item("a")]), Node::paragraph("")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 0));
}

#[test]
fn backspace_at_block_start_merges() {
    let mut editor = editor_at(
        vec![Node::paragraph("a"), Node::paragraph("b")],
        (vec![1, 0], 0),
    );
    assert!(editor.delete_backward());

    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(caret(&editor), (vec![0, 0], 1));
}

#[test]
fn backspace_removes_one_character() {
    let mut editor = editor_at(vec![Node::paragraph("héllo")], (vec![0, 0], 3));
    assert!(editor.delete_backward());
    assert_eq!(editor.doc().children, vec![Node::paragraph("hllo")]);
    assert_eq!(caret(&editor), (vec![0, 0], 1));
}

#[test]
fn tab_inserts_two_spaces() {
    let mut editor = editor_at(vec![Node::paragraph("a")], (vec![0, 0], 0));
    assert!(editor.insert_tab());
    assert_eq!(editor.doc().children, vec![Node::paragraph("  a")]);
}

#[test]
fn select_by_path_picks_selectable_descendants() {
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("p"), bullets(vec![item("a"), item("b")])],
        },
        None,
    );
    assert!(editor.select_by_path(&[1]));
    let selected: Vec<Vec<usize>> = editor.block_selection().paths().cloned().collect();
    assert_eq!(selected, vec![vec![1, 0], vec![1, 1]]);

    assert!(editor.deselect_by_path(&[1, 0]));
    assert!(!editor.block_selection().contains(&[1, 0]));

    editor.select_all();
    assert_eq!(editor.block_selection().len(), 3);
    editor.deselect_all();
    assert!(editor.block_selection().is_empty());
    assert!(!editor.can_undo());
}

#[test]
fn deleting_selected_blocks_reports_the_first_path() {
    let mut editor = Editor::new(
        Document {
            children: vec![
                Node::paragraph("a"),
                Node::paragraph("b"),
                Node::paragraph("c"),
            ],
        },
        None,
    );
    editor.select_by_path(&[0]);
    editor.select_by_path(&[2]);

    assert_eq!(editor.delete_selected_blocks(), Some(vec![0]));
    assert_eq!(editor.doc().children, vec![Node::paragraph("b")]);
    assert!(editor.block_selection().is_empty());
    assert_eq!(editor.delete_selected_blocks(), None);
}

#[test]
fn custom_data_replaces_an_empty_block() {
    let mut editor = Editor::empty();
    let data = ClipboardData::from_plain("# T\n\nbody");
    assert!(editor.insert_custom_data(&data));

    assert_eq!(
        editor.doc().children,
        vec![heading(1, "T"), Node::paragraph("body")]
    );
    assert_eq!(caret(&editor), (vec![1, 0], 4));
}

#[test]
fn plain_lines_pasted_in_a_list_become_items() {
    let mut editor = editor_at(vec![bullets(vec![item("x")])], (vec![0, 0, 0], 1));
    assert!(editor.on_paste(&ClipboardData::from_plain("a\nb")));

    assert_eq!(
        editor.doc().children,
        vec![bullets(vec![item("x"), item("a"), item("b")])]
    );
    assert_eq!(caret(&editor), (vec![0, 2, 0], 1));
}

#[test]
fn catalog_uses_the_configured_code_language() {
    let editor = Editor::empty();
    let code = editor
        .block_catalog()
        .into_iter()
        .find(|entry| entry.name == "Code")
        .expect("code entry");
    assert_eq!(code.kind, ElementKind::code("tsx"));
    assert_eq!(editor.filter_blocks("head").len(), 6);
}
