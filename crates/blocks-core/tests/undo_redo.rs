use manos_blocks_core::{
    Document, Editor, EditorConfig, Node, Op, Point, Selection, Transaction,
};
use pretty_assertions::assert_eq;

fn editor_with(children: Vec<Node>, caret: (Vec<usize>, usize)) -> Editor {
    let selection = Selection::collapsed(Point::new(caret.0, caret.1));
    Editor::new(Document { children }, Some(selection))
}

#[test]
fn undo_redo_restores_text_and_caret() {
    let mut editor = editor_with(vec![Node::paragraph("")], (vec![0, 0], 0));
    editor.insert_text("ab");
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert_eq!(editor.selection().unwrap().focus.offset, 0);

    assert!(editor.redo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(editor.selection().unwrap().focus.offset, 2);
    assert!(!editor.can_redo());
}

#[test]
fn transaction_ops_are_one_step() {
    let mut editor = editor_with(vec![Node::paragraph("XYZ")], (vec![0, 0], 0));
    let tx = Transaction::new(vec![
        Op::RemoveText {
            path: vec![0, 0],
            range: 0..3,
        },
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "a".to_string(),
        },
        Op::InsertNode {
            path: vec![1],
            node: Node::paragraph("bXYZ"),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![1, 0], 1)))
    .source("test:paste_newline");
    editor.apply(tx).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), Node::paragraph("bXYZ")]
    );
    assert_eq!(editor.selection().unwrap().focus, Point::new(vec![1, 0], 1));

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("XYZ")]);
    assert_eq!(editor.selection().unwrap().focus, Point::new(vec![0, 0], 0));
    assert!(!editor.can_undo());
}

#[test]
fn failing_transaction_rolls_back() {
    let mut editor = editor_with(vec![Node::paragraph("a")], (vec![0, 0], 1));
    let tx = Transaction::new(vec![
        Op::InsertText {
            path: vec![0, 0],
            offset: 1,
            text: "b".to_string(),
        },
        Op::RemoveNode { path: vec![7] },
    ]);

    assert!(editor.apply(tx).is_err());
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
    assert_eq!(editor.selection().unwrap().focus.offset, 1);
    assert!(!editor.can_undo());
}

#[test]
fn edit_after_deleting_blocks_joins_that_undo_step() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::paragraph("b")],
        (vec![1, 0], 1),
    );
    editor.select_by_path(&[0]);
    assert_eq!(editor.delete_selected_blocks(), Some(vec![0]));
    assert!(editor.insert_text("x"));
    assert_eq!(editor.doc().children, vec![Node::paragraph("bx")]);

    assert!(editor.undo());
    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), Node::paragraph("b")]
    );
    assert_eq!(editor.selection().unwrap().focus, Point::new(vec![1, 0], 1));
    assert!(!editor.can_undo());
}

#[test]
fn merge_marker_only_reaches_the_next_transaction() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::paragraph("b")],
        (vec![1, 0], 1),
    );
    editor.select_by_path(&[0]);
    editor.delete_selected_blocks();
    editor.insert_text("x");
    editor.insert_text("y");

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("bx")]);
    assert!(editor.undo());
    assert!(!editor.can_undo());
}

#[test]
fn merge_flag_joins_the_previous_step() {
    let mut editor = editor_with(vec![Node::paragraph("")], (vec![0, 0], 0));
    editor.insert_text("a");
    let tx = Transaction::new(vec![Op::InsertText {
        path: vec![0, 0],
        offset: 1,
        text: "b".to_string(),
    }])
    .merge(true);
    editor.apply(tx).unwrap();
    editor.insert_text("c");

    assert_eq!(editor.doc().children, vec![Node::paragraph("abc")]);
    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert!(!editor.can_undo());
}

#[test]
fn history_is_capped() {
    let config = EditorConfig {
        max_undo: 2,
        ..EditorConfig::default()
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let mut editor = Editor::with_config(
        Document {
            children: vec![Node::paragraph("")],
        },
        Some(selection),
        config,
    );
    for text in ["a", "b", "c"] {
        editor.insert_text(text);
    }

    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
}

#[test]
fn config_fills_in_defaults() {
    let config = EditorConfig::from_json_str(r#"{"max_undo": 5}"#).unwrap();
    assert_eq!(config.max_undo, 5);
    assert_eq!(config.max_normalize_iterations, 1000);
    assert_eq!(config.default_code_language, "tsx");
    assert_eq!(config.below_node_threshold, 10.0);
}
