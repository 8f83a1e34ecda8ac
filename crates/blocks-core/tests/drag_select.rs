use std::collections::HashMap;

use manos_blocks_core::{
    BlockGeometry, Document, DragSelect, Editor, KeyEvent, Node, Point, PointerEvent, Rect,
    Selection,
};
use pretty_assertions::assert_eq;

/// Top-level blocks stacked 20px tall with a 10px gap, 400px wide.
struct Stacked {
    rects: HashMap<Vec<usize>, Rect>,
    focused: bool,
}

impl Stacked {
    fn new(blocks: usize) -> Self {
        let rects = (0..blocks)
            .map(|ix| (vec![ix], Rect::new(0.0, ix as f64 * 30.0, 400.0, 20.0)))
            .collect();
        Self {
            rects,
            focused: false,
        }
    }
}

impl BlockGeometry for Stacked {
    fn element_rect(&self, path: &[usize]) -> Option<Rect> {
        self.rects.get(path).copied()
    }

    fn viewport_width(&self) -> f64 {
        800.0
    }

    fn is_focused(&self) -> bool {
        self.focused
    }
}

fn three_paragraphs() -> Editor {
    let doc = Document {
        children: vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ],
    };
    Editor::new(doc, Some(Selection::collapsed(Point::new(vec![0, 0], 0))))
}

fn drag(editor: &mut Editor, geometry: &Stacked, from: (f64, f64), to: (f64, f64)) {
    let mut drag = DragSelect::new();
    assert!(drag.pointer_down(editor, &PointerEvent::primary(from.0, from.1)));
    assert!(drag.is_dragging());
    drag.pointer_move(editor, geometry, &PointerEvent::primary(to.0, to.1));
    drag.pointer_up(editor, geometry, &PointerEvent::primary(to.0, to.1));
    assert!(!drag.is_dragging());
}

#[test]
fn drag_then_backspace_removes_the_blocks() {
    let mut editor = three_paragraphs();
    let geometry = Stacked::new(3);

    drag(&mut editor, &geometry, (5.0, 5.0), (50.0, 35.0));
    let selected: Vec<Vec<usize>> = editor.block_selection().paths().cloned().collect();
    assert_eq!(selected, vec![vec![0], vec![1]]);
    assert!(editor.selection().is_none());

    assert!(editor.on_key(&KeyEvent::new("Backspace")));
    assert_eq!(editor.doc().children, vec![Node::paragraph("c")]);
}

#[test]
fn deleting_every_block_leaves_an_empty_paragraph() {
    let mut editor = three_paragraphs();
    let geometry = Stacked::new(3);

    drag(&mut editor, &geometry, (5.0, 5.0), (50.0, 70.0));
    assert_eq!(editor.block_selection().len(), 3);

    assert!(editor.on_key(&KeyEvent::new("Delete")));
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
}

#[test]
fn band_shrinking_deselects() {
    let mut editor = three_paragraphs();
    let geometry = Stacked::new(3);
    let mut drag = DragSelect::new();

    drag.pointer_down(&mut editor, &PointerEvent::primary(5.0, 5.0));
    assert!(drag.pointer_move(&mut editor, &geometry, &PointerEvent::primary(50.0, 70.0)));
    assert_eq!(editor.block_selection().len(), 3);
    assert!(drag.pointer_move(&mut editor, &geometry, &PointerEvent::primary(50.0, 15.0)));
    assert_eq!(editor.block_selection().len(), 1);
    assert_eq!(drag.rect(), Some(Rect::new(5.0, 5.0, 45.0, 10.0)));
}

#[test]
fn press_on_editable_content_does_not_drag() {
    let mut editor = three_paragraphs();
    editor.select_by_path(&[1]);
    let mut drag = DragSelect::new();

    let press = PointerEvent::primary(5.0, 5.0).on_editable(true);
    assert!(!drag.pointer_down(&mut editor, &press));
    assert!(editor.block_selection().is_empty());
    assert!(editor.selection().is_some());
}

#[test]
fn release_below_the_text_places_the_caret() {
    let doc = Document {
        children: vec![Node::paragraph("a"), Node::paragraph("b")],
    };
    let mut editor = Editor::new(doc, None);
    let geometry = Stacked::new(2);
    let mut drag = DragSelect::new();

    drag.pointer_down(&mut editor, &PointerEvent::primary(100.0, 200.0));
    drag.pointer_move(&mut editor, &geometry, &PointerEvent::primary(100.0, 205.0));
    drag.pointer_up(&mut editor, &geometry, &PointerEvent::primary(100.0, 205.0));

    let focus = &editor.selection().expect("caret").focus;
    assert_eq!((focus.path.clone(), focus.offset), (vec![1, 0], 1));
}

#[test]
fn mouse_coordinate_picks_the_nearest_block() {
    let doc = Document {
        children: vec![Node::paragraph("a"), Node::paragraph("bc")],
    };
    let mut editor = Editor::new(doc, None);
    let geometry = Stacked::new(2);

    assert!(editor.select_by_mouse_coordinate(100.0, 35.0, &geometry));
    let focus = editor.selection().unwrap().focus.clone();
    assert_eq!(focus, Point::new(vec![1, 0], 0));

    assert!(editor.select_by_mouse_coordinate(600.0, 5.0, &geometry));
    let focus = editor.selection().unwrap().focus.clone();
    assert_eq!(focus, Point::new(vec![0, 0], 1));
}

#[test]
fn select_all_needs_no_live_selection() {
    let mut editor = three_paragraphs();
    assert!(!editor.on_key(&KeyEvent::new("a").ctrl()));
    assert!(editor.block_selection().is_empty());

    editor.deselect();
    assert!(editor.on_key(&KeyEvent::new("a").meta()));
    assert_eq!(editor.block_selection().len(), 3);
}

#[test]
fn clipboard_and_modifier_keys_keep_the_block_selection() {
    let mut editor = three_paragraphs();
    editor.select_by_path(&[0]);

    assert!(editor.on_key(&KeyEvent::new("Shift")));
    assert!(editor.on_key(&KeyEvent::new("c").ctrl()));
    assert!(editor.on_key(&KeyEvent::new("v").meta()));
    assert_eq!(editor.block_selection().len(), 1);

    assert!(!editor.on_key(&KeyEvent::new("x")));
    assert!(editor.block_selection().is_empty());
    assert_eq!(editor.doc().children.len(), 3);
}

#[test]
fn escape_drops_the_caret() {
    let mut editor = three_paragraphs();
    assert!(!editor.on_key(&KeyEvent::new("Escape")));
    assert!(editor.selection().is_none());
}
