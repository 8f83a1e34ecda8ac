//! Rubber-band block selection and the keyboard/clipboard glue around it.
//!
//! Coordinates are document-relative. The renderer answers geometry queries
//! through [`BlockGeometry`]; nothing here knows about layout.

use crate::clipboard::ClipboardData;
use crate::core::{Editor, Selection};
use crate::ops::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanned by two corners.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        let x = a.0.min(b.0);
        let y = a.1.min(b.1);
        Self::new(x, y, a.0.max(b.0) - x, a.1.max(b.1) - y)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Strict overlap; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// Layout answers provided by whatever renders the document.
pub trait BlockGeometry {
    /// Bounding box of the element at `path`, if it is laid out.
    fn element_rect(&self, path: &[usize]) -> Option<Rect>;
    fn viewport_width(&self) -> f64;
    fn is_focused(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
    pub button: PointerButton,
    /// The pointer is over editable content or an input field.
    pub on_editable: bool,
}

impl PointerEvent {
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            button: PointerButton::Primary,
            on_editable: false,
        }
    }

    pub fn on_editable(mut self, on_editable: bool) -> Self {
        self.on_editable = on_editable;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key name as reported by the platform, e.g. `"a"`, `"Backspace"`.
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self.key.as_str(), "Meta" | "Control" | "Shift" | "Alt")
    }

    fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum DragState {
    #[default]
    Idle,
    Dragging {
        anchor: (f64, f64),
    },
}

/// Pointer state machine for selecting blocks by dragging over them.
#[derive(Debug, Clone, Default)]
pub struct DragSelect {
    state: DragState,
    rect: Option<Rect>,
}

impl DragSelect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The current drag rectangle, for drawing the band.
    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// Any primary press clears the block selection. Outside editable content
    /// it also drops the caret and starts a drag. Returns whether a drag began.
    pub fn pointer_down(&mut self, editor: &mut Editor, event: &PointerEvent) -> bool {
        if event.button != PointerButton::Primary {
            return false;
        }
        editor.deselect_all();
        if event.on_editable {
            return false;
        }
        editor.deselect();
        self.state = DragState::Dragging {
            anchor: (event.x, event.y),
        };
        true
    }

    /// Re-selects every selectable element overlapping the band. Returns
    /// whether the block selection changed.
    pub fn pointer_move(
        &mut self,
        editor: &mut Editor,
        geometry: &dyn BlockGeometry,
        event: &PointerEvent,
    ) -> bool {
        let DragState::Dragging { anchor } = self.state else {
            return false;
        };
        if event.button != PointerButton::Primary {
            return false;
        }
        let band = Rect::from_corners(anchor, (event.x, event.y));
        self.rect = Some(band);

        let hits: Vec<(Path, bool)> = editor
            .doc()
            .elements()
            .into_iter()
            .filter(|(_, el)| el.kind.is_selectable())
            .filter_map(|(path, _)| {
                let rect = geometry.element_rect(&path)?;
                Some((path, rect.intersects(&band)))
            })
            .collect();

        let blocks = editor.block_selection_mut();
        let mut changed = false;
        for (path, hit) in hits {
            changed |= if hit {
                blocks.insert(path)
            } else {
                blocks.remove(&path)
            };
        }
        changed
    }

    /// Ends a drag. With blocks selected the caret is dropped; a release
    /// outside the editor with nothing selected places the caret near the
    /// pointer instead.
    pub fn pointer_up(
        &mut self,
        editor: &mut Editor,
        geometry: &dyn BlockGeometry,
        event: &PointerEvent,
    ) {
        if event.button != PointerButton::Primary {
            return;
        }
        let was_dragging = self.is_dragging();
        self.state = DragState::Idle;
        self.rect = None;

        if !editor.block_selection().is_empty() {
            editor.deselect();
            tracing::debug!(
                blocks = editor.block_selection().len(),
                "drag selection finished"
            );
            return;
        }
        if was_dragging
            && !event.on_editable
            && editor.selection().is_none()
            && !geometry.is_focused()
        {
            editor.select_by_mouse_coordinate(event.x, event.y, geometry);
        }
    }
}

impl Editor {
    /// Puts the caret in the element whose center is nearest the pointer:
    /// at its end when the pointer is in the right half of the viewport or
    /// well below the element, otherwise at its start.
    pub fn select_by_mouse_coordinate(
        &mut self,
        x: f64,
        y: f64,
        geometry: &dyn BlockGeometry,
    ) -> bool {
        let threshold = self.config().below_node_threshold;
        let right_half = x > geometry.viewport_width() / 2.0;

        let mut nearest: Option<(f64, Path, bool)> = None;
        for (path, _) in self.doc().elements() {
            let Some(rect) = geometry.element_rect(&path) else {
                continue;
            };
            let (cx, cy) = rect.center();
            let distance = (cx - x).hypot(cy - y);
            if nearest.as_ref().is_some_and(|(best, ..)| *best <= distance) {
                continue;
            }
            let below = y - rect.bottom() > threshold;
            nearest = Some((distance, path, right_half || below));
        }

        let caret = match nearest {
            Some((_, path, true)) => self.doc().end_point(&path),
            Some((_, path, false)) => self.doc().start_point(&path),
            None => self.doc().end_point(&[]),
        };
        let Some(caret) = caret else {
            return false;
        };
        self.set_selection(Some(Selection::collapsed(caret)));
        true
    }

    /// Block-selection keyboard handling. Returns `true` when the key was
    /// handled here and must not reach the text editing path.
    pub fn on_key(&mut self, event: &KeyEvent) -> bool {
        let has_blocks = !self.block_selection().is_empty();
        if matches!(event.key.as_str(), "Delete" | "Backspace") && has_blocks {
            self.delete_selected_blocks();
            return true;
        }

        if event.command() && event.key.eq_ignore_ascii_case("a") && self.selection().is_none() {
            self.select_all();
            return true;
        }

        let clipboard_key = event.command()
            && matches!(event.key.to_ascii_lowercase().as_str(), "c" | "x" | "v");
        if event.is_modifier() || clipboard_key {
            return true;
        }

        if has_blocks {
            self.deselect_all();
        }
        if event.key == "Escape" {
            self.deselect();
        }
        false
    }

    pub fn on_copy(&mut self) -> Option<ClipboardData> {
        self.copy_selected_blocks(false)
    }

    pub fn on_cut(&mut self) -> Option<ClipboardData> {
        self.copy_selected_blocks(true)
    }

    /// Structured payloads are placed as blocks; anything else goes through
    /// the markdown path.
    pub fn on_paste(&mut self, data: &ClipboardData) -> bool {
        self.paste_blocks(data) || self.insert_custom_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        let c = Rect::new(9.0, 9.0, 5.0, 5.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn corners_normalize() {
        let r = Rect::from_corners((30.0, 40.0), (10.0, 5.0));
        assert_eq!(r, Rect::new(10.0, 5.0, 20.0, 35.0));
        assert_eq!(r.center(), (20.0, 22.5));
    }

    #[test]
    fn modifier_keys() {
        assert!(KeyEvent::new("Shift").is_modifier());
        assert!(!KeyEvent::new("a").ctrl().is_modifier());
    }
}
