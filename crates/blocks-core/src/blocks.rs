//! Block-level operations: insert, convert, select, delete, copy and paste.

use crate::clipboard::{BLOCKS_MIME, ClipboardData, PLAIN_MIME};
use crate::core::{Document, Draft, Editor, ElementNode, Node, Point, Selection};
use crate::edit::{block_offset, collapse_for_edit, point_at_offset, split_block};
use crate::error::ApplyError;
use crate::normalize::lift_ops;
use crate::ops::{Op, Path, path_child, path_next, path_parent};
use crate::schema::{BlockEntry, ContainerKind, ElementKind, ElementType, block_catalog, filter_blocks};

/// Immediate parent of `block` when that parent is a container.
fn parent_container(doc: &Document, block: &[usize]) -> Option<(Path, ContainerKind)> {
    if block.len() < 2 {
        return None;
    }
    let parent = path_parent(block);
    doc.element(parent)
        .and_then(|el| el.kind.container())
        .map(|kind| (parent.to_vec(), kind))
}

fn caret_block(draft: &Draft<'_>) -> Option<Path> {
    let sel = draft.selection()?;
    draft.doc().block_above(&sel.focus.path)
}

fn document_end(doc: &Document) -> Path {
    vec![doc.children.len()]
}

/// Lowest selectable elements at or below `path`.
fn selectable_at(doc: &Document, path: &[usize]) -> Vec<Path> {
    let Some(el) = doc.element(path) else {
        return Vec::new();
    };
    if el.kind.is_selectable() {
        return vec![path.to_vec()];
    }
    el.children
        .iter()
        .enumerate()
        .flat_map(|(ix, _)| selectable_at(doc, &path_child(path, ix)))
        .collect()
}

fn insert_nodes(
    draft: &mut Draft<'_>,
    at: &[usize],
    nodes: Vec<Node>,
) -> Result<Option<Path>, ApplyError> {
    let mut path = at.to_vec();
    let mut last = None;
    for node in nodes {
        draft.apply(Op::InsertNode {
            path: path.clone(),
            node,
        })?;
        last = Some(path.clone());
        path = path_next(&path);
    }
    Ok(last)
}

fn insert_block_in(
    draft: &mut Draft<'_>,
    kind: &ElementKind,
    at: Option<Path>,
) -> Result<Path, ApplyError> {
    let at = match at {
        Some(at) => at,
        None => match caret_block(draft) {
            Some(block) => path_next(&block),
            None => document_end(draft.doc()),
        },
    };

    draft.apply(Op::InsertNode {
        path: at.clone(),
        node: Node::Element(kind.template()),
    })?;

    let caret = draft.doc().start_point(&at);
    draft.set_selection(caret.map(Selection::collapsed));
    tracing::debug!(?kind, ?at, "inserted block");
    Ok(at)
}

/// Removes every block-selected subtree, last first. Returns where the
/// first one was.
fn delete_selected_in(draft: &mut Draft<'_>) -> Result<Option<Path>, ApplyError> {
    let paths = draft.block_selection().top_level_paths();
    let first = paths.first().cloned();
    for path in paths.into_iter().rev() {
        draft.apply(Op::RemoveNode { path })?;
    }
    Ok(first)
}

/// Converts the block at `path` to a paragraph, lifting it out of a parent
/// container that cannot hold one. Returns `false` when it already was a
/// paragraph.
pub(crate) fn reset_block(draft: &mut Draft<'_>, path: &[usize]) -> Result<bool, ApplyError> {
    let doc = draft.doc();
    let el = doc
        .element(path)
        .ok_or_else(|| ApplyError::NoBlock(path.to_vec()))?;
    let was_paragraph = el.kind == ElementKind::Paragraph;
    let caret_offset = draft
        .selection()
        .filter(|sel| sel.is_collapsed() && sel.focus.path.starts_with(path))
        .map(|sel| block_offset(doc, path, &sel.focus));

    let mut path = path.to_vec();
    if let Some((_, container)) = parent_container(doc, &path) {
        if !container.can_contain(ElementType::Paragraph) {
            if let Some((ops, target)) = lift_ops(doc, &path) {
                draft.apply_all(ops)?;
                path = target;
            }
        }
    }

    if !was_paragraph {
        let kind = ElementKind::Paragraph;
        draft.apply(Op::SetKind {
            path: path.clone(),
            placeholder: kind.placeholder(),
            kind,
        })?;
    }

    if let Some(offset) = caret_offset {
        let caret = point_at_offset(draft.doc(), &path, offset);
        draft.set_selection(caret.map(Selection::collapsed));
    }
    Ok(!was_paragraph)
}

fn paste_in(draft: &mut Draft<'_>, nodes: Vec<Node>) -> Result<bool, ApplyError> {
    let remembered = delete_selected_in(draft)?;

    let collapsed = draft.selection().is_some_and(Selection::is_collapsed);
    let block = draft
        .selection()
        .and_then(|sel| draft.doc().block_above(&sel.focus.path));
    if let Some(block) = block {
        match parent_container(draft.doc(), &block) {
            Some((container_path, container)) if collapsed => {
                paste_into_container(draft, &block, &container_path, container, nodes)?;
                return Ok(true);
            }
            Some(_) => {}
            None => {
                let mut at = path_next(&block);
                if draft.doc().element(&block).is_some_and(ElementNode::is_empty) {
                    draft.apply(Op::RemoveNode {
                        path: block.clone(),
                    })?;
                    at = block;
                }
                insert_nodes(draft, &at, nodes)?;
                draft.set_selection(None);
                return Ok(true);
            }
        }
    }

    let doc = draft.doc();
    let end = doc.end_point(&[]);
    let at = match end.as_ref().and_then(|end| doc.container_above(&end.path)) {
        Some((container_path, _)) => path_next(&container_path),
        None => remembered.unwrap_or_else(|| document_end(doc)),
    };
    insert_nodes(draft, &at, nodes)?;
    draft.set_selection(None);
    Ok(true)
}

/// Pastes with the caret inside a container: fitting fragments go right
/// after the current child, the rest after the container.
fn paste_into_container(
    draft: &mut Draft<'_>,
    block: &[usize],
    container_path: &[usize],
    container: ContainerKind,
    nodes: Vec<Node>,
) -> Result<(), ApplyError> {
    let mut inside = path_next(block);
    let mut after = path_next(container_path);

    for node in nodes {
        let Node::Element(el) = node else {
            tracing::debug!("dropping bare text fragment pasted into a container");
            continue;
        };

        let fitting: Vec<Node> = if el.kind.container() == Some(container) {
            el.children
        } else if el.kind == ElementKind::Paragraph {
            let kind = container.child_template();
            vec![Node::Element(ElementNode {
                placeholder: kind.placeholder(),
                kind,
                children: el.children,
            })]
        } else if container.can_contain(el.kind.element_type()) {
            vec![Node::Element(el)]
        } else {
            draft.apply(Op::InsertNode {
                path: after.clone(),
                node: Node::Element(el),
            })?;
            after = path_next(&after);
            continue;
        };

        for child in fitting {
            draft.apply(Op::InsertNode {
                path: inside.clone(),
                node: child,
            })?;
            inside = path_next(&inside);
        }
    }
    Ok(())
}

impl Editor {
    pub fn block_catalog(&self) -> Vec<BlockEntry> {
        block_catalog(&self.config().default_code_language)
    }

    pub fn filter_blocks(&self, query: &str) -> Vec<BlockEntry> {
        filter_blocks(&self.block_catalog(), query)
    }

    /// The lowest non-inline element holding the caret.
    pub fn current_block(&self) -> Option<Path> {
        let sel = self.selection()?;
        self.doc().block_above(&sel.focus.path)
    }

    /// Inserts `kind` at `at`, or after the current block, or at the end of
    /// the document. The caret moves into the new block.
    pub fn insert_block(&mut self, kind: &ElementKind, at: Option<Path>) -> bool {
        if kind.is_inline() {
            return false;
        }
        self.transact("insert_block", |draft| {
            insert_block_in(draft, kind, at)?;
            Ok(true)
        })
        .unwrap_or(false)
    }

    /// Inserts a container holding one templated child, with the caret in
    /// that child.
    pub fn insert_container_block(&mut self, kind: &ElementKind, at: Option<Path>) -> bool {
        if !kind.is_container() {
            return false;
        }
        self.insert_block(kind, at)
    }

    pub fn change_block_type(&mut self, kind: &ElementKind) -> bool {
        let Some(block) = self.current_block() else {
            return false;
        };
        if kind.is_inline() {
            return false;
        }

        self.transact("change_block_type", |draft| {
            let Some(container) = kind.container() else {
                draft.apply(Op::SetKind {
                    path: block.clone(),
                    kind: kind.clone(),
                    placeholder: kind.placeholder(),
                })?;
                return Ok(true);
            };

            draft.deselect_block(&block);
            let child_kind = container.child_template();
            let mut child = draft
                .doc()
                .element(&block)
                .cloned()
                .ok_or_else(|| ApplyError::NoBlock(block.clone()))?;
            child.placeholder = child_kind.placeholder();
            child.kind = child_kind;

            let caret = draft.selection().cloned();
            let wrapper = ElementNode {
                kind: kind.clone(),
                placeholder: kind.placeholder(),
                children: vec![Node::Element(child)],
            };
            draft.apply(Op::RemoveNode {
                path: block.clone(),
            })?;
            draft.apply(Op::InsertNode {
                path: block.clone(),
                node: Node::Element(wrapper),
            })?;

            let remap = |point: &Point| {
                if point.path.starts_with(&block) {
                    let mut path = path_child(&block, 0);
                    path.extend_from_slice(&point.path[block.len()..]);
                    Point::new(path, point.offset)
                } else {
                    point.clone()
                }
            };
            draft.set_selection(caret.map(|sel| Selection {
                anchor: remap(&sel.anchor),
                focus: remap(&sel.focus),
            }));
            Ok(true)
        })
        .unwrap_or(false)
    }

    /// What the "/" picker does with a chosen block.
    pub fn change_or_insert_block(&mut self, kind: &ElementKind) -> bool {
        let Some(block) = self.current_block() else {
            return self.insert_block(kind, None);
        };

        if let Some((container_path, container)) = parent_container(self.doc(), &block) {
            if !container.can_contain(kind.element_type()) {
                tracing::debug!(?kind, "target cannot live in the container, inserting after it");
                return self.insert_block(kind, Some(path_next(&container_path)));
            }
        }

        if self.doc().element(&block).is_some_and(ElementNode::is_empty) {
            return self.change_block_type(kind);
        }
        self.insert_block(kind, None)
    }

    pub fn select_by_path(&mut self, path: &[usize]) -> bool {
        let targets = selectable_at(self.doc(), path);
        let blocks = self.block_selection_mut();
        targets
            .into_iter()
            .fold(false, |changed, p| blocks.insert(p) || changed)
    }

    pub fn deselect_by_path(&mut self, path: &[usize]) -> bool {
        let targets = selectable_at(self.doc(), path);
        let blocks = self.block_selection_mut();
        targets
            .iter()
            .fold(false, |changed, p| blocks.remove(p) || changed)
    }

    pub fn select_all(&mut self) {
        let targets: Vec<Path> = self
            .doc()
            .elements()
            .into_iter()
            .filter(|(_, el)| el.kind.is_selectable())
            .map(|(path, _)| path)
            .collect();
        let blocks = self.block_selection_mut();
        for path in targets {
            blocks.insert(path);
        }
    }

    pub fn deselect_all(&mut self) {
        self.block_selection_mut().clear();
    }

    /// Removes the block-selected nodes. The next transaction is folded
    /// into the same undo step.
    pub fn delete_selected_blocks(&mut self) -> Option<Path> {
        if self.block_selection().is_empty() {
            return None;
        }
        let first = self
            .transact("delete_selected_blocks", delete_selected_in)
            .ok()
            .flatten()?;
        self.merge_with_next();
        tracing::debug!(?first, "deleted selected blocks");
        Some(first)
    }

    pub fn copy_selected_blocks(&mut self, cut: bool) -> Option<ClipboardData> {
        let nodes: Vec<Node> = self
            .block_selection()
            .top_level_paths()
            .iter()
            .filter_map(|path| self.doc().node(path).cloned())
            .collect();
        if nodes.is_empty() {
            return None;
        }

        let data = match ClipboardData::from_nodes(&nodes) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!("could not serialize copied blocks: {err}");
                return None;
            }
        };
        if cut {
            self.delete_selected_blocks();
        }
        Some(data)
    }

    /// Pastes a structured payload. Returns `false` when there is none, so the
    /// caller can fall back to [`Editor::insert_custom_data`].
    pub fn paste_blocks(&mut self, data: &ClipboardData) -> bool {
        if data.get(BLOCKS_MIME).is_none() {
            return false;
        }
        let Some(nodes) = data.structured_nodes() else {
            return false;
        };
        if nodes.is_empty() {
            return false;
        }
        self.transact("paste_blocks", |draft| paste_in(draft, nodes))
            .unwrap_or(false)
    }

    /// Line-break handler outside containers. An empty paragraph goes in at
    /// the caret: before the block at its start, after it at its end, and
    /// between the two halves otherwise. Both halves keep the block's kind.
    pub fn insert_default_element(&mut self) -> bool {
        let Some(block) = self.current_block() else {
            return false;
        };
        if parent_container(self.doc(), &block).is_some() {
            return false;
        }
        self.transact("insert_default_element", |draft| {
            let caret = collapse_for_edit(draft)?;
            let block = draft
                .doc()
                .block_above(&caret.path)
                .ok_or_else(|| ApplyError::NoBlock(caret.path.clone()))?;
            let offset = block_offset(draft.doc(), &block, &caret);
            let len = draft
                .doc()
                .element(&block)
                .map(|el| el.text_content().len())
                .unwrap_or(0);

            let at = if offset == 0 && len > 0 {
                block
            } else if offset >= len {
                path_next(&block)
            } else {
                split_block(draft, &caret, None)?;
                path_next(&block)
            };
            insert_block_in(draft, &ElementKind::Paragraph, Some(at))?;
            Ok(true)
        })
        .unwrap_or(false)
    }

    pub fn reset_current_element(&mut self) -> bool {
        let Some(block) = self.current_block() else {
            return false;
        };
        self.transact("reset_current_element", |draft| reset_block(draft, &block))
            .unwrap_or(false)
    }

    /// Inserts clipboard content as blocks after the current one, replacing
    /// it when empty. Structured content wins over plain text.
    pub fn insert_custom_data(&mut self, data: &ClipboardData) -> bool {
        let nodes = match data.structured_nodes() {
            Some(nodes) => nodes,
            None => match data.get(PLAIN_MIME) {
                Some(plain) => self.markdown_parser().parse(plain),
                None => return false,
            },
        };
        if nodes.is_empty() {
            return false;
        }

        self.transact("insert_custom_data", |draft| {
            let at = match caret_block(draft) {
                Some(block) if draft.doc().element(&block).is_some_and(ElementNode::is_empty) => {
                    draft.apply(Op::RemoveNode {
                        path: block.clone(),
                    })?;
                    block
                }
                Some(block) => path_next(&block),
                None => document_end(draft.doc()),
            };
            let had_caret = draft.selection().is_some();
            let last = insert_nodes(draft, &at, nodes)?;
            if had_caret {
                let caret = last.and_then(|last| draft.doc().end_point(&last));
                draft.set_selection(caret.map(Selection::collapsed));
            }
            Ok(true)
        })
        .unwrap_or(false)
    }
}
