//! Caret-level editing: typing, breaks, deletion, marks and links.

use crate::blocks::reset_block;
use crate::core::{
    Document, Draft, Editor, ElementNode, Mark, Marks, Node, Point, Selection, TextNode,
    clamp_to_char_boundary,
};
use crate::error::ApplyError;
use crate::ops::{Op, Path, path_child, path_next, path_parent};
use crate::schema::ElementKind;

pub(crate) fn text_len(node: &Node) -> usize {
    match node {
        Node::Text(t) => t.text.len(),
        Node::Element(el) => el.children.iter().map(text_len).sum(),
    }
}

/// Offset of `point` counted over all text of the block at `block_path`.
pub(crate) fn block_offset(doc: &Document, block_path: &[usize], point: &Point) -> usize {
    let mut offset = 0usize;
    for (path, leaf) in doc.text_leaves(block_path) {
        if path == point.path {
            return offset + clamp_to_char_boundary(&leaf.text, point.offset);
        }
        offset += leaf.text.len();
    }
    offset
}

/// Point at a block-level text offset. An offset on a boundary between two
/// leaves resolves to the start of the later one, so the point survives the
/// leaves being merged.
pub(crate) fn point_at_offset(doc: &Document, block_path: &[usize], offset: usize) -> Option<Point> {
    let leaves = doc.text_leaves(block_path);
    let mut remaining = offset;
    for (path, leaf) in &leaves {
        if remaining < leaf.text.len() {
            return Some(Point::new(
                path.clone(),
                clamp_to_char_boundary(&leaf.text, remaining),
            ));
        }
        remaining -= leaf.text.len();
    }
    leaves
        .last()
        .map(|(path, leaf)| Point::new(path.clone(), leaf.text.len()))
}

/// Splits inline content at a block-level text offset. Inline elements that
/// straddle the offset are split into two copies.
pub(crate) fn split_nodes(children: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let len = text_len(node);
        let (start, end) = (cursor, cursor + len);
        cursor = end;

        if start >= offset {
            right.push(node.clone());
            continue;
        }
        if end <= offset {
            left.push(node.clone());
            continue;
        }

        match node {
            Node::Text(t) => {
                let at = clamp_to_char_boundary(&t.text, offset - start);
                left.push(Node::Text(TextNode {
                    text: t.text[..at].to_string(),
                    marks: t.marks.clone(),
                }));
                right.push(Node::Text(TextNode {
                    text: t.text[at..].to_string(),
                    marks: t.marks.clone(),
                }));
            }
            Node::Element(el) => {
                let (l, r) = split_nodes(&el.children, offset - start);
                left.push(Node::Element(ElementNode {
                    kind: el.kind.clone(),
                    placeholder: el.placeholder.clone(),
                    children: l,
                }));
                right.push(Node::Element(ElementNode {
                    kind: el.kind.clone(),
                    placeholder: el.placeholder.clone(),
                    children: r,
                }));
            }
        }
    }
    (left, right)
}

fn with_leaf(mut nodes: Vec<Node>) -> Vec<Node> {
    if nodes.is_empty() {
        nodes.push(Node::text(""));
    }
    nodes
}

/// Inline content of `children` with the text between `from` and `to` cut
/// out.
pub(crate) fn cut_nodes(children: &[Node], from: usize, to: usize) -> Vec<Node> {
    let (mut left, _) = split_nodes(children, from);
    let (_, right) = split_nodes(children, to);
    left.extend(right);
    with_leaf(left)
}

pub(crate) fn replace_children(
    draft: &mut Draft<'_>,
    path: &[usize],
    children: Vec<Node>,
) -> Result<(), ApplyError> {
    let len = draft
        .doc()
        .element(path)
        .map(|el| el.children.len())
        .ok_or_else(|| ApplyError::NoBlock(path.to_vec()))?;
    for ix in (0..len).rev() {
        draft.apply(Op::RemoveNode {
            path: path_child(path, ix),
        })?;
    }
    for (ix, node) in children.into_iter().enumerate() {
        draft.apply(Op::InsertNode {
            path: path_child(path, ix),
            node,
        })?;
    }
    Ok(())
}

/// Splits the block holding `point` in two. The new block takes `kind`, or
/// the original kind when `None`. The caret moves to its start.
pub(crate) fn split_block(
    draft: &mut Draft<'_>,
    point: &Point,
    kind: Option<ElementKind>,
) -> Result<Path, ApplyError> {
    let block = draft
        .doc()
        .block_above(&point.path)
        .ok_or_else(|| ApplyError::NoBlock(point.path.clone()))?;
    let el = draft
        .doc()
        .element(&block)
        .cloned()
        .ok_or_else(|| ApplyError::NoBlock(block.clone()))?;
    let offset = block_offset(draft.doc(), &block, point);
    let (left, right) = split_nodes(&el.children, offset);

    replace_children(draft, &block, with_leaf(left))?;

    let (kind, placeholder) = match kind {
        Some(kind) => {
            let placeholder = kind.placeholder();
            (kind, placeholder)
        }
        None => (el.kind, el.placeholder),
    };
    let next = path_next(&block);
    draft.apply(Op::InsertNode {
        path: next.clone(),
        node: Node::Element(ElementNode {
            kind,
            placeholder,
            children: with_leaf(right),
        }),
    })?;

    let caret = draft.doc().start_point(&next);
    draft.set_selection(caret.map(Selection::collapsed));
    Ok(next)
}

/// Removes the text between two points. Across blocks, the tail of the last
/// block joins the first one and every text block in between is removed.
pub(crate) fn delete_range(
    draft: &mut Draft<'_>,
    start: &Point,
    end: &Point,
) -> Result<Point, ApplyError> {
    let doc = draft.doc();
    let start_block = doc
        .block_above(&start.path)
        .ok_or_else(|| ApplyError::NoBlock(start.path.clone()))?;
    let end_block = doc
        .block_above(&end.path)
        .ok_or_else(|| ApplyError::NoBlock(end.path.clone()))?;
    let from = block_offset(doc, &start_block, start);
    let to = block_offset(doc, &end_block, end);

    if start_block == end_block {
        if from < to {
            let children = doc
                .element(&start_block)
                .map(|el| cut_nodes(&el.children, from, to))
                .ok_or_else(|| ApplyError::NoBlock(start_block.clone()))?;
            replace_children(draft, &start_block, children)?;
        }
    } else {
        let blocks = doc.text_blocks();
        let first = blocks
            .iter()
            .position(|p| *p == start_block)
            .ok_or_else(|| ApplyError::NoBlock(start_block.clone()))?;
        let last = blocks
            .iter()
            .position(|p| *p == end_block)
            .ok_or_else(|| ApplyError::NoBlock(end_block.clone()))?;

        let (mut merged, _) = doc
            .element(&start_block)
            .map(|el| split_nodes(&el.children, from))
            .ok_or_else(|| ApplyError::NoBlock(start_block.clone()))?;
        let (_, tail) = doc
            .element(&end_block)
            .map(|el| split_nodes(&el.children, to))
            .ok_or_else(|| ApplyError::NoBlock(end_block.clone()))?;
        merged.extend(tail);

        let doomed: Vec<Path> = blocks[first + 1..=last].to_vec();
        for path in doomed.into_iter().rev() {
            draft.apply(Op::RemoveNode { path })?;
        }
        replace_children(draft, &start_block, with_leaf(merged))?;
    }

    let caret = point_at_offset(draft.doc(), &start_block, from)
        .ok_or_else(|| ApplyError::NoBlock(start_block.clone()))?;
    draft.set_selection(Some(Selection::collapsed(caret.clone())));
    Ok(caret)
}

/// Deletes an expanded selection and returns the resulting caret.
pub(crate) fn collapse_for_edit(draft: &mut Draft<'_>) -> Result<Point, ApplyError> {
    let sel = draft.selection().cloned().ok_or(ApplyError::NoSelection)?;
    if sel.is_collapsed() {
        return Ok(sel.focus);
    }
    let (start, end) = sel.edges();
    delete_range(draft, &start, &end)
}

pub(crate) fn insert_text_at_caret(draft: &mut Draft<'_>, text: &str) -> Result<(), ApplyError> {
    let caret = collapse_for_edit(draft)?;
    if !matches!(draft.doc().node(&caret.path), Some(Node::Text(_))) {
        return Err(ApplyError::InvalidPath(format!(
            "caret {:?} is not on a text leaf",
            caret.path
        )));
    }
    draft.apply(Op::InsertText {
        path: caret.path,
        offset: caret.offset,
        text: text.to_string(),
    })
}

fn previous_text_block(doc: &Document, block: &[usize]) -> Option<Path> {
    let blocks = doc.text_blocks();
    let ix = blocks.iter().position(|p| p == block)?;
    ix.checked_sub(1).map(|prev| blocks[prev].clone())
}

fn delete_char_before(
    draft: &mut Draft<'_>,
    block: &[usize],
    caret: &Point,
) -> Result<bool, ApplyError> {
    let doc = draft.doc();

    if caret.offset > 0 {
        if let Some(Node::Text(leaf)) = doc.node(&caret.path) {
            let end = clamp_to_char_boundary(&leaf.text, caret.offset);
            let start = leaf.text[..end]
                .char_indices()
                .next_back()
                .map(|(ix, _)| ix)
                .unwrap_or(0);
            draft.apply(Op::RemoveText {
                path: caret.path.clone(),
                range: start..end,
            })?;
            return Ok(true);
        }
    }

    let offset = block_offset(doc, block, caret);
    if offset == 0 {
        let Some(prev) = previous_text_block(doc, block) else {
            return Ok(false);
        };
        let end = doc
            .end_point(&prev)
            .ok_or_else(|| ApplyError::NoBlock(prev.clone()))?;
        delete_range(draft, &end, caret)?;
        return Ok(true);
    }

    let text = doc
        .element(block)
        .map(ElementNode::text_content)
        .unwrap_or_default();
    let prev_char = text[..offset.min(text.len())]
        .char_indices()
        .next_back()
        .map(|(ix, _)| ix)
        .unwrap_or(0);
    let start = point_at_offset(doc, block, prev_char)
        .ok_or_else(|| ApplyError::NoBlock(block.to_vec()))?;
    delete_range(draft, &start, caret)?;
    Ok(true)
}

fn link_above(doc: &Document, path: &[usize]) -> Option<Path> {
    (1..=path.len()).rev().find_map(|len| {
        let candidate = &path[..len];
        doc.element(candidate)
            .filter(|el| matches!(el.kind, ElementKind::Link { .. }))
            .map(|_| candidate.to_vec())
    })
}

fn leaf_intersects(path: &[usize], len: usize, start: &Point, end: &Point) -> bool {
    if len == 0 || path < start.path.as_slice() || path > end.path.as_slice() {
        return false;
    }
    if path == start.path.as_slice() && len <= start.offset {
        return false;
    }
    if path == end.path.as_slice() && end.offset == 0 {
        return false;
    }
    true
}

fn apply_marks_in_nodes(
    children: &[Node],
    start: usize,
    end: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let len = text_len(node);
        let (node_start, node_end) = (cursor, cursor + len);
        cursor = node_end;

        if end <= node_start || start >= node_end {
            out.push(node.clone());
            continue;
        }

        let t = match node {
            Node::Element(el) => {
                let mut el = el.clone();
                el.children = apply_marks_in_nodes(
                    &el.children,
                    start.saturating_sub(node_start),
                    end - node_start,
                    apply,
                );
                out.push(Node::Element(el));
                continue;
            }
            Node::Text(t) => t,
        };

        let sel_start = clamp_to_char_boundary(&t.text, start.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end - node_start);

        if sel_start == 0 && sel_end == t.text.len() {
            let mut next = t.clone();
            next.marks = apply(next.marks);
            out.push(Node::Text(next));
            continue;
        }

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::Text(TextNode {
                text: prefix.to_string(),
                marks: t.marks.clone(),
            }));
        }
        if !middle.is_empty() {
            out.push(Node::Text(TextNode {
                text: middle.to_string(),
                marks: apply(t.marks.clone()),
            }));
        }
        if !suffix.is_empty() {
            out.push(Node::Text(TextNode {
                text: suffix.to_string(),
                marks: t.marks.clone(),
            }));
        }
    }

    with_leaf(out)
}

/// Splits the caret leaf and parks the caret on an empty leaf carrying the
/// toggled marks, so the next typed text picks them up.
fn toggle_mark_at_caret(
    draft: &mut Draft<'_>,
    caret: &Point,
    apply: impl Fn(Marks) -> Marks,
) -> Result<(), ApplyError> {
    let Some((&child_ix, parent)) = caret.path.split_last() else {
        return Err(ApplyError::NoSelection);
    };
    let Some(Node::Text(text)) = draft.doc().node(&caret.path) else {
        return Err(ApplyError::InvalidPath("caret is not on a text leaf".into()));
    };
    let text = text.clone();
    let parent = parent.to_vec();

    let cursor = clamp_to_char_boundary(&text.text, caret.offset);
    let marks_after = apply(text.marks.clone());

    if text.text.is_empty() {
        return draft.apply(Op::SetTextMarks {
            path: caret.path.clone(),
            marks: marks_after,
        });
    }

    let mut replacement: Vec<Node> = Vec::new();
    let mut caret_ix = child_ix;
    let left = &text.text[..cursor];
    let right = &text.text[cursor..];

    if !left.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: left.to_string(),
            marks: text.marks.clone(),
        }));
        caret_ix += 1;
    }
    replacement.push(Node::Text(TextNode {
        text: String::new(),
        marks: marks_after,
    }));
    if !right.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: right.to_string(),
            marks: text.marks.clone(),
        }));
    }

    draft.apply(Op::RemoveNode {
        path: caret.path.clone(),
    })?;
    for (i, node) in replacement.into_iter().enumerate() {
        draft.apply(Op::InsertNode {
            path: path_child(&parent, child_ix + i),
            node,
        })?;
    }

    draft.set_selection(Some(Selection::collapsed(Point::new(
        path_child(&parent, caret_ix),
        0,
    ))));
    Ok(())
}

fn mark_range(
    draft: &mut Draft<'_>,
    start: &Point,
    end: &Point,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(), ApplyError> {
    let doc = draft.doc();
    let start_block = doc
        .block_above(&start.path)
        .ok_or_else(|| ApplyError::NoBlock(start.path.clone()))?;
    let end_block = doc
        .block_above(&end.path)
        .ok_or_else(|| ApplyError::NoBlock(end.path.clone()))?;
    let from = block_offset(doc, &start_block, start);
    let to = block_offset(doc, &end_block, end);

    let blocks = doc.text_blocks();
    let first = blocks
        .iter()
        .position(|p| *p == start_block)
        .ok_or_else(|| ApplyError::NoBlock(start_block.clone()))?;
    let last = blocks
        .iter()
        .position(|p| *p == end_block)
        .ok_or_else(|| ApplyError::NoBlock(end_block.clone()))?;

    let mut rewrites: Vec<(Path, Vec<Node>)> = Vec::new();
    for (ix, path) in blocks.iter().enumerate().take(last + 1).skip(first) {
        let Some(el) = doc.element(path) else {
            continue;
        };
        let total: usize = el.children.iter().map(text_len).sum();
        let s = if ix == first { from } else { 0 };
        let e = if ix == last { to } else { total };
        if s >= e {
            continue;
        }
        rewrites.push((path.clone(), apply_marks_in_nodes(&el.children, s, e, apply)));
    }

    for (path, children) in rewrites {
        replace_children(draft, &path, children)?;
    }

    let anchor = point_at_offset(draft.doc(), &start_block, from);
    let focus = point_at_offset(draft.doc(), &end_block, to);
    if let (Some(anchor), Some(focus)) = (anchor, focus) {
        draft.set_selection(Some(Selection { anchor, focus }));
    }
    Ok(())
}

impl Editor {
    /// Typing entry point. Markdown shortcuts are checked before the text
    /// lands.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if text.is_empty() || self.selection().is_none() {
            return false;
        }
        if self.autoformat(text) {
            return true;
        }
        self.insert_plain_text(text, "insert_text")
    }

    fn insert_plain_text(&mut self, text: &str, source: &str) -> bool {
        self.transact(source, |draft| {
            insert_text_at_caret(draft, text)?;
            Ok(true)
        })
        .unwrap_or(false)
    }

    pub fn insert_tab(&mut self) -> bool {
        self.insert_plain_text("  ", "insert_tab")
    }

    pub fn insert_break(&mut self) -> bool {
        if self.selection().is_none() {
            return false;
        }
        if self.insert_default_element() {
            return true;
        }
        self.transact("insert_break", |draft| {
            let caret = collapse_for_edit(draft)?;
            split_block(draft, &caret, None)?;
            Ok(true)
        })
        .unwrap_or(false)
    }

    /// Inside a container the new block leaves the container as a paragraph;
    /// elsewhere a newline is inserted into the text.
    pub fn insert_soft_break(&mut self) -> bool {
        let Some(caret) = self.selection().map(|sel| sel.focus.clone()) else {
            return false;
        };
        let in_container = self
            .doc()
            .block_above(&caret.path)
            .and_then(|block| self.doc().element(path_parent(&block)).cloned())
            .is_some_and(|parent| parent.kind.is_container());

        if !in_container {
            return self.insert_plain_text("\n", "insert_soft_break");
        }
        self.transact("insert_soft_break", |draft| {
            let caret = collapse_for_edit(draft)?;
            let next = split_block(draft, &caret, None)?;
            reset_block(draft, &next)?;
            Ok(true)
        })
        .unwrap_or(false)
    }

    pub fn delete_backward(&mut self) -> bool {
        let Some(sel) = self.selection().cloned() else {
            return false;
        };
        self.transact("delete_backward", |draft| {
            if !sel.is_collapsed() {
                let (start, end) = sel.edges();
                delete_range(draft, &start, &end)?;
                return Ok(true);
            }

            let caret = sel.focus;
            let doc = draft.doc();
            let block = doc
                .block_above(&caret.path)
                .ok_or_else(|| ApplyError::NoBlock(caret.path.clone()))?;
            let Some(el) = doc.element(&block) else {
                return Ok(false);
            };

            if el.text_content().is_empty() {
                let kind = el.kind.clone();
                if kind != ElementKind::CodeLine && reset_block(draft, &block)? {
                    tracing::debug!(?block, "reset empty block");
                    return Ok(true);
                }
                let landing = previous_text_block(draft.doc(), &block)
                    .and_then(|prev| draft.doc().end_point(&prev))
                    .unwrap_or_else(|| Point::new(path_child(&block, 0), 0));
                draft.apply(Op::RemoveNode {
                    path: block.clone(),
                })?;
                draft.set_selection(Some(Selection::collapsed(landing)));
                tracing::debug!(?block, ?kind, "removed empty block");
                return Ok(true);
            }

            delete_char_before(draft, &block, &caret)
        })
        .unwrap_or(false)
    }

    /// Deletes the content of an expanded selection.
    pub fn delete_fragment(&mut self) -> bool {
        let Some(sel) = self.selection().cloned() else {
            return false;
        };
        if sel.is_collapsed() {
            return false;
        }
        self.transact("delete_fragment", |draft| {
            let (start, end) = sel.edges();
            delete_range(draft, &start, &end)?;
            Ok(true)
        })
        .unwrap_or(false)
    }

    pub fn is_mark_active(&self, mark: Mark) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        let doc = self.doc();
        if sel.is_collapsed() {
            return match doc.node(&sel.focus.path) {
                Some(Node::Text(t)) => t.marks.get(mark),
                _ => false,
            };
        }

        let (start, end) = sel.edges();
        let mut seen = false;
        for (path, leaf) in doc.text_leaves(&[]) {
            if !leaf_intersects(&path, leaf.text.len(), &start, &end) {
                continue;
            }
            if !leaf.marks.get(mark) {
                return false;
            }
            seen = true;
        }
        seen
    }

    pub fn toggle_mark(&mut self, mark: Mark) -> bool {
        let Some(sel) = self.selection().cloned() else {
            return false;
        };
        let target = !self.is_mark_active(mark);
        let apply = move |mut marks: Marks| {
            marks.set(mark, target);
            marks
        };

        self.transact("toggle_mark", |draft| {
            if sel.is_collapsed() {
                toggle_mark_at_caret(draft, &sel.focus, apply)?;
            } else {
                let (start, end) = sel.edges();
                mark_range(draft, &start, &end, &apply)?;
            }
            Ok(true)
        })
        .unwrap_or(false)
    }

    pub fn is_link_active(&self) -> bool {
        let Some(sel) = self.selection().or(self.fake_selection()) else {
            return false;
        };
        let (start, end) = sel.edges();
        if link_above(self.doc(), &start.path).is_some()
            || link_above(self.doc(), &end.path).is_some()
        {
            return true;
        }
        self.doc()
            .elements()
            .into_iter()
            .filter(|(_, el)| matches!(el.kind, ElementKind::Link { .. }))
            .any(|(path, _)| {
                self.doc()
                    .start_point(&path)
                    .is_some_and(|p| p >= start && p < end)
            })
    }

    /// Inserts a link at a collapsed caret, or wraps the selected range when
    /// it lies within one block. Works from the preserved fake selection when
    /// there is one.
    pub fn wrap_link(&mut self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        if self.is_link_active() {
            self.unwrap_link();
        }
        let Some(range) = self
            .fake_selection()
            .cloned()
            .or_else(|| self.selection().cloned())
        else {
            return false;
        };
        self.set_fake_selection(None);

        let link_kind = ElementKind::Link {
            url: url.to_string(),
        };
        let handled = self.transact("wrap_link", |draft| {
            let (start, end) = range.edges();
            let doc = draft.doc();
            let block = doc
                .block_above(&start.path)
                .ok_or_else(|| ApplyError::NoBlock(start.path.clone()))?;
            if doc.block_above(&end.path).as_ref() != Some(&block) {
                tracing::debug!("link range spans several blocks, ignoring");
                return Ok(false);
            }
            let el = doc
                .element(&block)
                .cloned()
                .ok_or_else(|| ApplyError::NoBlock(block.clone()))?;
            let from = block_offset(doc, &block, &start);
            let to = block_offset(doc, &block, &end);

            let (left, _) = split_nodes(&el.children, from);
            let (_, right) = split_nodes(&el.children, to);
            let inner = if from == to {
                vec![Node::text(url)]
            } else {
                let (head, _) = split_nodes(&el.children, to);
                split_nodes(&head, from).1
            };

            let link_ix = left.len();
            let mut children = left;
            children.push(Node::element(link_kind.clone(), inner));
            let right = if right.is_empty() {
                vec![Node::text("")]
            } else {
                right
            };
            children.extend(right);
            replace_children(draft, &block, children)?;

            let after = path_child(&block, link_ix + 1);
            let caret = match draft.doc().node(&after) {
                Some(Node::Text(_)) => Some(Point::new(after, 0)),
                _ => draft.doc().end_point(&path_child(&block, link_ix)),
            };
            draft.set_selection(caret.map(Selection::collapsed));
            Ok(true)
        });
        handled.unwrap_or(false)
    }

    pub fn unwrap_link(&mut self) -> bool {
        let Some(sel) = self
            .selection()
            .cloned()
            .or_else(|| self.fake_selection().cloned())
        else {
            return false;
        };
        let mut links: Vec<Path> = [&sel.anchor, &sel.focus]
            .into_iter()
            .filter_map(|p| link_above(self.doc(), &p.path))
            .collect();
        links.sort();
        links.dedup();
        if links.is_empty() {
            return false;
        }

        self.transact("unwrap_link", |draft| {
            let mut selection = draft.selection().cloned();
            for link in links.iter().rev() {
                let Some(el) = draft.doc().element(link).cloned() else {
                    continue;
                };
                let Some((&link_ix, parent)) = link.split_last() else {
                    continue;
                };
                let parent = parent.to_vec();
                let grown = el.children.len().saturating_sub(1);

                draft.apply(Op::RemoveNode { path: link.clone() })?;
                for (k, child) in el.children.into_iter().enumerate() {
                    draft.apply(Op::InsertNode {
                        path: path_child(&parent, link_ix + k),
                        node: child,
                    })?;
                }

                if let Some(sel) = selection.as_mut() {
                    for point in [&mut sel.anchor, &mut sel.focus] {
                        if point.path.len() > link.len() && point.path.starts_with(link) {
                            let inner = point.path[link.len()];
                            let mut path = path_child(&parent, link_ix + inner);
                            path.extend_from_slice(&point.path[link.len() + 1..]);
                            point.path = path;
                        } else if point.path.len() > parent.len()
                            && point.path.starts_with(&parent)
                            && point.path[parent.len()] > link_ix
                        {
                            point.path[parent.len()] += grown;
                        }
                    }
                }
            }
            draft.set_selection(selection);
            Ok(true)
        })
        .unwrap_or(false)
    }

    /// Keeps the current range visible while focus moves to a side dialog.
    pub fn preserve_selection(&mut self) -> bool {
        let Some(sel) = self.selection().cloned() else {
            return false;
        };
        self.set_fake_selection(Some(sel));
        true
    }

    pub fn restore_selection(&mut self) -> bool {
        let Some(sel) = self.fake_selection().cloned() else {
            return false;
        };
        self.set_fake_selection(None);
        self.set_selection(Some(sel));
        true
    }

    pub fn clear_fake_selection(&mut self) {
        self.set_fake_selection(None);
    }
}
