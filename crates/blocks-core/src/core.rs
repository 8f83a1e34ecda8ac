use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clipboard::{MarkdownParser, PulldownMarkdown};
use crate::decorate::{CodeDecorations, DecorationMap};
use crate::error::ApplyError;
use crate::grammar::{SyntectTokenizer, Tokenizer};
use crate::normalize::Normalizer;
use crate::ops::{Op, Path, Transaction, is_ancestor, path_child};
use crate::schema::{ContainerKind, DEFAULT_CODE_LANGUAGE, ElementKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element(ElementKind::Paragraph, vec![Node::text(text)])
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn element(kind: ElementKind, children: Vec<Node>) -> Self {
        Node::Element(ElementNode::new(kind, children))
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of every leaf below this node.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Element(el) => el.text_content(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    /// Element with the default placeholder for `kind`.
    pub fn new(kind: ElementKind, children: Vec<Node>) -> Self {
        Self {
            placeholder: kind.placeholder(),
            kind,
            children,
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(&t.text),
                Node::Element(el) => out.push_str(&el.text_content()),
            }
        }
        out
    }

    /// No children, or a single empty text run.
    pub fn is_empty(&self) -> bool {
        match self.children.as_slice() {
            [] => true,
            [Node::Text(t)] => t.text.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl Marks {
    pub fn get(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
            Mark::Strikethrough => self.strikethrough,
            Mark::Code => self.code,
        }
    }

    pub fn set(&mut self, mark: Mark, value: bool) {
        match mark {
            Mark::Bold => self.bold = value,
            Mark::Italic => self.italic = value,
            Mark::Underline => self.underline = value,
            Mark::Strikethrough => self.strikethrough = value,
            Mark::Code => self.code = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path
            .cmp(&other.path)
            .then(self.offset.cmp(&other.offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Start and end in document order.
    pub fn edges(&self) -> (Point, Point) {
        if self.focus < self.anchor {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }
}

/// The set of block-selected element paths.
///
/// Block selection lives beside the tree rather than inside it, so snapshots,
/// history and clipboard payloads never see it. Paths are kept in step with
/// node insertions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSelection {
    paths: BTreeSet<Path>,
}

impl BlockSelection {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn contains(&self, path: &[usize]) -> bool {
        self.paths.contains(path)
    }

    /// Selected paths in document order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    /// Selected paths without those nested under another selected path.
    pub fn top_level_paths(&self) -> Vec<Path> {
        let mut out: Vec<Path> = Vec::new();
        for path in &self.paths {
            if out.iter().any(|kept| is_ancestor(kept, path)) {
                continue;
            }
            out.push(path.clone());
        }
        out
    }

    pub(crate) fn insert(&mut self, path: Path) -> bool {
        self.paths.insert(path)
    }

    pub(crate) fn remove(&mut self, path: &[usize]) -> bool {
        self.paths.remove(path)
    }

    pub(crate) fn clear(&mut self) {
        self.paths.clear();
    }

    fn transform_insert_node(&mut self, path: &[usize]) {
        let Some((&index, parent)) = path.split_last() else {
            return;
        };
        let depth = parent.len();
        self.paths = std::mem::take(&mut self.paths)
            .into_iter()
            .map(|mut p| {
                if p.len() > depth && p.starts_with(parent) && p[depth] >= index {
                    p[depth] += 1;
                }
                p
            })
            .collect();
    }

    fn transform_remove_node(&mut self, path: &[usize]) {
        let Some((&index, parent)) = path.split_last() else {
            return;
        };
        let depth = parent.len();
        self.paths = std::mem::take(&mut self.paths)
            .into_iter()
            .filter(|p| !p.starts_with(path))
            .map(|mut p| {
                if p.len() > depth && p.starts_with(parent) && p[depth] > index {
                    p[depth] -= 1;
                }
                p
            })
            .collect();
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Option<Selection>,
    pub selection_after: Option<Selection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
    pub default_code_language: String,
    /// Distance below a block, in pixels, past which a click places the caret
    /// at the block's end.
    pub below_node_threshold: f64,
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 1000;
        }
        if self.default_code_language.is_empty() {
            self.default_code_language = DEFAULT_CODE_LANGUAGE.to_string();
        }
        if self.below_node_threshold <= 0.0 {
            self.below_node_threshold = 10.0;
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }
}

pub struct Editor {
    doc: Document,
    selection: Option<Selection>,
    fake_selection: Option<Selection>,
    blocks: BlockSelection,
    normalizer: Normalizer,
    tokenizer: Box<dyn Tokenizer>,
    markdown: Box<dyn MarkdownParser>,
    decorations: CodeDecorations,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    merge_next: bool,
}

impl Editor {
    pub fn new(doc: Document, selection: Option<Selection>) -> Self {
        Self::with_config(doc, selection, EditorConfig::default())
    }

    pub fn with_config(doc: Document, selection: Option<Selection>, config: EditorConfig) -> Self {
        let mut editor = Self {
            doc,
            selection,
            fake_selection: None,
            blocks: BlockSelection::default(),
            normalizer: Normalizer::standard(),
            tokenizer: Box::new(SyntectTokenizer::new()),
            markdown: Box::new(PulldownMarkdown),
            decorations: CodeDecorations::default(),
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            merge_next: false,
        };
        editor.normalize_in_place();
        editor.refresh_decorations();
        editor
    }

    /// One empty paragraph with the caret inside it.
    pub fn empty() -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, Some(selection))
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self.decorations = CodeDecorations::default();
        self.refresh_decorations();
        self
    }

    pub fn with_markdown_parser(mut self, parser: Box<dyn MarkdownParser>) -> Self {
        self.markdown = parser;
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    pub fn deselect(&mut self) {
        self.selection = None;
    }

    pub fn fake_selection(&self) -> Option<&Selection> {
        self.fake_selection.as_ref()
    }

    pub(crate) fn set_fake_selection(&mut self, selection: Option<Selection>) {
        self.fake_selection = selection;
    }

    pub fn block_selection(&self) -> &BlockSelection {
        &self.blocks
    }

    pub(crate) fn block_selection_mut(&mut self) -> &mut BlockSelection {
        &mut self.blocks
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn decorations(&self) -> &DecorationMap {
        self.decorations.map()
    }

    pub(crate) fn markdown_parser(&self) -> &dyn MarkdownParser {
        self.markdown.as_ref()
    }

    /// Coalesce the next transaction into the latest history entry.
    pub(crate) fn merge_with_next(&mut self) {
        self.merge_next = true;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => redo_ops.push(inv),
                Err(err) => {
                    tracing::warn!("undo stopped early: {err}");
                    break;
                }
            }
        }
        redo_ops.reverse();

        self.selection = selection_before.clone();
        self.merge_next = false;
        self.normalize_in_place();
        self.refresh_decorations();

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => undo_ops.push(inv),
                Err(err) => {
                    tracing::warn!("redo stopped early: {err}");
                    break;
                }
            }
        }
        undo_ops.reverse();

        self.selection = selection_after.clone();
        self.merge_next = false;
        self.normalize_in_place();
        self.refresh_decorations();

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        true
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let source = tx.meta.source.clone().unwrap_or_else(|| "apply".to_string());
        if tx.meta.merge {
            self.merge_next = true;
        }
        let Transaction {
            ops,
            selection_after,
            ..
        } = tx;
        self.transact(&source, move |draft| {
            draft.apply_all(ops)?;
            if let Some(sel) = selection_after {
                draft.set_selection(Some(sel));
            }
            Ok(())
        })
    }

    /// Runs `f` as one logical edit.
    ///
    /// Ops applied through the [`Draft`] take effect immediately, but the tree
    /// is normalized once at the end and the whole edit becomes a single
    /// history entry. If `f` fails, every op it applied is rolled back.
    pub fn transact<R>(
        &mut self,
        source: &str,
        f: impl FnOnce(&mut Draft<'_>) -> Result<R, ApplyError>,
    ) -> Result<R, ApplyError> {
        let selection_before = self.selection.clone();
        let merge = std::mem::take(&mut self.merge_next);

        let (result, mut inverse_ops) = {
            let mut draft = Draft {
                doc: &mut self.doc,
                selection: &mut self.selection,
                blocks: &mut self.blocks,
                inverse_ops: Vec::new(),
            };
            let result = f(&mut draft);
            (result, draft.inverse_ops)
        };

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(source, "transaction failed, rolling back: {err}");
                for op in inverse_ops.into_iter().rev() {
                    if let Err(err) = self.apply_op(op) {
                        tracing::warn!(source, "rollback op failed: {err}");
                    }
                }
                self.selection = selection_before;
                self.merge_next = merge;
                return Err(err);
            }
        };

        inverse_ops.extend(self.normalize_with_inverse_ops());
        self.normalize_selection_in_place();

        tracing::debug!(source, ops = inverse_ops.len(), merge, "transaction applied");
        self.record_history(inverse_ops, selection_before, merge);
        self.refresh_decorations();
        Ok(value)
    }

    /// Runs the normalizer outside of any edit. Returns whether the tree
    /// changed.
    pub fn normalize(&mut self) -> bool {
        let changed = !self.normalize_with_inverse_ops().is_empty();
        self.normalize_selection_in_place();
        if changed {
            self.refresh_decorations();
        }
        changed
    }

    fn record_history(
        &mut self,
        mut inverse_ops: Vec<Op>,
        selection_before: Option<Selection>,
        merge: bool,
    ) {
        if inverse_ops.is_empty() {
            return;
        }
        inverse_ops.reverse();
        let selection_after = self.selection.clone();

        if merge {
            if let Some(last) = self.undo_stack.last_mut() {
                let older = std::mem::take(&mut last.inverse_ops);
                inverse_ops.extend(older);
                last.inverse_ops = inverse_ops;
                last.selection_after = selection_after;
                self.redo_stack.clear();
                return;
            }
        }

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
    }

    fn refresh_decorations(&mut self) {
        self.decorations.refresh(&self.doc, self.tokenizer.as_ref());
    }

    fn normalize_in_place(&mut self) {
        let _ = self.normalize_with_inverse_ops();
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .selection
            .as_ref()
            .and_then(|sel| normalize_selection(&self.doc, sel));
        self.fake_selection = self
            .fake_selection
            .as_ref()
            .and_then(|sel| normalize_selection(&self.doc, sel));
    }

    /// Fixed-point repair loop. Each iteration applies the first repair any
    /// pass reports and starts over; the loop ends when no pass reports
    /// anything or after `max_normalize_iterations` rounds.
    fn normalize_with_inverse_ops(&mut self) -> Vec<Op> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let Some((pass, ops)) = self.normalizer.next_repair(&self.doc) else {
                return inverse_ops;
            };
            tracing::trace!(pass, ops = ops.len(), "normalize repair");
            for op in ops {
                match self.apply_op(op) {
                    Ok(inv) => inverse_ops.push(inv),
                    Err(err) => {
                        tracing::warn!(pass, "normalize op failed, leaving tree as-is: {err}");
                        return inverse_ops;
                    }
                }
            }
        }
        tracing::warn!(
            max = self.config.max_normalize_iterations,
            "normalization did not converge"
        );
        inverse_ops
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, &mut self.blocks, op)
    }
}

/// Mutable view of the editor inside [`Editor::transact`].
pub struct Draft<'a> {
    doc: &'a mut Document,
    selection: &'a mut Option<Selection>,
    blocks: &'a mut BlockSelection,
    inverse_ops: Vec<Op>,
}

impl Draft<'_> {
    pub fn doc(&self) -> &Document {
        self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        *self.selection = selection;
    }

    pub fn block_selection(&self) -> &BlockSelection {
        self.blocks
    }

    pub(crate) fn deselect_block(&mut self, path: &[usize]) {
        self.blocks.remove(path);
    }

    pub fn apply(&mut self, op: Op) -> Result<(), ApplyError> {
        let inverse = apply_op_to(self.doc, self.selection, self.blocks, op)?;
        self.inverse_ops.push(inverse);
        Ok(())
    }

    pub fn apply_all(&mut self, ops: impl IntoIterator<Item = Op>) -> Result<(), ApplyError> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    /// Snaps the caret back onto an existing text leaf.
    pub fn normalize_selection(&mut self) {
        let next = self
            .selection
            .as_ref()
            .and_then(|sel| normalize_selection(self.doc, sel));
        *self.selection = next;
    }
}

impl Document {
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for &ix in rest {
            node = match node {
                Node::Element(el) => el.children.get(ix)?,
                Node::Text(_) => return None,
            };
        }
        Some(node)
    }

    pub fn element(&self, path: &[usize]) -> Option<&ElementNode> {
        self.node(path).and_then(Node::as_element)
    }

    pub fn children_at(&self, parent_path: &[usize]) -> Option<&[Node]> {
        if parent_path.is_empty() {
            return Some(&self.children);
        }
        self.element(parent_path).map(|el| el.children.as_slice())
    }

    /// Every element in document order (parents before children).
    pub fn elements(&self) -> Vec<(Path, &ElementNode)> {
        fn walk<'a>(nodes: &'a [Node], path: &mut Path, out: &mut Vec<(Path, &'a ElementNode)>) {
            for (ix, node) in nodes.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                out.push((path.clone(), el));
                walk(&el.children, path, out);
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut Vec::new(), &mut out);
        out
    }

    /// Text leaves at or below `path` in document order.
    pub fn text_leaves(&self, path: &[usize]) -> Vec<(Path, &TextNode)> {
        fn walk<'a>(node: &'a Node, path: &mut Path, out: &mut Vec<(Path, &'a TextNode)>) {
            match node {
                Node::Text(t) => out.push((path.clone(), t)),
                Node::Element(el) => {
                    for (ix, child) in el.children.iter().enumerate() {
                        path.push(ix);
                        walk(child, path, out);
                        path.pop();
                    }
                }
            }
        }

        let mut out = Vec::new();
        if path.is_empty() {
            for (ix, child) in self.children.iter().enumerate() {
                walk(child, &mut vec![ix], &mut out);
            }
        } else if let Some(node) = self.node(path) {
            walk(node, &mut path.to_vec(), &mut out);
        }
        out
    }

    pub fn start_point(&self, path: &[usize]) -> Option<Point> {
        self.text_leaves(path)
            .into_iter()
            .next()
            .map(|(p, _)| Point::new(p, 0))
    }

    pub fn end_point(&self, path: &[usize]) -> Option<Point> {
        self.text_leaves(path)
            .into_iter()
            .last()
            .map(|(p, t)| Point::new(p, t.text.len()))
    }

    /// Text-bearing blocks (not containers, not inline elements) in document
    /// order.
    pub fn text_blocks(&self) -> Vec<Path> {
        self.elements()
            .into_iter()
            .filter(|(_, el)| el.kind.is_text_block())
            .map(|(path, _)| path)
            .collect()
    }

    /// Lowest non-inline element at or above `path`.
    pub fn block_above(&self, path: &[usize]) -> Option<Path> {
        (1..=path.len()).rev().find_map(|len| {
            let candidate = &path[..len];
            match self.element(candidate) {
                Some(el) if !el.kind.is_inline() => Some(candidate.to_vec()),
                _ => None,
            }
        })
    }

    /// Highest container strictly above `path`.
    pub fn container_above(&self, path: &[usize]) -> Option<(Path, ContainerKind)> {
        (1..path.len()).find_map(|len| {
            let candidate = &path[..len];
            self.element(candidate)
                .and_then(|el| el.kind.container())
                .map(|kind| (candidate.to_vec(), kind))
        })
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

pub(crate) fn normalize_selection(doc: &Document, selection: &Selection) -> Option<Selection> {
    let anchor = normalize_point_to_existing_text(doc, &selection.anchor)
        .or_else(|| normalize_point_to_existing_text(doc, &selection.focus))?;
    let focus =
        normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());
    Some(Selection { anchor, focus })
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if doc.children.is_empty() {
        return None;
    }
    if point.path.is_empty() {
        return doc.start_point(&[]);
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: clamp_to_char_boundary(&t.text, point.offset),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
        }
    }

    doc.start_point(&resolved_path)
        .or_else(|| doc.start_point(&[]))
}

fn apply_op_to(
    doc: &mut Document,
    selection: &mut Option<Selection>,
    blocks: &mut BlockSelection,
    op: Op,
) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            if let Some(sel) = selection.as_mut() {
                transform_selection_insert_text(sel, &path, offset, text.len());
            }
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            if let Some(sel) = selection.as_mut() {
                transform_selection_remove_text(sel, &path, start..end);
            }
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            if let Some(sel) = selection.as_mut() {
                transform_selection_insert_node(sel, &path);
            }
            blocks.transform_insert_node(&path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            if let Some(sel) = selection.as_mut() {
                transform_selection_remove_node(sel, &path, &removed, doc);
            }
            blocks.transform_remove_node(&path);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetKind {
            path,
            kind,
            placeholder,
        } => {
            let Node::Element(el) = node_mut(doc, &path)? else {
                return Err(ApplyError::InvalidPath("Text has no kind".into()));
            };
            if !kind.is_selectable() {
                blocks.remove(&path);
            }
            let old_kind = std::mem::replace(&mut el.kind, kind);
            let old_placeholder = std::mem::replace(&mut el.placeholder, placeholder);
            Ok(Op::SetKind {
                path,
                kind: old_kind,
                placeholder: old_placeholder,
            })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            match doc_after_remove.node(&path_child(parent_path, left_index)) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point.path.truncate(depth + 1);
            point.path[depth] = left_index;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, ApplyError> {
    let Some((&first, rest)) = path.split_first() else {
        return Err(ApplyError::InvalidPath("Empty path".into()));
    };

    let len = doc.children.len();
    let mut node = doc.children.get_mut(first).ok_or_else(|| {
        ApplyError::InvalidPath(format!("Path out of bounds at depth 0: {first} >= {len}"))
    })?;

    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    ApplyError::InvalidPath(format!(
                        "Path out of bounds at depth {}: {ix} >= {len}",
                        depth + 1
                    ))
                })?
            }
            Node::Text(_) => {
                return Err(ApplyError::InvalidPath(format!(
                    "Text node at depth {depth} has no children"
                )));
            }
        };
    }
    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, ApplyError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        Node::Element(_) => Err(ApplyError::InvalidPath("Expected Text node".into())),
    }
}

fn children_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, ApplyError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(doc, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Text(_) => Err(ApplyError::InvalidPath(
            "Parent is a text node".into(),
        )),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), ApplyError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(ApplyError::InvalidPath("Empty insert path".into()));
    };

    let children = children_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(ApplyError::InvalidPath(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, ApplyError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(ApplyError::InvalidPath("Empty remove path".into()));
    };

    let children = children_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(ApplyError::InvalidPath(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}
