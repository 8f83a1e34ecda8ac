use std::collections::BTreeMap;
use std::ops::Range;

use crate::core::{Document, Editor, Node};
use crate::grammar::Tokenizer;
use crate::ops::{Path, path_child, path_parent};
use crate::schema::ElementKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub range: Range<usize>,
    /// Token-kind labels from the tokenizer; empty for unclassified text.
    pub kinds: Vec<String>,
    pub token: bool,
    pub fake_selection: bool,
}

impl Decoration {
    fn token(range: Range<usize>, kinds: Vec<String>) -> Self {
        Self {
            range,
            kinds,
            token: true,
            fake_selection: false,
        }
    }

    fn fake_selection(range: Range<usize>) -> Self {
        Self {
            range,
            kinds: Vec::new(),
            token: false,
            fake_selection: true,
        }
    }
}

/// Highlight ranges per code-line path. Offsets are relative to the line's
/// text.
pub type DecorationMap = BTreeMap<Path, Vec<Decoration>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeBlockPrint {
    path: Path,
    language: String,
    lines: Vec<String>,
}

fn fingerprint(doc: &Document) -> Vec<CodeBlockPrint> {
    doc.children
        .iter()
        .enumerate()
        .filter_map(|(ix, node)| {
            let Node::Element(el) = node else {
                return None;
            };
            let ElementKind::Code { language } = &el.kind else {
                return None;
            };
            let lines = el
                .children
                .iter()
                .map(Node::text_content)
                .collect();
            Some(CodeBlockPrint {
                path: vec![ix],
                language: language.clone(),
                lines,
            })
        })
        .collect()
}

/// Tokenizes one code block and spreads the tokens over its lines.
pub fn decorate_code_block(
    block_path: &[usize],
    language: &str,
    lines: &[String],
    tokenizer: &dyn Tokenizer,
) -> DecorationMap {
    let mut map = DecorationMap::new();
    let line_paths: Vec<Path> = (0..lines.len())
        .map(|ix| path_child(block_path, ix))
        .collect();
    let code = lines.join("\n");

    let mut line = 0usize;
    let mut column = 0usize;
    for token in tokenizer.tokenize(&code, language) {
        for (i, piece) in token.text.split('\n').enumerate() {
            if i > 0 {
                line += 1;
                column = 0;
            }
            if piece.is_empty() {
                continue;
            }
            if let Some(path) = line_paths.get(line) {
                map.entry(path.clone())
                    .or_default()
                    .push(Decoration::token(
                        column..column + piece.len(),
                        token.kinds.clone(),
                    ));
            }
            column += piece.len();
        }
    }
    map
}

/// Cached code highlighting, rebuilt wholesale when any code block's
/// path, language or text changes.
#[derive(Debug, Default)]
pub struct CodeDecorations {
    map: DecorationMap,
    fingerprint: Option<Vec<CodeBlockPrint>>,
}

impl CodeDecorations {
    pub fn map(&self) -> &DecorationMap {
        &self.map
    }

    /// Returns whether the cache was rebuilt.
    pub fn refresh(&mut self, doc: &Document, tokenizer: &dyn Tokenizer) -> bool {
        let print = fingerprint(doc);
        if self.fingerprint.as_ref() == Some(&print) {
            return false;
        }

        let mut map = DecorationMap::new();
        for block in &print {
            if !tokenizer.supports(&block.language) {
                tracing::debug!(language = %block.language, "no grammar, lines stay unclassified");
            }
            map.extend(decorate_code_block(
                &block.path,
                &block.language,
                &block.lines,
                tokenizer,
            ));
        }
        tracing::trace!(blocks = print.len(), lines = map.len(), "code decorations rebuilt");
        self.map = map;
        self.fingerprint = Some(print);
        true
    }
}

impl Editor {
    /// Decorations for a code line, or for a text leaf: the leaf's share of
    /// its line's highlighting plus any part of it covered by the fake
    /// selection.
    pub fn decorate(&self, path: &[usize]) -> Vec<Decoration> {
        if let Some(ranges) = self.decorations().get(path) {
            return ranges.clone();
        }
        let Some(Node::Text(leaf)) = self.doc().node(path) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let parent = path_parent(path);
        if let (Some(ranges), Some((&leaf_ix, _))) =
            (self.decorations().get(parent), path.split_last())
        {
            let start: usize = self
                .doc()
                .element(parent)
                .and_then(|el| el.children.get(..leaf_ix))
                .map(|before| before.iter().map(|n| n.text_content().len()).sum())
                .unwrap_or(0);
            let end = start + leaf.text.len();
            for deco in ranges {
                let from = deco.range.start.max(start);
                let to = deco.range.end.min(end);
                if from < to {
                    let mut deco = deco.clone();
                    deco.range = from - start..to - start;
                    out.push(deco);
                }
            }
        }

        if let Some(fake) = self.fake_selection() {
            let (start, end) = fake.edges();
            if start.path.as_slice() <= path && path <= end.path.as_slice() {
                let from = if start.path == path { start.offset } else { 0 };
                let to = if end.path == path {
                    end.offset.min(leaf.text.len())
                } else {
                    leaf.text.len()
                };
                if from < to {
                    out.push(Decoration::fake_selection(from..to));
                }
            }
        }
        out
    }
}
