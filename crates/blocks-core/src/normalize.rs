use crate::core::{Document, ElementNode, Node};
use crate::ops::{Op, Path, path_child, path_next};
use crate::schema::ElementKind;

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    /// Ops repairing the first violation found, or nothing when the tree
    /// already satisfies this pass.
    fn run(&self, doc: &Document) -> Vec<Op>;
}

pub struct Normalizer {
    passes: Vec<Box<dyn NormalizePass>>,
}

impl Normalizer {
    pub fn new(passes: Vec<Box<dyn NormalizePass>>) -> Self {
        Self { passes }
    }

    /// Structural passes first, then the text-leaf passes.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(RemoveEmptyContainers),
            Box::new(FixContainerChildren),
            Box::new(MergeAdjacentLists),
            Box::new(RemoveEmptyLinks),
            Box::new(EnsureTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ])
    }

    pub fn pass_ids(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.id()).collect()
    }

    /// First pass with something to repair, together with its ops.
    pub fn next_repair(&self, doc: &Document) -> Option<(&'static str, Vec<Op>)> {
        self.passes.iter().find_map(|pass| {
            let ops = pass.run(doc);
            (!ops.is_empty()).then(|| (pass.id(), ops))
        })
    }

    pub fn is_normalized(&self, doc: &Document) -> bool {
        self.next_repair(doc).is_none()
    }
}

/// Ops moving the node at `path` out of its parent element, splitting the
/// parent when the node sits in the middle of it. Also returns where the node
/// ends up.
pub(crate) fn lift_ops(doc: &Document, path: &[usize]) -> Option<(Vec<Op>, Path)> {
    let (&index, parent_path) = path.split_last()?;
    if parent_path.is_empty() {
        return None;
    }
    let parent = doc.element(parent_path)?;
    let node = parent.children.get(index)?.clone();
    let len = parent.children.len();

    let mut ops = Vec::new();
    let target = if index == 0 {
        parent_path.to_vec()
    } else {
        path_next(parent_path)
    };
    if len == 1 {
        ops.push(Op::RemoveNode {
            path: parent_path.to_vec(),
        });
        ops.push(Op::InsertNode {
            path: parent_path.to_vec(),
            node,
        });
    } else if index == 0 {
        ops.push(Op::RemoveNode {
            path: path.to_vec(),
        });
        ops.push(Op::InsertNode {
            path: parent_path.to_vec(),
            node,
        });
    } else if index + 1 == len {
        ops.push(Op::RemoveNode {
            path: path.to_vec(),
        });
        ops.push(Op::InsertNode {
            path: path_next(parent_path),
            node,
        });
    } else {
        for ix in (index + 1..len).rev() {
            ops.push(Op::RemoveNode {
                path: path_child(parent_path, ix),
            });
        }
        ops.push(Op::RemoveNode {
            path: path.to_vec(),
        });
        let after = path_next(parent_path);
        ops.push(Op::InsertNode {
            path: after.clone(),
            node,
        });
        let tail = ElementNode {
            kind: parent.kind.clone(),
            placeholder: parent.placeholder.clone(),
            children: parent.children[index + 1..].to_vec(),
        };
        ops.push(Op::InsertNode {
            path: path_next(&after),
            node: Node::Element(tail),
        });
    }
    Some((ops, target))
}

fn find_element(
    children: &[Node],
    path: &mut Path,
    visit: &mut dyn FnMut(&Path, &ElementNode) -> Option<Vec<Op>>,
) -> Option<Vec<Op>> {
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);
        if let Some(ops) = visit(path, el) {
            return Some(ops);
        }
        if let Some(ops) = find_element(&el.children, path, visit) {
            return Some(ops);
        }
        path.pop();
    }
    None
}

fn first_repair(
    doc: &Document,
    mut visit: impl FnMut(&Path, &ElementNode) -> Option<Vec<Op>>,
) -> Vec<Op> {
    find_element(&doc.children, &mut Vec::new(), &mut visit).unwrap_or_default()
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "blocks.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct RemoveEmptyContainers;

impl NormalizePass for RemoveEmptyContainers {
    fn id(&self) -> &'static str {
        "blocks.remove_empty_containers"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        first_repair(doc, |path, el| {
            (el.kind.is_container() && el.children.is_empty())
                .then(|| vec![Op::RemoveNode { path: path.clone() }])
        })
    }
}

/// Lifts foreign containers out of a container and retypes foreign blocks to
/// the allowed child kind. Bare text directly under a container has no
/// template and stays where it is.
struct FixContainerChildren;

impl NormalizePass for FixContainerChildren {
    fn id(&self) -> &'static str {
        "blocks.fix_container_children"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        first_repair(doc, |path, el| {
            let container = el.kind.container()?;
            el.children.iter().enumerate().find_map(|(ix, child)| {
                let Node::Element(child) = child else {
                    return None;
                };
                if container.can_contain(child.kind.element_type()) {
                    return None;
                }
                let child_path = path_child(path, ix);
                if child.kind.is_container() {
                    return lift_ops(doc, &child_path).map(|(ops, _)| ops);
                }
                let kind = container.child_template();
                Some(vec![Op::SetKind {
                    path: child_path,
                    placeholder: kind.placeholder(),
                    kind,
                }])
            })
        })
    }
}

struct MergeAdjacentLists;

impl NormalizePass for MergeAdjacentLists {
    fn id(&self) -> &'static str {
        "blocks.merge_adjacent_lists"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn merge_in(children: &[Node], parent: &[usize]) -> Option<Vec<Op>> {
            children.windows(2).enumerate().find_map(|(ix, pair)| {
                let (Node::Element(left), Node::Element(right)) = (&pair[0], &pair[1]) else {
                    return None;
                };
                let same_list = left.kind == right.kind
                    && left.kind.container().is_some_and(|c| c.is_list());
                if !same_list {
                    return None;
                }
                let left_path = path_child(parent, ix);
                let mut ops: Vec<Op> = right
                    .children
                    .iter()
                    .enumerate()
                    .map(|(k, child)| Op::InsertNode {
                        path: path_child(&left_path, left.children.len() + k),
                        node: child.clone(),
                    })
                    .collect();
                ops.push(Op::RemoveNode {
                    path: path_child(parent, ix + 1),
                });
                Some(ops)
            })
        }

        if let Some(ops) = merge_in(&doc.children, &[]) {
            return ops;
        }
        first_repair(doc, |path, el| merge_in(&el.children, path))
    }
}

struct RemoveEmptyLinks;

impl NormalizePass for RemoveEmptyLinks {
    fn id(&self) -> &'static str {
        "blocks.remove_empty_links"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        first_repair(doc, |path, el| {
            (matches!(el.kind, ElementKind::Link { .. }) && el.text_content().is_empty())
                .then(|| vec![Op::RemoveNode { path: path.clone() }])
        })
    }
}

/// Every non-container element carries at least one text leaf.
///
/// Repairs for a subtree are emitted before those of its parent so that
/// later ops never see shifted indices.
struct EnsureTextLeaf;

impl NormalizePass for EnsureTextLeaf {
    fn id(&self) -> &'static str {
        "blocks.ensure_text_leaf"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);
                walk(&el.children, path, ops);
                if !el.kind.is_container()
                    && !el.children.iter().any(|n| matches!(n, Node::Text(_)))
                {
                    ops.push(Op::InsertNode {
                        path: path_child(path, 0),
                        node: Node::text(""),
                    });
                }
                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "blocks.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);
                walk(&el.children, path, ops);
                merge_runs(el, path, ops);
                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

fn merge_runs(el: &ElementNode, path: &[usize], ops: &mut Vec<Op>) {
    if el.children.len() < 2 {
        return;
    }
    let mut ix = el.children.len();
    while ix > 0 {
        ix -= 1;
        let Node::Text(right) = &el.children[ix] else {
            continue;
        };

        let mut start = ix;
        while start > 0 {
            let Some(Node::Text(left)) = el.children.get(start - 1) else {
                break;
            };
            if left.marks != right.marks {
                break;
            }
            start -= 1;
        }
        if start == ix {
            continue;
        }

        let Some(Node::Text(first)) = el.children.get(start) else {
            continue;
        };
        // One leaf at a time, so a caret on a removed leaf can be mapped onto
        // the text it was appended to.
        let mut len = first.text.len();
        for k in start + 1..=ix {
            let Some(Node::Text(leaf)) = el.children.get(k) else {
                continue;
            };
            if !leaf.text.is_empty() {
                ops.push(Op::InsertText {
                    path: path_child(path, start),
                    offset: len,
                    text: leaf.text.clone(),
                });
                len += leaf.text.len();
            }
            ops.push(Op::RemoveNode {
                path: path_child(path, start + 1),
            });
        }
        ix = start;
    }
}

