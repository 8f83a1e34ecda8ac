//! Element variants, the container table and the block templates offered by
//! the "/" picker.

use serde::{Deserialize, Serialize};

use crate::core::{ElementNode, Node};

pub const DEFAULT_PLACEHOLDER: &str = "Type anything, '/' for commands...";
pub const DEFAULT_CODE_LANGUAGE: &str = "tsx";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementKind {
    Paragraph,
    Heading { level: u8 },
    Blockquote,
    BulletList,
    NumberList,
    ListItem,
    Code { language: String },
    CodeLine,
    Link { url: String },
}

/// Fieldless discriminant of [`ElementKind`], used for compatibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Paragraph,
    Heading,
    Blockquote,
    BulletList,
    NumberList,
    ListItem,
    Code,
    CodeLine,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerKind {
    BulletList,
    NumberList,
    Code,
}

impl ContainerKind {
    pub fn allowed_child(self) -> ElementType {
        match self {
            ContainerKind::BulletList | ContainerKind::NumberList => ElementType::ListItem,
            ContainerKind::Code => ElementType::CodeLine,
        }
    }

    pub fn can_contain(self, ty: ElementType) -> bool {
        self.allowed_child() == ty
    }

    /// Kind a foreign, non-container child is retyped to.
    pub fn child_template(self) -> ElementKind {
        match self.allowed_child() {
            ElementType::ListItem => ElementKind::ListItem,
            _ => ElementKind::CodeLine,
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, ContainerKind::BulletList | ContainerKind::NumberList)
    }
}

impl ElementKind {
    pub fn heading(level: u8) -> Self {
        ElementKind::Heading {
            level: level.clamp(1, 6),
        }
    }

    pub fn code(language: impl Into<String>) -> Self {
        ElementKind::Code {
            language: language.into(),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Paragraph => ElementType::Paragraph,
            ElementKind::Heading { .. } => ElementType::Heading,
            ElementKind::Blockquote => ElementType::Blockquote,
            ElementKind::BulletList => ElementType::BulletList,
            ElementKind::NumberList => ElementType::NumberList,
            ElementKind::ListItem => ElementType::ListItem,
            ElementKind::Code { .. } => ElementType::Code,
            ElementKind::CodeLine => ElementType::CodeLine,
            ElementKind::Link { .. } => ElementType::Link,
        }
    }

    pub fn container(&self) -> Option<ContainerKind> {
        match self {
            ElementKind::BulletList => Some(ContainerKind::BulletList),
            ElementKind::NumberList => Some(ContainerKind::NumberList),
            ElementKind::Code { .. } => Some(ContainerKind::Code),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.container().is_some()
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ElementKind::Link { .. })
    }

    /// Elements that take part in block selection.
    pub fn is_selectable(&self) -> bool {
        matches!(
            self,
            ElementKind::Heading { .. }
                | ElementKind::Paragraph
                | ElementKind::Blockquote
                | ElementKind::ListItem
                | ElementKind::Code { .. }
        )
    }

    /// Elements whose children are text runs and inline elements.
    pub fn is_text_block(&self) -> bool {
        !self.is_container() && !self.is_inline()
    }

    pub fn placeholder(&self) -> Option<String> {
        match self {
            ElementKind::Paragraph => Some(DEFAULT_PLACEHOLDER.to_string()),
            ElementKind::Heading { level } => Some(format!("Heading {level}")),
            ElementKind::Blockquote => Some("Empty quote".to_string()),
            ElementKind::ListItem => Some("Empty list item".to_string()),
            ElementKind::Code { .. } => Some("Empty code block".to_string()),
            ElementKind::BulletList
            | ElementKind::NumberList
            | ElementKind::CodeLine
            | ElementKind::Link { .. } => None,
        }
    }

    /// Builds the default node for this kind: containers get one templated
    /// child, everything else one empty text run.
    pub fn template(&self) -> ElementNode {
        let children = match self.container() {
            Some(container) => vec![Node::Element(container.child_template().template())],
            None => vec![Node::text("")],
        };
        ElementNode {
            kind: self.clone(),
            placeholder: self.placeholder(),
            children,
        }
    }
}

/// One entry of the "/" command picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub name: String,
    pub kind: ElementKind,
}

impl BlockEntry {
    fn new(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

pub fn block_catalog(code_language: &str) -> Vec<BlockEntry> {
    let mut entries: Vec<BlockEntry> = (1..=6)
        .map(|level| BlockEntry::new(format!("Heading {level}"), ElementKind::heading(level)))
        .collect();
    entries.push(BlockEntry::new("Blockquote", ElementKind::Blockquote));
    entries.push(BlockEntry::new("Bullet List", ElementKind::BulletList));
    entries.push(BlockEntry::new("Number List", ElementKind::NumberList));
    entries.push(BlockEntry::new("Code", ElementKind::code(code_language)));
    entries
}

/// Case-insensitive substring match on the entry name.
pub fn filter_blocks(entries: &[BlockEntry], query: &str) -> Vec<BlockEntry> {
    if query.is_empty() {
        return entries.to_vec();
    }
    let query = query.to_lowercase();
    entries
        .iter()
        .filter(|entry| entry.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}
