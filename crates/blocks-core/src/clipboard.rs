//! Clipboard payloads and the plain-text block formats.
//!
//! A copy fills three slots: the exact nodes as JSON, a markdown-ish plain
//! text rendition, and a neutral rich-text marker so receivers that prefer
//! HTML do not paste browser markup.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

use crate::core::{ElementNode, Node};
use crate::schema::ElementKind;

pub const BLOCKS_MIME: &str = "text/@articles-blocks";
pub const PLAIN_MIME: &str = "text/plain";
pub const HTML_MIME: &str = "text/html";
pub const HTML_PLACEHOLDER: &str = "</>";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl ClipboardData {
    pub fn from_plain(text: impl Into<String>) -> Self {
        Self {
            plain: Some(text.into()),
            ..Self::default()
        }
    }

    /// All three slots for a set of copied blocks.
    pub fn from_nodes(nodes: &[Node]) -> Result<Self, serde_json::Error> {
        Ok(Self {
            blocks: Some(serialize_structured(nodes)?),
            plain: Some(serialize_plain(nodes)),
            html: Some(HTML_PLACEHOLDER.to_string()),
        })
    }

    pub fn get(&self, mime: &str) -> Option<&str> {
        let slot = match mime {
            BLOCKS_MIME => &self.blocks,
            PLAIN_MIME => &self.plain,
            HTML_MIME => &self.html,
            _ => return None,
        };
        slot.as_deref().filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, mime: &str, value: impl Into<String>) -> bool {
        let slot = match mime {
            BLOCKS_MIME => &mut self.blocks,
            PLAIN_MIME => &mut self.plain,
            HTML_MIME => &mut self.html,
            _ => return false,
        };
        *slot = Some(value.into());
        true
    }

    /// Nodes from the structured slot. A malformed payload is logged and
    /// reported as absent.
    pub fn structured_nodes(&self) -> Option<Vec<Node>> {
        let json = self.get(BLOCKS_MIME)?;
        match deserialize_structured(json) {
            Ok(nodes) => Some(nodes),
            Err(err) => {
                tracing::warn!("ignoring malformed {BLOCKS_MIME} payload: {err}");
                None
            }
        }
    }
}

pub fn serialize_structured(nodes: &[Node]) -> Result<String, serde_json::Error> {
    serde_json::to_string(nodes)
}

pub fn deserialize_structured(json: &str) -> Result<Vec<Node>, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn serialize_plain(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|node| match node {
            Node::Element(ElementNode {
                kind: ElementKind::Heading { level },
                ..
            }) => format!("{} {}", "#".repeat(usize::from(*level)), node.text_content()),
            Node::Element(ElementNode {
                kind: ElementKind::Blockquote,
                ..
            }) => format!("> {}", node.text_content().replace('\n', "\n> ")),
            _ => node.text_content(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns pasted plain text into blocks.
pub trait MarkdownParser {
    fn parse(&self, text: &str) -> Vec<Node>;
}

/// Headings, paragraphs and block quotes at the top level; every other
/// construct is dropped. Line breaks split a paragraph into one block per
/// line, and become `\n` inside a quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulldownMarkdown;

enum Frame {
    Paragraph,
    Heading(u8),
    Quote,
    QuoteParagraph,
    Skip,
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn block(kind: ElementKind, text: String) -> Node {
    Node::Element(ElementNode::new(kind, vec![Node::text(text)]))
}

impl MarkdownParser for PulldownMarkdown {
    fn parse(&self, text: &str) -> Vec<Node> {
        let mut out: Vec<Node> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut line = String::new();
        let mut quote = String::new();

        let flush_line = |line: &mut String, out: &mut Vec<Node>| {
            if !line.is_empty() {
                out.push(block(ElementKind::Paragraph, std::mem::take(line)));
            }
        };

        for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
            match event {
                Event::Start(tag) => {
                    let frame = match (&tag, stack.last()) {
                        (
                            Tag::Emphasis
                            | Tag::Strong
                            | Tag::Strikethrough
                            | Tag::Link { .. }
                            | Tag::Image { .. },
                            _,
                        ) => continue,
                        (_, Some(Frame::Skip)) => Frame::Skip,
                        (Tag::Paragraph, None) => Frame::Paragraph,
                        (Tag::Paragraph, Some(Frame::Quote)) => Frame::QuoteParagraph,
                        (Tag::Heading { level, .. }, None) => Frame::Heading(heading_level(*level)),
                        (Tag::BlockQuote(_), None) => Frame::Quote,
                        _ => Frame::Skip,
                    };
                    line.clear();
                    stack.push(frame);
                }
                Event::End(
                    TagEnd::Emphasis
                    | TagEnd::Strong
                    | TagEnd::Strikethrough
                    | TagEnd::Link
                    | TagEnd::Image,
                ) => {}
                Event::End(_) => match stack.pop() {
                    Some(Frame::Paragraph) => flush_line(&mut line, &mut out),
                    Some(Frame::Heading(level)) => {
                        out.push(block(ElementKind::heading(level), std::mem::take(&mut line)));
                    }
                    Some(Frame::QuoteParagraph) => {
                        if !quote.is_empty() {
                            quote.push('\n');
                        }
                        quote.push_str(&std::mem::take(&mut line));
                    }
                    Some(Frame::Quote) => {
                        out.push(block(ElementKind::Blockquote, std::mem::take(&mut quote)));
                    }
                    Some(Frame::Skip) | None => {}
                },
                Event::Text(t) | Event::Code(t) => {
                    if matches!(
                        stack.last(),
                        Some(Frame::Paragraph | Frame::Heading(_) | Frame::QuoteParagraph)
                    ) {
                        line.push_str(&t);
                    }
                }
                Event::SoftBreak | Event::HardBreak => match stack.last() {
                    Some(Frame::Paragraph) => flush_line(&mut line, &mut out),
                    Some(Frame::QuoteParagraph) => line.push('\n'),
                    Some(Frame::Heading(_)) => line.push(' '),
                    _ => {}
                },
                _ => {}
            }
        }
        out
    }
}
