//! Markdown shortcuts typed at the start of a block.

use crate::core::{Editor, Selection};
use crate::edit::{block_offset, delete_range};
use crate::ops::Op;
use crate::schema::ElementKind;

/// Block kind for a typed prefix such as `##` or `>`.
pub fn shortcut_kind(prefix: &str) -> Option<ElementKind> {
    match prefix {
        ">" => Some(ElementKind::Blockquote),
        _ if !prefix.is_empty() && prefix.len() <= 6 && prefix.bytes().all(|b| b == b'#') => {
            u8::try_from(prefix.len()).ok().map(ElementKind::heading)
        }
        _ => None,
    }
}

impl Editor {
    /// Retypes the current block when `text` completes a shortcut. The
    /// shortcut characters are removed and the trailing space is swallowed.
    /// Inside a container the normalizer gives the block its child kind back,
    /// so the shortcut only clears the typed prefix there.
    pub(crate) fn autoformat(&mut self, text: &str) -> bool {
        let Some(typed) = text.strip_suffix(' ') else {
            return false;
        };
        let Some(sel) = self.selection().filter(|sel| sel.is_collapsed()).cloned() else {
            return false;
        };
        let Some(block) = self.current_block() else {
            return false;
        };
        let offset = block_offset(self.doc(), &block, &sel.focus);
        let before = self
            .doc()
            .element(&block)
            .map(|el| el.text_content())
            .unwrap_or_default();
        let Some(prefix) = before.get(..offset) else {
            return false;
        };
        let Some(kind) = shortcut_kind(&format!("{prefix}{typed}")) else {
            return false;
        };

        let applied = self.transact("autoformat", |draft| {
            let Some(start) = draft.doc().start_point(&block) else {
                return Ok(false);
            };
            delete_range(draft, &start, &sel.focus)?;
            draft.apply(Op::SetKind {
                path: block.clone(),
                placeholder: kind.placeholder(),
                kind: kind.clone(),
            })?;
            let caret = draft.doc().start_point(&block);
            draft.set_selection(caret.map(Selection::collapsed));
            Ok(true)
        });
        match applied {
            Ok(applied) => {
                if applied {
                    tracing::debug!(?kind, ?block, "autoformatted block");
                }
                applied
            }
            Err(_) => false,
        }
    }
}
