//! Code-block tokenizing on top of syntect's bundled Sublime grammars.
//!
//! Token kinds are the leading scope atoms on syntect's scope stack below the
//! syntax root, so `string.quoted.double.js` labels a token `string`. Purely
//! structural `meta.*` scopes are left out.

use std::sync::OnceLock;

use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token-kind labels, empty for unclassified text.
    pub kinds: Vec<String>,
    pub text: String,
}

impl Token {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kinds: Vec::new(),
            text: text.into(),
        }
    }
}

/// Splits source text into tokens that cover it exactly, in order.
pub trait Tokenizer {
    fn supports(&self, language: &str) -> bool;
    fn tokenize(&self, code: &str, language: &str) -> Vec<Token>;
}

fn default_syntaxes() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Tokenizer over syntect's default syntax set. Unknown languages produce a
/// single unclassified token.
#[derive(Debug, Clone, Copy)]
pub struct SyntectTokenizer {
    syntaxes: &'static SyntaxSet,
}

impl Default for SyntectTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntectTokenizer {
    pub fn new() -> Self {
        Self {
            syntaxes: default_syntaxes(),
        }
    }

    fn find_syntax(&self, language: &str) -> Option<&'static SyntaxReference> {
        let language = language.trim().to_ascii_lowercase();
        let token = match language.as_str() {
            "" => return None,
            "ts" | "typescript" | "tsx" | "jsx" | "javascript" => "js",
            "shell" | "zsh" => "sh",
            other => other,
        };
        self.syntaxes.find_syntax_by_token(token)
    }
}

fn labels(stack: &ScopeStack) -> Vec<String> {
    let mut kinds: Vec<String> = Vec::new();
    for scope in stack.as_slice().iter().skip(1) {
        let name = scope.build_string();
        let atom = name.split('.').next().unwrap_or_default();
        if atom.is_empty() || atom == "meta" || kinds.iter().any(|k| k == atom) {
            continue;
        }
        kinds.push(atom.to_string());
    }
    kinds
}

fn push_token(out: &mut Vec<Token>, text: &str, kinds: Vec<String>) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.kinds == kinds => last.text.push_str(text),
        _ => out.push(Token {
            kinds,
            text: text.to_string(),
        }),
    }
}

impl Tokenizer for SyntectTokenizer {
    fn supports(&self, language: &str) -> bool {
        self.find_syntax(language).is_some()
    }

    fn tokenize(&self, code: &str, language: &str) -> Vec<Token> {
        if code.is_empty() {
            return Vec::new();
        }
        let Some(syntax) = self.find_syntax(language) else {
            return vec![Token::plain(code)];
        };

        let mut state = ParseState::new(syntax);
        let mut stack = ScopeStack::new();
        let mut out: Vec<Token> = Vec::new();
        let mut consumed = 0usize;

        for line in LinesWithEndings::from(code) {
            let ops = match state.parse_line(line, self.syntaxes) {
                Ok(ops) => ops,
                Err(err) => {
                    tracing::warn!(language, "syntax parse failed, rest stays plain: {err}");
                    push_token(&mut out, &code[consumed..], Vec::new());
                    return out;
                }
            };

            let mut cursor = 0usize;
            for (at, op) in ops {
                let at = at.min(line.len());
                if at > cursor {
                    push_token(&mut out, &line[cursor..at], labels(&stack));
                    cursor = at;
                }
                if let Err(err) = stack.apply(&op) {
                    tracing::warn!(language, "bad scope op: {err:?}");
                }
            }
            push_token(&mut out, &line[cursor..], labels(&stack));
            consumed += line.len();
        }
        out
    }
}
