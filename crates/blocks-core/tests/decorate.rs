use manos_blocks_core::{
    Decoration, DecorationMap, Document, Editor, ElementKind, Node, Point, Selection,
    SyntectTokenizer, Token, Tokenizer, decorate_code_block,
};
use pretty_assertions::assert_eq;

fn code_block(language: &str, lines: &[&str]) -> Node {
    Node::element(
        ElementKind::code(language),
        lines
            .iter()
            .map(|line| Node::element(ElementKind::CodeLine, vec![Node::text(*line)]))
            .collect(),
    )
}

fn plain(range: std::ops::Range<usize>) -> Decoration {
    Decoration {
        range,
        kinds: Vec::new(),
        token: true,
        fake_selection: false,
    }
}

fn kinded(range: std::ops::Range<usize>, kind: &str) -> Decoration {
    Decoration {
        kinds: vec![kind.to_string()],
        ..plain(range)
    }
}

#[test]
fn unknown_language_covers_each_line() {
    let editor = Editor::new(
        Document {
            children: vec![code_block("unknown-lang", &["let a", "", "b"])],
        },
        None,
    );

    let mut expected = DecorationMap::new();
    expected.insert(vec![0, 0], vec![plain(0..5)]);
    expected.insert(vec![0, 2], vec![plain(0..1)]);
    assert_eq!(editor.decorations(), &expected);
}

/// Ranges of `decorations` carrying `kind`, with touching ranges joined.
fn covered(decorations: &[Decoration], kind: &str) -> Vec<std::ops::Range<usize>> {
    let mut out: Vec<std::ops::Range<usize>> = Vec::new();
    for deco in decorations.iter().filter(|d| d.kinds.iter().any(|k| k == kind)) {
        match out.last_mut() {
            Some(last) if last.end == deco.range.start => last.end = deco.range.end,
            _ => out.push(deco.range.clone()),
        }
    }
    out
}

#[test]
fn multi_line_tokens_are_split_per_line() {
    let lines = vec!["/* a".to_string(), "b */ x".to_string()];
    let map = decorate_code_block(&[3], "js", &lines, &SyntectTokenizer::new());

    assert_eq!(covered(&map[&vec![3, 0]], "comment"), vec![0..4]);
    assert_eq!(covered(&map[&vec![3, 1]], "comment"), vec![0..4]);
    assert!(map[&vec![3, 1]].iter().all(|d| d.range.end <= 6));
}

#[test]
fn keywords_and_numbers_are_labelled() {
    let editor = Editor::new(
        Document {
            children: vec![code_block("tsx", &["const x = 1;"])],
        },
        None,
    );
    let line = editor.decorate(&[0, 0]);
    assert!(line.iter().any(|d| d.range == (0..5) && !d.kinds.is_empty()));
    assert_eq!(covered(&line, "constant"), vec![10..11]);
}

#[test]
fn cache_follows_edits() {
    let caret = Selection::collapsed(Point::new(vec![1, 0, 0], 0));
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("p"), code_block("unknown-lang", &[""])],
        },
        Some(caret),
    );
    assert!(editor.decorations().is_empty());

    editor.insert_text("abc");
    assert_eq!(editor.decorations()[&vec![1, 0]], vec![plain(0..3)]);

    editor.set_selection(Some(Selection::collapsed(Point::new(vec![0, 0], 0))));
    editor.insert_block(&ElementKind::heading(1), Some(vec![0]));
    assert!(editor.decorations().contains_key(&vec![2, 0]));
    assert!(!editor.decorations().contains_key(&vec![1, 0]));
}

#[test]
fn leaf_gets_its_share_of_the_line() {
    let editor = Editor::new(
        Document {
            children: vec![code_block("unknown-lang", &["abcdef"])],
        },
        None,
    );
    assert_eq!(editor.decorate(&[0, 0, 0]), vec![plain(0..6)]);
}

#[test]
fn paths_outside_the_document_have_no_decorations() {
    let editor = Editor::new(
        Document {
            children: vec![code_block("unknown-lang", &["abc"])],
        },
        None,
    );
    assert!(editor.decorate(&[0, 0, 5]).is_empty());
    assert!(editor.decorate(&[3, 0]).is_empty());
}

#[test]
fn fake_selection_is_decorated() {
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 1),
        focus: Point::new(vec![0, 0], 3),
    };
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("hello")],
        },
        Some(selection),
    );
    assert!(editor.decorate(&[0, 0]).is_empty());

    assert!(editor.preserve_selection());
    editor.deselect();
    assert_eq!(
        editor.decorate(&[0, 0]),
        vec![Decoration {
            range: 1..3,
            kinds: Vec::new(),
            token: false,
            fake_selection: true,
        }]
    );

    editor.clear_fake_selection();
    assert!(editor.decorate(&[0, 0]).is_empty());
}

struct Shouting;

impl Tokenizer for Shouting {
    fn supports(&self, _language: &str) -> bool {
        true
    }

    fn tokenize(&self, code: &str, _language: &str) -> Vec<Token> {
        vec![Token {
            kinds: vec!["shout".to_string()],
            text: code.to_string(),
        }]
    }
}

#[test]
fn tokenizer_can_be_replaced() {
    let editor = Editor::new(
        Document {
            children: vec![code_block("anything", &["hi"])],
        },
        None,
    )
    .with_tokenizer(Box::new(Shouting));
    assert_eq!(editor.decorations()[&vec![0, 0]], vec![kinded(0..2, "shout")]);
}
