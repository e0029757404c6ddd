use femboy::{
    diagnostics::DiagnosticKind,
    lexer::{tokenize, Keyword, TokenKind},
};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .expect("source should lex")
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn keywords_and_identifiers() {
    assert_eq!(
        kinds("keep boyish = YES"),
        vec![
            TokenKind::Keyword(Keyword::Keep),
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Keyword(Keyword::Yes),
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        kinds("go xs by x"),
        vec![
            TokenKind::Keyword(Keyword::Go),
            TokenKind::Identifier,
            TokenKind::Keyword(Keyword::By),
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
    // Boolean literals are case sensitive.
    assert_eq!(kinds("yes")[0], TokenKind::Identifier);
}

#[test]
fn operators_take_longest_match() {
    assert_eq!(
        kinds("a += b == c != d => e :: f ... g <= h >= i && j || k"),
        vec![
            TokenKind::Identifier,
            TokenKind::PlusAssign,
            TokenKind::Identifier,
            TokenKind::EqualEqual,
            TokenKind::Identifier,
            TokenKind::BangEqual,
            TokenKind::Identifier,
            TokenKind::FatArrow,
            TokenKind::Identifier,
            TokenKind::ColonColon,
            TokenKind::Identifier,
            TokenKind::Ellipsis,
            TokenKind::Identifier,
            TokenKind::LessEqual,
            TokenKind::Identifier,
            TokenKind::GreaterEqual,
            TokenKind::Identifier,
            TokenKind::DoubleAmpersand,
            TokenKind::Identifier,
            TokenKind::DoublePipe,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn numbers_only_take_a_dot_followed_by_digits() {
    let tokens = tokenize("3.14 1.foo 42").expect("source should lex");
    let lexemes: Vec<_> = tokens.iter().map(|token| token.lexeme.as_str()).collect();
    assert_eq!(lexemes, vec!["3.14", "1", ".", "foo", "42", ""]);
}

#[test]
fn strings_decode_escapes() {
    let tokens = tokenize(r#""line\n\t\"quoted\" \\ done""#).expect("source should lex");
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].lexeme, "line\n\t\"quoted\" \\ done");
}

#[test]
fn comments_are_skipped_and_newlines_collapse() {
    assert_eq!(
        kinds("a # trailing comment\n\n\n# whole line\nb"),
        vec![
            TokenKind::Identifier,
            TokenKind::Newline,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn spans_cover_the_lexeme() {
    let tokens = tokenize("keep  name").expect("source should lex");
    assert_eq!((tokens[1].span.start, tokens[1].span.end), (6, 10));
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let err = tokenize("keep s = \"open\nkeep t = 1").expect_err("should fail");
    assert_eq!(err.kind, DiagnosticKind::Lex);
    assert!(err.message.contains("unterminated string"));
}

#[test]
fn stray_characters_are_rejected() {
    let err = tokenize("a @ b").expect_err("should fail");
    assert_eq!(err.kind, DiagnosticKind::Lex);

    let err = tokenize("a & b").expect_err("should fail");
    assert_eq!(err.notes, vec!["did you mean `&&`?".to_string()]);
}

#[test]
fn native_block_body_is_one_raw_token() {
    let tokens = tokenize("keep x = native => { if (a) { b(\"}\") } }\nx").expect("source should lex");
    let kinds: Vec<_> = tokens.iter().map(|token| token.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Keyword(Keyword::Keep),
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Keyword(Keyword::Native),
            TokenKind::FatArrow,
            TokenKind::NativeBody,
            TokenKind::Newline,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
    assert_eq!(tokens[5].lexeme.trim(), "if (a) { b(\"}\") }");
}

#[test]
fn native_annotation_is_not_a_block() {
    assert_eq!(
        kinds("keep slot: native\nslot"),
        vec![
            TokenKind::Keyword(Keyword::Keep),
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::Keyword(Keyword::Native),
            TokenKind::Newline,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn unterminated_native_block_is_a_lex_error() {
    let err = tokenize("native => { never { closed }").expect_err("should fail");
    assert_eq!(err.kind, DiagnosticKind::Lex);
    assert!(err.message.contains("unterminated native block"));
}
