use clonk::lexer::token::TokenKind;
use clonk::lexer::TokenStream;

fn kinds(source: &str) -> Vec<TokenKind<'_>> {
    let mut ts = TokenStream::new(source);
    let mut kinds = Vec::new();
    loop {
        let token = ts.next();
        let done = token.kind == TokenKind::Eof || token.kind == TokenKind::Unknown;
        kinds.push(token.kind);
        if done {
            break;
        }
    }
    kinds
}

#[test]
fn lexes_declaration() {
    assert_eq!(
        kinds("auto x = 1+2;"),
        vec![
            TokenKind::Auto,
            TokenKind::Identifier("x"),
            TokenKind::Equal,
            TokenKind::Number(1),
            TokenKind::Plus,
            TokenKind::Number(2),
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lexes_operators_with_lookahead() {
    assert_eq!(
        kinds("<< <= < >> >= > == = != ! && & || | ~ ^"),
        vec![
            TokenKind::ShiftLeft,
            TokenKind::LessEqual,
            TokenKind::Less,
            TokenKind::ShiftRight,
            TokenKind::GreaterEqual,
            TokenKind::Greater,
            TokenKind::EqualEqual,
            TokenKind::Equal,
            TokenKind::BangEqual,
            TokenKind::Bang,
            TokenKind::AmpAmp,
            TokenKind::Amp,
            TokenKind::PipePipe,
            TokenKind::Pipe,
            TokenKind::Tilde,
            TokenKind::Caret,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lexes_adjacent_operator_characters() {
    // Maximal munch: `a<<=b` is `a << = b`, not `a < <= b`.
    assert_eq!(
        kinds("a<<=b"),
        vec![
            TokenKind::Identifier("a"),
            TokenKind::ShiftLeft,
            TokenKind::Equal,
            TokenKind::Identifier("b"),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn keywords_are_distinguished_from_identifiers() {
    assert_eq!(
        kinds("register returned while1 if"),
        vec![
            TokenKind::Register,
            TokenKind::Identifier("returned"),
            TokenKind::Identifier("while1"),
            TokenKind::If,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn skips_line_comments_and_tracks_lines() {
    let mut ts = TokenStream::new("a // trailing comment\nbcd / 2");
    let a = ts.next();
    assert_eq!(a.kind, TokenKind::Identifier("a"));
    assert_eq!((a.line, a.column), (1, 1));

    let b = ts.next();
    assert_eq!(b.kind, TokenKind::Identifier("bcd"));
    assert_eq!((b.line, b.column), (2, 1));

    let slash = ts.next();
    assert_eq!(slash.kind, TokenKind::Slash);
    assert_eq!((slash.line, slash.column), (2, 5));

    assert_eq!(ts.next().kind, TokenKind::Number(2));
    assert!(ts.empty());
}

#[test]
fn peek_caches_one_token() {
    let mut ts = TokenStream::new("x y");
    assert_eq!(ts.peek().kind, TokenKind::Identifier("x"));
    assert_eq!(ts.peek().kind, TokenKind::Identifier("x"));
    assert_eq!(ts.next().kind, TokenKind::Identifier("x"));
    assert_eq!(ts.next().kind, TokenKind::Identifier("y"));
    assert!(ts.empty());
}

#[test]
fn unknown_byte_aborts_the_stream() {
    let mut ts = TokenStream::new("x $ y");
    assert_eq!(ts.next().kind, TokenKind::Identifier("x"));
    let unknown = ts.next();
    assert_eq!(unknown.kind, TokenKind::Unknown);
    assert_eq!((unknown.line, unknown.column), (1, 3));
    assert_eq!(ts.next().kind, TokenKind::Eof);
    assert_eq!(ts.next().kind, TokenKind::Eof);
}

#[test]
fn reports_the_current_line() {
    let mut ts = TokenStream::new("first\nsecond line");
    ts.next();
    assert_eq!(ts.current_line(), "first");
    ts.next();
    assert_eq!(ts.current_line_number(), 2);
    assert_eq!(ts.current_line(), "second line");
}
