use std::fmt;

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Adopt,
    Keep,
    Share,
    Go,
    By,
    Stay,
    If,
    Else,
    Return,
    Boy,
    Makeout,
    Native,
    To,
    Yes,
    No,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Adopt => "adopt",
            Keyword::Keep => "keep",
            Keyword::Share => "share",
            Keyword::Go => "go",
            Keyword::By => "by",
            Keyword::Stay => "stay",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::Return => "return",
            Keyword::Boy => "boy",
            Keyword::Makeout => "makeout",
            Keyword::Native => "native",
            Keyword::To => "to",
            Keyword::Yes => "YES",
            Keyword::No => "NO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    /// Raw foreign code of a `native => { ... }` block, braces excluded.
    NativeBody,
    Newline,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Ellipsis,
    Colon,
    ColonColon,
    FatArrow,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    DoubleAmpersand,
    DoublePipe,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Keyword(kw) => return write!(f, "`{}`", kw.as_str()),
            TokenKind::NativeBody => "native block body",
            TokenKind::Newline => "newline",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Dot => "`.`",
            TokenKind::Ellipsis => "`...`",
            TokenKind::Colon => "`:`",
            TokenKind::ColonColon => "`::`",
            TokenKind::FatArrow => "`=>`",
            TokenKind::Assign => "`=`",
            TokenKind::PlusAssign => "`+=`",
            TokenKind::MinusAssign => "`-=`",
            TokenKind::StarAssign => "`*=`",
            TokenKind::SlashAssign => "`/=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::DoubleAmpersand => "`&&`",
            TokenKind::DoublePipe => "`||`",
            TokenKind::Bang => "`!`",
            TokenKind::BangEqual => "`!=`",
            TokenKind::EqualEqual => "`==`",
            TokenKind::Less => "`<`",
            TokenKind::LessEqual => "`<=`",
            TokenKind::Greater => "`>`",
            TokenKind::GreaterEqual => "`>=`",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some((idx, ch)) = self.peeked.take() {
            Some((idx, ch))
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// Looks `n` characters past the next unconsumed one.
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.current..].chars().nth(n)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if let Some((_, ch)) = self.peek() {
            if ch == expected {
                self.bump();
                return true;
            }
        }
        false
    }

    fn advance_to(&mut self, offset: usize) {
        while self.current < offset {
            if self.bump().is_none() {
                break;
            }
        }
    }

    fn collect_while<F>(&mut self, start: usize, mut predicate: F) -> String
    where
        F: FnMut(char) -> bool,
    {
        let mut end = self.current;
        while let Some((idx, ch)) = self.peek() {
            if predicate(ch) {
                self.bump();
                end = idx + ch.len_utf8();
            } else {
                break;
            }
        }
        self.source[start..end].to_string()
    }

    fn skip_blanks_and_comments(&mut self) {
        while let Some((_, ch)) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => {
                    while let Some((_, ch)) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        let lexeme = self.collect_while(start, |ch| ch.is_alphanumeric() || ch == '_');
        let end = self.current;
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            span: SourceSpan { start, end },
        }
    }

    fn number_literal(&mut self, start: usize) -> Token {
        self.collect_while(start, |ch| ch.is_ascii_digit());
        if self.peek_nth(0) == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.collect_while(start, |ch| ch.is_ascii_digit());
        }
        let end = self.current;
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        let mut end = self.current;
        let mut value = String::new();
        while let Some((idx, ch)) = self.bump() {
            end = idx + ch.len_utf8();
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        span: SourceSpan { start, end },
                    });
                }
                '\n' => break,
                '\\' => {
                    if let Some((esc_idx, esc)) = self.bump() {
                        end = esc_idx + esc.len_utf8();
                        match esc {
                            'n' => value.push('\n'),
                            'r' => value.push('\r'),
                            't' => value.push('\t'),
                            '0' => value.push('\0'),
                            '"' => value.push('"'),
                            '\\' => value.push('\\'),
                            other => {
                                value.push('\\');
                                value.push(other);
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => value.push(ch),
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lex, "unterminated string literal")
                .with_span(SourceSpan { start, end }),
        )
    }

    /// After `native`, checks for `=> {` and captures everything up to the
    /// matching brace verbatim. Braces inside quoted strings and `//` or
    /// `/* */` comments of the foreign code do not count.
    fn native_block(&mut self, tokens: &mut Vec<Token>) -> Result<(), Diagnostic> {
        let bytes = self.source.as_bytes();
        let mut pos = self.current;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if !self.source[pos..].starts_with("=>") {
            return Ok(());
        }
        let arrow = SourceSpan::new(pos, pos + 2);
        pos += 2;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'{') {
            return Ok(());
        }
        let open = pos;
        let close = matching_brace(bytes, open).ok_or_else(|| {
            Diagnostic::new(DiagnosticKind::Lex, "unterminated native block")
                .with_span(SourceSpan::new(open, bytes.len()))
        })?;
        tokens.push(Token {
            kind: TokenKind::FatArrow,
            lexeme: "=>".into(),
            span: arrow,
        });
        tokens.push(Token {
            kind: TokenKind::NativeBody,
            lexeme: self.source[open + 1..close].to_string(),
            span: SourceSpan::new(open, close + 1),
        });
        self.advance_to(close + 1);
        Ok(())
    }

    fn simple_token(&mut self, start: usize, kind: TokenKind) -> Token {
        let end = self.current;
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    fn unexpected(&self, start: usize, ch: char) -> Diagnostic {
        let diag = Diagnostic::new(DiagnosticKind::Lex, format!("unexpected character `{ch}`"))
            .with_span(SourceSpan::new(start, start + ch.len_utf8()));
        match ch {
            '&' => diag.with_note("did you mean `&&`?"),
            '|' => diag.with_note("did you mean `||`?"),
            _ => diag,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            self.skip_blanks_and_comments();
            let (start, ch) = match self.bump() {
                Some(pair) => pair,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        span: SourceSpan {
                            start: self.current,
                            end: self.current,
                        },
                    });
                    break;
                }
            };

            let token = match ch {
                '\n' => {
                    if matches!(tokens.last(), Some(last) if last.kind == TokenKind::Newline) {
                        continue;
                    }
                    self.simple_token(start, TokenKind::Newline)
                }
                c if c.is_alphabetic() || c == '_' => {
                    let token = self.identifier_or_keyword(start);
                    if token.kind == TokenKind::Keyword(Keyword::Native) {
                        tokens.push(token);
                        self.native_block(&mut tokens)?;
                        continue;
                    }
                    token
                }
                '0'..='9' => self.number_literal(start),
                '"' => self.string_literal(start)?,
                '(' => self.simple_token(start, TokenKind::LParen),
                ')' => self.simple_token(start, TokenKind::RParen),
                '{' => self.simple_token(start, TokenKind::LBrace),
                '}' => self.simple_token(start, TokenKind::RBrace),
                '[' => self.simple_token(start, TokenKind::LBracket),
                ']' => self.simple_token(start, TokenKind::RBracket),
                ',' => self.simple_token(start, TokenKind::Comma),
                '.' => {
                    if self.peek_nth(0) == Some('.') && self.peek_nth(1) == Some('.') {
                        self.bump();
                        self.bump();
                        self.simple_token(start, TokenKind::Ellipsis)
                    } else {
                        self.simple_token(start, TokenKind::Dot)
                    }
                }
                ':' => {
                    if self.match_next(':') {
                        self.simple_token(start, TokenKind::ColonColon)
                    } else {
                        self.simple_token(start, TokenKind::Colon)
                    }
                }
                '+' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::PlusAssign)
                    } else {
                        self.simple_token(start, TokenKind::Plus)
                    }
                }
                '-' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::MinusAssign)
                    } else {
                        self.simple_token(start, TokenKind::Minus)
                    }
                }
                '*' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::StarAssign)
                    } else {
                        self.simple_token(start, TokenKind::Star)
                    }
                }
                '/' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::SlashAssign)
                    } else {
                        self.simple_token(start, TokenKind::Slash)
                    }
                }
                '%' => self.simple_token(start, TokenKind::Percent),
                '=' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::EqualEqual)
                    } else if self.match_next('>') {
                        self.simple_token(start, TokenKind::FatArrow)
                    } else {
                        self.simple_token(start, TokenKind::Assign)
                    }
                }
                '!' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::BangEqual)
                    } else {
                        self.simple_token(start, TokenKind::Bang)
                    }
                }
                '<' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::LessEqual)
                    } else {
                        self.simple_token(start, TokenKind::Less)
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::GreaterEqual)
                    } else {
                        self.simple_token(start, TokenKind::Greater)
                    }
                }
                '&' if self.match_next('&') => self.simple_token(start, TokenKind::DoubleAmpersand),
                '|' if self.match_next('|') => self.simple_token(start, TokenKind::DoublePipe),
                other => return Err(self.unexpected(start, other)),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = open;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != quote {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                continue;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                    pos += 1;
                }
                pos += 1;
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "adopt" => Kw::Adopt,
        "keep" => Kw::Keep,
        "share" => Kw::Share,
        "go" => Kw::Go,
        "by" => Kw::By,
        "stay" => Kw::Stay,
        "if" => Kw::If,
        "else" => Kw::Else,
        "return" => Kw::Return,
        "boy" => Kw::Boy,
        "makeout" => Kw::Makeout,
        "native" => Kw::Native,
        "to" => Kw::To,
        "YES" => Kw::Yes,
        "NO" => Kw::No,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
