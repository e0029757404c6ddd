use std::{collections::HashSet, rc::Rc};

use crate::{
    ast::{
        Annotation, BinaryOp, ClassDecl, Expr, ExprKind, FunctionDecl, IfBranch, Literal,
        MemberDecl, NativeBlock, Param, Program, Stmt, StmtKind, UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{self, Keyword, Token, TokenKind},
};

/// Parses a complete program. Only `adopt`, `keep`/`share keep` and
/// expression statements are accepted at the top level.
pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = lexer::tokenize(source)?;
    parse(tokens)
}

/// Parses interactive input, where any statement may appear at the top level.
pub fn parse_snippet(source: &str) -> Result<Program, Diagnostic> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(tokens, Mode::Snippet).parse_program()
}

pub fn parse(tokens: Vec<Token>) -> Result<Program, Diagnostic> {
    Parser::new(tokens, Mode::Program).parse_program()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Program,
    Snippet,
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    mode: Mode,
}

impl Parser {
    fn new(mut tokens: Vec<Token>, mode: Mode) -> Self {
        if !matches!(tokens.last(), Some(token) if token.kind == TokenKind::Eof) {
            let end = tokens.last().map(|token| token.span.end).unwrap_or(0);
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                span: SourceSpan::new(end, end),
            });
        }
        Self {
            tokens,
            current: 0,
            mode,
        }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        self.skip_newlines();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_top_level()?);
            self.skip_newlines();
        }
        Ok(Program { items })
    }

    fn parse_top_level(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Adopt) => self.parse_adopt(),
            TokenKind::Keyword(Keyword::Share) => {
                let start = self.advance().span.start;
                if !self.check_keyword(Keyword::Keep) {
                    return Err(self.expected("`keep` after `share`"));
                }
                let mut stmt = self.parse_keep(true)?;
                stmt.span.start = start;
                Ok(stmt)
            }
            TokenKind::Keyword(Keyword::Keep) => self.parse_keep(false),
            TokenKind::Keyword(Keyword::If | Keyword::Go | Keyword::Stay | Keyword::Return)
                if self.mode == Mode::Program =>
            {
                let token = self.peek();
                Err(Diagnostic::new(
                    DiagnosticKind::Parse,
                    format!("expected declaration or expression at top level, found {}", describe(token)),
                )
                .with_span(token.span)
                .with_note("control flow belongs inside a function body"))
            }
            _ if self.mode == Mode::Program => self.parse_expression_statement(false),
            _ => self.parse_statement(),
        }
    }

    fn parse_adopt(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Adopt)?.span.start;
        let first = self.consume_identifier("module name after `adopt`")?;
        let mut end = first.span.end;
        let mut path = vec![first.lexeme];
        while self.matches(TokenKind::Dot) {
            let segment = self.consume_identifier("module segment after `.`")?;
            end = segment.span.end;
            path.push(segment.lexeme);
        }
        self.end_statement()?;
        Ok(Stmt {
            kind: StmtKind::Adopt { path },
            span: SourceSpan { start, end },
        })
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Keep) => self.parse_keep(false),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Go) => self.parse_go(),
            TokenKind::Keyword(Keyword::Stay) => self.parse_stay(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Share) => Err(self.restricted("`share` is only allowed at module or class level")),
            TokenKind::Keyword(Keyword::Adopt) => Err(self.restricted("`adopt` is only allowed at the top level")),
            _ => self.parse_expression_statement(true),
        }
    }

    /// `keep name [: annotation] [= expr]`, returning the pieces shared by
    /// variable declarations and class members.
    fn parse_declaration(
        &mut self,
    ) -> Result<(String, Option<Annotation>, Option<Expr>, SourceSpan), Diagnostic> {
        let start = self.consume_keyword(Keyword::Keep)?.span.start;
        let name_token = self.consume_identifier("binding name after `keep`")?;
        let mut end = name_token.span.end;
        let annotation = if self.matches(TokenKind::Colon) {
            let annotation = self.parse_annotation()?;
            end = self.previous().span.end;
            Some(annotation)
        } else {
            None
        };
        let initializer = if self.matches(TokenKind::Assign) {
            let mut value = self.parse_expression()?;
            end = value.span.end;
            name_expression(&mut value, &name_token.lexeme);
            Some(value)
        } else {
            None
        };
        self.end_statement()?;
        Ok((name_token.lexeme, annotation, initializer, SourceSpan { start, end }))
    }

    fn parse_keep(&mut self, shared: bool) -> Result<Stmt, Diagnostic> {
        let (name, annotation, initializer, span) = self.parse_declaration()?;
        Ok(Stmt {
            kind: StmtKind::Keep {
                name,
                shared,
                annotation,
                initializer,
            },
            span,
        })
    }

    fn parse_annotation(&mut self) -> Result<Annotation, Diagnostic> {
        if self.matches_keyword(Keyword::Native) {
            return Ok(Annotation::Native);
        }
        let ident = self.consume_identifier("type annotation")?;
        Ok(Annotation::Named(ident.lexeme))
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        self.skip_newlines();
        let start = self.consume(TokenKind::LBrace, "`{` to start block")?.span.start;
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                break;
            }
            if self.check(TokenKind::Eof) {
                return Err(self.expected("`}` to close block"));
            }
            items.push(self.parse_statement()?);
        }
        let end = self.advance().span.end;
        Ok((items, SourceSpan { start, end }))
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span.start;
        let condition = self.parse_expression()?;
        let (body, mut span) = self.parse_block()?;
        let mut branches = vec![IfBranch { condition, body }];
        let mut else_branch = None;
        while self.newlines_then_keyword(Keyword::Else) {
            self.skip_newlines();
            self.advance();
            if self.matches_keyword(Keyword::If) {
                let condition = self.parse_expression()?;
                let (body, body_span) = self.parse_block()?;
                span = body_span;
                branches.push(IfBranch { condition, body });
            } else {
                let (body, body_span) = self.parse_block()?;
                span = body_span;
                else_branch = Some(body);
                break;
            }
        }
        self.end_statement()?;
        Ok(Stmt {
            kind: StmtKind::If {
                branches,
                else_branch,
            },
            span: SourceSpan {
                start,
                end: span.end,
            },
        })
    }

    fn parse_go(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Go)?.span.start;
        let iterable = self.parse_expression()?;
        self.consume_keyword(Keyword::By)?;
        let binding = self.consume_identifier("loop binding after `by`")?;
        let (body, span) = self.parse_block()?;
        self.end_statement()?;
        Ok(Stmt {
            kind: StmtKind::Go {
                iterable,
                binding: binding.lexeme,
                body,
            },
            span: SourceSpan {
                start,
                end: span.end,
            },
        })
    }

    fn parse_stay(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Stay)?.span.start;
        let condition = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        self.end_statement()?;
        Ok(Stmt {
            kind: StmtKind::Stay { condition, body },
            span: SourceSpan {
                start,
                end: span.end,
            },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        let expr = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.end_statement()?;
        let end = expr.as_ref().map(|e| e.span.end).unwrap_or(token.span.end);
        Ok(Stmt {
            span: SourceSpan {
                start: token.span.start,
                end,
            },
            kind: StmtKind::Return(expr),
        })
    }

    fn parse_expression_statement(&mut self, allow_assignment: bool) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        let op = match self.peek().kind {
            TokenKind::Assign => Some(None),
            TokenKind::PlusAssign => Some(Some(BinaryOp::Add)),
            TokenKind::MinusAssign => Some(Some(BinaryOp::Sub)),
            TokenKind::StarAssign => Some(Some(BinaryOp::Mul)),
            TokenKind::SlashAssign => Some(Some(BinaryOp::Div)),
            _ => None,
        };
        let Some(op) = op else {
            self.end_statement()?;
            return Ok(Stmt {
                span: expr.span,
                kind: StmtKind::Expr(expr),
            });
        };
        let operator = self.advance();
        if !allow_assignment {
            return Err(Diagnostic::new(
                DiagnosticKind::Parse,
                "expected declaration or expression at top level, found assignment",
            )
            .with_span(operator.span)
            .with_note("declare the binding with `keep` instead"));
        }
        if !matches!(
            expr.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            return Err(
                Diagnostic::new(DiagnosticKind::Parse, "invalid assignment target")
                    .with_span(expr.span),
            );
        }
        let mut value = self.parse_expression()?;
        if let (None, ExprKind::Identifier(name)) = (op, &expr.kind) {
            name_expression(&mut value, name);
        }
        self.end_statement()?;
        Ok(Stmt {
            span: expr.span.to(value.span),
            kind: StmtKind::Assign {
                target: expr,
                op,
                value,
            },
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::DoublePipe) {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::DoubleAmpersand) {
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = if self.matches(TokenKind::EqualEqual) {
            Some(BinaryOp::Equal)
        } else if self.matches(TokenKind::BangEqual) {
            Some(BinaryOp::NotEqual)
        } else {
            None
        } {
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_range()?;
        while let Some(op) = if self.matches(TokenKind::LessEqual) {
            Some(BinaryOp::LessEqual)
        } else if self.matches(TokenKind::GreaterEqual) {
            Some(BinaryOp::GreaterEqual)
        } else if self.matches(TokenKind::Less) {
            Some(BinaryOp::Less)
        } else if self.matches(TokenKind::Greater) {
            Some(BinaryOp::Greater)
        } else {
            None
        } {
            let right = self.parse_range()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    /// `a to b` binds looser than arithmetic and tighter than comparison.
    fn parse_range(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.parse_term()?;
        if !self.matches_keyword(Keyword::To) {
            return Ok(start);
        }
        let end = self.parse_term()?;
        Ok(Expr {
            span: start.span.to(end.span),
            kind: ExprKind::Range {
                start: Box::new(start),
                end: Box::new(end),
            },
        })
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = if self.matches(TokenKind::Plus) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenKind::Minus) {
            Some(BinaryOp::Sub)
        } else {
            None
        } {
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = if self.matches(TokenKind::Star) {
            Some(BinaryOp::Mul)
        } else if self.matches(TokenKind::Slash) {
            Some(BinaryOp::Div)
        } else if self.matches(TokenKind::Percent) {
            Some(BinaryOp::Mod)
        } else {
            None
        } {
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let operator = self.previous().span;
        let right = self.parse_unary()?;
        Ok(Expr {
            span: operator.to(right.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(right),
            },
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let args = self.parse_arguments()?;
                let paren = self.consume(TokenKind::RParen, "`)` after arguments")?;
                expr = Expr {
                    span: expr.span.to(paren.span),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let bracket = self.consume(TokenKind::RBracket, "`]` after index")?;
                expr = Expr {
                    span: expr.span.to(bracket.span),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.matches(TokenKind::Dot) {
                let ident = self.consume_identifier("member name after `.`")?;
                expr = Expr {
                    span: expr.span.to(ident.span),
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        member: ident.lexeme,
                    },
                };
            } else if self.matches(TokenKind::ColonColon) {
                let ident = self.consume_identifier("name after `::`")?;
                expr = Expr {
                    span: expr.span.to(ident.span),
                    kind: ExprKind::Namespace {
                        target: Box::new(expr),
                        member: ident.lexeme,
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::new();
        self.skip_newlines();
        if self.check(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            self.skip_newlines();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Keyword(Keyword::Yes) | TokenKind::Keyword(Keyword::No) => {
                self.advance();
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Literal(Literal::Bool(
                        token.kind == TokenKind::Keyword(Keyword::Yes),
                    )),
                })
            }
            TokenKind::Number => {
                self.advance();
                let literal = if token.lexeme.contains('.') {
                    token.lexeme.parse().map(Literal::Float).ok()
                } else {
                    token.lexeme.parse().map(Literal::Int).ok()
                };
                let literal = literal.ok_or_else(|| {
                    Diagnostic::new(
                        DiagnosticKind::Parse,
                        format!("number literal `{}` is out of range", token.lexeme),
                    )
                    .with_span(token.span)
                })?;
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Literal(literal),
                })
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Literal(Literal::String(token.lexeme)),
                })
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Identifier(token.lexeme),
                })
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LParen => {
                if self.is_function_literal() {
                    self.parse_function()
                } else {
                    let lparen = self.advance();
                    self.skip_newlines();
                    let inner = self.parse_expression()?;
                    self.skip_newlines();
                    let rparen = self.consume(TokenKind::RParen, "`)` after expression")?;
                    Ok(Expr {
                        span: lparen.span.to(rparen.span),
                        kind: inner.kind,
                    })
                }
            }
            TokenKind::Keyword(Keyword::Makeout) => self.parse_makeout(),
            TokenKind::Keyword(Keyword::Boy) => self.parse_class(),
            TokenKind::Keyword(Keyword::Native) => self.parse_native(),
            _ => Err(self.expected("expression")),
        }
    }

    fn parse_list(&mut self) -> Result<Expr, Diagnostic> {
        let lbracket = self.consume(TokenKind::LBracket, "`[`")?;
        let mut elements = Vec::new();
        self.skip_newlines();
        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            self.skip_newlines();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        let rbracket = self.consume(TokenKind::RBracket, "`]` after list literal")?;
        Ok(Expr {
            span: lbracket.span.to(rbracket.span),
            kind: ExprKind::List(elements),
        })
    }

    fn parse_makeout(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.consume_keyword(Keyword::Makeout)?.span;
        let name = self.consume_identifier("class name after `makeout`")?;
        let mut class = Expr {
            span: name.span,
            kind: ExprKind::Identifier(name.lexeme),
        };
        while self.matches(TokenKind::ColonColon) {
            let member = self.consume_identifier("name after `::`")?;
            class = Expr {
                span: class.span.to(member.span),
                kind: ExprKind::Namespace {
                    target: Box::new(class),
                    member: member.lexeme,
                },
            };
        }
        self.consume(TokenKind::LParen, "`(` after class name")?;
        let args = self.parse_arguments()?;
        let rparen = self.consume(TokenKind::RParen, "`)` after arguments")?;
        Ok(Expr {
            span: start.to(rparen.span),
            kind: ExprKind::Makeout {
                class: Box::new(class),
                args,
            },
        })
    }

    fn parse_native(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.consume_keyword(Keyword::Native)?.span;
        self.consume(TokenKind::FatArrow, "`=>` after `native`")?;
        let body = self.consume(TokenKind::NativeBody, "`{` to open native block")?;
        Ok(Expr {
            span: start.to(body.span),
            kind: ExprKind::Native(NativeBlock {
                code: body.lexeme,
                target: None,
            }),
        })
    }

    fn parse_class(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.consume_keyword(Keyword::Boy)?.span;
        let parent = if self.matches(TokenKind::Colon) {
            let parent = self.consume_identifier("parent class name after `:`")?;
            Some((parent.lexeme, parent.span))
        } else {
            None
        };
        self.skip_newlines();
        self.consume(TokenKind::LBrace, "`{` to open class body")?;
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                break;
            }
            let shared = self.matches_keyword(Keyword::Share);
            if !self.check_keyword(Keyword::Keep) {
                return Err(self.expected("member declaration in class body"));
            }
            let (name, annotation, value, span) = self.parse_declaration()?;
            if !seen.insert(name.clone()) {
                return Err(Diagnostic::new(
                    DiagnosticKind::Parse,
                    format!("duplicate member `{name}` in class body"),
                )
                .with_span(span));
            }
            members.push(MemberDecl {
                name,
                shared,
                annotation,
                value,
                span,
            });
        }
        let end = self.advance().span;
        let span = start.to(end);
        Ok(Expr {
            span,
            kind: ExprKind::Class(Rc::new(ClassDecl {
                name: String::new(),
                parent,
                members,
                span,
            })),
        })
    }

    /// Looks past the balanced parentheses at the cursor for `=>`.
    fn is_function_literal(&self) -> bool {
        let mut depth = 0usize;
        let mut idx = self.current;
        while let Some(token) = self.tokens.get(idx) {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
        idx += 1;
        while matches!(self.tokens.get(idx), Some(token) if token.kind == TokenKind::Newline) {
            idx += 1;
        }
        matches!(self.tokens.get(idx), Some(token) if token.kind == TokenKind::FatArrow)
    }

    fn parse_function(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.consume(TokenKind::LParen, "`(` to start parameters")?.span;
        let mut params: Vec<Param> = Vec::new();
        self.skip_newlines();
        while !self.check(TokenKind::RParen) {
            let param = self.parse_param()?;
            if let Some(previous) = params.iter().find(|p| p.variadic) {
                return Err(Diagnostic::new(
                    DiagnosticKind::Parse,
                    format!(
                        "variadic parameter `{}` must be the last parameter",
                        previous.name
                    ),
                )
                .with_span(param.span));
            }
            params.push(param);
            self.skip_newlines();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.consume(TokenKind::RParen, "`)` after parameters")?;
        self.skip_newlines();
        self.consume(TokenKind::FatArrow, "`=>` after parameters")?;
        self.skip_newlines();
        let (body, end) = if self.check(TokenKind::LBrace) {
            self.parse_block()?
        } else {
            let expr = self.parse_expression()?;
            let span = expr.span;
            (
                vec![Stmt {
                    kind: StmtKind::Return(Some(expr)),
                    span,
                }],
                span,
            )
        };
        let span = start.to(end);
        Ok(Expr {
            span,
            kind: ExprKind::Function(Rc::new(FunctionDecl { params, body, span })),
        })
    }

    fn parse_param(&mut self) -> Result<Param, Diagnostic> {
        let name = self.consume_identifier("parameter name")?;
        let mut span = name.span;
        let variadic = self.matches(TokenKind::Ellipsis);
        if variadic {
            span = span.to(self.previous().span);
        }
        let annotation = if self.matches(TokenKind::Colon) {
            Some(self.parse_annotation()?)
        } else {
            None
        };
        Ok(Param {
            name: name.lexeme,
            annotation,
            variadic,
            span,
        })
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn end_statement(&mut self) -> Result<(), Diagnostic> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.skip_newlines();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.expected("end of statement")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    fn newlines_then_keyword(&self, keyword: Keyword) -> bool {
        self.tokens[self.current..]
            .iter()
            .find(|token| token.kind != TokenKind::Newline)
            .is_some_and(|token| token.kind == TokenKind::Keyword(keyword))
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.expected(expected))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let expected = format!("`{}`", keyword.as_str());
        self.consume(TokenKind::Keyword(keyword), &expected)
    }

    fn consume_identifier(&mut self, expected: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, expected)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.check(TokenKind::Keyword(keyword))
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn expected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        Diagnostic::new(
            DiagnosticKind::Parse,
            format!("expected {expected}, found {}", describe(token)),
        )
        .with_span(token.span)
    }

    fn restricted(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parse, message.to_string()).with_span(self.peek().span)
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier => format!("identifier `{}`", token.lexeme),
        TokenKind::Number => format!("number `{}`", token.lexeme),
        TokenKind::String => format!("string \"{}\"", token.lexeme),
        _ => token.kind.to_string(),
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span.to(right.span),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

/// Class literals take the name of the binding they initialize; native
/// blocks remember which slot receives the host's result.
fn name_expression(expr: &mut Expr, name: &str) {
    match &mut expr.kind {
        ExprKind::Class(decl) => {
            if let Some(decl) = Rc::get_mut(decl) {
                decl.name = name.to_string();
            }
        }
        ExprKind::Native(block) => block.target = Some(name.to_string()),
        _ => {}
    }
}
