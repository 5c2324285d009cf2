//! Pratt parser producing [`ast`](super::ast) nodes.

use std::rc::Rc;

use super::ExprError;
use super::ast::*;
use super::lexer::{Keyword, Lexer, Token};

/// Deepest statement or expression nesting a program may use.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Binding power of binary operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    NullishCoalesce = 1,
    LogicalOr,
    LogicalAnd,
    Equality,
    Relational,
    Additive,
    Multiplicative,
    Exponentiation,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::NullishCoalesce => Prec::LogicalOr,
            Prec::LogicalOr => Prec::LogicalAnd,
            Prec::LogicalAnd => Prec::Equality,
            Prec::Equality => Prec::Relational,
            Prec::Relational => Prec::Additive,
            Prec::Additive => Prec::Multiplicative,
            Prec::Multiplicative | Prec::Exponentiation => Prec::Exponentiation,
        }
    }
}

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
    col: usize,
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn from_lexer(mut lexer: Lexer) -> Result<Self, ExprError> {
        let mut tokens = Vec::new();
        loop {
            let (line, col) = (lexer.line, lexer.col);
            let token = lexer.next_token()?;
            let done = token == Token::Eof;
            tokens.push(Spanned { token, line, col });
            if done {
                break;
            }
        }
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
        })
    }

    pub fn new(source: &str) -> Result<Self, ExprError> {
        Self::from_lexer(Lexer::new(source))
    }

    /// Parse a statement list running to end of input.
    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, ExprError> {
        let mut body = Vec::new();
        while !self.at(&Token::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    /// Parse `source` as the inside of a template literal.
    pub fn parse_bare_template(source: &str) -> Result<Expr, ExprError> {
        let mut parser = Self::from_lexer(Lexer::bare_template(source))?;
        let template = parser.parse_template()?;
        parser.expect(&Token::Eof)?;
        Ok(template)
    }

    // ── token helpers ──

    fn current(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .or(self.tokens.last())
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn at(&self, token: &Token) -> bool {
        self.current() == token
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current(), Token::Keyword(k) if *k == keyword)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{token:?}")))
        }
    }

    fn unexpected(&self, wanted: &str) -> ExprError {
        self.error(format!("expected {wanted}, found {:?}", self.current()))
    }

    fn error(&self, message: String) -> ExprError {
        let (line, col) = self
            .tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map(|s| (s.line, s.col))
            .unwrap_or((1, 1));
        ExprError::Syntax { message, line, col }
    }

    /// Go one nesting level deeper, failing past [`MAX_NESTING_DEPTH`].
    fn descend(&mut self) -> Result<(), ExprError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_ident(&mut self) -> Result<String, ExprError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, found {other:?}")))
            }
        }
    }

    fn eat_semicolon(&mut self) {
        self.eat(&Token::Semicolon);
    }

    // ── statements ──

    fn parse_statement(&mut self) -> Result<Stmt, ExprError> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Stmt, ExprError> {
        match self.current() {
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Keyword(Keyword::Let | Keyword::Const | Keyword::Var) => {
                let stmt = self.parse_declaration()?;
                self.eat_semicolon();
                Ok(stmt)
            }
            Token::Keyword(Keyword::If) => self.parse_if(),
            Token::Keyword(Keyword::For) => self.parse_for(),
            Token::Keyword(Keyword::While) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let test = self.parse_sequence()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body })
            }
            Token::Keyword(Keyword::Return) => {
                self.advance();
                let value = match self.current() {
                    Token::Semicolon | Token::RBrace | Token::Eof => None,
                    _ => Some(self.parse_sequence()?),
                };
                self.eat_semicolon();
                Ok(Stmt::Return(value))
            }
            Token::Keyword(Keyword::Throw) => {
                self.advance();
                let value = self.parse_sequence()?;
                self.eat_semicolon();
                Ok(Stmt::Throw(value))
            }
            Token::Keyword(Keyword::Break) => {
                self.advance();
                self.eat_semicolon();
                Ok(Stmt::Break)
            }
            Token::Keyword(Keyword::Continue) => {
                self.advance();
                self.eat_semicolon();
                Ok(Stmt::Continue)
            }
            _ => {
                let expr = self.parse_sequence()?;
                self.eat_semicolon();
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ExprError> {
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at(&Token::Eof) {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn decl_kind(&mut self) -> Option<DeclKind> {
        let kind = match self.current() {
            Token::Keyword(Keyword::Let) => DeclKind::Let,
            Token::Keyword(Keyword::Const) => DeclKind::Const,
            Token::Keyword(Keyword::Var) => DeclKind::Var,
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn parse_declaration(&mut self) -> Result<Stmt, ExprError> {
        let kind = self
            .decl_kind()
            .ok_or_else(|| self.unexpected("declaration"))?;
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else if kind == DeclKind::Const {
                return Err(self.error(format!("missing initializer in const `{name}`")));
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Stmt::Decl { kind, decls })
    }

    fn parse_if(&mut self) -> Result<Stmt, ExprError> {
        self.advance();
        self.expect(&Token::LParen)?;
        let test = self.parse_sequence()?;
        self.expect(&Token::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.at_keyword(Keyword::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ExprError> {
        self.advance();
        self.expect(&Token::LParen)?;

        // `for (let x of ...)` / `for (x in ...)`
        let declared = matches!(
            self.current(),
            Token::Keyword(Keyword::Let | Keyword::Const | Keyword::Var)
        );
        let name_offset = usize::from(declared);
        if let Token::Ident(_) = self.peek_at(name_offset) {
            let of = matches!(self.peek_at(name_offset + 1), Token::Ident(w) if w == "of");
            let in_ = matches!(self.peek_at(name_offset + 1), Token::Keyword(Keyword::In));
            if of || in_ {
                let kind = self.decl_kind();
                let name = self.expect_ident()?;
                self.advance();
                let iterable = self.parse_assignment()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForEach {
                    kind,
                    name,
                    of,
                    iterable,
                    body,
                });
            }
        }

        let init = if self.at(&Token::Semicolon) {
            None
        } else if declared {
            Some(Box::new(self.parse_declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_sequence()?)))
        };
        self.expect(&Token::Semicolon)?;
        let test = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_sequence()?)
        };
        self.expect(&Token::Semicolon)?;
        let update = if self.at(&Token::RParen) {
            None
        } else {
            Some(self.parse_sequence()?)
        };
        self.expect(&Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    // ── expressions ──

    /// Comma-separated expressions.
    pub fn parse_sequence(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_assignment()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn parse_assignment(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr, ExprError> {
        if self.arrow_ahead() {
            return self.parse_arrow();
        }

        let target = self.parse_conditional()?;
        let op = match self.current() {
            Token::Assign => AssignOp::Assign,
            Token::PlusAssign => AssignOp::Compound(BinaryOp::Add),
            Token::MinusAssign => AssignOp::Compound(BinaryOp::Sub),
            Token::StarAssign => AssignOp::Compound(BinaryOp::Mul),
            Token::SlashAssign => AssignOp::Compound(BinaryOp::Div),
            Token::PercentAssign => AssignOp::Compound(BinaryOp::Rem),
            Token::QuestionQuestionAssign => AssignOp::Nullish,
            _ => return Ok(target),
        };
        if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(self.error("invalid assignment target".into()));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.parse_binary(Prec::NullishCoalesce)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&Token::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn infix(&self) -> Option<(Infix, Prec)> {
        use BinaryOp::*;
        Some(match self.current() {
            Token::QuestionQuestion => (Infix::Logical(LogicalOp::Nullish), Prec::NullishCoalesce),
            Token::PipePipe => (Infix::Logical(LogicalOp::Or), Prec::LogicalOr),
            Token::AmpAmp => (Infix::Logical(LogicalOp::And), Prec::LogicalAnd),
            Token::EqEq => (Infix::Binary(Eq), Prec::Equality),
            Token::BangEq => (Infix::Binary(NotEq), Prec::Equality),
            Token::EqEqEq => (Infix::Binary(StrictEq), Prec::Equality),
            Token::BangEqEq => (Infix::Binary(StrictNotEq), Prec::Equality),
            Token::Lt => (Infix::Binary(Lt), Prec::Relational),
            Token::LtEq => (Infix::Binary(LtEq), Prec::Relational),
            Token::Gt => (Infix::Binary(Gt), Prec::Relational),
            Token::GtEq => (Infix::Binary(GtEq), Prec::Relational),
            Token::Keyword(Keyword::In) => (Infix::Binary(In), Prec::Relational),
            Token::Plus => (Infix::Binary(Add), Prec::Additive),
            Token::Minus => (Infix::Binary(Sub), Prec::Additive),
            Token::Star => (Infix::Binary(Mul), Prec::Multiplicative),
            Token::Slash => (Infix::Binary(Div), Prec::Multiplicative),
            Token::Percent => (Infix::Binary(Rem), Prec::Multiplicative),
            Token::StarStar => (Infix::Binary(Pow), Prec::Exponentiation),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min: Prec) -> Result<Expr, ExprError> {
        let outer = self.depth;
        let mut left = self.parse_unary()?;
        while let Some((infix, prec)) = self.infix() {
            if prec < min {
                break;
            }
            // Each operator nests the operands seen so far one level deeper.
            self.descend()?;
            self.advance();
            // `**` is right-associative.
            let right = if prec == Prec::Exponentiation {
                self.parse_binary(prec)?
            } else {
                self.parse_binary(prec.next())?
            };
            left = match infix {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Infix::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        self.depth = outer;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.current() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Keyword(Keyword::Typeof) => UnaryOp::Typeof,
            Token::PlusPlus | Token::MinusMinus => {
                let increment = self.advance() == Token::PlusPlus;
                let target = self.parse_unary()?;
                return self.update(increment, true, target);
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let arg = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            arg: Box::new(arg),
        })
    }

    fn update(&self, increment: bool, prefix: bool, target: Expr) -> Result<Expr, ExprError> {
        if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(self.error("invalid update target".into()));
        }
        Ok(Expr::Update {
            increment,
            prefix,
            target: Box::new(target),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let expr = self.parse_call_member()?;
        match self.current() {
            Token::PlusPlus | Token::MinusMinus => {
                let increment = self.advance() == Token::PlusPlus;
                self.update(increment, false, expr)
            }
            _ => Ok(expr),
        }
    }

    fn parse_call_member(&mut self) -> Result<Expr, ExprError> {
        let outer = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(
                self.current(),
                Token::Dot | Token::QuestionDot | Token::LBracket | Token::LParen
            ) {
                self.descend()?;
            }
            match self.current() {
                Token::Dot => {
                    self.advance();
                    let name = self.property_name()?;
                    expr = member(expr, Expr::Str(name), false);
                }
                Token::QuestionDot => {
                    self.advance();
                    match self.current() {
                        Token::LParen => {
                            let args = self.parse_arguments()?;
                            expr = Expr::Call {
                                callee: Box::new(expr),
                                args,
                                optional: true,
                            };
                        }
                        Token::LBracket => {
                            self.advance();
                            let property = self.parse_sequence()?;
                            self.expect(&Token::RBracket)?;
                            expr = member(expr, property, true);
                        }
                        _ => {
                            let name = self.property_name()?;
                            expr = member(expr, Expr::Str(name), true);
                        }
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let property = self.parse_sequence()?;
                    self.expect(&Token::RBracket)?;
                    expr = member(expr, property, false);
                }
                Token::LParen => {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    };
                }
                _ => {
                    self.depth = outer;
                    return Ok(expr);
                }
            }
        }
    }

    /// Identifier after `.`; reserved words are allowed here.
    fn property_name(&mut self) -> Result<String, ExprError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            Token::Keyword(kw) => Ok(kw.as_str().to_string()),
            Token::Null => Ok("null".into()),
            Token::True => Ok("true".into()),
            Token::False => Ok("false".into()),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected property name, found {other:?}")))
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Element>, ExprError> {
        self.expect(&Token::LParen)?;
        let args = self.parse_elements(&Token::RParen)?;
        Ok(args)
    }

    /// Comma-separated items up to `close`, allowing spreads and a trailing
    /// comma.
    fn parse_elements(&mut self, close: &Token) -> Result<Vec<Element>, ExprError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            if self.eat(&Token::DotDotDot) {
                items.push(Element::Spread(self.parse_assignment()?));
            } else {
                items.push(Element::Expr(self.parse_assignment()?));
            }
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.current().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expr::This)
            }
            Token::TemplatePart(_) | Token::TemplateTail(_) => self.parse_template(),
            Token::LParen => {
                self.advance();
                let expr = self.parse_sequence()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                Ok(Expr::Array(self.parse_elements(&Token::RBracket)?))
            }
            Token::LBrace => self.parse_object(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_template(&mut self) -> Result<Expr, ExprError> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        loop {
            match self.advance() {
                Token::TemplateTail(text) => {
                    quasis.push(text);
                    return Ok(Expr::Template { quasis, exprs });
                }
                Token::TemplatePart(text) => {
                    quasis.push(text);
                    exprs.push(self.parse_sequence()?);
                }
                other => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected `}}` in template, found {other:?}")));
                }
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ExprError> {
        self.expect(&Token::LBrace)?;
        let mut props = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.eat(&Token::DotDotDot) {
                props.push(Property::Spread(self.parse_assignment()?));
            } else if self.eat(&Token::LBracket) {
                let key = self.parse_assignment()?;
                self.expect(&Token::RBracket)?;
                self.expect(&Token::Colon)?;
                props.push(Property::Computed(key, self.parse_assignment()?));
            } else {
                let shorthand = matches!(self.current(), Token::Ident(_));
                let key = match self.current().clone() {
                    Token::Str(s) => {
                        self.advance();
                        s
                    }
                    Token::Number(n) => {
                        self.advance();
                        super::value::number_to_string(n)
                    }
                    _ => self.property_name()?,
                };
                if self.eat(&Token::Colon) {
                    props.push(Property::Named(key, self.parse_assignment()?));
                } else if shorthand {
                    props.push(Property::Named(key.clone(), Expr::Ident(key)));
                } else {
                    return Err(self.unexpected("`:`"));
                }
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }

    // ── arrows ──

    fn arrow_ahead(&self) -> bool {
        match self.current() {
            Token::Ident(_) => self.peek_at(1) == &Token::Arrow,
            Token::LParen => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match self.peek_at(offset) {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(offset + 1) == &Token::Arrow;
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, ExprError> {
        let mut params = Vec::new();
        if self.eat(&Token::LParen) {
            while !self.eat(&Token::RParen) {
                params.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    self.expect(&Token::RParen)?;
                    break;
                }
            }
        } else {
            params.push(self.expect_ident()?);
        }
        self.expect(&Token::Arrow)?;

        let body = if self.at(&Token::LBrace) {
            ArrowBody::Block(self.parse_block()?)
        } else {
            ArrowBody::Expr(self.parse_assignment()?)
        };
        Ok(Expr::Arrow(Rc::new(Arrow { params, body })))
    }
}

fn member(object: Expr, property: Expr, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property: Box::new(property),
        optional,
    }
}
