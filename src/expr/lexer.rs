//! Tokenizer for the expression language.

use super::ExprError;

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Const,
    Continue,
    Else,
    For,
    If,
    In,
    Let,
    Return,
    This,
    Throw,
    Typeof,
    Var,
    While,
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Keyword> {
        Some(match s {
            "break" => Keyword::Break,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "if" => Keyword::If,
            "in" => Keyword::In,
            "let" => Keyword::Let,
            "return" => Keyword::Return,
            "this" => Keyword::This,
            "throw" => Keyword::Throw,
            "typeof" => Keyword::Typeof,
            "var" => Keyword::Var,
            "while" => Keyword::While,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Break => "break",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::If => "if",
            Keyword::In => "in",
            Keyword::Let => "let",
            Keyword::Return => "return",
            Keyword::This => "this",
            Keyword::Throw => "throw",
            Keyword::Typeof => "typeof",
            Keyword::Var => "var",
            Keyword::While => "while",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Eof,
    Ident(String),
    Keyword(Keyword),
    Null,
    True,
    False,
    Number(f64),
    Str(String),
    /// Template text followed by `${`.
    TemplatePart(String),
    /// Final template text.
    TemplateTail(String),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    DotDotDot,
    Semicolon,
    Comma,
    Question,
    QuestionDot,
    Colon,
    Arrow,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    PlusPlus,
    MinusMinus,

    Bang,
    AmpAmp,
    PipePipe,
    QuestionQuestion,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    QuestionQuestionAssign,
}

/// What a `}` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nest {
    Brace,
    /// A `${` substitution; `bare` marks a template without backticks.
    Substitution { bare: bool },
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    pub line: usize,
    pub col: usize,
    nesting: Vec<Nest>,
    /// Set for a bare template until its first part has been read.
    pending_bare: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            nesting: Vec::new(),
            pending_bare: false,
        }
    }

    /// Lex `input` as the inside of a template literal: text with `${}`
    /// substitutions that runs to end of input.
    pub fn bare_template(input: &str) -> Self {
        Self {
            pending_bare: true,
            ..Self::new(input)
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn err(&self, msg: impl Into<String>) -> ExprError {
        ExprError::Syntax {
            message: msg.into(),
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == '\u{FEFF}' => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            None => break,
                            _ => {}
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token, ExprError> {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                digits.push(c);
                self.advance();
            }
            return u64::from_str_radix(&digits, 16)
                .map(|n| Token::Number(n as f64))
                .map_err(|_| self.err("invalid hex literal"));
        }

        let mut s = String::from(first);
        self.read_digits(&mut s);
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.advance();
            self.read_digits(&mut s);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            s.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                s.push(sign);
                self.advance();
            }
            self.read_digits(&mut s);
        }
        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.err(format!("invalid number literal: {s}")))
    }

    fn read_digits(&mut self, s: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
            } else if c != '_' {
                break;
            }
            self.advance();
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ExprError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some('\\') => s.push_str(&self.read_escape()?),
                Some('\n') => return Err(self.err("newline in string literal")),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_escape(&mut self) -> Result<String, ExprError> {
        let c = self.advance().ok_or_else(|| self.err("unterminated escape"))?;
        Ok(match c {
            'n' => "\n".into(),
            't' => "\t".into(),
            'r' => "\r".into(),
            '0' => "\0".into(),
            'b' => "\u{0008}".into(),
            'f' => "\u{000C}".into(),
            'v' => "\u{000B}".into(),
            'x' => self.read_code_point(2)?.to_string(),
            'u' if self.peek() == Some('{') => {
                self.advance();
                let mut hex = String::new();
                while let Some(c) = self.advance() {
                    if c == '}' {
                        break;
                    }
                    hex.push(c);
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.err("invalid \\u{} escape"))?
                    .to_string()
            }
            'u' => self.read_code_point(4)?.to_string(),
            '\n' => String::new(),
            other => other.to_string(),
        })
    }

    fn read_code_point(&mut self, digits: usize) -> Result<char, ExprError> {
        let mut hex = String::new();
        for _ in 0..digits {
            hex.push(self.advance().ok_or_else(|| self.err("unexpected end in escape"))?);
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.err(format!("invalid escape \\{hex}")))
    }

    /// Read template text up to the closing backtick (or end of input for a
    /// bare template) or the next `${`.
    fn read_template_part(&mut self, bare: bool) -> Result<Token, ExprError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None if bare => return Ok(Token::TemplateTail(s)),
                None => return Err(self.err("unterminated template literal")),
                Some('`') if !bare => return Ok(Token::TemplateTail(s)),
                Some('$') if self.peek() == Some('{') => {
                    self.advance();
                    self.nesting.push(Nest::Substitution { bare });
                    return Ok(Token::TemplatePart(s));
                }
                Some('\\') => s.push_str(&self.read_escape()?),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_identifier(&mut self, first: char) -> Token {
        let mut name = String::from(first);
        while let Some(c) = self.peek().filter(|&c| is_id_continue(c)) {
            name.push(c);
            self.advance();
        }
        match name.as_str() {
            "null" => Token::Null,
            "true" => Token::True,
            "false" => Token::False,
            // `of` is contextual; the parser checks for it by name.
            _ => match Keyword::from_ident(&name) {
                Some(kw) => Token::Keyword(kw),
                None => Token::Ident(name),
            },
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ExprError> {
        if self.pending_bare {
            self.pending_bare = false;
            return self.read_template_part(true);
        }

        self.skip_whitespace_and_comments();

        let Some(c) = self.advance() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => {
                self.nesting.push(Nest::Brace);
                Token::LBrace
            }
            '}' => match self.nesting.pop() {
                Some(Nest::Substitution { bare }) => return self.read_template_part(bare),
                _ => Token::RBrace,
            },
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' if self.peek() == Some('.') && self.peek_at(1) == Some('.') => {
                self.advance();
                self.advance();
                Token::DotDotDot
            }
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                let mut s = String::from("0.");
                self.read_digits(&mut s);
                Token::Number(s.parse().map_err(|_| self.err("invalid number"))?)
            }
            '.' => Token::Dot,
            '?' => {
                if self.eat('?') {
                    if self.eat('=') {
                        Token::QuestionQuestionAssign
                    } else {
                        Token::QuestionQuestion
                    }
                } else if self.peek() == Some('.')
                    && !self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                {
                    self.advance();
                    Token::QuestionDot
                } else {
                    Token::Question
                }
            }
            '=' => {
                if self.eat('>') {
                    Token::Arrow
                } else if self.eat('=') {
                    if self.eat('=') {
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::BangEqEq
                    } else {
                        Token::BangEq
                    }
                } else {
                    Token::Bang
                }
            }
            '+' => {
                if self.eat('+') {
                    Token::PlusPlus
                } else if self.eat('=') {
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Token::MinusMinus
                } else if self.eat('=') {
                    Token::MinusAssign
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    Token::StarStar
                } else if self.eat('=') {
                    Token::StarAssign
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    Token::SlashAssign
                } else {
                    Token::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    Token::PercentAssign
                } else {
                    Token::Percent
                }
            }
            '&' if self.eat('&') => Token::AmpAmp,
            '|' if self.eat('|') => Token::PipePipe,
            '<' => {
                if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '`' => return self.read_template_part(false),
            '\'' | '"' => return self.read_string(c),
            '0'..='9' => return self.read_number(c),
            _ if is_id_start(c) => self.read_identifier(c),
            other => return Err(self.err(format!("unexpected character {other:?}"))),
        };
        Ok(token)
    }

    /// Lex everything up to end of input.
    pub fn tokenize_all(&mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }
}

fn is_id_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_id_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
