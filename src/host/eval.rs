//! Evaluator for host source snippets.
//!
//! Supports literals, identifiers, calls, array and tuple literals, the infix
//! operators `+ - * //`, unary minus and a top-level `name = expr`
//! assignment. Operators evaluate by calling the `Base` function of the same
//! name, so `1 + 2` and `+(1, 2)` are the same call.

use num_bigint::BigInt;

use crate::host::{Host, error::HostError, types::HostType, value::Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(String),
    Float(f64),
    Str(String),
    Char(char),
    Ident(String),
    Symbol(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    SlashSlash,
    Assign,
    Eof,
}

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            input: source.chars().collect(),
            position: 0,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn read_char(&mut self) -> Option<char> {
        let c = self.peek_char();
        self.position += 1;
        c
    }

    fn tokenize(mut self) -> Result<Vec<Token>, HostError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, HostError> {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.position += 1;
        }
        let Some(c) = self.read_char() else {
            return Ok(Token::Eof);
        };
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '=' => Token::Assign,
            '/' if self.peek_char() == Some('/') => {
                self.position += 1;
                Token::SlashSlash
            }
            '"' => Token::Str(self.read_string()?),
            '\'' => self.read_char_literal()?,
            ':' if self.peek_char().is_some_and(is_ident_start) => {
                Token::Symbol(self.read_ident_rest(String::new()))
            }
            c if c.is_ascii_digit() => self.read_number(c)?,
            c if is_ident_start(c) => Token::Ident(self.read_ident_rest(c.to_string())),
            other => {
                return Err(HostError::ParseError(format!(
                    "unexpected character {:?}",
                    other
                )));
            }
        };
        Ok(token)
    }

    fn read_ident_rest(&mut self, mut ident: String) -> String {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '!' {
                ident.push(c);
                self.position += 1;
            } else {
                break;
            }
        }
        ident
    }

    fn read_number(&mut self, first: char) -> Result<Token, HostError> {
        let mut text = first.to_string();
        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
            } else if c == '.' && !is_float && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                is_float = true;
                text.push(c);
            } else if c == 'e' || c == 'E' {
                is_float = true;
                text.push(c);
                if let Some(sign @ ('+' | '-')) = self.peek_next() {
                    text.push(sign);
                    self.position += 1;
                }
            } else {
                break;
            }
            self.position += 1;
        }
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| HostError::ParseError(format!("invalid number `{}`", text)))
        } else {
            Ok(Token::Int(text))
        }
    }

    fn read_escape(&mut self) -> Result<char, HostError> {
        match self.read_char() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some(other) => Err(HostError::ParseError(format!(
                "invalid escape sequence \\{}",
                other
            ))),
            None => Err(HostError::ParseError("incomplete escape sequence".into())),
        }
    }

    fn read_string(&mut self) -> Result<String, HostError> {
        let mut text = String::new();
        loop {
            match self.read_char() {
                Some('"') => return Ok(text),
                Some('\\') => text.push(self.read_escape()?),
                Some(c) => text.push(c),
                None => return Err(HostError::ParseError("unterminated string literal".into())),
            }
        }
    }

    fn read_char_literal(&mut self) -> Result<Token, HostError> {
        let c = match self.read_char() {
            Some('\\') => self.read_escape()?,
            Some(c) => c,
            None => return Err(HostError::ParseError("unterminated character literal".into())),
        };
        match self.read_char() {
            Some('\'') => Ok(Token::Char(c)),
            _ => Err(HostError::ParseError("character literal must hold one character".into())),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Ident(String),
    Call(Box<Expr>, Vec<Expr>),
    Array(Vec<Expr>),
    Tuple(Vec<Expr>),
    Assign(String, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Sum,     // +, -
    Product, // *, //
    Prefix,  // -x
}

fn infix(token: &Token) -> Option<(Precedence, &'static str)> {
    match token {
        Token::Plus => Some((Precedence::Sum, "+")),
        Token::Minus => Some((Precedence::Sum, "-")),
        Token::Star => Some((Precedence::Product, "*")),
        Token::SlashSlash => Some((Precedence::Product, "//")),
        _ => None,
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), HostError> {
        let token = self.advance();
        if token == expected {
            Ok(())
        } else {
            Err(HostError::ParseError(format!(
                "expected {:?}, found {:?}",
                expected, token
            )))
        }
    }

    fn parse_program(&mut self) -> Result<Expr, HostError> {
        let expr = match (self.current().clone(), self.tokens.get(self.position + 1)) {
            (Token::Ident(name), Some(Token::Assign)) => {
                self.position += 2;
                Expr::Assign(name, Box::new(self.parse_expression(Precedence::Lowest)?))
            }
            _ => self.parse_expression(Precedence::Lowest)?,
        };
        match self.current() {
            Token::Eof => Ok(expr),
            other => Err(HostError::ParseError(format!(
                "extra token {:?} after end of expression",
                other
            ))),
        }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expr, HostError> {
        let mut left = self.parse_prefix()?;
        while let Some((next, name)) = infix(self.current()) {
            if next <= precedence {
                break;
            }
            self.advance();
            let right = self.parse_expression(next)?;
            left = Expr::Call(Box::new(Expr::Ident(name.to_string())), vec![left, right]);
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, HostError> {
        let expr = match self.advance() {
            Token::Int(digits) => Expr::Literal(int_literal(&digits)?),
            Token::Float(v) => Expr::Literal(Value::Float64(v)),
            Token::Str(s) => Expr::Literal(Value::string(&s)),
            Token::Char(c) => Expr::Literal(Value::Char(c)),
            Token::Symbol(s) => Expr::Literal(Value::symbol(&s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "nothing" => Expr::Literal(Value::Nothing),
                _ => Expr::Ident(name),
            },
            Token::Minus => {
                let operand = self.parse_expression(Precedence::Prefix)?;
                Expr::Call(Box::new(Expr::Ident("-".to_string())), vec![operand])
            }
            Token::LBracket => Expr::Array(self.parse_list(Token::RBracket)?.0),
            Token::LParen => {
                let (items, trailing_comma) = self.parse_list(Token::RParen)?;
                if items.len() == 1 && !trailing_comma {
                    items.into_iter().next().unwrap_or(Expr::Tuple(Vec::new()))
                } else {
                    Expr::Tuple(items)
                }
            }
            other => {
                return Err(HostError::ParseError(format!("unexpected token {:?}", other)));
            }
        };
        self.parse_calls(expr)
    }

    fn parse_calls(&mut self, mut expr: Expr) -> Result<Expr, HostError> {
        while *self.current() == Token::LParen {
            self.advance();
            let (args, _) = self.parse_list(Token::RParen)?;
            expr = Expr::Call(Box::new(expr), args);
        }
        Ok(expr)
    }

    /// Parses comma-separated expressions up to `close`. Also reports whether
    /// the list ended with a trailing comma.
    fn parse_list(&mut self, close: Token) -> Result<(Vec<Expr>, bool), HostError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        while *self.current() != close {
            items.push(self.parse_expression(Precedence::Lowest)?);
            trailing_comma = false;
            if *self.current() == Token::Comma {
                self.advance();
                trailing_comma = true;
            } else {
                break;
            }
        }
        self.expect(close)?;
        Ok((items, trailing_comma))
    }
}

fn int_literal(digits: &str) -> Result<Value, HostError> {
    if let Ok(small) = digits.parse::<i64>() {
        return Ok(Value::Int64(small));
    }
    digits
        .parse::<BigInt>()
        .map(Value::bigint)
        .map_err(|_| HostError::ParseError(format!("invalid integer `{}`", digits)))
}

fn eval(host: &mut Host, expr: &Expr) -> Result<Value, HostError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => host
            .global(name)
            .ok_or_else(|| HostError::UndefVar(name.clone())),
        Expr::Call(callee, args) => {
            let callee = eval(host, callee)?;
            let args = args
                .iter()
                .map(|arg| eval(host, arg))
                .collect::<Result<Vec<_>, _>>()?;
            match callee {
                Value::Function(function) => host.call(&function, &args),
                other => Err(HostError::ErrorException(format!(
                    "objects of type {} are not callable",
                    other.type_name()
                ))),
            }
        }
        Expr::Array(items) => {
            let items = items
                .iter()
                .map(|item| eval(host, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(HostType::common(&items), items))
        }
        Expr::Tuple(items) => {
            let items = items
                .iter()
                .map(|item| eval(host, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::tuple(items))
        }
        Expr::Assign(name, value) => {
            let value = eval(host, value)?;
            host.set_global(name, value.clone());
            Ok(value)
        }
    }
}

pub(crate) fn eval_source(host: &mut Host, source: &str) -> Result<Value, HostError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let expr = parser.parse_program()?;
    eval(host, &expr)
}
