//! Hikefile lexer (external collaborator, C4.12): turns the raw text of
//! one hikefile into a flat [`Token`] stream. Whitespace, line endings,
//! and `#`-to-end-of-line comments are skipped between tokens.

use std::path::PathBuf;
use std::rc::Rc;

use crate::error::{BuildError, BuildErrorKind, Result};
use crate::location::Location;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Str(String),
    LBrace,
    RBrace,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    path: Rc<PathBuf>,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(source: &str, path: Rc<PathBuf>) -> Self {
        Self { chars: source.chars().collect(), pos: 0, path, line: 1, column: 1 }
    }

    fn here(&self) -> Location {
        Location::new(self.path.clone(), self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let location = self.here();
        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, location });
        };

        if c == '{' {
            self.advance();
            return Ok(Token { kind: TokenKind::LBrace, location });
        }
        if c == '}' {
            self.advance();
            return Ok(Token { kind: TokenKind::RBrace, location });
        }
        if c == '"' {
            return self.lex_string(location);
        }
        if c.is_ascii_digit() || (c == '-' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) {
            return self.lex_int(location);
        }
        if is_name_start(c) {
            return self.lex_name(location);
        }

        Err(BuildError::at(BuildErrorKind::Lexical(format!("unexpected character '{c}'")), location))
    }

    fn lex_name(&mut self, location: Location) -> Result<Token> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_name_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token { kind: TokenKind::Name(s), location })
    }

    fn lex_int(&mut self, location: Location) -> Result<Token> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push('-');
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let value: i64 = s
            .parse()
            .map_err(|_| BuildError::at(BuildErrorKind::IllegalIntegerLiteral(s.clone()), location.clone()))?;
        Ok(Token { kind: TokenKind::Int(value), location })
    }

    fn lex_string(&mut self, location: Location) -> Result<Token> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(BuildError::at(
                        BuildErrorKind::Lexical("unterminated string literal".to_string()),
                        location,
                    ))
                }
                Some('"') => break,
                Some('\\') => s.push(self.lex_escape(&location)?),
                Some(c) => s.push(c),
            }
        }
        Ok(Token { kind: TokenKind::Str(s), location })
    }

    fn lex_escape(&mut self, location: &Location) -> Result<char> {
        let Some(c) = self.advance() else {
            return Err(BuildError::at(
                BuildErrorKind::Lexical("unterminated escape sequence".to_string()),
                location.clone(),
            ));
        };
        Ok(match c {
            'r' => '\r',
            'n' => '\n',
            't' => '\t',
            'b' => '\u{8}',
            'a' => '\u{7}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'e' => '\u{1b}',
            '\\' => '\\',
            '"' => '"',
            'x' => self.lex_hex_escape(2, location)?,
            'u' => self.lex_hex_escape(4, location)?,
            'U' => self.lex_hex_escape(8, location)?,
            other => {
                return Err(BuildError::at(
                    BuildErrorKind::Lexical(format!("unknown escape sequence '\\{other}'")),
                    location.clone(),
                ))
            }
        })
    }

    fn lex_hex_escape(&mut self, digits: usize, location: &Location) -> Result<char> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let c = self.advance().ok_or_else(|| {
                BuildError::at(BuildErrorKind::Lexical("truncated hex escape".to_string()), location.clone())
            })?;
            let digit = c.to_digit(16).ok_or_else(|| {
                BuildError::at(BuildErrorKind::Lexical(format!("invalid hex digit '{c}'")), location.clone())
            })?;
            value = value * 16 + digit;
        }
        char::from_u32(value)
            .ok_or_else(|| BuildError::at(BuildErrorKind::Lexical(format!("invalid code point U+{value:X}")), location.clone()))
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '.' || c == '/' || c == '$'
}

fn is_name_continue(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == ':'
}

/// Tokenize an entire hikefile in one pass.
pub fn tokenize(source: &str, path: Rc<PathBuf>) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source, path);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
