//! Character-level lexer for the SQLite DDL subset.
//!
//! Tokens retain their original byte span so the parser can slice raw
//! substrings (expressions, SELECT bodies, trigger bodies) straight out of
//! the source instead of re-serializing them, which is what lets the
//! generator reproduce comments and formatting it did not itself write.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    QuotedIdent,
    StringLit,
    NumberLit,
    BlobLit,
    BindParam,
    Dot,
    Comma,
    LParen,
    RParen,
    Semicolon,
    Op,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text for this token, including quoting characters.
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// The token's value with quoting resolved away (identifiers and
    /// string literals only; other kinds return the raw text).
    pub fn value(&self) -> String {
        match self.kind {
            TokenKind::QuotedIdent | TokenKind::StringLit => crate::ident::unquote(&self.text),
            _ => self.text.clone(),
        }
    }

    pub fn is_ident_like(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::QuotedIdent)
    }

    pub fn ieq(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(word)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("lex error at byte {pos}: {message}")]
pub struct LexError {
    pub pos: usize,
    pub message: String,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(src: &'a str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.pos += 2;
                    while self.pos < self.bytes.len() {
                        if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                start,
                end: start,
            });
        };

        match b {
            b'(' => {
                self.pos += 1;
                Ok(self.make(TokenKind::LParen, start))
            }
            b')' => {
                self.pos += 1;
                Ok(self.make(TokenKind::RParen, start))
            }
            b',' => {
                self.pos += 1;
                Ok(self.make(TokenKind::Comma, start))
            }
            b';' => {
                self.pos += 1;
                Ok(self.make(TokenKind::Semicolon, start))
            }
            b'.' if !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.pos += 1;
                Ok(self.make(TokenKind::Dot, start))
            }
            b'"' | b'`' => self.lex_quoted_ident(b, start),
            b'[' => self.lex_bracket_ident(start),
            b'\'' => self.lex_string(start),
            b'x' | b'X' if self.peek_at(1) == Some(b'\'') => self.lex_blob(start),
            b'?' | b':' | b'@' | b'$' => self.lex_bind_param(start),
            b'0'..=b'9' => self.lex_number(start),
            _ if is_ident_start(b) => self.lex_ident(start),
            b'<' | b'>' | b'=' | b'!' | b'|' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'~' => {
                self.lex_operator(start)
            }
            other => Err(LexError {
                pos: start,
                message: format!("unexpected byte 0x{other:02x}"),
            }),
        }
    }

    fn make(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            start,
            end: self.pos,
        }
    }

    fn lex_quoted_ident(&mut self, quote: u8, start: usize) -> Result<Token, LexError> {
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        pos: start,
                        message: "unterminated quoted identifier".into(),
                    })
                }
                Some(b) if b == quote => {
                    self.pos += 1;
                    if self.peek() == Some(quote) {
                        self.pos += 1; // doubled quote escape
                        continue;
                    }
                    break;
                }
                _ => self.pos += 1,
            }
        }
        Ok(self.make(TokenKind::QuotedIdent, start))
    }

    fn lex_bracket_ident(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b']' {
                return Ok(self.make(TokenKind::QuotedIdent, start));
            }
        }
        Err(LexError {
            pos: start,
            message: "unterminated bracket identifier".into(),
        })
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        pos: start,
                        message: "unterminated string literal".into(),
                    })
                }
                Some(b'\'') => {
                    self.pos += 1;
                    if self.peek() == Some(b'\'') {
                        self.pos += 1;
                        continue;
                    }
                    break;
                }
                _ => self.pos += 1,
            }
        }
        Ok(self.make(TokenKind::StringLit, start))
    }

    fn lex_blob(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1; // x/X
        self.pos += 1; // opening quote
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'\'' {
                return Ok(self.make(TokenKind::BlobLit, start));
            }
        }
        Err(LexError {
            pos: start,
            message: "unterminated blob literal".into(),
        })
    }

    fn lex_bind_param(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.make(TokenKind::BindParam, start))
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, LexError> {
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || b == b'x' || b == b'X'
            {
                self.pos += 1;
            } else if (b == b'+' || b == b'-')
                && matches!(self.bytes.get(self.pos.wrapping_sub(1)), Some(b'e') | Some(b'E'))
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.make(TokenKind::NumberLit, start))
    }

    fn lex_ident(&mut self, start: usize) -> Result<Token, LexError> {
        while let Some(b) = self.peek() {
            if is_ident_continue(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.make(TokenKind::Ident, start))
    }

    fn lex_operator(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1;
        // Greedily absorb common two-char operators.
        if let (Some(a), Some(b)) = (self.bytes.get(start), self.peek()) {
            let pair = [*a, *b];
            if matches!(&pair, b"<=" | b">=" | b"<>" | b"!=" | b"||") {
                self.pos += 1;
            }
        }
        Ok(self.make(TokenKind::Op, start))
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_simple_create_table() {
        let toks = Lexer::tokenize("CREATE TABLE t (a INT)").unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn handles_doubled_quote_escape() {
        let toks = Lexer::tokenize(r#""a""b""#).unwrap();
        assert_eq!(toks[0].kind, TokenKind::QuotedIdent);
        assert_eq!(toks[0].value(), "a\"b");
    }

    #[test]
    fn skips_line_and_block_comments() {
        let toks = Lexer::tokenize("CREATE -- comment\nTABLE /* block */ t").unwrap();
        let idents: Vec<_> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(idents, vec!["CREATE", "TABLE", "t"]);
    }

    #[test]
    fn lexes_bind_parameters() {
        let toks = Lexer::tokenize("?1 :name @name $name ?").unwrap();
        assert!(toks.iter().all(|t| t.kind == TokenKind::BindParam || t.kind == TokenKind::Eof));
    }
}
