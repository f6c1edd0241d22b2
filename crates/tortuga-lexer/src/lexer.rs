use tortuga_common::numbers::parse_number;

use crate::token::{Span, Token, TokenKind};

/// The Logo lexer. Converts source text into a stream of tokens.
///
/// Newlines are not tokens of their own; the count of newlines between two
/// tokens rides on the later token so the reader can reconstruct source line
/// breaks inside procedure bodies.
pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    tokens: Vec<Token>,
    /// Newlines seen since the last emitted token.
    pending_newlines: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            pending_newlines: 0,
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.skip_whitespace_and_comments();
            if self.is_at_end() {
                break;
            }

            let ch = self.peek();
            match ch {
                b'[' => self.single_char_token(TokenKind::LBracket),
                b']' => self.single_char_token(TokenKind::RBracket),
                b'(' => self.single_char_token(TokenKind::LParen),
                b')' => self.single_char_token(TokenKind::RParen),
                b'+' => self.single_char_token(TokenKind::Plus),
                b'-' => self.single_char_token(TokenKind::Minus),
                b'*' => self.single_char_token(TokenKind::Star),
                b'/' => self.single_char_token(TokenKind::Slash),
                b'=' => self.single_char_token(TokenKind::Equals),
                b'<' => self.single_char_token(TokenKind::Less),
                b'>' => self.single_char_token(TokenKind::Greater),
                b'"' => self.lex_quoted(),
                b':' => self.lex_colon_var(),
                _ => self.lex_word(),
            }
        }

        self.push_token(TokenKind::Eof, self.pos, self.pos);
        self.tokens
    }

    // =====================================================================
    // Word-shaped tokens
    // =====================================================================

    /// A bare word runs until whitespace or a delimiter. A run that parses
    /// entirely as a number becomes a Number token; a sign directly after
    /// `e`/`E` is absorbed so exponents like `1e-2` stay one token.
    fn lex_word(&mut self) {
        let start = self.pos;
        while !self.is_at_end() {
            let b = self.peek();
            if is_delimiter(b) {
                // Exponent signs are part of a numeric run.
                let signed_exp = (b == b'+' || b == b'-')
                    && self.pos > start + 1
                    && matches!(self.bytes[self.pos - 1], b'e' | b'E')
                    && self.pos + 1 < self.bytes.len()
                    && self.bytes[self.pos + 1].is_ascii_digit()
                    && parse_number(&self.source[start..self.pos - 1]).is_some();
                if !signed_exp {
                    break;
                }
            }
            self.advance();
        }
        let text = &self.source[start..self.pos];
        let kind = if parse_number(text).is_some() {
            TokenKind::Number
        } else {
            TokenKind::Word
        };
        self.push_token(kind, start, self.pos);
    }

    /// `"word` — runs until whitespace or a bracket/paren. Operators are
    /// ordinary characters inside a quoted word.
    fn lex_quoted(&mut self) {
        let start = self.pos;
        self.advance(); // consume "
        while !self.is_at_end() && !is_quoted_terminator(self.peek()) {
            self.advance();
        }
        self.push_token(TokenKind::Quoted, start, self.pos);
    }

    /// `:name` — same delimiter rules as a bare word.
    fn lex_colon_var(&mut self) {
        let start = self.pos;
        self.advance(); // consume :
        while !self.is_at_end() && !is_delimiter(self.peek()) {
            self.advance();
        }
        self.push_token(TokenKind::Colon, start, self.pos);
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() { 0 } else { self.bytes[self.pos] }
    }

    fn advance(&mut self) -> u8 {
        let ch = self.peek();
        self.pos += 1;
        ch
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        let lexeme = self.source[start..end].to_string();
        self.tokens.push(Token::new(
            kind,
            Span::new(start as u32, end as u32),
            lexeme,
            self.pending_newlines,
        ));
        self.pending_newlines = 0;
    }

    fn single_char_token(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.advance();
        self.push_token(kind, start, self.pos);
    }

    fn skip_whitespace_and_comments(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                b'\n' => {
                    self.pending_newlines += 1;
                    self.advance();
                }
                b';' => {
                    // Comment: skip until newline.
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t'
            | b'\r'
            | b'\n'
            | b'['
            | b']'
            | b'('
            | b')'
            | b'+'
            | b'-'
            | b'*'
            | b'/'
            | b'='
            | b'<'
            | b'>'
            | b';'
    )
}

fn is_quoted_terminator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'[' | b']' | b'(' | b')' | b';')
}
