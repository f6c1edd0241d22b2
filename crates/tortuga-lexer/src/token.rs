/// Byte range of a token within the line it was lexed from. Lines are
/// re-lexed from interned atoms after reading, so offsets only need to
/// survive until the reader has built its node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// The raw source text of this token. Quoted words keep their leading
    /// `"` and colon variables their leading `:` so definitions round-trip.
    pub lexeme: String,
    /// Newlines seen between the previous token and this one. The reader
    /// turns these into newline markers inside bracketed bodies.
    pub newlines_before: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, lexeme: String, newlines_before: u32) -> Self {
        Self {
            kind,
            span,
            lexeme,
            newlines_before,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A bare word: procedure name, `true`, `end`, anything unquoted.
    Word,
    /// A word whose entire text parses as a number.
    Number,
    /// `"word` — quoted literal.
    Quoted,
    /// `:name` — variable reference.
    Colon,

    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )

    Plus,    // +
    Minus,   // - (unary vs binary decided by expression context)
    Star,    // *
    Slash,   // /
    Equals,  // =
    Less,    // <
    Greater, // >

    Eof,
}

impl TokenKind {
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Equals
                | TokenKind::Less
                | TokenKind::Greater
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
