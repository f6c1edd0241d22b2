//! The reader: token streams into heap node structures.
//!
//! Every token becomes an interned atom carrying its raw lexeme (quoted words
//! keep their `"`, colon variables their `:`, operators are one-character
//! atoms). Bracketed runs become real sublists whose element references carry
//! the sublist tag; newline positions inside brackets are preserved as
//! newline markers so definitions round-trip through `po` and `save`.
//!
//! [`ReadSession`] layers interactive behaviour on top: logical lines that
//! continue while brackets stay open, and `to … end` definition collection.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Heap, Node};
use tortuga_lexer::{Lexer, Token, TokenKind};

/// A collected procedure definition, params stored without their colons.
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: Node,
    pub params: Vec<Node>,
    /// List of body lines; each element is a sublist-tagged token list.
    pub body: Node,
}

/// What a completed feed produced.
#[derive(Debug, Clone)]
pub enum ReadEvent {
    /// A logical instruction line, ready for the evaluator.
    Line(Node),
    /// A finished `to … end` definition.
    Define(Definition),
    /// Nothing (blank or comment-only input).
    Empty,
}

/// Result of feeding one physical line to a session.
#[derive(Debug, Clone)]
pub enum FeedResult {
    Event(ReadEvent),
    /// Brackets still open, or inside a definition body.
    NeedMore,
}

const MAX_PARAMS: usize = 16;

/// Multi-line read state for the REPL and `load`.
pub struct ReadSession {
    state: State,
}

enum State {
    Toplevel,
    /// A logical line carried across physical lines by open brackets.
    Continuing(Partial),
    Defining {
        name: Node,
        params: Vec<Node>,
        lines: Vec<Node>,
        /// Body line carried across physical lines by open brackets.
        pending: Option<Partial>,
    },
}

struct Partial {
    tokens: Vec<Token>,
    depth: i32,
    /// Newlines from blank continuation lines, owed to the next token.
    carried: u32,
}

impl Partial {
    fn new(tokens: Vec<Token>, depth: i32) -> Self {
        Self {
            tokens,
            depth,
            carried: 0,
        }
    }

    /// Absorb the next physical line. Returns true once brackets balance.
    fn extend(&mut self, mut tokens: Vec<Token>) -> bool {
        if tokens.is_empty() {
            self.carried += 1;
            return false;
        }
        self.depth += net_depth(&tokens);
        tokens[0].newlines_before += 1 + self.carried;
        self.carried = 0;
        self.tokens.append(&mut tokens);
        self.depth <= 0
    }
}

impl ReadSession {
    pub fn new() -> Self {
        Self {
            state: State::Toplevel,
        }
    }

    /// True while the session expects more input (continuation prompt).
    pub fn is_pending(&self) -> bool {
        !matches!(self.state, State::Toplevel)
    }

    /// Abandon any partial state (after an error or interrupt).
    pub fn reset(&mut self) {
        self.state = State::Toplevel;
    }

    /// Feed one physical line of source.
    pub fn feed(&mut self, heap: &mut Heap, line: &str) -> Result<FeedResult, ErrorInfo> {
        let tokens = lex_line(line);
        match std::mem::replace(&mut self.state, State::Toplevel) {
            State::Toplevel => self.feed_toplevel(heap, tokens),
            State::Continuing(mut partial) => {
                if partial.extend(tokens) {
                    let list = build_line(heap, &partial.tokens)?;
                    Ok(FeedResult::Event(ReadEvent::Line(list)))
                } else {
                    self.state = State::Continuing(partial);
                    Ok(FeedResult::NeedMore)
                }
            }
            State::Defining {
                name,
                params,
                lines,
                pending,
            } => self.feed_defining(heap, tokens, name, params, lines, pending),
        }
    }

    fn feed_toplevel(
        &mut self,
        heap: &mut Heap,
        tokens: Vec<Token>,
    ) -> Result<FeedResult, ErrorInfo> {
        if tokens.is_empty() {
            return Ok(FeedResult::Event(ReadEvent::Empty));
        }
        if is_word(&tokens[0], "to") {
            let (name, params) = parse_header(heap, &tokens)?;
            self.state = State::Defining {
                name,
                params,
                lines: Vec::new(),
                pending: None,
            };
            return Ok(FeedResult::NeedMore);
        }
        let depth = net_depth(&tokens);
        if depth > 0 {
            self.state = State::Continuing(Partial::new(tokens, depth));
            return Ok(FeedResult::NeedMore);
        }
        let list = build_line(heap, &tokens)?;
        Ok(FeedResult::Event(ReadEvent::Line(list)))
    }

    fn feed_defining(
        &mut self,
        heap: &mut Heap,
        tokens: Vec<Token>,
        name: Node,
        params: Vec<Node>,
        mut lines: Vec<Node>,
        pending: Option<Partial>,
    ) -> Result<FeedResult, ErrorInfo> {
        if let Some(mut partial) = pending {
            if partial.extend(tokens) {
                lines.push(build_line(heap, &partial.tokens)?);
                self.state = State::Defining {
                    name,
                    params,
                    lines,
                    pending: None,
                };
            } else {
                self.state = State::Defining {
                    name,
                    params,
                    lines,
                    pending: Some(partial),
                };
            }
            return Ok(FeedResult::NeedMore);
        }

        if tokens.len() == 1 && is_word(&tokens[0], "end") {
            let body = assemble_lines(heap, &lines)?;
            return Ok(FeedResult::Event(ReadEvent::Define(Definition {
                name,
                params,
                body,
            })));
        }

        if tokens.is_empty() {
            lines.push(Node::NIL);
        } else {
            let depth = net_depth(&tokens);
            if depth > 0 {
                self.state = State::Defining {
                    name,
                    params,
                    lines,
                    pending: Some(Partial::new(tokens, depth)),
                };
                return Ok(FeedResult::NeedMore);
            }
            lines.push(build_line(heap, &tokens)?);
        }
        self.state = State::Defining {
            name,
            params,
            lines,
            pending: None,
        };
        Ok(FeedResult::NeedMore)
    }
}

impl Default for ReadSession {
    fn default() -> Self {
        Self::new()
    }
}

// =====================================================================
// Token-level helpers
// =====================================================================

/// Lex one physical line, dropping the trailing Eof token.
fn lex_line(line: &str) -> Vec<Token> {
    let mut tokens = Lexer::new(line).tokenize();
    tokens.pop();
    tokens
}

fn is_word(token: &Token, text: &str) -> bool {
    token.kind == TokenKind::Word && token.lexeme.eq_ignore_ascii_case(text)
}

/// Net bracket depth across a token run.
fn net_depth(tokens: &[Token]) -> i32 {
    let mut depth = 0;
    for t in tokens {
        match t.kind {
            TokenKind::LBracket => depth += 1,
            TokenKind::RBracket => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Parse a `to name :p1 :p2 …` header line.
fn parse_header(heap: &mut Heap, tokens: &[Token]) -> Result<(Node, Vec<Node>), ErrorInfo> {
    let name_token = tokens
        .get(1)
        .filter(|t| t.kind == TokenKind::Word)
        .ok_or_else(|| ErrorInfo::new(ErrorCode::NotEnoughInputs).with_proc("to"))?;
    let name = heap.atom(&name_token.lexeme);

    let mut params = Vec::new();
    for t in &tokens[2..] {
        if t.kind != TokenKind::Colon {
            return Err(ErrorInfo::new(ErrorCode::DoesntLikeInput)
                .with_proc("to")
                .with_arg(t.lexeme.clone()));
        }
        if params.len() == MAX_PARAMS {
            return Err(ErrorInfo::new(ErrorCode::TooManyInputs).with_proc("to"));
        }
        params.push(heap.atom(&t.lexeme[1..]));
    }
    Ok((name, params))
}

// =====================================================================
// Structure building
// =====================================================================

/// Read a balanced token run into a node list. Bracketed runs recurse into
/// sublists; newline positions inside brackets become newline markers.
pub fn build_line(heap: &mut Heap, tokens: &[Token]) -> Result<Node, ErrorInfo> {
    let mut i = 0;
    let node = build_seq(heap, tokens, &mut i, false)?;
    debug_assert_eq!(i, tokens.len());
    Ok(node)
}

fn build_seq(
    heap: &mut Heap,
    tokens: &[Token],
    i: &mut usize,
    inside_bracket: bool,
) -> Result<Node, ErrorInfo> {
    let mut elems: Vec<Node> = Vec::new();
    while *i < tokens.len() {
        let t = &tokens[*i];
        if inside_bracket {
            for _ in 0..t.newlines_before {
                elems.push(Node::NEWLINE);
            }
        }
        match t.kind {
            TokenKind::LBracket => {
                *i += 1;
                let sub = build_seq(heap, tokens, i, true)?;
                elems.push(sub.as_sublist());
            }
            TokenKind::RBracket => {
                *i += 1;
                if inside_bracket {
                    return assemble(heap, &elems);
                }
                return Err(ErrorInfo::new(ErrorCode::DontKnowWhatToDoWith).with_arg("]"));
            }
            _ => {
                elems.push(heap.atom(&t.lexeme));
                *i += 1;
            }
        }
    }
    if inside_bracket {
        // Sessions keep brackets balanced before building; a raw caller can
        // still hand us a short run.
        return Err(ErrorInfo::new(ErrorCode::DontKnowWhatToDoWith).with_arg("["));
    }
    assemble(heap, &elems)
}

fn assemble(heap: &mut Heap, elems: &[Node]) -> Result<Node, ErrorInfo> {
    let mut node = Node::NIL;
    for &e in elems.iter().rev() {
        node = heap
            .try_cons(e, node)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::OutOfSpace))?;
    }
    Ok(node)
}

fn assemble_lines(heap: &mut Heap, lines: &[Node]) -> Result<Node, ErrorInfo> {
    let mut body = Node::NIL;
    for &line in lines.iter().rev() {
        body = heap
            .try_cons(line.as_sublist(), body)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::OutOfSpace))?;
    }
    Ok(body)
}

/// One-shot convenience: read a single balanced line of source.
pub fn read_line_list(heap: &mut Heap, source: &str) -> Result<Node, ErrorInfo> {
    build_line(heap, &lex_line(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(heap: &Heap, mut node: Node) -> Vec<String> {
        let mut out = Vec::new();
        while !node.is_nil() {
            let e = heap.car(node);
            if e.is_atom() {
                out.push(heap.atom_text(e).to_string());
            } else {
                out.push(format!("<sub:{}>", heap.list_len(e)));
            }
            node = heap.cdr(node);
        }
        out
    }

    #[test]
    fn test_flat_line() {
        let mut heap = Heap::new();
        let list = read_line_list(&mut heap, "print sum :x 4").unwrap();
        assert_eq!(texts(&heap, list), vec!["print", "sum", ":x", "4"]);
    }

    #[test]
    fn test_brackets_become_sublists() {
        let mut heap = Heap::new();
        let list = read_line_list(&mut heap, "if :n = 0 [output 1]").unwrap();
        let elems = texts(&heap, list);
        assert_eq!(elems[0], "if");
        assert_eq!(elems.last().unwrap(), "<sub:2>");

        // The sublist element carries the sublist tag.
        let mut node = list;
        for _ in 0..4 {
            node = heap.cdr(node);
        }
        assert!(heap.car(node).is_sublist());
    }

    #[test]
    fn test_nested_brackets() {
        let mut heap = Heap::new();
        let list = read_line_list(&mut heap, "show [a [b c] d]").unwrap();
        let outer = heap.car(heap.cdr(list)).as_plain_cons();
        let elems = texts(&heap, outer);
        assert_eq!(elems, vec!["a", "<sub:2>", "d"]);
    }

    #[test]
    fn test_stray_close_bracket_is_an_error() {
        let mut heap = Heap::new();
        let err = read_line_list(&mut heap, "print ]").unwrap_err();
        assert_eq!(err.code, ErrorCode::DontKnowWhatToDoWith);
    }

    #[test]
    fn test_session_bracket_continuation_inserts_marker() {
        let mut heap = Heap::new();
        let mut session = ReadSession::new();
        let r = session.feed(&mut heap, "print [a").unwrap();
        assert!(matches!(r, FeedResult::NeedMore));
        assert!(session.is_pending());
        let r = session.feed(&mut heap, "b]").unwrap();
        let FeedResult::Event(ReadEvent::Line(list)) = r else {
            panic!("expected completed line");
        };
        let sub = heap.car(heap.cdr(list)).as_plain_cons();
        let mut node = sub;
        let mut saw_marker = false;
        while !node.is_nil() {
            if heap.car(node).is_newline_marker() {
                saw_marker = true;
            }
            node = heap.cdr(node);
        }
        assert!(saw_marker);
        assert_eq!(heap.list_len(sub), 3); // a, marker, b
    }

    #[test]
    fn test_definition_collection() {
        let mut heap = Heap::new();
        let mut session = ReadSession::new();
        session.feed(&mut heap, "to double :n").unwrap();
        session.feed(&mut heap, "output sum :n :n").unwrap();
        let r = session.feed(&mut heap, "end").unwrap();
        let FeedResult::Event(ReadEvent::Define(def)) = r else {
            panic!("expected definition");
        };
        assert_eq!(heap.atom_text(def.name), "double");
        assert_eq!(def.params.len(), 1);
        assert_eq!(heap.atom_text(def.params[0]), "n");
        assert_eq!(heap.list_len(def.body), 1);
        let line = heap.car(def.body);
        assert!(line.is_sublist());
        assert_eq!(
            texts(&heap, line.as_plain_cons()),
            vec!["output", "sum", ":n", ":n"]
        );
    }

    #[test]
    fn test_header_rejects_non_colon_params() {
        let mut heap = Heap::new();
        let mut session = ReadSession::new();
        let err = session.feed(&mut heap, "to bad x").unwrap_err();
        assert_eq!(err.code, ErrorCode::DoesntLikeInput);
        assert!(!session.is_pending());
    }

    #[test]
    fn test_header_requires_name() {
        let mut heap = Heap::new();
        let mut session = ReadSession::new();
        let err = session.feed(&mut heap, "to").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotEnoughInputs);
    }

    #[test]
    fn test_blank_line_is_empty_event() {
        let mut heap = Heap::new();
        let mut session = ReadSession::new();
        let r = session.feed(&mut heap, "  ; just a comment").unwrap();
        assert!(matches!(r, FeedResult::Event(ReadEvent::Empty)));
    }
}
