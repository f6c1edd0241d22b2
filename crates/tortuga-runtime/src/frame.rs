//! Per-call binding frames, laid out as word records in the bump arena.
//!
//! Frame layout, in words from the frame's base offset:
//!
//! ```text
//! 0  prev_offset        (NONE for the bottom frame)
//! 1  proc name          (atom node bits)
//! 2  param_count
//! 3  flags              (bit 0: test set, bit 1: test value)
//! 4  body_cursor        (node bits; remaining body lines at suspension)
//! 5  line_cursor        (node bits; remaining tokens at suspension)
//! 6  binding_count      (params plus any `local` extensions)
//! 7… bindings           (3 words each: name atom, value tag, value bits)
//! ```
//!
//! Popping restores the arena top to the frame's base; tail-call reuse
//! instead truncates the binding area back to the parameters and overwrites
//! their values in place.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Node, Value};

use crate::arena::{Arena, NONE};

const HEADER_WORDS: usize = 7;
const BINDING_WORDS: usize = 3;

const OFF_PREV: u32 = 0;
const OFF_PROC: u32 = 1;
const OFF_PARAMS: u32 = 2;
const OFF_FLAGS: u32 = 3;
const OFF_BODY: u32 = 4;
const OFF_LINE: u32 = 5;
const OFF_BINDINGS: u32 = 6;

const FLAG_TEST_SET: u32 = 1;
const FLAG_TEST_TRUE: u32 = 2;

const TAG_NONE: u32 = 0;
const TAG_NUMBER: u32 = 1;
const TAG_WORD: u32 = 2;
const TAG_LIST: u32 = 3;

fn encode(value: &Value) -> (u32, u32) {
    match value {
        Value::None => (TAG_NONE, 0),
        Value::Number(n) => (TAG_NUMBER, n.to_bits()),
        Value::Word(node) => (TAG_WORD, node.to_bits()),
        Value::List(node) => (TAG_LIST, node.to_bits()),
    }
}

fn decode(tag: u32, bits: u32) -> Value {
    match tag {
        TAG_NUMBER => Value::Number(f32::from_bits(bits)),
        TAG_WORD => Value::Word(Node::from_bits(bits)),
        TAG_LIST => Value::List(Node::from_bits(bits)),
        _ => Value::None,
    }
}

pub struct FrameStack {
    arena: Arena,
    current: u32,
    depth: usize,
}

impl FrameStack {
    pub fn new(arena_words: usize) -> Self {
        Self {
            arena: Arena::new(arena_words),
            current: NONE,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn current(&self) -> Option<u32> {
        (self.current != NONE).then_some(self.current)
    }

    pub fn arena_top(&self) -> u32 {
        self.arena.top()
    }

    /// Push a frame binding `params` to `args` pairwise.
    pub fn push(
        &mut self,
        proc_name: Node,
        params: &[Node],
        args: &[Value],
    ) -> Result<(), ErrorInfo> {
        debug_assert_eq!(params.len(), args.len());
        let words = HEADER_WORDS + params.len() * BINDING_WORDS;
        let base = self
            .arena
            .alloc_words(words)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::StackOverflow))?;
        self.arena.set(base + OFF_PREV, self.current);
        self.arena.set(base + OFF_PROC, proc_name.to_bits());
        self.arena.set(base + OFF_PARAMS, params.len() as u32);
        self.arena.set(base + OFF_BINDINGS, params.len() as u32);
        for (i, (&name, value)) in params.iter().zip(args).enumerate() {
            self.write_binding(base, i, name, value);
        }
        self.current = base;
        self.depth += 1;
        Ok(())
    }

    /// Pop the current frame, restoring the arena top to its base. A no-op
    /// on an empty stack: `erall` can reset frames out from under an
    /// unwinding trampoline.
    pub fn pop(&mut self) {
        if self.current == NONE {
            return;
        }
        let base = self.current;
        self.current = self.arena.get(base + OFF_PREV);
        self.arena.free_to(base);
        self.depth -= 1;
    }

    /// Tail-call reuse: drop `local` extensions, overwrite the parameter
    /// bindings with fresh argument values. Depth is unchanged.
    pub fn reuse_for_tail(&mut self, args: &[Value]) {
        let base = self.current;
        debug_assert!(base != NONE);
        let params = self.arena.get(base + OFF_PARAMS) as usize;
        debug_assert_eq!(params, args.len());
        self.arena.set(base + OFF_BINDINGS, params as u32);
        self.arena.set(base + OFF_FLAGS, 0);
        self.arena
            .free_to(base + (HEADER_WORDS + params * BINDING_WORDS) as u32);
        for (i, value) in args.iter().enumerate() {
            let name = self.binding_name(base, i);
            self.write_binding(base, i, name, value);
        }
    }

    /// `local`: add a binding (initially no value) to the current frame.
    pub fn add_local(&mut self, name: Node) -> Result<(), ErrorInfo> {
        let base = self.current;
        if base == NONE {
            return Err(ErrorInfo::new(ErrorCode::AtToplevel).with_proc("local"));
        }
        let count = self.arena.get(base + OFF_BINDINGS) as usize;
        if !self.arena.extend(BINDING_WORDS) {
            return Err(ErrorInfo::new(ErrorCode::StackOverflow));
        }
        self.arena.set(base + OFF_BINDINGS, count as u32 + 1);
        self.write_binding(base, count, name, &Value::None);
        Ok(())
    }

    /// Dynamic-scope lookup: innermost frame outward.
    pub fn lookup(&self, name: Node) -> Option<Value> {
        let mut frame = self.current;
        while frame != NONE {
            let count = self.arena.get(frame + OFF_BINDINGS) as usize;
            for i in 0..count {
                if self.binding_name(frame, i) == name {
                    return Some(self.binding_value(frame, i));
                }
            }
            frame = self.arena.get(frame + OFF_PREV);
        }
        None
    }

    /// Rebind an existing binding in its scope. False when unbound in every
    /// live frame (the caller then falls through to globals).
    pub fn assign(&mut self, name: Node, value: &Value) -> bool {
        let mut frame = self.current;
        while frame != NONE {
            let count = self.arena.get(frame + OFF_BINDINGS) as usize;
            for i in 0..count {
                if self.binding_name(frame, i) == name {
                    self.write_binding(frame, i, name, value);
                    return true;
                }
            }
            frame = self.arena.get(frame + OFF_PREV);
        }
        false
    }

    // =====================================================================
    // Current-frame accessors
    // =====================================================================

    pub fn proc_name(&self) -> Option<Node> {
        self.current()
            .map(|base| Node::from_bits(self.arena.get(base + OFF_PROC)))
    }

    pub fn save_cursors(&mut self, body: Node, line: Node) {
        let base = self.current;
        debug_assert!(base != NONE);
        self.arena.set(base + OFF_BODY, body.to_bits());
        self.arena.set(base + OFF_LINE, line.to_bits());
    }

    pub fn saved_cursors(&self) -> Option<(Node, Node)> {
        self.current().map(|base| {
            (
                Node::from_bits(self.arena.get(base + OFF_BODY)),
                Node::from_bits(self.arena.get(base + OFF_LINE)),
            )
        })
    }

    pub fn set_test(&mut self, value: bool) -> bool {
        match self.current() {
            Some(base) => {
                let flags = FLAG_TEST_SET | if value { FLAG_TEST_TRUE } else { 0 };
                self.arena.set(base + OFF_FLAGS, flags);
                true
            }
            None => false,
        }
    }

    pub fn get_test(&self) -> Option<bool> {
        let base = self.current()?;
        let flags = self.arena.get(base + OFF_FLAGS);
        (flags & FLAG_TEST_SET != 0).then_some(flags & FLAG_TEST_TRUE != 0)
    }

    /// Clear every frame (top-level reset).
    pub fn reset(&mut self) {
        self.arena.free_to(0);
        self.current = NONE;
        self.depth = 0;
    }

    /// GC roots: every live frame's saved cursors and binding values.
    pub fn roots(&self) -> Vec<Node> {
        let mut roots = Vec::new();
        let mut frame = self.current;
        while frame != NONE {
            roots.push(Node::from_bits(self.arena.get(frame + OFF_BODY)));
            roots.push(Node::from_bits(self.arena.get(frame + OFF_LINE)));
            let count = self.arena.get(frame + OFF_BINDINGS) as usize;
            for i in 0..count {
                if let Value::List(node) | Value::Word(node) = self.binding_value(frame, i) {
                    roots.push(node);
                }
            }
            frame = self.arena.get(frame + OFF_PREV);
        }
        roots
    }

    fn binding_base(frame: u32, i: usize) -> u32 {
        frame + (HEADER_WORDS + i * BINDING_WORDS) as u32
    }

    fn binding_name(&self, frame: u32, i: usize) -> Node {
        Node::from_bits(self.arena.get(Self::binding_base(frame, i)))
    }

    fn binding_value(&self, frame: u32, i: usize) -> Value {
        let base = Self::binding_base(frame, i);
        decode(self.arena.get(base + 1), self.arena.get(base + 2))
    }

    fn write_binding(&mut self, frame: u32, i: usize, name: Node, value: &Value) {
        let base = Self::binding_base(frame, i);
        let (tag, bits) = encode(value);
        self.arena.set(base, name.to_bits());
        self.arena.set(base + 1, tag);
        self.arena.set(base + 2, bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tortuga_heap::Heap;

    fn stack() -> FrameStack {
        FrameStack::new(1024)
    }

    #[test]
    fn test_push_bind_lookup_pop() {
        let mut heap = Heap::new();
        let mut frames = stack();
        let f = heap.atom("f");
        let n = heap.atom("n");

        let entry_top = frames.arena_top();
        frames.push(f, &[n], &[Value::Number(5.0)]).unwrap();
        assert_eq!(frames.depth(), 1);
        assert_eq!(frames.lookup(n), Some(Value::Number(5.0)));
        assert_eq!(frames.proc_name(), Some(f));

        frames.pop();
        assert_eq!(frames.depth(), 0);
        assert_eq!(frames.lookup(n), None);
        assert_eq!(frames.arena_top(), entry_top);
    }

    #[test]
    fn test_dynamic_scope_inner_shadows_outer() {
        let mut heap = Heap::new();
        let mut frames = stack();
        let (f, g, x) = (heap.atom("f"), heap.atom("g"), heap.atom("x"));

        frames.push(f, &[x], &[Value::Number(1.0)]).unwrap();
        frames.push(g, &[x], &[Value::Number(2.0)]).unwrap();
        assert_eq!(frames.lookup(x), Some(Value::Number(2.0)));
        frames.pop();
        assert_eq!(frames.lookup(x), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_callee_sees_caller_bindings() {
        let mut heap = Heap::new();
        let mut frames = stack();
        let (f, g, x) = (heap.atom("f"), heap.atom("g"), heap.atom("x"));

        frames.push(f, &[x], &[Value::Number(7.0)]).unwrap();
        frames.push(g, &[], &[]).unwrap();
        assert_eq!(frames.lookup(x), Some(Value::Number(7.0)));
        assert!(frames.assign(x, &Value::Number(8.0)));
        frames.pop();
        assert_eq!(frames.lookup(x), Some(Value::Number(8.0)));
    }

    #[test]
    fn test_local_extends_current_frame() {
        let mut heap = Heap::new();
        let mut frames = stack();
        let (f, y) = (heap.atom("f"), heap.atom("y"));

        assert!(frames.add_local(y).is_err());

        frames.push(f, &[], &[]).unwrap();
        frames.add_local(y).unwrap();
        assert_eq!(frames.lookup(y), Some(Value::None));
        assert!(frames.assign(y, &Value::Number(3.0)));
        assert_eq!(frames.lookup(y), Some(Value::Number(3.0)));

        frames.pop();
        assert_eq!(frames.lookup(y), None);
    }

    #[test]
    fn test_tail_reuse_keeps_arena_flat() {
        let mut heap = Heap::new();
        let mut frames = stack();
        let (f, n, tmp) = (heap.atom("f"), heap.atom("n"), heap.atom("tmp"));

        frames.push(f, &[n], &[Value::Number(10.0)]).unwrap();
        let top = frames.arena_top();
        frames.add_local(tmp).unwrap();
        assert!(frames.arena_top() > top);

        frames.reuse_for_tail(&[Value::Number(9.0)]);
        assert_eq!(frames.arena_top(), top);
        assert_eq!(frames.depth(), 1);
        assert_eq!(frames.lookup(n), Some(Value::Number(9.0)));
        assert_eq!(frames.lookup(tmp), None);
    }

    #[test]
    fn test_test_flag_is_per_frame() {
        let mut heap = Heap::new();
        let mut frames = stack();
        let (f, g) = (heap.atom("f"), heap.atom("g"));

        frames.push(f, &[], &[]).unwrap();
        assert_eq!(frames.get_test(), None);
        frames.set_test(true);
        assert_eq!(frames.get_test(), Some(true));

        frames.push(g, &[], &[]).unwrap();
        assert_eq!(frames.get_test(), None);
        frames.pop();
        assert_eq!(frames.get_test(), Some(true));
    }

    #[test]
    fn test_overflow_reported() {
        let mut heap = Heap::new();
        let mut frames = FrameStack::new(16);
        let f = heap.atom("f");
        frames.push(f, &[], &[]).unwrap();
        let err = frames
            .push(f, &[f, f, f, f], &[Value::None; 4])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StackOverflow);
    }
}
