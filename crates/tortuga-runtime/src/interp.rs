//! The interpreter context: heap, workspace, frames, I/O and the host
//! traits, owned together and passed explicitly through evaluation.

use std::collections::HashMap;

use tortuga_bytecode::Chunk;
use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Heap, Node, Outcome, Value};
use tortuga_reader::reader::Definition;
use tortuga_reader::{FeedResult, ReadEvent, ReadSession};
use tortuga_workspace::Workspace;
use tracing::{debug, warn};

use crate::eval::{Machine, RunKind};
use crate::frame::FrameStack;
use crate::io::{
    DEFAULT_MAX_STREAMS, IoFacade, MemStorage, Platform, SharedWriter, SliceReader, Storage,
    Stream, TestPlatform,
};
use crate::primitives::Registry;

/// Sizing knobs. Defaults follow the reference device profile.
#[derive(Debug, Clone, Copy)]
pub struct InterpConfig {
    pub node_capacity: usize,
    pub arena_words: usize,
    pub max_procedures: usize,
    pub max_streams: usize,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self {
            node_capacity: 16 * 1024,
            arena_words: 16 * 1024,
            max_procedures: 128,
            max_streams: DEFAULT_MAX_STREAMS,
        }
    }
}

/// The error most recently intercepted by `catch "error`, as the `error`
/// primitive reports it.
#[derive(Debug, Clone)]
pub struct CaughtError {
    pub code: u8,
    pub message: String,
    pub proc: Option<String>,
    pub caller: Option<String>,
}

/// Atoms the runtime keeps interned for fast comparison.
pub struct WellKnown {
    pub true_word: Node,
    pub false_word: Node,
    pub label: Node,
    pub toplevel: Node,
    pub error_tag: Node,
    pub startup: Node,
}

impl WellKnown {
    fn intern(heap: &mut Heap) -> Self {
        Self {
            true_word: heap.atom("true"),
            false_word: heap.atom("false"),
            label: heap.atom("label"),
            toplevel: heap.atom("toplevel"),
            error_tag: heap.atom("error"),
            startup: heap.atom("startup"),
        }
    }
}

pub struct Interp {
    pub heap: Heap,
    pub ws: Workspace,
    pub frames: FrameStack,
    pub io: IoFacade,
    pub storage: Box<dyn Storage>,
    pub platform: Box<dyn Platform>,
    pub registry: Registry,
    pub atoms: WellKnown,
    /// Innermost-last repeat counters for `repcount`.
    pub repcounts: Vec<f32>,
    /// `test` result outside any procedure frame.
    pub toplevel_test: Option<bool>,
    pub caught_error: Option<CaughtError>,
    /// Set by `continue` to leave the pause sub-REPL.
    pub pause_resume: bool,
    /// Compiled body lines, keyed by line head cons index. Dropped whenever
    /// the procedure table changes.
    pub chunks: HashMap<u32, Option<Chunk>>,
    pub config: InterpConfig,
}

impl Interp {
    pub fn new(
        config: InterpConfig,
        console_in: Box<dyn Stream>,
        console_out: Box<dyn Stream>,
        storage: Box<dyn Storage>,
        platform: Box<dyn Platform>,
    ) -> Self {
        let mut heap = Heap::with_capacity(config.node_capacity);
        let atoms = WellKnown::intern(&mut heap);
        Self {
            heap,
            ws: Workspace::new(config.max_procedures),
            frames: FrameStack::new(config.arena_words),
            io: IoFacade::new(console_in, console_out, config.max_streams),
            storage,
            platform,
            registry: Registry::new(),
            atoms,
            repcounts: Vec::new(),
            toplevel_test: None,
            caught_error: None,
            pause_resume: false,
            chunks: HashMap::new(),
            config,
        }
    }

    /// An interpreter over in-memory console, storage and platform; the
    /// returned writer captures everything printed. For tests and tools.
    pub fn in_memory(console_input: &str) -> (Self, SharedWriter, MemStorage) {
        Self::in_memory_with(InterpConfig::default(), console_input)
    }

    pub fn in_memory_with(
        config: InterpConfig,
        console_input: &str,
    ) -> (Self, SharedWriter, MemStorage) {
        let out = SharedWriter::new();
        let storage = MemStorage::new();
        let interp = Self::new(
            config,
            Box::new(SliceReader::new(console_input)),
            Box::new(out.clone()),
            Box::new(storage.clone()),
            Box::new(TestPlatform::new(0x5eed)),
        );
        (interp, out, storage)
    }

    // =====================================================================
    // Allocation and collection
    // =====================================================================

    /// Allocate a cons, collecting once on exhaustion before giving up.
    pub fn alloc_cons(&mut self, car: Node, cdr: Node) -> Result<Node, ErrorInfo> {
        if let Some(node) = self.heap.try_cons(car, cdr) {
            return Ok(node);
        }
        warn!("heap exhausted, collecting");
        self.collect_garbage();
        self.heap
            .try_cons(car, cdr)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::OutOfSpace))
    }

    /// Run a full mark-sweep cycle. Returns cells reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        let mut roots: Vec<Node> = self.ws.roots().collect();
        roots.extend(self.frames.roots());
        roots.extend(self.io.stream_names());
        self.heap.collect(roots)
    }

    /// Build a heap list from values, rightmost first.
    pub fn make_list(&mut self, values: &[Value]) -> Result<Node, ErrorInfo> {
        let mut node = Node::NIL;
        for v in values.iter().rev() {
            let elem = v
                .to_element(&mut self.heap)
                .ok_or_else(|| ErrorInfo::new(ErrorCode::DoesntLikeInput).with_arg(""))?;
            node = self.alloc_cons(elem, node)?;
        }
        Ok(node)
    }

    // =====================================================================
    // Variables: the dynamic-scope chain
    // =====================================================================

    /// `thing`/`:x`: innermost frame bindings outward, then globals.
    pub fn lookup_var(&self, name: Node) -> Option<Value> {
        self.frames
            .lookup(name)
            .or_else(|| self.ws.globals.get(name))
    }

    /// `make`: rebind where bound; otherwise create a global.
    pub fn assign_var(&mut self, name: Node, value: Value) {
        if !self.frames.assign(name, &value) {
            self.ws.globals.set(name, value);
        }
    }

    // =====================================================================
    // Procedures
    // =====================================================================

    pub fn define_procedure(&mut self, def: Definition) -> Result<(), ErrorInfo> {
        let name_text = self.heap.atom_text(def.name).to_string();
        if self.registry.find(&name_text).is_some() {
            return Err(ErrorInfo::new(ErrorCode::IsPrimitive).with_proc(name_text));
        }
        self.ws.procs.define(def.name, def.params, def.body)?;
        self.chunks.clear();
        debug!(name = %name_text, "defined");
        Ok(())
    }

    pub fn erase_procedure(&mut self, name: Node) -> bool {
        let erased = self.ws.procs.erase(name);
        if erased {
            self.chunks.clear();
        }
        erased
    }

    /// The `erall` reset: clears frames and transient execution state. Not
    /// called from `erps`; that asymmetry is deliberate.
    pub fn reset_execution_state(&mut self) {
        self.frames.reset();
        self.repcounts.clear();
        self.toplevel_test = None;
    }

    // =====================================================================
    // Running source
    // =====================================================================

    /// Execute one read event. Values surfacing from a top-level expression
    /// are returned in `Outcome::Value` for the REPL to print.
    pub fn run_event(&mut self, event: ReadEvent) -> Outcome {
        match event {
            ReadEvent::Empty => Outcome::None,
            ReadEvent::Define(def) => match self.define_procedure(def) {
                Ok(()) => Outcome::None,
                Err(e) => Outcome::Error(Box::new(e)),
            },
            ReadEvent::Line(list) => self.exec_protected(list, RunKind::Value),
        }
    }

    /// Run a list that is not otherwise rooted, keeping it protected for the
    /// duration.
    pub fn exec_protected(&mut self, list: Node, kind: RunKind) -> Outcome {
        let mark = self.heap.protect_mark();
        self.heap.protect_push(list);
        let out = self.exec_run(list, kind);
        let survivors: Vec<Node> = out.value().and_then(|v| v.as_list()).into_iter().collect();
        self.heap.protect_release(mark, &survivors);
        out
    }

    /// Run a token list through the evaluator machine.
    pub fn exec_run(&mut self, list: Node, kind: RunKind) -> Outcome {
        Machine::new(self).run(list, kind)
    }

    /// Feed one physical line through a read session, executing whatever
    /// completes. `Ok(None)` means more input is wanted.
    pub fn feed_line(
        &mut self,
        session: &mut ReadSession,
        line: &str,
    ) -> Result<Option<Outcome>, ErrorInfo> {
        // Keep read-time allocation from tripping over a full heap.
        if self.heap.free_nodes() < 256 {
            self.collect_garbage();
        }
        let mark = self.heap.protect_mark();
        match session.feed(&mut self.heap, line) {
            Ok(FeedResult::NeedMore) => Ok(None),
            Ok(FeedResult::Event(event)) => {
                let out = self.run_event(event);
                self.heap.protect_release(mark, &[]);
                Ok(Some(out))
            }
            Err(e) => {
                self.heap.protect_release(mark, &[]);
                session.reset();
                Err(e)
            }
        }
    }

    // =====================================================================
    // Rendering helpers
    // =====================================================================

    pub fn atom_text(&self, node: Node) -> &str {
        self.heap.atom_text(node)
    }

    /// The word atom for a value, interning numbers by their printed form.
    pub fn value_word(&mut self, value: &Value) -> Option<Node> {
        match value {
            Value::Word(atom) => Some(*atom),
            Value::Number(n) => {
                Some(self.heap.atom(&tortuga_common::numbers::format_number(*n)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_triggers_collection_before_failing() {
        let config = InterpConfig {
            node_capacity: 4,
            ..Default::default()
        };
        let (mut it, _, _) = Interp::in_memory_with(config, "");
        let a = it.heap.atom("a");
        // Fill the heap with garbage, releasing protection as we go.
        for _ in 0..4 {
            it.heap.try_cons(a, Node::NIL).unwrap();
        }
        it.heap.protect_release(0, &[]);
        assert_eq!(it.heap.free_nodes(), 0);
        // Nothing is rooted, so allocation collects and succeeds.
        let node = it.alloc_cons(a, Node::NIL).unwrap();
        assert_eq!(it.heap.car(node), a);
    }

    #[test]
    fn test_alloc_fails_when_everything_is_rooted() {
        let config = InterpConfig {
            node_capacity: 2,
            ..Default::default()
        };
        let (mut it, _, _) = Interp::in_memory_with(config, "");
        let a = it.heap.atom("a");
        let l1 = it.heap.try_cons(a, Node::NIL).unwrap();
        let l2 = it.heap.try_cons(a, Node::NIL).unwrap();
        let x = it.heap.atom("x");
        let y = it.heap.atom("y");
        it.ws.globals.set(x, Value::List(l1));
        it.ws.globals.set(y, Value::List(l2));
        it.heap.protect_release(0, &[]);

        let err = it.alloc_cons(a, Node::NIL).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfSpace);
    }

    #[test]
    fn test_lookup_chain_frames_then_globals() {
        let (mut it, _, _) = Interp::in_memory("");
        let x = it.heap.atom("x");
        let f = it.heap.atom("f");
        it.ws.globals.set(x, Value::Number(1.0));
        assert_eq!(it.lookup_var(x), Some(Value::Number(1.0)));

        it.frames.push(f, &[x], &[Value::Number(2.0)]).unwrap();
        assert_eq!(it.lookup_var(x), Some(Value::Number(2.0)));

        // Rebinding hits the frame, not the global.
        it.assign_var(x, Value::Number(3.0));
        it.frames.pop();
        assert_eq!(it.lookup_var(x), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_define_rejects_primitive_names() {
        let (mut it, _, _) = Interp::in_memory("");
        let name = it.heap.atom("print");
        let err = it
            .define_procedure(Definition {
                name,
                params: vec![],
                body: Node::NIL,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IsPrimitive);
    }
}
