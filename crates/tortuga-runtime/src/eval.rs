//! The evaluator machine: expression evaluation, the CPS trampoline and
//! tail-call reuse, in one explicit-state loop.
//!
//! Evaluation state lives in a stack of [`Layer`]s. The bottom layer runs a
//! bare token list (a REPL line, a `run` list); each user-procedure call
//! pushes a layer owning an arena frame. Within a layer, an instruction is
//! evaluated with an explicit stack of pending operations — a command or
//! operator waiting for inputs — so a nested user call suspends by pushing a
//! layer and resumes by feeding the returned value back into the pending
//! stack. Host recursion happens only when a primitive runs a sublist
//! (`repeat`, `if`, `run`, `catch`), never along procedure call chains.
//!
//! A self-recursive call in tail position reuses the current frame instead
//! of pushing, keeping the arena flat across unbounded iteration.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Node, Outcome, Value};
use tortuga_reader::printer;
use tracing::trace;

use crate::interp::Interp;
use crate::vm;

/// How a list's final value is treated: `Command` rejects any unconsumed
/// value, `Value` returns one produced by the last instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Command,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
}

impl InfixOp {
    fn from_text(text: &str) -> Option<Self> {
        match text {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "=" => Some(Self::Eq),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            _ => None,
        }
    }

    /// `*`/`/` bind tighter than `+`/`-`; comparisons bind loosest.
    fn prec(self) -> u8 {
        match self {
            Self::Mul | Self::Div => 2,
            Self::Add | Self::Sub => 1,
            Self::Eq | Self::Lt | Self::Gt => 0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// One suspended operation inside an instruction.
enum Pending {
    /// A primitive gathering inputs. `paren` means variadic-until-`)`.
    Prim {
        id: u16,
        args: Vec<Value>,
        paren: bool,
    },
    /// A user procedure gathering inputs.
    UserCall {
        name: Node,
        arity: usize,
        args: Vec<Value>,
        paren: bool,
    },
    /// An infix operator holding its left operand.
    Infix { op: InfixOp, lhs: Value },
    /// Unary minus.
    Unary,
    /// A parenthesised expression group.
    Group { value: Option<Value> },
}

/// One execution context: a bare list or a procedure body.
struct Layer {
    is_proc: bool,
    proc_name: Node,
    /// Remaining body lines after the current one (NIL for bare lists).
    body: Node,
    /// Remaining tokens of the current line.
    cursor: Node,
    pending: Vec<Pending>,
    /// Protect mark taken at the start of the current instruction.
    mark: usize,
    in_instr: bool,
    /// The current line is the last body line (tail calls may reuse).
    allow_tco: bool,
    traced: bool,
    stepped: bool,
}

impl Layer {
    fn bare(list: Node, mark: usize) -> Self {
        Self {
            is_proc: false,
            proc_name: Node::NIL,
            body: Node::NIL,
            cursor: list,
            pending: Vec::new(),
            mark,
            in_instr: false,
            allow_tco: false,
            traced: false,
            stepped: false,
        }
    }

    fn proc(name: Node, body: Node, traced: bool, stepped: bool, mark: usize) -> Self {
        Self {
            is_proc: true,
            proc_name: name,
            body,
            cursor: Node::NIL,
            pending: Vec::new(),
            mark,
            in_instr: false,
            allow_tco: false,
            traced,
            stepped,
        }
    }
}

/// A machine step decision.
enum Step {
    Continue,
    Deliver(Value),
    Control(Outcome),
    Return(Outcome),
}

pub struct Machine<'a> {
    it: &'a mut Interp,
    layers: Vec<Layer>,
    kind: RunKind,
}

impl<'a> Machine<'a> {
    pub fn new(it: &'a mut Interp) -> Self {
        Self {
            it,
            layers: Vec::new(),
            kind: RunKind::Command,
        }
    }

    /// Run a token list to completion.
    pub fn run(mut self, list: Node, kind: RunKind) -> Outcome {
        self.kind = kind;
        let mark = self.it.heap.protect_mark();
        self.layers.push(Layer::bare(list, mark));

        let mut deliver: Option<Value> = None;
        loop {
            let mut step = match deliver.take() {
                Some(v) => self.feed(v),
                None => self.read_step(),
            };
            // Control signals can cascade (a Stop during a resume, an error
            // surfaced by a finishing layer); resolve until quiescent.
            loop {
                match step {
                    Step::Control(out) => step = self.handle_control(out),
                    Step::Continue => break,
                    Step::Deliver(v) => {
                        deliver = Some(v);
                        break;
                    }
                    Step::Return(out) => return out,
                }
            }
        }
    }

    // =====================================================================
    // Reading tokens
    // =====================================================================

    fn read_step(&mut self) -> Step {
        self.skip_markers();
        let layer = self.layers.last().expect("machine has a layer");

        if layer.cursor.is_nil() {
            return self.line_end_step();
        }

        if !self.layers.last().unwrap().in_instr {
            // Instruction boundary: poll the cooperative flags.
            if self.it.io.flags.take_brk() {
                return Step::Control(Outcome::error(ErrorCode::Stopped));
            }
            if self.it.io.flags.take_pause() {
                let out = crate::primitives::control::enter_pause(self.it);
                if !matches!(out, Outcome::None) {
                    return Step::Control(out);
                }
            }
            let mark = self.it.heap.protect_mark();
            let layer = self.layers.last_mut().unwrap();
            layer.mark = mark;
            layer.in_instr = true;
        }

        let layer = self.layers.last_mut().unwrap();
        let elem = self.it.heap.car(layer.cursor);
        layer.cursor = self.it.heap.cdr(layer.cursor);
        self.classify(elem)
    }

    /// The line ran out of tokens. A primitive holding at least its minimum
    /// inputs completes here (`throw "tag` with the value omitted); anything
    /// else still waiting is short of inputs.
    fn line_end_step(&mut self) -> Step {
        let layer = self.layers.last_mut().unwrap();
        match layer.pending.last() {
            None => {}
            Some(Pending::Prim {
                id,
                args,
                paren: false,
            }) => {
                let id = *id;
                let filled = args.len();
                if filled >= self.it.registry.get(id).min_arity as usize {
                    let Some(Pending::Prim { args, .. }) = layer.pending.pop() else {
                        unreachable!()
                    };
                    return self.invoke_prim(id, args);
                }
                let name = self.it.registry.get(id).name;
                return Step::Control(Outcome::error_in(ErrorCode::NotEnoughInputs, name));
            }
            Some(_) => {
                let name = self.innermost_name();
                return Step::Control(Outcome::error_in(ErrorCode::NotEnoughInputs, &name));
            }
        }
        self.advance_line()
    }

    fn classify(&mut self, elem: Node) -> Step {
        if !elem.is_atom() {
            // NIL or a sublist element: a list literal, captured verbatim.
            return Step::Deliver(Value::List(elem.as_plain_cons()));
        }

        let text = self.it.heap.atom_text(elem).to_string();
        match text.as_str() {
            "(" => return self.paren_open(),
            ")" => return self.paren_close(),
            "-" => {
                // No left operand available here, so this minus is unary.
                self.layers.last_mut().unwrap().pending.push(Pending::Unary);
                return Step::Continue;
            }
            "+" | "*" | "/" | "=" | "<" | ">" => {
                return Step::Control(
                    Outcome::error(ErrorCode::DontKnowWhatToDoWith)
                        .with_arg_text(&text),
                );
            }
            _ => {}
        }

        if let Some(stripped) = text.strip_prefix('"') {
            let atom = self.it.heap.atom(stripped);
            return Step::Deliver(Value::Word(atom));
        }
        if text.len() > 1 && text.starts_with(':') {
            let name = self.it.heap.atom(&text[1..]);
            return match self.it.lookup_var(name) {
                // A declared-but-unassigned local reads as unbound.
                Some(v) if !v.is_none() => Step::Deliver(v),
                _ => Step::Control(Outcome::Error(Box::new(
                    ErrorInfo::new(ErrorCode::NoValue).with_arg(&text[1..]),
                ))),
            };
        }
        if let Some(n) = tortuga_common::numbers::parse_number(&text) {
            return Step::Deliver(Value::Number(n));
        }
        self.dispatch_word(elem, &text)
    }

    fn dispatch_word(&mut self, atom: Node, text: &str) -> Step {
        if let Some(id) = self.it.registry.find(text) {
            let prim = self.it.registry.get(id);
            if prim.default_arity == 0 {
                return self.invoke_prim(id, Vec::new());
            }
            self.layers.last_mut().unwrap().pending.push(Pending::Prim {
                id,
                args: Vec::new(),
                paren: false,
            });
            return Step::Continue;
        }
        if let Some(proc) = self.it.ws.procs.by_name(atom) {
            let arity = proc.params.len();
            if arity == 0 {
                return self.dispatch_user(atom, Vec::new());
            }
            self.layers
                .last_mut()
                .unwrap()
                .pending
                .push(Pending::UserCall {
                    name: atom,
                    arity,
                    args: Vec::new(),
                    paren: false,
                });
            return Step::Continue;
        }
        Step::Control(Outcome::Error(Box::new(
            ErrorInfo::new(ErrorCode::DontKnowHow).with_arg(text),
        )))
    }

    // =====================================================================
    // Parentheses
    // =====================================================================

    fn paren_open(&mut self) -> Step {
        self.skip_markers();
        let layer = self.layers.last().unwrap();
        let head = layer.cursor;
        if !head.is_nil() {
            let elem = self.it.heap.car(head);
            if elem.is_atom() {
                let text = self.it.heap.atom_text(elem).to_string();
                let plain_word = !text.starts_with(['"', ':'])
                    && !matches!(text.as_str(), "(" | ")" | "+" | "-" | "*" | "/" | "=" | "<" | ">")
                    && tortuga_common::numbers::parse_number(&text).is_none();
                if plain_word {
                    if let Some(id) = self.it.registry.find(&text) {
                        let layer = self.layers.last_mut().unwrap();
                        layer.cursor = self.it.heap.cdr(head);
                        layer.pending.push(Pending::Prim {
                            id,
                            args: Vec::new(),
                            paren: true,
                        });
                        return Step::Continue;
                    }
                    if let Some(proc) = self.it.ws.procs.by_name(elem) {
                        let arity = proc.params.len();
                        let layer = self.layers.last_mut().unwrap();
                        layer.cursor = self.it.heap.cdr(head);
                        layer.pending.push(Pending::UserCall {
                            name: elem,
                            arity,
                            args: Vec::new(),
                            paren: true,
                        });
                        return Step::Continue;
                    }
                }
            }
        }
        self.layers
            .last_mut()
            .unwrap()
            .pending
            .push(Pending::Group { value: None });
        Step::Continue
    }

    fn paren_close(&mut self) -> Step {
        let layer = self.layers.last_mut().unwrap();
        match layer.pending.pop() {
            Some(Pending::Group { value: Some(v) }) => Step::Deliver(v),
            Some(Pending::Group { value: None }) => Step::Control(
                Outcome::error(ErrorCode::DontKnowWhatToDoWith).with_arg_text("("),
            ),
            Some(Pending::Prim {
                id,
                args,
                paren: true,
            }) => self.invoke_prim(id, args),
            Some(Pending::UserCall {
                name,
                arity,
                args,
                paren: true,
            }) => {
                if args.len() < arity {
                    let text = self.it.heap.atom_text(name).to_string();
                    return Step::Control(Outcome::error_in(ErrorCode::NotEnoughInputs, &text));
                }
                self.dispatch_user(name, args)
            }
            other => {
                // Put it back; a stray `)` mid-gather is an error.
                if let Some(p) = other {
                    self.layers.last_mut().unwrap().pending.push(p);
                }
                Step::Control(
                    Outcome::error(ErrorCode::DontKnowWhatToDoWith).with_arg_text(")"),
                )
            }
        }
    }

    // =====================================================================
    // Feeding values through the pending stack
    // =====================================================================

    fn feed(&mut self, value: Value) -> Step {
        let mut v = value;
        loop {
            if let Some(op) = self.peek_operator() {
                // Fold unary minus and any tighter operator to the left,
                // then suspend on this one. Keeping equal precedence
                // unfolded gives right associativity.
                loop {
                    let layer = self.layers.last_mut().unwrap();
                    match layer.pending.last() {
                        Some(Pending::Unary) => {
                            layer.pending.pop();
                            match v.as_number(&self.it.heap) {
                                Some(n) => v = Value::Number(-n),
                                None => {
                                    let arg = printer::error_arg_text(&self.it.heap, &v);
                                    return Step::Control(Outcome::error_arg(
                                        ErrorCode::DoesntLikeInput,
                                        "-",
                                        arg,
                                    ));
                                }
                            }
                        }
                        Some(Pending::Infix { op: inner, .. }) if inner.prec() > op.prec() => {
                            let Some(Pending::Infix { op: inner, lhs }) = layer.pending.pop()
                            else {
                                unreachable!()
                            };
                            match self.apply_infix(inner, lhs, v) {
                                Ok(folded) => v = folded,
                                Err(out) => return Step::Control(out),
                            }
                        }
                        _ => break,
                    }
                }
                self.consume_operator();
                if let Value::List(node) = v {
                    self.it.heap.protect_push(node);
                }
                self.layers
                    .last_mut()
                    .unwrap()
                    .pending
                    .push(Pending::Infix { op, lhs: v });
                return Step::Continue;
            }

            let layer = self.layers.last_mut().unwrap();
            match layer.pending.last_mut() {
                None => return self.value_complete(v),
                Some(Pending::Unary) => {
                    layer.pending.pop();
                    match v.as_number(&self.it.heap) {
                        Some(n) => v = Value::Number(-n),
                        None => {
                            let arg = printer::error_arg_text(&self.it.heap, &v);
                            return Step::Control(Outcome::error_arg(
                                ErrorCode::DoesntLikeInput,
                                "-",
                                arg,
                            ));
                        }
                    }
                }
                Some(Pending::Infix { .. }) => {
                    let Some(Pending::Infix { op, lhs }) = layer.pending.pop() else {
                        unreachable!()
                    };
                    match self.apply_infix(op, lhs, v) {
                        Ok(folded) => v = folded,
                        Err(out) => return Step::Control(out),
                    }
                }
                Some(Pending::Group { value }) => {
                    if value.is_some() {
                        let arg = printer::error_arg_text(&self.it.heap, &v);
                        return Step::Control(
                            Outcome::error(ErrorCode::DontKnowWhatToDoWith).with_arg_text(&arg),
                        );
                    }
                    *value = Some(v);
                    if let Value::List(node) = v {
                        self.it.heap.protect_push(node);
                    }
                    return Step::Continue;
                }
                Some(Pending::Prim { id, args, paren }) => {
                    let id = *id;
                    let paren = *paren;
                    args.push(v);
                    let filled = args.len();
                    if let Value::List(node) = v {
                        self.it.heap.protect_push(node);
                    }
                    let prim = self.it.registry.get(id);
                    if !paren && filled == prim.default_arity as usize {
                        let layer = self.layers.last_mut().unwrap();
                        let Some(Pending::Prim { args, .. }) = layer.pending.pop() else {
                            unreachable!()
                        };
                        return self.invoke_prim(id, args);
                    }
                    if paren && filled > prim.max_arity as usize {
                        return Step::Control(Outcome::error_in(
                            ErrorCode::TooManyInputs,
                            prim.name,
                        ));
                    }
                    return Step::Continue;
                }
                Some(Pending::UserCall {
                    name,
                    arity,
                    args,
                    paren,
                }) => {
                    let name = *name;
                    let arity = *arity;
                    let paren = *paren;
                    args.push(v);
                    let filled = args.len();
                    if let Value::List(node) = v {
                        self.it.heap.protect_push(node);
                    }
                    if !paren && filled == arity {
                        let layer = self.layers.last_mut().unwrap();
                        let Some(Pending::UserCall { args, .. }) = layer.pending.pop() else {
                            unreachable!()
                        };
                        return self.dispatch_user(name, args);
                    }
                    if paren && filled > arity {
                        let text = self.it.heap.atom_text(name).to_string();
                        return Step::Control(Outcome::error_in(ErrorCode::TooManyInputs, &text));
                    }
                    return Step::Continue;
                }
            }
        }
    }

    /// An instruction finished with a value nobody consumed.
    fn value_complete(&mut self, v: Value) -> Step {
        let at_bottom = self.layers.len() == 1;
        let layer = self.layers.last().unwrap();
        let final_position = self.rest_is_empty(layer.cursor);
        if at_bottom && !layer.is_proc && self.kind == RunKind::Value && final_position {
            let layer = self.layers.pop().unwrap();
            let survivors: Vec<Node> = v.as_list().into_iter().collect();
            self.it.heap.protect_release(layer.mark, &survivors);
            return Step::Return(Outcome::Value(v));
        }
        let arg = printer::error_arg_text(&self.it.heap, &v);
        Step::Control(Outcome::error(ErrorCode::DontKnowWhatToDoWith).with_arg_text(&arg))
    }

    // =====================================================================
    // Primitive invocation
    // =====================================================================

    fn invoke_prim(&mut self, id: u16, args: Vec<Value>) -> Step {
        let prim = self.it.registry.get(id);
        if args.len() < prim.min_arity as usize {
            return Step::Control(Outcome::error_in(ErrorCode::NotEnoughInputs, prim.name));
        }
        let out = (prim.func)(self.it, &args);
        match out {
            Outcome::Value(v) => Step::Deliver(v),
            Outcome::None => {
                let layer = self.layers.last_mut().unwrap();
                if layer.pending.is_empty() {
                    let mark = layer.mark;
                    layer.in_instr = false;
                    self.it.heap.protect_release(mark, &[]);
                    Step::Continue
                } else {
                    Step::Control(Outcome::error_in(ErrorCode::DidntOutput, prim.name))
                }
            }
            other => Step::Control(other),
        }
    }

    // =====================================================================
    // User procedure calls
    // =====================================================================

    fn dispatch_user(&mut self, name: Node, args: Vec<Value>) -> Step {
        let Some(proc) = self.it.ws.procs.by_name(name) else {
            let text = self.it.heap.atom_text(name).to_string();
            return Step::Control(Outcome::Error(Box::new(
                ErrorInfo::new(ErrorCode::DontKnowHow).with_arg(text),
            )));
        };
        let arity = proc.params.len();
        let text = self.it.heap.atom_text(name).to_string();
        if args.len() < arity {
            return Step::Control(Outcome::error_in(ErrorCode::NotEnoughInputs, &text));
        }
        if args.len() > arity {
            return Step::Control(Outcome::error_in(ErrorCode::TooManyInputs, &text));
        }

        let layer = self.layers.last().unwrap();
        let tail = layer.is_proc
            && layer.allow_tco
            && layer.pending.is_empty()
            && self.rest_is_empty(layer.cursor)
            && name == layer.proc_name;
        if tail {
            return self.tail_reuse(name, args);
        }
        Step::Control(Outcome::Call { proc: name, args })
    }

    /// Self-recursive tail call: rebind the current frame and restart the
    /// body. Frame depth is unchanged.
    fn tail_reuse(&mut self, name: Node, args: Vec<Value>) -> Step {
        trace!(depth = self.it.frames.depth(), "tail reuse");
        self.it.frames.reuse_for_tail(&args);
        let proc = self.it.ws.procs.by_name(name).expect("proc exists");
        let body = proc.body;
        let traced = proc.traced;
        if traced {
            self.trace_enter(name, &args);
        }
        let layer = self.layers.last_mut().unwrap();
        layer.body = body;
        layer.cursor = Node::NIL;
        layer.allow_tco = false;
        let mark = layer.mark;
        layer.in_instr = false;
        self.it.heap.protect_release(mark, &[]);
        Step::Continue
    }

    /// The CPS `Call` path: push a frame and a layer, leaving the caller's
    /// suspended instruction in place to resume later.
    fn begin_call(&mut self, name: Node, args: Vec<Value>) -> Step {
        let proc = self.it.ws.procs.by_name(name).expect("resolved in dispatch");
        let params = proc.params.clone();
        let body = proc.body;
        let traced = proc.traced;
        let stepped = proc.stepped;

        // Mirror the suspension into the caller's frame for the collector
        // and for `pause` inspection.
        let caller = self.layers.last().unwrap();
        if caller.is_proc {
            self.it.frames.save_cursors(caller.body, caller.cursor);
        }

        if let Err(e) = self.it.frames.push(name, &params, &args) {
            return Step::Control(Outcome::Error(Box::new(e)));
        }
        if traced {
            self.trace_enter(name, &args);
        }
        let mark = self.it.heap.protect_mark();
        self.layers
            .push(Layer::proc(name, body, traced, stepped, mark));
        Step::Continue
    }

    // =====================================================================
    // Line and layer transitions
    // =====================================================================

    /// The current line is exhausted; move to the next body line or finish
    /// the layer.
    fn advance_line(&mut self) -> Step {
        loop {
            let layer = self.layers.last_mut().unwrap();
            if layer.in_instr {
                let mark = layer.mark;
                layer.in_instr = false;
                self.it.heap.protect_release(mark, &[]);
            }
            if !layer.is_proc || layer.body.is_nil() {
                return self.finish_layer(None);
            }

            let line_cell = layer.body;
            let elem = self.it.heap.car(line_cell);
            layer.body = self.it.heap.cdr(line_cell);
            if elem.is_newline_marker() {
                continue;
            }
            let line = elem.as_plain_cons();
            layer.allow_tco = layer.body.is_nil();
            layer.cursor = line;

            if layer.stepped {
                let text = printer::line_text(&self.it.heap, line);
                self.it.io.write_console(&text);
                self.it.io.write_console(" >>> ");
                self.it.io.flush();
                let _ = self.it.io.read_char();
                self.it.io.write_console("\n");
            }

            // Bytecode fast path for straight-line lines.
            match self.try_vm_line(line) {
                Some(Outcome::None) => {
                    self.layers.last_mut().unwrap().cursor = Node::NIL;
                    continue;
                }
                Some(out) => {
                    self.layers.last_mut().unwrap().cursor = Node::NIL;
                    return Step::Control(out);
                }
                None => return Step::Continue,
            }
        }
    }

    fn try_vm_line(&mut self, line: Node) -> Option<Outcome> {
        let key = line.index();
        if line.is_nil() {
            return None;
        }
        let chunk = match self.it.chunks.get(&key) {
            Some(Some(chunk)) => chunk.clone(),
            Some(None) => return None,
            None => {
                let compiled = crate::compiler::compile_line(self.it, line);
                self.it.chunks.insert(key, compiled.clone());
                compiled?
            }
        };
        Some(vm::execute(self.it, &chunk))
    }

    /// Pop the current layer, delivering its result to the suspended parent.
    fn finish_layer(&mut self, result: Option<Value>) -> Step {
        let layer = self.layers.pop().expect("layer to finish");
        if layer.in_instr {
            let survivors: Vec<Node> =
                result.and_then(|v| v.as_list()).into_iter().collect();
            self.it.heap.protect_release(layer.mark, &survivors);
        }
        if layer.is_proc {
            if layer.traced {
                self.trace_exit(layer.proc_name, result);
            }
            self.it.frames.pop();
        }

        if self.layers.is_empty() {
            return Step::Return(match result {
                Some(v) => Outcome::Output(v),
                None => Outcome::None,
            });
        }

        let parent = self.layers.last().unwrap();
        match result {
            Some(v) => {
                if parent.pending.is_empty() {
                    let arg = printer::error_arg_text(&self.it.heap, &v);
                    Step::Control(
                        Outcome::error(ErrorCode::DontKnowWhatToDoWith).with_arg_text(&arg),
                    )
                } else {
                    if let Value::List(node) = v {
                        self.it.heap.protect_push(node);
                    }
                    Step::Deliver(v)
                }
            }
            None => {
                if parent.pending.is_empty() {
                    Step::Continue
                } else {
                    let text = self.it.heap.atom_text(layer.proc_name).to_string();
                    Step::Control(Outcome::error_in(ErrorCode::DidntOutput, &text))
                }
            }
        }
    }

    // =====================================================================
    // Control outcomes
    // =====================================================================

    fn handle_control(&mut self, out: Outcome) -> Step {
        match out {
            Outcome::None | Outcome::Value(_) => {
                unreachable!("done outcomes are not control signals")
            }
            Outcome::Call { proc, args } => self.begin_call(proc, args),
            Outcome::Stop => {
                if self.layers.last().unwrap().is_proc {
                    self.finish_layer(None)
                } else {
                    self.unwind_bottom(Outcome::Stop)
                }
            }
            Outcome::Output(v) => {
                if self.layers.last().unwrap().is_proc {
                    self.finish_layer(Some(v))
                } else {
                    self.unwind_bottom(Outcome::Output(v))
                }
            }
            Outcome::Goto { label } => {
                if self.layers.last().unwrap().is_proc {
                    self.do_goto(label)
                } else {
                    self.unwind_bottom(Outcome::Goto { label })
                }
            }
            out @ (Outcome::Error(_)
            | Outcome::Throw { .. }
            | Outcome::Eof
            | Outcome::Interrupted) => Step::Return(self.unwind_all(out)),
        }
    }

    /// A Stop/Output/Goto reached the bare bottom layer: hand it to whoever
    /// ran this machine (a sublist primitive, or the REPL which reports the
    /// misuse).
    fn unwind_bottom(&mut self, out: Outcome) -> Step {
        let layer = self.layers.pop().expect("bottom layer");
        if layer.in_instr {
            let survivors: Vec<Node> = out
                .value()
                .and_then(|v| v.as_list())
                .into_iter()
                .collect();
            self.it.heap.protect_release(layer.mark, &survivors);
        }
        debug_assert!(self.layers.is_empty());
        Step::Return(out)
    }

    /// Errors, throws and interrupts unwind every layer and frame this
    /// machine owns, attributing the first enclosing procedure.
    fn unwind_all(&mut self, mut out: Outcome) -> Outcome {
        while let Some(layer) = self.layers.pop() {
            if layer.in_instr {
                self.it.heap.protect_release(layer.mark, &[]);
            }
            if layer.is_proc {
                if let Outcome::Error(ref mut info) = out {
                    let name = self.it.heap.atom_text(layer.proc_name).to_string();
                    info.fill_caller(&name);
                }
                self.it.frames.pop();
            }
        }
        // A thrown value must stay alive past the released marks; whoever
        // catches it re-protects on consumption.
        if let Outcome::Throw {
            value: Some(Value::List(node)),
            ..
        } = out
        {
            self.it.heap.protect_push(node);
        }
        out
    }

    /// `goto`: scan the current procedure body from the start for a
    /// `label <name>` line and resume after it.
    fn do_goto(&mut self, label: Node) -> Step {
        let layer = self.layers.last().unwrap();
        let proc = self
            .it
            .ws
            .procs
            .by_name(layer.proc_name)
            .expect("running proc exists");
        let mut line_cell = proc.body;
        let wanted = self.it.heap.atom_text(label).to_ascii_lowercase();

        while !line_cell.is_nil() {
            let elem = self.it.heap.car(line_cell);
            if elem.is_newline_marker() {
                line_cell = self.it.heap.cdr(line_cell);
                continue;
            }
            let line = elem.as_plain_cons();
            if let Some(rest) = self.match_label_line(line, &wanted) {
                let next_body = self.it.heap.cdr(line_cell);
                let layer = self.layers.last_mut().unwrap();
                // The interrupted instruction is abandoned wholesale.
                layer.pending.clear();
                if layer.in_instr {
                    let mark = layer.mark;
                    layer.in_instr = false;
                    self.it.heap.protect_release(mark, &[]);
                }
                layer.cursor = rest;
                layer.body = next_body;
                layer.allow_tco = next_body.is_nil();
                return Step::Continue;
            }
            line_cell = self.it.heap.cdr(line_cell);
        }
        Step::Control(Outcome::Error(Box::new(
            ErrorInfo::new(ErrorCode::CantFindLabel).with_arg(wanted),
        )))
    }

    /// If `line` starts with `label <wanted>`, return the cursor after the
    /// label name.
    fn match_label_line(&self, mut line: Node, wanted: &str) -> Option<Node> {
        while !line.is_nil() && self.it.heap.car(line).is_newline_marker() {
            line = self.it.heap.cdr(line);
        }
        if line.is_nil() {
            return None;
        }
        let head = self.it.heap.car(line);
        if head != self.it.atoms.label {
            return None;
        }
        let mut rest = self.it.heap.cdr(line);
        while !rest.is_nil() && self.it.heap.car(rest).is_newline_marker() {
            rest = self.it.heap.cdr(rest);
        }
        if rest.is_nil() {
            return None;
        }
        let name = self.it.heap.car(rest);
        if !name.is_atom() {
            return None;
        }
        let text = self.it.heap.atom_text(name);
        let text = text.strip_prefix('"').unwrap_or(text);
        text.eq_ignore_ascii_case(wanted)
            .then(|| self.it.heap.cdr(rest))
    }

    // =====================================================================
    // Infix operators
    // =====================================================================

    fn apply_infix(&mut self, op: InfixOp, lhs: Value, rhs: Value) -> Result<Value, Outcome> {
        let bool_word = |it: &Interp, b: bool| {
            Value::Word(if b {
                it.atoms.true_word
            } else {
                it.atoms.false_word
            })
        };
        if op == InfixOp::Eq {
            let eq = lhs.logo_eq(&rhs, &self.it.heap);
            return Ok(bool_word(self.it, eq));
        }

        let (Some(a), Some(b)) = (
            lhs.as_number(&self.it.heap),
            rhs.as_number(&self.it.heap),
        ) else {
            let bad = if lhs.as_number(&self.it.heap).is_none() {
                lhs
            } else {
                rhs
            };
            let arg = printer::error_arg_text(&self.it.heap, &bad);
            return Err(Outcome::error_arg(
                ErrorCode::DoesntLikeInput,
                op.name(),
                arg,
            ));
        };
        let result = match op {
            InfixOp::Add => a + b,
            InfixOp::Sub => a - b,
            InfixOp::Mul => a * b,
            InfixOp::Div => {
                if b == 0.0 {
                    return Err(Outcome::error_in(ErrorCode::DivideByZero, "/"));
                }
                a / b
            }
            InfixOp::Lt => return Ok(bool_word(self.it, a < b)),
            InfixOp::Gt => return Ok(bool_word(self.it, a > b)),
            InfixOp::Eq => unreachable!(),
        };
        if !result.is_finite() {
            return Err(Outcome::error_in(ErrorCode::NumberTooBig, op.name()));
        }
        Ok(Value::Number(result))
    }

    fn peek_operator(&mut self) -> Option<InfixOp> {
        self.skip_markers();
        let layer = self.layers.last().unwrap();
        if layer.cursor.is_nil() {
            return None;
        }
        let elem = self.it.heap.car(layer.cursor);
        if !elem.is_atom() {
            return None;
        }
        InfixOp::from_text(self.it.heap.atom_text(elem))
    }

    fn consume_operator(&mut self) {
        let layer = self.layers.last_mut().unwrap();
        layer.cursor = self.it.heap.cdr(layer.cursor);
    }

    // =====================================================================
    // Small helpers
    // =====================================================================

    fn skip_markers(&mut self) {
        let layer = self.layers.last_mut().unwrap();
        while !layer.cursor.is_nil() {
            let head = self.it.heap.car(layer.cursor);
            if head.is_newline_marker() {
                layer.cursor = self.it.heap.cdr(layer.cursor);
            } else {
                break;
            }
        }
    }

    fn rest_is_empty(&self, mut cursor: Node) -> bool {
        while !cursor.is_nil() {
            if !self.it.heap.car(cursor).is_newline_marker() {
                return false;
            }
            cursor = self.it.heap.cdr(cursor);
        }
        true
    }

    fn innermost_name(&self) -> String {
        let layer = self.layers.last().unwrap();
        match layer.pending.last() {
            Some(Pending::Prim { id, .. }) => self.it.registry.get(*id).name.to_string(),
            Some(Pending::UserCall { name, .. }) => self.it.heap.atom_text(*name).to_string(),
            Some(Pending::Infix { op, .. }) => op.name().to_string(),
            Some(Pending::Unary) => "-".to_string(),
            Some(Pending::Group { .. }) | None => "(".to_string(),
        }
    }

    fn trace_enter(&mut self, name: Node, args: &[Value]) {
        let depth = self.it.frames.depth().saturating_sub(1);
        let mut line = "  ".repeat(depth);
        line.push_str("( ");
        line.push_str(self.it.heap.atom_text(name));
        for a in args {
            line.push(' ');
            line.push_str(&printer::value_text(&self.it.heap, a));
        }
        line.push_str(" )\n");
        self.it.io.write_console(&line);
    }

    fn trace_exit(&mut self, name: Node, result: Option<Value>) {
        let depth = self.it.frames.depth().saturating_sub(1);
        let mut line = "  ".repeat(depth);
        line.push_str(self.it.heap.atom_text(name));
        match result {
            Some(v) => {
                line.push_str(" outputs ");
                line.push_str(&printer::value_text(&self.it.heap, &v));
            }
            None => line.push_str(" stops"),
        }
        line.push('\n');
        self.it.io.write_console(&line);
    }
}

/// Convenience used by Outcome construction above.
trait WithArgText {
    fn with_arg_text(self, arg: &str) -> Outcome;
}

impl WithArgText for Outcome {
    fn with_arg_text(self, arg: &str) -> Outcome {
        match self {
            Outcome::Error(mut info) => {
                info.arg = Some(arg.to_string());
                Outcome::Error(info)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tortuga_reader::reader::read_line_list;

    fn eval(source: &str, kind: RunKind) -> (Outcome, Interp) {
        let (mut it, _, _) = Interp::in_memory("");
        let line = read_line_list(&mut it.heap, source).unwrap();
        let out = it.exec_protected(line, kind);
        (out, it)
    }

    #[test]
    fn test_expression_yields_value() {
        let (out, it) = eval("sum 1 2", RunKind::Value);
        match out {
            Outcome::Value(v) => assert_eq!(v.as_number(&it.heap), Some(3.0)),
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[test]
    fn test_arity_gathering_nests() {
        let (out, it) = eval("sum 1 product 2 3", RunKind::Value);
        assert_eq!(out.value().and_then(|v| v.as_number(&it.heap)), Some(7.0));
    }

    #[test]
    fn test_command_kind_rejects_bare_value() {
        let (out, _) = eval("3", RunKind::Command);
        match out {
            Outcome::Error(info) => {
                assert_eq!(info.code, ErrorCode::DontKnowWhatToDoWith);
                assert_eq!(info.arg.as_deref(), Some("3"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let (out, it) = eval("2 + 3 * 4", RunKind::Value);
        assert_eq!(out.value().and_then(|v| v.as_number(&it.heap)), Some(14.0));
    }

    #[test]
    fn test_quoted_and_list_literals() {
        let (out, it) = eval("\"boom", RunKind::Value);
        match out {
            Outcome::Value(Value::Word(atom)) => {
                assert_eq!(it.heap.atom_text(atom), "boom");
            }
            other => panic!("expected word, got {other:?}"),
        }

        let (out, _) = eval("[a b]", RunKind::Value);
        assert!(matches!(out, Outcome::Value(Value::List(_))));
    }

    #[test]
    fn test_unknown_word_in_command_position() {
        let (out, _) = eval("gargle 1", RunKind::Command);
        match out {
            Outcome::Error(info) => {
                assert_eq!(info.code, ErrorCode::DontKnowHow);
                assert_eq!(info.arg.as_deref(), Some("gargle"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}
