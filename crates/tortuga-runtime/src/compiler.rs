//! The straight-line compiler: one procedure body line into a [`Chunk`].
//!
//! The gate is conservative. A line compiles only when every top-level
//! token is a literal, a variable, an operator, or a known primitive that
//! is not `label`/`goto`; parentheses, user-procedure calls and unknown
//! words fall back to the evaluator. Sublists compile as list constants —
//! whatever runs them at runtime uses the evaluator anyway. Omitting this
//! whole module would not change observable behaviour.

use tortuga_bytecode::{Chunk, Instruction, OpCode};
use tortuga_heap::{Node, Value};

use crate::interp::Interp;

/// Binding strength for the infix fold; mirrors the evaluator's table.
fn op_prec(op: OpCode) -> u8 {
    match op {
        OpCode::Mul | OpCode::Div => 2,
        OpCode::Add | OpCode::Sub => 1,
        _ => 0,
    }
}

fn infix_opcode(text: &str) -> Option<OpCode> {
    match text {
        "+" => Some(OpCode::Add),
        "-" => Some(OpCode::Sub),
        "*" => Some(OpCode::Mul),
        "/" => Some(OpCode::Div),
        "=" => Some(OpCode::CmpEq),
        "<" => Some(OpCode::CmpLt),
        ">" => Some(OpCode::CmpGt),
        _ => None,
    }
}

pub fn compile_line(it: &mut Interp, line: Node) -> Option<Chunk> {
    let mut compiler = Compiler {
        it,
        chunk: Chunk::new(),
        cursor: line,
    };
    compiler.compile()
}

struct Compiler<'a> {
    it: &'a mut Interp,
    chunk: Chunk,
    cursor: Node,
}

impl Compiler<'_> {
    fn compile(mut self) -> Option<Chunk> {
        loop {
            self.skip_markers();
            if self.cursor.is_nil() {
                break;
            }
            self.expression(0)?;
            self.chunk.emit(Instruction::op_only(OpCode::EndInstr));
        }
        Some(self.chunk)
    }

    fn expression(&mut self, min_prec: u8) -> Option<()> {
        self.operand()?;
        while let Some(op) = self.peek_infix() {
            if op_prec(op) < min_prec {
                break;
            }
            self.advance();
            // Recursing at the same precedence keeps right associativity.
            self.expression(op_prec(op))?;
            self.chunk.emit(Instruction::op_only(op));
        }
        Some(())
    }

    fn operand(&mut self) -> Option<()> {
        self.skip_markers();
        let elem = self.next()?;

        if !elem.is_atom() {
            let idx = self.chunk.add_const(Value::List(elem.as_plain_cons()));
            self.chunk.emit(Instruction::op_a(OpCode::LoadConst, idx));
            return Some(());
        }

        let text = self.it.heap.atom_text(elem).to_string();
        match text.as_str() {
            "(" | ")" | "+" | "*" | "/" | "=" | "<" | ">" => return None,
            "-" => {
                self.operand()?;
                self.chunk.emit(Instruction::op_only(OpCode::Neg));
                return Some(());
            }
            _ => {}
        }

        if let Some(stripped) = text.strip_prefix('"') {
            let atom = self.it.heap.atom(stripped);
            let idx = self.chunk.add_const(Value::Word(atom));
            self.chunk.emit(Instruction::op_a(OpCode::LoadConst, idx));
            return Some(());
        }
        if text.len() > 1 && text.starts_with(':') {
            let name = self.it.heap.atom(&text[1..]);
            let idx = self.chunk.add_const(Value::Word(name));
            self.chunk.emit(Instruction::op_a(OpCode::LoadVar, idx));
            return Some(());
        }
        if let Some(n) = tortuga_common::numbers::parse_number(&text) {
            let idx = self.chunk.add_const(Value::Number(n));
            self.chunk.emit(Instruction::op_a(OpCode::LoadConst, idx));
            return Some(());
        }

        let id = self.it.registry.find(&text)?;
        let prim = self.it.registry.get(id);
        if matches!(prim.name, "label" | "goto") {
            return None;
        }

        // `make "x <expr>` gets the dedicated store op.
        if prim.name == "make" {
            if let Some(name) = self.peek_quoted() {
                self.advance();
                let name = self.it.heap.atom(&name);
                self.expression(0)?;
                let idx = self.chunk.add_const(Value::Word(name));
                self.chunk.emit(Instruction::op_a(OpCode::StoreVar, idx));
                return Some(());
            }
        }

        for _ in 0..prim.default_arity {
            self.expression(0)?;
        }
        self.chunk.emit(Instruction::op_ab(
            OpCode::CallPrim,
            id,
            prim.default_arity as u16,
        ));
        Some(())
    }

    // -- cursor helpers ----------------------------------------------------

    fn skip_markers(&mut self) {
        while !self.cursor.is_nil() && self.it.heap.car(self.cursor).is_newline_marker() {
            self.cursor = self.it.heap.cdr(self.cursor);
        }
    }

    fn next(&mut self) -> Option<Node> {
        if self.cursor.is_nil() {
            return None;
        }
        let elem = self.it.heap.car(self.cursor);
        self.cursor = self.it.heap.cdr(self.cursor);
        Some(elem)
    }

    fn advance(&mut self) {
        self.cursor = self.it.heap.cdr(self.cursor);
    }

    fn peek_infix(&mut self) -> Option<OpCode> {
        self.skip_markers();
        if self.cursor.is_nil() {
            return None;
        }
        let elem = self.it.heap.car(self.cursor);
        if !elem.is_atom() {
            return None;
        }
        infix_opcode(self.it.heap.atom_text(elem))
    }

    fn peek_quoted(&mut self) -> Option<String> {
        self.skip_markers();
        if self.cursor.is_nil() {
            return None;
        }
        let elem = self.it.heap.car(self.cursor);
        if !elem.is_atom() {
            return None;
        }
        self.it
            .heap
            .atom_text(elem)
            .strip_prefix('"')
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tortuga_reader::reader::read_line_list;

    fn compile(source: &str) -> Option<Chunk> {
        let (mut it, _, _) = Interp::in_memory("");
        let line = read_line_list(&mut it.heap, source).unwrap();
        compile_line(&mut it, line)
    }

    #[test]
    fn test_straight_line_compiles() {
        let chunk = compile("print sum 1 2").expect("eligible");
        let ops: Vec<OpCode> = chunk.code.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                OpCode::LoadConst,
                OpCode::LoadConst,
                OpCode::CallPrim,
                OpCode::CallPrim,
                OpCode::EndInstr,
            ]
        );
    }

    #[test]
    fn test_infix_precedence_compiles() {
        let chunk = compile("print 2 + 3 * 4").expect("eligible");
        let ops: Vec<OpCode> = chunk.code.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                OpCode::LoadConst, // 2
                OpCode::LoadConst, // 3
                OpCode::LoadConst, // 4
                OpCode::Mul,
                OpCode::Add,
                OpCode::CallPrim,
                OpCode::EndInstr,
            ]
        );
    }

    #[test]
    fn test_make_uses_store_var() {
        let chunk = compile("make \"x 3").expect("eligible");
        let ops: Vec<OpCode> = chunk.code.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![OpCode::LoadConst, OpCode::StoreVar, OpCode::EndInstr]
        );
    }

    #[test]
    fn test_user_calls_are_rejected() {
        // `square` is not defined, and even if it were, user calls must
        // fall back to the evaluator.
        assert!(compile("print square 4").is_none());
    }

    #[test]
    fn test_goto_label_and_parens_are_rejected() {
        assert!(compile("goto \"loop").is_none());
        assert!(compile("label \"loop").is_none());
        assert!(compile("print (sum 1 2 3)").is_none());
    }

    #[test]
    fn test_sublists_are_constants() {
        let chunk = compile("if 1 = 1 [print 1]").expect("eligible");
        assert!(chunk.consts.iter().any(|c| matches!(c, Value::List(_))));
    }
}
