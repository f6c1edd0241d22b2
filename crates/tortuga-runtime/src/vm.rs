//! The stack-machine executor for compiled body lines.
//!
//! Any non-Ok/None status returns immediately; the procedure engine handles
//! control flow exactly as if the evaluator had run the line.

use tortuga_bytecode::{Chunk, OpCode};
use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Outcome, Value};
use tortuga_reader::printer;

use crate::interp::Interp;

pub fn execute(it: &mut Interp, chunk: &Chunk) -> Outcome {
    let mut stack: Vec<Value> = Vec::with_capacity(8);
    let mut mark = it.heap.protect_mark();

    macro_rules! bail {
        ($out:expr) => {{
            let out = $out;
            // Keep any outcome payload alive past the released mark.
            let survivors: Vec<tortuga_heap::Node> = match &out {
                Outcome::Output(Value::List(node)) => vec![*node],
                Outcome::Throw {
                    value: Some(Value::List(node)),
                    ..
                } => vec![*node],
                _ => Vec::new(),
            };
            it.heap.protect_release(mark, &survivors);
            return out;
        }};
    }

    for ins in &chunk.code {
        match ins.op {
            OpCode::LoadConst => {
                let Some(v) = chunk.get_const(ins.a) else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                stack.push(*v);
            }
            OpCode::LoadVar => {
                let Some(Value::Word(name)) = chunk.get_const(ins.a).copied() else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                match it.lookup_var(name) {
                    Some(v) if !v.is_none() => stack.push(v),
                    _ => {
                        let text = it.heap.atom_text(name).to_string();
                        bail!(Outcome::Error(Box::new(
                            ErrorInfo::new(ErrorCode::NoValue).with_arg(text)
                        )));
                    }
                }
            }
            OpCode::StoreVar => {
                let Some(Value::Word(name)) = chunk.get_const(ins.a).copied() else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                let Some(v) = stack.pop() else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                it.assign_var(name, v);
            }
            OpCode::CallPrim => {
                let prim = it.registry.get(ins.a);
                let argc = ins.b as usize;
                if stack.len() < argc {
                    bail!(Outcome::error_in(ErrorCode::DidntOutput, prim.name));
                }
                let args = stack.split_off(stack.len() - argc);
                match (prim.func)(it, &args) {
                    Outcome::Value(v) => {
                        if let Value::List(node) = v {
                            it.heap.protect_push(node);
                        }
                        stack.push(v);
                    }
                    Outcome::None => {}
                    other => bail!(other),
                }
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                let name = op_name(ins.op);
                let (Some(a), Some(b)) = (lhs.as_number(&it.heap), rhs.as_number(&it.heap))
                else {
                    let bad = if lhs.as_number(&it.heap).is_none() { lhs } else { rhs };
                    let arg = printer::error_arg_text(&it.heap, &bad);
                    bail!(Outcome::error_arg(ErrorCode::DoesntLikeInput, name, arg));
                };
                let result = match ins.op {
                    OpCode::Add => a + b,
                    OpCode::Sub => a - b,
                    OpCode::Mul => a * b,
                    OpCode::Div => {
                        if b == 0.0 {
                            bail!(Outcome::error_in(ErrorCode::DivideByZero, "/"));
                        }
                        a / b
                    }
                    _ => unreachable!(),
                };
                if !result.is_finite() {
                    bail!(Outcome::error_in(ErrorCode::NumberTooBig, name));
                }
                stack.push(Value::Number(result));
            }
            OpCode::Neg => {
                let Some(v) = stack.pop() else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                match v.as_number(&it.heap) {
                    Some(n) => stack.push(Value::Number(-n)),
                    None => {
                        let arg = printer::error_arg_text(&it.heap, &v);
                        bail!(Outcome::error_arg(ErrorCode::DoesntLikeInput, "-", arg));
                    }
                }
            }
            OpCode::CmpEq => {
                let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                let eq = lhs.logo_eq(&rhs, &it.heap);
                stack.push(bool_word(it, eq));
            }
            OpCode::CmpLt | OpCode::CmpGt => {
                let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                    bail!(Outcome::error(ErrorCode::Fatal));
                };
                let name = op_name(ins.op);
                let (Some(a), Some(b)) = (lhs.as_number(&it.heap), rhs.as_number(&it.heap))
                else {
                    let bad = if lhs.as_number(&it.heap).is_none() { lhs } else { rhs };
                    let arg = printer::error_arg_text(&it.heap, &bad);
                    bail!(Outcome::error_arg(ErrorCode::DoesntLikeInput, name, arg));
                };
                let b = if ins.op == OpCode::CmpLt { a < b } else { a > b };
                stack.push(bool_word(it, b));
            }
            OpCode::EndInstr => {
                if it.io.flags.take_brk() {
                    bail!(Outcome::error(ErrorCode::Stopped));
                }
                if let Some(v) = stack.pop() {
                    let arg = printer::error_arg_text(&it.heap, &v);
                    bail!(Outcome::Error(Box::new(
                        ErrorInfo::new(ErrorCode::DontKnowWhatToDoWith).with_arg(arg)
                    )));
                }
                it.heap.protect_release(mark, &[]);
                mark = it.heap.protect_mark();
            }
        }
    }

    it.heap.protect_release(mark, &[]);
    Outcome::None
}

fn op_name(op: OpCode) -> &'static str {
    match op {
        OpCode::Add => "+",
        OpCode::Sub => "-",
        OpCode::Mul => "*",
        OpCode::Div => "/",
        OpCode::CmpLt => "<",
        OpCode::CmpGt => ">",
        _ => "?",
    }
}

fn bool_word(it: &Interp, b: bool) -> Value {
    Value::Word(if b {
        it.atoms.true_word
    } else {
        it.atoms.false_word
    })
}
