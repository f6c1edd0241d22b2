//! Control-flow primitives: conditionals, repetition, non-local exits, the
//! pause sub-REPL.

use tortuga_common::errors::ErrorCode;
use tortuga_heap::{Outcome, Value};
use tortuga_reader::{ReadSession, printer};

use super::{Primitive, bool_arg, int_arg, list_arg, word_arg};
use crate::eval::RunKind;
use crate::interp::{CaughtError, Interp};

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "if",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 3,
        func: prim_if,
    },
    Primitive {
        name: "ifelse",
        aliases: &[],
        min_arity: 3,
        default_arity: 3,
        max_arity: 3,
        func: prim_ifelse,
    },
    Primitive {
        name: "test",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_test,
    },
    Primitive {
        name: "iftrue",
        aliases: &["ift"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_iftrue,
    },
    Primitive {
        name: "iffalse",
        aliases: &["iff"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_iffalse,
    },
    Primitive {
        name: "repeat",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_repeat,
    },
    Primitive {
        name: "repcount",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_repcount,
    },
    Primitive {
        name: "run",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_run,
    },
    Primitive {
        name: "runresult",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_runresult,
    },
    Primitive {
        name: "stop",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_stop,
    },
    Primitive {
        name: "output",
        aliases: &["op"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_output,
    },
    Primitive {
        name: "catch",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_catch,
    },
    Primitive {
        name: "throw",
        aliases: &[],
        min_arity: 1,
        // The thrown value is optional and taken greedily when present.
        default_arity: 2,
        max_arity: 2,
        func: prim_throw,
    },
    Primitive {
        name: "error",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_error,
    },
    Primitive {
        name: "label",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_label,
    },
    Primitive {
        name: "goto",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_goto,
    },
    Primitive {
        name: "wait",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_wait,
    },
    Primitive {
        name: "bye",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_bye,
    },
    Primitive {
        name: "pause",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_pause,
    },
    Primitive {
        name: "continue",
        aliases: &["co"],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_continue,
    },
    Primitive {
        name: "to",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_to,
    },
];

fn prim_if(it: &mut Interp, args: &[Value]) -> Outcome {
    let cond = match bool_arg(it, "if", &args[0]) {
        Ok(b) => b,
        Err(out) => return out,
    };
    if cond {
        let list = match list_arg(it, "if", &args[1]) {
            Ok(n) => n,
            Err(out) => return out,
        };
        return it.exec_run(list, RunKind::Value);
    }
    // Paren form may carry an else list.
    if let Some(else_arg) = args.get(2) {
        let list = match list_arg(it, "if", else_arg) {
            Ok(n) => n,
            Err(out) => return out,
        };
        return it.exec_run(list, RunKind::Value);
    }
    Outcome::None
}

fn prim_ifelse(it: &mut Interp, args: &[Value]) -> Outcome {
    let cond = match bool_arg(it, "ifelse", &args[0]) {
        Ok(b) => b,
        Err(out) => return out,
    };
    let branch = if cond { &args[1] } else { &args[2] };
    let list = match list_arg(it, "ifelse", branch) {
        Ok(n) => n,
        Err(out) => return out,
    };
    it.exec_run(list, RunKind::Value)
}

fn prim_test(it: &mut Interp, args: &[Value]) -> Outcome {
    let cond = match bool_arg(it, "test", &args[0]) {
        Ok(b) => b,
        Err(out) => return out,
    };
    if !it.frames.set_test(cond) {
        it.toplevel_test = Some(cond);
    }
    Outcome::None
}

fn test_state(it: &Interp) -> Option<bool> {
    it.frames.get_test().or(it.toplevel_test)
}

fn prim_iftrue(it: &mut Interp, args: &[Value]) -> Outcome {
    let Some(state) = test_state(it) else {
        return Outcome::Error(Box::new(
            tortuga_common::errors::ErrorInfo::new(ErrorCode::NoValue).with_arg("test"),
        ));
    };
    if !state {
        return Outcome::None;
    }
    let list = match list_arg(it, "iftrue", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    it.exec_run(list, RunKind::Value)
}

fn prim_iffalse(it: &mut Interp, args: &[Value]) -> Outcome {
    let Some(state) = test_state(it) else {
        return Outcome::Error(Box::new(
            tortuga_common::errors::ErrorInfo::new(ErrorCode::NoValue).with_arg("test"),
        ));
    };
    if state {
        return Outcome::None;
    }
    let list = match list_arg(it, "iffalse", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    it.exec_run(list, RunKind::Value)
}

fn prim_repeat(it: &mut Interp, args: &[Value]) -> Outcome {
    let times = match int_arg(it, "repeat", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let list = match list_arg(it, "repeat", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    for i in 1..=times {
        it.repcounts.push(i as f32);
        let out = it.exec_run(list, RunKind::Command);
        it.repcounts.pop();
        match out {
            Outcome::None => {}
            other => return other,
        }
    }
    Outcome::None
}

fn prim_repcount(it: &mut Interp, _args: &[Value]) -> Outcome {
    match it.repcounts.last() {
        Some(&n) => Outcome::Value(Value::Number(n)),
        None => Outcome::error_in(ErrorCode::NotInsideRepeat, "repcount"),
    }
}

fn prim_run(it: &mut Interp, args: &[Value]) -> Outcome {
    let list = match list_arg(it, "run", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    it.exec_run(list, RunKind::Value)
}

fn prim_runresult(it: &mut Interp, args: &[Value]) -> Outcome {
    let list = match list_arg(it, "runresult", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    match it.exec_run(list, RunKind::Value) {
        Outcome::Value(v) => match it.make_list(&[v]) {
            Ok(node) => Outcome::Value(Value::List(node)),
            Err(e) => Outcome::Error(Box::new(e)),
        },
        Outcome::None => Outcome::Value(Value::EMPTY_LIST),
        other => other,
    }
}

fn prim_stop(_it: &mut Interp, _args: &[Value]) -> Outcome {
    Outcome::Stop
}

fn prim_output(_it: &mut Interp, args: &[Value]) -> Outcome {
    Outcome::Output(args[0])
}

fn prim_catch(it: &mut Interp, args: &[Value]) -> Outcome {
    let tag = match word_arg(it, "catch", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let list = match list_arg(it, "catch", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let out = it.exec_run(list, RunKind::Value);
    match out {
        Outcome::Throw { tag: thrown, value } if thrown == tag => match value {
            Some(v) => Outcome::Value(v),
            None => Outcome::None,
        },
        Outcome::Error(info) if tag == it.atoms.error_tag => {
            it.caught_error = Some(CaughtError {
                code: info.code.code(),
                message: info.code.template().replace("%s", info.arg.as_deref().unwrap_or("")),
                proc: info.proc.clone(),
                caller: info.caller.clone(),
            });
            Outcome::None
        }
        other => other,
    }
}

fn prim_throw(it: &mut Interp, args: &[Value]) -> Outcome {
    let tag = match word_arg(it, "throw", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    Outcome::Throw {
        tag,
        value: args.get(1).copied(),
    }
}

fn prim_error(it: &mut Interp, _args: &[Value]) -> Outcome {
    let Some(caught) = it.caught_error.take() else {
        return Outcome::Value(Value::EMPTY_LIST);
    };
    let message = it.heap.atom(&caught.message);
    let proc = it.heap.atom(caught.proc.as_deref().unwrap_or(""));
    let caller = it.heap.atom(caught.caller.as_deref().unwrap_or(""));
    let values = [
        Value::Number(caught.code as f32),
        Value::Word(message),
        Value::Word(proc),
        Value::Word(caller),
    ];
    match it.make_list(&values) {
        Ok(node) => Outcome::Value(Value::List(node)),
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_label(_it: &mut Interp, _args: &[Value]) -> Outcome {
    // Labels are landmarks; executing one does nothing.
    Outcome::None
}

fn prim_goto(it: &mut Interp, args: &[Value]) -> Outcome {
    match word_arg(it, "goto", &args[0]) {
        Ok(label) => Outcome::Goto { label },
        Err(out) => out,
    }
}

fn prim_wait(it: &mut Interp, args: &[Value]) -> Outcome {
    let ticks = match int_arg(it, "wait", &args[0]) {
        Ok(n) => n.max(0),
        Err(out) => return out,
    };
    // Sixtieths of a second.
    it.platform.sleep_ms(ticks as u64 * 1000 / 60);
    Outcome::None
}

fn prim_bye(_it: &mut Interp, _args: &[Value]) -> Outcome {
    Outcome::Eof
}

fn prim_pause(it: &mut Interp, _args: &[Value]) -> Outcome {
    enter_pause(it)
}

fn prim_continue(it: &mut Interp, _args: &[Value]) -> Outcome {
    it.pause_resume = true;
    Outcome::None
}

fn prim_to(_it: &mut Interp, _args: &[Value]) -> Outcome {
    Outcome::error(ErrorCode::ToInsideProcedure)
}

/// The pause sub-REPL: read and evaluate with the suspended frame stack in
/// place, so dynamic scope resolves against the paused procedure. Returns
/// `None` when resumed; non-local outcomes propagate to the trampoline.
pub(crate) fn enter_pause(it: &mut Interp) -> Outcome {
    it.pause_resume = false;
    let mut session = ReadSession::new();
    loop {
        let prompt = if session.is_pending() { "> " } else { "pause: " };
        it.io.write_console(prompt);
        it.io.flush();
        let line = match it.io.read_console_line() {
            None => return Outcome::None,
            Some(Err(())) => return Outcome::error(ErrorCode::Stopped),
            Some(Ok(line)) => line,
        };
        match it.feed_line(&mut session, &line) {
            Ok(None) | Ok(Some(Outcome::None)) => {}
            Ok(Some(Outcome::Value(v))) => {
                let text = printer::value_text(&it.heap, &v);
                it.io.write_console(&text);
                it.io.write_console("\n");
            }
            Ok(Some(Outcome::Error(info))) => {
                it.io.write_console(&info.render());
                it.io.write_console("\n");
            }
            Ok(Some(Outcome::Stop | Outcome::Output(_))) => {
                let msg = tortuga_common::errors::ErrorInfo::new(ErrorCode::AtToplevel)
                    .with_arg("output")
                    .render();
                it.io.write_console(&msg);
                it.io.write_console("\n");
            }
            Ok(Some(out @ (Outcome::Throw { .. } | Outcome::Eof | Outcome::Interrupted))) => {
                return out;
            }
            Ok(Some(out @ (Outcome::Call { .. } | Outcome::Goto { .. }))) => return out,
            Err(e) => {
                it.io.write_console(&e.render());
                it.io.write_console("\n");
            }
        }
        if it.pause_resume {
            return Outcome::None;
        }
    }
}
