//! Workspace management primitives: definition, listing, erasure, bury and
//! trace flags.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Node, Outcome, Value};
use tortuga_reader::printer;
use tortuga_reader::reader::Definition;

use super::{Primitive, doesnt_like, list_arg, names_of, word_arg};
use crate::interp::Interp;
use crate::persist;

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "define",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_define,
    },
    Primitive {
        name: "text",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_text,
    },
    Primitive {
        name: "po",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_po,
    },
    Primitive {
        name: "poall",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_poall,
    },
    Primitive {
        name: "pops",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_pops,
    },
    Primitive {
        name: "pots",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_pots,
    },
    Primitive {
        name: "pons",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_pons,
    },
    Primitive {
        name: "erase",
        aliases: &["er"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_erase,
    },
    Primitive {
        name: "erall",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_erall,
    },
    Primitive {
        name: "erps",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_erps,
    },
    Primitive {
        name: "erns",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_erns,
    },
    Primitive {
        name: "bury",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_bury,
    },
    Primitive {
        name: "unbury",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_unbury,
    },
    Primitive {
        name: "trace",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_trace,
    },
    Primitive {
        name: "untrace",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_untrace,
    },
    Primitive {
        name: "step",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_step,
    },
    Primitive {
        name: "unstep",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_unstep,
    },
];

/// `define "name [[params] [line] …]`.
fn prim_define(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "define", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let text = match list_arg(it, "define", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };

    // First real element is the parameter list; the rest are body lines.
    let mut cursor = text;
    while !cursor.is_nil() && it.heap.car(cursor).is_newline_marker() {
        cursor = it.heap.cdr(cursor);
    }
    if cursor.is_nil() {
        return doesnt_like(it, "define", &args[1]);
    }
    let params_elem = it.heap.car(cursor);
    if params_elem.is_atom() {
        return doesnt_like(it, "define", &args[1]);
    }
    let mut params = Vec::new();
    let mut node = params_elem.as_plain_cons();
    while !node.is_nil() {
        let p = it.heap.car(node);
        node = it.heap.cdr(node);
        if p.is_newline_marker() {
            continue;
        }
        if !p.is_atom() {
            return doesnt_like(it, "define", &args[1]);
        }
        let text = it.heap.atom_text(p);
        let bare = text.strip_prefix(':').unwrap_or(text).to_string();
        let atom = it.heap.atom(&bare);
        params.push(atom);
    }
    // The remaining elements are the body lines, shared as stored.
    let body = it.heap.cdr(cursor);
    match it.define_procedure(Definition { name, params, body }) {
        Ok(()) => Outcome::None,
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

/// `text "name` — `[[params] [line] …]`, the inverse of `define`.
fn prim_text(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "text", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let Some(proc) = it.ws.procs.by_name(name) else {
        return dont_know_how(it, name);
    };
    let params = proc.params.clone();
    let body = proc.body;
    let mut params_list = Node::NIL;
    for &p in params.iter().rev() {
        params_list = match it.alloc_cons(p, params_list) {
            Ok(n) => n,
            Err(e) => return Outcome::Error(Box::new(e)),
        };
    }
    // Body lines are shared; only the new head cell is fresh.
    match it.alloc_cons(params_list.as_sublist(), body) {
        Ok(n) => Outcome::Value(Value::List(n)),
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_po(it: &mut Interp, args: &[Value]) -> Outcome {
    let names = match names_of(it, "po", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    for name in names {
        let Some(proc) = it.ws.procs.by_name(name) else {
            return dont_know_how(it, name);
        };
        let text = printer::definition_text(&it.heap, proc.name, &proc.params, proc.body);
        it.io.write(&text);
    }
    Outcome::None
}

fn prim_poall(it: &mut Interp, _args: &[Value]) -> Outcome {
    let text = persist::workspace_text(it);
    it.io.write(&text);
    Outcome::None
}

fn prim_pops(it: &mut Interp, _args: &[Value]) -> Outcome {
    let text = persist::procedures_text(it);
    it.io.write(&text);
    Outcome::None
}

fn prim_pots(it: &mut Interp, _args: &[Value]) -> Outcome {
    let text = persist::procedure_titles(it);
    it.io.write(&text);
    Outcome::None
}

fn prim_pons(it: &mut Interp, _args: &[Value]) -> Outcome {
    let text = persist::names_text(it);
    it.io.write(&text);
    Outcome::None
}

fn prim_erase(it: &mut Interp, args: &[Value]) -> Outcome {
    let names = match names_of(it, "erase", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    for name in names {
        if !it.erase_procedure(name) {
            return dont_know_how(it, name);
        }
    }
    Outcome::None
}

/// Erase everything unburied and reset execution state. Unwinds to the
/// top level: the frames this wipes out must not keep running.
fn prim_erall(it: &mut Interp, _args: &[Value]) -> Outcome {
    it.ws.procs.erase_all();
    it.ws.globals.erase_all();
    it.ws.props.clear();
    it.chunks.clear();
    it.reset_execution_state();
    Outcome::Throw {
        tag: it.atoms.toplevel,
        value: None,
    }
}

/// Erase procedures only. Unlike `erall` this does not reset execution
/// state; the asymmetry is long-standing behaviour.
fn prim_erps(it: &mut Interp, _args: &[Value]) -> Outcome {
    it.ws.procs.erase_all();
    it.chunks.clear();
    Outcome::None
}

fn prim_erns(it: &mut Interp, _args: &[Value]) -> Outcome {
    it.ws.globals.erase_all();
    Outcome::None
}

fn set_buried(it: &mut Interp, prim: &str, args: &[Value], buried: bool) -> Outcome {
    let names = match names_of(it, prim, &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    for name in names {
        if let Some(p) = it.ws.procs.by_name_mut(name) {
            p.buried = buried;
        } else if !it.ws.globals.set_buried(name, buried) {
            return dont_know_how(it, name);
        }
    }
    Outcome::None
}

fn prim_bury(it: &mut Interp, args: &[Value]) -> Outcome {
    set_buried(it, "bury", args, true)
}

fn prim_unbury(it: &mut Interp, args: &[Value]) -> Outcome {
    set_buried(it, "unbury", args, false)
}

fn set_proc_flag(
    it: &mut Interp,
    prim: &str,
    args: &[Value],
    set: fn(&mut tortuga_workspace::Procedure, bool),
    value: bool,
) -> Outcome {
    let names = match names_of(it, prim, &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    for name in names {
        match it.ws.procs.by_name_mut(name) {
            Some(p) => set(p, value),
            None => return dont_know_how(it, name),
        }
    }
    Outcome::None
}

fn prim_trace(it: &mut Interp, args: &[Value]) -> Outcome {
    set_proc_flag(it, "trace", args, |p, v| p.traced = v, true)
}

fn prim_untrace(it: &mut Interp, args: &[Value]) -> Outcome {
    set_proc_flag(it, "untrace", args, |p, v| p.traced = v, false)
}

fn prim_step(it: &mut Interp, args: &[Value]) -> Outcome {
    set_proc_flag(it, "step", args, |p, v| p.stepped = v, true)
}

fn prim_unstep(it: &mut Interp, args: &[Value]) -> Outcome {
    set_proc_flag(it, "unstep", args, |p, v| p.stepped = v, false)
}

fn dont_know_how(it: &Interp, name: Node) -> Outcome {
    let text = it.heap.atom_text(name).to_string();
    Outcome::Error(Box::new(
        ErrorInfo::new(ErrorCode::DontKnowHow).with_arg(text),
    ))
}
