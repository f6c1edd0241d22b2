//! Heap introspection and persistence primitives.

use tortuga_heap::{Outcome, Value};
use tracing::debug;

use super::{Primitive, word_arg};
use crate::interp::Interp;
use crate::persist;

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "recycle",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_recycle,
    },
    Primitive {
        name: "nodes",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_nodes,
    },
    Primitive {
        name: "save",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_save,
    },
    Primitive {
        name: "load",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_load,
    },
];

fn prim_recycle(it: &mut Interp, _args: &[Value]) -> Outcome {
    let swept = it.collect_garbage();
    debug!(swept, "recycle");
    Outcome::None
}

fn prim_nodes(it: &mut Interp, _args: &[Value]) -> Outcome {
    Outcome::Value(Value::Number(it.heap.free_nodes() as f32))
}

fn prim_save(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "save", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let path = it.heap.atom_text(name).to_string();
    persist::save(it, &path)
}

fn prim_load(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "load", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let path = it.heap.atom_text(name).to_string();
    persist::load(it, &path)
}
