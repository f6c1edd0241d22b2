//! Variable and property-list primitives.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::{Outcome, Value};

use super::{Primitive, doesnt_like, names_of, word_arg};
use crate::interp::Interp;

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "make",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_make,
    },
    Primitive {
        name: "name",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_name,
    },
    Primitive {
        name: "local",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_local,
    },
    Primitive {
        name: "thing",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_thing,
    },
    Primitive {
        name: "pprop",
        aliases: &[],
        min_arity: 3,
        default_arity: 3,
        max_arity: 3,
        func: prim_pprop,
    },
    Primitive {
        name: "gprop",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_gprop,
    },
    Primitive {
        name: "remprop",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_remprop,
    },
    Primitive {
        name: "plist",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_plist,
    },
];

fn prim_make(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "make", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    it.assign_var(name, args[1]);
    Outcome::None
}

/// `name value "x` — `make` with its inputs reversed.
fn prim_name(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "name", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    it.assign_var(name, args[0]);
    Outcome::None
}

fn prim_local(it: &mut Interp, args: &[Value]) -> Outcome {
    let names = match names_of(it, "local", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    for name in names {
        if let Err(e) = it.frames.add_local(name) {
            return Outcome::Error(Box::new(e));
        }
    }
    Outcome::None
}

fn prim_thing(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "thing", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    match it.lookup_var(name) {
        Some(v) if !v.is_none() => Outcome::Value(v),
        _ => {
            let text = it.heap.atom_text(name).to_string();
            Outcome::Error(Box::new(
                ErrorInfo::new(ErrorCode::NoValue).with_arg(text),
            ))
        }
    }
}

fn prim_pprop(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "pprop", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let prop = match word_arg(it, "pprop", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    // Numbers coerce to atoms for storage.
    let Some(value) = args[2].to_element(&mut it.heap) else {
        return doesnt_like(it, "pprop", &args[2]);
    };
    // PropStore and Heap are separate fields; split the borrow.
    let Interp { heap, ws, .. } = it;
    match ws.props.put(heap, name, prop, value) {
        Some(()) => Outcome::None,
        None => Outcome::error(ErrorCode::OutOfSpace),
    }
}

fn prim_gprop(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "gprop", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let prop = match word_arg(it, "gprop", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    match it.ws.props.get(&it.heap, name, prop) {
        // Stored atoms that look numeric come back as numbers.
        Some(node) => Outcome::Value(Value::from_element(node, &it.heap)),
        None => Outcome::Value(Value::EMPTY_LIST),
    }
}

fn prim_remprop(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "remprop", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let prop = match word_arg(it, "remprop", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let Interp { heap, ws, .. } = it;
    ws.props.remove(heap, name, prop);
    Outcome::None
}

fn prim_plist(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "plist", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    // The stored list is returned as-is: numeric values stay words here,
    // unlike `gprop` which re-parses them.
    Outcome::Value(Value::List(it.ws.props.plist(name)))
}
