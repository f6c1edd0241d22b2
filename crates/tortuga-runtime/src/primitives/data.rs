//! Word and list primitives.

use tortuga_heap::{Node, Outcome, Value};

use super::{Primitive, bool_value, doesnt_like, int_arg, list_arg};
use crate::interp::Interp;

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "first",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_first,
    },
    Primitive {
        name: "butfirst",
        aliases: &["bf"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_butfirst,
    },
    Primitive {
        name: "last",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_last,
    },
    Primitive {
        name: "butlast",
        aliases: &["bl"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_butlast,
    },
    Primitive {
        name: "item",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_item,
    },
    Primitive {
        name: "count",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_count,
    },
    Primitive {
        name: "fput",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_fput,
    },
    Primitive {
        name: "lput",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_lput,
    },
    Primitive {
        name: "list",
        aliases: &[],
        min_arity: 1,
        default_arity: 2,
        max_arity: 16,
        func: prim_list,
    },
    Primitive {
        name: "word",
        aliases: &[],
        min_arity: 1,
        default_arity: 2,
        max_arity: 16,
        func: prim_word,
    },
    Primitive {
        name: "sentence",
        aliases: &["se"],
        min_arity: 1,
        default_arity: 2,
        max_arity: 16,
        func: prim_sentence,
    },
    Primitive {
        name: "emptyp",
        aliases: &["empty?"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_emptyp,
    },
    Primitive {
        name: "listp",
        aliases: &["list?"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_listp,
    },
    Primitive {
        name: "wordp",
        aliases: &["word?"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_wordp,
    },
    Primitive {
        name: "numberp",
        aliases: &["number?"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_numberp,
    },
    Primitive {
        name: "memberp",
        aliases: &["member?"],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_memberp,
    },
];

/// The characters of a word input, for first/butfirst/last/butlast on words.
fn word_text(it: &Interp, v: &Value) -> Option<String> {
    match v {
        Value::Word(atom) => Some(it.heap.atom_text(*atom).to_string()),
        Value::Number(n) => Some(tortuga_common::numbers::format_number(*n)),
        _ => None,
    }
}

fn prim_first(it: &mut Interp, args: &[Value]) -> Outcome {
    match &args[0] {
        Value::List(head) => {
            if head.is_nil() {
                return doesnt_like(it, "first", &args[0]);
            }
            let elem = it.heap.car(*head);
            Outcome::Value(Value::from_element(elem, &it.heap))
        }
        v => {
            let Some(text) = word_text(it, v) else {
                return doesnt_like(it, "first", v);
            };
            let Some(c) = text.chars().next() else {
                return doesnt_like(it, "first", v);
            };
            let atom = it.heap.atom(&c.to_string());
            Outcome::Value(Value::Word(atom))
        }
    }
}

fn prim_butfirst(it: &mut Interp, args: &[Value]) -> Outcome {
    match &args[0] {
        Value::List(head) => {
            if head.is_nil() {
                return doesnt_like(it, "butfirst", &args[0]);
            }
            Outcome::Value(Value::List(it.heap.cdr(*head)))
        }
        v => {
            let Some(text) = word_text(it, v) else {
                return doesnt_like(it, "butfirst", v);
            };
            if text.is_empty() {
                return doesnt_like(it, "butfirst", v);
            }
            let rest: String = text.chars().skip(1).collect();
            let atom = it.heap.atom(&rest);
            Outcome::Value(Value::Word(atom))
        }
    }
}

fn prim_last(it: &mut Interp, args: &[Value]) -> Outcome {
    match &args[0] {
        Value::List(head) => {
            if head.is_nil() {
                return doesnt_like(it, "last", &args[0]);
            }
            let mut node = *head;
            loop {
                let next = it.heap.cdr(node);
                if next.is_nil() {
                    let elem = it.heap.car(node);
                    return Outcome::Value(Value::from_element(elem, &it.heap));
                }
                node = next;
            }
        }
        v => {
            let Some(text) = word_text(it, v) else {
                return doesnt_like(it, "last", v);
            };
            let Some(c) = text.chars().last() else {
                return doesnt_like(it, "last", v);
            };
            let atom = it.heap.atom(&c.to_string());
            Outcome::Value(Value::Word(atom))
        }
    }
}

fn prim_butlast(it: &mut Interp, args: &[Value]) -> Outcome {
    match &args[0] {
        Value::List(head) => {
            if head.is_nil() {
                return doesnt_like(it, "butlast", &args[0]);
            }
            // Copy every element cell except the last.
            let mut elems = Vec::new();
            let mut node = *head;
            while !it.heap.cdr(node).is_nil() {
                elems.push(it.heap.car(node));
                node = it.heap.cdr(node);
            }
            let mut out = Node::NIL;
            for &e in elems.iter().rev() {
                out = match it.alloc_cons(e, out) {
                    Ok(n) => n,
                    Err(e) => return Outcome::Error(Box::new(e)),
                };
            }
            Outcome::Value(Value::List(out))
        }
        v => {
            let Some(text) = word_text(it, v) else {
                return doesnt_like(it, "butlast", v);
            };
            if text.is_empty() {
                return doesnt_like(it, "butlast", v);
            }
            let mut chars: Vec<char> = text.chars().collect();
            chars.pop();
            let rest: String = chars.into_iter().collect();
            let atom = it.heap.atom(&rest);
            Outcome::Value(Value::Word(atom))
        }
    }
}

fn prim_item(it: &mut Interp, args: &[Value]) -> Outcome {
    let index = match int_arg(it, "item", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    if index < 1 {
        return doesnt_like(it, "item", &args[0]);
    }
    match &args[1] {
        Value::List(head) => {
            let mut node = *head;
            let mut remaining = index - 1;
            while remaining > 0 && !node.is_nil() {
                node = it.heap.cdr(node);
                remaining -= 1;
            }
            if node.is_nil() {
                return doesnt_like(it, "item", &args[0]);
            }
            let elem = it.heap.car(node);
            Outcome::Value(Value::from_element(elem, &it.heap))
        }
        v => {
            let Some(text) = word_text(it, v) else {
                return doesnt_like(it, "item", v);
            };
            match text.chars().nth(index as usize - 1) {
                Some(c) => {
                    let atom = it.heap.atom(&c.to_string());
                    Outcome::Value(Value::Word(atom))
                }
                None => doesnt_like(it, "item", &args[0]),
            }
        }
    }
}

fn prim_count(it: &mut Interp, args: &[Value]) -> Outcome {
    match &args[0] {
        Value::List(head) => {
            // Markers are invisible to list operations.
            let mut node = *head;
            let mut n = 0usize;
            while !node.is_nil() {
                if !it.heap.car(node).is_newline_marker() {
                    n += 1;
                }
                node = it.heap.cdr(node);
            }
            Outcome::Value(Value::Number(n as f32))
        }
        v => {
            let Some(text) = word_text(it, v) else {
                return doesnt_like(it, "count", v);
            };
            Outcome::Value(Value::Number(text.chars().count() as f32))
        }
    }
}

fn prim_fput(it: &mut Interp, args: &[Value]) -> Outcome {
    let tail = match list_arg(it, "fput", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let Some(elem) = args[0].to_element(&mut it.heap) else {
        return doesnt_like(it, "fput", &args[0]);
    };
    match it.alloc_cons(elem, tail) {
        Ok(node) => Outcome::Value(Value::List(node)),
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_lput(it: &mut Interp, args: &[Value]) -> Outcome {
    let head = match list_arg(it, "lput", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let Some(elem) = args[0].to_element(&mut it.heap) else {
        return doesnt_like(it, "lput", &args[0]);
    };
    let mut elems = Vec::new();
    let mut node = head;
    while !node.is_nil() {
        elems.push(it.heap.car(node));
        node = it.heap.cdr(node);
    }
    elems.push(elem);
    let mut out = Node::NIL;
    for &e in elems.iter().rev() {
        out = match it.alloc_cons(e, out) {
            Ok(n) => n,
            Err(e) => return Outcome::Error(Box::new(e)),
        };
    }
    Outcome::Value(Value::List(out))
}

fn prim_list(it: &mut Interp, args: &[Value]) -> Outcome {
    match it.make_list(args) {
        Ok(node) => Outcome::Value(Value::List(node)),
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_word(it: &mut Interp, args: &[Value]) -> Outcome {
    let mut text = String::new();
    for v in args {
        let Some(part) = word_text(it, v) else {
            return doesnt_like(it, "word", v);
        };
        text.push_str(&part);
    }
    let atom = it.heap.atom(&text);
    Outcome::Value(Value::Word(atom))
}

fn prim_sentence(it: &mut Interp, args: &[Value]) -> Outcome {
    // Flatten list inputs one level, keep words as elements.
    let mut elems = Vec::new();
    for v in args {
        match v {
            Value::List(head) => {
                let mut node = *head;
                while !node.is_nil() {
                    let e = it.heap.car(node);
                    if !e.is_newline_marker() {
                        elems.push(e);
                    }
                    node = it.heap.cdr(node);
                }
            }
            other => {
                let Some(elem) = other.to_element(&mut it.heap) else {
                    return doesnt_like(it, "sentence", other);
                };
                elems.push(elem);
            }
        }
    }
    let mut out = Node::NIL;
    for &e in elems.iter().rev() {
        out = match it.alloc_cons(e, out) {
            Ok(n) => n,
            Err(e) => return Outcome::Error(Box::new(e)),
        };
    }
    Outcome::Value(Value::List(out))
}

fn prim_emptyp(it: &mut Interp, args: &[Value]) -> Outcome {
    let empty = match &args[0] {
        Value::List(head) => head.is_nil(),
        Value::Word(atom) => it.heap.atom_text(*atom).is_empty(),
        _ => false,
    };
    Outcome::Value(bool_value(it, empty))
}

fn prim_listp(it: &mut Interp, args: &[Value]) -> Outcome {
    Outcome::Value(bool_value(it, args[0].is_list()))
}

fn prim_wordp(it: &mut Interp, args: &[Value]) -> Outcome {
    Outcome::Value(bool_value(it, args[0].is_word()))
}

fn prim_numberp(it: &mut Interp, args: &[Value]) -> Outcome {
    let is_num = args[0].as_number(&it.heap).is_some();
    Outcome::Value(bool_value(it, is_num))
}

fn prim_memberp(it: &mut Interp, args: &[Value]) -> Outcome {
    match &args[1] {
        Value::List(head) => {
            let mut node = *head;
            while !node.is_nil() {
                let elem = Value::from_element(it.heap.car(node), &it.heap);
                if args[0].logo_eq(&elem, &it.heap) {
                    return Outcome::Value(bool_value(it, true));
                }
                node = it.heap.cdr(node);
            }
            Outcome::Value(bool_value(it, false))
        }
        v => {
            let Some(hay) = word_text(it, v) else {
                return doesnt_like(it, "memberp", v);
            };
            let Some(needle) = word_text(it, &args[0]) else {
                return doesnt_like(it, "memberp", &args[0]);
            };
            let found = hay.to_ascii_lowercase().contains(&needle.to_ascii_lowercase());
            Outcome::Value(bool_value(it, found))
        }
    }
}
