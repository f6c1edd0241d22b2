//! The primitive registry: interned-name dispatch to `{min, default, max}`
//! arity metadata and a function pointer. Aliases share pointers.

use std::collections::HashMap;

use tortuga_common::errors::ErrorCode;
use tortuga_heap::{Node, Outcome, Value};
use tortuga_reader::printer;

use crate::interp::Interp;

pub mod arith;
pub mod control;
pub mod data;
pub mod ioprims;
pub mod system;
pub mod vars;
pub mod wsops;

pub type PrimFn = fn(&mut Interp, &[Value]) -> Outcome;

pub struct Primitive {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub min_arity: u8,
    /// Inputs gathered outside parentheses.
    pub default_arity: u8,
    /// Inputs accepted inside parentheses.
    pub max_arity: u8,
    pub func: PrimFn,
}

pub struct Registry {
    prims: Vec<&'static Primitive>,
    by_name: HashMap<&'static str, u16>,
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self {
            prims: Vec::new(),
            by_name: HashMap::new(),
        };
        for table in [
            arith::PRIMS,
            data::PRIMS,
            control::PRIMS,
            vars::PRIMS,
            wsops::PRIMS,
            ioprims::PRIMS,
            system::PRIMS,
        ] {
            for prim in table {
                let id = registry.prims.len() as u16;
                registry.prims.push(prim);
                registry.by_name.insert(prim.name, id);
                for alias in prim.aliases {
                    registry.by_name.insert(alias, id);
                }
            }
        }
        registry
    }

    /// Case-insensitive lookup by name or alias.
    pub fn find(&self, name: &str) -> Option<u16> {
        if let Some(&id) = self.by_name.get(name) {
            return Some(id);
        }
        let lower = name.to_ascii_lowercase();
        self.by_name.get(lower.as_str()).copied()
    }

    pub fn get(&self, id: u16) -> &'static Primitive {
        self.prims[id as usize]
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// =====================================================================
// Shared argument plumbing
// =====================================================================

pub(crate) fn doesnt_like(it: &Interp, prim: &str, v: &Value) -> Outcome {
    Outcome::error_arg(
        ErrorCode::DoesntLikeInput,
        prim,
        printer::error_arg_text(&it.heap, v),
    )
}

pub(crate) fn num_arg(it: &Interp, prim: &str, v: &Value) -> Result<f32, Outcome> {
    v.as_number(&it.heap).ok_or_else(|| doesnt_like(it, prim, v))
}

pub(crate) fn int_arg(it: &Interp, prim: &str, v: &Value) -> Result<i64, Outcome> {
    Ok(num_arg(it, prim, v)? as i64)
}

pub(crate) fn bool_arg(it: &Interp, prim: &str, v: &Value) -> Result<bool, Outcome> {
    v.as_bool(&it.heap).ok_or_else(|| {
        Outcome::error_arg(
            ErrorCode::NotBool,
            prim,
            printer::error_arg_text(&it.heap, v),
        )
    })
}

/// The word atom for an input, interning numbers by printed form.
pub(crate) fn word_arg(it: &mut Interp, prim: &str, v: &Value) -> Result<Node, Outcome> {
    it.value_word(v).ok_or_else(|| doesnt_like(it, prim, v))
}

pub(crate) fn list_arg(it: &Interp, prim: &str, v: &Value) -> Result<Node, Outcome> {
    v.as_list().ok_or_else(|| doesnt_like(it, prim, v))
}

pub(crate) fn bool_value(it: &Interp, b: bool) -> Value {
    Value::Word(if b {
        it.atoms.true_word
    } else {
        it.atoms.false_word
    })
}

/// A word input, or a list of words, as name atoms (`erase`, `bury`, `po`).
pub(crate) fn names_of(it: &mut Interp, prim: &str, v: &Value) -> Result<Vec<Node>, Outcome> {
    match v {
        Value::Word(_) | Value::Number(_) => Ok(vec![word_arg(it, prim, v)?]),
        Value::List(head) => {
            let mut names = Vec::new();
            let mut node = *head;
            while !node.is_nil() {
                let elem = it.heap.car(node);
                if !elem.is_atom() || elem.is_newline_marker() {
                    if elem.is_newline_marker() {
                        node = it.heap.cdr(node);
                        continue;
                    }
                    return Err(doesnt_like(it, prim, v));
                }
                names.push(elem);
                node = it.heap.cdr(node);
            }
            Ok(names)
        }
        Value::None => Err(doesnt_like(it, prim, v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_finds_names_and_aliases() {
        let registry = Registry::new();
        let print = registry.find("print").expect("print registered");
        let pr = registry.find("pr").expect("pr registered");
        assert_eq!(print, pr);
        assert_eq!(registry.get(print).name, "print");
        // Case-insensitive.
        assert_eq!(registry.find("PRINT"), Some(print));
        assert_eq!(registry.find("frobnicate"), None);
    }

    #[test]
    fn test_alias_pairs_share_functions() {
        let registry = Registry::new();
        for (a, b) in [
            ("output", "op"),
            ("butfirst", "bf"),
            ("sentence", "se"),
            ("continue", "co"),
            ("iftrue", "ift"),
        ] {
            let ia = registry.find(a).unwrap_or_else(|| panic!("{a} registered"));
            let ib = registry.find(b).unwrap_or_else(|| panic!("{b} registered"));
            assert_eq!(ia, ib, "{a}/{b} share a registry slot");
        }
    }
}
