//! Structural printing: values for `print`/`show`, body lines for `po`,
//! `trace` and `save`.
//!
//! Atoms print their stored text (first-seen casing, quote and colon
//! prefixes intact), sublists print bracketed, and newline markers either
//! disappear (value printing) or become real line breaks (definition
//! listing).

use tortuga_common::numbers::format_number;
use tortuga_heap::{Heap, Node, Value};

/// Printable form of a value. Lists are bracketed at every level.
pub fn value_text(heap: &Heap, value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::Number(n) => format_number(*n),
        Value::Word(atom) => heap.atom_text(*atom).to_string(),
        Value::List(node) => {
            let mut out = String::new();
            write_bracketed(heap, *node, &mut out, false);
            out
        }
    }
}

/// A word's worth of text for error contexts: same as [`value_text`].
pub fn error_arg_text(heap: &Heap, value: &Value) -> String {
    value_text(heap, value)
}

/// One body line as source text. Newline markers become line breaks,
/// sublists print bracketed, everything else joins with single spaces.
pub fn line_text(heap: &Heap, line: Node) -> String {
    let mut out = String::new();
    write_elements(heap, line, &mut out, true);
    out
}

/// The `to … end` listing for a procedure definition.
pub fn definition_text(
    heap: &Heap,
    name: Node,
    params: &[Node],
    body: Node,
) -> String {
    let mut out = String::new();
    out.push_str("to ");
    out.push_str(heap.atom_text(name));
    for &p in params {
        out.push_str(" :");
        out.push_str(heap.atom_text(p));
    }
    out.push('\n');
    let mut line = body;
    while !line.is_nil() {
        let elem = heap.car(line);
        line = heap.cdr(line);
        if elem.is_newline_marker() {
            out.push('\n');
            continue;
        }
        let text = line_text(heap, elem.as_plain_cons());
        if text.is_empty() {
            out.push('\n');
        } else {
            out.push_str("  ");
            out.push_str(&text);
            out.push('\n');
        }
    }
    out.push_str("end\n");
    out
}

fn write_bracketed(heap: &Heap, node: Node, out: &mut String, keep_markers: bool) {
    out.push('[');
    write_elements(heap, node, out, keep_markers);
    out.push(']');
}

fn write_elements(heap: &Heap, mut node: Node, out: &mut String, keep_markers: bool) {
    let mut first = true;
    while !node.is_nil() {
        let elem = heap.car(node);
        if elem.is_newline_marker() {
            if keep_markers {
                out.push('\n');
                first = true;
            }
            node = heap.cdr(node);
            continue;
        }
        if !first {
            out.push(' ');
        }
        first = false;
        if elem.is_atom() {
            out.push_str(heap.atom_text(elem));
        } else {
            write_bracketed(heap, elem.as_plain_cons(), out, keep_markers);
        }
        node = heap.cdr(node);
    }
}
