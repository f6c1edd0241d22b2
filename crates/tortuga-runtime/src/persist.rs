//! Saved-workspace text: `save` writes it, `load` replays it, and the
//! `po` family prints slices of it.
//!
//! Format: one `to … end` block per unburied procedure, then one
//! `make "name value` per unburied global, then one `pprop` per property.
//! Loading is just re-reading: the text goes through the ordinary reader and
//! evaluator, line by line, aborting at the first error.

use tortuga_heap::{Node, Outcome, Value};
use tortuga_reader::{ReadSession, printer};

use crate::eval::RunKind;
use crate::interp::Interp;

/// A value as it appears in saved source: numbers plain, words quoted,
/// lists bracketed.
pub fn value_literal(it: &Interp, value: &Value) -> String {
    match value {
        Value::Word(atom) => format!("\"{}", it.heap.atom_text(*atom)),
        other => printer::value_text(&it.heap, other),
    }
}

pub fn procedure_titles(it: &Interp) -> String {
    let mut out = String::new();
    for p in it.ws.procs.iter().filter(|p| !p.buried) {
        out.push_str("to ");
        out.push_str(it.heap.atom_text(p.name));
        for &param in &p.params {
            out.push_str(" :");
            out.push_str(it.heap.atom_text(param));
        }
        out.push('\n');
    }
    out
}

pub fn procedures_text(it: &Interp) -> String {
    let mut out = String::new();
    for p in it.ws.procs.iter().filter(|p| !p.buried) {
        out.push_str(&printer::definition_text(&it.heap, p.name, &p.params, p.body));
        out.push('\n');
    }
    out
}

pub fn names_text(it: &Interp) -> String {
    let mut out = String::new();
    for g in it.ws.globals.iter().filter(|g| !g.buried) {
        out.push_str("make \"");
        out.push_str(it.heap.atom_text(g.name));
        out.push(' ');
        out.push_str(&value_literal(it, &g.value));
        out.push('\n');
    }
    out
}

pub fn plists_text(it: &Interp) -> String {
    let mut out = String::new();
    let entities: Vec<Node> = it.ws.props.entities().collect();
    for entity in entities {
        let mut pair = it.ws.props.plist(entity);
        while !pair.is_nil() {
            let prop = it.heap.car(pair);
            let value_cell = it.heap.cdr(pair);
            let value = it.heap.car(value_cell);
            out.push_str("pprop \"");
            out.push_str(it.heap.atom_text(entity));
            out.push_str(" \"");
            out.push_str(it.heap.atom_text(prop));
            out.push(' ');
            let value = Value::from_element(value, &it.heap);
            out.push_str(&value_literal(it, &value));
            out.push('\n');
            pair = it.heap.cdr(value_cell);
        }
    }
    out
}

pub fn workspace_text(it: &Interp) -> String {
    let mut out = procedures_text(it);
    out.push_str(&names_text(it));
    out.push_str(&plists_text(it));
    out
}

/// `save "path`: write the whole unburied workspace as source text.
pub fn save(it: &mut Interp, path: &str) -> Outcome {
    let text = workspace_text(it);
    let mut stream = match it.storage.open_write(path, false) {
        Ok(s) => s,
        Err(e) => return Outcome::Error(Box::new(e)),
    };
    stream.write(&text);
    stream.flush();
    Outcome::None
}

/// `load "path`: re-execute saved text. The first error aborts the rest of
/// the file. A `startup` list set by the file is run afterwards.
pub fn load(it: &mut Interp, path: &str) -> Outcome {
    let mut stream = match it.storage.open_read(path) {
        Ok(s) => s,
        Err(e) => return Outcome::Error(Box::new(e)),
    };
    let startup_before = it.ws.globals.get(it.atoms.startup);

    let mut session = ReadSession::new();
    loop {
        let line = match stream.read_line() {
            None => break,
            Some(Err(())) => return Outcome::Interrupted,
            Some(Ok(line)) => line,
        };
        match it.feed_line(&mut session, &line) {
            Ok(None) => {}
            Ok(Some(out)) => match out {
                Outcome::None | Outcome::Value(_) => {}
                other => return other,
            },
            Err(e) => return Outcome::Error(Box::new(e)),
        }
    }

    let startup_after = it.ws.globals.get(it.atoms.startup);
    if let Some(Value::List(list)) = startup_after {
        if startup_before != startup_after {
            return it.exec_protected(list, RunKind::Command);
        }
    }
    Outcome::None
}
