//! Console and stream primitives.

use tortuga_common::errors::ErrorCode;
use tortuga_heap::{Outcome, Value};
use tortuga_reader::{printer, reader};

use super::{Primitive, bool_value, doesnt_like, word_arg};
use crate::interp::Interp;
use crate::io::ReadOutcome;

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "print",
        aliases: &["pr"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 16,
        func: prim_print,
    },
    Primitive {
        name: "show",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 16,
        func: prim_print,
    },
    Primitive {
        name: "type",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 16,
        func: prim_type,
    },
    Primitive {
        name: "readchar",
        aliases: &["rc"],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_readchar,
    },
    Primitive {
        name: "readline",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_readline,
    },
    Primitive {
        name: "readword",
        aliases: &["rw"],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_readword,
    },
    Primitive {
        name: "keyp",
        aliases: &["key?"],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_keyp,
    },
    Primitive {
        name: "eofp",
        aliases: &["eof?"],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_eofp,
    },
    Primitive {
        name: "openread",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_openread,
    },
    Primitive {
        name: "openwrite",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_openwrite,
    },
    Primitive {
        name: "openappend",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_openappend,
    },
    Primitive {
        name: "close",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_close,
    },
    Primitive {
        name: "closeall",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_closeall,
    },
    Primitive {
        name: "setread",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_setread,
    },
    Primitive {
        name: "setwrite",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_setwrite,
    },
    Primitive {
        name: "reader",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_reader,
    },
    Primitive {
        name: "writer",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_writer,
    },
    Primitive {
        name: "dribble",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_dribble,
    },
    Primitive {
        name: "nodribble",
        aliases: &[],
        min_arity: 0,
        default_arity: 0,
        max_arity: 0,
        func: prim_nodribble,
    },
    Primitive {
        name: "erasefile",
        aliases: &["erf"],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_erasefile,
    },
];

fn prim_print(it: &mut Interp, args: &[Value]) -> Outcome {
    let mut line = String::new();
    for (i, v) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&printer::value_text(&it.heap, v));
    }
    line.push('\n');
    it.io.write(&line);
    Outcome::None
}

fn prim_type(it: &mut Interp, args: &[Value]) -> Outcome {
    let mut text = String::new();
    for v in args {
        text.push_str(&printer::value_text(&it.heap, v));
    }
    it.io.write(&text);
    Outcome::None
}

fn prim_readchar(it: &mut Interp, _args: &[Value]) -> Outcome {
    match it.io.read_char() {
        ReadOutcome::Char(c) => {
            let atom = it.heap.atom(&(c as char).to_string());
            Outcome::Value(Value::Word(atom))
        }
        // Word readers return the empty word at EOF.
        ReadOutcome::Eof => Outcome::Value(Value::Word(it.heap.atom(""))),
        ReadOutcome::Interrupted => Outcome::Interrupted,
    }
}

fn prim_readline(it: &mut Interp, _args: &[Value]) -> Outcome {
    match it.io.read_line() {
        // List readers return the empty list at EOF.
        None => Outcome::Value(Value::EMPTY_LIST),
        Some(Err(())) => Outcome::Interrupted,
        Some(Ok(line)) => match reader::read_line_list(&mut it.heap, &line) {
            Ok(list) => Outcome::Value(Value::List(list)),
            Err(e) => Outcome::Error(Box::new(e)),
        },
    }
}

fn prim_readword(it: &mut Interp, _args: &[Value]) -> Outcome {
    match it.io.read_line() {
        None => Outcome::Value(Value::Word(it.heap.atom(""))),
        Some(Err(())) => Outcome::Interrupted,
        Some(Ok(line)) => {
            let atom = it.heap.atom(&line);
            Outcome::Value(Value::Word(atom))
        }
    }
}

fn prim_keyp(it: &mut Interp, _args: &[Value]) -> Outcome {
    let ready = it.io.can_read();
    Outcome::Value(bool_value(it, ready))
}

fn prim_eofp(it: &mut Interp, _args: &[Value]) -> Outcome {
    let at_eof = !it.io.can_read();
    Outcome::Value(bool_value(it, at_eof))
}

fn open_file(it: &mut Interp, prim: &str, args: &[Value], mode: OpenMode) -> Outcome {
    let name = match word_arg(it, prim, &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let path = it.heap.atom_text(name).to_string();
    let result = match mode {
        OpenMode::Read => it.storage.open_read(&path),
        OpenMode::Write => it.storage.open_write(&path, false),
        OpenMode::Append => it.storage.open_write(&path, true),
    };
    let stream = match result {
        Ok(s) => s,
        Err(e) => return Outcome::Error(Box::new(e)),
    };
    match it.io.open(name, stream) {
        Ok(()) => Outcome::None,
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

enum OpenMode {
    Read,
    Write,
    Append,
}

fn prim_openread(it: &mut Interp, args: &[Value]) -> Outcome {
    open_file(it, "openread", args, OpenMode::Read)
}

fn prim_openwrite(it: &mut Interp, args: &[Value]) -> Outcome {
    open_file(it, "openwrite", args, OpenMode::Write)
}

fn prim_openappend(it: &mut Interp, args: &[Value]) -> Outcome {
    open_file(it, "openappend", args, OpenMode::Append)
}

fn prim_close(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "close", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    if !it.io.close(name) {
        let text = it.heap.atom_text(name).to_string();
        return Outcome::error_arg(ErrorCode::FileNotOpen, "close", text);
    }
    Outcome::None
}

fn prim_closeall(it: &mut Interp, _args: &[Value]) -> Outcome {
    it.io.close_all();
    Outcome::None
}

/// A stream selector argument: a pathname word, or `[]` for the console.
fn selector(it: &mut Interp, prim: &str, v: &Value) -> Result<Option<tortuga_heap::Node>, Outcome> {
    match v {
        Value::List(node) if node.is_nil() => Ok(None),
        Value::Word(_) | Value::Number(_) => Ok(Some(word_arg(it, prim, v)?)),
        other => Err(doesnt_like(it, prim, other)),
    }
}

fn prim_setread(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match selector(it, "setread", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    match it.io.set_reader(name) {
        Ok(()) => Outcome::None,
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_setwrite(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match selector(it, "setwrite", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    match it.io.set_writer(name) {
        Ok(()) => Outcome::None,
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_reader(it: &mut Interp, _args: &[Value]) -> Outcome {
    match it.io.reader_name() {
        Some(name) => Outcome::Value(Value::Word(name)),
        None => Outcome::Value(Value::EMPTY_LIST),
    }
}

fn prim_writer(it: &mut Interp, _args: &[Value]) -> Outcome {
    match it.io.writer_name() {
        Some(name) => Outcome::Value(Value::Word(name)),
        None => Outcome::Value(Value::EMPTY_LIST),
    }
}

fn prim_dribble(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "dribble", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let path = it.heap.atom_text(name).to_string();
    let stream = match it.storage.open_write(&path, false) {
        Ok(s) => s,
        Err(e) => return Outcome::Error(Box::new(e)),
    };
    if let Err(e) = it.io.open(name, stream) {
        return Outcome::Error(Box::new(e));
    }
    match it.io.set_dribble(Some(name)) {
        Ok(()) => Outcome::None,
        Err(e) => Outcome::Error(Box::new(e)),
    }
}

fn prim_nodribble(it: &mut Interp, _args: &[Value]) -> Outcome {
    // Closing the stream also clears the dribble selector.
    if let Some(name) = it.io.dribble_name() {
        it.io.close(name);
    }
    Outcome::None
}

fn prim_erasefile(it: &mut Interp, args: &[Value]) -> Outcome {
    let name = match word_arg(it, "erasefile", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let path = it.heap.atom_text(name).to_string();
    match it.storage.delete(&path) {
        Ok(()) => Outcome::None,
        Err(e) => Outcome::Error(Box::new(e)),
    }
}
