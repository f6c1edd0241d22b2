//! Arithmetic and predicate primitives.

use tortuga_common::errors::ErrorCode;
use tortuga_heap::{Outcome, Value};

use super::{Primitive, bool_value, doesnt_like, int_arg, num_arg};
use crate::interp::Interp;

pub(crate) static PRIMS: &[Primitive] = &[
    Primitive {
        name: "sum",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 12,
        func: prim_sum,
    },
    Primitive {
        name: "difference",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_difference,
    },
    Primitive {
        name: "product",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 12,
        func: prim_product,
    },
    Primitive {
        name: "quotient",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_quotient,
    },
    Primitive {
        name: "remainder",
        aliases: &[],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_remainder,
    },
    Primitive {
        name: "minus",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_minus,
    },
    Primitive {
        name: "random",
        aliases: &[],
        min_arity: 1,
        default_arity: 1,
        max_arity: 1,
        func: prim_random,
    },
    Primitive {
        name: "equalp",
        aliases: &["equal?"],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_equalp,
    },
    Primitive {
        name: "lessp",
        aliases: &["less?"],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_lessp,
    },
    Primitive {
        name: "greaterp",
        aliases: &["greater?"],
        min_arity: 2,
        default_arity: 2,
        max_arity: 2,
        func: prim_greaterp,
    },
];

fn fold(
    it: &mut Interp,
    name: &str,
    args: &[Value],
    start: f32,
    op: fn(f32, f32) -> f32,
) -> Outcome {
    let mut acc = start;
    for v in args {
        match num_arg(it, name, v) {
            Ok(n) => acc = op(acc, n),
            Err(out) => return out,
        }
    }
    if !acc.is_finite() {
        return Outcome::error_in(ErrorCode::NumberTooBig, name);
    }
    Outcome::Value(Value::Number(acc))
}

fn prim_sum(it: &mut Interp, args: &[Value]) -> Outcome {
    fold(it, "sum", args, 0.0, |a, b| a + b)
}

fn prim_product(it: &mut Interp, args: &[Value]) -> Outcome {
    fold(it, "product", args, 1.0, |a, b| a * b)
}

fn prim_difference(it: &mut Interp, args: &[Value]) -> Outcome {
    let a = match num_arg(it, "difference", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let b = match num_arg(it, "difference", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    Outcome::Value(Value::Number(a - b))
}

fn prim_quotient(it: &mut Interp, args: &[Value]) -> Outcome {
    let a = match num_arg(it, "quotient", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let b = match num_arg(it, "quotient", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    if b == 0.0 {
        return Outcome::error_in(ErrorCode::DivideByZero, "quotient");
    }
    Outcome::Value(Value::Number(a / b))
}

fn prim_remainder(it: &mut Interp, args: &[Value]) -> Outcome {
    let a = match num_arg(it, "remainder", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let b = match num_arg(it, "remainder", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    if b == 0.0 {
        return Outcome::error_in(ErrorCode::DivideByZero, "remainder");
    }
    Outcome::Value(Value::Number(a % b))
}

fn prim_minus(it: &mut Interp, args: &[Value]) -> Outcome {
    match num_arg(it, "minus", &args[0]) {
        Ok(n) => Outcome::Value(Value::Number(-n)),
        Err(out) => out,
    }
}

fn prim_random(it: &mut Interp, args: &[Value]) -> Outcome {
    let bound = match int_arg(it, "random", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    if bound <= 0 {
        return doesnt_like(it, "random", &args[0]);
    }
    let r = it.platform.random(bound as u32);
    Outcome::Value(Value::Number(r as f32))
}

fn prim_equalp(it: &mut Interp, args: &[Value]) -> Outcome {
    let eq = args[0].logo_eq(&args[1], &it.heap);
    Outcome::Value(bool_value(it, eq))
}

fn prim_lessp(it: &mut Interp, args: &[Value]) -> Outcome {
    let a = match num_arg(it, "lessp", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let b = match num_arg(it, "lessp", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    Outcome::Value(bool_value(it, a < b))
}

fn prim_greaterp(it: &mut Interp, args: &[Value]) -> Outcome {
    let a = match num_arg(it, "greaterp", &args[0]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    let b = match num_arg(it, "greaterp", &args[1]) {
        Ok(n) => n,
        Err(out) => return out,
    };
    Outcome::Value(bool_value(it, a > b))
}
