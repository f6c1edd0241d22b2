//! Structured control-flow outcomes.
//!
//! Every evaluation step returns an `Outcome`; there are no panics or host
//! exceptions on Logo-level paths. Non-value outcomes propagate outward until
//! something consumes them: the procedure engine (Stop/Output/Call/Goto),
//! `catch` (Throw, Error), or the REPL (everything else).

use tortuga_common::errors::{ErrorCode, ErrorInfo};

use crate::node::Node;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Command completed, no value.
    None,
    /// Expression produced a value.
    Value(Value),
    /// `stop`: terminate the current procedure body, no value.
    Stop,
    /// `output v`: terminate the current procedure body with a value.
    Output(Value),
    /// A raised Logo error, formatted lazily.
    Error(Box<ErrorInfo>),
    /// Non-local exit, caught by a matching `catch`.
    Throw { tag: Node, value: Option<Value> },
    /// CPS payload: suspend the current body, run this callee, resume.
    Call { proc: Node, args: Vec<Value> },
    /// Transfer to `label <name>` within the enclosing procedure body.
    Goto { label: Node },
    /// Reader exhausted at top level.
    Eof,
    /// Cooperative BRK flag observed.
    Interrupted,
}

impl Outcome {
    pub fn error(code: ErrorCode) -> Outcome {
        Outcome::Error(Box::new(ErrorInfo::new(code)))
    }

    pub fn error_in(code: ErrorCode, proc: &str) -> Outcome {
        Outcome::Error(Box::new(ErrorInfo::new(code).with_proc(proc)))
    }

    pub fn error_arg(code: ErrorCode, proc: &str, arg: impl Into<String>) -> Outcome {
        Outcome::Error(Box::new(
            ErrorInfo::new(code).with_proc(proc).with_arg(arg),
        ))
    }

    /// True for the two "line consumed, keep going" outcomes.
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::None | Outcome::Value(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// The payload value, when one exists.
    pub fn value(&self) -> Option<Value> {
        match self {
            Outcome::Value(v) | Outcome::Output(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let e = Outcome::error_in(ErrorCode::DontKnowHow, "frobnicate");
        match e {
            Outcome::Error(info) => {
                assert_eq!(info.code, ErrorCode::DontKnowHow);
                assert_eq!(info.render(), "I don't know how to frobnicate");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_value_extraction() {
        assert_eq!(
            Outcome::Value(Value::Number(1.0)).value(),
            Some(Value::Number(1.0))
        );
        assert_eq!(
            Outcome::Output(Value::Number(2.0)).value(),
            Some(Value::Number(2.0))
        );
        assert_eq!(Outcome::Stop.value(), None);
        assert!(Outcome::None.is_done());
        assert!(!Outcome::Stop.is_done());
    }
}
