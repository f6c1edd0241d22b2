//! Logo error codes and the host-level error type.
//!
//! Logo-visible errors are numeric codes rendered lazily through a fixed
//! template table. The codes are stable identifiers: tests key on them and
//! saved transcripts mention them, so they must not be renumbered.

use std::fmt;

/// Numeric Logo error codes with stable values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Fatal = 0,
    OutOfSpace = 1,
    StackOverflow = 2,
    NumberTooBig = 3,
    DontKnowHow = 4,
    NoValue = 5,
    NotEnoughInputs = 6,
    TooManyInputs = 7,
    DoesntLikeInput = 8,
    DontKnowWhatToDoWith = 9,
    NotBool = 10,
    DidntOutput = 11,
    DivideByZero = 12,
    Stopped = 13,
    AtToplevel = 14,
    NoCatch = 15,
    CantFindLabel = 16,
    NotInsideRepeat = 17,
    AlreadyDefined = 18,
    IsPrimitive = 19,
    ToInsideProcedure = 20,
    TooManyProcedures = 21,
    NoFileBuffers = 22,
    FileNotOpen = 23,
    FileAlreadyOpen = 24,
    FileNotFound = 25,
    FileExists = 26,
    DiskTrouble = 27,
    BadPosition = 28,
    UnsupportedOnDevice = 29,
    DeviceUnavailable = 30,
    DeviceInUse = 31,
}

impl ErrorCode {
    /// The message template for this code. At most one `%s` slot.
    pub fn template(self) -> &'static str {
        match self {
            ErrorCode::Fatal => "Fatal error",
            ErrorCode::OutOfSpace => "Out of space",
            ErrorCode::StackOverflow => "Stack overflow",
            ErrorCode::NumberTooBig => "Number too big",
            ErrorCode::DontKnowHow => "I don't know how to %s",
            ErrorCode::NoValue => "%s has no value",
            ErrorCode::NotEnoughInputs => "Not enough inputs to %s",
            ErrorCode::TooManyInputs => "Too many inputs to %s",
            ErrorCode::DoesntLikeInput => "doesn't like %s as input",
            ErrorCode::DontKnowWhatToDoWith => "You don't say what to do with %s",
            ErrorCode::NotBool => "%s is not true or false",
            ErrorCode::DidntOutput => "%s didn't output",
            ErrorCode::DivideByZero => "Can't divide by zero",
            ErrorCode::Stopped => "Stopped",
            ErrorCode::AtToplevel => "Can only use %s inside a procedure",
            ErrorCode::NoCatch => "Can't find catch tag for %s",
            ErrorCode::CantFindLabel => "Can't find label %s",
            ErrorCode::NotInsideRepeat => "Can only use %s inside repeat",
            ErrorCode::AlreadyDefined => "%s is already defined",
            ErrorCode::IsPrimitive => "%s is a primitive",
            ErrorCode::ToInsideProcedure => "Can't use to inside a procedure",
            ErrorCode::TooManyProcedures => "Too many procedures",
            ErrorCode::NoFileBuffers => "Too many files open",
            ErrorCode::FileNotOpen => "File %s is not open",
            ErrorCode::FileAlreadyOpen => "File %s is already open",
            ErrorCode::FileNotFound => "File %s not found",
            ErrorCode::FileExists => "File %s already exists",
            ErrorCode::DiskTrouble => "Trouble accessing %s",
            ErrorCode::BadPosition => "Position out of range",
            ErrorCode::UnsupportedOnDevice => "%s is not supported on this device",
            ErrorCode::DeviceUnavailable => "Device %s is unavailable",
            ErrorCode::DeviceInUse => "Device %s is in use",
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Context for a raised Logo error. Formatting is deferred until the error
/// actually surfaces; most errors are caught or printed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    /// The primitive or user procedure that raised the error.
    pub proc: Option<String>,
    /// Printable form of the offending value.
    pub arg: Option<String>,
    /// First enclosing user procedure, filled on propagation.
    pub caller: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            proc: None,
            arg: None,
            caller: None,
        }
    }

    pub fn with_proc(mut self, name: impl Into<String>) -> Self {
        self.proc = Some(name.into());
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    /// Record the enclosing procedure. Only the first ancestor sticks;
    /// further propagation leaves it untouched.
    pub fn fill_caller(&mut self, name: &str) {
        if self.caller.is_none() {
            self.caller = Some(name.to_string());
        }
    }

    /// Render via the template table. The `%s` slot is filled from `arg` when
    /// present, else from `proc`. When both exist the message is prefixed
    /// with the procedure name; the caller is appended once known.
    pub fn render(&self) -> String {
        let template = self.code.template();
        let slot = self.arg.as_deref().or(self.proc.as_deref());
        let mut msg = match slot {
            Some(s) if template.contains("%s") => template.replacen("%s", s, 1),
            _ => template.to_string(),
        };
        if self.arg.is_some() {
            if let Some(p) = &self.proc {
                msg = format!("{p}: {msg}");
            }
        }
        if let Some(c) = &self.caller {
            msg.push_str(&format!("  in {c}"));
        }
        msg
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Unified error type for host-facing failures (CLI, storage glue).
/// Logo-level errors stay inside the interpreter as [`ErrorInfo`].
#[derive(Debug, thiserror::Error)]
pub enum TortugaError {
    #[error("Logo error {code}: {message}")]
    Logo { code: u8, message: String },

    #[error("Reader error: {0}")]
    Reader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ErrorInfo> for TortugaError {
    fn from(info: ErrorInfo) -> Self {
        TortugaError::Logo {
            code: info.code.code(),
            message: info.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorCode::OutOfSpace.code(), 1);
        assert_eq!(ErrorCode::DontKnowHow.code(), 4);
        assert_eq!(ErrorCode::DivideByZero.code(), 12);
        assert_eq!(ErrorCode::NoCatch.code(), 15);
        assert_eq!(ErrorCode::DeviceInUse.code(), 31);
    }

    #[test]
    fn test_render_slot_from_proc() {
        let e = ErrorInfo::new(ErrorCode::DontKnowHow).with_proc("foo");
        assert_eq!(e.render(), "I don't know how to foo");
    }

    #[test]
    fn test_render_slot_from_arg_with_proc_prefix() {
        let e = ErrorInfo::new(ErrorCode::DoesntLikeInput)
            .with_proc("sum")
            .with_arg("[]");
        assert_eq!(e.render(), "sum: doesn't like [] as input");
    }

    #[test]
    fn test_render_caller_suffix() {
        let mut e = ErrorInfo::new(ErrorCode::NoValue).with_arg("x");
        e.fill_caller("f");
        e.fill_caller("g");
        assert_eq!(e.render(), "x has no value  in f");
    }

    #[test]
    fn test_render_no_slot() {
        let e = ErrorInfo::new(ErrorCode::DivideByZero).with_proc("/");
        // Template has no %s for the arg-less form to consume oddly.
        assert_eq!(
            ErrorInfo::new(ErrorCode::Stopped).render(),
            "Stopped"
        );
        assert_eq!(e.render(), "Can't divide by zero");
    }
}
