//! Error reporting.
//!
//! Errors propagate through `Result<T, LispError>` and `?` rather than an
//! out-parameter. `ErrorKind` is the closed set of reader/eval/apply failure
//! kinds; `LispError` attaches a message and, for reader failures, a byte
//! offset.

use std::fmt;

/// The closed error enum. `None` is never actually constructed by this
/// crate (a `Result::Ok` means "no error"); it is kept in the set so a
/// default/sentinel value is always available without an `Option` wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    None,
    FileOpen,
    ReadSyntax,
    FormSyntax,
    UndefinedVar,
    BadOp,
    OutOfBounds,
    ArgType,
    TooManyArgs,
    TooFewArgs,
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::None => "no-error",
            ErrorKind::FileOpen => "file-open",
            ErrorKind::ReadSyntax => "read-syntax",
            ErrorKind::FormSyntax => "form-syntax",
            ErrorKind::UndefinedVar => "undefined-variable",
            ErrorKind::BadOp => "bad-operator",
            ErrorKind::OutOfBounds => "out-of-bounds",
            ErrorKind::ArgType => "argument-type",
            ErrorKind::TooManyArgs => "too-many-arguments",
            ErrorKind::TooFewArgs => "too-few-arguments",
            ErrorKind::Runtime => "runtime-error",
        };
        f.write_str(s)
    }
}

/// A surfaced interpreter error: a kind plus context for the host.
#[derive(Debug, Clone)]
pub struct LispError {
    pub kind: ErrorKind,
    pub message: String,
    /// Byte offset into the source stream, populated by the reader.
    pub offset: Option<usize>,
}

impl LispError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        LispError { kind, message: message.into(), offset: None }
    }

    pub fn at(kind: ErrorKind, message: impl Into<String>, offset: usize) -> Self {
        LispError { kind, message: message.into(), offset: Some(offset) }
    }

    pub fn read_syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::at(ErrorKind::ReadSyntax, message, offset)
    }

    pub fn form_syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FormSyntax, message)
    }

    pub fn undefined_var(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVar, format!("undefined variable: {name}"))
    }

    pub fn bad_op(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadOp, message)
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfBounds, message)
    }

    pub fn arg_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArgType, message)
    }

    pub fn too_many_args(proc_name: &str) -> Self {
        Self::new(ErrorKind::TooManyArgs, format!("too many arguments to {proc_name}"))
    }

    pub fn too_few_args(proc_name: &str) -> Self {
        Self::new(ErrorKind::TooFewArgs, format!("too few arguments to {proc_name}"))
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }
}

impl fmt::Display for LispError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(off) => write!(f, "{}: {} (at byte {})", self.kind, self.message, off),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LispError {}

pub type LispResult<T> = Result<T, LispError>;
