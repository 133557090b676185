//! # Error Taxonomy
//!
//! Every fault the machine raises is fatal: there is no recovery path inside
//! `execute`, only a diagnostic and a non-zero process exit. `VmError` groups
//! the fault categories the reference interpreter's `printf(...); exit(1);`
//! call sites fall into, carrying enough context to name the offending
//! instruction or value without the caller reconstructing it from a string.

use std::fmt;

use crate::value::Obj;

/// Fatal faults raised while decoding or executing a bytecode image.
#[derive(Debug, PartialEq)]
pub enum VmError {
    /// An instruction found a value of the wrong variant (ADD on non-Int,
    /// SWAP_CALL on a non-callable, PUSH_DATA_ITEM on a non-Data, ...).
    TypeMismatch { op: &'static str, expected: &'static str, found: &'static str },
    /// A slot/field/constructor index fell outside its valid range.
    BoundsViolation { op: &'static str, detail: String },
    /// PUSH_VAR/STORE_VAR targeted an activation with no ENTER-allocated
    /// state, or ENTER ran twice on the same activation.
    StateAbsent { op: &'static str, detail: String },
    /// pop/peek/popN/collapse against an empty or too-small operand stack.
    StackUnderflow { op: &'static str },
    /// The image referenced an opcode or builtin name the machine doesn't
    /// recognise, or a reader ran past the end of the image.
    ImageError(String),
    /// Division by zero.
    DivisionByZero,
    /// `$$builtin-fatal-error` was invoked by the running program.
    Raised(String),
}

impl VmError {
    pub(crate) fn type_mismatch(op: &'static str, expected: &'static str, found: &Obj) -> Self {
        VmError::TypeMismatch { op, expected, found: found.type_name() }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::TypeMismatch { op, expected, found } => {
                write!(f, "{op}: expected {expected}, found {found}")
            }
            VmError::BoundsViolation { op, detail } => write!(f, "{op}: {detail}"),
            VmError::StateAbsent { op, detail } => write!(f, "{op}: {detail}"),
            VmError::StackUnderflow { op } => write!(f, "{op}: stack underflow"),
            VmError::ImageError(msg) => write!(f, "image error: {msg}"),
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::Raised(msg) => write!(f, "Fatal error: {msg}"),
        }
    }
}

impl std::error::Error for VmError {}
