//! # Builtin Dispatch — Curried Native Functions
//!
//! The nine native functions a program can reach via `PUSH_BUILTIN` plus the
//! continuation stages curried applications build up through. A curried
//! builtin is modelled the same way the reference machine models a partially
//! applied native function pointer: a chain of `BuiltinClosure` values, each
//! holding the previous link and the argument just supplied. `BuiltinId`
//! plays the role that a raw function pointer plays there — `next` names
//! which native stage to run if a given closure becomes a callee again.
//!
//! Each function here manages the operand stack itself, the same way its
//! native counterpart does: terminal stages that need both their operands as
//! owned data pop them outright, while stages that only need to *peek*
//! before allocating a new closure go through [`Stack::collapse`].
//! `$$builtin-print`/`$$builtin-println`/`$$builtin-print-literal` pop only
//! their argument and deliberately leave the receiver sitting on the operand
//! stack — this looks like a bug but is the literal, verified behaviour of
//! the reference implementation's `_print`/`_println`/`_printLiteral`, and is
//! kept rather than tidied away.

use crate::error::VmError;
use crate::format::{format_value, Style};
use crate::value::{Obj, Ref};
use crate::vm::Machine;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuiltinId {
    Print,
    Println,
    PrintLiteral,
    StringCompare,
    StringConcat,
    StringEqual,
    StringLength,
    StringSubstring,
    FatalError,
    /// Reached when a `string-compare` closure is applied to its second
    /// argument.
    StringCompareApply,
    StringConcatApply,
    StringEqualApply,
    /// Reached when a `string-substring` closure is applied to its second
    /// argument (the start index); produces a closure awaiting the third.
    StringSubstringApply1,
    /// Reached when applied to the third argument (the end index); computes
    /// the final string.
    StringSubstringApply2,
}

/// Base builtins in their image registration order — also the order debug
/// traces and unknown-builtin diagnostics name them in.
const BASE_BUILTINS: [(&str, BuiltinId); 9] = [
    ("$$builtin-print", BuiltinId::Print),
    ("$$builtin-println", BuiltinId::Println),
    ("$$builtin-print-literal", BuiltinId::PrintLiteral),
    ("$$builtin-string-compare", BuiltinId::StringCompare),
    ("$$builtin-string-concat", BuiltinId::StringConcat),
    ("$$builtin-string-equal", BuiltinId::StringEqual),
    ("$$builtin-string-length", BuiltinId::StringLength),
    ("$$builtin-string-substring", BuiltinId::StringSubstring),
    ("$$builtin-fatal-error", BuiltinId::FatalError),
];

pub(crate) fn lookup(name: &str) -> Option<BuiltinId> {
    BASE_BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
}

impl BuiltinId {
    /// Display name for a base builtin. Continuation-only stages never
    /// appear as a bare `Obj::Builtin`, so they fall back to a placeholder
    /// that should never actually reach a formatted value.
    pub(crate) fn builtin_name(self) -> &'static str {
        BASE_BUILTINS
            .iter()
            .find(|(_, id)| *id == self)
            .map(|(name, _)| *name)
            .unwrap_or("<builtin-closure>")
    }
}

/// Dispatches a `SWAP_CALL` whose callee resolved to a `Builtin` or
/// `BuiltinClosure`. `receiver` is still on the stack beneath its argument
/// (per `op` naming below, each stage pops/peeks exactly what its reference
/// counterpart does).
pub(crate) fn invoke(vm: &mut Machine, receiver: Ref) -> Result<(), VmError> {
    let dispatch = match vm.heap.get(receiver) {
        Obj::Builtin(id) => *id,
        Obj::BuiltinClosure { next, .. } => *next,
        other => return Err(VmError::type_mismatch("SWAP_CALL", "Builtin", other)),
    };
    match dispatch {
        BuiltinId::Print => print_stage(vm, "$$builtin-print", Style::Raw, false),
        BuiltinId::PrintLiteral => print_stage(vm, "$$builtin-print-literal", Style::Literal, false),
        BuiltinId::Println => print_stage(vm, "$$builtin-println", Style::Raw, true),
        BuiltinId::FatalError => fatal_error(vm),
        BuiltinId::StringLength => string_length(vm),
        BuiltinId::StringCompare => curry(vm, receiver, BuiltinId::StringCompareApply, "$$builtin-string-compare"),
        BuiltinId::StringConcat => curry(vm, receiver, BuiltinId::StringConcatApply, "$$builtin-string-concat"),
        BuiltinId::StringEqual => curry(vm, receiver, BuiltinId::StringEqualApply, "$$builtin-string-equal"),
        BuiltinId::StringSubstring => {
            curry(vm, receiver, BuiltinId::StringSubstringApply1, "$$builtin-string-substring")
        }
        BuiltinId::StringCompareApply => string_compare_apply(vm),
        BuiltinId::StringConcatApply => string_concat_apply(vm),
        BuiltinId::StringEqualApply => string_equal_apply(vm),
        BuiltinId::StringSubstringApply1 => string_substring_apply1(vm, receiver),
        BuiltinId::StringSubstringApply2 => string_substring_apply2(vm, receiver),
    }
}

fn expect_string<'a>(vm: &'a Machine, r: Ref, op: &'static str) -> Result<&'a str, VmError> {
    match vm.heap.get(r) {
        Obj::Str(s) => Ok(s.as_str()),
        other => Err(VmError::type_mismatch(op, "String", other)),
    }
}

fn expect_int(vm: &Machine, r: Ref, op: &'static str) -> Result<i32, VmError> {
    match vm.heap.get(r) {
        Obj::Int(n) => Ok(*n),
        other => Err(VmError::type_mismatch(op, "Int", other)),
    }
}

fn closure_argument(vm: &Machine, r: Ref, op: &'static str) -> Result<Ref, VmError> {
    match vm.heap.get(r) {
        Obj::BuiltinClosure { argument, .. } => Ok(*argument),
        other => Err(VmError::type_mismatch(op, "BuiltinClosure", other)),
    }
}

fn closure_previous(vm: &Machine, r: Ref, op: &'static str) -> Result<Ref, VmError> {
    match vm.heap.get(r) {
        Obj::BuiltinClosure { previous, .. } => Ok(*previous),
        other => Err(VmError::type_mismatch(op, "BuiltinClosure", other)),
    }
}

/// `$$builtin-print`/`$$builtin-print-literal`/`$$builtin-println`: pop only
/// the argument, leave the receiver on the stack, write to stdout.
fn print_stage(vm: &mut Machine, op: &'static str, style: Style, newline_only: bool) -> Result<(), VmError> {
    let v = vm.stack.pop(op)?;
    if newline_only {
        println!();
    } else {
        let s = format_value(&vm.heap, vm.image, v, style)?;
        print!("{s}");
    }
    Ok(())
}

fn fatal_error(vm: &mut Machine) -> Result<(), VmError> {
    let v = vm.stack.pop("$$builtin-fatal-error")?;
    let s = format_value(&vm.heap, vm.image, v, Style::Raw)?;
    Err(VmError::Raised(s))
}

/// `$$builtin-string-length`: arity 1, called directly (no currying). Pops
/// its argument, then its receiver, and pushes the byte length.
fn string_length(vm: &mut Machine) -> Result<(), VmError> {
    let arg = vm.stack.pop("$$builtin-string-length")?;
    vm.stack.pop("$$builtin-string-length")?;
    let len = expect_string(vm, arg, "$$builtin-string-length")?.len() as i32;
    vm.alloc(Obj::Int(len));
    Ok(())
}

/// Shared first curry step for the three binary string builtins: peek the
/// argument just supplied, build a `BuiltinClosure` capturing it alongside
/// the receiver, then collapse the two operands the closure was built from
/// down to the one new value.
fn curry(vm: &mut Machine, receiver: Ref, next: BuiltinId, op: &'static str) -> Result<(), VmError> {
    let argument = vm.stack.peek(0, op)?;
    vm.alloc(Obj::BuiltinClosure { previous: receiver, argument, next });
    vm.stack.collapse(2, op)
}

fn string_compare_apply(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "$$builtin-string-compare";
    let second = vm.stack.pop(OP)?;
    let receiver = vm.stack.pop(OP)?;
    let first = closure_argument(vm, receiver, OP)?;
    let a = expect_string(vm, first, OP)?.as_bytes().to_vec();
    let b = expect_string(vm, second, OP)?.as_bytes().to_vec();
    let cmp = match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    };
    vm.alloc(Obj::Int(cmp));
    Ok(())
}

fn string_concat_apply(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "$$builtin-string-concat";
    let second = vm.stack.pop(OP)?;
    let receiver = vm.stack.pop(OP)?;
    let first = closure_argument(vm, receiver, OP)?;
    let mut out = expect_string(vm, first, OP)?.to_string();
    out.push_str(expect_string(vm, second, OP)?);
    vm.alloc(Obj::Str(out));
    Ok(())
}

fn string_equal_apply(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "$$builtin-string-equal";
    let second = vm.stack.pop(OP)?;
    let receiver = vm.stack.pop(OP)?;
    let first = closure_argument(vm, receiver, OP)?;
    let equal = expect_string(vm, first, OP)? == expect_string(vm, second, OP)?;
    vm.stack.push(vm.heap.bool_ref(equal));
    Ok(())
}

fn string_substring_apply1(vm: &mut Machine, receiver: Ref) -> Result<(), VmError> {
    const OP: &str = "$$builtin-string-substring";
    curry(vm, receiver, BuiltinId::StringSubstringApply2, OP)
}

fn string_substring_apply2(vm: &mut Machine, receiver: Ref) -> Result<(), VmError> {
    const OP: &str = "$$builtin-string-substring";
    let end_ref = vm.stack.pop(OP)?;
    let closure2 = vm.stack.pop(OP)?;
    debug_assert_eq!(closure2, receiver);
    let start_ref = closure_argument(vm, closure2, OP)?;
    let closure1 = closure_previous(vm, closure2, OP)?;
    let string_ref = closure_argument(vm, closure1, OP)?;

    let mut start = expect_int(vm, start_ref, OP)?;
    let mut end = expect_int(vm, end_ref, OP)?;
    let s = expect_string(vm, string_ref, OP)?;
    let len = s.len() as i32;

    if start < 0 {
        start = 0;
    }
    if end < 0 {
        end = 0;
    }
    let result = if start >= len || end <= start {
        String::new()
    } else {
        let end = end.min(len);
        s[start as usize..end as usize].to_string()
    };
    vm.alloc(Obj::Str(result));
    Ok(())
}
