//! # Control Flow, Calls, and the Activation Chain
//!
//! Everything that moves `ip` other than straight-line fall-through, plus the
//! three opcodes that create, populate, and unwind activations:
//! `SWAP_CALL` (call a closure or native builtin), `ENTER` (allocate an
//! activation's variable-state slots once its arguments have been recorded),
//! and `RET` (return to the caller, or — for the root activation — halt the
//! machine and print the final value).

use crate::error::VmError;
use crate::format::{format_value, Style};
use crate::value::{Activation, Obj};
use crate::vm::{builtins, Machine};

pub(super) fn jmp(vm: &mut Machine) -> Result<(), VmError> {
    let target = vm.fetch_i32()? as usize;
    vm.ip = target;
    Ok(())
}

fn pop_bool(vm: &mut Machine, op: &'static str) -> Result<bool, VmError> {
    let r = vm.stack.pop(op)?;
    match vm.heap.get(r) {
        Obj::Bool(b) => Ok(*b),
        other => Err(VmError::type_mismatch(op, "Bool", other)),
    }
}

pub(super) fn jmp_true(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "JMP_TRUE";
    let target = vm.fetch_i32()? as usize;
    if pop_bool(vm, OP)? {
        vm.ip = target;
    }
    Ok(())
}

pub(super) fn jmp_false(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "JMP_FALSE";
    let target = vm.fetch_i32()? as usize;
    if !pop_bool(vm, OP)? {
        vm.ip = target;
    }
    Ok(())
}

/// `JMP_DATA`: pops a `Data` value, reads a table-length prefix, then jumps
/// through a table of `i32` targets living inline in the image right after
/// that length — one entry per constructor id, bounds-checked against it.
pub(super) fn jmp_data(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "JMP_DATA";
    let r = vm.stack.pop(OP)?;
    let id = match vm.heap.get(r) {
        Obj::Data { id, .. } => *id,
        other => return Err(VmError::type_mismatch(OP, "Data", other)),
    };
    let size = vm.fetch_i32()?;
    if id < 0 || id >= size {
        return Err(VmError::BoundsViolation {
            op: OP,
            detail: format!("constructor id {id} out of range for a {size}-entry jump table"),
        });
    }
    let table_base = vm.ip;
    let (target, _) = crate::bytecode::read_i32_at(vm.image, table_base + 4 * id as usize)?;
    vm.ip = target as usize;
    Ok(())
}

/// `SWAP_CALL`: stack is `[..., receiver, argument]`. A `Closure` receiver
/// spawns a new activation whose dynamic parent is the current one and whose
/// return address is the instruction right after this `SWAP_CALL`; the
/// receiver slot is then dropped, leaving just the argument on the operand
/// stack — the new activation lives only in `vm.activation`, never back on
/// the stack. A `Builtin`/`BuiltinClosure` receiver is dispatched straight to
/// [`builtins::invoke`], which manages the stack itself.
pub(super) fn swap_call(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "SWAP_CALL";
    let receiver = vm.stack.peek(1, OP)?;
    match vm.heap.get(receiver) {
        Obj::Closure { ip, .. } => {
            let closure_ip = *ip;
            let new_activation = Activation {
                parent: Some(vm.activation),
                closure: Some(receiver),
                next_ip: Some(vm.ip),
                state: None,
            };
            let activation_ref = vm.alloc(Obj::Activation(new_activation));
            vm.stack.pop(OP)?;
            vm.activation = activation_ref;
            vm.ip = closure_ip;
            vm.stack.collapse(1, OP)
        }
        Obj::Builtin(_) | Obj::BuiltinClosure { .. } => builtins::invoke(vm, receiver),
        other => Err(VmError::type_mismatch(OP, "Closure", other)),
    }
}

/// `ENTER size`: allocates the current activation's variable-state slots,
/// all initially unset. Errors if this activation was already entered.
pub(super) fn enter(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "ENTER";
    let size = vm.fetch_i32()? as usize;
    let activation = vm.activation;
    match vm.heap.get_mut(activation) {
        Obj::Activation(a) => {
            if a.state.is_some() {
                return Err(VmError::StateAbsent {
                    op: OP,
                    detail: "activation already entered".into(),
                });
            }
            a.state = Some(vec![None; size]);
            Ok(())
        }
        other => Err(VmError::type_mismatch(OP, "Activation", other)),
    }
}

/// `RET`: pops the return value. If the current activation is the root (no
/// dynamic parent), execution halts and the value is printed Typed (unless
/// it's `Unit`). Otherwise control resumes in the parent activation at its
/// saved return address, with the value left on the operand stack.
pub(super) fn ret(vm: &mut Machine) -> Result<bool, VmError> {
    const OP: &str = "RET";
    let value = vm.stack.pop(OP)?;
    let (parent, next_ip) = match vm.heap.get(vm.activation) {
        Obj::Activation(a) => (a.parent, a.next_ip),
        other => return Err(VmError::type_mismatch(OP, "Activation", other)),
    };
    match parent {
        None => {
            if !matches!(vm.heap.get(value), Obj::Unit) {
                let rendered = format_value(&vm.heap, vm.image, value, Style::Typed)?;
                println!("{rendered}");
            }
            Ok(true)
        }
        Some(parent_ref) => {
            vm.activation = parent_ref;
            vm.ip = next_ip.ok_or_else(|| VmError::StateAbsent {
                op: OP,
                detail: "activation has no return address".into(),
            })?;
            vm.stack.push(value);
            Ok(false)
        }
    }
}

/// `STORE_VAR index`: writes the popped value into the *current* activation's
/// state at `index` — unlike `PUSH_VAR`, there is no frame hop; a function
/// can only ever store into its own activation.
pub(super) fn store_var(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "STORE_VAR";
    let index = vm.fetch_i32()? as usize;
    let value = vm.stack.pop(OP)?;
    let activation = vm.activation;
    match vm.heap.get_mut(activation) {
        Obj::Activation(a) => {
            let state = a.state.as_mut().ok_or_else(|| VmError::StateAbsent {
                op: OP,
                detail: "activation has no saved state".into(),
            })?;
            let cell = state.get_mut(index).ok_or_else(|| VmError::BoundsViolation {
                op: OP,
                detail: format!("index {index} out of range"),
            })?;
            *cell = Some(value);
            Ok(())
        }
        other => Err(VmError::type_mismatch(OP, "Activation", other)),
    }
}
