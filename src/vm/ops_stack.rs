//! # Plain Stack Pushes
//!
//! The opcodes that push a single value with no interaction beyond the
//! current frame: literals, closures, builtins, and `PUSH_VAR`'s lexical
//! variable lookup.

use crate::error::VmError;
use crate::frame::walk_frames;
use crate::value::{Activation, Obj};
use crate::vm::{builtins, Machine};

pub(super) fn push_true(vm: &mut Machine) {
    let r = vm.heap.bool_ref(true);
    vm.stack.push(r);
}

pub(super) fn push_false(vm: &mut Machine) {
    let r = vm.heap.bool_ref(false);
    vm.stack.push(r);
}

pub(super) fn push_unit(vm: &mut Machine) {
    let r = vm.heap.singleton_unit();
    vm.stack.push(r);
}

pub(super) fn push_int(vm: &mut Machine) -> Result<(), VmError> {
    let n = vm.fetch_i32()?;
    vm.alloc(Obj::Int(n));
    Ok(())
}

pub(super) fn push_string(vm: &mut Machine) -> Result<(), VmError> {
    let s = vm.fetch_str()?.to_string();
    vm.alloc(Obj::Str(s));
    Ok(())
}

/// `PUSH_CLOSURE ip`: captures the activation currently executing as the
/// closure's lexical parent.
pub(super) fn push_closure(vm: &mut Machine) -> Result<(), VmError> {
    let ip = vm.fetch_i32()? as usize;
    let previous_activation = Some(vm.activation);
    vm.alloc(Obj::Closure { previous_activation, ip });
    Ok(())
}

pub(super) fn push_builtin(vm: &mut Machine) -> Result<(), VmError> {
    let name = vm.fetch_str()?;
    let id = builtins::lookup(name).ok_or_else(|| VmError::ImageError(format!("unknown builtin {name}")))?;
    vm.alloc(Obj::Builtin(id));
    Ok(())
}

/// `PUSH_VAR frame slot`: hops `frame` links up the lexical chain from the
/// current activation, then reads `slot` out of that activation's saved
/// state.
pub(super) fn push_var(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "PUSH_VAR";
    let frame = vm.fetch_i32()?;
    let slot = vm.fetch_i32()? as usize;
    let target = walk_frames(&vm.heap, vm.activation, frame)?;
    let value = match vm.heap.get(target) {
        Obj::Activation(Activation { state: Some(state), .. }) => {
            state.get(slot).copied().flatten().ok_or_else(|| VmError::BoundsViolation {
                op: OP,
                detail: format!("slot {slot} not set in activation state"),
            })?
        }
        Obj::Activation(Activation { state: None, .. }) => {
            return Err(VmError::StateAbsent { op: OP, detail: "activation has no saved state".into() })
        }
        other => return Err(VmError::type_mismatch(OP, "Activation", other)),
    };
    vm.stack.push(value);
    Ok(())
}

pub(super) fn dup(vm: &mut Machine) -> Result<(), VmError> {
    let top = vm.stack.peek(0, "DUP")?;
    vm.stack.push(top);
    Ok(())
}

pub(super) fn discard(vm: &mut Machine) -> Result<(), VmError> {
    vm.stack.pop("DISCARD")?;
    Ok(())
}

pub(super) fn swap(vm: &mut Machine) -> Result<(), VmError> {
    let a = vm.stack.pop("SWAP")?;
    let b = vm.stack.pop("SWAP")?;
    vm.stack.push(a);
    vm.stack.push(b);
    Ok(())
}
