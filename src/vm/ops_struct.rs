//! # Aggregate Construction
//!
//! Tuples and algebraic data share the same construction idiom, and the same
//! quirk: the emitter that targets this machine always leaves one extra
//! sentinel value on top of the `n` real fields before `PUSH_TUPLE`/
//! `PUSH_DATA` runs, so these handlers skip `peek(0)` and read fields from
//! `peek(1)..peek(size)`, then collapse `size + 1` slots (the sentinel plus
//! the fields) down to the freshly allocated aggregate.

use crate::error::VmError;
use crate::value::Obj;
use crate::vm::Machine;

pub(super) fn push_tuple(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "PUSH_TUPLE";
    let size = vm.fetch_i32()? as usize;
    let mut fields = Vec::with_capacity(size);
    for offset in (1..=size).rev() {
        fields.push(vm.stack.peek(offset, OP)?);
    }
    vm.alloc(Obj::Tuple(fields));
    vm.stack.collapse(size + 1, OP)
}

pub(super) fn push_data(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "PUSH_DATA";
    let meta = vm.fetch_i32()? as usize;
    let id = vm.fetch_i32()?;
    let size = vm.fetch_i32()? as usize;
    let mut fields = Vec::with_capacity(size);
    for offset in (1..=size).rev() {
        fields.push(vm.stack.peek(offset, OP)?);
    }
    vm.alloc(Obj::Data { meta, id, fields });
    vm.stack.collapse(size + 1, OP)
}

pub(super) fn push_tuple_item(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "PUSH_TUPLE_ITEM";
    let index = vm.fetch_i32()? as usize;
    let r = vm.stack.pop(OP)?;
    let value = match vm.heap.get(r) {
        Obj::Tuple(fields) => fields.get(index).copied().ok_or_else(|| VmError::BoundsViolation {
            op: OP,
            detail: format!("index {index} out of range for a {}-tuple", fields.len()),
        })?,
        other => return Err(VmError::type_mismatch(OP, "Tuple", other)),
    };
    vm.stack.push(value);
    Ok(())
}

pub(super) fn push_data_item(vm: &mut Machine) -> Result<(), VmError> {
    const OP: &str = "PUSH_DATA_ITEM";
    let index = vm.fetch_i32()? as usize;
    let r = vm.stack.pop(OP)?;
    let value = match vm.heap.get(r) {
        Obj::Data { fields, .. } => fields.get(index).copied().ok_or_else(|| VmError::BoundsViolation {
            op: OP,
            detail: format!("index {index} out of range for {} fields", fields.len()),
        })?,
        other => return Err(VmError::type_mismatch(OP, "Data", other)),
    };
    vm.stack.push(value);
    Ok(())
}
