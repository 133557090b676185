//! # Bytecode-Dispatched Stack Machine
//!
//! `Machine` owns everything a single run needs: the heap, the operand
//! stack, the currently executing activation, and the instruction pointer
//! into the image. `execute` is the sole public entry point — it builds one
//! `Machine`, drives it to completion, and returns whatever diagnostic ended
//! the run.
//!
//! The dispatch loop itself is a thin `match` over [`Opcode`] that delegates
//! to one of the `ops_*` submodules, grouped the same way the reference
//! interpreter's single `execute` switch statement is grouped here by
//! concern: simple pushes (`ops_stack`), aggregate construction
//! (`ops_struct`), arithmetic (`ops_arith`), and everything touching control
//! flow or the activation chain (`ops_control`). Native functions live in
//! `builtins`.

use crate::bytecode::{self, Opcode};
use crate::error::VmError;
use crate::format::{format_value, Style};
use crate::heap::Heap;
use crate::stack::Stack;
use crate::value::{Activation, Obj, Ref};

mod ops_arith;
mod ops_control;
mod ops_stack;
mod ops_struct;
pub(crate) mod builtins;

pub struct Machine<'a> {
    image: &'a [u8],
    heap: Heap,
    stack: Stack,
    activation: Ref,
    ip: usize,
    debug: bool,
}

impl<'a> Machine<'a> {
    fn new(image: &'a [u8], debug: bool) -> Result<Self, VmError> {
        let mut heap = Heap::new();
        let mut stack = Stack::new();
        let root = Activation { parent: None, closure: None, next_ip: None, state: None };
        let activation = heap.alloc(Obj::Activation(root));
        stack.push(activation);
        let ip = bytecode::entry_ip(image)?;
        Ok(Machine { image, heap, stack, activation, ip, debug })
    }

    /// Allocates `obj`, running a collection first if the heap is due for
    /// one, and pushes the new reference onto the operand stack — the same
    /// allocate-and-push contract every `machine_new*` constructor gives the
    /// reference interpreter's opcode handlers.
    pub(crate) fn alloc(&mut self, obj: Obj) -> Ref {
        let roots = self.stack.values().iter().copied().chain(std::iter::once(self.activation));
        self.heap.collect_if_due(roots);
        let r = self.heap.alloc(obj);
        self.stack.push(r);
        r
    }

    fn fetch_u8(&mut self) -> Result<u8, VmError> {
        let (b, next) = bytecode::read_u8_at(self.image, self.ip)?;
        self.ip = next;
        Ok(b)
    }

    fn fetch_i32(&mut self) -> Result<i32, VmError> {
        let (v, next) = bytecode::read_i32_at(self.image, self.ip)?;
        self.ip = next;
        Ok(v)
    }

    fn fetch_str(&mut self) -> Result<&'a str, VmError> {
        let (s, next) = bytecode::read_str_at(self.image, self.ip)?;
        self.ip = next;
        Ok(s)
    }

    fn run(&mut self) -> Result<(), VmError> {
        loop {
            if self.debug {
                self.log_instruction()?;
            }
            let opcode = Opcode::try_from(self.fetch_u8()?)?;
            match opcode {
                Opcode::PushBuiltin => ops_stack::push_builtin(self)?,
                Opcode::PushClosure => ops_stack::push_closure(self)?,
                Opcode::PushData => ops_struct::push_data(self)?,
                Opcode::PushDataItem => ops_struct::push_data_item(self)?,
                Opcode::PushFalse => ops_stack::push_false(self),
                Opcode::PushInt => ops_stack::push_int(self)?,
                Opcode::PushString => ops_stack::push_string(self)?,
                Opcode::PushTrue => ops_stack::push_true(self),
                Opcode::PushTuple => ops_struct::push_tuple(self)?,
                Opcode::PushTupleItem => ops_struct::push_tuple_item(self)?,
                Opcode::PushUnit => ops_stack::push_unit(self),
                Opcode::PushVar => ops_stack::push_var(self)?,
                Opcode::Dup => ops_stack::dup(self)?,
                Opcode::Discard => ops_stack::discard(self)?,
                Opcode::Swap => ops_stack::swap(self)?,
                Opcode::Add => ops_arith::add(self)?,
                Opcode::Sub => ops_arith::sub(self)?,
                Opcode::Mul => ops_arith::mul(self)?,
                Opcode::Div => ops_arith::div(self)?,
                Opcode::Eq => ops_arith::eq(self)?,
                Opcode::Jmp => ops_control::jmp(self)?,
                Opcode::JmpData => ops_control::jmp_data(self)?,
                Opcode::JmpFalse => ops_control::jmp_false(self)?,
                Opcode::JmpTrue => ops_control::jmp_true(self)?,
                Opcode::SwapCall => ops_control::swap_call(self)?,
                Opcode::Enter => ops_control::enter(self)?,
                Opcode::Ret => {
                    if ops_control::ret(self)? {
                        return Ok(());
                    }
                }
                Opcode::StoreVar => ops_control::store_var(self)?,
            }
        }
    }

    /// Mirrors the reference interpreter's per-instruction trace: offset,
    /// opcode name and operands, the operand stack, and the current
    /// activation, all Raw-formatted. Operand decoding here is read-only —
    /// it peeks past `self.ip` without moving it, since the dispatch loop
    /// fetches for real immediately afterward.
    fn log_instruction(&self) -> Result<(), VmError> {
        let (opcode_byte, after_op) = bytecode::read_u8_at(self.image, self.ip)?;
        let opcode = Opcode::try_from(opcode_byte)?;
        let operands = match opcode {
            Opcode::PushBuiltin | Opcode::PushString => {
                let (s, _) = bytecode::read_str_at(self.image, after_op)?;
                format!(" {s}")
            }
            Opcode::PushData => {
                let (meta, n1) = bytecode::read_i32_at(self.image, after_op)?;
                let (id, n2) = bytecode::read_i32_at(self.image, n1)?;
                let (size, _) = bytecode::read_i32_at(self.image, n2)?;
                format!(" {meta} {id} {size}")
            }
            Opcode::PushVar => {
                let (frame, n1) = bytecode::read_i32_at(self.image, after_op)?;
                let (offset, _) = bytecode::read_i32_at(self.image, n1)?;
                format!(" {frame} {offset}")
            }
            Opcode::PushClosure
            | Opcode::PushInt
            | Opcode::PushTuple
            | Opcode::PushTupleItem
            | Opcode::PushDataItem
            | Opcode::Jmp
            | Opcode::JmpFalse
            | Opcode::JmpTrue
            | Opcode::Enter
            | Opcode::StoreVar => {
                let (v, _) = bytecode::read_i32_at(self.image, after_op)?;
                format!(" {v}")
            }
            _ => String::new(),
        };
        let stack_repr = self
            .stack
            .values()
            .iter()
            .map(|r| format_value(&self.heap, self.image, *r, Style::Raw))
            .collect::<Result<Vec<_>, _>>()?;
        let activation_repr = format_value(&self.heap, self.image, self.activation, Style::Raw)?;
        println!("{}: {}{operands}: [{}] {activation_repr}", self.ip, opcode.name(), stack_repr.join(", "));
        Ok(())
    }
}

/// Decodes and runs `image` to completion, printing the final value (unless
/// it's `Unit`) when the root activation returns. Any fatal condition along
/// the way is returned rather than printed, so callers choose how to report
/// it.
pub fn execute(image: &[u8], debug: bool) -> Result<(), VmError> {
    let mut machine = Machine::new(image, debug)?;
    machine.run()
}

#[cfg(test)]
mod tests;
