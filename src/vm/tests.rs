use super::*;
use crate::bytecode::Opcode;

/// Builds a bytecode image byte-by-byte: a 4-byte entry point followed by
/// instructions, with small helpers for forward-referencing jump targets
/// (`reserve_i32`/`patch_i32`) since labels in these hand-assembled programs
/// are resolved by emission order, not by a real assembler pass.
struct Image {
    bytes: Vec<u8>,
}

impl Image {
    fn new() -> Self {
        Image { bytes: vec![0; 4] }
    }

    fn pos(&self) -> i32 {
        self.bytes.len() as i32
    }

    fn op(&mut self, op: Opcode) -> &mut Self {
        self.bytes.push(op as u8);
        self
    }

    fn imm_i32(&mut self, v: i32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn imm_str(&mut self, s: &str) -> &mut Self {
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self
    }

    fn reserve_i32(&mut self) -> usize {
        let at = self.bytes.len();
        self.bytes.extend_from_slice(&0i32.to_le_bytes());
        at
    }

    fn patch_i32(&mut self, at: usize, v: i32) {
        self.bytes[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn finish(mut self, entry: i32) -> Vec<u8> {
        self.bytes[0..4].copy_from_slice(&entry.to_le_bytes());
        self.bytes
    }
}

#[test]
fn arithmetic() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushInt).imm_i32(3);
    img.op(Opcode::PushInt).imm_i32(4);
    img.op(Opcode::Add);
    img.op(Opcode::Ret);
    super::execute(&img.finish(entry), false).unwrap();
}

#[test]
fn identity_lambda_applied() {
    let mut img = Image::new();
    // L: ENTER 1; STORE_VAR 0; PUSH_VAR 0 0; RET
    let l_ip = img.pos();
    img.op(Opcode::Enter).imm_i32(1);
    img.op(Opcode::StoreVar).imm_i32(0);
    img.op(Opcode::PushVar).imm_i32(0).imm_i32(0);
    img.op(Opcode::Ret);
    // main: PUSH_CLOSURE L; PUSH_INT 42; SWAP_CALL; RET
    let entry = img.pos();
    img.op(Opcode::PushClosure).imm_i32(l_ip);
    img.op(Opcode::PushInt).imm_i32(42);
    img.op(Opcode::SwapCall);
    img.op(Opcode::Ret);
    super::execute(&img.finish(entry), false).unwrap();
}

#[test]
fn conditional_takes_true_branch() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushInt).imm_i32(1);
    img.op(Opcode::PushInt).imm_i32(1);
    img.op(Opcode::Eq);
    img.op(Opcode::JmpTrue);
    let t_patch = img.reserve_i32();
    img.op(Opcode::PushInt).imm_i32(0);
    img.op(Opcode::Jmp);
    let e_patch = img.reserve_i32();
    let t_label = img.pos();
    img.op(Opcode::PushInt).imm_i32(1);
    let e_label = img.pos();
    img.op(Opcode::Ret);
    img.patch_i32(t_patch, t_label);
    img.patch_i32(e_patch, e_label);
    super::execute(&img.finish(entry), false).unwrap();
}

#[test]
fn tuple_field_skips_the_sentinel() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushInt).imm_i32(10);
    img.op(Opcode::PushInt).imm_i32(20);
    img.op(Opcode::PushUnit); // sentinel PUSH_TUPLE's n+1 convention expects
    img.op(Opcode::PushTuple).imm_i32(2);
    img.op(Opcode::PushTupleItem).imm_i32(1);
    img.op(Opcode::Ret);
    super::execute(&img.finish(entry), false).unwrap();
}

#[test]
fn string_concat_via_curried_builtin() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushBuiltin).imm_str("$$builtin-string-concat");
    img.op(Opcode::PushString).imm_str("a");
    img.op(Opcode::SwapCall);
    img.op(Opcode::PushString).imm_str("b");
    img.op(Opcode::SwapCall);
    img.op(Opcode::PushBuiltin).imm_str("$$builtin-print-literal");
    img.op(Opcode::Swap);
    img.op(Opcode::SwapCall);
    img.op(Opcode::PushUnit);
    img.op(Opcode::Ret);
    super::execute(&img.finish(entry), false).unwrap();
}

#[test]
fn gc_stress_keeps_heap_bounded() {
    // A loop of 10,000 transient allocations, each popped before the next is
    // pushed, starting from the default capacity of 2. Modelled directly
    // against `Machine` (rather than a hand-assembled loop) since the point
    // under test is the allocator's collect-then-grow policy, not control flow.
    let image = [4u8, 0, 0, 0];
    let mut machine = Machine::new(&image, false).unwrap();
    for i in 0..10_000 {
        machine.alloc(Obj::Int(i));
        machine.stack.pop("test").unwrap();
        assert!(machine.heap.size() <= 2 * machine.heap.capacity());
    }
    let roots = std::iter::once(machine.activation);
    machine.heap.collect_if_due(roots);
    // only the root activation is reachable now
    assert!(machine.heap.size() <= 1);
}

#[test]
fn ret_from_root_activation_halts() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushUnit);
    img.op(Opcode::Ret);
    super::execute(&img.finish(entry), false).unwrap();
}

#[test]
fn division_by_zero_is_reported() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushInt).imm_i32(1);
    img.op(Opcode::PushInt).imm_i32(0);
    img.op(Opcode::Div);
    img.op(Opcode::Ret);
    let err = super::execute(&img.finish(entry), false).unwrap_err();
    assert_eq!(err, VmError::DivisionByZero);
}

#[test]
fn push_var_with_no_enter_is_state_absent() {
    let mut img = Image::new();
    let entry = img.pos();
    img.op(Opcode::PushVar).imm_i32(0).imm_i32(0);
    img.op(Opcode::Ret);
    let err = super::execute(&img.finish(entry), false).unwrap_err();
    assert!(matches!(err, VmError::StateAbsent { .. }));
}
