//! # Bytecode Image Format & Decoder
//!
//! A compiled image is a flat little-endian byte blob: a 4-byte entry point
//! (the instruction offset execution starts at), followed by instructions
//! packed back-to-back with no alignment padding. Each instruction is a
//! 1-byte [`Opcode`] followed by however many operand bytes that opcode
//! takes — a 4-byte `i32` for jump targets, slot indices, sizes and
//! constants, or a NUL-terminated UTF-8 string for names.
//!
//! There is no separate function table: a closure's entry point is simply an
//! instruction offset baked in as a `PUSH_CLOSURE` operand, and `PUSH_DATA`'s
//! metadata points at a block of [`DataNames`] — a type name followed by its
//! constructors' names, also NUL-terminated — living elsewhere in the image.
//!
//! The reader never copies bytes: [`read_str_at`] and [`DataNames`] borrow
//! directly from the image slice handed to [`execute`](crate::execute), so
//! decoding an instruction costs no allocation.

use crate::error::VmError;

pub(crate) fn entry_ip(image: &[u8]) -> Result<usize, VmError> {
    read_i32_at(image, 0).map(|(v, _)| v as usize)
}

/// Reads a little-endian `i32` at `offset`, returning it and the offset just
/// past it.
pub(crate) fn read_i32_at(image: &[u8], offset: usize) -> Result<(i32, usize), VmError> {
    let bytes: [u8; 4] = image
        .get(offset..offset + 4)
        .ok_or_else(|| VmError::ImageError(format!("truncated i32 at offset {offset}")))?
        .try_into()
        .unwrap();
    Ok((i32::from_le_bytes(bytes), offset + 4))
}

pub(crate) fn read_u8_at(image: &[u8], offset: usize) -> Result<(u8, usize), VmError> {
    let byte = *image
        .get(offset)
        .ok_or_else(|| VmError::ImageError(format!("truncated byte at offset {offset}")))?;
    Ok((byte, offset + 1))
}

/// Reads a NUL-terminated UTF-8 string at `offset`, returning a borrowed
/// slice and the offset just past the terminator.
pub(crate) fn read_str_at(image: &[u8], offset: usize) -> Result<(&str, usize), VmError> {
    let rest = image
        .get(offset..)
        .ok_or_else(|| VmError::ImageError(format!("truncated string at offset {offset}")))?;
    let nul = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| VmError::ImageError(format!("unterminated string at offset {offset}")))?;
    let s = std::str::from_utf8(&rest[..nul])
        .map_err(|e| VmError::ImageError(format!("invalid UTF-8 at offset {offset}: {e}")))?;
    Ok((s, offset + nul + 1))
}

/// A data type's name and its constructors' names, read from the image at
/// the offset a `PUSH_DATA`/`PUSH_DATA_ITEM` instruction's `meta` operand
/// names. `ctor_names[id]` is the display name of constructor `id`.
pub struct DataNames<'a> {
    pub type_name: &'a str,
    pub ctor_names: Vec<&'a str>,
}

/// Layout: an `i32` constructor count, then `count + 1` NUL-terminated
/// names — the type's own name first, then one name per constructor.
pub(crate) fn read_data_names_at(image: &[u8], offset: usize) -> Result<DataNames<'_>, VmError> {
    let (stored_count, mut cursor) = read_i32_at(image, offset)?;
    let total_names = stored_count as usize + 1;
    let (type_name, next) = read_str_at(image, cursor)?;
    cursor = next;
    let mut ctor_names = Vec::with_capacity(total_names - 1);
    for _ in 0..total_names - 1 {
        let (name, next) = read_str_at(image, cursor)?;
        ctor_names.push(name);
        cursor = next;
    }
    Ok(DataNames { type_name, ctor_names })
}

/// One instruction opcode. Discriminants are fixed: they are the order the
/// reference virtual machine registers its instruction table in, and several
/// tools (debug traces, this crate's own tests) name opcodes by this number.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Opcode {
    PushBuiltin = 0,
    PushClosure = 1,
    PushData = 2,
    PushDataItem = 3,
    PushFalse = 4,
    PushInt = 5,
    PushString = 6,
    PushTrue = 7,
    PushTuple = 8,
    PushTupleItem = 9,
    PushUnit = 10,
    PushVar = 11,
    Dup = 12,
    Discard = 13,
    Swap = 14,
    Add = 15,
    Sub = 16,
    Mul = 17,
    Div = 18,
    Eq = 19,
    Jmp = 20,
    JmpData = 21,
    JmpFalse = 22,
    JmpTrue = 23,
    SwapCall = 24,
    Enter = 25,
    Ret = 26,
    StoreVar = 27,
}

impl Opcode {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Opcode::PushBuiltin => "PUSH_BUILTIN",
            Opcode::PushClosure => "PUSH_CLOSURE",
            Opcode::PushData => "PUSH_DATA",
            Opcode::PushDataItem => "PUSH_DATA_ITEM",
            Opcode::PushFalse => "PUSH_FALSE",
            Opcode::PushInt => "PUSH_INT",
            Opcode::PushString => "PUSH_STRING",
            Opcode::PushTrue => "PUSH_TRUE",
            Opcode::PushTuple => "PUSH_TUPLE",
            Opcode::PushTupleItem => "PUSH_TUPLE_ITEM",
            Opcode::PushUnit => "PUSH_UNIT",
            Opcode::PushVar => "PUSH_VAR",
            Opcode::Dup => "DUP",
            Opcode::Discard => "DISCARD",
            Opcode::Swap => "SWAP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Eq => "EQ",
            Opcode::Jmp => "JMP",
            Opcode::JmpData => "JMP_DATA",
            Opcode::JmpFalse => "JMP_FALSE",
            Opcode::JmpTrue => "JMP_TRUE",
            Opcode::SwapCall => "SWAP_CALL",
            Opcode::Enter => "ENTER",
            Opcode::Ret => "RET",
            Opcode::StoreVar => "STORE_VAR",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = VmError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match byte {
            0 => PushBuiltin,
            1 => PushClosure,
            2 => PushData,
            3 => PushDataItem,
            4 => PushFalse,
            5 => PushInt,
            6 => PushString,
            7 => PushTrue,
            8 => PushTuple,
            9 => PushTupleItem,
            10 => PushUnit,
            11 => PushVar,
            12 => Dup,
            13 => Discard,
            14 => Swap,
            15 => Add,
            16 => Sub,
            17 => Mul,
            18 => Div,
            19 => Eq,
            20 => Jmp,
            21 => JmpData,
            22 => JmpFalse,
            23 => JmpTrue,
            24 => SwapCall,
            25 => Enter,
            26 => Ret,
            27 => StoreVar,
            other => return Err(VmError::ImageError(format!("unknown opcode {other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_entry_point() {
        let image = [7, 0, 0, 0];
        assert_eq!(entry_ip(&image).unwrap(), 7);
    }

    #[test]
    fn reads_nul_terminated_string() {
        let image = b"hello\0world";
        let (s, next) = read_str_at(image, 0).unwrap();
        assert_eq!(s, "hello");
        assert_eq!(next, 6);
        let (s2, next2) = read_str_at(image, next).unwrap();
        assert_eq!(s2, "world");
        let _ = next2;
    }

    #[test]
    fn reads_data_names() {
        let mut image = Vec::new();
        image.extend_from_slice(&1i32.to_le_bytes()); // 1 constructor
        image.extend_from_slice(b"Option\0");
        image.extend_from_slice(b"Some\0");
        image.extend_from_slice(b"None\0");
        let names = read_data_names_at(&image, 0).unwrap();
        assert_eq!(names.type_name, "Option");
        assert_eq!(names.ctor_names, vec!["Some", "None"]);
    }

    #[test]
    fn opcode_roundtrips_through_discriminant() {
        for byte in 0u8..=27 {
            let op = Opcode::try_from(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert!(Opcode::try_from(28).is_err());
    }
}
