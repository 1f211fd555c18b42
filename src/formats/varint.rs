//! Unsigned LEB128 integers as used by the Sponge block data array.

use crate::error::{Result, SchematicError};

const MAX_VARINT_BYTES: usize = 5;

/// Reads one VarInt starting at `*offset` and advances past it.
pub fn read_varint(bytes: &[i8], offset: &mut usize) -> Result<u32> {
    let start = *offset;
    let mut result: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = *bytes
            .get(start + i)
            .ok_or(SchematicError::MalformedVarInt { offset: start })? as u8;
        let chunk = (byte & 0x7F) as u32;
        // the fifth byte only has room for the top four bits
        if i == MAX_VARINT_BYTES - 1 && chunk > 0x0F {
            return Err(SchematicError::MalformedVarInt { offset: start });
        }
        result |= chunk << (7 * i);
        if byte & 0x80 == 0 {
            *offset = start + i + 1;
            return Ok(result);
        }
    }
    Err(SchematicError::MalformedVarInt { offset: start })
}

pub fn write_varint(out: &mut Vec<i8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte as i8);
        if value == 0 {
            break;
        }
    }
}

/// Encoded length of `value`.
pub fn varint_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}
