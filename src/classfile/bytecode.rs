//! Instruction walking for `Code` attributes.
//!
//! Only the operands that name constant-pool Class entries are collected; nothing here
//! verifies the instruction stream.

use crate::error::ClassFormatError;

const LDC: u8 = 0x12;
const LDC_W: u8 = 0x13;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const NEW: u8 = 0xbb;
const ANEWARRAY: u8 = 0xbd;
const CHECKCAST: u8 = 0xc0;
const INSTANCEOF: u8 = 0xc1;
const WIDE: u8 = 0xc4;
const MULTIANEWARRAY: u8 = 0xc5;
const IINC: u8 = 0x84;

/// Length of a fixed-size instruction, opcode included. `None` for variable-length or
/// undefined opcodes.
fn fixed_length(opcode: u8) -> Option<usize> {
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        LDC => 2,
        LDC_W | 0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        NEW => 3,
        0xbc => 2,
        ANEWARRAY => 3,
        0xbe | 0xbf => 1,
        CHECKCAST | INSTANCEOF => 3,
        0xc2 | 0xc3 => 1,
        MULTIANEWARRAY => 4,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        0xca | 0xfe | 0xff => 1,
        _ => return None,
    };
    Some(length)
}

fn read_i32(code: &[u8], at: usize) -> Result<i32, ClassFormatError> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ClassFormatError::UnexpectedEof)
}

fn read_u16(code: &[u8], at: usize) -> Result<u16, ClassFormatError> {
    code.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(ClassFormatError::UnexpectedEof)
}

/// Length of the switch instruction at `pc`, including alignment padding.
fn switch_length(code: &[u8], pc: usize, opcode: u8) -> Result<usize, ClassFormatError> {
    let padding = (4 - (pc + 1) % 4) % 4;
    let operands = pc + 1 + padding;
    let length = if opcode == TABLESWITCH {
        let low = read_i32(code, operands + 4)?;
        let high = read_i32(code, operands + 8)?;
        if high < low {
            return Err(ClassFormatError::InvalidBytecode { offset: pc });
        }
        12 + (high as i64 - low as i64 + 1) as usize * 4
    } else {
        let pairs = read_i32(code, operands + 4)?;
        if pairs < 0 {
            return Err(ClassFormatError::InvalidBytecode { offset: pc });
        }
        8 + pairs as usize * 8
    };
    Ok(1 + padding + length)
}

/// Constant-pool indices used as operands by class-naming instructions
/// (`new`, `anewarray`, `checkcast`, `instanceof`, `multianewarray`, `ldc`, `ldc_w`).
pub(crate) fn class_operands(code: &[u8]) -> Result<Vec<u16>, ClassFormatError> {
    let mut operands = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let opcode = code[pc];
        let length = match opcode {
            TABLESWITCH | LOOKUPSWITCH => switch_length(code, pc, opcode)?,
            WIDE => match code.get(pc + 1) {
                Some(&IINC) => 6,
                Some(_) => 4,
                None => return Err(ClassFormatError::UnexpectedEof),
            },
            _ => fixed_length(opcode).ok_or(ClassFormatError::InvalidBytecode { offset: pc })?,
        };
        match opcode {
            LDC => {
                let index = *code.get(pc + 1).ok_or(ClassFormatError::UnexpectedEof)?;
                operands.push(index as u16);
            }
            LDC_W | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF | MULTIANEWARRAY => {
                operands.push(read_u16(code, pc + 1)?);
            }
            _ => {}
        }
        pc += length;
    }
    if pc != code.len() {
        return Err(ClassFormatError::UnexpectedEof);
    }
    Ok(operands)
}
