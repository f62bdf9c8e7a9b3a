use std::str::FromStr;

use crate::plat::Opcode;

use super::{registers::Fl, EmuError};

/// The operations the ALU knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluMode {
    /// Wrapping addition.
    Add,
    /// Wrapping multiplication.
    Mul,
    /// Comparison, producing flags only.
    Cmp,
}

/// The outcome of a single ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput {
    /// The value to write back to the destination register, if any.
    pub result: Option<u8>,
    /// The new contents of the flags register, if the operation sets them.
    pub flags: Option<Fl>,
}

impl TryFrom<Opcode> for AluMode {
    type Error = EmuError;

    fn try_from(op: Opcode) -> Result<Self, EmuError> {
        match op {
            Opcode::Add => Ok(Self::Add),
            Opcode::Mul => Ok(Self::Mul),
            Opcode::Cmp => Ok(Self::Cmp),
            _ => Err(EmuError::UnsupportedOperation(op.mnemonic().to_owned())),
        }
    }
}

impl FromStr for AluMode {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self, EmuError> {
        match s {
            "ADD" => Ok(Self::Add),
            "MUL" => Ok(Self::Mul),
            "CMP" => Ok(Self::Cmp),
            _ => Err(EmuError::UnsupportedOperation(s.to_owned())),
        }
    }
}

/// Performs `mode` on the left and right operands. Arithmetic wraps around at 8 bits.
pub fn apply(mode: AluMode, left: u8, right: u8) -> AluOutput {
    match mode {
        AluMode::Add => AluOutput {
            result: Some(left.wrapping_add(right)),
            flags: None,
        },
        AluMode::Mul => AluOutput {
            result: Some(left.wrapping_mul(right)),
            flags: None,
        },
        AluMode::Cmp => {
            let flags = match left.cmp(&right) {
                std::cmp::Ordering::Equal => Fl::EQUAL,
                std::cmp::Ordering::Less => Fl::LESS,
                std::cmp::Ordering::Greater => Fl::GREATER,
            };
            AluOutput {
                result: None,
                flags: Some(flags),
            }
        }
    }
}
