use crate::plat::{INITIAL_SP, REGISTER_COUNT, SP_REGISTER};

use super::{EResult, EmuError};

bitflags::bitflags! {
    /// The CPU status flags register, laid out as `00000LGE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Fl: u8 {
        /// Set if the last comparison found its operands equal.
        const EQUAL = 1 << 0;
        /// Set if the last comparison found the left operand greater.
        const GREATER = 1 << 1;
        /// Set if the last comparison found the left operand less.
        const LESS = 1 << 2;
    }
}

impl Fl {
    /// Whether the last comparison found its operands equal.
    pub fn equal(self) -> bool {
        self.contains(Self::EQUAL)
    }

    /// Whether the left operand of the last comparison was less.
    pub fn less_than(self) -> bool {
        self.contains(Self::LESS)
    }

    /// Whether the left operand of the last comparison was greater.
    pub fn greater_than(self) -> bool {
        self.contains(Self::GREATER)
    }
}

/// The eight general purpose registers, `R0` - `R7`.
///
/// `R7` starts out holding the initial stack pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    regs: [u8; REGISTER_COUNT],
}

impl Registers {
    /// Creates a zeroed register file with `R7` holding [`INITIAL_SP`].
    pub fn new() -> Self {
        let mut regs = [0u8; REGISTER_COUNT];
        regs[SP_REGISTER as usize] = INITIAL_SP;
        Self { regs }
    }

    /// Reads register `reg`.
    pub fn get(&self, reg: u8) -> EResult<u8> {
        self.regs
            .get(reg as usize)
            .copied()
            .ok_or(EmuError::InvalidRegister(reg))
    }

    /// Writes `value` to register `reg`.
    pub fn set(&mut self, reg: u8, value: u8) -> EResult<()> {
        let slot = self
            .regs
            .get_mut(reg as usize)
            .ok_or(EmuError::InvalidRegister(reg))?;
        *slot = value;
        Ok(())
    }

    /// All register values, in order.
    pub fn values(&self) -> &[u8; REGISTER_COUNT] {
        &self.regs
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
