//! The emulator module for the LS-8.

use std::io;

use thiserror::Error;

pub mod alu;
pub mod emulator;
pub mod ram;
pub mod registers;

/// A fatal error raised while executing a program.
#[derive(Debug, Error)]
pub enum EmuError {
    /// An address outside of memory was read or written.
    #[error("memory access out of bounds at address {address:#x}")]
    OutOfBounds { address: usize },
    /// An operand named a register that doesn't exist.
    #[error("invalid register: {0}")]
    InvalidRegister(u8),
    /// The byte at PC isn't an opcode.
    #[error("unknown instruction {opcode:#010b} at address {address:#04x}")]
    UnknownInstruction { opcode: u8, address: usize },
    /// An operation was dispatched to a unit that can't perform it.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// A push would move SP below address 0.
    #[error("stack overflow (SP={sp:#04x})")]
    StackOverflow { sp: u8 },
    /// A pop would move SP past the end of memory.
    #[error("stack underflow (SP={sp:#04x})")]
    StackUnderflow { sp: u8 },
    /// Writing to the output stream failed.
    #[error("failed to write output")]
    Output(#[source] io::Error),
}

/// Type alias for Result<T, [EmuError]>.
pub type EResult<T> = Result<T, EmuError>;
