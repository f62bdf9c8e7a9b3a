//! Common platform code between the LS-8's other modules.

use std::fmt;

use thiserror::Error;

/// Number of addressable bytes of memory.
pub const MEMORY_SIZE: usize = 256;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// The register conventionally holding the stack pointer.
pub const SP_REGISTER: u8 = 7;

/// Initial value of the stack pointer (and of [`SP_REGISTER`]).
pub const INITIAL_SP: u8 = 0xF4;

/// An error for the core platform of the LS-8.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlatformError {
    /// The byte isn't one of the LS-8's opcodes.
    #[error("invalid opcode {0:#010b}")]
    InvalidOpcode(u8),
    /// The operands don't match the opcode's format.
    #[error("invalid instruction")]
    InvalidInstruction,
}

/// Type alias for Result<T, [PlatformError]>.
pub type PResult<T> = Result<T, PlatformError>;

/// The opcodes understood by the LS-8.
///
/// Opcode bytes are laid out as `AABCDDDD`:
///
/// - `AA` is the number of operand bytes following the opcode (0-2).
/// - `B` is set if the instruction is handled by the ALU.
/// - `C` is set if the instruction sets the PC itself.
/// - `DDDD` identifies the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /* Misc */
    /// `regA <- (immediate value)`
    Ldi = 0b1000_0010,
    /// Writes `regA` in decimal to the output stream.
    Prn = 0b0100_0111,
    /// Stops execution.
    Hlt = 0b0000_0001,

    /* ALU */
    /// `regA <- regA * regB`
    Mul = 0b1010_0010,
    /// `regA <- regA + regB`
    Add = 0b1010_0000,
    /// Compares `regA` with `regB`, setting the flags.
    Cmp = 0b1010_0111,

    /* Stack */
    /// ```text
    /// SP <- SP - 1
    /// mem[SP] <- regA
    /// ```
    Push = 0b0100_0101,
    /// ```text
    /// regA <- mem[SP]
    /// SP <- SP + 1
    /// ```
    Pop = 0b0100_0110,

    /* Branching */
    /// Pushes the address of the next instruction, then `PC <- regA`.
    Call = 0b0101_0000,
    /// Pops the return address into `PC`.
    Ret = 0b0001_0001,
    /// `PC <- regA`
    Jmp = 0b0101_0100,
    /// "Jump if Equal"
    /// ```text
    /// if FL.E == 1 {
    ///     PC <- regA
    /// }
    /// ```
    Jeq = 0b0101_0101,
    /// "Jump if Not Equal"
    /// ```text
    /// if FL.E == 0 {
    ///     PC <- regA
    /// }
    /// ```
    Jne = 0b0101_0110,
}

impl Opcode {
    /// Number of operand bytes following the opcode.
    pub fn operand_count(self) -> usize {
        (self as u8 >> 6) as usize
    }

    /// Length of the whole instruction in bytes, including the opcode.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> usize {
        1 + self.operand_count()
    }

    /// Whether this instruction is carried out by the ALU.
    pub fn is_alu(self) -> bool {
        self as u8 & 0b0010_0000 != 0
    }

    /// Whether this instruction sets the PC itself instead of letting it advance.
    pub fn sets_pc(self) -> bool {
        self as u8 & 0b0001_0000 != 0
    }

    /// The assembly name of this opcode, e.g. `LDI`.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Ldi => "LDI",
            Self::Prn => "PRN",
            Self::Hlt => "HLT",
            Self::Mul => "MUL",
            Self::Add => "ADD",
            Self::Cmp => "CMP",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Jmp => "JMP",
            Self::Jeq => "JEQ",
            Self::Jne => "JNE",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = PlatformError;

    fn try_from(value: u8) -> Result<Self, PlatformError> {
        match value {
            0b1000_0010 => Ok(Self::Ldi),
            0b0100_0111 => Ok(Self::Prn),
            0b0000_0001 => Ok(Self::Hlt),
            0b1010_0010 => Ok(Self::Mul),
            0b1010_0000 => Ok(Self::Add),
            0b1010_0111 => Ok(Self::Cmp),
            0b0100_0101 => Ok(Self::Push),
            0b0100_0110 => Ok(Self::Pop),
            0b0101_0000 => Ok(Self::Call),
            0b0001_0001 => Ok(Self::Ret),
            0b0101_0100 => Ok(Self::Jmp),
            0b0101_0101 => Ok(Self::Jeq),
            0b0101_0110 => Ok(Self::Jne),
            _ => Err(PlatformError::InvalidOpcode(value)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Instruction formats indicating which operand bytes follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrFormat {
    /// `<Opcode>`
    OpOnly,
    /// `<Opcode, Register>`
    R(u8),
    /// `<Opcode, Register, Register>`
    RR(u8, u8),
    /// `<Opcode, Register, Immediate>`
    RI(u8, u8),
}

/// A decoded LS-8 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// The operation to perform.
    pub op: Opcode,
    /// The operands that followed the opcode.
    pub format: InstrFormat,
}

impl Instruction {
    /// Builds an instruction from an opcode and the operand bytes that followed it.
    ///
    /// # Errors
    ///
    /// This function will return an error if the number of operands doesn't match the opcode.
    pub fn new(op: Opcode, operands: &[u8]) -> PResult<Self> {
        let format = match (op, operands) {
            (_, []) => InstrFormat::OpOnly,
            (_, [a]) => InstrFormat::R(*a),
            (Opcode::Ldi, [a, imm]) => InstrFormat::RI(*a, *imm),
            (_, [a, b]) => InstrFormat::RR(*a, *b),
            _ => return Err(PlatformError::InvalidInstruction),
        };
        let this = Self { op, format };
        this.validate()?;
        Ok(this)
    }

    /// Checks if this instruction has a valid format for its opcode.
    ///
    /// # Errors
    ///
    /// This function will return an error if the instruction's format is invalid for its opcode.
    pub fn validate(self) -> PResult<()> {
        #[doc(hidden)]
        macro_rules! assert_format {
            ($fmt:pat) => {
                if matches!(self.format, $fmt) {
                    Ok(())
                } else {
                    Err(PlatformError::InvalidInstruction)
                }
            };
        }
        match self.op {
            Opcode::Hlt | Opcode::Ret => assert_format!(InstrFormat::OpOnly),
            Opcode::Ldi => assert_format!(InstrFormat::RI(_, _)),
            Opcode::Add | Opcode::Mul | Opcode::Cmp => assert_format!(InstrFormat::RR(_, _)),
            Opcode::Prn
            | Opcode::Push
            | Opcode::Pop
            | Opcode::Call
            | Opcode::Jmp
            | Opcode::Jeq
            | Opcode::Jne => assert_format!(InstrFormat::R(_)),
        }
    }

    /// Generates the machine code for this instruction.
    ///
    /// # Errors
    ///
    /// This function will return an error if the instruction's format is invalid for its opcode.
    pub fn to_bytes(self) -> PResult<Vec<u8>> {
        self.validate()?;
        let mut out = vec![self.op as u8];
        match self.format {
            InstrFormat::OpOnly => {}
            InstrFormat::R(a) => out.push(a),
            InstrFormat::RR(a, b) | InstrFormat::RI(a, b) => out.extend([a, b]),
        }
        Ok(out)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            InstrFormat::OpOnly => write!(f, "{}", self.op),
            InstrFormat::R(a) => write!(f, "{} R{}", self.op, a),
            InstrFormat::RR(a, b) => write!(f, "{} R{}, R{}", self.op, a, b),
            InstrFormat::RI(a, imm) => write!(f, "{} R{}, {}", self.op, a, imm),
        }
    }
}
