use std::io::Write;

use crate::plat::{InstrFormat, Instruction, Opcode, INITIAL_SP, REGISTER_COUNT};

use super::{
    alu::{self, AluMode},
    ram::Ram,
    registers::{Fl, Registers},
    EResult, EmuError,
};

/// The emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuState {
    /// The emulator is allowed to run.
    Continue,
    /// Execution has stopped, either through `HLT` or a fatal error. This state is final.
    Halt,
}

/// The main emulation context for the LS-8.
///
/// Owns every piece of machine state for the duration of a run. Values written by `PRN` go to
/// `output`.
pub struct Emulator<W: Write> {
    /// General purpose registers `R0` - `R7`.
    pub registers: Registers,
    /// Main memory.
    pub ram: Ram,
    /// Flags set by the last `CMP`.
    pub fl: Fl,
    /// Address of the next instruction.
    pub pc: usize,
    /// Stack pointer. The stack grows down from [`INITIAL_SP`].
    pub sp: u8,
    /// Whether the emulator may keep running.
    pub state: EmuState,
    steps: u64,
    output: W,
}

impl<W: Write> Emulator<W> {
    /// Loads a binary program into a new [Emulator] instance.
    ///
    /// # Errors
    ///
    /// This function will return an error if the program doesn't fit in memory.
    pub fn new(program: &[u8], output: W) -> EResult<Self> {
        let mut ram = Ram::new();
        ram.load(program)?;
        Ok(Self {
            registers: Registers::new(),
            ram,
            fl: Fl::empty(),
            pc: 0,
            sp: INITIAL_SP,
            state: EmuState::Continue,
            steps: 0,
            output,
        })
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Gives back the output stream, consuming the emulator.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the emulator, stepping through instructions until it reaches a halt state.
    ///
    /// # Errors
    ///
    /// This function will return the first fatal error encountered. The emulator is left
    /// halted with PC pointing at the offending instruction.
    pub fn run_until_halt(&mut self) -> EResult<()> {
        while self.state == EmuState::Continue {
            self.step()?;
        }
        self.output.flush().map_err(EmuError::Output)?;
        log::info!("halted after {} instructions", self.steps);
        Ok(())
    }

    /// Fetches, decodes and executes a single instruction.
    pub fn step(&mut self) -> EResult<()> {
        if self.state == EmuState::Halt {
            return Ok(());
        }
        let res = self.cycle();
        if res.is_err() {
            self.state = EmuState::Halt;
        }
        res
    }

    fn cycle(&mut self) -> EResult<()> {
        self.trace();
        let instr = self.decode()?;
        log::debug!("[{:02X}] >>> {}", self.pc, instr);
        self.execute(instr)?;
        self.steps += 1;
        Ok(())
    }

    /// Decodes the instruction at PC.
    pub fn decode(&self) -> EResult<Instruction> {
        let address = self.pc;
        let opcode = self.ram.read(address)?;
        let op = Opcode::try_from(opcode)
            .map_err(|_| EmuError::UnknownInstruction { opcode, address })?;
        let mut operands = [0u8; 2];
        let operands = &mut operands[..op.operand_count()];
        for (i, operand) in operands.iter_mut().enumerate() {
            *operand = self.ram.read(address + 1 + i)?;
        }
        Instruction::new(op, operands)
            .map_err(|_| EmuError::UnsupportedOperation(op.to_string()))
    }

    fn execute(&mut self, instr: Instruction) -> EResult<()> {
        match (instr.op, instr.format) {
            (Opcode::Ldi, InstrFormat::RI(reg, imm)) => self.registers.set(reg, imm)?,
            (Opcode::Prn, InstrFormat::R(reg)) => {
                let value = self.registers.get(reg)?;
                writeln!(self.output, "{}", value).map_err(EmuError::Output)?;
            }
            (Opcode::Hlt, InstrFormat::OpOnly) => self.state = EmuState::Halt,
            (op, InstrFormat::RR(a, b)) if op.is_alu() => self.alu_op(op, a, b)?,
            (Opcode::Push, InstrFormat::R(reg)) => {
                let value = self.registers.get(reg)?;
                self.push(value)?;
            }
            (Opcode::Pop, InstrFormat::R(reg)) => {
                let value = self.pop()?;
                self.registers.set(reg, value)?;
            }
            (Opcode::Call, InstrFormat::R(reg)) => {
                let target = self.registers.get(reg)?;
                let ret = self.pc + instr.op.len();
                let ret = u8::try_from(ret).map_err(|_| EmuError::OutOfBounds { address: ret })?;
                self.push(ret)?;
                self.pc = target as usize;
            }
            (Opcode::Ret, InstrFormat::OpOnly) => self.pc = self.pop()? as usize,
            (Opcode::Jmp, InstrFormat::R(reg)) => self.jump_if(true, reg)?,
            (Opcode::Jeq, InstrFormat::R(reg)) => self.jump_if(self.fl.equal(), reg)?,
            (Opcode::Jne, InstrFormat::R(reg)) => self.jump_if(!self.fl.equal(), reg)?,
            _ => return Err(EmuError::UnsupportedOperation(instr.to_string())),
        }
        if !instr.op.sets_pc() {
            self.pc += instr.op.len();
        }
        Ok(())
    }

    fn alu_op(&mut self, op: Opcode, a: u8, b: u8) -> EResult<()> {
        let mode = AluMode::try_from(op)?;
        let out = alu::apply(mode, self.registers.get(a)?, self.registers.get(b)?);
        if let Some(result) = out.result {
            self.registers.set(a, result)?;
        }
        if let Some(flags) = out.flags {
            self.fl = flags;
        }
        Ok(())
    }

    fn jump_if(&mut self, cond: bool, reg: u8) -> EResult<()> {
        if cond {
            self.pc = self.registers.get(reg)? as usize;
        } else {
            self.pc += 2;
        }
        Ok(())
    }

    fn push(&mut self, value: u8) -> EResult<()> {
        self.sp = self
            .sp
            .checked_sub(1)
            .ok_or(EmuError::StackOverflow { sp: self.sp })?;
        self.ram.write(self.sp as usize, value)
    }

    fn pop(&mut self) -> EResult<u8> {
        let value = self.ram.read(self.sp as usize)?;
        self.sp = self
            .sp
            .checked_add(1)
            .ok_or(EmuError::StackUnderflow { sp: self.sp })?;
        Ok(value)
    }

    /// Dumps the machine state at trace level.
    fn trace(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        let mem = |addr: usize| {
            self.ram
                .memory
                .get(addr)
                .map_or_else(|| "--".to_owned(), |b| format!("{:02X}", b))
        };
        let mut line = format!(
            "TRACE: {:02X} | {} {} {} | FL={:03b} SP={:02X} |",
            self.pc,
            mem(self.pc),
            mem(self.pc + 1),
            mem(self.pc + 2),
            self.fl.bits(),
            self.sp,
        );
        for reg in 0..REGISTER_COUNT {
            line.push_str(&format!(" {:02X}", self.registers.values()[reg]));
        }
        log::trace!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(listing: &[(Opcode, &[u8])]) -> Vec<u8> {
        listing
            .iter()
            .flat_map(|(op, operands)| {
                Instruction::new(*op, operands)
                    .unwrap()
                    .to_bytes()
                    .unwrap()
            })
            .collect()
    }

    fn run(program: &[u8]) -> (Emulator<Vec<u8>>, EResult<()>) {
        let mut emu = Emulator::new(program, Vec::new()).unwrap();
        let res = emu.run_until_halt();
        (emu, res)
    }

    fn output(emu: Emulator<Vec<u8>>) -> String {
        String::from_utf8(emu.into_output()).unwrap()
    }

    #[test]
    fn test_print8() {
        let program = [
            0b10000010, 0b00000000, 0b00001000, 0b01000111, 0b00000000, 0b00000001,
        ];
        let (emu, res) = run(&program);
        res.unwrap();
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.steps(), 3);
        assert_eq!(output(emu), "8\n");
    }

    #[test]
    fn test_ldi_every_register() {
        for reg in 0..REGISTER_COUNT as u8 {
            for value in [0u8, 1, 0x7F, 0xFF] {
                let program = assemble(&[(Opcode::Ldi, &[reg, value]), (Opcode::Hlt, &[])]);
                let (emu, res) = run(&program);
                res.unwrap();
                assert_eq!(emu.registers.get(reg).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_add_and_mul_wrap() {
        let program = assemble(&[
            (Opcode::Ldi, &[0, 200]),
            (Opcode::Ldi, &[1, 100]),
            (Opcode::Add, &[0, 1]),
            (Opcode::Ldi, &[2, 16]),
            (Opcode::Ldi, &[3, 17]),
            (Opcode::Mul, &[2, 3]),
            (Opcode::Hlt, &[]),
        ]);
        let (emu, res) = run(&program);
        res.unwrap();
        assert_eq!(emu.registers.get(0).unwrap(), 44);
        assert_eq!(emu.registers.get(1).unwrap(), 100);
        assert_eq!(emu.registers.get(2).unwrap(), 16);
        assert_eq!(emu.registers.get(3).unwrap(), 17);
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let program = assemble(&[
            (Opcode::Ldi, &[0, 42]),
            (Opcode::Push, &[0]),
            (Opcode::Ldi, &[0, 0]),
            (Opcode::Pop, &[0]),
            (Opcode::Hlt, &[]),
        ]);
        let mut emu = Emulator::new(&program, Vec::new()).unwrap();
        emu.step().unwrap();
        emu.step().unwrap();
        assert_eq!(emu.sp, INITIAL_SP - 1);
        assert_eq!(emu.ram.read(emu.sp as usize).unwrap(), 42);
        emu.run_until_halt().unwrap();
        assert_eq!(emu.registers.get(0).unwrap(), 42);
        assert_eq!(emu.sp, INITIAL_SP);
    }

    #[test]
    fn test_call_ret() {
        let program = assemble(&[
            (Opcode::Ldi, &[1, 8]),
            (Opcode::Call, &[1]),
            (Opcode::Prn, &[0]),
            (Opcode::Hlt, &[]),
            // subroutine at address 8
            (Opcode::Ldi, &[0, 99]),
            (Opcode::Ret, &[]),
        ]);
        let mut emu = Emulator::new(&program, Vec::new()).unwrap();
        emu.step().unwrap();
        emu.step().unwrap();
        assert_eq!(emu.pc, 8);
        assert_eq!(emu.sp, INITIAL_SP - 1);
        assert_eq!(emu.ram.read(emu.sp as usize).unwrap(), 5);
        emu.step().unwrap();
        emu.step().unwrap();
        assert_eq!(emu.pc, 5);
        assert_eq!(emu.sp, INITIAL_SP);
        emu.run_until_halt().unwrap();
        assert_eq!(output(emu), "99\n");
    }

    #[test]
    fn test_jmp() {
        let program = assemble(&[
            (Opcode::Ldi, &[2, 7]),
            (Opcode::Jmp, &[2]),
            (Opcode::Prn, &[2]),
            (Opcode::Hlt, &[]),
        ]);
        let (emu, res) = run(&program);
        res.unwrap();
        assert_eq!(emu.pc, 8);
        assert_eq!(output(emu), "");
    }

    fn conditional_jump(op: Opcode, right: u8) -> String {
        let program = assemble(&[
            (Opcode::Ldi, &[0, 5]),
            (Opcode::Ldi, &[1, right]),
            (Opcode::Ldi, &[2, 16]),
            (Opcode::Cmp, &[0, 1]),
            (op, &[2]),
            (Opcode::Prn, &[1]),
            // jump target at address 16
            (Opcode::Prn, &[0]),
            (Opcode::Hlt, &[]),
        ]);
        let (emu, res) = run(&program);
        res.unwrap();
        output(emu)
    }

    #[test]
    fn test_jeq_jne_follow_equal_flag() {
        assert_eq!(conditional_jump(Opcode::Jeq, 5), "5\n");
        assert_eq!(conditional_jump(Opcode::Jeq, 6), "6\n5\n");
        assert_eq!(conditional_jump(Opcode::Jne, 5), "5\n5\n");
        assert_eq!(conditional_jump(Opcode::Jne, 6), "5\n");
    }

    #[test]
    fn test_cmp_flags() {
        let program = assemble(&[
            (Opcode::Ldi, &[0, 3]),
            (Opcode::Ldi, &[1, 9]),
            (Opcode::Cmp, &[0, 1]),
            (Opcode::Hlt, &[]),
        ]);
        let (emu, res) = run(&program);
        res.unwrap();
        assert_eq!(emu.fl, Fl::LESS);
        assert_eq!(emu.registers.get(0).unwrap(), 3);
    }

    #[test]
    fn test_unknown_instruction() {
        let mut program = assemble(&[(Opcode::Ldi, &[0, 1]), (Opcode::Prn, &[0])]);
        program.push(0xFF);
        let (emu, res) = run(&program);
        assert!(matches!(
            res,
            Err(EmuError::UnknownInstruction {
                opcode: 0xFF,
                address: 5
            })
        ));
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.pc, 5);
        assert_eq!(output(emu), "1\n");
    }

    #[test]
    fn test_pc_leaves_memory() {
        let mut program = vec![0u8; 256];
        let jump = assemble(&[(Opcode::Ldi, &[0, 0xFF]), (Opcode::Jmp, &[0])]);
        program[..jump.len()].copy_from_slice(&jump);
        program[0xFF] = Opcode::Prn as u8;
        let (_, res) = run(&program);
        assert!(matches!(res, Err(EmuError::OutOfBounds { address: 256 })));
    }

    #[test]
    fn test_invalid_register() {
        let program = assemble(&[(Opcode::Ldi, &[8, 1]), (Opcode::Hlt, &[])]);
        let (emu, res) = run(&program);
        assert!(matches!(res, Err(EmuError::InvalidRegister(8))));
        assert_eq!(emu.steps(), 0);
    }

    #[test]
    fn test_stack_overflow() {
        let program = assemble(&[(Opcode::Push, &[0]), (Opcode::Hlt, &[])]);
        let mut emu = Emulator::new(&program, Vec::new()).unwrap();
        emu.sp = 0;
        assert!(matches!(
            emu.run_until_halt(),
            Err(EmuError::StackOverflow { sp: 0 })
        ));
    }

    #[test]
    fn test_stack_underflow() {
        let program = assemble(&[(Opcode::Pop, &[0]), (Opcode::Hlt, &[])]);
        let mut emu = Emulator::new(&program, Vec::new()).unwrap();
        emu.sp = 0xFF;
        assert!(matches!(
            emu.run_until_halt(),
            Err(EmuError::StackUnderflow { sp: 0xFF })
        ));
        assert_eq!(emu.registers.get(0).unwrap(), 0);
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.pc, 0);
    }

    #[test]
    fn test_ret_underflow() {
        let program = assemble(&[(Opcode::Ret, &[])]);
        let mut emu = Emulator::new(&program, Vec::new()).unwrap();
        emu.sp = 0xFF;
        assert!(matches!(
            emu.step(),
            Err(EmuError::StackUnderflow { sp: 0xFF })
        ));
        assert_eq!(emu.state, EmuState::Halt);
    }

    #[test]
    fn test_call_return_address_out_of_range() {
        let mut program = vec![0u8; 256];
        let jump = assemble(&[(Opcode::Ldi, &[0, 254]), (Opcode::Jmp, &[0])]);
        program[..jump.len()].copy_from_slice(&jump);
        program[254] = Opcode::Call as u8;
        program[255] = 0;
        let (emu, res) = run(&program);
        assert!(matches!(res, Err(EmuError::OutOfBounds { address: 256 })));
        assert_eq!(emu.sp, INITIAL_SP);
        assert_eq!(emu.pc, 254);
        assert_eq!(emu.state, EmuState::Halt);
    }

    #[test]
    fn test_mismatched_format_is_unsupported() {
        let mut emu = Emulator::new(&[], Vec::new()).unwrap();
        let bad = Instruction {
            op: Opcode::Add,
            format: InstrFormat::R(0),
        };
        assert!(matches!(
            emu.execute(bad),
            Err(EmuError::UnsupportedOperation(text)) if text == "ADD R0"
        ));
        assert_eq!(emu.pc, 0);
    }

    #[test]
    fn test_step_after_halt_is_noop() {
        let program = assemble(&[(Opcode::Hlt, &[])]);
        let (mut emu, res) = run(&program);
        res.unwrap();
        let pc = emu.pc;
        emu.step().unwrap();
        assert_eq!(emu.pc, pc);
        assert_eq!(emu.steps(), 1);
    }
}
