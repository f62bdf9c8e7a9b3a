use crate::plat::MEMORY_SIZE;

use super::{EResult, EmuError};

/// The LS-8's main memory.
pub struct Ram {
    /// The raw memory cells, [`MEMORY_SIZE`] of them.
    pub memory: Box<[u8]>,
}

impl Ram {
    /// Creates a new [`Ram`] instance, allocating and initializing its memory to [0u8; 256].
    pub fn new() -> Self {
        Self {
            memory: vec![0u8; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Reads the byte at `address`.
    pub fn read(&self, address: usize) -> EResult<u8> {
        self.memory
            .get(address)
            .copied()
            .ok_or(EmuError::OutOfBounds { address })
    }

    /// Writes `value` to `address`.
    pub fn write(&mut self, address: usize, value: u8) -> EResult<()> {
        let cell = self
            .memory
            .get_mut(address)
            .ok_or(EmuError::OutOfBounds { address })?;
        *cell = value;
        Ok(())
    }

    /// Copies `program` into memory starting at address 0.
    ///
    /// # Errors
    ///
    /// This function will return an error if the program doesn't fit in memory.
    pub fn load(&mut self, program: &[u8]) -> EResult<()> {
        if program.len() > self.memory.len() {
            return Err(EmuError::OutOfBounds {
                address: program.len() - 1,
            });
        }
        self.memory[..program.len()].copy_from_slice(program);
        Ok(())
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}
