//! Memory handling for the SIC-1 emulator.
//!
//! SIC-1 has 256 bytes of memory, addressed by a single byte.
//! User memory is `0..=@MAX`; the remaining three addresses are
//! memory-mapped (`@IN`, `@OUT`, `@HALT`) and are handled by the emulator.

use crate::asm::Program;

/// Number of bytes of memory.
pub const MEMORY_SIZE: usize = 256;

/// The emulator's memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory(Box<[u8; MEMORY_SIZE]>);

impl Memory {
    /// Creates zeroed memory.
    pub fn new() -> Self {
        Memory(Box::new([0; MEMORY_SIZE]))
    }

    /// Creates memory holding the program image at address 0.
    pub fn with_program(program: &Program) -> Self {
        let mut mem = Self::new();
        let bytes = program.bytes();
        mem.0[..bytes.len()].copy_from_slice(bytes);
        mem
    }

    /// Gets an immutable reference to the memory.
    pub fn as_slice(&self) -> &[u8] {
        &*self.0
    }
}
impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
impl std::ops::Index<u8> for Memory {
    type Output = u8;

    fn index(&self, index: u8) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<u8> for Memory {
    fn index_mut(&mut self, index: u8) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}
impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero bytes, since most of memory is usually empty.
        f.debug_map()
            .entries(self.0.iter().enumerate().filter(|(_, &b)| b != 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::assemble;

    use super::Memory;

    #[test]
    fn test_with_program() {
        let program = assemble(&["subleq 3 4 5", ".data 9"]).unwrap();
        let mem = Memory::with_program(&program);

        assert_eq!(&mem.as_slice()[..5], &[3, 4, 5, 9, 0]);
        assert_eq!(mem[3], 9);
        assert!(mem.as_slice()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_index_mut() {
        let mut mem = Memory::new();
        mem[255] = 1;
        mem[0] = 2;
        assert_eq!(mem[255], 1);
        assert_eq!(mem.as_slice()[0], 2);
    }
}
