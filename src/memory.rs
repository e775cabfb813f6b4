use std::{fs, path::Path};

use crate::error::{Fault, LoadError};

pub type TypeAddr = u16; // in reality u12

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: TypeAddr = 0x200;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;
pub const FONT_START: TypeAddr = 0x50;
pub const GLYPH_HEIGHT: u16 = 5;

type FontBytes = [u8; GLYPH_HEIGHT as usize * 16];

const DEFAULT_FONT: FontBytes = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Address of the built-in glyph for the low nibble of `digit`.
pub fn glyph_addr(digit: u8) -> TypeAddr {
    FONT_START + (digit & 0xF) as u16 * GLYPH_HEIGHT
}

pub struct Memory {
    // 4k bytes
    // font data stored from 050 -> 09F (000 -> 04F is empty by convention)
    bytes: [u8; MEMORY_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        let mut bytes = [0; MEMORY_SIZE];
        let start = FONT_START as usize;
        bytes[start..start + DEFAULT_FONT.len()].copy_from_slice(&DEFAULT_FONT);
        Self { bytes }
    }

    fn range(addr: TypeAddr, len: usize) -> Result<std::ops::Range<usize>, Fault> {
        let start = addr as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            return Err(Fault::AddressOutOfBounds {
                addr: start.max(MEMORY_SIZE) as u32,
            });
        }
        Ok(start..end)
    }

    pub fn get(&self, addr: TypeAddr) -> Result<u8, Fault> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(Fault::AddressOutOfBounds { addr: addr as u32 })
    }

    pub fn set(&mut self, addr: TypeAddr, val: u8) -> Result<(), Fault> {
        let byte = self
            .bytes
            .get_mut(addr as usize)
            .ok_or(Fault::AddressOutOfBounds { addr: addr as u32 })?;
        *byte = val;
        Ok(())
    }

    pub fn slice(&self, addr: TypeAddr, len: usize) -> Result<&[u8], Fault> {
        Ok(&self.bytes[Self::range(addr, len)?])
    }

    pub fn slice_mut(&mut self, addr: TypeAddr, len: usize) -> Result<&mut [u8], Fault> {
        Ok(&mut self.bytes[Self::range(addr, len)?])
    }

    /// Big-endian instruction word at `pc`.
    pub fn instruction_at(&self, pc: TypeAddr) -> Result<u16, Fault> {
        let (l, r) = match self.slice(pc, 2) {
            Ok(&[l, r]) => (l, r),
            _ => return Err(Fault::ProgramCounterOutOfBounds(pc)),
        };
        Ok(((l as u16) << 8) | r as u16)
    }

    /// Copies a program image to 0x200, zeroing whatever a previous image
    /// left behind.
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        if bytes.is_empty() {
            return Err(LoadError::Empty);
        }
        if bytes.len() > MAX_ROM_SIZE {
            return Err(LoadError::TooLarge {
                len: bytes.len(),
                max: MAX_ROM_SIZE,
            });
        }

        let start_index = PROGRAM_START as usize;
        self.bytes[start_index..].fill(0);
        self.bytes[start_index..start_index + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_rom_file(path: impl AsRef<Path>) -> Result<Vec<u8>, LoadError> {
        let path = path.as_ref();
        fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
