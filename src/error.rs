use std::{io, path::PathBuf};

use thiserror::Error;

use crate::memory::TypeAddr;

/// Conditions that stop the machine mid-program.
///
/// Every fault is detected before the faulting instruction touches any state,
/// and the timer tick of the faulting step is rolled back, so the machine is
/// left exactly as it was after the previous step.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("stack overflow: call at {pc:#05x} exceeds 16 nested levels")]
    StackOverflow { pc: TypeAddr },
    #[error("stack underflow: return at {pc:#05x} with no pending call")]
    StackUnderflow { pc: TypeAddr },
    #[error("memory access at {addr:#06x} is past the end of memory")]
    AddressOutOfBounds { addr: u32 },
    #[error("program counter {0:#06x} is past the end of memory")]
    ProgramCounterOutOfBounds(TypeAddr),
    /// Only raised with strict opcode checking.
    #[error("program counter {0:#05x} is not on an instruction boundary")]
    MisalignedProgramCounter(TypeAddr),
    #[error("unknown instruction {word:#06x} at {pc:#05x}")]
    UnknownInstruction { word: u16, pc: TypeAddr },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read rom {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rom is {len} bytes but only {max} fit above 0x200")]
    TooLarge { len: usize, max: usize },
    #[error("rom is empty")]
    Empty,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("key index {0:#x} is out of range 0x0..=0xF")]
    InvalidKey(u8),
}
