//! A CHIP-8 virtual machine core.
//!
//! [`Emulator`] owns the whole machine: 4 KiB of memory with the hex font at
//! 0x050, registers V0..VF (VF doubles as the flag), the I register, a
//! 16-deep call stack, the 64x32 frame and the two 60 Hz timers. The host
//! loads a ROM, writes key state, calls [`Emulator::step`] and polls the frame
//! and buzzer afterwards.

pub mod config;
pub mod decode;
pub mod display;
pub mod emulator;
pub mod error;
pub mod keyboard;
pub mod memory;
pub mod registers;
pub mod timer;

pub use config::{Config, Quirks};
pub use emulator::{Emulator, HaltReason, RunState};
pub use error::{Fault, InputError, LoadError};
