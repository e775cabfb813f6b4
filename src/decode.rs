use std::fmt;

use crate::memory::{TypeAddr, PROGRAM_START};

/// Field view over a 16-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInstruction {
    code: u16,
}

impl RawInstruction {
    pub fn new(code: u16) -> Self {
        RawInstruction { code }
    }

    /// `m` hex digits starting at digit `n`, counted from 1 at the most
    /// significant end.
    pub fn nth_m_digits(&self, n: u8, m: u8) -> u16 {
        let shift_places = (4 - m - (n - 1)) * 4;
        let mask = (1u32 << (m * 4)) - 1;
        (self.code >> shift_places) & mask as u16
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Top nibble, selects the instruction group.
    pub fn group(&self) -> u8 {
        self.nth_m_digits(1, 1) as u8
    }

    /// nnn
    pub fn addr(&self) -> TypeAddr {
        self.nth_m_digits(2, 3)
    }

    pub fn x(&self) -> u8 {
        self.nth_m_digits(2, 1) as u8
    }

    pub fn y(&self) -> u8 {
        self.nth_m_digits(3, 1) as u8
    }

    /// n, the low nibble
    pub fn n(&self) -> u8 {
        self.nth_m_digits(4, 1) as u8
    }

    /// kk, the low byte
    pub fn kk(&self) -> u8 {
        self.nth_m_digits(3, 2) as u8
    }
}

impl PartialEq<u16> for RawInstruction {
    fn eq(&self, ins: &u16) -> bool {
        ins.eq(&self.code)
    }
}

/// A decoded instruction word. Register operands are nibble indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Cls,                 // 00E0
    Return,              // 00EE
    Sys(TypeAddr),       // 0nnn, no-op
    Jump(TypeAddr),      // 1nnn
    Call(TypeAddr),      // 2nnn
    SkipEqImm(u8, u8),   // 3xkk
    SkipNeImm(u8, u8),   // 4xkk
    SkipEqReg(u8, u8),   // 5xy_
    LoadImm(u8, u8),     // 6xkk
    AddImm(u8, u8),      // 7xkk, VF untouched
    Move(u8, u8),        // 8xy0
    Or(u8, u8),          // 8xy1
    And(u8, u8),         // 8xy2
    Xor(u8, u8),         // 8xy3
    AddReg(u8, u8),      // 8xy4, VF = carry
    Sub(u8, u8),         // 8xy5, VF = no borrow
    ShiftRight(u8, u8),  // 8xy6
    SubNeg(u8, u8),      // 8xy7, Vx = Vy - Vx
    ShiftLeft(u8, u8),   // 8xyE
    SkipNeReg(u8, u8),   // 9xy_
    LoadIndex(TypeAddr), // Annn
    JumpOffset(TypeAddr), // Bnnn
    Random(u8, u8),      // Cxkk
    /// Dxyn: XOR an n-row sprite from I at (Vx, Vy), VF = collision.
    Draw(u8, u8, u8),
    SkipKeyDown(u8),     // Ex9E
    SkipKeyUp(u8),       // ExA1
    ReadDelay(u8),       // Fx07
    WaitKey(u8),         // Fx0A
    SetDelay(u8),        // Fx15
    SetSound(u8),        // Fx18
    AddIndex(u8),        // Fx1E
    LoadGlyph(u8),       // Fx29
    StoreBcd(u8),        // Fx33
    StoreRegs(u8),       // Fx55, V0..=Vx to memory at I
    LoadRegs(u8),        // Fx65
    /// Any word that matches no pattern, kept for reporting.
    Unknown(u16),
}

impl Instruction {
    pub fn decode_raw(ins: u16) -> Self {
        let raw = RawInstruction::new(ins);
        let (x, y, kk, addr) = (raw.x(), raw.y(), raw.kk(), raw.addr());

        match raw.group() {
            0x0 => match ins {
                0x00E0 => Self::Cls,
                0x00EE => Self::Return,
                _ => Self::Sys(addr),
            },
            0x1 => Self::Jump(addr),
            0x2 => Self::Call(addr),
            0x3 => Self::SkipEqImm(x, kk),
            0x4 => Self::SkipNeImm(x, kk),
            0x5 => Self::SkipEqReg(x, y),
            0x6 => Self::LoadImm(x, kk),
            0x7 => Self::AddImm(x, kk),
            0x8 => match raw.n() {
                0x0 => Self::Move(x, y),
                0x1 => Self::Or(x, y),
                0x2 => Self::And(x, y),
                0x3 => Self::Xor(x, y),
                0x4 => Self::AddReg(x, y),
                0x5 => Self::Sub(x, y),
                0x6 => Self::ShiftRight(x, y),
                0x7 => Self::SubNeg(x, y),
                0xE => Self::ShiftLeft(x, y),
                _ => Self::Unknown(ins),
            },
            0x9 => Self::SkipNeReg(x, y),
            0xA => Self::LoadIndex(addr),
            0xB => Self::JumpOffset(addr),
            0xC => Self::Random(x, kk),
            0xD => Self::Draw(x, y, raw.n()),
            0xE => match kk {
                0x9E => Self::SkipKeyDown(x),
                0xA1 => Self::SkipKeyUp(x),
                _ => Self::Unknown(ins),
            },
            0xF => match kk {
                0x07 => Self::ReadDelay(x),
                0x0A => Self::WaitKey(x),
                0x15 => Self::SetDelay(x),
                0x18 => Self::SetSound(x),
                0x1E => Self::AddIndex(x),
                0x29 => Self::LoadGlyph(x),
                0x33 => Self::StoreBcd(x),
                0x55 => Self::StoreRegs(x),
                0x65 => Self::LoadRegs(x),
                _ => Self::Unknown(ins),
            },
            _ => Self::Unknown(ins),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Cls => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Sys(addr) => write!(f, "SYS 0x{addr:03X}"),
            Jump(addr) => write!(f, "JP 0x{addr:03X}"),
            Call(addr) => write!(f, "CALL 0x{addr:03X}"),
            SkipEqImm(x, kk) => write!(f, "SE V{x:X}, 0x{kk:02X}"),
            SkipNeImm(x, kk) => write!(f, "SNE V{x:X}, 0x{kk:02X}"),
            SkipEqReg(x, y) => write!(f, "SE V{x:X}, V{y:X}"),
            SkipNeReg(x, y) => write!(f, "SNE V{x:X}, V{y:X}"),
            LoadImm(x, kk) => write!(f, "LD V{x:X}, 0x{kk:02X}"),
            AddImm(x, kk) => write!(f, "ADD V{x:X}, 0x{kk:02X}"),
            Move(x, y) => write!(f, "LD V{x:X}, V{y:X}"),
            Or(x, y) => write!(f, "OR V{x:X}, V{y:X}"),
            And(x, y) => write!(f, "AND V{x:X}, V{y:X}"),
            Xor(x, y) => write!(f, "XOR V{x:X}, V{y:X}"),
            AddReg(x, y) => write!(f, "ADD V{x:X}, V{y:X}"),
            Sub(x, y) => write!(f, "SUB V{x:X}, V{y:X}"),
            ShiftRight(x, y) => write!(f, "SHR V{x:X}, V{y:X}"),
            SubNeg(x, y) => write!(f, "SUBN V{x:X}, V{y:X}"),
            ShiftLeft(x, y) => write!(f, "SHL V{x:X}, V{y:X}"),
            LoadIndex(addr) => write!(f, "LD I, 0x{addr:03X}"),
            JumpOffset(addr) => write!(f, "JP V0, 0x{addr:03X}"),
            Random(x, kk) => write!(f, "RND V{x:X}, 0x{kk:02X}"),
            Draw(x, y, n) => write!(f, "DRW V{x:X}, V{y:X}, {n}"),
            SkipKeyDown(x) => write!(f, "SKP V{x:X}"),
            SkipKeyUp(x) => write!(f, "SKNP V{x:X}"),
            ReadDelay(x) => write!(f, "LD V{x:X}, DT"),
            WaitKey(x) => write!(f, "LD V{x:X}, K"),
            SetDelay(x) => write!(f, "LD DT, V{x:X}"),
            SetSound(x) => write!(f, "LD ST, V{x:X}"),
            AddIndex(x) => write!(f, "ADD I, V{x:X}"),
            LoadGlyph(x) => write!(f, "LD F, V{x:X}"),
            StoreBcd(x) => write!(f, "LD B, V{x:X}"),
            StoreRegs(x) => write!(f, "LD [I], V{x:X}"),
            LoadRegs(x) => write!(f, "LD V{x:X}, [I]"),
            Unknown(word) => write!(f, "DW 0x{word:04X}"),
        }
    }
}

/// Decodes a ROM image word by word as it would sit in memory from 0x200.
///
/// Data embedded in the program (sprites, tables) decodes too; a trailing odd
/// byte is treated as the high byte of a word.
pub fn disassemble(rom: &[u8]) -> impl Iterator<Item = (TypeAddr, u16, Instruction)> + '_ {
    rom.chunks(2).enumerate().map(|(i, pair)| {
        let word = match *pair {
            [hi, lo] => u16::from_be_bytes([hi, lo]),
            [hi] => (hi as u16) << 8,
            _ => 0,
        };
        let addr = PROGRAM_START.wrapping_add((i * 2) as u16);
        (addr, word, Instruction::decode_raw(word))
    })
}
