use crate::{
    error::Fault,
    memory::{TypeAddr, PROGRAM_START},
};

pub const REGISTER_COUNT: usize = 16;
pub const STACK_SIZE: usize = 16;
pub const FLAG: u8 = 0xF;

/// V0..VF plus the special-purpose registers.
pub struct Registers {
    registers: [u8; REGISTER_COUNT],
    pub pc: ProgramCounter,
    pub index: IndexRegister,
    pub stack: Stack,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    pub fn new() -> Self {
        Self {
            registers: [0; REGISTER_COUNT],
            pc: ProgramCounter(PROGRAM_START),
            index: IndexRegister(0),
            stack: Stack::new(),
        }
    }

    // register indices come from a nibble, so masking never changes a valid index
    pub fn set_register(&mut self, reg_num: u8, value: u8) {
        self.registers[(reg_num & 0xF) as usize] = value;
    }

    /// 7XNN semantics: wraps, VF untouched.
    pub fn add_to_register(&mut self, reg_num: u8, value: u8) {
        let total = self.get(reg_num).wrapping_add(value);
        self.set_register(reg_num, total);
    }

    pub fn get(&self, reg_num: u8) -> u8 {
        self.registers[(reg_num & 0xF) as usize]
    }

    pub fn set_flag(&mut self, set: bool) {
        self.set_register(FLAG, set as u8);
    }

    /// V0..=Vx
    pub fn range(&self, last: u8) -> &[u8] {
        &self.registers[..=(last & 0xF) as usize]
    }

    pub fn range_mut(&mut self, last: u8) -> &mut [u8] {
        &mut self.registers[..=(last & 0xF) as usize]
    }

    pub fn all(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }
}

// Special registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter(pub TypeAddr);

impl ProgramCounter {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(2);
    }

    pub fn skip(&mut self) {
        self.0 = self.0.wrapping_add(4);
    }

    pub fn set_addr(&mut self, addr: TypeAddr) {
        self.0 = addr;
    }

    /// Address of the instruction after the current one.
    pub fn next(&self) -> TypeAddr {
        self.0.wrapping_add(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRegister(pub TypeAddr);

impl IndexRegister {
    pub fn set_addr(&mut self, addr: TypeAddr) {
        self.0 = addr;
    }

    /// Moves I forward by `by`. Running off the top of the 16-bit range is a
    /// fault and leaves I unchanged.
    pub fn advance(&mut self, by: u16) -> Result<(), Fault> {
        self.0 = self
            .0
            .checked_add(by)
            .ok_or(Fault::AddressOutOfBounds {
                addr: self.0 as u32 + by as u32,
            })?;
        Ok(())
    }
}

/// Return addresses for nested calls, at most `STACK_SIZE` deep.
pub struct Stack {
    addresses: [TypeAddr; STACK_SIZE],
    sp: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Self {
            addresses: [0; STACK_SIZE],
            sp: 0,
        }
    }

    /// `pc` is only used to describe the fault.
    pub fn push(&mut self, addr: TypeAddr, pc: TypeAddr) -> Result<(), Fault> {
        let slot = self
            .addresses
            .get_mut(self.sp)
            .ok_or(Fault::StackOverflow { pc })?;
        *slot = addr;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self, pc: TypeAddr) -> Result<TypeAddr, Fault> {
        if self.sp == 0 {
            return Err(Fault::StackUnderflow { pc });
        }
        self.sp -= 1;
        Ok(self.addresses[self.sp])
    }

    pub fn depth(&self) -> usize {
        self.sp
    }

    /// Pending return addresses, oldest first.
    pub fn frames(&self) -> &[TypeAddr] {
        &self.addresses[..self.sp]
    }
}
