use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::{Config, Quirks},
    decode::Instruction,
    display::{FrameBuffer, HEIGHT},
    error::{Fault, InputError, LoadError},
    keyboard::Keyboard,
    memory::{glyph_addr, Memory, TypeAddr, PROGRAM_START},
    registers::Registers,
    timer::TimerUnit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The all-zero word was fetched: the program ran off its end.
    EndOfProgram,
    Fault(Fault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No program image yet, or the last load failed.
    Unloaded,
    Running,
    /// Parked on `Fx0A` until the host presses a key.
    AwaitingKey { register: u8 },
    Halted(HaltReason),
}

/// How the program counter moves once a handler is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Skip,
    JumpTo(TypeAddr),
    Stall,
}

impl Flow {
    fn skip_if(condition: bool) -> Self {
        if condition {
            Self::Skip
        } else {
            Self::Next
        }
    }
}

pub struct Emulator {
    fb: FrameBuffer,
    keys: Keyboard,
    pub regs: Registers,
    pub mem: Memory,
    pub timers: TimerUnit,
    config: Config,
    rng: StdRng,
    state: RunState,
    display_updated: bool,
    should_buzz: bool,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Emulator {
    pub fn new(config: Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            fb: FrameBuffer::new(),
            keys: Keyboard::new(),
            regs: Registers::new(),
            mem: Memory::new(),
            timers: TimerUnit::new(config.clock_hz),
            config,
            rng,
            state: RunState::Unloaded,
            display_updated: false,
            should_buzz: false,
        }
    }

    /// Resets the machine and places `bytes` at 0x200.
    ///
    /// On failure the machine stays halted until a later load succeeds.
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        let mut mem = Memory::new();
        if let Err(err) = mem.load_rom(bytes) {
            log::warn!("rom rejected: {err}");
            self.state = RunState::Unloaded;
            return Err(err);
        }

        self.mem = mem;
        self.regs = Registers::new();
        self.fb = FrameBuffer::new();
        self.timers = TimerUnit::new(self.config.clock_hz);
        self.display_updated = false;
        self.should_buzz = false;
        self.state = RunState::Running;
        log::debug!("loaded {} byte rom at {:#05x}", bytes.len(), self.regs.pc.0);
        Ok(())
    }

    pub fn load_rom_by_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        match Memory::read_rom_file(path) {
            Ok(program) => self.load_rom(&program),
            Err(err) => {
                log::warn!("{err}");
                self.state = RunState::Unloaded;
                Err(err)
            }
        }
    }

    pub fn fetch_decode(&self) -> Result<(u16, Instruction), Fault> {
        let ins = self.mem.instruction_at(self.regs.pc.0)?;
        Ok((ins, Instruction::decode_raw(ins)))
    }

    /// Runs one instruction, or one more round of waiting for a key.
    ///
    /// A returned fault has already halted the machine; stepping a halted or
    /// unloaded machine does nothing.
    pub fn step(&mut self) -> Result<(), Fault> {
        self.display_updated = false;
        self.should_buzz = false;

        match self.state {
            RunState::Unloaded | RunState::Halted(_) => return Ok(()),
            RunState::AwaitingKey { register } => {
                self.timers.elapse_cycles(1);
                self.resume_key_wait(register);
                self.should_buzz = self.timers.sound.is_active();
                return Ok(());
            }
            RunState::Running => {}
        }

        let pc = self.regs.pc.0;
        if self.config.strict_opcodes && pc % 2 != 0 {
            return Err(self.halt_on(Fault::MisalignedProgramCounter(pc)));
        }
        let (word, ins) = self.fetch_decode().map_err(|fault| self.halt_on(fault))?;
        let timers = self.timers;
        self.timers.elapse_cycles(1);

        // a zero word at the entry point is an ignored 0nnn, anywhere else the
        // program has run off its end
        if word == 0x0000 && pc != PROGRAM_START {
            log::info!("program ended at {pc:#05x}");
            self.state = RunState::Halted(HaltReason::EndOfProgram);
            return Ok(());
        }

        log::trace!("{pc:#05x}: {word:04X}  {ins}");
        let flow = match self.execute_ins(ins) {
            Ok(flow) => flow,
            Err(fault) => {
                self.timers = timers;
                return Err(self.halt_on(fault));
            }
        };
        match flow {
            Flow::Next => self.regs.pc.increment(),
            Flow::Skip => self.regs.pc.skip(),
            Flow::JumpTo(addr) => self.regs.pc.set_addr(addr),
            Flow::Stall => {}
        }

        self.should_buzz = self.timers.sound.is_active();
        Ok(())
    }

    /// Steps up to `cycles` times, stopping early once the machine halts.
    pub fn run_cycles(&mut self, cycles: u32) -> Result<(), Fault> {
        for _ in 0..cycles {
            if self.halted() {
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    fn halt_on(&mut self, fault: Fault) -> Fault {
        log::error!("machine halted: {fault}");
        self.state = RunState::Halted(HaltReason::Fault(fault));
        fault
    }

    fn resume_key_wait(&mut self, register: u8) {
        if let Some(key) = self.keys.first_pressed() {
            log::debug!("key {key:X} released wait into V{register:X}");
            self.regs.set_register(register, key);
            self.regs.pc.increment();
            self.state = RunState::Running;
        }
    }

    fn execute_ins(&mut self, ins: Instruction) -> Result<Flow, Fault> {
        let quirks: Quirks = self.config.quirks;
        let pc = self.regs.pc.0;

        let flow = match ins {
            Instruction::Cls => {
                self.fb.clear_buffer();
                self.display_updated = true;
                Flow::Next
            }
            Instruction::Return => Flow::JumpTo(self.regs.stack.pop(pc)?),
            Instruction::Sys(addr) => {
                log::debug!("ignoring machine routine call to {addr:#05x} at {pc:#05x}");
                Flow::Next
            }
            Instruction::Jump(addr) => Flow::JumpTo(addr),
            Instruction::Call(addr) => {
                // store the next instruction to return back to
                self.regs.stack.push(self.regs.pc.next(), pc)?;
                Flow::JumpTo(addr)
            }
            Instruction::SkipEqImm(vx, nn) => Flow::skip_if(self.regs.get(vx) == nn),
            Instruction::SkipNeImm(vx, nn) => Flow::skip_if(self.regs.get(vx) != nn),
            Instruction::SkipEqReg(vx, vy) => {
                Flow::skip_if(self.regs.get(vx) == self.regs.get(vy))
            }
            Instruction::SkipNeReg(vx, vy) => {
                Flow::skip_if(self.regs.get(vx) != self.regs.get(vy))
            }
            Instruction::LoadImm(vx, nn) => {
                self.regs.set_register(vx, nn);
                Flow::Next
            }
            Instruction::AddImm(vx, nn) => {
                self.regs.add_to_register(vx, nn);
                Flow::Next
            }
            Instruction::Move(vx, vy) => {
                self.regs.set_register(vx, self.regs.get(vy));
                Flow::Next
            }
            Instruction::Or(vx, vy) => {
                self.logic(vx, vy, quirks, |x, y| x | y);
                Flow::Next
            }
            Instruction::And(vx, vy) => {
                self.logic(vx, vy, quirks, |x, y| x & y);
                Flow::Next
            }
            Instruction::Xor(vx, vy) => {
                self.logic(vx, vy, quirks, |x, y| x ^ y);
                Flow::Next
            }
            Instruction::AddReg(vx, vy) => {
                let (sum, carry) = self.regs.get(vx).overflowing_add(self.regs.get(vy));
                self.regs.set_register(vx, sum);
                self.regs.set_flag(carry);
                Flow::Next
            }
            Instruction::Sub(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, x.wrapping_sub(y));
                self.regs.set_flag(x >= y); // no borrow
                Flow::Next
            }
            Instruction::SubNeg(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, y.wrapping_sub(x));
                self.regs.set_flag(y >= x); // no borrow
                Flow::Next
            }
            Instruction::ShiftRight(vx, vy) => {
                let source = self.regs.get(if quirks.shift_reads_vy { vy } else { vx });
                self.regs.set_register(vx, source >> 1);
                self.regs.set_flag(source & 1 == 1);
                Flow::Next
            }
            Instruction::ShiftLeft(vx, vy) => {
                let source = self.regs.get(if quirks.shift_reads_vy { vy } else { vx });
                self.regs.set_register(vx, source << 1);
                self.regs.set_flag(source >> 7 == 1);
                Flow::Next
            }
            Instruction::LoadIndex(addr) => {
                self.regs.index.set_addr(addr);
                Flow::Next
            }
            Instruction::JumpOffset(addr) => {
                let offset_reg = if quirks.jump_offset_uses_vx {
                    (addr >> 8) as u8
                } else {
                    0
                };
                Flow::JumpTo(addr + self.regs.get(offset_reg) as u16)
            }
            Instruction::Random(vx, nn) => {
                let ransuu: u8 = self.rng.gen();
                self.regs.set_register(vx, nn & ransuu);
                Flow::Next
            }
            Instruction::Draw(reg_x, reg_y, height) => {
                // coordinates are read before VF is cleared, VF may be one of them
                let (x, mut y) = (self.regs.get(reg_x), self.regs.get(reg_y));
                if quirks.origin_wraps_vertically {
                    y %= HEIGHT as u8;
                }
                let sprite = self.mem.slice(self.regs.index.0, height as usize)?;
                self.regs.set_flag(false);
                let collision = self.fb.paint(x, y, sprite, quirks.wrap_sprites);
                self.regs.set_flag(collision);
                self.display_updated = true;
                Flow::Next
            }
            Instruction::SkipKeyDown(vx) => {
                Flow::skip_if(self.keys.get_key_status_from_num(self.regs.get(vx)))
            }
            Instruction::SkipKeyUp(vx) => {
                Flow::skip_if(!self.keys.get_key_status_from_num(self.regs.get(vx)))
            }
            Instruction::ReadDelay(vx) => {
                self.regs.set_register(vx, self.timers.delay());
                Flow::Next
            }
            Instruction::SetDelay(vx) => {
                self.timers.set_delay(self.regs.get(vx));
                Flow::Next
            }
            Instruction::SetSound(vx) => {
                self.timers.set_sound(self.regs.get(vx));
                Flow::Next
            }
            Instruction::WaitKey(vx) => match self.keys.first_pressed() {
                Some(key) => {
                    self.regs.set_register(vx, key);
                    Flow::Next
                }
                None => {
                    log::debug!("waiting for key into V{vx:X} at {pc:#05x}");
                    self.state = RunState::AwaitingKey { register: vx };
                    Flow::Stall
                }
            },
            Instruction::AddIndex(vx) => {
                self.regs.index.advance(self.regs.get(vx) as u16)?;
                Flow::Next
            }
            Instruction::LoadGlyph(vx) => {
                self.regs.index.set_addr(glyph_addr(self.regs.get(vx)));
                Flow::Next
            }
            Instruction::StoreBcd(vx) => {
                let value = self.regs.get(vx);
                let digits = [value / 100, value / 10 % 10, value % 10];
                self.mem
                    .slice_mut(self.regs.index.0, digits.len())?
                    .copy_from_slice(&digits);
                Flow::Next
            }
            Instruction::StoreRegs(vx) => {
                let len = vx as usize + 1;
                self.mem
                    .slice_mut(self.regs.index.0, len)?
                    .copy_from_slice(self.regs.range(vx));
                if quirks.load_store_increments_index {
                    self.regs.index.advance(len as u16)?;
                }
                Flow::Next
            }
            Instruction::LoadRegs(vx) => {
                let len = vx as usize + 1;
                let values = self.mem.slice(self.regs.index.0, len)?;
                self.regs.range_mut(vx).copy_from_slice(values);
                if quirks.load_store_increments_index {
                    self.regs.index.advance(len as u16)?;
                }
                Flow::Next
            }
            Instruction::Unknown(word) => {
                if self.config.strict_opcodes {
                    return Err(Fault::UnknownInstruction { word, pc });
                }
                log::warn!("skipping unknown instruction {word:04X} at {pc:#05x}");
                Flow::Next
            }
        };
        Ok(flow)
    }

    fn logic(&mut self, vx: u8, vy: u8, quirks: Quirks, op: impl Fn(u8, u8) -> u8) {
        self.regs
            .set_register(vx, op(self.regs.get(vx), self.regs.get(vy)));
        if quirks.logic_resets_vf {
            self.regs.set_flag(false);
        }
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) -> Result<(), InputError> {
        self.keys.set_key(key, pressed)
    }

    pub fn keys(&self) -> &Keyboard {
        &self.keys
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.fb
    }

    /// Checks and clears the frame's dirty flag, which accumulates across
    /// steps until the host reads it.
    pub fn take_redraw(&mut self) -> bool {
        self.fb.take_dirty()
    }

    /// Whether the last step cleared or drew on the frame.
    pub fn display_updated(&self) -> bool {
        self.display_updated
    }

    /// Whether the sound timer was running at the end of the last step.
    pub fn should_buzz(&self) -> bool {
        self.should_buzz
    }

    pub fn halted(&self) -> bool {
        matches!(self.state, RunState::Unloaded | RunState::Halted(_))
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn fault(&self) -> Option<Fault> {
        match self.state {
            RunState::Halted(HaltReason::Fault(fault)) => Some(fault),
            _ => None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FONT_START, MEMORY_SIZE};

    fn config() -> Config {
        Config {
            seed: Some(1234),
            ..Config::default()
        }
    }

    fn rom(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    fn emu_with(words: &[u16]) -> Emulator {
        emu_with_config(words, config())
    }

    fn emu_with_config(words: &[u16], config: Config) -> Emulator {
        let mut emu = Emulator::new(config);
        emu.load_rom(&rom(words)).unwrap();
        emu
    }

    fn with_quirks(quirks: Quirks) -> Config {
        Config {
            quirks,
            ..config()
        }
    }

    #[test]
    fn add_matches_reference_for_all_operands() {
        let mut emu = emu_with(&[0x8124]);
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                emu.regs.set_register(1, a);
                emu.regs.set_register(2, b);
                emu.execute_ins(Instruction::AddReg(1, 2)).unwrap();
                let sum = a as u16 + b as u16;
                assert_eq!(emu.regs.get(1), (sum % 256) as u8);
                assert_eq!(emu.regs.get(0xF), (sum > 255) as u8);
                assert_eq!(emu.regs.get(2), b);
            }
        }
    }

    #[test]
    fn subtractions_match_reference_for_all_operands() {
        let mut emu = emu_with(&[0x8125]);
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                emu.regs.set_register(1, a);
                emu.regs.set_register(2, b);
                emu.execute_ins(Instruction::Sub(1, 2)).unwrap();
                assert_eq!(emu.regs.get(1), ((a as i16 - b as i16).rem_euclid(256)) as u8);
                assert_eq!(emu.regs.get(0xF), (a >= b) as u8);

                emu.regs.set_register(1, a);
                emu.execute_ins(Instruction::SubNeg(1, 2)).unwrap();
                assert_eq!(emu.regs.get(1), ((b as i16 - a as i16).rem_euclid(256)) as u8);
                assert_eq!(emu.regs.get(0xF), (b >= a) as u8);
            }
        }
    }

    #[test]
    fn shifts_match_reference_for_all_operands() {
        for quirks in [Quirks::default(), Quirks::cosmac()] {
            let mut emu = emu_with_config(&[0x8126], with_quirks(quirks));
            for a in 0..=255u8 {
                for b in 0..=255u8 {
                    let source = if quirks.shift_reads_vy { b } else { a };

                    emu.regs.set_register(1, a);
                    emu.regs.set_register(2, b);
                    emu.execute_ins(Instruction::ShiftRight(1, 2)).unwrap();
                    assert_eq!(emu.regs.get(1), source >> 1);
                    assert_eq!(emu.regs.get(0xF), source & 1);

                    emu.regs.set_register(1, a);
                    emu.execute_ins(Instruction::ShiftLeft(1, 2)).unwrap();
                    assert_eq!(emu.regs.get(1), ((source as u16) << 1) as u8);
                    assert_eq!(emu.regs.get(0xF), source >> 7);
                }
            }
        }
    }

    #[test]
    fn flag_write_wins_when_vf_is_the_destination() {
        let mut emu = emu_with(&[0x8F14]);
        emu.regs.set_register(0xF, 0xFF);
        emu.regs.set_register(1, 0x02);
        emu.step().unwrap();
        assert_eq!(emu.regs.get(0xF), 1);
    }

    #[test]
    fn add_immediate_leaves_vf_alone() {
        let mut emu = emu_with(&[0x6AF0, 0x6F0A, 0x7A11]);
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.regs.get(0xA), 0x01);
        assert_eq!(emu.regs.get(0xF), 0x0A);
    }

    #[test]
    fn logic_ops_and_vf_reset_quirk() {
        let program = [0x6F07, 0x610C, 0x620A, 0x8121];
        let mut emu = emu_with(&program);
        emu.run_cycles(4).unwrap();
        assert_eq!(emu.regs.get(1), 0x0E);
        assert_eq!(emu.regs.get(0xF), 0x07);

        let mut emu = emu_with_config(&program, with_quirks(Quirks::cosmac()));
        emu.run_cycles(4).unwrap();
        assert_eq!(emu.regs.get(1), 0x0E);
        assert_eq!(emu.regs.get(0xF), 0);

        let mut emu = emu_with(&[0x610C, 0x620A, 0x8122, 0x630C, 0x8323]);
        emu.run_cycles(5).unwrap();
        assert_eq!(emu.regs.get(1), 0x08);
        assert_eq!(emu.regs.get(3), 0x06);
    }

    #[test]
    fn bcd_digits() {
        for (value, digits) in [(255u8, [2u8, 5, 5]), (0, [0, 0, 0]), (9, [0, 0, 9]), (107, [1, 0, 7])] {
            let mut emu = emu_with(&[0xA300, 0xF533]);
            emu.regs.set_register(5, value);
            emu.run_cycles(2).unwrap();
            assert_eq!(emu.mem.slice(0x300, 3).unwrap(), &digits);
            assert_eq!(emu.regs.index.0, 0x300);
        }
    }

    #[test]
    fn dump_then_load_restores_registers() {
        let mut emu = emu_with(&[0xA400, 0xF755, 0xA400, 0xF765]);
        let values = [9, 8, 7, 6, 5, 4, 3, 2];
        emu.regs.range_mut(7).copy_from_slice(&values);
        emu.regs.set_register(8, 0x55);

        emu.run_cycles(2).unwrap();
        assert_eq!(emu.mem.slice(0x400, 9).unwrap(), &[9, 8, 7, 6, 5, 4, 3, 2, 0]);
        assert_eq!(emu.regs.index.0, 0x400 + 8);

        emu.regs.range_mut(0xF).fill(0);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.range(7), &values);
        assert_eq!(emu.regs.get(8), 0);
        assert_eq!(emu.regs.index.0, 0x400 + 8);
    }

    #[test]
    fn dump_without_index_increment_quirk() {
        let mut emu = emu_with_config(&[0xA400, 0xF255], with_quirks(Quirks::modern()));
        emu.regs.range_mut(2).copy_from_slice(&[1, 2, 3]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.mem.slice(0x400, 3).unwrap(), &[1, 2, 3]);
        assert_eq!(emu.regs.index.0, 0x400);
    }

    #[test]
    fn draw_twice_restores_frame_and_sets_collision() {
        // V0 = 12, V1 = 8, I -> glyph 0, draw it twice
        let mut emu = emu_with(&[0x600C, 0x6108, 0xA050, 0xD015, 0xD015]);
        emu.run_cycles(4).unwrap();
        assert!(emu.display_updated());
        assert_eq!(emu.regs.get(0xF), 0);
        assert!(emu.frame().pixel(12, 8));
        assert!(emu.frame().pixel(15, 12));
        assert!(!emu.frame().pixel(16, 8));

        emu.step().unwrap();
        assert_eq!(emu.regs.get(0xF), 1);
        assert!(emu.frame().pixels().iter().all(|&p| !p));
    }

    #[test]
    fn draw_clears_stale_vf_before_accumulating() {
        let mut emu = emu_with(&[0x6F01, 0xA050, 0xD005]);
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn draw_reads_coordinates_from_vf_before_clearing_it() {
        let mut emu = emu_with(&[0x6F05, 0xA050, 0xDFF1]);
        emu.run_cycles(3).unwrap();
        assert!(emu.frame().pixel(5, 5));
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn sprite_at_right_edge_is_clipped() {
        let mut emu = emu_with(&[0x603C, 0x6100, 0xA300, 0xD011]);
        emu.mem.set(0x300, 0xFF).unwrap();
        emu.run_cycles(4).unwrap();
        for x in 60..64 {
            assert!(emu.frame().pixel(x, 0));
        }
        for x in 0..4 {
            assert!(!emu.frame().pixel(x, 0));
        }
    }

    #[test]
    fn sprite_wraps_with_quirk() {
        let quirks = Quirks {
            wrap_sprites: true,
            ..Quirks::default()
        };
        let mut emu = emu_with_config(&[0x603C, 0x6100, 0xA300, 0xD011], with_quirks(quirks));
        emu.mem.set(0x300, 0xFF).unwrap();
        emu.run_cycles(4).unwrap();
        for x in (60..64).chain(0..4) {
            assert!(emu.frame().pixel(x, 0));
        }
    }

    #[test]
    fn draw_origin_below_the_frame_is_clipped() {
        // V0 = 0, V1 = 40, I = glyph 0, DRW V0, V1, 5
        let program = [0x6000, 0x6128, 0xA050, 0xD015];
        let mut emu = emu_with(&program);
        emu.run_cycles(4).unwrap();
        assert!(emu.frame().pixels().iter().all(|&on| !on));
        assert_eq!(emu.regs.get(0xF), 0);

        let quirks = Quirks {
            origin_wraps_vertically: true,
            ..Quirks::default()
        };
        let mut emu = emu_with_config(&program, with_quirks(quirks));
        emu.run_cycles(4).unwrap();
        assert!(emu.frame().pixel(0, 8));
        assert!(emu.frame().pixel(3, 12));
        assert!(!emu.frame().pixel(1, 9));
    }

    #[test]
    fn draw_past_end_of_memory_faults_without_touching_state() {
        let mut emu = emu_with(&[0xAFFE, 0xD005]);
        emu.regs.set_register(0xF, 0x42);
        emu.step().unwrap();
        let err = emu.step().unwrap_err();
        assert_eq!(err, Fault::AddressOutOfBounds { addr: MEMORY_SIZE as u32 });
        assert_eq!(emu.regs.get(0xF), 0x42);
        assert_eq!(emu.regs.pc.0, 0x202);
        assert!(emu.halted());
        assert_eq!(emu.fault(), Some(err));
    }

    #[test]
    fn store_past_end_of_memory_faults() {
        let mut emu = emu_with(&[0xAFFF, 0xF255]);
        emu.regs.range_mut(2).copy_from_slice(&[1, 2, 3]);
        emu.step().unwrap();
        assert!(matches!(emu.step(), Err(Fault::AddressOutOfBounds { .. })));
        assert_eq!(emu.mem.get(0xFFF).unwrap(), 0);
        assert_eq!(emu.regs.index.0, 0xFFF);
    }

    #[test]
    fn point_char_targets_builtin_glyph() {
        let mut emu = emu_with(&[0x6A1B, 0xFA29]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.index.0, FONT_START + 0xB * 5);
    }

    #[test]
    fn add_to_index() {
        let mut emu = emu_with(&[0xA100, 0x63FF, 0xF31E]);
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.regs.index.0, 0x1FF);
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn add_to_index_past_the_16_bit_range_faults() {
        let mut words = vec![0xAFFF, 0x60FF];
        words.extend([0xF01E; 241]);
        words.push(0xF055);
        let mut emu = emu_with(&words);

        let err = emu.run_cycles(words.len() as u32).unwrap_err();
        assert_eq!(err, Fault::AddressOutOfBounds { addr: 0xFFF + 241 * 0xFF });
        assert_eq!(emu.regs.index.0, 0xFFF + 240 * 0xFF);
        assert_eq!(emu.regs.pc.0, 0x200 + 2 * 242);
        assert_eq!(emu.fault(), Some(err));
        assert!(emu.mem.slice(0, FONT_START as usize).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn faulting_step_rolls_back_its_timer_tick() {
        // one timer tick per cycle
        let config = Config {
            clock_hz: 60,
            ..config()
        };
        // LD V0 10, LD DT V0, RET with an empty stack
        let mut emu = emu_with_config(&[0x600A, 0xF015, 0x00EE], config);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.timers.delay(), 10);

        assert_eq!(emu.step(), Err(Fault::StackUnderflow { pc: 0x204 }));
        assert_eq!(emu.timers.delay(), 10);
        assert_eq!(emu.regs.pc.0, 0x204);
    }

    #[test]
    fn odd_program_counter_faults_only_when_strict() {
        let strict = Config {
            strict_opcodes: true,
            ..config()
        };
        let mut emu = emu_with_config(&[0x1201], strict);
        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x201);
        assert_eq!(emu.step(), Err(Fault::MisalignedProgramCounter(0x201)));
        assert!(emu.halted());

        // lenient: the straddling word 0x0100 is an ignored machine routine
        let mut emu = emu_with(&[0x1201]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.pc.0, 0x203);
        assert!(!emu.halted());
    }

    #[test]
    fn skips_advance_by_four() {
        let mut emu = emu_with(&[0x6005, 0x3005, 0x0000, 0x4006, 0x0000, 0x6105, 0x5010, 0x0000, 0x9010]);
        emu.run_cycles(5).unwrap();
        assert_eq!(emu.regs.pc.0, 0x210);
        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x212);
        assert!(!emu.halted());
    }

    #[test]
    fn call_and_return() {
        // 200: CALL 206, 202: LD V1 2, 204: JP 204, 206: LD V0 1, 208: RET
        let mut emu = emu_with(&[0x2206, 0x6102, 0x1204, 0x6001, 0x00EE]);
        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x206);
        assert_eq!(emu.regs.stack.frames(), &[0x202]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.pc.0, 0x202);
        assert_eq!(emu.regs.stack.depth(), 0);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.range(1), &[1, 2]);
        assert_eq!(emu.regs.pc.0, 0x204);
    }

    #[test]
    fn runaway_recursion_overflows_the_stack() {
        let mut emu = emu_with(&[0x2200]);
        emu.run_cycles(16).unwrap();
        assert_eq!(emu.regs.stack.depth(), 16);
        assert_eq!(emu.step(), Err(Fault::StackOverflow { pc: 0x200 }));
        assert_eq!(emu.regs.stack.depth(), 16);
        assert_eq!(
            emu.state(),
            RunState::Halted(HaltReason::Fault(Fault::StackOverflow { pc: 0x200 }))
        );
        // further steps are inert
        assert_eq!(emu.step(), Ok(()));
        assert_eq!(emu.regs.pc.0, 0x200);
    }

    #[test]
    fn return_without_call_underflows() {
        let mut emu = emu_with(&[0x00EE]);
        assert_eq!(emu.step(), Err(Fault::StackUnderflow { pc: 0x200 }));
        assert!(emu.halted());
    }

    #[test]
    fn jump_with_offset_past_memory_faults_on_next_fetch() {
        let mut emu = emu_with(&[0x60FF, 0xBFFF]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.pc.0, 0xFFF + 0xFF);
        assert_eq!(emu.step(), Err(Fault::ProgramCounterOutOfBounds(0x10FE)));
    }

    #[test]
    fn jump_with_offset_quirk_uses_vx() {
        let mut emu = emu_with_config(&[0x6302, 0x6010, 0xB300], with_quirks(Quirks::modern()));
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.regs.pc.0, 0x302);

        let mut emu = emu_with(&[0x6302, 0x6010, 0xB300]);
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.regs.pc.0, 0x310);
    }

    #[test]
    fn random_is_masked_and_reproducible_with_a_seed() {
        let program = [0xC00F, 0xC1F0, 0xC200];
        let mut a = emu_with(&program);
        let mut b = emu_with(&program);
        a.run_cycles(3).unwrap();
        b.run_cycles(3).unwrap();
        assert_eq!(a.regs.get(0) & 0xF0, 0);
        assert_eq!(a.regs.get(1) & 0x0F, 0);
        assert_eq!(a.regs.get(2), 0);
        assert_eq!(a.regs.range(2), b.regs.range(2));
    }

    #[test]
    fn key_skips() {
        let mut emu = emu_with(&[0x6005, 0xE09E, 0x0000, 0xE0A1, 0x1208]);
        emu.set_key(5, true).unwrap();
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.pc.0, 0x206);
        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x208);

        let mut emu = emu_with(&[0x6005, 0xE09E]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.pc.0, 0x204);
    }

    #[test]
    fn key_skip_with_out_of_range_register_reads_released() {
        let mut emu = emu_with(&[0x6015, 0xE0A1]);
        emu.set_key(5, true).unwrap();
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.pc.0, 0x206);
    }

    #[test]
    fn set_key_rejects_unknown_keys() {
        let mut emu = Emulator::default();
        assert_eq!(emu.set_key(0x10, true), Err(InputError::InvalidKey(0x10)));
    }

    #[test]
    fn wait_for_key_stalls_until_pressed() {
        let mut emu = emu_with(&[0xF30A, 0x6401]);
        for _ in 0..1000 {
            emu.step().unwrap();
            assert_eq!(emu.regs.pc.0, 0x200);
            assert_eq!(emu.state(), RunState::AwaitingKey { register: 3 });
            assert!(!emu.halted());
        }

        emu.set_key(0x9, true).unwrap();
        emu.set_key(0x5, true).unwrap();
        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x202);
        assert_eq!(emu.regs.get(3), 0x5);
        assert_eq!(emu.state(), RunState::Running);

        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x204);
        assert_eq!(emu.regs.get(4), 1);
    }

    #[test]
    fn wait_for_key_completes_at_once_when_a_key_is_held() {
        let mut emu = emu_with(&[0xF20A]);
        emu.set_key(0xF, true).unwrap();
        emu.step().unwrap();
        assert_eq!(emu.regs.get(2), 0xF);
        assert_eq!(emu.regs.pc.0, 0x202);
        assert_eq!(emu.state(), RunState::Running);
    }

    #[test]
    fn timers_keep_running_while_waiting_for_key() {
        let mut emu = emu_with(&[0x603C, 0xF015, 0xF10A]);
        emu.run_cycles(2).unwrap();
        emu.run_cycles(500).unwrap();
        assert_eq!(emu.timers.delay(), 0);
        assert_eq!(emu.regs.pc.0, 0x204);
    }

    #[test]
    fn delay_timer_reaches_zero_after_one_second() {
        // LD V0 10, LD DT V0, JP self
        let mut emu = emu_with(&[0x600A, 0xF015, 0x1204]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.timers.delay(), 10);
        for _ in 0..500 {
            emu.step().unwrap();
            assert!(emu.timers.delay() <= 10);
        }
        assert_eq!(emu.timers.delay(), 0);
    }

    #[test]
    fn delay_timer_is_readable() {
        let mut emu = emu_with(&[0x6014, 0xF015, 0xF207]);
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.regs.get(2), 20);
    }

    #[test]
    fn should_buzz_follows_sound_timer() {
        let mut emu = emu_with(&[0x6002, 0xF018, 0x1204]);
        emu.step().unwrap();
        assert!(!emu.should_buzz());
        emu.step().unwrap();
        assert!(emu.should_buzz());
        emu.run_cycles(30).unwrap();
        assert_eq!(emu.timers.sound(), 0);
        assert!(!emu.should_buzz());
    }

    #[test]
    fn unknown_instruction_is_skipped_by_default() {
        let mut emu = emu_with(&[0xFFFF, 0x6107]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.get(1), 7);
        assert!(!emu.halted());
    }

    #[test]
    fn unknown_instruction_faults_in_strict_mode() {
        let config = Config {
            strict_opcodes: true,
            ..config()
        };
        let mut emu = emu_with_config(&[0xFFFF], config);
        assert_eq!(
            emu.step(),
            Err(Fault::UnknownInstruction { word: 0xFFFF, pc: 0x200 })
        );
        assert_eq!(emu.regs.pc.0, 0x200);
    }

    #[test]
    fn machine_routines_are_ignored() {
        let mut emu = emu_with(&[0x0123, 0x6107]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.get(1), 7);
    }

    #[test]
    fn zero_word_ends_the_program() {
        let mut emu = emu_with(&[0x6107]);
        emu.run_cycles(10).unwrap();
        assert_eq!(emu.state(), RunState::Halted(HaltReason::EndOfProgram));
        assert_eq!(emu.regs.pc.0, 0x202);
        assert_eq!(emu.fault(), None);
    }

    #[test]
    fn zero_word_at_entry_is_skipped() {
        let mut emu = emu_with(&[0x0000, 0x6107]);
        emu.run_cycles(2).unwrap();
        assert_eq!(emu.regs.get(1), 7);
        emu.step().unwrap();
        assert_eq!(emu.state(), RunState::Halted(HaltReason::EndOfProgram));
    }

    #[test]
    fn fresh_machine_is_halted_until_loaded() {
        let mut emu = Emulator::default();
        assert!(emu.halted());
        assert_eq!(emu.state(), RunState::Unloaded);
        emu.step().unwrap();
        assert_eq!(emu.regs.pc.0, 0x200);

        assert!(emu.load_rom(&[]).is_err());
        assert!(emu.halted());
        assert!(emu.load_rom_by_file("/no/such/rom.ch8").is_err());
        assert!(emu.halted());

        emu.load_rom(&[0x12, 0x00]).unwrap();
        assert!(!emu.halted());
    }

    #[test]
    fn failed_reload_halts_a_running_machine() {
        let mut emu = emu_with(&[0x1200]);
        emu.step().unwrap();
        assert!(emu.load_rom(&vec![0; 4000]).is_err());
        assert!(emu.halted());
    }

    #[test]
    fn clear_then_loop_is_stable() {
        let program = rom(&[0x00E0, 0x1202]);
        let mut emu = emu_with(&[0x00E0, 0x1202]);
        let memory_before = emu.mem.slice(0, MEMORY_SIZE).unwrap().to_vec();

        emu.step().unwrap();
        assert!(emu.display_updated());
        assert!(emu.take_redraw());

        for _ in 0..10_000 {
            emu.step().unwrap();
            assert!(!emu.display_updated());
            assert_eq!(emu.regs.pc.0, 0x202);
        }

        assert!(!emu.take_redraw());
        assert!(!emu.halted());
        assert_eq!(emu.regs.all(), &[0; 16]);
        assert_eq!(emu.regs.index.0, 0);
        assert_eq!(emu.regs.stack.depth(), 0);
        assert_eq!(emu.mem.slice(0, MEMORY_SIZE).unwrap(), &memory_before[..]);
        assert_eq!(emu.mem.slice(0x200, 4).unwrap(), &program[..]);
        assert!(emu.frame().pixels().iter().all(|&p| !p));
    }
}
