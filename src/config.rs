/// Points where interpreters historically disagreed.
///
/// The default is the combination most existing programs expect: shifts
/// operate on `Vx` in place, but `Fx55`/`Fx65` still advance `I`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// `8xy6`/`8xyE` shift `Vy` into `Vx` instead of shifting `Vx` in place.
    pub shift_reads_vy: bool,
    /// `Fx55`/`Fx65` leave `I` pointing one past the last register touched.
    pub load_store_increments_index: bool,
    /// `8xy1`/`8xy2`/`8xy3` clear `VF`.
    pub logic_resets_vf: bool,
    /// `Bxnn` jumps to `xnn + Vx` instead of `nnn + V0`.
    pub jump_offset_uses_vx: bool,
    /// Sprites wrap around the frame edges instead of being clipped.
    pub wrap_sprites: bool,
    /// `Dxyn` takes `Vy` modulo 32 rather than 64, so no origin falls below
    /// the frame.
    pub origin_wraps_vertically: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            shift_reads_vy: false,
            load_store_increments_index: true,
            logic_resets_vf: false,
            jump_offset_uses_vx: false,
            wrap_sprites: false,
            origin_wraps_vertically: false,
        }
    }
}

impl Quirks {
    /// The COSMAC VIP interpreter.
    pub fn cosmac() -> Self {
        Self {
            shift_reads_vy: true,
            load_store_increments_index: true,
            logic_resets_vf: true,
            jump_offset_uses_vx: false,
            wrap_sprites: false,
            origin_wraps_vertically: true,
        }
    }

    /// SUPER-CHIP era interpreters.
    pub fn modern() -> Self {
        Self {
            shift_reads_vy: false,
            load_store_increments_index: false,
            logic_resets_vf: false,
            jump_offset_uses_vx: true,
            wrap_sprites: false,
            origin_wraps_vertically: true,
        }
    }
}

pub const DEFAULT_CLOCK_HZ: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Instruction steps per second of virtual time; drives the 60 Hz timers.
    pub clock_hz: u32,
    pub quirks: Quirks,
    /// Report unmatched instruction words as faults instead of skipping them.
    pub strict_opcodes: bool,
    /// Fixed seed for `Cxkk`; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            quirks: Quirks::default(),
            strict_opcodes: false,
            seed: None,
        }
    }
}
