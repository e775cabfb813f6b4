pub const TIMER_DEC_PER_SECOND: u32 = 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub count: u8,
}

impl Timer {
    pub fn new(init_count: u8) -> Self {
        Self { count: init_count }
    }

    pub fn set(&mut self, value: u8) {
        self.count = value;
    }

    pub fn decrement(&mut self, by: u32) {
        self.count = self.count.saturating_sub(by.min(u8::MAX as u32) as u8);
    }

    pub fn is_active(&self) -> bool {
        self.count > 0
    }
}

/// Delay and sound timers, ticked at 60 Hz of virtual time.
///
/// Virtual time is measured in machine cycles. Each cycle adds
/// `TIMER_DEC_PER_SECOND` to the accumulator and every `clock_hz` units
/// drain one tick, so the tick count is exact for any integer clock rate and
/// does not depend on how often the host samples the timers.
#[derive(Debug, Clone, Copy)]
pub struct TimerUnit {
    pub delay: Timer,
    pub sound: Timer,
    clock_hz: u32,
    accumulator: u64,
}

impl TimerUnit {
    pub fn new(clock_hz: u32) -> Self {
        Self {
            delay: Timer::default(),
            sound: Timer::default(),
            clock_hz: clock_hz.max(1),
            accumulator: 0,
        }
    }

    pub fn delay(&self) -> u8 {
        self.delay.count
    }

    pub fn sound(&self) -> u8 {
        self.sound.count
    }

    pub fn set_delay(&mut self, value: u8) {
        self.delay.set(value);
    }

    pub fn set_sound(&mut self, value: u8) {
        self.sound.set(value);
    }

    /// Advances virtual time by `cycles` clock periods and returns how many
    /// 60 Hz ticks were applied.
    pub fn elapse_cycles(&mut self, cycles: u32) -> u32 {
        self.accumulator += cycles as u64 * TIMER_DEC_PER_SECOND as u64;
        let ticks = self.accumulator / self.clock_hz as u64;
        self.accumulator %= self.clock_hz as u64;

        let ticks = ticks as u32;
        if ticks > 0 {
            self.delay.decrement(ticks);
            self.sound.decrement(ticks);
        }
        ticks
    }
}
