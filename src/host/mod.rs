pub mod keymap;
pub mod sound;
pub mod window;

use std::time::{Duration, Instant};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Converts wall-clock time into whole machine cycles at `clock_hz`,
/// carrying the fractional remainder into the next frame.
pub struct Pacer {
    clock_hz: u32,
    last: Instant,
    // nanoseconds * clock_hz not yet turned into a cycle
    remainder: u128,
    max_per_frame: u32,
}

impl Pacer {
    pub fn new(clock_hz: u32) -> Self {
        let clock_hz = clock_hz.max(1);
        Self {
            clock_hz,
            last: Instant::now(),
            remainder: 0,
            // never try to catch up more than a quarter second at once
            max_per_frame: (clock_hz / 4).max(1),
        }
    }

    pub fn due_cycles(&mut self) -> u32 {
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        self.cycles_for(elapsed)
    }

    fn cycles_for(&mut self, elapsed: Duration) -> u32 {
        let total = elapsed.as_nanos() * self.clock_hz as u128 + self.remainder;
        let cycles = total / NANOS_PER_SECOND;
        self.remainder = total % NANOS_PER_SECOND;

        if cycles > self.max_per_frame as u128 {
            log::debug!("dropping {} cycles behind schedule", cycles - self.max_per_frame as u128);
            self.remainder = 0;
            return self.max_per_frame;
        }
        cycles as u32
    }
}
