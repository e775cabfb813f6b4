pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
/// Sprite origins are reduced modulo this on both axes.
pub const ORIGIN_SPAN: usize = 64;

/// Monochrome 64x32 pixel grid.
pub struct FrameBuffer {
    bit_buffer: [bool; WIDTH * HEIGHT],
    dirty: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            bit_buffer: [false; WIDTH * HEIGHT],
            dirty: false,
        }
    }

    pub fn clear_buffer(&mut self) {
        self.bit_buffer = [false; WIDTH * HEIGHT];
        self.dirty = true;
    }

    /// XORs an 8-pixel-wide sprite onto the frame with its top-left corner at
    /// `(x mod 64, y mod 64)`. Pixels past the right or bottom edge are
    /// dropped unless `wrap` is set, so an origin in rows 32..64 draws nothing.
    ///
    /// Returns whether any pixel was switched off.
    pub fn paint(&mut self, x: u8, y: u8, sprite: &[u8], wrap: bool) -> bool {
        let (x, y) = (x as usize % ORIGIN_SPAN, y as usize % ORIGIN_SPAN);
        let mut collision = false;

        for (i, row) in sprite.iter().enumerate() {
            let mut ny = y + i;
            if ny >= HEIGHT {
                if !wrap {
                    break;
                }
                ny %= HEIGHT;
            }
            for j in 0..8 {
                if (row >> (7 - j)) & 1 == 0 {
                    continue;
                }
                let mut nx = x + j;
                if nx >= WIDTH {
                    if !wrap {
                        break;
                    }
                    nx %= WIDTH;
                }
                let index = ny * WIDTH + nx;
                collision |= self.bit_buffer[index];
                self.bit_buffer[index] ^= true;
            }
        }

        self.dirty = true;
        collision
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.bit_buffer[y * WIDTH + x]
    }

    /// Row-major pixels, `WIDTH * HEIGHT` long.
    pub fn pixels(&self) -> &[bool] {
        &self.bit_buffer
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.bit_buffer.chunks(WIDTH)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Checks and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
