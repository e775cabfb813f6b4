use crate::error::InputError;

pub const KEY_COUNT: u8 = 16;

/// Logical hex keypad state, one bit per key 0x0..=0xF.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keyboard {
    keys: u16,
}

impl Keyboard {
    pub fn new() -> Self {
        Self { keys: 0 }
    }

    pub fn reset(&mut self) {
        self.keys = 0;
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) -> Result<(), InputError> {
        if key >= KEY_COUNT {
            return Err(InputError::InvalidKey(key));
        }
        if pressed {
            self.keys |= 1 << key;
        } else {
            self.keys &= !(1 << key);
        }
        Ok(())
    }

    /// Register values above 0xF name no key and read as released.
    pub fn get_key_status_from_num(&self, n: u8) -> bool {
        n < KEY_COUNT && (self.keys >> n) & 1 == 1
    }

    /// Lowest-numbered pressed key, 0x0 before 0xF.
    pub fn first_pressed(&self) -> Option<u8> {
        (self.keys != 0).then(|| self.keys.trailing_zeros() as u8)
    }

    pub fn mask(&self) -> u16 {
        self.keys
    }
}
