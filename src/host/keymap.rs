use chipvm::{keyboard::KEY_COUNT, Emulator, InputError};
use minifb::Key;

// COSMAC VIP keypad     host keyboard
//   1 2 3 C               1 2 3 4
//   4 5 6 D               Q W E R
//   7 8 9 E               A S D F
//   A 0 B F               Z X C V
pub fn key_to_num(key: Key) -> Option<u8> {
    match key {
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Key4 => Some(0xC),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::R => Some(0xD),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::F => Some(0xE),
        Key::Z => Some(0xA),
        Key::X => Some(0x0),
        Key::C => Some(0xB),
        Key::V => Some(0xF),
        _ => None,
    }
}

/// Logical key mask for the host keys currently held down.
pub fn pressed_mask(keys: &[Key]) -> u16 {
    keys.iter()
        .filter_map(|&key| key_to_num(key))
        .fold(0, |mask, n| mask | 1 << n)
}

/// Writes the state of all 16 logical keys into the machine.
pub fn sync(keys: &[Key], emu: &mut Emulator) -> Result<(), InputError> {
    let mask = pressed_mask(keys);
    for n in 0..KEY_COUNT {
        emu.set_key(n, (mask >> n) & 1 == 1)?;
    }
    Ok(())
}
