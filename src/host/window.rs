use std::time::Duration;

use chipvm::display::{FrameBuffer, HEIGHT, WIDTH};
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

const PIXEL_ON: u32 = from_u16_rgb(0, 127, 255);
const PIXEL_OFF: u32 = from_u16_rgb(0, 0, 0);

const fn from_u16_rgb(r: u16, g: u16, b: u16) -> u32 {
    let (r, g, b) = (r as u32, g as u32, b as u32);
    (r << 16) | (g << 8) | b
}

pub fn scale_from_factor(factor: u8) -> Option<Scale> {
    match factor {
        1 => Some(Scale::X1),
        2 => Some(Scale::X2),
        4 => Some(Scale::X4),
        8 => Some(Scale::X8),
        16 => Some(Scale::X16),
        32 => Some(Scale::X32),
        _ => None,
    }
}

pub struct Screen {
    pixel_buffer: Vec<u32>,
    window: Window,
}

impl Screen {
    pub fn new(title: &str, scale: Scale) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            title,
            WIDTH,
            HEIGHT,
            WindowOptions {
                scale,
                ..WindowOptions::default()
            },
        )?;
        // Limit to max ~60 fps update rate
        window.limit_update_rate(Some(Duration::from_micros(16600)));
        Ok(Self {
            pixel_buffer: vec![PIXEL_OFF; WIDTH * HEIGHT],
            window,
        })
    }

    pub fn is_running(&self) -> bool {
        self.window.is_open() && !self.window.is_key_pressed(Key::Escape, KeyRepeat::No)
    }

    pub fn held_keys(&self) -> Vec<Key> {
        self.window.get_keys()
    }

    pub fn draw(&mut self, fb: &FrameBuffer) -> Result<(), minifb::Error> {
        for (pixel, &on) in self.pixel_buffer.iter_mut().zip(fb.pixels()) {
            *pixel = if on { PIXEL_ON } else { PIXEL_OFF };
        }
        self.window
            .update_with_buffer(&self.pixel_buffer, WIDTH, HEIGHT)
    }

    /// Pumps window events without a new frame.
    pub fn idle(&mut self) {
        self.window.update();
    }
}
