// The host window: a minifb-backed `HostSurface` plus the keyboard poll
// that feeds the input register. A `Window` plus a `Vec<u32>` backing
// buffer, set a pixel then blit the whole buffer, scaled up from FRAME's
// native 64x64 two-colour screen.

use crate::render::{FillColour, HostSurface};
use crate::vm::input::{button_for_key, Buttons};
use minifb::{Key, Window, WindowOptions};

const SCREEN_SIDE: usize = 64;
const ON_COLOUR: u32 = 0x00e0_e0e0;
const OFF_COLOUR: u32 = 0x0010_1010;

pub struct MinifbSurface {
    window: Window,
    buffer: Vec<u32>,
    fill: FillColour,
}

impl MinifbSurface {
    pub fn new(title: &str, scale: usize) -> Result<Self, minifb::Error> {
        let window = Window::new(
            title,
            SCREEN_SIDE * scale,
            SCREEN_SIDE * scale,
            WindowOptions::default(),
        )?;
        Ok(MinifbSurface { window, buffer: vec![OFF_COLOUR; SCREEN_SIDE * SCREEN_SIDE], fill: FillColour::Off })
    }

    /// Blits the buffer to the window and polls the OS event queue. Call
    /// once per host loop iteration after rendering a frame.
    pub fn present(&mut self) -> Result<(), minifb::Error> {
        self.window.update_with_buffer(&self.buffer, SCREEN_SIDE, SCREEN_SIDE)
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// Polls the mapped keys and packs them into the register byte the
    /// guest reads through `Memory::set_input`.
    pub fn poll_buttons(&self) -> Buttons {
        let mut buttons = Buttons(0);
        for key in self.window.get_keys() {
            if let Some(button) = button_for_key(key_name(key)) {
                buttons.set(button, true);
            }
        }
        buttons
    }
}

impl HostSurface for MinifbSurface {
    fn clear_rect(&mut self, x: u32, y: u32, w: u32, h: u32) {
        for row in y..y + h {
            for col in x..x + w {
                let idx = row as usize * SCREEN_SIDE + col as usize;
                if idx < self.buffer.len() {
                    self.buffer[idx] = OFF_COLOUR;
                }
            }
        }
    }

    fn set_fill_colour(&mut self, colour: FillColour) {
        self.fill = colour;
    }

    fn fill_pixel(&mut self, x: u32, y: u32) {
        let idx = y as usize * SCREEN_SIDE + x as usize;
        if idx < self.buffer.len() {
            self.buffer[idx] = match self.fill {
                FillColour::On => ON_COLOUR,
                FillColour::Off => OFF_COLOUR,
            };
        }
    }
}

/// Translates minifb's `Key` into the string form `button_for_key`
/// expects, keeping the mapping table itself free of a minifb dependency.
fn key_name(key: Key) -> &'static str {
    match key {
        Key::Up => "Up",
        Key::Down => "Down",
        Key::Left => "Left",
        Key::Right => "Right",
        Key::W => "W",
        Key::A => "A",
        Key::S => "S",
        Key::D => "D",
        Key::Z => "Z",
        Key::X => "X",
        Key::Enter => "Enter",
        Key::Backspace => "Backspace",
        _ => "",
    }
}
