// Default bitmap font baked into the console's boot ROM: a from-scratch
// 8x8 font covering the glyphs the kernel's text helpers actually need —
// space, digits, and uppercase letters. Unassigned glyph slots stay blank
// (all-zero rows), which rasterises as a blank cell rather than garbage.

pub const FONT_GLYPHS: usize = 128;
pub const FONT_ROWS: usize = 8;
pub const FONT_BYTES: usize = FONT_GLYPHS * FONT_ROWS;

fn set(font: &mut [u8; FONT_BYTES], ch: u8, rows: [u8; 8]) {
    let base = ch as usize * FONT_ROWS;
    font[base..base + FONT_ROWS].copy_from_slice(&rows);
}

/// Builds the default font table. Not `const` — it runs once at console
/// startup, not at compile time, so there is no benefit to hand-encoding it
/// as a `static` byte array.
pub fn default_font() -> [u8; FONT_BYTES] {
    let mut font = [0u8; FONT_BYTES];

    set(&mut font, b' ', [0, 0, 0, 0, 0, 0, 0, 0]);
    set(&mut font, b'.', [0, 0, 0, 0, 0, 0b00011000, 0b00011000, 0]);
    set(&mut font, b',', [0, 0, 0, 0, 0, 0b00011000, 0b00011000, 0b00010000]);
    set(&mut font, b'!', [0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0, 0b00011000, 0]);
    set(&mut font, b'?', [0b00111100, 0b01100110, 0b00000110, 0b00001100, 0b00011000, 0, 0b00011000, 0]);
    set(&mut font, b':', [0, 0b00011000, 0b00011000, 0, 0b00011000, 0b00011000, 0, 0]);
    set(&mut font, b'-', [0, 0, 0, 0b01111110, 0, 0, 0, 0]);

    set(&mut font, b'0', [0b00111100, 0b01100110, 0b01101110, 0b01110110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'1', [0b00011000, 0b00111000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b01111110, 0]);
    set(&mut font, b'2', [0b00111100, 0b01100110, 0b00000110, 0b00001100, 0b00110000, 0b01100000, 0b01111110, 0]);
    set(&mut font, b'3', [0b01111110, 0b00001100, 0b00011000, 0b00001100, 0b00000110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'4', [0b00001100, 0b00011100, 0b00111100, 0b01101100, 0b01111110, 0b00001100, 0b00001100, 0]);
    set(&mut font, b'5', [0b01111110, 0b01100000, 0b01111100, 0b00000110, 0b00000110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'6', [0b00111100, 0b01100000, 0b01111100, 0b01100110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'7', [0b01111110, 0b00000110, 0b00001100, 0b00011000, 0b00110000, 0b00110000, 0b00110000, 0]);
    set(&mut font, b'8', [0b00111100, 0b01100110, 0b00111100, 0b01100110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'9', [0b00111100, 0b01100110, 0b01100110, 0b00111110, 0b00000110, 0b00001100, 0b00111000, 0]);

    set(&mut font, b'A', [0b00011000, 0b00111100, 0b01100110, 0b01100110, 0b01111110, 0b01100110, 0b01100110, 0]);
    set(&mut font, b'B', [0b01111100, 0b01100110, 0b01100110, 0b01111100, 0b01100110, 0b01100110, 0b01111100, 0]);
    set(&mut font, b'C', [0b00111100, 0b01100110, 0b01100000, 0b01100000, 0b01100000, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'D', [0b01111000, 0b01101100, 0b01100110, 0b01100110, 0b01100110, 0b01101100, 0b01111000, 0]);
    set(&mut font, b'E', [0b01111110, 0b01100000, 0b01100000, 0b01111100, 0b01100000, 0b01100000, 0b01111110, 0]);
    set(&mut font, b'F', [0b01111110, 0b01100000, 0b01100000, 0b01111100, 0b01100000, 0b01100000, 0b01100000, 0]);
    set(&mut font, b'G', [0b00111100, 0b01100110, 0b01100000, 0b01101110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'H', [0b01100110, 0b01100110, 0b01100110, 0b01111110, 0b01100110, 0b01100110, 0b01100110, 0]);
    set(&mut font, b'I', [0b01111110, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b01111110, 0]);
    set(&mut font, b'J', [0b00000110, 0b00000110, 0b00000110, 0b00000110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'K', [0b01100110, 0b01101100, 0b01111000, 0b01110000, 0b01111000, 0b01101100, 0b01100110, 0]);
    set(&mut font, b'L', [0b01100000, 0b01100000, 0b01100000, 0b01100000, 0b01100000, 0b01100000, 0b01111110, 0]);
    set(&mut font, b'M', [0b01100011, 0b01110111, 0b01111111, 0b01101011, 0b01100011, 0b01100011, 0b01100011, 0]);
    set(&mut font, b'N', [0b01100110, 0b01110110, 0b01111110, 0b01111110, 0b01101110, 0b01100110, 0b01100110, 0]);
    set(&mut font, b'O', [0b00111100, 0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'P', [0b01111100, 0b01100110, 0b01100110, 0b01111100, 0b01100000, 0b01100000, 0b01100000, 0]);
    set(&mut font, b'Q', [0b00111100, 0b01100110, 0b01100110, 0b01100110, 0b01101110, 0b01101100, 0b00111110, 0]);
    set(&mut font, b'R', [0b01111100, 0b01100110, 0b01100110, 0b01111100, 0b01111000, 0b01101100, 0b01100110, 0]);
    set(&mut font, b'S', [0b00111100, 0b01100110, 0b01110000, 0b00111100, 0b00001110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'T', [0b01111110, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0]);
    set(&mut font, b'U', [0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b00111100, 0]);
    set(&mut font, b'V', [0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b01100110, 0b00111100, 0b00011000, 0]);
    set(&mut font, b'W', [0b01100011, 0b01100011, 0b01100011, 0b01101011, 0b01111111, 0b01110111, 0b01100011, 0]);
    set(&mut font, b'X', [0b01100110, 0b01100110, 0b00111100, 0b00011000, 0b00111100, 0b01100110, 0b01100110, 0]);
    set(&mut font, b'Y', [0b01100110, 0b01100110, 0b01100110, 0b00111100, 0b00011000, 0b00011000, 0b00011000, 0]);
    set(&mut font, b'Z', [0b01111110, 0b00000110, 0b00001100, 0b00011000, 0b00110000, 0b01100000, 0b01111110, 0]);

    font
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_a_is_leftmost_bit_first() {
        let font = default_font();
        let base = b'A' as usize * FONT_ROWS;
        assert_eq!(font[base], 0b00011000);
        assert_eq!(font[base + 4], 0b01111110);
    }

    #[test]
    fn unassigned_glyph_is_blank() {
        let font = default_font();
        let base = 1usize * FONT_ROWS;
        assert_eq!(&font[base..base + FONT_ROWS], &[0u8; 8]);
    }
}
