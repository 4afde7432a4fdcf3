//! A pixel bitmap encoded into terminal characters.
//!
//! Every character cell covers 2×4 pixels. A cell is printed either as an 8-dot braille glyph
//! (`U+2800 + mask`) or as the block glyph sharing most dots with the mask. Each cell carries
//! a foreground and a background color, and may be overridden by a text character.

use std::collections::HashMap;

use unicode_width::UnicodeWidthChar;

use crate::util::math::population;

pub const TERM_RESET: &str = "\x1B[39;49m";

const BRAILLE_OFFSET: u32 = 0x2800;

/// Dot bit of each pixel inside a cell, indexed by `[y & 3][x & 1]`.
const BRAILLE_MAP: [[u8; 2]; 4] = [[0x1, 0x8], [0x2, 0x10], [0x4, 0x20], [0x40, 0x80]];

/// Block glyphs with the braille dot masks they cover.
const ASCII_MAP: [(char, u8); 6] = [
    ('▀', 1 + 2 + 16 + 32),
    ('▄', 4 + 8 + 64 + 128),
    ('■', 2 + 4 + 32 + 64),
    ('▌', 1 + 2 + 4 + 8),
    ('▐', 16 + 32 + 64 + 128),
    ('█', 255),
];

/// Rounds `width` up to a multiple of 2 and `height` up to a multiple of 4.
pub fn cell_aligned(width: usize, height: usize) -> (usize, usize) {
    ((width.max(1) + 1) / 2 * 2, (height.max(1) + 3) / 4 * 4)
}

/// Block glyph for every dot mask.
fn ascii_table() -> [char; 256] {
    let mut table = [' '; 256];
    for i in 1..=255u32 {
        let braille = (i & 7) + ((i & 56) << 1) + ((i & 64) >> 3) + (i & 128);
        let mut best: Option<(char, u32)> = None;
        for (glyph, mask) in ASCII_MAP {
            let covered = population(u32::from(mask) & braille);
            if best.map_or(true, |(_, best_covered)| best_covered < covered) {
                best = Some((glyph, covered));
            }
        }
        if let Some((glyph, _)) = best {
            table[i as usize] = glyph;
        }
    }
    table
}

fn term_color(foreground: u8, background: u8) -> String {
    match (foreground, background) {
        (0, 0) => TERM_RESET.to_string(),
        (foreground, 0) => format!("\x1B[49;38;5;{foreground}m"),
        (0, background) => format!("\x1B[39;48;5;{background}m"),
        (foreground, background) => format!("\x1B[38;5;{foreground};48;5;{background}m"),
    }
}

pub struct BrailleBuffer {
    width: usize,
    height: usize,
    use_braille: bool,
    delimiter: String,

    pixels: Vec<u8>,
    foreground: Vec<u8>,
    background: Vec<u8>,
    chars: HashMap<usize, char>,
    global_background: Option<u8>,

    ascii: [char; 256],
}

impl BrailleBuffer {
    /// Creates a buffer, rounding the dimensions up to whole cells.
    pub fn new(width: usize, height: usize, use_braille: bool, delimiter: &str) -> Self {
        let (width, height) = cell_aligned(width, height);
        let size = width * height / 8;
        Self {
            width,
            height,
            use_braille,
            delimiter: delimiter.to_string(),
            pixels: vec![0; size],
            foreground: vec![0; size],
            background: vec![0; size],
            chars: HashMap::new(),
            global_background: None,
            ascii: ascii_table(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Resets every plane and the character overlay. The global background is kept.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.foreground.fill(0);
        self.background.fill(0);
        self.chars.clear();
    }

    pub fn set_global_background(&mut self, color: Option<u8>) {
        self.global_background = color;
    }

    fn cell_index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok().filter(|x| *x < self.width)?;
        let y = usize::try_from(y).ok().filter(|y| *y < self.height)?;
        Some((x >> 1) + (self.width >> 1) * (y >> 2))
    }

    fn locate(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        let index = self.cell_index(x, y)?;
        Some((index, BRAILLE_MAP[(y & 3) as usize][(x & 1) as usize]))
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: u8) {
        if let Some((index, mask)) = self.locate(x, y) {
            self.pixels[index] |= mask;
            self.foreground[index] = color;
        }
    }

    pub fn is_set(&self, x: i32, y: i32) -> bool {
        self.locate(x, y)
            .is_some_and(|(index, mask)| self.pixels[index] & mask != 0)
    }

    pub fn unset_pixel(&mut self, x: i32, y: i32) {
        if let Some((index, mask)) = self.locate(x, y) {
            self.pixels[index] &= !mask;
        }
    }

    pub fn set_background(&mut self, x: i32, y: i32, color: u8) {
        if let Some(index) = self.cell_index(x, y) {
            self.background[index] = color;
        }
    }

    /// Places `char` over the cell containing pixel `(x, y)` until the next clear.
    pub fn set_char(&mut self, char: char, x: i32, y: i32, color: u8) {
        if let Some(index) = self.cell_index(x, y) {
            self.chars.insert(index, char);
            self.foreground[index] = color;
        }
    }

    /// Writes `text` one character per cell, starting at pixel `x` or centered around it.
    pub fn write_text(&mut self, text: &str, x: i32, y: i32, color: u8, center: bool) {
        let length = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
        let x = if center { x - (length / 2 + 1) } else { x };
        for (i, char) in (0..).zip(text.chars()) {
            self.set_char(char, x.saturating_add(i * 2), y, color);
        }
    }

    fn glyph(&self, mask: u8) -> char {
        if self.use_braille {
            char::from_u32(BRAILLE_OFFSET + u32::from(mask)).unwrap_or(' ')
        } else {
            self.ascii[usize::from(mask)]
        }
    }

    /// Encodes the buffer into a printable string terminated by a color reset.
    pub fn frame(&self) -> String {
        let columns = self.width / 2;
        let rows = self.height / 4;
        let global_background = self.global_background.unwrap_or(0);

        let mut output = String::with_capacity(columns * rows * 4);
        let mut current_color: Option<String> = None;

        for y in 0..rows {
            if y > 0 {
                output.push_str(&self.delimiter);
            }
            let mut skip = 0;

            for x in 0..columns {
                let index = y * columns + x;

                let background = match self.background[index] {
                    0 => global_background,
                    background => background,
                };
                let color = term_color(self.foreground[index], background);
                if current_color.as_ref() != Some(&color) {
                    output.push_str(&color);
                    current_color = Some(color);
                }

                if let Some(char) = self.chars.get(&index) {
                    skip += char.width().unwrap_or(1).saturating_sub(1);
                    if skip + x < columns {
                        output.push(*char);
                    }
                } else if skip == 0 {
                    output.push(self.glyph(self.pixels[index]));
                } else {
                    skip -= 1;
                }
            }
        }

        output.push_str(TERM_RESET);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::{cell_aligned, BrailleBuffer, BRAILLE_MAP, TERM_RESET};

    fn braille(width: usize, height: usize) -> BrailleBuffer {
        BrailleBuffer::new(width, height, true, "\n")
    }

    fn glyphs(frame: &str) -> Vec<char> {
        frame
            .chars()
            .filter(|c| ('\u{2800}'..='\u{28FF}').contains(c))
            .collect()
    }

    #[test]
    fn test_dimensions_are_cell_aligned() {
        assert_eq!(cell_aligned(1, 1), (2, 4));
        assert_eq!(cell_aligned(5, 9), (6, 12));
        assert_eq!(cell_aligned(8, 8), (8, 8));
        let buffer = braille(3, 3);
        assert_eq!((buffer.width(), buffer.height()), (4, 4));
    }

    #[test]
    fn test_empty_frame_is_wrapped_in_resets() {
        for (width, height) in [(1, 1), (2, 4), (10, 12)] {
            let frame = braille(width, height).frame();
            assert!(frame.starts_with(TERM_RESET), "{width}x{height}");
            assert!(frame.ends_with(TERM_RESET), "{width}x{height}");
        }
    }

    #[test]
    fn test_set_and_unset_pixel() {
        let mut buffer = braille(4, 8);
        for y in 0..8 {
            for x in 0..4 {
                buffer.clear();
                buffer.set_pixel(x, y, 1);
                let cell = (x as usize >> 1) + 2 * (y as usize >> 2);
                let glyph = glyphs(&buffer.frame())[cell] as u32 - 0x2800;
                let bit = u32::from(BRAILLE_MAP[(y & 3) as usize][(x & 1) as usize]);
                assert_eq!(glyph & bit, bit);

                buffer.unset_pixel(x, y);
                let glyph = glyphs(&buffer.frame())[cell] as u32 - 0x2800;
                assert_eq!(glyph & bit, 0);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut buffer = braille(2, 4);
        buffer.set_pixel(-1, 0, 1);
        buffer.set_pixel(2, 0, 1);
        buffer.set_pixel(0, 4, 1);
        buffer.set_char('x', 0, -1, 1);
        assert_eq!(glyphs(&buffer.frame()), vec!['\u{2800}']);
    }

    #[test]
    fn test_color_escapes_are_compressed() {
        let mut buffer = braille(6, 4);
        buffer.set_pixel(0, 0, 3);
        buffer.set_pixel(2, 0, 3);
        let frame = buffer.frame();
        assert_eq!(frame.matches("\x1B[49;38;5;3m").count(), 1);
        assert_eq!(frame.matches(TERM_RESET).count(), 2);

        buffer.set_global_background(Some(4));
        buffer.set_background(4, 0, 5);
        let frame = buffer.frame();
        assert!(frame.starts_with("\x1B[38;5;3;48;5;4m"));
        assert!(frame.contains("\x1B[39;48;5;5m"));
    }

    #[test]
    fn test_rows_are_delimited() {
        let buffer = braille(4, 12);
        let frame = buffer.frame();
        assert_eq!(frame.matches('\n').count(), 2);
        assert!(!frame.ends_with('\n'));
    }

    #[test]
    fn test_text_overlay() {
        let mut buffer = braille(20, 4);
        buffer.write_text("abc", 0, 0, 2, false);
        let frame = buffer.frame();
        assert!(frame.contains("abc"));

        buffer.clear();
        buffer.write_text("abc", 8, 0, 2, true);
        let frame = buffer.frame();
        assert!(frame.contains("\u{2800}\u{2800}\u{2800}\x1B[49;38;5;2mabc"));
    }

    #[test]
    fn test_wide_chars_consume_cells() {
        let mut buffer = braille(8, 4);
        buffer.set_char('◉', 0, 0, 1);
        buffer.set_char('漢', 4, 0, 1);
        let frame = buffer.frame();
        // The wide glyph takes the place of the following cell.
        assert!(frame.contains('漢'));
        assert_eq!(glyphs(&frame).len(), 1);
    }

    #[test]
    fn test_ascii_fallback() {
        let mut buffer = BrailleBuffer::new(4, 4, false, "\n");
        for y in 0..4 {
            buffer.set_pixel(0, y, 1);
            buffer.set_pixel(1, y, 1);
        }
        buffer.set_pixel(2, 0, 1);
        buffer.set_pixel(3, 0, 1);
        let frame = buffer.frame();
        assert!(frame.contains('█'));
        assert!(frame.contains('▀'));
    }
}
