//! Conversion of style colors into terminal color codes.

use crate::error::ColorError;

/// Parses `#rgb` or `#rrggbb` into an RGB triple.
pub fn hex2rgb(color: &str) -> Result<[u8; 3], ColorError> {
    let digits = color
        .strip_prefix('#')
        .filter(|digits| matches!(digits.len(), 3 | 6))
        .filter(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| ColorError(color.to_string()))?;

    let parsed = csscolorparser::parse(&format!("#{digits}"))
        .map_err(|_| ColorError(color.to_string()))?;
    let [r, g, b, _] = parsed.to_rgba8();
    Ok([r, g, b])
}

const SYSTEM_COLORS: [[u8; 3]; 16] = [
    [0, 0, 0],
    [128, 0, 0],
    [0, 128, 0],
    [128, 128, 0],
    [0, 0, 128],
    [128, 0, 128],
    [0, 128, 128],
    [192, 192, 192],
    [128, 128, 128],
    [255, 0, 0],
    [0, 255, 0],
    [255, 255, 0],
    [0, 0, 255],
    [255, 0, 255],
    [0, 255, 255],
    [255, 255, 255],
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// RGB value of an entry of the xterm 256 color palette.
fn palette(index: u8) -> [u8; 3] {
    match index {
        0..=15 => SYSTEM_COLORS[usize::from(index)],
        16..=231 => {
            let cube = usize::from(index - 16);
            [
                CUBE_LEVELS[cube / 36],
                CUBE_LEVELS[(cube / 6) % 6],
                CUBE_LEVELS[cube % 6],
            ]
        }
        232..=255 => {
            let gray = 8 + (index - 232) * 10;
            [gray, gray, gray]
        }
    }
}

/// Index of the xterm 256 palette entry closest to `rgb`. Ties resolve to the lowest index.
pub fn rgb_to_ansi256(rgb: [u8; 3]) -> u8 {
    let distance = |other: [u8; 3]| -> u32 {
        rgb.iter()
            .zip(other.iter())
            .map(|(a, b)| {
                let d = u32::from(a.abs_diff(*b));
                d * d
            })
            .sum()
    };

    let mut best = 0u8;
    let mut best_distance = u32::MAX;
    for index in 0..=255u8 {
        let d = distance(palette(index));
        if d < best_distance {
            best = index;
            best_distance = d;
        }
    }
    best
}

/// Terminal color code for a hex style color.
pub fn hex2ansi256(color: &str) -> Result<u8, ColorError> {
    hex2rgb(color).map(rgb_to_ansi256)
}

#[cfg(test)]
mod tests {
    use super::{hex2ansi256, hex2rgb, rgb_to_ansi256};

    #[test]
    fn test_hex2rgb() {
        assert_eq!(hex2rgb("#ff0000"), Ok([255, 0, 0]));
        assert_eq!(hex2rgb("#ffff00"), Ok([255, 255, 0]));
        assert_eq!(hex2rgb("#0000ff"), Ok([0, 0, 255]));
        assert_eq!(hex2rgb("#112233"), Ok([17, 34, 51]));
        assert_eq!(hex2rgb("#888"), Ok([136, 136, 136]));
    }

    #[test]
    fn test_hex2rgb_unsupported() {
        for input in ["33", "#12345", "#ggg", "rgb(1,2,3)", "", "#"] {
            let error = hex2rgb(input).unwrap_err();
            assert!(error.to_string().contains("unsupported"), "{input}");
        }
    }

    #[test]
    fn test_rgb_to_ansi256() {
        assert_eq!(rgb_to_ansi256([0, 0, 0]), 0);
        assert_eq!(rgb_to_ansi256([255, 0, 0]), 9);
        assert_eq!(rgb_to_ansi256([255, 255, 255]), 15);
        assert_eq!(rgb_to_ansi256([0, 95, 135]), 24);
        assert_eq!(rgb_to_ansi256([238, 238, 238]), 255);
        assert_eq!(hex2ansi256("#5f87af"), Ok(67));
    }
}
