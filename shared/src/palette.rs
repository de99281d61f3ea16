/// Number of palette entries, including the reserved unset slot.
pub const PALETTE_LEN: usize = 42;

/// Palette index meaning "never painted". Erasing writes this value.
pub const UNSET: u8 = 0;

/// Colour shown for unset pixels.
pub const PAPER: (u8, u8, u8) = (0xFF, 0xFF, 0xFF);

/// The fixed canvas palette. Index 0 is the unset slot and renders as [`PAPER`].
pub const PALETTE: [(u8, u8, u8); PALETTE_LEN] = [
    PAPER,
    (0x00, 0x00, 0x00),
    (0x3C, 0x3C, 0x3C),
    (0x78, 0x78, 0x78),
    (0xAA, 0xAA, 0xAA),
    (0xD2, 0xD2, 0xD2),
    (0xFF, 0xFF, 0xFF),
    (0x60, 0x00, 0x18),
    (0xA5, 0x0E, 0x1E),
    (0xED, 0x1C, 0x24),
    (0xFA, 0x80, 0x72),
    (0xE4, 0x5C, 0x1A),
    (0xFF, 0x7F, 0x27),
    (0xF6, 0xAA, 0x09),
    (0xF9, 0xDD, 0x3B),
    (0xFF, 0xFA, 0xBC),
    (0x9C, 0x84, 0x31),
    (0xC5, 0xAD, 0x31),
    (0xE8, 0xD4, 0x5F),
    (0x4A, 0x6B, 0x3A),
    (0x5A, 0x94, 0x4A),
    (0x84, 0xC5, 0x73),
    (0x0E, 0xB9, 0x68),
    (0x13, 0xE6, 0x7B),
    (0x87, 0xFF, 0x5E),
    (0x0C, 0x81, 0x6E),
    (0x10, 0xAE, 0xA6),
    (0x13, 0xE1, 0xBE),
    (0x0F, 0x79, 0x9F),
    (0x60, 0xF7, 0xF2),
    (0xBB, 0xFA, 0xF2),
    (0x28, 0x50, 0x9E),
    (0x40, 0x93, 0xE4),
    (0x7D, 0xC7, 0xFF),
    (0x4D, 0x31, 0xB8),
    (0x6B, 0x50, 0xF6),
    (0x99, 0xB1, 0xFB),
    (0x4A, 0x42, 0x84),
    (0x7A, 0x71, 0xC4),
    (0xB5, 0xAE, 0xF1),
    (0x78, 0x0C, 0x99),
    (0xAA, 0x38, 0xB9),
];

/// Whether `index` addresses a palette entry (unset included).
pub fn is_valid(index: u8) -> bool {
    (index as usize) < PALETTE_LEN
}

/// Whether `index` is a colour a brush may paint with.
pub fn is_paintable(index: u8) -> bool {
    index != UNSET && is_valid(index)
}

/// RGB for a palette index. Out-of-range indices render as paper.
pub fn rgb(index: u8) -> (u8, u8, u8) {
    PALETTE.get(index as usize).copied().unwrap_or(PAPER)
}

/// CSS hex string (`#rrggbb`) for swatches.
pub fn css_hex(index: u8) -> String {
    let (r, g, b) = rgb(index);
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_is_valid_but_not_paintable() {
        assert!(is_valid(UNSET));
        assert!(!is_paintable(UNSET));
        assert!(is_paintable(1));
        assert!(is_paintable((PALETTE_LEN - 1) as u8));
        assert!(!is_valid(PALETTE_LEN as u8));
    }

    #[test]
    fn out_of_range_renders_as_paper() {
        assert_eq!(rgb(200), PAPER);
        assert_eq!(css_hex(1), "#000000");
    }
}
