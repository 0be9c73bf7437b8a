//! The bridge between on-wire Shift-JIS text and the internal Unicode
//! representation used everywhere else in this codebase, including the
//! per-title full-width ASCII mapping one game requires.

use crate::title::Title;
use encoding_rs::SHIFT_JIS;

const FULL_WIDTH_OFFSET: u32 = 0xFEE0;

/// Maps ASCII printables (`0x21..=0x7E`) into their full-width Unicode
/// counterparts (`U+FF01..=U+FF5E`); every other character passes through.
fn to_full_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{21}'..='\u{7E}' => {
                char::from_u32(c as u32 + FULL_WIDTH_OFFSET).unwrap_or(c)
            }
            other => other,
        })
        .collect()
}

/// Inverse of [`to_full_width`]: maps full-width forms back to their ASCII
/// originals.
fn from_full_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => {
                char::from_u32(c as u32 - FULL_WIDTH_OFFSET).unwrap_or(c)
            }
            other => other,
        })
        .collect()
}

/// Decodes bytes fresh off the wire into internal Unicode text, undoing the
/// title's full-width mapping if it has one.
pub fn decode_wire_text(title: &Title, bytes: &[u8]) -> String {
    let (cow, _, _) = SHIFT_JIS.decode(bytes);
    if title.full_width {
        from_full_width(&cow)
    } else {
        cow.into_owned()
    }
}

/// Encodes internal Unicode text for the wire, applying the title's
/// full-width mapping first if it has one.
pub fn encode_wire_text(title: &Title, text: &str) -> Vec<u8> {
    let mapped;
    let source: &str = if title.full_width {
        mapped = to_full_width(text);
        &mapped
    } else {
        text
    };
    let (cow, _, _) = SHIFT_JIS.encode(source);
    cow.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::GameId;

    #[test]
    fn ascii_round_trips_identity_for_plain_titles() {
        let title = Title::for_id(GameId::Daytona);
        let original = "Hello, IWANGO! 123";
        let wire = encode_wire_text(title, original);
        let back = decode_wire_text(title, &wire);
        assert_eq!(back, original);
    }

    #[test]
    fn full_width_title_maps_printables_on_encode_and_back_on_decode() {
        let title = Title::for_id(GameId::GolfShiyouYo);
        let original = "ABC";
        let wire = encode_wire_text(title, original);
        // Encoded bytes must differ from the plain-ASCII encoding since the
        // full-width codepoints are outside the ASCII range.
        let plain = Title::for_id(GameId::Daytona);
        assert_ne!(wire, encode_wire_text(plain, original));
        let back = decode_wire_text(title, &wire);
        assert_eq!(back, original);
    }

    #[test]
    fn full_width_mapping_is_exact_offset() {
        let mapped = to_full_width("!");
        assert_eq!(mapped.chars().next().unwrap() as u32, '!' as u32 + FULL_WIDTH_OFFSET);
        assert_eq!(from_full_width(&mapped), "!");
    }
}
