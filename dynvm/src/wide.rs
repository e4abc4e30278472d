//! UTF-16 code-unit buffers.
//!
//! String values carry a fixed 16-bit code unit regardless of the host
//! platform's wide-character width. Conversions to and from Rust strings
//! are lossy in the unpaired-surrogate corner, which cannot arise from
//! images (the on-disk encoding is UTF-8).

const SPACE: u16 = b' ' as u16;

/// Encode a Rust string into UTF-16 code units.
pub fn encode(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Decode UTF-16 code units into a Rust string.
pub fn decode(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Strip trailing space (U+0020) code units.
pub fn trim_end_spaces(units: &[u16]) -> &[u16] {
    let mut end = units.len();
    while end > 0 && units[end - 1] == SPACE {
        end -= 1;
    }
    &units[..end]
}

/// Strip leading space (U+0020) code units.
pub fn trim_start_spaces(units: &[u16]) -> &[u16] {
    let mut start = 0;
    while start < units.len() && units[start] == SPACE {
        start += 1;
    }
    &units[start..]
}
