//! Unsigned LEB128 varints, as used by protobuf, multiformats and CAR framing.

/// Append `value` as an unsigned varint.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decode an unsigned varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed, or `None` if `data`
/// ends mid-varint or the value overflows 64 bits.
pub fn read_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in data.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
