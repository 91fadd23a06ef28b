//! Little-endian integer decoding for the binary workbook format.
//! Callers slice the input to the exact width first.

#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes([s[0], s[1]])
}

#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes([s[0], s[1], s[2], s[3]])
}

#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s) as usize
}

#[inline]
pub(crate) fn to_u64(s: &[u8]) -> u64 {
    u64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
}

#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_bits(to_u64(s))
}

/// Splits a byte slice into consecutive 32-bit sector identifiers; a trailing partial chunk is ignored.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(to_usize)
}
