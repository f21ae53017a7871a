//! Word-level prefix arithmetic.
//!
//! All range math in this crate is carried on `u128` words, wide enough for
//! the largest supported address family (IPv6 at 128 bits). Every function
//! takes an explicit `bits` width and is shift-safe for the full `0..=128`
//! range.

/// All-ones mask covering the low `bits` bits.
#[inline]
pub(crate) fn width_mask(bits: u8) -> u128 {
    debug_assert!(bits <= 128);
    if bits == 0 { 0 } else { u128::MAX >> (128 - bits as u32) }
}

/// Mask selecting the host bits (everything below the network/host split).
#[inline]
pub(crate) fn host_mask(prefix: u8, bits: u8) -> u128 {
    debug_assert!(prefix <= bits);
    width_mask(bits - prefix)
}

/// Mask selecting the network bits within `bits`.
#[inline]
pub(crate) fn prefix_mask(prefix: u8, bits: u8) -> u128 {
    width_mask(bits) & !host_mask(prefix, bits)
}

/// Returns the bit at `index`, counting from the most significant bit of the
/// `bits`-wide value.
#[inline]
pub(crate) fn bit_at(value: u128, index: u8, bits: u8) -> bool {
    debug_assert!(index < bits);
    (value >> (bits - 1 - index)) & 1 == 1
}

/// Whether `[lower, upper]` spans whole prefix blocks of length `prefix`:
/// lower's host bits are all zero and upper's are all one. `prefix >= bits`
/// is trivially true; `prefix == 0` requires the full value space.
#[inline]
pub(crate) fn is_prefix_block(lower: u128, upper: u128, prefix: u8, bits: u8) -> bool {
    if prefix >= bits {
        return true;
    }
    let host = host_mask(prefix, bits);
    lower & host == 0 && upper & host == host
}

/// The smallest prefix length `p` for which [`is_prefix_block`] holds.
///
/// A single value yields `bits`, the full span yields 0, and a range that is
/// not block-aligned at all also yields `bits` (where the predicate holds
/// trivially).
pub(crate) fn min_prefix_len_for_block(lower: u128, upper: u128, bits: u8) -> u8 {
    if lower == upper {
        return bits;
    }
    if lower == 0 && upper == width_mask(bits) {
        return 0;
    }
    let host = lower
        .trailing_zeros()
        .min(upper.trailing_ones())
        .min(bits as u32) as u8;
    bits - host
}

/// The prefix length for which `[lower, upper]` is exactly one prefix block,
/// or `None` when the range spans multiple prefix values.
pub(crate) fn prefix_len_for_single_block(lower: u128, upper: u128, bits: u8) -> Option<u8> {
    let prefix = min_prefix_len_for_block(lower, upper, bits);
    let host = bits - prefix;
    if host == 0 {
        return (lower == upper).then_some(prefix);
    }
    (lower >> host == upper >> host).then_some(prefix)
}

/// Length of the common leading bit run of two `bits`-wide values.
pub(crate) fn leading_common_bits(a: u128, b: u128, bits: u8) -> u8 {
    if bits == 0 {
        return 0;
    }
    let diff = (a ^ b) << (128 - bits as u32);
    (diff.leading_zeros() as u8).min(bits)
}

/// Reverses the low `bits` bits of `value`.
#[inline]
pub(crate) fn reverse_bits_in(value: u128, bits: u8) -> u128 {
    if bits == 0 {
        return 0;
    }
    value.reverse_bits() >> (128 - bits as u32)
}

/// Reverses the byte order of the low `bits` bits. `bits` must be a whole
/// number of bytes.
#[inline]
pub(crate) fn reverse_bytes_in(value: u128, bits: u8) -> u128 {
    debug_assert!(bits % 8 == 0);
    if bits == 0 {
        return 0;
    }
    value.swap_bytes() >> (128 - bits as u32)
}
