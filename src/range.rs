use std::fmt;

use num::BigUint;

use crate::{
    IncompatibleErr, RangeErr,
    bits::{
        host_mask, is_prefix_block, min_prefix_len_for_block, prefix_len_for_single_block,
        prefix_mask, reverse_bits_in, reverse_bytes_in, width_mask,
    },
};

/// A fixed-bit-width inclusive value range with an optional prefix length:
/// the atomic unit of an address (one segment, or a larger division).
///
/// A `BitRange` is immutable once built. It is *multiple* when it spans more
/// than one value, and a *prefix block* when its values are exactly the set
/// sharing some network prefix.
///
/// # Examples
///
/// ```
/// use bittrie::BitRange;
///
/// // the /31 block containing 2 and 3, within an 8-bit segment
/// let block = BitRange::prefixed(8, 2, 3, 7).unwrap();
/// assert!(block.is_multiple());
/// assert!(block.is_prefix_block());
/// assert_eq!(block.prefix_len_for_single_block(), Some(7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    bits: u8,
    lower: u128,
    upper: u128,
    prefix: Option<u8>,
}

static_assertions::const_assert_eq!(std::mem::size_of::<BitRange>(), 48);

impl BitRange {
    /// A range holding exactly one value.
    pub fn single(bits: u8, value: u128) -> Result<Self, RangeErr> {
        Self::new(bits, value, value, None)
    }

    /// An unprefixed `[lower, upper]` range.
    pub fn span(bits: u8, lower: u128, upper: u128) -> Result<Self, RangeErr> {
        Self::new(bits, lower, upper, None)
    }

    /// The full value space of a `bits`-wide division, carrying no prefix.
    pub fn full(bits: u8) -> Result<Self, RangeErr> {
        Self::new(bits, 0, width_mask(bits), None)
    }

    /// A `[lower, upper]` range carrying a division-level prefix length.
    pub fn prefixed(bits: u8, lower: u128, upper: u128, prefix: u8) -> Result<Self, RangeErr> {
        Self::new(bits, lower, upper, Some(prefix))
    }

    /// Builds a range, validating every bound against the width.
    pub fn new(bits: u8, lower: u128, upper: u128, prefix: Option<u8>) -> Result<Self, RangeErr> {
        if bits > 128 {
            return Err(RangeErr::WidthOverflow { bits });
        }
        if lower > upper {
            return Err(RangeErr::InvertedBounds { lower, upper });
        }
        if upper > width_mask(bits) {
            return Err(RangeErr::ValueOverflow { value: upper, bits });
        }
        if let Some(prefix) = prefix
            && prefix > bits
        {
            return Err(RangeErr::PrefixOverflow { prefix, bits });
        }
        Ok(Self { bits, lower, upper, prefix })
    }

    #[inline]
    pub fn bit_count(&self) -> u8 {
        self.bits
    }

    #[inline]
    pub fn lower(&self) -> u128 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> u128 {
        self.upper
    }

    #[inline]
    pub fn prefix_len(&self) -> Option<u8> {
        self.prefix
    }

    /// True when the range spans more than one value.
    #[inline]
    pub fn is_multiple(&self) -> bool {
        self.lower != self.upper
    }

    /// True when the range spans its entire value space.
    #[inline]
    pub fn is_full_range(&self) -> bool {
        self.lower == 0 && self.upper == width_mask(self.bits)
    }

    /// The number of values in the range. A full 128-bit range holds
    /// 2^128 values, so the count is a [`BigUint`].
    pub fn count(&self) -> BigUint {
        BigUint::from(self.upper - self.lower) + 1u32
    }

    /// The number of distinct prefixes of length `prefix` occurring in the
    /// range.
    pub fn prefix_count(&self, prefix: u8) -> BigUint {
        if prefix >= self.bits {
            return self.count();
        }
        let host = self.bits - prefix;
        BigUint::from((self.upper >> host) - (self.lower >> host)) + 1u32
    }

    /// True iff the range is a single value equal to `value`.
    #[inline]
    pub fn matches(&self, value: u128) -> bool {
        !self.is_multiple() && self.lower == value
    }

    /// True iff masking the range with `mask` yields exactly `value`.
    ///
    /// For a multi-valued range the mask must first be compatible: every bit
    /// position that varies across the range (all bits at or below the
    /// highest differing bit of `lower ^ upper`) must be zero in the mask,
    /// otherwise masking would produce more than one result and this returns
    /// `false`.
    pub fn matches_with_mask(&self, value: u128, mask: u128) -> bool {
        if self.is_multiple() {
            let varying = u128::MAX >> (self.lower ^ self.upper).leading_zeros();
            if mask & varying != 0 {
                return false;
            }
        }
        self.lower & mask == value
    }

    /// Whether this range spans whole prefix blocks of its own prefix
    /// length. Carrying no prefix, it is not a prefix block.
    pub fn is_prefix_block(&self) -> bool {
        self.prefix
            .is_some_and(|p| is_prefix_block(self.lower, self.upper, p, self.bits))
    }

    /// Whether this range spans whole prefix blocks of length `prefix`.
    pub fn is_prefix_block_len(&self, prefix: u8) -> bool {
        is_prefix_block(self.lower, self.upper, prefix, self.bits)
    }

    /// The smallest prefix length for which [`Self::is_prefix_block_len`]
    /// holds.
    pub fn min_prefix_len_for_block(&self) -> u8 {
        min_prefix_len_for_block(self.lower, self.upper, self.bits)
    }

    /// The prefix length for which this range is exactly one prefix block,
    /// or `None` when it spans multiple prefix values.
    pub fn prefix_len_for_single_block(&self) -> Option<u8> {
        prefix_len_for_single_block(self.lower, self.upper, self.bits)
    }

    /// The network portion for `prefix`: host bits zeroed on both bounds,
    /// the prefix assigned. Returns `self` unchanged when it already is that
    /// division.
    pub fn to_network(&self, prefix: u8) -> Result<Self, RangeErr> {
        if prefix > self.bits {
            return Err(RangeErr::PrefixOverflow { prefix, bits: self.bits });
        }
        let mask = prefix_mask(prefix, self.bits);
        let (lower, upper) = (self.lower & mask, self.upper & mask);
        if lower == self.lower && upper == self.upper && self.prefix == Some(prefix) {
            return Ok(*self);
        }
        Ok(Self { bits: self.bits, lower, upper, prefix: Some(prefix) })
    }

    /// The host portion for `prefix`: network bits zeroed, no prefix on the
    /// result. Fails when the host values do not form one contiguous range
    /// (the range crosses a block boundary without wrapping cleanly).
    pub fn to_host(&self, prefix: u8) -> Result<Self, IncompatibleErr> {
        let prefix = prefix.min(self.bits);
        let shift = self.bits - prefix;
        let mask = host_mask(prefix, self.bits);
        let (lower, upper) = (self.lower & mask, self.upper & mask);
        if prefix == 0 || shift == 0 || self.lower >> shift == self.upper >> shift {
            // one network value: host bits map through directly
            if lower == self.lower && upper == self.upper && self.prefix.is_none() {
                return Ok(*self);
            }
            return Ok(Self { bits: self.bits, lower, upper, prefix: None });
        }
        // several network values: the host sets only stay contiguous when
        // they join into the full host span
        if upper + 1 >= lower {
            return Ok(Self { bits: self.bits, lower: 0, upper: mask, prefix: None });
        }
        Err(IncompatibleErr::NotMaskable)
    }

    /// Reverses the bits of the range, dropping any prefix.
    ///
    /// A single value reverses directly. A multi-valued range is reversible
    /// only in the canonical forms that map onto themselves: the full range,
    /// or the full range minus one or both boundary values (lower is zero or
    /// exactly one, upper is the maximum or exactly one less).
    pub fn reverse_bits(&self) -> Result<Self, IncompatibleErr> {
        if !self.is_multiple() {
            let value = reverse_bits_in(self.lower, self.bits);
            return Ok(Self { bits: self.bits, lower: value, upper: value, prefix: None });
        }
        self.reversible_form()
    }

    /// Reverses the bytes of the range, dropping any prefix. For a width of
    /// one byte the reversal is the identity and always succeeds; beyond
    /// that the same canonical-form argument as [`Self::reverse_bits`]
    /// applies per byte and carries across byte boundaries, reducing to the
    /// identical four reversible forms.
    pub fn reverse_bytes(&self) -> Result<Self, IncompatibleErr> {
        if self.bits % 8 != 0 {
            return Err(IncompatibleErr::IrreversibleRange);
        }
        if self.bits <= 8 {
            // one byte or none: byte reversal is the identity permutation
            return Ok(Self { prefix: None, ..*self });
        }
        if !self.is_multiple() {
            let value = reverse_bytes_in(self.lower, self.bits);
            return Ok(Self { bits: self.bits, lower: value, upper: value, prefix: None });
        }
        self.reversible_form()
    }

    /// Bit and byte reversal permute the value space while fixing zero and
    /// the maximum, so the four boundary-canonical ranges are exactly the
    /// multi-valued sets that reverse onto themselves.
    fn reversible_form(&self) -> Result<Self, IncompatibleErr> {
        let max = width_mask(self.bits);
        if self.lower <= 1 && self.upper >= max - 1 {
            Ok(Self { prefix: None, ..*self })
        } else {
            Err(IncompatibleErr::IrreversibleRange)
        }
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_multiple() {
            write!(f, "{}-{}", self.lower, self.upper)?;
        } else {
            write!(f, "{}", self.lower)?;
        }
        if let Some(prefix) = self.prefix {
            write!(f, "/{prefix}")?;
        }
        Ok(())
    }
}
