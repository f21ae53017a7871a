use std::{fmt, sync::OnceLock};

use itertools::Itertools;
use num::{BigUint, One};

use crate::{
    Family, IncompatibleErr, Key, RangeErr,
    bits::{host_mask, prefix_len_for_single_block, prefix_mask},
    range::BitRange,
};

/// An ordered sequence of [`BitRange`] divisions forming an address body.
///
/// A grouping is immutable: multiplicity and the grouping-level prefix are
/// derived once at construction (the prefix comes from the first division
/// carrying one, offset by the widths of the preceding divisions, and once a
/// division is multi-valued no later division may introduce one), and the
/// value count is computed lazily and published once.
///
/// The grouping with zero divisions and [`Family::None`] is a legal sentinel
/// rather than an error state; operations that need divisions treat it as
/// empty up front.
///
/// # Examples
///
/// ```
/// use bittrie::Grouping;
///
/// let block = Grouping::ipv4_block([10, 0, 0, 0], 24).unwrap();
/// assert_eq!(block.prefix_len(), Some(24));
/// assert_eq!(block.count().to_string(), "256");
///
/// let key = block.to_single_prefix_block_or_address().unwrap();
/// assert_eq!(key.to_string(), "10.0.0.0/24");
/// ```
#[derive(Debug, Clone)]
pub struct Grouping {
    family: Family,
    divisions: Vec<BitRange>,
    bits: u8,
    prefix: Option<u8>,
    multiple: bool,
    count: OnceLock<BigUint>,
}

impl PartialEq for Grouping {
    fn eq(&self, other: &Self) -> bool {
        // the cache and the derived fields don't participate
        self.family == other.family && self.divisions == other.divisions
    }
}

impl Eq for Grouping {}

impl Grouping {
    /// The empty sentinel grouping.
    pub fn empty() -> Self {
        Self {
            family: Family::None,
            divisions: Vec::new(),
            bits: 0,
            prefix: None,
            multiple: false,
            count: OnceLock::new(),
        }
    }

    /// Builds a grouping from divisions, deriving multiplicity and the
    /// grouping prefix in a single left-to-right pass.
    ///
    /// A family other than [`Family::None`] pins the division layout to that
    /// family's segmentation.
    pub fn new(family: Family, divisions: Vec<BitRange>) -> Result<Self, RangeErr> {
        let total: u16 = divisions.iter().map(|d| d.bit_count() as u16).sum();
        if total > 128 {
            return Err(RangeErr::GroupingTooWide { bits: total });
        }
        if family != Family::None {
            let layout_ok = divisions.len() == family.segment_count() as usize
                && divisions.iter().all(|d| d.bit_count() == family.segment_bits());
            if !layout_ok {
                return Err(RangeErr::LayoutMismatch { family });
            }
        }

        let mut prefix = None;
        let mut multiple = false;
        let mut offset = 0u8;
        for division in &divisions {
            if prefix.is_none()
                && !multiple
                && let Some(p) = division.prefix_len()
            {
                prefix = Some(offset + p);
            }
            multiple |= division.is_multiple();
            offset += division.bit_count();
        }

        Ok(Self {
            family,
            divisions,
            bits: total as u8,
            prefix,
            multiple,
            count: OnceLock::new(),
        })
    }

    /// An IPv4 address grouping.
    pub fn ipv4(octets: [u8; 4]) -> Self {
        Self::from_segments(Family::Ipv4, octets.iter().map(|&o| o as u128), None)
            .unwrap_or_else(|_| unreachable!("fixed ipv4 layout"))
    }

    /// The IPv4 CIDR block for `octets`/`prefix`; host bits are widened to
    /// the full block.
    pub fn ipv4_block(octets: [u8; 4], prefix: u8) -> Result<Self, RangeErr> {
        Self::from_segments(Family::Ipv4, octets.iter().map(|&o| o as u128), Some(prefix))
    }

    /// An IPv6 address grouping.
    pub fn ipv6(segments: [u16; 8]) -> Self {
        Self::from_segments(Family::Ipv6, segments.iter().map(|&s| s as u128), None)
            .unwrap_or_else(|_| unreachable!("fixed ipv6 layout"))
    }

    /// The IPv6 CIDR block for `segments`/`prefix`.
    pub fn ipv6_block(segments: [u16; 8], prefix: u8) -> Result<Self, RangeErr> {
        Self::from_segments(Family::Ipv6, segments.iter().map(|&s| s as u128), Some(prefix))
    }

    /// A MAC-48 address grouping.
    pub fn mac(bytes: [u8; 6]) -> Self {
        Self::from_segments(Family::Mac, bytes.iter().map(|&b| b as u128), None)
            .unwrap_or_else(|_| unreachable!("fixed mac layout"))
    }

    /// An EUI-64 address grouping.
    pub fn mac_ext(bytes: [u8; 8]) -> Self {
        Self::from_segments(Family::MacExt, bytes.iter().map(|&b| b as u128), None)
            .unwrap_or_else(|_| unreachable!("fixed eui-64 layout"))
    }

    fn from_segments(
        family: Family,
        segments: impl Iterator<Item = u128>,
        prefix: Option<u8>,
    ) -> Result<Self, RangeErr> {
        if let Some(p) = prefix
            && p > family.bit_count()
        {
            return Err(RangeErr::PrefixOverflow { prefix: p, bits: family.bit_count() });
        }
        let seg_bits = family.segment_bits();
        let mut divisions = Vec::with_capacity(family.segment_count() as usize);
        let mut offset = 0u8;
        for value in segments {
            let division = match prefix {
                Some(p) if p < offset + seg_bits => {
                    let rel = p.saturating_sub(offset);
                    BitRange::prefixed(
                        seg_bits,
                        value & prefix_mask(rel, seg_bits),
                        value | host_mask(rel, seg_bits),
                        rel,
                    )?
                }
                _ => BitRange::single(seg_bits, value)?,
            };
            divisions.push(division);
            offset += seg_bits;
        }
        Self::new(family, divisions)
    }

    #[inline]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Total bit count across all divisions.
    #[inline]
    pub fn bit_count(&self) -> u8 {
        self.bits
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.divisions.is_empty()
    }

    #[inline]
    pub fn division_count(&self) -> usize {
        self.divisions.len()
    }

    #[inline]
    pub fn division(&self, index: usize) -> Option<&BitRange> {
        self.divisions.get(index)
    }

    #[inline]
    pub fn divisions(&self) -> &[BitRange] {
        &self.divisions
    }

    /// True when any division spans more than one value.
    #[inline]
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// The grouping-level prefix length, if any division declared one.
    #[inline]
    pub fn prefix_len(&self) -> Option<u8> {
        self.prefix
    }

    /// The number of values in the grouping: the product of the division
    /// counts. Computed on first use and cached; racing readers may compute
    /// it redundantly but observe a single published value.
    pub fn count(&self) -> &BigUint {
        self.count
            .get_or_init(|| self.divisions.iter().map(BitRange::count).product())
    }

    /// The number of distinct prefixes of length `prefix` in the grouping:
    /// full counts inside the prefix, the partial count of the straddling
    /// division, 1 beyond it.
    pub fn prefix_count(&self, prefix: u8) -> BigUint {
        if prefix >= self.bits {
            return self.count().clone();
        }
        let mut remaining = prefix;
        let mut acc = BigUint::one();
        for division in &self.divisions {
            if remaining == 0 {
                break;
            }
            if remaining >= division.bit_count() {
                acc *= division.count();
                remaining -= division.bit_count();
            } else {
                acc *= division.prefix_count(remaining);
                remaining = 0;
            }
        }
        acc
    }

    /// True iff the grouping's value set is one gap-free run: at most one
    /// division is multi-valued and every division after it spans its full
    /// value space, mirroring positional-numeral carrying.
    pub fn is_sequential(&self) -> bool {
        let mut seen_multiple = false;
        for division in &self.divisions {
            if seen_multiple && !division.is_full_range() {
                return false;
            }
            seen_multiple |= division.is_multiple();
        }
        true
    }

    /// The minimal division index from which every later division is
    /// full-range.
    pub fn sequential_block_index(&self) -> usize {
        if self.divisions.is_empty() {
            return 0;
        }
        let mut index = self.divisions.len() - 1;
        while index > 0 && self.divisions[index].is_full_range() {
            index -= 1;
        }
        index
    }

    /// The minimal number of sequential sub-ranges covering the grouping:
    /// one per value combination of the divisions before the sequential
    /// block index.
    pub fn sequential_block_count(&self) -> BigUint {
        let index = self.sequential_block_index();
        self.divisions[..index].iter().map(BitRange::count).product()
    }

    /// The flattened `(lower, upper)` hull of the grouping. For a sequential
    /// grouping this is exactly its value set.
    pub fn bounds(&self) -> (u128, u128) {
        self.divisions.iter().fold((0, 0), |(lower, upper), d| {
            let bits = d.bit_count();
            (lower << bits | d.lower(), upper << bits | d.upper())
        })
    }

    /// Big-endian bytes of the lowest value, for external rendering.
    pub fn lower_bytes(&self) -> Vec<u8> {
        self.value_bytes(self.bounds().0)
    }

    /// Big-endian bytes of the highest value.
    pub fn upper_bytes(&self) -> Vec<u8> {
        self.value_bytes(self.bounds().1)
    }

    fn value_bytes(&self, value: u128) -> Vec<u8> {
        let len = self.bits.div_ceil(8) as usize;
        value.to_be_bytes()[16 - len..].to_vec()
    }

    /// The network portion for `prefix`: host bits zeroed across divisions,
    /// the prefix assigned. Returns a value equal to `self` when nothing
    /// changes.
    pub fn to_network(&self, prefix: u8) -> Self {
        if prefix >= self.bits {
            return self.clone();
        }
        let mut offset = 0u8;
        let divisions = self
            .divisions
            .iter()
            .map(|d| {
                let width = d.bit_count();
                // only the division the boundary falls into (or one past it)
                // carries a relative prefix; divisions wholly inside the
                // network stay as they are
                let division = if prefix >= offset + width {
                    *d
                } else {
                    d.to_network(prefix.saturating_sub(offset))
                        .unwrap_or_else(|_| unreachable!("relative prefix bounded by division width"))
                };
                offset += width;
                division
            })
            .collect();
        Self::new(self.family, divisions)
            .unwrap_or_else(|_| unreachable!("division layout unchanged"))
    }

    /// The host portion for `prefix`: network bits zeroed across divisions.
    /// Fails when a division's host values would not stay contiguous.
    pub fn to_host(&self, prefix: u8) -> Result<Self, IncompatibleErr> {
        let mut offset = 0u8;
        let divisions = self
            .divisions
            .iter()
            .map(|d| {
                let rel = prefix.saturating_sub(offset).min(d.bit_count());
                offset += d.bit_count();
                d.to_host(rel)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(self.family, divisions)
            .unwrap_or_else(|_| unreachable!("division layout unchanged")))
    }

    /// Reduces the grouping to its canonical trie key.
    ///
    /// A single prefix-free value passes through; a grouping that is exactly
    /// one prefix block becomes that block with its minimal single-block
    /// prefix. Anything else (a sequential range that is not prefix-aligned,
    /// a scattered multi-division range, a prefixed single value with host
    /// bits set) is rejected: the trie never stores an arbitrary range.
    pub fn to_single_prefix_block_or_address(&self) -> Result<Key, IncompatibleErr> {
        if self.is_empty() {
            return Err(IncompatibleErr::NotSinglePrefixBlock);
        }
        if !self.multiple {
            let (value, _) = self.bounds();
            return match self.prefix {
                Some(p) if p < self.bits => {
                    if value & host_mask(p, self.bits) != 0 {
                        // a prefixed address with host bits is neither a
                        // block nor a plain address
                        Err(IncompatibleErr::NotSinglePrefixBlock)
                    } else {
                        Ok(Key::normalized(self.bits, value, Some(p)))
                    }
                }
                _ => Ok(Key::normalized(self.bits, value, None)),
            };
        }
        if !self.is_sequential() {
            return Err(IncompatibleErr::NotSinglePrefixBlock);
        }
        let (lower, upper) = self.bounds();
        let Some(block_prefix) = prefix_len_for_single_block(lower, upper, self.bits) else {
            return Err(IncompatibleErr::NotSinglePrefixBlock);
        };
        if let Some(declared) = self.prefix
            && declared != block_prefix
        {
            return Err(IncompatibleErr::PrefixMismatch { prefix: declared });
        }
        Ok(Key::normalized(self.bits, lower, Some(block_prefix)))
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = matches!(self.family, Family::Ipv6 | Family::Mac | Family::MacExt);
        let sep = if self.family == Family::Ipv4 { "." } else { ":" };
        let body = self
            .divisions
            .iter()
            .map(|d| {
                let one = |v: u128| {
                    if !hex {
                        format!("{v}")
                    } else if self.family == Family::Ipv6 {
                        format!("{v:x}")
                    } else {
                        format!("{v:02x}")
                    }
                };
                if d.is_multiple() {
                    format!("{}-{}", one(d.lower()), one(d.upper()))
                } else {
                    one(d.lower())
                }
            })
            .join(sep);
        f.write_str(&body)?;
        if let Some(prefix) = self.prefix {
            write!(f, "/{prefix}")?;
        }
        Ok(())
    }
}
