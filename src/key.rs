use std::{cmp::Ordering, fmt};

use itertools::Itertools;

use crate::{
    Family, RangeErr,
    bits::{bit_at, prefix_mask, width_mask},
};

/// The canonical `(bit width, prefix length, value)` triple admissible into
/// the trie: a single address (no prefix) or an exact prefix block.
///
/// Keys are normalized on construction: host bits below the prefix are zero,
/// and a prefix equal to the full width is stored as no prefix (a /32 IPv4
/// "block" of one address *is* that address).
///
/// # Ordering
///
/// Keys sort by their common prefix bits first. When those tie and the
/// prefix lengths differ, the bit immediately following the shorter prefix
/// in the longer-prefixed key decides: 0 sorts the longer-prefixed key
/// before the block, 1 after it. This puts a block between its lower and
/// upper halves:
///
/// ```
/// use bittrie::Key;
///
/// let a = Key::ipv4([1, 2, 3, 0]);
/// let block = Key::ipv4_block([1, 2, 3, 0], 31).unwrap();
/// let b = Key::ipv4([1, 2, 3, 1]);
/// assert!(a < block);
/// assert!(block < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    value: u128,
    bits: u8,
    prefix: Option<u8>,
}

static_assertions::const_assert_eq!(std::mem::size_of::<Key>(), 32);

impl Key {
    /// Builds a key, masking the value down to its prefix.
    pub fn new(bits: u8, value: u128, prefix: Option<u8>) -> Result<Self, RangeErr> {
        if bits > 128 {
            return Err(RangeErr::WidthOverflow { bits });
        }
        if value > width_mask(bits) {
            return Err(RangeErr::ValueOverflow { value, bits });
        }
        if let Some(prefix) = prefix
            && prefix > bits
        {
            return Err(RangeErr::PrefixOverflow { prefix, bits });
        }
        Ok(Self::normalized(bits, value, prefix))
    }

    pub(crate) fn normalized(bits: u8, value: u128, prefix: Option<u8>) -> Self {
        match prefix {
            Some(p) if p < bits => Self { value: value & prefix_mask(p, bits), bits, prefix: Some(p) },
            _ => Self { value, bits, prefix: None },
        }
    }

    /// An IPv4 address key.
    pub fn ipv4(octets: [u8; 4]) -> Self {
        Self { value: u32::from_be_bytes(octets) as u128, bits: 32, prefix: None }
    }

    /// An IPv4 CIDR block key; host bits of `octets` are masked away.
    pub fn ipv4_block(octets: [u8; 4], prefix: u8) -> Result<Self, RangeErr> {
        Self::new(32, u32::from_be_bytes(octets) as u128, Some(prefix))
    }

    /// An IPv6 address key.
    pub fn ipv6(segments: [u16; 8]) -> Self {
        let value = segments
            .iter()
            .fold(0u128, |acc, &seg| acc << 16 | seg as u128);
        Self { value, bits: 128, prefix: None }
    }

    /// An IPv6 CIDR block key; host bits are masked away.
    pub fn ipv6_block(segments: [u16; 8], prefix: u8) -> Result<Self, RangeErr> {
        let value = segments
            .iter()
            .fold(0u128, |acc, &seg| acc << 16 | seg as u128);
        Self::new(128, value, Some(prefix))
    }

    /// A MAC-48 address key.
    pub fn mac(bytes: [u8; 6]) -> Self {
        let value = bytes.iter().fold(0u128, |acc, &b| acc << 8 | b as u128);
        Self { value, bits: 48, prefix: None }
    }

    /// An EUI-64 address key.
    pub fn mac_ext(bytes: [u8; 8]) -> Self {
        Self { value: u64::from_be_bytes(bytes) as u128, bits: 64, prefix: None }
    }

    #[inline]
    pub fn bit_count(&self) -> u8 {
        self.bits
    }

    #[inline]
    pub fn value(&self) -> u128 {
        self.value
    }

    #[inline]
    pub fn prefix_len(&self) -> Option<u8> {
        self.prefix
    }

    /// True when the key names a block rather than a single address.
    #[inline]
    pub fn is_block(&self) -> bool {
        self.prefix.is_some()
    }

    /// The address family implied by the bit width, or [`Family::None`] for
    /// generic widths.
    pub fn family(&self) -> Family {
        match self.bits {
            32 => Family::Ipv4,
            128 => Family::Ipv6,
            48 => Family::Mac,
            64 => Family::MacExt,
            _ => Family::None,
        }
    }

    /// Prefix length with "no prefix" reading as the full width.
    #[inline]
    pub(crate) fn effective_prefix(&self) -> u8 {
        self.prefix.unwrap_or(self.bits)
    }

    #[inline]
    pub(crate) fn bit(&self, index: u8) -> bool {
        bit_at(self.value, index, self.bits)
    }

    /// Bit-prefix containment: this key's block includes `other` (equal keys
    /// contain each other).
    pub fn contains(&self, other: &Key) -> bool {
        if self.bits != other.bits {
            return false;
        }
        let prefix = self.effective_prefix();
        if prefix > other.effective_prefix() {
            return false;
        }
        if prefix == 0 {
            return true;
        }
        (self.value ^ other.value) >> (self.bits - prefix) == 0
    }

    /// The inclusive value range the key covers.
    pub fn range(&self) -> (u128, u128) {
        let host = width_mask(self.bits - self.effective_prefix());
        (self.value, self.value | host)
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // keys of different widths never share a trie; order by width so
        // Ord stays total
        if self.bits != other.bits {
            return self.bits.cmp(&other.bits);
        }
        let (pa, pb) = (self.effective_prefix(), other.effective_prefix());
        let common = pa.min(pb);
        if common > 0 {
            let shift = self.bits - common;
            match (self.value >> shift).cmp(&(other.value >> shift)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        if pa == pb {
            return Ordering::Equal;
        }
        // common bits tie: the bit following the shorter prefix in the
        // longer-prefixed key decides, 0 sorting it before the block
        if pa < pb {
            if other.bit(pa) { Ordering::Less } else { Ordering::Greater }
        } else if self.bit(pb) {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bits {
            32 => {
                let octets = (self.value as u32).to_be_bytes();
                write!(f, "{}", octets.iter().join("."))?;
            }
            128 => {
                let groups = (0..8).map(|i| format!("{:x}", (self.value >> (112 - i * 16)) as u16));
                write!(f, "{}", groups.format(":"))?;
            }
            48 | 64 => {
                let bytes = (0..self.bits / 8)
                    .map(|i| format!("{:02x}", (self.value >> (self.bits - 8 - i * 8)) as u8));
                write!(f, "{}", bytes.format(":"))?;
            }
            _ => write!(f, "{}", self.value)?,
        }
        if let Some(prefix) = self.prefix {
            write!(f, "/{prefix}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_normalization() {
        // host bits are masked, full-width prefix is dropped
        let block = Key::ipv4_block([1, 2, 3, 77], 24).unwrap();
        assert_eq!(block, Key::ipv4_block([1, 2, 3, 0], 24).unwrap());
        assert_eq!(block.to_string(), "1.2.3.0/24");

        let full = Key::ipv4_block([1, 2, 3, 4], 32).unwrap();
        assert_eq!(full, Key::ipv4([1, 2, 3, 4]));
        assert_eq!(full.prefix_len(), None);

        assert_matches!(
            Key::ipv4_block([0, 0, 0, 0], 33),
            Err(RangeErr::PrefixOverflow { prefix: 33, bits: 32 })
        );
    }

    #[test]
    fn test_containment() {
        let block = Key::ipv4_block([10, 0, 0, 0], 8).unwrap();
        let narrow = Key::ipv4_block([10, 1, 0, 0], 16).unwrap();
        let addr = Key::ipv4([10, 1, 2, 3]);
        let outside = Key::ipv4([11, 0, 0, 0]);

        assert!(block.contains(&narrow));
        assert!(block.contains(&addr));
        assert!(narrow.contains(&addr));
        assert!(!narrow.contains(&block));
        assert!(!block.contains(&outside));
        assert!(block.contains(&block));

        // the zero-prefix block contains everything of its width
        let root = Key::ipv4_block([0, 0, 0, 0], 0).unwrap();
        assert!(root.contains(&addr));
        assert!(!root.contains(&Key::mac([0; 6])));
    }

    #[test]
    fn test_range() {
        let block = Key::ipv4_block([10, 0, 0, 0], 8).unwrap();
        assert_eq!(block.range(), (0x0a00_0000, 0x0aff_ffff));
        let addr = Key::ipv4([10, 1, 2, 3]);
        assert_eq!(addr.range(), (0x0a01_0203, 0x0a01_0203));
    }

    #[test]
    fn test_ordering() {
        // block sorts between its lower and upper halves
        let keys = [
            Key::ipv4([1, 2, 3, 0]),
            Key::ipv4_block([1, 2, 3, 0], 31).unwrap(),
            Key::ipv4([1, 2, 3, 1]),
            Key::ipv4_block([1, 2, 4, 0], 24).unwrap(),
            Key::ipv4([1, 2, 4, 128]),
        ];
        assert!(keys.iter().tuple_windows().all(|(a, b)| a < b));

        // a /31 block sorts after the address below it and before the one above
        let a = Key::ipv4([10, 0, 0, 1]);
        let block = Key::ipv4_block([10, 0, 0, 2], 31).unwrap();
        let b = Key::ipv4([10, 0, 0, 5]);
        assert!(a < block && block < b);

        assert_eq!(
            Key::ipv4([1, 2, 3, 4]).cmp(&Key::ipv4([1, 2, 3, 4])),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::ipv4([10, 0, 0, 1]).to_string(), "10.0.0.1");
        assert_eq!(
            Key::ipv4_block([10, 0, 0, 0], 8).unwrap().to_string(),
            "10.0.0.0/8"
        );
        assert_eq!(
            Key::ipv6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]).to_string(),
            "2001:db8:0:0:0:0:0:1"
        );
        assert_eq!(
            Key::mac([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]).to_string(),
            "de:ad:be:ef:00:01"
        );
        assert_eq!(Key::new(4, 0b0100, Some(2)).unwrap().to_string(), "4/2");
    }
}
