//! Address families and their compile-time markers.
//!
//! The runtime [`Family`] discriminant tags groupings and keys; the sealed
//! [`AddressFamily`] marker types let the typed trie wrappers bind one family
//! statically instead of reinterpreting pointers across specializations.

/// The address family of a grouping or trie.
///
/// `None` marks the family-less sentinel: a grouping with zero divisions, or
/// generic division math that has not been bound to an address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Family {
    #[default]
    None,
    Ipv4,
    Ipv6,
    /// MAC-48 hardware addresses.
    Mac,
    /// EUI-64 extended hardware addresses.
    MacExt,
}

impl Family {
    /// Total bit width of one address of this family.
    pub const fn bit_count(self) -> u8 {
        match self {
            Family::None => 0,
            Family::Ipv4 => 32,
            Family::Ipv6 => 128,
            Family::Mac => 48,
            Family::MacExt => 64,
        }
    }

    /// Bit width of one segment.
    pub const fn segment_bits(self) -> u8 {
        match self {
            Family::None => 0,
            Family::Ipv6 => 16,
            Family::Ipv4 | Family::Mac | Family::MacExt => 8,
        }
    }

    /// Number of segments in one address.
    pub const fn segment_count(self) -> u8 {
        match self {
            Family::None => 0,
            Family::Ipv4 => 4,
            Family::Ipv6 => 8,
            Family::Mac => 6,
            Family::MacExt => 8,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Ipv4 {}
    impl Sealed for super::Ipv6 {}
    impl Sealed for super::Mac {}
    impl Sealed for super::MacExt {}
}

/// Compile-time address-family marker for [`crate::AddressTrie`] and
/// [`crate::AssociativeAddressTrie`].
pub trait AddressFamily: sealed::Sealed + 'static {
    const FAMILY: Family;
    const BITS: u8 = Self::FAMILY.bit_count();
}

/// Marker for [`Family::Ipv4`].
pub struct Ipv4;
/// Marker for [`Family::Ipv6`].
pub struct Ipv6;
/// Marker for [`Family::Mac`].
pub struct Mac;
/// Marker for [`Family::MacExt`].
pub struct MacExt;

impl AddressFamily for Ipv4 {
    const FAMILY: Family = Family::Ipv4;
}

impl AddressFamily for Ipv6 {
    const FAMILY: Family = Family::Ipv6;
}

impl AddressFamily for Mac {
    const FAMILY: Family = Family::Mac;
}

impl AddressFamily for MacExt {
    const FAMILY: Family = Family::MacExt;
}
