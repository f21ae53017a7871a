//! Bit-precise network address ranges and a compact binary trie over them.
//!
//! ## Key pieces:
//!
//! - **Ranges**: [`BitRange`] models one division of an address as a
//!   contiguous value range up to 128 bits wide; [`Grouping`] strings
//!   divisions together into whole IPv4/IPv6/MAC addresses, blocks, and
//!   subnet-style ranges, with prefix derivation and lazily cached counts.
//!
//! - **Keys**: [`Key`] is the canonical trie coordinate, a single address or
//!   an exact prefix block, normalized and totally ordered so that in-order
//!   trie traversal yields sorted output.
//!
//! - **Tries**: [`BinaryTrie`] is a PATRICIA-style binary trie keyed by
//!   [`Key`] with O(1) size, longest-prefix match, containment queries,
//!   subtree removal, and eight traversal orders plus a caching pre-order
//!   walk. [`AddressTrie`] and [`AssociativeAddressTrie`] bind a trie to one
//!   address family at compile time.

use thiserror::Error;

mod bits;
mod family;
mod grouping;
mod key;
mod range;
mod trie;
mod typed;

#[cfg(test)]
mod testutil;

pub use family::{AddressFamily, Family, Ipv4, Ipv6, Mac, MacExt};
pub use grouping::Grouping;
pub use key::Key;
pub use range::BitRange;
pub use trie::{BinaryTrie, CachingIter, NodeEntry};
pub use typed::{AddressTrie, AssociativeAddressTrie};

/// Rejected values and layouts when constructing ranges, keys, and
/// groupings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeErr {
    #[error("lower bound {lower:#x} exceeds upper bound {upper:#x}")]
    InvertedBounds { lower: u128, upper: u128 },

    #[error("value {value:#x} does not fit in {bits} bits")]
    ValueOverflow { value: u128, bits: u8 },

    #[error("bit width {bits} exceeds the 128-bit maximum")]
    WidthOverflow { bits: u8 },

    #[error("prefix length {prefix} exceeds the {bits}-bit width")]
    PrefixOverflow { prefix: u8, bits: u8 },

    #[error("divisions total {bits} bits, exceeding the 128-bit maximum")]
    GroupingTooWide { bits: u16 },

    #[error("divisions do not match the {family:?} segment layout")]
    LayoutMismatch { family: Family },
}

/// Conversions that are well-formed but impossible for the specific value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IncompatibleErr {
    #[error("not a single prefix block or address")]
    NotSinglePrefixBlock,

    #[error("range endpoints do not survive reversal")]
    IrreversibleRange,

    #[error("host values are not contiguous across the prefix boundary")]
    NotMaskable,

    #[error("declared prefix {prefix} does not match the block's prefix")]
    PrefixMismatch { prefix: u8 },
}
