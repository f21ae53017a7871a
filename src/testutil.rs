use rand::{RngExt, SeedableRng, rngs::StdRng};

use crate::Key;

/// IPv4 address key from octets.
pub fn v4(octets: [u8; 4]) -> Key {
    Key::ipv4(octets)
}

/// IPv4 block key from octets and a prefix length. Host bits are masked.
pub fn v4_block(octets: [u8; 4], prefix: u8) -> Key {
    Key::ipv4_block(octets, prefix).unwrap()
}

/// Seeded generator of IPv4 keys for randomized tests.
pub struct KeyGen {
    rng: StdRng,
}

impl KeyGen {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// A uniformly random address key.
    pub fn address(&mut self) -> Key {
        v4(self.rng.random::<u32>().to_be_bytes())
    }

    /// A random block key with a prefix length in `0..=32`.
    pub fn block(&mut self) -> Key {
        let prefix = self.rng.random_range(0..=32u8);
        v4_block(self.rng.random::<u32>().to_be_bytes(), prefix)
    }

    /// A random mix of addresses and blocks.
    pub fn keys(&mut self, count: usize) -> Vec<Key> {
        (0..count)
            .map(|_| {
                if self.rng.random_bool(0.5) {
                    self.address()
                } else {
                    self.block()
                }
            })
            .collect()
    }
}
