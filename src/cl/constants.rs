// Production bit-lengths. `SystemParameters::default()` is built from these.
pub const LARGE_MODULUS: usize = 2048;
pub const LARGE_MESSAGE: usize = 256;
pub const LARGE_E: usize = 597;
pub const LARGE_E_PRIME: usize = 120;
pub const LARGE_HASH: usize = 256;
pub const LARGE_STAT_ZK: usize = 80;
pub const LARGE_V: usize = 2724;
pub const LARGE_PRIME_CERTAINTY: usize = 80;
pub const LARGE_GAMMA: usize = 1632;
pub const LARGE_RHO: usize = 256;
pub const LARGE_PT: usize = 80;

/// Below this bound four-square decompositions are found by exhaustive search.
pub const FOUR_SQUARES_BRUTE_FORCE_LIMIT: u64 = 1 << 16;
