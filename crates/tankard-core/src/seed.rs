//! Seeded deterministic sampling. The kernel never pulls entropy from the
//! environment; every roll mixes the session seed with a stable stream id
//! so replays with the same seed reproduce the same world.

pub fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut value = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value ^= value.rotate_left(29);
    value = value.wrapping_mul(0x517C_C1B7_2722_0A95);
    value ^ (value >> 31)
}

/// Inclusive-range sample derived from (seed, stream). Collapses to `min`
/// when the range is empty.
pub fn sample_range_i64(seed: u64, stream: u64, min: i64, max: i64) -> i64 {
    if max <= min {
        return min;
    }
    let span = (max - min + 1) as u64;
    let mixed = mix_seed(seed, stream);
    min + (mixed % span) as i64
}

pub fn stable_str_hash(value: &str) -> u64 {
    let mut hash = 0_u64;
    for byte in value.as_bytes() {
        hash = hash.rotate_left(5) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    hash
}
