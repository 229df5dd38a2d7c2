//! Row hash functions shared by every column kind.
//!
//! Hashes are folded into a caller-provided running value so that multi-column keys and nested
//! values can be hashed incrementally.

/// FNV-1a prime.
pub const FNV_PRIME: u32 = 0x0100_0193;
/// FNV-1a offset basis, the customary starting value of a running FNV hash.
pub const FNV_SEED: u32 = 0x811C_9DC5;
/// Customary starting value of a running CRC32 hash.
pub const CRC_HASH_SEED: u32 = 0x811C_9DC5;
/// Mixed into a running hash in place of a null value.
pub const NULL_HASH_SEED: u32 = 0x9E37_79B9;

/// FNV-1a over `data`, continuing from `hash`.
#[inline]
pub fn fnv_hash(data: &[u8], hash: u32) -> u32 {
    data.iter()
        .fold(hash, |hash, &byte| (u32::from(byte) ^ hash).wrapping_mul(FNV_PRIME))
}

/// Zlib-compatible CRC32 over `data`, continuing from `hash`.
#[inline]
pub fn crc_hash(data: &[u8], hash: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(hash);
    hasher.update(data);
    hasher.finalize()
}

/// Folds a null into the running hash. Used by both the FNV and CRC32 families.
#[inline]
pub fn null_hash(hash: u32) -> u32 {
    hash ^ NULL_HASH_SEED
        .wrapping_add(hash << 6)
        .wrapping_add(hash >> 2)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fnv_reference_values() {
        assert_eq!(fnv_hash(b"", FNV_SEED), FNV_SEED);
        assert_eq!(fnv_hash(b"a", FNV_SEED), 0xE40C_292C);
        assert_eq!(fnv_hash(b"foobar", FNV_SEED), 0xBF9C_F968);
    }

    #[test]
    fn crc_reference_values() {
        assert_eq!(crc_hash(b"123456789", 0), 0xCBF4_3926);
        assert_eq!(crc_hash(b"", 42), 42);
    }

    #[test]
    fn hashes_continue() {
        assert_eq!(
            fnv_hash(b"bar", fnv_hash(b"foo", FNV_SEED)),
            fnv_hash(b"foobar", FNV_SEED)
        );
        assert_eq!(
            crc_hash(b"6789", crc_hash(b"12345", 0)),
            crc_hash(b"123456789", 0)
        );
    }

    #[test]
    fn null_hash_mixes() {
        assert_eq!(null_hash(0), NULL_HASH_SEED);
        assert_ne!(null_hash(FNV_SEED), FNV_SEED);
    }
}
