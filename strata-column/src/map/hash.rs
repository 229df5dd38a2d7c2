use super::MapColumn;
use crate::Column;
use crate::hash::{crc_hash, fnv_hash};

impl MapColumn {
    // The cardinality is hashed as 8 bytes so that the result does not depend on the offset width.
    pub(super) fn fnv_hash_row(&self, hash: &mut u32, idx: usize) {
        let elements = self.element_range(idx);
        *hash = fnv_hash(&(elements.len() as u64).to_le_bytes(), *hash);
        for element in elements {
            self.keys.fnv_hash_at(hash, element);
            self.values.fnv_hash_at(hash, element);
        }
    }

    pub(super) fn crc32_hash_row(&self, hash: &mut u32, idx: usize) {
        let elements = self.element_range(idx);
        *hash = crc_hash(&(elements.len() as u64).to_le_bytes(), *hash);
        for element in elements {
            self.keys.crc32_hash_at(hash, element);
            self.values.crc32_hash_at(hash, element);
        }
    }

    pub(super) fn xor_checksum_rows(&self, from: usize, to: usize) -> i64 {
        let cardinalities = self.offsets.as_slice()[from..=to]
            .windows(2)
            .fold(0i64, |checksum, window| {
                checksum ^ i64::from(window[1] - window[0])
            });
        let elements = self.elements_of(from, to);
        cardinalities
            ^ self.keys.xor_checksum(elements.start, elements.end)
            ^ self.values.xor_checksum(elements.start, elements.end)
    }
}

#[cfg(test)]
mod test {
    use crate::hash::{CRC_HASH_SEED, FNV_SEED, fnv_hash};
    use crate::test_harness::int_map_column;
    use crate::{Column, Datum, Int32Column};

    #[test]
    fn fnv_hash_layout() {
        let column = int_map_column(&[&[(1, 2)], &[]]);
        let mut hash = FNV_SEED;
        column.fnv_hash_at(&mut hash, 0);

        let mut expected = fnv_hash(&1u64.to_le_bytes(), FNV_SEED);
        expected = fnv_hash(&1i32.to_le_bytes(), expected);
        expected = fnv_hash(&2i32.to_le_bytes(), expected);
        assert_eq!(hash, expected);

        let mut empty = FNV_SEED;
        column.fnv_hash_at(&mut empty, 1);
        assert_eq!(empty, fnv_hash(&0u64.to_le_bytes(), FNV_SEED));
    }

    #[test]
    fn equal_rows_hash_equal() {
        let column = int_map_column(&[&[(1, 2), (3, 4)], &[(5, 6)], &[(1, 2), (3, 4)]]);
        let mut hashes = vec![FNV_SEED; 3];
        column.fnv_hash(&mut hashes, 0, 3);
        assert_eq!(hashes[0], hashes[2]);
        assert_ne!(hashes[0], hashes[1]);

        let mut crcs = vec![CRC_HASH_SEED; 3];
        column.crc32_hash(&mut crcs, 1, 3);
        assert_eq!(crcs[0], CRC_HASH_SEED);
        assert_ne!(crcs[1], crcs[2]);
    }

    #[test]
    fn element_order_matters() {
        let mut column = int_map_column(&[&[(1, 2), (3, 4)]]);
        for (key, value) in [(3, 4), (1, 2)] {
            column.keys_mut().append_datum(&Datum::Int32(key)).unwrap();
            column.values_mut().append_datum(&Datum::Int32(value)).unwrap();
        }
        column.push_offset(2).unwrap();
        assert_eq!(column.get(0).unwrap(), column.get(1).unwrap());

        let mut hashes = vec![FNV_SEED; 2];
        column.fnv_hash(&mut hashes, 0, 2);
        assert_ne!(hashes[0], hashes[1]);
    }

    #[test]
    fn xor_checksum_over_range() {
        let column = int_map_column(&[&[(1, 2)], &[(4, 8), (16, 32)]]);
        let ints = |values: Vec<i32>| Int32Column::from(values).xor_checksum(0, 2);
        assert_eq!(column.xor_checksum(1, 2), 2 ^ ints(vec![4, 16]) ^ ints(vec![8, 32]));
        assert_eq!(column.xor_checksum(0, 2), 1 ^ 2 ^ 1 ^ 2 ^ 4 ^ 16 ^ 8 ^ 32);
        assert_eq!(column.xor_checksum(1, 1), 0);
    }
}
