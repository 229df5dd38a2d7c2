use arrow_buffer::BooleanBuffer;

use crate::Mask;

impl Mask {
    /// Builds a mask from a byte-per-row filter, where any non-zero byte keeps its row.
    pub fn from_filter(filter: &[u8]) -> Self {
        Self::from_buffer(BooleanBuffer::collect_bool(filter.len(), |i| filter[i] != 0))
    }

    /// Lowers the mask to the byte-per-row filter of `0`s and `1`s that column compaction kernels
    /// consume.
    pub fn to_filter(&self) -> Vec<u8> {
        match self {
            Mask::AllTrue(len) => vec![1; *len],
            Mask::AllFalse(len) => vec![0; *len],
            Mask::Values(values) => values.buffer.iter().map(u8::from).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::Mask;

    #[test]
    fn filter_bytes_roundtrip() {
        let mask = Mask::from_filter(&[1, 0, 7, 1, 0]);
        assert_eq!(mask.true_count(), 3);
        assert_eq!(mask.to_filter(), vec![1, 0, 1, 1, 0]);
        assert_eq!(Mask::from_indices(4, &[1, 3]).to_filter(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn uniform_filters() {
        assert!(Mask::from_filter(&[2, 2, 2]).all_true());
        assert!(Mask::from_filter(&[0, 0]).all_false());
        assert_eq!(Mask::new_true(3).to_filter(), vec![1, 1, 1]);
        assert_eq!(Mask::new_false(2).to_filter(), vec![0, 0]);
    }
}
