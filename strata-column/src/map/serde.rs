//! Row encoding: a little-endian `u32` cardinality, then each key followed by its value in the
//! children's own encodings.

use bytes::{Buf, BufMut};
use strata_error::{StrataResult, strata_bail};

use super::MapColumn;
use crate::Column;

const CARDINALITY_WIDTH: usize = size_of::<u32>();

impl MapColumn {
    pub(super) fn serialize_row(&self, idx: usize, dst: &mut [u8]) -> usize {
        let map_size = self.offsets.value(idx + 1) - self.offsets.value(idx);
        let mut header = &mut dst[..CARDINALITY_WIDTH];
        header.put_u32_le(map_size);

        let mut written = CARDINALITY_WIDTH;
        for element in self.element_range(idx) {
            written += self.keys.serialize(element, &mut dst[written..]);
            written += self.values.serialize(element, &mut dst[written..]);
        }
        written
    }

    pub(super) fn serialize_empty_row(&self, dst: &mut [u8]) -> usize {
        let mut dst = dst;
        dst.put_u32_le(0);
        CARDINALITY_WIDTH
    }

    pub(super) fn row_serialize_size(&self, idx: usize) -> usize {
        self.element_range(idx)
            .map(|element| self.keys.serialize_size(element) + self.values.serialize_size(element))
            .sum::<usize>()
            + CARDINALITY_WIDTH
    }

    /// Decodes one row. On failure the children are truncated back to their previous length.
    pub(super) fn deserialize_row<'a>(&mut self, src: &'a [u8]) -> StrataResult<&'a [u8]> {
        let mut src = src;
        if src.remaining() < CARDINALITY_WIDTH {
            strata_bail!(
                InvalidSerde: "map row needs a {} byte cardinality, {} remain",
                CARDINALITY_WIDTH,
                src.remaining()
            );
        }
        let map_size = src.get_u32_le();

        let elements = self.keys.len();
        let decoded = self
            .deserialize_elements(src, map_size)
            .and_then(|rest| self.push_offset(map_size as usize).map(|()| rest));
        if decoded.is_err() {
            self.keys.resize(elements);
            self.values.resize(elements);
        }
        decoded
    }

    fn deserialize_elements<'a>(&mut self, src: &'a [u8], map_size: u32) -> StrataResult<&'a [u8]> {
        let mut src = src;
        for _ in 0..map_size {
            src = self.keys.deserialize_and_append(src)?;
            src = self.values.deserialize_and_append(src)?;
        }
        Ok(src)
    }
}
