use serde::{Deserialize, Serialize};
use strata_error::StrataResult;

/// Maximum number of rows (plus one offset sentinel) addressable by a column with 32-bit offsets.
pub const MAX_CAPACITY_LIMIT: usize = u32::MAX as usize + 1;
/// Byte size at which a binary column must switch to 64-bit offsets.
pub const MAX_LARGE_CAPACITY_LIMIT: usize = u32::MAX as usize;

/// Thresholds consulted by [`Column::upgrade_if_overflow`](crate::Column::upgrade_if_overflow)
/// and [`Column::downgrade`](crate::Column::downgrade).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLimits {
    /// A column may hold at most this many offset entries.
    pub max_capacity: usize,
    /// A binary column holding at least this many bytes needs 64-bit offsets.
    pub max_large_capacity: usize,
}

impl Default for ColumnLimits {
    fn default() -> Self {
        Self {
            max_capacity: MAX_CAPACITY_LIMIT,
            max_large_capacity: MAX_LARGE_CAPACITY_LIMIT,
        }
    }
}

impl ColumnLimits {
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_max_large_capacity(mut self, max_large_capacity: usize) -> Self {
        self.max_large_capacity = max_large_capacity;
        self
    }
}

/// Sizing knobs for building and merging chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Desired number of rows per output chunk.
    pub chunk_size: usize,
    /// Maximum number of input chunks merged into one output chunk.
    pub accumulate_limit: usize,
    /// A chunk with fewer than `chunk_size * low_watermark_rows_rate` rows is worth merging.
    pub low_watermark_rows_rate: f64,
    /// A chunk with fewer than this many bytes is worth merging.
    pub low_watermark_bytes: usize,
    /// Column overflow thresholds.
    pub limits: ColumnLimits,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            accumulate_limit: 64,
            low_watermark_rows_rate: 0.75,
            low_watermark_bytes: 256 * 1024 * 1024,
            limits: ColumnLimits::default(),
        }
    }
}

impl ChunkConfig {
    /// Parses a JSON config document, keeping defaults for absent fields.
    pub fn from_json(json: &str) -> StrataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_accumulate_limit(mut self, accumulate_limit: usize) -> Self {
        self.accumulate_limit = accumulate_limit;
        self
    }

    pub fn with_low_watermark_bytes(mut self, low_watermark_bytes: usize) -> Self {
        self.low_watermark_bytes = low_watermark_bytes;
        self
    }

    pub fn with_limits(mut self, limits: ColumnLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Row count below which a chunk is considered undersized.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn low_watermark_rows(&self) -> usize {
        (self.chunk_size as f64 * self.low_watermark_rows_rate) as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.low_watermark_rows(), 3072);
        assert_eq!(config.limits.max_capacity, 1 << 32);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ChunkConfig::from_json(r#"{"chunk_size": 100, "limits": {"max_large_capacity": 16}}"#)
                .unwrap();
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.accumulate_limit, 64);
        assert_eq!(config.low_watermark_rows(), 75);
        assert_eq!(config.limits.max_large_capacity, 16);
        assert_eq!(config.limits.max_capacity, MAX_CAPACITY_LIMIT);
    }

    #[test]
    fn malformed_json() {
        assert!(ChunkConfig::from_json("{chunk_size: }").is_err());
    }
}
