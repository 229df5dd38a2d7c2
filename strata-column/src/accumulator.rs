//! Re-batching of chunk streams.
//!
//! Filters and joins tend to emit many small chunks; these accumulators merge (and, for
//! [`ChunkAccumulator`], split) them back into chunks of a useful size.

use std::collections::VecDeque;

use strata_error::StrataResult;

use crate::{Chunk, ChunkConfig, ColumnLimits};

/// Regroups pushed chunks into chunks of exactly `desired_size` rows.
///
/// Only the chunk emitted by [`finalize`](Self::finalize) may be shorter.
#[derive(Debug)]
pub struct ChunkAccumulator {
    desired_size: usize,
    accumulate_limit: usize,
    limits: ColumnLimits,
    pending: Option<Chunk>,
    output: VecDeque<Chunk>,
    accumulate_count: usize,
}

impl ChunkAccumulator {
    pub fn new(desired_size: usize) -> Self {
        Self::with_config(&ChunkConfig::default().with_chunk_size(desired_size))
    }

    pub fn with_config(config: &ChunkConfig) -> Self {
        Self {
            desired_size: config.chunk_size.max(1),
            accumulate_limit: config.accumulate_limit,
            limits: config.limits.clone(),
            pending: None,
            output: VecDeque::new(),
            accumulate_count: 0,
        }
    }

    pub fn set_desired_size(&mut self, desired_size: usize) {
        self.desired_size = desired_size.max(1);
    }

    pub fn push(&mut self, chunk: Chunk) -> StrataResult<()> {
        chunk.debug_check();
        let input_rows = chunk.num_rows();
        let mut start = 0;
        while start < input_rows {
            let desired_size = self.desired_size;
            let pending = self
                .pending
                .get_or_insert_with(|| chunk.clone_empty(desired_size));
            let take = (desired_size - pending.num_rows()).min(input_rows - start);
            pending.append(&chunk, start, take)?;
            pending.upgrade_if_overflow(&self.limits)?;
            if pending.num_rows() >= desired_size {
                if let Some(full) = self.pending.take() {
                    log::trace!("accumulated a chunk of {} rows", full.num_rows());
                    self.output.push_back(full);
                }
            }
            start += take;
        }
        self.accumulate_count += 1;
        Ok(())
    }

    pub fn pull(&mut self) -> Option<Chunk> {
        let chunk = self.output.pop_front()?;
        self.accumulate_count = 0;
        Some(chunk)
    }

    /// True when no chunk is ready to be pulled.
    pub fn empty(&self) -> bool {
        self.output.is_empty()
    }

    /// True once enough chunks have been pushed without a pull that the caller should stop
    /// feeding and drain, even if the output is still short.
    pub fn reach_limit(&self) -> bool {
        self.accumulate_count >= self.accumulate_limit
    }

    /// Moves the partially filled chunk, if any, to the output.
    pub fn finalize(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::trace!("flushing a final chunk of {} rows", pending.num_rows());
            self.output.push_back(pending);
        }
        self.accumulate_count = 0;
    }

    pub fn reset(&mut self) {
        self.output.clear();
        self.pending = None;
        self.accumulate_count = 0;
    }
}

/// A single-slot merger for pipelined operators.
///
/// Pushed chunks are merged until the next one would exceed `max_size` rows, and the merged chunk
/// is emitted as soon as it is large enough in rows or in bytes.
#[derive(Debug)]
pub struct ChunkPipelineAccumulator {
    max_size: usize,
    low_watermark_rows_rate: f64,
    low_watermark_bytes: usize,
    limits: ColumnLimits,
    in_chunk: Option<Chunk>,
    out_chunk: Option<Chunk>,
    finalized: bool,
}

impl Default for ChunkPipelineAccumulator {
    fn default() -> Self {
        Self::with_config(&ChunkConfig::default())
    }
}

impl ChunkPipelineAccumulator {
    pub fn with_config(config: &ChunkConfig) -> Self {
        Self {
            max_size: config.chunk_size,
            low_watermark_rows_rate: config.low_watermark_rows_rate,
            low_watermark_bytes: config.low_watermark_bytes,
            limits: config.limits.clone(),
            in_chunk: None,
            out_chunk: None,
            finalized: false,
        }
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    #[allow(clippy::cast_precision_loss)]
    fn is_large_enough(&self, chunk: &Chunk) -> bool {
        chunk.num_rows() as f64 >= self.max_size as f64 * self.low_watermark_rows_rate
            || chunk.memory_usage() >= self.low_watermark_bytes
    }

    /// Must only be called while [`need_input`](Self::need_input) holds.
    pub fn push(&mut self, chunk: Chunk) -> StrataResult<()> {
        chunk.debug_check();
        debug_assert!(self.out_chunk.is_none(), "pushed while output is pending");
        let overflows = self
            .in_chunk
            .as_ref()
            .is_some_and(|in_chunk| in_chunk.num_rows() + chunk.num_rows() > self.max_size);
        if overflows {
            self.out_chunk = self.in_chunk.replace(chunk);
        } else if let Some(in_chunk) = self.in_chunk.as_mut() {
            in_chunk.append_all(&chunk)?;
            in_chunk.upgrade_if_overflow(&self.limits)?;
        } else {
            self.in_chunk = Some(chunk);
        }

        if self.out_chunk.is_none()
            && self
                .in_chunk
                .as_ref()
                .is_some_and(|in_chunk| self.is_large_enough(in_chunk))
        {
            self.out_chunk = self.in_chunk.take();
        }
        if let Some(out) = &self.out_chunk {
            log::trace!("pipeline accumulator emits {} rows", out.num_rows());
        }
        Ok(())
    }

    /// Takes the ready chunk. After [`finalize`](Self::finalize) this also drains the partially
    /// merged chunk.
    pub fn pull(&mut self) -> Option<Chunk> {
        if self.finalized && self.out_chunk.is_none() {
            return self.in_chunk.take();
        }
        self.out_chunk.take()
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn reset(&mut self) {
        self.in_chunk = None;
        self.out_chunk = None;
        self.finalized = false;
    }

    pub fn has_output(&self) -> bool {
        self.out_chunk.is_some() || (self.finalized && self.in_chunk.is_some())
    }

    pub fn need_input(&self) -> bool {
        !self.finalized && self.out_chunk.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.finalized && self.out_chunk.is_none() && self.in_chunk.is_none()
    }
}
