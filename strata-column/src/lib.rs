//! In-memory columns for a vectorized execution engine.
//!
//! Every column kind implements the object-safe [`Column`] contract, which lets container
//! columns such as [`MapColumn`] hold arbitrary children behind a [`ColumnRef`]. Columns are
//! single-writer values: they are `Send + Sync` but perform no internal synchronization.

pub use accumulator::*;
pub use binary::*;
pub use chunk::*;
pub use column::{
    Column, ColumnRef, Filter, downcast_column, downcast_column_mut, downgrade_child,
    upgrade_child,
};
pub use config::*;
pub use datum::*;
pub use fixed_length::*;
pub use map::*;
pub use native::*;
pub use nullable::*;

mod accumulator;
mod binary;
mod chunk;
mod column;
mod config;
mod datum;
mod fixed_length;
pub mod hash;
mod map;
mod native;
mod nullable;
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;
