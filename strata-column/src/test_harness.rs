//! Builders shared by unit tests and benchmarks.

use std::ops::Range;

use strata_error::{StrataExpect, StrataResult};

use crate::{BinaryColumn, Chunk, Column, ColumnRef, Datum, DatumKey, Int32Column, MapColumn};

fn map_column_of<K, V>(keys: ColumnRef, values: ColumnRef, rows: &[&[(K, V)]]) -> MapColumn
where
    K: Clone + Into<DatumKey>,
    V: Clone + Into<Datum>,
{
    let mut column = MapColumn::empty(keys, values).strata_expect("empty map column");
    for row in rows {
        column
            .append_datum(&Datum::map(row.iter().cloned()))
            .strata_expect("append map row");
    }
    column
}

/// A `map<int32, int32>` column holding `rows`.
pub fn int_map_column(rows: &[&[(i32, i32)]]) -> MapColumn {
    map_column_of(
        Box::new(Int32Column::new()),
        Box::new(Int32Column::new()),
        rows,
    )
}

/// A `map<binary, int32>` column holding `rows`.
pub fn string_int_map_column(rows: &[&[(&str, i32)]]) -> MapColumn {
    map_column_of(
        Box::new(BinaryColumn::new()),
        Box::new(Int32Column::new()),
        rows,
    )
}

/// Materializes every row of `column`.
pub fn map_rows(column: &dyn Column) -> Vec<Datum> {
    try_rows(column).strata_expect("materialize rows")
}

fn try_rows(column: &dyn Column) -> StrataResult<Vec<Datum>> {
    (0..column.len()).map(|idx| column.get(idx)).collect()
}

/// A single-column chunk of the given byte strings.
pub fn binary_chunk(values: &[&str]) -> Chunk {
    Chunk::try_new(vec![Box::new(BinaryColumn::from_values(values))])
        .strata_expect("binary chunk")
}

/// A single-column chunk of the given integers.
pub fn int_chunk(values: Range<i32>) -> Chunk {
    Chunk::try_new(vec![Box::new(Int32Column::from_iter(values))]).strata_expect("int chunk")
}
