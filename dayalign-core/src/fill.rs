//! Forward-fill: the only gap policy.
//!
//! Each missing cell takes the nearest preceding present value of the same
//! column. Leading gaps stay missing. No backward fill, interpolation, or zero
//! fill.

use crate::domain::Series;

/// Forward-fill one column.
pub fn forward_fill_values(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Forward-fill every column of `series` independently, in row order.
pub fn forward_fill(series: &Series) -> Series {
    let values = series
        .values()
        .iter()
        .map(|column| forward_fill_values(column))
        .collect();
    series.with_values(series.dates().to_vec(), values)
}
