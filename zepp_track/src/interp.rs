//! Integer piecewise interpolation over sparse (offset, value) tables.

/// Linear interpolation between knots using integer floor slopes, flat
/// outside the known range.
///
/// Slopes are precomputed per segment as
/// `floor((v[i+1] - v[i]) / (o[i+1] - o[i]))`; a zero-width segment counts as
/// width 1. A query at a knot returns that knot's value exactly.
#[derive(Clone, Debug)]
pub struct StepInterpolator {
    offsets: Vec<i64>,
    values: Vec<i64>,
    slopes: Vec<i64>,
}

impl StepInterpolator {
    /// Build a table from parallel slices. Only their common prefix is used.
    pub fn new(offsets: &[i64], values: &[i64]) -> Self {
        let len = offsets.len().min(values.len());
        let offsets = offsets[..len].to_vec();
        let values = values[..len].to_vec();
        let slopes = offsets
            .windows(2)
            .zip(values.windows(2))
            .map(|(o, v)| {
                let width = o[1].saturating_sub(o[0]).max(1);
                floor_div(v[1].saturating_sub(v[0]), width)
            })
            .collect();
        Self {
            offsets,
            values,
            slopes,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at offset `x`. An empty table answers `0`.
    pub fn at(&self, x: i64) -> i64 {
        let (Some(&first), Some(&last)) = (self.values.first(), self.values.last()) else {
            return 0;
        };
        // first knot strictly after x, so a query at a knot lands on its own segment
        let pos = self.offsets.partition_point(|&o| o <= x);
        if pos == 0 {
            return first;
        }
        let i = pos - 1;
        if i >= self.slopes.len() {
            return last;
        }
        let run = x.saturating_sub(self.offsets[i]);
        self.values[i].saturating_add(self.slopes[i].saturating_mul(run))
    }
}

/// Resample a column onto `targets`.
///
/// No targets gives an empty column; a table without points gives all `0`; a
/// single point is repeated regardless of offset.
pub fn resample_column(values: &[i64], offsets: &[i64], targets: &[i64]) -> Vec<i64> {
    if targets.is_empty() {
        return Vec::new();
    }
    let table = StepInterpolator::new(offsets, values);
    match table.len() {
        0 => vec![0; targets.len()],
        1 => vec![table.values[0]; targets.len()],
        _ => targets.iter().map(|&x| table.at(x)).collect(),
    }
}

// Rounds toward negative infinity; `den` is never zero here.
fn floor_div(num: i64, den: i64) -> i64 {
    let Some(q) = num.checked_div(den) else {
        return i64::MAX;
    };
    if num % den != 0 && ((num < 0) != (den < 0)) {
        q - 1
    } else {
        q
    }
}
