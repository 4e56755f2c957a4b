use std::ops::Range;

use opencv::{
    core::{count_non_zero, Mat, Rect},
    prelude::*,
};

/// Counts non-zero pixels of a single channel mask whose column falls in
/// `columns`.
pub fn count_foreground(mask: &Mat, columns: Range<i32>) -> anyhow::Result<usize> {
    let start = columns.start.clamp(0, mask.cols());
    let end = columns.end.clamp(0, mask.cols());
    if start >= end || mask.rows() == 0 {
        return Ok(0);
    }

    let strip = Mat::roi(mask, Rect::new(start, 0, end - start, mask.rows()))?;

    Ok(count_non_zero(&strip)? as usize)
}
