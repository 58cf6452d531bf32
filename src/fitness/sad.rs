/// Sum of Absolute Differences (SAD) / Manhattan distance over normalized RGB.
/// rows are reduced in parallel, then summed in row order so the result is bit-for-bit
/// reproducible regardless of how rayon splits the work.
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::raster::Raster;

// rows below this count are summed on the calling thread
const PAR_MIN_ROWS: usize = 64;

fn check_shapes(base: &Raster, current: &Raster) -> Result<()> {
    if !base.same_shape(current) {
        return Err(Error::InvalidInput(format!(
            "image dimensions differ: base {}x{}, candidate {}x{}",
            base.width(),
            base.height(),
            current.width(),
            current.height()
        )));
    }
    Ok(())
}

#[inline]
fn row_sad(base: &[f32], current: &[f32]) -> f64 {
    base.iter()
        .zip(current)
        .map(|(&b, &c)| (b - c).abs() as f64)
        .sum()
}

/// SAD between two rasters of identical shape; 0 means exact match
pub fn sad_rgb(base: &Raster, current: &Raster) -> Result<f64> {
    profiling::scope!("sad_rgb");
    check_shapes(base, current)?;

    let rows: Vec<f64> = (0..base.height())
        .into_par_iter()
        .with_min_len(PAR_MIN_ROWS)
        .map(|y| row_sad(base.row(y), current.row(y)))
        .collect();
    Ok(rows.iter().sum())
}

/// per-pixel absolute difference summed across channels, row-major
pub fn sad_per_pixel(base: &Raster, current: &Raster) -> Result<Vec<f64>> {
    profiling::scope!("sad_per_pixel");
    check_shapes(base, current)?;

    let per_px = base
        .data()
        .par_chunks_exact(Raster::CHANNELS)
        .zip(current.data().par_chunks_exact(Raster::CHANNELS))
        .map(|(b, c)| row_sad(b, c))
        .collect();
    Ok(per_px)
}
