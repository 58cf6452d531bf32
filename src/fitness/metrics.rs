//─────────────────────────────────────────────────────────────────────────────
// resolution-invariant metrics (SAD/px, PSNR) and completeness
//─────────────────────────────────────────────────────────────────────────────

use crate::raster::Raster;

/// channels the loss is summed over
pub const FITNESS_CHANNELS_F64: f64 = Raster::CHANNELS as f64;

/// PSNR in decibels. `peak` is 1.0 for normalized rasters.
/// higher is better: ~30 dB acceptable, ~35 dB good, 40+ dB very good
#[inline]
pub fn psnr_from_mse(mse: f64, peak: f64) -> f64 {
    let mse = mse.max(1e-12);
    10.0 * ((peak * peak) / mse).log10()
}

/// cached snapshot of metrics derived from a raw loss
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub sad_per_px: f64,
    pub psnr: f64,
    /// share of the blank-canvas loss removed so far, 0..=100.
    /// NaN when the base image is itself black and there was nothing to remove
    pub complete_pct: f64,
}

impl MetricsSnapshot {
    /// build from raw SAD, pixel count and the blank-canvas loss.
    /// pseudo-MSE convention: L1 per pixel per channel stands in for MSE.
    pub fn from_sad(sad: f64, num_pixels: usize, blank_loss: f64) -> Self {
        let n = num_pixels.max(1) as f64;
        let sad_per_px = sad / n;
        let pseudo_mse = (sad / (n * FITNESS_CHANNELS_F64)).max(1e-12);
        let psnr = psnr_from_mse(pseudo_mse, 1.0);
        let complete_pct = if blank_loss > 0.0 {
            (blank_loss - sad) / blank_loss * 100.0
        } else {
            f64::NAN
        };
        Self { sad_per_px, psnr, complete_pct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_match_has_high_psnr() {
        let m = MetricsSnapshot::from_sad(0.0, 16, 48.0);
        assert!(m.psnr > 100.0);
        assert_eq!(m.sad_per_px, 0.0);
        assert_eq!(m.complete_pct, 100.0);
    }

    #[test]
    fn blank_loss_scores_zero_percent() {
        let m = MetricsSnapshot::from_sad(48.0, 16, 48.0);
        assert_eq!(m.complete_pct, 0.0);
        assert_eq!(m.sad_per_px, 3.0);
        // pseudo-mse of 1.0 at peak 1.0 is 0 dB
        assert!(m.psnr.abs() < 1e-9);
    }

    #[test]
    fn black_base_has_undefined_completeness() {
        let m = MetricsSnapshot::from_sad(0.0, 16, 0.0);
        assert!(m.complete_pct.is_nan());
        assert_eq!(m.sad_per_px, 0.0);
    }
}
