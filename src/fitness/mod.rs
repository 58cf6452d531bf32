// Fitness module organization
// sad: raw pixel distances, metrics: derived reporting numbers

pub mod metrics;
pub mod sad;

pub use metrics::MetricsSnapshot;
pub use sad::{sad_per_pixel, sad_rgb};

use crate::dna::Genome;
use crate::error::{Error, Result};
use crate::raster::Raster;
use crate::render::Renderer;

/// loss(base, scene): SAD between the base image and the rendered scene
pub fn loss<R: Renderer + ?Sized>(renderer: &R, base: &Raster, genome: &Genome) -> Result<f64> {
    profiling::scope!("loss");
    let rendered = renderer.render(genome)?;
    sad_rgb(base, &rendered)
}

/// loss of the all-black canvas, the normalization reference for completeness
pub fn blank_loss(base: &Raster) -> f64 {
    // a blank raster always matches the base shape
    base.data().iter().map(|&c| c.abs() as f64).sum()
}

/// (loss(base, blank) - loss(base, candidate)) / loss(base, blank) * 100
pub fn complete_percent(base: &Raster, candidate: &Raster) -> Result<f64> {
    let current = sad_rgb(base, candidate)?;
    complete_percent_from_loss(base, current)
}

/// completeness from an already computed candidate loss
pub fn complete_percent_from_loss(base: &Raster, candidate_loss: f64) -> Result<f64> {
    let max_l = blank_loss(base);
    if max_l == 0.0 {
        return Err(Error::InvalidInput(
            "base image is identical to the blank canvas, completeness is undefined".to_owned(),
        ));
    }
    Ok((max_l - candidate_loss) / max_l * 100.0)
}
