use rand::Rng;

use crate::dna::{Color, Genome, Polygon, PolygonId};
use crate::error::Result;
use crate::fitness::sad_per_pixel;
use crate::raster::Raster;
use crate::render::Renderer;

/// cumulative distribution over pixels, weighted by how wrong each pixel currently is.
/// flattened row-major, so flat index `i` is pixel (x = i % width, y = i / width).
#[derive(Clone, Debug)]
pub struct EnergyMap {
    width: u32,
    height: u32,
    cdf: Vec<f64>,
}

impl EnergyMap {
    /// residual between the base image and the current render. `None` when the
    /// render already matches exactly and there is nothing to aim at.
    pub fn compute(base: &Raster, rendered: &Raster) -> Result<Option<Self>> {
        profiling::scope!("EnergyMap::compute");
        let residual = sad_per_pixel(base, rendered)?;
        Ok(Self::from_residual(base.width(), base.height(), &residual))
    }

    /// normalize a per-pixel residual into a running cumulative sum
    pub fn from_residual(width: u32, height: u32, residual: &[f64]) -> Option<Self> {
        debug_assert_eq!(residual.len(), width as usize * height as usize);
        let total: f64 = residual.iter().sum();
        if !(total > 0.0) || residual.is_empty() {
            return None;
        }

        let mut running = 0.0;
        let cdf = residual
            .iter()
            .map(|&r| {
                running += r / total;
                running
            })
            .collect();
        Some(Self { width, height, cdf })
    }

    /// first flat index whose cumulative value exceeds `threshold`.
    /// rounding can leave the last entry a hair under 1.0, so the index is clamped.
    pub fn index_for(&self, threshold: f64) -> usize {
        let idx = self.cdf.partition_point(|&c| c <= threshold);
        idx.min(self.cdf.len() - 1)
    }

    /// flat index back to a vertex coordinate
    pub fn vertex_at(&self, idx: usize) -> (f32, f32) {
        let width = self.width as usize;
        let (row, col) = (idx / width, idx % width);
        (col as f32, row as f32)
    }

    pub fn sample_vertex<R: Rng>(&self, rng: &mut R) -> (f32, f32) {
        let t: f64 = rng.random();
        self.vertex_at(self.index_for(t))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }
}

pub fn random_color<R: Rng>(rng: &mut R) -> Color {
    Color::new(rng.random(), rng.random(), rng.random(), rng.random())
}

/// vertices uniform over [0,width]x[0,height], random color
pub fn random_polygon<R: Rng>(rng: &mut R, width: u32, height: u32, vertices: usize) -> Polygon {
    let (w, h) = (width as f32, height as f32);
    let points = (0..vertices)
        .map(|_| (rng.random_range(0.0..=w), rng.random_range(0.0..=h)))
        .collect();
    Polygon::new(PolygonId(0), points, random_color(rng))
}

/// vertices drawn from the energy map, or uniformly if there is none
pub fn guided_polygon<R: Rng>(
    rng: &mut R,
    energy: Option<&EnergyMap>,
    width: u32,
    height: u32,
    vertices: usize,
) -> Polygon {
    let Some(map) = energy else {
        return random_polygon(rng, width, height, vertices);
    };
    let points = (0..vertices).map(|_| map.sample_vertex(rng)).collect();
    Polygon::new(PolygonId(0), points, random_color(rng))
}

/// render `genome`, measure where it is wrong, and propose a polygon aimed there.
/// the returned polygon carries a placeholder id; `Genome::append` stamps the real one.
pub fn place_polygon<Rn: Renderer + ?Sized, R: Rng>(
    renderer: &Rn,
    rng: &mut R,
    base: &Raster,
    genome: &Genome,
    vertices: usize,
) -> Result<Polygon> {
    profiling::scope!("place_polygon");
    let rendered = renderer.render(genome)?;
    let energy = EnergyMap::compute(base, &rendered)?;
    Ok(guided_polygon(rng, energy.as_ref(), genome.width, genome.height, vertices))
}
