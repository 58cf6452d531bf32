use rand::Rng;

use crate::dna::{Axis, Color, Genome, Polygon, PolygonId};
use crate::error::Result;

/// largest step of an incremental change, as a share of the value's bound
pub const INCREMENT_FRACTION: f32 = 0.1;

/// the three disjoint mutation classes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Vertex,
    Color,
    Order,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [MutationKind::Vertex, MutationKind::Color, MutationKind::Order];
}

/// increment-or-resample on a value living in [0, bound].
/// half the time a signed step of up to 10% of the bound is applied, reflected back
/// (negated) when it would leave the range; otherwise the value is redrawn uniformly.
pub fn perturb<R: Rng>(rng: &mut R, value: f32, bound: f32) -> f32 {
    let out = if rng.random_bool(0.5) {
        let magnitude = rng.random_range(0.0..=INCREMENT_FRACTION * bound);
        let mut step = if rng.random_bool(0.5) { magnitude } else { -magnitude };
        if !(0.0..=bound).contains(&(value + step)) {
            step = -step;
        }
        value + step
    } else {
        rng.random_range(0.0..=bound)
    };
    debug_assert!((0.0..=bound).contains(&out), "perturb left range: {out} not in [0, {bound}]");
    out
}

/// move one coordinate of one vertex. the first vertex also drags the closing point
pub fn mutate_vertex<R: Rng>(rng: &mut R, poly: &mut Polygon, width: u32, height: u32) {
    let n = poly.vertex_count();
    if n == 0 {
        return;
    }
    let vertex = rng.random_range(0..n);
    let (axis, bound) = if rng.random_bool(0.5) {
        (Axis::X, width as f32)
    } else {
        (Axis::Y, height as f32)
    };
    let value = perturb(rng, poly.coord(vertex, axis), bound);
    poly.set_coord(vertex, axis, value);
}

/// change one of the four RGBA channels
pub fn mutate_color<R: Rng>(rng: &mut R, poly: &mut Polygon) {
    let channel = rng.random_range(0..Color::CHANNELS);
    let value = perturb(rng, poly.color.channel(channel), 1.0);
    poly.color.set_channel(channel, value);
}

/// swap the polygon's paint position with a random position
pub fn mutate_order<R: Rng>(rng: &mut R, genome: &mut Genome, id: PolygonId) -> Result<()> {
    let current = genome.index_of(id)?;
    let target = rng.random_range(0..genome.len());
    genome.swap(current, target)
}

/// produce a candidate scene with exactly one mutation applied to polygon `id`.
/// the input scene is left untouched; only the edited polygon is actually copied.
pub fn mutate<R: Rng>(rng: &mut R, genome: &Genome, id: PolygonId) -> Result<(Genome, MutationKind)> {
    profiling::scope!("mutate");
    // surface a missing id before paying for the copy
    genome.index_of(id)?;

    let mut candidate = genome.clone();
    let kind = MutationKind::ALL[rng.random_range(0..MutationKind::ALL.len())];
    match kind {
        MutationKind::Vertex => {
            let (w, h) = (candidate.width, candidate.height);
            mutate_vertex(rng, candidate.get_mut(id)?, w, h);
        }
        MutationKind::Color => mutate_color(rng, candidate.get_mut(id)?),
        MutationKind::Order => mutate_order(rng, &mut candidate, id)?,
    }
    Ok((candidate, kind))
}
