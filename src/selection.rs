use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// how a polygon is picked for mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// w_i ∝ 1/2^(1+i) over paint positions; position 0 (the bottom layer) is favored
    Geometric,
    /// every polygon equally likely. used once the scene is saturated
    Uniform,
}

impl SelectionPolicy {
    /// normalized weights for `count` polygons, indexed by paint position
    pub fn weights(self, count: usize) -> Vec<f64> {
        if count == 0 {
            return Vec::new();
        }
        let raw: Vec<f64> = match self {
            SelectionPolicy::Geometric => (0..count)
                .map(|i| 0.5f64.powi(i as i32 + 1))
                .collect(),
            SelectionPolicy::Uniform => vec![1.0; count],
        };
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }

    /// draw a paint position, `None` for an empty scene
    pub fn pick<R: Rng>(self, rng: &mut R, count: usize) -> Option<usize> {
        profiling::scope!("SelectionPolicy::pick");
        match self {
            _ if count == 0 => None,
            SelectionPolicy::Uniform => Some(rng.random_range(0..count)),
            SelectionPolicy::Geometric => {
                // the first weight is always 0.5 before normalizing, so the table is never all-zero
                let dist = WeightedIndex::new(self.weights(count)).ok()?;
                Some(dist.sample(rng))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn weights_sum_to_one() {
        for policy in [SelectionPolicy::Geometric, SelectionPolicy::Uniform] {
            for n in [1, 2, 3, 10, 64, 2000] {
                let total: f64 = policy.weights(n).iter().sum();
                assert!((total - 1.0).abs() < 1e-9, "{policy:?} n={n} total={total}");
            }
        }
    }

    #[test]
    fn geometric_halves_per_position() {
        let w = SelectionPolicy::Geometric.weights(4);
        assert!(w.windows(2).all(|p| (p[0] / p[1] - 2.0).abs() < 1e-12));
        // 1/2 + 1/4 + 1/8 + 1/16 = 15/16
        assert!((w[0] - 8.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn single_polygon_gets_all_the_mass() {
        assert_eq!(SelectionPolicy::Geometric.weights(1), vec![1.0]);
    }

    #[test]
    fn empty_scene_picks_nothing() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(SelectionPolicy::Geometric.pick(&mut rng, 0), None);
        assert_eq!(SelectionPolicy::Uniform.pick(&mut rng, 0), None);
        assert!(SelectionPolicy::Geometric.weights(0).is_empty());
    }

    #[test]
    fn geometric_pick_favors_the_bottom_layer() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut hits = [0usize; 5];
        for _ in 0..4000 {
            let idx = SelectionPolicy::Geometric.pick(&mut rng, 5).unwrap();
            hits[idx] += 1;
        }
        assert!(hits[0] > hits[1] && hits[1] > hits[2]);
        assert!(hits[0] > 1800, "{hits:?}");
    }

    #[test]
    fn uniform_pick_stays_in_range() {
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..500 {
            assert!(SelectionPolicy::Uniform.pick(&mut rng, 3).unwrap() < 3);
        }
    }
}
