// Engine module organization
// mod.rs holds the search state machine, events.rs what it reports

pub mod events;

pub use events::{EngineEvent, EventSink, LogSink, NullSink, Tee};

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::dna::Genome;
use crate::error::{Error, Result};
use crate::fitness::{blank_loss, loss, MetricsSnapshot};
use crate::mutate::mutate;
use crate::placement::{place_polygon, random_polygon};
use crate::raster::Raster;
use crate::render::{CpuRenderer, Renderer};
use crate::selection::SelectionPolicy;
use crate::settings::EngineInit;

/// where the search is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// mutating existing polygons
    Searching,
    /// deciding between growth and rollback after too long without progress
    Growing,
    /// polygon cap reached; terminal
    Saturated,
}

/// what a finished run leaves behind
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub evaluations: u64,
    pub polygons: usize,
    pub generations: usize,
    pub loss: f64,
    pub metrics: MetricsSnapshot,
}

pub struct Engine<R: Renderer = CpuRenderer> {
    pub(self) rng: Pcg32,
    pub(self) init: EngineInit,
    pub(self) renderer: R,
    pub(self) base: Raster,
    pub genome: Genome,         // accepted scene
    pub accepted_loss: f64,     // loss of `genome`
    pub baseline_loss: f64,     // accepted loss at the last growth event
    pub(self) blank_loss: f64,  // loss of the empty canvas, for completeness
    pub(self) stagnation: u32,  // consecutive non-improving steps (bumped again by rollbacks)
    pub(self) phase: Phase,
    pub(self) policy: SelectionPolicy,
    pub(self) generations: Vec<Genome>, // snapshots taken right before each growth
    pub(self) evaluations: u64,
    pub last_metrics: MetricsSnapshot,
}

impl<R: Renderer> Engine<R> {
    /// start from a single random polygon; the history holds that initial scene
    pub fn new(init: EngineInit, base: Raster, renderer: R) -> Result<Self> {
        profiling::scope!("Engine::new");
        init.validate()?;
        let mut rng = Pcg32::seed_from_u64(init.seed);
        let mut genome = Genome::new_blank(base.width(), base.height());
        genome.append(random_polygon(&mut rng, base.width(), base.height(), init.vertices));
        Self::with_rng(init, base, renderer, genome, rng)
    }

    /// start from an existing scene instead of a random polygon
    pub fn from_scene(init: EngineInit, base: Raster, renderer: R, genome: Genome) -> Result<Self> {
        init.validate()?;
        let rng = Pcg32::seed_from_u64(init.seed);
        Self::with_rng(init, base, renderer, genome, rng)
    }

    fn with_rng(init: EngineInit, base: Raster, renderer: R, genome: Genome, rng: Pcg32) -> Result<Self> {
        if genome.is_empty() {
            return Err(Error::InvalidInput("the starting scene has no polygons".to_owned()));
        }
        if genome.len() > init.max_polygons {
            return Err(Error::Configuration(format!(
                "starting scene has {} polygons, the cap is {}",
                genome.len(),
                init.max_polygons
            )));
        }
        // growth stamps ids from the scene length, so the ids must already be exactly 0..len
        let mut ids = genome.ids_in_order();
        ids.sort_unstable();
        if ids.iter().enumerate().any(|(i, id)| id.0 as usize != i) {
            return Err(Error::InvalidInput(format!(
                "starting scene ids must be 0..{}, got {:?}",
                genome.len(),
                genome.ids_in_order()
            )));
        }
        if (genome.width, genome.height) != (base.width(), base.height()) {
            return Err(Error::InvalidInput(format!(
                "scene is {}x{}, base image is {}x{}",
                genome.width,
                genome.height,
                base.width(),
                base.height()
            )));
        }

        let accepted_loss = loss(&renderer, &base, &genome)?;
        let blank_loss = blank_loss(&base);
        let mut this = Self {
            rng,
            init,
            renderer,
            base,
            generations: vec![genome.clone()],
            genome,
            accepted_loss,
            baseline_loss: accepted_loss,
            blank_loss,
            stagnation: 0,
            phase: Phase::Searching,
            policy: SelectionPolicy::Geometric,
            evaluations: 0,
            last_metrics: MetricsSnapshot::default(),
        };
        this.update_metrics_snapshot();
        Ok(this)
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    #[inline]
    pub fn stagnation(&self) -> u32 {
        self.stagnation
    }

    #[inline]
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// every snapshot taken so far, oldest first
    #[inline]
    pub fn generations(&self) -> &[Genome] {
        &self.generations
    }

    #[inline]
    pub fn base(&self) -> &Raster {
        &self.base
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn is_done(&self) -> bool {
        self.evaluations >= self.init.evaluations
    }

    fn update_metrics_snapshot(&mut self) {
        self.last_metrics =
            MetricsSnapshot::from_sad(self.accepted_loss, self.base.pixel_count(), self.blank_loss);
    }

    /// one evaluation: select, mutate, score, accept or reject, then settle stagnation.
    /// returns true when the candidate was accepted.
    pub fn step<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<bool> {
        profiling::scope!("Engine::step");
        self.evaluations += 1;
        let evaluation = self.evaluations;

        let Some(position) = self.policy.pick(&mut self.rng, self.genome.len()) else {
            return Err(Error::InvalidInput("the scene has no polygons".to_owned()));
        };
        let id = self.genome.polys[position].id;

        let (candidate, kind) = match mutate(&mut self.rng, &self.genome, id) {
            Ok(found) => found,
            Err(Error::NotFound(id)) => {
                sink.on_event(&EngineEvent::Skipped { evaluation, id }, &self.genome)?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let candidate_loss = loss(&self.renderer, &self.base, &candidate)?;
        let accepted = candidate_loss < self.accepted_loss;
        if accepted {
            self.genome = candidate;
            self.accepted_loss = candidate_loss;
            self.stagnation = 0;
            self.update_metrics_snapshot();
            let event = EngineEvent::Improved {
                evaluation,
                loss: candidate_loss,
                kind,
                metrics: self.last_metrics,
            };
            sink.on_event(&event, &self.genome)?;
        } else {
            self.stagnation = self.stagnation.saturating_add(1);
        }

        if self.stagnation > self.init.stagnation_limit && self.genome.len() < self.init.max_polygons {
            self.phase = Phase::Growing;
            self.grow_or_roll_back(sink)?;
            self.phase = Phase::Searching;
        }
        // checked separately: a rollback that fills the scene saturates in the same step
        if self.stagnation > self.init.stagnation_limit
            && self.genome.len() == self.init.max_polygons
            && self.phase != Phase::Saturated
        {
            self.phase = Phase::Saturated;
            self.policy = SelectionPolicy::Uniform;
            let event = EngineEvent::Saturated { evaluation, polygons: self.genome.len() };
            sink.on_event(&event, &self.genome)?;
        }
        Ok(accepted)
    }

    /// growth when the accepted scene beat the standing baseline, rollback otherwise
    fn grow_or_roll_back<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        profiling::scope!("Engine::grow_or_roll_back");
        let evaluation = self.evaluations;

        if self.accepted_loss < self.baseline_loss {
            let previous_baseline = self.baseline_loss;
            self.generations.push(self.genome.clone());
            self.baseline_loss = self.accepted_loss;
            self.append_guided_polygon()?;
            self.stagnation = 0;
            let event = EngineEvent::Grew {
                evaluation,
                polygons: self.genome.len(),
                loss: self.accepted_loss,
                previous_baseline,
            };
            sink.on_event(&event, &self.genome)
        } else {
            // history always holds at least the starting scene
            if let Some(snapshot) = self.generations.last() {
                self.genome = snapshot.clone();
            }
            self.append_guided_polygon()?;
            self.stagnation = self.stagnation.saturating_add(1);
            let event = EngineEvent::RolledBack {
                evaluation,
                generation: self.generations.len() - 1,
                polygons: self.genome.len(),
                loss: self.accepted_loss,
            };
            sink.on_event(&event, &self.genome)
        }
    }

    /// aim a new polygon at the worst-approximated pixels of the accepted scene and append it.
    /// the result is accepted unconditionally; its loss becomes the accepted loss.
    fn append_guided_polygon(&mut self) -> Result<()> {
        let poly = place_polygon(&self.renderer, &mut self.rng, &self.base, &self.genome, self.init.vertices)?;
        self.genome.append(poly);
        self.accepted_loss = loss(&self.renderer, &self.base, &self.genome)?;
        self.update_metrics_snapshot();
        Ok(())
    }

    /// step until the evaluation budget is spent
    pub fn run<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<RunSummary> {
        profiling::scope!("Engine::run");
        let started = EngineEvent::Started {
            polygons: self.genome.len(),
            loss: self.accepted_loss,
        };
        sink.on_event(&started, &self.genome)?;

        while !self.is_done() {
            self.step(sink)?;
        }

        let summary = self.summary();
        let finished = EngineEvent::Finished {
            evaluations: summary.evaluations,
            polygons: summary.polygons,
            generations: summary.generations,
            loss: summary.loss,
        };
        sink.on_event(&finished, &self.genome)?;
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            evaluations: self.evaluations,
            polygons: self.genome.len(),
            generations: self.generations.len(),
            loss: self.accepted_loss,
            metrics: self.last_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{Color, Polygon, PolygonId};
    use std::cell::Cell;

    /// renders every scene to the same flat gray, so no candidate ever improves
    struct FlatRenderer;

    impl Renderer for FlatRenderer {
        fn render(&self, genome: &Genome) -> Result<Raster> {
            Ok(Raster::filled(genome.width, genome.height, [0.5; 3]))
        }
    }

    fn init(max_polygons: usize, stagnation_limit: u32, evaluations: u64) -> EngineInit {
        EngineInit {
            max_polygons,
            stagnation_limit,
            evaluations,
            vertices: 3,
            seed: 17,
        }
    }

    fn one_polygon(w: u32, h: u32) -> Genome {
        let mut g = Genome::new_blank(w, h);
        g.append(Polygon::new(
            PolygonId(0),
            vec![(0.0, 0.0), (w as f32, 0.0), (0.0, h as f32)],
            Color::new(0.3, 0.3, 0.3, 1.0),
        ));
        g
    }

    fn base() -> Raster {
        Raster::filled(8, 8, [0.1, 0.7, 0.2])
    }

    #[test]
    fn starts_with_one_polygon_and_one_generation() {
        let engine = Engine::new(init(5, 10, 100), base(), CpuRenderer::default()).unwrap();
        assert_eq!(engine.genome.len(), 1);
        assert_eq!(engine.genome.ids_in_order(), vec![PolygonId(0)]);
        assert_eq!(engine.generations().len(), 1);
        assert_eq!(engine.generations()[0], engine.genome);
        assert_eq!(engine.baseline_loss, engine.accepted_loss);
        assert_eq!(engine.phase(), Phase::Searching);
        assert_eq!(engine.policy(), SelectionPolicy::Geometric);
    }

    #[test]
    fn rejects_bad_init() {
        let res = Engine::new(init(0, 10, 100), base(), CpuRenderer::default());
        assert!(matches!(res, Err(Error::Configuration(_))));
        let res = Engine::from_scene(init(3, 5, 10), base(), FlatRenderer, Genome::new_blank(8, 8));
        assert!(matches!(res, Err(Error::InvalidInput(_))));
        let res = Engine::from_scene(init(3, 5, 10), base(), FlatRenderer, one_polygon(4, 4));
        assert!(matches!(res, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn starting_scene_ids_must_run_from_zero() {
        // a lone polygon with id 1 would collide with the next appended polygon
        let mut gapped = one_polygon(8, 8);
        gapped.append(gapped.polys[0].as_ref().clone());
        gapped.polys.remove(0);
        assert_eq!(gapped.ids_in_order(), vec![PolygonId(1)]);
        let res = Engine::from_scene(init(3, 5, 10), base(), FlatRenderer, gapped);
        assert!(matches!(res, Err(Error::InvalidInput(_))));

        let mut duplicated = one_polygon(8, 8);
        duplicated.polys.push(duplicated.polys[0].clone());
        let res = Engine::from_scene(init(3, 5, 10), base(), FlatRenderer, duplicated);
        assert!(matches!(res, Err(Error::InvalidInput(_))));

        // paint order does not matter, only the id set
        let mut swapped = one_polygon(8, 8);
        swapped.append(swapped.polys[0].as_ref().clone());
        swapped.swap(0, 1).unwrap();
        let mut engine = Engine::from_scene(init(3, 0, 10), base(), FlatRenderer, swapped).unwrap();
        engine.baseline_loss = engine.accepted_loss + 1.0;
        engine.step(&mut NullSink).unwrap();
        assert_eq!(engine.genome.len(), 3);
        assert!(engine.genome.ids_unique());
    }

    #[test]
    fn stagnation_past_limit_grows_once() {
        let mut engine = Engine::from_scene(init(3, 5, 100), base(), FlatRenderer, one_polygon(8, 8)).unwrap();
        engine.baseline_loss = engine.accepted_loss + 1.0;

        let mut grew = 0;
        let mut sink = |e: &EngineEvent, _: &Genome| -> Result<()> {
            if matches!(e, EngineEvent::Grew { .. }) {
                grew += 1;
            }
            Ok(())
        };
        for i in 1..=5 {
            assert!(!engine.step(&mut sink).unwrap());
            assert_eq!(engine.stagnation(), i);
            assert_eq!(engine.genome.len(), 1);
        }
        engine.step(&mut sink).unwrap();
        assert_eq!(grew, 1);
        assert_eq!(engine.genome.len(), 2);
        assert_eq!(engine.stagnation(), 0);
        assert_eq!(engine.generations().len(), 2);
        assert_eq!(engine.genome.ids_in_order(), vec![PolygonId(0), PolygonId(1)]);
        assert_eq!(engine.baseline_loss, engine.accepted_loss);
    }

    #[test]
    fn refused_growth_rolls_back_to_the_last_snapshot() {
        // baseline equals the accepted loss, so growth is never earned
        let mut engine = Engine::from_scene(init(3, 5, 100), base(), FlatRenderer, one_polygon(8, 8)).unwrap();
        let rolled_back = Cell::new(0);
        let mut sink = |e: &EngineEvent, _: &Genome| -> Result<()> {
            if matches!(e, EngineEvent::RolledBack { .. }) {
                rolled_back.set(rolled_back.get() + 1);
            }
            Ok(())
        };
        for _ in 0..6 {
            engine.step(&mut sink).unwrap();
        }
        assert_eq!(rolled_back.get(), 1);
        assert_eq!(engine.genome.len(), 2);
        assert_eq!(engine.stagnation(), 7);

        let snapshot = engine.generations().last().unwrap();
        assert_eq!(&engine.genome.polys[..snapshot.len()], &snapshot.polys[..]);

        // still stagnant, so every further step rolls back again without growing
        for _ in 0..4 {
            engine.step(&mut sink).unwrap();
            assert_eq!(engine.genome.len(), 2);
        }
        assert_eq!(rolled_back.get(), 5);
        assert_eq!(engine.generations().len(), 1);
    }

    #[test]
    fn rollback_that_fills_the_scene_saturates_in_the_same_step() {
        let mut engine = Engine::from_scene(init(2, 5, 100), base(), FlatRenderer, one_polygon(8, 8)).unwrap();
        let saturated = Cell::new(0);
        let mut sink = |e: &EngineEvent, _: &Genome| -> Result<()> {
            if matches!(e, EngineEvent::Saturated { .. }) {
                saturated.set(saturated.get() + 1);
            }
            Ok(())
        };
        for _ in 0..5 {
            engine.step(&mut sink).unwrap();
            assert_eq!(engine.phase(), Phase::Searching);
        }
        engine.step(&mut sink).unwrap();
        assert_eq!(engine.genome.len(), 2);
        assert_eq!(engine.stagnation(), 7);
        assert_eq!(engine.phase(), Phase::Saturated);
        assert_eq!(engine.policy(), SelectionPolicy::Uniform);
        assert_eq!(saturated.get(), 1);
    }

    #[test]
    fn saturation_switches_to_uniform_for_good() {
        let mut engine = Engine::from_scene(init(1, 2, 100), base(), FlatRenderer, one_polygon(8, 8)).unwrap();
        let mut saturated = 0;
        let mut sink = |e: &EngineEvent, _: &Genome| -> Result<()> {
            if matches!(e, EngineEvent::Saturated { .. }) {
                saturated += 1;
            }
            Ok(())
        };
        for _ in 0..3 {
            engine.step(&mut sink).unwrap();
        }
        assert_eq!(engine.phase(), Phase::Saturated);
        assert_eq!(engine.policy(), SelectionPolicy::Uniform);
        for _ in 0..20 {
            engine.step(&mut sink).unwrap();
            assert_eq!(engine.phase(), Phase::Saturated);
            assert_eq!(engine.policy(), SelectionPolicy::Uniform);
            assert_eq!(engine.genome.len(), 1);
        }
        assert_eq!(saturated, 1);
    }

    #[test]
    fn run_never_exceeds_the_polygon_cap() {
        let mut engine = Engine::new(init(4, 3, 400), base(), CpuRenderer::default()).unwrap();
        let summary = engine.run(&mut NullSink).unwrap();
        assert_eq!(summary.evaluations, 400);
        assert!(summary.polygons <= 4);
        assert!(engine.genome.ids_unique());
        assert!(engine.genome.polys.iter().all(|p| p.is_within(8, 8)));
        let fresh = loss(engine.renderer(), engine.base(), &engine.genome).unwrap();
        assert_eq!(fresh, summary.loss);
    }

    #[test]
    fn accepted_loss_only_drops_between_growth_events() {
        let mut engine = Engine::new(init(6, 20, 300), base(), CpuRenderer::default()).unwrap();
        let mut last = engine.accepted_loss;
        let mut sink = NullSink;
        while !engine.is_done() {
            let polygons = engine.genome.len();
            let stagnation = engine.stagnation();
            engine.step(&mut sink).unwrap();
            let structural = engine.genome.len() != polygons || engine.stagnation() > stagnation + 1;
            if !structural {
                assert!(engine.accepted_loss <= last);
            }
            last = engine.accepted_loss;
        }
    }

    #[test]
    fn same_seed_same_run() {
        let run = || {
            let mut engine = Engine::new(init(5, 10, 250), base(), CpuRenderer::default()).unwrap();
            let summary = engine.run(&mut NullSink).unwrap();
            (summary, engine.genome)
        };
        let (a, ga) = run();
        let (b, gb) = run();
        assert_eq!(a, b);
        assert_eq!(ga, gb);
    }

    #[test]
    fn run_reports_start_and_finish() {
        let mut engine = Engine::new(init(3, 5, 20), base(), CpuRenderer::default()).unwrap();
        let mut events = Vec::new();
        let mut sink = |e: &EngineEvent, _: &Genome| -> Result<()> {
            events.push(e.clone());
            Ok(())
        };
        engine.run(&mut sink).unwrap();
        assert!(matches!(events.first(), Some(EngineEvent::Started { polygons: 1, .. })));
        assert!(matches!(events.last(), Some(EngineEvent::Finished { evaluations: 20, .. })));
    }
}
