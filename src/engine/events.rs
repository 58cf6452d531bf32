use crate::dna::{Genome, PolygonId};
use crate::error::Result;
use crate::fitness::MetricsSnapshot;
use crate::mutate::MutationKind;

// messages from the search loop to whoever is listening
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Started {
        polygons: usize,
        loss: f64,
    },
    /// a candidate beat the accepted scene and replaced it
    Improved {
        evaluation: u64,
        loss: f64,
        kind: MutationKind,
        metrics: MetricsSnapshot,
    },
    /// the scene was snapshotted and one energy-guided polygon appended
    Grew {
        evaluation: u64,
        polygons: usize,
        loss: f64,
        /// the baseline that the accepted loss had to beat
        previous_baseline: f64,
    },
    /// growth was refused; the scene went back to snapshot `generation` plus a fresh polygon
    RolledBack {
        evaluation: u64,
        generation: usize,
        polygons: usize,
        loss: f64,
    },
    /// the scene hit the polygon cap; selection is uniform from here on
    Saturated {
        evaluation: u64,
        polygons: usize,
    },
    /// the picked polygon could not be found, nothing was evaluated
    Skipped {
        evaluation: u64,
        id: PolygonId,
    },
    Finished {
        evaluations: u64,
        polygons: usize,
        generations: usize,
        loss: f64,
    },
}

/// receiver for engine events. the genome is the accepted scene after the event
pub trait EventSink {
    fn on_event(&mut self, event: &EngineEvent, genome: &Genome) -> Result<()>;
}

impl<F> EventSink for F
where
    F: FnMut(&EngineEvent, &Genome) -> Result<()>,
{
    fn on_event(&mut self, event: &EngineEvent, genome: &Genome) -> Result<()> {
        self(event, genome)
    }
}

/// fans every event out to two sinks, first then second
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn on_event(&mut self, event: &EngineEvent, genome: &Genome) -> Result<()> {
        self.0.on_event(event, genome)?;
        self.1.on_event(event, genome)
    }
}

/// discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &EngineEvent, _genome: &Genome) -> Result<()> {
        Ok(())
    }
}

/// turns events into `log` records.
/// improvements are frequent, so only every `interval`-th one is logged at info
pub struct LogSink {
    counter: u32,
    interval: u32,
}

impl LogSink {
    pub fn new(interval: u32) -> Self {
        Self {
            counter: 0,
            interval: interval.max(1),
        }
    }

    #[inline]
    fn should_report(&mut self) -> bool {
        self.counter += 1;
        self.counter % self.interval == 0
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(50)
    }
}

impl EventSink for LogSink {
    fn on_event(&mut self, event: &EngineEvent, _genome: &Genome) -> Result<()> {
        match *event {
            EngineEvent::Started { polygons, loss } => {
                log::info!("search started: {} polygon(s), loss {:.3}", polygons, loss);
            }
            EngineEvent::Improved { evaluation, loss, kind, metrics } => {
                if self.should_report() {
                    log::info!(
                        "eval {}: loss {:.3} ({:.2}% complete, {:.2} dB)",
                        evaluation,
                        loss,
                        metrics.complete_pct,
                        metrics.psnr
                    );
                } else {
                    log::debug!("eval {}: {:?} mutation improved loss to {:.3}", evaluation, kind, loss);
                }
            }
            EngineEvent::Grew { evaluation, polygons, loss, previous_baseline } => {
                log::info!(
                    "eval {}: grew to {} polygons (loss {:.3} < baseline {:.3})",
                    evaluation,
                    polygons,
                    loss,
                    previous_baseline
                );
            }
            EngineEvent::RolledBack { evaluation, generation, polygons, loss } => {
                log::debug!(
                    "eval {}: rolled back to generation {} with {} polygons, loss {:.3}",
                    evaluation,
                    generation,
                    polygons,
                    loss
                );
            }
            EngineEvent::Saturated { evaluation, polygons } => {
                log::info!(
                    "eval {}: reached {} polygons, switching to uniform selection",
                    evaluation,
                    polygons
                );
            }
            EngineEvent::Skipped { evaluation, id } => {
                log::warn!("eval {}: polygon {} not found, step skipped", evaluation, id);
            }
            EngineEvent::Finished { evaluations, polygons, generations, loss } => {
                log::info!(
                    "search finished after {} evaluations: {} polygons, {} generations, loss {:.3}",
                    evaluations,
                    polygons,
                    generations,
                    loss
                );
            }
        }
        Ok(())
    }
}
