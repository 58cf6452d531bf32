//! progressive hill-climbing image reconstruction from translucent polygons.
//!
//! the engine keeps one accepted scene, mutates a single polygon per step and keeps the
//! candidate only if it lowers the pixel loss. when progress stalls it either grows the
//! scene by one polygon aimed at the worst-approximated pixels, or rolls back to the last
//! snapshot and tries a different placement.

pub mod dna;
pub mod engine;
pub mod error;
pub mod fitness;
pub mod mutate;
pub mod output;
pub mod placement;
pub mod raster;
pub mod render;
pub mod selection;
pub mod settings;

pub use dna::{Color, Genome, Polygon, PolygonId};
pub use engine::{Engine, EngineEvent, EventSink, LogSink, Phase, RunSummary};
pub use error::{Error, Result};
pub use raster::Raster;
pub use render::{CpuRenderer, Renderer};
pub use settings::{EngineInit, Settings};
