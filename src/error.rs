use thiserror::Error;

use crate::dna::PolygonId;

/// errors surfaced by the search engine and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// mismatched buffers, degenerate base image, undecodable image
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// polygon id absent from the scene. a logic fault the controller must handle explicitly
    #[error("polygon {0} not found in scene")]
    NotFound(PolygonId),

    #[error("sequence position {position} out of range for {len} polygons")]
    OutOfRange { position: usize, len: usize },

    #[error("render failed: {0}")]
    RenderFailure(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
