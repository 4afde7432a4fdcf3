//! Errors which can happen in various parts of the library.

use thiserror::Error;

use crate::io::source_client::SourceFetchError;

/// A color value could not be turned into an RGB triple.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported hex color: {0}")]
pub struct ColorError(pub String);

/// The style document could not be compiled.
#[derive(Error, Debug)]
pub enum StyleError {
    #[error("invalid style document")]
    Json(#[from] serde_json::Error),
    #[error("invalid color in style layer `{layer}`")]
    Color {
        layer: String,
        #[source]
        source: ColorError,
    },
}

/// A raw vector tile could not be decoded.
#[derive(Error, Debug)]
pub enum TileError {
    #[error("failed to decompress tile")]
    Gzip(#[from] std::io::Error),
    #[error("failed to decode tile protobuf: {0}")]
    Protobuf(String),
    #[error("failed to process tile geometry")]
    Geometry(#[from] geozero::error::GeozeroError),
    #[error("malformed geometry command stream in layer `{layer}`")]
    MalformedGeometry { layer: String },
}

#[derive(Error, Debug)]
pub enum Error {
    /// Another draw is still in flight.
    #[error("renderer is busy drawing")]
    Busy,
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error(transparent)]
    Source(#[from] SourceFetchError),
}
