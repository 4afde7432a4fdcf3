//! # maplibre-braille
//!
//! Renders vector tile maps as colored text for terminals.
//!
//! Features of [Mapbox Vector Tiles](https://github.com/mapbox/vector-tile-spec) are styled
//! with a style document, projected onto a pixel canvas and encoded as 8-dot braille or block
//! glyphs wrapped in 256-color ANSI escapes. Labels are placed without overlapping each other.
//!
//! ### Example
//!
//! ```no_run
//! use maplibre_braille::{
//!     config::Config, coords::LatLon, io::source_client::StaticTileSource,
//!     render::Renderer, style::Styler,
//! };
//!
//! # async fn run(style: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let styler = Styler::from_json(style)?;
//! let renderer = Renderer::new(StaticTileSource::new(), styler, Config::default(), 160, 80);
//! let frame = renderer.draw(LatLon::new(52.51, 13.4), 4.0).await?;
//! print!("{frame}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coords;
pub mod error;
pub mod io;
pub mod render;
pub mod style;
pub mod tile;
pub mod util;
