//! Rasterization of styled tiles into terminal frames.

pub mod braille_buffer;
pub mod canvas;
pub mod label_buffer;
pub mod renderer;
pub mod simplify;

pub use renderer::{visible_tiles, Renderer, VisibleTile};
