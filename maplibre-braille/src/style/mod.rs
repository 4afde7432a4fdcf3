//! Vector tile format styling.

pub mod filter;
pub mod layer;
mod styler;

pub use filter::Filter;
pub use layer::{LayerType, PaintValue, StyleLayer, StyleRule};
pub use styler::*;
