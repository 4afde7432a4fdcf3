//! Utils which are used internally

pub mod color;
pub mod math;
