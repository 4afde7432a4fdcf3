//! Tile acquisition and the store of decoded tiles.

pub mod source_client;
pub mod tile_repository;
