use std::io::Read;

use flate2::read::GzDecoder;
use geozero::mvt::{tile, Message, Tile};

use crate::error::TileError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

/// Largest magnitude accepted for a coordinate or a coordinate delta.
const MAX_COORDINATE: i64 = 1 << 29;

#[derive(Default)]
pub struct TileParser;

impl TileParser {
    pub fn is_gzipped(data: &[u8]) -> bool {
        data.starts_with(&GZIP_MAGIC)
    }

    /// Decodes a protobuf vector tile, gunzipping it first if it starts with the gzip magic.
    pub fn parse(data: &[u8]) -> Result<Tile, TileError> {
        if Self::is_gzipped(data) {
            let mut decompressed = Vec::new();
            GzDecoder::new(data).read_to_end(&mut decompressed)?;
            Self::decode(&decompressed)
        } else {
            Self::decode(data)
        }
    }

    fn decode(data: &[u8]) -> Result<Tile, TileError> {
        Tile::decode(data).map_err(|e| TileError::Protobuf(e.to_string()))
    }

    /// Whether the command stream of `feature` has the shape its geometry type requires.
    ///
    /// Every command must be followed by all of its parameters and the cursor must stay
    /// within the coordinate range, otherwise the geometry can not be walked.
    pub fn is_well_formed(feature: &tile::Feature) -> bool {
        let geometry = feature.geometry.as_slice();
        let mut cursor = [0i64; 2];
        match feature.r#type {
            Some(t) if t == tile::GeomType::Point as i32 => {
                let Some((&first, parameters)) = geometry.split_first() else {
                    return false;
                };
                let (id, count) = command(first);
                id == MOVE_TO
                    && count >= 1
                    && parameters.len() >= count * 2
                    && advance(&mut cursor, &parameters[..count * 2])
            }
            Some(t) if t == tile::GeomType::Linestring as i32 => {
                parts_are_well_formed(geometry, false, &mut cursor)
            }
            Some(t) if t == tile::GeomType::Polygon as i32 => {
                parts_are_well_formed(geometry, true, &mut cursor)
            }
            _ => true,
        }
    }
}

fn command(integer: u32) -> (u32, usize) {
    (integer & 0x7, (integer >> 3) as usize)
}

fn command_integer(id: u32, count: u32) -> u32 {
    (id & 0x7) | (count << 3)
}

fn zigzag(parameter: u32) -> i64 {
    i64::from(((parameter >> 1) as i32) ^ -((parameter & 1) as i32))
}

/// Moves the cursor through coordinate pairs, failing once a position leaves the range.
fn advance(cursor: &mut [i64; 2], parameters: &[u32]) -> bool {
    parameters.chunks_exact(2).all(|pair| {
        let (dx, dy) = (zigzag(pair[0]), zigzag(pair[1]));
        cursor[0] += dx;
        cursor[1] += dy;
        [dx, dy, cursor[0], cursor[1]]
            .iter()
            .all(|value| value.abs() <= MAX_COORDINATE)
    })
}

/// Lines and rings: `MoveTo(1) x y LineTo(n) 2n parameters [ClosePath(1)]`, repeated.
fn parts_are_well_formed(mut geometry: &[u32], closed: bool, cursor: &mut [i64; 2]) -> bool {
    if geometry.is_empty() {
        return false;
    }
    let close = usize::from(closed);
    while !geometry.is_empty() {
        let [move_to, x, y, line_to, ..] = geometry else {
            return false;
        };
        let (id, count) = command(*line_to);
        let size = 4 + count * 2 + close;
        if *move_to != command_integer(MOVE_TO, 1) || id != LINE_TO || geometry.len() < size {
            return false;
        }
        if closed && geometry[size - 1] != command_integer(CLOSE_PATH, 1) {
            return false;
        }
        if !advance(cursor, &[*x, *y]) || !advance(cursor, &geometry[4..size - close]) {
            return false;
        }
        geometry = &geometry[size..];
    }
    true
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use geozero::mvt::{tile, Message, Tile};

    use super::TileParser;
    use crate::error::TileError;

    fn encoded_tile() -> Vec<u8> {
        Tile {
            layers: vec![tile::Layer {
                version: 2,
                name: "water".to_string(),
                extent: Some(4096),
                ..Default::default()
            }],
        }
        .encode_to_vec()
    }

    #[test]
    fn test_plain() {
        let data = encoded_tile();
        assert!(!TileParser::is_gzipped(&data));
        let tile = TileParser::parse(&data).unwrap();
        assert_eq!(tile.layers[0].name, "water");
    }

    #[test]
    fn test_gzipped() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded_tile()).unwrap();
        let data = encoder.finish().unwrap();

        assert!(TileParser::is_gzipped(&data));
        let tile = TileParser::parse(&data).unwrap();
        assert_eq!(tile.layers.len(), 1);
    }

    #[test]
    fn test_corrupt_gzip() {
        let result = TileParser::parse(&[0x1f, 0x8b, 0x00, 0x01]);
        assert!(matches!(result, Err(TileError::Gzip(_))));
    }

    fn feature(geom_type: tile::GeomType, geometry: Vec<u32>) -> tile::Feature {
        tile::Feature {
            r#type: Some(geom_type as i32),
            geometry,
            ..Default::default()
        }
    }

    #[test]
    fn test_well_formed_geometry() {
        use tile::GeomType::{Linestring, Point, Polygon};

        assert!(TileParser::is_well_formed(&feature(Point, vec![9, 50, 34])));
        assert!(TileParser::is_well_formed(&feature(Point, vec![17, 2, 2, 4, 4])));
        assert!(TileParser::is_well_formed(&feature(
            Linestring,
            vec![9, 4, 4, 18, 0, 16, 16, 0, 9, 2, 2, 10, 4, 4]
        )));
        assert!(TileParser::is_well_formed(&feature(
            Polygon,
            vec![9, 6, 12, 18, 10, 12, 24, 44, 15]
        )));
        assert!(TileParser::is_well_formed(&tile::Feature::default()));
    }

    #[test]
    fn test_malformed_geometry() {
        use tile::GeomType::{Linestring, Point, Polygon};

        for (geom_type, geometry) in [
            (Point, vec![]),
            (Point, vec![9, 50]),
            (Point, vec![17, 2, 2]),
            (Point, vec![10, 2, 2]),
            (Linestring, vec![]),
            (Linestring, vec![42, 2]),
            (Linestring, vec![9, 4, 4, 18, 0, 16]),
            (Linestring, vec![9, 4, 4, 15]),
            (Polygon, vec![9, 6, 12, 18, 10, 12, 24, 44]),
            (Polygon, vec![9, 6, 12, 18, 10, 12, 24, 44, 9]),
            // Coordinates overflowing the cursor.
            (Point, vec![9, u32::MAX - 1, 0]),
            (Linestring, vec![9, 1 << 30, 0, 10, 1 << 30, 0]),
        ] {
            assert!(
                !TileParser::is_well_formed(&feature(geom_type, geometry.clone())),
                "{geom_type:?} {geometry:?}"
            );
        }
    }

    #[test]
    fn test_corrupt_protobuf() {
        let result = TileParser::parse(&[0x1a, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(TileError::Protobuf(_))));
    }
}
