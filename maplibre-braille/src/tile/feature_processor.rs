//! Collects the features of a vector tile layer from geozero callbacks.

use std::mem;

use cgmath::Point2;
use geozero::{error::GeozeroError, ColumnValue, FeatureProcessor, GeomProcessor, PropertyProcessor};

use crate::tile::{Properties, PropertyValue};

pub type Ring = Vec<Point2<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
}

impl GeometryType {
    /// Value of the synthetic `$type` property filters can match on.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
        }
    }
}

/// A decoded feature before styling. Every part is a list of rings: a single point,
/// a single line or the outer ring of a polygon followed by its holes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub geometry_type: GeometryType,
    pub parts: Vec<Vec<Ring>>,
    pub properties: Properties,
}

#[derive(Default)]
pub struct FeatureCollector {
    features: Vec<RawFeature>,

    properties: Properties,
    geometry_type: Option<GeometryType>,
    parts: Vec<Vec<Ring>>,
    polygon: Vec<Ring>,
    ring: Ring,
    in_polygon: bool,
    in_multipoint: bool,
}

impl FeatureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_features(self) -> Vec<RawFeature> {
        self.features
    }
}

fn property_value(value: &ColumnValue) -> Option<PropertyValue> {
    #[allow(clippy::cast_precision_loss)]
    let value = match value {
        ColumnValue::String(string) => PropertyValue::String(string.to_string()),
        ColumnValue::Bool(boolean) => PropertyValue::Bool(*boolean),
        ColumnValue::Byte(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::UByte(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::Short(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::UShort(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::Int(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::UInt(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::Long(number) => PropertyValue::Number(*number as f64),
        ColumnValue::ULong(number) => PropertyValue::Number(*number as f64),
        ColumnValue::Float(number) => PropertyValue::Number(f64::from(*number)),
        ColumnValue::Double(number) => PropertyValue::Number(*number),
        _ => return None,
    };
    Some(value)
}

impl GeomProcessor for FeatureCollector {
    fn xy(&mut self, x: f64, y: f64, _idx: usize) -> Result<(), GeozeroError> {
        let point = Point2::new(x, y);
        if self.in_multipoint {
            self.parts.push(vec![vec![point]]);
        } else {
            self.ring.push(point);
        }
        Ok(())
    }

    fn point_begin(&mut self, _idx: usize) -> Result<(), GeozeroError> {
        self.geometry_type = Some(GeometryType::Point);
        self.ring = Vec::with_capacity(1);
        Ok(())
    }

    fn point_end(&mut self, _idx: usize) -> Result<(), GeozeroError> {
        let ring = mem::take(&mut self.ring);
        self.parts.push(vec![ring]);
        Ok(())
    }

    fn multipoint_begin(&mut self, size: usize, _idx: usize) -> Result<(), GeozeroError> {
        self.geometry_type = Some(GeometryType::Point);
        self.parts.reserve(size);
        self.in_multipoint = true;
        Ok(())
    }

    fn multipoint_end(&mut self, _idx: usize) -> Result<(), GeozeroError> {
        self.in_multipoint = false;
        Ok(())
    }

    fn linestring_begin(&mut self, _tagged: bool, size: usize, _idx: usize) -> Result<(), GeozeroError> {
        if !self.in_polygon {
            self.geometry_type = Some(GeometryType::LineString);
        }
        self.ring = Vec::with_capacity(size);
        Ok(())
    }

    fn linestring_end(&mut self, _tagged: bool, _idx: usize) -> Result<(), GeozeroError> {
        let ring = mem::take(&mut self.ring);
        if self.in_polygon {
            self.polygon.push(ring);
        } else {
            self.parts.push(vec![ring]);
        }
        Ok(())
    }

    fn polygon_begin(&mut self, _tagged: bool, size: usize, _idx: usize) -> Result<(), GeozeroError> {
        self.geometry_type = Some(GeometryType::Polygon);
        self.polygon = Vec::with_capacity(size);
        self.in_polygon = true;
        Ok(())
    }

    fn polygon_end(&mut self, _tagged: bool, _idx: usize) -> Result<(), GeozeroError> {
        self.in_polygon = false;
        let polygon = mem::take(&mut self.polygon);
        self.parts.push(polygon);
        Ok(())
    }
}

impl PropertyProcessor for FeatureCollector {
    fn property(&mut self, _idx: usize, name: &str, value: &ColumnValue) -> Result<bool, GeozeroError> {
        match property_value(value) {
            Some(value) => {
                self.properties.insert(name.to_string(), value);
            }
            None => log::trace!("skipping property `{name}` of unsupported type"),
        }
        Ok(false)
    }
}

impl FeatureProcessor for FeatureCollector {
    fn properties_begin(&mut self) -> Result<(), GeozeroError> {
        self.properties = Properties::new();
        Ok(())
    }

    fn geometry_begin(&mut self) -> Result<(), GeozeroError> {
        self.geometry_type = None;
        self.parts.clear();
        self.polygon.clear();
        self.ring.clear();
        self.in_polygon = false;
        self.in_multipoint = false;
        Ok(())
    }

    fn feature_end(&mut self, idx: u64) -> Result<(), GeozeroError> {
        let properties = mem::take(&mut self.properties);
        let parts = mem::take(&mut self.parts);
        match self.geometry_type.take() {
            Some(geometry_type) => self.features.push(RawFeature {
                geometry_type,
                parts,
                properties,
            }),
            None => log::debug!("feature {idx} has no supported geometry"),
        }
        Ok(())
    }
}
