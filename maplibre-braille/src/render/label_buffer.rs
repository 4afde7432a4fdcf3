//! Label collision detection on the character grid.

use std::sync::Arc;

use rstar::{RTree, RTreeObject, AABB};
use unicode_width::UnicodeWidthStr;

use crate::tile::Feature;

/// A placed label, boxed in label-grid cells including its margin.
#[derive(Debug, Clone)]
pub struct LabelPlacement {
    envelope: AABB<[f64; 2]>,
    pub feature: Arc<Feature>,
}

impl LabelPlacement {
    pub fn envelope(&self) -> &AABB<[f64; 2]> {
        &self.envelope
    }
}

impl RTreeObject for LabelPlacement {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Tracks the space taken by the labels of the current frame.
pub struct LabelBuffer {
    tree: RTree<LabelPlacement>,
    margin: f64,
}

impl LabelBuffer {
    pub fn new(margin: f64) -> Self {
        Self {
            tree: RTree::new(),
            margin,
        }
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Projects a pixel to its character cell.
    pub fn project(x: f64, y: f64) -> [f64; 2] {
        [(x / 2.0).floor(), (y / 4.0).floor()]
    }

    fn area(text: &str, [x, y]: [f64; 2], margin: f64) -> AABB<[f64; 2]> {
        #[allow(clippy::cast_precision_loss)]
        let width = text.width() as f64;
        AABB::from_corners(
            [x - margin, y - margin / 2.0],
            [x + margin + width, y + margin / 2.0],
        )
    }

    /// Reserves the space of `text` at pixel `(x, y)` unless it overlaps a placed label.
    /// A margin of `None` or `0` uses the buffer's default margin.
    pub fn write_if_possible(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        feature: Arc<Feature>,
        margin: Option<f64>,
    ) -> bool {
        let margin = margin.filter(|margin| *margin != 0.0).unwrap_or(self.margin);
        let envelope = Self::area(text, Self::project(x, y), margin);

        if self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .next()
            .is_some()
        {
            return false;
        }
        self.tree.insert(LabelPlacement { envelope, feature });
        true
    }

    /// Placements covering pixel `(x, y)`.
    pub fn features_at(&self, x: f64, y: f64) -> Vec<&LabelPlacement> {
        let point = Self::project(x, y);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point(point))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstar::{Envelope, AABB};

    use super::LabelBuffer;
    use crate::{
        style::StyleRule,
        tile::{Feature, FeatureKind},
    };

    fn feature(label: &str) -> Arc<Feature> {
        Arc::new(Feature {
            source_layer: "poi_label".to_string(),
            kind: FeatureKind::Symbol,
            rings: vec![],
            color: 1,
            label: Some(label.to_string()),
            sort_key: None,
            style: Arc::new(StyleRule::default()),
            bounds: AABB::from_point([0.0, 0.0]),
        })
    }

    #[test]
    fn test_project() {
        assert_eq!(LabelBuffer::project(5.0, 9.0), [2.0, 2.0]);
        assert_eq!(LabelBuffer::project(-1.0, -1.0), [-1.0, -1.0]);
    }

    #[test]
    fn test_collision() {
        let mut buffer = LabelBuffer::new(5.0);
        assert!(buffer.write_if_possible("Cafe", 20.0, 40.0, feature("Cafe"), None));
        // Same spot.
        assert!(!buffer.write_if_possible("Bar", 20.0, 40.0, feature("Bar"), Some(1.0)));
        // Inside the margin.
        assert!(!buffer.write_if_possible("Bar", 40.0, 40.0, feature("Bar"), Some(1.0)));
        assert_eq!(buffer.len(), 1);
        // Far away.
        assert!(buffer.write_if_possible("Bar", 120.0, 40.0, feature("Bar"), Some(1.0)));
        assert_eq!(buffer.len(), 2);

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.write_if_possible("Bar", 20.0, 40.0, feature("Bar"), None));
    }

    #[test]
    fn test_placements_never_overlap() {
        let mut buffer = LabelBuffer::new(2.0);
        for y in (0..200).step_by(7) {
            for x in (0..400).step_by(13) {
                let text = if (x + y) % 3 == 0 { "◉" } else { "Main Street" };
                buffer.write_if_possible(text, f64::from(x), f64::from(y), feature(text), None);
            }
        }

        let placements: Vec<_> = buffer.tree.iter().collect();
        assert!(placements.len() > 1);
        for (i, a) in placements.iter().enumerate() {
            for b in &placements[i + 1..] {
                assert!(!a.envelope().intersects(b.envelope()));
            }
        }
    }

    #[test]
    fn test_features_at() {
        let mut buffer = LabelBuffer::new(2.0);
        buffer.write_if_possible("Cafe", 20.0, 40.0, feature("Cafe"), None);

        let hits = buffer.features_at(22.0, 41.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].feature.label.as_deref(), Some("Cafe"));
        assert!(buffer.features_at(200.0, 200.0).is_empty());
    }
}
