mod adjacency;
mod overlap;
mod proj;
mod repair;

pub use adjacency::SharedBorder;
pub use overlap::{overlap_metrics, OverlapMetrics, PairOutcome, SkipReason};
pub use proj::LAMBERT_EPSG;
pub use repair::repair;

use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// A bounding box in an R-tree, associated with a MultiPolygon by index.
#[derive(Debug, Clone)]
struct BoundingBox {
    idx: usize, // Index of corresponding MultiPolygon in shapes
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// One year's polygon set with an R-tree candidate index over bounding
/// boxes. The index prunes pairwise comparisons; classification itself
/// always uses exact geometric intersection.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    epsg: Option<u32>, // EPSG code of the coordinates, if known
}

impl Geometries {
    /// Construct from a vector of MultiPolygons. Shapes without a bounding
    /// rectangle (empty geometries) stay in the list but are never indexed,
    /// so they cannot appear as candidates.
    pub fn new(polygons: Vec<MultiPolygon<f64>>, epsg: Option<u32>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons
                    .iter()
                    .enumerate()
                    .filter_map(|(i, polygon)| {
                        polygon.bounding_rect().map(|bbox| BoundingBox { idx: i, bbox })
                    })
                    .collect(),
            ),
            shapes: polygons,
            epsg,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    #[inline]
    pub fn shapes(&self) -> &[MultiPolygon<f64>] {
        &self.shapes
    }

    #[inline]
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Indices of shapes whose bounding boxes intersect `shape`'s, in
    /// ascending order so downstream iteration is deterministic.
    pub fn candidates(&self, shape: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(rect) = shape.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut hits: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|bb| bb.idx)
            .collect();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
pub(crate) fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    use geo::{polygon, Polygon};
    let p: Polygon<f64> = polygon![
        (x: x0, y: y0),
        (x: x0 + size, y: y0),
        (x: x0 + size, y: y0 + size),
        (x: x0, y: y0 + size),
        (x: x0, y: y0),
    ];
    MultiPolygon::new(vec![p])
}
