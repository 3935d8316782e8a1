use geo::{BooleanOps, BoundingRect, EuclideanLength, MultiPolygon, Relate};
use log::warn;
use rstar::AABB;

use super::Geometries;

/// A pair of units sharing a boundary of positive length, with the shared
/// length in meters. Pairs are emitted once, with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedBorder {
    pub a: usize,
    pub b: usize,
    pub length_m: f64,
}

/// Total boundary length (exterior and interior rings) in coordinate units.
fn boundary_length(shape: &MultiPolygon<f64>) -> f64 {
    shape
        .0
        .iter()
        .map(|polygon| {
            polygon.exterior().euclidean_length()
                + polygon.interiors().iter().map(|ring| ring.euclidean_length()).sum::<f64>()
        })
        .sum()
}

/// Length of shared boundary between two mutually touching multipolygons:
/// the union swallows the shared segments from both boundaries exactly once.
fn shared_boundary_length(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    let shared =
        (boundary_length(a) + boundary_length(b) - boundary_length(&a.union(b))) / 2.0;
    if shared > 1e-9 { shared } else { 0.0 }
}

impl Geometries {
    /// Compute the adjacency graph: pairs that touch (share boundary, zero
    /// interior overlap) with shared boundary longer than `min_length_m`.
    /// Independent from the temporal classifier; feeds the borders table.
    pub fn shared_borders(&self, min_length_m: f64) -> Vec<SharedBorder> {
        let mut borders = Vec::new();

        for i in 0..self.shapes().len() {
            let Some(rect) = self.shapes()[i].bounding_rect() else { continue };
            let search = AABB::from_corners(rect.min().into(), rect.max().into());

            let mut hits: Vec<usize> = self
                .rtree
                .locate_in_envelope_intersecting(&search)
                .map(|bb| bb.idx)
                .filter(|&j| j > i) // check each unordered pair once
                .collect();
            hits.sort_unstable();

            for j in hits {
                let im = self.shapes()[i].relate(&self.shapes()[j]);
                if !im.is_touches() {
                    continue;
                }

                let length_m = shared_boundary_length(&self.shapes()[i], &self.shapes()[j]);
                if !length_m.is_finite() {
                    warn!("border length between shapes {i} and {j} degenerated, skipping pair");
                    continue;
                }
                if length_m > min_length_m {
                    borders.push(SharedBorder { a: i, b: j, length_m });
                }
            }
        }

        borders
    }
}
