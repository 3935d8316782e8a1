//! Per-year snapshots of spatial units: shapefile ingest, schema contract,
//! geometry repair, reprojection, and CD-level dissolve.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use geo::{Area, BooleanOps, MultiPolygon};
use log::{info, warn};
use shapefile::dbase::{FieldValue, Record};
use shapefile::{Reader, Shape};

use crate::geometry::{repair, Geometries};

/// Attribute field names expected in a year's source table. Validated up
/// front: a missing field is a configuration error, reported by name,
/// never silently substituted by a lookalike column.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub unit_id: String,
    pub name: String,
    pub division: String,
    pub province: String,
}

impl FieldSpec {
    /// Default field names following the source convention for a census
    /// year (`TCPUID_CSD_1851`, `NAME_CSD_1851`, ...).
    pub fn for_year(year: u16) -> Self {
        Self {
            unit_id: format!("TCPUID_CSD_{year}"),
            name: format!("NAME_CSD_{year}"),
            division: format!("NAME_CD_{year}"),
            province: format!("PR_{year}"),
        }
    }
}

/// Attributes of one spatial unit within a year's snapshot.
#[derive(Debug, Clone)]
pub struct UnitAttrs {
    pub id: Arc<str>,
    pub name: Option<Arc<str>>,
    pub division: Option<Arc<str>>,
    pub province: Option<Arc<str>>,
}

/// One census year's units. Immutable once loaded; geometry lives in an
/// equal-area CRS (unless reprojection failed, see `projected`) with
/// per-unit areas precomputed.
#[derive(Debug)]
pub struct Snapshot {
    pub year: u16,
    pub units: Vec<UnitAttrs>,
    pub index: AHashMap<Arc<str>, u32>,
    pub geoms: Geometries,
    pub areas: Vec<f64>,
    /// False when reprojection failed: areas and IoU values downstream are
    /// then unreliable and flagged, but processing continues best-effort.
    pub projected: bool,
}

/// Read a character field from a dBase record. The field must exist in the
/// schema; a null value is fine, a missing column is not.
fn get_character(record: &Record, field: &str) -> Result<Option<String>> {
    match record.get(field) {
        Some(FieldValue::Character(value)) => {
            Ok(value.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        }
        Some(other) => bail!("attribute field {field:?} has non-character type: {other:?}"),
        None => bail!("missing required attribute field: {field:?}"),
    }
}

/// Coerce a generic shape into an owned multipolygon, raising an error for
/// non-areal shapes.
fn shape_to_multipolygon(shape: Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Ok(rings_to_geo(&polygon)),
        Shape::NullShape => Ok(MultiPolygon::new(vec![])),
        other => bail!("found non-Polygon shape in layer: {:?}", other.shapetype()),
    }
}

/// Convert shapefile rings to geo::MultiPolygon. Shapefiles store each
/// outer ring followed by its holes.
fn rings_to_geo(polygon: &shapefile::Polygon) -> MultiPolygon<f64> {
    use shapefile::PolygonRing;

    fn to_linestring(points: &[shapefile::Point]) -> geo::LineString<f64> {
        let mut coords: Vec<geo::Coord<f64>> =
            points.iter().map(|p| geo::Coord { x: p.x, y: p.y }).collect();
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
        geo::LineString(coords)
    }

    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    for ring in polygon.rings() {
        match ring {
            PolygonRing::Outer(points) => {
                polys.push(geo::Polygon::new(to_linestring(points), vec![]));
            }
            PolygonRing::Inner(points) => {
                if let Some(last) = polys.last_mut() {
                    last.interiors_push(to_linestring(points));
                }
            }
        }
    }
    MultiPolygon::new(polys)
}

impl Snapshot {
    /// Load one year's units from a shapefile, validate the attribute
    /// schema, repair invalid geometries, reproject to the equal-area CRS
    /// and precompute areas.
    ///
    /// `source_epsg` identifies the file's CRS when known; `provinces`
    /// restricts the snapshot to the given province codes.
    pub fn from_shapefile(
        year: u16,
        path: &Path,
        fields: &FieldSpec,
        source_epsg: Option<u32>,
        provinces: Option<&HashSet<String>>,
    ) -> Result<Self> {
        let mut reader = Reader::from_path(path)
            .with_context(|| format!("failed to open shapefile: {}", path.display()))?;

        let mut shapes: Vec<MultiPolygon<f64>> = Vec::new();
        let mut units: Vec<UnitAttrs> = Vec::new();
        let mut dropped = 0usize;

        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result.context("error reading shape+record")?;

            let Some(id) = get_character(&record, &fields.unit_id)? else {
                // Features without an id for this year belong to another
                // year's coverage; skip them.
                continue;
            };
            let province = get_character(&record, &fields.province)?;
            if let Some(allowed) = provinces {
                match &province {
                    Some(pr) if allowed.contains(&pr.to_uppercase()) => {}
                    _ => continue,
                }
            }

            let raw = shape_to_multipolygon(shape)?;
            let Some(repaired) = repair(&raw) else {
                warn!("{year}: unit {id} has unrepairable geometry, excluded from candidate set");
                dropped += 1;
                continue;
            };

            units.push(UnitAttrs {
                id: Arc::from(id.as_str()),
                name: get_character(&record, &fields.name)?.map(|s| Arc::from(s.as_str())),
                division: get_character(&record, &fields.division)?.map(|s| Arc::from(s.as_str())),
                province: province.map(|s| Arc::from(s.as_str())),
            });
            shapes.push(repaired);
        }

        if dropped > 0 {
            info!("{year}: excluded {dropped} units with unrepairable geometry");
        }
        info!("{year}: loaded {} units from {}", units.len(), path.display());

        Ok(Self::from_parts(year, units, shapes, source_epsg))
    }

    /// Assemble a snapshot from already-loaded units and shapes, running
    /// the normalization steps (reprojection, area precomputation).
    pub fn from_parts(
        year: u16,
        units: Vec<UnitAttrs>,
        shapes: Vec<MultiPolygon<f64>>,
        source_epsg: Option<u32>,
    ) -> Self {
        let geoms = Geometries::new(shapes, source_epsg);

        let (shapes, projected) = match geoms.reproject_to_lambert() {
            Ok(projected) => (projected, true),
            Err(e) => {
                warn!("{year}: reprojection failed ({e}); continuing with source coordinates, areas unreliable");
                (geoms.shapes().to_vec(), false)
            }
        };

        let areas: Vec<f64> = shapes.iter().map(|s| s.unsigned_area()).collect();
        let epsg = if projected { Some(crate::geometry::LAMBERT_EPSG) } else { source_epsg };
        let geoms = Geometries::new(shapes, epsg);

        let index: AHashMap<Arc<str>, u32> = units
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit.id.clone(), i as u32))
            .collect();

        Self { year, units, index, geoms, areas, projected }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Dissolve units to division (CD) level: group by (province, division
    /// name), union the member geometries, and synthesize division ids.
    /// The result is a snapshot like any other and links the same way.
    pub fn dissolve_to_divisions(&self) -> Snapshot {
        let mut groups: AHashMap<(String, String), Vec<usize>> = AHashMap::new();
        for (i, unit) in self.units.iter().enumerate() {
            let Some(division) = &unit.division else { continue };
            let province = unit.province.as_deref().unwrap_or("").to_string();
            groups.entry((province, division.to_string())).or_default().push(i);
        }

        let mut keys: Vec<(String, String)> = groups.keys().cloned().collect();
        keys.sort();

        let mut units = Vec::with_capacity(keys.len());
        let mut shapes = Vec::with_capacity(keys.len());
        for (province, division) in keys {
            let members = &groups[&(province.clone(), division.clone())];
            let Some(merged) = members
                .iter()
                .map(|&i| self.geoms.shapes()[i].clone())
                .reduce(|a, b| a.union(&b))
            else {
                continue;
            };

            let id = format!("CD_{province}_{}", division.replace(' ', "_"));
            units.push(UnitAttrs {
                id: Arc::from(id.as_str()),
                name: Some(Arc::from(division.as_str())),
                division: None,
                province: (!province.is_empty()).then(|| Arc::from(province.as_str())),
            });
            shapes.push(merged);
        }

        info!("{}: dissolved {} units into {} divisions", self.year, self.len(), units.len());
        // Geometry is already in the Lambert CRS (or still in the source
        // CRS when reprojection failed; from_parts retries and re-flags).
        Snapshot::from_parts(self.year, units, shapes, self.geoms.epsg())
    }
}
