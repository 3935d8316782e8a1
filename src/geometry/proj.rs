use anyhow::{anyhow, Context, Result};
use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use super::Geometries;

/// Statistics Canada Lambert (equal-area for national-scale work): the CRS
/// every snapshot is normalized into before any area arithmetic.
pub const LAMBERT_EPSG: u32 = 3347;

const LAMBERT_PROJ4: &str = "+proj=lcc +lat_1=49 +lat_2=77 +lat_0=63.390675 \
    +lon_0=-91.866667 +x_0=6200000 +y_0=3000000 +datum=NAD83 +units=m +no_defs +type=crs";

impl Geometries {
    /// Build PROJ.4 string for the source geographic CRS (degrees → radians
    /// handled in code).
    #[inline]
    fn source_geog_proj4(&self) -> &'static str {
        match self.epsg() {
            Some(4269) | Some(4617) => "+proj=longlat +datum=NAD83 +no_defs +type=crs",
            _ => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
        }
    }

    /// Reproject shapes from lon/lat to Statistics Canada Lambert so area
    /// and length arithmetic is metrically valid. A no-op when the shapes
    /// already carry the Lambert EPSG code.
    pub fn reproject_to_lambert(&self) -> Result<Vec<MultiPolygon<f64>>> {
        if self.epsg() == Some(LAMBERT_EPSG) {
            return Ok(self.shapes().to_vec());
        }

        let from = {
            let proj_string = self.source_geog_proj4();
            Proj4::from_proj_string(proj_string)
                .with_context(|| anyhow!("failed to build source PROJ.4: {proj_string}"))?
        };
        let to = Proj4::from_proj_string(LAMBERT_PROJ4)
            .with_context(|| anyhow!("failed to build target PROJ.4: {LAMBERT_PROJ4}"))?;

        // Map coords → radians in, meters out.
        self.shapes()
            .iter()
            .map(|shape| {
                shape.try_map_coords(|coord: Coord<f64>| {
                    let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
                    transform(&from, &to, &mut point)
                        .map_err(|e| anyhow!("CRS transform failed at ({}, {}): {e}", coord.x, coord.y))?;
                    Ok(Coord { x: point.0, y: point.1 })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, Polygon};

    #[test]
    fn lambert_shapes_pass_through_unchanged() {
        let p: Polygon<f64> = polygon![
            (x: 6_200_000.0, y: 3_000_000.0),
            (x: 6_201_000.0, y: 3_000_000.0),
            (x: 6_201_000.0, y: 3_001_000.0),
            (x: 6_200_000.0, y: 3_001_000.0),
            (x: 6_200_000.0, y: 3_000_000.0),
        ];
        let geoms = Geometries::new(vec![MultiPolygon::new(vec![p])], Some(LAMBERT_EPSG));
        let projected = geoms.reproject_to_lambert().unwrap();
        assert_eq!(projected, geoms.shapes().to_vec());
    }

    #[test]
    fn lonlat_reprojection_yields_metric_areas() {
        // Roughly 0.1° x 0.1° near Ottawa; projected area should be on the
        // order of 10^7..10^8 m², wildly different from the degree² value.
        let p: Polygon<f64> = polygon![
            (x: -75.7, y: 45.4),
            (x: -75.6, y: 45.4),
            (x: -75.6, y: 45.5),
            (x: -75.7, y: 45.5),
            (x: -75.7, y: 45.4),
        ];
        let geoms = Geometries::new(vec![MultiPolygon::new(vec![p])], Some(4617));
        let projected = geoms.reproject_to_lambert().unwrap();
        let area = projected[0].unsigned_area();
        assert!(area > 1e7 && area < 1e9, "area {area}");
    }
}
