// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geographic query bounding box (EPSG:4326, lon/lat order)

use std::fmt;
use std::str::FromStr;

use geo::{coord, Polygon, Rect};

use crate::error::{Error, Result};

/// Query area in WGS84 degrees.
///
/// Always satisfies `min < max` on both axes; the fields are private so the
/// invariant cannot be broken after construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl QueryBBox {
    /// Create a bounding box, rejecting non-finite values and empty extents
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let values = [min_lon, min_lat, max_lon, max_lat];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidBBox(format!(
                "coordinates must be finite, got {:?}",
                values
            )));
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(Error::InvalidBBox(
                "min must be < max for lon/lat".to_string(),
            ));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Parse `<minLon,minLat,maxLon,maxLat>`
    pub fn parse(text: &str) -> Result<Self> {
        let parts = text
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| {
                Error::InvalidBBox(format!(
                    "expected '<minLon,minLat,maxLon,maxLat>', got '{}'",
                    text
                ))
            })?;

        match parts.as_slice() {
            [a, b, c, d] => Self::new(*a, *b, *c, *d),
            _ => Err(Error::InvalidBBox(format!(
                "expected 4 comma-separated numbers, got {}",
                parts.len()
            ))),
        }
    }

    #[inline]
    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    #[inline]
    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    #[inline]
    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    #[inline]
    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Center point as (lon, lat)
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }

    /// Points along the box outline, `per_edge` samples per side.
    ///
    /// Used to carry the box into another CRS where straight edges may curve.
    pub fn outline(&self, per_edge: usize) -> Vec<(f64, f64)> {
        let steps = per_edge.max(1);
        let corners = [
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
        ];

        let mut points = Vec::with_capacity(steps * 4);
        for i in 0..4 {
            let (x0, y0) = corners[i];
            let (x1, y1) = corners[(i + 1) % 4];
            for s in 0..steps {
                let t = s as f64 / steps as f64;
                points.push((x0 + (x1 - x0) * t, y0 + (y1 - y0) * t));
            }
        }
        points
    }
}

impl FromStr for QueryBBox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for QueryBBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
