// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned building boxes in Hammer units

/// One extruded footprint, already normalized around the working origin and
/// scaled to output units. The only thing the extractor hands to the map
/// writer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxDescriptor {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    /// Floor height
    pub z0: f64,
    /// Roof height
    pub z1: f64,
}

impl BoxDescriptor {
    /// Stores the extents as given; [`BoxDescriptor::is_solid`] rejects
    /// inverted ones
    #[inline]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, z0: f64, z1: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            z0,
            z1,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn depth(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.z1 - self.z0
    }

    /// True when every extent is finite and strictly positive
    pub fn is_solid(&self) -> bool {
        [self.width(), self.depth(), self.height()]
            .iter()
            .all(|d| d.is_finite() && *d > 0.0)
    }
}

impl From<(f64, f64, f64, f64, f64, f64)> for BoxDescriptor {
    fn from(t: (f64, f64, f64, f64, f64, f64)) -> Self {
        Self::new(t.0, t.1, t.2, t.3, t.4, t.5)
    }
}
