// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed-form map projections
//!
//! Transverse Mercator uses the Krüger series to sixth order in the third
//! flattening `n`, which stays well below a millimetre inside a UTM zone.
//! Geographic CRSs on different ellipsoids are treated as identical (no
//! datum shift); ETRS89 and WGS84 agree to well under a metre.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::error::{Error, Result};

/// Reference ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis in metres
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    /// Third flattening
    #[inline]
    pub fn n(&self) -> f64 {
        self.f / (2.0 - self.f)
    }

    /// First eccentricity
    #[inline]
    pub fn e(&self) -> f64 {
        (self.f * (2.0 - self.f)).sqrt()
    }

    /// Rectifying radius: meridian arc length per radian of rectifying latitude
    pub fn rectifying_radius(&self) -> f64 {
        let n = self.n();
        let n2 = n * n;
        self.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0 + n2 * n2 * n2 / 256.0)
    }
}

/// Transverse Mercator projection
#[derive(Debug, Clone, PartialEq)]
pub struct TransverseMercator {
    e: f64,
    /// k0 * A
    scaled_radius: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl TransverseMercator {
    pub fn new(
        ellipsoid: Ellipsoid,
        central_meridian_deg: f64,
        scale_factor: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let n = ellipsoid.n();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1983433.0 * n6 / 1935360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167603.0 * n6 / 181440.0,
            49561.0 * n4 / 161280.0 - 179.0 * n5 / 168.0 + 6601661.0 * n6 / 7257600.0,
            34729.0 * n5 / 80640.0 - 3418889.0 * n6 / 1995840.0,
            212378941.0 * n6 / 319334400.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1118711.0 * n6 / 3870720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161280.0 - 11.0 * n5 / 504.0 - 830251.0 * n6 / 7257600.0,
            4583.0 * n5 / 161280.0 - 108847.0 * n6 / 3991680.0,
            20648693.0 * n6 / 638668800.0,
        ];

        Self {
            e: ellipsoid.e(),
            scaled_radius: scale_factor * ellipsoid.rectifying_radius(),
            alpha,
            beta,
            lon0: central_meridian_deg.to_radians(),
            false_easting,
            false_northing,
        }
    }

    /// UTM zone 1-60
    pub fn utm(ellipsoid: Ellipsoid, zone: u32, south: bool) -> Self {
        let central_meridian = zone as f64 * 6.0 - 183.0;
        let false_northing = if south { 10_000_000.0 } else { 0.0 };
        Self::new(ellipsoid, central_meridian, 0.9996, 500_000.0, false_northing)
    }

    /// (lon, lat) degrees to (easting, northing) metres
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        check_geographic(lon, lat)?;
        let phi = lat.to_radians();
        let dlon = normalize_angle(lon.to_radians() - self.lon0);
        if dlon.abs() >= FRAC_PI_2 {
            return Err(Error::Transform(format!(
                "longitude {} is too far from the central meridian",
                lon
            )));
        }

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();
        let xi = t.atan2(dlon.cos());
        let eta = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut x = eta;
        let mut y = xi;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            x += a * (k * xi).cos() * (k * eta).sinh();
            y += a * (k * xi).sin() * (k * eta).cosh();
        }

        Ok((
            self.false_easting + self.scaled_radius * x,
            self.false_northing + self.scaled_radius * y,
        ))
    }

    /// (easting, northing) metres to (lon, lat) degrees
    pub fn inverse(&self, easting: f64, northing: f64) -> Result<(f64, f64)> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(Error::Transform("non-finite projected coordinate".to_string()));
        }
        let xi = (northing - self.false_northing) / self.scaled_radius;
        let eta = (easting - self.false_easting) / self.scaled_radius;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let lon = self.lon0 + eta_p.sinh().atan2(xi_p.cos());
        let lat = geodetic_from_conformal(chi, self.e);

        Ok((normalize_angle(lon).to_degrees(), lat.to_degrees()))
    }
}

/// Spherical (web) Mercator on the WGS84 semi-major axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator;

impl WebMercator {
    const RADIUS: f64 = 6_378_137.0;

    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        check_geographic(lon, lat)?;
        let y = (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln() * Self::RADIUS;
        if !y.is_finite() {
            return Err(Error::Transform(format!("latitude {} has no web mercator northing", lat)));
        }
        Ok((lon.to_radians() * Self::RADIUS, y))
    }

    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::Transform("non-finite projected coordinate".to_string()));
        }
        let lon = (x / Self::RADIUS).to_degrees();
        let lat = (2.0 * (y / Self::RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
        Ok((lon, lat))
    }
}

/// Invert the conformal latitude by fixed-point iteration
fn geodetic_from_conformal(chi: f64, e: f64) -> f64 {
    let base = (FRAC_PI_4 + chi / 2.0).tan();
    let mut phi = chi;
    for _ in 0..32 {
        let es = e * phi.sin();
        let next = 2.0 * (base * ((1.0 + es) / (1.0 - es)).powf(e / 2.0)).atan() - FRAC_PI_2;
        if (next - phi).abs() < 1e-15 {
            return next;
        }
        phi = next;
    }
    phi
}

fn check_geographic(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
        return Err(Error::Transform(format!("invalid geographic coordinate ({}, {})", lon, lat)));
    }
    Ok(())
}

/// Wrap an angle in radians into (-π, π]
fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}
