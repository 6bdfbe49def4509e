// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinate reference system identifiers
//!
//! Datasets describe their CRS in many spellings: `EPSG:25832`, OGC URNs and
//! URLs, bare codes, or a full WKT definition. [`CrsSpec`] normalizes them so
//! they can be compared, hashed and handed to a transform provider.

use std::fmt;
use std::str::FromStr;

use csmap_core::CrsDefinition;

use crate::error::{Error, Result};

/// WGS84 geographic, longitude/latitude in degrees
pub const EPSG_WGS84: u32 = 4326;

/// ETRS89 / UTM zone 32N, the metric working CRS
pub const EPSG_ETRS89_UTM32N: u32 = 25832;

/// Leading keywords of WKT1 and WKT2 CRS definitions
const WKT_KEYWORDS: &[&str] = &[
    "GEOGCS",
    "PROJCS",
    "GEOCCS",
    "COMPD_CS",
    "VERT_CS",
    "GEOGCRS",
    "GEOGRAPHICCRS",
    "GEODCRS",
    "GEODETICCRS",
    "PROJCRS",
    "PROJECTEDCRS",
    "COMPOUNDCRS",
    "BOUNDCRS",
    "VERTCRS",
];

/// A parsed CRS reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CrsSpec {
    /// EPSG code
    Epsg(u32),
    /// WKT1 or WKT2 definition
    Wkt(String),
    /// Anything else (PROJ strings, other authorities), passed through as-is
    Custom(String),
}

impl CrsSpec {
    pub const WGS84: CrsSpec = CrsSpec::Epsg(EPSG_WGS84);
    pub const ETRS89_UTM32N: CrsSpec = CrsSpec::Epsg(EPSG_ETRS89_UTM32N);

    /// Parse a CRS reference.
    ///
    /// Accepts `EPSG:n` in any case, a bare `n`, `urn:ogc:def:crs:EPSG::n`,
    /// `http(s)://www.opengis.net/def/crs/EPSG/0/n`, the `CRS84` aliases and
    /// WKT. Other non-empty text is kept as [`CrsSpec::Custom`].
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidCrs("empty CRS reference".to_string()));
        }
        if looks_like_wkt(text) {
            return Ok(CrsSpec::Wkt(text.to_string()));
        }

        let upper = text.to_ascii_uppercase();
        if upper == "CRS84" || upper.ends_with(":CRS84") || upper.ends_with("/CRS84") {
            return Ok(CrsSpec::WGS84);
        }

        if let Ok(code) = upper.parse::<u32>() {
            return Ok(CrsSpec::Epsg(code));
        }
        if let Some(code) = upper.strip_prefix("EPSG:") {
            return parse_code(code, text).map(CrsSpec::Epsg);
        }
        if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            // urn:ogc:def:crs:EPSG::n or urn:ogc:def:crs:EPSG:<version>:n
            let code = rest.rsplit(':').next().unwrap_or_default();
            return parse_code(code, text).map(CrsSpec::Epsg);
        }
        for prefix in [
            "HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/",
            "HTTPS://WWW.OPENGIS.NET/DEF/CRS/EPSG/",
        ] {
            if let Some(rest) = upper.strip_prefix(prefix) {
                let code = rest.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
                return parse_code(code, text).map(CrsSpec::Epsg);
            }
        }

        Ok(CrsSpec::Custom(text.to_string()))
    }

    /// Map dataset CRS metadata
    pub fn from_definition(definition: &CrsDefinition) -> Result<Self> {
        match definition {
            CrsDefinition::Wkt(wkt) => Ok(CrsSpec::Wkt(wkt.trim().to_string())),
            CrsDefinition::Identifier(id) => CrsSpec::parse(id),
        }
    }

    /// EPSG code, looking through a WKT's top-level authority
    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            CrsSpec::Epsg(code) => Some(*code),
            CrsSpec::Wkt(wkt) => wkt_authority_code(wkt),
            CrsSpec::Custom(_) => None,
        }
    }
}

impl FromStr for CrsSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CrsSpec::parse(s)
    }
}

impl fmt::Display for CrsSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsSpec::Epsg(code) => write!(f, "EPSG:{}", code),
            CrsSpec::Wkt(wkt) => f.write_str(wkt),
            CrsSpec::Custom(text) => f.write_str(text),
        }
    }
}

fn parse_code(code: &str, original: &str) -> Result<u32> {
    code.trim()
        .parse()
        .map_err(|_| Error::InvalidCrs(format!("bad EPSG code in '{}'", original)))
}

fn looks_like_wkt(text: &str) -> bool {
    let Some(open) = text.find('[') else {
        return false;
    };
    let keyword = text[..open].trim().to_ascii_uppercase();
    WKT_KEYWORDS.contains(&keyword.as_str())
}

/// EPSG code of the outermost `AUTHORITY["EPSG",…]` / `ID["EPSG",…]`.
///
/// Only authorities directly inside the top-level node count; nested ones
/// name the datum, ellipsoid or base CRS.
fn wkt_authority_code(wkt: &str) -> Option<u32> {
    let bytes = wkt.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut found = None;

    for i in 0..bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth = depth.saturating_sub(1),
            b',' if depth == 1 => {
                let rest = wkt[i + 1..].trim_start();
                let upper = rest.get(..10).unwrap_or(rest).to_ascii_uppercase();
                let body = if upper.starts_with("AUTHORITY[") {
                    &rest[10..]
                } else if upper.starts_with("ID[") {
                    &rest[3..]
                } else {
                    continue;
                };
                if let Some(code) = epsg_authority_body(body) {
                    found = Some(code);
                }
            }
            _ => {}
        }
    }
    found
}

/// Parse `"EPSG","25832"]` or `"EPSG",25832]`
fn epsg_authority_body(body: &str) -> Option<u32> {
    let (authority, rest) = body.split_once(',')?;
    if !authority.trim().trim_matches('"').eq_ignore_ascii_case("EPSG") {
        return None;
    }
    let code: String = rest
        .trim_start()
        .trim_start_matches('"')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    code.parse().ok()
}
