// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoPackage binary and WKB geometry decoding using nom
//!
//! A GeoPackage geometry blob is a small header (`GP`, version, flags,
//! `srs_id`, optional envelope) followed by standard WKB. Only polygonal
//! geometries are decoded into coordinates; every other type is reported by
//! kind so callers can skip it without parsing its body.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use nom::{
    bytes::complete::tag,
    error::{Error as NomError, ErrorKind},
    number::complete::{f64 as num_f64, i32 as num_i32, u32 as num_u32, u8 as num_u8},
    number::Endianness,
    IResult,
};

use crate::error::{Error, Result};
use crate::source::{FeatureGeometry, GeometryKind};

const WKB_POLYGON: u32 = 3;
const WKB_MULTI_POLYGON: u32 = 6;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Parsed GeoPackage binary header
#[derive(Debug, Clone, PartialEq)]
pub struct GpkgHeader {
    pub version: u8,
    pub srs_id: i32,
    /// `[min_x, max_x, min_y, max_y]` when the blob carries an envelope
    pub envelope: Option<[f64; 4]>,
    /// Empty-geometry flag
    pub empty: bool,
    /// Extended (non-standard) geometry type flag
    pub extended: bool,
}

/// Decode a GeoPackage geometry column value.
///
/// Blobs without the `GP` magic are decoded as bare WKB.
pub fn decode_gpkg_geometry(blob: &[u8]) -> Result<(Option<GpkgHeader>, FeatureGeometry)> {
    if !blob.starts_with(b"GP") {
        return Ok((None, decode_wkb(blob)?));
    }

    let (rest, header) = gpkg_header(blob).map_err(|e| wkb_error("GeoPackage header", e))?;
    if header.extended {
        return Ok((Some(header), FeatureGeometry::Unsupported(GeometryKind::Other(0))));
    }
    let geometry = decode_wkb(rest)?;
    Ok((Some(header), geometry))
}

/// Decode standard (ISO or EWKB-flavoured) WKB
pub fn decode_wkb(bytes: &[u8]) -> Result<FeatureGeometry> {
    let (_, geometry) = geometry(bytes).map_err(|e| wkb_error("WKB", e))?;
    Ok(geometry)
}

fn wkb_error(what: &str, err: nom::Err<NomError<&[u8]>>) -> Error {
    match err {
        nom::Err::Incomplete(_) => Error::Wkb(format!("{} truncated", what)),
        nom::Err::Error(e) | nom::Err::Failure(e) => Error::Wkb(format!(
            "{} invalid with {} bytes left ({:?})",
            what,
            e.input.len(),
            e.code
        )),
    }
}

fn fail<T>(input: &[u8], kind: ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Failure(NomError::new(input, kind)))
}

fn gpkg_header(input: &[u8]) -> IResult<&[u8], GpkgHeader> {
    let (input, _) = tag(b"GP".as_slice())(input)?;
    let (input, version) = num_u8(input)?;
    let (input, flags) = num_u8(input)?;

    let endian = if flags & 0x01 == 1 {
        Endianness::Little
    } else {
        Endianness::Big
    };
    let envelope_len = match (flags >> 1) & 0x07 {
        0 => 0,
        1 => 4,
        2 | 3 => 6,
        4 => 8,
        _ => return fail(input, ErrorKind::Verify),
    };
    let empty = flags & 0x10 != 0;
    let extended = flags & 0x20 != 0;

    let (mut input, srs_id) = num_i32(endian)(input)?;
    let mut values = [0.0f64; 8];
    for value in values.iter_mut().take(envelope_len) {
        let (rest, v) = num_f64(endian)(input)?;
        *value = v;
        input = rest;
    }
    let envelope = (envelope_len > 0).then(|| [values[0], values[1], values[2], values[3]]);

    Ok((
        input,
        GpkgHeader {
            version,
            srs_id,
            envelope,
            empty,
            extended,
        },
    ))
}

/// Byte order, base type code and ordinate count of one WKB geometry
struct TypeHeader {
    endian: Endianness,
    code: u32,
    dims: usize,
}

fn type_header(input: &[u8]) -> IResult<&[u8], TypeHeader> {
    let (rest, order) = num_u8(input)?;
    let endian = match order {
        0 => Endianness::Big,
        1 => Endianness::Little,
        _ => return fail(input, ErrorKind::Verify),
    };
    let (mut rest, raw) = num_u32(endian)(rest)?;

    let mut dims = 2;
    if raw & EWKB_Z != 0 {
        dims += 1;
    }
    if raw & EWKB_M != 0 {
        dims += 1;
    }
    if raw & EWKB_SRID != 0 {
        let (after_srid, _) = num_u32(endian)(rest)?;
        rest = after_srid;
    }

    let iso = raw & 0x0FFF_FFFF;
    dims += match iso / 1000 {
        1 | 2 => 1,
        3 => 2,
        _ => 0,
    };

    Ok((
        rest,
        TypeHeader {
            endian,
            code: iso % 1000,
            dims,
        },
    ))
}

fn geometry(input: &[u8]) -> IResult<&[u8], FeatureGeometry> {
    let (rest, header) = type_header(input)?;
    match header.code {
        WKB_POLYGON => {
            let (rest, polygon) = polygon_body(rest, &header)?;
            Ok((rest, FeatureGeometry::Polygon(polygon)))
        }
        WKB_MULTI_POLYGON => {
            let (mut rest, count) = num_u32(header.endian)(rest)?;
            let mut polygons = Vec::with_capacity(bounded_capacity(count, rest.len(), 9));
            for _ in 0..count {
                let (after_header, part) = type_header(rest)?;
                if part.code != WKB_POLYGON {
                    return fail(rest, ErrorKind::Verify);
                }
                let (after_body, polygon) = polygon_body(after_header, &part)?;
                polygons.push(polygon);
                rest = after_body;
            }
            Ok((rest, FeatureGeometry::MultiPolygon(MultiPolygon::new(polygons))))
        }
        other => Ok((rest, FeatureGeometry::Unsupported(GeometryKind::from_wkb_code(other)))),
    }
}

fn polygon_body<'a>(input: &'a [u8], header: &TypeHeader) -> IResult<&'a [u8], Polygon<f64>> {
    let (mut rest, ring_count) = num_u32(header.endian)(input)?;
    let mut rings = Vec::with_capacity(bounded_capacity(ring_count, rest.len(), 4));
    for _ in 0..ring_count {
        let (after, parsed) = ring(rest, header)?;
        rings.push(parsed);
        rest = after;
    }

    let mut rings = rings.into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok((rest, Polygon::new(exterior, rings.collect())))
}

fn ring<'a>(input: &'a [u8], header: &TypeHeader) -> IResult<&'a [u8], LineString<f64>> {
    let (mut rest, point_count) = num_u32(header.endian)(input)?;
    let stride = header.dims * 8;
    let mut coords = Vec::with_capacity(bounded_capacity(point_count, rest.len(), stride));
    for _ in 0..point_count {
        let (r, x) = num_f64(header.endian)(rest)?;
        let (mut r, y) = num_f64(header.endian)(r)?;
        // Z / M ordinates are not used
        for _ in 2..header.dims {
            let (after, _) = num_f64(header.endian)(r)?;
            r = after;
        }
        coords.push(Coord { x, y });
        rest = r;
    }
    Ok((rest, LineString::new(coords)))
}

/// Capacity hint that cannot exceed what the remaining bytes could hold
#[inline]
fn bounded_capacity(count: u32, remaining: usize, min_item_len: usize) -> usize {
    (count as usize).min(remaining / min_item_len.max(1))
}
