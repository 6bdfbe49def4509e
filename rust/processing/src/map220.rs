// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Valve 220 `.map` writer
//!
//! One worldspawn entity holding one six-sided brush per box. Each face is a
//! plane through three points plus explicit U/V texture axes:
//!
//! ```text
//! ( x y z ) ( x y z ) ( x y z ) TEXTURE [ ux uy uz offset ] [ vx vy vz offset ] rotation scale_u scale_v
//! ```

use std::fmt;
use std::io::Write as _;
use std::path::Path;

use csmap_core::BoxDescriptor;
use nalgebra::{Point3, Vector3, Vector4};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub const DEFAULT_WALL_TEXTURE: &str = "BRICK/BRICK01";
pub const DEFAULT_ROOF_TEXTURE: &str = "ROOF/ROOF01";

/// Textures and WAD references for a map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStyle {
    /// Written as a single `;`-joined `"wad"` key when non-empty
    pub wads: Vec<String>,
    pub wall_texture: String,
    pub roof_texture: String,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            wads: Vec::new(),
            wall_texture: DEFAULT_WALL_TEXTURE.to_string(),
            roof_texture: DEFAULT_ROOF_TEXTURE.to_string(),
        }
    }
}

/// One brush face
#[derive(Debug, Clone, PartialEq)]
pub struct Face<'a> {
    pub points: [Point3<f64>; 3],
    pub texture: &'a str,
    pub u_axis: Vector4<f64>,
    pub v_axis: Vector4<f64>,
    pub rotation: f64,
    pub scale: (f64, f64),
}

impl Face<'_> {
    /// Plane normal by the right-hand rule over the three points
    pub fn normal(&self) -> Vector3<f64> {
        let [p1, p2, p3] = self.points;
        (p2 - p1).cross(&(p3 - p1)).normalize()
    }
}

impl fmt::Display for Face<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.points {
            write!(f, "( {} {} {} ) ", Num(p.x), Num(p.y), Num(p.z))?;
        }
        write!(
            f,
            "{} [ {} {} {} {} ] [ {} {} {} {} ] {:.0} {} {}",
            self.texture,
            Num(self.u_axis.x),
            Num(self.u_axis.y),
            Num(self.u_axis.z),
            Num(self.u_axis.w),
            Num(self.v_axis.x),
            Num(self.v_axis.y),
            Num(self.v_axis.z),
            Num(self.v_axis.w),
            self.rotation,
            Num(self.scale.0),
            Num(self.scale.1),
        )
    }
}

/// Three-decimal number that never prints as `-0.000`
struct Num(f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = if self.0.abs() < 0.0005 { 0.0 } else { self.0 };
        write!(f, "{:.3}", v)
    }
}

/// The six faces of a box: top, bottom, +X, -X, +Y, -Y
pub fn box_faces<'a>(b: &BoxDescriptor, style: &'a MapStyle) -> [Face<'a>; 6] {
    let (x0, y0, z0) = (b.min_x, b.min_y, b.z0);
    let (x1, y1, z1) = (b.max_x, b.max_y, b.z1);
    let wall = style.wall_texture.as_str();
    let roof = style.roof_texture.as_str();

    let face = |points: [(f64, f64, f64); 3], texture: &'a str, u: [f64; 3], v: [f64; 3]| Face {
        points: points.map(|(x, y, z)| Point3::new(x, y, z)),
        texture,
        u_axis: Vector4::new(u[0], u[1], u[2], 0.0),
        v_axis: Vector4::new(v[0], v[1], v[2], 0.0),
        rotation: 0.0,
        scale: (1.0, 1.0),
    };

    [
        face(
            [(x0, y0, z1), (x1, y0, z1), (x1, y1, z1)],
            roof,
            [1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
        ),
        face(
            [(x1, y1, z0), (x1, y0, z0), (x0, y0, z0)],
            wall,
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ),
        face(
            [(x1, y0, z0), (x1, y1, z0), (x1, y1, z1)],
            wall,
            [0.0, 1.0, 0.0],
            [0.0, 0.0, -1.0],
        ),
        face(
            [(x0, y1, z0), (x0, y0, z0), (x0, y0, z1)],
            wall,
            [0.0, -1.0, 0.0],
            [0.0, 0.0, -1.0],
        ),
        face(
            [(x0, y1, z0), (x1, y1, z0), (x1, y1, z1)],
            wall,
            [1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0],
        ),
        face(
            [(x1, y0, z0), (x0, y0, z0), (x0, y0, z1)],
            wall,
            [-1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0],
        ),
    ]
}

/// Complete document text. Every box is checked before any text is produced.
pub fn render_map(boxes: &[BoxDescriptor], style: &MapStyle) -> Result<String> {
    if let Some((index, descriptor)) = boxes.iter().enumerate().find(|(_, b)| !b.is_solid()) {
        return Err(Error::DegenerateBox {
            index,
            descriptor: *descriptor,
        });
    }

    let mut out = String::with_capacity(128 + boxes.len() * 6 * 120);
    write_document(&mut out, boxes, style);
    Ok(out)
}

fn write_document(out: &mut String, boxes: &[BoxDescriptor], style: &MapStyle) {
    out.push_str("{\n");
    out.push_str("\"mapversion\" \"220\"\n");
    out.push_str("\"classname\" \"worldspawn\"\n");
    if !style.wads.is_empty() {
        out.push_str(&format!("\"wad\" \"{}\"\n", style.wads.join(";")));
    }
    for b in boxes {
        out.push_str("{\n");
        for face in box_faces(b, style) {
            out.push_str(&face.to_string());
            out.push('\n');
        }
        out.push_str("}\n");
    }
    out.push_str("}\n");
}

/// Render and write a map; the target either ends up complete or untouched
pub fn write_map(path: &Path, boxes: &[BoxDescriptor], style: &MapStyle) -> Result<()> {
    let text = render_map(boxes, style)?;
    write_atomic(path, text.as_bytes())?;
    tracing::debug!(path = %path.display(), brushes = boxes.len(), bytes = text.len(), "Wrote map");
    Ok(())
}

/// Worldspawn-only map
pub fn write_empty_map(path: &Path, wads: &[String]) -> Result<()> {
    let style = MapStyle {
        wads: wads.to_vec(),
        ..MapStyle::default()
    };
    write_map(path, &[], &style)
}

/// Temp file in the target directory, then rename over the target
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    tmp.write_all(contents).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
