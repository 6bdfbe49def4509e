// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use csmap_core::QueryBBox;
use csmap_processing::{parse_wad_list, GenerateConfig};

#[derive(Parser, Debug)]
#[command(name = "csmap", version, about = "Build Hammer (Valve 220) maps from building footprints")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a .map from a GeoPackage or GeoJSON dataset
    Generate(GenerateArgs),
    /// Print the version
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// <minLon,minLat,maxLon,maxLat> in EPSG:4326
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: QueryBBox,

    /// Output .map file path
    #[arg(long)]
    pub out: PathBuf,

    /// Building footprints (.gpkg, .geojson or .json)
    #[arg(long, visible_alias = "gpkg")]
    pub input: Option<PathBuf>,

    /// Layer name in the GeoPackage
    #[arg(long)]
    pub layer: Option<String>,

    /// CRS of the dataset if it carries none (e.g. EPSG:25832)
    #[arg(long)]
    pub source_crs: Option<String>,

    /// Hammer units per metre
    #[arg(long)]
    pub scale: Option<f64>,

    /// Minimum building area (m²)
    #[arg(long)]
    pub min_area: Option<f64>,

    /// Building height (m)
    #[arg(long)]
    pub default_height: Option<f64>,

    /// Wall texture
    #[arg(long)]
    pub wall_texture: Option<String>,

    /// Roof texture
    #[arg(long)]
    pub roof_texture: Option<String>,

    /// Semicolon-separated WADs, e.g. "halflife.wad;cstrike.wad"
    #[arg(long)]
    pub wad: Option<String>,

    /// Stop after this many buildings
    #[arg(long)]
    pub max_features: Option<usize>,

    /// Write an empty (worldspawn-only) map when no input is given
    #[arg(long)]
    pub stub: bool,

    /// Show a progress spinner
    #[arg(long)]
    pub progress: bool,

    /// Config file (default: $CSMAP_CONFIG, then ./csmap.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl GenerateArgs {
    /// Flags win over file and environment settings
    pub fn apply_to(&self, config: &mut GenerateConfig) {
        if let Some(layer) = &self.layer {
            config.layer = Some(layer.clone());
        }
        if let Some(crs) = &self.source_crs {
            config.source_crs = Some(crs.clone());
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        if let Some(min_area) = self.min_area {
            config.min_area = min_area;
        }
        if let Some(height) = self.default_height {
            config.default_height = height;
        }
        if let Some(texture) = &self.wall_texture {
            config.wall_texture = texture.clone();
        }
        if let Some(texture) = &self.roof_texture {
            config.roof_texture = texture.clone();
        }
        if let Some(wad) = &self.wad {
            config.wads = parse_wad_list(wad);
        }
        if let Some(max) = self.max_features {
            config.max_features = Some(max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::try_parse_from([
            "csmap",
            "generate",
            "--bbox",
            "-0.13,51.50,-0.12,51.51",
            "--out",
            "maps/london.map",
            "--gpkg",
            "buildings.gpkg",
            "--wad",
            "halflife.wad;cstrike.wad",
            "--scale",
            "16",
        ])
        .unwrap();

        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.bbox.min_lon(), -0.13);
        assert_eq!(args.input, Some(PathBuf::from("buildings.gpkg")));

        let mut config = GenerateConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.scale, 16.0);
        assert_eq!(config.min_area, 2.0);
        assert_eq!(config.wads, vec!["halflife.wad", "cstrike.wad"]);
    }

    #[test]
    fn test_bad_bbox_is_rejected() {
        let result = Cli::try_parse_from([
            "csmap", "generate", "--bbox", "10,53,9,54", "--out", "x.map",
        ]);
        assert!(result.is_err());
    }
}
