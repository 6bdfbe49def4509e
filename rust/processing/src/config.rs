// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generation settings loaded from `csmap.toml` and the environment.
//!
//! Lookup order for the file: an explicit path, then `$CSMAP_CONFIG`, then
//! `./csmap.toml` when it exists. `CSMAP_SOURCE_CRS` and `CSMAP_WAD`
//! override the file. Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};

use csmap_geometry::{CrsSpec, ExtractOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::map220::{MapStyle, DEFAULT_ROOF_TEXTURE, DEFAULT_WALL_TEXTURE};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "CSMAP_CONFIG";

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "csmap.toml";

/// Generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    /// Hammer units per metre
    pub scale: f64,
    /// Minimum footprint area (m²)
    pub min_area: f64,
    /// Building height (m)
    pub default_height: f64,
    pub wall_texture: String,
    pub roof_texture: String,
    pub wads: Vec<String>,
    /// GeoPackage layer; the first feature layer when unset
    pub layer: Option<String>,
    /// Source CRS for datasets without CRS metadata
    pub source_crs: Option<String>,
    pub max_features: Option<usize>,
    /// Minimum box width/depth in output units
    pub degenerate_epsilon: f64,
    pub prefilter: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        let extract = ExtractOptions::default();
        Self {
            scale: extract.scale,
            min_area: extract.min_area,
            default_height: extract.height,
            wall_texture: DEFAULT_WALL_TEXTURE.to_string(),
            roof_texture: DEFAULT_ROOF_TEXTURE.to_string(),
            wads: Vec::new(),
            layer: None,
            source_crs: None,
            max_features: None,
            degenerate_epsilon: extract.degenerate_epsilon,
            prefilter: extract.prefilter,
        }
    }
}

impl GenerateConfig {
    /// Resolve the config file, apply environment overrides and validate
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var_os(CONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                    local.is_file().then_some(local)
                })
        });

        let mut config = match path {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Apply `CSMAP_SOURCE_CRS` / `CSMAP_WAD` through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(crs) = lookup("CSMAP_SOURCE_CRS").filter(|v| !v.trim().is_empty()) {
            self.source_crs = Some(crs.trim().to_string());
        }
        if let Some(wad) = lookup("CSMAP_WAD") {
            self.wads = parse_wad_list(&wad);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::Config(format!("scale must be positive, got {}", self.scale)));
        }
        if !(self.default_height.is_finite() && self.default_height > 0.0) {
            return Err(Error::Config(format!(
                "default_height must be positive, got {}",
                self.default_height
            )));
        }
        if !(self.min_area.is_finite() && self.min_area >= 0.0) {
            return Err(Error::Config(format!("min_area must not be negative, got {}", self.min_area)));
        }
        if !(self.degenerate_epsilon.is_finite() && self.degenerate_epsilon >= 0.0) {
            return Err(Error::Config(format!(
                "degenerate_epsilon must not be negative, got {}",
                self.degenerate_epsilon
            )));
        }
        if self.wall_texture.trim().is_empty() || self.roof_texture.trim().is_empty() {
            return Err(Error::Config("texture names must not be empty".to_string()));
        }
        if let Some(crs) = &self.source_crs {
            CrsSpec::parse(crs)?;
        }
        Ok(())
    }

    pub fn extract_options(&self) -> Result<ExtractOptions> {
        Ok(ExtractOptions {
            scale: self.scale,
            min_area: self.min_area,
            height: self.default_height,
            max_features: self.max_features,
            source_crs: self.source_crs.as_deref().map(CrsSpec::parse).transpose()?,
            degenerate_epsilon: self.degenerate_epsilon,
            prefilter: self.prefilter,
        })
    }

    pub fn map_style(&self) -> MapStyle {
        MapStyle {
            wads: self.wads.clone(),
            wall_texture: self.wall_texture.clone(),
            roof_texture: self.roof_texture.clone(),
        }
    }
}

/// Split a `;`-separated WAD list, dropping blanks
pub fn parse_wad_list(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenerateConfig::default();
        assert_eq!(config.scale, 32.0);
        assert_eq!(config.min_area, 2.0);
        assert_eq!(config.default_height, 10.0);
        assert_eq!(config.wall_texture, "BRICK/BRICK01");
        assert_eq!(config.roof_texture, "ROOF/ROOF01");
        assert!(config.wads.is_empty());
        assert_eq!(config.degenerate_epsilon, 0.1);
        assert!(config.prefilter);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config: GenerateConfig = toml::from_str(
            r#"
            scale = 16.0
            wads = ["halflife.wad", "cstrike.wad"]
            source_crs = "EPSG:25832"
            "#,
        )
        .unwrap();
        assert_eq!(config.scale, 16.0);
        assert_eq!(config.min_area, 2.0);
        assert_eq!(config.wads.len(), 2);

        let options = config.extract_options().unwrap();
        assert_eq!(options.source_crs, Some(CrsSpec::Epsg(25832)));
        assert_eq!(options.height, 10.0);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(toml::from_str::<GenerateConfig>("scael = 3.0").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GenerateConfig::default();
        config.apply_env(|key| match key {
            "CSMAP_SOURCE_CRS" => Some(" EPSG:32632 ".to_string()),
            "CSMAP_WAD" => Some("a.wad; ;b.wad".to_string()),
            _ => None,
        });
        assert_eq!(config.source_crs.as_deref(), Some("EPSG:32632"));
        assert_eq!(config.wads, vec!["a.wad", "b.wad"]);
    }

    #[test]
    fn test_validation() {
        let bad = [
            GenerateConfig {
                scale: 0.0,
                ..Default::default()
            },
            GenerateConfig {
                default_height: -1.0,
                ..Default::default()
            },
            GenerateConfig {
                min_area: -0.5,
                ..Default::default()
            },
            GenerateConfig {
                degenerate_epsilon: f64::NAN,
                ..Default::default()
            },
            GenerateConfig {
                source_crs: Some("EPSG:x".to_string()),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csmap.toml");
        std::fs::write(&path, "min_area = 5.0\nlayer = \"buildings\"\n").unwrap();

        let config = GenerateConfig::from_path(&path).unwrap();
        assert_eq!(config.min_area, 5.0);
        assert_eq!(config.layer.as_deref(), Some("buildings"));

        std::fs::write(&path, "min_area = \"lots\"\n").unwrap();
        assert!(matches!(
            GenerateConfig::from_path(&path),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_wad_list() {
        assert!(parse_wad_list("").is_empty());
        assert_eq!(parse_wad_list("cstrike.wad"), vec!["cstrike.wad"]);
    }
}
