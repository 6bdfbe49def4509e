// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Map generation shared by the `csmap` binary and library users:
//! Valve 220 serialization, configuration and the generate pipeline.

pub mod config;
pub mod error;
pub mod map220;
pub mod pipeline;

pub use config::{parse_wad_list, GenerateConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use map220::{box_faces, render_map, write_empty_map, write_map, Face, MapStyle};
pub use pipeline::{generate, generate_with_provider, GenerateRequest, GenerateSummary, InputKind};
