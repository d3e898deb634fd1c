// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Daemon configuration file.
//
// One JSON document: the fleet settings at the top level plus a `templates`
// list for the static renderer. A missing file is not an error; the daemon
// starts with an empty fleet.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use labelwerk_core::config::FleetConfig;
use labelwerk_core::error::Result;
use labelwerk_print::render::LabelTemplate;

use super::data_dir;

const CONFIG_FILE: &str = "config.json";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LABELWERK_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub templates: Vec<LabelTemplate>,
}

/// `$LABELWERK_CONFIG`, or `config.json` in the data directory.
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => data_dir::data_dir().join(CONFIG_FILE),
    }
}

/// Read and validate the configuration at `path`.
pub fn load(path: &Path) -> Result<DaemonConfig> {
    if !path.exists() {
        info!(path = %path.display(), "no config file, starting with an empty fleet");
        return Ok(DaemonConfig::default());
    }

    let data = std::fs::read_to_string(path)?;
    let config: DaemonConfig = serde_json::from_str(&data)?;
    config.fleet.validate()?;
    info!(
        path = %path.display(),
        printers = config.fleet.printers.len(),
        templates = config.templates.len(),
        "config loaded"
    );
    Ok(config)
}
