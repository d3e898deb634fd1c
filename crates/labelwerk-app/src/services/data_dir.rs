// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let base = base_dir(
        std::env::var_os("XDG_DATA_HOME").as_deref().map(Path::new),
        std::env::var_os("HOME").as_deref().map(Path::new),
    );
    let dir = base.join("labelwerk");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "could not create data directory");
    }
    dir
}

/// XDG data dir, then `~/.local/share`, then `/tmp`.
fn base_dir(xdg_data_home: Option<&Path>, home: Option<&Path>) -> PathBuf {
    if let Some(xdg) = xdg_data_home.filter(|p| !p.as_os_str().is_empty()) {
        return xdg.to_path_buf();
    }
    if let Some(home) = home {
        return home.join(".local").join("share");
    }
    PathBuf::from("/tmp")
}
