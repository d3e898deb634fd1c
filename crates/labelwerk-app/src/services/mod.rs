// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Daemon services: where the data lives and how the configuration is read.

pub mod config_file;
pub mod data_dir;
