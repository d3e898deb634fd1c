// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer command-language dialects.
//
// Each dialect turns a raw health-probe response into a `PrinterStatus` and
// recognises its own native quantity directive inside a rendered payload.
// Parsers are pure; the caller stamps the observation time.

pub mod epl2;
pub mod proxy;
pub mod zpl;

use tracing::{debug, warn};

use labelwerk_core::config::IoTimeouts;
use labelwerk_core::error::ProtocolError;
use labelwerk_core::types::{ConnectionConfig, Dialect, PrinterConfig, PrinterStatus};

use crate::transport::ReadPolicy;

/// How a printer's probe response is read and interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusParser {
    /// ~HS, one read.
    Zpl,
    /// UQ, settle delay then accumulate.
    Epl2,
    /// Hub readiness document.
    Proxy,
    /// No probe exists for this dialect.
    Unsupported(Dialect),
}

impl StatusParser {
    pub fn for_printer(config: &PrinterConfig) -> Self {
        match (config.dialect, &config.connection) {
            (Dialect::Ptouch, _) => Self::Unsupported(Dialect::Ptouch),
            (_, ConnectionConfig::Proxy { .. }) => Self::Proxy,
            (Dialect::Zpl, _) => Self::Zpl,
            (Dialect::Epl2, _) => Self::Epl2,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    pub fn read_policy(&self, io: &IoTimeouts) -> ReadPolicy {
        match self {
            Self::Epl2 => ReadPolicy::accumulate(io.read(), io.settle(), io.quiet()),
            _ => ReadPolicy::single(io.read()),
        }
    }

    pub fn parse(&self, raw: &[u8]) -> Result<PrinterStatus, ProtocolError> {
        match self {
            Self::Zpl => zpl::parse_host_status(raw),
            Self::Epl2 => epl2::parse_uq(raw),
            Self::Proxy => proxy::parse_ready_state(raw),
            Self::Unsupported(dialect) => Err(ProtocolError::UnsupportedDialect(*dialect)),
        }
    }
}

/// Map a renderer's dialect hint onto the closed set of dialects.
///
/// Unknown hints fall back to the printer's configured dialect.
pub fn resolve_dialect(hint: &str, fallback: Dialect) -> Dialect {
    if hint.trim().is_empty() {
        debug!(fallback = %fallback, "no dialect hint, using printer dialect");
        return fallback;
    }
    match Dialect::from_keyword(hint) {
        Some(dialect) => dialect,
        None => {
            warn!(hint, fallback = %fallback, "unrecognised dialect hint, using printer dialect");
            fallback
        }
    }
}

/// Copies a payload asks the printer to produce by itself, if any.
pub fn native_copies(dialect: Dialect, payload: &[u8]) -> Option<u32> {
    match dialect {
        Dialect::Zpl => zpl::native_quantity(payload),
        Dialect::Epl2 => epl2::native_quantity(payload),
        Dialect::Ptouch => None,
    }
}
