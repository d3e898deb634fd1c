// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelwerk.

use thiserror::Error;

use crate::types::{Dialect, JobId, JobStatus};

/// Failure of the byte channel to a printer.
///
/// Every variant is treated the same by callers: the printer is considered
/// unreachable for this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// A probe response that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unparseable response: {0}")]
    UnparseableResponse(String),

    #[error("{0} printers have no status probe")]
    UnsupportedDialect(Dialect),
}

/// Top-level error type for all Labelwerk operations.
#[derive(Debug, Error)]
pub enum LabelwerkError {
    // -- Printer I/O --
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // -- Submission --
    #[error("printer '{0}' not found")]
    PrinterNotFound(String),

    #[error("template '{template}' does not support printer '{printer}'")]
    IncompatibleTemplate { template: String, printer: String },

    #[error("no configured printer supports template '{0}'")]
    NoCompatiblePrinter(String),

    #[error("template '{0}' not found")]
    TemplateNotFound(String),

    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),

    #[error("template rendering failed: {0}")]
    Render(String),

    // -- Job lifecycle --
    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error("job {0} expired before the printer became available")]
    JobExpired(JobId),

    #[error("job {job} failed after {attempts} attempt(s): {reason}")]
    QueueSendFailed {
        job: JobId,
        attempts: u32,
        reason: String,
    },

    #[error("job {job} cannot move from {from} to {to}")]
    InvalidTransition {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LabelwerkError {
    /// True for failures that mean "printer unreachable right now".
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelwerkError>;
