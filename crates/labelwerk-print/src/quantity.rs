// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// How many times a payload is written to satisfy a requested quantity.
//
// A payload carrying its dialect's native repeat directive is written once
// and the printer makes the copies. Otherwise the host writes it once per
// copy, strictly one after another; thermal printers take one label at a
// time and interleaved writes corrupt their buffer.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use labelwerk_core::error::TransportError;
use labelwerk_core::types::Dialect;

use crate::printer::Printer;
use crate::protocol::native_copies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPlan {
    Once,
    Repeat(u32),
}

impl SendPlan {
    pub fn for_payload(payload: &[u8], dialect: Dialect, quantity: u32) -> Self {
        if quantity <= 1 {
            return Self::Once;
        }
        match native_copies(dialect, payload) {
            Some(copies) => {
                debug!(%dialect, copies, requested = quantity, "payload carries its own quantity");
                Self::Once
            }
            None => Self::Repeat(quantity),
        }
    }

    pub fn total_sends(&self) -> u32 {
        match self {
            Self::Once => 1,
            Self::Repeat(n) => *n,
        }
    }
}

/// How a copy loop ended when the transport did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every copy is out; carries the total written.
    Complete(u32),
    /// Shutdown was requested between copies; carries the copies written
    /// so far, including earlier attempts.
    Interrupted(u32),
}

/// A copy loop that stopped part-way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    /// Copies written before the failure, including earlier attempts.
    pub copies_sent: u32,
    pub error: TransportError,
}

/// Write the payload per `plan`, skipping the `already_sent` copies a
/// previous attempt got through.
///
/// `shutdown` is checked before each copy. A copy already being written is
/// always finished.
pub async fn execute(
    printer: &mut Printer,
    payload: &[u8],
    plan: SendPlan,
    already_sent: u32,
    shutdown: &CancellationToken,
) -> Result<SendOutcome, SendFailure> {
    let total = plan.total_sends();
    for copy in already_sent..total {
        if shutdown.is_cancelled() {
            debug!(printer = %printer.name(), copies_sent = copy, total, "copy loop stopped for shutdown");
            return Ok(SendOutcome::Interrupted(copy));
        }
        printer
            .send(payload)
            .await
            .map_err(|error| SendFailure {
                copies_sent: copy,
                error,
            })?;
        debug!(printer = %printer.name(), copy = copy + 1, total, "copy sent");
    }
    Ok(SendOutcome::Complete(total.max(already_sent)))
}
