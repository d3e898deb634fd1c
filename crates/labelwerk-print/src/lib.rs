// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk Print — printer transports, dialect status parsers, health
// monitoring, and the offline-tolerant per-printer job queue. The `Fleet`
// context ties them together and exposes the operations the API layer calls.

pub mod fleet;
pub mod health;
pub mod printer;
pub mod protocol;
pub mod quantity;
pub mod queue;
pub mod registry;
pub mod render;
pub mod retry;
pub mod status;
pub mod transport;
pub mod worker;

pub use fleet::{Fleet, PrinterSummary, StatusReport};
pub use printer::Printer;
pub use render::{LabelTemplate, RenderedLabel, Renderer, StaticRenderer};
pub use status::StatusCache;
