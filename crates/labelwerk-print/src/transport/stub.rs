// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted in-memory transport.
//
// The transport half is owned by a `Printer`; the `StubHandle` half stays
// with the caller to flip reachability, register probe responses, and
// inspect what was written.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use labelwerk_core::error::TransportError;

#[derive(Debug)]
struct StubState {
    reachable: bool,
    /// Remaining payload writes to accept; `None` is unlimited.
    payload_budget: Option<usize>,
    /// Payload writes left before the token is cancelled.
    cancel_after: Option<(usize, CancellationToken)>,
    /// Command prefix -> response chunks.
    responses: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    pending: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    open: bool,
    opens: usize,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            reachable: true,
            payload_budget: None,
            cancel_after: None,
            responses: Vec::new(),
            pending: VecDeque::new(),
            writes: Vec::new(),
            open: false,
            opens: 0,
        }
    }
}

type Shared = Arc<Mutex<StubState>>;

fn lock(state: &Shared) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct StubTransport {
    state: Shared,
}

/// Test-side controller for a `StubTransport`.
#[derive(Debug, Clone)]
pub struct StubHandle {
    state: Shared,
}

impl StubTransport {
    /// A reachable stub with no registered responses.
    pub fn new() -> (Self, StubHandle) {
        let state: Shared = Arc::default();
        (
            Self {
                state: Arc::clone(&state),
            },
            StubHandle { state },
        )
    }

    pub fn open(&mut self) -> Result<(), TransportError> {
        let mut s = lock(&self.state);
        if !s.reachable {
            return Err(TransportError::ConnectFailed("stub printer unreachable".into()));
        }
        s.open = true;
        s.opens += 1;
        s.pending.clear();
        Ok(())
    }

    pub fn close(&mut self) {
        let mut s = lock(&self.state);
        s.open = false;
        s.pending.clear();
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut s = lock(&self.state);
        if !s.open || !s.reachable {
            return Err(TransportError::ChannelClosed("stub channel closed".into()));
        }

        let scripted = s
            .responses
            .iter()
            .find(|(prefix, _)| bytes.starts_with(prefix))
            .map(|(_, chunks)| chunks.clone());

        match scripted {
            Some(chunks) => s.pending = chunks.into(),
            None => {
                match s.payload_budget {
                    Some(0) => {
                        return Err(TransportError::ChannelClosed("stub rejected payload".into()));
                    }
                    Some(ref mut left) => *left -= 1,
                    None => {}
                }
                if let Some((left, token)) = &mut s.cancel_after {
                    *left = left.saturating_sub(1);
                    if *left == 0 {
                        token.cancel();
                    }
                }
            }
        }
        s.writes.push(bytes.to_vec());
        Ok(())
    }

    pub fn read(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        let mut s = lock(&self.state);
        if !s.open {
            return Err(TransportError::ChannelClosed("stub channel closed".into()));
        }
        let Some(mut chunk) = s.pending.pop_front() else {
            return Err(TransportError::Timeout("stub printer sent nothing".into()));
        };
        if chunk.len() > max {
            let rest = chunk.split_off(max);
            s.pending.push_front(rest);
        }
        Ok(chunk)
    }
}

impl StubHandle {
    /// While unreachable, `open` fails and writes on an open channel fail.
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.state).reachable = reachable;
    }

    /// Answer writes starting with `prefix` with `chunks`, one per read.
    pub fn respond(&self, prefix: impl AsRef<[u8]>, chunks: Vec<Vec<u8>>) {
        let prefix = prefix.as_ref().to_vec();
        let mut s = lock(&self.state);
        s.responses.retain(|(p, _)| p != &prefix);
        s.responses.push((prefix, chunks));
    }

    /// Single-chunk text response.
    pub fn respond_text(&self, prefix: impl AsRef<[u8]>, text: &str) {
        self.respond(prefix, vec![text.as_bytes().to_vec()]);
    }

    /// Reject every payload write (anything not matching a response).
    pub fn reject_payloads(&self, reject: bool) {
        lock(&self.state).payload_budget = if reject { Some(0) } else { None };
    }

    /// Accept `count` more payload writes, then reject the rest.
    pub fn accept_payloads(&self, count: usize) {
        lock(&self.state).payload_budget = Some(count);
    }

    /// Cancel `token` once `count` more payload writes have been accepted.
    pub fn cancel_after_payloads(&self, count: usize, token: CancellationToken) {
        lock(&self.state).cancel_after = Some((count, token));
    }

    /// Every accepted write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Accepted writes containing `needle`.
    pub fn writes_containing(&self, needle: &[u8]) -> usize {
        lock(&self.state)
            .writes
            .iter()
            .filter(|w| needle.is_empty() || w.windows(needle.len()).any(|win| win == needle))
            .count()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// How many times the channel has been opened.
    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_stub_refuses_to_open() {
        let (mut stub, handle) = StubTransport::new();
        handle.set_reachable(false);
        assert!(matches!(stub.open(), Err(TransportError::ConnectFailed(_))));
        assert!(!handle.is_open());
    }

    #[test]
    fn scripted_response_follows_matching_write() {
        let (mut stub, handle) = StubTransport::new();
        handle.respond_text("~HS", "0123456789");
        stub.open().unwrap();

        stub.write(b"~HS\r\n").unwrap();
        assert_eq!(stub.read(4).unwrap(), b"0123");
        assert_eq!(stub.read(64).unwrap(), b"456789");
        assert!(matches!(stub.read(64), Err(TransportError::Timeout(_))));
    }

    #[test]
    fn payload_budget_counts_down() {
        let (mut stub, handle) = StubTransport::new();
        handle.accept_payloads(1);
        stub.open().unwrap();

        stub.write(b"^XA^FDone^FS^XZ").unwrap();
        assert!(stub.write(b"^XA^FDtwo^FS^XZ").is_err());
        assert_eq!(handle.writes_containing(b"^XA"), 1);
        assert_eq!(handle.opens(), 1);
    }
}
