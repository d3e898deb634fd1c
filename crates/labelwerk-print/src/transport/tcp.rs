// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP transport (JetDirect, port 9100).
//
// Open a socket and exchange bytes. Label printers accept their command
// language directly on this port and answer status queries on the same
// connection.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use labelwerk_core::error::TransportError;

use super::{not_open, read_stream, write_stream};

#[derive(Debug)]
pub struct TcpTransport {
    addr: String,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            stream: None,
        }
    }

    pub async fn open(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                TransportError::Timeout(format!(
                    "TCP connect to {} after {}ms",
                    self.addr,
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| TransportError::ConnectFailed(format!("TCP connect to {}: {e}", self.addr)))?;

        debug!(addr = %self.addr, "TCP channel open");
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // The peer may already be gone; there is nothing left to release.
            if let Err(e) = stream.shutdown().await {
                debug!(addr = %self.addr, error = %e, "TCP shutdown");
            }
            debug!(addr = %self.addr, "TCP channel closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or_else(|| not_open(&self.addr))?;
        write_stream(stream, bytes, timeout, &self.addr).await?;
        debug!(addr = %self.addr, bytes = bytes.len(), "TCP write");
        Ok(())
    }

    pub async fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or_else(|| not_open(&self.addr))?;
        read_stream(stream, max, timeout, &self.addr).await
    }
}
