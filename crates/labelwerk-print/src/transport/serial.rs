// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serial-line transport for USB/RS-232 attached label printers.

use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use labelwerk_core::error::TransportError;

use super::{not_open, read_stream, write_stream};

pub struct SerialTransport {
    device: String,
    baudrate: u32,
    port: Option<SerialStream>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device", &self.device)
            .field("baudrate", &self.baudrate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    pub fn new(device: &str, baudrate: u32) -> Self {
        Self {
            device: device.to_string(),
            baudrate,
            port: None,
        }
    }

    pub async fn open(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = tokio_serial::new(&self.device, self.baudrate)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| TransportError::ConnectFailed(format!("serial {}: {e}", self.device)))?;

        debug!(device = %self.device, baudrate = self.baudrate, "serial channel open");
        self.port = Some(port);
        Ok(())
    }

    pub async fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(device = %self.device, "serial channel closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub async fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or_else(|| not_open(&self.device))?;
        write_stream(port, bytes, timeout, &self.device).await
    }

    pub async fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let port = self.port.as_mut().ok_or_else(|| not_open(&self.device))?;
        read_stream(port, max, timeout, &self.device).await
    }
}
