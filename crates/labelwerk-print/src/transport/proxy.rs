// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proxy transport: the printer is owned by a home-automation hub and is
// reached through its HTTP API, addressed by device id.
//
//   send  -> POST {endpoint}/api/services/zebra_printer/print_raw
//            {"device_id": ..., "data": <payload as Latin-1 text>}
//   probe -> GET  {endpoint}/api/states/binary_sensor.{device_id}_ready

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use labelwerk_core::error::TransportError;

#[derive(Serialize)]
struct PrintRawRequest<'a> {
    device_id: &'a str,
    data: String,
}

#[derive(Debug)]
pub struct ProxyTransport {
    device_id: String,
    endpoint: String,
    token: Option<String>,
    client: Option<reqwest::Client>,
}

impl ProxyTransport {
    pub fn new(device_id: &str, endpoint: &str, token: Option<String>) -> Self {
        Self {
            device_id: device_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client: None,
        }
    }

    pub fn print_url(&self) -> String {
        format!("{}/api/services/zebra_printer/print_raw", self.endpoint)
    }

    pub fn state_url(&self) -> String {
        format!(
            "{}/api/states/binary_sensor.{}_ready",
            self.endpoint, self.device_id
        )
    }

    /// Build the HTTP client. No request is made until a send or probe.
    pub async fn open(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.client.is_some() {
            return Ok(());
        }
        // The hub sits on the local network and is addressed directly,
        // never through an environment proxy.
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| TransportError::ConnectFailed(format!("proxy client: {e}")))?;
        self.client = Some(client);
        Ok(())
    }

    pub fn close(&mut self) {
        self.client = None;
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Forward a payload to the hub, which writes it to the printer.
    pub async fn send_raw(&mut self, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let client = self.client()?;
        let body = PrintRawRequest {
            device_id: &self.device_id,
            data: latin1(payload),
        };

        let mut request = client.post(self.print_url()).json(&body).timeout(timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| map_http_error(&self.endpoint, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::ChannelClosed(format!(
                "proxy print for {} returned {status}",
                self.device_id
            )));
        }
        debug!(device_id = %self.device_id, bytes = payload.len(), "proxy print accepted");
        Ok(())
    }

    /// Fetch the readiness sensor document, truncated to `max` bytes.
    pub async fn fetch_state(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let client = self.client()?;

        let mut request = client.get(self.state_url()).timeout(timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| map_http_error(&self.endpoint, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::ChannelClosed(format!(
                "proxy state for {} returned {status}",
                self.device_id
            )));
        }

        let mut body = response
            .bytes()
            .await
            .map_err(|e| map_http_error(&self.endpoint, e))?
            .to_vec();
        body.truncate(max);
        Ok(body)
    }

    fn client(&self) -> Result<reqwest::Client, TransportError> {
        self.client
            .clone()
            .ok_or_else(|| TransportError::ChannelClosed(format!("proxy {} is not connected", self.endpoint)))
    }
}

/// Printer payloads are byte strings; the hub takes them as text with one
/// char per byte.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn map_http_error(endpoint: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(format!("proxy {endpoint}: {e}"))
    } else if e.is_connect() {
        TransportError::ConnectFailed(format!("proxy {endpoint}: {e}"))
    } else {
        TransportError::ChannelClosed(format!("proxy {endpoint}: {e}"))
    }
}
