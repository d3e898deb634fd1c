// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Byte channels to printers.
//
// A printer is reached over exactly one of a closed set of transports: a raw
// TCP socket (JetDirect, port 9100), a serial line, or an HTTP call to an
// automation platform that owns the printer. The in-memory `Stub` variant
// stands in for hardware in tests.
//
// Every operation carries an explicit timeout. A timeout is reported as
// `TransportError::Timeout` and is never retried inside the call.

pub mod proxy;
pub mod serial;
pub mod stub;
pub mod tcp;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use labelwerk_core::error::TransportError;
use labelwerk_core::types::ConnectionConfig;

pub use proxy::ProxyTransport;
pub use serial::SerialTransport;
pub use stub::{StubHandle, StubTransport};
pub use tcp::TcpTransport;

/// Largest single read accepted from a printer.
pub const MAX_RESPONSE_BYTES: usize = 4096;

/// Write chunk size; large graphics payloads are streamed in pieces.
const WRITE_CHUNK_BYTES: usize = 8192;

/// How a probe response is collected after the command is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Upper bound for the first chunk of the response.
    pub timeout: Duration,
    /// When set, wait this long after writing and then keep reading until
    /// the channel has been silent for `quiet`.
    pub settle: Option<Duration>,
    pub quiet: Duration,
}

impl ReadPolicy {
    /// A single read, for dialects that answer in one write.
    pub fn single(timeout: Duration) -> Self {
        Self {
            timeout,
            settle: None,
            quiet: Duration::ZERO,
        }
    }

    /// Settle, then accumulate chunks until a quiet window passes.
    pub fn accumulate(timeout: Duration, settle: Duration, quiet: Duration) -> Self {
        Self {
            timeout,
            settle: Some(settle),
            quiet,
        }
    }
}

/// A printer channel. Dispatch is by variant; there is no open-ended
/// transport trait.
#[derive(Debug)]
pub enum Transport {
    Tcp(TcpTransport),
    Serial(SerialTransport),
    Proxy(ProxyTransport),
    Stub(StubTransport),
}

impl Transport {
    /// Build the (still closed) transport described by a printer's config.
    pub fn from_config(connection: &ConnectionConfig) -> Self {
        match connection {
            ConnectionConfig::Tcp { host, port } => Self::Tcp(TcpTransport::new(host, *port)),
            ConnectionConfig::Serial { device, baudrate } => {
                Self::Serial(SerialTransport::new(device, *baudrate))
            }
            ConnectionConfig::Proxy {
                device_id,
                endpoint,
                token,
            } => Self::Proxy(ProxyTransport::new(device_id, endpoint, token.clone())),
        }
    }

    /// Establish the channel within `timeout`.
    pub async fn open(&mut self, timeout: Duration) -> Result<(), TransportError> {
        match self {
            Self::Tcp(t) => t.open(timeout).await,
            Self::Serial(t) => t.open(timeout).await,
            Self::Proxy(t) => t.open(timeout).await,
            Self::Stub(t) => t.open(),
        }
    }

    /// Release the channel. Safe to call on a closed transport.
    pub async fn close(&mut self) {
        match self {
            Self::Tcp(t) => t.close().await,
            Self::Serial(t) => t.close().await,
            Self::Proxy(t) => t.close(),
            Self::Stub(t) => t.close(),
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Self::Tcp(t) => t.is_open(),
            Self::Serial(t) => t.is_open(),
            Self::Proxy(t) => t.is_open(),
            Self::Stub(t) => t.is_open(),
        }
    }

    /// Write all of `bytes`. For the proxy this is one print call.
    pub async fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        match self {
            Self::Tcp(t) => t.write(bytes, timeout).await,
            Self::Serial(t) => t.write(bytes, timeout).await,
            Self::Proxy(t) => t.send_raw(bytes, timeout).await,
            Self::Stub(t) => t.write(bytes),
        }
    }

    /// Read up to `max` bytes. For the proxy this fetches the readiness
    /// state document.
    pub async fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match self {
            Self::Tcp(t) => t.read(max, timeout).await,
            Self::Serial(t) => t.read(max, timeout).await,
            Self::Proxy(t) => t.fetch_state(max, timeout).await,
            Self::Stub(t) => t.read(max),
        }
    }

    /// Write a probe command and collect the response per `policy`.
    ///
    /// The proxy has no command channel; its probe is a single state fetch
    /// and `command` is not sent.
    pub async fn query(
        &mut self,
        command: &[u8],
        policy: &ReadPolicy,
    ) -> Result<Vec<u8>, TransportError> {
        if let Self::Proxy(t) = self {
            return t.fetch_state(MAX_RESPONSE_BYTES, policy.timeout).await;
        }

        self.write(command, policy.timeout).await?;

        let Some(settle) = policy.settle else {
            return self.read(MAX_RESPONSE_BYTES, policy.timeout).await;
        };

        tokio::time::sleep(settle).await;
        let mut response = self.read(MAX_RESPONSE_BYTES, policy.timeout).await?;
        while response.len() < MAX_RESPONSE_BYTES {
            match self.read(MAX_RESPONSE_BYTES, policy.quiet).await {
                Ok(chunk) => response.extend_from_slice(&chunk),
                // Silence or EOF ends the response.
                Err(TransportError::Timeout(_)) | Err(TransportError::ChannelClosed(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(response)
    }
}

/// Write `bytes` to a stream in chunks, then flush, all within `timeout`.
pub(crate) async fn write_stream<S>(
    stream: &mut S,
    bytes: &[u8],
    timeout: Duration,
    peer: &str,
) -> Result<(), TransportError>
where
    S: AsyncWrite + Unpin,
{
    let write = async {
        for chunk in bytes.chunks(WRITE_CHUNK_BYTES) {
            stream.write_all(chunk).await?;
        }
        stream.flush().await
    };

    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::ChannelClosed(format!("write to {peer}: {e}"))),
        Err(_) => Err(TransportError::Timeout(format!(
            "write to {peer} after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Read one chunk of at most `max` bytes. EOF is a closed channel.
pub(crate) async fn read_stream<S>(
    stream: &mut S,
    max: usize,
    timeout: Duration,
    peer: &str,
) -> Result<Vec<u8>, TransportError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; max.max(1)];
    match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(0)) => Err(TransportError::ChannelClosed(format!("{peer} closed the connection"))),
        Ok(Ok(n)) => {
            buf.truncate(n);
            Ok(buf)
        }
        Ok(Err(e)) => Err(TransportError::ChannelClosed(format!("read from {peer}: {e}"))),
        Err(_) => Err(TransportError::Timeout(format!(
            "no response from {peer} within {}ms",
            timeout.as_millis()
        ))),
    }
}

pub(crate) fn not_open(peer: &str) -> TransportError {
    TransportError::ChannelClosed(format!("{peer} is not connected"))
}
