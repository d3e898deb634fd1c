// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One configured label printer: a transport plus a status parser.
//
// Every operation scopes its own channel. `probe` and `send` connect, do
// their I/O, and disconnect on every exit path, so no socket or serial
// handle outlives the call that opened it.

use chrono::Utc;
use tracing::{debug, info, instrument};

use labelwerk_core::config::IoTimeouts;
use labelwerk_core::error::{ProtocolError, Result, TransportError};
use labelwerk_core::types::{Dialect, PrinterConfig, PrinterStatus};

use crate::protocol::{StatusParser, zpl};
use crate::transport::{StubHandle, StubTransport, Transport};

#[derive(Debug)]
pub struct Printer {
    config: PrinterConfig,
    transport: Transport,
    parser: StatusParser,
    io: IoTimeouts,
    /// Model and firmware, once learned.
    identity: Option<(String, Option<String>)>,
}

impl Printer {
    pub fn new(config: PrinterConfig, transport: Transport, io: IoTimeouts) -> Self {
        let parser = StatusParser::for_printer(&config);
        Self {
            config,
            transport,
            parser,
            io,
            identity: None,
        }
    }

    /// A printer reached over the transport its config describes.
    pub fn from_config(config: PrinterConfig, io: IoTimeouts) -> Self {
        let transport = Transport::from_config(&config.connection);
        Self::new(config, transport, io)
    }

    /// A printer backed by a scripted in-memory transport.
    pub fn stub(config: PrinterConfig, io: IoTimeouts) -> (Self, StubHandle) {
        let (stub, handle) = StubTransport::new();
        (Self::new(config, Transport::Stub(stub), io), handle)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub async fn connect(&mut self) -> std::result::Result<(), TransportError> {
        self.transport.open(self.io.connect()).await
    }

    /// Idempotent.
    pub async fn disconnect(&mut self) {
        self.transport.close().await;
    }

    /// Write a probe command and return the raw response.
    #[instrument(skip(self), fields(printer = %self.config.name))]
    pub async fn probe(&mut self, command: &str) -> std::result::Result<Vec<u8>, TransportError> {
        let mut request = command.as_bytes().to_vec();
        request.extend_from_slice(self.config.dialect.command_terminator());
        let policy = self.parser.read_policy(&self.io);

        self.connect().await?;
        let response = self.transport.query(&request, &policy).await;
        self.disconnect().await;

        if let Ok(bytes) = &response {
            debug!(bytes = bytes.len(), "probe response");
        }
        response
    }

    /// Write a rendered payload. Payload contents are not interpreted.
    #[instrument(skip(self, payload), fields(printer = %self.config.name, bytes = payload.len()))]
    pub async fn send(&mut self, payload: &[u8]) -> std::result::Result<(), TransportError> {
        self.connect().await?;
        let result = self.transport.write(payload, self.io.write()).await;
        self.disconnect().await;

        if result.is_ok() {
            debug!("payload written");
        }
        result
    }

    /// Run the health probe and parse it into a status.
    ///
    /// Transport and protocol failures are returned as errors; the caller
    /// decides what an unreachable printer means. A reply to a configured
    /// health command that the dialect parser does not understand still
    /// counts as online when it is not empty, with no sensor readings.
    pub async fn check_status(&mut self) -> Result<PrinterStatus> {
        if let StatusParser::Unsupported(dialect) = self.parser {
            return Err(ProtocolError::UnsupportedDialect(dialect).into());
        }

        let command = self.config.probe_command().to_string();
        let raw = self.probe(&command).await?;
        let mut status = match self.parser.parse(&raw) {
            Ok(status) => status,
            Err(e) if self.config.custom_health_command().is_some() && !raw.trim_ascii().is_empty() => {
                debug!(
                    printer = %self.config.name,
                    command = %command,
                    error = %e,
                    "custom health command answered in a format the parser does not read, treating as online"
                );
                PrinterStatus {
                    online: true,
                    ..PrinterStatus::default()
                }
            }
            Err(e) => return Err(e.into()),
        };
        status.observed_at = Some(Utc::now());

        if let Some(model) = status.model.clone() {
            self.identity = Some((model, status.firmware.clone()));
        } else {
            if self.identity.is_none() && self.parser == StatusParser::Zpl {
                self.identify().await;
            }
            if let Some((model, firmware)) = &self.identity {
                status.model = Some(model.clone());
                status.firmware = firmware.clone();
            }
        }
        Ok(status)
    }

    /// Ask a ZPL printer who it is. Failure leaves the identity unknown
    /// and does not affect reachability.
    async fn identify(&mut self) {
        match self.probe(zpl::HOST_IDENTIFICATION).await {
            Ok(raw) => match zpl::parse_host_identification(&raw) {
                Some((model, firmware)) => {
                    info!(printer = %self.config.name, model = %model, "printer identified");
                    self.identity = Some((model, firmware));
                }
                None => debug!(printer = %self.config.name, "~HI response had no model"),
            },
            Err(e) => debug!(printer = %self.config.name, error = %e, "~HI query failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelwerk_core::error::LabelwerkError;
    use labelwerk_core::types::{ConnectionConfig, HealthcheckConfig, sensor};

    const HS_READY: &str = "\x02030,0,0,1245,000,0,0,0,000,0,0,0\x03\r\n\x02000,0,0,0,1,2,6,0,00000000,1,015\x03\r\n";

    fn config(dialect: Dialect) -> PrinterConfig {
        PrinterConfig {
            name: "dock".into(),
            dialect,
            connection: ConnectionConfig::Tcp {
                host: "10.0.0.5".into(),
                port: 9100,
            },
            enabled: true,
            healthcheck: HealthcheckConfig::default(),
        }
    }

    #[tokio::test]
    async fn zpl_status_learns_identity_once() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Zpl), IoTimeouts::default());
        handle.respond_text("~HS", HS_READY);
        handle.respond_text("~HI", "\x02ZD421-203dpi,V84.20.18Z,8,8192KB\x03");

        let status = printer.check_status().await.unwrap();
        assert!(status.online);
        assert!(status.observed_at.is_some());
        assert_eq!(status.model.as_deref(), Some("ZD421-203dpi"));
        assert_eq!(status.firmware.as_deref(), Some("V84.20.18Z"));
        assert_eq!(status.flag(sensor::PAPER_OUT), Some(false));

        let again = printer.check_status().await.unwrap();
        assert_eq!(again.model.as_deref(), Some("ZD421-203dpi"));
        assert_eq!(handle.writes_containing(b"~HI"), 1);
        assert_eq!(handle.writes_containing(b"~HS\r\n"), 2);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn failed_identification_keeps_printer_online() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Zpl), IoTimeouts::default());
        handle.respond_text("~HS", HS_READY);

        let status = printer.check_status().await.unwrap();
        assert!(status.online);
        assert_eq!(status.model, None);
    }

    #[tokio::test(start_paused = true)]
    async fn epl2_probe_waits_and_accumulates() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Epl2), IoTimeouts::default());
        handle.respond(
            "UQ",
            vec![
                b"UKQ1935HLU      V4.42\r\n".to_vec(),
                b"I8,0,001 rY JF WN\r\nq812\r\n".to_vec(),
                b"Option:d,Ff\r\n".to_vec(),
            ],
        );

        let status = printer.check_status().await.unwrap();
        assert_eq!(status.model.as_deref(), Some("UKQ1935HLU"));
        assert_eq!(status.text(sensor::PRINT_METHOD), Some("direct_thermal"));
        assert_eq!(handle.writes(), vec![b"UQ\n".to_vec()]);
    }

    #[tokio::test]
    async fn unreachable_printer_is_a_transport_error() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Zpl), IoTimeouts::default());
        handle.set_reachable(false);

        let err = printer.check_status().await.unwrap_err();
        assert!(matches!(
            err,
            LabelwerkError::Transport(TransportError::ConnectFailed(_))
        ));
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn malformed_response_is_a_protocol_error_and_releases_channel() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Zpl), IoTimeouts::default());
        handle.respond_text("~HS", "\x02030,0");

        let err = printer.check_status().await.unwrap_err();
        assert!(matches!(err, LabelwerkError::Protocol(_)));
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn ptouch_never_touches_the_transport() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Ptouch), IoTimeouts::default());

        let err = printer.check_status().await.unwrap_err();
        assert!(matches!(
            err,
            LabelwerkError::Protocol(ProtocolError::UnsupportedDialect(Dialect::Ptouch))
        ));
        assert_eq!(handle.opens(), 0);
    }

    #[tokio::test]
    async fn send_releases_channel_on_failure() {
        let (mut printer, handle) = Printer::stub(config(Dialect::Zpl), IoTimeouts::default());
        handle.reject_payloads(true);

        assert!(printer.send(b"^XA^FDx^FS^XZ").await.is_err());
        assert!(!handle.is_open());

        handle.reject_payloads(false);
        printer.send(b"^XA^FDx^FS^XZ").await.unwrap();
        assert_eq!(handle.writes_containing(b"^FDx"), 1);
        assert!(!handle.is_open());
    }

    const HQES_CLEAR: &str = "\x02\r\n  PRINTER STATUS\r\n   ERRORS:         0 00000000 00000000\r\n   WARNINGS:       0 00000000 00000000\r\n\x03";

    #[tokio::test]
    async fn custom_health_command_reply_counts_as_online() {
        let mut cfg = config(Dialect::Zpl);
        cfg.healthcheck.command = Some("~HQES".into());
        let (mut printer, handle) = Printer::stub(cfg, IoTimeouts::default());
        handle.respond_text("~HQES", HQES_CLEAR);

        let status = printer.check_status().await.unwrap();
        assert!(status.online);
        assert!(status.observed_at.is_some());
        assert!(status.sensors.is_empty());
        assert_eq!(handle.writes_containing(b"~HQES\r\n"), 1);
        assert_eq!(handle.writes_containing(b"~HS\r\n"), 0);
    }

    #[tokio::test]
    async fn custom_health_command_with_parseable_reply_keeps_sensors() {
        let mut cfg = config(Dialect::Zpl);
        cfg.healthcheck.command = Some("~HS".into());
        let (mut printer, handle) = Printer::stub(cfg, IoTimeouts::default());
        handle.respond_text("~HS", HS_READY);

        let status = printer.check_status().await.unwrap();
        assert!(status.online);
        assert_eq!(status.flag(sensor::PAPER_OUT), Some(false));
    }

    #[tokio::test]
    async fn blank_reply_to_custom_health_command_is_an_error() {
        let mut cfg = config(Dialect::Zpl);
        cfg.healthcheck.command = Some("~HQES".into());
        let (mut printer, handle) = Printer::stub(cfg, IoTimeouts::default());
        handle.respond_text("~HQES", "\r\n");

        let err = printer.check_status().await.unwrap_err();
        assert!(matches!(err, LabelwerkError::Protocol(_)));
    }
}
