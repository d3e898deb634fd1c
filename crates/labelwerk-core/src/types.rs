// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelwerk printer fleet.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Printer command language.
///
/// Two thermal dialects are fully supported; `Ptouch` is accepted in
/// configuration but has no status probe or transport yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Zebra Programming Language.
    Zpl,
    /// Eltron Programming Language 2.
    Epl2,
    /// Brother P-Touch raster protocol (stub).
    Ptouch,
}

impl Dialect {
    /// Health-probe command used when the printer config does not override it.
    pub fn default_probe_command(&self) -> &'static str {
        match self {
            Self::Zpl => "~HS",
            Self::Epl2 => "UQ",
            Self::Ptouch => "",
        }
    }

    /// Line terminator appended to probe commands.
    pub fn command_terminator(&self) -> &'static [u8] {
        match self {
            Self::Zpl => b"\r\n",
            Self::Epl2 => b"\n",
            Self::Ptouch => b"",
        }
    }

    /// Configuration keyword (`zpl`, `epl2`, `ptouch`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zpl => "zpl",
            Self::Epl2 => "epl2",
            Self::Ptouch => "ptouch",
        }
    }

    /// Parse a loosely-written dialect name such as `ZPL II` or `epl`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let normalized: String = keyword
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "zpl" | "zpl2" | "zplii" => Some(Self::Zpl),
            "epl" | "epl2" | "eplii" => Some(Self::Epl2),
            "ptouch" | "pt" | "brother" => Some(Self::Ptouch),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the host reaches a printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Raw TCP socket (JetDirect-style, port 9100).
    Tcp {
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    /// Local serial line.
    Serial {
        device: String,
        #[serde(default = "default_baudrate")]
        baudrate: u32,
    },
    /// Indirect access through an automation platform that owns the printer.
    Proxy {
        device_id: String,
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
    },
}

fn default_tcp_port() -> u16 {
    9100
}

fn default_baudrate() -> u32 {
    9600
}

impl ConnectionConfig {
    /// Short human-readable address for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
            Self::Serial { device, baudrate } => format!("serial:{device}@{baudrate}"),
            Self::Proxy {
                device_id,
                endpoint,
                ..
            } => format!("proxy:{device_id}@{endpoint}"),
        }
    }
}

/// Health-probe schedule for one printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthcheckConfig {
    /// Seconds between status probes.
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,
    /// Custom probe command; the dialect default is used when absent.
    #[serde(default)]
    pub command: Option<String>,
}

fn default_probe_interval() -> u64 {
    60
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval(),
            command: None,
        }
    }
}

impl HealthcheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Static configuration of one printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Unique key across the fleet.
    pub name: String,
    pub dialect: Dialect,
    pub connection: ConnectionConfig,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub healthcheck: HealthcheckConfig,
}

fn enabled_by_default() -> bool {
    true
}

impl PrinterConfig {
    /// The command written to the printer on every health probe.
    pub fn probe_command(&self) -> &str {
        self.custom_health_command()
            .unwrap_or_else(|| self.dialect.default_probe_command())
    }

    /// The configured health command, if one is set and not blank.
    pub fn custom_health_command(&self) -> Option<&str> {
        self.healthcheck
            .command
            .as_deref()
            .filter(|cmd| !cmd.trim().is_empty())
    }
}

/// Well-known sensor keys written by the dialect parsers.
pub mod sensor {
    pub const PAPER_OUT: &str = "paper_out";
    pub const HEAD_OPEN: &str = "head_open";
    pub const PAUSED: &str = "paused";
    pub const BUFFER_FULL: &str = "buffer_full";
    pub const RIBBON_OUT: &str = "ribbon_out";
    pub const DARKNESS: &str = "darkness";
    pub const PRINT_SPEED: &str = "print_speed";
    pub const LABEL_LENGTH_MM: &str = "label_length_mm";
    pub const PRINT_WIDTH_MM: &str = "print_width_mm";
    pub const PRINT_MODE: &str = "print_mode";
    pub const PRINT_METHOD: &str = "print_method";
}

/// A single sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl SensorValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Last observed state of a printer, as produced by a health probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub online: bool,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub sensors: BTreeMap<String, SensorValue>,
    /// `None` until the first probe has completed.
    pub observed_at: Option<DateTime<Utc>>,
}

impl PrinterStatus {
    /// A reachable printer observed right now, with no sensor data yet.
    pub fn online_now() -> Self {
        Self {
            online: true,
            observed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.sensors.get(name).and_then(SensorValue::as_flag)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.sensors.get(name).and_then(SensorValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.sensors.get(name).and_then(SensorValue::as_text)
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.sensors.insert(name.to_string(), SensorValue::Flag(value));
    }

    pub fn set_number(&mut self, name: &str, value: f64) {
        self.sensors.insert(name.to_string(), SensorValue::Number(value));
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) {
        self.sensors
            .insert(name.to_string(), SensorValue::Text(value.into()));
    }
}

/// Reachability state machine per printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No probe has completed yet.
    Unknown,
    Online,
    Offline,
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, waiting for the printer.
    Pending,
    /// Picked up by the queue worker.
    Printing,
    /// Every copy was written to the printer.
    Completed,
    /// Send attempts exhausted.
    Failed,
    /// Never left the queue before its deadline.
    Expired,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Printing)
                | (Self::Pending, Self::Expired)
                | (Self::Printing, Self::Completed)
                | (Self::Printing, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Printing => "printing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field values handed to the renderer.
pub type FieldValues = BTreeMap<String, serde_json::Value>;

/// A rendered label waiting for (or going through) a printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub template_name: String,
    pub printer_name: String,
    /// Dialect used to interpret the payload's quantity directives.
    pub dialect: Dialect,
    /// Printer-ready bytes; opaque to the queue.
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub quantity: u32,
    /// Copies already written (resume point after a partial failure).
    pub copies_sent: u32,
    /// Send attempts made so far.
    pub attempts: u32,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl PrintJob {
    pub fn new(
        template_name: String,
        printer_name: String,
        dialect: Dialect,
        payload: Vec<u8>,
        quantity: u32,
        queue_timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(queue_timeout)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: JobId::new(),
            template_name,
            printer_name,
            dialect,
            payload,
            quantity,
            copies_sent: 0,
            attempts: 0,
            status: JobStatus::Pending,
            submitted_at: now,
            expires_at,
            updated_at: now,
            error_message: None,
        }
    }
}

/// What the API layer sees for a job: on submission and on lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReceipt {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// Template metadata relevant to printer selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Printer names the template may be sent to.
    #[serde(default)]
    pub supported_printers: Vec<String>,
    /// Dialects the template renders for, regardless of printer name.
    #[serde(default)]
    pub supported_dialects: Vec<Dialect>,
    /// Fixed quantity; overrides whatever the caller requested.
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl TemplateSpec {
    pub fn supports(&self, printer: &PrinterConfig) -> bool {
        self.supported_printers.iter().any(|n| n == &printer.name)
            || self.supported_dialects.contains(&printer.dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer(name: &str, dialect: Dialect) -> PrinterConfig {
        PrinterConfig {
            name: name.into(),
            dialect,
            connection: ConnectionConfig::Tcp {
                host: "10.0.0.5".into(),
                port: 9100,
            },
            enabled: true,
            healthcheck: HealthcheckConfig::default(),
        }
    }

    #[test]
    fn lifecycle_is_monotonic() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Printing));
        assert!(Pending.can_transition_to(Expired));
        assert!(Printing.can_transition_to(Completed));
        assert!(Printing.can_transition_to(Failed));

        assert!(!Printing.can_transition_to(Pending));
        assert!(!Printing.can_transition_to(Expired));
        assert!(!Pending.can_transition_to(Completed));
        for terminal in [Completed, Failed, Expired] {
            assert!(terminal.is_terminal());
            for next in [Pending, Printing, Completed, Failed, Expired] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn connection_config_is_internally_tagged() {
        let tcp: ConnectionConfig =
            serde_json::from_str(r#"{"type":"tcp","host":"printer.lan"}"#).unwrap();
        assert_eq!(
            tcp,
            ConnectionConfig::Tcp {
                host: "printer.lan".into(),
                port: 9100
            }
        );

        let serial: ConnectionConfig =
            serde_json::from_str(r#"{"type":"serial","device":"/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(serial.describe(), "serial:/dev/ttyUSB0@9600");

        let proxy: ConnectionConfig = serde_json::from_str(
            r#"{"type":"proxy","device_id":"zebra_1","endpoint":"http://hub:8123"}"#,
        )
        .unwrap();
        assert!(matches!(proxy, ConnectionConfig::Proxy { token: None, .. }));
    }

    #[test]
    fn probe_command_falls_back_to_dialect_default() {
        let mut cfg = printer("shelf", Dialect::Epl2);
        assert_eq!(cfg.probe_command(), "UQ");

        cfg.healthcheck.command = Some("  ".into());
        assert_eq!(cfg.probe_command(), "UQ");

        assert_eq!(cfg.custom_health_command(), None);

        cfg.healthcheck.command = Some("~HQES".into());
        assert_eq!(cfg.probe_command(), "~HQES");
        assert_eq!(cfg.custom_health_command(), Some("~HQES"));
    }

    #[test]
    fn dialect_keywords() {
        assert_eq!(Dialect::from_keyword("ZPL II"), Some(Dialect::Zpl));
        assert_eq!(Dialect::from_keyword("epl"), Some(Dialect::Epl2));
        assert_eq!(Dialect::from_keyword("P-Touch"), Some(Dialect::Ptouch));
        assert_eq!(Dialect::from_keyword("escpos"), None);
    }

    #[test]
    fn template_supports_by_name_or_dialect() {
        let spec = TemplateSpec {
            name: "shipping".into(),
            supported_printers: vec!["dock".into()],
            supported_dialects: vec![Dialect::Epl2],
            ..TemplateSpec::default()
        };
        assert!(spec.supports(&printer("dock", Dialect::Zpl)));
        assert!(spec.supports(&printer("shelf", Dialect::Epl2)));
        assert!(!spec.supports(&printer("office", Dialect::Zpl)));
    }

    #[test]
    fn job_expiry_follows_timeout() {
        let job = PrintJob::new(
            "t".into(),
            "p".into(),
            Dialect::Zpl,
            b"^XA^XZ".to_vec(),
            1,
            Duration::from_secs(300),
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!((job.expires_at - job.submitted_at).num_seconds(), 300);
    }

    #[test]
    fn job_id_round_trips_through_display() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }
}
