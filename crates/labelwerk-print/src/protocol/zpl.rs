// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZPL host status (~HS) and host identification (~HI).
//
// ~HS answers with three STX/ETX framed lines of comma separated fields:
//
//   line 1: comm settings, paper out, paused, label length (dots),
//           formats in buffer, buffer full, ...
//   line 2: function settings, unused, head up, ribbon out,
//           thermal transfer, print mode, print width, print speed,
//           unused, unused, darkness
//   line 3: model specific, ignored
//
// Line 1 is required. Line 2 is read when present.

use labelwerk_core::error::ProtocolError;
use labelwerk_core::types::{PrinterStatus, sensor};

pub const HOST_STATUS: &str = "~HS";
pub const HOST_IDENTIFICATION: &str = "~HI";

const STX: char = '\u{2}';
const ETX: char = '\u{3}';

/// Minimum fields on line 1 for the flags we read.
const LINE1_FIELDS: usize = 6;

fn framed_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split(['\r', '\n'])
        .map(|line| line.replace([STX, ETX], "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn strict_flag(field: &str, name: &str) -> Result<bool, ProtocolError> {
    match field.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ProtocolError::UnparseableResponse(format!(
            "~HS {name} field is '{other}'"
        ))),
    }
}

fn dots_to_mm(dots: u32) -> f64 {
    (f64::from(dots) / 8.0 * 10.0).round() / 10.0
}

fn print_mode_name(code: &str) -> &'static str {
    match code {
        "0" => "rewind",
        "1" => "peel_off",
        "2" => "tear_off",
        "3" => "cutter",
        "4" => "delayed_cut",
        "5" => "rfid",
        "6" => "applicator",
        _ => "unknown",
    }
}

/// Parse a ~HS response into an online status.
pub fn parse_host_status(raw: &[u8]) -> Result<PrinterStatus, ProtocolError> {
    let lines = framed_lines(raw);
    let Some(line1) = lines.first() else {
        return Err(ProtocolError::UnparseableResponse("empty ~HS response".into()));
    };

    let fields: Vec<&str> = line1.split(',').map(str::trim).collect();
    if fields.len() < LINE1_FIELDS {
        return Err(ProtocolError::UnparseableResponse(format!(
            "~HS line 1 has {} fields, expected at least {LINE1_FIELDS}",
            fields.len()
        )));
    }

    let mut status = PrinterStatus {
        online: true,
        ..PrinterStatus::default()
    };
    status.set_flag(sensor::PAPER_OUT, strict_flag(fields[1], "paper out")?);
    status.set_flag(sensor::PAUSED, strict_flag(fields[2], "pause")?);
    status.set_flag(sensor::BUFFER_FULL, strict_flag(fields[5], "buffer full")?);
    if let Ok(dots) = fields[3].parse::<u32>() {
        status.set_number(sensor::LABEL_LENGTH_MM, dots_to_mm(dots));
    }

    if let Some(line2) = lines.get(1) {
        read_config_line(line2, &mut status);
    }

    Ok(status)
}

fn read_config_line(line: &str, status: &mut PrinterStatus) {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    if let Some(head_up) = fields.get(2) {
        status.set_flag(sensor::HEAD_OPEN, *head_up == "1");
    }
    if let Some(ribbon_out) = fields.get(3) {
        status.set_flag(sensor::RIBBON_OUT, *ribbon_out == "1");
    }
    if let Some(transfer) = fields.get(4) {
        let method = if *transfer == "1" {
            "thermal_transfer"
        } else {
            "direct_thermal"
        };
        status.set_text(sensor::PRINT_METHOD, method);
    }
    if let Some(mode) = fields.get(5) {
        status.set_text(sensor::PRINT_MODE, print_mode_name(mode));
    }
    if let Some(speed) = fields
        .get(7)
        .and_then(|f| f.parse::<u32>().ok())
        .filter(|&speed| speed > 0)
    {
        status.set_number(sensor::PRINT_SPEED, f64::from(speed));
    }
    if let Some(darkness) = fields
        .get(10)
        .and_then(|f| f.parse::<u32>().ok())
        .filter(|&darkness| darkness <= 30)
    {
        status.set_number(sensor::DARKNESS, f64::from(darkness));
    }
}

/// Parse a ~HI response: `STX model,firmware,... ETX`.
pub fn parse_host_identification(raw: &[u8]) -> Option<(String, Option<String>)> {
    let text = String::from_utf8_lossy(raw).replace([STX, ETX], "");
    let mut parts = text.trim().split(',').map(str::trim);

    let model = parts.next().filter(|m| !m.is_empty())?.to_string();
    let firmware = parts.next().filter(|f| !f.is_empty()).map(str::to_string);
    Some((model, firmware))
}

/// Copies requested by an embedded `^PQ` directive.
///
/// `^PQ` with no count prints one label; the printer still owns the loop.
pub fn native_quantity(payload: &[u8]) -> Option<u32> {
    let at = payload.windows(3).position(|w| w == b"^PQ")?;
    let digits: String = payload[at + 3..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    Some(digits.parse::<u32>().unwrap_or(1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HS_READY: &[u8] = b"\x02030,0,0,1245,000,0,0,0,000,0,0,0\x03\r\n\
\x02000,0,0,0,1,2,6,0,00000000,1,015\x03\r\n\
\x021234,0\x03\r\n";

    #[test]
    fn parses_ready_printer() {
        let status = parse_host_status(HS_READY).unwrap();
        assert!(status.online);
        assert_eq!(status.flag(sensor::PAPER_OUT), Some(false));
        assert_eq!(status.flag(sensor::PAUSED), Some(false));
        assert_eq!(status.flag(sensor::BUFFER_FULL), Some(false));
        assert_eq!(status.flag(sensor::HEAD_OPEN), Some(false));
        assert_eq!(status.number(sensor::LABEL_LENGTH_MM), Some(155.6));
        assert_eq!(status.text(sensor::PRINT_METHOD), Some("thermal_transfer"));
        assert_eq!(status.text(sensor::PRINT_MODE), Some("tear_off"));
        assert_eq!(status.number(sensor::DARKNESS), Some(15.0));
    }

    #[test]
    fn reads_fault_flags() {
        let raw = b"\x02030,1,1,0800,000,1,0,0,000,0,0,0\x03\r\n\x02000,0,1,1,0,0,6,0,00000000,1,000\x03";
        let status = parse_host_status(raw).unwrap();
        assert_eq!(status.flag(sensor::PAPER_OUT), Some(true));
        assert_eq!(status.flag(sensor::PAUSED), Some(true));
        assert_eq!(status.flag(sensor::BUFFER_FULL), Some(true));
        assert_eq!(status.flag(sensor::HEAD_OPEN), Some(true));
        assert_eq!(status.flag(sensor::RIBBON_OUT), Some(true));
        assert_eq!(status.text(sensor::PRINT_METHOD), Some("direct_thermal"));
        assert_eq!(status.text(sensor::PRINT_MODE), Some("rewind"));
    }

    #[test]
    fn line_one_alone_is_enough() {
        let status = parse_host_status(b"\x02030,0,1,1245,000,0,0,0,000,0,0,0\x03").unwrap();
        assert_eq!(status.flag(sensor::PAUSED), Some(true));
        assert_eq!(status.flag(sensor::HEAD_OPEN), None);
    }

    #[test]
    fn truncated_or_garbled_responses_are_rejected() {
        assert!(parse_host_status(b"").is_err());
        assert!(parse_host_status(b"\x02\x03\r\n").is_err());
        assert!(parse_host_status(b"\x02030,0,0").is_err());
        assert!(parse_host_status(b"\x02030,x,0,1245,000,0\x03").is_err());
        assert!(parse_host_status(b"UKQ1935HLU V4.42").is_err());
    }

    #[test]
    fn parses_identification() {
        let (model, firmware) =
            parse_host_identification(b"\x02GX430t-300dpi,V56.17.17Z,12,2104KB\x03").unwrap();
        assert_eq!(model, "GX430t-300dpi");
        assert_eq!(firmware.as_deref(), Some("V56.17.17Z"));
        assert!(parse_host_identification(b"\x02\x03").is_none());
    }

    #[test]
    fn detects_print_quantity_directive() {
        assert_eq!(native_quantity(b"^XA^FDTest^FS^PQ3^XZ"), Some(3));
        assert_eq!(native_quantity(b"^XA^FDTest^FS^PQ12,0,1,Y^XZ"), Some(12));
        assert_eq!(native_quantity(b"^XA^PQ^XZ"), Some(1));
        assert_eq!(native_quantity(b"^XA^FDTest^FS^XZ"), None);
    }
}
