// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EPL2 configuration query (UQ).
//
// The printer streams a multi-line block in bursts, so the caller waits a
// settle delay and accumulates everything before parsing. Recognised lines:
//
//   UKQ1935HLU      V4.42     model and firmware (first line)
//   I8,0,001 rY JF WN         print speed, ribbon present (rY) or out (rN)
//   q812                      print width in dots
//   Q1218,24                  label length and gap in dots
//   Option:D,Ff               d = direct thermal, D = thermal transfer
//   S3 D09 R256,000 ZT UN     darkness

use labelwerk_core::error::ProtocolError;
use labelwerk_core::types::{PrinterStatus, sensor};

pub const STATUS_QUERY: &str = "UQ";

const STX: char = '\u{2}';

fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn dots_to_mm(dots: u32) -> f64 {
    (f64::from(dots) / 8.0 * 10.0).round() / 10.0
}

/// Parse an accumulated UQ response into an online status.
pub fn parse_uq(raw: &[u8]) -> Result<PrinterStatus, ProtocolError> {
    let text = String::from_utf8_lossy(raw);
    let body = text.trim();
    if body.is_empty() {
        return Err(ProtocolError::UnparseableResponse("empty UQ response".into()));
    }
    if body.starts_with(STX) {
        // Framed replies come from a ZPL printer, not an EPL2 one.
        return Err(ProtocolError::UnparseableResponse(
            "UQ answered with an STX framed reply".into(),
        ));
    }

    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut status = PrinterStatus {
        online: true,
        ..PrinterStatus::default()
    };

    if let Some(first) = lines.next() {
        let (model, firmware) = split_identity(first);
        status.model = model;
        status.firmware = firmware;
    }

    for line in lines {
        if let Some(rest) = line.strip_prefix("Option:") {
            match rest.chars().next() {
                Some('d') => status.set_text(sensor::PRINT_METHOD, "direct_thermal"),
                Some('D') => status.set_text(sensor::PRINT_METHOD, "thermal_transfer"),
                _ => {}
            }
        } else if let Some(rest) = line.strip_prefix('I').filter(|_| line.contains(',')) {
            if let Some(speed) = leading_number(rest) {
                status.set_number(sensor::PRINT_SPEED, f64::from(speed));
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.contains(&"rN") {
                status.set_flag(sensor::RIBBON_OUT, true);
            } else if tokens.contains(&"rY") {
                status.set_flag(sensor::RIBBON_OUT, false);
            }
        } else if let Some(width) = line.strip_prefix('q').and_then(leading_number) {
            status.set_number(sensor::PRINT_WIDTH_MM, dots_to_mm(width));
        } else if let Some(rest) = line.strip_prefix('Q').filter(|r| r.contains(',')) {
            if let Some(length) = leading_number(rest) {
                status.set_number(sensor::LABEL_LENGTH_MM, dots_to_mm(length));
            }
        } else if let Some(darkness) = line
            .strip_prefix('S')
            .and_then(|rest| rest.find(" D").map(|at| &rest[at + 2..]))
            .and_then(leading_number)
        {
            status.set_number(sensor::DARKNESS, f64::from(darkness));
        }
    }

    Ok(status)
}

/// `MODEL   Vx.yy` or the older `MODEL Vx.yy,8,200`.
fn split_identity(line: &str) -> (Option<String>, Option<String>) {
    let line = line.split(',').next().unwrap_or(line).trim();

    let version_at = line
        .char_indices()
        .filter(|&(i, c)| c == 'V' && i > 0 && line[..i].ends_with(char::is_whitespace))
        .map(|(i, _)| i)
        .find(|&i| {
            let rest = &line[i + 1..];
            rest.starts_with(|c: char| c.is_ascii_digit()) && rest.contains('.')
        });

    match version_at {
        Some(i) => {
            let model = line[..i].trim();
            let firmware = line[i..].split_whitespace().next().map(str::to_string);
            ((!model.is_empty()).then(|| model.to_string()), firmware)
        }
        None => ((!line.is_empty()).then(|| line.to_string()), None),
    }
}

/// Copies requested by a `P<n>` print command with n greater than one.
///
/// `P1` is the normal end of an EPL2 form and does not count as a native
/// repeat.
pub fn native_quantity(payload: &[u8]) -> Option<u32> {
    String::from_utf8_lossy(payload)
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('P'))
        .filter_map(leading_number)
        .find(|&copies| copies > 1)
}
