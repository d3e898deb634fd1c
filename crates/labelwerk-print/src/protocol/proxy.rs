// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Readiness state reported by the automation hub for a proxied printer.

use serde::Deserialize;

use labelwerk_core::error::ProtocolError;
use labelwerk_core::types::PrinterStatus;

#[derive(Debug, Deserialize)]
struct ReadyState {
    state: String,
    #[serde(default)]
    attributes: ReadyAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct ReadyAttributes {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    firmware: Option<String>,
}

/// Parse the hub's state document.
///
/// `"on"` means the hub can print right now. Any other state means the hub
/// answered but the printer behind it is not ready.
pub fn parse_ready_state(raw: &[u8]) -> Result<PrinterStatus, ProtocolError> {
    let doc: ReadyState = serde_json::from_slice(raw)
        .map_err(|e| ProtocolError::UnparseableResponse(format!("proxy state: {e}")))?;

    Ok(PrinterStatus {
        online: doc.state.eq_ignore_ascii_case("on"),
        model: doc.attributes.model,
        firmware: doc.attributes.firmware,
        ..PrinterStatus::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_state_is_online() {
        let status = parse_ready_state(
            br#"{"entity_id":"binary_sensor.zebra_dock_ready","state":"on",
                "attributes":{"model":"ZD421","friendly_name":"Dock ready"}}"#,
        )
        .unwrap();
        assert!(status.online);
        assert_eq!(status.model.as_deref(), Some("ZD421"));
    }

    #[test]
    fn other_states_are_offline_but_parsed() {
        for state in ["off", "unavailable", "unknown"] {
            let body = format!(r#"{{"state":"{state}"}}"#);
            let status = parse_ready_state(body.as_bytes()).unwrap();
            assert!(!status.online);
        }
    }

    #[test]
    fn non_json_is_unparseable() {
        assert!(parse_ready_state(b"<html>502 Bad Gateway</html>").is_err());
        assert!(parse_ready_state(br#"{"entity_id":"x"}"#).is_err());
    }
}
