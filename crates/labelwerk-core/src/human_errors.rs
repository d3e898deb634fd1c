// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable messages for operators standing next to the printer.
//
// Every technical error is mapped to plain English with a clear suggestion,
// and the sensor flags of a printer status are turned into an attention hint.

use crate::error::{LabelwerkError, TransportError};
use crate::types::{PrinterStatus, sensor};

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or timeout; the queue retries on its own.
    Transient,
    /// Someone has to do something at the printer or in the request.
    ActionRequired,
    /// Retrying will not help.
    Permanent,
    /// Labels or ribbon must be replaced.
    SuppliesRequired,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether the system retries by itself.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `LabelwerkError` into a `HumanError`.
pub fn humanize_error(err: &LabelwerkError) -> HumanError {
    match err {
        LabelwerkError::Transport(transport) => humanize_transport(transport),

        LabelwerkError::Protocol(detail) => HumanError {
            message: "The printer answered, but we couldn't understand it.".into(),
            suggestion: format!(
                "Check that the printer's language setting matches its configuration. ({detail})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        LabelwerkError::PrinterNotFound(name) => HumanError {
            message: format!("There is no printer called '{name}'."),
            suggestion: "Pick one of the configured printers and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::IncompatibleTemplate { template, printer } => HumanError {
            message: format!("The '{template}' label can't be printed on '{printer}'."),
            suggestion: "Choose a printer listed for this label, or leave the printer empty to use the default.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::NoCompatiblePrinter(template) => HumanError {
            message: format!("No printer is set up for the '{template}' label."),
            suggestion: "Add a printer to the label's supported printers.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::TemplateNotFound(name) => HumanError {
            message: format!("There is no label called '{name}'."),
            suggestion: "Check the label name and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::InvalidQuantity(_) => HumanError {
            message: "At least one label must be printed.".into(),
            suggestion: "Set the quantity to 1 or more.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::Render(detail) => HumanError {
            message: "The label couldn't be prepared.".into(),
            suggestion: format!("Check the values you entered. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::JobNotFound(_) => HumanError {
            message: "We don't know that print job.".into(),
            suggestion: "Finished jobs are forgotten after a while. Submit the label again if it didn't print.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LabelwerkError::JobExpired(_) => HumanError {
            message: "The printer stayed offline too long, so the label was not printed.".into(),
            suggestion: "Turn the printer on, check its cable or network, then print the label again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::QueueSendFailed { attempts, .. } => HumanError {
            message: format!("The label could not be sent after {attempts} attempt(s)."),
            suggestion: "Check the printer is on and loaded, then print the label again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LabelwerkError::InvalidTransition { .. } => HumanError {
            message: "The print job changed state unexpectedly.".into(),
            suggestion: "Look up the job again to see its current state.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LabelwerkError::Config(detail) => HumanError {
            message: "The printer configuration is invalid.".into(),
            suggestion: format!("Fix the configuration file and restart. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        LabelwerkError::Io(e) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: format!("Check file permissions. ({e})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        LabelwerkError::Serialization(e) => HumanError {
            message: "Some data was in the wrong format.".into(),
            suggestion: format!("Check the configuration file syntax. ({e})"),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

fn humanize_transport(err: &TransportError) -> HumanError {
    match err {
        TransportError::ConnectFailed(detail) => HumanError {
            message: "We couldn't reach the printer.".into(),
            suggestion: format!("Check the printer is on and its cable or network is connected. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },
        TransportError::Timeout(_) => HumanError {
            message: "The printer didn't respond in time.".into(),
            suggestion: "The printer might be busy or turned off. The label stays queued until it answers.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        TransportError::ChannelClosed(_) => HumanError {
            message: "The connection to the printer was interrupted.".into(),
            suggestion: "We'll try again automatically.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

/// Operator hint derived from a printer's sensor flags, most urgent first.
///
/// Returns `None` when nothing needs attention.
pub fn describe_attention(status: &PrinterStatus) -> Option<HumanError> {
    if status.flag(sensor::HEAD_OPEN) == Some(true) {
        return Some(HumanError {
            message: "The print head is open.".into(),
            suggestion: "Close the printer lid until it clicks.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        });
    }
    if status.flag(sensor::PAPER_OUT) == Some(true) {
        return Some(HumanError {
            message: "The printer is out of labels.".into(),
            suggestion: "Load a new label roll.".into(),
            retriable: true,
            severity: Severity::SuppliesRequired,
        });
    }
    if status.flag(sensor::RIBBON_OUT) == Some(true) {
        return Some(HumanError {
            message: "The ribbon has run out.".into(),
            suggestion: "Replace the ribbon, or switch the printer to direct thermal labels.".into(),
            retriable: true,
            severity: Severity::SuppliesRequired,
        });
    }
    if status.flag(sensor::PAUSED) == Some(true) {
        return Some(HumanError {
            message: "The printer is paused.".into(),
            suggestion: "Press the pause button on the printer to resume.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        });
    }
    if status.flag(sensor::BUFFER_FULL) == Some(true) {
        return Some(HumanError {
            message: "The printer's memory is full.".into(),
            suggestion: "Wait for queued labels to finish printing.".into(),
            retriable: true,
            severity: Severity::Transient,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;

    #[test]
    fn timeout_is_transient() {
        let err = LabelwerkError::Transport(TransportError::Timeout("~HS after 3s".into()));
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn expired_job_is_action_required() {
        let human = humanize_error(&LabelwerkError::JobExpired(JobId::new()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(human.message.contains("offline too long"));
    }

    #[test]
    fn head_open_outranks_paper_out() {
        let mut status = PrinterStatus::online_now();
        status.set_flag(sensor::PAPER_OUT, true);
        status.set_flag(sensor::HEAD_OPEN, true);
        let hint = describe_attention(&status).unwrap();
        assert!(hint.message.contains("head is open"));
    }

    #[test]
    fn healthy_printer_needs_no_attention() {
        let mut status = PrinterStatus::online_now();
        status.set_flag(sensor::PAPER_OUT, false);
        status.set_number(sensor::DARKNESS, 12.0);
        assert!(describe_attention(&status).is_none());
    }
}
