//! Classifies adapter traffic into annotation records.
//!
//! Both directions are handled by first-match-wins rules whose order
//! carries semantics: adapter status strings such as `NO DATA` must win
//! over the hex decoder even when they happen to contain hex-valid
//! characters, and the negative-response check must run before the
//! ISO 15765-2 frame-type dispatch.
//!
//! The analyzer is total. No input line makes it panic or return an error;
//! a line it does not understand simply produces no annotation.

use crate::hex;
use crate::isotp::{IsoTpReassembler, Reassembly};
use crate::tables;

/// How a rendered annotation should be treated by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// A headline plus detail lines. Records are ephemeral: produced, printed,
/// discarded. The direction is implied by which `annotate_*` call made it.
#[derive(Debug, PartialEq, Eq)]
pub struct Annotation {
    pub headline: String,
    pub details: Vec<String>,
    pub severity: Severity,
}

impl Annotation {
    fn info(headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            details: Vec::new(),
            severity: Severity::Info,
        }
    }

    fn warning(headline: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::info(headline)
        }
    }

    fn detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }
}

/// One analyzer per adapter session; it owns the reassembly state and must
/// be dropped (or reset) on reconnect.
#[derive(Default)]
pub struct Analyzer {
    isotp: IsoTpReassembler,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.isotp.reset();
    }

    /// Classify a command the user is about to send. Outgoing
    /// classification is stateless; this simply forwards to
    /// [`annotate_outgoing`].
    pub fn annotate_outgoing(&self, line: &str) -> Option<Annotation> {
        annotate_outgoing(line)
    }

    /// Classify a line received from the adapter.
    pub fn annotate_incoming(&mut self, line: &str) -> Option<Annotation> {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();

        if upper.contains("NO DATA") {
            return Some(
                Annotation::info("Adapter status").detail("No ECU replied to this request"),
            );
        }
        if upper.contains("SEARCHING") {
            return Some(
                Annotation::info("Adapter status")
                    .detail("Adapter is still trying to lock on a protocol"),
            );
        }
        if upper == "OK" {
            return Some(Annotation::info("Adapter acknowledged command"));
        }

        let bytes = hex::parse_response(trimmed)?;
        if bytes.len() < 2 {
            return None;
        }

        if bytes[0] == 0x7F && bytes.len() >= 3 {
            return Some(negative_response(bytes[1], bytes[2]));
        }

        match bytes[0] >> 4 {
            0x1 => {
                let event = self.isotp.first_frame(&bytes);
                Some(reassembly_annotation(event))
            }
            0x2 => {
                let event = self.isotp.consecutive_frame(&bytes);
                Some(reassembly_annotation(event))
            }
            _ => Some(positive_response(&bytes)),
        }
    }
}

/// Classify a command about to be sent to the adapter. Needs no session
/// state, so callers that never see responses can use it directly.
pub fn annotate_outgoing(line: &str) -> Option<Annotation> {
    let upper = line.trim().to_uppercase();

    if upper.starts_with("AT") {
        return Some(command_annotation("ELM", tables::AT_COMMANDS, &upper));
    }
    if upper.starts_with("ST") {
        return Some(command_annotation("STN", tables::ST_COMMANDS, &upper));
    }

    let bytes = hex::parse_strict(&upper)?;
    let mode = *bytes.first()?;

    let (protocol, description) = if mode <= 0x0F {
        ("OBD-II", tables::obd_mode(mode))
    } else {
        ("UDS/KWP", tables::uds_mode(mode))
    };

    let mut annotation = Annotation::info(format!("{protocol} request (mode {mode:02X})"))
        .detail(format!("Hex: {}", hex::format(&bytes)));

    if let Some(description) = description {
        annotation = annotation.detail(description);
    }

    if mode <= 0x0F && bytes.len() >= 2 {
        let pid = bytes[1];
        annotation = annotation.detail(match tables::pid_name(pid) {
            Some(name) => format!("PID {pid:02X}: {name}"),
            None => format!("PID {pid:02X}"),
        });
    }

    Some(annotation)
}

fn reassembly_annotation(event: Reassembly) -> Annotation {
    match event {
        Reassembly::Started { total } => Annotation::info("ISO-TP First Frame")
            .detail(format!("Message length: {total} bytes"))
            .detail(format!("Progress: 1/{total}")),
        Reassembly::Progress { received, total } => Annotation::info("ISO-TP Consecutive Frame")
            .detail(format!("Progress: {received}/{total}")),
        Reassembly::Complete(message) => complete_message(&message),
        Reassembly::Orphan { seq } => Annotation::warning("ISO-TP warning").detail(format!(
            "Orphaned consecutive frame (sequence {seq}) without a first frame"
        )),
        Reassembly::OutOfSequence { expected, got } => Annotation::warning("ISO-TP warning")
            .detail(format!("Expected sequence {expected}, got {got}"))
            .detail("Reassembly state cleared"),
    }
}

fn command_annotation(
    family: &str,
    table: &[(&'static str, &'static str)],
    upper: &str,
) -> Annotation {
    match tables::longest_prefix(table, upper) {
        Some((key, description)) => {
            Annotation::info(format!("{family} adapter command {key}")).detail(description)
        }
        None => Annotation::info(format!("{family} adapter command")),
    }
}

fn negative_response(service: u8, code: u8) -> Annotation {
    let description = tables::nrc(code).unwrap_or("Unknown NRC");
    Annotation::warning(format!("Negative Response (NRC 0x{code:02X})"))
        .detail(format!("Service 0x{service:02X} failed"))
        .detail(description)
}

fn positive_response(bytes: &[u8]) -> Annotation {
    let mode = bytes[0] & 0x3F;
    let pid = bytes[1];
    let payload = &bytes[2..];

    let (protocol, description) = if mode <= 0x0F {
        ("OBD-II", tables::obd_mode(mode))
    } else {
        ("UDS/KWP", tables::uds_mode(mode))
    };

    let mut annotation = Annotation::info(format!("{protocol} response"))
        .detail(format!("Hex: {}", hex::format(bytes)))
        .detail(format!("ASCII: {}", hex::ascii(bytes)));

    if let Some(description) = description {
        annotation = annotation.detail(format!("Mode {mode:02X}: {description}"));
    }

    if let Some(value) = tables::pid_value(pid, payload) {
        let name = tables::pid_name(pid).unwrap_or("Value");
        annotation = annotation.detail(format!("{name}: {value}"));
    }

    annotation
}

/// A reassembled message is inspected for structures worth decoding; today
/// that is the mode 09 PID 02 VIN record.
fn complete_message(message: &[u8]) -> Annotation {
    if message.first() == Some(&0x49) && message.len() >= 3 && message[1] == 0x02 {
        let vin = hex::ascii(&message[3..]);
        return Annotation::info("VIN response")
            .detail(format!("VIN: {vin}"))
            .detail(format!("Hex: {}", hex::format(message)));
    }

    Annotation::info(format!("ISO-TP message complete ({} bytes)", message.len()))
        .detail(format!("Hex: {}", hex::format(message)))
        .detail(format!("ASCII: {}", hex::ascii(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> Analyzer {
        Analyzer::new()
    }

    mod outgoing {
        use super::*;

        #[test]
        fn at_command_longest_prefix() {
            let a = analyzer().annotate_outgoing("atsp6").unwrap();
            assert_eq!(a.headline, "ELM adapter command ATSP");
            assert_eq!(a.details, vec!["Set protocol"]);
        }

        #[test]
        fn unknown_at_command_is_generic() {
            let a = analyzer().annotate_outgoing("ATQQ").unwrap();
            assert_eq!(a.headline, "ELM adapter command");
            assert!(a.details.is_empty());
        }

        #[test]
        fn st_command() {
            let a = analyzer().annotate_outgoing("STI").unwrap();
            assert_eq!(a.headline, "STN adapter command STI");
        }

        #[test]
        fn obd_request_with_pid() {
            let a = analyzer().annotate_outgoing("0100").unwrap();
            assert_eq!(a.headline, "OBD-II request (mode 01)");
            assert_eq!(a.details, vec!["Hex: 01 00", "Show current data", "PID 00"]);
        }

        #[test]
        fn obd_request_with_known_pid() {
            let a = analyzer().annotate_outgoing("010C").unwrap();
            assert!(a.details.contains(&"PID 0C: Engine RPM".to_string()));
        }

        #[test]
        fn uds_request() {
            let a = analyzer().annotate_outgoing("22 F1 90").unwrap();
            assert_eq!(a.headline, "UDS/KWP request (mode 22)");
            assert_eq!(a.details, vec!["Hex: 22 F1 90", "Read data by identifier"]);
        }

        #[test]
        fn garbage_is_silent() {
            assert_eq!(analyzer().annotate_outgoing("hello world"), None);
            assert_eq!(analyzer().annotate_outgoing(""), None);
            assert_eq!(analyzer().annotate_outgoing("012"), None);
        }
    }

    mod incoming {
        use super::*;

        #[test]
        fn status_lines_win_over_hex() {
            let a = analyzer().annotate_incoming("NO DATA").unwrap();
            assert_eq!(a.headline, "Adapter status");
            assert_eq!(a.details, vec!["No ECU replied to this request"]);

            let a = analyzer().annotate_incoming("SEARCHING...").unwrap();
            assert_eq!(
                a.details,
                vec!["Adapter is still trying to lock on a protocol"]
            );

            let a = analyzer().annotate_incoming("OK").unwrap();
            assert_eq!(a.headline, "Adapter acknowledged command");
        }

        #[test]
        fn positive_response_with_header() {
            let a = analyzer().annotate_incoming("7E8 41 00 BE 1F A8 13").unwrap();
            assert_eq!(a.headline, "OBD-II response");
            assert!(a.details.contains(&"Hex: 41 00 BE 1F A8 13".to_string()));
            assert!(a.details.contains(&"ASCII: A.....".to_string()));
            assert!(a.details.contains(&"Mode 01: Show current data".to_string()));
        }

        #[test]
        fn positive_response_formats_known_pid() {
            let a = analyzer().annotate_incoming("7E8 41 0C 1A F8").unwrap();
            assert!(a.details.contains(&"Engine RPM: 1726 rpm".to_string()));
        }

        #[test]
        fn uds_positive_response() {
            let a = analyzer().annotate_incoming("62 F1 90 57 41 55").unwrap();
            assert_eq!(a.headline, "UDS/KWP response");
            assert!(a
                .details
                .contains(&"Mode 22: Read data by identifier".to_string()));
        }

        #[test]
        fn negative_response() {
            let a = analyzer().annotate_incoming("7E8 7F 10 12").unwrap();
            assert_eq!(a.severity, Severity::Warning);
            assert_eq!(a.headline, "Negative Response (NRC 0x12)");
            assert_eq!(
                a.details,
                vec!["Service 0x10 failed", "Sub-function not supported"]
            );
        }

        #[test]
        fn short_or_unparseable_lines_are_silent() {
            assert_eq!(analyzer().annotate_incoming("41"), None);
            assert_eq!(analyzer().annotate_incoming("ELM327 v1.5"), None);
            assert_eq!(analyzer().annotate_incoming(""), None);
        }

        #[test]
        fn totality_over_hostile_input() {
            let mut a = analyzer();
            for line in [
                "\u{0}\u{1}\u{2}",
                ">>>>",
                "7",
                "18",
                "7F",
                "10",
                "21",
                "\u{FF}\u{FE}garbage\r\n",
                "7E8 10",
            ] {
                let _ = a.annotate_incoming(line);
                let _ = a.annotate_outgoing(line);
            }
        }
    }

    mod reassembly {
        use super::*;

        #[test]
        fn vin_across_three_frames() {
            let mut a = analyzer();

            let ff = a
                .annotate_incoming("7E8 10 14 49 02 01 57 41 55")
                .unwrap();
            assert_eq!(ff.headline, "ISO-TP First Frame");
            assert!(ff.details.contains(&"Progress: 1/20".to_string()));

            let cf = a
                .annotate_incoming("7E8 21 5A 5A 5A 38 54 38 42")
                .unwrap();
            assert_eq!(cf.headline, "ISO-TP Consecutive Frame");
            assert!(cf.details.contains(&"Progress: 13/20".to_string()));

            let done = a
                .annotate_incoming("7E8 22 41 30 33 34 33 37 34")
                .unwrap();
            assert_eq!(done.headline, "VIN response");
            assert!(done.details.iter().any(|d| d.contains("WAUZZZ8T8BA034374")));
        }

        #[test]
        fn orphan_consecutive_frame_warns() {
            let a = analyzer().annotate_incoming("7E8 21 AA BB").unwrap();
            assert_eq!(a.severity, Severity::Warning);
            assert!(a.details.iter().any(|d| d.contains("Orphan")));
        }

        #[test]
        fn sequence_error_warns_and_resets() {
            let mut a = analyzer();
            a.annotate_incoming("7E8 10 14 49 02 01 57 41 55");
            let bad = a.annotate_incoming("7E8 22 41 30 33 34 33 37 34").unwrap();
            assert_eq!(bad.severity, Severity::Warning);
            assert!(bad
                .details
                .contains(&"Expected sequence 1, got 2".to_string()));

            // State is gone; the next CF is an orphan.
            let orphan = a.annotate_incoming("7E8 21 AA BB").unwrap();
            assert!(orphan.details.iter().any(|d| d.contains("Orphan")));
        }

        #[test]
        fn reset_drops_a_transfer_in_flight() {
            let mut a = analyzer();
            a.annotate_incoming("7E8 10 14 49 02 01 57 41 55");
            a.reset();
            let orphan = a.annotate_incoming("7E8 21 5A 5A 5A 38 54 38 42").unwrap();
            assert_eq!(orphan.severity, Severity::Warning);
        }

        #[test]
        fn non_vin_message_is_generic() {
            let mut a = analyzer();
            a.annotate_incoming("7E8 10 0A 62 F1 90 01 02 03");
            let done = a.annotate_incoming("7E8 21 04 05 06 07 AA AA AA").unwrap();
            assert_eq!(done.headline, "ISO-TP message complete (10 bytes)");
        }
    }
}
