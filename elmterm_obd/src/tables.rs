//! Static description tables: ELM327/STN command sets, OBD-II and UDS/KWP
//! service modes, negative response codes and the PIDs this tool can
//! pretty-print.

/// ELM327 `AT` commands. Keys are matched as the longest prefix of the
/// uppercased outgoing line, so `ATSP6` resolves to `ATSP` and `ATS0`
/// resolves to itself rather than to a shorter key.
pub const AT_COMMANDS: &[(&str, &str)] = &[
    ("AT@1", "Display device description"),
    ("AT@2", "Display device identifier"),
    ("ATAL", "Allow long (8 byte) messages"),
    ("ATAR", "Automatically receive"),
    ("ATAT0", "Adaptive timing off"),
    ("ATAT1", "Adaptive timing auto 1"),
    ("ATAT2", "Adaptive timing auto 2"),
    ("ATBRD", "Try baud rate divisor"),
    ("ATCAF0", "CAN automatic formatting off"),
    ("ATCAF1", "CAN automatic formatting on"),
    ("ATCF", "Set CAN ID filter"),
    ("ATCM", "Set CAN ID mask"),
    ("ATCRA", "Set CAN receive address"),
    ("ATD", "Set all settings to defaults"),
    ("ATDP", "Describe the current protocol"),
    ("ATDPN", "Describe the current protocol by number"),
    ("ATE0", "Echo off"),
    ("ATE1", "Echo on"),
    ("ATH0", "Headers off"),
    ("ATH1", "Headers on"),
    ("ATI", "Print version ID"),
    ("ATL0", "Linefeeds off"),
    ("ATL1", "Linefeeds on"),
    ("ATLP", "Go to low power mode"),
    ("ATMA", "Monitor all messages"),
    ("ATNL", "Normal length (7 byte) messages"),
    ("ATPC", "Protocol close"),
    ("ATRV", "Read the input voltage"),
    ("ATS0", "Spaces off"),
    ("ATS1", "Spaces on"),
    ("ATSH", "Set header"),
    ("ATSP", "Set protocol"),
    ("ATST", "Set response timeout"),
    ("ATTP", "Try protocol"),
    ("ATWS", "Warm start"),
    ("ATZ", "Reset all"),
];

/// STN11xx/STN22xx `ST` extensions.
pub const ST_COMMANDS: &[(&str, &str)] = &[
    ("STDI", "Print device hardware ID"),
    ("STFAP", "Add a pass filter"),
    ("STFCP", "Clear all pass filters"),
    ("STFAB", "Add a block filter"),
    ("STFCB", "Clear all block filters"),
    ("STI", "Print firmware ID"),
    ("STM", "Monitor the bus using current filters"),
    ("STP", "Set the current protocol"),
    ("STPC", "Close the current protocol"),
    ("STPO", "Open the current protocol"),
    ("STSBR", "Switch the UART baud rate"),
    ("STSN", "Print the device serial number"),
];

/// SAE J1979 service modes.
pub const OBD_MODES: &[(u8, &str)] = &[
    (0x01, "Show current data"),
    (0x02, "Show freeze frame data"),
    (0x03, "Show stored DTCs"),
    (0x04, "Clear DTCs"),
    (0x05, "O2 sensor monitoring"),
    (0x06, "Other monitoring"),
    (0x07, "Pending DTCs"),
    (0x08, "Control on-board component"),
    (0x09, "Request vehicle information"),
    (0x0A, "Permanent DTCs"),
];

/// ISO 14229 / ISO 14230 service identifiers.
pub const UDS_MODES: &[(u8, &str)] = &[
    (0x10, "Diagnostic session control"),
    (0x11, "ECU reset"),
    (0x14, "Clear diagnostic information"),
    (0x19, "Read DTC information"),
    (0x22, "Read data by identifier"),
    (0x23, "Read memory by address"),
    (0x27, "Security access"),
    (0x28, "Communication control"),
    (0x2E, "Write data by identifier"),
    (0x31, "Routine control"),
    (0x34, "Request download"),
    (0x35, "Request upload"),
    (0x36, "Transfer data"),
    (0x37, "Request transfer exit"),
    (0x3E, "Tester present"),
    (0x85, "Control DTC setting"),
];

/// Negative response codes. The UDS (ISO 14229-1) meanings, with the
/// KWP2000 (ISO 14230-3) block-transfer codes kept alongside because the
/// older protocols in the ELM327's repertoire still emit them.
pub const NRCS: &[(u8, &str)] = &[
    (0x10, "General reject"),
    (0x11, "Service not supported"),
    (0x12, "Sub-function not supported"),
    (0x13, "Incorrect message length or invalid format"),
    (0x14, "Response too long"),
    (0x21, "Busy, repeat request"),
    (0x22, "Conditions not correct"),
    (0x23, "Routine not complete"),
    (0x24, "Request sequence error"),
    (0x25, "No response from subnet component"),
    (0x31, "Request out of range"),
    (0x33, "Security access denied"),
    (0x35, "Invalid key"),
    (0x36, "Exceeded number of attempts"),
    (0x37, "Required time delay not expired"),
    (0x40, "Download not accepted"),
    (0x41, "Improper download type"),
    (0x42, "Cannot download to specified address"),
    (0x43, "Cannot download number of bytes requested"),
    (0x50, "Upload not accepted"),
    (0x51, "Improper upload type"),
    (0x52, "Cannot upload from specified address"),
    (0x53, "Cannot upload number of bytes requested"),
    (0x70, "Upload/download not accepted"),
    (0x71, "Transfer data suspended"),
    (0x72, "General programming failure"),
    (0x73, "Wrong block sequence counter"),
    (0x77, "Block transfer data checksum error"),
    (0x78, "Request correctly received, response pending"),
    (0x7E, "Sub-function not supported in active session"),
    (0x7F, "Service not supported in active session"),
    (0x80, "Service not supported in active diagnostic session"),
    (0x81, "RPM too high"),
    (0x82, "RPM too low"),
    (0x83, "Engine is running"),
    (0x84, "Engine is not running"),
    (0x85, "Engine run time too low"),
    (0x86, "Temperature too high"),
    (0x87, "Temperature too low"),
    (0x88, "Vehicle speed too high"),
    (0x89, "Vehicle speed too low"),
    (0x8A, "Throttle/pedal too high"),
    (0x8B, "Throttle/pedal too low"),
    (0x8C, "Transmission range not in neutral"),
    (0x8D, "Transmission range not in gear"),
    (0x8E, "Reserved by ISO 14229"),
    (0x8F, "Brake switch not closed"),
    (0x90, "Shifter lever not in park"),
    (0x91, "Torque converter clutch locked"),
    (0x92, "Voltage too high"),
    (0x93, "Voltage too low"),
    (0xF1, "Vehicle manufacturer specific"),
    (0xFA, "Vehicle manufacturer specific"),
    (0xFB, "Vehicle manufacturer specific"),
    (0xFC, "Vehicle manufacturer specific"),
    (0xFD, "Vehicle manufacturer specific"),
    (0xFE, "Vehicle manufacturer specific"),
];

/// Mode 01 PIDs with a value formatter.
pub const PIDS: &[(u8, &str)] = &[
    (0x05, "Coolant temperature"),
    (0x0C, "Engine RPM"),
    (0x0D, "Vehicle speed"),
    (0x0F, "Intake air temperature"),
    (0x11, "Throttle position"),
    (0x2F, "Fuel level"),
];

pub fn obd_mode(mode: u8) -> Option<&'static str> {
    lookup(OBD_MODES, mode)
}

pub fn uds_mode(mode: u8) -> Option<&'static str> {
    lookup(UDS_MODES, mode)
}

pub fn nrc(code: u8) -> Option<&'static str> {
    lookup(NRCS, code)
}

pub fn pid_name(pid: u8) -> Option<&'static str> {
    lookup(PIDS, pid)
}

fn lookup(table: &[(u8, &'static str)], key: u8) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Longest table key that prefixes `line` (already uppercased).
pub fn longest_prefix(
    table: &[(&'static str, &'static str)],
    line: &str,
) -> Option<(&'static str, &'static str)> {
    table
        .iter()
        .filter(|(key, _)| line.starts_with(key))
        .max_by_key(|(key, _)| key.len())
        .map(|&(key, desc)| (key, desc))
}

/// Scale a PID payload into human units. `None` when the PID has no
/// formatter or the payload is too short.
pub fn pid_value(pid: u8, payload: &[u8]) -> Option<String> {
    let a = *payload.first()? as u32;
    match pid {
        0x05 => Some(format!("{} \u{B0}C", a as i32 - 40)),
        0x0C => {
            let b = *payload.get(1)? as u32;
            Some(format!("{} rpm", ((a << 8) + b) / 4))
        }
        0x0D => Some(format!("{a} km/h")),
        0x0F => Some(format!("{} \u{B0}C", a as i32 - 40)),
        0x11 => Some(format!("{:.1} %", a as f64 * 100.0 / 255.0)),
        0x2F => Some(format!("{:.1} %", a as f64 * 100.0 / 255.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_takes_longest_key() {
        assert_eq!(
            longest_prefix(AT_COMMANDS, "ATSP6"),
            Some(("ATSP", "Set protocol"))
        );
        assert_eq!(
            longest_prefix(AT_COMMANDS, "ATS0"),
            Some(("ATS0", "Spaces off"))
        );
        assert_eq!(
            longest_prefix(AT_COMMANDS, "ATST32"),
            Some(("ATST", "Set response timeout"))
        );
        assert_eq!(longest_prefix(AT_COMMANDS, "ATXYZ"), None);
    }

    #[test]
    fn pid_formulas() {
        assert_eq!(pid_value(0x05, &[0x5A]), Some("50 \u{B0}C".into()));
        assert_eq!(pid_value(0x0C, &[0x1A, 0xF8]), Some("1726 rpm".into()));
        assert_eq!(pid_value(0x0D, &[0x2D]), Some("45 km/h".into()));
        assert_eq!(pid_value(0x0F, &[0x00]), Some("-40 \u{B0}C".into()));
        assert_eq!(pid_value(0x11, &[0x64]), Some("39.2 %".into()));
        assert_eq!(pid_value(0x2F, &[0xFF]), Some("100.0 %".into()));
        assert_eq!(pid_value(0x0C, &[0x1A]), None);
        assert_eq!(pid_value(0x00, &[0x00]), None);
    }

    #[test]
    fn nrc_lookup() {
        assert_eq!(nrc(0x12), Some("Sub-function not supported"));
        assert_eq!(nrc(0x78), Some("Request correctly received, response pending"));
        assert_eq!(nrc(0x69), None);
    }

    #[test]
    fn nrc_condition_range_is_gapless() {
        for code in 0x80..=0x93_u8 {
            assert!(nrc(code).is_some(), "missing NRC 0x{code:02X}");
        }
    }
}
