//! # Strut Equipment Protocol
//!
//! Wire-level definitions for the link to a single strut controller. Values are sent to the
//! strut as a single hex token on the write characteristic, status replies are read back from
//! the read characteristic as a string of space separated hex tokens preceded by a fixed length
//! header.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Characteristic handle that actuator values are written to.
pub const WRITE_HANDLE: &str = "0x14";

/// Characteristic handle that status frames are read from.
pub const READ_HANDLE: &str = "0x11";

/// Number of characters at the start of a read reply which echo the protocol and address rather
/// than carrying status data.
pub const REPLY_HEADER_LEN: usize = 33;

/// The header the transport prints before the reply payload.
pub const REPLY_HEADER: &str = "Characteristic value/descriptor: ";

/// Reported by a strut once it has finished running a commanded value.
pub const FINISH_SENTINEL: [u8; 2] = [255, 255];

/// Long form of the finish sentinel sent by some firmware revisions.
pub const FINISH_SENTINEL_LONG: [u8; 4] = [255, 255, 0, 0];

/// Status frames which a strut sends after it has restarted mid experiment. They are accepted as
/// the end of an experiment.
pub const RESTART_PATTERNS: [[u8; 3]; 4] = [[1, 1, 0], [0, 0, 0], [1, 0, 0], [1, 1, 1]];

/// Length of the diagnostic triple a strut reports once booted.
pub const BOOT_DIAGNOSTIC_LEN: usize = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A decoded status reply from a strut.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusFrame(pub Vec<u8>);

/// The three diagnostic results a strut reports after it boots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootDiagnostics {
    /// SD card shield detected
    pub sd_card: DiagnosticResult,

    /// Data file opened on the SD card
    pub log_file: DiagnosticResult,

    /// Accelerometer started
    pub accelerometer: DiagnosticResult,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of a single boot diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticResult {
    Success,
    Failure,

    /// The strut reported a code outside of the known set
    Unknown(u8),
}

/// Errors which can occur while decoding a reply.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Reply does not start with the characteristic header: {0:?}")]
    MissingHeader(String),

    #[error("Reply token {0:?} is not a byte in hex")]
    InvalidToken(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StatusFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First element of the frame, which echoes the commanded value during a handshake.
    pub fn first(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// True if the frame starts with the finish sentinel, regardless of any trailing elements.
    pub fn is_finish(&self) -> bool {
        self.0.len() >= FINISH_SENTINEL.len() && self.0[..FINISH_SENTINEL.len()] == FINISH_SENTINEL
    }

    /// True if the frame is exactly one of the restart patterns.
    pub fn is_restart(&self) -> bool {
        RESTART_PATTERNS.iter().any(|p| self.0.as_slice() == p)
    }

    /// Interpret the frame as the boot diagnostic triple, if it has the right shape.
    pub fn boot_diagnostics(&self) -> Option<BootDiagnostics> {
        if self.0.len() != BOOT_DIAGNOSTIC_LEN {
            return None;
        }

        Some(BootDiagnostics {
            sd_card: DiagnosticResult::from_code(self.0[0]),
            log_file: DiagnosticResult::from_code(self.0[1]),
            accelerometer: DiagnosticResult::from_code(self.0[2]),
        })
    }
}

impl From<Vec<u8>> for StatusFrame {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl std::fmt::Display for StatusFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl DiagnosticResult {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Failure,
            c => Self::Unknown(c),
        }
    }
}

impl std::fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Failure => write!(f, "Failure"),
            Self::Unknown(c) => write!(f, "Unknown ({})", c),
        }
    }
}

impl BootDiagnostics {
    /// True if every diagnostic passed.
    pub fn all_ok(&self) -> bool {
        self.sd_card == DiagnosticResult::Success
            && self.log_file == DiagnosticResult::Success
            && self.accelerometer == DiagnosticResult::Success
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Encode an actuator value as the fixed width hex token sent to a strut, e.g. `0x0a`.
pub fn encode_value(value: u8) -> String {
    format!("{:#04x}", value)
}

/// Decode a raw read reply into a status frame.
///
/// The header is discarded and the remaining whitespace separated tokens are parsed as hex. A
/// reply with no payload gives an empty frame.
pub fn decode_reply(reply: &str) -> Result<StatusFrame, DecodeError> {
    let reply = reply.trim();

    // Nothing at all means the strut had nothing to say
    if reply.is_empty() {
        return Ok(StatusFrame::default());
    }

    let payload = reply
        .strip_prefix(REPLY_HEADER.trim_end())
        .ok_or_else(|| DecodeError::MissingHeader(reply.to_string()))?;

    payload
        .split_whitespace()
        .map(|t| u8::from_str_radix(t, 16).map_err(|_| DecodeError::InvalidToken(t.to_string())))
        .collect::<Result<Vec<u8>, _>>()
        .map(StatusFrame)
}

/// Build a raw reply from a frame, as the transport would print it.
pub fn encode_reply(frame: &[u8]) -> String {
    let tokens: Vec<String> = frame.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{} ", REPLY_HEADER, tokens.join(" "))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
