//! # Strut device link
//!
//! One command/response channel to a single strut. Values are written to the strut's write
//! characteristic and status frames read back from its read characteristic. The link itself makes
//! no attempt at recovering from failures, that is left to the strut controller's polling loops.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::process::Command;

use comms_if::eqpt::strut::{self, DecodeError, StatusFrame, READ_HANDLE, WRITE_HANDLE};
use log::trace;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Program used to talk to the struts over bluetooth low energy.
pub const GATTTOOL: &str = "gatttool";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Transport which can carry raw characteristic reads and writes to a device.
pub trait Transport: Send {
    /// Write the hex `value` to the characteristic `handle` of the device at `address`.
    fn write(&mut self, address: &str, handle: &str, value: &str) -> Result<(), LinkError>;

    /// Read the characteristic `handle` of the device at `address`, returning the raw reply.
    fn read(&mut self, address: &str, handle: &str) -> Result<String, LinkError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Link to a single strut at a fixed address.
pub struct DeviceLink<T> {
    address: String,
    transport: T,
}

/// [`Transport`] which invokes `gatttool` once per operation.
#[derive(Debug, Clone)]
pub struct GattTool {
    program: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Could not invoke the transport: {0}")]
    InvocationFailed(std::io::Error),

    #[error("Transport exited with status {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    #[error("Reply was not valid UTF-8")]
    NonUtf8Reply,

    #[error("Malformed reply: {0}")]
    MalformedReply(DecodeError),

    #[error("Device did not respond")]
    NoResponse,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> DeviceLink<T> {
    pub fn new(address: &str, transport: T) -> Self {
        Self {
            address: address.to_string(),
            transport,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl<T: Transport> DeviceLink<T> {
    /// Send an actuator value to the strut.
    ///
    /// Success only means the transport accepted the write, not that the strut acted on it.
    pub fn send(&mut self, value: u8) -> Result<(), LinkError> {
        let token = strut::encode_value(value);
        trace!("{} <- {}", self.address, token);

        self.transport.write(&self.address, WRITE_HANDLE, &token)
    }

    /// Read the latest status frame from the strut.
    pub fn receive(&mut self) -> Result<StatusFrame, LinkError> {
        let reply = self.transport.read(&self.address, READ_HANDLE)?;
        let frame = strut::decode_reply(&reply).map_err(LinkError::MalformedReply)?;
        trace!("{} -> {}", self.address, frame);

        Ok(frame)
    }
}

impl GattTool {
    pub fn new() -> Self {
        Self::with_program(GATTTOOL)
    }

    /// Use a different program with the same command line as `gatttool`.
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, LinkError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(LinkError::InvocationFailed)?;

        if !output.status.success() {
            return Err(LinkError::NonZeroExit {
                status: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".into()),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| LinkError::NonUtf8Reply)
    }
}

impl Default for GattTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for GattTool {
    fn write(&mut self, address: &str, handle: &str, value: &str) -> Result<(), LinkError> {
        self.run(&[
            format!("--device={}", address),
            "--char-write-req".into(),
            format!("--handle={}", handle),
            format!("--value={}", value),
            "--addr-type=random".into(),
        ])
        .map(|_| ())
    }

    fn read(&mut self, address: &str, handle: &str) -> Result<String, LinkError> {
        self.run(&[
            format!("--device={}", address),
            "--char-read".into(),
            "-a".into(),
            handle.to_string(),
            "--addr-type=random".into(),
        ])
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::strut_ctrl::mock::{Event, Reply, ScriptedTransport};

    #[test]
    fn test_send_encodes_value() {
        let (transport, events) = ScriptedTransport::new(vec![]);
        let mut link = DeviceLink::new("CA:A3:11:A7:81:FD", transport);

        link.send(30).unwrap();
        link.send(0).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                Event::Write("CA:A3:11:A7:81:FD".into(), 30),
                Event::Write("CA:A3:11:A7:81:FD".into(), 0)
            ]
        );
    }

    #[test]
    fn test_receive_decodes_frames() {
        let (transport, _) = ScriptedTransport::new(vec![
            Reply::Frame(vec![255, 255, 0, 0]),
            Reply::Empty,
            Reply::Garbage,
            Reply::Fail,
        ]);
        let mut link = DeviceLink::new("E7:50:27:0F:4A:CB", transport);

        assert_eq!(link.receive().unwrap().as_slice(), &[255, 255, 0, 0]);
        assert!(link.receive().unwrap().is_empty());
        assert!(matches!(link.receive(), Err(LinkError::MalformedReply(_))));
        assert!(matches!(link.receive(), Err(LinkError::NoResponse)));
    }

    #[test]
    fn test_missing_program_is_link_error() {
        let mut gatt = GattTool::with_program("/nonexistent/gatttool");
        assert!(matches!(
            gatt.write("00:00:00:00:00:00", WRITE_HANDLE, "0x00"),
            Err(LinkError::InvocationFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_link_error() {
        let mut gatt = GattTool::with_program("false");
        assert!(matches!(
            gatt.read("00:00:00:00:00:00", READ_HANDLE),
            Err(LinkError::NonZeroExit { .. })
        ));
    }
}
