//! # Strut control module
//!
//! Drives the lifecycle of a single strut over its [`DeviceLink`]:
//!
//! ```text
//! Booting --boot_check--> Ready --start--> Running --await_completion--> Finished
//!                                             |                              |
//!                                             +--------> Aborted             +--start--> Running
//! ```
//!
//! A strut which reports one of the restart patterns while running is `Aborted`. It has rebooted,
//! so it must go through `boot_check` again before it will accept a new value.
//!
//! Every wait is a blocking poll of the strut. Link errors during a poll are logged and the poll
//! carries on, the wireless link is expected to recover. How long to keep polling is set by the
//! [`LinkPolicy`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod link;
mod params;

#[cfg(test)]
pub(crate) mod mock;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::strut::{BootDiagnostics, StatusFrame};
use log::{debug, error, info, warn};

pub use link::{DeviceLink, GattTool, LinkError, Transport};
pub use params::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Controller for a single strut.
pub struct StrutCtrl<T> {
    name: String,
    link: DeviceLink<T>,
    policy: LinkPolicy,
    state: StrutState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrutState {
    /// Powered on, boot diagnostics not yet read
    Booting,

    /// Booted and waiting for a value
    Ready,

    /// Running the contained value
    Running(u8),

    /// Reported the finish sentinel
    Finished,

    /// Restarted while running
    Aborted,
}

/// What the strut reported when it was boot checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootReport {
    Diagnostics(BootDiagnostics),

    /// The strut was already reporting the finish sentinel, it booted some time ago.
    AlreadyFinished,
}

/// How an experiment on a strut ended, with the frame that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Finished(StatusFrame),
    Aborted(StatusFrame),
}

/// Blocking stages of the strut lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Boot,
    Handshake,
    Completion,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StrutError {
    #[error("Strut has not been boot checked")]
    NotBooted,

    #[error("Strut restarted during its last run and must be boot checked again")]
    Aborted,

    #[error("Strut is not running a value (state: {0:?})")]
    NotRunning(StrutState),

    #[error("Gave up waiting on the {stage:?} stage after {attempts} polls")]
    RetriesExhausted { stage: Stage, attempts: u32 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> StrutCtrl<T> {
    pub fn new(name: &str, link: DeviceLink<T>, policy: LinkPolicy) -> Self {
        Self {
            name: name.to_string(),
            link,
            policy,
            state: StrutState::Booting,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        self.link.address()
    }

    pub fn state(&self) -> StrutState {
        self.state
    }
}

impl<T: Transport> StrutCtrl<T> {
    /// Wait for the strut to report its boot diagnostics.
    ///
    /// Returns early if the strut is already reporting the finish sentinel.
    pub fn boot_check(&mut self) -> Result<BootReport, StrutError> {
        let policy = self.policy.boot;
        let mut attempts = 0;

        let report = loop {
            attempts += 1;

            match self.link.receive() {
                Ok(frame) if frame.is_finish() => break BootReport::AlreadyFinished,
                Ok(frame) => match frame.boot_diagnostics() {
                    Some(d) => break BootReport::Diagnostics(d),
                    None => debug!("{}: waiting on boot diagnostics, got {}", self.name, frame),
                },
                Err(e) => error!("{}: ERROR reading boot diagnostics: {}", self.name, e),
            }

            if policy.exhausted(attempts) {
                return Err(StrutError::RetriesExhausted {
                    stage: Stage::Boot,
                    attempts,
                });
            }
            policy.wait();
        };

        match report {
            BootReport::Diagnostics(d) => {
                info!("Strut {} ({}) started", self.name, self.address());
                info!("    SD Card Shield: {}", d.sd_card);
                info!("    Data File Open: {}", d.log_file);
                info!("    Accelerometer Start: {}", d.accelerometer);

                if !d.all_ok() {
                    warn!("{}: boot diagnostics reported a failure", self.name);
                }
            }
            BootReport::AlreadyFinished => {
                info!("Strut {} ({}) already finished", self.name, self.address())
            }
        }

        self.state = StrutState::Ready;

        Ok(report)
    }

    /// Command the strut to run `value`, blocking until it echoes the value back.
    ///
    /// The value is resent before every poll which doesn't echo it.
    pub fn start(&mut self, value: u8) -> Result<(), StrutError> {
        match self.state {
            StrutState::Booting => return Err(StrutError::NotBooted),
            StrutState::Aborted => return Err(StrutError::Aborted),
            _ => (),
        }

        let policy = self.policy.handshake;
        let mut attempts = 0;

        self.send_logged(value);

        loop {
            attempts += 1;

            match self.link.receive() {
                Ok(frame) if frame.first() == Some(value) => {
                    debug!("{}: confirmed start of {} ({})", self.name, value, frame);
                    self.state = StrutState::Running(value);
                    return Ok(());
                }
                Ok(frame) => debug!("{}: waiting on start confirm, got {}", self.name, frame),
                Err(e) => error!("{}: ERROR confirming start: {}", self.name, e),
            }

            if policy.exhausted(attempts) {
                return Err(StrutError::RetriesExhausted {
                    stage: Stage::Handshake,
                    attempts,
                });
            }
            policy.wait();

            self.send_logged(value);
        }
    }

    /// Block until the strut reports that its experiment is over.
    pub fn await_completion(&mut self) -> Result<Completion, StrutError> {
        if let StrutState::Running(_) = self.state {
        } else {
            return Err(StrutError::NotRunning(self.state));
        }

        let policy = self.policy.completion;
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.link.receive() {
                Ok(frame) if frame.is_finish() => {
                    debug!("{}: finished ({})", self.name, frame);
                    self.state = StrutState::Finished;
                    return Ok(Completion::Finished(frame));
                }
                Ok(frame) if frame.is_restart() => {
                    info!("{}: restarted during run ({})", self.name, frame);
                    self.state = StrutState::Aborted;
                    return Ok(Completion::Aborted(frame));
                }
                Ok(frame) => debug!("{}: waiting for finish, got {}", self.name, frame),
                Err(e) => error!("{}: ERROR waiting for finish: {}", self.name, e),
            }

            if policy.exhausted(attempts) {
                return Err(StrutError::RetriesExhausted {
                    stage: Stage::Completion,
                    attempts,
                });
            }
            policy.wait();
        }
    }

    /// Start `value`, then optionally wait for the strut to finish.
    pub fn run(&mut self, value: u8, wait: bool) -> Result<Option<Completion>, StrutError> {
        self.start(value)?;

        if wait {
            self.await_completion().map(Some)
        } else {
            Ok(None)
        }
    }

    fn send_logged(&mut self, value: u8) {
        if let Err(e) = self.link.send(value) {
            error!("{}: ERROR sending {}: {}", self.name, value, e);
        }
    }
}

impl Completion {
    pub fn frame(&self) -> &StatusFrame {
        match self {
            Completion::Finished(f) | Completion::Aborted(f) => f,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Completion::Aborted(_))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
