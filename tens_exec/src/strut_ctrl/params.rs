//! # Strut control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Retry policy for a blocking poll of a strut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay between polls.
    ///
    /// Units: milliseconds
    pub interval_ms: u64,

    /// Number of polls after which the wait is abandoned, or `None` to wait forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Poll policies for each blocking stage of a strut's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPolicy {
    /// Waiting for the boot diagnostics after power on
    pub boot: PollPolicy,

    /// Backoff between resending a value while waiting for the strut to echo it
    pub handshake: PollPolicy,

    /// Waiting for the finish sentinel once a value is running
    pub completion: PollPolicy,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PollPolicy {
    /// Poll forever with the given interval.
    pub fn forever(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            max_attempts: None,
        }
    }

    /// Poll without any delay, giving up after `max_attempts` polls.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            interval_ms: 0,
            max_attempts: Some(max_attempts),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// True if `attempts` polls have used up the policy.
    pub fn exhausted(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts >= max,
            None => false,
        }
    }

    /// Sleep for the poll interval.
    pub fn wait(&self) {
        if self.interval_ms > 0 {
            std::thread::sleep(self.interval());
        }
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            boot: PollPolicy::forever(1000),
            handshake: PollPolicy::forever(500),
            completion: PollPolicy::forever(1000),
        }
    }
}

impl LinkPolicy {
    /// The same policy for every stage.
    pub fn uniform(policy: PollPolicy) -> Self {
        Self {
            boot: policy,
            handshake: policy,
            completion: policy,
        }
    }
}
