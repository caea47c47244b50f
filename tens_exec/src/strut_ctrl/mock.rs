//! Scripted transport for exercising the strut and robot controllers without hardware.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use comms_if::eqpt::strut::{self, REPLY_HEADER};

use super::link::{LinkError, Transport};

/// Something the controller did to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(String, u8),
    Read(String),
}

/// One scripted reply to a read.
#[derive(Debug, Clone)]
pub enum Reply {
    Frame(Vec<u8>),
    Empty,
    Garbage,
    Fail,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Plays back a script of replies. Once the script runs out every read fails.
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    events: EventLog,
    failing_writes: usize,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> (Self, EventLog) {
        let events = EventLog::default();
        (Self::with_log(replies, events.clone()), events)
    }

    /// Record events into a log shared with other transports.
    pub fn with_log(replies: Vec<Reply>, events: EventLog) -> Self {
        Self {
            replies: replies.into(),
            events,
            failing_writes: 0,
        }
    }

    /// Make the next `n` writes fail.
    pub fn failing_writes(mut self, n: usize) -> Self {
        self.failing_writes = n;
        self
    }

    /// Replies for the common case of a strut that boots cleanly, echoes `value` and then
    /// finishes.
    pub fn clean_run(value: u8) -> Vec<Reply> {
        vec![
            Reply::Frame(vec![0, 0, 0]),
            Reply::Frame(vec![value, 0]),
            Reply::Frame(vec![255, 255]),
        ]
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, address: &str, _handle: &str, value: &str) -> Result<(), LinkError> {
        let v = u8::from_str_radix(value.trim_start_matches("0x"), 16)
            .map_err(|_| LinkError::NoResponse)?;
        self.events
            .lock()
            .unwrap()
            .push(Event::Write(address.to_string(), v));

        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(LinkError::NonZeroExit {
                status: "1".into(),
                stderr: "connect error".into(),
            });
        }

        Ok(())
    }

    fn read(&mut self, address: &str, _handle: &str) -> Result<String, LinkError> {
        self.events
            .lock()
            .unwrap()
            .push(Event::Read(address.to_string()));

        match self.replies.pop_front() {
            Some(Reply::Frame(f)) => Ok(strut::encode_reply(&f)),
            Some(Reply::Empty) => Ok(REPLY_HEADER.to_string()),
            Some(Reply::Garbage) => Ok(format!("{}zz", REPLY_HEADER)),
            Some(Reply::Fail) | None => Err(LinkError::NoResponse),
        }
    }
}

/// Values written in order, ignoring reads.
pub fn writes(events: &EventLog) -> Vec<(String, u8)> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::Write(a, v) => Some((a.clone(), *v)),
            Event::Read(_) => None,
        })
        .collect()
}
