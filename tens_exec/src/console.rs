//! # Trial console
//!
//! Commands accepted by the interactive trial console, and the record kept of each trial.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::cam::Position;
use serde::Serialize;
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The outcome of a single trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    /// Actuation vector run on the struts
    pub values: Vec<u8>,

    pub start: Position,
    pub end: Position,

    /// Units: pixels
    pub distance_px: f64,

    /// Units: centimetres
    pub distance_cm: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, PartialEq, StructOpt)]
#[structopt(name = "tens", no_version)]
pub enum ConsoleCmd {
    /// Run a trial, giving one value (0-255) per strut. A line of bare values is also a trial.
    #[structopt(name = "run")]
    Run { values: Vec<u8> },

    /// Bring all struts to rest.
    #[structopt(name = "stop")]
    Stop,

    /// Save the latest annotated frame to the session.
    #[structopt(name = "snap")]
    Snap,

    /// Wait for the robot to be returned to the centre of the frame.
    #[structopt(name = "center")]
    Center,

    /// Print the current position of the robot.
    #[structopt(name = "pos")]
    Pos,

    /// Stop the struts and exit.
    #[structopt(name = "quit")]
    Quit,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrialRecord {
    pub fn new(values: &[u8], start: Position, end: Position, pix_per_cm: f64) -> Self {
        let distance_px = start.distance_to(&end);

        Self {
            values: values.to_vec(),
            start,
            end,
            distance_px,
            distance_cm: distance_px / pix_per_cm,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse one line of console input. Blank lines give `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCmd>, structopt::clap::Error> {
    let tokens: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    let first = match tokens.first() {
        Some(t) => t,
        None => return Ok(None),
    };

    let mut args = vec!["tens"];
    if first.chars().all(|c| c.is_ascii_digit()) {
        args.push("run");
    }
    args.extend(tokens);

    ConsoleCmd::from_iter_safe(args).map(Some)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
