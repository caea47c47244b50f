//! # Tracker module
//!
//! Camera based tracking of the robot. Two background threads make up the pipeline:
//!
//! - [`FrameSource`] owns the camera, keeping the latest cropped frame published.
//! - [`PositionEstimator`] runs a [`Detector`] over each new frame, keeping the latest position
//!   published.
//!
//! Both publish immutable snapshots which are swapped in atomically, so readers never block the
//! pipeline and never see a partially written value.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod calib;
pub mod detect;
pub mod estimator;
pub mod frame_source;
pub mod imgproc;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use comms_if::eqpt::cam::{Position, RoiError};

pub use calib::Calibration;
pub use detect::{build_detector, DetectionStrategy, Detector, NoDetection};
pub use estimator::PositionEstimator;
pub use frame_source::{CamError, FrameGrabber, FrameReader, FrameSource, V4lCamera};
pub use params::*;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Anything which can report where the robot is in the frame.
pub trait PositionSource {
    /// The latest position of the robot, or [`Position::UNKNOWN`] before the first detection.
    fn current_position(&self) -> Position;

    /// Centre of the tracked frame.
    fn frame_center(&self) -> (u32, u32);
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Background subtraction needs a baseline image")]
    MissingBaseline,

    #[error(
        "Baseline is {baseline:?} but the region of interest is {roi:?}, recapture the baseline"
    )]
    BaselineMismatch { baseline: (u32, u32), roi: (u32, u32) },

    #[error("Blur size must be odd, got {0}")]
    EvenBlurSize(u32),

    #[error("Multi marker tracking needs at least one colour band")]
    NoColorBands,

    #[error("Invalid region of interest: {0}")]
    InvalidRoi(RoiError),

    #[error("Could not find the {0} boundary marker: {1}")]
    BoundaryMarker(&'static str, NoDetection),

    #[error("No frame was published within {0:?}")]
    NoFrame(Duration),

    #[error(transparent)]
    Camera(#[from] CamError),
}
