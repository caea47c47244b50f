//! # Detection strategies
//!
//! Each strategy turns a single cropped frame into the position of the robot, or reports that it
//! could not find the robot in that frame. What to do about a missed detection is left to the
//! caller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod multi_marker;
mod subtraction;
mod threshold;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;

use comms_if::eqpt::cam::{Position, RegionOfInterest};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{imgproc::Blob, params::TrackingParams, TrackerError};

pub use multi_marker::MultiMarkerDetector;
pub use subtraction::{BaselineImage, SubtractionDetector};
pub use threshold::ThresholdDetector;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A way of finding the robot in a frame.
pub trait Detector: Send {
    fn detect(&self, frame: &RgbImage) -> Result<Position, NoDetection>;

    fn strategy(&self) -> DetectionStrategy;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStrategy {
    /// Largest dark (or bright) region after a heavy blur
    Threshold,

    /// Difference against a baseline image of the empty scene
    BackgroundSubtraction,

    /// Mean of the centroids of a set of coloured markers
    MultiMarker,
}

/// The robot was not found in a frame.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NoDetection {
    #[error("No foreground region in the frame")]
    NoBlob,

    #[error("Foreground region has zero area")]
    DegenerateBlob,

    #[error("Frame is {frame:?} but the baseline is {baseline:?}")]
    SizeMismatch {
        frame: (u32, u32),
        baseline: (u32, u32),
    },

    #[error("Marker {0} not visible")]
    MarkerMissing(usize),
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown detection strategy {0:?}, expected one of threshold, subtraction, multi_marker")]
pub struct ParseStrategyError(String);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FromStr for DetectionStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "threshold" => Ok(DetectionStrategy::Threshold),
            "subtraction" | "background_subtraction" => {
                Ok(DetectionStrategy::BackgroundSubtraction)
            }
            "multi_marker" | "multimarker" => Ok(DetectionStrategy::MultiMarker),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

impl std::fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the detector selected in the parameters.
///
/// Background subtraction needs a baseline captured over the same region of interest.
pub fn build_detector(
    params: &TrackingParams,
    roi: &RegionOfInterest,
    baseline: Option<BaselineImage>,
) -> Result<Box<dyn Detector>, TrackerError> {
    Ok(match params.strategy {
        DetectionStrategy::Threshold => Box::new(ThresholdDetector::new(params.threshold)),
        DetectionStrategy::BackgroundSubtraction => {
            let baseline = baseline.ok_or(TrackerError::MissingBaseline)?;
            Box::new(SubtractionDetector::new(baseline, roi, params.subtraction)?)
        }
        DetectionStrategy::MultiMarker => Box::new(MultiMarkerDetector::new(
            params.color_bands.clone(),
            params.marker_median_size,
        )?),
    })
}

fn blob_centroid(blob: Option<Blob>) -> Result<Position, NoDetection> {
    blob.ok_or(NoDetection::NoBlob)?
        .centroid()
        .ok_or(NoDetection::DegenerateBlob)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::tracker::params::{SubtractionParams, ThresholdParams};
    use comms_if::eqpt::cam::ColorBand;
    use image::Rgb;

    /// Frame of the given colour with filled squares drawn on it.
    pub(crate) fn frame_with_squares(
        w: u32,
        h: u32,
        bg: Rgb<u8>,
        squares: &[((u32, u32), u32, Rgb<u8>)],
    ) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            squares
                .iter()
                .find(|((x0, y0), side, _)| x >= *x0 && x < x0 + side && y >= *y0 && y < y0 + side)
                .map(|(_, _, c)| *c)
                .unwrap_or(bg)
        })
    }

    pub(crate) fn assert_near(p: Position, x: f64, y: f64) {
        assert!(
            (p.x - x).abs() <= 1.0 && (p.y - y).abs() <= 1.0,
            "{} is not near ({}, {})",
            p,
            x,
            y
        );
    }

    fn params(strategy: DetectionStrategy) -> TrackingParams {
        TrackingParams {
            strategy,
            region_of_interest: RegionOfInterest::full_frame(60, 40),
            boundary_markers: None,
            color_bands: vec![],
            threshold: ThresholdParams::default(),
            subtraction: SubtractionParams::default(),
            marker_median_size: 3,
            baseline_settle_s: 0.0,
        }
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "threshold".parse::<DetectionStrategy>().unwrap(),
            DetectionStrategy::Threshold
        );
        assert_eq!(
            "Subtraction".parse::<DetectionStrategy>().unwrap(),
            DetectionStrategy::BackgroundSubtraction
        );
        assert_eq!(
            "multi_marker".parse::<DetectionStrategy>().unwrap(),
            DetectionStrategy::MultiMarker
        );
        assert!("optical_flow".parse::<DetectionStrategy>().is_err());
    }

    #[test]
    fn test_build_detector() {
        let roi = RegionOfInterest::full_frame(60, 40);

        let d = build_detector(&params(DetectionStrategy::Threshold), &roi, None).unwrap();
        assert_eq!(d.strategy(), DetectionStrategy::Threshold);

        assert!(matches!(
            build_detector(&params(DetectionStrategy::BackgroundSubtraction), &roi, None),
            Err(TrackerError::MissingBaseline)
        ));

        assert!(matches!(
            build_detector(&params(DetectionStrategy::MultiMarker), &roi, None),
            Err(TrackerError::NoColorBands)
        ));

        let mut p = params(DetectionStrategy::MultiMarker);
        p.color_bands = vec![ColorBand::new([0, 120, 0], [9, 255, 255])];
        let d = build_detector(&p, &roi, None).unwrap();
        assert_eq!(d.strategy(), DetectionStrategy::MultiMarker);
    }
}
