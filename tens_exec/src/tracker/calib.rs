//! # Tracker calibration
//!
//! One-off steps run before any trials: finding the region of interest from a pair of boundary
//! markers and capturing the background subtraction baseline. The results are recorded in the
//! session as a [`Calibration`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::Arc, time::Duration};

use comms_if::eqpt::cam::{ColorBand, RegionOfInterest};
use image::RgbImage;
use log::info;
use serde::Serialize;

use super::{
    detect::{BaselineImage, DetectionStrategy, MultiMarkerDetector},
    frame_source::FrameSnapshot,
    BoundaryMarkers, FrameGrabber, FrameReader, TrackerError, TrackingParams,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const FRAME_POLL: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Record of how tracking was set up for a session.
#[derive(Debug, Clone, Serialize)]
pub struct Calibration {
    pub strategy: DetectionStrategy,
    pub region_of_interest: RegionOfInterest,
    pub frame_center: (u32, u32),
    pub color_bands: Vec<ColorBand>,

    /// Markers the region of interest was found from, `None` if it was configured directly.
    pub boundary_markers: Option<BoundaryMarkers>,

    /// Session time at which the baseline was captured, if one was.
    ///
    /// Units: seconds
    pub baseline_captured_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Calibration {
    pub fn new(params: &TrackingParams, baseline_captured_s: Option<f64>) -> Self {
        Self {
            strategy: params.strategy,
            region_of_interest: params.region_of_interest,
            frame_center: params.region_of_interest.center(),
            color_bands: params.color_bands.clone(),
            boundary_markers: params.boundary_markers,
            baseline_captured_s,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find the region of interest spanned by two coloured markers in an uncropped frame.
pub fn roi_from_markers(
    frame: &RgbImage,
    upper_left: &ColorBand,
    bottom_right: &ColorBand,
    median_size: u32,
) -> Result<RegionOfInterest, TrackerError> {
    let detector = MultiMarkerDetector::new(vec![*upper_left, *bottom_right], median_size)?;
    let mut markers = detector.marker_positions(frame).into_iter();

    let ul = match markers.next() {
        Some(Ok(p)) => p,
        Some(Err(e)) => return Err(TrackerError::BoundaryMarker("upper left", e)),
        None => return Err(TrackerError::NoColorBands),
    };
    let br = match markers.next() {
        Some(Ok(p)) => p,
        Some(Err(e)) => return Err(TrackerError::BoundaryMarker("bottom right", e)),
        None => return Err(TrackerError::NoColorBands),
    };

    let roi = RegionOfInterest::new(
        (ul.x.round() as u32, ul.y.round() as u32),
        (br.x.round() as u32, br.y.round() as u32),
    )
    .map_err(TrackerError::InvalidRoi)?;

    info!("Region of interest from markers: {:?}", roi);

    Ok(roi)
}

/// Grab one uncropped frame from the camera and find the region of interest in it.
///
/// Must be called before the camera is handed to a [`FrameSource`](super::FrameSource).
pub fn calibrate_roi<G: FrameGrabber>(
    camera: &mut G,
    markers: &BoundaryMarkers,
    median_size: u32,
) -> Result<RegionOfInterest, TrackerError> {
    let frame = camera.grab()?;
    roi_from_markers(&frame, &markers.upper_left, &markers.bottom_right, median_size)
}

/// Block until the first frame is published.
pub fn await_first_frame(
    frames: &FrameReader,
    timeout: Duration,
) -> Result<Arc<FrameSnapshot>, TrackerError> {
    frames
        .wait_for_frame(FRAME_POLL, timeout)
        .ok_or(TrackerError::NoFrame(timeout))
}

/// Block until a frame is available and preprocess it into a baseline.
///
/// The scene must be empty when this is called.
pub fn capture_baseline(
    frames: &FrameReader,
    blur_size: u32,
    timeout: Duration,
) -> Result<BaselineImage, TrackerError> {
    let frame = await_first_frame(frames, timeout)?;
    let baseline = BaselineImage::from_frame(&frame.image, blur_size);

    info!(
        "Baseline captured from frame {} ({:?})",
        frame.seq,
        baseline.dimensions()
    );

    Ok(baseline)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracker::{
        detect::{test::frame_with_squares, NoDetection},
        CamError, SubtractionParams, ThresholdParams,
    };
    use image::Rgb;

    const TIMEOUT: Duration = Duration::from_secs(1);

    const RED: ColorBand = ColorBand {
        low: comms_if::eqpt::cam::Hsv([0, 120, 50]),
        high: comms_if::eqpt::cam::Hsv([9, 255, 255]),
    };
    const BLUE: ColorBand = ColorBand {
        low: comms_if::eqpt::cam::Hsv([110, 120, 50]),
        high: comms_if::eqpt::cam::Hsv([130, 255, 255]),
    };

    #[test]
    fn test_roi_from_markers() {
        let frame = frame_with_squares(
            200,
            150,
            Rgb([90, 90, 90]),
            &[
                ((20, 10), 9, Rgb([255, 0, 0])),
                ((160, 120), 9, Rgb([0, 0, 255])),
            ],
        );

        let roi = roi_from_markers(&frame, &RED, &BLUE, 3).unwrap();
        assert_eq!(roi, RegionOfInterest::new((24, 14), (164, 124)).unwrap());
    }

    #[test]
    fn test_roi_from_swapped_markers() {
        let frame = frame_with_squares(
            200,
            150,
            Rgb([90, 90, 90]),
            &[
                ((160, 120), 9, Rgb([255, 0, 0])),
                ((20, 10), 9, Rgb([0, 0, 255])),
            ],
        );

        assert!(matches!(
            roi_from_markers(&frame, &RED, &BLUE, 3),
            Err(TrackerError::InvalidRoi(_))
        ));
    }

    #[test]
    fn test_roi_missing_marker() {
        let red_square = ((20, 10), 9, Rgb([255, 0, 0]));
        let frame = frame_with_squares(100, 100, Rgb([90, 90, 90]), &[red_square]);

        assert!(matches!(
            roi_from_markers(&frame, &RED, &BLUE, 3),
            Err(TrackerError::BoundaryMarker("bottom right", NoDetection::NoBlob))
        ));
    }

    #[test]
    fn test_capture_baseline() {
        let frames = FrameReader::new(RegionOfInterest::full_frame(40, 30));
        frames.publish(RgbImage::from_pixel(40, 30, Rgb([200, 200, 200])));

        let baseline = capture_baseline(&frames, 7, TIMEOUT).unwrap();
        assert_eq!(baseline.dimensions(), (40, 30));
        assert!(baseline.image().pixels().all(|p| p.0[0] == 200));
    }

    #[test]
    fn test_capture_baseline_without_frames() {
        let frames = FrameReader::new(RegionOfInterest::full_frame(40, 30));
        let timeout = Duration::from_millis(30);

        assert!(matches!(
            capture_baseline(&frames, 7, timeout),
            Err(TrackerError::NoFrame(t)) if t == timeout
        ));
        assert!(matches!(
            await_first_frame(&frames, timeout),
            Err(TrackerError::NoFrame(_))
        ));
    }

    #[test]
    fn test_calibrate_roi_from_camera() {
        let markers = BoundaryMarkers {
            upper_left: RED,
            bottom_right: BLUE,
        };
        let mut camera = || {
            Ok::<_, CamError>(frame_with_squares(
                200,
                150,
                Rgb([90, 90, 90]),
                &[
                    ((20, 10), 9, Rgb([255, 0, 0])),
                    ((160, 120), 9, Rgb([0, 0, 255])),
                ],
            ))
        };

        let roi = calibrate_roi(&mut camera, &markers, 3).unwrap();
        assert_eq!(roi, RegionOfInterest::new((24, 14), (164, 124)).unwrap());

        let mut broken = || {
            Err::<RgbImage, _>(CamError::Capture(std::io::Error::new(
                std::io::ErrorKind::Other,
                "select timeout",
            )))
        };
        assert!(matches!(
            calibrate_roi(&mut broken, &markers, 3),
            Err(TrackerError::Camera(CamError::Capture(_)))
        ));
    }

    #[test]
    fn test_calibration_record() {
        let params = TrackingParams {
            strategy: DetectionStrategy::BackgroundSubtraction,
            region_of_interest: RegionOfInterest::new((100, 50), (500, 350)).unwrap(),
            boundary_markers: Some(BoundaryMarkers {
                upper_left: RED,
                bottom_right: BLUE,
            }),
            color_bands: vec![RED],
            threshold: ThresholdParams::default(),
            subtraction: SubtractionParams::default(),
            marker_median_size: 3,
            baseline_settle_s: 10.0,
        };

        let calib = Calibration::new(&params, Some(1.5));
        assert_eq!(calib.frame_center, (200, 150));

        let json = serde_json::to_value(&calib).unwrap();
        assert_eq!(json["strategy"], "BackgroundSubtraction");
        assert_eq!(json["baseline_captured_s"], 1.5);
        assert_eq!(json["boundary_markers"]["upper_left"]["low"], serde_json::json!([0, 120, 50]));
    }
}
