//! Parameters for the position tracker

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::cam::{ColorBand, RegionOfInterest};
use serde::{Deserialize, Serialize};

use super::detect::DetectionStrategy;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for tracking the robot in the camera frame.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingParams {
    /// The detection strategy to run.
    pub strategy: DetectionStrategy,

    /// Crop applied to every captured frame.
    ///
    /// Units: pixels,
    /// Frame: Uncropped camera image
    pub region_of_interest: RegionOfInterest,

    /// Markers placed at the corners of the test area.
    ///
    /// If given, the region of interest is found from these at startup, replacing
    /// `region_of_interest`.
    #[serde(default)]
    pub boundary_markers: Option<BoundaryMarkers>,

    /// Colour bands of the markers, in HSV with hue in `[0, 180)`.
    ///
    /// Only used by the multi marker strategy.
    #[serde(default)]
    pub color_bands: Vec<ColorBand>,

    #[serde(default)]
    pub threshold: ThresholdParams,

    #[serde(default)]
    pub subtraction: SubtractionParams,

    /// Median filter size applied to the HSV image before masking markers.
    #[serde(default = "default_marker_median_size")]
    pub marker_median_size: u32,

    /// Time given to the operator to place the robot after the baseline is captured.
    ///
    /// Units: seconds
    #[serde(default = "default_baseline_settle_s")]
    pub baseline_settle_s: f64,
}

/// Colour bands of the two markers bounding the test area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BoundaryMarkers {
    pub upper_left: ColorBand,
    pub bottom_right: ColorBand,
}

/// Parameters of the camera.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraParams {
    /// Video devices to try, in order.
    pub video_devices: Vec<String>,

    /// Capture resolution.
    ///
    /// Units: pixels
    pub resolution: (u32, u32),

    /// Frame interval as a fraction `(numerator, denominator)`.
    ///
    /// Units: seconds
    pub interval: (u32, u32),

    /// How long to wait for the first frame before giving up on the camera.
    ///
    /// Units: seconds
    #[serde(default = "default_frame_timeout_s")]
    pub frame_timeout_s: f64,
}

/// Parameters of the threshold strategy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ThresholdParams {
    /// Box blur size applied to the grayscale frame.
    ///
    /// Units: pixels
    pub blur_size: u32,

    /// Grayscale cutoff.
    pub cutoff: u8,

    /// If true pixels darker than the cutoff are foreground, otherwise brighter ones are.
    pub invert: bool,
}

/// Parameters of the background subtraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SubtractionParams {
    /// Size of the box and median blurs applied to every frame and the baseline. Must be odd.
    ///
    /// Units: pixels
    pub blur_size: u32,

    /// Residuals above this are discarded as noise from the background getting darker.
    pub clip_above: u8,

    /// Residuals above this are foreground.
    pub cutoff: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            video_devices: vec!["/dev/video0".into()],
            resolution: (640, 480),
            interval: (1, 30),
            frame_timeout_s: default_frame_timeout_s(),
        }
    }
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            blur_size: 64,
            cutoff: 100,
            invert: true,
        }
    }
}

impl Default for SubtractionParams {
    fn default() -> Self {
        Self {
            blur_size: 7,
            clip_above: 200,
            cutoff: 25,
        }
    }
}

fn default_marker_median_size() -> u32 {
    3
}

fn default_baseline_settle_s() -> f64 {
    10.0
}

fn default_frame_timeout_s() -> f64 {
    5.0
}
