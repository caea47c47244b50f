//! # Tensegrity executable parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// Internal
use crate::{
    strut_ctrl::{LinkPolicy, PollPolicy},
    tracker::{CameraParams, DetectionStrategy, TrackingParams},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TensExecParams {
    /// The struts of the robot, in the order actuation vectors are given.
    pub struts: Vec<StrutParams>,

    /// Polling of the struts over the link.
    #[serde(default)]
    pub link: LinkPolicy,

    #[serde(default)]
    pub camera: CameraParams,

    pub tracking: TrackingParams,

    pub recenter: RecenterParams,

    /// Scale of the tracked frame.
    ///
    /// Units: pixels/centimetre
    pub pix_per_cm: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrutParams {
    /// Name the strut is selected by on the command line.
    pub name: String,

    /// Bluetooth address of the strut's controller.
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecenterParams {
    /// Distance from the frame centre within which the robot counts as centred.
    ///
    /// Units: pixels
    pub threshold_px: f64,

    /// How often to check the robot's position while waiting for it to be centred.
    pub poll: PollPolicy,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("At least one strut must be given")]
    NoStruts,

    #[error("Strut name {0} is used more than once")]
    NonUniqueStrutName(String),

    #[error("Strut address {0} is used more than once")]
    NonUniqueStrutAddress(String),

    #[error("Strut address {0} is not of the form XX:XX:XX:XX:XX:XX")]
    InvalidStrutAddress(String),

    #[error("Invalid region of interest: {0}")]
    InvalidRoi(String),

    #[error(
        "Region of interest ends at {bottom_right:?}, outside the {resolution:?} camera frame"
    )]
    RoiOutsideFrame {
        bottom_right: (u32, u32),
        resolution: (u32, u32),
    },

    #[error("The multi marker strategy needs at least one colour band")]
    NoColorBands,

    #[error("The subtraction blur size must be odd, got {0}")]
    EvenBlurSize(u32),

    #[error("No video devices given")]
    NoVideoDevices,

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("{0} must not be negative")]
    Negative(&'static str),

    #[error("{0} must be a finite number")]
    NotFinite(&'static str),

    #[error("Unknown strut {0}")]
    UnknownStrut(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TensExecParams {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.struts.is_empty() {
            return Err(ParamsError::NoStruts);
        }

        for (i, strut) in self.struts.iter().enumerate() {
            if !is_ble_address(&strut.address) {
                return Err(ParamsError::InvalidStrutAddress(strut.address.clone()));
            }

            if self.struts[..i].iter().any(|s| s.name == strut.name) {
                return Err(ParamsError::NonUniqueStrutName(strut.name.clone()));
            }

            if self.struts[..i]
                .iter()
                .any(|s| s.address.eq_ignore_ascii_case(&strut.address))
            {
                return Err(ParamsError::NonUniqueStrutAddress(strut.address.clone()));
            }
        }

        self.tracking
            .region_of_interest
            .validate()
            .map_err(|e| ParamsError::InvalidRoi(e.to_string()))?;

        // A region found from markers always lies within the frame it was found in
        let bottom_right = self.tracking.region_of_interest.bottom_right;
        let resolution = self.camera.resolution;
        if self.tracking.boundary_markers.is_none()
            && (bottom_right.0 > resolution.0 || bottom_right.1 > resolution.1)
        {
            return Err(ParamsError::RoiOutsideFrame {
                bottom_right,
                resolution,
            });
        }

        if self.tracking.strategy == DetectionStrategy::MultiMarker
            && self.tracking.color_bands.is_empty()
        {
            return Err(ParamsError::NoColorBands);
        }

        if self.tracking.subtraction.blur_size % 2 == 0 {
            return Err(ParamsError::EvenBlurSize(self.tracking.subtraction.blur_size));
        }

        if self.camera.video_devices.is_empty() {
            return Err(ParamsError::NoVideoDevices);
        }

        positive("pix_per_cm", self.pix_per_cm)?;
        positive("camera.frame_timeout_s", self.camera.frame_timeout_s)?;
        positive("recenter.threshold_px", self.recenter.threshold_px)?;

        // Converted to a Duration, which panics on non-finite seconds
        let settle = self.tracking.baseline_settle_s;
        if !settle.is_finite() {
            return Err(ParamsError::NotFinite("tracking.baseline_settle_s"));
        }
        if settle < 0.0 {
            return Err(ParamsError::Negative("tracking.baseline_settle_s"));
        }

        Ok(())
    }

    /// The struts with the given names, in the order given. All struts if `names` is empty.
    pub fn select_struts(&self, names: &[String]) -> Result<Vec<StrutParams>, ParamsError> {
        if names.is_empty() {
            return Ok(self.struts.clone());
        }

        names
            .iter()
            .map(|n| {
                self.struts
                    .iter()
                    .find(|s| &s.name == n)
                    .cloned()
                    .ok_or_else(|| ParamsError::UnknownStrut(n.clone()))
            })
            .collect()
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if !value.is_finite() {
        Err(ParamsError::NotFinite(name))
    } else if value <= 0.0 {
        Err(ParamsError::NotPositive(name))
    } else {
        Ok(())
    }
}

fn is_ble_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracker::BoundaryMarkers;

    const PARAMS: &str = r#"
        pix_per_cm = 3.5

        [[struts]]
        name = "s0"
        address = "CA:A3:11:A7:81:FD"

        [[struts]]
        name = "s1"
        address = "E7:50:27:0F:4A:CB"

        [[struts]]
        name = "s2"
        address = "EE:96:30:9E:CD:9D"

        [link.boot]
        interval_ms = 1000

        [link.handshake]
        interval_ms = 500
        max_attempts = 120

        [link.completion]
        interval_ms = 1000

        [tracking]
        strategy = "MultiMarker"
        region_of_interest = { upper_left = [100, 40], bottom_right = [540, 440] }
        color_bands = [
            { low = [0, 120, 0], high = [9, 255, 255] },
            { low = [100, 120, 0], high = [109, 255, 255] },
            { low = [160, 120, 0], high = [170, 255, 255] },
        ]

        [recenter]
        threshold_px = 115.0
        poll = { interval_ms = 2000 }
    "#;

    fn params() -> TensExecParams {
        util::params::from_str(PARAMS).unwrap()
    }

    #[test]
    fn test_parse_and_validate() {
        let p = params();
        p.are_valid().unwrap();

        assert_eq!(p.struts.len(), 3);
        assert_eq!(p.link.handshake.max_attempts, Some(120));
        assert_eq!(p.link.completion.max_attempts, None);
        assert_eq!(p.tracking.color_bands.len(), 3);
        assert_eq!(p.tracking.threshold.blur_size, 64);
        assert_eq!(p.tracking.subtraction.blur_size, 7);
        assert_eq!(p.tracking.baseline_settle_s, 10.0);
        assert_eq!(p.camera.resolution, (640, 480));
        assert_eq!(p.tracking.region_of_interest.center(), (220, 200));
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params();
        p.struts[2].address = "ca:a3:11:a7:81:fd".into();
        assert_eq!(
            p.are_valid(),
            Err(ParamsError::NonUniqueStrutAddress("ca:a3:11:a7:81:fd".into()))
        );

        let mut p = params();
        p.struts[1].name = "s0".into();
        assert_eq!(p.are_valid(), Err(ParamsError::NonUniqueStrutName("s0".into())));

        let mut p = params();
        p.struts[0].address = "CA:A3:11:A7:81".into();
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidStrutAddress(_))));

        let mut p = params();
        p.tracking.color_bands.clear();
        assert_eq!(p.are_valid(), Err(ParamsError::NoColorBands));

        let mut p = params();
        p.tracking.region_of_interest.bottom_right = (50, 50);
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidRoi(_))));

        let mut p = params();
        p.tracking.baseline_settle_s = -1.0;
        assert_eq!(
            p.are_valid(),
            Err(ParamsError::Negative("tracking.baseline_settle_s"))
        );

        let mut p = params();
        p.tracking.baseline_settle_s = f64::INFINITY;
        assert_eq!(
            p.are_valid(),
            Err(ParamsError::NotFinite("tracking.baseline_settle_s"))
        );

        let mut p = params();
        p.tracking.baseline_settle_s = f64::NAN;
        assert_eq!(
            p.are_valid(),
            Err(ParamsError::NotFinite("tracking.baseline_settle_s"))
        );

        let mut p = params();
        p.camera.frame_timeout_s = 0.0;
        assert_eq!(
            p.are_valid(),
            Err(ParamsError::NotPositive("camera.frame_timeout_s"))
        );

        let mut p = params();
        p.pix_per_cm = f64::NAN;
        assert_eq!(p.are_valid(), Err(ParamsError::NotFinite("pix_per_cm")));

        let mut p = params();
        p.struts.clear();
        assert_eq!(p.are_valid(), Err(ParamsError::NoStruts));
    }

    #[test]
    fn test_roi_must_fit_camera_frame() {
        let mut p = params();
        p.camera.resolution = (320, 240);
        assert_eq!(
            p.are_valid(),
            Err(ParamsError::RoiOutsideFrame {
                bottom_right: (540, 440),
                resolution: (320, 240),
            })
        );

        // The configured region is replaced when boundary markers are used
        let band = p.tracking.color_bands[0];
        p.tracking.boundary_markers = Some(BoundaryMarkers {
            upper_left: band,
            bottom_right: band,
        });
        p.are_valid().unwrap();

        let mut p = params();
        p.camera.resolution = (540, 440);
        p.are_valid().unwrap();
    }

    #[test]
    fn test_parse_boundary_markers() {
        let toml = format!(
            "{}{}",
            PARAMS,
            r#"
        [tracking.boundary_markers]
        upper_left = { low = [0, 120, 50], high = [9, 255, 255] }
        bottom_right = { low = [110, 120, 50], high = [130, 255, 255] }
        "#
        );
        let p: TensExecParams = util::params::from_str(&toml).unwrap();

        let markers = p.tracking.boundary_markers.unwrap();
        assert_eq!(markers.upper_left.high, comms_if::eqpt::cam::Hsv([9, 255, 255]));
        assert_eq!(markers.bottom_right.low, comms_if::eqpt::cam::Hsv([110, 120, 50]));
        assert!(params().tracking.boundary_markers.is_none());
    }

    #[test]
    fn test_select_struts() {
        let p = params();

        let all = p.select_struts(&[]).unwrap();
        assert_eq!(all.len(), 3);

        let some = p.select_struts(&["s2".into(), "s0".into()]).unwrap();
        assert_eq!(some[0].address, "EE:96:30:9E:CD:9D");
        assert_eq!(some[1].address, "CA:A3:11:A7:81:FD");

        assert_eq!(
            p.select_struts(&["s9".into()]).unwrap_err(),
            ParamsError::UnknownStrut("s9".into())
        );
    }
}
