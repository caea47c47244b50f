//! Threshold detection
//!
//! Blur the frame heavily so the robot becomes a single soft region, threshold it and take the
//! first region found scanning from the top of the frame.

use comms_if::eqpt::cam::Position;
use image::RgbImage;

use super::{blob_centroid, DetectionStrategy, Detector, NoDetection};
use crate::tracker::{
    imgproc::{self, ThresholdKind},
    params::ThresholdParams,
};

pub struct ThresholdDetector {
    params: ThresholdParams,
}

impl ThresholdDetector {
    pub fn new(params: ThresholdParams) -> Self {
        Self { params }
    }
}

impl Detector for ThresholdDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Position, NoDetection> {
        let gray = imgproc::grayscale(frame);
        let blurred = imgproc::box_blur(&gray, self.params.blur_size);

        let kind = if self.params.invert {
            ThresholdKind::BinaryInv
        } else {
            ThresholdKind::Binary
        };
        let mask = imgproc::threshold(&blurred, self.params.cutoff, kind);

        blob_centroid(imgproc::find_blobs(&mask).into_iter().next())
    }

    fn strategy(&self) -> DetectionStrategy {
        DetectionStrategy::Threshold
    }
}
