//! Multi marker detection
//!
//! The robot carries one coloured marker per band. The position is the mean of the marker
//! centroids, so every marker must be visible for a detection.

use comms_if::eqpt::cam::{ColorBand, Position};
use image::RgbImage;

use super::{blob_centroid, DetectionStrategy, Detector, NoDetection};
use crate::tracker::{imgproc, TrackerError};

pub struct MultiMarkerDetector {
    bands: Vec<ColorBand>,
    median_size: u32,
}

impl MultiMarkerDetector {
    pub fn new(bands: Vec<ColorBand>, median_size: u32) -> Result<Self, TrackerError> {
        if bands.is_empty() {
            return Err(TrackerError::NoColorBands);
        }

        Ok(Self { bands, median_size })
    }

    /// Centroid of the largest region inside each band, in band order.
    pub fn marker_positions(&self, frame: &RgbImage) -> Vec<Result<Position, NoDetection>> {
        let hsv = imgproc::median_blur_hsv(&imgproc::hsv_image(frame), self.median_size);

        self.bands
            .iter()
            .map(|band| {
                let mask = imgproc::in_range(&hsv, band);
                blob_centroid(imgproc::largest_blob(imgproc::find_blobs(&mask)))
            })
            .collect()
    }
}

impl Detector for MultiMarkerDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Position, NoDetection> {
        let markers = self
            .marker_positions(frame)
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.map_err(|_| NoDetection::MarkerMissing(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Position::mean(&markers).ok_or(NoDetection::NoBlob)
    }

    fn strategy(&self) -> DetectionStrategy {
        DetectionStrategy::MultiMarker
    }
}
