//! Background subtraction detection
//!
//! The robot is whatever has become darker than the baseline image of the empty scene.

use comms_if::eqpt::cam::{Position, RegionOfInterest};
use image::{GrayImage, RgbImage};

use super::{blob_centroid, DetectionStrategy, Detector, NoDetection};
use crate::tracker::{
    imgproc::{self, ThresholdKind},
    params::SubtractionParams,
    TrackerError,
};

/// Preprocessed image of the scene without the robot in it.
#[derive(Debug, Clone)]
pub struct BaselineImage {
    image: GrayImage,
}

pub struct SubtractionDetector {
    baseline: BaselineImage,
    params: SubtractionParams,
}

impl BaselineImage {
    /// Preprocess a cropped frame into a baseline.
    pub fn from_frame(frame: &RgbImage, blur_size: u32) -> Self {
        Self {
            image: preprocess(frame, blur_size),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

impl SubtractionDetector {
    /// Create the detector, checking the baseline was captured over the given region.
    pub fn new(
        baseline: BaselineImage,
        roi: &RegionOfInterest,
        params: SubtractionParams,
    ) -> Result<Self, TrackerError> {
        if params.blur_size % 2 == 0 {
            return Err(TrackerError::EvenBlurSize(params.blur_size));
        }

        let roi_dims = (roi.width(), roi.height());
        if baseline.dimensions() != roi_dims {
            return Err(TrackerError::BaselineMismatch {
                baseline: baseline.dimensions(),
                roi: roi_dims,
            });
        }

        Ok(Self { baseline, params })
    }
}

impl Detector for SubtractionDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Position, NoDetection> {
        if frame.dimensions() != self.baseline.dimensions() {
            return Err(NoDetection::SizeMismatch {
                frame: frame.dimensions(),
                baseline: self.baseline.dimensions(),
            });
        }

        let current = preprocess(frame, self.params.blur_size);
        let residual = imgproc::wrapping_sub(&self.baseline.image, &current);

        let clipped =
            imgproc::threshold(&residual, self.params.clip_above, ThresholdKind::ToZeroInv);
        let mask = imgproc::threshold(&clipped, self.params.cutoff, ThresholdKind::Binary);

        blob_centroid(imgproc::largest_blob(imgproc::find_blobs(&mask)))
    }

    fn strategy(&self) -> DetectionStrategy {
        DetectionStrategy::BackgroundSubtraction
    }
}

fn preprocess(frame: &RgbImage, blur_size: u32) -> GrayImage {
    let gray = imgproc::grayscale(frame);
    let blurred = imgproc::box_blur(&gray, blur_size);
    imgproc::median_blur(&blurred, blur_size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracker::detect::test::{assert_near, frame_with_squares};
    use image::Rgb;

    const BG: Rgb<u8> = Rgb([200, 200, 200]);

    fn detector(w: u32, h: u32) -> SubtractionDetector {
        let empty = RgbImage::from_pixel(w, h, BG);
        SubtractionDetector::new(
            BaselineImage::from_frame(&empty, 7),
            &RegionOfInterest::full_frame(w, h),
            SubtractionParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_inserted_blob_centroid() {
        let detector = detector(120, 90);
        let frame = frame_with_squares(120, 90, BG, &[((70, 20), 24, Rgb([30, 30, 30]))]);

        assert_near(detector.detect(&frame).unwrap(), 81.5, 31.5);
    }

    #[test]
    fn test_largest_change_wins() {
        let detector = detector(120, 90);
        let frame = frame_with_squares(
            120,
            90,
            BG,
            &[
                ((10, 10), 12, Rgb([40, 40, 40])),
                ((60, 50), 30, Rgb([40, 40, 40])),
            ],
        );

        assert_near(detector.detect(&frame).unwrap(), 74.5, 64.5);
    }

    #[test]
    fn test_brighter_change_ignored() {
        let detector = detector(80, 60);
        let frame = frame_with_squares(80, 60, BG, &[((20, 20), 20, Rgb([255, 255, 255]))]);

        assert_eq!(detector.detect(&frame), Err(NoDetection::NoBlob));
    }

    #[test]
    fn test_size_mismatch() {
        let detector = detector(80, 60);
        let frame = RgbImage::from_pixel(81, 60, BG);

        assert_eq!(
            detector.detect(&frame),
            Err(NoDetection::SizeMismatch {
                frame: (81, 60),
                baseline: (80, 60)
            })
        );
    }

    #[test]
    fn test_baseline_must_match_roi() {
        let empty = RgbImage::from_pixel(80, 60, BG);
        let result = SubtractionDetector::new(
            BaselineImage::from_frame(&empty, 7),
            &RegionOfInterest::new((10, 10), (70, 50)).unwrap(),
            SubtractionParams::default(),
        );

        assert!(matches!(
            result,
            Err(TrackerError::BaselineMismatch {
                baseline: (80, 60),
                roi: (60, 40)
            })
        ));
    }

    #[test]
    fn test_even_blur_rejected() {
        let empty = RgbImage::from_pixel(80, 60, BG);
        let result = SubtractionDetector::new(
            BaselineImage::from_frame(&empty, 7),
            &RegionOfInterest::full_frame(80, 60),
            SubtractionParams {
                blur_size: 8,
                ..SubtractionParams::default()
            },
        );

        assert!(matches!(result, Err(TrackerError::EvenBlurSize(8))));
    }
}
