//! # Position estimator
//!
//! Runs a [`Detector`] over every new frame from a [`FrameReader`] in a background thread. The
//! last good position is held whenever detection fails, so readers always get the most recent
//! known position of the robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use arc_swap::{ArcSwap, ArcSwapOption};
use comms_if::eqpt::cam::Position;
use image::{Rgb, RgbImage};
use log::{debug, info, warn};

use super::{imgproc, Detector, FrameReader, PositionSource};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time to wait when there is no new frame to process.
const IDLE_POLL: Duration = Duration::from_millis(1);

const CROSS_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);

const CIRCLE_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);

const CROSS_HALF_LEN: i64 = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct PositionEstimator {
    position: Arc<ArcSwap<Position>>,
    annotated: Arc<ArcSwapOption<RgbImage>>,
    processed_seq: Arc<AtomicU64>,
    frame_center: (u32, u32),

    shutdown: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PositionEstimator {
    /// Start estimating the position from the frames published to `frames`.
    ///
    /// The annotated frame shows a circle of `recenter_radius` around the frame centre.
    pub fn spawn(frames: FrameReader, detector: Box<dyn Detector>, recenter_radius: u32) -> Self {
        let position = Arc::new(ArcSwap::from_pointee(Position::UNKNOWN));
        let annotated = Arc::new(ArcSwapOption::empty());
        let processed_seq = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let frame_center = frames.roi().center();

        let worker = Worker {
            frames,
            detector,
            position: position.clone(),
            annotated: annotated.clone(),
            processed_seq: processed_seq.clone(),
            shutdown: shutdown.clone(),
            frame_center,
            recenter_radius,
        };

        let join_handle = thread::spawn(move || worker.run());

        Self {
            position,
            annotated,
            processed_seq,
            frame_center,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// The latest frame with the detection drawn on it, if one has been processed.
    pub fn annotated_frame(&self) -> Option<Arc<RgbImage>> {
        self.annotated.load_full()
    }

    /// Sequence number of the last frame the detector ran on.
    pub fn processed_seq(&self) -> u64 {
        self.processed_seq.load(Ordering::Acquire)
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                warn!("Position estimator thread panicked");
            }
        }
    }
}

impl PositionSource for PositionEstimator {
    fn current_position(&self) -> Position {
        **self.position.load()
    }

    fn frame_center(&self) -> (u32, u32) {
        self.frame_center
    }
}

impl Drop for PositionEstimator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the estimator thread.
struct Worker {
    frames: FrameReader,
    detector: Box<dyn Detector>,
    position: Arc<ArcSwap<Position>>,
    annotated: Arc<ArcSwapOption<RgbImage>>,
    processed_seq: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    frame_center: (u32, u32),
    recenter_radius: u32,
}

impl Worker {
    fn run(self) {
        let mut last_seq = 0;
        let mut tracking_lost = false;

        info!("Position estimator started ({})", self.detector.strategy());

        while !self.shutdown.load(Ordering::Relaxed) {
            let frame = match self.frames.latest_frame() {
                Some(f) if f.seq != last_seq => f,
                _ => {
                    thread::sleep(IDLE_POLL);
                    continue;
                }
            };
            last_seq = frame.seq;

            let mut annotated = frame.image.clone();
            imgproc::draw_circle(
                &mut annotated,
                self.frame_center,
                self.recenter_radius,
                CIRCLE_COLOUR,
            );

            match self.detector.detect(&frame.image) {
                Ok(p) => {
                    if tracking_lost {
                        info!("Tracking recovered at {}", p);
                        tracking_lost = false;
                    }
                    imgproc::draw_cross(&mut annotated, &p, CROSS_HALF_LEN, CROSS_COLOUR);
                    self.position.store(Arc::new(p));
                }
                Err(e) => {
                    if !tracking_lost {
                        warn!(
                            "Lost track of the robot ({}), holding {}",
                            e,
                            **self.position.load()
                        );
                        tracking_lost = true;
                    }
                }
            }

            self.annotated.store(Some(Arc::new(annotated)));
            self.processed_seq.store(frame.seq, Ordering::Release);
        }

        debug!("Position estimator stopped");
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracker::{
        detect::{
            test::{assert_near, frame_with_squares},
            BaselineImage, SubtractionDetector, ThresholdDetector,
        },
        SubtractionParams, ThresholdParams,
    };
    use comms_if::eqpt::cam::RegionOfInterest;
    use std::time::Instant;

    const BG: Rgb<u8> = Rgb([200, 200, 200]);
    const FG: Rgb<u8> = Rgb([20, 20, 20]);

    fn wait_for_seq(estimator: &PositionEstimator, seq: u64) {
        let start = Instant::now();
        while estimator.processed_seq() < seq {
            assert!(start.elapsed() < Duration::from_secs(10), "estimator stalled");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn threshold_detector() -> Box<dyn Detector> {
        Box::new(ThresholdDetector::new(ThresholdParams {
            blur_size: 5,
            cutoff: 100,
            invert: true,
        }))
    }

    #[test]
    fn test_unknown_before_first_frame() {
        let frames = FrameReader::new(RegionOfInterest::full_frame(80, 60));
        let estimator = PositionEstimator::spawn(frames, threshold_detector(), 10);

        assert!(estimator.current_position().is_unknown());
        assert!(estimator.annotated_frame().is_none());
        assert_eq!(estimator.frame_center(), (40, 30));
    }

    #[test]
    fn test_tracks_and_is_idempotent() {
        let frames = FrameReader::new(RegionOfInterest::full_frame(80, 60));
        let mut estimator = PositionEstimator::spawn(frames.clone(), threshold_detector(), 10);

        let seq = frames.publish(frame_with_squares(80, 60, BG, &[((20, 30), 10, FG)]));
        wait_for_seq(&estimator, seq);

        let first = estimator.current_position();
        assert_near(first, 24.5, 34.5);
        assert_eq!(estimator.current_position(), first);

        let seq = frames.publish(frame_with_squares(80, 60, BG, &[((50, 10), 10, FG)]));
        wait_for_seq(&estimator, seq);
        let p = estimator.current_position();
        assert_near(p, 54.5, 14.5);

        let annotated = estimator.annotated_frame().unwrap();
        assert_eq!(
            annotated.get_pixel(p.x.round() as u32, p.y.round() as u32),
            &CROSS_COLOUR
        );

        estimator.shutdown();
    }

    #[test]
    fn test_holds_position_on_lost_tracking() {
        let roi = RegionOfInterest::full_frame(80, 60);
        let empty = RgbImage::from_pixel(80, 60, BG);
        let detector = SubtractionDetector::new(
            BaselineImage::from_frame(&empty, 7),
            &roi,
            SubtractionParams::default(),
        )
        .unwrap();

        let frames = FrameReader::new(roi);
        let mut estimator = PositionEstimator::spawn(frames.clone(), Box::new(detector), 10);

        let seq = frames.publish(frame_with_squares(80, 60, BG, &[((30, 20), 16, FG)]));
        wait_for_seq(&estimator, seq);
        let held = estimator.current_position();
        assert_near(held, 37.5, 27.5);

        // Wrong size for the baseline
        let seq = frames.publish(RgbImage::from_pixel(60, 60, BG));
        wait_for_seq(&estimator, seq);
        assert_eq!(estimator.current_position(), held);

        // Nothing in the scene
        let seq = frames.publish(empty);
        wait_for_seq(&estimator, seq);
        assert_eq!(estimator.current_position(), held);

        let seq = frames.publish(frame_with_squares(80, 60, BG, &[((10, 10), 16, FG)]));
        wait_for_seq(&estimator, seq);
        assert_near(estimator.current_position(), 17.5, 17.5);

        estimator.shutdown();
    }
}
