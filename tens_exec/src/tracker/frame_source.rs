//! # Frame source
//!
//! Owns the camera and continuously publishes the latest frame, cropped to the region of interest,
//! from a background thread. Readers get the most recent snapshot without waiting on the camera.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use arc_swap::ArcSwapOption;
use comms_if::eqpt::cam::RegionOfInterest;
use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};
use rscam::{Camera, Config};

use super::{imgproc, CameraParams};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time to wait after a failed capture before trying again.
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A camera which can be asked for a frame.
pub trait FrameGrabber: Send {
    /// Block until the next frame is available.
    fn grab(&mut self) -> Result<RgbImage, CamError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A V4L2 camera streaming MJPG.
pub struct V4lCamera {
    camera: Camera,
}

/// A published frame.
#[derive(Debug)]
pub struct FrameSnapshot {
    /// Increments with every published frame.
    pub seq: u64,

    /// The frame, already cropped.
    pub image: RgbImage,
}

/// Read handle onto the frames published by a [`FrameSource`].
#[derive(Clone)]
pub struct FrameReader {
    latest: Arc<ArcSwapOption<FrameSnapshot>>,
    roi: RegionOfInterest,
}

pub struct FrameSource {
    reader: FrameReader,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CamError {
    #[error("Could not open camera {0}: {1}")]
    Open(String, std::io::Error),

    #[error("Could not start camera {0}: {1}")]
    Start(String, rscam::Error),

    #[error("Could not capture a frame: {0}")]
    Capture(std::io::Error),

    #[error("Could not decode a frame: {0}")]
    Decode(image::ImageError),

    #[error("No working camera was found")]
    NoCameraFound,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl V4lCamera {
    pub fn open(device: &str, params: &CameraParams) -> Result<Self, CamError> {
        let mut camera = Camera::new(device).map_err(|e| CamError::Open(device.into(), e))?;

        camera
            .start(&Config {
                interval: params.interval,
                resolution: params.resolution,
                format: b"MJPG",
                ..Default::default()
            })
            .map_err(|e| CamError::Start(device.into(), e))?;

        debug!("Camera {} started", device);

        Ok(Self { camera })
    }
}

impl FrameGrabber for V4lCamera {
    fn grab(&mut self) -> Result<RgbImage, CamError> {
        let frame = self.camera.capture().map_err(CamError::Capture)?;

        Ok(image::load_from_memory_with_format(&frame, ImageFormat::Jpeg)
            .map_err(CamError::Decode)?
            .into_rgb8())
    }
}

impl<F> FrameGrabber for F
where
    F: FnMut() -> Result<RgbImage, CamError> + Send,
{
    fn grab(&mut self) -> Result<RgbImage, CamError> {
        self()
    }
}

impl FrameReader {
    /// A reader with nothing published yet, whose frames are cropped to `roi`.
    pub fn new(roi: RegionOfInterest) -> Self {
        Self {
            latest: Arc::new(ArcSwapOption::empty()),
            roi,
        }
    }

    /// Publish an already cropped frame, returning its sequence number.
    ///
    /// There must only be one publisher per reader.
    pub fn publish(&self, image: RgbImage) -> u64 {
        let seq = self.latest.load_full().map_or(0, |f| f.seq) + 1;
        self.latest.store(Some(Arc::new(FrameSnapshot { seq, image })));
        seq
    }

    /// The most recent frame, or `None` if no frame has been published yet.
    pub fn latest_frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.latest.load_full()
    }

    /// Block until a frame has been published, or `None` if none arrives within `timeout`.
    pub fn wait_for_frame(&self, poll: Duration, timeout: Duration) -> Option<Arc<FrameSnapshot>> {
        self.wait_until(|_| true, poll, timeout)
    }

    /// Block until a frame newer than `seq` has been published, or `None` after `timeout`.
    pub fn wait_for_newer(
        &self,
        seq: u64,
        poll: Duration,
        timeout: Duration,
    ) -> Option<Arc<FrameSnapshot>> {
        self.wait_until(|f| f.seq > seq, poll, timeout)
    }

    fn wait_until<P>(
        &self,
        accept: P,
        poll: Duration,
        timeout: Duration,
    ) -> Option<Arc<FrameSnapshot>>
    where
        P: Fn(&FrameSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            match self.latest_frame() {
                Some(f) if accept(&f) => return Some(f),
                _ if Instant::now() >= deadline => return None,
                _ => thread::sleep(poll),
            }
        }
    }

    pub fn roi(&self) -> &RegionOfInterest {
        &self.roi
    }
}

impl FrameSource {
    /// Start publishing frames from the camera, cropped to `roi`.
    pub fn spawn<G: FrameGrabber + 'static>(mut camera: G, roi: RegionOfInterest) -> Self {
        let reader = FrameReader::new(roi);
        let shutdown = Arc::new(AtomicBool::new(false));

        let publisher = reader.clone();
        let shutdown_clone = shutdown.clone();

        let join_handle = thread::spawn(move || {
            let mut seq = 0;
            let mut warned_size = false;

            while !shutdown_clone.load(Ordering::Relaxed) {
                let frame = match camera.grab() {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("Camera read failed: {}", e);
                        thread::sleep(CAPTURE_RETRY_DELAY);
                        continue;
                    }
                };

                if frame.width() < roi.bottom_right.0 || frame.height() < roi.bottom_right.1 {
                    if !warned_size {
                        warn!(
                            "Frame of {:?} is too small for the region of interest {:?}",
                            frame.dimensions(),
                            roi
                        );
                        warned_size = true;
                    }
                    continue;
                }

                seq = publisher.publish(imgproc::crop(
                    &frame,
                    roi.upper_left,
                    roi.width(),
                    roi.height(),
                ));
            }

            debug!("Frame source stopped after {} frames", seq);
        });

        info!("Frame source started");

        Self {
            reader,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Get a new read handle onto the published frames.
    pub fn reader(&self) -> FrameReader {
        self.reader.clone()
    }

    pub fn latest_frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.reader.latest_frame()
    }

    /// Stop the capture thread, releasing the camera.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                warn!("Frame source thread panicked");
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Try each device in turn, returning the first one which opens and is confirmed.
///
/// `confirm` is given the opened camera, typically to grab a preview and ask the operator.
pub fn select_camera<G, O, C>(
    devices: &[String],
    mut open: O,
    mut confirm: C,
) -> Result<G, CamError>
where
    O: FnMut(&str) -> Result<G, CamError>,
    C: FnMut(&str, &mut G) -> bool,
{
    for device in devices {
        let mut camera = match open(device) {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping camera {}: {}", device, e);
                continue;
            }
        };

        if confirm(device, &mut camera) {
            info!("Using camera {}", device);
            return Ok(camera);
        }

        info!("Camera {} rejected", device);
    }

    Err(CamError::NoCameraFound)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
