//! # Camera Equipment Interface
//!
//! Types shared between the camera tracking pipeline and the control side: the tracked position
//! and the calibration data produced once per session.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pixel space position of the tracked robot centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Axis aligned rectangle of the camera frame which is considered for tracking.
///
/// The upper left corner is inclusive and the bottom right corner exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub upper_left: (u32, u32),
    pub bottom_right: (u32, u32),
}

/// A colour in the HSV space, with hue in `[0, 180)` and saturation and value in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv(pub [u8; 3]);

/// Inclusive bounds on a marker's colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    pub low: Hsv,
    pub high: Hsv,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoiError {
    #[error("Upper left corner {0:?} is not above and left of the bottom right corner {1:?}")]
    Inverted((u32, u32), (u32, u32)),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Position {
    /// Value reported before the first successful estimate.
    pub const UNKNOWN: Position = Position { x: -1.0, y: -1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// Euclidean distance to another position in pixels.
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Mean of a set of positions, or `None` if there are none.
    pub fn mean(positions: &[Position]) -> Option<Position> {
        if positions.is_empty() {
            return None;
        }

        let n = positions.len() as f64;
        let (sx, sy) = positions
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));

        Some(Position::new(sx / n, sy / n))
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

impl RegionOfInterest {
    /// Create a new region, checking that the corners are ordered.
    pub fn new(upper_left: (u32, u32), bottom_right: (u32, u32)) -> Result<Self, RoiError> {
        let roi = Self {
            upper_left,
            bottom_right,
        };
        roi.validate()?;
        Ok(roi)
    }

    /// Region covering a whole frame of the given size.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            upper_left: (0, 0),
            bottom_right: (width, height),
        }
    }

    pub fn validate(&self) -> Result<(), RoiError> {
        if self.upper_left.0 >= self.bottom_right.0 || self.upper_left.1 >= self.bottom_right.1 {
            return Err(RoiError::Inverted(self.upper_left, self.bottom_right));
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.bottom_right.0.saturating_sub(self.upper_left.0)
    }

    pub fn height(&self) -> u32 {
        self.bottom_right.1.saturating_sub(self.upper_left.1)
    }

    /// Centre of the cropped frame in cropped pixel coordinates.
    pub fn center(&self) -> (u32, u32) {
        (self.width() / 2, self.height() / 2)
    }
}

impl ColorBand {
    pub fn new(low: [u8; 3], high: [u8; 3]) -> Self {
        Self {
            low: Hsv(low),
            high: Hsv(high),
        }
    }

    /// True if the colour lies inside the band on every channel.
    pub fn contains(&self, hsv: &Hsv) -> bool {
        (0..3).all(|i| self.low.0[i] <= hsv.0[i] && hsv.0[i] <= self.high.0[i])
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_position_maths() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);

        let m = Position::mean(&[a, b, Position::new(6.0, 8.0)]).unwrap();
        assert_eq!(m, Position::new(3.0, 4.0));
        assert!(Position::mean(&[]).is_none());

        assert!(Position::default().is_unknown());
    }

    #[test]
    fn test_roi() {
        let roi = RegionOfInterest::new((10, 20), (110, 70)).unwrap();
        assert_eq!(roi.width(), 100);
        assert_eq!(roi.height(), 50);
        assert_eq!(roi.center(), (50, 25));

        assert!(RegionOfInterest::new((10, 20), (10, 70)).is_err());
        assert!(RegionOfInterest::new((50, 20), (10, 70)).is_err());
    }

    #[test]
    fn test_color_band() {
        let band = ColorBand::new([0, 120, 0], [9, 255, 255]);
        assert!(band.contains(&Hsv([0, 255, 255])));
        assert!(band.contains(&Hsv([9, 120, 0])));
        assert!(!band.contains(&Hsv([10, 255, 255])));
        assert!(!band.contains(&Hsv([5, 100, 255])));
    }
}
