//! # Image processing primitives
//!
//! The small set of filters the detectors are built from, operating directly on `image` buffers.
//! Filters clamp their windows at the image edges rather than padding.
//!
//! HSV images follow the 8-bit convention used by most vision tooling: hue is halved into
//! `[0, 180)` so that red is 0, green 60 and blue 120, saturation and value span `[0, 255]`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::cam::{ColorBand, Hsv, Position};
use image::{imageops, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// An image whose three channels hold hue, saturation and value.
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A connected region of non-zero pixels in a mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Number of pixels in the blob (zeroth moment)
    pub area: u64,

    /// Sum of the x coordinates of the pixels (first moment in x)
    pub m10: f64,

    /// Sum of the y coordinates of the pixels (first moment in y)
    pub m01: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    /// `255` above the cutoff, `0` otherwise
    Binary,

    /// `0` above the cutoff, `255` otherwise
    BinaryInv,

    /// `0` above the cutoff, unchanged otherwise
    ToZeroInv,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Blob {
    pub fn centroid(&self) -> Option<Position> {
        if self.area == 0 {
            return None;
        }

        let a = self.area as f64;
        Some(Position::new(self.m10 / a, self.m01 / a))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub fn grayscale(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Mean filter over a `size` by `size` window.
pub fn box_blur(image: &GrayImage, size: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if size <= 1 || w == 0 || h == 0 {
        return image.clone();
    }

    // Summed area table with a zero row and column in front
    let stride = (w + 1) as usize;
    let mut integral = vec![0u64; stride * (h + 1) as usize];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += image.get_pixel(x, y).0[0] as u64;
            let i = (y + 1) as usize * stride + (x + 1) as usize;
            integral[i] = integral[i - stride] + row_sum;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let (x0, x1, y0, y1) = window(x, y, size, w, h);
        let at = |x: u32, y: u32| integral[y as usize * stride + x as usize];
        let sum = at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0);
        let count = ((x1 - x0) * (y1 - y0)) as u64;

        Luma([((sum + count / 2) / count) as u8])
    })
}

/// Median filter over a `size` by `size` window.
pub fn median_blur(image: &GrayImage, size: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if size <= 1 {
        return image.clone();
    }

    let mut buf = Vec::with_capacity((size * size) as usize);
    GrayImage::from_fn(w, h, |x, y| {
        Luma([median_at(&mut buf, x, y, size, w, h, |x, y| {
            image.get_pixel(x, y).0[0]
        })])
    })
}

/// Median filter applied to each channel of an HSV image independently.
pub fn median_blur_hsv(image: &HsvImage, size: u32) -> HsvImage {
    let (w, h) = image.dimensions();
    if size <= 1 {
        return image.clone();
    }

    let mut buf = Vec::with_capacity((size * size) as usize);
    HsvImage::from_fn(w, h, |x, y| {
        let mut out = [0u8; 3];
        for (c, v) in out.iter_mut().enumerate() {
            *v = median_at(&mut buf, x, y, size, w, h, |x, y| image.get_pixel(x, y).0[c]);
        }
        Rgb(out)
    })
}

pub fn threshold(image: &GrayImage, cutoff: u8, kind: ThresholdKind) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        let v = p.0[0];
        p.0[0] = match kind {
            ThresholdKind::Binary if v > cutoff => 255,
            ThresholdKind::Binary => 0,
            ThresholdKind::BinaryInv if v > cutoff => 0,
            ThresholdKind::BinaryInv => 255,
            ThresholdKind::ToZeroInv if v > cutoff => 0,
            ThresholdKind::ToZeroInv => v,
        };
    }
    out
}

/// Per-pixel `a - b` with 8-bit wrap around.
///
/// Both images must be the same size, pixels outside `b` are treated as zero.
pub fn wrapping_sub(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let (bw, bh) = b.dimensions();
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let bv = if x < bw && y < bh {
            b.get_pixel(x, y).0[0]
        } else {
            0
        };
        Luma([a.get_pixel(x, y).0[0].wrapping_sub(bv)])
    })
}

pub fn rgb_to_hsv(rgb: &Rgb<u8>) -> Hsv {
    let [r, g, b] = rgb.0;
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max as f64;
    let diff = v - min as f64;

    let s = if max == 0 { 0.0 } else { 255.0 * diff / v };

    let h = if diff == 0.0 {
        0.0
    } else if max == r {
        60.0 * (gf - bf) / diff
    } else if max == g {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    Hsv([
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round() as u8,
        max,
    ])
}

pub fn hsv_image(image: &RgbImage) -> HsvImage {
    HsvImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(rgb_to_hsv(image.get_pixel(x, y)).0)
    })
}

/// Mask of the pixels which lie inside the band.
pub fn in_range(image: &HsvImage, band: &ColorBand) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if band.contains(&Hsv(image.get_pixel(x, y).0)) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Find the 8-connected blobs of non-zero pixels, in raster order of their first pixel.
pub fn find_blobs(mask: &GrayImage) -> Vec<Blob> {
    let (w, h) = mask.dimensions();
    let mut visited = vec![false; (w * h) as usize];
    let mut blobs = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) as usize;
            if visited[i] || mask.get_pixel(x, y).0[0] == 0 {
                continue;
            }

            let mut blob = Blob {
                area: 0,
                m10: 0.0,
                m01: 0.0,
            };
            visited[i] = true;
            stack.push((x, y));

            while let Some((px, py)) = stack.pop() {
                blob.area += 1;
                blob.m10 += px as f64;
                blob.m01 += py as f64;

                for ny in py.saturating_sub(1)..=(py + 1).min(h - 1) {
                    for nx in px.saturating_sub(1)..=(px + 1).min(w - 1) {
                        let ni = (ny * w + nx) as usize;
                        if !visited[ni] && mask.get_pixel(nx, ny).0[0] != 0 {
                            visited[ni] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            blobs.push(blob);
        }
    }

    blobs
}

/// The blob with the greatest area. Ties go to the first found.
pub fn largest_blob(blobs: Vec<Blob>) -> Option<Blob> {
    blobs.into_iter().fold(None, |best, b| match best {
        Some(best) if best.area >= b.area => Some(best),
        _ => Some(b),
    })
}

pub fn crop(image: &RgbImage, upper_left: (u32, u32), width: u32, height: u32) -> RgbImage {
    imageops::crop_imm(image, upper_left.0, upper_left.1, width, height).to_image()
}

/// Draw a cross of the given half length centred on `at`.
pub fn draw_cross(image: &mut RgbImage, at: &Position, half_len: i64, colour: Rgb<u8>) {
    let (cx, cy) = (at.x.round() as i64, at.y.round() as i64);
    for d in -half_len..=half_len {
        put_checked(image, cx + d, cy, colour);
        put_checked(image, cx, cy + d, colour);
    }
}

/// Draw the outline of a circle.
pub fn draw_circle(image: &mut RgbImage, centre: (u32, u32), radius: u32, colour: Rgb<u8>) {
    let (cx, cy, r) = (centre.0 as i64, centre.1 as i64, radius as i64);
    let (mut x, mut y, mut err) = (r, 0i64, 1 - r);

    while x >= y {
        for &(dx, dy) in &[
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            put_checked(image, cx + dx, cy + dy, colour);
        }

        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Bounds of the window around `(x, y)`, clamped to the image, as `(x0, x1, y0, y1)` with the
/// upper bounds exclusive.
fn window(x: u32, y: u32, size: u32, w: u32, h: u32) -> (u32, u32, u32, u32) {
    let r = size / 2;
    (
        x.saturating_sub(r),
        (x + size - r).min(w),
        y.saturating_sub(r),
        (y + size - r).min(h),
    )
}

fn median_at<F: Fn(u32, u32) -> u8>(
    buf: &mut Vec<u8>,
    x: u32,
    y: u32,
    size: u32,
    w: u32,
    h: u32,
    get: F,
) -> u8 {
    let (x0, x1, y0, y1) = window(x, y, size, w, h);

    buf.clear();
    for wy in y0..y1 {
        for wx in x0..x1 {
            buf.push(get(wx, wy));
        }
    }

    let mid = buf.len() / 2;
    *buf.select_nth_unstable(mid).1
}

fn put_checked(image: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, colour);
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn square(w: u32, h: u32, x0: u32, y0: u32, side: u32, fg: u8, bg: u8) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
                Luma([fg])
            } else {
                Luma([bg])
            }
        })
    }

    #[test]
    fn test_box_blur_flat_image_unchanged() {
        let img = GrayImage::from_pixel(20, 10, Luma([77]));
        assert_eq!(box_blur(&img, 7), img);
        assert_eq!(box_blur(&img, 64), img);
    }

    #[test]
    fn test_box_blur_spreads_point() {
        let mut img = GrayImage::new(9, 9);
        img.put_pixel(4, 4, Luma([90]));

        let blurred = box_blur(&img, 3);
        assert_eq!(blurred.get_pixel(4, 4).0[0], 10);
        assert_eq!(blurred.get_pixel(3, 5).0[0], 10);
        assert_eq!(blurred.get_pixel(2, 4).0[0], 0);
    }

    #[test]
    fn test_median_blur_removes_speckle() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([50]));
        img.put_pixel(5, 5, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));

        let filtered = median_blur(&img, 3);
        assert!(filtered.pixels().all(|p| p.0[0] == 50));
    }

    #[test]
    fn test_thresholds() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[10, 100, 230][x as usize]]));

        let b = threshold(&img, 100, ThresholdKind::Binary);
        let bi = threshold(&img, 100, ThresholdKind::BinaryInv);
        let tz = threshold(&img, 100, ThresholdKind::ToZeroInv);

        assert_eq!(b.as_raw(), &vec![0, 0, 255]);
        assert_eq!(bi.as_raw(), &vec![255, 255, 0]);
        assert_eq!(tz.as_raw(), &vec![10, 100, 0]);
    }

    #[test]
    fn test_wrapping_sub() {
        let a = GrayImage::from_pixel(2, 1, Luma([10]));
        let b = GrayImage::from_fn(2, 1, |x, _| Luma([[4, 20][x as usize]]));
        assert_eq!(wrapping_sub(&a, &b).as_raw(), &vec![6, 246]);
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(&Rgb([255, 0, 0])), Hsv([0, 255, 255]));
        assert_eq!(rgb_to_hsv(&Rgb([0, 255, 0])), Hsv([60, 255, 255]));
        assert_eq!(rgb_to_hsv(&Rgb([0, 0, 255])), Hsv([120, 255, 255]));
        assert_eq!(rgb_to_hsv(&Rgb([0, 0, 0])), Hsv([0, 0, 0]));
        assert_eq!(rgb_to_hsv(&Rgb([128, 128, 128])), Hsv([0, 0, 128]));
    }

    #[test]
    fn test_in_range() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let mask = in_range(&hsv_image(&img), &ColorBand::new([0, 120, 0], [9, 255, 255]));
        assert_eq!(mask.as_raw(), &vec![255, 0]);
    }

    #[test]
    fn test_find_blobs_raster_order_and_centroid() {
        let mut mask = square(40, 40, 20, 5, 4, 255, 0);
        for y in 30..36 {
            for x in 2..8 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let blobs = find_blobs(&mask);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].area, 16);
        assert_eq!(blobs[0].centroid(), Some(Position::new(21.5, 6.5)));
        assert_eq!(blobs[1].area, 36);
        assert_eq!(blobs[1].centroid(), Some(Position::new(4.5, 32.5)));

        assert_eq!(largest_blob(blobs).map(|b| b.area), Some(36));
    }

    #[test]
    fn test_find_blobs_diagonal_connectivity() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(2, 2, Luma([255]));

        assert_eq!(find_blobs(&mask).len(), 1);
        assert!(find_blobs(&GrayImage::new(4, 4)).is_empty());
    }

    #[test]
    fn test_drawing_clips_to_image() {
        let mut img = RgbImage::new(10, 10);
        draw_cross(&mut img, &Position::new(0.0, 0.0), 3, Rgb([255, 0, 0]));
        draw_circle(&mut img, (5, 5), 8, Rgb([0, 255, 0]));

        assert_eq!(img.get_pixel(3, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(0, 3), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }
}
