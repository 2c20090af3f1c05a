use std::path::Path;

use image::{DynamicImage, ImageBuffer};
use palette::{FromColor, IntoColor, Lab, LinSrgb, Srgb};

use crate::error::{Error, Result};

/// A read-only image in CIE Lab space, stored row-major.
///
/// Coordinates are always `(row, col)`: `row` runs over the height and `col`
/// over the width, matching the order in which the segmentation engine scans.
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    width: usize,
    height: usize,
    pixels: Vec<Lab>,
}

impl LabImage {
    pub fn from_raw(width: usize, height: usize, pixels: Vec<Lab>) -> Result<Self> {
        let expected = width * height;
        if pixels.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                found: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Builds an image by evaluating `f(row, col)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Lab) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                pixels.push(f(row, col));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn filled(width: usize, height: usize, color: Lab) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Converts an 8-bit sRGB image to Lab (D65).
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let rgb_image = img.to_rgb8();
        let pixels = rgb_image
            .pixels()
            .map(|pixel| {
                let rgb_color: LinSrgb = Srgb::new(
                    pixel[0] as f32 / 255.0,
                    pixel[1] as f32 / 255.0,
                    pixel[2] as f32 / 255.0,
                )
                .into_linear();
                let lab_color: Lab = rgb_color.into_color();
                lab_color
            })
            .collect();
        Self {
            width: rgb_image.width() as usize,
            height: rgb_image.height() as usize,
            pixels,
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?;
        Ok(Self::from_dynamic(&img))
    }

    /// Converts back to 8-bit sRGB. Out-of-gamut colors are clamped.
    pub fn to_dynamic(&self) -> DynamicImage {
        let buffer = ImageBuffer::from_fn(self.width as u32, self.height as u32, |x, y| {
            let color = self.get(y as usize, x as usize);
            let srgb_color: Srgb<u8> = Srgb::from_color(color).into_format();
            image::Rgb([srgb_color.red, srgb_color.green, srgb_color.blue])
        });
        DynamicImage::ImageRgb8(buffer)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_dynamic().save(path)?;
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Lab] {
        &self.pixels
    }

    /// Flat row-major index of `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(
            row < self.height && col < self.width,
            "pixel ({row}, {col}) outside {}x{} image",
            self.height,
            self.width
        );
        row * self.width + col
    }

    /// Color at `(row, col)`. Panics when the coordinate is outside the image.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Lab {
        assert!(
            row < self.height && col < self.width,
            "pixel ({row}, {col}) outside {}x{} image",
            self.height,
            self.width
        );
        self.pixels[row * self.width + col]
    }

    /// Signed color change towards the lower-right diagonal neighbour, summed
    /// over the three channels.
    ///
    /// Coordinates on the last row or column are pulled back by one so that
    /// both samples stay inside the image. An image one pixel tall (or wide)
    /// has no change along that axis.
    pub fn gradient(&self, row: usize, col: usize) -> f32 {
        let row0 = row.min(self.height.saturating_sub(2));
        let col0 = col.min(self.width.saturating_sub(2));
        let row1 = (row0 + 1).min(self.height - 1);
        let col1 = (col0 + 1).min(self.width - 1);

        let here = self.get(row0, col0);
        let next = self.get(row1, col1);
        (next.l - here.l) + (next.a - here.a) + (next.b - here.b)
    }
}

/// Euclidean distance between two Lab colors.
pub fn lab_distance(lab1: &Lab, lab2: &Lab) -> f32 {
    let l_diff = lab1.l - lab2.l;
    let a_diff = lab1.a - lab2.a;
    let b_diff = lab1.b - lab2.b;

    (l_diff * l_diff + a_diff * a_diff + b_diff * b_diff).sqrt()
}
