use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{Error, Result};

/// row-major RGB buffer with every channel normalized to 0..=1.
/// this is both the target image and the renderer's output format.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Raster {
    pub const CHANNELS: usize = 3;

    /// all-black canvas
    pub fn new_blank(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0.0; 3])
    }

    pub fn filled(width: u32, height: u32, rgb: [f32; 3]) -> Self {
        let n = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(n * Self::CHANNELS);
        for _ in 0..n {
            data.extend_from_slice(&rgb);
        }
        Self { width, height, data }
    }

    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * Self::CHANNELS;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "buffer holds {} values, {}x{} RGB needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { width, height, data })
    }

    /// build from 8-bit RGBA bytes, dropping alpha. callers pass opaque pixels
    /// (premultiplied and straight alpha coincide there).
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let data = rgba
            .chunks_exact(4)
            .flat_map(|px| px[..3].iter().map(|&c| c as f32 / 255.0))
            .collect();
        Self::from_vec(width, height, data)
    }

    /// image loader collaborator: decode a file into a normalized raster
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        profiling::scope!("Raster::load");
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| Error::InvalidInput(format!("cannot decode {}: {}", path.display(), e)))?;
        Self::from_image(&img)
    }

    pub fn from_image(img: &DynamicImage) -> Result<Self> {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        if w == 0 || h == 0 {
            return Err(Error::InvalidInput("image has zero size".to_owned()));
        }
        let data = rgb.as_raw().iter().map(|&c| c as f32 / 255.0).collect();
        Self::from_vec(w, h, data)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// one row of interleaved RGB values
    #[inline]
    pub fn row(&self, y: u32) -> &[f32] {
        let stride = self.width as usize * Self::CHANNELS;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let idx = ((y * self.width + x) as usize) * Self::CHANNELS;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn same_shape(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn to_rgb8(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.pixel(x, y);
            Rgb([to_u8(r), to_u8(g), to_u8(b)])
        })
    }

    /// result writer primitive: encode as an image file (format from the extension)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        profiling::scope!("Raster::save");
        self.to_rgb8()
            .save(path.as_ref())
            .map_err(|e| Error::Io(std::io::Error::other(e)))
    }
}

#[inline]
fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}
