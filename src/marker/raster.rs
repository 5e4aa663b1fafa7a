//! RGBA camera raster with in-place binarization.

use crate::error::MarkerError;

/// Row-major RGBA8 raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Black, opaque raster.
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        data.chunks_exact_mut(4).for_each(|px| px[3] = 255);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, MarkerError> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(MarkerError::InvalidRaster { width, height });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        self.data
            .chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&rgba));
    }

    /// Grayscale, then hard threshold: luma >= `threshold` becomes white, the rest black.
    pub fn binarize(&mut self, threshold: u8) {
        for px in self.data.chunks_exact_mut(4) {
            let v = if luma(px[0], px[1], px[2]) >= threshold {
                255
            } else {
                0
            };
            px[0] = v;
            px[1] = v;
            px[2] = v;
            px[3] = 255;
        }
    }
}

/// Rec. 601 luma.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}
