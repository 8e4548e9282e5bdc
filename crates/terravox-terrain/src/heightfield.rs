use glam::Vec2;
use terravox_core::math::{bilinear_weights, cell_and_fraction, quantize_unorm16};

use crate::error::TerrainError;

/// Row-major grid of normalized heights.
///
/// Every stored value lies in [0, 1]; writes are clamped. The grid size is
/// fixed at construction and always equals `width * height`. Resizing means
/// building a new `Heightfield`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl Heightfield {
    /// Allocate a zero-filled grid. Both dimensions must be at least 2.
    pub fn new(width: usize, height: usize) -> Result<Self, TerrainError> {
        Self::check_dims(width, height)?;
        Ok(Self {
            width,
            height,
            values: vec![0.0; width * height],
        })
    }

    /// Build a grid from existing values. Values are clamped to [0, 1].
    pub fn from_values(width: usize, height: usize, values: &[f32]) -> Result<Self, TerrainError> {
        Self::check_dims(width, height)?;
        let mut field = Self {
            width,
            height,
            values: vec![0.0; width * height],
        };
        field.copy_from(values)?;
        Ok(field)
    }

    /// Overwrite every cell from `values`. No cell is touched on a size mismatch.
    pub fn copy_from(&mut self, values: &[f32]) -> Result<(), TerrainError> {
        if values.len() != self.values.len() {
            return Err(TerrainError::SizeMismatch {
                expected: self.values.len(),
                actual: values.len(),
            });
        }
        for (dst, src) in self.values.iter_mut().zip(values) {
            *dst = src.clamp(0.0, 1.0);
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells (`width * height`).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw row-major values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn check_dims(width: usize, height: usize) -> Result<(), TerrainError> {
        if width < 2 || height < 2 {
            return Err(TerrainError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    fn index(&self, x: i64, y: i64) -> Result<usize, TerrainError> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Err(TerrainError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width + x as usize)
    }

    /// Height at a cell, or `None` outside the grid.
    pub fn try_get(&self, x: i64, y: i64) -> Option<f32> {
        self.index(x, y).ok().map(|i| self.values[i])
    }

    /// Height at a cell. Out-of-grid reads are an invariant violation: they
    /// are logged and read as 0.0.
    pub fn get(&self, x: i64, y: i64) -> f32 {
        match self.index(x, y) {
            Ok(i) => self.values[i],
            Err(e) => {
                log::warn!("Heightfield read rejected: {e}");
                0.0
            }
        }
    }

    /// Store a height, clamped to [0, 1]. Out-of-grid writes are rejected.
    pub fn set(&mut self, x: i64, y: i64, value: f32) -> Result<(), TerrainError> {
        let i = self.index(x, y).inspect_err(|e| {
            log::warn!("Heightfield write rejected: {e}");
        })?;
        self.values[i] = value.clamp(0.0, 1.0);
        Ok(())
    }

    /// Add `delta` to a cell (clamped). Returns the change actually applied,
    /// which differs from `delta` when the result hits 0 or 1.
    pub fn add(&mut self, x: i64, y: i64, delta: f32) -> Result<f32, TerrainError> {
        let before = self.get(x, y);
        self.set(x, y, before + delta)?;
        Ok(self.values[y as usize * self.width + x as usize] - before)
    }

    /// Whether a bilinear sample at `pos` reads only in-grid cells, i.e.
    /// `pos` lies in `[0, width-1) x [0, height-1)`.
    pub fn contains_sample(&self, pos: Vec2) -> bool {
        pos.x >= 0.0
            && pos.y >= 0.0
            && pos.x < (self.width - 1) as f32
            && pos.y < (self.height - 1) as f32
    }

    /// Bilinearly interpolated height over the 2x2 cell block at `floor(pos)`.
    pub fn bilinear_height(&self, pos: Vec2) -> f32 {
        let ((x, y), frac) = cell_and_fraction(pos);
        let w = bilinear_weights(frac);
        self.get(x, y) * w[0]
            + self.get(x + 1, y) * w[1]
            + self.get(x, y + 1) * w[2]
            + self.get(x + 1, y + 1) * w[3]
    }

    /// Height gradient at `pos`, bilinearly blended from the edge differences
    /// of the surrounding 2x2 block.
    pub fn bilinear_gradient(&self, pos: Vec2) -> Vec2 {
        let ((x, y), frac) = cell_and_fraction(pos);
        let h00 = self.get(x, y);
        let h10 = self.get(x + 1, y);
        let h01 = self.get(x, y + 1);
        let h11 = self.get(x + 1, y + 1);

        Vec2::new(
            (h10 - h00) * (1.0 - frac.y) + (h11 - h01) * frac.y,
            (h01 - h00) * (1.0 - frac.x) + (h11 - h10) * frac.x,
        )
    }

    /// Quantized copy for GPU upload.
    pub fn to_u16_pixels(&self) -> Vec<u16> {
        self.values.iter().map(|&v| quantize_unorm16(v)).collect()
    }

    /// Lowest and highest stored heights.
    pub fn min_max(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Sum of all heights; used to check mass bookkeeping.
    pub fn total(&self) -> f64 {
        self.values.iter().map(|&v| v as f64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Heightfield {
        let values: Vec<f32> = (0..width * height)
            .map(|i| (i % width) as f32 / (width - 1) as f32)
            .collect();
        Heightfield::from_values(width, height, &values).expect("valid ramp")
    }

    #[test]
    fn test_new_is_zeroed() {
        let field = Heightfield::new(4, 3).expect("valid dims");
        assert_eq!(field.len(), 12);
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_degenerate_dims() {
        assert!(matches!(
            Heightfield::new(1, 8),
            Err(TerrainError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_from_values_size_mismatch() {
        let err = Heightfield::from_values(4, 4, &[0.5; 15]).unwrap_err();
        assert_eq!(
            err,
            TerrainError::SizeMismatch {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn test_copy_from_mismatch_leaves_values() {
        let mut field = Heightfield::from_values(2, 2, &[0.1, 0.2, 0.3, 0.4]).expect("valid");
        assert!(field.copy_from(&[0.9; 3]).is_err());
        assert_eq!(field.values(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_writes_are_clamped() {
        let mut field = Heightfield::new(3, 3).expect("valid dims");
        field.set(1, 1, 4.0).expect("in bounds");
        assert_eq!(field.get(1, 1), 1.0);
        field.set(1, 1, -2.0).expect("in bounds");
        assert_eq!(field.get(1, 1), 0.0);

        let loaded = Heightfield::from_values(2, 2, &[-1.0, 0.5, 2.0, 1.0]).expect("valid");
        assert_eq!(loaded.values(), &[0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_out_of_bounds_read_is_zero() {
        let field = Heightfield::from_values(2, 2, &[1.0; 4]).expect("valid");
        assert_eq!(field.get(-1, 0), 0.0);
        assert_eq!(field.get(2, 0), 0.0);
        assert_eq!(field.try_get(0, 2), None);
    }

    #[test]
    fn test_out_of_bounds_write_rejected() {
        let mut field = Heightfield::new(2, 2).expect("valid dims");
        let before = field.clone();
        assert!(matches!(
            field.set(5, 0, 0.5),
            Err(TerrainError::OutOfBounds { x: 5, y: 0, .. })
        ));
        assert_eq!(field, before);
    }

    #[test]
    fn test_add_reports_clamped_delta() {
        let mut field = Heightfield::from_values(2, 2, &[0.9; 4]).expect("valid");
        let applied = field.add(0, 0, 0.5).expect("in bounds");
        assert!((applied - 0.1).abs() < 1e-6);
        assert_eq!(field.get(0, 0), 1.0);
    }

    #[test]
    fn test_bilinear_height_on_ramp() {
        let field = ramp(5, 5);
        // Ramp rises 0.25 per cell along x
        let h = field.bilinear_height(Vec2::new(1.5, 2.25));
        assert!((h - 0.375).abs() < 1e-6, "got {h}");
    }

    #[test]
    fn test_bilinear_gradient_on_ramp() {
        let field = ramp(5, 5);
        let g = field.bilinear_gradient(Vec2::new(2.3, 1.7));
        assert!((g.x - 0.25).abs() < 1e-6);
        assert!(g.y.abs() < 1e-6);
    }

    #[test]
    fn test_contains_sample_interior() {
        let field = Heightfield::new(16, 16).expect("valid dims");
        assert!(field.contains_sample(Vec2::new(0.0, 0.0)));
        assert!(field.contains_sample(Vec2::new(14.99, 14.99)));
        assert!(!field.contains_sample(Vec2::new(15.0, 3.0)));
        assert!(!field.contains_sample(Vec2::new(3.0, -0.01)));
    }

    #[test]
    fn test_u16_pixels() {
        let field = Heightfield::from_values(2, 2, &[0.0, 1.0, 0.5, 0.25]).expect("valid");
        let pixels = field.to_u16_pixels();
        assert_eq!(pixels[0], 0);
        assert_eq!(pixels[1], u16::MAX);
        assert_eq!(pixels[2], 32767);
    }

    #[test]
    fn test_min_max() {
        let field = Heightfield::from_values(2, 2, &[0.2, 0.7, 0.1, 0.4]).expect("valid");
        assert_eq!(field.min_max(), (0.1, 0.7));
    }
}
