use glam::Vec2;

/// Number of levels in a full mip chain for a cube of edge `resolution`:
/// `floor(log2(resolution)) + 1`. Zero for a zero-sized cube.
pub fn mip_level_count(resolution: u32) -> u32 {
    if resolution == 0 {
        0
    } else {
        resolution.ilog2() + 1
    }
}

/// Split a continuous grid position into its base cell and fractional offset.
pub fn cell_and_fraction(pos: Vec2) -> ((i64, i64), Vec2) {
    let base = pos.floor();
    ((base.x as i64, base.y as i64), pos - base)
}

/// Bilinear weights of the four cells around a fractional offset, ordered
/// `[(0,0), (1,0), (0,1), (1,1)]`. The weights always sum to one.
pub fn bilinear_weights(frac: Vec2) -> [f32; 4] {
    let (u, v) = (frac.x, frac.y);
    [
        (1.0 - u) * (1.0 - v),
        u * (1.0 - v),
        (1.0 - u) * v,
        u * v,
    ]
}

/// Quantize a normalized height to the full u16 range. Input is clamped to [0, 1].
pub fn quantize_unorm16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * u16::MAX as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(0), 0);
        assert_eq!(mip_level_count(1), 1);
        assert_eq!(mip_level_count(2), 2);
        assert_eq!(mip_level_count(256), 9);
        assert_eq!(mip_level_count(512), 10);
        // Non-powers round down
        assert_eq!(mip_level_count(300), 9);
    }

    #[test]
    fn test_bilinear_weights_sum_to_one() {
        for &(u, v) in &[(0.0, 0.0), (0.3, 0.8), (0.5, 0.5), (0.99, 0.01)] {
            let w = bilinear_weights(Vec2::new(u, v));
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "weights for ({u},{v}) sum to {sum}");
        }
    }

    #[test]
    fn test_bilinear_weights_corner() {
        let w = bilinear_weights(Vec2::ZERO);
        assert_eq!(w, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cell_and_fraction() {
        let ((x, y), frac) = cell_and_fraction(Vec2::new(10.3, 7.8));
        assert_eq!((x, y), (10, 7));
        assert!((frac.x - 0.3).abs() < 1e-5);
        assert!((frac.y - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_quantize_unorm16_clamps() {
        assert_eq!(quantize_unorm16(-1.0), 0);
        assert_eq!(quantize_unorm16(0.0), 0);
        assert_eq!(quantize_unorm16(1.0), u16::MAX);
        assert_eq!(quantize_unorm16(2.0), u16::MAX);
        assert_eq!(quantize_unorm16(0.5), 32767);
    }
}
