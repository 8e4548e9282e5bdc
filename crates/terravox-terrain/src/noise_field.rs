use noise::core::worley::{distance_functions, ReturnType};
use noise::{
    Billow, Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, RidgedMulti, Seedable, SuperSimplex,
    Value, Worley,
};
use serde::{Deserialize, Serialize};

use crate::erosion::HydraulicErosion;
use crate::error::TerrainError;
use crate::heightfield::Heightfield;

/// Seed of the erosion engine owned by a `NoiseField`.
const EROSION_SEED: u64 = 1337;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseType {
    Perlin,
    OpenSimplex,
    SuperSimplex,
    Value,
    Cellular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalType {
    None,
    FBm,
    Ridged,
    Billow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellularDistance {
    Euclidean,
    EuclideanSquared,
    Manhattan,
    Chebyshev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellularReturn {
    CellValue,
    Distance,
}

/// Parameters of the layered noise that seeds a heightfield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub seed: u32,
    /// Cycles per heightfield cell.
    pub frequency: f64,
    pub noise_type: NoiseType,
    /// Power applied to the [0, 1] mapped sample.
    pub exponent: f32,

    pub fractal_type: FractalType,
    pub octaves: usize,
    pub lacunarity: f64,
    pub gain: f64,

    pub cellular_distance: CellularDistance,
    pub cellular_return: CellularReturn,

    pub use_domain_warp: bool,
    /// Maximum coordinate displacement, in cells.
    pub domain_warp_amp: f64,
    pub domain_seed: u32,
    pub domain_frequency: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 1337,
            frequency: 0.01,
            noise_type: NoiseType::Perlin,
            exponent: 1.0,
            fractal_type: FractalType::None,
            octaves: 3,
            lacunarity: 2.0,
            gain: 0.5,
            cellular_distance: CellularDistance::EuclideanSquared,
            cellular_return: CellularReturn::Distance,
            use_domain_warp: false,
            domain_warp_amp: 1.0,
            domain_seed: 1337,
            domain_frequency: 0.005,
        }
    }
}

type NoiseSource = Box<dyn NoiseFn<f64, 2>>;

fn fractal<T>(settings: &NoiseSettings) -> NoiseSource
where
    T: Default + Seedable + NoiseFn<f64, 2> + 'static,
{
    let seed = settings.seed;
    let octaves = settings.octaves.max(1);
    match settings.fractal_type {
        FractalType::None => Box::new(T::default().set_seed(seed)),
        FractalType::FBm => Box::new(
            Fbm::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(1.0)
                .set_lacunarity(settings.lacunarity)
                .set_persistence(settings.gain),
        ),
        FractalType::Ridged => Box::new(
            RidgedMulti::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(1.0)
                .set_lacunarity(settings.lacunarity)
                .set_persistence(settings.gain),
        ),
        FractalType::Billow => Box::new(
            Billow::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(1.0)
                .set_lacunarity(settings.lacunarity)
                .set_persistence(settings.gain),
        ),
    }
}

fn cellular(settings: &NoiseSettings) -> NoiseSource {
    let worley = Worley::new(settings.seed).set_frequency(1.0);
    let worley = match settings.cellular_distance {
        CellularDistance::Euclidean => worley.set_distance_function(distance_functions::euclidean),
        CellularDistance::EuclideanSquared => {
            worley.set_distance_function(distance_functions::euclidean_squared)
        }
        CellularDistance::Manhattan => worley.set_distance_function(distance_functions::manhattan),
        CellularDistance::Chebyshev => worley.set_distance_function(distance_functions::chebyshev),
    };
    let worley = match settings.cellular_return {
        CellularReturn::CellValue => worley.set_return_type(ReturnType::Value),
        CellularReturn::Distance => worley.set_return_type(ReturnType::Distance),
    };
    Box::new(worley)
}

fn build_source(settings: &NoiseSettings) -> NoiseSource {
    match settings.noise_type {
        NoiseType::Perlin => fractal::<Perlin>(settings),
        NoiseType::OpenSimplex => fractal::<OpenSimplex>(settings),
        NoiseType::SuperSimplex => fractal::<SuperSimplex>(settings),
        NoiseType::Value => fractal::<Value>(settings),
        // Worley stays single-octave
        NoiseType::Cellular => cellular(settings),
    }
}

/// Noise-generated heightfield plus its u16 GPU mirror.
pub struct NoiseField {
    settings: NoiseSettings,
    source: NoiseSource,
    warp: [Perlin; 2],
    field: Heightfield,
    pixels: Vec<u16>,
    erosion: HydraulicErosion,
}

impl NoiseField {
    /// Build and immediately generate a `width` x `height` field.
    pub fn new(width: usize, height: usize, settings: NoiseSettings) -> Result<Self, TerrainError> {
        let mut noise = Self {
            source: build_source(&settings),
            warp: warp_fields(&settings),
            settings,
            field: Heightfield::new(width, height)?,
            pixels: Vec::new(),
            erosion: HydraulicErosion::new(width, height, EROSION_SEED)?,
        };
        noise.generate();
        Ok(noise)
    }

    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Swap in new settings and regenerate.
    pub fn set_settings(&mut self, settings: NoiseSettings) {
        self.settings = settings;
        self.source = build_source(&settings);
        self.warp = warp_fields(&settings);
        self.generate();
    }

    pub fn heightfield(&self) -> &Heightfield {
        &self.field
    }

    /// Heights quantized for the GPU height texture.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn erosion(&self) -> &HydraulicErosion {
        &self.erosion
    }

    pub fn erosion_mut(&mut self) -> &mut HydraulicErosion {
        &mut self.erosion
    }

    /// Mapped height at a cell coordinate, before the exponent is applied.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let (mut px, mut py) = (x, y);
        if self.settings.use_domain_warp {
            let f = self.settings.domain_frequency;
            let amp = self.settings.domain_warp_amp;
            px += amp * self.warp[0].get([x * f, y * f]);
            py += amp * self.warp[1].get([x * f, y * f]);
        }
        let f = self.settings.frequency;
        let n = self.source.get([px * f, py * f]);
        ((n + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Refill every cell from the noise source.
    pub fn generate(&mut self) {
        let width = self.field.width();
        let height = self.field.height();
        let exponent = self.settings.exponent;
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let h = self.sample(x as f64, y as f64) as f32;
                values.push(h.powf(exponent));
            }
        }
        // Sizes always agree: values was built from the field's own dimensions
        if let Err(e) = self.field.copy_from(&values) {
            log::error!("Noise generation produced a bad grid: {e}");
        }
        self.update_pixels();
    }

    /// Regenerate the noise, optionally followed by a full batch erosion.
    pub fn regenerate(&mut self, apply_erosion: bool) -> Result<(), TerrainError> {
        self.generate();
        if apply_erosion {
            self.apply_erosion()?;
        }
        Ok(())
    }

    /// Run one batch erosion over the current heights and keep the result.
    pub fn apply_erosion(&mut self) -> Result<(), TerrainError> {
        self.erosion.set_heightmap(self.field.values())?;
        self.erosion.simulate(None);
        self.field.copy_from(self.erosion.get_heightmap())?;
        self.update_pixels();
        Ok(())
    }

    /// Overwrite the heights, e.g. with the output of a real-time erosion.
    pub fn set_heights(&mut self, values: &[f32]) -> Result<(), TerrainError> {
        self.field.copy_from(values)?;
        self.update_pixels();
        Ok(())
    }

    /// Change the grid size, regenerate and resize the erosion engine to match.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), TerrainError> {
        self.field = Heightfield::new(width, height)?;
        self.generate();
        self.erosion.set_simulation_dims(width, height)?;
        self.erosion.set_heightmap(self.field.values())
    }

    fn update_pixels(&mut self) {
        self.pixels = self.field.to_u16_pixels();
    }
}

fn warp_fields(settings: &NoiseSettings) -> [Perlin; 2] {
    [
        Perlin::new(settings.domain_seed),
        Perlin::new(settings.domain_seed.wrapping_add(1)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erosion::ErosionSettings;

    fn in_unit_range(field: &Heightfield) -> bool {
        field.values().iter().all(|&v| (0.0..=1.0).contains(&v))
    }

    #[test]
    fn test_default_generation_in_range() {
        let noise = NoiseField::new(64, 64, NoiseSettings::default()).expect("valid");
        assert!(in_unit_range(noise.heightfield()));
        let (lo, hi) = noise.heightfield().min_max();
        assert!(hi > lo, "noise should not be constant");
        assert_eq!(noise.pixels().len(), 64 * 64);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = NoiseField::new(32, 32, NoiseSettings::default()).expect("valid");
        let b = NoiseField::new(32, 32, NoiseSettings::default()).expect("valid");
        assert_eq!(a.heightfield(), b.heightfield());
    }

    #[test]
    fn test_every_noise_type_in_range() {
        for noise_type in [
            NoiseType::Perlin,
            NoiseType::OpenSimplex,
            NoiseType::SuperSimplex,
            NoiseType::Value,
            NoiseType::Cellular,
        ] {
            for fractal_type in [
                FractalType::None,
                FractalType::FBm,
                FractalType::Ridged,
                FractalType::Billow,
            ] {
                let settings = NoiseSettings {
                    noise_type,
                    fractal_type,
                    frequency: 0.05,
                    ..Default::default()
                };
                let noise = NoiseField::new(16, 16, settings).expect("valid");
                assert!(
                    in_unit_range(noise.heightfield()),
                    "{noise_type:?}/{fractal_type:?} out of range"
                );
            }
        }
    }

    #[test]
    fn test_exponent_lowers_heights() {
        let base = NoiseField::new(32, 32, NoiseSettings::default()).expect("valid");
        let squared = NoiseField::new(
            32,
            32,
            NoiseSettings {
                exponent: 2.0,
                ..Default::default()
            },
        )
        .expect("valid");
        for (a, b) in base.heightfield().values().iter().zip(squared.heightfield().values()) {
            assert!((a * a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_domain_warp_changes_output() {
        let plain = NoiseField::new(32, 32, NoiseSettings::default()).expect("valid");
        let warped = NoiseField::new(
            32,
            32,
            NoiseSettings {
                use_domain_warp: true,
                domain_warp_amp: 40.0,
                domain_frequency: 0.03,
                ..Default::default()
            },
        )
        .expect("valid");
        assert_ne!(plain.heightfield(), warped.heightfield());
        assert!(in_unit_range(warped.heightfield()));
    }

    #[test]
    fn test_regenerate_with_erosion_differs() {
        let mut noise = NoiseField::new(48, 48, NoiseSettings::default()).expect("valid");
        noise.erosion_mut().set_settings(ErosionSettings {
            iterations: 500,
            ..Default::default()
        });
        noise.regenerate(false).expect("regenerate");
        let plain = noise.heightfield().clone();
        noise.regenerate(true).expect("regenerate");
        assert_ne!(&plain, noise.heightfield());
        assert!(in_unit_range(noise.heightfield()));
        assert_eq!(noise.pixels(), noise.heightfield().to_u16_pixels().as_slice());
    }

    #[test]
    fn test_resize_updates_erosion_dims() {
        let mut noise = NoiseField::new(16, 16, NoiseSettings::default()).expect("valid");
        noise.resize(40, 24).expect("valid dims");
        assert_eq!(noise.heightfield().width(), 40);
        assert_eq!(noise.pixels().len(), 40 * 24);
        assert_eq!(noise.erosion().get_heightmap(), noise.heightfield().values());
    }

    #[test]
    fn test_set_heights_mismatch() {
        let mut noise = NoiseField::new(8, 8, NoiseSettings::default()).expect("valid");
        assert!(matches!(
            noise.set_heights(&[0.5; 10]),
            Err(TerrainError::SizeMismatch { .. })
        ));
    }
}
