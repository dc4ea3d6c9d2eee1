use std::f32::consts::TAU;
use std::path::Path;

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use image::{ImageBuffer, Luma};
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{FractalKind, HeightSettings, HeightStrategy};
use crate::error::{GenerationError, RenderError};

/// Большой и малый радиусы тора, на который натягивается карта.
const TORUS_MAJOR: f32 = 2.0;
const TORUS_MINOR: f32 = 1.0;

/// Карта высот по строкам: после нормализации от 0.0 (низ) до 1.0 (верх).
#[derive(Debug, Clone)]
pub struct Heightmap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Heightmap {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Приводит все значения к `[0, 1]`. Плоская карта становится нулевой.
    pub fn normalize(&mut self) {
        let min_h = self
            .data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f32::INFINITY, f32::min);
        let max_h = self
            .data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f32::NEG_INFINITY, f32::max);

        let range = max_h - min_h;
        if !(range.is_finite() && range > 0.0) {
            self.data.fill(0.0);
            return;
        }
        for h in &mut self.data {
            *h = if h.is_finite() {
                ((*h - min_h) / range).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
    }

    #[must_use]
    pub fn to_grayscale_image(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect()
    }

    pub fn save_as_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let (width, height) = (self.width as u32, self.height as u32);
        let img: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, self.to_grayscale_image())
                .ok_or(RenderError::Buffer { width, height })?;
        img.save(path)?;
        Ok(())
    }
}

/// Synthesizes a normalized `size × size` height field.
///
/// При `wrap` шумовая карта бесшовно замыкается по обеим осям.
pub fn generate_heightmap(
    size: usize,
    seed: u64,
    settings: &HeightSettings,
    wrap: bool,
    rng: &mut impl Rng,
) -> Result<Heightmap, GenerationError> {
    if size == 0 {
        return Err(GenerationError::InvalidConfig(
            "height field size must be positive".into(),
        ));
    }

    let mut heightmap = match settings.strategy {
        HeightStrategy::Noise => noise_heightmap(size, size, seed, settings, wrap),
        HeightStrategy::Plasma => {
            let corners = if settings.surrounded_by_water {
                [0.0; 4]
            } else {
                [
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                ]
            };
            plasma_heightmap(
                size,
                size,
                corners,
                settings.roughness,
                settings.variability,
                rng,
            )
        }
    };

    heightmap.normalize();
    Ok(heightmap)
}

fn build_noise(seed: u64, settings: &HeightSettings) -> FastNoiseLite {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(seed as i32));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_fractal_type(Some(match settings.fractal {
        FractalKind::FBm => FractalType::FBm,
        FractalKind::Ridged => FractalType::Ridged,
    }));
    noise.set_fractal_octaves(Some(settings.octaves as i32));
    noise.set_frequency(Some(settings.frequency));
    noise
}

/// Сырая (ненормализованная) шумовая карта, одна задача на столбец.
#[must_use]
pub fn noise_heightmap(
    width: usize,
    height: usize,
    seed: u64,
    settings: &HeightSettings,
    wrap: bool,
) -> Heightmap {
    let noise = build_noise(seed, settings);
    let sample = |x: usize| sample_column(&noise, x, width, height, wrap);

    #[cfg(feature = "parallel")]
    let columns: Vec<Vec<f32>> = (0..width).into_par_iter().map(sample).collect();
    #[cfg(not(feature = "parallel"))]
    let columns: Vec<Vec<f32>> = (0..width).map(sample).collect();

    let mut heightmap = Heightmap::new(width, height);
    for (x, column) in columns.into_iter().enumerate() {
        for (y, value) in column.into_iter().enumerate() {
            heightmap.set(x, y, value);
        }
    }
    heightmap
}

fn sample_column(
    noise: &FastNoiseLite,
    x: usize,
    width: usize,
    height: usize,
    wrap: bool,
) -> Vec<f32> {
    let s = x as f32 / width as f32;
    (0..height)
        .map(|y| {
            let t = y as f32 / height as f32;
            if wrap {
                // Обе доли идут по окружности, поэтому противоположные края сходятся.
                let (sin_a, cos_a) = (s * TAU).sin_cos();
                let (sin_b, cos_b) = (t * TAU).sin_cos();
                let ring = TORUS_MAJOR + TORUS_MINOR * cos_b;
                noise.get_noise_3d(ring * cos_a, ring * sin_a, TORUS_MINOR * sin_b)
            } else {
                let span = TAU * TORUS_MAJOR;
                noise.get_noise_2d(s * span, t * span)
            }
        })
        .collect()
}

/// Сырая карта смещения средней точки из четырёх угловых значений
/// (левый верхний, правый верхний, левый нижний, правый нижний).
pub fn plasma_heightmap(
    width: usize,
    height: usize,
    corners: [f32; 4],
    roughness: f32,
    variability: f32,
    rng: &mut impl Rng,
) -> Heightmap {
    let mut plasma = Plasma {
        map: Heightmap::new(width, height),
        written: vec![false; width * height],
        variability,
    };

    let (x1, y1) = (width - 1, height - 1);
    plasma.set_once(0, 0, corners[0]);
    plasma.set_once(x1, 0, corners[1]);
    plasma.set_once(0, y1, corners[2]);
    plasma.set_once(x1, y1, corners[3]);
    plasma.subdivide(0, 0, x1, y1, roughness, rng);
    plasma.map
}

struct Plasma {
    map: Heightmap,
    written: Vec<bool>,
    variability: f32,
}

impl Plasma {
    fn set_once(&mut self, x: usize, y: usize, value: f32) {
        let idx = y * self.map.width + x;
        if !self.written[idx] {
            self.written[idx] = true;
            self.map.data[idx] = value;
        }
    }

    fn subdivide(
        &mut self,
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
        displacement: f32,
        rng: &mut impl Rng,
    ) {
        if x1 - x0 < 2 && y1 - y0 < 2 {
            return;
        }

        let tl = self.map.get(x0, y0);
        let tr = self.map.get(x1, y0);
        let bl = self.map.get(x0, y1);
        let br = self.map.get(x1, y1);

        let mx = (x0 + x1) / 2;
        let my = (y0 + y1) / 2;

        let offset = if displacement > 0.0 {
            rng.gen_range(-0.5..0.5) * displacement
        } else {
            0.0
        };
        self.set_once(mx, my, (tl + tr + bl + br) / 4.0 + offset);
        self.set_once(mx, y0, (tl + tr) / 2.0);
        self.set_once(mx, y1, (bl + br) / 2.0);
        self.set_once(x0, my, (tl + bl) / 2.0);
        self.set_once(x1, my, (tr + br) / 2.0);

        let next = displacement / self.variability;
        self.subdivide(x0, y0, mx, my, next, rng);
        self.subdivide(mx, y0, x1, my, next, rng);
        self.subdivide(x0, my, mx, y1, next, rng);
        self.subdivide(mx, my, x1, y1, next, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn assert_normalized(map: &Heightmap) {
        assert!(map.data.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
        let min = map.data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = map.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!(min.abs() < 1e-6, "min {min}");
        assert!((max - 1.0).abs() < 1e-6, "max {max}");
    }

    #[test]
    fn test_noise_field_is_normalized() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for wrap in [true, false] {
            let map = generate_heightmap(48, 7, &HeightSettings::default(), wrap, &mut rng).unwrap();
            assert_eq!(map.data.len(), 48 * 48);
            assert_normalized(&map);
        }
    }

    #[test]
    fn test_plasma_field_is_normalized() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let settings = HeightSettings {
            strategy: HeightStrategy::Plasma,
            ..Default::default()
        };
        let map = generate_heightmap(33, 11, &settings, false, &mut rng).unwrap();
        assert_normalized(&map);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let settings = HeightSettings::default();
        let a = noise_heightmap(16, 16, 99, &settings, true);
        let b = noise_heightmap(16, 16, 99, &settings, true);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_plasma_without_roughness_is_monotone() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let map = plasma_heightmap(21, 17, [0.0, 0.0, 0.0, 1.0], 0.0, 2.0, &mut rng);
        for y in 0..17 {
            for x in 0..21 {
                if x + 1 < 21 {
                    assert!(map.get(x, y) <= map.get(x + 1, y) + 1e-6);
                }
                if y + 1 < 17 {
                    assert!(map.get(x, y) <= map.get(x, y + 1) + 1e-6);
                }
            }
        }
        assert_eq!(map.get(20, 16), 1.0);
        assert_eq!(map.get(0, 0), 0.0);
    }

    #[test]
    fn test_flat_field_normalizes_to_zero() {
        let mut map = Heightmap::new(4, 4);
        map.data.fill(0.3);
        map.normalize();
        assert!(map.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(generate_heightmap(0, 0, &HeightSettings::default(), true, &mut rng).is_err());
    }
}
