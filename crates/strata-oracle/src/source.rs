use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use serde::Deserialize;

use crate::surface::{Rgba, SurfaceKind};

/// Raw data for one integer sample of the heightfield.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SourceSample {
    pub elevation: f32,
    pub surface: SurfaceKind,
    pub color: Rgba,
}

/// Producer behind the page cache. Called from worker threads.
pub trait HeightSource: Send + Sync {
    fn sample(&self, ix: i32, iz: i32) -> SourceSample;
}

impl<F> HeightSource for F
where
    F: Fn(i32, i32) -> SourceSample + Send + Sync,
{
    fn sample(&self, ix: i32, iz: i32) -> SourceSample {
        self(ix, iz)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NoiseSourceParams {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
    #[serde(default = "default_sand_ratio")]
    pub sand_ratio: f32,
    #[serde(default = "default_rock_ratio")]
    pub rock_ratio: f32,
    #[serde(default = "default_snow_ratio")]
    pub snow_ratio: f32,
}
fn default_seed() -> i32 {
    1337
}
fn default_frequency() -> f32 {
    0.004
}
fn default_amplitude() -> f32 {
    48.0
}
fn default_sand_ratio() -> f32 {
    0.18
}
fn default_rock_ratio() -> f32 {
    0.62
}
fn default_snow_ratio() -> f32 {
    0.82
}
impl Default for NoiseSourceParams {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            frequency: default_frequency(),
            amplitude: default_amplitude(),
            sand_ratio: default_sand_ratio(),
            rock_ratio: default_rock_ratio(),
            snow_ratio: default_snow_ratio(),
        }
    }
}

/// Small fractal-noise heightfield with elevation-banded surfaces.
/// Stand-in for a real world generator in demos and benches.
pub struct NoiseSource {
    params: NoiseSourceParams,
    height: FastNoiseLite,
    patches: FastNoiseLite,
}

impl NoiseSource {
    pub fn new(params: NoiseSourceParams) -> Self {
        let mut height = FastNoiseLite::with_seed(params.seed);
        height.set_noise_type(Some(NoiseType::OpenSimplex2));
        height.set_frequency(Some(params.frequency));
        height.set_fractal_type(Some(FractalType::FBm));
        height.set_fractal_octaves(Some(5));
        let mut patches = FastNoiseLite::with_seed(params.seed ^ 0x5EED_0F1);
        patches.set_noise_type(Some(NoiseType::OpenSimplex2));
        patches.set_frequency(Some(params.frequency * 6.0));
        Self {
            params,
            height,
            patches,
        }
    }

    fn classify(&self, t: f32, patch: f32) -> SurfaceKind {
        let p = &self.params;
        if t < p.sand_ratio {
            SurfaceKind::Sand
        } else if t > p.snow_ratio {
            SurfaceKind::Snow
        } else if t > p.rock_ratio {
            SurfaceKind::Rock
        } else if patch > 0.35 {
            SurfaceKind::Dirt
        } else {
            SurfaceKind::Grass
        }
    }
}

impl HeightSource for NoiseSource {
    fn sample(&self, ix: i32, iz: i32) -> SourceSample {
        let (x, z) = (ix as f32, iz as f32);
        let t = ((self.height.get_noise_2d(x, z) + 1.0) * 0.5).clamp(0.0, 1.0);
        let patch = self.patches.get_noise_2d(x, z);
        let surface = self.classify(t, patch);
        SourceSample {
            elevation: t * self.params.amplitude,
            surface,
            color: surface.base_color().scaled(0.8 + 0.4 * t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_source_is_deterministic_and_bounded() {
        let params = NoiseSourceParams::default();
        let amplitude = params.amplitude;
        let a = NoiseSource::new(params.clone());
        let b = NoiseSource::new(params);
        for (ix, iz) in [(0, 0), (-17, 4), (1024, -2048), (7, 7)] {
            let sa = a.sample(ix, iz);
            assert_eq!(sa, b.sample(ix, iz));
            assert!((0.0..=amplitude).contains(&sa.elevation));
        }
    }

    #[test]
    fn closures_are_sources() {
        let flat = |_: i32, _: i32| SourceSample {
            elevation: 3.0,
            ..SourceSample::default()
        };
        assert_eq!(flat.sample(5, -5).elevation, 3.0);
    }
}
