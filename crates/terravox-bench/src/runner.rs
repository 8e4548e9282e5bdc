use std::time::Instant;

use terravox_app::{AppConfig, AppContext};
use terravox_render::VoxelParams;
use terravox_terrain::{HydraulicErosion, NoiseField, SessionState, TerrainSettings};

use crate::scenes::{ScenarioConfig, ScenarioKind};

/// Seed shared by every erosion sample so runs are comparable.
const BENCH_SEED: u64 = 1337;

/// Timing data for a single benchmark run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Result of a single scenario benchmark.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkResult {
    pub scenario_name: String,
    pub grid_size: usize,
    pub work_units: u32,
    pub sample_count: u32,
    pub timings: TimingSeries,
}

/// Runs scenarios natively. GPU scenarios are skipped without an adapter.
pub struct BenchmarkRunner {
    samples: u32,
}

impl BenchmarkRunner {
    pub fn new(samples: u32) -> Self {
        Self {
            samples: samples.max(1),
        }
    }

    /// Run one scenario. `None` when it cannot run on this machine.
    pub fn run_scenario(&self, config: &ScenarioConfig) -> Option<BenchmarkResult> {
        log::info!(
            "Running scenario '{}' ({}x{} grid, {} units)...",
            config.name,
            config.grid_size,
            config.grid_size,
            config.work_units
        );

        let times = match config.kind {
            ScenarioKind::ErosionBatch => self.time_erosion(config, false),
            ScenarioKind::ErosionIncremental => self.time_erosion(config, true),
            ScenarioKind::Voxelize => self.time_voxelize(config),
        }?;

        let timings = compute_timings(&times);
        log::info!(
            "  Done: mean={:.2}ms, p95={:.2}ms, p99={:.2}ms",
            timings.mean_ms,
            timings.p95_ms,
            timings.p99_ms
        );

        Some(BenchmarkResult {
            scenario_name: config.name.clone(),
            grid_size: config.grid_size,
            work_units: config.work_units,
            sample_count: times.len() as u32,
            timings,
        })
    }

    fn time_erosion(&self, config: &ScenarioConfig, incremental: bool) -> Option<Vec<f64>> {
        let size = config.grid_size;
        let noise = match NoiseField::new(size, size, config.noise) {
            Ok(noise) => noise,
            Err(e) => {
                log::error!("  Skipped: {e}");
                return None;
            }
        };
        let initial = noise.heightfield().values().to_vec();

        let mut times = Vec::with_capacity(self.samples as usize);
        for _ in 0..self.samples {
            let mut erosion = HydraulicErosion::new(size, size, BENCH_SEED)
                .ok()?
                .with_settings(config.erosion);
            erosion.new_simulation(&initial, size, size).ok()?;

            let start = Instant::now();
            if incremental {
                while erosion.step_simulation() == SessionState::Active {}
            } else {
                erosion.simulate(Some(config.work_units));
            }
            times.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        Some(times)
    }

    fn time_voxelize(&self, config: &ScenarioConfig) -> Option<Vec<f64>> {
        let gpu = match pollster::block_on(terravox_app::init_headless()) {
            Ok(gpu) => gpu,
            Err(e) => {
                log::warn!("  Skipped: {e}");
                return None;
            }
        };
        let app_config = AppConfig {
            width: 640,
            height: 480,
            noise: config.noise,
            terrain: TerrainSettings {
                size: config.grid_size,
                ..Default::default()
            },
            voxels: VoxelParams {
                resolution: config.work_units,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut app = match AppContext::new(gpu, app_config) {
            Ok(app) => app,
            Err(e) => {
                log::error!("  Skipped: {e}");
                return None;
            }
        };

        // Warm-up frame uploads heights and builds bindings
        app.frame().ok()?;
        app.gpu().device.poll(wgpu::Maintain::Wait);

        let mut times = Vec::with_capacity(self.samples as usize);
        for _ in 0..self.samples {
            app.mark_scene_dirty();
            let start = Instant::now();
            let report = app.frame().ok()?;
            app.gpu().device.poll(wgpu::Maintain::Wait);
            times.push(start.elapsed().as_secs_f64() * 1000.0);

            if let Some(err) = report.voxelize.and_then(|v| v.gpu_error) {
                log::warn!("  GPU error during sample: {err}");
            }
        }
        Some(times)
    }
}

/// Compute timing statistics from a list of sample times in milliseconds.
pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;
    let p99_idx = ((n as f64) * 0.99).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        p99_ms: sorted[p99_idx.min(n - 1)],
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}
