use glam::Vec2;
use rand::distributions::{Distribution, Uniform};
use rand_chacha::ChaCha8Rng;
use terravox_core::constants::DROPLET_MIN_WATER;
use terravox_core::math::{bilinear_weights, cell_and_fraction};

use super::settings::ErosionSettings;
use crate::heightfield::Heightfield;

/// A water particle carrying sediment across the heightfield.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Droplet {
    /// Continuous grid coordinates.
    pub position: Vec2,
    /// Unit vector, or zero before the first step.
    pub direction: Vec2,
    pub velocity: f32,
    pub water: f32,
    pub sediment: f32,
    pub steps_taken: u32,
    pub alive: bool,
}

impl Droplet {
    pub fn spawn(position: Vec2, settings: &ErosionSettings) -> Self {
        Self {
            position,
            direction: Vec2::ZERO,
            velocity: settings.start_velocity,
            water: settings.start_water,
            sediment: 0.0,
            steps_taken: 0,
            alive: true,
        }
    }

    /// Advance one micro-step. A retired droplet is left untouched and never
    /// writes to the heightfield.
    pub fn step(
        &mut self,
        field: &mut Heightfield,
        settings: &ErosionSettings,
        rng: &mut ChaCha8Rng,
        angle: &Uniform<f32>,
    ) {
        if !self.alive {
            return;
        }

        let old_pos = self.position;
        let gradient = field.bilinear_gradient(old_pos);

        let blended = self.direction * settings.inertia - gradient * (1.0 - settings.inertia);
        self.direction = if blended.length_squared() == 0.0 {
            let theta = angle.sample(rng);
            Vec2::new(theta.cos(), theta.sin())
        } else {
            blended.normalize()
        };

        let new_pos = old_pos + self.direction;
        if !field.contains_sample(new_pos) {
            self.alive = false;
            return;
        }
        self.position = new_pos;

        let height_delta = field.bilinear_height(new_pos) - field.bilinear_height(old_pos);
        let capacity =
            (-height_delta).max(settings.min_slope) * self.velocity * self.water * settings.capacity;

        if self.sediment > capacity || height_delta > 0.0 {
            let amount = if height_delta > 0.0 {
                height_delta.min(self.sediment)
            } else {
                (self.sediment - capacity) * settings.deposit_speed
            };
            self.sediment -= deposit_bilinear(field, old_pos, amount);
        } else {
            let amount = ((capacity - self.sediment) * settings.erode_speed).min(-height_delta);
            self.sediment += erode_disc(field, old_pos, amount, settings.erosion_radius);
        }

        self.velocity = (self.velocity * self.velocity + height_delta * settings.gravity)
            .max(0.0)
            .sqrt();
        self.water *= 1.0 - settings.evaporate_speed;
        self.steps_taken += 1;

        if self.water < DROPLET_MIN_WATER || self.steps_taken >= settings.max_lifetime {
            self.alive = false;
        }
    }
}

/// Add `amount` to the four cells around `pos`, split by bilinear weight.
///
/// Returns the height actually applied, which differs from `amount` only
/// when a cell clamps at the [0, 1] bounds.
pub fn deposit_bilinear(field: &mut Heightfield, pos: Vec2, amount: f32) -> f32 {
    let ((x, y), frac) = cell_and_fraction(pos);
    let w = bilinear_weights(frac);
    let cells = [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)];
    let mut applied = 0.0;
    for ((cx, cy), weight) in cells.into_iter().zip(w) {
        if weight > 0.0 {
            // Writes outside the grid are rejected and already logged
            applied += field.add(cx, cy, amount * weight).unwrap_or(0.0);
        }
    }
    applied
}

/// Remove `amount` from every cell within `radius` of `pos`, weighted by
/// `radius - distance` and normalized so the weights sum to one.
///
/// Returns the height actually removed, which falls short of `amount` only
/// when a cell bottoms out at zero.
pub fn erode_disc(field: &mut Heightfield, pos: Vec2, amount: f32, radius: u32) -> f32 {
    if amount <= 0.0 {
        return 0.0;
    }

    let r = radius as f32;
    let max_x = field.width() as i64 - 1;
    let max_y = field.height() as i64 - 1;
    let x0 = ((pos.x - r).floor() as i64).max(0);
    let x1 = ((pos.x + r).ceil() as i64).min(max_x);
    let y0 = ((pos.y - r).floor() as i64).max(0);
    let y1 = ((pos.y + r).ceil() as i64).min(max_y);

    let mut brush: Vec<(i64, i64, f32)> = Vec::new();
    let mut weight_sum = 0.0;
    for cy in y0..=y1 {
        for cx in x0..=x1 {
            let dist = pos.distance(Vec2::new(cx as f32, cy as f32));
            let weight = r - dist;
            if weight > 0.0 {
                brush.push((cx, cy, weight));
                weight_sum += weight;
            }
        }
    }

    if weight_sum <= 0.0 {
        // Zero radius: fall back to the bilinear footprint
        return -deposit_bilinear(field, pos, -amount);
    }

    let mut removed = 0.0;
    for (cx, cy, weight) in brush {
        let applied = field.add(cx, cy, -amount * weight / weight_sum).unwrap_or(0.0);
        removed -= applied;
    }
    removed
}
