use std::f32::consts::TAU;

use rand::Rng;

use super::{
    color::Rgb,
    surface::{Point, Surface},
};
use crate::config::VisualConfig;

/// Short-lived decorative point moving in a straight line at constant speed.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Point,
    pub angle: f32,
    pub speed: f32,
    pub life: u32,
    pub color: Rgb,
    pub size: f32,
}

/// Bounded particle pool. Storage is reserved up front and never grows past
/// `capacity`; spawns on a full pool are dropped.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    capacity: usize,
    initial_life: u32,
    speed_min: f32,
    speed_max: f32,
    size: f32,
}

impl ParticleSystem {
    pub fn new(capacity: usize, initial_life: u32, speed_range: (f32, f32), size: f32) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
            initial_life: initial_life.max(1),
            speed_min: speed_range.0,
            speed_max: speed_range.1.max(speed_range.0),
            size,
        }
    }

    pub fn from_config(config: &VisualConfig) -> Self {
        Self::new(
            config.max_particles,
            config.particle_life,
            (config.particle_speed_min, config.particle_speed_max),
            config.point_size * config.particle_size_factor,
        )
    }

    /// Adds a particle at `position` heading in a random direction. Returns
    /// `false` when the pool is full.
    pub fn spawn(&mut self, position: Point, color: Rgb, rng: &mut impl Rng) -> bool {
        if self.particles.len() >= self.capacity {
            return false;
        }

        let angle = rng.gen::<f32>() * TAU;
        let speed = self.speed_min + rng.gen::<f32>() * (self.speed_max - self.speed_min);
        self.particles.push(Particle {
            position,
            angle,
            speed,
            life: self.initial_life,
            color,
            size: self.size,
        });
        true
    }

    /// Advances every particle one frame, draws the survivors with opacity
    /// proportional to their remaining life and retires the expired ones.
    pub fn step<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        let initial_life = self.initial_life as f32;
        self.particles.retain_mut(|particle| {
            particle.position.x += particle.angle.cos() * particle.speed;
            particle.position.y += particle.angle.sin() * particle.speed;
            particle.life = particle.life.saturating_sub(1);

            if particle.life == 0 {
                return false;
            }

            let alpha = particle.life as f32 / initial_life;
            surface.fill_circle(particle.position, particle.size, particle.color.with_alpha(alpha));
            true
        });
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
