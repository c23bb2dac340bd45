use serde::{Deserialize, Serialize};

use crate::world::KernelError;

/// Tuning values for the physics world.
///
/// Positions and velocities outside the kernel are in world units (pixels);
/// the physics engine works in meters, `pixels_per_meter` apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Simulated seconds per step.
    pub fixed_dt: f32,
    pub pixels_per_meter: f32,
    /// Height of the playable field; its width is given per level.
    pub world_height: f32,
    pub avatar_radius: f32,
    pub hazard_radius: f32,
    /// Constraint solver iterations per step.
    pub solver_iterations: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            pixels_per_meter: 10.0,
            world_height: 360.0,
            avatar_radius: 30.0,
            hazard_radius: 20.0,
            solver_iterations: 8,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), KernelError> {
        let positive = [
            ("fixed_dt", self.fixed_dt),
            ("pixels_per_meter", self.pixels_per_meter),
            ("world_height", self.world_height),
            ("avatar_radius", self.avatar_radius),
            ("hazard_radius", self.hazard_radius),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(KernelError::InvalidConfig {
                    reason: format!("{name} must be positive and finite, got {value}"),
                });
            }
        }
        if self.solver_iterations == 0 {
            return Err(KernelError::InvalidConfig {
                reason: "solver_iterations must be at least 1".into(),
            });
        }
        Ok(())
    }
}
