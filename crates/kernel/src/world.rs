use blobworld_common::{Vec2, WorldState};
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::config::WorldConfig;

/// Errors from building or stepping the world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("invalid initial state: {reason}")]
    InvalidInitialState { reason: String },
    #[error("invalid world config: {reason}")]
    InvalidConfig { reason: String },
    #[error("simulation fault at tick {tick}: {detail}")]
    SimulationFault { tick: u64, detail: String },
}

/// Avatar transitions across the boundary of the playable field.
///
/// Purely diagnostic: the sensor region exerts no force and nothing in the
/// simulation depends on these events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEvent {
    /// The avatar started overlapping the field during this tick.
    Entered { tick: u64 },
    /// The avatar stopped overlapping the field during this tick.
    Exited { tick: u64 },
}

/// A world that can be driven one fixed step at a time.
///
/// `WorldModel` is the implementation; the simulation loop is generic over
/// this so it can drive wrappers around it.
pub trait Simulation: Send + 'static {
    /// Overwrite the avatar's velocity, in world units per second.
    fn set_avatar_velocity(&mut self, velocity: Vec2);

    /// Advance one fixed timestep.
    fn step(&mut self) -> Result<&WorldState, KernelError>;

    /// State after the most recent step.
    fn current_state(&self) -> &WorldState;

    /// Drain pending field transitions.
    fn drain_events(&mut self) -> Vec<FieldEvent>;
}

/// The authoritative physics world.
///
/// One dynamic avatar, any number of dynamic hazards, static walls and a
/// sensor spanning the field. Owned by exactly one thread at a time; other
/// threads only ever see the `WorldState` snapshots it produces.
pub struct WorldModel {
    config: WorldConfig,
    world_width: f32,
    tick: u64,

    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,

    avatar: RigidBodyHandle,
    avatar_collider: ColliderHandle,
    hazards: Vec<RigidBodyHandle>,
    field_sensor: ColliderHandle,
    in_field: bool,

    state: WorldState,
    /// Field transitions not yet drained by the owner.
    event_log: Vec<FieldEvent>,
}

impl WorldModel {
    /// Build a world from an initial state with the default tuning.
    pub fn new(initial: WorldState, world_width: f32) -> Result<Self, KernelError> {
        Self::with_config(initial, world_width, WorldConfig::default())
    }

    /// Build a world from an initial state.
    ///
    /// Fails if any wall has a non-positive half-extent, if any position is
    /// not finite, or if the field width or config is unusable.
    pub fn with_config(
        initial: WorldState,
        world_width: f32,
        config: WorldConfig,
    ) -> Result<Self, KernelError> {
        config.validate()?;
        validate_initial(&initial, world_width)?;

        let ppm = config.pixels_per_meter;
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        for wall in initial.walls() {
            let body = bodies.insert(
                RigidBodyBuilder::fixed()
                    .translation(to_physics(wall.center, ppm))
                    .build(),
            );
            let half = to_physics(wall.half_extents, ppm);
            colliders.insert_with_parent(
                ColliderBuilder::cuboid(half.x, half.y).density(0.0).build(),
                body,
                &mut bodies,
            );
        }

        let hazard_radius = config.hazard_radius / ppm;
        let hazards = initial
            .hazards()
            .iter()
            .map(|&pos| {
                let body = bodies.insert(
                    RigidBodyBuilder::dynamic()
                        .translation(to_physics(pos, ppm))
                        .build(),
                );
                colliders.insert_with_parent(
                    ColliderBuilder::ball(hazard_radius).density(1.0).build(),
                    body,
                    &mut bodies,
                );
                body
            })
            .collect();

        let avatar = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(to_physics(initial.avatar(), ppm))
                .can_sleep(false)
                .build(),
        );
        let avatar_collider = colliders.insert_with_parent(
            ColliderBuilder::ball(config.avatar_radius / ppm)
                .density(1.0)
                .build(),
            avatar,
            &mut bodies,
        );

        let field_half = to_physics(Vec2::new(world_width, config.world_height) * 0.5, ppm);
        let field_body = bodies.insert(RigidBodyBuilder::fixed().translation(field_half).build());
        let field_sensor = colliders.insert_with_parent(
            ColliderBuilder::cuboid(field_half.x, field_half.y)
                .sensor(true)
                .build(),
            field_body,
            &mut bodies,
        );

        let mut params = IntegrationParameters::default();
        params.dt = config.fixed_dt;
        params.num_solver_iterations =
            NonZeroUsize::new(config.solver_iterations).unwrap_or(NonZeroUsize::MIN);

        tracing::debug!(
            walls = initial.walls().len(),
            hazards = initial.hazards().len(),
            world_width,
            "world built"
        );

        Ok(Self {
            config,
            world_width,
            tick: initial.tick(),
            gravity: vector![0.0, 0.0],
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            avatar,
            avatar_collider,
            hazards,
            field_sensor,
            in_field: false,
            state: initial,
            event_log: Vec::new(),
        })
    }

    /// Tuning values the world was built with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Width of the playable field, in world units.
    pub fn world_width(&self) -> f32 {
        self.world_width
    }

    /// Number of completed steps, counted from the initial state's tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Overwrite the avatar's velocity, in world units per second.
    ///
    /// No clamping happens here; bounding the drive is the input layer's job.
    pub fn set_avatar_velocity(&mut self, velocity: Vec2) {
        let ppm = self.config.pixels_per_meter;
        if let Some(body) = self.bodies.get_mut(self.avatar) {
            body.set_linvel(to_physics(velocity, ppm), true);
        }
    }

    /// Current avatar velocity, in world units per second.
    pub fn avatar_velocity(&self) -> Vec2 {
        self.bodies
            .get(self.avatar)
            .map_or(Vec2::ZERO, |body| {
                from_physics(body.linvel(), self.config.pixels_per_meter)
            })
    }

    /// Advance exactly one fixed timestep and refresh the cached state.
    ///
    /// A non-finite avatar velocity is refused before integration, and any
    /// non-finite position afterwards is reported; in both cases the cached
    /// state is left as it was.
    pub fn step(&mut self) -> Result<&WorldState, KernelError> {
        let velocity = self.avatar_velocity();
        if !velocity.is_finite() {
            return Err(KernelError::SimulationFault {
                tick: self.tick,
                detail: format!("avatar velocity is not finite: {velocity}"),
            });
        }

        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
        self.tick += 1;

        self.refresh_state()?;
        self.track_field();
        tracing::trace!(tick = self.tick, avatar = %self.state.avatar(), "stepped");
        Ok(&self.state)
    }

    /// State after the most recent step, or the initial state before any step.
    pub fn current_state(&self) -> &WorldState {
        &self.state
    }

    /// Drain and return pending field transitions.
    pub fn drain_events(&mut self) -> Vec<FieldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to pending field transitions.
    pub fn events(&self) -> &[FieldEvent] {
        &self.event_log
    }

    fn refresh_state(&mut self) -> Result<(), KernelError> {
        let ppm = self.config.pixels_per_meter;
        let position = |handle: RigidBodyHandle| {
            self.bodies
                .get(handle)
                .map(|body| from_physics(body.translation(), ppm))
        };

        let avatar = position(self.avatar).unwrap_or(Vec2::NAN);
        let hazards: Vec<Vec2> = self
            .hazards
            .iter()
            .map(|&h| position(h).unwrap_or(Vec2::NAN))
            .collect();

        if let Some(bad) = std::iter::once(avatar)
            .chain(hazards.iter().copied())
            .find(|p| !p.is_finite())
        {
            tracing::error!(tick = self.tick, position = %bad, "non-finite body position");
            return Err(KernelError::SimulationFault {
                tick: self.tick,
                detail: format!("body position is not finite: {bad}"),
            });
        }

        self.state = self.state.successor(self.tick, avatar, hazards);
        Ok(())
    }

    fn track_field(&mut self) {
        let inside = self
            .narrow_phase
            .intersection_pair(self.field_sensor, self.avatar_collider)
            .unwrap_or(false);
        if inside == self.in_field {
            return;
        }
        self.in_field = inside;
        let event = if inside {
            tracing::info!(tick = self.tick, "avatar entered the field");
            FieldEvent::Entered { tick: self.tick }
        } else {
            tracing::info!(tick = self.tick, "avatar left the field");
            FieldEvent::Exited { tick: self.tick }
        };
        self.event_log.push(event);
    }
}

impl Simulation for WorldModel {
    fn set_avatar_velocity(&mut self, velocity: Vec2) {
        WorldModel::set_avatar_velocity(self, velocity);
    }

    fn step(&mut self) -> Result<&WorldState, KernelError> {
        WorldModel::step(self)
    }

    fn current_state(&self) -> &WorldState {
        WorldModel::current_state(self)
    }

    fn drain_events(&mut self) -> Vec<FieldEvent> {
        WorldModel::drain_events(self)
    }
}

fn validate_initial(initial: &WorldState, world_width: f32) -> Result<(), KernelError> {
    let invalid = |reason: String| Err(KernelError::InvalidInitialState { reason });

    if !(world_width.is_finite() && world_width > 0.0) {
        return invalid(format!("world width must be positive, got {world_width}"));
    }
    if !initial.avatar().is_finite() {
        return invalid(format!("avatar position {} is not finite", initial.avatar()));
    }
    for (index, wall) in initial.walls().iter().enumerate() {
        if !wall.center.is_finite() || !wall.half_extents.is_finite() {
            return invalid(format!("wall {index} has non-finite geometry"));
        }
        if wall.half_extents.x <= 0.0 || wall.half_extents.y <= 0.0 {
            return invalid(format!(
                "wall {index} has non-positive half-extents {}",
                wall.half_extents
            ));
        }
    }
    if let Some(index) = initial.hazards().iter().position(|p| !p.is_finite()) {
        return invalid(format!("hazard {index} position is not finite"));
    }
    Ok(())
}

fn to_physics(v: Vec2, pixels_per_meter: f32) -> Vector<Real> {
    vector![v.x / pixels_per_meter, v.y / pixels_per_meter]
}

fn from_physics(v: &Vector<Real>, pixels_per_meter: f32) -> Vec2 {
    Vec2::new(v.x * pixels_per_meter, v.y * pixels_per_meter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobworld_common::StateBuilder;

    const WIDTH: f32 = 960.0;

    fn wall_level() -> WorldState {
        StateBuilder::new()
            .avatar(Vec2::new(100.0, 100.0))
            .wall(Vec2::new(200.0, 100.0), Vec2::new(20.0, 20.0))
            .build()
    }

    #[test]
    fn state_before_first_step_is_initial() {
        let initial = wall_level();
        let world = WorldModel::new(initial.clone(), WIDTH).unwrap();
        assert_eq!(world.current_state(), &initial);
        assert_eq!(world.tick(), 0);
    }

    #[test]
    fn zero_half_extent_is_rejected() {
        let initial = StateBuilder::new()
            .wall(Vec2::new(10.0, 10.0), Vec2::new(0.0, 5.0))
            .build();
        let result = WorldModel::new(initial, WIDTH);
        assert!(matches!(
            result,
            Err(KernelError::InvalidInitialState { .. })
        ));
    }

    #[test]
    fn negative_half_extent_is_rejected() {
        let initial = StateBuilder::new()
            .wall(Vec2::new(10.0, 10.0), Vec2::new(5.0, -1.0))
            .build();
        assert!(WorldModel::new(initial, WIDTH).is_err());
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let initial = StateBuilder::new().avatar(Vec2::new(f32::NAN, 0.0)).build();
        assert!(WorldModel::new(initial, WIDTH).is_err());

        let initial = StateBuilder::new().hazard(Vec2::INFINITY).build();
        assert!(WorldModel::new(initial, WIDTH).is_err());
    }

    #[test]
    fn bad_width_is_rejected() {
        assert!(WorldModel::new(wall_level(), 0.0).is_err());
        assert!(WorldModel::new(wall_level(), f32::NAN).is_err());
    }

    #[test]
    fn step_advances_tick_and_state() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();
        world.set_avatar_velocity(Vec2::new(50.0, 0.0));
        let state = world.step().unwrap();
        assert_eq!(state.tick(), 1);
        assert!(state.avatar().x > 100.0);
        assert!(state.avatar().x < 200.0 - 20.0);
        assert_eq!(world.tick(), 1);
    }

    #[test]
    fn avatar_at_rest_stays_put() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();
        for _ in 0..120 {
            world.step().unwrap();
        }
        assert_eq!(world.current_state().avatar(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn idle_avatar_never_sleeps() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();
        // Twenty seconds of simulated time, well past any sleep threshold.
        for _ in 0..1200 {
            world.step().unwrap();
            assert!(!world.bodies[world.avatar].is_sleeping());
        }

        world.set_avatar_velocity(Vec2::new(0.0, 60.0));
        for _ in 0..30 {
            world.step().unwrap();
        }
        assert!(world.current_state().avatar().y > 100.0 + 20.0);
    }

    #[test]
    fn wall_stops_the_avatar() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();
        let radius = world.config().avatar_radius;
        let contact_x = 200.0 - 20.0 - radius;
        let tolerance = 2.0;

        for _ in 0..240 {
            world.set_avatar_velocity(Vec2::new(50.0, 0.0));
            let x = world.step().unwrap().avatar().x;
            assert!(x > 100.0);
            assert!(x <= contact_x + tolerance, "penetrated the wall: x = {x}");
        }

        let avatar = world.current_state().avatar();
        assert!(avatar.x > contact_x - tolerance, "never reached the wall: x = {}", avatar.x);
        assert!((avatar.y - 100.0).abs() < 1.0);
        // The solver arrests the commanded drive into the wall.
        assert!(world.avatar_velocity().x < 25.0);
    }

    #[test]
    fn identical_commands_give_identical_states() {
        let level = StateBuilder::new()
            .avatar(Vec2::new(120.0, 180.0))
            .hazard(Vec2::new(220.0, 190.0))
            .hazard(Vec2::new(300.0, 150.0))
            .wall(Vec2::new(480.0, 10.0), Vec2::new(480.0, 10.0))
            .wall(Vec2::new(400.0, 200.0), Vec2::new(15.0, 60.0))
            .build();
        let commands: Vec<Vec2> = (0..300)
            .map(|i| {
                let t = i as f32 * 0.05;
                Vec2::new(t.cos() * 200.0, t.sin() * 120.0)
            })
            .collect();

        let run = || {
            let mut world = WorldModel::new(level.clone(), WIDTH).unwrap();
            let mut hashes = Vec::with_capacity(commands.len());
            for &command in &commands {
                world.set_avatar_velocity(command);
                hashes.push(world.step().unwrap().state_hash());
            }
            (hashes, world.current_state().clone())
        };

        let (hashes_a, final_a) = run();
        let (hashes_b, final_b) = run();
        assert_eq!(hashes_a, hashes_b);
        assert_eq!(final_a, final_b);
    }

    #[test]
    fn avatar_pushes_hazards() {
        let initial = StateBuilder::new()
            .avatar(Vec2::new(100.0, 100.0))
            .hazard(Vec2::new(160.0, 100.0))
            .build();
        let mut world = WorldModel::new(initial, WIDTH).unwrap();
        for _ in 0..120 {
            world.set_avatar_velocity(Vec2::new(100.0, 0.0));
            world.step().unwrap();
        }
        let state = world.current_state();
        assert_eq!(state.hazards().len(), 1);
        assert!(state.hazards()[0].x > 160.0);
    }

    #[test]
    fn field_events_track_the_avatar() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();

        world.step().unwrap();
        assert_eq!(world.drain_events(), vec![FieldEvent::Entered { tick: 1 }]);

        for _ in 0..20 {
            world.set_avatar_velocity(Vec2::new(-2000.0, 0.0));
            world.step().unwrap();
        }
        let events = world.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FieldEvent::Exited { .. }));
        assert!(world.current_state().avatar().x < -world.config().avatar_radius);
        assert!(world.events().is_empty());
    }

    #[test]
    fn non_finite_velocity_is_a_fault() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();
        world.set_avatar_velocity(Vec2::new(f32::NAN, 0.0));
        let err = world.step().unwrap_err();
        assert!(matches!(err, KernelError::SimulationFault { tick: 0, .. }));
        assert_eq!(world.current_state(), &wall_level());
    }

    #[test]
    fn velocity_is_in_world_units() {
        let mut world = WorldModel::new(wall_level(), WIDTH).unwrap();
        world.set_avatar_velocity(Vec2::new(30.0, -12.0));
        let v = world.avatar_velocity();
        assert!((v - Vec2::new(30.0, -12.0)).length() < 1e-4);
    }
}
