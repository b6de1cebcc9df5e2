//! Tile-grid kinematics shared by the player, enemies and projectiles.
//!
//! Dynamic bodies fall under gravity and are pushed out of solid tiles one axis at a time.
//! Kinematic bodies (fliers, stars) just follow their velocity; whatever they touch is handled
//! by the combat systems.

use bevy::prelude::*;
use serde::Deserialize;

use crate::collision::{collision_map_ready, Collider, CollisionMap};
use crate::state::{GameSet, GameState};

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MovementSettings>().add_systems(
            Update,
            apply_kinematics
                .in_set(GameSet::Movement)
                .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
        );
    }
}

/// Global downward acceleration and fall speed cap, in units per second.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    pub gravity: f32,
    pub terminal_velocity: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: 2100.0,
            terminal_velocity: -1800.0,
        }
    }
}

#[derive(Component, Default, Deref, DerefMut, Debug, Clone, Copy)]
pub struct Velocity(pub Vec2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Gravity plus tile collision.
    Dynamic,
    /// Moves by velocity only.
    Kinematic,
}

#[derive(Component, Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub on_ground: bool,
    /// Upward speed applied at the start of the next step.
    pub impulse: Option<f32>,
}

impl Body {
    pub fn dynamic() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            on_ground: false,
            impulse: None,
        }
    }

    pub fn kinematic() -> Self {
        Self {
            kind: BodyKind::Kinematic,
            on_ground: false,
            impulse: None,
        }
    }

    pub fn jump(&mut self, force: f32) {
        self.impulse = Some(force);
    }
}

fn apply_kinematics(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    collision_map: Res<CollisionMap>,
    mut query: Query<(&mut Transform, &mut Velocity, &mut Body, &Collider)>,
) {
    let dt = time.delta_seconds();

    for (mut transform, mut velocity, mut body, collider) in &mut query {
        let mut position = transform.translation;
        step_body(
            &mut position,
            &mut velocity.0,
            &mut body,
            collider,
            dt,
            &settings,
            &collision_map,
        );
        transform.translation = position;
    }
}

/// Advances one body by `dt`. `position` is the entity translation; the collider's offset places
/// the hit box relative to it.
pub fn step_body(
    position: &mut Vec3,
    velocity: &mut Vec2,
    body: &mut Body,
    collider: &Collider,
    dt: f32,
    settings: &MovementSettings,
    map: &CollisionMap,
) {
    if body.kind == BodyKind::Kinematic {
        position.x += velocity.x * dt;
        position.y += velocity.y * dt;
        return;
    }

    if let Some(force) = body.impulse.take() {
        velocity.y = force;
        body.on_ground = false;
    }

    // Gravity also applies while grounded so the floor is probed every step.
    velocity.y -= settings.gravity * dt;
    if velocity.y < settings.terminal_velocity {
        velocity.y = settings.terminal_velocity;
    }

    let half = collider.half_extents;
    let mut center = position.truncate() + collider.offset;
    let falling = velocity.y < 0.0;

    sweep(&mut center, half, &mut velocity.x, dt, Axis::X, map);
    let blocked = sweep(&mut center, half, &mut velocity.y, dt, Axis::Y, map);
    body.on_ground = blocked && falling;

    position.x = center.x - collider.offset.x;
    position.y = center.y - collider.offset.y;
}

const SKIN: f32 = 0.001;

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    /// Component along the axis of motion.
    fn along(self, v: Vec2) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }

    fn across(self, v: Vec2) -> f32 {
        match self {
            Axis::X => v.y,
            Axis::Y => v.x,
        }
    }

    fn tile(self, along: i32, across: i32) -> IVec2 {
        match self {
            Axis::X => IVec2::new(along, across),
            Axis::Y => IVec2::new(across, along),
        }
    }

    fn set(self, v: &mut Vec2, value: f32) {
        match self {
            Axis::X => v.x = value,
            Axis::Y => v.y = value,
        }
    }
}

/// Moves the box at `center` along `axis` by `speed * dt`, stopping flush against the first solid
/// tile in the way. Returns `true` when blocked; the speed along the axis is zeroed then.
fn sweep(
    center: &mut Vec2,
    half: Vec2,
    speed: &mut f32,
    dt: f32,
    axis: Axis,
    map: &CollisionMap,
) -> bool {
    if speed.abs() < f32::EPSILON {
        return false;
    }

    let tile_len = axis.along(map.tile_size);
    let tile_width = axis.across(map.tile_size);
    let origin_along = axis.along(map.origin);
    let origin_across = axis.across(map.origin);

    let dir = speed.signum();
    let target = axis.along(*center) + *speed * dt;
    let leading_edge = target + dir * axis.along(half);
    let line = ((leading_edge - origin_along) / tile_len).floor() as i32;

    let low = axis.across(*center) - axis.across(half) + SKIN;
    let high = axis.across(*center) + axis.across(half) - SKIN;
    let first = ((low - origin_across) / tile_width).floor() as i32;
    let last = ((high - origin_across) / tile_width).floor() as i32;

    if !(first..=last).any(|cell| map.is_solid(axis.tile(line, cell))) {
        axis.set(center, target);
        return false;
    }

    let face = if dir > 0.0 { line } else { line + 1 };
    let stop = origin_along + face as f32 * tile_len - dir * (axis.along(half) + SKIN);
    axis.set(center, stop);
    *speed = 0.0;
    true
}
