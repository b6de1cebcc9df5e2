//! Enemy factories and their state machines.
//!
//! Each variant is an explicit state enum advanced once per tick. Timed phases remember the virtual
//! time at which they end instead of suspending anything, so despawning an enemy is all it takes
//! to cancel its timers.
//!
//! | variant | archetype | states |
//! |---|---|---|
//! | `Flame` | jumper | `idle` → `jump` → `idle` … |
//! | `Guy` | patroller | `idle` → `left` ⇄ `right` |
//! | `Bird` | flier | none, flies left until off screen |

use bevy::prelude::*;
use serde::Deserialize;

use crate::assets::{clip, SpriteAnimation, SpriteSheet};
use crate::camera::{visible_area, FollowCamera};
use crate::collision::{collision_map_ready, Aabb, Collider};
use crate::level::LevelScoped;
use crate::movement::{Body, Velocity};
use crate::state::{GameSet, GameState};

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EnemyTuning>().add_systems(
            Update,
            (
                tick_enemy_brains.in_set(GameSet::Ai).in_set(EnemyBrainSystems),
                cull_offscreen_fliers.in_set(GameSet::Effects),
            )
                .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
        );
    }
}

/// Systems that decide enemy velocities for the tick. Anything that nudges enemies (the inhale
/// pull) runs after this set.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnemyBrainSystems;

#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnemyTuning {
    /// Seconds spent in `idle` before acting.
    pub idle_delay: f32,
    /// Seconds per `left` / `right` patrol leg.
    pub patrol_duration: f32,
    pub walk_speed: f32,
    pub jump_impulse: f32,
    /// Fliers pick one of these speeds at random.
    pub flier_speeds: Vec<f32>,
    /// Seconds between fliers at each bird spawn point.
    pub flier_interval: f32,
    /// Distance beyond the visible area at which fliers and stray stars are removed.
    pub offscreen_margin: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            idle_delay: 1.0,
            patrol_duration: 2.0,
            walk_speed: 100.0,
            jump_impulse: 1000.0,
            flier_speeds: vec![100.0, 200.0, 300.0],
            flier_interval: 10.0,
            offscreen_margin: 400.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyKind {
    Flame,
    Guy,
    Bird,
}

impl EnemyKind {
    /// Hit box as (top-left corner, size) inside the sprite cell, in sprite pixels with y down.
    pub fn hitbox(self) -> (Vec2, Vec2) {
        match self {
            EnemyKind::Flame | EnemyKind::Bird => (Vec2::new(4.0, 6.0), Vec2::new(8.0, 10.0)),
            EnemyKind::Guy => (Vec2::new(2.0, 3.9), Vec2::new(12.0, 12.0)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            EnemyKind::Flame => "Flame",
            EnemyKind::Guy => "Guy",
            EnemyKind::Bird => "Bird",
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub speed: f32,
    /// Inside the player's active inhale zone this tick.
    pub inhalable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JumperState {
    Idle { until: f32 },
    Jump,
}

impl JumperState {
    pub fn entered_at(now: f32, tuning: &EnemyTuning) -> Self {
        JumperState::Idle {
            until: now + tuning.idle_delay,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JumperState::Idle { .. } => "idle",
            JumperState::Jump => "jump",
        }
    }

    /// Advances one tick. Returns the upward impulse to apply when a jump starts.
    pub fn tick(&mut self, now: f32, grounded: bool, tuning: &EnemyTuning) -> Option<f32> {
        match *self {
            JumperState::Idle { until } if now >= until => {
                *self = JumperState::Jump;
                Some(tuning.jump_impulse)
            }
            JumperState::Jump if grounded => {
                *self = JumperState::entered_at(now, tuning);
                None
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatrollerState {
    Idle { until: f32 },
    Left { until: f32 },
    Right { until: f32 },
}

impl PatrollerState {
    pub fn entered_at(now: f32, tuning: &EnemyTuning) -> Self {
        PatrollerState::Idle {
            until: now + tuning.idle_delay,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatrollerState::Idle { .. } => "idle",
            PatrollerState::Left { .. } => "left",
            PatrollerState::Right { .. } => "right",
        }
    }

    pub fn tick(&mut self, now: f32, tuning: &EnemyTuning) {
        let leg_end = now + tuning.patrol_duration;
        *self = match *self {
            PatrollerState::Idle { until } if now >= until => PatrollerState::Left { until: leg_end },
            PatrollerState::Left { until } if now >= until => PatrollerState::Right { until: leg_end },
            PatrollerState::Right { until } if now >= until => PatrollerState::Left { until: leg_end },
            unchanged => unchanged,
        };
    }

    pub fn walk_velocity(&self, speed: f32) -> f32 {
        match self {
            PatrollerState::Idle { .. } => 0.0,
            PatrollerState::Left { .. } => -speed,
            PatrollerState::Right { .. } => speed,
        }
    }

    /// Sprite mirroring for the phase; the sheet draws the walker facing left.
    pub fn flip_x(&self) -> Option<bool> {
        match self {
            PatrollerState::Idle { .. } => None,
            PatrollerState::Left { .. } => Some(false),
            PatrollerState::Right { .. } => Some(true),
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub enum EnemyBrain {
    Jumper(JumperState),
    Patroller(PatrollerState),
    Flier,
}

/// `true` when `body` lies entirely outside `viewport` grown by `margin`.
pub fn is_beyond_viewport(body: &Aabb, viewport: &Aabb, margin: f32) -> bool {
    !viewport.expanded(margin).overlaps(body)
}

pub fn spawn_enemy(
    commands: &mut Commands,
    sheet: &SpriteSheet,
    tuning: &EnemyTuning,
    pixel_scale: f32,
    kind: EnemyKind,
    position: Vec2,
    speed: f32,
    now: f32,
) -> Entity {
    let (hitbox_origin, hitbox_size) = kind.hitbox();
    let (brain, body, animation, velocity) = match kind {
        EnemyKind::Flame => (
            EnemyBrain::Jumper(JumperState::entered_at(now, tuning)),
            Body::dynamic(),
            clip::FLAME,
            Vec2::ZERO,
        ),
        EnemyKind::Guy => (
            EnemyBrain::Patroller(PatrollerState::entered_at(now, tuning)),
            Body::dynamic(),
            clip::GUY_IDLE,
            Vec2::ZERO,
        ),
        EnemyKind::Bird => (
            EnemyBrain::Flier,
            Body::kinematic(),
            clip::BIRD,
            Vec2::new(-speed, 0.0),
        ),
    };

    commands
        .spawn((
            Name::new(kind.name()),
            Enemy {
                kind,
                speed,
                inhalable: false,
            },
            brain,
            LevelScoped,
            SpriteBundle {
                texture: sheet.texture.clone(),
                transform: Transform::from_translation(position.extend(5.0))
                    .with_scale(Vec3::new(pixel_scale, pixel_scale, 1.0)),
                ..default()
            },
            sheet.atlas(0),
            SpriteAnimation::new(animation, now),
            Velocity(velocity),
            body,
            Collider::from_sprite_rect(hitbox_origin, hitbox_size, sheet.cell_size, pixel_scale),
        ))
        .id()
}

fn tick_enemy_brains(
    time: Res<Time>,
    tuning: Res<EnemyTuning>,
    mut query: Query<(
        &Enemy,
        &mut EnemyBrain,
        &mut Velocity,
        &mut Body,
        &mut Sprite,
        &mut SpriteAnimation,
    )>,
) {
    let now = time.elapsed_seconds();

    for (enemy, mut brain, mut velocity, mut body, mut sprite, mut animation) in &mut query {
        match &mut *brain {
            EnemyBrain::Jumper(state) => {
                velocity.x = 0.0;
                let before = *state;
                if let Some(impulse) = state.tick(now, body.on_ground, &tuning) {
                    body.jump(impulse);
                }
                if before.name() != state.name() {
                    debug!("Flame -> {}", state.name());
                }
            }
            EnemyBrain::Patroller(state) => {
                let before = *state;
                state.tick(now, &tuning);
                if before.name() != state.name() {
                    debug!("Guy -> {}", state.name());
                }
                velocity.x = state.walk_velocity(enemy.speed);
                if let Some(flip) = state.flip_x() {
                    sprite.flip_x = flip;
                }
                let walk_clip = match state {
                    PatrollerState::Idle { .. } => clip::GUY_IDLE,
                    _ => clip::GUY_WALK,
                };
                animation.play(walk_clip, now);
            }
            EnemyBrain::Flier => {
                velocity.x = -enemy.speed;
                velocity.y = 0.0;
            }
        }
    }
}

fn cull_offscreen_fliers(
    mut commands: Commands,
    tuning: Res<EnemyTuning>,
    cameras: Query<(&Transform, &OrthographicProjection), With<FollowCamera>>,
    fliers: Query<(Entity, &EnemyBrain, &Transform, &Collider), Without<FollowCamera>>,
) {
    let Ok((camera_transform, projection)) = cameras.get_single() else {
        return;
    };
    let viewport = visible_area(camera_transform.translation.truncate(), projection);

    for (entity, brain, transform, collider) in &fliers {
        if *brain != EnemyBrain::Flier {
            continue;
        }
        let aabb = collider.aabb_at(transform.translation.truncate());
        if is_beyond_viewport(&aabb, &viewport, tuning.offscreen_margin) {
            commands.entity(entity).despawn_recursive();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn jumper_waits_then_jumps() {
        let tuning = EnemyTuning::default();
        let mut state = JumperState::entered_at(0.0, &tuning);

        assert_eq!(state.tick(0.5, true, &tuning), None);
        assert_eq!(state.name(), "idle");
        assert_eq!(state.tick(1.0, true, &tuning), Some(1000.0));
        assert_eq!(state, JumperState::Jump);
    }

    #[test]
    fn jumper_alternates_idle_and_jump_forever() {
        let tuning = EnemyTuning::default();
        let mut state = JumperState::entered_at(0.0, &tuning);
        let mut airborne_ticks = 0;
        let mut grounded = true;
        let mut history: Vec<&'static str> = vec![state.name()];

        let mut now = 0.0;
        for _ in 0..2000 {
            now += DT;
            if state.tick(now, grounded, &tuning).is_some() {
                grounded = false;
                airborne_ticks = 30;
            } else if airborne_ticks > 0 {
                airborne_ticks -= 1;
                grounded = airborne_ticks == 0;
            }
            if history.last() != Some(&state.name()) {
                history.push(state.name());
            }
        }

        assert!(history.len() > 6);
        for pair in history.windows(2) {
            assert_ne!(pair[0], pair[1]);
            assert!(matches!(pair, ["idle", "jump"] | ["jump", "idle"]));
        }
    }

    #[test]
    fn jumper_stays_in_jump_until_grounded() {
        let tuning = EnemyTuning::default();
        let mut state = JumperState::Jump;
        for step in 0..100 {
            assert_eq!(state.tick(step as f32, false, &tuning), None);
            assert_eq!(state, JumperState::Jump);
        }
        state.tick(100.0, true, &tuning);
        assert_eq!(state, JumperState::Idle { until: 101.0 });
    }

    #[test]
    fn patroller_cycles_idle_left_right_left() {
        let tuning = EnemyTuning::default();
        let mut state = PatrollerState::entered_at(0.0, &tuning);

        state.tick(1.0, &tuning);
        assert_eq!(state.name(), "left");
        state.tick(2.9, &tuning);
        assert_eq!(state.name(), "left");
        state.tick(3.0, &tuning);
        assert_eq!(state.name(), "right");
        state.tick(5.0, &tuning);
        assert_eq!(state.name(), "left");
    }

    #[test]
    fn patroller_position_is_monotonic_within_each_leg() {
        let tuning = EnemyTuning::default();
        let mut state = PatrollerState::entered_at(0.0, &tuning);
        let mut x = 0.0_f32;
        let mut now = 0.0;

        for _ in 0..(12.0 / DT) as usize {
            now += DT;
            state.tick(now, &tuning);
            let previous = x;
            x += state.walk_velocity(tuning.walk_speed) * DT;
            match state {
                PatrollerState::Left { .. } => assert!(x <= previous),
                PatrollerState::Right { .. } => assert!(x >= previous),
                PatrollerState::Idle { .. } => assert_eq!(x, previous),
            }
        }
    }

    #[test]
    fn patroller_faces_its_walking_direction() {
        assert_eq!(PatrollerState::Left { until: 0.0 }.flip_x(), Some(false));
        assert_eq!(PatrollerState::Right { until: 0.0 }.flip_x(), Some(true));
        assert_eq!(PatrollerState::Idle { until: 0.0 }.flip_x(), None);
    }

    #[test]
    fn flier_is_culled_only_past_the_margin() {
        let viewport = Aabb {
            min: Vec2::new(0.0, 0.0),
            max: Vec2::new(1000.0, 600.0),
        };
        let half = Vec2::splat(16.0);
        let near = Aabb::from_center(Vec2::new(-300.0, 300.0), half);
        let far = Aabb::from_center(Vec2::new(-500.0, 300.0), half);
        let far_right = Aabb::from_center(Vec2::new(1500.0, 300.0), half);

        assert!(!is_beyond_viewport(&near, &viewport, 400.0));
        assert!(is_beyond_viewport(&far, &viewport, 400.0));
        assert!(is_beyond_viewport(&far_right, &viewport, 400.0));
    }
}
