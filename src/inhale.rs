//! Inhale and spit.
//!
//! Holding the inhale key opens a small hit zone in front of the player. Enemies inside it become
//! inhalable and are dragged toward the player's mouth; touching the player then swallows them.
//! Releasing the key with a full mouth spits a star.

use bevy::color::Alpha;
use bevy::prelude::*;
use serde::Deserialize;

use crate::assets::{clip, SpriteAnimation, SpriteSheet};
use crate::collision::{collision_map_ready, Aabb, Collider};
use crate::effects::ScheduledClip;
use crate::enemy::{Enemy, EnemyBrainSystems};
use crate::input::{ActionState, InputSystems, PlayerAction};
use crate::level::{LevelConfig, LevelScoped};
use crate::movement::Velocity;
use crate::player::{move_player, Facing, Player};
use crate::projectile::spawn_shooting_star;
use crate::state::{GameSet, GameState};

pub struct InhalePlugin;

impl Plugin for InhalePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InhaleTuning>()
            .add_systems(
                OnTransition {
                    exited: GameState::Loading,
                    entered: GameState::Playing,
                },
                spawn_inhale_effect,
            )
            .add_systems(
                Update,
                (
                    handle_inhale_input
                        .in_set(GameSet::Input)
                        .in_set(InputSystems)
                        .after(move_player),
                    (update_inhale_zone, pull_inhalable_enemies)
                        .chain()
                        .in_set(GameSet::Ai)
                        .after(EnemyBrainSystems),
                    position_inhale_effect.in_set(GameSet::Effects),
                )
                    .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
            );
    }
}

#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InhaleTuning {
    /// Zone size in sprite pixels.
    pub zone_size: (f32, f32),
    /// Zone centre relative to the player when facing right, in sprite pixels.
    pub zone_offset: (f32, f32),
    /// Horizontal distance of the inhale visual from the player, in world units.
    pub effect_offset: f32,
    pub pull_speed: f32,
    pub projectile_speed: f32,
    /// Star spawn point relative to the player when facing right, in world units.
    pub spit_offset: (f32, f32),
    /// Seconds after spitting before the idle clip returns.
    pub spit_recover: f32,
    /// Star hit box top-left corner inside the sprite cell, in sprite pixels (y down).
    pub star_hitbox_origin: (f32, f32),
    /// Star hit box size in sprite pixels.
    pub star_hitbox: (f32, f32),
}

impl Default for InhaleTuning {
    fn default() -> Self {
        Self {
            zone_size: (20.0, 4.0),
            zone_offset: (16.0, -2.0),
            effect_offset: 60.0,
            pull_speed: 800.0,
            projectile_speed: 800.0,
            spit_offset: (80.0, -5.0),
            spit_recover: 1.0,
            star_hitbox_origin: (5.0, 4.0),
            star_hitbox: (6.0, 6.0),
        }
    }
}

/// Looping inhale visual. Lives for the whole level and is shown or hidden.
#[derive(Component)]
pub struct InhaleEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Inhaling,
    /// Mouth already occupied; inhaling is refused.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarLaunch {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReleaseOutcome {
    Spit(StarLaunch),
    Cancelled,
}

/// Inhale key held this frame.
pub fn hold_inhale(player: &mut Player) -> HoldOutcome {
    if player.is_full {
        return HoldOutcome::Full;
    }
    player.is_inhaling = true;
    HoldOutcome::Inhaling
}

/// Inhale key released this frame.
pub fn release_inhale(player: &mut Player, position: Vec2, tuning: &InhaleTuning) -> ReleaseOutcome {
    player.is_inhaling = false;

    if !player.is_full {
        return ReleaseOutcome::Cancelled;
    }
    player.is_full = false;

    let sign = player.facing.sign();
    ReleaseOutcome::Spit(StarLaunch {
        position: position + Vec2::new(tuning.spit_offset.0 * sign, tuning.spit_offset.1),
        velocity: Vec2::new(tuning.projectile_speed * sign, 0.0),
    })
}

/// World-space hit zone in front of a player at `position`.
pub fn zone_aabb(position: Vec2, facing: Facing, tuning: &InhaleTuning, pixel_scale: f32) -> Aabb {
    let offset = Vec2::new(tuning.zone_offset.0 * facing.sign(), tuning.zone_offset.1);
    let half = Vec2::new(tuning.zone_size.0, tuning.zone_size.1) * 0.5;
    Aabb::from_center(position + offset * pixel_scale, half * pixel_scale)
}

/// Horizontal speed that drags an inhalable enemy toward a player facing `facing`.
pub fn pull_velocity(facing: Facing, pull_speed: f32) -> f32 {
    -facing.sign() * pull_speed
}

fn spawn_inhale_effect(
    mut commands: Commands,
    time: Res<Time>,
    sheet: Res<SpriteSheet>,
    config: Res<LevelConfig>,
) {
    let scale = config.pixel_scale;
    commands.spawn((
        Name::new("InhaleEffect"),
        InhaleEffect,
        LevelScoped,
        SpriteBundle {
            texture: sheet.texture.clone(),
            sprite: Sprite {
                color: Color::WHITE.with_alpha(0.0),
                ..default()
            },
            transform: Transform::from_xyz(0.0, 0.0, 11.0).with_scale(Vec3::new(scale, scale, 1.0)),
            ..default()
        },
        sheet.atlas(3),
        SpriteAnimation::new(clip::KIRB_INHALE_EFFECT, time.elapsed_seconds()),
    ));
}

fn handle_inhale_input(
    mut commands: Commands,
    time: Res<Time>,
    actions: Res<ActionState>,
    tuning: Res<InhaleTuning>,
    sheet: Res<SpriteSheet>,
    config: Res<LevelConfig>,
    mut query: Query<(Entity, &mut Player, &mut SpriteAnimation, &Transform)>,
) {
    let now = time.elapsed_seconds();

    for (entity, mut player, mut animation, transform) in &mut query {
        // A release that happened while paused is never seen as an edge.
        let released = actions.just_released(PlayerAction::Inhale)
            || (player.is_inhaling && !actions.held(PlayerAction::Inhale));

        if released {
            match release_inhale(&mut player, transform.translation.truncate(), &tuning) {
                ReleaseOutcome::Spit(launch) => {
                    // Spitting reuses the inhale pose.
                    animation.play(clip::KIRB_INHALING, now);
                    spawn_shooting_star(&mut commands, &sheet, &tuning, config.pixel_scale, launch, now);
                    commands.entity(entity).insert(ScheduledClip {
                        clip: clip::KIRB_IDLE,
                        at: now + tuning.spit_recover,
                    });
                }
                ReleaseOutcome::Cancelled => animation.play(clip::KIRB_IDLE, now),
            }
        } else if actions.held(PlayerAction::Inhale) {
            match hold_inhale(&mut player) {
                HoldOutcome::Inhaling => {
                    animation.play(clip::KIRB_INHALING, now);
                    commands.entity(entity).remove::<ScheduledClip>();
                }
                HoldOutcome::Full => animation.play(clip::KIRB_FULL, now),
            }
        }
    }
}

fn update_inhale_zone(
    tuning: Res<InhaleTuning>,
    config: Res<LevelConfig>,
    players: Query<(&Player, &Transform), Without<Enemy>>,
    mut enemies: Query<(&mut Enemy, &Transform, &Collider)>,
) {
    let Ok((player, player_transform)) = players.get_single() else {
        return;
    };

    // The zone only exists while inhaling.
    let area = zone_aabb(
        player_transform.translation.truncate(),
        player.facing,
        &tuning,
        config.pixel_scale,
    );

    for (mut enemy, transform, collider) in &mut enemies {
        let inside = player.is_inhaling
            && area.overlaps(&collider.aabb_at(transform.translation.truncate()));
        if enemy.inhalable != inside {
            enemy.inhalable = inside;
        }
    }
}

fn pull_inhalable_enemies(
    tuning: Res<InhaleTuning>,
    players: Query<&Player>,
    mut enemies: Query<(&Enemy, &mut Velocity)>,
) {
    let Ok(player) = players.get_single() else {
        return;
    };
    if !player.is_inhaling {
        return;
    }

    let pull = pull_velocity(player.facing, tuning.pull_speed);
    for (enemy, mut velocity) in &mut enemies {
        if enemy.inhalable {
            velocity.x += pull;
        }
    }
}

fn position_inhale_effect(
    tuning: Res<InhaleTuning>,
    players: Query<(&Player, &Transform), Without<InhaleEffect>>,
    mut effects: Query<(&mut Transform, &mut Sprite), With<InhaleEffect>>,
) {
    let Ok((player, player_transform)) = players.get_single() else {
        return;
    };

    for (mut transform, mut sprite) in &mut effects {
        transform.translation.x =
            player_transform.translation.x + tuning.effect_offset * player.facing.sign();
        transform.translation.y = player_transform.translation.y;
        sprite.flip_x = player.facing == Facing::Left;
        sprite
            .color
            .set_alpha(if player.is_inhaling { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    use crate::enemy::EnemyKind;

    fn zone_world(inhaling: bool) -> (World, Entity) {
        let mut world = World::new();
        world.insert_resource(InhaleTuning::default());
        world.insert_resource(LevelConfig::default());

        let mut player = Player::new(300.0);
        player.is_inhaling = inhaling;
        let player = world.spawn((player, Transform::default())).id();
        (world, player)
    }

    fn spawn_guy(world: &mut World, position: Vec2, inhalable: bool) -> Entity {
        world
            .spawn((
                Enemy {
                    kind: EnemyKind::Guy,
                    speed: 100.0,
                    inhalable,
                },
                Transform::from_translation(position.extend(0.0)),
                Collider::from_size(Vec2::splat(32.0)),
                Velocity(Vec2::new(-100.0, 0.0)),
            ))
            .id()
    }

    #[test]
    fn enemies_are_inhalable_only_inside_the_active_zone() {
        let (mut world, player) = zone_world(true);
        // Zone at 4x: x 24..104, y -16..0 in front of a right-facing player at the origin.
        let guy = spawn_guy(&mut world, Vec2::new(64.0, -8.0), false);

        world.run_system_once(update_inhale_zone);
        assert!(world.get::<Enemy>(guy).unwrap().inhalable);

        world.get_mut::<Transform>(guy).unwrap().translation.x = 400.0;
        world.run_system_once(update_inhale_zone);
        assert!(!world.get::<Enemy>(guy).unwrap().inhalable);

        world.get_mut::<Transform>(guy).unwrap().translation.x = 64.0;
        world.get_mut::<Player>(player).unwrap().is_inhaling = false;
        world.run_system_once(update_inhale_zone);
        assert!(!world.get::<Enemy>(guy).unwrap().inhalable);
    }

    #[test]
    fn zone_behind_the_player_does_not_catch() {
        let (mut world, _) = zone_world(true);
        let guy = spawn_guy(&mut world, Vec2::new(-64.0, -8.0), false);

        world.run_system_once(update_inhale_zone);
        assert!(!world.get::<Enemy>(guy).unwrap().inhalable);
    }

    #[test]
    fn pull_moves_only_inhalable_enemies_toward_the_player() {
        let (mut world, _) = zone_world(true);
        let caught = spawn_guy(&mut world, Vec2::new(64.0, -8.0), true);
        let free = spawn_guy(&mut world, Vec2::new(400.0, 0.0), false);

        world.run_system_once(pull_inhalable_enemies);

        assert_eq!(world.get::<Velocity>(caught).unwrap().x, -900.0);
        assert_eq!(world.get::<Velocity>(free).unwrap().x, -100.0);
    }

    #[test]
    fn no_pull_when_not_inhaling() {
        let (mut world, _) = zone_world(false);
        let guy = spawn_guy(&mut world, Vec2::new(64.0, -8.0), true);

        world.run_system_once(pull_inhalable_enemies);

        assert_eq!(world.get::<Velocity>(guy).unwrap().x, -100.0);
    }

    #[test]
    fn holding_while_full_refuses_to_inhale() {
        let mut player = Player::new(300.0);
        player.is_full = true;
        assert_eq!(hold_inhale(&mut player), HoldOutcome::Full);
        assert!(!player.is_inhaling);
    }

    #[test]
    fn holding_starts_inhaling() {
        let mut player = Player::new(300.0);
        assert_eq!(hold_inhale(&mut player), HoldOutcome::Inhaling);
        assert!(player.is_inhaling);
    }

    #[test]
    fn release_while_full_spits_one_star_in_facing_direction() {
        let tuning = InhaleTuning::default();
        for facing in [Facing::Left, Facing::Right] {
            let mut player = Player::new(300.0);
            player.facing = facing;
            player.is_full = true;

            let outcome = release_inhale(&mut player, Vec2::new(100.0, 50.0), &tuning);

            let ReleaseOutcome::Spit(launch) = outcome else {
                panic!("expected a star for {:?}", facing);
            };
            assert_eq!(launch.velocity, Vec2::new(800.0 * facing.sign(), 0.0));
            assert_eq!(launch.position, Vec2::new(100.0 + 80.0 * facing.sign(), 45.0));
            assert!(!player.is_full);
            assert!(!player.is_inhaling);
        }
    }

    #[test]
    fn release_while_empty_cancels() {
        let tuning = InhaleTuning::default();
        let mut player = Player::new(300.0);
        player.is_inhaling = true;
        assert_eq!(
            release_inhale(&mut player, Vec2::ZERO, &tuning),
            ReleaseOutcome::Cancelled
        );
        assert!(!player.is_inhaling);
    }

    #[test]
    fn zone_sits_on_the_facing_side() {
        let tuning = InhaleTuning::default();
        let right = zone_aabb(Vec2::ZERO, Facing::Right, &tuning, 4.0);
        let left = zone_aabb(Vec2::ZERO, Facing::Left, &tuning, 4.0);
        assert!(right.min.x > 0.0);
        assert!(left.max.x < 0.0);
        assert_eq!(right.max.x - right.min.x, 80.0);
        assert_eq!(right.max.y - right.min.y, 16.0);
    }

    #[test]
    fn pull_points_back_toward_the_player() {
        assert_eq!(pull_velocity(Facing::Right, 800.0), -800.0);
        assert_eq!(pull_velocity(Facing::Left, 800.0), 800.0);
    }
}
