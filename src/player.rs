//! Player entity: factory, walking and jumping, health, and the enemy-contact state machine.
//!
//! Contact resolution itself runs in `combat.rs`; this module owns the rules it applies so they can
//! be exercised without a running app.

use bevy::prelude::*;
use serde::Deserialize;

use crate::assets::{clip, SpriteAnimation, SpriteSheet};
use crate::collision::{collision_map_ready, Collider, Contacts};
use crate::input::{ActionState, InputSystems, PlayerAction};
use crate::level::{LevelAssets, LevelConfig, LevelScoped, SpawnPoints};
use crate::movement::{Body, Velocity};
use crate::state::{GameSet, GameState};
use crate::transition::SceneRequest;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerTuning>()
            .add_systems(
                OnTransition {
                    exited: GameState::Loading,
                    entered: GameState::Playing,
                },
                spawn_player,
            )
            .add_systems(
                Update,
                (
                    move_player.in_set(GameSet::Input).in_set(InputSystems),
                    check_fall.in_set(GameSet::Combat),
                )
                    .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
            );
    }
}

#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub speed: f32,
    pub max_hp: u32,
    pub jump_force: f32,
    /// Jumps available before touching the ground again, the first one included.
    pub max_jumps: u32,
    /// Hit box top-left corner inside the sprite cell, in sprite pixels (y down).
    pub hitbox_origin: (f32, f32),
    /// Hit box size in sprite pixels.
    pub hitbox: (f32, f32),
    /// How far below the level's top edge the player may fall before the level restarts.
    pub fall_depth: f32,
    /// Length of each half of the damage flicker.
    pub flicker_step: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 300.0,
            max_hp: 3,
            jump_force: 640.0,
            max_jumps: 10,
            hitbox_origin: (4.0, 5.9),
            hitbox: (8.0, 10.0),
            fall_depth: 2000.0,
            flicker_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct Player {
    pub speed: f32,
    pub facing: Facing,
    pub is_inhaling: bool,
    /// Holding a swallowed enemy. At most one at a time.
    pub is_full: bool,
}

impl Player {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            facing: Facing::Right,
            is_inhaling: false,
            is_full: false,
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Health {
    hp: u32,
    max: u32,
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { hp: max, max }
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn hurt(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }
}

/// Jump counter reset on landing.
#[derive(Component, Debug, Clone)]
pub struct MultiJump {
    pub max: u32,
    pub used: u32,
}

impl MultiJump {
    pub fn new(max: u32) -> Self {
        Self { max, used: 0 }
    }

    /// Consumes one jump if any are left.
    pub fn try_jump(&mut self) -> bool {
        if self.used < self.max {
            self.used += 1;
            true
        } else {
            false
        }
    }
}

/// What touching an enemy did to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    /// The enemy is eaten; the caller removes it.
    Swallowed,
    /// The enemy was on its way into a full mouth; nothing happens.
    Ignored,
    Damaged,
    /// Hit with no hit points left; the caller removes the player and restarts the level.
    Died,
}

/// Applies the contact rules for an enemy that just started overlapping the player.
pub fn resolve_enemy_contact(
    player: &mut Player,
    health: &mut Health,
    enemy_inhalable: bool,
) -> ContactOutcome {
    if enemy_inhalable && player.is_full {
        return ContactOutcome::Ignored;
    }

    if enemy_inhalable && player.is_inhaling {
        player.is_inhaling = false;
        player.is_full = true;
        return ContactOutcome::Swallowed;
    }

    if health.hp() == 0 {
        return ContactOutcome::Died;
    }

    health.hurt(1);
    ContactOutcome::Damaged
}

/// True once the player has dropped more than `fall_depth` below the level's top edge.
pub fn has_fallen_out(player_y: f32, level_top: f32, fall_depth: f32) -> bool {
    level_top - player_y > fall_depth
}

fn spawn_player(
    mut commands: Commands,
    time: Res<Time>,
    sheet: Res<SpriteSheet>,
    spawn_points: Res<SpawnPoints>,
    tuning: Res<PlayerTuning>,
    config: Res<LevelConfig>,
) {
    let Some(spawn) = spawn_points.player.first().copied() else {
        return;
    };
    let scale = config.pixel_scale;

    commands.spawn((
        (
            Name::new("Player"),
            Player::new(tuning.speed),
            Health::new(tuning.max_hp),
            MultiJump::new(tuning.max_jumps),
            Contacts::default(),
            LevelScoped,
        ),
        SpriteBundle {
            texture: sheet.texture.clone(),
            transform: Transform::from_translation(spawn.extend(10.0))
                .with_scale(Vec3::new(scale, scale, 1.0)),
            ..default()
        },
        sheet.atlas(0),
        SpriteAnimation::new(clip::KIRB_IDLE, time.elapsed_seconds()),
        Velocity::default(),
        Body::dynamic(),
        Collider::from_sprite_rect(
            Vec2::new(tuning.hitbox_origin.0, tuning.hitbox_origin.1),
            Vec2::new(tuning.hitbox.0, tuning.hitbox.1),
            sheet.cell_size,
            scale,
        ),
    ));

    info!("Player spawned at {:?}.", spawn);
}

pub fn move_player(
    actions: Res<ActionState>,
    tuning: Res<PlayerTuning>,
    mut query: Query<(&mut Player, &mut Velocity, &mut Body, &mut MultiJump, &mut Sprite)>,
) {
    for (mut player, mut velocity, mut body, mut jumps, mut sprite) in &mut query {
        if actions.held(PlayerAction::MoveLeft) {
            player.facing = Facing::Left;
        }
        if actions.held(PlayerAction::MoveRight) {
            player.facing = Facing::Right;
        }
        sprite.flip_x = player.facing == Facing::Left;

        velocity.x = actions.horizontal_axis() * player.speed;

        if body.on_ground {
            jumps.used = 0;
        }
        if actions.just_pressed(PlayerAction::Jump) && jumps.try_jump() {
            body.jump(tuning.jump_force);
        }
    }
}

fn check_fall(
    tuning: Res<PlayerTuning>,
    level_assets: Res<LevelAssets>,
    query: Query<&Transform, With<Player>>,
    mut requests: EventWriter<SceneRequest>,
) {
    let Some(level_top) = level_assets.level_top() else {
        return;
    };

    for transform in &query {
        if has_fallen_out(transform.translation.y, level_top, tuning.fall_depth) {
            info!("Player fell out of the level; restarting.");
            requests.send(SceneRequest::Restart);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_removes_exactly_one_hit_point() {
        for start in 1..=3 {
            let mut player = Player::new(300.0);
            let mut health = Health::new(3);
            health.hurt(3 - start);
            assert_eq!(health.hp(), start);

            let outcome = resolve_enemy_contact(&mut player, &mut health, false);

            assert_eq!(outcome, ContactOutcome::Damaged);
            assert_eq!(health.hp(), start - 1);
        }
    }

    #[test]
    fn contact_at_zero_hp_kills_without_going_negative() {
        let mut player = Player::new(300.0);
        let mut health = Health::new(3);
        health.hurt(3);

        let outcome = resolve_enemy_contact(&mut player, &mut health, false);

        assert_eq!(outcome, ContactOutcome::Died);
        assert_eq!(health.hp(), 0);
    }

    #[test]
    fn hurt_saturates_at_zero() {
        let mut health = Health::new(3);
        health.hurt(10);
        assert_eq!(health.hp(), 0);
    }

    #[test]
    fn inhaling_swallows_inhalable_enemy() {
        let mut player = Player::new(300.0);
        player.is_inhaling = true;
        let mut health = Health::new(3);

        let outcome = resolve_enemy_contact(&mut player, &mut health, true);

        assert_eq!(outcome, ContactOutcome::Swallowed);
        assert!(player.is_full);
        assert!(!player.is_inhaling);
        assert_eq!(health.hp(), 3);
    }

    #[test]
    fn swallowing_while_full_has_no_effect() {
        let mut player = Player::new(300.0);
        player.is_inhaling = true;
        let mut health = Health::new(3);

        resolve_enemy_contact(&mut player, &mut health, true);
        let second = resolve_enemy_contact(&mut player, &mut health, true);

        assert_eq!(second, ContactOutcome::Ignored);
        assert!(player.is_full);
        assert_eq!(health.hp(), 3);
    }

    #[test]
    fn inhalable_enemy_still_hurts_when_not_inhaling() {
        let mut player = Player::new(300.0);
        let mut health = Health::new(3);
        let outcome = resolve_enemy_contact(&mut player, &mut health, true);
        assert_eq!(outcome, ContactOutcome::Damaged);
        assert!(!player.is_full);
    }

    #[test]
    fn multi_jump_is_limited() {
        let mut jumps = MultiJump::new(2);
        assert!(jumps.try_jump());
        assert!(jumps.try_jump());
        assert!(!jumps.try_jump());
    }

    #[test]
    fn fall_threshold_is_measured_from_level_top() {
        assert!(!has_fallen_out(-1999.0, 0.0, 2000.0));
        assert!(has_fallen_out(-2001.0, 0.0, 2000.0));
        assert!(has_fallen_out(-1501.0, 500.0, 2000.0));
    }
}
