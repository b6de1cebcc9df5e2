//! Per-level scene setup: background, enemies at their spawn points, and the timed flier spawner.

use bevy::prelude::*;
use bevy::sprite::Anchor;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::assets::SpriteSheet;
use crate::collision::collision_map_ready;
use crate::enemy::{spawn_enemy, EnemyBrainSystems, EnemyKind, EnemyTuning};
use crate::level::{LevelAssets, LevelConfig, LevelScoped, SpawnPoints};
use crate::state::{GameSet, GameState};

pub struct SpawnerPlugin;

impl Plugin for SpawnerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FlierSpawner>()
            .add_systems(
                OnTransition {
                    exited: GameState::Loading,
                    entered: GameState::Playing,
                },
                (spawn_background, spawn_level_enemies, arm_flier_spawner),
            )
            .add_systems(
                Update,
                spawn_due_fliers
                    .in_set(GameSet::Ai)
                    .before(EnemyBrainSystems)
                    .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
            );
    }
}

/// Periodic flier spawner for the current level.
#[derive(Resource, Debug, Default, Clone)]
pub struct FlierSpawner {
    pub interval: f32,
    pub next_at: f32,
    pub points: Vec<Vec2>,
}

impl FlierSpawner {
    /// Spawner whose first wave is one interval after `now`.
    pub fn armed(now: f32, interval: f32, points: Vec<Vec2>) -> Self {
        Self {
            interval,
            next_at: now + interval,
            points,
        }
    }

    /// Number of waves that came due by `now`. Advances the schedule past them.
    pub fn due(&mut self, now: f32) -> u32 {
        if self.interval <= 0.0 || self.points.is_empty() {
            return 0;
        }
        let mut waves = 0;
        while now >= self.next_at {
            self.next_at += self.interval;
            waves += 1;
        }
        waves
    }
}

/// One of `speeds`, uniformly. Falls back to zero for an empty list, which config validation
/// rejects before play starts.
pub fn pick_flier_speed<R: Rng + ?Sized>(rng: &mut R, speeds: &[f32]) -> f32 {
    speeds.choose(rng).copied().unwrap_or(0.0)
}

fn spawn_background(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    level_assets: Res<LevelAssets>,
) {
    let Some(path) = config.current_level().and_then(|level| level.background.clone()) else {
        return;
    };
    let origin = level_assets.level_origin.unwrap_or_default();
    let scale = config.pixel_scale;

    commands.spawn((
        Name::new("Background"),
        LevelScoped,
        SpriteBundle {
            texture: asset_server.load(path),
            sprite: Sprite {
                anchor: Anchor::BottomLeft,
                ..default()
            },
            transform: Transform::from_translation(origin.extend(-10.0))
                .with_scale(Vec3::new(scale, scale, 1.0)),
            ..default()
        },
    ));
}

fn spawn_level_enemies(
    mut commands: Commands,
    time: Res<Time>,
    sheet: Res<SpriteSheet>,
    tuning: Res<EnemyTuning>,
    config: Res<LevelConfig>,
    spawn_points: Res<SpawnPoints>,
) {
    let now = time.elapsed_seconds();
    let groups = [
        (EnemyKind::Flame, &spawn_points.flame),
        (EnemyKind::Guy, &spawn_points.guy),
    ];

    for (kind, points) in groups {
        for &position in points {
            spawn_enemy(
                &mut commands,
                &sheet,
                &tuning,
                config.pixel_scale,
                kind,
                position,
                tuning.walk_speed,
                now,
            );
        }
    }
}

fn arm_flier_spawner(
    time: Res<Time>,
    tuning: Res<EnemyTuning>,
    spawn_points: Res<SpawnPoints>,
    mut spawner: ResMut<FlierSpawner>,
) {
    *spawner = FlierSpawner::armed(
        time.elapsed_seconds(),
        tuning.flier_interval,
        spawn_points.bird.clone(),
    );
}

fn spawn_due_fliers(
    mut commands: Commands,
    time: Res<Time>,
    sheet: Res<SpriteSheet>,
    tuning: Res<EnemyTuning>,
    config: Res<LevelConfig>,
    mut spawner: ResMut<FlierSpawner>,
) {
    let now = time.elapsed_seconds();
    let waves = spawner.due(now);
    if waves == 0 {
        return;
    }

    let mut rng = rand::thread_rng();
    for _ in 0..waves {
        for &position in &spawner.points {
            let speed = pick_flier_speed(&mut rng, &tuning.flier_speeds);
            spawn_enemy(
                &mut commands,
                &sheet,
                &tuning,
                config.pixel_scale,
                EnemyKind::Bird,
                position,
                speed,
                now,
            );
            debug!("Bird spawned at {:?} with speed {}.", position, speed);
        }
    }
}
