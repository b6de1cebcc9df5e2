//! Camera follow. The camera leads the player horizontally, never shows past the level's right
//! edge, and sits at a fixed height below the level's top.

use bevy::prelude::*;
use bevy::render::camera::ScalingMode;
use serde::Deserialize;

use crate::collision::Aabb;
use crate::level::{LevelAssets, SpawnPoints};
use crate::player::Player;
use crate::state::{GameSet, GameState};

/// Virtual resolution the projection keeps visible at zoom 1.
pub const VIEW_WIDTH: f32 = 1024.0;
pub const VIEW_HEIGHT: f32 = 576.0;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraTuning>()
            .add_systems(Startup, setup_camera)
            .add_systems(
                OnTransition {
                    exited: GameState::Loading,
                    entered: GameState::Playing,
                },
                snap_camera_to_spawn,
            )
            .add_systems(
                Update,
                follow_player_camera
                    .in_set(GameSet::Effects)
                    .run_if(has_player_and_camera),
            );
    }
}

#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraTuning {
    /// How far ahead (to the right) of the player the camera centres.
    pub lead_x: f32,
    /// Camera height measured down from the level's top edge.
    pub depth_from_top: f32,
    pub zoom: f32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            lead_x: 500.0,
            depth_from_top: 800.0,
            zoom: 0.7,
        }
    }
}

#[derive(Component)]
pub struct FollowCamera;

fn has_player_and_camera(
    player_query: Query<Entity, With<Player>>,
    camera_query: Query<Entity, With<FollowCamera>>,
) -> bool {
    !player_query.is_empty() && !camera_query.is_empty()
}

/// World-space rectangle shown by a camera centred on `center`. The projection's area is sized
/// by the renderer from the first frame on.
pub fn visible_area(center: Vec2, projection: &OrthographicProjection) -> Aabb {
    Aabb {
        min: center + projection.area.min,
        max: center + projection.area.max,
    }
}

/// Horizontal camera target: the lead point, clamped so the view's right edge stays inside the level.
pub fn camera_target_x(player_x: f32, lead_x: f32, right_bound: f32) -> f32 {
    (player_x + lead_x).min(right_bound)
}

fn setup_camera(mut commands: Commands, tuning: Res<CameraTuning>) {
    let mut camera = Camera2dBundle::default();
    camera.projection.scaling_mode = ScalingMode::AutoMin {
        min_width: VIEW_WIDTH,
        min_height: VIEW_HEIGHT,
    };
    if tuning.zoom > 0.0 {
        camera.projection.scale = 1.0 / tuning.zoom;
    }

    commands.spawn((Name::new("MainCamera"), camera, FollowCamera));
}

/// Target position for a player at `player`, or `None` before level geometry is known.
fn camera_target(
    player: Vec2,
    level_assets: &LevelAssets,
    projection: &OrthographicProjection,
    tuning: &CameraTuning,
) -> Option<Vec2> {
    let level_top = level_assets.level_top()?;
    let level_right = level_assets.level_right()?;
    let half_width = visible_area(Vec2::ZERO, projection).max.x;
    let right_bound = level_right - half_width;

    Some(Vec2::new(
        camera_target_x(player.x, tuning.lead_x, right_bound),
        level_top - tuning.depth_from_top,
    ))
}

fn snap_camera_to_spawn(
    spawn_points: Res<SpawnPoints>,
    level_assets: Res<LevelAssets>,
    tuning: Res<CameraTuning>,
    mut camera_query: Query<(&mut Transform, &OrthographicProjection), With<FollowCamera>>,
) {
    let Some(spawn) = spawn_points.player.first().copied() else {
        return;
    };
    let Ok((mut transform, projection)) = camera_query.get_single_mut() else {
        return;
    };

    if let Some(target) = camera_target(spawn, &level_assets, projection, &tuning) {
        transform.translation.x = target.x;
        transform.translation.y = target.y;
    }
}

fn follow_player_camera(
    mut camera_query: Query<(&mut Transform, &OrthographicProjection), With<FollowCamera>>,
    player_query: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    level_assets: Res<LevelAssets>,
    tuning: Res<CameraTuning>,
) {
    let Ok(player_transform) = player_query.get_single() else {
        return;
    };
    let Ok((mut camera_transform, projection)) = camera_query.get_single_mut() else {
        return;
    };
    let Some(target) = camera_target(
        player_transform.translation.truncate(),
        &level_assets,
        projection,
        &tuning,
    ) else {
        return;
    };

    camera_transform.translation.x = target.x;
    camera_transform.translation.y = target.y;
}
