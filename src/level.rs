//! LDtk level orchestration: loads the project, records level geometry, and extracts spawn points.
//!
//! The LDtk project is the map builder. Its IntGrid layer becomes the collision map (see
//! `collision.rs`) and its entity layer carries the spawn markers `player`, `flame`, `guy` and
//! `bird`. Markers are read straight from the project JSON once loading finishes, so spawn data is
//! validated before the level starts instead of on first use.

use bevy::asset::LoadState;
use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::ldtk::Level;
use bevy_ecs_ldtk::prelude::*;
use bevy_ecs_ldtk::utils::ldtk_pixel_coords_to_translation;
use bevy_ecs_ldtk::LevelIid;
use serde::Deserialize;

use crate::collision::CollisionMap;
use crate::error::ConfigError;
use crate::state::GameState;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelConfig>()
            .init_resource::<LevelAssets>()
            .init_resource::<SpawnPoints>()
            .insert_resource(LevelSelection::index(0))
            .insert_resource(LdtkSettings {
                level_spawn_behavior: LevelSpawnBehavior::UseWorldTranslation {
                    load_level_neighbors: false,
                },
                ..default()
            })
            .add_plugins(LdtkPlugin)
            .add_systems(OnEnter(GameState::Loading), spawn_world)
            .add_systems(
                Update,
                monitor_level_loading.run_if(in_state(GameState::Loading)),
            )
            .add_systems(PostUpdate, cache_level_transform);
    }
}

/// One playable level of the LDtk project.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelEntry {
    pub identifier: String,
    /// Static image drawn behind the tiles.
    #[serde(default)]
    pub background: Option<String>,
}

/// Which LDtk project and levels to play, and how LDtk pixels map to world units.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub project_path: String,
    pub levels: Vec<LevelEntry>,
    /// Index into `levels` of the level being played.
    #[serde(skip)]
    pub current: usize,
    pub tile_size: f32,
    /// Every LDtk pixel (and every sprite pixel) covers this many world units.
    pub pixel_scale: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            project_path: "levels/world.ldtk".to_owned(),
            levels: vec![
                LevelEntry {
                    identifier: "Level_1".to_owned(),
                    background: Some("textures/level-1.png".to_owned()),
                },
                LevelEntry {
                    identifier: "Level_2".to_owned(),
                    background: Some("textures/level-2.png".to_owned()),
                },
            ],
            current: 0,
            tile_size: 16.0,
            pixel_scale: 4.0,
        }
    }
}

impl LevelConfig {
    pub fn current_level(&self) -> Option<&LevelEntry> {
        self.levels.get(self.current)
    }

    /// Index of the level after the current one, wrapping back to the first.
    pub fn next_index(&self) -> usize {
        if self.levels.is_empty() {
            0
        } else {
            (self.current + 1) % self.levels.len()
        }
    }
}

/// Geometry of the currently loaded level in world units. `None` until loading finishes.
#[derive(Resource, Default)]
pub struct LevelAssets {
    pub project: Option<Handle<LdtkProject>>,
    pub project_path: Option<String>,
    pub level_iid: Option<String>,
    /// Bottom-left corner.
    pub level_origin: Option<Vec2>,
    pub level_size: Option<Vec2>,
}

impl LevelAssets {
    pub fn level_top(&self) -> Option<f32> {
        Some(self.level_origin?.y + self.level_size?.y)
    }

    pub fn level_right(&self) -> Option<f32> {
        Some(self.level_origin?.x + self.level_size?.x)
    }
}

/// Spawn coordinates per entity type, in world units.
#[derive(Resource, Default, Debug, Clone, PartialEq)]
pub struct SpawnPoints {
    pub player: Vec<Vec2>,
    pub flame: Vec<Vec2>,
    pub guy: Vec<Vec2>,
    pub bird: Vec<Vec2>,
}

impl SpawnPoints {
    /// Builds spawn points from `(identifier, ldtk_px)` markers of one level. Identifiers match
    /// case-insensitively; unknown ones are skipped. A level must place at least one player.
    pub fn from_markers<'a>(
        markers: impl IntoIterator<Item = (&'a str, IVec2)>,
        level_px_height: i32,
        origin: Vec2,
        pixel_scale: f32,
    ) -> Result<Self, ConfigError> {
        let mut points = SpawnPoints::default();

        for (identifier, px) in markers {
            let world = origin + ldtk_pixel_coords_to_translation(px, level_px_height) * pixel_scale;
            match identifier.to_ascii_lowercase().as_str() {
                "player" => points.player.push(world),
                "flame" => points.flame.push(world),
                "guy" => points.guy.push(world),
                "bird" => points.bird.push(world),
                other => debug!("Ignoring LDtk entity '{}'.", other),
            }
        }

        if points.player.is_empty() {
            return Err(ConfigError::MissingSpawnPoint("player"));
        }
        Ok(points)
    }

    pub fn from_level(level: &Level, origin: Vec2, pixel_scale: f32) -> Result<Self, ConfigError> {
        let layers = level
            .layer_instances
            .as_ref()
            .ok_or_else(|| ConfigError::MissingLayerData(level.identifier.clone()))?;

        let markers = layers
            .iter()
            .flat_map(|layer| layer.entity_instances.iter())
            .map(|entity| (entity.identifier.as_str(), entity.px));

        Self::from_markers(markers, level.px_hei, origin, pixel_scale)
    }
}

/// Marker on the LDtk world entity so it can be replaced when a level (re)loads.
#[derive(Component)]
pub struct LevelRoot;

/// Everything spawned for one run of a level. Despawned whenever the level reloads.
#[derive(Component)]
pub struct LevelScoped;

fn spawn_world(
    mut commands: Commands,
    scoped: Query<Entity, Or<(With<LevelRoot>, With<LevelScoped>)>>,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    mut level_assets: ResMut<LevelAssets>,
    mut selection: ResMut<LevelSelection>,
    mut collision_map: ResMut<CollisionMap>,
) {
    for entity in &scoped {
        commands.entity(entity).despawn_recursive();
    }
    collision_map.clear();

    let project_handle: Handle<LdtkProject> = asset_server.load(config.project_path.clone());
    *level_assets = LevelAssets {
        project: Some(project_handle.clone()),
        project_path: Some(config.project_path.clone()),
        ..default()
    };

    *selection = config
        .current_level()
        .map(|level| LevelSelection::Identifier(level.identifier.clone()))
        .unwrap_or_else(|| LevelSelection::index(0));

    info!(
        "Loading level {:?} from '{}'.",
        config.current_level().map(|level| level.identifier.as_str()),
        config.project_path
    );

    commands.spawn((
        LevelRoot,
        Name::new("LevelRoot"),
        LdtkWorldBundle {
            ldtk_handle: project_handle,
            transform: Transform::from_scale(Vec3::new(config.pixel_scale, config.pixel_scale, 1.0)),
            ..default()
        },
    ));
}

fn monitor_level_loading(
    asset_server: Res<AssetServer>,
    mut level_assets: ResMut<LevelAssets>,
    projects: Res<Assets<LdtkProject>>,
    config: Res<LevelConfig>,
    mut spawn_points: ResMut<SpawnPoints>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(project_handle) = level_assets.project.as_ref() else {
        return;
    };

    match asset_server.get_load_state(project_handle.id()) {
        Some(LoadState::Loaded) => {
            let Some(project) = projects.get(project_handle) else {
                return;
            };

            match read_level(project, &config) {
                Ok((level, points)) => {
                    let origin = level_origin(level, config.pixel_scale);
                    level_assets.level_iid = Some(level.iid.clone());
                    level_assets.level_origin = Some(origin);
                    level_assets.level_size = Some(
                        Vec2::new(level.px_wid as f32, level.px_hei as f32) * config.pixel_scale,
                    );
                    info!(
                        "Level '{}' ready: {} flame, {} guy, {} bird spawn points.",
                        level.identifier,
                        points.flame.len(),
                        points.guy.len(),
                        points.bird.len()
                    );
                    *spawn_points = points;
                    next_state.set(GameState::Playing);
                }
                Err(err) => {
                    error!("Cannot start level: {}", err);
                    exit.send(AppExit::error());
                }
            }
        }
        Some(LoadState::Failed(_)) => {
            let path = level_assets.project_path.as_deref().unwrap_or("<unknown>");
            error!("Unable to load LDtk project at '{}'.", path);
            exit.send(AppExit::error());
        }
        _ => {}
    }
}

fn read_level<'a>(
    project: &'a LdtkProject,
    config: &LevelConfig,
) -> Result<(&'a Level, SpawnPoints), ConfigError> {
    let entry = config.current_level().ok_or(ConfigError::EmptyLevelList)?;
    let level = project
        .json_data()
        .levels
        .iter()
        .find(|level| level.identifier == entry.identifier)
        .ok_or_else(|| ConfigError::UnknownLevel(entry.identifier.clone()))?;

    let origin = level_origin(level, config.pixel_scale);
    let points = SpawnPoints::from_level(level, origin, config.pixel_scale)?;
    Ok((level, points))
}

/// Bottom-left corner of `level` in world units.
fn level_origin(level: &Level, pixel_scale: f32) -> Vec2 {
    ldtk_pixel_coords_to_translation(IVec2::new(level.world_x, level.world_y + level.px_hei), 0)
        * pixel_scale
}

/// When LDtk instantiates the level entity, trust its actual world transform for the origin.
pub fn cache_level_transform(
    mut level_assets: ResMut<LevelAssets>,
    level_query: Query<(&GlobalTransform, &LevelIid), Added<LevelIid>>,
) {
    for (transform, iid) in &level_query {
        let matches_current_level = level_assets
            .level_iid
            .as_ref()
            .map(|target| target == iid.get())
            .unwrap_or(false);

        if matches_current_level {
            level_assets.level_origin = Some(transform.translation().truncate());
        }
    }
}
