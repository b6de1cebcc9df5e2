//! Game tuning loaded from `assets/config/game.ron`.
//!
//! Every section is a regular Bevy resource with sensible defaults, so the game runs without the
//! file. When the file exists it replaces the defaults section by section during `PreStartup`,
//! before any gameplay plugin reads them.

use bevy::prelude::*;
use serde::Deserialize;

use crate::assets::SpriteSheetConfig;
use crate::camera::CameraTuning;
use crate::enemy::EnemyTuning;
use crate::error::ConfigError;
use crate::inhale::InhaleTuning;
use crate::level::LevelConfig;
use crate::movement::MovementSettings;
use crate::player::PlayerTuning;

pub const CONFIG_PATH: &str = "assets/config/game.ron";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_game_config);
    }
}

/// Top-level shape of the RON file. Missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub physics: MovementSettings,
    pub player: PlayerTuning,
    pub inhale: InhaleTuning,
    pub enemies: EnemyTuning,
    pub camera: CameraTuning,
    pub level: LevelConfig,
    pub sprites: SpriteSheetConfig,
}

impl GameConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file at `path`. A missing file is not an error and yields `Ok(None)`.
    pub fn load(path: &str) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_ron_str(&source).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level.levels.is_empty() {
            return Err(ConfigError::EmptyLevelList);
        }
        if self.enemies.flier_speeds.is_empty() {
            return Err(ConfigError::EmptyFlierSpeeds);
        }
        self.sprites.validate()
    }

    fn insert_into(self, commands: &mut Commands) {
        commands.insert_resource(self.physics);
        commands.insert_resource(self.player);
        commands.insert_resource(self.inhale);
        commands.insert_resource(self.enemies);
        commands.insert_resource(self.camera);
        commands.insert_resource(self.level);
        commands.insert_resource(self.sprites);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn load_game_config(mut commands: Commands, mut exit: EventWriter<AppExit>) {
    match GameConfig::load(CONFIG_PATH) {
        Ok(Some(config)) => {
            info!("Loaded game config from '{}'.", CONFIG_PATH);
            config.insert_into(&mut commands);
        }
        Ok(None) => {
            info!("No config at '{}'; using built-in defaults.", CONFIG_PATH);
        }
        Err(err @ (ConfigError::Io(_) | ConfigError::Parse(_))) => {
            warn!("Ignoring '{}': {}. Using built-in defaults.", CONFIG_PATH, err);
        }
        Err(err) => {
            error!("Invalid game config '{}': {}", CONFIG_PATH, err);
            exit.send(AppExit::error());
        }
    }
}

// The browser build has no filesystem; the defaults compiled into each resource apply.
#[cfg(target_arch = "wasm32")]
fn load_game_config() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_parses_and_matches_defaults() {
        let source = include_str!("../assets/config/game.ron");
        let config = GameConfig::from_ron_str(source).expect("shipped config must be valid");
        let defaults = GameConfig::default();

        assert_eq!(config.physics.gravity, defaults.physics.gravity);
        assert_eq!(config.player.max_hp, 3);
        assert_eq!(config.enemies.flier_speeds, vec![100.0, 200.0, 300.0]);
        assert_eq!(config.level.levels.len(), defaults.level.levels.len());
        assert_eq!(config.sprites.clips.len(), defaults.sprites.clips.len());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = GameConfig::from_ron_str("(physics: (gravity: 1000.0))").unwrap();
        assert_eq!(config.physics.gravity, 1000.0);
        assert_eq!(config.player.speed, PlayerTuning::default().speed);
    }

    #[test]
    fn empty_flier_table_is_rejected() {
        let err = GameConfig::from_ron_str("(enemies: (flier_speeds: []))").unwrap_err();
        assert_eq!(err, ConfigError::EmptyFlierSpeeds);
    }

    #[test]
    fn empty_level_list_is_rejected() {
        let err = GameConfig::from_ron_str("(level: (levels: []))").unwrap_err();
        assert_eq!(err, ConfigError::EmptyLevelList);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let loaded = GameConfig::load("does/not/exist.ron").unwrap();
        assert!(loaded.is_none());
    }
}
