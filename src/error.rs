//! Configuration errors raised while loading tuning, sprite data, or level data.
//!
//! Everything here is detected at load time. Gameplay failures (falling out of the level, running
//! out of hit points) are not errors; they restart the level instead.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    Io(String),
    /// The config file is not valid RON for `GameConfig`.
    Parse(String),
    /// A factory references an animation clip the sprite sheet does not declare.
    MissingAnimation(String),
    /// A clip points past the last frame of the sprite sheet grid.
    FrameOutOfRange {
        clip: String,
        frame: usize,
        frame_count: usize,
    },
    /// A clip range runs backwards or has a non-positive playback speed.
    InvalidClip(String),
    /// The level lacks a spawn marker that must exist (e.g. `player`).
    MissingSpawnPoint(&'static str),
    /// LDtk level without inline layer data (external level files are not supported).
    MissingLayerData(String),
    /// The configured level identifier does not exist in the LDtk project.
    UnknownLevel(String),
    EmptyLevelList,
    EmptyFlierSpeeds,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::MissingAnimation(name) => {
                write!(f, "Animation '{}' is not declared by the sprite sheet", name)
            }
            ConfigError::FrameOutOfRange {
                clip,
                frame,
                frame_count,
            } => write!(
                f,
                "Animation '{}' uses frame {} but the sheet only has {} frames",
                clip, frame, frame_count
            ),
            ConfigError::InvalidClip(name) => {
                write!(f, "Animation '{}' has an empty range or non-positive speed", name)
            }
            ConfigError::MissingSpawnPoint(kind) => {
                write!(f, "Level has no '{}' spawn point", kind)
            }
            ConfigError::MissingLayerData(level) => write!(
                f,
                "Level '{}' has no inline layer data; save the LDtk project without external levels",
                level
            ),
            ConfigError::UnknownLevel(level) => {
                write!(f, "Level '{}' does not exist in the LDtk project", level)
            }
            ConfigError::EmptyLevelList => write!(f, "No levels are configured"),
            ConfigError::EmptyFlierSpeeds => write!(f, "Flier speed table is empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(e: ron::error::SpannedError) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
