//! Sprite sheet and animation clips.
//!
//! The sheet is a single image sliced into a fixed grid. Clips are named either as one frame or as
//! a frame range with a playback speed. The names form a contract with every factory that plays a
//! clip, so the full list in [`clip`] is checked at startup and the app refuses to run with a sheet
//! that is missing any of them.

use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::state::GameSet;

/// Clip names used by the entity factories.
pub mod clip {
    pub const KIRB_IDLE: &str = "kirb_idle";
    pub const KIRB_INHALING: &str = "kirb_inhaling";
    pub const KIRB_FULL: &str = "kirb_full";
    pub const KIRB_INHALE_EFFECT: &str = "kirb_inhale_effect";
    pub const SHOOTING_STAR: &str = "shooting_star";
    pub const FLAME: &str = "flame";
    pub const GUY_IDLE: &str = "guy_idle";
    pub const GUY_WALK: &str = "guy_walk";
    pub const BIRD: &str = "bird";

    pub const ALL: [&str; 9] = [
        KIRB_IDLE,
        KIRB_INHALING,
        KIRB_FULL,
        KIRB_INHALE_EFFECT,
        SHOOTING_STAR,
        FLAME,
        GUY_IDLE,
        GUY_WALK,
        BIRD,
    ];
}

pub struct SpriteAssetsPlugin;

impl Plugin for SpriteAssetsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpriteSheetConfig>()
            .add_systems(Startup, (validate_sprite_sheet, load_sprite_sheet).chain())
            .add_systems(Update, animate_sprites.in_set(GameSet::Effects));
    }
}

/// One named clip.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub enum AnimationClip {
    Frame(usize),
    Range {
        from: usize,
        to: usize,
        speed: f32,
        looping: bool,
    },
}

impl AnimationClip {
    /// Sheet index shown `elapsed` seconds after the clip started.
    pub fn frame_at(&self, elapsed: f32) -> usize {
        match *self {
            AnimationClip::Frame(index) => index,
            AnimationClip::Range {
                from,
                to,
                speed,
                looping,
            } => {
                let len = to - from + 1;
                let step = (elapsed.max(0.0) * speed).floor() as usize;
                if looping {
                    from + step % len
                } else {
                    from + step.min(len - 1)
                }
            }
        }
    }

    fn last_frame(&self) -> usize {
        match *self {
            AnimationClip::Frame(index) => index,
            AnimationClip::Range { to, .. } => to,
        }
    }
}

/// Grid layout and clip table of the sprite sheet.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpriteSheetConfig {
    pub image: String,
    pub tile_size: u32,
    pub columns: u32,
    pub rows: u32,
    pub clips: BTreeMap<String, AnimationClip>,
}

impl Default for SpriteSheetConfig {
    fn default() -> Self {
        let range = |from, to, speed| AnimationClip::Range {
            from,
            to,
            speed,
            looping: true,
        };
        let clips = [
            (clip::KIRB_IDLE, AnimationClip::Frame(0)),
            (clip::KIRB_INHALING, AnimationClip::Frame(1)),
            (clip::KIRB_FULL, AnimationClip::Frame(2)),
            (clip::KIRB_INHALE_EFFECT, range(3, 8, 15.0)),
            (clip::SHOOTING_STAR, AnimationClip::Frame(9)),
            (clip::FLAME, range(36, 37, 4.0)),
            (clip::GUY_IDLE, AnimationClip::Frame(18)),
            (clip::GUY_WALK, range(18, 19, 4.0)),
            (clip::BIRD, range(27, 28, 4.0)),
        ]
        .into_iter()
        .map(|(name, clip)| (name.to_owned(), clip))
        .collect();

        Self {
            image: "textures/kirby-like.png".to_owned(),
            tile_size: 16,
            columns: 9,
            rows: 10,
            clips,
        }
    }
}

impl SpriteSheetConfig {
    pub fn frame_count(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn get(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.get(name)
    }

    /// Checks every clip against the grid and makes sure the factories' clip names exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, clip) in &self.clips {
            if let AnimationClip::Range { from, to, speed, .. } = *clip {
                if to < from || speed <= 0.0 {
                    return Err(ConfigError::InvalidClip(name.clone()));
                }
            }
            if clip.last_frame() >= self.frame_count() {
                return Err(ConfigError::FrameOutOfRange {
                    clip: name.clone(),
                    frame: clip.last_frame(),
                    frame_count: self.frame_count(),
                });
            }
        }

        match clip::ALL.iter().find(|name| !self.clips.contains_key(**name)) {
            Some(missing) => Err(ConfigError::MissingAnimation((*missing).to_owned())),
            None => Ok(()),
        }
    }
}

/// Loaded handles for the sheet image and its atlas layout.
#[derive(Resource, Clone)]
pub struct SpriteSheet {
    pub texture: Handle<Image>,
    pub layout: Handle<TextureAtlasLayout>,
    /// Side of one grid cell in sheet pixels.
    pub cell_size: f32,
}

impl SpriteSheet {
    pub fn atlas(&self, index: usize) -> TextureAtlas {
        TextureAtlas {
            layout: self.layout.clone(),
            index,
        }
    }
}

/// Currently playing clip on an atlas sprite.
#[derive(Component, Debug, Clone)]
pub struct SpriteAnimation {
    pub clip: &'static str,
    pub started_at: f32,
}

impl SpriteAnimation {
    pub fn new(clip: &'static str, now: f32) -> Self {
        Self {
            clip,
            started_at: now,
        }
    }

    /// Switches clips. Replaying the current clip keeps its phase.
    pub fn play(&mut self, clip: &'static str, now: f32) {
        if self.clip != clip {
            self.clip = clip;
            self.started_at = now;
        }
    }
}

fn validate_sprite_sheet(sheet: Res<SpriteSheetConfig>, mut exit: EventWriter<AppExit>) {
    if let Err(err) = sheet.validate() {
        error!("Sprite sheet '{}' is unusable: {}", sheet.image, err);
        exit.send(AppExit::error());
    }
}

fn load_sprite_sheet(
    mut commands: Commands,
    config: Res<SpriteSheetConfig>,
    asset_server: Res<AssetServer>,
    mut layouts: ResMut<Assets<TextureAtlasLayout>>,
) {
    let layout = TextureAtlasLayout::from_grid(
        UVec2::splat(config.tile_size),
        config.columns,
        config.rows,
        None,
        None,
    );

    commands.insert_resource(SpriteSheet {
        texture: asset_server.load(config.image.clone()),
        layout: layouts.add(layout),
        cell_size: config.tile_size as f32,
    });
}

fn animate_sprites(
    time: Res<Time>,
    sheet: Res<SpriteSheetConfig>,
    mut query: Query<(&SpriteAnimation, &mut TextureAtlas)>,
) {
    let now = time.elapsed_seconds();
    for (animation, mut atlas) in &mut query {
        let Some(clip) = sheet.get(animation.clip) else {
            continue;
        };
        let index = clip.frame_at(now - animation.started_at);
        if atlas.index != index {
            atlas.index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sheet_is_valid() {
        assert_eq!(SpriteSheetConfig::default().validate(), Ok(()));
    }

    #[test]
    fn looping_range_wraps() {
        let clip = AnimationClip::Range {
            from: 3,
            to: 8,
            speed: 15.0,
            looping: true,
        };
        assert_eq!(clip.frame_at(0.0), 3);
        assert_eq!(clip.frame_at(1.0 / 15.0 + 0.001), 4);
        // 6 frames at 15 fps: frame 6 wraps back to the first.
        assert_eq!(clip.frame_at(6.0 / 15.0 + 0.001), 3);
    }

    #[test]
    fn non_looping_range_holds_last_frame() {
        let clip = AnimationClip::Range {
            from: 18,
            to: 19,
            speed: 4.0,
            looping: false,
        };
        assert_eq!(clip.frame_at(10.0), 19);
    }

    #[test]
    fn single_frame_ignores_time() {
        assert_eq!(AnimationClip::Frame(9).frame_at(123.0), 9);
    }

    #[test]
    fn missing_clip_name_fails_validation() {
        let mut sheet = SpriteSheetConfig::default();
        sheet.clips.remove(clip::BIRD);
        assert_eq!(
            sheet.validate(),
            Err(ConfigError::MissingAnimation(clip::BIRD.to_owned()))
        );
    }

    #[test]
    fn frame_outside_grid_fails_validation() {
        let mut sheet = SpriteSheetConfig::default();
        sheet
            .clips
            .insert(clip::FLAME.to_owned(), AnimationClip::Frame(90));
        assert!(matches!(
            sheet.validate(),
            Err(ConfigError::FrameOutOfRange { frame: 90, frame_count: 90, .. })
        ));
    }

    #[test]
    fn backwards_range_fails_validation() {
        let mut sheet = SpriteSheetConfig::default();
        sheet.clips.insert(
            clip::GUY_WALK.to_owned(),
            AnimationClip::Range {
                from: 19,
                to: 18,
                speed: 4.0,
                looping: true,
            },
        );
        assert_eq!(
            sheet.validate(),
            Err(ConfigError::InvalidClip(clip::GUY_WALK.to_owned()))
        );
    }

    #[test]
    fn replaying_same_clip_keeps_phase() {
        let mut animation = SpriteAnimation::new(clip::KIRB_IDLE, 1.0);
        animation.play(clip::KIRB_IDLE, 5.0);
        assert_eq!(animation.started_at, 1.0);
        animation.play(clip::KIRB_FULL, 5.0);
        assert_eq!(animation.clip, clip::KIRB_FULL);
        assert_eq!(animation.started_at, 5.0);
    }
}
