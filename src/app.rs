//! High-level plugin composition.
//!
//! `InhalePlatformerPlugin` registers every gameplay plugin and the ordering of the per-frame
//! system sets. Each subsystem owns its own resources.

use bevy::prelude::*;

use crate::assets::SpriteAssetsPlugin;
use crate::camera::CameraPlugin;
use crate::collision::CollisionPlugin;
use crate::combat::CombatPlugin;
use crate::config::ConfigPlugin;
use crate::effects::EffectsPlugin;
use crate::enemy::EnemyPlugin;
use crate::inhale::InhalePlugin;
use crate::input::InputPlugin;
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::player::PlayerPlugin;
use crate::projectile::ProjectilePlugin;
use crate::spawner::SpawnerPlugin;
use crate::state::{toggle_pause, GameSet, GameState};
use crate::transition::TransitionPlugin;
use crate::ui::UiPlugin;

pub struct InhalePlatformerPlugin;

impl Plugin for InhalePlatformerPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_plugins((
                ConfigPlugin,       // Tuning overrides from RON.
                SpriteAssetsPlugin, // Sprite sheet, clips, animation player.
                LevelPlugin,        // LDtk loading and spawn points.
                CollisionPlugin,    // IntGrid collision map.
                InputPlugin,        // Keys to actions.
                MovementPlugin,     // Gravity and tile collision.
            ))
            .add_plugins((
                PlayerPlugin,
                InhalePlugin,
                EnemyPlugin,
                ProjectilePlugin,
                CombatPlugin,
                EffectsPlugin,
                SpawnerPlugin,
                CameraPlugin,
                TransitionPlugin,
                UiPlugin, // Pause overlay and HUD.
            ))
            // Input → Ai → Movement → Combat → Effects, only while playing.
            .configure_sets(
                Update,
                (
                    GameSet::Input,
                    GameSet::Ai,
                    GameSet::Movement,
                    GameSet::Combat,
                    GameSet::Effects,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Update, toggle_pause);
    }
}
