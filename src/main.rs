//! Application entry point: window setup, core Bevy plugins, and the game plugin from `app.rs`.

mod app;
mod assets;
mod camera;
mod collision;
mod combat;
mod config;
mod effects;
mod enemy;
mod error;
mod inhale;
mod input;
mod level;
mod movement;
mod player;
mod projectile;
mod spawner;
mod state;
mod transition;
mod ui;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::InhalePlatformerPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::render::texture::ImagePlugin;
use bevy::window::{Window, WindowResizeConstraints, WindowResolution};

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // 256×144 pixel art at 4x. The camera keeps this area visible at any window size.
    let primary_window = Window {
        title: "Inhale Platformer".to_string(),
        resolution: WindowResolution::new(camera::VIEW_WIDTH, camera::VIEW_HEIGHT),
        resizable: true,
        resize_constraints: WindowResizeConstraints {
            min_width: 512.0,
            min_height: 288.0,
            max_width: f32::INFINITY,
            max_height: f32::INFINITY,
        },
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    let mut default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest());

    #[cfg(not(target_arch = "wasm32"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(true),
            ..default()
        });
    }

    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(false),
            ..default()
        });
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb_u8(0xf7, 0xd7, 0xdb)))
        .add_plugins(default_plugins)
        .add_plugins(InhalePlatformerPlugin)
        .run();
}
