//! Global game state and the per-frame system ordering.
//!
//! Pausing also pauses Bevy's virtual clock. Enemy timers and flicker timelines store the virtual
//! time at which they resume, so a pause must not let that clock run on.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

/// High-level state machine for the game loop.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
    Paused,
}

/// Named system sets of the `Update` schedule, chained in declaration order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    /// Keyboard to player actions.
    Input,
    /// Enemy state machines, inhale zone and pull.
    Ai,
    /// Kinematics for bodies and projectiles.
    Movement,
    /// Overlap resolution: swallows, damage, projectile hits, exits, falls.
    Combat,
    /// Presentation: flicker, animation frames, camera.
    Effects,
}

/// Toggles between Playing and Paused when `ESC` is pressed.
pub fn toggle_pause(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut virtual_time: ResMut<Time<Virtual>>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }

    match state.get() {
        GameState::Playing => {
            virtual_time.pause();
            next_state.set(GameState::Paused);
        }
        GameState::Paused => {
            virtual_time.unpause();
            next_state.set(GameState::Playing);
        }
        GameState::Loading => {}
    }
}
