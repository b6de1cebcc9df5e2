//! Maps raw keyboard state to the player's four logical actions.
//!
//! Gameplay systems never look at key codes. They read [`ActionState`], which is rebuilt at the
//! start of every frame from Bevy's `ButtonInput<KeyCode>` and the active [`InputBindings`].

use std::collections::HashSet;

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::state::{GameSet, GameState};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputBindings>()
            .init_resource::<ActionState>()
            .add_systems(
                Update,
                read_actions
                    .in_set(GameSet::Input)
                    .before(InputSystems)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Systems that consume [`ActionState`] run in this set so they see the current frame.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSystems;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    MoveLeft,
    MoveRight,
    Jump,
    /// Held to inhale, released to spit.
    Inhale,
}

#[derive(Resource, Debug, Clone)]
pub struct InputBindings {
    pub keys: Vec<(KeyCode, PlayerAction)>,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            keys: vec![
                (KeyCode::ArrowLeft, PlayerAction::MoveLeft),
                (KeyCode::KeyA, PlayerAction::MoveLeft),
                (KeyCode::ArrowRight, PlayerAction::MoveRight),
                (KeyCode::KeyD, PlayerAction::MoveRight),
                (KeyCode::KeyX, PlayerAction::Jump),
                (KeyCode::ArrowUp, PlayerAction::Jump),
                (KeyCode::Space, PlayerAction::Jump),
                (KeyCode::KeyZ, PlayerAction::Inhale),
            ],
        }
    }
}

/// Per-frame snapshot of logical actions: held (continuous), pressed and released (edges).
#[derive(Resource, Default, Debug, Clone)]
pub struct ActionState {
    held: HashSet<PlayerAction>,
    pressed: HashSet<PlayerAction>,
    released: HashSet<PlayerAction>,
}

impl ActionState {
    pub fn from_keyboard(keyboard: &ButtonInput<KeyCode>, bindings: &InputBindings) -> Self {
        let mut state = ActionState::default();

        for &(key, action) in &bindings.keys {
            if keyboard.pressed(key) {
                state.held.insert(action);
            }
            if keyboard.just_pressed(key) {
                state.pressed.insert(action);
            }
        }

        // A release only counts once no other key bound to the same action is still down.
        for &(key, action) in &bindings.keys {
            if keyboard.just_released(key) && !state.held.contains(&action) {
                state.released.insert(action);
            }
        }

        state
    }

    pub fn held(&self, action: PlayerAction) -> bool {
        self.held.contains(&action)
    }

    pub fn just_pressed(&self, action: PlayerAction) -> bool {
        self.pressed.contains(&action)
    }

    pub fn just_released(&self, action: PlayerAction) -> bool {
        self.released.contains(&action)
    }

    /// -1, 0 or 1 along x.
    pub fn horizontal_axis(&self) -> f32 {
        let mut axis = 0.0;
        if self.held(PlayerAction::MoveLeft) {
            axis -= 1.0;
        }
        if self.held(PlayerAction::MoveRight) {
            axis += 1.0;
        }
        axis
    }
}

fn read_actions(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    mut actions: ResMut<ActionState>,
) {
    *actions = ActionState::from_keyboard(&keyboard, &bindings);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_an_edge_and_hold_is_continuous() {
        let bindings = InputBindings::default();
        let mut keyboard = ButtonInput::<KeyCode>::default();

        keyboard.press(KeyCode::KeyZ);
        let first = ActionState::from_keyboard(&keyboard, &bindings);
        assert!(first.held(PlayerAction::Inhale));
        assert!(first.just_pressed(PlayerAction::Inhale));

        keyboard.clear();
        let second = ActionState::from_keyboard(&keyboard, &bindings);
        assert!(second.held(PlayerAction::Inhale));
        assert!(!second.just_pressed(PlayerAction::Inhale));
    }

    #[test]
    fn release_is_reported_once() {
        let bindings = InputBindings::default();
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyZ);
        keyboard.clear();

        keyboard.release(KeyCode::KeyZ);
        let released = ActionState::from_keyboard(&keyboard, &bindings);
        assert!(released.just_released(PlayerAction::Inhale));
        assert!(!released.held(PlayerAction::Inhale));

        keyboard.clear();
        let after = ActionState::from_keyboard(&keyboard, &bindings);
        assert!(!after.just_released(PlayerAction::Inhale));
    }

    #[test]
    fn release_is_suppressed_while_an_alias_is_held() {
        let bindings = InputBindings::default();
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::ArrowLeft);
        keyboard.press(KeyCode::KeyA);
        keyboard.clear();

        keyboard.release(KeyCode::KeyA);
        let state = ActionState::from_keyboard(&keyboard, &bindings);
        assert!(state.held(PlayerAction::MoveLeft));
        assert!(!state.just_released(PlayerAction::MoveLeft));
    }

    #[test]
    fn opposite_directions_cancel() {
        let bindings = InputBindings::default();
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::ArrowLeft);
        assert_eq!(
            ActionState::from_keyboard(&keyboard, &bindings).horizontal_axis(),
            -1.0
        );
        keyboard.press(KeyCode::ArrowRight);
        assert_eq!(
            ActionState::from_keyboard(&keyboard, &bindings).horizontal_axis(),
            0.0
        );
    }
}
