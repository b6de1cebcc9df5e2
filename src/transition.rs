//! Level flow: restarting the current level and fading over to the next one.
//!
//! Touching an exit tile (IntGrid value 2) fades the screen to black, swaps the level at the
//! midpoint while the screen is fully covered, and fades back in. Deaths and falls restart the
//! current level straight away.

use bevy::prelude::*;

use crate::collision::{collision_map_ready, Collider, CollisionMap, EXIT_TILE};
use crate::level::LevelConfig;
use crate::player::Player;
use crate::state::{GameSet, GameState};

pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SceneRequest>()
            .init_resource::<TransitionState>()
            .add_systems(Startup, spawn_fade_overlay)
            .add_systems(
                Update,
                (
                    check_exit_tiles
                        .in_set(GameSet::Combat)
                        .run_if(collision_map_ready),
                    handle_scene_requests.after(GameSet::Combat),
                    update_transition.after(handle_scene_requests),
                )
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Update, update_fade_overlay);
    }
}

/// Level flow requested by gameplay systems.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneRequest {
    /// Reload the current level immediately.
    Restart,
    /// Fade over to the next level.
    Next,
}

/// Progress of the fade between levels.
#[derive(Resource, Debug)]
pub struct TransitionState {
    pub is_transitioning: bool,
    pub fade_timer: f32,
    /// Fade-out plus fade-in, in seconds.
    pub fade_duration: f32,
    pub next_level: Option<usize>,
}

impl Default for TransitionState {
    fn default() -> Self {
        Self {
            is_transitioning: false,
            fade_timer: 0.0,
            fade_duration: 1.0,
            next_level: None,
        }
    }
}

impl TransitionState {
    pub fn start_transition(&mut self, next_level: usize) {
        self.is_transitioning = true;
        self.fade_timer = 0.0;
        self.next_level = Some(next_level);
    }

    pub fn reset(&mut self) {
        self.is_transitioning = false;
        self.fade_timer = 0.0;
        self.next_level = None;
    }

    /// Overlay opacity: 0 is clear, 1 fully black.
    pub fn fade_alpha(&self) -> f32 {
        if !self.is_transitioning || self.fade_duration <= 0.0 {
            return 0.0;
        }

        let half_duration = self.fade_duration * 0.5;
        if self.fade_timer < half_duration {
            self.fade_timer / half_duration
        } else {
            (1.0 - (self.fade_timer - half_duration) / half_duration).max(0.0)
        }
    }

    /// Advances the fade by `delta`. Returns the level to load when this step crosses the midpoint.
    pub fn advance(&mut self, delta: f32) -> Option<usize> {
        if !self.is_transitioning {
            return None;
        }

        let half_duration = self.fade_duration * 0.5;
        let before = self.fade_timer;
        self.fade_timer += delta;

        let swap = if before < half_duration && self.fade_timer >= half_duration {
            self.next_level.take()
        } else {
            None
        };

        if self.fade_timer >= self.fade_duration {
            self.reset();
        }
        swap
    }
}

/// Full-screen UI node used for fades.
#[derive(Component)]
pub struct FadeOverlay;

fn spawn_fade_overlay(mut commands: Commands) {
    commands.spawn((
        FadeOverlay,
        Name::new("FadeOverlay"),
        NodeBundle {
            background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.0)),
            style: Style {
                position_type: PositionType::Absolute,
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
            z_index: ZIndex::Global(100),
            ..default()
        },
    ));
}

fn update_fade_overlay(
    transition: Res<TransitionState>,
    mut overlay_query: Query<&mut BackgroundColor, With<FadeOverlay>>,
) {
    if !transition.is_changed() {
        return;
    }
    for mut background in &mut overlay_query {
        background.0 = Color::srgba(0.0, 0.0, 0.0, transition.fade_alpha());
    }
}

fn check_exit_tiles(
    transition: Res<TransitionState>,
    map: Res<CollisionMap>,
    player_query: Query<(&Transform, &Collider), With<Player>>,
    mut requests: EventWriter<SceneRequest>,
) {
    if transition.is_transitioning {
        return;
    }
    let Ok((transform, collider)) = player_query.get_single() else {
        return;
    };

    if map.overlaps_value(&collider.aabb_at(transform.translation.truncate()), EXIT_TILE) {
        requests.send(SceneRequest::Next);
    }
}

fn handle_scene_requests(
    mut requests: EventReader<SceneRequest>,
    mut transition: ResMut<TransitionState>,
    config: Res<LevelConfig>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let mut restart = false;
    let mut next = false;
    for request in requests.read() {
        match request {
            SceneRequest::Restart => restart = true,
            SceneRequest::Next => next = true,
        }
    }

    if restart {
        info!("Restarting level.");
        transition.reset();
        next_state.set(GameState::Loading);
    } else if next && !transition.is_transitioning {
        let next_level = config.next_index();
        info!("Exit reached; moving on to level {}.", next_level);
        transition.start_transition(next_level);
    }
}

fn update_transition(
    time: Res<Time>,
    mut transition: ResMut<TransitionState>,
    mut next_state: ResMut<NextState<GameState>>,
    mut level_config: ResMut<LevelConfig>,
) {
    if !transition.is_transitioning {
        return;
    }

    if let Some(level) = transition.advance(time.delta_seconds()) {
        level_config.current = level;
        next_state.set(GameState::Loading);
    }
}
