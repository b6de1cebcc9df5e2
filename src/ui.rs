//! Pause overlay and the hit-point counter.

use bevy::prelude::*;

use crate::player::{Health, Player};
use crate::state::GameState;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_health_hud)
            .add_systems(OnEnter(GameState::Paused), spawn_pause_menu)
            .add_systems(OnExit(GameState::Paused), despawn_pause_menu)
            .add_systems(Update, update_health_hud);
    }
}

#[derive(Component)]
struct PauseMenu;

#[derive(Component)]
struct HealthHud;

pub fn health_label(health: &Health) -> String {
    format!("HP {}/{}", health.hp(), health.max())
}

fn spawn_pause_menu(mut commands: Commands) {
    commands
        .spawn((
            PauseMenu,
            Name::new("PauseMenu"),
            NodeBundle {
                background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
                style: Style {
                    position_type: PositionType::Absolute,
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    align_items: AlignItems::Center,
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                z_index: ZIndex::Global(50),
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "Paused\nPress ESC to resume",
                TextStyle {
                    font_size: 36.0,
                    color: Color::srgba(0.9, 0.9, 0.9, 1.0),
                    ..default()
                },
            ));
        });
}

fn despawn_pause_menu(mut commands: Commands, query: Query<Entity, With<PauseMenu>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn spawn_health_hud(mut commands: Commands) {
    commands.spawn((
        HealthHud,
        Name::new("HealthHud"),
        TextBundle::from_section(
            "",
            TextStyle {
                font_size: 28.0,
                color: Color::srgb(0.35, 0.1, 0.2),
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(16.0),
            ..default()
        }),
    ));
}

fn update_health_hud(
    players: Query<&Health, (With<Player>, Changed<Health>)>,
    mut hud: Query<&mut Text, With<HealthHud>>,
) {
    let Ok(health) = players.get_single() else {
        return;
    };
    for mut text in &mut hud {
        if let Some(section) = text.sections.first_mut() {
            section.value = health_label(health);
        }
    }
}
