//! Shooting star spat out by a full player. Flies straight at a fixed speed until it hits terrain
//! or an enemy; both cases are resolved in `combat.rs`. Stars that miss are dropped once they
//! leave the view.

use bevy::prelude::*;

use crate::assets::{clip, SpriteAnimation, SpriteSheet};
use crate::camera::{visible_area, FollowCamera};
use crate::collision::{collision_map_ready, Collider};
use crate::enemy::{is_beyond_viewport, EnemyTuning};
use crate::inhale::{InhaleTuning, StarLaunch};
use crate::level::LevelScoped;
use crate::movement::{Body, Velocity};
use crate::state::{GameSet, GameState};

pub struct ProjectilePlugin;

impl Plugin for ProjectilePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            cull_offscreen_stars
                .in_set(GameSet::Effects)
                .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
        );
    }
}

#[derive(Component, Debug)]
pub struct ShootingStar;

pub fn spawn_shooting_star(
    commands: &mut Commands,
    sheet: &SpriteSheet,
    tuning: &InhaleTuning,
    pixel_scale: f32,
    launch: StarLaunch,
    now: f32,
) -> Entity {
    let collider = Collider::from_sprite_rect(
        Vec2::new(tuning.star_hitbox_origin.0, tuning.star_hitbox_origin.1),
        Vec2::new(tuning.star_hitbox.0, tuning.star_hitbox.1),
        sheet.cell_size,
        pixel_scale,
    );

    commands
        .spawn((
            Name::new("ShootingStar"),
            ShootingStar,
            LevelScoped,
            SpriteBundle {
                texture: sheet.texture.clone(),
                sprite: Sprite {
                    // The sheet draws the star flying left.
                    flip_x: launch.velocity.x > 0.0,
                    ..default()
                },
                transform: Transform::from_translation(launch.position.extend(9.0))
                    .with_scale(Vec3::new(pixel_scale, pixel_scale, 1.0)),
                ..default()
            },
            sheet.atlas(0),
            SpriteAnimation::new(clip::SHOOTING_STAR, now),
            Velocity(launch.velocity),
            Body::kinematic(),
            collider,
        ))
        .id()
}

fn cull_offscreen_stars(
    mut commands: Commands,
    tuning: Res<EnemyTuning>,
    cameras: Query<(&Transform, &OrthographicProjection), With<FollowCamera>>,
    stars: Query<(Entity, &Transform, &Collider), (With<ShootingStar>, Without<FollowCamera>)>,
) {
    let Ok((camera_transform, projection)) = cameras.get_single() else {
        return;
    };
    let viewport = visible_area(camera_transform.translation.truncate(), projection);

    for (entity, transform, collider) in &stars {
        let aabb = collider.aabb_at(transform.translation.truncate());
        if is_beyond_viewport(&aabb, &viewport, tuning.offscreen_margin) {
            commands.entity(entity).despawn_recursive();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    fn spawn_star(world: &mut World, x: f32) -> Entity {
        world
            .spawn((
                ShootingStar,
                Transform::from_xyz(x, 0.0, 0.0),
                Collider::from_size(Vec2::splat(24.0)),
            ))
            .id()
    }

    #[test]
    fn stars_that_leave_the_view_are_dropped() {
        let mut world = World::new();
        world.insert_resource(EnemyTuning::default());
        world.spawn((
            FollowCamera,
            Transform::default(),
            OrthographicProjection {
                area: Rect::new(-400.0, -225.0, 400.0, 225.0),
                ..default()
            },
        ));
        // Margin 400: anything whose box starts past x 800 is gone.
        let in_view = spawn_star(&mut world, 300.0);
        let in_margin = spawn_star(&mut world, 700.0);
        let far_right = spawn_star(&mut world, 2000.0);
        let far_left = spawn_star(&mut world, -2000.0);

        world.run_system_once(cull_offscreen_stars);

        assert!(world.get_entity(in_view).is_some());
        assert!(world.get_entity(in_margin).is_some());
        assert!(world.get_entity(far_right).is_none());
        assert!(world.get_entity(far_left).is_none());
    }
}
