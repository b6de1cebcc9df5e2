//! Overlap resolution for one tick.
//!
//! Projectile hits are resolved before player contacts. An entity claimed by an earlier
//! interaction this tick is skipped by later ones, so an enemy struck by a star cannot also be
//! swallowed or deal damage in the same frame.

use std::collections::HashSet;

use bevy::color::Alpha;
use bevy::prelude::*;

use crate::collision::{collision_map_ready, Collider, CollisionMap, Contacts};
use crate::effects::Flicker;
use crate::enemy::Enemy;
use crate::player::{resolve_enemy_contact, ContactOutcome, Health, Player, PlayerTuning};
use crate::projectile::ShootingStar;
use crate::state::{GameSet, GameState};
use crate::transition::SceneRequest;

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TickClaims>().add_systems(
            Update,
            (clear_tick_claims, resolve_projectiles, resolve_player_contacts)
                .chain()
                .in_set(GameSet::Combat)
                .run_if(in_state(GameState::Playing).and_then(collision_map_ready)),
        );
    }
}

/// Entities already consumed by an interaction during the current tick.
#[derive(Resource, Default, Debug)]
pub struct TickClaims {
    claimed: HashSet<Entity>,
}

impl TickClaims {
    /// Claims `entity`. Returns `false` if something else got to it first this tick.
    pub fn claim(&mut self, entity: Entity) -> bool {
        self.claimed.insert(entity)
    }

    pub fn is_claimed(&self, entity: Entity) -> bool {
        self.claimed.contains(&entity)
    }

    pub fn clear(&mut self) {
        self.claimed.clear();
    }
}

fn clear_tick_claims(mut claims: ResMut<TickClaims>) {
    claims.clear();
}

fn resolve_projectiles(
    mut commands: Commands,
    mut claims: ResMut<TickClaims>,
    map: Res<CollisionMap>,
    stars: Query<(Entity, &Transform, &Collider), (With<ShootingStar>, Without<Enemy>)>,
    enemies: Query<(Entity, &Enemy, &Transform, &Collider)>,
) {
    for (star, star_transform, star_collider) in &stars {
        let star_box = star_collider.aabb_at(star_transform.translation.truncate());

        if map.overlaps_solid(&star_box) {
            if claims.claim(star) {
                commands.entity(star).despawn_recursive();
            }
            continue;
        }

        let target = enemies.iter().find(|(entity, _, transform, collider)| {
            !claims.is_claimed(*entity)
                && star_box.overlaps(&collider.aabb_at(transform.translation.truncate()))
        });

        if let Some((enemy_entity, enemy, _, _)) = target {
            if claims.claim(star) && claims.claim(enemy_entity) {
                debug!("Star hit {:?}.", enemy.kind);
                commands.entity(star).despawn_recursive();
                commands.entity(enemy_entity).despawn_recursive();
            }
        }
    }
}

fn resolve_player_contacts(
    mut commands: Commands,
    time: Res<Time>,
    tuning: Res<PlayerTuning>,
    mut claims: ResMut<TickClaims>,
    mut players: Query<
        (
            Entity,
            &mut Player,
            &mut Health,
            &mut Contacts,
            &Transform,
            &Collider,
            &Sprite,
            Option<&Flicker>,
        ),
        Without<Enemy>,
    >,
    enemies: Query<(Entity, &Enemy, &Transform, &Collider)>,
    mut requests: EventWriter<SceneRequest>,
) {
    let now = time.elapsed_seconds();

    for (player_entity, mut player, mut health, mut contacts, transform, collider, sprite, flicker) in
        &mut players
    {
        let player_box = collider.aabb_at(transform.translation.truncate());
        let touching: HashSet<Entity> = enemies
            .iter()
            .filter(|(_, _, enemy_transform, enemy_collider)| {
                player_box.overlaps(&enemy_collider.aabb_at(enemy_transform.translation.truncate()))
            })
            .map(|(entity, ..)| entity)
            .collect();

        for enemy_entity in contacts.update(touching) {
            if claims.is_claimed(enemy_entity) {
                continue;
            }
            let Ok((_, enemy, _, _)) = enemies.get(enemy_entity) else {
                continue;
            };

            match resolve_enemy_contact(&mut player, &mut health, enemy.inhalable) {
                ContactOutcome::Swallowed => {
                    claims.claim(enemy_entity);
                    info!("Swallowed {:?}.", enemy.kind);
                    commands.entity(enemy_entity).despawn_recursive();
                }
                ContactOutcome::Ignored => {}
                ContactOutcome::Damaged => {
                    let base = flicker.map_or(sprite.color.alpha(), |active| active.base);
                    commands
                        .entity(player_entity)
                        .insert(Flicker::new(now, tuning.flicker_step, base));
                    info!("Player hit by {:?}; {} hp left.", enemy.kind, health.hp());
                }
                ContactOutcome::Died => {
                    claims.claim(player_entity);
                    info!("Player died; restarting level.");
                    commands.entity(player_entity).despawn_recursive();
                    requests.send(SceneRequest::Restart);
                    break;
                }
            }
        }
    }
}
