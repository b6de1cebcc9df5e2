//! Tile collision map built from the LDtk IntGrid layer, plus the axis-aligned overlap tests used
//! by every gameplay interaction (inhale zone, contacts, projectiles, exits).

use std::collections::{HashMap, HashSet};

use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;

use crate::level::{LevelAssets, LevelConfig};

/// IntGrid value of solid platform tiles.
pub const SOLID_TILE: i32 = 1;
/// IntGrid value of tiles that end the level.
pub const EXIT_TILE: i32 = 2;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionMap>().add_systems(
            PostUpdate,
            rebuild_collision_map
                .after(crate::level::cache_level_transform)
                .in_set(CollisionSystems),
        );
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollisionSystems;

#[derive(Resource, Default)]
pub struct CollisionMap {
    pub tile_size: Vec2,
    pub origin: Vec2,
    pub tile_values: HashMap<IVec2, i32>,
    /// Set once the current level's tiles have been indexed.
    pub ready: bool,
}

impl CollisionMap {
    pub fn clear(&mut self) {
        self.tile_values.clear();
        self.ready = false;
    }

    pub fn get_tile_value(&self, tile: IVec2) -> Option<i32> {
        self.tile_values.get(&tile).copied()
    }

    pub fn is_solid(&self, tile: IVec2) -> bool {
        self.get_tile_value(tile) == Some(SOLID_TILE)
    }

    pub fn tile_at(&self, point: Vec2) -> IVec2 {
        ((point - self.origin) / self.tile_size).floor().as_ivec2()
    }

    /// Tiles covered by `aabb`, inclusive.
    fn tiles_under(&self, aabb: &Aabb) -> impl Iterator<Item = IVec2> {
        let min = self.tile_at(aabb.min);
        let max = self.tile_at(aabb.max);
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| IVec2::new(x, y)))
    }

    pub fn overlaps_value(&self, aabb: &Aabb, value: i32) -> bool {
        if self.tile_size.x <= 0.0 || self.tile_size.y <= 0.0 {
            return false;
        }
        self.tiles_under(aabb)
            .any(|tile| self.get_tile_value(tile) == Some(value))
    }

    pub fn overlaps_solid(&self, aabb: &Aabb) -> bool {
        self.overlaps_value(aabb, SOLID_TILE)
    }
}

/// Run condition for gameplay systems that need terrain.
pub fn collision_map_ready(map: Res<CollisionMap>) -> bool {
    map.ready
}

/// Hit box, offset from the entity's translation (the sprite centre).
#[derive(Component, Copy, Clone, Debug)]
pub struct Collider {
    pub half_extents: Vec2,
    pub offset: Vec2,
}

impl Collider {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            half_extents: size * 0.5,
            offset: Vec2::ZERO,
        }
    }

    /// Hit box drawn inside a square sprite cell of `cell` pixels: `top_left` is measured from the
    /// cell's top-left corner with y pointing down. The result is scaled into world units.
    pub fn from_sprite_rect(top_left: Vec2, size: Vec2, cell: f32, scale: f32) -> Self {
        let center = top_left + size * 0.5;
        let offset = Vec2::new(center.x - cell * 0.5, cell * 0.5 - center.y);
        Self {
            half_extents: size * 0.5 * scale,
            offset: offset * scale,
        }
    }

    /// Hit box of an entity whose translation is `position`.
    pub fn aabb_at(&self, position: Vec2) -> Aabb {
        Aabb::from_center(position + self.offset, self.half_extents)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }
}

/// Entities overlapping the owner during the previous tick. Used to turn continuous overlap
/// into a single "contact began" notification.
#[derive(Component, Default, Debug)]
pub struct Contacts {
    touching: HashSet<Entity>,
}

impl Contacts {
    /// Replaces the tracked set with `current` and returns the entities that were not touching
    /// on the previous call.
    pub fn update(&mut self, current: HashSet<Entity>) -> Vec<Entity> {
        let began = current
            .iter()
            .filter(|entity| !self.touching.contains(*entity))
            .copied()
            .collect();
        self.touching = current;
        began
    }
}

fn rebuild_collision_map(
    mut events: EventReader<LevelEvent>,
    int_cells: Query<(&GridCoords, &IntGridCell)>,
    config: Res<LevelConfig>,
    level_assets: Res<LevelAssets>,
    mut map: ResMut<CollisionMap>,
) {
    let mut needs_rebuild = false;

    for event in events.read() {
        match event {
            LevelEvent::Spawned(_) => needs_rebuild = true,
            LevelEvent::Despawned(_) => map.clear(),
            _ => {}
        }
    }

    if !needs_rebuild {
        return;
    }

    map.tile_size = Vec2::splat(config.tile_size * config.pixel_scale);
    map.origin = level_assets.level_origin.unwrap_or(Vec2::ZERO);
    map.tile_values.clear();

    for (coords, cell) in &int_cells {
        if cell.value <= 0 {
            continue;
        }
        map.tile_values
            .insert(IVec2::new(coords.x, coords.y), cell.value);
    }

    if !map.tile_values.values().any(|value| *value == SOLID_TILE) {
        warn!(
            "Collision map is empty. Ensure the LDtk IntGrid layer marks platforms with value {}.",
            SOLID_TILE
        );
    }

    map.ready = true;
    info!(
        "Indexed {} collision tiles for the current level.",
        map.tile_values.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(tiles: &[(i32, i32, i32)]) -> CollisionMap {
        let mut map = CollisionMap {
            tile_size: Vec2::splat(64.0),
            origin: Vec2::ZERO,
            ready: true,
            ..default()
        };
        for &(x, y, value) in tiles {
            map.tile_values.insert(IVec2::new(x, y), value);
        }
        map
    }

    #[test]
    fn aabb_overlap_excludes_touching_edges() {
        let a = Aabb::from_center(Vec2::ZERO, Vec2::splat(1.0));
        let touching = Aabb::from_center(Vec2::new(2.0, 0.0), Vec2::splat(1.0));
        let overlapping = Aabb::from_center(Vec2::new(1.5, 0.5), Vec2::splat(1.0));
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&overlapping));
        assert!(overlapping.overlaps(&a));
    }

    #[test]
    fn overlaps_solid_checks_every_covered_tile() {
        let map = map_with(&[(2, 0, SOLID_TILE)]);
        let inside = Aabb::from_center(Vec2::new(150.0, 30.0), Vec2::splat(10.0));
        let beside = Aabb::from_center(Vec2::new(100.0, 30.0), Vec2::splat(10.0));
        assert!(map.overlaps_solid(&inside));
        assert!(!map.overlaps_solid(&beside));
    }

    #[test]
    fn exit_tiles_are_not_solid() {
        let map = map_with(&[(0, 0, EXIT_TILE)]);
        let probe = Aabb::from_center(Vec2::splat(32.0), Vec2::splat(4.0));
        assert!(!map.is_solid(IVec2::ZERO));
        assert!(!map.overlaps_solid(&probe));
        assert!(map.overlaps_value(&probe, EXIT_TILE));
    }

    #[test]
    fn negative_coordinates_map_to_negative_tiles() {
        let map = map_with(&[]);
        assert_eq!(map.tile_at(Vec2::new(-1.0, -65.0)), IVec2::new(-1, -2));
    }

    #[test]
    fn sprite_rect_hit_box_reaches_the_sprite_feet() {
        // 8x10 box whose bottom edge sits 0.1 px above the bottom of a 16 px cell.
        let collider =
            Collider::from_sprite_rect(Vec2::new(4.0, 5.9), Vec2::new(8.0, 10.0), 16.0, 4.0);
        let aabb = collider.aabb_at(Vec2::new(100.0, 100.0));

        assert_eq!(collider.half_extents, Vec2::new(16.0, 20.0));
        assert!((aabb.min.x - 84.0).abs() < 1e-4);
        assert!((aabb.max.x - 116.0).abs() < 1e-4);
        // Sprite bottom is 100 - 8 * 4 = 68.
        assert!((aabb.min.y - 68.4).abs() < 1e-3);
    }

    #[test]
    fn contacts_report_only_new_overlaps() {
        let mut contacts = Contacts::default();
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);

        assert_eq!(contacts.update(HashSet::from([a])), vec![a]);
        assert_eq!(contacts.update(HashSet::from([a, b])), vec![b]);
        assert!(contacts.update(HashSet::from([a, b])).is_empty());
        assert!(contacts.update(HashSet::new()).is_empty());
        assert_eq!(contacts.update(HashSet::from([a])), vec![a]);
    }
}
