//! Timed visual effects expressed as timelines over virtual time.
//!
//! A timeline stores when it started and is evaluated against the current time each frame.
//! Despawning the entity discards it.

use bevy::color::Alpha;
use bevy::prelude::*;

use crate::assets::SpriteAnimation;
use crate::state::{GameSet, GameState};

pub struct EffectsPlugin;

impl Plugin for EffectsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (update_flicker, play_scheduled_clips)
                .in_set(GameSet::Effects)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

/// Damage flash: a linear fade to transparent, then a linear fade back to `base`.
#[derive(Component, Debug, Clone)]
pub struct Flicker {
    pub started_at: f32,
    /// Duration of each of the two fades.
    pub step: f32,
    pub base: f32,
}

impl Flicker {
    pub fn new(now: f32, step: f32, base: f32) -> Self {
        Self {
            started_at: now,
            step,
            base,
        }
    }

    /// Opacity at `now`, or `None` once both fades are complete.
    pub fn opacity_at(&self, now: f32) -> Option<f32> {
        let t = (now - self.started_at).max(0.0);
        if self.step <= 0.0 || t >= self.step * 2.0 {
            return None;
        }
        if t < self.step {
            Some(self.base * (1.0 - t / self.step))
        } else {
            Some(self.base * ((t - self.step) / self.step))
        }
    }
}

/// Switches to `clip` once virtual time reaches `at`.
#[derive(Component, Debug, Clone)]
pub struct ScheduledClip {
    pub clip: &'static str,
    pub at: f32,
}

fn update_flicker(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &Flicker, &mut Sprite)>,
) {
    let now = time.elapsed_seconds();
    for (entity, flicker, mut sprite) in &mut query {
        match flicker.opacity_at(now) {
            Some(alpha) => sprite.color.set_alpha(alpha),
            None => {
                sprite.color.set_alpha(flicker.base);
                commands.entity(entity).remove::<Flicker>();
            }
        }
    }
}

fn play_scheduled_clips(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &ScheduledClip, &mut SpriteAnimation)>,
) {
    let now = time.elapsed_seconds();
    for (entity, scheduled, mut animation) in &mut query {
        if now >= scheduled.at {
            animation.play(scheduled.clip, now);
            commands.entity(entity).remove::<ScheduledClip>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn flicker_fades_out_then_back_in() {
        let flicker = Flicker::new(10.0, 0.05, 1.0);
        assert_eq!(flicker.opacity_at(10.0), Some(1.0));
        let mid_out = flicker.opacity_at(10.025).unwrap();
        assert!((mid_out - 0.5).abs() < 1e-3);
        let bottom = flicker.opacity_at(10.0499).unwrap();
        assert!(bottom < 0.01);
        let mid_in = flicker.opacity_at(10.075).unwrap();
        assert!((mid_in - 0.5).abs() < 1e-3);
    }

    #[test]
    fn flicker_ends_after_both_fades() {
        let flicker = Flicker::new(0.0, 0.05, 1.0);
        assert_eq!(flicker.opacity_at(0.1), None);
        assert_eq!(flicker.opacity_at(5.0), None);
    }

    #[test]
    fn flicker_restores_original_opacity() {
        let mut world = World::new();
        let mut time = Time::<()>::default();
        let entity = world
            .spawn((Sprite::default(), Flicker::new(0.0, 0.05, 0.8)))
            .id();

        time.advance_by(std::time::Duration::from_millis(20));
        world.insert_resource(time.clone());
        world.run_system_once(update_flicker);
        let alpha = world.get::<Sprite>(entity).unwrap().color.alpha();
        assert!(alpha < 0.8);

        time.advance_by(std::time::Duration::from_millis(200));
        world.insert_resource(time);
        world.run_system_once(update_flicker);
        let sprite = world.get::<Sprite>(entity).unwrap();
        assert!((sprite.color.alpha() - 0.8).abs() < 1e-6);
        assert!(world.get::<Flicker>(entity).is_none());
    }
}
