// crates/engine_plugins/src/basic_scene.rs

use std::ffi::c_void;

use glam::Vec2;

use engine_core::scene::{register_scene_manager, unregister_scene_manager, SceneManager};

use crate::shims::{guard_load, guard_unload};

pub const NAME: &str = "BasicSceneManager";

// Scene bounds shared by every body.
pub const MAP_WIDTH: f32 = 2000.0;
pub const MAP_HEIGHT: f32 = 2000.0;

/// Bodies a scene built by the plugin factory starts with.
pub const DEFAULT_BODIES: usize = 16;
const BODY_SPEED: f32 = 120.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Flat list of moving bodies that bounce off the map edges.
#[derive(Default)]
pub struct BasicSceneManager {
    bodies: Vec<Body>,
    ticks: u64,
}

impl BasicSceneManager {
    /// `count` bodies spread along the horizontal midline, each heading off
    /// in a different direction.
    pub fn seeded(count: usize) -> Self {
        let mut scene = Self::default();
        for i in 0..count {
            let x = (i as f32 + 0.5) / count as f32 * MAP_WIDTH;
            let heading = i as f32 * std::f32::consts::TAU / count as f32 + 0.3;
            scene.spawn(Vec2::new(x, MAP_HEIGHT * 0.5), Vec2::from_angle(heading) * BODY_SPEED);
        }
        scene
    }

    pub fn spawn(&mut self, position: Vec2, velocity: Vec2) -> usize {
        self.bodies.push(Body { position, velocity });
        self.bodies.len() - 1
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl SceneManager for BasicSceneManager {
    fn name(&self) -> &str {
        NAME
    }

    fn update(&mut self, delta: f32) {
        let bounds = Vec2::new(MAP_WIDTH, MAP_HEIGHT);
        for body in &mut self.bodies {
            body.position += body.velocity * delta;

            if body.position.x < 0.0 || body.position.x > bounds.x {
                body.velocity.x = -body.velocity.x;
            }
            if body.position.y < 0.0 || body.position.y > bounds.y {
                body.velocity.y = -body.velocity.y;
            }
            body.position = body.position.clamp(Vec2::ZERO, bounds);
        }
        self.ticks += 1;
    }
}

pub extern "C" fn load() -> *mut c_void {
    guard_load(NAME, || {
        register_scene_manager(NAME, || Box::new(BasicSceneManager::seeded(DEFAULT_BODIES)));
        std::ptr::null_mut()
    })
}

pub extern "C" fn unload() {
    guard_unload(NAME, || {
        unregister_scene_manager(NAME);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_move_and_bounce_inside_the_map() {
        let mut scene = BasicSceneManager::default();
        scene.spawn(Vec2::new(10.0, 1990.0), Vec2::new(-100.0, 100.0));

        scene.update(0.5);
        let body = scene.bodies()[0];
        assert_eq!(body.position, Vec2::new(0.0, MAP_HEIGHT));
        assert_eq!(body.velocity, Vec2::new(100.0, -100.0));

        scene.update(0.5);
        assert_eq!(scene.bodies()[0].position, Vec2::new(50.0, MAP_HEIGHT - 50.0));
        assert_eq!(scene.ticks(), 2);
    }

    #[test]
    fn seeded_scene_has_moving_bodies_that_stay_in_bounds() {
        let mut scene = BasicSceneManager::seeded(DEFAULT_BODIES);
        assert_eq!(scene.bodies().len(), DEFAULT_BODIES);
        let start: Vec<_> = scene.bodies().iter().map(|body| body.position).collect();

        for _ in 0..600 {
            scene.update(0.25);
        }

        let bounds = Vec2::new(MAP_WIDTH, MAP_HEIGHT);
        for (body, start) in scene.bodies().iter().zip(start) {
            assert!(body.velocity.length() > 0.0);
            assert_ne!(body.position, start);
            assert!(body.position.cmpge(Vec2::ZERO).all() && body.position.cmple(bounds).all());
        }
    }
}
