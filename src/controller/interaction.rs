use glam::Vec2;

use crate::model::camera::Camera;
use crate::model::scene::{NodeId, SceneGraph};

pub const INTERACTIVE_CUBE: &str = "interactiveCube";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Mine,
}

/// Node names that react to clicks.
#[derive(Debug, Clone)]
pub struct InteractionRegistry {
    entries: Vec<(String, Interaction)>,
}

impl InteractionRegistry {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, name: &str, interaction: Interaction) {
        self.entries.retain(|(n, _)| n != name);
        self.entries.push((name.to_string(), interaction));
    }

    pub fn lookup(&self, name: &str) -> Option<Interaction> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, i)| *i)
    }
}

impl Default for InteractionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(INTERACTIVE_CUBE, Interaction::Mine);
        registry
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pick {
    pub interaction: Interaction,
    pub node: NodeId,
    pub distance: f32,
}

/// Casts from the camera through `ndc` and resolves the nearest hit. Only
/// the nearest node counts: an unknown node in front hides a known one
/// behind it.
pub fn pick(scene: &SceneGraph, camera: &Camera, ndc: Vec2, registry: &InteractionRegistry) -> Option<Pick> {
    let ray = camera.ray_through(ndc);
    let hit = scene.intersect_ray(&ray)?;
    let name = scene.name(hit.node)?;
    let interaction = registry.lookup(name)?;
    tracing::debug!(target_node = name, distance = hit.distance, "interaction hit");
    Some(Pick { interaction, node: hit.node, distance: hit.distance })
}
