//! The per-frame driver.
//!
//! [`Simulation`] owns everything that changes while the sandbox runs and
//! advances it in a fixed order: physics, character, mixers, prop sync,
//! camera. Rendering reads the result afterwards. Nothing here touches the
//! GPU or the browser, so tests drive it headlessly.

use glam::{Quat, Vec2, Vec3};

use crate::config::SandboxConfig;
use crate::controller::animation::{AnimState, AnimationClipSet, AnimationMixer, CharacterAnimator};
use crate::controller::camera_rig::CameraRig;
use crate::controller::character::{CharacterController, CharacterState};
use crate::controller::input::{InputEvent, InputState};
use crate::controller::interaction::{pick, Interaction, InteractionRegistry, INTERACTIVE_CUBE};
use crate::controller::mining::{MiningEffect, MiningSequence, MiningStep};
use crate::model::assets::{self, LoadedModel};
use crate::model::camera::Camera;
use crate::model::inventory::{item_by_name, Inventory};
use crate::model::overlay::UiCommand;
use crate::model::physics::{BodyDesc, BodyHandle, PhysicsWorld};
use crate::model::scene::{NodeDesc, NodeId, SceneGraph, Shape, Transform};

const GROUND_COLOR: [f32; 4] = [0.36, 0.55, 0.33, 1.0];
const CUBE_COLOR: [f32; 4] = [0.9, 0.12, 0.1, 1.0];

/// A scene node whose transform follows a rigid body.
#[derive(Debug, Clone, Copy)]
pub struct PropBinding {
    pub node: NodeId,
    /// `None` while the prop is out of the world.
    pub body: Option<BodyHandle>,
    pub desc: BodyDesc,
}

struct AttachedCharacter {
    node: NodeId,
    animator: Option<CharacterAnimator>,
}

pub struct Simulation {
    cfg: SandboxConfig,
    fixed_step: f32,
    pub physics: PhysicsWorld,
    pub scene: SceneGraph,
    pub camera: Camera,
    pub input: InputState,
    controller: CharacterController,
    rig: CameraRig,
    character: Option<AttachedCharacter>,
    character_body: BodyHandle,
    props: Vec<PropBinding>,
    cube: usize,
    prop_mixers: Vec<AnimationMixer>,
    inventory: Inventory,
    mining: MiningSequence,
    registry: InteractionRegistry,
    clock_ms: f64,
    ui: Vec<UiCommand>,
}

impl Simulation {
    /// Builds the world: ground, character body, the mineable cube and the
    /// helicopter. The character model is attached separately.
    pub fn new(cfg: SandboxConfig, width: u32, height: u32) -> Self {
        let mut physics = PhysicsWorld::new(cfg.physics.gravity());
        let mut scene = SceneGraph::new();
        let root = scene.root();

        let half = cfg.world.ground_size * 0.5;
        scene.instantiate(
            &NodeDesc::new("ground", Shape::Plane { half_x: half, half_z: half }).color(GROUND_COLOR),
            root,
        );
        physics.add_body(&BodyDesc::ground());

        let controller = CharacterController::new(&cfg.character);
        let character_body =
            physics.add_body(&BodyDesc::character(controller.state().position, cfg.character.radius));

        let cube_pos = Vec3::from_array(cfg.world.cube_position);
        let cube_half = Vec3::from_array(cfg.world.cube_half_extents);
        let cube_node = scene.instantiate(
            &NodeDesc::new(INTERACTIVE_CUBE, Shape::Box { half_extents: cube_half })
                .color(CUBE_COLOR)
                .at(Transform::from_translation(cube_pos)),
            root,
        );
        let cube_desc = BodyDesc::crate_box(cube_pos, cube_half);
        let cube_body = physics.add_body(&cube_desc);
        let props = vec![PropBinding { node: cube_node, body: Some(cube_body), desc: cube_desc }];

        let mut prop_mixers = Vec::new();
        match assets::load_builtin(assets::HELICOPTER) {
            Ok(model) => {
                let placed = model.root.clone().at(
                    Transform::from_translation(Vec3::from_array(cfg.world.helicopter_position))
                        .with_scale(cfg.world.helicopter_scale),
                );
                let node = scene.instantiate(&placed, root);
                let mut mixer = AnimationMixer::bind(&scene, node, &model.clips);
                match mixer.find("Rotation") {
                    Some(clip) => {
                        mixer.play(clip, 1.0);
                        prop_mixers.push(mixer);
                    }
                    None => tracing::error!(model = %model.name, "rotor clip \"Rotation\" missing"),
                }
            }
            Err(e) => tracing::error!("{e}"),
        }

        let mut camera = Camera::new(width, height, &cfg.camera);
        let rig = CameraRig::new(&cfg.camera);
        rig.update(&mut camera, controller.state().position, controller.heading());

        tracing::info!(
            bodies = physics.body_count(),
            nodes = scene.len(),
            "simulation ready"
        );

        Self {
            fixed_step: cfg.physics.fixed_step(),
            input: InputState::new(cfg.keys.clone()),
            mining: MiningSequence::new(cfg.mining.clone()),
            cfg,
            physics,
            scene,
            camera,
            controller,
            rig,
            character: None,
            character_body,
            props,
            cube: 0,
            prop_mixers,
            inventory: Inventory::new(),
            registry: InteractionRegistry::default(),
            clock_ms: 0.0,
            ui: Vec::new(),
        }
    }

    /// Hooks a loaded model up to the controller. Without a usable clip set
    /// the character still moves, it just does not animate.
    pub fn attach_character(&mut self, model: LoadedModel) {
        if let Some(old) = self.character.take() {
            self.scene.detach(old.node);
        }
        let root = self.scene.root();
        let node = self.scene.instantiate(&model.root, root);
        let state = *self.controller.state();
        self.scene.set_translation(node, state.position);
        self.scene.set_rotation(node, Quat::from_rotation_y(state.heading));

        let mixer = AnimationMixer::bind(&self.scene, node, &model.clips);
        let animator = match AnimationClipSet::resolve(&mixer, &self.cfg.animation) {
            Ok(clips) => Some(CharacterAnimator::new(mixer, clips, self.cfg.animation.crossfade_seconds)),
            Err(e) => {
                tracing::error!(model = %model.name, "{e}");
                None
            }
        };
        tracing::info!(model = %model.name, animated = animator.is_some(), "character attached");
        self.character = Some(AttachedCharacter { node, animator });
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        self.input.process_event(&event);
        if let InputEvent::Click { ndc } = event {
            self.click(ndc);
        }
    }

    /// Runs whatever the clicked node is registered for.
    pub fn click(&mut self, ndc: Vec2) -> Option<Interaction> {
        let hit = pick(&self.scene, &self.camera, ndc, &self.registry)?;
        match hit.interaction {
            Interaction::Mine => {
                let effects = self.mining.start(self.clock_ms);
                self.apply_mining(effects);
            }
        }
        Some(hit.interaction)
    }

    pub fn frame(&mut self, elapsed_ms: f64) {
        let dt = self.fixed_step;
        self.physics.step(dt);

        // drags made before the model arrives stay queued in the input
        if let Some(character) = self.character.as_mut() {
            let orbit = self.rig.orbit_delta(self.input.poll_orbit_delta());
            if orbit != 0.0 {
                self.controller.rotate(orbit);
                let state = self.controller.state();
                self.rig.update(&mut self.camera, state.position, state.heading);
            }
            let locomotion =
                self.controller
                    .step(&mut self.input, &self.camera, &mut self.physics, self.character_body);
            let state = self.controller.state();
            self.scene.set_translation(character.node, state.position);
            self.scene.set_rotation(character.node, Quat::from_rotation_y(state.heading));
            if let Some(animator) = character.animator.as_mut() {
                animator.update(&locomotion);
                animator.advance(dt, &mut self.scene);
            }
        }

        for mixer in &mut self.prop_mixers {
            mixer.advance(dt);
            mixer.apply(&mut self.scene);
        }

        for prop in &self.props {
            let Some(body) = prop.body else { continue };
            if let Some(t) = self.physics.transform(body) {
                self.scene.set_translation(prop.node, t.position);
                self.scene.set_rotation(prop.node, t.rotation);
            }
        }

        if self.character.is_some() {
            let state = self.controller.state();
            self.rig.update(&mut self.camera, state.position, state.heading);
        }

        self.clock_ms += elapsed_ms;
        let effects = self.mining.poll(self.clock_ms);
        self.apply_mining(effects);
    }

    fn apply_mining(&mut self, effects: Vec<MiningEffect>) {
        for effect in effects {
            match effect {
                MiningEffect::Ui(cmd) => self.ui.push(cmd),
                MiningEffect::GrantItem { item, amount } => self.add_item(item, amount),
                MiningEffect::RemoveCube => self.remove_cube(),
                MiningEffect::RestoreCube { position } => self.restore_cube(position),
            }
        }
    }

    fn remove_cube(&mut self) {
        let prop = &mut self.props[self.cube];
        self.scene.detach(prop.node);
        if let Some(body) = prop.body.take() {
            self.physics.remove_body(body);
        }
        tracing::debug!("cube removed");
    }

    fn restore_cube(&mut self, position: Vec3) {
        let root = self.scene.root();
        let prop = &mut self.props[self.cube];
        self.scene.set_translation(prop.node, position);
        self.scene.set_rotation(prop.node, Quat::IDENTITY);
        if prop.body.is_none() {
            prop.body = Some(self.physics.add_body(&prop.desc.at(position)));
        }
        self.scene.attach(prop.node, root);
        tracing::debug!(?position, "cube restored");
    }

    pub fn add_item(&mut self, id: u32, quantity: u32) {
        match self.inventory.add_item(id, quantity) {
            Ok(()) => self.ui.push(UiCommand::RefreshInventory),
            Err(e) => tracing::error!("{e}"),
        }
    }

    pub fn remove_item(&mut self, id: u32, quantity: u32) {
        match self.inventory.remove_item(id, quantity) {
            Ok(()) => self.ui.push(UiCommand::RefreshInventory),
            Err(e) => tracing::error!("{e}"),
        }
    }

    pub fn add_item_by_name(&mut self, name: &str, quantity: u32) {
        match item_by_name(name) {
            Some(item) => self.add_item(item.id, quantity),
            None => tracing::error!("{}", crate::error::SandboxError::UnknownItemName(name.to_string())),
        }
    }

    pub fn remove_item_by_name(&mut self, name: &str, quantity: u32) {
        match item_by_name(name) {
            Some(item) => self.remove_item(item.id, quantity),
            None => tracing::error!("{}", crate::error::SandboxError::UnknownItemName(name.to_string())),
        }
    }

    /// Everything the overlays should react to since the last call.
    pub fn drain_ui_commands(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.ui)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.cfg
    }

    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn character_state(&self) -> &CharacterState {
        self.controller.state()
    }

    pub fn character_node(&self) -> Option<NodeId> {
        self.character.as_ref().map(|c| c.node)
    }

    pub fn character_body(&self) -> BodyHandle {
        self.character_body
    }

    pub fn animation_state(&self) -> Option<AnimState> {
        self.character.as_ref()?.animator.as_ref().map(|a| a.state())
    }

    pub fn props(&self) -> &[PropBinding] {
        &self.props
    }

    pub fn cube(&self) -> &PropBinding {
        &self.props[self.cube]
    }

    pub fn mining_step(&self) -> MiningStep {
        self.mining.step()
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> Simulation {
        Simulation::new(SandboxConfig::default(), 800, 600)
    }

    #[test]
    fn world_has_ground_character_and_cube() {
        let s = sim();
        assert_eq!(s.physics.body_count(), 3);
        assert!(s.scene.find_by_name(INTERACTIVE_CUBE).is_some());
        assert!(s.scene.find_by_name("Rotor").is_some());
        assert!(s.character_node().is_none());
    }

    #[test]
    fn unknown_item_name_leaves_inventory_alone() {
        let mut s = sim();
        s.add_item_by_name("Gold Ore", 1);
        assert!(s.inventory().stacks().is_empty());
        assert!(s.drain_ui_commands().is_empty());

        s.add_item_by_name("Stone", 2);
        assert_eq!(s.inventory().quantity_of(2), 2);
        assert_eq!(s.drain_ui_commands(), vec![UiCommand::RefreshInventory]);
    }

    #[test]
    fn rotor_spins_without_character() {
        let mut s = sim();
        let rotor = s.scene.find_by_name("Rotor").unwrap();
        let before = s.scene.node(rotor).pose.rotation;
        for _ in 0..5 {
            s.frame(16.0);
        }
        let after = s.scene.node(rotor).pose.rotation;
        assert!(before.angle_between(after) > 1e-3);
    }
}
