//! Clip mixer with single-slot crossfades and the locomotion state machine
//! that drives it.

use glam::{Quat, Vec3};

use crate::config::AnimationConfig;
use crate::error::{Result, SandboxError};
use crate::model::assets::{AnimationClip, Motion};
use crate::model::scene::{NodeId, SceneGraph, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimState {
    Idle,
    WalkForward,
    WalkBackward,
    Jump,
}

/// Locomotion state for this frame's input. `None` means "keep the current
/// state" (strafing without forward/backward).
pub fn resolve(airborne: bool, forward: bool, backward: bool, strafing: bool) -> Option<AnimState> {
    if airborne {
        Some(AnimState::Jump)
    } else if backward {
        Some(AnimState::WalkBackward)
    } else if forward {
        Some(AnimState::WalkForward)
    } else if strafing {
        None
    } else {
        Some(AnimState::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(usize);

struct BoundClip {
    name: String,
    duration: f32,
    channels: Vec<(NodeId, Motion)>,
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClipAction {
    time: f32,
    rate: f32,
    weight: f32,
    running: bool,
    fade: Option<Fade>,
}

/// Plays clips of one model instance. At most one clip fades out at a time;
/// starting another transition drops whatever was still fading.
pub struct AnimationMixer {
    clips: Vec<BoundClip>,
    actions: Vec<ClipAction>,
    targets: Vec<NodeId>,
    active: Option<ClipId>,
    outgoing: Option<ClipId>,
}

impl AnimationMixer {
    /// Binds clip channels to nodes under `root`. Channels naming a node the
    /// model doesn't have are dropped with a warning.
    pub fn bind(scene: &SceneGraph, root: NodeId, clips: &[AnimationClip]) -> Self {
        let mut targets = Vec::new();
        let bound: Vec<BoundClip> = clips
            .iter()
            .map(|clip| {
                let channels = clip
                    .channels
                    .iter()
                    .filter_map(|ch| match scene.find_in(root, &ch.node) {
                        Some(node) => {
                            if !targets.contains(&node) {
                                targets.push(node);
                            }
                            Some((node, ch.motion))
                        }
                        None => {
                            tracing::warn!(clip = %clip.name, node = %ch.node, "animation target not found");
                            None
                        }
                    })
                    .collect();
                BoundClip {
                    name: clip.name.clone(),
                    duration: clip.duration,
                    channels,
                }
            })
            .collect();

        Self {
            actions: vec![ClipAction::default(); bound.len()],
            clips: bound,
            targets,
            active: None,
            outgoing: None,
        }
    }

    pub fn find(&self, name: &str) -> Option<ClipId> {
        self.clips.iter().position(|c| c.name == name).map(ClipId)
    }

    pub fn find_ignore_case(&self, name: &str) -> Option<ClipId> {
        self.clips
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .map(ClipId)
    }

    pub fn clip_name(&self, id: ClipId) -> &str {
        &self.clips[id.0].name
    }

    pub fn active(&self) -> Option<ClipId> {
        self.active
    }

    pub fn outgoing(&self) -> Option<ClipId> {
        self.outgoing
    }

    pub fn weight(&self, id: ClipId) -> f32 {
        self.actions[id.0].weight
    }

    pub fn time(&self, id: ClipId) -> f32 {
        self.actions[id.0].time
    }

    pub fn is_running(&self, id: ClipId) -> bool {
        self.actions[id.0].running
    }

    /// Starts `id` at full weight with no fade.
    pub fn play(&mut self, id: ClipId, rate: f32) {
        self.actions[id.0] = ClipAction { time: 0.0, rate, weight: 1.0, running: true, fade: None };
        self.active = Some(id);
    }

    /// Returns false (and changes nothing) when `id` is already active.
    pub fn crossfade_to(&mut self, id: ClipId, rate: f32, duration: f32) -> bool {
        if self.active == Some(id) {
            return false;
        }

        if let Some(stale) = self.outgoing.take() {
            self.actions[stale.0] = ClipAction::default();
        }

        if let Some(prev) = self.active {
            let action = &mut self.actions[prev.0];
            if duration > 0.0 {
                action.fade = Some(Fade { from: action.weight, to: 0.0, elapsed: 0.0, duration });
                self.outgoing = Some(prev);
            } else {
                *action = ClipAction::default();
            }
        }

        let (weight, fade) = if duration > 0.0 {
            (0.0, Some(Fade { from: 0.0, to: 1.0, elapsed: 0.0, duration }))
        } else {
            (1.0, None)
        };
        self.actions[id.0] = ClipAction { time: 0.0, rate, weight, running: true, fade };
        self.active = Some(id);
        true
    }

    pub fn advance(&mut self, dt: f32) {
        for (i, action) in self.actions.iter_mut().enumerate() {
            if !action.running {
                continue;
            }
            let duration = self.clips[i].duration;
            if duration > 0.0 {
                action.time = (action.time + dt * action.rate).rem_euclid(duration);
            }

            if let Some(mut fade) = action.fade {
                fade.elapsed += dt;
                let t = (fade.elapsed / fade.duration).min(1.0);
                action.weight = fade.from + (fade.to - fade.from) * t;
                if t >= 1.0 {
                    action.fade = None;
                    if fade.to <= 0.0 {
                        *action = ClipAction::default();
                        if self.outgoing == Some(ClipId(i)) {
                            self.outgoing = None;
                        }
                    }
                } else {
                    action.fade = Some(fade);
                }
            }
        }
    }

    /// Writes the weighted pose of every running clip onto its nodes.
    pub fn apply(&self, scene: &mut SceneGraph) {
        for node in &self.targets {
            scene.node_mut(*node).pose = Transform::IDENTITY;
        }
        for (clip, action) in self.clips.iter().zip(&self.actions) {
            if !action.running || action.weight <= 0.0 {
                continue;
            }
            let u = if clip.duration > 0.0 { action.time / clip.duration } else { 0.0 };
            for (node, motion) in &clip.channels {
                let sample = motion.sample(u);
                let pose = &mut scene.node_mut(*node).pose;
                pose.translation += sample.translation * action.weight;
                pose.rotation = (pose.rotation * Quat::IDENTITY.slerp(sample.rotation, action.weight)).normalize();
                pose.scale = Vec3::ONE;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBinding {
    pub id: ClipId,
    pub rate: f32,
}

/// The four locomotion clips of the character, resolved once when the model
/// is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationClipSet {
    pub idle: ClipBinding,
    pub walk_forward: ClipBinding,
    pub walk_backward: ClipBinding,
    pub jump: ClipBinding,
}

impl AnimationClipSet {
    /// Case-insensitive lookup of every configured clip. Fails with the list
    /// of names the model is missing.
    pub fn resolve(mixer: &AnimationMixer, cfg: &AnimationConfig) -> Result<Self> {
        let mut missing = Vec::new();
        let mut lookup = |clip: &crate::config::ClipSpec| match mixer.find_ignore_case(&clip.name) {
            Some(id) => ClipBinding { id, rate: clip.rate },
            None => {
                missing.push(clip.name.clone());
                ClipBinding { id: ClipId(usize::MAX), rate: clip.rate }
            }
        };
        let set = Self {
            idle: lookup(&cfg.idle),
            walk_forward: lookup(&cfg.walk_forward),
            walk_backward: lookup(&cfg.walk_backward),
            jump: lookup(&cfg.jump),
        };
        if missing.is_empty() {
            Ok(set)
        } else {
            Err(SandboxError::MissingClips(missing))
        }
    }

    pub fn clip(&self, state: AnimState) -> ClipBinding {
        match state {
            AnimState::Idle => self.idle,
            AnimState::WalkForward => self.walk_forward,
            AnimState::WalkBackward => self.walk_backward,
            AnimState::Jump => self.jump,
        }
    }
}

/// What the controller reports to the animator each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocomotionFrame {
    pub airborne: bool,
    pub forward: bool,
    pub backward: bool,
    pub strafing: bool,
    pub jumped: bool,
    pub landed: bool,
}

pub struct CharacterAnimator {
    mixer: AnimationMixer,
    clips: AnimationClipSet,
    crossfade: f32,
    state: AnimState,
}

impl CharacterAnimator {
    /// Starts in idle at full weight.
    pub fn new(mut mixer: AnimationMixer, clips: AnimationClipSet, crossfade: f32) -> Self {
        mixer.play(clips.idle.id, clips.idle.rate);
        Self { mixer, clips, crossfade, state: AnimState::Idle }
    }

    pub fn state(&self) -> AnimState {
        self.state
    }

    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    /// No-op when `target` is already playing.
    pub fn switch(&mut self, target: AnimState) -> bool {
        let clip = self.clips.clip(target);
        let switched = self.mixer.crossfade_to(clip.id, clip.rate, self.crossfade);
        if switched {
            tracing::debug!(from = ?self.state, to = ?target, "animation switch");
        }
        self.state = target;
        switched
    }

    /// Picks the state for this frame. A landing forces idle and a jump
    /// forces the jump clip, whatever keys are held.
    pub fn update(&mut self, frame: &LocomotionFrame) {
        let target = if frame.landed {
            Some(AnimState::Idle)
        } else if frame.jumped {
            Some(AnimState::Jump)
        } else {
            resolve(frame.airborne, frame.forward, frame.backward, frame.strafing)
        };
        if let Some(target) = target {
            self.switch(target);
        }
    }

    pub fn advance(&mut self, dt: f32, scene: &mut SceneGraph) {
        self.mixer.advance(dt);
        self.mixer.apply(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::assets::{load_builtin, CHARACTER};

    const DT: f32 = 1.0 / 60.0;

    fn mixer() -> (SceneGraph, AnimationMixer) {
        let model = load_builtin(CHARACTER).unwrap();
        let mut scene = SceneGraph::new();
        let root = scene.instantiate(&model.root, scene.root());
        let mixer = AnimationMixer::bind(&scene, root, &model.clips);
        (scene, mixer)
    }

    #[test]
    fn resolve_table() {
        assert_eq!(resolve(false, true, false, false), Some(AnimState::WalkForward));
        assert_eq!(resolve(false, false, true, false), Some(AnimState::WalkBackward));
        assert_eq!(resolve(false, false, false, false), Some(AnimState::Idle));
        for (f, b) in [(false, false), (true, false), (false, true), (true, true)] {
            assert_eq!(resolve(true, f, b, false), Some(AnimState::Jump));
        }
        assert_eq!(resolve(false, true, true, false), Some(AnimState::WalkBackward));
        assert_eq!(resolve(false, false, false, true), None);
    }

    #[test]
    fn switch_to_active_is_noop() {
        let (_, mut m) = mixer();
        let idle = m.find("Idle").unwrap();
        assert!(m.crossfade_to(idle, 1.0, 0.25));
        m.advance(0.1);
        let w = m.weight(idle);
        let t = m.time(idle);
        assert!(!m.crossfade_to(idle, 1.0, 0.25));
        assert_eq!(m.weight(idle), w);
        assert_eq!(m.time(idle), t);
    }

    #[test]
    fn crossfade_hands_weight_over() {
        let (_, mut m) = mixer();
        let idle = m.find("Idle").unwrap();
        let walk = m.find("Walk_Forward").unwrap();
        m.play(idle, 1.0);
        m.crossfade_to(walk, 1.0, 0.25);
        assert_eq!(m.outgoing(), Some(idle));
        assert_eq!(m.time(walk), 0.0);

        m.advance(0.125);
        assert!((m.weight(idle) - 0.5).abs() < 1e-4);
        assert!((m.weight(walk) - 0.5).abs() < 1e-4);

        m.advance(0.2);
        assert_eq!(m.weight(walk), 1.0);
        assert!(!m.is_running(idle));
        assert_eq!(m.outgoing(), None);
    }

    #[test]
    fn second_switch_discards_pending_fade() {
        let (_, mut m) = mixer();
        let idle = m.find("Idle").unwrap();
        let walk = m.find("Walk_Forward").unwrap();
        let jump = m.find("Jump").unwrap();
        m.play(idle, 1.0);
        m.crossfade_to(walk, 1.0, 0.25);
        m.advance(0.1);
        let walk_weight = m.weight(walk);

        m.crossfade_to(jump, 1.0, 0.25);
        assert!(!m.is_running(idle));
        assert_eq!(m.outgoing(), Some(walk));
        assert_eq!(m.weight(walk), walk_weight);
        assert_eq!(m.active(), Some(jump));
    }

    #[test]
    fn clip_time_scales_with_rate_and_loops() {
        let (_, mut m) = mixer();
        let back = m.find("Walk_Backward").unwrap();
        m.play(back, 0.8);
        m.advance(0.5);
        assert!((m.time(back) - 0.4).abs() < 1e-5);
        m.advance(1.0);
        assert!((m.time(back) - 0.2).abs() < 1e-4);
    }

    #[test]
    fn clip_set_reports_missing_names() {
        let (_, m) = mixer();
        let mut cfg = AnimationConfig::default();
        assert!(AnimationClipSet::resolve(&m, &cfg).is_ok());

        cfg.idle.name = "idle".into();
        assert!(AnimationClipSet::resolve(&m, &cfg).is_ok());

        cfg.jump.name = "Backflip".into();
        match AnimationClipSet::resolve(&m, &cfg) {
            Err(SandboxError::MissingClips(names)) => assert_eq!(names, vec!["Backflip".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn animator_follows_locomotion() {
        let (mut scene, m) = mixer();
        let clips = AnimationClipSet::resolve(&m, &AnimationConfig::default()).unwrap();
        let mut anim = CharacterAnimator::new(m, clips, 0.25);

        anim.update(&LocomotionFrame { forward: true, ..Default::default() });
        assert_eq!(anim.state(), AnimState::WalkForward);

        // strafe only keeps the walk
        anim.update(&LocomotionFrame { strafing: true, ..Default::default() });
        assert_eq!(anim.state(), AnimState::WalkForward);

        anim.update(&LocomotionFrame { jumped: true, airborne: true, forward: true, ..Default::default() });
        assert_eq!(anim.state(), AnimState::Jump);

        anim.update(&LocomotionFrame { landed: true, forward: true, ..Default::default() });
        assert_eq!(anim.state(), AnimState::Idle);

        anim.advance(DT, &mut scene);
    }

    #[test]
    fn apply_moves_bound_nodes() {
        let (mut scene, mut m) = mixer();
        let walk = m.find("Walk_Forward").unwrap();
        m.play(walk, 1.0);
        m.advance(0.25);
        m.apply(&mut scene);
        let leg = scene.find_by_name("LeftLeg").unwrap();
        assert!(scene.node(leg).pose.rotation.angle_between(Quat::IDENTITY) > 0.1);
    }
}
