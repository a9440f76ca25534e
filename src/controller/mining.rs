//! Mining as an explicit sequence of timed steps.
//!
//! The sequence never touches the world itself: each transition returns the
//! effects the owner has to carry out, so the whole thing runs on a plain
//! millisecond clock in tests.

use glam::Vec3;

use crate::config::MiningConfig;
use crate::model::overlay::{Severity, UiCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningStep {
    Idle,
    /// Progress bar running; the cube is still in the world.
    Progress,
    /// Cube removed, waiting to respawn.
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MiningEffect {
    Ui(UiCommand),
    GrantItem { item: u32, amount: u32 },
    RemoveCube,
    RestoreCube { position: Vec3 },
}

pub struct MiningSequence {
    cfg: MiningConfig,
    step: MiningStep,
    deadline: f64,
}

impl MiningSequence {
    pub fn new(cfg: MiningConfig) -> Self {
        Self { cfg, step: MiningStep::Idle, deadline: 0.0 }
    }

    pub fn step(&self) -> MiningStep {
        self.step
    }

    pub fn deadline(&self) -> Option<f64> {
        (self.step != MiningStep::Idle).then_some(self.deadline)
    }

    /// Begins (or restarts) mining at `now`. A restart replaces the pending
    /// deadline instead of running alongside it.
    pub fn start(&mut self, now: f64) -> Vec<MiningEffect> {
        if self.step == MiningStep::Progress {
            tracing::debug!("mining restarted");
        }
        self.step = MiningStep::Progress;
        self.deadline = now + self.cfg.progress_duration_ms;
        vec![
            MiningEffect::Ui(UiCommand::ShowProgress {
                title: self.cfg.progress_title.clone(),
                message: self.cfg.progress_message.clone(),
                duration_ms: self.cfg.progress_duration_ms,
            }),
            MiningEffect::GrantItem { item: self.cfg.item, amount: self.cfg.amount },
        ]
    }

    /// Runs every step whose deadline has passed by `now`, in order.
    pub fn poll(&mut self, now: f64) -> Vec<MiningEffect> {
        let mut effects = Vec::new();
        while self.step != MiningStep::Idle && now >= self.deadline {
            match self.step {
                MiningStep::Progress => {
                    effects.push(MiningEffect::Ui(UiCommand::Notify {
                        title: self.cfg.notify_title.clone(),
                        message: self.cfg.notify_message.clone(),
                        duration_ms: self.cfg.notify_duration_ms,
                        severity: Severity::Success,
                    }));
                    effects.push(MiningEffect::Ui(UiCommand::PlaySound {
                        path: self.cfg.sound_path.clone(),
                        volume: self.cfg.sound_volume,
                        duration_ms: self.cfg.sound_duration_ms,
                    }));
                    effects.push(MiningEffect::RemoveCube);
                    self.step = MiningStep::Removed;
                    self.deadline += self.cfg.respawn_delay_ms;
                }
                MiningStep::Removed => {
                    effects.push(MiningEffect::RestoreCube {
                        position: Vec3::from_array(self.cfg.respawn_position),
                    });
                    effects.push(MiningEffect::Ui(UiCommand::RefreshInventory));
                    self.step = MiningStep::Idle;
                }
                MiningStep::Idle => break,
            }
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq() -> MiningSequence {
        MiningSequence::new(MiningConfig::default())
    }

    #[test]
    fn start_shows_progress_and_grants() {
        let mut m = seq();
        let fx = m.start(0.0);
        assert!(matches!(fx[0], MiningEffect::Ui(UiCommand::ShowProgress { duration_ms, .. }) if duration_ms == 3000.0));
        assert_eq!(fx[1], MiningEffect::GrantItem { item: 1, amount: 1 });
        assert_eq!(m.step(), MiningStep::Progress);
    }

    #[test]
    fn steps_follow_deadlines() {
        let mut m = seq();
        m.start(100.0);
        assert!(m.poll(3099.0).is_empty());

        let fx = m.poll(3100.0);
        assert!(fx.contains(&MiningEffect::RemoveCube));
        assert!(fx.iter().any(|e| matches!(e, MiningEffect::Ui(UiCommand::Notify { severity: Severity::Success, .. }))));
        assert!(fx.iter().any(|e| matches!(e, MiningEffect::Ui(UiCommand::PlaySound { .. }))));
        assert_eq!(m.step(), MiningStep::Removed);

        assert!(m.poll(5099.0).is_empty());
        let fx = m.poll(5100.0);
        assert_eq!(fx[0], MiningEffect::RestoreCube { position: Vec3::new(2.0, 1.0, 0.0) });
        assert_eq!(fx[1], MiningEffect::Ui(UiCommand::RefreshInventory));
        assert_eq!(m.step(), MiningStep::Idle);
        assert!(m.poll(1e9).is_empty());
    }

    #[test]
    fn large_jump_runs_both_steps_in_order() {
        let mut m = seq();
        m.start(0.0);
        let fx = m.poll(10_000.0);
        let remove = fx.iter().position(|e| *e == MiningEffect::RemoveCube).unwrap();
        let restore = fx.iter().position(|e| matches!(e, MiningEffect::RestoreCube { .. })).unwrap();
        assert!(remove < restore);
    }

    #[test]
    fn restart_replaces_deadline() {
        let mut m = seq();
        m.start(0.0);
        m.start(2000.0);
        assert!(m.poll(3000.0).is_empty());
        assert_eq!(m.deadline(), Some(5000.0));
        assert!(m.poll(5000.0).contains(&MiningEffect::RemoveCube));
    }
}
