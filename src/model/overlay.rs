//! State behind the on-screen overlays.
//!
//! The simulation only emits [`UiCommand`]s; this module turns them into
//! what the UI draws and owns the timers that dismiss them.

use std::str::FromStr;

use crate::controller::scheduler::{TaskScheduler, TaskToken};

pub const NOTIFICATION_FADE_MS: f64 = 500.0;
pub const PROGRESS_FADE_MS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Info, Severity::Warning, Severity::Success, Severity::Error];

    pub fn rgb(self) -> [u8; 3] {
        match self {
            Severity::Error => [0xf4, 0x43, 0x36],
            Severity::Warning => [0xff, 0xae, 0x00],
            Severity::Info => [0x47, 0x47, 0xce],
            Severity::Success => [0x4c, 0xaf, 0x50],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown severity {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Notify {
        title: String,
        message: String,
        duration_ms: f64,
        severity: Severity,
    },
    ShowProgress {
        title: String,
        message: String,
        duration_ms: f64,
    },
    RefreshInventory,
    PlaySound {
        path: String,
        volume: f32,
        duration_ms: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub fading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    pub title: String,
    pub message: String,
    pub duration_ms: f64,
    pub started_at: f64,
    pub fading: bool,
}

impl ProgressBar {
    pub fn fraction(&self, now: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration_ms).clamp(0.0, 1.0) as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSound {
    pub id: u64,
    pub path: String,
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotbarButton {
    Inventory,
    Chat,
    Jobs,
}

impl HotbarButton {
    pub const ALL: [HotbarButton; 3] = [HotbarButton::Inventory, HotbarButton::Chat, HotbarButton::Jobs];

    pub fn label(self) -> &'static str {
        match self {
            HotbarButton::Inventory => "Inventory",
            HotbarButton::Chat => "Chat",
            HotbarButton::Jobs => "Jobs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlayTask {
    FadeNotification,
    CloseNotification,
    FadeProgress,
    CloseProgress,
    StopSound(u64),
}

pub struct Overlays {
    tasks: TaskScheduler<OverlayTask>,
    notification: Option<Notification>,
    // pending fade/close of the current notification
    notification_task: Option<TaskToken>,
    progress: Option<ProgressBar>,
    inventory_open: bool,
    inventory_revision: u64,
    sounds: Vec<ActiveSound>,
    next_sound: u64,
}

impl Overlays {
    pub fn new() -> Self {
        Self {
            tasks: TaskScheduler::new(),
            notification: None,
            notification_task: None,
            progress: None,
            inventory_open: false,
            inventory_revision: 0,
            sounds: Vec::new(),
            next_sound: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.tasks.now()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    pub fn sounds(&self) -> &[ActiveSound] {
        &self.sounds
    }

    pub fn inventory_open(&self) -> bool {
        self.inventory_open
    }

    /// Bumped on every inventory refresh request.
    pub fn inventory_revision(&self) -> u64 {
        self.inventory_revision
    }

    pub fn apply(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Notify { title, message, duration_ms, severity } => {
                self.notify(title, message, duration_ms, severity)
            }
            UiCommand::ShowProgress { title, message, duration_ms } => {
                self.show_progress(title, message, duration_ms)
            }
            UiCommand::RefreshInventory => self.inventory_revision += 1,
            UiCommand::PlaySound { path, volume, duration_ms } => self.play_sound(path, volume, duration_ms),
        }
    }

    /// Replaces whatever notification is showing; the old one's pending
    /// dismissal is cancelled so it cannot close the new one.
    pub fn notify(&mut self, title: String, message: String, duration_ms: f64, severity: Severity) {
        if let Some(stale) = self.notification_task.take() {
            self.tasks.cancel(stale);
        }
        tracing::info!(%title, severity = severity.label(), "notification");
        self.notification = Some(Notification { title, message, severity, fading: false });
        self.notification_task = Some(self.tasks.schedule(duration_ms, OverlayTask::FadeNotification));
    }

    /// Ignored while a progress bar is already open.
    pub fn show_progress(&mut self, title: String, message: String, duration_ms: f64) {
        if self.progress.is_some() {
            tracing::debug!(%title, "progress bar busy, request dropped");
            return;
        }
        self.progress = Some(ProgressBar {
            title,
            message,
            duration_ms,
            started_at: self.tasks.now(),
            fading: false,
        });
        self.tasks.schedule(duration_ms, OverlayTask::FadeProgress);
    }

    pub fn play_sound(&mut self, path: String, volume: f32, duration_ms: f64) {
        let id = self.next_sound;
        self.next_sound += 1;
        self.sounds.push(ActiveSound { id, path, volume: volume.clamp(0.0, 1.0) });
        self.tasks.schedule(duration_ms, OverlayTask::StopSound(id));
    }

    pub fn toggle_inventory(&mut self) {
        self.inventory_open = !self.inventory_open;
        if self.inventory_open {
            self.inventory_revision += 1;
        }
    }

    pub fn press_hotbar(&mut self, button: HotbarButton) {
        match button {
            HotbarButton::Inventory => self.toggle_inventory(),
            HotbarButton::Chat => {
                self.notify("Chat".into(), "Chat is not available yet.".into(), 3000.0, Severity::Info)
            }
            HotbarButton::Jobs => {
                self.notify("Jobs".into(), "Jobs are not available yet.".into(), 3000.0, Severity::Info)
            }
        }
    }

    pub fn advance(&mut self, dt_ms: f64) {
        for task in self.tasks.advance(dt_ms) {
            match task {
                OverlayTask::FadeNotification => {
                    if let Some(n) = self.notification.as_mut() {
                        n.fading = true;
                    }
                    self.notification_task =
                        Some(self.tasks.schedule(NOTIFICATION_FADE_MS, OverlayTask::CloseNotification));
                }
                OverlayTask::CloseNotification => {
                    self.notification = None;
                    self.notification_task = None;
                }
                OverlayTask::FadeProgress => {
                    if let Some(p) = self.progress.as_mut() {
                        p.fading = true;
                    }
                    self.tasks.schedule(PROGRESS_FADE_MS, OverlayTask::CloseProgress);
                }
                OverlayTask::CloseProgress => self.progress = None,
                OverlayTask::StopSound(id) => self.sounds.retain(|s| s.id != id),
            }
        }
    }
}

impl Default for Overlays {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notify(o: &mut Overlays, title: &str, ms: f64) {
        o.apply(UiCommand::Notify {
            title: title.into(),
            message: String::new(),
            duration_ms: ms,
            severity: Severity::Info,
        });
    }

    #[test]
    fn notification_fades_then_closes() {
        let mut o = Overlays::new();
        notify(&mut o, "a", 1000.0);
        o.advance(1000.0);
        assert!(o.notification().unwrap().fading);
        o.advance(499.0);
        assert!(o.notification().is_some());
        o.advance(1.0);
        assert!(o.notification().is_none());
    }

    #[test]
    fn new_notification_replaces_and_outlives_stale_timer() {
        let mut o = Overlays::new();
        notify(&mut o, "first", 1000.0);
        o.advance(900.0);
        notify(&mut o, "second", 1000.0);
        // the first one's deadline passes without touching the second
        o.advance(700.0);
        let n = o.notification().unwrap();
        assert_eq!(n.title, "second");
        assert!(!n.fading);
        o.advance(300.0);
        assert!(o.notification().unwrap().fading);
        o.advance(NOTIFICATION_FADE_MS);
        assert!(o.notification().is_none());
    }

    #[test]
    fn replacing_during_fade_cancels_close() {
        let mut o = Overlays::new();
        notify(&mut o, "first", 100.0);
        o.advance(100.0);
        notify(&mut o, "second", 2000.0);
        o.advance(NOTIFICATION_FADE_MS);
        assert_eq!(o.notification().unwrap().title, "second");
    }

    #[test]
    fn progress_ignores_requests_while_open() {
        let mut o = Overlays::new();
        o.show_progress("Mining".into(), "one".into(), 3000.0);
        o.show_progress("Mining".into(), "two".into(), 3000.0);
        assert_eq!(o.progress().unwrap().message, "one");
        o.advance(1500.0);
        assert!((o.progress().unwrap().fraction(o.now()) - 0.5).abs() < 1e-6);
        o.advance(1500.0);
        assert!(o.progress().unwrap().fading);
        o.advance(PROGRESS_FADE_MS);
        assert!(o.progress().is_none());
        o.show_progress("Mining".into(), "three".into(), 3000.0);
        assert_eq!(o.progress().unwrap().message, "three");
    }

    #[test]
    fn sounds_stop_after_duration() {
        let mut o = Overlays::new();
        o.play_sound("boom.wav".into(), 1.5, 2000.0);
        assert_eq!(o.sounds()[0].volume, 1.0);
        o.advance(1999.0);
        assert_eq!(o.sounds().len(), 1);
        o.advance(1.0);
        assert!(o.sounds().is_empty());
    }

    #[test]
    fn hotbar_toggles_inventory_and_posts_info() {
        let mut o = Overlays::new();
        o.press_hotbar(HotbarButton::Inventory);
        assert!(o.inventory_open());
        o.press_hotbar(HotbarButton::Inventory);
        assert!(!o.inventory_open());
        o.press_hotbar(HotbarButton::Jobs);
        assert_eq!(o.notification().unwrap().severity, Severity::Info);
    }

    #[test]
    fn severity_parses_labels() {
        assert_eq!("Success".parse::<Severity>(), Ok(Severity::Success));
        assert!("loud".parse::<Severity>().is_err());
    }
}
