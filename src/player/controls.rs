//! Transport controls: volume/mute contract, fullscreen flag and the
//! auto-hide inactivity timer.

use std::time::{Duration, Instant};

pub const HIDE_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct Controls {
    volume: f64,
    muted: bool,
    /// Last non-zero volume, restored on unmute.
    restore_volume: f64,
    fullscreen: bool,
    visible: bool,
    /// Armed only while playing; activity while paused keeps controls
    /// visible without arming the timer.
    hide_deadline: Option<Instant>,
}

impl Controls {
    pub fn new(volume: f64, muted: bool) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            volume,
            muted,
            restore_volume: if volume > 0.0 { volume } else { 0.7 },
            fullscreen: false,
            visible: true,
            hide_deadline: None,
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Effective output volume: zero while muted.
    pub fn effective_volume(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Setting a positive volume while muted clears mute.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        if self.volume > 0.0 {
            self.restore_volume = self.volume;
            self.muted = false;
        }
    }

    /// Muting preserves the last non-zero volume for restoration.
    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.muted = false;
            if self.volume == 0.0 {
                self.volume = self.restore_volume;
            }
        } else {
            if self.volume > 0.0 {
                self.restore_volume = self.volume;
            }
            self.muted = true;
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if muted != self.muted {
            self.toggle_mute();
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        self.fullscreen
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Register pointer/touch activity. While playing this re-arms the
    /// 3-second hide timer; while paused controls stay visible unarmed.
    pub fn register_activity(&mut self, is_playing: bool, now: Instant) {
        self.visible = true;
        self.hide_deadline = if is_playing {
            Some(now + HIDE_AFTER)
        } else {
            None
        };
    }

    /// Drive the inactivity timer. Returns true when visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.hide_deadline {
            if now >= deadline && self.visible {
                self.visible = false;
                self.hide_deadline = None;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_volume_clears_mute() {
        let mut controls = Controls::new(0.7, false);
        controls.toggle_mute();
        assert!(controls.is_muted());

        controls.set_volume(0.3);
        assert!(!controls.is_muted());
        assert!((controls.volume() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn mute_then_zero_volume_stays_silent() {
        let mut controls = Controls::new(0.7, false);
        controls.toggle_mute();
        controls.set_volume(0.0);
        // Still muted, and effective output is zero either way.
        assert!(controls.is_muted());
        assert_eq!(controls.effective_volume(), 0.0);
    }

    #[test]
    fn unmute_restores_last_nonzero_volume() {
        let mut controls = Controls::new(0.5, false);
        controls.toggle_mute();
        controls.set_volume(0.0);
        controls.toggle_mute();
        assert!((controls.volume() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn volume_is_clamped() {
        let mut controls = Controls::new(0.7, false);
        controls.set_volume(1.5);
        assert_eq!(controls.volume(), 1.0);
        controls.set_volume(-0.2);
        assert_eq!(controls.volume(), 0.0);
    }

    #[test]
    fn activity_while_playing_arms_hide_timer() {
        let mut controls = Controls::new(0.7, false);
        let start = Instant::now();
        controls.register_activity(true, start);
        assert!(controls.visible());

        assert!(!controls.tick(start + Duration::from_secs(2)));
        assert!(controls.visible());

        assert!(controls.tick(start + Duration::from_secs(4)));
        assert!(!controls.visible());
    }

    #[test]
    fn activity_while_paused_never_hides() {
        let mut controls = Controls::new(0.7, false);
        let start = Instant::now();
        controls.register_activity(false, start);
        assert!(!controls.tick(start + Duration::from_secs(60)));
        assert!(controls.visible());
    }

    #[test]
    fn new_activity_rearms_the_timer() {
        let mut controls = Controls::new(0.7, false);
        let start = Instant::now();
        controls.register_activity(true, start);
        controls.register_activity(true, start + Duration::from_secs(2));
        assert!(!controls.tick(start + Duration::from_secs(4)));
        assert!(controls.tick(start + Duration::from_secs(6)));
    }
}
