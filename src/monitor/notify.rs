//! Live notification payload, delivery seam and click routing.
//!
//! Delivery delegates to the host platform notifier; only the payload and
//! the routing decisions live here.

use std::process::Command;

pub const WATCH_ACTION: &str = "watch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
}

impl LiveNotification {
    /// The fixed "went live" payload.
    pub fn live_now() -> Self {
        Self {
            title: "🔴 RalphTV Live".to_string(),
            body: "RalphTV is now streaming live!".to_string(),
            icon: "/icon-192.png".to_string(),
            badge: "/icon-180.png".to_string(),
            tag: "stream-live".to_string(),
            require_interaction: false,
            actions: vec![NotificationAction {
                action: WATCH_ACTION.to_string(),
                title: "Watch Now".to_string(),
            }],
        }
    }
}

pub trait LiveNotifier: Send + Sync {
    fn show(&self, notification: &LiveNotification);
}

/// Shells out to the platform notifier.
pub struct DesktopNotifier;

impl LiveNotifier for DesktopNotifier {
    fn show(&self, notification: &LiveNotification) {
        log::info!("Showing live notification: {}", notification.title);

        #[cfg(target_os = "linux")]
        {
            let _ = Command::new("notify-send")
                .args(["--app-name", "RalphTV"])
                .arg(&notification.title)
                .arg(&notification.body)
                .spawn();
        }

        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                notification.body, notification.title
            );
            let _ = Command::new("osascript").args(["-e", &script]).spawn();
        }

        #[cfg(target_os = "windows")]
        {
            let _ = Command::new("msg")
                .args(["*", &format!("{}: {}", notification.title, notification.body)])
                .spawn();
        }
    }
}

/// Used when live notifications are disabled in the config.
pub struct NullNotifier;

impl LiveNotifier for NullNotifier {
    fn show(&self, notification: &LiveNotification) {
        log::debug!("Live notification suppressed: {}", notification.title);
    }
}

/// An open watch surface (window/tab equivalent) that a notification click
/// can route to.
pub trait ClientSurface {
    /// Focus an already-open surface matching the app origin. Returns
    /// false when none is open.
    fn focus_existing(&mut self) -> bool;
    /// Open a new surface at the given root-relative path.
    fn open_new(&mut self, path: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused,
    Opened,
    Ignored,
}

/// Route a notification click: the watch action and a body activation both
/// focus an open surface, falling back to opening one at the root path.
pub fn on_notification_click(
    action: Option<&str>,
    surfaces: &mut dyn ClientSurface,
) -> ClickOutcome {
    match action {
        Some(WATCH_ACTION) | None => {
            if surfaces.focus_existing() {
                ClickOutcome::Focused
            } else {
                surfaces.open_new("/");
                ClickOutcome::Opened
            }
        }
        Some(_) => ClickOutcome::Ignored,
    }
}
