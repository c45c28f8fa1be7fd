use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone)]
pub struct Config {
    /// Base url of the relay, e.g. `https://relay.example.com`
    pub relay_url: String,
    pub cache: String,
    pub volume: f64,
    pub muted: bool,
    pub live_notify: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_player_command")]
    pub player_command: String,
    #[serde(default = "default_bumper")]
    pub bumper: String,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_player_command() -> String {
    "mpv".to_string()
}

fn default_bumper() -> String {
    "bumper.mp4".to_string()
}

impl Config {
    pub fn load() -> Self {
        let app_dirs = AppDirs::new(Some("ralphtv-watch"), false).unwrap();
        let config_path = app_dirs.config_dir.join("Conf.toml");
        if let Ok(content) = std::fs::read_to_string(config_path) {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
        let config = Config {
            relay_url: "".to_string(),
            cache: app_dirs
                .cache_dir
                .join("cache")
                .to_str()
                .unwrap()
                .to_string(),
            volume: 0.7,
            muted: false,
            live_notify: true,
            poll_interval: default_poll_interval(),
            player_command: default_player_command(),
            bumper: default_bumper(),
        };
        config.save();
        config
    }

    pub fn save(&self) {
        let content = toml::to_string(&self).unwrap();
        let app_dirs = AppDirs::new(Some("ralphtv-watch"), false).unwrap();
        // Create app dirs if not exists
        std::fs::create_dir_all(&app_dirs.config_dir).unwrap();
        let config_path = app_dirs.config_dir.join("Conf.toml");
        std::fs::write(config_path, content).unwrap();
    }

    pub fn set_relay_url(&mut self, url: &str) {
        self.relay_url = url.trim_end_matches('/').to_string();
        self.save();
    }

    pub fn stream_url(&self) -> String {
        format!("{}/hls/stream.m3u8", self.relay_url.trim_end_matches('/'))
    }

    pub fn status_url(&self) -> String {
        format!("{}/api/status", self.relay_url.trim_end_matches('/'))
    }
}
