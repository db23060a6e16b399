//! Browser session configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// User agent presented both by the browser session and by direct HTTP
/// fetches, so the two paths look like the same client to the origin.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fixed viewport for every session.
pub const WINDOW_WIDTH: u32 = 1920;
pub const WINDOW_HEIGHT: u32 = 1080;

/// Configuration for one browser session.
///
/// The browser binary is an explicit field here rather than process-global
/// state: everything the launch depends on travels with the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Run in headless mode (default: true).
    /// Set to false for debugging.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome/Chromium binary to launch. When unset, well-known install
    /// locations and $PATH are probed.
    #[serde(default)]
    pub chrome_binary: Option<PathBuf>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// How long to wait for a video element to become visible, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent string presented to the target page.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_binary: None,
            proxy: None,
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            extra_args: Vec::new(),
        }
    }
}
