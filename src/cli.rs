//! CLI entry point.

use std::path::PathBuf;

use clap::Parser;
use console::style;

use crate::config::SessionConfig;
use crate::handoff::NoopProcessor;
use crate::pipeline;

#[derive(Parser)]
#[command(name = "vidgrab")]
#[command(about = "Scrape a video from a social-media page and download it")]
#[command(version)]
pub struct Cli {
    /// Page URL to scrape (must start with http:// or https://)
    pub url: String,

    /// Directory the downloaded video is written into
    #[arg(long, env = "VIDGRAB_OUTPUT_DIR", default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Seconds to wait for a video element to appear
    #[arg(long, env = "VIDGRAB_TIMEOUT", default_value = "20")]
    pub timeout: u64,

    /// Run with a visible browser window (for debugging)
    #[arg(long)]
    pub headful: bool,

    /// Chrome/Chromium binary to launch
    #[arg(long, env = "VIDGRAB_CHROME")]
    pub chrome: Option<PathBuf>,

    /// Proxy server URL (e.g. "socks5://127.0.0.1:1080")
    #[arg(long, env = "VIDGRAB_PROXY")]
    pub proxy: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            headless: !self.headful,
            chrome_binary: self.chrome.clone(),
            proxy: self.proxy.clone(),
            timeout_secs: self.timeout,
            ..SessionConfig::default()
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Reject malformed input before touching the browser or the network.
    if let Err(err) = pipeline::validate_url(&cli.url) {
        eprintln!("{} {err}", style("error:").red().bold());
        eprintln!("usage: vidgrab <URL>, e.g. vidgrab https://social.example/post/123");
        std::process::exit(2);
    }

    let config = cli.session_config();
    match pipeline::run(&config, &cli.url, &cli.output_dir, &NoopProcessor).await {
        Ok(path) => {
            println!("{} {}", style("saved").green().bold(), path.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("{} {err}", style("error:").red().bold());
            std::process::exit(1);
        }
    }
}
