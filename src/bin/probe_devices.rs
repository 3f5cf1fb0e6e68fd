//! probe_devices - List camera indices that deliver frames.
//!
//! Probes `0..max_probe` under the configured device root, one index at a
//! time. The result is a snapshot; devices may come and go afterwards.

use anyhow::Result;
use clap::Parser;

use detection_player::{probe_devices, PlayerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "List available camera devices")]
struct Args {
    /// Device path prefix, e.g. /dev/video or stub://camera?count=2.
    #[arg(long)]
    root: Option<String>,

    /// Number of indices to try.
    #[arg(long)]
    max_probe: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PlayerConfig::load()?;
    if let Some(root) = args.root {
        config.devices.root = root;
    }
    if let Some(max_probe) = args.max_probe {
        config.devices.max_probe = max_probe;
    }

    let found = probe_devices(&config.devices);
    if found.is_empty() {
        println!("no cameras found under {}", config.devices.root);
    }
    for device in found {
        println!("{}", device);
    }
    Ok(())
}
