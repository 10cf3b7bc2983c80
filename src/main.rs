use anyhow::Result;
use clap::Parser;
use growlab_core::config::GameConfig;
use growlab_core::metrics::init_logging;
use growlab_lib::app::{run_daemon, run_headless, DaemonOptions, HeadlessOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mode to run the world in
    #[arg(short, long, value_enum, default_value = "headless")]
    mode: Mode,

    /// Custom config file path
    #[arg(short, long, default_value = "growlab.toml")]
    config: PathBuf,

    /// Simulated hours for headless runs
    #[arg(long, default_value_t = 24 * 14)]
    hours: u32,

    /// Scripted players for headless runs
    #[arg(long, default_value_t = 3)]
    players: usize,

    /// Overrides `world.seed`
    #[arg(long)]
    seed: Option<u64>,

    /// World snapshot used by the daemon
    #[arg(long, default_value = "growlab.snapshot.gz")]
    snapshot: PathBuf,

    /// Seconds between weather cycles, overriding the config
    #[arg(long)]
    interval: Option<u64>,

    /// Exit the daemon without saving
    #[arg(long)]
    no_save: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum Mode {
    Headless,
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = GameConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.world.seed = Some(seed);
    }
    init_logging(&config.logging.level);

    match args.mode {
        Mode::Headless => {
            let options = HeadlessOptions {
                hours: args.hours,
                players: args.players,
                ..Default::default()
            };
            let report =
                tokio::task::spawn_blocking(move || run_headless(config, &options)).await??;
            println!("{}", growlab_io::to_json_pretty(&report)?);
        }
        Mode::Daemon => {
            let options = DaemonOptions {
                snapshot_path: args.snapshot,
                cycle_interval: args.interval.map(Duration::from_secs),
                save_on_exit: !args.no_save,
            };
            let ticks = run_daemon(config, options).await?;
            println!("Daemon exited clean after {ticks} weather cycles.");
        }
    }

    Ok(())
}
