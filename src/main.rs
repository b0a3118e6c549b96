// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! chronoshift — a minimal demonstration host around the recorder/
//! playback core.
//!
//! Usage:
//!   chronoshift record  --dir ./run --steps 120
//!   chronoshift play    --dir ./run --from-step 2
//!   chronoshift recover --dir ./run

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chronoshift::blob::FileBlobStore;
use chronoshift::config::RecorderConfig;
use chronoshift::core::Core;
use chronoshift::playback::PlaybackEngine;
use chronoshift::region::{LiveRegions, RegionRegistry};
use chronoshift::recovery;

#[derive(Parser)]
#[command(name = "chronoshift", about = "Deterministic state recorder/player demo host", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a toy region set, step it deterministically, and finalize a recording.
    Record {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value_t = 10)]
        steps: u32,
    },
    /// Open a finalized recording and jump to the given keyframe.
    Play {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        from_step: usize,
    },
    /// Splice an unfinalized recording left behind by a previous run.
    Recover {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

/// A region layout standing in for "the game state" a real host would own:
/// a 4-byte counter and a 16-byte ring buffer.
fn toy_registry() -> RegionRegistry {
    let mut reg = RegionRegistry::new();
    reg.register("counter", 4).expect("toy registration fits well under MAX_REGIONS");
    reg.register("buffer", 16).expect("toy registration fits well under MAX_REGIONS");
    reg
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Record { dir, steps } => run_record(dir, steps),
        Command::Play { dir, from_step } => run_play(dir, from_step),
        Command::Recover { dir } => run_recover(dir),
    }
}

fn run_record(dir: PathBuf, steps: u32) {
    let store = match FileBlobStore::new(&dir) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open blob store");
            std::process::exit(1);
        }
    };

    let mut core = Core::new(store, RecorderConfig::default());
    if let Err(e) = core.init_regions(|r| {
        r.register("counter", 4)?;
        r.register("buffer", 16)
    }) {
        error!(error = %e, "failed to register regions");
        std::process::exit(1);
    }

    let mut counter = [0u8; 4];
    let mut buffer = [0u8; 16];

    {
        let set = core.regions().expect("just initialized").clone();
        let live = LiveRegions::new(&set, vec![&mut counter, &mut buffer]).unwrap();
        if let Err(e) = core.start_recording(&live) {
            error!(error = %e, "failed to start recording");
            std::process::exit(1);
        }
    }

    for step in 1..=steps {
        let c = u32::from_le_bytes(counter).wrapping_add(1);
        counter = c.to_le_bytes();
        buffer.rotate_left(1);
        *buffer.last_mut().unwrap() = step as u8;

        let set = core.regions().expect("initialized above").clone();
        let mut live = LiveRegions::new(&set, vec![&mut counter, &mut buffer]).unwrap();
        if let Err(e) = core.step(&mut live, false) {
            error!(error = %e, "step failed");
            std::process::exit(1);
        }
    }

    let set = core.regions().expect("initialized above").clone();
    let live = LiveRegions::new(&set, vec![&mut counter, &mut buffer]).unwrap();
    if let Err(e) = core.quit(&live) {
        error!(error = %e, "failed to finalize recording");
        std::process::exit(1);
    }

    info!(steps, dir = %dir.display(), "recording finalized");
}

fn run_play(dir: PathBuf, from_step: usize) {
    let mut store = match FileBlobStore::new(&dir) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open blob store");
            std::process::exit(1);
        }
    };

    let set = toy_registry().seal();
    let mut counter = [0u8; 4];
    let mut buffer = [0u8; 16];
    let mut live = LiveRegions::new(&set, vec![&mut counter, &mut buffer]).unwrap();

    let mut engine = match PlaybackEngine::open(&mut store, &set, &mut live, "recording.bin") {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "failed to open recording for playback");
            std::process::exit(1);
        }
    };

    if from_step > 0 {
        if let Err(e) = engine.jump_to_full_snapshot(&mut store, &mut live, from_step) {
            error!(error = %e, "failed to jump to keyframe");
            std::process::exit(1);
        }
    }

    println!("keyframe  : {}", engine.full_snapshot_last_played());
    println!("counter   : {}", u32::from_le_bytes(counter));
    println!("buffer    : {:02x?}", buffer);
}

fn run_recover(dir: PathBuf) {
    let mut store = match FileBlobStore::new(&dir) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open blob store");
            std::process::exit(1);
        }
    };

    let names = RecorderConfig::default().blob_names;
    if !recovery::needs_recovery(&store, &names.recording, &names.recording_index) {
        println!("nothing to recover");
        return;
    }

    match recovery::recover(&mut store, &names.recording, &names.recording_index) {
        Ok(artifact) => println!("recovered into {artifact}"),
        Err(e) => {
            error!(error = %e, "recovery failed");
            std::process::exit(1);
        }
    }
}
