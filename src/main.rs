// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use tanpura::config::{self, init_player_and_controller};
use tanpura::controller::{keyboard, Controller};
use tanpura::notes::{Note, CATALOG};
use tanpura::player::Player;
use tanpura::samples::{DirectoryStore, SampleLoader};
use tanpura::{audio, view};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A looping tanpura drone player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the notes and the drone resource each one plays.
    Notes {},
    /// Loads and decodes the drone for every note in the given directory.
    Verify {
        /// The directory holding the drones.
        path: String,
    },
    /// Plays drones from a directory, controlled from the keyboard.
    Play {
        /// The device name to play through.
        device_name: String,
        /// The directory holding the drones.
        samples_path: String,
        /// The note to start with.
        #[arg[short, long]]
        note: Option<String>,
        /// The initial volume, from 0 to 1.
        #[arg[short, long]]
        volume: Option<f32>,
    },
    /// Start will start the drone player from a config file.
    Start {
        /// The path to the player config.
        player_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Notes {} => {
            println!("Notes:");
            for note in CATALOG {
                println!("- {:<2} {}", note, note.resource_name());
            }
        }
        Commands::Verify { path } => {
            let loader = SampleLoader::new(Arc::new(DirectoryStore::new(&path)), 44100);

            let mut failures = 0;
            println!("Drones in {}:", path);
            for (note, result) in loader.verify().await? {
                match result {
                    Ok(sample) => println!(
                        "- {:<2} ok ({} channels, {:.2}s)",
                        note,
                        sample.channel_count(),
                        sample.duration().as_secs_f64()
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("- {:<2} FAILED: {}", note, e);
                    }
                }
            }

            if failures > 0 {
                return Err(format!("{} of {} drones failed to load", failures, CATALOG.len()).into());
            }
            println!(
                "All drones loaded ({} bytes in memory).",
                loader.total_memory_usage()
            );
        }
        Commands::Play {
            device_name,
            samples_path,
            note,
            volume,
        } => {
            let note = note.map(|note| note.parse::<Note>()).transpose()?;
            let volume = volume.unwrap_or(config::DEFAULT_VOLUME);
            if !(0.0..=1.0).contains(&volume) {
                return Err(format!("volume must be between 0 and 1, got {}", volume).into());
            }

            let device = audio::get_device(Some(config::Audio::new(&device_name)))?;
            let store = config::Samples::from_path(&samples_path).store(Path::new("."))?;
            let loader = SampleLoader::new(store, device.sample_rate());
            let player = Arc::new(Player::new(device, loader, volume));

            if let Some(note) = note {
                if let Err(e) = player.select_note(note).await {
                    error!(note = note.name(), "Unable to play drone: {}", e);
                }
            }

            let driver = Arc::new(keyboard::Driver::new(player.subscribe()));
            let mut controller = Controller::new(player.clone(), driver)?;
            controller.join().await?;
            println!("{}", view::render(&player.status()));
        }
        Commands::Start { player_path } => {
            let mut controller = init_player_and_controller(&PathBuf::from(player_path))?;
            controller.join().await?;
        }
    };

    Ok(())
}
