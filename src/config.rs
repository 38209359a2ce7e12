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
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::samples::SampleLoader;

mod audio;
mod controller;
mod error;
mod player;
mod samples;

pub use self::audio::Audio;
pub use self::controller::Controller;
pub use self::error::ConfigError;
pub use self::player::{Player, DEFAULT_VOLUME};
pub use self::samples::Samples;

/// Initializes the player and controller from the given config file and returns the controller.
/// The controller exits once its driver runs out of input.
pub fn init_player_and_controller(
    player_path: &Path,
) -> Result<crate::controller::Controller, Box<dyn Error>> {
    let player_config = Player::deserialize(player_path)?;
    let base_dir = player_path.parent().unwrap_or_else(|| Path::new("."));

    let device = crate::audio::get_device(Some(player_config.audio().clone()))?;
    let store = player_config.samples().store(base_dir)?;
    info!(device = %device, samples = %store, "Loaded configuration.");

    let loader = SampleLoader::new(store, device.sample_rate());
    let player = Arc::new(crate::player::Player::new(
        device,
        loader,
        player_config.volume()?,
    ));
    let driver = player_config.controller().driver(player.subscribe());
    crate::controller::Controller::new(player, driver)
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_init_rejects_bad_configuration() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tanpura.yaml");

        fs::write(&path, "{audio: {device: mock}, samples: {}}")?;
        assert!(init_player_and_controller(&path).is_err());

        fs::write(
            &path,
            "{audio: {device: mock, sample_format: double}, samples: {path: .}}",
        )?;
        assert!(init_player_and_controller(&path).is_err());
        Ok(())
    }
}
