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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use super::{audio::Audio, controller::Controller, error::ConfigError, samples::Samples};

/// Volume used when the configuration doesn't set one.
pub const DEFAULT_VOLUME: f32 = 0.75;

/// The configuration for the drone player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The audio output.
    audio: Audio,
    /// Where drones are fetched from.
    samples: Samples,
    /// The initial output level, from 0.0 to 1.0.
    volume: Option<f32>,
    /// The controller configuration.
    controller: Option<Controller>,
}

impl Player {
    /// Creates a new player configuration.
    pub fn new(audio: Audio, samples: Samples) -> Player {
        Player {
            audio,
            samples,
            volume: None,
            controller: None,
        }
    }

    /// Parse a player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the samples configuration.
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Returns the initial volume.
    pub fn volume(&self) -> Result<f32, ConfigError> {
        match self.volume {
            Some(volume) if (0.0..=1.0).contains(&volume) => Ok(volume),
            Some(volume) => Err(ConfigError::Invalid(format!(
                "volume must be between 0 and 1, got {}",
                volume
            ))),
            None => Ok(DEFAULT_VOLUME),
        }
    }

    /// Returns the controller configuration. Defaults to the keyboard.
    pub fn controller(&self) -> Controller {
        self.controller.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use super::*;

    #[test]
    fn test_deserialize() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tanpura.yaml");
        fs::write(
            &path,
            r#"
audio:
  device: mock-device
  sample_rate: 48000
samples:
  path: drones
volume: 0.5
controller:
  kind: keyboard
"#,
        )?;

        let player = Player::deserialize(&path)?;
        assert_eq!("mock-device", player.audio().device());
        assert_eq!(48000, player.audio().sample_rate());
        assert_eq!(0.5, player.volume()?);
        assert_eq!(Controller::Keyboard, player.controller());
        Ok(())
    }

    #[test]
    fn test_defaults_and_invalid_values() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tanpura.yaml");
        fs::write(&path, "{audio: {device: mock}, samples: {path: .}}")?;
        let player = Player::deserialize(&path)?;
        assert_eq!(DEFAULT_VOLUME, player.volume()?);
        assert_eq!(Controller::Keyboard, player.controller());

        fs::write(&path, "{audio: {device: mock}, samples: {path: .}, volume: 1.5}")?;
        assert!(matches!(
            Player::deserialize(&path)?.volume(),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, "{samples: {path: .}}")?;
        assert!(matches!(
            Player::deserialize(&path),
            Err(ConfigError::Load(_))
        ));

        assert!(Player::deserialize(&dir.path().join("missing.yaml")).is_err());
        Ok(())
    }
}
