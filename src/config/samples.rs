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
use std::{path::Path, sync::Arc};

use serde::Deserialize;

use super::error::ConfigError;
use crate::samples::{DirectoryStore, HttpStore, ResourceStore};

/// Where drones are fetched from. Exactly one of `path` or `url` must be set.
#[derive(Deserialize, Clone, Debug)]
pub struct Samples {
    /// A directory of drones. Relative paths are resolved against the config file.
    path: Option<String>,

    /// A base URL drones are requested from.
    url: Option<String>,
}

impl Samples {
    /// Creates a samples configuration that reads from a directory.
    pub fn from_path(path: &str) -> Samples {
        Samples {
            path: Some(path.to_string()),
            url: None,
        }
    }

    /// Creates the resource store. Relative directories are resolved against `base_dir`.
    pub fn store(&self, base_dir: &Path) -> Result<Arc<dyn ResourceStore>, ConfigError> {
        match (&self.path, &self.url) {
            (Some(path), None) => Ok(Arc::new(DirectoryStore::new(base_dir.join(path)))),
            (None, Some(url)) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "samples url must be http or https: {}",
                        url
                    )));
                }
                Ok(Arc::new(HttpStore::new(url)))
            }
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "samples must set either path or url, not both".to_string(),
            )),
            (None, None) => Err(ConfigError::Invalid(
                "samples must set either path or url".to_string(),
            )),
        }
    }
}
