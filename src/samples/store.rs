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
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::error::LoadError;
use crate::notes::decode_uri_component;

/// A place drone resources are fetched from. Resource names are URL-escaped,
/// e.g. `Tanpura C%23.wav`.
pub trait ResourceStore: fmt::Display + Send + Sync {
    /// Fetches the raw bytes of the named resource. Blocks until the resource has
    /// been read completely.
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, LoadError>;
}

/// Serves resources from a directory on disk.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> DirectoryStore {
        DirectoryStore { root: root.into() }
    }

    /// Resolves a resource name to a file inside the root. Names that would
    /// escape the root resolve to nothing.
    fn resolve(&self, resource: &str) -> Option<PathBuf> {
        let file_name = decode_uri_component(resource);
        let path = Path::new(&file_name);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }
}

impl ResourceStore for DirectoryStore {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, LoadError> {
        let path = self
            .resolve(resource)
            .ok_or_else(|| LoadError::unavailable(resource, "invalid resource name"))?;

        debug!(resource, path = ?path, "Reading resource");
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::unavailable(resource, "not found"),
            _ => LoadError::unavailable(resource, format!("{}: {}", path.display(), e)),
        })
    }
}

impl fmt::Display for DirectoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

/// Serves resources from a base URL over HTTP(S). There is no timeout and no retry.
pub struct HttpStore {
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str) -> HttpStore {
        HttpStore {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the URL the resource is requested from.
    pub fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }
}

impl ResourceStore for HttpStore {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, LoadError> {
        let url = self.url(resource);
        debug!(resource, url, "Requesting resource");

        let response = reqwest::blocking::get(&url)
            .map_err(|e| LoadError::unavailable(resource, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::unavailable(resource, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| LoadError::unavailable(resource, e))?;
        Ok(bytes.to_vec())
    }
}

impl fmt::Display for HttpStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
