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
/// Errors raised while fetching or decoding a drone resource. Either way the
/// resource cannot be played.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("resource '{resource}' is unavailable: {reason}")]
    Unavailable { resource: String, reason: String },

    #[error("resource '{resource}' could not be decoded: {reason}")]
    Undecodable { resource: String, reason: String },

    #[error("load task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LoadError {
    pub(crate) fn unavailable(resource: &str, reason: impl ToString) -> LoadError {
        LoadError::Unavailable {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn undecodable(resource: &str, reason: impl ToString) -> LoadError {
        LoadError::Undecodable {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }
}
