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

//! Drone sample loading.
//!
//! This module provides:
//! - Resource stores that fetch the raw bytes of a named resource
//! - Decoding of those bytes into interleaved f32 audio
//! - An in-memory cache of decoded samples at the output sample rate

mod decoder;
mod error;
mod loader;
mod store;

pub use decoder::{decode, DecodedAudio};
pub use error::LoadError;
pub use loader::{LoadedSample, SampleLoader};
pub use store::{DirectoryStore, HttpStore, ResourceStore};
