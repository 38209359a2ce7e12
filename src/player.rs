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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::{
    audio::{self, AudioError, OutputState, SourceError, SourceHandle},
    notes::Note,
    samples::{LoadError, SampleLoader},
};

/// The play/pause indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Playing,
    Paused,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Playing => write!(f, "playing"),
            Indicator::Paused => write!(f, "paused"),
        }
    }
}

/// A snapshot of everything the view shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// The note whose button is marked active.
    pub active: Option<Note>,
    /// The note whose drone is currently looping.
    pub playing: Option<Note>,
    pub indicator: Indicator,
    /// Play/pause stays disabled until a drone has played.
    pub play_pause_enabled: bool,
    pub output: OutputState,
    pub volume: f32,
}

/// Errors returned from player operations. They're logged by the controller and
/// never shown to the user beyond that.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("invalid volume: {0}")]
    InvalidVolume(f32),
}

/// The drone currently looping.
struct Playing {
    note: Note,
    handle: SourceHandle,
}

struct State {
    active: Option<Note>,
    playing: Option<Playing>,
    indicator: Indicator,
    play_pause_enabled: bool,
    volume: f32,
}

/// Plays one looping drone at a time through the device's shared gain.
pub struct Player {
    device: Arc<dyn audio::Device>,
    loader: SampleLoader,
    state: Mutex<State>,
    /// Incremented for every note selection. Loads that finish under an older token
    /// are discarded, so the latest selection always wins.
    token: AtomicU64,
    /// Set by the first user interaction. Never cleared.
    unlocked: AtomicBool,
    status_tx: watch::Sender<Status>,
    span: Span,
}

impl Player {
    /// Creates a new player. The output level starts at the given volume without ramping.
    pub fn new(device: Arc<dyn audio::Device>, loader: SampleLoader, volume: f32) -> Player {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        device.gain().reset(volume);

        let state = State {
            active: None,
            playing: None,
            indicator: Indicator::Paused,
            play_pause_enabled: false,
            volume,
        };
        let (status_tx, _) = watch::channel(Player::snapshot(&state, device.state()));

        Player {
            device,
            loader,
            state: Mutex::new(state),
            token: AtomicU64::new(0),
            unlocked: AtomicBool::new(false),
            status_tx,
            span: span!(Level::INFO, "player"),
        }
    }

    /// Selects a note: marks it active, stops the current drone and starts looping the
    /// note's drone. If the drone can't be loaded the note is unselected again.
    pub async fn select_note(&self, note: Note) -> Result<(), PlayerError> {
        let token = self.token.fetch_add(1, Ordering::AcqRel) + 1;
        let resource = note.resource_name();
        {
            let _enter = self.span.enter();
            info!(note = note.name(), resource, token, "Selecting note.");

            self.unlock();
            let mut state = self.state.lock();
            state.active = Some(note);
            Player::stop_source(&mut state);
            self.publish(&state);
        }

        if self.device.state() == OutputState::Suspended {
            if let Err(e) = self.device.resume() {
                return Err(self.fail_load(token, note, e.into()));
            }
        }

        let loaded = self.loader.load(&resource).await;

        let _enter = self.span.enter();
        let sample = match loaded {
            Ok(sample) => sample,
            Err(e) => return Err(self.fail_load(token, note, e.into())),
        };

        let mut state = self.state.lock();
        if self.token.load(Ordering::Acquire) != token {
            debug!(note = note.name(), token, "Discarding superseded load.");
            return Ok(());
        }
        let handle = match self.device.start_source(sample) {
            Ok(handle) => handle,
            Err(e) => {
                drop(state);
                return Err(self.fail_load(token, note, e.into()));
            }
        };

        state.playing = Some(Playing { note, handle });
        state.indicator = Indicator::Playing;
        state.play_pause_enabled = true;
        self.publish(&state);
        info!(note = note.name(), token, "Playing drone.");
        Ok(())
    }

    /// Reverts a failed selection if it's still the latest one.
    fn fail_load(&self, token: u64, note: Note, err: PlayerError) -> PlayerError {
        error!(note = note.name(), token, err = %err, "Unable to play drone.");

        let mut state = self.state.lock();
        if self.token.load(Ordering::Acquire) == token {
            state.active = None;
            state.indicator = Indicator::Paused;
            Player::stop_source(&mut state);
            // Keep the output in line with the paused indicator.
            if self.device.state() == OutputState::Running {
                if let Err(e) = self.device.suspend() {
                    warn!(err = %e, "Unable to suspend output after a failed load.");
                }
            }
            self.publish(&state);
        }
        err
    }

    /// Suspends a running output or resumes a suspended one. Ignored until a drone
    /// has played, and when the output is closed.
    pub fn toggle_play_pause(&self) -> Result<(), PlayerError> {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        if !state.play_pause_enabled {
            debug!("Play/pause is disabled.");
            return Ok(());
        }

        let prior = self.device.state();
        self.unlock();
        match prior {
            OutputState::Running => {
                self.device.suspend()?;
                state.indicator = Indicator::Paused;
            }
            OutputState::Suspended => {
                self.device.resume()?;
                state.indicator = Indicator::Playing;
            }
            OutputState::Closed => {
                warn!("Output is closed, ignoring play/pause.");
                return Ok(());
            }
        }
        info!(indicator = %state.indicator, "Toggled output.");
        self.publish(&state);
        Ok(())
    }

    /// Stops the current drone and clears the selection. Loads still in flight are discarded.
    pub fn stop(&self) {
        let _enter = self.span.enter();

        self.token.fetch_add(1, Ordering::AcqRel);
        let mut state = self.state.lock();
        Player::stop_source(&mut state);
        state.active = None;
        state.indicator = Indicator::Paused;
        state.play_pause_enabled = false;
        self.publish(&state);
        info!("Stopped.");
    }

    /// Ramps the output level towards the given volume.
    pub fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        if !volume.is_finite() {
            return Err(PlayerError::InvalidVolume(volume));
        }
        let volume = volume.clamp(0.0, 1.0);

        let mut state = self.state.lock();
        self.device.gain().set_target(volume);
        state.volume = volume;
        self.publish(&state);
        debug!(parent: &self.span, volume, "Volume changed.");
        Ok(())
    }

    /// Returns the latest status.
    pub fn status(&self) -> Status {
        self.status_tx.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status_tx.subscribe()
    }

    /// Returns the device the player plays through.
    pub fn device(&self) -> Arc<dyn audio::Device> {
        self.device.clone()
    }

    /// Resumes the output on the first user interaction.
    fn unlock(&self) {
        if self.unlocked.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.device.state() == OutputState::Suspended {
            if let Err(e) = self.device.resume() {
                warn!(err = %e, "Unable to unlock output.");
            }
        }
    }

    /// Stops the looping drone, if any. A source that already stopped is fine.
    fn stop_source(state: &mut State) {
        if let Some(playing) = state.playing.take() {
            match playing.handle.stop() {
                Ok(()) => debug!(note = playing.note.name(), "Stopped drone."),
                Err(SourceError::AlreadyStopped(id)) => {
                    debug!(source = id, "Drone was already stopped.")
                }
            }
        }
    }

    fn publish(&self, state: &State) {
        self.status_tx
            .send_replace(Player::snapshot(state, self.device.state()));
    }

    fn snapshot(state: &State, output: OutputState) -> Status {
        Status {
            active: state.active,
            playing: state.playing.as_ref().map(|playing| playing.note),
            indicator: state.indicator,
            play_pause_enabled: state.play_pause_enabled,
            output,
            volume: state.volume,
        }
    }
}
