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
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::notes::Note;
use crate::player::Player;

pub mod keyboard;

/// Controller events that will trigger behavior in the player.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Selects a note and starts looping its drone, replacing the current one.
    SelectNote(Note),

    /// Suspends or resumes the output. Does nothing until a drone has played.
    TogglePlayPause,

    /// Ramps the output level to the given volume, from 0.0 to 1.0.
    SetVolume(f32),

    /// Stops the current drone and clears the selection.
    Stop,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Routes driver events to the player.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(player: Arc<Player>, driver: Arc<dyn Driver>) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(player, driver).await }),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers player events by watching the driver and getting events from it.
    async fn trigger_events(player: Arc<Player>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(parent: &span, "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(parent: &span, event = format!("{:?}", event), "Received event.");

            let result = match event {
                // Loads run on their own so a slow fetch never holds up later events.
                Event::SelectNote(note) => {
                    let player = player.clone();
                    tokio::spawn(
                        async move {
                            if let Err(e) = player.select_note(note).await {
                                error!(note = note.name(), "Error selecting note: {}", e);
                            }
                        }
                        .instrument(span.clone()),
                    );
                    Ok(())
                }
                Event::TogglePlayPause => player.toggle_play_pause(),
                Event::SetVolume(volume) => player.set_volume(volume),
                Event::Stop => {
                    player.stop();
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!(parent: &span, "Error talking to player: {}", e);
            }
        }

        info!(parent: &span, "Controller closing.");
        if let Err(e) = join_handle.await {
            error!(parent: &span, "Error waiting for event monitor to stop: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        io,
        sync::{Arc, Barrier, Mutex},
    };

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        audio::{self, Device as _, OutputState},
        notes::Note,
        player::{Indicator, Player},
        samples::{DirectoryStore, SampleLoader},
        testutil::{eventually, write_drone},
    };

    use super::{Driver, Event};

    #[derive(Debug)]
    enum TestEvent {
        Unset,
        Send(Event),
        Close,
    }

    struct TestDriver {
        current_event: Arc<Mutex<TestEvent>>,
        barrier: Arc<Barrier>,
    }

    impl TestDriver {
        /// Creates a new test driver which is explicitly controlled by the next_event function.
        fn new(current_event: TestEvent) -> TestDriver {
            let current_event = Arc::new(Mutex::new(current_event));
            let barrier = Arc::new(Barrier::new(2));
            TestDriver {
                current_event,
                barrier,
            }
        }

        /// Signals the next event to the monitor thread.
        fn next_event(&self, event: TestEvent) {
            {
                let mut current_event = self.current_event.lock().expect("failed to get lock");
                *current_event = event;
            }
            // Wait until the thread goes to receive the event.
            self.barrier.wait();
            // Wait until the thread has locked the mutex.
            self.barrier.wait();
        }
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let barrier = self.barrier.clone();
            let current_event = self.current_event.clone();
            tokio::task::spawn_blocking(move || loop {
                // Wait for next event to set the current event.
                barrier.wait();
                let current_event = current_event.lock().expect("failed to get lock");
                // Let next event know that we got the event.
                barrier.wait();
                match &*current_event {
                    TestEvent::Unset => panic!("current event should not be unset"),
                    TestEvent::Send(event) => {
                        assert!(events_tx.blocking_send(event.clone()).is_ok())
                    }
                    TestEvent::Close => return Ok(()),
                }
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_drone(dir.path(), Note::CSharp, 44100, 2, 0.05)?;

        let driver = Arc::new(TestDriver::new(TestEvent::Unset));
        let device = Arc::new(audio::mock::Device::get("mock-device"));
        let loader = SampleLoader::new(
            Arc::new(DirectoryStore::new(dir.path())),
            device.sample_rate(),
        );
        let player = Arc::new(Player::new(device.clone(), loader, 1.0));
        let mut controller = super::Controller::new(player.clone(), driver.clone())?;

        println!("Select C#");
        driver.next_event(TestEvent::Send(Event::SelectNote(Note::CSharp)));
        eventually(
            || player.status().playing == Some(Note::CSharp),
            "C# never started playing",
        );
        assert_eq!(OutputState::Running, device.state());

        println!("Volume 0.5");
        driver.next_event(TestEvent::Send(Event::SetVolume(0.5)));
        eventually(|| player.status().volume == 0.5, "Volume never changed");

        println!("Pause");
        driver.next_event(TestEvent::Send(Event::TogglePlayPause));
        eventually(
            || player.status().indicator == Indicator::Paused,
            "Output never paused",
        );
        assert_eq!(OutputState::Suspended, device.state());

        println!("Invalid volume");
        driver.next_event(TestEvent::Send(Event::SetVolume(f32::NAN)));

        println!("Select a missing note");
        driver.next_event(TestEvent::Send(Event::SelectNote(Note::D)));
        eventually(
            || player.status().active.is_none(),
            "D never reverted its selection",
        );
        assert!(device.active_sources().is_empty());

        println!("Select C# and stop");
        driver.next_event(TestEvent::Send(Event::SelectNote(Note::CSharp)));
        eventually(
            || player.status().playing == Some(Note::CSharp),
            "C# never started playing",
        );
        driver.next_event(TestEvent::Send(Event::Stop));
        eventually(
            || player.status().playing.is_none(),
            "C# never stopped playing",
        );
        assert_eq!(0.5, player.status().volume);

        println!("Close");
        driver.next_event(TestEvent::Close);
        assert!(
            controller.join().await.is_ok(),
            "Error waiting for controller",
        );

        Ok(())
    }
}
