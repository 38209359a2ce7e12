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
use std::io;

use tokio::{
    sync::{mpsc::Sender, watch},
    task::JoinHandle,
};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::{notes::Note, player::Status, view};

const TOGGLE: &str = "toggle";
const TOGGLE_SHORT: &str = "p";
const VOLUME: &str = "volume";
const VOLUME_SHORT: &str = "v";
const STOP: &str = "stop";
const QUIT: &str = "quit";

/// A driver that reads commands from stdin and prints the note row to stdout.
pub struct Driver {
    status_rx: watch::Receiver<Status>,
}

impl Driver {
    pub fn new(status_rx: watch::Receiver<Status>) -> Driver {
        Driver { status_rx }
    }

    /// Shows the current status, reads one command and sends its event. Returns false
    /// once input is exhausted or the user quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        status: &Status,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        writeln!(writer, "{}", view::render(status))?;
        write!(
            writer,
            "Command (<note>, {}|{}, {}|{} <0-1>, {}, {}): ",
            TOGGLE, TOGGLE_SHORT, VOLUME, VOLUME_SHORT, STOP, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim().to_lowercase();
        let mut words = input.split_whitespace();
        let event = match (words.next(), words.next(), words.next()) {
            (Some(QUIT), None, None) => return Ok(false),
            (Some(TOGGLE | TOGGLE_SHORT), None, None) => Some(Event::TogglePlayPause),
            (Some(STOP), None, None) => Some(Event::Stop),
            (Some(VOLUME | VOLUME_SHORT), Some(volume), None) => match volume.parse::<f32>() {
                Ok(volume) => Some(Event::SetVolume(volume)),
                Err(e) => {
                    warn!(input, err = e.to_string(), "Invalid volume");
                    None
                }
            },
            (Some(note), None, None) => match note.parse::<Note>() {
                Ok(note) => Some(Event::SelectNote(note)),
                Err(_) => {
                    warn!(input, "Unrecognized input");
                    None
                }
            },
            (None, _, _) => None,
            _ => {
                warn!(input, "Unrecognized input");
                None
            }
        };

        if let Some(event) = event {
            events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(true)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let status_rx = self.status_rx.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            loop {
                let status = status_rx.borrow().clone();
                if !Self::monitor_io(&events_tx, &status, io::stdin().lock(), io::stdout())? {
                    info!("Keyboard driver finished.");
                    return Ok(());
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use crate::{
        audio::OutputState,
        controller::Event,
        notes::Note,
        player::{Indicator, Status},
    };

    use super::Driver;

    fn status() -> Status {
        Status {
            active: Some(Note::A),
            playing: Some(Note::A),
            indicator: Indicator::Playing,
            play_pause_enabled: true,
            output: OutputState::Running,
            volume: 0.75,
        }
    }

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let mut writer: Vec<u8> = Vec::new();
        let more = Driver::monitor_io(&sender, &status(), reader, &mut writer)?;
        assert!(String::from_utf8_lossy(&writer).contains("[*A*]"));

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(
            (true, Some(Event::SelectNote(Note::CSharp))),
            get_event("c#\n")?
        );
        assert_eq!((true, Some(Event::SelectNote(Note::B))), get_event("B")?);
        assert_eq!((true, Some(Event::TogglePlayPause)), get_event("toggle")?);
        assert_eq!((true, Some(Event::TogglePlayPause)), get_event("p")?);
        assert_eq!((true, Some(Event::SetVolume(0.4))), get_event("volume 0.4")?);
        assert_eq!((true, Some(Event::SetVolume(1.0))), get_event("v 1")?);
        assert_eq!((true, Some(Event::Stop)), get_event("STOP")?);
        assert_eq!((true, None), get_event("unrecognized")?);
        assert_eq!((true, None), get_event("volume loud")?);
        assert_eq!((true, None), get_event("\n")?);
        assert_eq!((false, None), get_event("quit")?);
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }
}
