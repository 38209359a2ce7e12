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
//! Text rendering of the note row and the play/pause indicator.

use std::fmt;

use crate::{
    notes::{Note, CATALOG},
    player::{Indicator, Status},
};

/// A note button. Only the active button is highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub note: Note,
    pub active: bool,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active {
            write!(f, "[*{}*]", self.note)
        } else {
            write!(f, "[ {} ]", self.note)
        }
    }
}

/// Creates one button per note in catalog order.
pub fn create_buttons(status: &Status) -> Vec<Button> {
    CATALOG
        .iter()
        .map(|note| Button {
            note: *note,
            active: status.active == Some(*note),
        })
        .collect()
}

/// Renders the button row followed by the play/pause control and the volume.
pub fn render(status: &Status) -> String {
    let row = create_buttons(status)
        .iter()
        .map(|button| button.to_string())
        .collect::<Vec<String>>()
        .join(" ");

    let control = match (status.play_pause_enabled, status.indicator) {
        (false, _) => "(play/pause disabled)".to_string(),
        (true, Indicator::Playing) => "|| playing".to_string(),
        (true, Indicator::Paused) => "> paused".to_string(),
    };

    format!(
        "{}\n{}  volume {:.0}%",
        row,
        control,
        status.volume * 100.0
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::OutputState;

    fn status(active: Option<Note>, enabled: bool, indicator: Indicator) -> Status {
        Status {
            active,
            playing: active,
            indicator,
            play_pause_enabled: enabled,
            output: OutputState::Running,
            volume: 0.5,
        }
    }

    #[test]
    fn test_create_buttons() {
        let buttons = create_buttons(&status(Some(Note::DSharp), true, Indicator::Playing));
        assert_eq!(12, buttons.len());
        assert_eq!(
            vec![Note::DSharp],
            buttons
                .iter()
                .filter(|button| button.active)
                .map(|button| button.note)
                .collect::<Vec<Note>>()
        );
        assert_eq!(Note::C, buttons[0].note);
        assert_eq!(Note::B, buttons[11].note);

        let buttons = create_buttons(&status(None, false, Indicator::Paused));
        assert!(buttons.iter().all(|button| !button.active));
    }

    #[test]
    fn test_render() {
        let rendered = render(&status(Some(Note::CSharp), true, Indicator::Playing));
        assert!(rendered.starts_with("[ C ] [*C#*] [ D ]"));
        assert!(rendered.ends_with("|| playing  volume 50%"));

        let rendered = render(&status(Some(Note::CSharp), true, Indicator::Paused));
        assert!(rendered.contains("> paused"));

        let rendered = render(&status(None, false, Indicator::Paused));
        assert!(!rendered.contains('*'));
        assert!(rendered.contains("(play/pause disabled)"));
    }
}
