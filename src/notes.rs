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
use std::{error::Error, fmt, str::FromStr};

/// The prefix every drone resource name starts with.
const RESOURCE_PREFIX: &str = "Tanpura";

/// The extension of every drone resource.
const RESOURCE_EXTENSION: &str = "wav";

/// A note of the chromatic scale. Each note has exactly one drone resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Note {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

/// The note catalog, in the order the buttons are shown.
pub const CATALOG: [Note; 12] = [
    Note::C,
    Note::CSharp,
    Note::D,
    Note::DSharp,
    Note::E,
    Note::F,
    Note::FSharp,
    Note::G,
    Note::GSharp,
    Note::A,
    Note::ASharp,
    Note::B,
];

impl Note {
    /// Returns the label of the note, e.g. "C#".
    pub fn name(self) -> &'static str {
        match self {
            Note::C => "C",
            Note::CSharp => "C#",
            Note::D => "D",
            Note::DSharp => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::FSharp => "F#",
            Note::G => "G",
            Note::GSharp => "G#",
            Note::A => "A",
            Note::ASharp => "A#",
            Note::B => "B",
        }
    }

    /// Returns the escaped resource name for this note's drone, e.g. `Tanpura C%23.wav`.
    /// This is the name requested from a resource store.
    pub fn resource_name(self) -> String {
        format!(
            "{} {}.{}",
            RESOURCE_PREFIX,
            encode_uri_component(self.name()),
            RESOURCE_EXTENSION
        )
    }

    /// Returns the unescaped file name of this note's drone, e.g. `Tanpura C#.wav`.
    pub fn file_name(self) -> String {
        format!("{} {}.{}", RESOURCE_PREFIX, self.name(), RESOURCE_EXTENSION)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Note {
    type Err = Box<dyn Error>;

    /// Parses a note label. Matching is case-insensitive, so "c#" and "C#" are the same note.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        CATALOG
            .iter()
            .find(|note| note.name().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| format!("unknown note: {}", s).into())
    }
}

/// Escapes a string for use as a single URL path component. Everything except the
/// characters `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is percent-encoded as UTF-8 bytes.
pub fn encode_uri_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Reverses percent-encoding. Malformed escapes are kept verbatim.
pub fn decode_uri_component(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = hex {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_is_chromatic() {
        let names: Vec<&str> = CATALOG.iter().map(|note| note.name()).collect();
        assert_eq!(
            vec!["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"],
            names
        );
        let unique: HashSet<Note> = CATALOG.iter().copied().collect();
        assert_eq!(12, unique.len());
    }

    #[test]
    fn test_resource_names() {
        assert_eq!("Tanpura C.wav", Note::C.resource_name());
        assert_eq!("Tanpura C%23.wav", Note::CSharp.resource_name());
        assert_eq!("Tanpura A%23.wav", Note::ASharp.resource_name());
        assert_eq!("Tanpura C#.wav", Note::CSharp.file_name());
    }

    #[test]
    fn test_parse_notes() -> Result<(), Box<dyn Error>> {
        for note in CATALOG {
            assert_eq!(note, note.name().parse::<Note>()?);
            assert_eq!(note, note.name().to_lowercase().parse::<Note>()?);
        }
        assert_eq!(Note::FSharp, " f# ".parse::<Note>()?);
        assert!("H".parse::<Note>().is_err());
        assert!("".parse::<Note>().is_err());
        Ok(())
    }

    #[test]
    fn test_encode_uri_component() {
        assert_eq!("C%23", encode_uri_component("C#"));
        assert_eq!("a%20b", encode_uri_component("a b"));
        assert_eq!("safe-_.!~*'()", encode_uri_component("safe-_.!~*'()"));
        assert_eq!("%2F%3F%26", encode_uri_component("/?&"));
    }

    #[test]
    fn test_decode_uri_component() {
        assert_eq!("Tanpura C#.wav", decode_uri_component("Tanpura C%23.wav"));
        assert_eq!("a b", decode_uri_component("a%20b"));
        assert_eq!("100%", decode_uri_component("100%"));
        assert_eq!("%zz", decode_uri_component("%zz"));
        for note in CATALOG {
            assert_eq!(note.file_name(), decode_uri_component(&note.resource_name()));
        }
    }
}
