//! Tuner readings
//!
//! While tuner mode is active the amplifier streams class `0x09` packets:
//!
//! ```text
//! 09 [note] [pitch] 00 ...
//! ```
//!
//! `note` is 1-based into a chromatic scale starting at E (1 = E, 6 = A);
//! zero means no note. `pitch` is centred on 50, so the deviation is
//! `50 - pitch`: negative is flat, positive is sharp.

use std::fmt;

use crate::packet::{Packet, CLASS_TUNER};

/// Pitch byte value for a perfectly tuned string
pub const PITCH_CENTRE: u8 = 50;

/// Chromatic note reported by the tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Note {
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
    C,
    CSharp,
    D,
    DSharp,
}

impl Note {
    /// Scale in wire order, starting at E
    pub const SCALE: [Note; 12] = [
        Note::E,
        Note::F,
        Note::FSharp,
        Note::G,
        Note::GSharp,
        Note::A,
        Note::ASharp,
        Note::B,
        Note::C,
        Note::CSharp,
        Note::D,
        Note::DSharp,
    ];

    /// Note for a 1-based wire index
    pub fn from_index(index: u8) -> Option<Note> {
        let slot = usize::from(index).checked_sub(1)?;
        Self::SCALE.get(slot).copied()
    }

    /// 1-based wire index
    pub fn index(self) -> u8 {
        // SCALE has 12 entries and contains every variant
        Self::SCALE.iter().position(|n| *n == self).unwrap_or(0) as u8 + 1
    }

    /// Note name as printed on a tuner display
    pub fn name(self) -> &'static str {
        match self {
            Note::E => "E",
            Note::F => "F",
            Note::FSharp => "F#",
            Note::G => "G",
            Note::GSharp => "G#",
            Note::A => "A",
            Note::ASharp => "A#",
            Note::B => "B",
            Note::C => "C",
            Note::CSharp => "C#",
            Note::D => "D",
            Note::DSharp => "D#",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One tuner packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TunerReading {
    /// Raw note index as sent by the amplifier
    pub note_index: u8,
    /// Decoded note, `None` when the index is outside the scale
    pub note: Option<Note>,
    /// Deviation from pitch, negative is flat
    pub deviation: i16,
}

impl TunerReading {
    /// Decode the note and pitch bytes
    pub fn from_bytes(note_index: u8, pitch: u8) -> Self {
        Self {
            note_index,
            note: Note::from_index(note_index),
            deviation: i16::from(PITCH_CENTRE) - i16::from(pitch),
        }
    }

    /// Reading for a note at a given deviation
    pub fn new(note: Note, deviation: i16) -> Self {
        Self {
            note_index: note.index(),
            note: Some(note),
            deviation,
        }
    }

    /// Whether the amplifier detected no string
    ///
    /// The amp sends a zero note index while nothing is ringing.
    pub fn is_silent(&self) -> bool {
        self.note_index == 0
    }

    /// Encode as the amplifier would send it
    pub fn to_packet(&self) -> Packet {
        let pitch = (i16::from(PITCH_CENTRE) - self.deviation).clamp(0, 255) as u8;
        Packet::with_header(&[CLASS_TUNER, self.note_index, pitch])
    }
}

impl fmt::Display for TunerReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note {
            _ if self.is_silent() => f.write_str("--"),
            Some(note) => write!(f, "{} {:+}", note, self.deviation),
            None => write!(f, "?{} {:+}", self.note_index, self.deviation),
        }
    }
}
