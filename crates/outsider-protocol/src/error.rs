//! Error types for amplifier protocol encoding and decoding

use thiserror::Error;

use crate::control::Control;
use crate::packet::hex_dump;

/// Errors raised before a command packet is built
///
/// Validation always happens ahead of encoding, so a `ValidationError` means
/// no bytes were produced at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Control name is not in the registry
    #[error("unknown control: {0}")]
    UnknownControl(String),

    /// Value is outside the control's inclusive range
    #[error("value {value} is not valid for control {control} (expected {min}..={max})")]
    ValueOutOfRange {
        control: Control,
        value: i32,
        min: u16,
        max: u16,
    },

    /// Control only exists as a wire artifact and cannot be set directly
    #[error("control {0} cannot be set directly")]
    WireOnlyControl(Control),

    /// Preset slot outside the amplifier's preset bank
    #[error("preset {0} is not valid (expected 1..=128)")]
    PresetOutOfRange(i32),
}

/// Errors raised while interpreting packets received from the amplifier
///
/// Every variant carries the offending bytes so callers can log them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer was not exactly one packet long
    #[error("malformed packet: expected 64 bytes, got {len}\n{}", hex_dump(.bytes))]
    MalformedPacket { len: usize, bytes: Vec<u8> },

    /// Control byte does not map to any known control
    #[error("unrecognized control ID: 0x{id:02X}\n{}", hex_dump(.bytes))]
    UnrecognizedControlId { id: u8, bytes: Vec<u8> },

    /// Two-byte value shape used with a control that has no paired encoding
    #[error("unrecognized paired control: {control}\n{}", hex_dump(.bytes))]
    UnrecognizedPairedControl { control: Control, bytes: Vec<u8> },

    /// Packet header does not describe a preset settings packet
    #[error("packet is not a preset settings packet\n{}", hex_dump(.bytes))]
    NotAPresetPacket { bytes: Vec<u8> },
}

impl ProtocolError {
    /// Raw bytes of the packet that caused the error
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::MalformedPacket { bytes, .. }
            | Self::UnrecognizedControlId { bytes, .. }
            | Self::UnrecognizedPairedControl { bytes, .. }
            | Self::NotAPresetPacket { bytes } => bytes,
        }
    }
}

/// Errors raised while reading an exported preset file
#[derive(Debug, Error)]
pub enum PresetFileError {
    /// Document is not well-formed XML
    #[error("malformed preset file: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A required element is absent
    #[error("malformed preset file: missing <{0}> node")]
    MissingNode(&'static str),

    /// A required attribute is absent
    #[error("malformed preset file: <{node}> has no {attribute} attribute")]
    MissingAttribute {
        node: &'static str,
        attribute: &'static str,
    },

    /// An attribute could not be parsed or is out of range
    #[error("malformed preset file: <{node}> {attribute}=\"{value}\" is not valid")]
    InvalidValue {
        node: &'static str,
        attribute: &'static str,
        value: String,
    },
}
