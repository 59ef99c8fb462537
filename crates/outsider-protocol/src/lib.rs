//! Blackstar ID Amplifier Protocol Library
//!
//! This crate provides parsing and encoding for the USB HID control protocol
//! spoken by Blackstar ID series guitar amplifiers. Every message in either
//! direction is a 64-byte packet; byte 0 selects the packet class:
//!
//! - **`0x02`**: preset management (names, full preset contents, selection)
//! - **`0x03`**: control changes (one value, a value pair, or a full snapshot)
//! - **`0x07`/`0x08`**: startup replies and front panel status
//! - **`0x09`**: tuner readings
//! - **`0x81`**: startup request (host to amp)
//!
//! # Architecture
//!
//! - [`control`]: the registry of named controls, their wire IDs and ranges
//! - [`codec`]: validated command encoding and single-packet decoding
//! - [`reassembler`]: joins values the amplifier splits over several packets
//! - [`preset`] / [`preset_file`]: preset records from packets and XML exports
//!
//! Everything here is synchronous and performs no I/O.
//!
//! # Example
//!
//! ```rust
//! use outsider_protocol::{decode_packet, encode_control, Control, Reassembler};
//!
//! // Build a command turning the gain to 100
//! let packet = encode_control(Control::Gain, 100).unwrap();
//! assert_eq!(&packet[..5], &[0x03, 0x02, 0x00, 0x01, 100]);
//!
//! // The amplifier reports the same change back when the knob is turned
//! let mut reassembler = Reassembler::new();
//! let event = decode_packet(&packet).unwrap();
//! let update = reassembler.feed(event).unwrap();
//! assert_eq!(update.settings().unwrap().get(Control::Gain), Some(100));
//! ```

pub mod codec;
pub mod control;
pub mod error;
pub mod event;
pub mod packet;
pub mod preset;
pub mod preset_file;
pub mod reassembler;
pub mod settings;
pub mod tuner;

pub use codec::{
    decode_packet, encode_control, encode_control_by_name, encode_event, preset_name_request,
    preset_settings_request, snapshot_from_packet, snapshot_to_packet, startup_request,
};
pub use control::{Control, ControlRegistry, ControlSpec};
pub use error::{PresetFileError, ProtocolError, ValidationError};
pub use event::{ControlChange, DecodedEvent, UnhandledKind};
pub use packet::{Packet, PACKET_LEN};
pub use preset::Preset;
pub use reassembler::{AmpUpdate, ReassemblyState, Reassembler};
pub use settings::SettingsMap;
pub use tuner::{Note, TunerReading};
