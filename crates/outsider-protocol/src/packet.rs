//! Fixed-size HID packet
//!
//! Every report exchanged with the amplifier is exactly 64 bytes, in both
//! directions. Unused bytes are zero.
//!
//! # Header
//! ```text
//! [class] [id] [arg] [shape] [payload...]
//! ```
//!
//! - `class`: packet class (see the `CLASS_*` constants)
//! - `id`: control byte for class `0x03`, sub-command for class `0x02`/`0x08`
//! - `arg`: preset number for class `0x02`, zero otherwise
//! - `shape`: number of value bytes for class `0x03` (`0x01`, `0x02`) or
//!   `0x2A` for a full settings snapshot

use std::fmt;
use std::ops::Deref;

use tracing::warn;

use crate::error::ProtocolError;

/// Length of every packet on the wire
pub const PACKET_LEN: usize = 64;

/// Preset management (names, settings, selection)
pub const CLASS_PRESET: u8 = 0x02;
/// Single or paired control change, or full settings snapshot
pub const CLASS_CONTROL: u8 = 0x03;
/// First reply to the startup request
pub const CLASS_STARTUP: u8 = 0x07;
/// Mode/status reports, also the third startup reply
pub const CLASS_STATUS: u8 = 0x08;
/// Tuner reading
pub const CLASS_TUNER: u8 = 0x09;
/// Startup request (host to amp)
pub const CLASS_STARTUP_REQUEST: u8 = 0x81;

/// Class `0x02` sub-command: preset name
pub const PRESET_NAME: u8 = 0x04;
/// Class `0x02` sub-command: preset settings
pub const PRESET_SETTINGS: u8 = 0x05;
/// Class `0x02` sub-command: preset selected
pub const PRESET_SELECTED: u8 = 0x06;

/// Class `0x08` sub-command: manual mode toggled
pub const STATUS_MANUAL_MODE: u8 = 0x03;
/// Class `0x08` sub-command: tuner mode toggled
pub const STATUS_TUNER_MODE: u8 = 0x11;

/// Shape byte: one value byte
pub const SHAPE_SINGLE: u8 = 0x01;
/// Shape byte: two value bytes
pub const SHAPE_PAIR: u8 = 0x02;
/// Shape byte: every control's value
pub const SHAPE_SNAPSHOT: u8 = 0x2A;

/// Offset of a control's value relative to its protocol byte in snapshots
pub const SNAPSHOT_OFFSET: usize = 3;

/// A single 64-byte HID report
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    /// An all-zero packet
    pub const fn zeroed() -> Self {
        Self([0; PACKET_LEN])
    }

    /// A zeroed packet starting with `header`
    ///
    /// Header bytes beyond the packet length are ignored.
    pub fn with_header(header: &[u8]) -> Self {
        let mut packet = Self::zeroed();
        let n = header.len().min(PACKET_LEN);
        packet.0[..n].copy_from_slice(&header[..n]);
        packet
    }

    /// Copy a received buffer into a packet
    ///
    /// Anything other than exactly 64 bytes is a malformed packet. The
    /// mismatch is logged at warning level as well as returned.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != PACKET_LEN {
            warn!(
                "packet length is {} which is not {}",
                bytes.len(),
                PACKET_LEN
            );
            return Err(ProtocolError::MalformedPacket {
                len: bytes.len(),
                bytes: bytes.to_vec(),
            });
        }
        let mut packet = Self::zeroed();
        packet.0.copy_from_slice(bytes);
        Ok(packet)
    }

    /// Packet class byte
    pub fn class(&self) -> u8 {
        self.0[0]
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// Mutable raw bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PACKET_LEN] {
        &mut self.0
    }

    /// Write a little-endian u16 at `offset`
    pub fn put_u16_le(&mut self, offset: usize, value: u16) {
        self.0[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a little-endian u16 at `offset`
    pub fn u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.0[offset], self.0[offset + 1]])
    }

    /// Hex dump in 16-column rows
    pub fn hex_dump(&self) -> String {
        hex_dump(&self.0)
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for Packet {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; PACKET_LEN]> for Packet {
    fn from(bytes: [u8; PACKET_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Packet {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Trailing zero padding is noise in logs
        let used = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        write!(f, "Packet({:02X?}", &self.0[..used])?;
        if used < PACKET_LEN {
            write!(f, " + {} zero bytes", PACKET_LEN - used)?;
        }
        f.write_str(")")
    }
}

/// Format bytes in rows of 16 for comparison with capture tools
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|row| {
            row.iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse whitespace/colon/comma separated hex bytes, e.g. `"03 02 00 01 40"`
///
/// The bytes are returned exactly as written; length is checked by the decoder.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    text.split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            let tok = tok.trim_start_matches("0x").trim_start_matches("0X");
            u8::from_str_radix(tok, 16).map_err(|_| format!("invalid hex byte: {tok}"))
        })
        .collect()
}
