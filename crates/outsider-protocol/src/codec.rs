//! Packet encoding and decoding
//!
//! # Control changes (class `0x03`)
//! ```text
//! 03 [id] 00 01 [value]              one byte value
//! 03 [id] 00 02 [lo] [hi]            delay time in ms, little-endian
//! 03 [id] 00 02 [type] [segment]     type + segment pair (mod, delay, reverb)
//! 03 01  00 2A [values...]           snapshot, value of id N at byte N + 3
//! ```
//!
//! # Delay time
//! When the tap button is used the amp sends the delay time in one
//! two-byte packet. When tap is held and the level knob turned, the amp
//! sends the low byte on its own (`03 1B 00 01 [lo]`) and the high byte
//! later. The decoder reports the lone low byte as
//! [`DecodedEvent::DelayTimeFine`]; joining it with the high byte is the
//! [`Reassembler`](crate::Reassembler)'s job.

use tracing::{debug, warn};

use crate::control::{Control, ControlRegistry};
use crate::error::{ProtocolError, ValidationError};
use crate::event::{ControlChange, DecodedEvent, UnhandledKind};
use crate::packet::{
    Packet, CLASS_CONTROL, CLASS_PRESET, CLASS_STARTUP, CLASS_STARTUP_REQUEST, CLASS_STATUS,
    CLASS_TUNER, PACKET_LEN, PRESET_NAME, PRESET_SELECTED, PRESET_SETTINGS, SHAPE_PAIR,
    SHAPE_SINGLE, SHAPE_SNAPSHOT, SNAPSHOT_OFFSET, STATUS_MANUAL_MODE, STATUS_TUNER_MODE,
};
use crate::preset::Preset;
use crate::settings::SettingsMap;
use crate::tuner::TunerReading;

/// Lowest preset slot
pub const PRESET_MIN: u8 = 1;
/// Highest preset slot
pub const PRESET_MAX: u8 = 128;

/// Bytes of a preset name
const PRESET_NAME_START: usize = 4;
const PRESET_NAME_END: usize = 25;

/// Payload of the startup request, from byte 3
const STARTUP_PAYLOAD: [u8; 5] = [0x04, 0x03, 0x06, 0x02, 0x7A];

/// Build the packet that sets `control` to `value`
///
/// The value is checked against the control's range before any byte is
/// written.
pub fn encode_control(control: Control, value: i32) -> Result<Packet, ValidationError> {
    if control.is_wire_only() {
        return Err(ValidationError::WireOnlyControl(control));
    }
    let value = ControlRegistry::global().validate(control, value)?;
    let id = control.protocol_id();

    let packet = if control == Control::DelayTime {
        let mut packet = Packet::with_header(&[CLASS_CONTROL, id, 0x00, SHAPE_PAIR]);
        packet.put_u16_le(4, value);
        packet
    } else {
        // Every other range fits in one byte
        Packet::with_header(&[CLASS_CONTROL, id, 0x00, SHAPE_SINGLE, wire_byte(control, value)])
    };

    debug!("Encoded control: {} to value {}", control, value);
    Ok(packet)
}

/// Build the packet that sets a control given by name
pub fn encode_control_by_name(name: &str, value: i32) -> Result<Packet, ValidationError> {
    let spec = ControlRegistry::global().lookup_by_name(name)?;
    encode_control(spec.control, value)
}

/// Startup request
///
/// The amp answers with three packets: an opaque `0x07` packet, a full
/// settings snapshot, and a `0x08` status packet.
pub fn startup_request() -> Packet {
    let mut packet = Packet::with_header(&[CLASS_STARTUP_REQUEST]);
    packet.as_bytes_mut()[3..8].copy_from_slice(&STARTUP_PAYLOAD);
    packet
}

/// Request the name stored in a preset slot
pub fn preset_name_request(preset: i32) -> Result<Packet, ValidationError> {
    let preset = validate_preset(preset)?;
    Ok(Packet::with_header(&[CLASS_PRESET, PRESET_NAME, preset, 0x00]))
}

/// Request the full settings stored in a preset slot
pub fn preset_settings_request(preset: i32) -> Result<Packet, ValidationError> {
    let preset = validate_preset(preset)?;
    Ok(Packet::with_header(&[CLASS_PRESET, PRESET_SETTINGS, preset, 0x00]))
}

fn validate_preset(preset: i32) -> Result<u8, ValidationError> {
    u8::try_from(preset)
        .ok()
        .filter(|p| (PRESET_MIN..=PRESET_MAX).contains(p))
        .ok_or(ValidationError::PresetOutOfRange(preset))
}

/// Decode one packet received from the amplifier
pub fn decode_packet(bytes: &[u8]) -> Result<DecodedEvent, ProtocolError> {
    let packet = Packet::from_slice(bytes)?;

    let event = match packet.class() {
        CLASS_PRESET => decode_preset(&packet)?,
        CLASS_CONTROL => decode_control(&packet)?,
        CLASS_STARTUP => {
            debug!("Unhandled startup packet 1\n{}", packet.hex_dump());
            unhandled(UnhandledKind::StartupReply, packet)
        }
        CLASS_STATUS => match packet[1] {
            STATUS_MANUAL_MODE => DecodedEvent::ManualModeChanged(packet[4]),
            STATUS_TUNER_MODE => DecodedEvent::TunerModeChanged(packet[4]),
            _ => {
                debug!("Unhandled startup packet 3\n{}", packet.hex_dump());
                unhandled(UnhandledKind::StatusReply, packet)
            }
        },
        CLASS_TUNER => DecodedEvent::TunerReading(TunerReading::from_bytes(packet[1], packet[2])),
        _ => {
            debug!("Unhandled data packet\n{}", packet.hex_dump());
            unhandled(UnhandledKind::UnknownClass, packet)
        }
    };

    Ok(event)
}

fn unhandled(kind: UnhandledKind, packet: Packet) -> DecodedEvent {
    DecodedEvent::Unhandled { kind, packet }
}

fn decode_preset(packet: &Packet) -> Result<DecodedEvent, ProtocolError> {
    let number = packet[2];
    let event = match packet[1] {
        PRESET_NAME => {
            let name = preset_name_from_bytes(&packet[PRESET_NAME_START..PRESET_NAME_END]);
            debug!("Preset {} name: {:?}", number, name);
            DecodedEvent::PresetName { number, name }
        }
        PRESET_SETTINGS => DecodedEvent::PresetSettings(Box::new(Preset::from_full_packet(packet)?)),
        PRESET_SELECTED => DecodedEvent::PresetSelected(number),
        _ => {
            debug!("Unhandled preset packet\n{}", packet.hex_dump());
            unhandled(UnhandledKind::UnknownLayout, *packet)
        }
    };
    Ok(event)
}

/// Printable characters of a preset name field, zero padding dropped
fn preset_name_from_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|&&b| b != 0)
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| char::from(b))
        .collect()
}

fn decode_control(packet: &Packet) -> Result<DecodedEvent, ProtocolError> {
    let shape = packet[3];
    if shape == SHAPE_SNAPSHOT {
        debug!("All controls info packet received");
        return Ok(DecodedEvent::Snapshot(snapshot_from_packet(packet)));
    }
    if shape != SHAPE_SINGLE && shape != SHAPE_PAIR {
        debug!("Unhandled control packet shape 0x{:02X}\n{}", shape, packet.hex_dump());
        return Ok(unhandled(UnhandledKind::UnknownLayout, *packet));
    }

    let control = ControlRegistry::global().lookup_by_id(packet[1], packet.as_ref())?;
    let (a, b) = (packet[4], packet[5]);

    let event = match (shape, control) {
        (SHAPE_SINGLE, Control::DelayTime) => DecodedEvent::DelayTimeFine(a),
        (_, Control::DelayTimeCoarse) => DecodedEvent::DelayTimeCoarse(a),
        (SHAPE_SINGLE, control) => DecodedEvent::Control(ControlChange::new(control, a.into())),
        (_, Control::DelayTime) => {
            DecodedEvent::Control(ControlChange::new(Control::DelayTime, packet.u16_le(4)))
        }
        (_, Control::DelayType) => paired(Control::DelayType, a, Control::DelayFeedback, b),
        (_, Control::ReverbType) => paired(Control::ReverbType, a, Control::ReverbSize, b),
        (_, Control::ModType) => paired(Control::ModType, a, Control::ModSegval, b),
        (_, control) => {
            return Err(ProtocolError::UnrecognizedPairedControl {
                control,
                bytes: packet.to_vec(),
            })
        }
    };

    debug!("Data from amp:: {:?}", event);
    Ok(event)
}

/// Narrow a value to its one-byte wire form, saturating what does not fit
fn wire_byte(control: Control, value: u16) -> u8 {
    u8::try_from(value).unwrap_or_else(|_| {
        warn!("{} value {} does not fit in one byte, sending 255", control, value);
        u8::MAX
    })
}

fn paired(first: Control, a: u8, second: Control, b: u8) -> DecodedEvent {
    DecodedEvent::Paired {
        first: ControlChange::new(first, a.into()),
        second: ControlChange::new(second, b.into()),
    }
}

/// Read every control from a snapshot packet
///
/// Each control's value sits at its protocol byte plus three. The delay time
/// spans that byte and the next; the separate coarse entry is skipped.
pub fn snapshot_from_packet(packet: &Packet) -> SettingsMap {
    ControlRegistry::global()
        .iter()
        .filter(|spec| !spec.control.is_wire_only())
        .map(|spec| {
            let offset = usize::from(spec.protocol_id) + SNAPSHOT_OFFSET;
            let value = match spec.control {
                Control::DelayTime => packet.u16_le(offset),
                _ => u16::from(packet[offset]),
            };
            (spec.control, value)
        })
        .collect()
}

/// Build a snapshot packet, as the amp sends after startup
///
/// Controls missing from `settings` are left at zero.
pub fn snapshot_to_packet(settings: &SettingsMap) -> Packet {
    let mut packet = Packet::with_header(&[CLASS_CONTROL, 0x01, 0x00, SHAPE_SNAPSHOT]);
    for (control, value) in settings.iter() {
        if control.is_wire_only() {
            warn!("Ignoring {} in snapshot settings", control);
            continue;
        }
        let offset = usize::from(control.protocol_id()) + SNAPSHOT_OFFSET;
        if offset + 1 >= PACKET_LEN {
            continue;
        }
        match control {
            Control::DelayTime => packet.put_u16_le(offset, value),
            _ => packet.as_bytes_mut()[offset] = wire_byte(control, value),
        }
    }
    packet
}

/// Build a control change packet as the amp reports it
///
/// Unlike [`encode_control`] this does not validate and can produce the
/// split delay time packets.
pub fn encode_event(event: &DecodedEvent) -> Packet {
    match event {
        DecodedEvent::Control(change) if change.control == Control::DelayTime => {
            let mut packet = Packet::with_header(&[
                CLASS_CONTROL,
                Control::DelayTime.protocol_id(),
                0x00,
                SHAPE_PAIR,
            ]);
            packet.put_u16_le(4, change.value);
            packet
        }
        DecodedEvent::Control(change) => Packet::with_header(&[
            CLASS_CONTROL,
            change.control.protocol_id(),
            0x00,
            SHAPE_SINGLE,
            wire_byte(change.control, change.value),
        ]),
        DecodedEvent::Paired { first, second } => Packet::with_header(&[
            CLASS_CONTROL,
            first.control.protocol_id(),
            0x00,
            SHAPE_PAIR,
            wire_byte(first.control, first.value),
            wire_byte(second.control, second.value),
        ]),
        DecodedEvent::DelayTimeFine(fine) => Packet::with_header(&[
            CLASS_CONTROL,
            Control::DelayTime.protocol_id(),
            0x00,
            SHAPE_SINGLE,
            *fine,
        ]),
        DecodedEvent::DelayTimeCoarse(coarse) => Packet::with_header(&[
            CLASS_CONTROL,
            Control::DelayTimeCoarse.protocol_id(),
            0x00,
            SHAPE_PAIR,
            *coarse,
        ]),
        DecodedEvent::Snapshot(settings) => snapshot_to_packet(settings),
        DecodedEvent::PresetName { number, name } => preset_name_packet(*number, name),
        DecodedEvent::PresetSettings(preset) => preset.to_full_packet(),
        DecodedEvent::PresetSelected(number) => {
            Packet::with_header(&[CLASS_PRESET, PRESET_SELECTED, *number])
        }
        DecodedEvent::ManualModeChanged(on) => {
            Packet::with_header(&[CLASS_STATUS, STATUS_MANUAL_MODE, 0x00, 0x01, *on])
        }
        DecodedEvent::TunerModeChanged(on) => {
            Packet::with_header(&[CLASS_STATUS, STATUS_TUNER_MODE, 0x00, 0x01, *on])
        }
        DecodedEvent::TunerReading(reading) => reading.to_packet(),
        DecodedEvent::Unhandled { packet, .. } => *packet,
    }
}

/// Build a preset name reply; names longer than the field are truncated
pub fn preset_name_packet(number: u8, name: &str) -> Packet {
    let mut packet = Packet::with_header(&[CLASS_PRESET, PRESET_NAME, number, 0x00]);
    let field = &mut packet.as_bytes_mut()[PRESET_NAME_START..PRESET_NAME_END];
    for (slot, byte) in field.iter_mut().zip(name.bytes()) {
        *slot = byte;
    }
    packet
}
