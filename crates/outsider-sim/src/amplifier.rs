//! Virtual amplifier for testing
//!
//! This module provides a simulated amplifier that tracks control and preset
//! state, answers host requests the way the hardware does, and produces the
//! packets the hardware sends when its front panel is used.

use outsider_protocol::codec::{preset_name_packet, PRESET_MAX, PRESET_MIN};
use outsider_protocol::packet::{
    CLASS_CONTROL, CLASS_PRESET, CLASS_STARTUP, CLASS_STARTUP_REQUEST, CLASS_STATUS,
    PRESET_NAME, PRESET_SETTINGS, SHAPE_PAIR, SHAPE_SINGLE,
};
use outsider_protocol::{
    decode_packet, encode_event, snapshot_to_packet, Control, ControlChange, ControlRegistry,
    DecodedEvent, Packet, Preset, SettingsMap, TunerReading, ValidationError,
};
use tracing::{debug, warn};

/// Sub-command byte of the status packet closing the startup handshake
const STARTUP_STATUS: u8 = 0x04;

/// Virtual amplifier
///
/// Holds the live control values, 128 preset slots and the front panel
/// modes. Host packets go through [`process_packet`](Self::process_packet);
/// knob helpers return the packets a real amp would emit.
#[derive(Debug, Clone)]
pub struct VirtualAmp {
    settings: SettingsMap,
    presets: Vec<Preset>,
    selected_preset: u8,
    manual_mode: bool,
    tuner_mode: bool,
    /// Packets received (for test verification)
    received_packets: Vec<Packet>,
}

impl Default for VirtualAmp {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualAmp {
    /// Create an amp with factory presets loaded and preset 1 active
    pub fn new() -> Self {
        let presets: Vec<Preset> = (PRESET_MIN..=PRESET_MAX)
            .map(|number| {
                let mut preset = Preset {
                    number,
                    ..Preset::default()
                };
                preset.info.name = format!("Preset {}", number);
                preset
            })
            .collect();

        Self {
            settings: presets[0].settings(),
            presets,
            selected_preset: PRESET_MIN,
            manual_mode: false,
            tuner_mode: false,
            received_packets: Vec::new(),
        }
    }

    /// Current control values
    pub fn settings(&self) -> &SettingsMap {
        &self.settings
    }

    /// Current value of one control
    pub fn value(&self, control: Control) -> Option<u16> {
        self.settings.get(control)
    }

    /// Contents of a preset slot
    pub fn preset(&self, number: u8) -> Option<&Preset> {
        self.presets.get(usize::from(number).checked_sub(1)?)
    }

    /// Replace a preset slot; the slot is taken from `preset.number`
    pub fn store_preset(&mut self, preset: Preset) -> bool {
        match usize::from(preset.number)
            .checked_sub(1)
            .and_then(|i| self.presets.get_mut(i))
        {
            Some(slot) => {
                *slot = preset;
                true
            }
            None => false,
        }
    }

    /// Preset currently active
    pub fn selected_preset(&self) -> u8 {
        self.selected_preset
    }

    /// Whether manual mode is on
    pub fn manual_mode(&self) -> bool {
        self.manual_mode
    }

    /// Whether tuner mode is on
    pub fn tuner_mode(&self) -> bool {
        self.tuner_mode
    }

    /// Every packet received from the host
    pub fn received_packets(&self) -> &[Packet] {
        &self.received_packets
    }

    /// Process a packet sent by the host
    ///
    /// Returns the reply packets, in order. Control changes update state
    /// and have no reply.
    pub fn process_packet(&mut self, bytes: &[u8]) -> Vec<Packet> {
        let packet = match Packet::from_slice(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Virtual amp ignoring packet: {}", e);
                return Vec::new();
            }
        };
        self.received_packets.push(packet);

        match (packet[0], packet[1]) {
            (CLASS_STARTUP_REQUEST, _) => {
                debug!("Virtual amp answering startup request");
                vec![
                    Packet::with_header(&[CLASS_STARTUP, 0x00, 0x00, 0x00]),
                    snapshot_to_packet(&self.settings),
                    Packet::with_header(&[
                        CLASS_STATUS,
                        STARTUP_STATUS,
                        0x00,
                        0x01,
                        u8::from(self.manual_mode),
                    ]),
                ]
            }
            (CLASS_PRESET, PRESET_NAME) => match self.preset(packet[2]) {
                Some(preset) => vec![preset_name_packet(preset.number, &preset.info.name)],
                None => {
                    warn!("Virtual amp has no preset {}", packet[2]);
                    Vec::new()
                }
            },
            (CLASS_PRESET, PRESET_SETTINGS) => match self.preset(packet[2]) {
                Some(preset) => vec![preset.to_full_packet()],
                None => {
                    warn!("Virtual amp has no preset {}", packet[2]);
                    Vec::new()
                }
            },
            (CLASS_CONTROL, _) => {
                self.apply_control_packet(&packet);
                Vec::new()
            }
            _ => {
                debug!("Virtual amp ignoring packet\n{}", packet.hex_dump());
                Vec::new()
            }
        }
    }

    fn apply_control_packet(&mut self, packet: &Packet) {
        match decode_packet(packet) {
            Ok(event) => match event.settings() {
                Some(changes) => {
                    for (control, value) in changes.iter() {
                        debug!("Virtual amp set {} to {}", control, value);
                    }
                    self.settings.merge(&changes);
                }
                None => debug!("Virtual amp ignoring control event {:?}", event),
            },
            Err(e) => warn!("Virtual amp rejected control packet: {}", e),
        }
    }

    /// Turn a front panel knob
    ///
    /// Updates state and returns the packet the amp reports. Type knobs
    /// report their segment value alongside, as the hardware does. Delay
    /// time is reported in one two-byte packet, as when tap is used.
    pub fn turn_knob(&mut self, control: Control, value: u16) -> Result<Vec<Packet>, ValidationError> {
        if control.is_wire_only() {
            return Err(ValidationError::WireOnlyControl(control));
        }
        let value = ControlRegistry::global().validate(control, i32::from(value))?;
        self.settings.insert(control, value);

        let partner = match control {
            Control::ModType => Some(Control::ModSegval),
            Control::DelayType => Some(Control::DelayFeedback),
            Control::ReverbType => Some(Control::ReverbSize),
            _ => None,
        };
        let event = match partner {
            Some(second) => DecodedEvent::Paired {
                first: ControlChange::new(control, value),
                second: ControlChange::new(second, self.settings.get(second).unwrap_or(0)),
            },
            None => DecodedEvent::Control(ControlChange::new(control, value)),
        };
        Ok(vec![encode_event(&event)])
    }

    /// Change the delay time the way the level knob does with tap held
    ///
    /// The low byte goes out alone; the high byte follows in the second
    /// position of a delay type packet.
    pub fn turn_delay_time_split(&mut self, ms: u16) -> Result<Vec<Packet>, ValidationError> {
        let ms = ControlRegistry::global().validate(Control::DelayTime, i32::from(ms))?;
        self.settings.insert(Control::DelayTime, ms);
        let [fine, coarse] = ms.to_le_bytes();
        let delay_type = self.settings.get(Control::DelayType).unwrap_or(0) as u8;

        Ok(vec![
            Packet::with_header(&[
                CLASS_CONTROL,
                Control::DelayTime.protocol_id(),
                0x00,
                SHAPE_SINGLE,
                fine,
            ]),
            Packet::with_header(&[
                CLASS_CONTROL,
                Control::DelayType.protocol_id(),
                0x00,
                SHAPE_PAIR,
                delay_type,
                coarse,
            ]),
        ])
    }

    /// Switch to a preset from the front panel
    ///
    /// Loads the preset's values and reports the selection followed by a
    /// snapshot of the new state.
    pub fn select_preset(&mut self, number: u8) -> Option<Vec<Packet>> {
        let preset = self.preset(number)?;
        self.settings = preset.settings();
        self.selected_preset = number;
        Some(vec![
            encode_event(&DecodedEvent::PresetSelected(number)),
            snapshot_to_packet(&self.settings),
        ])
    }

    /// Toggle manual mode
    pub fn set_manual_mode(&mut self, on: bool) -> Packet {
        self.manual_mode = on;
        encode_event(&DecodedEvent::ManualModeChanged(u8::from(on)))
    }

    /// Toggle tuner mode
    pub fn set_tuner_mode(&mut self, on: bool) -> Packet {
        self.tuner_mode = on;
        encode_event(&DecodedEvent::TunerModeChanged(u8::from(on)))
    }

    /// Report a tuner reading; nothing is sent outside tuner mode
    pub fn tuner_reading(&self, reading: TunerReading) -> Option<Packet> {
        if !self.tuner_mode {
            debug!("Virtual amp not in tuner mode, dropping reading {}", reading);
            return None;
        }
        Some(reading.to_packet())
    }
}
