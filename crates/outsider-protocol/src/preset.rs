//! Preset model
//!
//! A preset is a complete amplifier state plus descriptive metadata. Presets
//! come either from a preset settings packet (`02 05 [n] 2A ...`) or from an
//! exported preset file (see [`Preset::from_exported_file`]).
//!
//! The preset packet does not use the snapshot layout for every field. In
//! particular the modulation level is read from byte 12, while the control
//! offset position (byte 24) carries a second copy. Adjusting reverb level
//! on the amp rewrites byte 12 as well as byte 35, while adjusting modulation
//! level only touches byte 12. Both bytes are kept as the firmware reports
//! them; neither is treated as authoritative.

use crate::control::Control;
use crate::error::ProtocolError;
use crate::packet::{Packet, CLASS_PRESET, PRESET_SETTINGS, SHAPE_SNAPSHOT};
use crate::settings::SettingsMap;

/// Byte offsets within a preset settings packet
mod offset {
    pub const NUMBER: usize = 2;
    pub const VOICE: usize = 4;
    pub const GAIN: usize = 5;
    pub const VOLUME: usize = 6;
    pub const BASS: usize = 7;
    pub const MIDDLE: usize = 8;
    pub const TREBLE: usize = 9;
    pub const ISF: usize = 10;
    pub const TVP_VALVE: usize = 11;
    pub const MOD_LEVEL: usize = 12;
    pub const MOD_ABSPOS: usize = 13;
    pub const RESONANCE: usize = 14;
    pub const PRESENCE: usize = 15;
    pub const MASTER_VOLUME: usize = 16;
    pub const TVP_SWITCH: usize = 17;
    pub const MOD_SWITCH: usize = 18;
    pub const DELAY_SWITCH: usize = 19;
    pub const REVERB_SWITCH: usize = 20;
    pub const MOD_TYPE: usize = 21;
    pub const MOD_SEGVAL: usize = 22;
    pub const MOD_MANUAL: usize = 23;
    pub const MOD_LEVEL_MIRROR: usize = 24;
    pub const MOD_SPEED: usize = 25;
    pub const DELAY_TYPE: usize = 26;
    pub const DELAY_FEEDBACK: usize = 27;
    pub const DELAY_LEVEL: usize = 29;
    pub const DELAY_TIME: usize = 30;
    pub const REVERB_TYPE: usize = 32;
    pub const REVERB_SIZE: usize = 33;
    pub const REVERB_LEVEL: usize = 35;
    pub const FX_FOCUS: usize = 39;
}

/// Preamp, tone stack and power amp settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmplifierSection {
    pub voice: u8,
    pub gain: u8,
    pub volume: u8,
    pub bass: u8,
    pub middle: u8,
    pub treble: u8,
    pub isf: u8,
    pub tvp_valve: u8,
    pub tvp_switch: u8,
    pub resonance: u8,
    pub presence: u8,
    pub master_volume: u8,
}

/// Modulation effect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModulationSection {
    pub switch: u8,
    pub kind: u8,
    pub segval: u8,
    pub manual: u8,
    pub level: u8,
    /// Second copy of the level at the control offset position
    pub level_mirror: u8,
    pub speed: u8,
    /// Absolute position of the segmented type selector
    ///
    /// Each type covers a 0x20-wide window, so this is roughly
    /// `kind * 0x20 + segval`.
    pub abspos: u8,
}

/// Delay effect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelaySection {
    pub switch: u8,
    pub kind: u8,
    pub feedback: u8,
    pub level: u8,
    /// Milliseconds
    pub time: u16,
}

/// Reverb effect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReverbSection {
    pub switch: u8,
    pub kind: u8,
    pub size: u8,
    pub level: u8,
}

/// Descriptive metadata, only present in exported preset files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresetInfo {
    pub name: String,
    pub creator: String,
    pub genre: String,
    pub tags: Vec<String>,
    pub about: String,
}

/// Metronome settings stored with a preset
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metronome {
    pub enabled: bool,
    /// Beats per minute
    pub tempo: u16,
    pub volume: u8,
}

impl Default for Metronome {
    fn default() -> Self {
        Self {
            enabled: false,
            tempo: 120,
            volume: 64,
        }
    }
}

/// Backing track settings stored with a preset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    pub name: String,
    pub enabled: bool,
    pub volume: u8,
}

/// Complete preset record
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Preset {
    /// Preset slot, 1-128
    pub number: u8,
    pub amplifier: AmplifierSection,
    pub modulation: ModulationSection,
    pub delay: DelaySection,
    pub reverb: ReverbSection,
    /// Effect with focus: 1 = modulation, 2 = delay, 3 = reverb
    pub fx_focus: u8,
    pub info: PresetInfo,
    pub tuner: bool,
    pub bench: bool,
    pub metronome: Metronome,
    pub track: Track,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            number: 1,
            amplifier: AmplifierSection::default(),
            modulation: ModulationSection::default(),
            delay: DelaySection {
                time: 100,
                ..Default::default()
            },
            reverb: ReverbSection::default(),
            fx_focus: 1,
            info: PresetInfo::default(),
            tuner: false,
            bench: false,
            metronome: Metronome::default(),
            track: Track::default(),
        }
    }
}

/// Whether `packet` has a preset settings header
pub fn is_preset_packet(packet: &[u8]) -> bool {
    packet.len() > 3
        && packet[0] == CLASS_PRESET
        && packet[1] == PRESET_SETTINGS
        && packet[3] == SHAPE_SNAPSHOT
}

impl Preset {
    /// Decode a preset settings packet
    pub fn from_full_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        if !is_preset_packet(packet) {
            return Err(ProtocolError::NotAPresetPacket {
                bytes: packet.to_vec(),
            });
        }
        let p = packet.as_bytes();

        Ok(Self {
            number: p[offset::NUMBER],
            amplifier: AmplifierSection {
                voice: p[offset::VOICE],
                gain: p[offset::GAIN],
                volume: p[offset::VOLUME],
                bass: p[offset::BASS],
                middle: p[offset::MIDDLE],
                treble: p[offset::TREBLE],
                isf: p[offset::ISF],
                tvp_valve: p[offset::TVP_VALVE],
                tvp_switch: p[offset::TVP_SWITCH],
                resonance: p[offset::RESONANCE],
                presence: p[offset::PRESENCE],
                master_volume: p[offset::MASTER_VOLUME],
            },
            modulation: ModulationSection {
                switch: p[offset::MOD_SWITCH],
                kind: p[offset::MOD_TYPE],
                segval: p[offset::MOD_SEGVAL],
                manual: p[offset::MOD_MANUAL],
                level: p[offset::MOD_LEVEL],
                level_mirror: p[offset::MOD_LEVEL_MIRROR],
                speed: p[offset::MOD_SPEED],
                abspos: p[offset::MOD_ABSPOS],
            },
            delay: DelaySection {
                switch: p[offset::DELAY_SWITCH],
                kind: p[offset::DELAY_TYPE],
                feedback: p[offset::DELAY_FEEDBACK],
                level: p[offset::DELAY_LEVEL],
                time: packet.u16_le(offset::DELAY_TIME),
            },
            reverb: ReverbSection {
                switch: p[offset::REVERB_SWITCH],
                kind: p[offset::REVERB_TYPE],
                size: p[offset::REVERB_SIZE],
                level: p[offset::REVERB_LEVEL],
            },
            fx_focus: p[offset::FX_FOCUS],
            ..Self::default()
        })
    }

    /// Encode as the amplifier sends a preset settings packet
    pub fn to_full_packet(&self) -> Packet {
        let mut packet =
            Packet::with_header(&[CLASS_PRESET, PRESET_SETTINGS, self.number, SHAPE_SNAPSHOT]);
        let fields = [
            (offset::VOICE, self.amplifier.voice),
            (offset::GAIN, self.amplifier.gain),
            (offset::VOLUME, self.amplifier.volume),
            (offset::BASS, self.amplifier.bass),
            (offset::MIDDLE, self.amplifier.middle),
            (offset::TREBLE, self.amplifier.treble),
            (offset::ISF, self.amplifier.isf),
            (offset::TVP_VALVE, self.amplifier.tvp_valve),
            (offset::MOD_LEVEL, self.modulation.level),
            (offset::MOD_ABSPOS, self.modulation.abspos),
            (offset::RESONANCE, self.amplifier.resonance),
            (offset::PRESENCE, self.amplifier.presence),
            (offset::MASTER_VOLUME, self.amplifier.master_volume),
            (offset::TVP_SWITCH, self.amplifier.tvp_switch),
            (offset::MOD_SWITCH, self.modulation.switch),
            (offset::DELAY_SWITCH, self.delay.switch),
            (offset::REVERB_SWITCH, self.reverb.switch),
            (offset::MOD_TYPE, self.modulation.kind),
            (offset::MOD_SEGVAL, self.modulation.segval),
            (offset::MOD_MANUAL, self.modulation.manual),
            (offset::MOD_LEVEL_MIRROR, self.modulation.level_mirror),
            (offset::MOD_SPEED, self.modulation.speed),
            (offset::DELAY_TYPE, self.delay.kind),
            (offset::DELAY_FEEDBACK, self.delay.feedback),
            (offset::DELAY_LEVEL, self.delay.level),
            (offset::REVERB_TYPE, self.reverb.kind),
            (offset::REVERB_SIZE, self.reverb.size),
            (offset::REVERB_LEVEL, self.reverb.level),
            (offset::FX_FOCUS, self.fx_focus),
        ];
        let bytes = packet.as_bytes_mut();
        for (pos, value) in fields {
            bytes[pos] = value;
        }
        packet.put_u16_le(offset::DELAY_TIME, self.delay.time);
        packet
    }

    /// Control values described by this preset
    ///
    /// `mod_level` is taken from the preset's primary level byte.
    pub fn settings(&self) -> SettingsMap {
        let a = &self.amplifier;
        let m = &self.modulation;
        let d = &self.delay;
        let r = &self.reverb;
        SettingsMap::from([
            (Control::Voice, a.voice.into()),
            (Control::Gain, a.gain.into()),
            (Control::Volume, a.volume.into()),
            (Control::Bass, a.bass.into()),
            (Control::Middle, a.middle.into()),
            (Control::Treble, a.treble.into()),
            (Control::Isf, a.isf.into()),
            (Control::TvpValve, a.tvp_valve.into()),
            (Control::Resonance, a.resonance.into()),
            (Control::Presence, a.presence.into()),
            (Control::MasterVolume, a.master_volume.into()),
            (Control::TvpSwitch, a.tvp_switch.into()),
            (Control::ModSwitch, m.switch.into()),
            (Control::DelaySwitch, d.switch.into()),
            (Control::ReverbSwitch, r.switch.into()),
            (Control::ModType, m.kind.into()),
            (Control::ModSegval, m.segval.into()),
            (Control::ModManual, m.manual.into()),
            (Control::ModLevel, m.level.into()),
            (Control::ModSpeed, m.speed.into()),
            (Control::DelayType, d.kind.into()),
            (Control::DelayFeedback, d.feedback.into()),
            (Control::DelayLevel, d.level.into()),
            (Control::DelayTime, d.time),
            (Control::ReverbType, r.kind.into()),
            (Control::ReverbSize, r.size.into()),
            (Control::ReverbLevel, r.level.into()),
            (Control::FxFocus, self.fx_focus.into()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        let mut packet = Packet::with_header(&[0x02, 0x05, 0x07, 0x2A]);
        let bytes = packet.as_bytes_mut();
        bytes[4] = 3; // voice
        bytes[5] = 0x50; // gain
        bytes[11] = 4; // tvp valve
        bytes[12] = 0x33; // mod level
        bytes[13] = 0x45; // selector position
        bytes[17] = 1; // tvp on
        bytes[21] = 2; // mod type
        bytes[22] = 5; // mod segment
        bytes[24] = 0x34; // mod level, second copy
        bytes[26] = 1; // delay type
        bytes[30] = 0xF4;
        bytes[31] = 0x03; // 1012 ms
        bytes[32] = 3; // reverb type
        bytes[35] = 0x60; // reverb level
        bytes[39] = 2; // delay has focus
        packet
    }

    #[test]
    fn test_from_full_packet() {
        let preset = Preset::from_full_packet(&sample_packet()).unwrap();
        assert_eq!(preset.number, 7);
        assert_eq!(preset.amplifier.voice, 3);
        assert_eq!(preset.amplifier.gain, 0x50);
        assert_eq!(preset.amplifier.tvp_valve, 4);
        assert_eq!(preset.amplifier.tvp_switch, 1);
        assert_eq!(preset.modulation.kind, 2);
        assert_eq!(preset.modulation.segval, 5);
        assert_eq!(preset.modulation.level, 0x33);
        assert_eq!(preset.modulation.level_mirror, 0x34);
        assert_eq!(preset.modulation.abspos, 0x45);
        assert_eq!(preset.delay.kind, 1);
        assert_eq!(preset.delay.time, 1012);
        assert_eq!(preset.reverb.kind, 3);
        assert_eq!(preset.reverb.level, 0x60);
        assert_eq!(preset.fx_focus, 2);
    }

    #[test]
    fn test_rejects_other_packets() {
        let snapshot = Packet::with_header(&[0x03, 0x01, 0x00, 0x2A]);
        assert!(matches!(
            Preset::from_full_packet(&snapshot),
            Err(ProtocolError::NotAPresetPacket { .. })
        ));
        let name = Packet::with_header(&[0x02, 0x04, 0x01, 0x00]);
        assert!(Preset::from_full_packet(&name).is_err());
    }

    #[test]
    fn test_packet_roundtrip() {
        let packet = sample_packet();
        let preset = Preset::from_full_packet(&packet).unwrap();
        assert_eq!(preset.to_full_packet(), packet);
    }

    #[test]
    fn test_settings_projection_is_complete() {
        let preset = Preset::from_full_packet(&sample_packet()).unwrap();
        let settings = preset.settings();
        assert!(settings.is_complete());
        assert_eq!(settings.get(Control::DelayTime), Some(1012));
        assert_eq!(settings.get(Control::ModLevel), Some(0x33));
    }
}
