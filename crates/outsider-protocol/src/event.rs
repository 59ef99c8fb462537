//! Decoded packet events
//!
//! A single inbound packet decodes into one [`DecodedEvent`]. Most events
//! are self-contained; the two delay time halves are partial and only make
//! sense after passing through the [`Reassembler`](crate::Reassembler).

use crate::control::Control;
use crate::packet::Packet;
use crate::preset::Preset;
use crate::settings::SettingsMap;
use crate::tuner::TunerReading;

/// A control and its new value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlChange {
    pub control: Control,
    pub value: u16,
}

impl ControlChange {
    pub fn new(control: Control, value: u16) -> Self {
        Self { control, value }
    }
}

/// Why a packet was not interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnhandledKind {
    /// First reply to the startup request (contents unknown, maybe firmware info)
    StartupReply,
    /// Third reply to the startup request
    StatusReply,
    /// Known class, unknown sub-command or shape
    UnknownLayout,
    /// Unknown packet class
    UnknownClass,
}

/// Everything a single inbound packet can say
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// One control changed
    Control(ControlChange),
    /// Two controls reported together (type + segment value pairs)
    Paired {
        first: ControlChange,
        second: ControlChange,
    },
    /// Low byte of a delay time whose high byte follows in a later packet
    DelayTimeFine(u8),
    /// High byte of a delay time sent on its own
    DelayTimeCoarse(u8),
    /// Every control's current value
    Snapshot(SettingsMap),
    /// Name stored in a preset slot
    PresetName { number: u8, name: String },
    /// Full contents of a preset slot
    PresetSettings(Box<Preset>),
    /// Amplifier switched to a preset
    PresetSelected(u8),
    /// Manual mode toggled on the front panel
    ManualModeChanged(u8),
    /// Tuner mode toggled on the front panel
    TunerModeChanged(u8),
    /// Tuner reading
    TunerReading(TunerReading),
    /// Packet kept for diagnostics only
    Unhandled { kind: UnhandledKind, packet: Packet },
}

impl DecodedEvent {
    /// Control values carried by this event, if it carries any complete ones
    pub fn settings(&self) -> Option<SettingsMap> {
        match self {
            Self::Control(change) => Some(SettingsMap::from([(change.control, change.value)])),
            Self::Paired { first, second } => Some(SettingsMap::from([
                (first.control, first.value),
                (second.control, second.value),
            ])),
            Self::Snapshot(map) => Some(map.clone()),
            _ => None,
        }
    }

    /// The second byte of a `delay_type` pair
    ///
    /// The firmware lays the delay time's high byte out in the same position
    /// as the delay feedback value, so a delay type pair that follows a lone
    /// fine byte completes the delay time.
    pub fn delay_pair_second(&self) -> Option<u8> {
        match self {
            Self::Paired { first, second } if first.control == Control::DelayType => {
                u8::try_from(second.value).ok()
            }
            _ => None,
        }
    }
}
