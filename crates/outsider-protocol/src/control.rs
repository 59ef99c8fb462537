//! Amplifier control registry
//!
//! Every front-panel control of the amplifier is identified on the wire by a
//! single byte. The same byte doubles as a position in the full settings
//! snapshot packet: the value of a control lives at `protocol_id + 3`.
//!
//! The registry is a static table, checked once at first use to make sure no
//! two controls share a protocol byte or a name.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{ProtocolError, ValidationError};

/// Symbolic amplifier control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Control {
    Voice,
    Gain,
    Volume,
    Bass,
    Middle,
    Treble,
    Isf,
    TvpValve,
    Resonance,
    Presence,
    MasterVolume,
    TvpSwitch,
    ModSwitch,
    DelaySwitch,
    ReverbSwitch,
    ModType,
    /// Segment position within the selected modulation type
    ModSegval,
    /// Manual sweep position (flanger only)
    ModManual,
    ModLevel,
    ModSpeed,
    DelayType,
    /// Segment position within the selected delay type
    DelayFeedback,
    DelayLevel,
    /// Delay time in milliseconds, sent as a little-endian pair of bytes
    DelayTime,
    /// High byte of the delay time when the amp reports it on its own
    DelayTimeCoarse,
    ReverbType,
    /// Segment position within the selected reverb type
    ReverbSize,
    ReverbLevel,
    /// Effect currently receiving level/type/tap input
    FxFocus,
}

/// Static description of one control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSpec {
    pub control: Control,
    pub name: &'static str,
    pub protocol_id: u8,
    pub min: u16,
    pub max: u16,
}

impl ControlSpec {
    const fn new(control: Control, name: &'static str, protocol_id: u8, min: u16, max: u16) -> Self {
        Self {
            control,
            name,
            protocol_id,
            min,
            max,
        }
    }

    /// Inclusive value range
    pub fn range(&self) -> (u16, u16) {
        (self.min, self.max)
    }

    /// Whether `value` lies inside the inclusive range
    pub fn contains(&self, value: i32) -> bool {
        value >= i32::from(self.min) && value <= i32::from(self.max)
    }
}

/// The amplifier's control table
pub const CONTROL_TABLE: &[ControlSpec] = &[
    ControlSpec::new(Control::Voice, "voice", 0x01, 0, 5),
    ControlSpec::new(Control::Gain, "gain", 0x02, 0, 127),
    ControlSpec::new(Control::Volume, "volume", 0x03, 0, 127),
    ControlSpec::new(Control::Bass, "bass", 0x04, 0, 127),
    ControlSpec::new(Control::Middle, "middle", 0x05, 0, 127),
    ControlSpec::new(Control::Treble, "treble", 0x06, 0, 127),
    ControlSpec::new(Control::Isf, "isf", 0x07, 0, 127),
    ControlSpec::new(Control::TvpValve, "tvp_valve", 0x08, 0, 5),
    ControlSpec::new(Control::Resonance, "resonance", 0x0B, 0, 127),
    ControlSpec::new(Control::Presence, "presence", 0x0C, 0, 127),
    ControlSpec::new(Control::MasterVolume, "master_volume", 0x0D, 0, 127),
    ControlSpec::new(Control::TvpSwitch, "tvp_switch", 0x0E, 0, 1),
    ControlSpec::new(Control::ModSwitch, "mod_switch", 0x0F, 0, 1),
    ControlSpec::new(Control::DelaySwitch, "delay_switch", 0x10, 0, 1),
    ControlSpec::new(Control::ReverbSwitch, "reverb_switch", 0x11, 0, 1),
    ControlSpec::new(Control::ModType, "mod_type", 0x12, 0, 3),
    ControlSpec::new(Control::ModSegval, "mod_segval", 0x13, 0, 31),
    ControlSpec::new(Control::ModManual, "mod_manual", 0x14, 0, 127),
    ControlSpec::new(Control::ModLevel, "mod_level", 0x15, 0, 127),
    ControlSpec::new(Control::ModSpeed, "mod_speed", 0x16, 0, 127),
    ControlSpec::new(Control::DelayType, "delay_type", 0x17, 0, 3),
    ControlSpec::new(Control::DelayFeedback, "delay_feedback", 0x18, 0, 31),
    ControlSpec::new(Control::DelayLevel, "delay_level", 0x1A, 0, 127),
    ControlSpec::new(Control::DelayTime, "delay_time", 0x1B, 100, 2000),
    ControlSpec::new(Control::DelayTimeCoarse, "delay_time_coarse", 0x1C, 0, 7),
    ControlSpec::new(Control::ReverbType, "reverb_type", 0x1D, 0, 3),
    ControlSpec::new(Control::ReverbSize, "reverb_size", 0x1E, 0, 31),
    ControlSpec::new(Control::ReverbLevel, "reverb_level", 0x20, 0, 127),
    ControlSpec::new(Control::FxFocus, "fx_focus", 0x24, 1, 3),
];

impl Control {
    /// All controls in protocol byte order
    pub const ALL: [Control; 29] = [
        Control::Voice,
        Control::Gain,
        Control::Volume,
        Control::Bass,
        Control::Middle,
        Control::Treble,
        Control::Isf,
        Control::TvpValve,
        Control::Resonance,
        Control::Presence,
        Control::MasterVolume,
        Control::TvpSwitch,
        Control::ModSwitch,
        Control::DelaySwitch,
        Control::ReverbSwitch,
        Control::ModType,
        Control::ModSegval,
        Control::ModManual,
        Control::ModLevel,
        Control::ModSpeed,
        Control::DelayType,
        Control::DelayFeedback,
        Control::DelayLevel,
        Control::DelayTime,
        Control::DelayTimeCoarse,
        Control::ReverbType,
        Control::ReverbSize,
        Control::ReverbLevel,
        Control::FxFocus,
    ];

    /// Registry entry for this control
    pub fn spec(self) -> &'static ControlSpec {
        ControlRegistry::global().spec(self)
    }

    /// Snake-case name used on the command line and in settings maps
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Wire byte identifying this control
    pub fn protocol_id(self) -> u8 {
        self.spec().protocol_id
    }

    /// Inclusive value range
    pub fn range(self) -> (u16, u16) {
        self.spec().range()
    }

    /// Whether the control only ever appears as half of another value
    pub fn is_wire_only(self) -> bool {
        self == Control::DelayTimeCoarse
    }

    /// Human-readable label for an enumerated value, if the control has one
    pub fn value_label(self, value: u16) -> Option<&'static str> {
        let labels: &[&str] = match self {
            Control::Voice => &VOICE_LABELS,
            Control::TvpValve => &TVP_VALVE_LABELS,
            Control::ModType => &MOD_TYPE_LABELS,
            Control::DelayType => &DELAY_TYPE_LABELS,
            Control::ReverbType => &REVERB_TYPE_LABELS,
            Control::FxFocus => return FX_FOCUS_LABELS.get(usize::from(value).checked_sub(1)?).copied(),
            Control::TvpSwitch | Control::ModSwitch | Control::DelaySwitch | Control::ReverbSwitch => {
                &["Off", "On"]
            }
            _ => return None,
        };
        labels.get(usize::from(value)).copied()
    }
}

const VOICE_LABELS: [&str; 6] = [
    "Clean Warm",
    "Clean Bright",
    "Crunch",
    "Super Crunch",
    "OD 1",
    "OD 2",
];
const TVP_VALVE_LABELS: [&str; 6] = ["EL84", "6V6", "KT66", "6L6", "EL34", "KT88"];
const MOD_TYPE_LABELS: [&str; 4] = ["Phaser", "Flanger", "Chorus", "Tremolo"];
const DELAY_TYPE_LABELS: [&str; 4] = ["Linear", "Analogue", "Tape", "Multi"];
const REVERB_TYPE_LABELS: [&str; 4] = ["Room", "Hall", "Spring", "Plate"];
const FX_FOCUS_LABELS: [&str; 3] = ["Modulation", "Delay", "Reverb"];

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Control {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlRegistry::global()
            .lookup_by_name(s)
            .map(|spec| spec.control)
    }
}

/// Two-way lookup between control names, controls and protocol bytes
#[derive(Debug)]
pub struct ControlRegistry {
    specs: HashMap<Control, &'static ControlSpec>,
    by_name: HashMap<&'static str, &'static ControlSpec>,
    by_id: HashMap<u8, &'static ControlSpec>,
}

/// Reasons a control table cannot form a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryConflict {
    DuplicateControl(Control),
    DuplicateName(&'static str),
    DuplicateProtocolId(u8),
    MissingControl(Control),
}

impl ControlRegistry {
    /// Build a registry from a table, rejecting any ambiguity
    pub fn from_table(table: &'static [ControlSpec]) -> Result<Self, RegistryConflict> {
        let mut specs = HashMap::with_capacity(table.len());
        let mut by_name = HashMap::with_capacity(table.len());
        let mut by_id = HashMap::with_capacity(table.len());

        for spec in table {
            if specs.insert(spec.control, spec).is_some() {
                return Err(RegistryConflict::DuplicateControl(spec.control));
            }
            if by_name.insert(spec.name, spec).is_some() {
                return Err(RegistryConflict::DuplicateName(spec.name));
            }
            if by_id.insert(spec.protocol_id, spec).is_some() {
                return Err(RegistryConflict::DuplicateProtocolId(spec.protocol_id));
            }
        }

        if let Some(missing) = Control::ALL.iter().find(|c| !specs.contains_key(*c)) {
            return Err(RegistryConflict::MissingControl(*missing));
        }

        Ok(Self {
            specs,
            by_name,
            by_id,
        })
    }

    /// The registry for the built-in control table
    pub fn global() -> &'static ControlRegistry {
        static REGISTRY: OnceLock<ControlRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| match ControlRegistry::from_table(CONTROL_TABLE) {
            Ok(registry) => registry,
            Err(conflict) => panic!("built-in control table is inconsistent: {:?}", conflict),
        })
    }

    fn spec(&self, control: Control) -> &'static ControlSpec {
        // from_table guarantees every Control has an entry
        self.specs[&control]
    }

    /// Look a control up by its snake-case name
    pub fn lookup_by_name(&self, name: &str) -> Result<&'static ControlSpec, ValidationError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ValidationError::UnknownControl(name.to_string()))
    }

    /// Look a control up by its wire byte
    ///
    /// `packet` is only used to populate the error for diagnostics.
    pub fn lookup_by_id(&self, protocol_id: u8, packet: &[u8]) -> Result<Control, ProtocolError> {
        self.by_id
            .get(&protocol_id)
            .map(|spec| spec.control)
            .ok_or_else(|| ProtocolError::UnrecognizedControlId {
                id: protocol_id,
                bytes: packet.to_vec(),
            })
    }

    /// Check a value against the control's range
    pub fn validate(&self, control: Control, value: i32) -> Result<u16, ValidationError> {
        let spec = self.spec(control);
        if !spec.contains(value) {
            return Err(ValidationError::ValueOutOfRange {
                control,
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        // Range bounds fit in u16, so the checked value does too
        Ok(value as u16)
    }

    /// Check a value against a control given by name
    pub fn validate_name(&self, name: &str, value: i32) -> Result<(Control, u16), ValidationError> {
        let spec = self.lookup_by_name(name)?;
        let value = self.validate(spec.control, value)?;
        Ok((spec.control, value))
    }

    /// Table entries in protocol byte order
    pub fn iter(&self) -> impl Iterator<Item = &'static ControlSpec> + '_ {
        Control::ALL.iter().map(move |c| self.spec(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_bijective() {
        let registry = ControlRegistry::global();
        for control in Control::ALL {
            let spec = control.spec();
            assert_eq!(registry.lookup_by_name(spec.name).unwrap().control, control);
            assert_eq!(registry.lookup_by_id(spec.protocol_id, &[]).unwrap(), control);
        }
    }

    #[test]
    fn test_duplicate_protocol_id_rejected() {
        static TABLE: &[ControlSpec] = &[
            ControlSpec::new(Control::Voice, "voice", 0x01, 0, 5),
            ControlSpec::new(Control::Gain, "gain", 0x01, 0, 127),
        ];
        assert_eq!(
            ControlRegistry::from_table(TABLE).unwrap_err(),
            RegistryConflict::DuplicateProtocolId(0x01)
        );
    }

    #[test]
    fn test_incomplete_table_rejected() {
        static TABLE: &[ControlSpec] = &[ControlSpec::new(Control::Voice, "voice", 0x01, 0, 5)];
        assert_eq!(
            ControlRegistry::from_table(TABLE).unwrap_err(),
            RegistryConflict::MissingControl(Control::Gain)
        );
    }

    #[test]
    fn test_unknown_name() {
        let err = "warp_drive".parse::<Control>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownControl("warp_drive".into()));
    }

    #[test]
    fn test_unknown_id_keeps_packet() {
        let err = ControlRegistry::global()
            .lookup_by_id(0x09, &[0x03, 0x09])
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnrecognizedControlId {
                id: 0x09,
                bytes: vec![0x03, 0x09]
            }
        );
    }

    #[test]
    fn test_validate_bounds() {
        let registry = ControlRegistry::global();
        assert_eq!(registry.validate(Control::DelayTime, 100), Ok(100));
        assert_eq!(registry.validate(Control::DelayTime, 2000), Ok(2000));
        assert!(registry.validate(Control::DelayTime, 99).is_err());
        assert!(registry.validate(Control::FxFocus, 0).is_err());
        assert!(registry.validate(Control::Gain, -1).is_err());
        assert_eq!(
            registry.validate_name("fx_focus", 3),
            Ok((Control::FxFocus, 3))
        );
    }

    #[test]
    fn test_value_labels() {
        assert_eq!(Control::Voice.value_label(2), Some("Crunch"));
        assert_eq!(Control::TvpValve.value_label(5), Some("KT88"));
        assert_eq!(Control::FxFocus.value_label(1), Some("Modulation"));
        assert_eq!(Control::FxFocus.value_label(0), None);
        assert_eq!(Control::Gain.value_label(10), None);
    }

    #[test]
    fn test_display_uses_wire_name() {
        assert_eq!(Control::MasterVolume.to_string(), "master_volume");
        assert_eq!(Control::DelayTimeCoarse.protocol_id(), 0x1C);
    }
}
