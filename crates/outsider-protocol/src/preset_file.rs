//! Exported preset files
//!
//! The amplifier's companion software exports presets as small XML
//! documents. Every value is stored as a decimal attribute:
//!
//! ```xml
//! <Preset>
//!   <Amplifier voice="2" gain="80" volume="64" bass="64" middle="64" treble="64"
//!              isf="64" tvp_valve="4" tvp_switch="1" resonance="64" presence="64"
//!              master_volume="100"/>
//!   <EffectsChain focus="2">
//!     <Modulation switch="0" type="1" segval="10" manual="64" level="64" speed="32"/>
//!     <Delay switch="1" type="2" feedback="12" level="70" time="450"/>
//!     <Reverb switch="1" type="3" size="8" level="40"/>
//!   </EffectsChain>
//!   <Info number="5" name="Lead" creator="me" genre="Rock" tags="lead,solo" about=""/>
//!   <Tuner enabled="0"/>
//!   <Bench enabled="0"/>
//!   <Audio>
//!     <Metronome enabled="0" tempo="120" volume="64"/>
//!     <Track name="" enabled="0" volume="64"/>
//!   </Audio>
//! </Preset>
//! ```
//!
//! `Amplifier`, `EffectsChain` and its three effect nodes are required.
//! The remaining nodes fall back to defaults when absent.

use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::codec::{PRESET_MAX, PRESET_MIN};
use crate::control::{Control, ControlRegistry};
use crate::error::PresetFileError;
use crate::preset::{
    AmplifierSection, DelaySection, Metronome, ModulationSection, Preset, PresetInfo,
    ReverbSection, Track,
};

/// Width of each modulation type's window on the segmented selector
const MOD_SEGMENT_WIDTH: u8 = 0x20;

/// An element together with the name used in error messages
#[derive(Clone, Copy)]
struct Element<'a, 'input> {
    node: Node<'a, 'input>,
    name: &'static str,
}

impl<'a, 'input> Element<'a, 'input> {
    fn child(&self, name: &'static str) -> Option<Element<'a, 'input>> {
        self.node
            .children()
            .find(|n| n.is_element() && n.has_tag_name(name))
            .map(|node| Element { node, name })
    }

    fn required_child(&self, name: &'static str) -> Result<Element<'a, 'input>, PresetFileError> {
        self.child(name).ok_or(PresetFileError::MissingNode(name))
    }

    fn text(&self, attribute: &'static str) -> Result<&'a str, PresetFileError> {
        self.node
            .attribute(attribute)
            .ok_or(PresetFileError::MissingAttribute {
                node: self.name,
                attribute,
            })
    }

    fn invalid(&self, attribute: &'static str, value: &str) -> PresetFileError {
        PresetFileError::InvalidValue {
            node: self.name,
            attribute,
            value: value.to_string(),
        }
    }

    fn parse<T: FromStr>(&self, attribute: &'static str) -> Result<T, PresetFileError> {
        let text = self.text(attribute)?;
        text.trim().parse().map_err(|_| self.invalid(attribute, text))
    }

    /// Attribute holding a control value, checked against the control's range
    fn control(&self, attribute: &'static str, control: Control) -> Result<u16, PresetFileError> {
        let text = self.text(attribute)?;
        let value: i32 = text.trim().parse().map_err(|_| self.invalid(attribute, text))?;
        ControlRegistry::global()
            .validate(control, value)
            .map_err(|_| self.invalid(attribute, text))
    }

    /// Single byte control value
    fn control_byte(&self, attribute: &'static str, control: Control) -> Result<u8, PresetFileError> {
        let value = self.control(attribute, control)?;
        u8::try_from(value).map_err(|_| self.invalid(attribute, &value.to_string()))
    }

    /// `0`/`1` or `false`/`true`
    fn flag(&self, attribute: &'static str) -> Result<bool, PresetFileError> {
        let text = self.text(attribute)?;
        match text.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(self.invalid(attribute, text)),
        }
    }

    fn flag_or(&self, attribute: &'static str, default: bool) -> Result<bool, PresetFileError> {
        match self.node.attribute(attribute) {
            Some(_) => self.flag(attribute),
            None => Ok(default),
        }
    }

    fn parse_or<T: FromStr>(&self, attribute: &'static str, default: T) -> Result<T, PresetFileError> {
        match self.node.attribute(attribute) {
            Some(_) => self.parse(attribute),
            None => Ok(default),
        }
    }

    fn string_or_empty(&self, attribute: &'static str) -> String {
        self.node.attribute(attribute).unwrap_or_default().to_string()
    }
}

impl Preset {
    /// Parse an exported preset file
    ///
    /// Produces the same record as [`Preset::from_full_packet`] plus the
    /// descriptive metadata that only exists in exported files.
    pub fn from_exported_file(xml: &str) -> Result<Preset, PresetFileError> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        if !root.has_tag_name("Preset") {
            return Err(PresetFileError::MissingNode("Preset"));
        }
        let root = Element {
            node: root,
            name: "Preset",
        };

        let amplifier = read_amplifier(&root.required_child("Amplifier")?)?;

        let chain = root.required_child("EffectsChain")?;
        let fx_focus = chain.control_byte("focus", Control::FxFocus)?;
        let modulation = read_modulation(&chain.required_child("Modulation")?)?;
        let delay = read_delay(&chain.required_child("Delay")?)?;
        let reverb = read_reverb(&chain.required_child("Reverb")?)?;

        let (number, info) = match root.child("Info") {
            Some(info) => read_info(&info)?,
            None => (PRESET_MIN, PresetInfo::default()),
        };

        let tuner = match root.child("Tuner") {
            Some(node) => node.flag_or("enabled", false)?,
            None => false,
        };
        let bench = match root.child("Bench") {
            Some(node) => node.flag_or("enabled", false)?,
            None => false,
        };

        let audio = root.child("Audio");
        let metronome = match audio.and_then(|a| a.child("Metronome")) {
            Some(node) => read_metronome(&node)?,
            None => Metronome::default(),
        };
        let track = match audio.and_then(|a| a.child("Track")) {
            Some(node) => read_track(&node)?,
            None => Track::default(),
        };

        debug!("Parsed preset file for preset {}: {:?}", number, info.name);

        Ok(Preset {
            number,
            amplifier,
            modulation,
            delay,
            reverb,
            fx_focus,
            info,
            tuner,
            bench,
            metronome,
            track,
        })
    }
}

fn read_amplifier(node: &Element) -> Result<AmplifierSection, PresetFileError> {
    Ok(AmplifierSection {
        voice: node.control_byte("voice", Control::Voice)?,
        gain: node.control_byte("gain", Control::Gain)?,
        volume: node.control_byte("volume", Control::Volume)?,
        bass: node.control_byte("bass", Control::Bass)?,
        middle: node.control_byte("middle", Control::Middle)?,
        treble: node.control_byte("treble", Control::Treble)?,
        isf: node.control_byte("isf", Control::Isf)?,
        tvp_valve: node.control_byte("tvp_valve", Control::TvpValve)?,
        tvp_switch: node.control_byte("tvp_switch", Control::TvpSwitch)?,
        resonance: node.control_byte("resonance", Control::Resonance)?,
        presence: node.control_byte("presence", Control::Presence)?,
        master_volume: node.control_byte("master_volume", Control::MasterVolume)?,
    })
}

fn read_modulation(node: &Element) -> Result<ModulationSection, PresetFileError> {
    let kind = node.control_byte("type", Control::ModType)?;
    let segval = node.control_byte("segval", Control::ModSegval)?;
    let level = node.control_byte("level", Control::ModLevel)?;
    Ok(ModulationSection {
        switch: node.control_byte("switch", Control::ModSwitch)?,
        kind,
        segval,
        manual: node.control_byte("manual", Control::ModManual)?,
        level,
        level_mirror: level,
        speed: node.control_byte("speed", Control::ModSpeed)?,
        abspos: kind * MOD_SEGMENT_WIDTH + segval,
    })
}

fn read_delay(node: &Element) -> Result<DelaySection, PresetFileError> {
    Ok(DelaySection {
        switch: node.control_byte("switch", Control::DelaySwitch)?,
        kind: node.control_byte("type", Control::DelayType)?,
        feedback: node.control_byte("feedback", Control::DelayFeedback)?,
        level: node.control_byte("level", Control::DelayLevel)?,
        time: node.control("time", Control::DelayTime)?,
    })
}

fn read_reverb(node: &Element) -> Result<ReverbSection, PresetFileError> {
    Ok(ReverbSection {
        switch: node.control_byte("switch", Control::ReverbSwitch)?,
        kind: node.control_byte("type", Control::ReverbType)?,
        size: node.control_byte("size", Control::ReverbSize)?,
        level: node.control_byte("level", Control::ReverbLevel)?,
    })
}

fn read_info(node: &Element) -> Result<(u8, PresetInfo), PresetFileError> {
    let number: u8 = node.parse_or("number", PRESET_MIN)?;
    if !(PRESET_MIN..=PRESET_MAX).contains(&number) {
        return Err(node.invalid("number", &number.to_string()));
    }
    let tags = node
        .string_or_empty("tags")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    let info = PresetInfo {
        name: node.string_or_empty("name"),
        creator: node.string_or_empty("creator"),
        genre: node.string_or_empty("genre"),
        tags,
        about: node.string_or_empty("about"),
    };
    Ok((number, info))
}

fn read_metronome(node: &Element) -> Result<Metronome, PresetFileError> {
    let default = Metronome::default();
    Ok(Metronome {
        enabled: node.flag_or("enabled", default.enabled)?,
        tempo: node.parse_or("tempo", default.tempo)?,
        volume: node.parse_or("volume", default.volume)?,
    })
}

fn read_track(node: &Element) -> Result<Track, PresetFileError> {
    Ok(Track {
        name: node.string_or_empty("name"),
        enabled: node.flag_or("enabled", false)?,
        volume: node.parse_or("volume", 0)?,
    })
}
