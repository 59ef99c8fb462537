//! Multi-packet reassembly
//!
//! Turning the delay time knob makes the amplifier send the value in two
//! halves: a single-byte `delay_time` packet carrying the low ("fine") byte,
//! and later the high ("coarse") byte. The coarse byte usually arrives in the
//! second position of a `delay_type` pair, occasionally in its own `0x1C`
//! packet. Other control packets may arrive in between.
//!
//! [`Reassembler`] holds the pending fine byte and joins the halves back into
//! one `delay_time` update. It also swallows the startup handshake replies
//! that carry nothing the host can use.
//!
//! A reassembler must be fed by exactly one decode loop.

use tracing::{debug, warn};

use crate::control::Control;
use crate::event::{DecodedEvent, UnhandledKind};
use crate::packet::Packet;
use crate::preset::Preset;
use crate::settings::SettingsMap;
use crate::tuner::TunerReading;

/// Delay time reassembly state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReassemblyState {
    /// Nothing pending
    #[default]
    Idle,
    /// A fine byte arrived and is waiting for its coarse byte
    AwaitingCoarse { fine: u8 },
}

/// A complete update ready for the application
#[derive(Debug, Clone, PartialEq)]
pub enum AmpUpdate {
    /// Some controls changed
    Settings(SettingsMap),
    /// Full amplifier state, sent in reply to the startup request
    Snapshot(SettingsMap),
    /// Name stored in a preset slot
    PresetName { number: u8, name: String },
    /// Full contents of a preset slot
    PresetSettings(Box<Preset>),
    /// Amplifier switched to a preset
    PresetSelected(u8),
    /// Manual mode toggled
    ManualMode(bool),
    /// Tuner mode toggled
    TunerMode(bool),
    /// Tuner reading
    Tuner(TunerReading),
    /// Packet the decoder did not interpret
    Unhandled { kind: UnhandledKind, packet: Packet },
}

impl AmpUpdate {
    /// Control values carried by this update
    pub fn settings(&self) -> Option<&SettingsMap> {
        match self {
            Self::Settings(map) | Self::Snapshot(map) => Some(map),
            _ => None,
        }
    }
}

/// Joins split delay time packets into complete updates
#[derive(Debug, Default)]
pub struct Reassembler {
    state: ReassemblyState,
}

impl Reassembler {
    /// Create a reassembler in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Drop any pending fine byte
    ///
    /// Call when the connection is lost or restarted.
    pub fn reset(&mut self) {
        if let ReassemblyState::AwaitingCoarse { fine } = self.state {
            debug!("Discarding pending delay time fine byte {}", fine);
        }
        self.state = ReassemblyState::Idle;
    }

    /// Consume one decoded event
    ///
    /// Returns the update to publish, or `None` while a value is incomplete
    /// or the event carries nothing for the application.
    pub fn feed(&mut self, event: DecodedEvent) -> Option<AmpUpdate> {
        match (self.state, event) {
            (state, DecodedEvent::DelayTimeFine(fine)) => {
                if let ReassemblyState::AwaitingCoarse { fine: previous } = state {
                    warn!(
                        "Delay time fine byte {} replaced by {} before its coarse byte arrived",
                        previous, fine
                    );
                }
                self.state = ReassemblyState::AwaitingCoarse { fine };
                None
            }
            (ReassemblyState::AwaitingCoarse { fine }, DecodedEvent::DelayTimeCoarse(coarse)) => {
                self.state = ReassemblyState::Idle;
                let value = combine(coarse, fine)?;
                Some(AmpUpdate::Settings(SettingsMap::from([(
                    Control::DelayTime,
                    value,
                )])))
            }
            (ReassemblyState::Idle, DecodedEvent::DelayTimeCoarse(coarse)) => {
                warn!("Dropping delay time coarse byte {} with no fine byte pending", coarse);
                None
            }
            (ReassemblyState::AwaitingCoarse { fine }, event) => match event.delay_pair_second() {
                Some(coarse) => {
                    self.state = ReassemblyState::Idle;
                    let mut settings = event.settings().unwrap_or_default();
                    if let Some(value) = combine(coarse, fine) {
                        settings.insert(Control::DelayTime, value);
                    }
                    Some(AmpUpdate::Settings(settings))
                }
                None => {
                    // A complete delay time supersedes the pending half
                    if event
                        .settings()
                        .is_some_and(|settings| settings.contains(Control::DelayTime))
                    {
                        debug!("Complete delay time received, discarding fine byte {}", fine);
                        self.state = ReassemblyState::Idle;
                    }
                    forward(event)
                }
            },
            (ReassemblyState::Idle, event) => forward(event),
        }
    }
}

/// Join the halves, rejecting values the amplifier cannot hold
fn combine(coarse: u8, fine: u8) -> Option<u16> {
    let value = u16::from_be_bytes([coarse, fine]);
    let (min, max) = Control::DelayTime.range();
    if !(min..=max).contains(&value) {
        warn!(
            "Dropping reassembled delay time {} (coarse {}, fine {}): outside {}..={}",
            value, coarse, fine, min, max
        );
        return None;
    }
    debug!("Delay time reassembled: {} ms", value);
    Some(value)
}

fn forward(event: DecodedEvent) -> Option<AmpUpdate> {
    let update = match event {
        DecodedEvent::Control(change) => {
            AmpUpdate::Settings(SettingsMap::from([(change.control, change.value)]))
        }
        DecodedEvent::Paired { first, second } => AmpUpdate::Settings(SettingsMap::from([
            (first.control, first.value),
            (second.control, second.value),
        ])),
        DecodedEvent::Snapshot(settings) => AmpUpdate::Snapshot(settings),
        DecodedEvent::PresetName { number, name } => AmpUpdate::PresetName { number, name },
        DecodedEvent::PresetSettings(preset) => AmpUpdate::PresetSettings(preset),
        DecodedEvent::PresetSelected(number) => AmpUpdate::PresetSelected(number),
        DecodedEvent::ManualModeChanged(on) => AmpUpdate::ManualMode(on != 0),
        DecodedEvent::TunerModeChanged(on) => AmpUpdate::TunerMode(on != 0),
        DecodedEvent::TunerReading(reading) => AmpUpdate::Tuner(reading),
        DecodedEvent::Unhandled {
            kind: UnhandledKind::StartupReply | UnhandledKind::StatusReply,
            ..
        } => {
            debug!("Startup reply absorbed");
            return None;
        }
        DecodedEvent::Unhandled { kind, packet } => AmpUpdate::Unhandled { kind, packet },
        // Both halves are handled by the state machine
        DecodedEvent::DelayTimeFine(_) | DecodedEvent::DelayTimeCoarse(_) => return None,
    };
    Some(update)
}
