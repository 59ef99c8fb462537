//! Human readable output

use std::fmt::Write;

use outsider_protocol::{AmpUpdate, Control, ControlRegistry, SettingsMap};

/// `name = value`, with the value's label when the control has one
pub fn format_value(control: Control, value: u16) -> String {
    match control.value_label(value) {
        Some(label) => format!("{} = {} ({})", control, value, label),
        None => format!("{} = {}", control, value),
    }
}

/// One line per control
pub fn format_settings(settings: &SettingsMap) -> String {
    settings
        .iter()
        .map(|(control, value)| format_value(control, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single line summary of an update
pub fn format_update(update: &AmpUpdate) -> String {
    match update {
        AmpUpdate::Settings(settings) => settings
            .iter()
            .map(|(control, value)| format_value(control, value))
            .collect::<Vec<_>>()
            .join(", "),
        AmpUpdate::Snapshot(settings) => {
            format!("Amplifier state:\n{}", indent(&format_settings(settings)))
        }
        AmpUpdate::PresetName { number, name } => format!("Preset {}: {}", number, name),
        AmpUpdate::PresetSettings(preset) => format!(
            "Preset {} contents:\n{}",
            preset.number,
            indent(&format_settings(&preset.settings()))
        ),
        AmpUpdate::PresetSelected(number) => format!("Preset {} selected", number),
        AmpUpdate::ManualMode(on) => format!("Manual mode {}", on_off(*on)),
        AmpUpdate::TunerMode(on) => format!("Tuner mode {}", on_off(*on)),
        AmpUpdate::Tuner(reading) => format!("Tuner: {}", reading),
        AmpUpdate::Unhandled { kind, packet } => {
            format!("Unhandled packet ({:?}):\n{}", kind, packet.hex_dump())
        }
    }
}

/// Registry table: name, wire ID, range and value labels
pub fn format_control_table() -> String {
    let mut out = format!("{:<18} {:>4}  {:<10} {}\n", "CONTROL", "ID", "RANGE", "VALUES");
    for spec in ControlRegistry::global().iter() {
        let labels: Vec<String> = (spec.min..=spec.max)
            .filter_map(|v| spec.control.value_label(v).map(|l| format!("{}={}", v, l)))
            .collect();
        let range = format!("{}-{}", spec.min, spec.max);
        let note = if spec.control.is_wire_only() {
            "(reported only)".to_string()
        } else {
            labels.join(", ")
        };
        let _ = writeln!(
            out,
            "{:<18} 0x{:02X}  {:<10} {}",
            spec.name, spec.protocol_id, range, note
        );
    }
    out
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
