//! Control values keyed by control

use std::collections::btree_map::{self, BTreeMap};

use crate::control::Control;

/// A set of control values, ordered by control
///
/// Used both for partial updates (one or two controls) and for complete
/// snapshots of the amplifier state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SettingsMap(BTreeMap<Control, u16>);

impl SettingsMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Value of a control, if present
    pub fn get(&self, control: Control) -> Option<u16> {
        self.0.get(&control).copied()
    }

    /// Set a control's value, returning the previous one
    pub fn insert(&mut self, control: Control, value: u16) -> Option<u16> {
        self.0.insert(control, value)
    }

    /// Remove a control
    pub fn remove(&mut self, control: Control) -> Option<u16> {
        self.0.remove(&control)
    }

    /// Whether a control is present
    pub fn contains(&self, control: Control) -> bool {
        self.0.contains_key(&control)
    }

    /// Copy every entry of `other` into this map, overwriting duplicates
    pub fn merge(&mut self, other: &SettingsMap) {
        self.0.extend(other.iter());
    }

    /// Number of controls present
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in control order
    pub fn iter(&self) -> impl Iterator<Item = (Control, u16)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }

    /// Whether every settable control is present
    ///
    /// `delay_time_coarse` is never part of a complete map; it is folded
    /// into `delay_time`.
    pub fn is_complete(&self) -> bool {
        Control::ALL
            .iter()
            .all(|c| c.is_wire_only() != self.contains(*c))
    }
}

impl FromIterator<(Control, u16)> for SettingsMap {
    fn from_iter<I: IntoIterator<Item = (Control, u16)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(Control, u16); N]> for SettingsMap {
    fn from(entries: [(Control, u16); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for SettingsMap {
    type Item = (Control, u16);
    type IntoIter = btree_map::IntoIter<Control, u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
