//! Resolved button mappings
//!
//! [`parse_mapping`] turns a merged [`PedalConfig`] into the structures the
//! daemon works with: one ordered list of [`KeyCombo`]s per [`Button`] and a
//! polling interval. Every key name is resolved here so that nothing
//! downstream deals with strings.

use std::fmt;
use std::time::Duration;

use evdev::{AttributeSet, Key};

use crate::error::ConfigError;
use crate::keys::resolve_key;
use crate::model::{ComboSpec, PedalConfig};

/// The three pedal buttons, in the order their state bytes appear in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Middle,
    Right,
}

impl Button {
    /// All buttons in report order
    pub const ALL: [Button; 3] = [Button::Left, Button::Middle, Button::Right];

    /// Position of this button in per-button arrays
    pub fn index(self) -> usize {
        match self {
            Button::Left => 0,
            Button::Middle => 1,
            Button::Right => 2,
        }
    }

    /// Name of the configuration field holding this button's combos
    pub fn config_key(self) -> &'static str {
        match self {
            Button::Left => "left_keys",
            Button::Middle => "middle_keys",
            Button::Right => "right_keys",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Button::Left => write!(f, "LEFT"),
            Button::Middle => write!(f, "MIDDLE"),
            Button::Right => write!(f, "RIGHT"),
        }
    }
}

/// A chord: modifiers held for the duration of the primary keys.
///
/// Both lists keep configuration order and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    mods: Vec<Key>,
    keys: Vec<Key>,
}

impl KeyCombo {
    pub fn new(mods: Vec<Key>, keys: Vec<Key>) -> Self {
        Self { mods, keys }
    }

    pub fn mods(&self) -> &[Key] {
        &self.mods
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .mods
            .iter()
            .chain(self.keys.iter())
            .map(|key| format!("{:?}", key))
            .collect();
        write!(f, "{}", parts.join("+"))
    }
}

/// Combos for each button, fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonMapping {
    combos: [Vec<KeyCombo>; 3],
}

impl ButtonMapping {
    pub fn new(left: Vec<KeyCombo>, middle: Vec<KeyCombo>, right: Vec<KeyCombo>) -> Self {
        Self {
            combos: [left, middle, right],
        }
    }

    /// The ordered combos bound to `button`
    pub fn combos(&self, button: Button) -> &[KeyCombo] {
        &self.combos[button.index()]
    }

    /// Every key referenced anywhere in the mapping.
    ///
    /// This is the capability set the virtual keyboard must register.
    pub fn capabilities(&self) -> AttributeSet<Key> {
        let mut keys = AttributeSet::<Key>::new();
        for combo in self.combos.iter().flatten() {
            for key in combo.mods().iter().chain(combo.keys()) {
                keys.insert(*key);
            }
        }
        keys
    }

    /// True if no button has a single key bound
    pub fn is_empty(&self) -> bool {
        self.combos
            .iter()
            .flatten()
            .all(|combo| combo.mods().is_empty() && combo.keys().is_empty())
    }
}

/// Fully parsed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperSettings {
    pub mapping: ButtonMapping,
    pub polling_rate: Duration,
}

/// Resolve a merged configuration into a [`ButtonMapping`] and polling rate.
///
/// Missing button lists map to no combos. Fails on the first key name that
/// cannot be resolved, or on a zero polling rate.
pub fn parse_mapping(config: &PedalConfig) -> Result<MapperSettings, ConfigError> {
    let polling_rate = config.polling_rate_ms();
    if polling_rate == 0 {
        return Err(ConfigError::Invalid {
            message: "polling_rate must be a positive number of milliseconds".to_string(),
        });
    }

    let mapping = ButtonMapping::new(
        resolve_combos(Button::Left, config.left_keys.as_deref())?,
        resolve_combos(Button::Middle, config.middle_keys.as_deref())?,
        resolve_combos(Button::Right, config.right_keys.as_deref())?,
    );

    Ok(MapperSettings {
        mapping,
        polling_rate: Duration::from_millis(polling_rate),
    })
}

fn resolve_combos(button: Button, specs: Option<&[ComboSpec]>) -> Result<Vec<KeyCombo>, ConfigError> {
    specs
        .unwrap_or_default()
        .iter()
        .map(|spec| {
            Ok(KeyCombo::new(
                resolve_names(button, &spec.mods)?,
                resolve_names(button, &spec.keys)?,
            ))
        })
        .collect()
}

fn resolve_names(button: Button, names: &[String]) -> Result<Vec<Key>, ConfigError> {
    names
        .iter()
        .map(|name| {
            resolve_key(name).ok_or_else(|| ConfigError::UnresolvedKeySymbol {
                symbol: name.clone(),
                button,
            })
        })
        .collect()
}
