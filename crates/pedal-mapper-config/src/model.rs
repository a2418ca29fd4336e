//! Configuration data model

use std::collections::BTreeMap;

use serde::Deserialize;

/// Polling rate used when no layer sets `polling_rate`, in milliseconds
pub const DEFAULT_POLLING_RATE_MS: u64 = 10;

/// One configuration layer as written in a JSON file.
///
/// Every field is optional so that a user layer can override only what it
/// names. See [`PedalConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PedalConfig {
    #[serde(default)]
    pub left_keys: Option<Vec<ComboSpec>>,
    #[serde(default)]
    pub middle_keys: Option<Vec<ComboSpec>>,
    #[serde(default)]
    pub right_keys: Option<Vec<ComboSpec>>,
    /// Device read timeout in milliseconds
    #[serde(default)]
    pub polling_rate: Option<u64>,
    /// Top-level keys this version does not know about
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

/// A key combination as written in the configuration, before key names are
/// resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ComboSpec {
    /// Modifiers held for the whole combination
    #[serde(default)]
    pub mods: Vec<String>,
    /// Keys pressed while the modifiers are held
    pub keys: Vec<String>,
}

impl PedalConfig {
    /// Layer `overlay` on top of `self`.
    ///
    /// This is a shallow merge: any top-level field set in `overlay` replaces
    /// the corresponding field of `self` entirely; lists are never combined.
    pub fn merge(self, overlay: PedalConfig) -> PedalConfig {
        let mut unknown = self.unknown;
        unknown.extend(overlay.unknown);

        PedalConfig {
            left_keys: overlay.left_keys.or(self.left_keys),
            middle_keys: overlay.middle_keys.or(self.middle_keys),
            right_keys: overlay.right_keys.or(self.right_keys),
            polling_rate: overlay.polling_rate.or(self.polling_rate),
            unknown,
        }
    }

    /// Effective polling rate in milliseconds
    pub fn polling_rate_ms(&self) -> u64 {
        self.polling_rate.unwrap_or(DEFAULT_POLLING_RATE_MS)
    }
}
