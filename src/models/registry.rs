// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Static fixture registry: name correction and capability inference.
//!
//! Two tables drive dialect/capability inference from an advertised BLE
//! name. [`NEW_LIGHT_NAMES`] is scanned forward (first match wins);
//! [`MASTER_LIGHT_SPECS`] is scanned in **reverse** so that later, more
//! specific entries win over earlier general ones — this ordering is load
//! bearing and must not be "cleaned up" into a sorted table.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Command dialect a fixture speaks. `Infinity` addresses frames to the
/// fixture's hardware MAC and wraps scene/HSI changes in a power envelope;
/// `InfinityLite` shares the Infinity wire protocol but not its full
/// behavior (no envelope wrapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Classic,
    Infinity,
    InfinityLite,
}

impl Dialect {
    fn from_infinity_mode(mode: u8) -> Self {
        match mode {
            1 => Dialect::Infinity,
            2 => Dialect::InfinityLite,
            _ => Dialect::Classic,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Classic => "classic",
            Dialect::Infinity => "infinity",
            Dialect::InfinityLite => "infinity-lite",
        })
    }
}

/// Capability record derived for a fixture from [`MASTER_LIGHT_SPECS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub cct_min: u16,
    pub cct_max: u16,
    pub cct_only: bool,
    pub dialect: Dialect,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities { cct_min: 3200, cct_max: 5600, cct_only: false, dialect: Dialect::Classic }
    }
}

/// `(needle, corrected name)`, forward-scanned, first substring match wins.
pub const NEW_LIGHT_NAMES: &[(&str, &str)] = &[
    ("20200015", "RGB1"),
    ("20200037", "SL90"),
    ("20200049", "RGB1200"),
    ("20210006", "Apollo 150D"),
    ("20210007", "RGB C80"),
    ("20210012", "CB60 RGB"),
    ("20210018", "BH-30S RGB"),
    ("20210034", "MS60B"),
    ("20210035", "MS60C"),
    ("20210036", "TL60 RGB"),
    ("20210037", "CB200B"),
    ("20220014", "CB60B"),
    ("20220016", "PL60C"),
    ("20220035", "MS150B"),
    ("20220041", "AS600B"),
    ("20220043", "FS150B"),
    ("20220046", "RP19C"),
    ("20220051", "CB100C"),
    ("20220055", "CB300B"),
    ("20220057", "SL90 Pro"),
    ("20230021", "BH-30S RGB"),
    ("20230022", "HS60B"),
    ("20230025", "RGB1200"),
    ("20230031", "TL120C"),
    ("20230050", "FS230 5600K"),
    ("20230051", "FS230B"),
    ("20230052", "FS150 5600K"),
    ("20230064", "TL60 RGB"),
    ("20230080", "MS60C"),
    ("20230092", "RGB1200"),
    ("20230108", "HB80C"),
];

/// `(needle, cct_min, cct_max, cct_only, infinity_mode)`, **reverse**-scanned
/// against the corrected name (substring containment). Default when nothing
/// matches: `cct_min=3200, cct_max=5600, cct_only=false, dialect=Classic`.
pub const MASTER_LIGHT_SPECS: &[(&str, u16, u16, bool, u8)] = &[
    ("Apollo", 5600, 5600, true, 0),
    ("BH-30S RGB", 2500, 10000, false, 1),
    ("CB60 RGB", 2500, 6500, false, 1),
    ("CL124", 2500, 10000, false, 2),
    ("GL1", 2900, 7000, true, 0),
    ("GL1C", 2900, 7000, false, 1),
    ("HB80C", 2500, 7500, false, 1),
    ("MS60B", 2700, 6500, true, 1),
    ("NL140", 3200, 5600, true, 0),
    ("RGB C80", 2500, 10000, false, 1),
    ("RGB CB60", 2500, 10000, false, 1),
    ("RGB1", 3200, 5600, false, 1),
    ("RGB1000", 2500, 10000, false, 1),
    ("RGB1200", 2500, 10000, false, 1),
    ("RGB140", 2500, 10000, false, 1),
    ("RGB168", 2500, 8500, false, 2),
    ("RGB176", 3200, 5600, false, 0),
    ("RGB176 A1", 2500, 10000, false, 0),
    ("RGB18", 3200, 5600, false, 0),
    ("RGB190", 3200, 5600, false, 0),
    ("RGB450", 3200, 5600, false, 0),
    ("RGB480", 3200, 5600, false, 0),
    ("RGB512", 2500, 10000, false, 1),
    ("RGB530", 3200, 5600, false, 0),
    ("RGB530PRO", 3200, 5600, false, 0),
    ("RGB650", 3200, 5600, false, 0),
    ("RGB660", 3200, 5600, false, 0),
    ("RGB660PRO", 3200, 5600, false, 0),
    ("RGB800", 2500, 10000, false, 1),
    ("RGB960", 3200, 5600, false, 0),
    ("RGB-P200", 3200, 5600, false, 0),
    ("RGB-P280", 3200, 5600, false, 0),
    ("SL70", 3200, 8500, false, 0),
    ("SL80", 3200, 8500, false, 0),
    ("SL90", 2500, 10000, false, 1),
    ("SL90 Pro", 2500, 10000, false, 1),
    ("SNL1320", 3200, 5600, true, 0),
    ("SNL1920", 3200, 5600, true, 0),
    ("SNL480", 3200, 5600, true, 0),
    ("SNL530", 3200, 5600, true, 0),
    ("SNL660", 3200, 5600, true, 0),
    ("SNL960", 3200, 5600, true, 0),
    ("SRP16", 3200, 5600, true, 0),
    ("SRP18", 3200, 5600, true, 0),
    ("TL60", 2500, 10000, false, 1),
    ("WRP18", 3200, 5600, true, 0),
    ("ZK-RY", 5600, 5600, false, 0),
    ("ZRP16", 3200, 5600, true, 0),
];

/// Advertised-name prefixes that identify a Neewer fixture.
const ACCEPTED_NAME_PREFIXES: &[&str] = &["NEEWER", "NW-", "SL", "NWR"];

/// True when `name` begins with one of [`ACCEPTED_NAME_PREFIXES`]
/// (case-insensitive).
pub fn is_neewer_device(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let upper = name.to_ascii_uppercase();
    ACCEPTED_NAME_PREFIXES.iter().any(|prefix| upper.starts_with(prefix))
}

/// Applies [`NEW_LIGHT_NAMES`], returning `light_name` unchanged if nothing
/// matches.
pub fn correct_name(light_name: &str) -> String {
    for (needle, corrected) in NEW_LIGHT_NAMES {
        if light_name.contains(needle) {
            return (*corrected).to_string();
        }
    }
    light_name.to_string()
}

/// Applies [`MASTER_LIGHT_SPECS`] in reverse declaration order.
pub fn lookup_capabilities(corrected_name: &str) -> Capabilities {
    for (needle, cct_min, cct_max, cct_only, infinity_mode) in MASTER_LIGHT_SPECS.iter().rev() {
        if corrected_name.contains(needle) {
            return Capabilities {
                cct_min: *cct_min,
                cct_max: *cct_max,
                cct_only: *cct_only,
                dialect: Dialect::from_infinity_mode(*infinity_mode),
            };
        }
    }
    Capabilities::default()
}

/// Whether a fixture's capability record allows extended scene payloads.
/// Classic fixtures only ever take the short scene form; Infinity and
/// InfinityLite frames accommodate the richer per-effect schema.
pub fn supports_extended_scene(caps: &Capabilities) -> bool {
    !caps.cct_only && !matches!(caps.dialect, Dialect::Classic)
}

/// Name prefixes whose models are known to answer the status-query notify
/// protocol.
const STATUS_QUERY_SUPPORTED_PREFIXES: &[&str] =
    &["SL", "SNL", "RGB", "GL", "NL", "SRP", "WRP", "ZRP", "CL124", "ZK-RY", "TL60"];

/// Name prefixes whose models are known *not* to answer it.
const STATUS_QUERY_UNSUPPORTED_PREFIXES: &[&str] =
    &["FS", "CB", "MS", "AS", "APOLLO", "HB", "HS", "TL120", "PL"];

/// Prefix-based heuristic over the corrected model name, used when a
/// fixture's `supports_status_query` override is not configured. Neither
/// list matching defaults to unsupported.
pub fn supports_status_query(corrected_name: &str) -> bool {
    let upper = corrected_name.to_ascii_uppercase();
    if STATUS_QUERY_SUPPORTED_PREFIXES.iter().any(|p| upper.starts_with(p)) {
        return true;
    }
    if STATUS_QUERY_UNSUPPORTED_PREFIXES.iter().any(|p| upper.starts_with(p)) {
        return false;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_name_matches_forward_first_hit() {
        assert_eq!(correct_name("NEEWER-20210006-ABCD"), "Apollo 150D");
    }

    #[test]
    fn test_correct_name_passthrough_when_unmatched() {
        assert_eq!(correct_name("NEEWER-SomeOtherLight"), "NEEWER-SomeOtherLight");
    }

    #[test]
    fn test_lookup_capabilities_apollo_is_fixed_cct() {
        let caps = lookup_capabilities("Apollo 150D");
        assert_eq!(caps.cct_min, 5600);
        assert_eq!(caps.cct_max, 5600);
        assert!(caps.cct_only);
        assert_eq!(caps.dialect, Dialect::Classic);
    }

    #[test]
    fn test_lookup_capabilities_reverse_scan_prefers_more_specific_entry() {
        // "RGB176 A1" must win over the earlier, shorter "RGB176" entry
        // because the table is scanned in reverse.
        let caps = lookup_capabilities("NEEWER RGB176 A1");
        assert_eq!(caps.cct_min, 2500);
        assert_eq!(caps.cct_max, 10000);
    }

    #[test]
    fn test_lookup_capabilities_default_for_unknown_model() {
        let caps = lookup_capabilities("Totally Unknown Fixture");
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn test_is_neewer_device_prefix_match_only() {
        assert!(is_neewer_device("NEEWER-RGB1"));
        assert!(is_neewer_device("sl90"));
        // Substring-anywhere (not prefix) must NOT match.
        assert!(!is_neewer_device("Some NEEWER Light"));
        assert!(!is_neewer_device(""));
    }
}
