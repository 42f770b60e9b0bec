// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::utils::canonicalize_address;

/// Top-level configuration document: lights, groups, presets, and CLI
/// defaults. Accepts either JSON or YAML (YAML is a structural superset, so
/// one parser covers both).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub lights: LightsSection,
    #[serde(default)]
    pub groups: HashMap<String, GroupMembers>,
    #[serde(default)]
    pub presets: HashMap<String, PresetConfig>,
    #[serde(default)]
    pub defaults: HashMap<String, ScalarValue>,
}

/// `lights` may be an object keyed by address, or an array of objects each
/// carrying its own `address` field.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum LightsSection {
    Map(HashMap<String, LightFields>),
    List(Vec<LightEntry>),
}

impl Default for LightsSection {
    fn default() -> Self {
        LightsSection::Map(HashMap::new())
    }
}

impl LightsSection {
    /// Normalizes either representation into `(address, fields)` pairs.
    pub fn entries(&self) -> Vec<(String, LightFields)> {
        match self {
            LightsSection::Map(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            LightsSection::List(l) => l.iter().map(|e| (e.address.clone(), e.fields.clone())).collect(),
        }
    }
}

/// Per-light static metadata, keyed by address.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct LightFields {
    pub name: Option<String>,
    #[serde(default)]
    pub cct_only: Option<bool>,
    #[serde(default)]
    pub infinity_mode: Option<u8>,
    #[serde(default)]
    pub hw_mac: Option<String>,
    #[serde(default)]
    pub rssi: Option<i16>,
    #[serde(default)]
    pub supports_status_query: Option<bool>,
    #[serde(default)]
    pub supports_extended_scene: Option<bool>,
}

/// One entry of the array form of `lights`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LightEntry {
    pub address: String,
    #[serde(flatten)]
    pub fields: LightFields,
}

/// `groups` membership: either a YAML/JSON list or a comma-separated string.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum GroupMembers {
    List(Vec<String>),
    CommaString(String),
}

impl GroupMembers {
    pub fn addresses(&self) -> Vec<String> {
        match self {
            GroupMembers::List(v) => v.clone(),
            GroupMembers::CommaString(s) => {
                s.split(',').map(str::trim).filter(|a| !a.is_empty()).map(str::to_string).collect()
            },
        }
    }
}

/// Command fields shared by `presets` and per-light overrides, with the
/// CLI-facing alias table applied at the field level.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CommandFields {
    #[serde(default, alias = "power")]
    pub on: Option<bool>,
    #[serde(default, alias = "brightness")]
    pub bri: Option<u16>,
    #[serde(default, alias = "saturation")]
    pub sat: Option<u16>,
    #[serde(default, alias = "temperature")]
    pub temp: Option<u16>,
    #[serde(default)]
    pub hue: Option<u16>,
    #[serde(default)]
    pub gm: Option<i16>,
    #[serde(default, alias = "effect")]
    pub scene: Option<u8>,
    #[serde(default, alias = "bright_min")]
    pub scene_bright_min: Option<u16>,
    #[serde(default, alias = "bright_max")]
    pub scene_bright_max: Option<u16>,
    #[serde(default, alias = "temp_min")]
    pub scene_temp_min: Option<u16>,
    #[serde(default, alias = "temp_max")]
    pub scene_temp_max: Option<u16>,
    #[serde(default, alias = "hue_min")]
    pub scene_hue_min: Option<u16>,
    #[serde(default, alias = "hue_max")]
    pub scene_hue_max: Option<u16>,
    #[serde(default, alias = "speed")]
    pub scene_speed: Option<u16>,
    #[serde(default, alias = "sparks")]
    pub scene_sparks: Option<u16>,
    #[serde(default, alias = "special_options")]
    pub scene_special: Option<u16>,
}

impl CommandFields {
    /// Resolves these fields into a dialect-agnostic command, by priority:
    /// `on` (power), then `scene`, then `hue` (HSI), then `temp` (CCT).
    /// Mirrors the precedence `session::preset_to_command` and the CLI
    /// command-resolution path in `main` both apply.
    pub fn to_base_command(&self) -> anyhow::Result<crate::protocol::encoder::BaseCommand> {
        use crate::protocol::encoder::{BaseCommand, ExtendedScene};

        if let Some(on) = self.on {
            return Ok(BaseCommand::Power { on });
        }
        if let Some(scene) = self.scene {
            let extended = ExtendedScene {
                enabled: self.scene_bright_min.is_some()
                    || self.scene_temp_min.is_some()
                    || self.scene_hue_min.is_some(),
                bright_min: self.scene_bright_min.unwrap_or(0) as u8,
                bright_max: self.scene_bright_max.unwrap_or(0) as u8,
                temp_min: self.scene_temp_min.unwrap_or(0),
                temp_max: self.scene_temp_max.unwrap_or(0),
                hue_min: self.scene_hue_min.unwrap_or(0),
                hue_max: self.scene_hue_max.unwrap_or(0),
                speed: self.scene_speed.unwrap_or(0) as u8,
                sparks: self.scene_sparks.unwrap_or(0) as u8,
                special: self.scene_special.unwrap_or(0) as u8,
            };
            return Ok(BaseCommand::Scene { effect: scene, bri: self.bri.unwrap_or(50) as u8, extended });
        }
        if let Some(hue) = self.hue {
            return Ok(BaseCommand::Hsi {
                hue,
                sat: self.sat.unwrap_or(100) as u8,
                bri: self.bri.unwrap_or(50) as u8,
            });
        }
        if let Some(temp) = self.temp {
            return Ok(BaseCommand::Cct {
                bri: self.bri.unwrap_or(50) as u8,
                temp_raw: i32::from(temp),
                gm: self.gm.map(i32::from).unwrap_or(0),
            });
        }
        anyhow::bail!("no recognizable command fields (need on/off, scene, hue, or temp)")
    }

    /// Overlays `self` (the preset) under `cli`: every field the caller
    /// actually supplied on the command line wins; preset fields only fill
    /// gaps.
    pub fn overlaid_by(&self, cli: &CommandFields) -> CommandFields {
        CommandFields {
            on: cli.on.or(self.on),
            bri: cli.bri.or(self.bri),
            sat: cli.sat.or(self.sat),
            temp: cli.temp.or(self.temp),
            hue: cli.hue.or(self.hue),
            gm: cli.gm.or(self.gm),
            scene: cli.scene.or(self.scene),
            scene_bright_min: cli.scene_bright_min.or(self.scene_bright_min),
            scene_bright_max: cli.scene_bright_max.or(self.scene_bright_max),
            scene_temp_min: cli.scene_temp_min.or(self.scene_temp_min),
            scene_temp_max: cli.scene_temp_max.or(self.scene_temp_max),
            scene_hue_min: cli.scene_hue_min.or(self.scene_hue_min),
            scene_hue_max: cli.scene_hue_max.or(self.scene_hue_max),
            scene_speed: cli.scene_speed.or(self.scene_speed),
            scene_sparks: cli.scene_sparks.or(self.scene_sparks),
            scene_special: cli.scene_special.or(self.scene_special),
        }
    }
}

/// A named preset: base command fields plus optional per-light overrides.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct PresetConfig {
    #[serde(flatten)]
    pub fields: CommandFields,
    #[serde(default)]
    pub per_light: HashMap<String, CommandFields>,
}

/// Duck-typed scalar used for `defaults` values, where the document may
/// encode a bool, integer, float, or string interchangeably.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            ScalarValue::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            ScalarValue::Int(i) => Some(*i != 0),
            ScalarValue::Float(_) => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            ScalarValue::Int(i) => u16::try_from(*i).ok(),
            ScalarValue::Float(f) => Some(*f as u16),
            ScalarValue::Str(s) => s.parse().ok(),
            ScalarValue::Bool(_) => None,
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON or YAML file, validates it, and
    /// returns the ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse configuration document")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and canonicalizes addresses in place.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        self.lights = match std::mem::replace(&mut self.lights, LightsSection::Map(HashMap::new())) {
            LightsSection::Map(m) => {
                let mut canon = HashMap::with_capacity(m.len());
                for (addr, fields) in m {
                    if let Some(mode) = fields.infinity_mode {
                        ensure!(mode <= 2, "light '{addr}': infinity_mode must be 0, 1, or 2");
                    }
                    canon.insert(canonicalize_address(&addr), fields);
                }
                LightsSection::Map(canon)
            },
            LightsSection::List(l) => {
                let mut out = Vec::with_capacity(l.len());
                for mut entry in l {
                    if let Some(mode) = entry.fields.infinity_mode {
                        ensure!(mode <= 2, "light '{}': infinity_mode must be 0, 1, or 2", entry.address);
                    }
                    entry.address = canonicalize_address(&entry.address);
                    out.push(entry);
                }
                LightsSection::List(out)
            },
        };

        for (name, members) in &self.groups {
            ensure!(!members.addresses().is_empty(), "group '{name}' has no members");
        }

        Ok(())
    }

    /// Resolves a `group:<name>` reference to its canonical address list.
    pub fn resolve_group(&self, name: &str) -> Result<Vec<String>> {
        self.groups
            .get(name)
            .map(|m| m.addresses().iter().map(|a| canonicalize_address(a)).collect())
            .with_context(|| format!("unknown group '{name}'"))
    }
}
