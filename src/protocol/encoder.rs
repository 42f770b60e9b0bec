// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command Encoder: clamps raw parameters and turns them into a
//! dialect-agnostic Base Command frame (unframed, i.e. without the trailing
//! checksum byte — Dialect Branching appends that once it has decided the
//! final per-dialect byte layout).

use crate::protocol::framing::TAG;

/// Mode byte for a plain power on/off frame.
pub const MODE_POWER: u8 = 129;
/// Mode byte for an HSI frame.
pub const MODE_HSI: u8 = 134;
/// Mode byte for a CCT frame.
pub const MODE_CCT: u8 = 135;
/// Mode byte for a scene/animation frame.
pub const MODE_SCENE: u8 = 136;

#[inline]
fn clamp(value: i32, low: i32, high: i32) -> i32 {
    value.max(low).min(high)
}

/// Normalizes a raw temperature value: values `>= 1000` are treated as
/// already-Kelvin (e.g. `5600`) and divided by 100; smaller values are
/// assumed to already be in protocol units (`56`) and pass through
/// unchanged. This is the newer, intentional revision of the threshold (an
/// older source used `>= 100`).
pub fn normalize_temp(temp_raw: i32) -> i32 {
    if temp_raw >= 1000 { ((temp_raw as f64) / 100.0).round() as i32 } else { temp_raw }
}

/// Extended-scene parameters. Defaults to mirroring the plain `bri`/`temp`/
/// `hue` values when a caller never touches them, so a degenerate-but-valid
/// extended frame is still produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedScene {
    pub enabled: bool,
    pub bright_min: u8,
    pub bright_max: u8,
    pub temp_min: u16,
    pub temp_max: u16,
    pub hue_min: u16,
    pub hue_max: u16,
    pub speed: u8,
    pub sparks: u8,
    pub special: u8,
}

/// Dialect-agnostic command parameters, before Dialect Branching decides the
/// final per-fixture frame shape.
#[derive(Debug, Clone, Copy)]
pub enum BaseCommand {
    Power { on: bool },
    Cct { bri: u8, temp_raw: i32, gm: i32 },
    Hsi { hue: u16, sat: u8, bri: u8 },
    Scene { effect: u8, bri: u8, extended: ExtendedScene },
}

impl BaseCommand {
    /// Encodes to the unframed Base Command bytes: `[TAG, mode, len,
    /// ...payload]`, no checksum.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            BaseCommand::Power { on } => vec![TAG, MODE_POWER, 1, if on { 1 } else { 2 }],
            BaseCommand::Cct { bri, temp_raw, gm } => {
                let temp = clamp(normalize_temp(temp_raw), 25, 100) as u8;
                let bri = clamp(bri as i32, 0, 100) as u8;
                let gm = clamp(gm + 50, 0, 100) as u8;
                vec![TAG, MODE_CCT, 2, bri, temp, gm]
            },
            BaseCommand::Hsi { hue, sat, bri } => {
                let hue = clamp(hue as i32, 0, 360) as u16;
                let sat = clamp(sat as i32, 0, 100) as u8;
                let bri = clamp(bri as i32, 0, 100) as u8;
                vec![
                    TAG,
                    MODE_HSI,
                    4,
                    (hue & 0xFF) as u8,
                    ((hue & 0xFF00) >> 8) as u8,
                    sat,
                    bri,
                ]
            },
            BaseCommand::Scene { effect, bri, extended } => {
                let effect = clamp(effect as i32, 1, 29) as u8;
                let bri = clamp(bri as i32, 0, 100) as u8;
                if extended.enabled {
                    encode_extended_scene(effect, bri, &extended)
                } else {
                    vec![TAG, MODE_SCENE, 2, effect, bri]
                }
            },
        }
    }
}

/// Scales a Kelvin value into a single 0..=255 byte across the 3200-6500K
/// range; used by the default extended-scene family's two-temp-endpoint
/// fields.
fn temp_to_byte(temp: u16) -> u8 {
    let t = temp.clamp(3200, 6500) as f64;
    (((t - 3200.0) / (6500.0 - 3200.0)) * 255.0).round() as u8
}

/// Single-byte temp code (25..=100), the same conversion the CCT command
/// uses, for effects whose schema carries one "temp" field rather than a
/// min/max pair.
fn single_temp_code(ext: &ExtendedScene) -> u8 {
    let kelvin = if ext.temp_max != 0 { ext.temp_max } else { ext.temp_min };
    clamp(normalize_temp(i32::from(kelvin)), 25, 100) as u8
}

/// Extended-scene payload, keyed by effect index. The per-effect schema is
/// normative: effects 1, 5, 12, and 14 follow spec.md's explicit byte
/// layouts; every other effect (including the legacy Infinity presets 21-29,
/// whose individual preambles aren't pinned down by any reference fixture)
/// falls back to the generic `[bri_min, bri_max, temp_min_byte,
/// temp_max_byte, speed, sparks, special]` family.
fn encode_extended_scene(effect: u8, bri: u8, ext: &ExtendedScene) -> Vec<u8> {
    let bri_min = if ext.bright_min == 0 { bri } else { ext.bright_min };
    let bri_max = if ext.bright_max == 0 { bri } else { ext.bright_max };
    let hue_min = if ext.hue_min == 0 { ext.hue_max } else { ext.hue_min };
    let hue_max = if ext.hue_max == 0 { ext.hue_min } else { ext.hue_max };

    let params: Vec<u8> = match effect {
        1 => vec![effect, bri, single_temp_code(ext), ext.speed],
        5 => {
            // No `scene_gm` config alias exists for this crate's extended-scene
            // fields; transmit the neutral gm offset (user gm=0 -> wire 50).
            vec![effect, bri_min, bri_max, single_temp_code(ext), 50, ext.speed]
        },
        12 => vec![
            effect,
            bri,
            (hue_min & 0xFF) as u8,
            ((hue_min & 0xFF00) >> 8) as u8,
            (hue_max & 0xFF) as u8,
            ((hue_max & 0xFF00) >> 8) as u8,
            ext.speed,
        ],
        14 => vec![14, 0, bri_min, bri_max, 0, 0, single_temp_code(ext), ext.speed],
        _ => {
            let temp_min = if ext.temp_min == 0 { ext.temp_max } else { ext.temp_min };
            let temp_max = if ext.temp_max == 0 { ext.temp_min } else { ext.temp_max };
            vec![
                effect,
                bri_min,
                bri_max,
                temp_to_byte(temp_min),
                temp_to_byte(temp_max),
                ext.speed,
                ext.sparks,
                ext.special,
            ]
        },
    };

    let mut payload = vec![TAG, MODE_SCENE, params.len() as u8];
    payload.extend(params);
    payload
}
