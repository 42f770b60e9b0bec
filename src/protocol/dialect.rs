// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Dialect Branching: turns a dialect-agnostic [`BaseCommand`] into a
//! per-fixture [`DeliveryPlan`] — the ordered list of checksummed frames,
//! write-with-response flags, and inter-frame delays that the Connection
//! Manager / Adaptive Delivery Engine actually writes to the GATT
//! characteristic.

use crate::{
    error::CoreError,
    models::{fixture::FixtureDescriptor, registry::Dialect},
    protocol::{
        encoder::{BaseCommand, MODE_CCT, MODE_HSI, MODE_POWER, MODE_SCENE},
        framing::{TAG, tag_checksum},
    },
};

/// One frame in a fixture's delivery plan.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub frame: Vec<u8>,
    pub with_response: bool,
    pub extra_delay_secs: f64,
}

/// An ordered list of frames for one fixture.
pub type DeliveryPlan = Vec<PlanStep>;

fn power_envelope(on: bool, mac: &[u8; 6]) -> Vec<u8> {
    let mut payload = vec![TAG, 0x8D, 8];
    payload.extend_from_slice(mac);
    payload.push(0x81);
    payload.push(if on { 1 } else { 0 });
    payload
}

/// Classic-dialect remap, used when `effect < 20`. Falls back to `10` for
/// unmapped effects. Effects `>= 20` remap to `effect - 20` (handled by the
/// caller, not this table).
fn remap_fx_classic(effect: u8) -> u8 {
    match effect {
        10 => 1,
        16 => 4,
        17 => 5,
        11 => 6,
        1 => 7,
        2 => 8,
        15 => 9,
        _ => 10,
    }
}

/// Infinity-dialect remap, used when `effect > 20`. Effects `<= 20` pass
/// through unchanged (handled by the caller).
fn remap_fx_infinity(effect: u8) -> u8 {
    match effect {
        21 => 10,
        22 => 8,
        23 => 12,
        24 => 12,
        25 => 17,
        26 => 11,
        27 => 1,
        28 => 2,
        29 => 15,
        other => other,
    }
}

fn convert_fx_index(dialect_is_infinity: bool, effect: u8) -> u8 {
    if dialect_is_infinity {
        if effect > 20 { remap_fx_infinity(effect) } else { effect }
    } else if effect < 20 {
        remap_fx_classic(effect)
    } else {
        effect - 20
    }
}

/// Builds the per-fixture [`DeliveryPlan`] for `cmd`, rejecting modes the
/// fixture's capability record does not support.
pub fn build_delivery_plan(
    fixture: &FixtureDescriptor,
    cmd: &BaseCommand,
    power_with_response: bool,
) -> Result<DeliveryPlan, CoreError> {
    let caps = fixture.caps;

    if caps.cct_only && matches!(cmd, BaseCommand::Hsi { .. } | BaseCommand::Scene { .. }) {
        return Err(CoreError::UnsupportedMode(format!(
            "{} only supports CCT mode",
            fixture.name
        )));
    }

    if let BaseCommand::Scene { extended, .. } = cmd {
        if extended.enabled && !fixture.effective_supports_extended_scene() {
            return Err(CoreError::UnsupportedMode(format!(
                "{} does not support extended scene payloads",
                fixture.name
            )));
        }
    }

    let base = cmd.encode();

    match cmd {
        BaseCommand::Power { on } => branch_power(fixture, *on, base, power_with_response),
        BaseCommand::Cct { .. } => branch_cct(fixture, base),
        BaseCommand::Hsi { .. } => branch_hsi(fixture, base),
        BaseCommand::Scene { effect, .. } => branch_scene(fixture, *effect, base),
    }
}

fn resolve_mac(fixture: &FixtureDescriptor) -> Result<[u8; 6], CoreError> {
    let mac = fixture
        .resolve_hw_mac()
        .map_err(|e| CoreError::Configuration(e.to_string()))?;
    crate::utils::mac_to_bytes(&mac).map_err(|e| CoreError::Configuration(e.to_string()))
}

fn branch_power(
    fixture: &FixtureDescriptor,
    on: bool,
    base: Vec<u8>,
    power_with_response: bool,
) -> Result<DeliveryPlan, CoreError> {
    if matches!(fixture.caps.dialect, Dialect::Infinity) {
        let mac = resolve_mac(fixture)?;
        let payload = power_envelope(on, &mac);
        return Ok(vec![PlanStep {
            frame: tag_checksum(&payload),
            with_response: power_with_response,
            extra_delay_secs: 0.0,
        }]);
    }
    debug_assert_eq!(base[1], MODE_POWER);
    Ok(vec![PlanStep {
        frame: tag_checksum(&base),
        with_response: power_with_response,
        extra_delay_secs: 0.0,
    }])
}

fn branch_cct(fixture: &FixtureDescriptor, base: Vec<u8>) -> Result<DeliveryPlan, CoreError> {
    debug_assert_eq!(base[1], MODE_CCT);
    let bri = base[3];
    let temp = base[4];
    let gm = base[5];

    if fixture.caps.cct_only {
        let bri_only = tag_checksum(&[TAG, 130, 1, bri]);
        let temp_only = tag_checksum(&[TAG, 131, 1, temp]);
        return Ok(vec![
            PlanStep { frame: bri_only, with_response: false, extra_delay_secs: 0.05 },
            PlanStep { frame: temp_only, with_response: false, extra_delay_secs: 0.0 },
        ]);
    }

    match fixture.caps.dialect {
        Dialect::Infinity => {
            let mac = resolve_mac(fixture)?;
            let mut payload = vec![TAG, 144, 11];
            payload.extend_from_slice(&mac);
            payload.extend_from_slice(&[MODE_CCT, bri, temp, gm, 4]);
            Ok(vec![PlanStep {
                frame: tag_checksum(&payload),
                with_response: false,
                extra_delay_secs: 0.0,
            }])
        },
        Dialect::InfinityLite => {
            let mut payload = base;
            payload[2] = 3;
            Ok(vec![PlanStep {
                frame: tag_checksum(&payload),
                with_response: false,
                extra_delay_secs: 0.0,
            }])
        },
        Dialect::Classic => {
            // Classic lights ignore GM in CCT: drop the trailing gm byte.
            let payload = base[..5].to_vec();
            Ok(vec![PlanStep {
                frame: tag_checksum(&payload),
                with_response: false,
                extra_delay_secs: 0.0,
            }])
        },
    }
}

fn branch_hsi(fixture: &FixtureDescriptor, base: Vec<u8>) -> Result<DeliveryPlan, CoreError> {
    debug_assert_eq!(base[1], MODE_HSI);
    if matches!(fixture.caps.dialect, Dialect::Infinity) {
        let mac = resolve_mac(fixture)?;
        let mut payload = vec![TAG, 143, 11];
        payload.extend_from_slice(&mac);
        payload.extend_from_slice(&[MODE_HSI, base[3], base[4], base[5], base[6]]);
        return Ok(vec![PlanStep {
            frame: tag_checksum(&payload),
            with_response: false,
            extra_delay_secs: 0.0,
        }]);
    }
    Ok(vec![PlanStep { frame: tag_checksum(&base), with_response: false, extra_delay_secs: 0.0 }])
}

fn branch_scene(
    fixture: &FixtureDescriptor,
    effect: u8,
    base: Vec<u8>,
) -> Result<DeliveryPlan, CoreError> {
    debug_assert_eq!(base[1], MODE_SCENE);

    match fixture.caps.dialect {
        Dialect::Infinity => {
            let mac = resolve_mac(fixture)?;
            // The length byte is 6 for the plain 2-byte scene payload, plus
            // one for every extended-scene byte beyond it.
            let mut payload = vec![TAG, 145, 6 + (base.len() as u8 - 5)];
            payload.extend_from_slice(&mac);
            payload.push(139);
            payload.push(convert_fx_index(true, effect));
            payload.extend_from_slice(&base[4..]);

            let power_off = tag_checksum(&power_envelope(false, &mac));
            let power_on = tag_checksum(&power_envelope(true, &mac));
            Ok(vec![
                PlanStep { frame: power_off, with_response: false, extra_delay_secs: 0.05 },
                PlanStep { frame: power_on, with_response: false, extra_delay_secs: 0.05 },
                PlanStep { frame: tag_checksum(&payload), with_response: false, extra_delay_secs: 0.0 },
            ])
        },
        Dialect::InfinityLite => {
            let mut payload = base;
            payload[1] = 139;
            let len = payload.len();
            payload[2] = (len - 3) as u8;
            Ok(vec![PlanStep {
                frame: tag_checksum(&payload),
                with_response: false,
                extra_delay_secs: 0.0,
            }])
        },
        Dialect::Classic => {
            // The byte order here (bri before remapped effect) is
            // intentional, not a transcription error.
            let mut payload = base[..5].to_vec();
            let bri = payload[4];
            payload[3] = bri;
            payload[4] = convert_fx_index(false, effect);
            Ok(vec![PlanStep {
                frame: tag_checksum(&payload),
                with_response: false,
                extra_delay_secs: 0.0,
            }])
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::{Capabilities, lookup_capabilities};

    fn fixture_with(name: &str, address: &str, caps: Capabilities) -> FixtureDescriptor {
        FixtureDescriptor::from_static_config(address, Some(name), caps, None)
    }

    #[test]
    fn test_power_on_classic() {
        let fx = fixture_with("RGB176", "AA:AA:AA:AA:AA:AA", lookup_capabilities("RGB176"));
        let plan = build_delivery_plan(&fx, &BaseCommand::Power { on: true }, true).expect("plan");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].frame, vec![120, 129, 1, 1, 251]);
    }

    #[test]
    fn test_power_off_classic() {
        let fx = fixture_with("RGB176", "AA:AA:AA:AA:AA:AA", lookup_capabilities("RGB176"));
        let plan = build_delivery_plan(&fx, &BaseCommand::Power { on: false }, true).expect("plan");
        assert_eq!(plan[0].frame, vec![120, 129, 1, 2, 252]);
    }

    #[test]
    fn test_cct_on_classic_drops_gm() {
        let fx = fixture_with("RGB176", "AA:AA:AA:AA:AA:AA", lookup_capabilities("RGB176"));
        let cmd = BaseCommand::Cct { bri: 40, temp_raw: 5600, gm: 30 };
        let plan = build_delivery_plan(&fx, &cmd, true).expect("plan");
        assert_eq!(plan.len(), 1);
        // [120,135,2,40,56] checksum = 353 mod 256 = 97
        assert_eq!(plan[0].frame, vec![120, 135, 2, 40, 56, 97]);
    }

    #[test]
    fn test_cct_on_cct_only_splits_two_frames() {
        let mut caps = lookup_capabilities("Apollo");
        caps.cct_only = true;
        let fx = fixture_with("Apollo 150D", "AA:AA:AA:AA:AA:AA", caps);
        let cmd = BaseCommand::Cct { bri: 30, temp_raw: 56, gm: 0 };
        let plan = build_delivery_plan(&fx, &cmd, true).expect("plan");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].frame, vec![120, 130, 1, 30, tag_checksum(&[120, 130, 1, 30])[4]]);
        assert_eq!(plan[0].extra_delay_secs, 0.05);
        assert_eq!(plan[1].frame, vec![120, 131, 1, 56, tag_checksum(&[120, 131, 1, 56])[4]]);
        assert_eq!(plan[1].extra_delay_secs, 0.0);
    }

    #[test]
    fn test_hsi_on_cct_only_is_rejected() {
        let mut caps = Capabilities::default();
        caps.cct_only = true;
        let fx = fixture_with("CCTOnly", "AA:AA:AA:AA:AA:AA", caps);
        let cmd = BaseCommand::Hsi { hue: 240, sat: 100, bri: 50 };
        let err = build_delivery_plan(&fx, &cmd, true).expect_err("should reject");
        assert!(matches!(err, CoreError::UnsupportedMode(_)));
    }

    #[test]
    fn test_hsi_on_infinity_builds_envelope_frame() {
        let mut caps = Capabilities::default();
        caps.dialect = Dialect::Infinity;
        let fx = fixture_with("RGB1", "AA:BB:CC:DD:EE:FF", caps);
        let cmd = BaseCommand::Hsi { hue: 240, sat: 100, bri: 50 };
        let plan = build_delivery_plan(&fx, &cmd, true).expect("plan");
        assert_eq!(plan.len(), 1);
        let expected_unframed =
            [120u8, 143, 11, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 134, 240, 0, 100, 50];
        assert_eq!(&plan[0].frame[..expected_unframed.len()], &expected_unframed);
    }

    #[test]
    fn test_scene_on_infinity_remaps_and_wraps_envelope() {
        let mut caps = Capabilities::default();
        caps.dialect = Dialect::Infinity;
        let fx = fixture_with("RGB1", "AA:BB:CC:DD:EE:FF", caps);
        let cmd = BaseCommand::Scene { effect: 22, bri: 60, extended: Default::default() };
        let plan = build_delivery_plan(&fx, &cmd, true).expect("plan");
        assert_eq!(plan.len(), 3);
        let expected_unframed =
            [120u8, 145, 6, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 139, 8, 60];
        assert_eq!(&plan[2].frame[..expected_unframed.len()], &expected_unframed);
    }

    #[test]
    fn test_extended_scene_rejected_on_classic() {
        let caps = lookup_capabilities("RGB176"); // Classic, not cct_only
        let fx = fixture_with("FS150B", "AA:AA:AA:AA:AA:AA", caps);
        let cmd = BaseCommand::Scene {
            effect: 12,
            bri: 30,
            extended: crate::protocol::encoder::ExtendedScene { enabled: true, ..Default::default() },
        };
        let err = build_delivery_plan(&fx, &cmd, true).expect_err("should reject");
        assert!(matches!(err, CoreError::UnsupportedMode(_)));
    }
}
