// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Fixture Descriptor: everything the rest of the pipeline needs to
//! know about one physical lighting fixture, derived once at
//! discovery/registration time and never mutated afterwards.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::{
    models::registry::{
        Capabilities, Dialect, correct_name, lookup_capabilities, supports_extended_scene,
        supports_status_query,
    },
    transport::GattConnection,
    utils::looks_like_mac,
};

/// A single physical Neewer BLE fixture.
#[derive(Debug, Clone)]
pub struct FixtureDescriptor {
    /// Corrected, human-friendly name.
    pub name: String,
    /// Raw advertised name, before correction.
    pub realname: String,
    /// Canonical BLE address.
    pub address: String,
    /// Last observed advertisement RSSI.
    pub rssi: i16,
    /// Capability record derived from the corrected name.
    pub caps: Capabilities,
    /// Hardware MAC used for Infinity-dialect envelope frames, if known.
    pub hw_mac: Option<String>,
    /// Tri-valued override: `None` defers to the name-prefix heuristic.
    pub supports_status_query: Option<bool>,
    /// Tri-valued override: `None` defers to the dialect/`cct_only` default.
    pub supports_extended_scene: Option<bool>,
    /// Live GATT session handle; set and cleared only by the Connection
    /// Manager.
    pub session: Option<Arc<dyn GattConnection>>,
}

impl FixtureDescriptor {
    /// Builds a descriptor from an advertised name/address/RSSI triple,
    /// performing name correction and capability lookup.
    pub fn from_advertisement(raw_name: &str, address: &str, rssi: i16) -> Self {
        let corrected = correct_name(raw_name);
        let caps = lookup_capabilities(&corrected);
        FixtureDescriptor {
            name: if corrected.is_empty() { "Unknown".to_string() } else { corrected },
            realname: if raw_name.is_empty() { "Unknown".to_string() } else { raw_name.to_string() },
            address: address.to_string(),
            rssi,
            caps,
            hw_mac: None,
            supports_status_query: None,
            supports_extended_scene: None,
            session: None,
        }
    }

    /// Builds a descriptor for a statically-configured fixture that was
    /// never seen during discovery.
    pub fn from_static_config(address: &str, name: Option<&str>, caps: Capabilities, hw_mac: Option<String>) -> Self {
        FixtureDescriptor {
            name: name.unwrap_or("Configured Light").to_string(),
            realname: name.unwrap_or("Configured Light").to_string(),
            address: address.to_string(),
            rssi: -127,
            caps,
            hw_mac,
            supports_status_query: None,
            supports_extended_scene: None,
            session: None,
        }
    }

    /// Effective status-query support: the configured override, or the
    /// name-prefix heuristic.
    pub fn effective_supports_status_query(&self) -> bool {
        self.supports_status_query.unwrap_or_else(|| supports_status_query(&self.name))
    }

    /// Effective extended-scene support: the configured override, or the
    /// dialect/`cct_only` default.
    pub fn effective_supports_extended_scene(&self) -> bool {
        self.supports_extended_scene.unwrap_or_else(|| supports_extended_scene(&self.caps))
    }

    /// The hardware MAC to use for Infinity envelope frames: an explicitly
    /// configured `hw_mac`, or the BLE address itself if it is already
    /// MAC-shaped.
    pub fn resolve_hw_mac(&self) -> Result<String> {
        if let Some(mac) = &self.hw_mac {
            return Ok(mac.clone());
        }
        if looks_like_mac(&self.address) {
            return Ok(self.address.clone());
        }
        bail!(
            "Infinity command requires a MAC address but device address is '{}'",
            self.address
        );
    }

    /// Derives `hw_mac` automatically for Infinity fixtures whose address is
    /// already MAC-shaped, the way the connection manager does right after a
    /// successful connect.
    pub fn infer_hw_mac_on_connect(&mut self) {
        if matches!(self.caps.dialect, Dialect::Infinity) && self.hw_mac.is_none() && looks_like_mac(&self.address) {
            self.hw_mac = Some(self.address.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_advertisement_derives_capabilities() {
        let fx = FixtureDescriptor::from_advertisement("NEEWER-Apollo 150D", "AA:BB:CC:DD:EE:FF", -40);
        assert_eq!(fx.name, "Apollo 150D");
        assert!(fx.caps.cct_only);
    }

    #[test]
    fn test_resolve_hw_mac_falls_back_to_address() {
        let fx = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "AA:BB:CC:DD:EE:FF", -40);
        assert_eq!(fx.resolve_hw_mac().expect("mac"), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_resolve_hw_mac_rejects_non_mac_address() {
        let fx = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "not-a-mac", -40);
        assert!(fx.resolve_hw_mac().is_err());
    }
}
