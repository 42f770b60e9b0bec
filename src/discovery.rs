// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Discovery: turns BLE advertisements (or static configuration) into
//! [`FixtureDescriptor`]s.

use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use tracing::debug;

use crate::{
    cfg::config::Config,
    models::{
        fixture::FixtureDescriptor,
        registry::{Dialect, correct_name, is_neewer_device, lookup_capabilities},
    },
    transport::Transport,
    utils::canonicalize_address,
};

/// Tuning knobs for one discovery pass.
pub struct DiscoveryOptions {
    pub scan_timeout: Duration,
    pub retries: u32,
    /// `None` means open discovery: admit by name prefix and stop at the
    /// first sighting unless `exhaustive`. `Some` means admit only these
    /// addresses and keep retrying until every one is covered.
    pub targets: Option<Vec<String>>,
    pub exhaustive: bool,
}

/// Scans up to `opts.retries` times, collecting admissible advertisements
/// keyed by canonical address. Duplicate sightings keep the strongest RSSI.
pub async fn discover(
    transport: &dyn Transport,
    opts: &DiscoveryOptions,
) -> Result<HashMap<String, FixtureDescriptor>> {
    let mut found: HashMap<String, FixtureDescriptor> = HashMap::new();

    for attempt in 0..opts.retries.max(1) {
        let ads = transport.scan(opts.scan_timeout).await?;
        for ad in ads {
            let address = canonicalize_address(&ad.address);
            let admissible = match &opts.targets {
                Some(targets) => targets.contains(&address),
                None => is_neewer_device(&ad.name),
            };
            if !admissible {
                continue;
            }

            let candidate = FixtureDescriptor::from_advertisement(&ad.name, &address, ad.rssi);
            found
                .entry(address)
                .and_modify(|existing| {
                    if ad.rssi > existing.rssi {
                        existing.rssi = ad.rssi;
                        existing.name = candidate.name.clone();
                        existing.realname = candidate.realname.clone();
                    }
                })
                .or_insert(candidate);
        }

        let converged = match &opts.targets {
            Some(targets) => targets.iter().all(|t| found.contains_key(t)),
            None => !opts.exhaustive && !found.is_empty(),
        };
        if converged {
            debug!(attempt, found = found.len(), "discovery converged early");
            break;
        }
    }

    Ok(found)
}

/// Synthesizes descriptors for statically-configured lights and
/// opportunistically upgrades them with a short resolve scan; fixtures not
/// seen on the air fall back to address-based connects untouched.
pub async fn discover_static(
    transport: &dyn Transport,
    cfg: &Config,
    resolve_scan_timeout: Duration,
) -> Result<HashMap<String, FixtureDescriptor>> {
    let mut out = HashMap::new();

    for (address, fields) in cfg.lights.entries() {
        let corrected = fields.name.clone().unwrap_or_else(|| address.clone());
        let mut caps = lookup_capabilities(&correct_name(&corrected));
        if let Some(cct_only) = fields.cct_only {
            caps.cct_only = cct_only;
        }
        if let Some(mode) = fields.infinity_mode {
            caps.dialect = match mode {
                1 => Dialect::Infinity,
                2 => Dialect::InfinityLite,
                _ => Dialect::Classic,
            };
        }

        let mut descriptor =
            FixtureDescriptor::from_static_config(&address, fields.name.as_deref(), caps, fields.hw_mac.clone());
        descriptor.supports_status_query = fields.supports_status_query;
        descriptor.supports_extended_scene = fields.supports_extended_scene;
        if let Some(rssi) = fields.rssi {
            descriptor.rssi = rssi;
        }
        out.insert(address, descriptor);
    }

    if let Ok(ads) = transport.scan(resolve_scan_timeout).await {
        for ad in ads {
            let address = canonicalize_address(&ad.address);
            if let Some(descriptor) = out.get_mut(&address) {
                descriptor.rssi = ad.rssi;
                if !ad.name.is_empty() {
                    descriptor.realname = ad.name.clone();
                    descriptor.name = correct_name(&ad.name);
                }
            }
        }
    }

    Ok(out)
}
