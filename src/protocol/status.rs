// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Status Querier protocol: the two query writes and the notify-payload
//! decoder.

use crate::protocol::framing::{TAG, tag_checksum};

/// Write to request a power-state notification.
pub fn power_query_frame() -> Vec<u8> {
    tag_checksum(&[TAG, 133, 0])
}

/// Write to request a channel notification.
pub fn channel_query_frame() -> Vec<u8> {
    tag_checksum(&[TAG, 132, 0])
}

/// Decoded status, built from the two notify payloads the fixture sends back
/// after the query writes.
#[derive(Debug, Clone, Default)]
pub struct FixtureStatus {
    pub power_on: Option<bool>,
    pub channel: Option<u8>,
    pub power_raw: Vec<u8>,
    pub channel_raw: Vec<u8>,
}

/// Decodes a power notify payload `[0x78, 0x02, 0x01, p]`: `p == 1` is ON,
/// `p == 2` is standby, anything else leaves `power_on` unknown.
pub fn decode_power_notify(status: &mut FixtureStatus, payload: &[u8]) {
    status.power_raw = payload.to_vec();
    if payload.len() >= 4 && payload[0] == TAG && payload[1] == 2 {
        status.power_on = match payload[3] {
            1 => Some(true),
            2 => Some(false),
            _ => None,
        };
    }
}

/// Decodes a channel notify payload `[0x78, 0x01, 0x01, c]`.
pub fn decode_channel_notify(status: &mut FixtureStatus, payload: &[u8]) {
    status.channel_raw = payload.to_vec();
    if payload.len() >= 4 && payload[0] == TAG && payload[1] == 1 {
        status.channel = Some(payload[3]);
    }
}
