// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Adaptive Delivery Engine: narrows the pending (still-failing) set of
//! fixtures across up to `passes` rounds, rather than blindly resending to
//! every fixture on every round.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    connection::ConnectionManager,
    error::CoreError,
    models::fixture::FixtureDescriptor,
    protocol::{dialect::build_delivery_plan, encoder::BaseCommand},
    state_machine::{common::StateMachineCtx, frame_write_states::FrameWriteCtx},
};

/// Tuning for one `deliver` call.
pub struct DeliveryOptions {
    pub passes: u32,
    pub write_retries: u32,
    pub settle_delay_secs: f64,
    pub power_requires_ack: bool,
}

/// Sends `default_cmd` to every fixture in `fixtures` (or its per-address
/// override from `overrides`), retrying only the ones still failing on each
/// subsequent pass. Returns `{address: error}` for fixtures that never
/// succeeded; an empty map is full success.
pub async fn deliver(
    fixtures: &mut HashMap<String, FixtureDescriptor>,
    default_cmd: &BaseCommand,
    overrides: &HashMap<String, BaseCommand>,
    connections: &ConnectionManager<'_>,
    opts: &DeliveryOptions,
    cancel: &CancellationToken,
) -> HashMap<String, String> {
    let all_addresses: Vec<String> = fixtures.keys().cloned().collect();
    let mut failures: HashMap<String, String> =
        all_addresses.iter().map(|a| (a.clone(), "not yet attempted".to_string())).collect();
    let mut terminal: HashSet<String> = HashSet::new();

    for pass in 1..=opts.passes.max(1) {
        if cancel.is_cancelled() {
            break;
        }

        let pending: Vec<String> =
            all_addresses.iter().filter(|a| failures.contains_key(*a) && !terminal.contains(*a)).cloned().collect();
        if pending.is_empty() {
            break;
        }
        debug!(pass, pending = pending.len(), "adaptive delivery pass");

        for addr in &pending {
            if cancel.is_cancelled() {
                break;
            }

            let Some(fixture) = fixtures.get_mut(addr) else { continue };

            if let Err(e) = connections.ensure_session(fixture).await {
                failures.insert(addr.clone(), e.to_string());
                continue;
            }

            let cmd = overrides.get(addr).unwrap_or(default_cmd);
            let plan = match build_delivery_plan(fixture, cmd, opts.power_requires_ack) {
                Ok(plan) => plan,
                Err(e @ CoreError::UnsupportedMode(_)) => {
                    // Per §4.7 step 5: unrecoverable, not retried.
                    terminal.insert(addr.clone());
                    failures.insert(addr.clone(), e.to_string());
                    continue;
                },
                Err(e) => {
                    failures.insert(addr.clone(), e.to_string());
                    continue;
                },
            };

            let Some(session) = fixture.session.clone() else {
                failures.insert(addr.clone(), "no session after connect".to_string());
                continue;
            };

            let mut write_failure = None;
            for step in &plan {
                let mut ctx = FrameWriteCtx::new(session.clone(), step.clone(), opts.write_retries);
                if let Err(e) = ctx.execute(cancel).await {
                    write_failure = Some(e.to_string());
                    break;
                }
                let gap = opts.settle_delay_secs.max(step.extra_delay_secs);
                if gap > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(gap)).await;
                }
            }

            match write_failure {
                Some(err) => {
                    failures.insert(addr.clone(), err);
                },
                None => {
                    failures.remove(addr);
                },
            }
        }
    }

    failures
}
