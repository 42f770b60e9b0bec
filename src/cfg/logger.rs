// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logging initialization: a single global subscriber, filterable through
//! `RUST_LOG`, human-readable on a terminal by default and switchable to
//! structured JSON via `NEEWER_LOG_FORMAT=json` for log aggregators.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. `debug` raises the default
/// filter level to `debug` when the caller hasn't set `RUST_LOG` explicitly;
/// an explicit `RUST_LOG` always wins.
pub fn init_logger(debug: bool) -> Result<()> {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let json_output =
        std::env::var("NEEWER_LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
            .with_target(true)
            .with_line_number(true);
        registry.with(fmt_layer).try_init().context("failed to install tracing subscriber")?;
    } else {
        let fmt_layer = fmt::layer()
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
            .with_target(true)
            .with_line_number(true);
        registry.with(fmt_layer).try_init().context("failed to install tracing subscriber")?;
    }

    Ok(())
}
