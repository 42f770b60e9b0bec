// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use neewer_ctl::{
    cfg::{
        cli::{Cli, Mode, resolve_config_path},
        config::{CommandFields, Config},
        logger::init_logger,
    },
    connection::ConnectionManager,
    delivery::{DeliveryOptions, deliver},
    discovery::{self, DiscoveryOptions},
    models::fixture::FixtureDescriptor,
    selector, session,
    transport::{MockTransport, Transport},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logger(cli.debug)?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, cancelling");
            ctrl_c_cancel.cancel();
        }
    });

    match run(&cli, &cancel).await {
        Ok(code) => Ok(code),
        Err(e) if cancel.is_cancelled() => {
            error!(error = %e, "aborted by interrupt");
            Ok(ExitCode::from(130))
        },
        Err(e) => {
            error!(error = %e, "fatal error");
            Ok(ExitCode::from(2))
        },
    }
}

async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<ExitCode> {
    let cfg = resolve_config_path(&cli.config)
        .and_then(Config::load_from_file)
        .or_else(|_| Ok::<Config, anyhow::Error>(Config::default()))
        .context("failed to resolve or load configuration")?;

    // A real deployment wires a BLE HAL here; the bundled CLI's default path
    // drives the in-memory mock, matching the crate's Non-goal on owning the
    // radio stack itself.
    let transport: Box<dyn Transport> = Box::new(MockTransport::new());

    let mut fixtures = discover_fixtures(cli, &cfg, transport.as_ref()).await?;

    if let Some(targets) = selector::selector_to_addresses(&cli.selector, &cfg)? {
        fixtures.retain(|addr, _| targets.contains(addr));
    }

    if fixtures.is_empty() {
        warn!("no fixtures discovered or selected");
        return Ok(ExitCode::from(1));
    }

    let connections = ConnectionManager::new(
        transport.as_ref(),
        Duration::from_secs_f64(cli.tuning.connect_timeout),
        cli.tuning.connect_retries,
        cli.tuning.parallel,
    );
    let opts = DeliveryOptions {
        passes: cli.tuning.passes,
        write_retries: cli.tuning.write_retries,
        settle_delay_secs: cli.tuning.settle_delay,
        power_requires_ack: cli.tuning.power_requires_ack,
    };

    if cli.serve {
        session::run(&mut fixtures, &cfg, &connections, &opts, cancel).await?;
        return Ok(ExitCode::from(0));
    }

    if cli.status {
        return run_status(&mut fixtures, &connections, Duration::from_secs_f64(cli.tuning.status_timeout)).await;
    }

    let cmd = resolve_command(cli, &cfg)?;
    let failures = deliver(&mut fixtures, &cmd, &HashMap::new(), &connections, &opts, cancel).await;

    for (address, fixture) in fixtures.iter_mut() {
        match failures.get(address) {
            Some(err) => println!("{} ({address}): FAILED — {err}", fixture.name),
            None => println!("{} ({address}): ok", fixture.name),
        }
        connections.release(fixture).await;
    }

    if cancel.is_cancelled() {
        return Ok(ExitCode::from(130));
    }
    Ok(ExitCode::from(if failures.is_empty() { 0 } else { 2 }))
}

async fn discover_fixtures(
    cli: &Cli,
    cfg: &Config,
    transport: &dyn Transport,
) -> Result<HashMap<String, FixtureDescriptor>> {
    if cli.no_scan {
        return discovery::discover_static(transport, cfg, Duration::from_secs_f64(cli.tuning.scan_timeout)).await;
    }

    let targets = selector::selector_to_addresses(&cli.selector, cfg)?;
    let opts = DiscoveryOptions {
        scan_timeout: Duration::from_secs_f64(cli.tuning.scan_timeout),
        retries: cli.tuning.scan_attempts.max(1),
        targets,
        exhaustive: false,
    };
    let mut found = discovery::discover(transport, &opts).await?;

    let static_fixtures = discovery::discover_static(transport, cfg, Duration::ZERO).await.unwrap_or_default();
    for (address, fixture) in static_fixtures {
        found.entry(address).or_insert(fixture);
    }

    info!(count = found.len(), "discovery complete");
    Ok(found)
}

fn resolve_command(cli: &Cli, cfg: &Config) -> Result<neewer_ctl::protocol::encoder::BaseCommand> {
    let cli_fields = CommandFields {
        on: if cli.power.on {
            Some(true)
        } else if cli.power.off {
            Some(false)
        } else {
            None
        },
        bri: cli.bri,
        sat: cli.sat,
        temp: cli.temp,
        hue: cli.hue,
        gm: cli.gm,
        scene: cli.scene,
        ..Default::default()
    };

    if let Some(name) = &cli.preset {
        let preset = cfg.presets.get(name).with_context(|| format!("unknown preset '{name}'"))?;
        return preset.fields.overlaid_by(&cli_fields).to_base_command();
    }

    if cli.mode == Some(Mode::Hsi) && cli_fields.hue.is_none() {
        anyhow::bail!("--mode hsi requires --hue");
    }
    if cli.mode == Some(Mode::Cct) && cli_fields.temp.is_none() {
        anyhow::bail!("--mode cct requires --temp");
    }
    if cli.mode == Some(Mode::Scene) && cli_fields.scene.is_none() {
        anyhow::bail!("--mode scene requires --scene");
    }

    cli_fields.to_base_command()
}

async fn run_status(
    fixtures: &mut HashMap<String, FixtureDescriptor>,
    connections: &ConnectionManager<'_>,
    status_timeout: Duration,
) -> Result<ExitCode> {
    let mut any_failed = false;
    for (address, fixture) in fixtures.iter_mut() {
        if let Err(e) = connections.ensure_session(fixture).await {
            println!("{address}: connect failed — {e}");
            any_failed = true;
            continue;
        }
        match connections.query_status(fixture, status_timeout).await {
            Ok(status) => println!(
                "{} ({address}): power={:?} channel={:?}",
                fixture.name, status.power_on, status.channel
            ),
            Err(e) => {
                println!("{} ({address}): FAILED — {e}", fixture.name);
                any_failed = true;
            },
        }
        connections.release(fixture).await;
    }
    Ok(ExitCode::from(if any_failed { 2 } else { 0 }))
}
