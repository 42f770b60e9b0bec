// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The interactive session loop (`--serve`): a line-oriented REPL over the
//! currently-discovered fixture set, driving the same encode →
//! dialect-branch → deliver pipeline as a one-shot CLI invocation.

use std::collections::HashMap;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio_util::sync::CancellationToken;

use crate::{
    cfg::config::Config,
    connection::ConnectionManager,
    delivery::{DeliveryOptions, deliver},
    models::fixture::FixtureDescriptor,
    protocol::encoder::{BaseCommand, ExtendedScene},
};

const HELP_TEXT: &str = "\
Verbs: on | off | cct <temp> <bri> [gm] | hsi <hue> <sat> <bri> |
       scene <effect> [bri] | preset <name> | help | exit";

/// Runs the REPL until `exit` or EOF on stdin. Always releases every
/// fixture's session before returning, even on error.
pub async fn run(
    fixtures: &mut HashMap<String, FixtureDescriptor>,
    cfg: &Config,
    connections: &ConnectionManager<'_>,
    opts: &DeliveryOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    prompt(&mut stdout).await?;
    while let Some(line) = lines.next_line().await? {
        if cancel.is_cancelled() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            prompt(&mut stdout).await?;
            continue;
        }

        match parse_verb(line, cfg) {
            Ok(Verb::Exit) => break,
            Ok(Verb::Help) => {
                stdout.write_all(HELP_TEXT.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            },
            Ok(Verb::Command(cmd)) => {
                run_command(fixtures, &cmd, connections, opts, cancel, &mut stdout).await?;
            },
            Err(e) => {
                stdout.write_all(format!("error: {e}\n").as_bytes()).await?;
            },
        }
        prompt(&mut stdout).await?;
    }

    for fixture in fixtures.values_mut() {
        connections.release(fixture).await;
    }
    Ok(())
}

async fn prompt(stdout: &mut Stdout) -> Result<()> {
    stdout.write_all(b"neewer> ").await?;
    stdout.flush().await?;
    Ok(())
}

async fn run_command(
    fixtures: &mut HashMap<String, FixtureDescriptor>,
    cmd: &BaseCommand,
    connections: &ConnectionManager<'_>,
    opts: &DeliveryOptions,
    cancel: &CancellationToken,
    stdout: &mut Stdout,
) -> Result<()> {
    if fixtures.is_empty() {
        stdout.write_all(b"no fixtures to act on\n").await?;
        return Ok(());
    }

    let failures = deliver(fixtures, cmd, &HashMap::new(), connections, opts, cancel).await;
    for address in fixtures.keys() {
        let line = match failures.get(address) {
            Some(err) => format!("{address}: FAILED ({err})\n"),
            None => format!("{address}: ok\n"),
        };
        stdout.write_all(line.as_bytes()).await?;
    }
    Ok(())
}

enum Verb {
    Exit,
    Help,
    Command(BaseCommand),
}

fn parse_verb(line: &str, cfg: &Config) -> Result<Verb> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();

    match verb.as_str() {
        "exit" | "quit" => Ok(Verb::Exit),
        "help" | "?" => Ok(Verb::Help),
        "on" => Ok(Verb::Command(BaseCommand::Power { on: true })),
        "off" => Ok(Verb::Command(BaseCommand::Power { on: false })),
        "cct" => {
            let temp: i32 = next_num(&mut parts, "temp")?;
            let bri: u8 = next_num(&mut parts, "bri")?;
            let gm: i32 = parts.next().map(str::parse).transpose()?.unwrap_or(0);
            Ok(Verb::Command(BaseCommand::Cct { bri, temp_raw: temp, gm }))
        },
        "hsi" => {
            let hue: u16 = next_num(&mut parts, "hue")?;
            let sat: u8 = next_num(&mut parts, "sat")?;
            let bri: u8 = next_num(&mut parts, "bri")?;
            Ok(Verb::Command(BaseCommand::Hsi { hue, sat, bri }))
        },
        "scene" => {
            let effect: u8 = next_num(&mut parts, "effect")?;
            let bri: u8 = parts.next().map(str::parse).transpose()?.unwrap_or(50);
            Ok(Verb::Command(BaseCommand::Scene { effect, bri, extended: ExtendedScene::default() }))
        },
        "preset" => {
            let name = parts.next().ok_or_else(|| anyhow::anyhow!("preset requires a name"))?;
            let preset =
                cfg.presets.get(name).ok_or_else(|| anyhow::anyhow!("unknown preset '{name}'"))?;
            Ok(Verb::Command(preset.fields.to_base_command()?))
        },
        other => Err(anyhow::anyhow!("unknown verb '{other}'; type 'help' for a list")),
    }
}

fn next_num<T: std::str::FromStr>(
    parts: &mut std::str::SplitWhitespace<'_>,
    field: &str,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = parts.next().ok_or_else(|| anyhow::anyhow!("missing '{field}' argument"))?;
    raw.parse::<T>().map_err(|e| anyhow::anyhow!("invalid '{field}' value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_preset() -> Config {
        let mut cfg = Config::default();
        cfg.presets.insert(
            "warm".to_string(),
            crate::cfg::config::PresetConfig {
                fields: crate::cfg::config::CommandFields { bri: Some(40), temp: Some(32), ..Default::default() },
                per_light: HashMap::new(),
            },
        );
        cfg
    }

    #[test]
    fn test_parse_on_off() {
        let cfg = Config::default();
        assert!(matches!(parse_verb("on", &cfg).expect("ok"), Verb::Command(BaseCommand::Power { on: true })));
        assert!(matches!(parse_verb("off", &cfg).expect("ok"), Verb::Command(BaseCommand::Power { on: false })));
    }

    #[test]
    fn test_parse_cct_with_optional_gm() {
        let cfg = Config::default();
        match parse_verb("cct 5600 40", &cfg).expect("ok") {
            Verb::Command(BaseCommand::Cct { bri, temp_raw, gm }) => {
                assert_eq!((bri, temp_raw, gm), (40, 5600, 0));
            },
            _ => panic!("expected Cct"),
        }
        match parse_verb("cct 5600 40 -10", &cfg).expect("ok") {
            Verb::Command(BaseCommand::Cct { gm, .. }) => assert_eq!(gm, -10),
            _ => panic!("expected Cct"),
        }
    }

    #[test]
    fn test_parse_hsi_requires_all_three() {
        let cfg = Config::default();
        assert!(parse_verb("hsi 240 100", &cfg).is_err());
        assert!(parse_verb("hsi 240 100 50", &cfg).is_ok());
    }

    #[test]
    fn test_parse_help_and_exit() {
        let cfg = Config::default();
        assert!(matches!(parse_verb("help", &cfg).expect("ok"), Verb::Help));
        assert!(matches!(parse_verb("exit", &cfg).expect("ok"), Verb::Exit));
    }

    #[test]
    fn test_parse_unknown_verb_errors() {
        let cfg = Config::default();
        assert!(parse_verb("frobnicate", &cfg).is_err());
    }

    #[test]
    fn test_parse_preset_resolves_cct_fields() {
        let cfg = cfg_with_preset();
        match parse_verb("preset warm", &cfg).expect("ok") {
            Verb::Command(BaseCommand::Cct { bri, temp_raw, .. }) => assert_eq!((bri, temp_raw), (40, 32)),
            _ => panic!("expected Cct from preset"),
        }
        assert!(parse_verb("preset nope", &cfg).is_err());
    }
}
