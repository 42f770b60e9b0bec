// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

/// Command-line surface for the `neewer-ctl` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "neewer-ctl", version, about = "Controller for Neewer BLE lighting fixtures")]
pub struct Cli {
    /// Target selector: `ALL`, `*`, a comma-separated address list, or
    /// `group:<name>`.
    #[arg(long, default_value = "ALL")]
    pub selector: String,

    #[command(flatten)]
    pub power: PowerArgs,

    /// Command mode; omit when only `--on`/`--off`/`--preset` is given.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// CCT/HSI brightness, 0-100.
    #[arg(long)]
    pub bri: Option<u16>,
    /// CCT color temperature, either Kelvin (>=1000) or a raw 25-100 code.
    #[arg(long)]
    pub temp: Option<u16>,
    /// CCT green/magenta bias, -50..50.
    #[arg(long)]
    pub gm: Option<i16>,
    /// HSI hue, 0-360.
    #[arg(long)]
    pub hue: Option<u16>,
    /// HSI saturation, 0-100.
    #[arg(long)]
    pub sat: Option<u16>,
    /// Scene effect index, 1-29.
    #[arg(long)]
    pub scene: Option<u8>,
    /// Opt into the extended per-effect scene payload schema.
    #[arg(long)]
    pub extended_scene: bool,

    /// Apply a named preset from the configuration's `presets` section.
    #[arg(long)]
    pub preset: Option<String>,

    /// Path to the JSON/YAML configuration document.
    #[arg(long, short = 'c', default_value = "neewer.yaml")]
    pub config: String,

    /// Raise the default log level to debug.
    #[arg(long)]
    pub debug: bool,

    /// Skip scanning; act only on statically-configured lights.
    #[arg(long)]
    pub no_scan: bool,

    /// Enter the interactive session loop instead of running one command.
    #[arg(long)]
    pub serve: bool,

    /// Query and print status instead of sending a command.
    #[arg(long)]
    pub status: bool,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

/// Mutually-exclusive power verbs.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PowerArgs {
    #[arg(long, conflicts_with = "off")]
    pub on: bool,
    #[arg(long, conflicts_with = "on")]
    pub off: bool,
}

/// Command mode selector.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Cct,
    Hsi,
    Scene,
}

/// Timeouts, retry budgets, and concurrency knobs (§6).
#[derive(clap::Args, Debug, Clone)]
pub struct TuningArgs {
    #[arg(long, default_value_t = 5.0)]
    pub scan_timeout: f64,
    #[arg(long, default_value_t = 3)]
    pub scan_attempts: u32,
    #[arg(long, default_value_t = 10.0)]
    pub connect_timeout: f64,
    #[arg(long, default_value_t = 3)]
    pub connect_retries: u32,
    #[arg(long, default_value_t = 3)]
    pub write_retries: u32,
    #[arg(long, default_value_t = 3)]
    pub passes: u32,
    #[arg(long, default_value_t = 4)]
    pub parallel: usize,
    #[arg(long, default_value_t = 0.0)]
    pub settle_delay: f64,
    #[arg(long, default_value_t = 5.0)]
    pub status_timeout: f64,
    /// Require GATT write-with-response for power commands.
    #[arg(long)]
    pub power_requires_ack: bool,
}

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
