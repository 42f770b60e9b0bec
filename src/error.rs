// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy for the core pipeline.
//!
//! [`CoreError`] is a small `thiserror` leaf type, the same role
//! `models::opcode::UnknownOpcode` plays in this codebase's earlier
//! incarnation: call sites wrap it with `anyhow::Context` and propagate it as
//! `anyhow::Error`, but code that needs to branch on *kind* (retry? fatal to
//! one fixture? fatal to the whole run?) matches on this enum first.

use thiserror::Error;

/// The five error kinds the delivery pipeline can produce.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad CLI args, bad config document, unknown group/preset. Fatal to the
    /// whole run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A fixture's capability record rejects the requested mode. Fatal to
    /// that fixture only.
    #[error("unsupported mode for this fixture: {0}")]
    UnsupportedMode(String),

    /// A GATT operation failed. Retryable up to the configured count, then
    /// fatal to that fixture only.
    #[error("transport error: {0}")]
    Transport(String),

    /// A retryable operation exceeded its deadline. Same retry semantics as
    /// `Transport`.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The run was interrupted. Fatal to the whole run, never retried.
    #[error("cancelled")]
    Cancellation,
}

impl CoreError {
    /// Whether this error kind should be retried by the connection
    /// manager / delivery engine's backoff loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transport(_) | CoreError::Timeout(_))
    }

    /// Whether this error kind aborts the whole run rather than just the
    /// fixture that produced it.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, CoreError::Configuration(_) | CoreError::Cancellation)
    }
}
