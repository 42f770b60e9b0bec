// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-frame write-retry state machine: drives a single [`PlanStep`] through
//! up to `write_retries` attempts, backing off `min(0.1·attempt, 0.5)`
//! seconds between them, as the Adaptive Delivery Engine requires per frame.

use std::{pin::Pin, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio_util::sync::CancellationToken;

use crate::{
    protocol::dialect::PlanStep,
    state_machine::common::{StateMachine, StateMachineCtx, Transition},
    transport::{GattConnection, WRITE_CHAR_UUID},
};

/// Context for writing one frame with retry/backoff.
pub struct FrameWriteCtx {
    conn: Arc<dyn GattConnection>,
    step: PlanStep,
    write_retries: u32,
    attempt: u32,
    state: Option<FrameWriteStates>,
}

impl FrameWriteCtx {
    pub fn new(conn: Arc<dyn GattConnection>, step: PlanStep, write_retries: u32) -> Self {
        Self { conn, step, write_retries, attempt: 0, state: Some(FrameWriteStates::Attempt(Attempt)) }
    }

    async fn try_write(&mut self) -> Result<()> {
        self.attempt += 1;
        self.conn.write(WRITE_CHAR_UUID, &self.step.frame, self.step.with_response).await
    }

    fn backoff(&self) -> Duration {
        Duration::from_secs_f64((0.1 * f64::from(self.attempt)).min(0.5))
    }
}

/// Initial/retry state: perform one write attempt.
#[derive(Debug)]
pub struct Attempt;

/// Sleeping between a failed attempt and the next one.
#[derive(Debug)]
pub struct Backoff;

#[derive(Debug)]
pub enum FrameWriteStates {
    Attempt(Attempt),
    Backoff(Backoff),
}

type FrameWriteStepOut = Transition<FrameWriteStates, Result<()>>;

impl StateMachine<FrameWriteCtx, FrameWriteStepOut> for Attempt {
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FrameWriteStepOut> + Send + 'a>>
    where
        Self: 'a,
        FrameWriteCtx: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut FrameWriteCtx) -> Self::StepResult<'a> {
        Box::pin(async move {
            match ctx.try_write().await {
                Ok(()) => Transition::Done(Ok(())),
                Err(e) if ctx.attempt >= ctx.write_retries => Transition::Done(Err(e)),
                Err(_) => Transition::Next(FrameWriteStates::Backoff(Backoff), Ok(())),
            }
        })
    }
}

impl StateMachine<FrameWriteCtx, FrameWriteStepOut> for Backoff {
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FrameWriteStepOut> + Send + 'a>>
    where
        Self: 'a,
        FrameWriteCtx: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut FrameWriteCtx) -> Self::StepResult<'a> {
        Box::pin(async move {
            tokio::time::sleep(ctx.backoff()).await;
            Transition::Next(FrameWriteStates::Attempt(Attempt), Ok(()))
        })
    }
}

impl StateMachineCtx<FrameWriteCtx, ()> for FrameWriteCtx {
    async fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(anyhow!("write cancelled"));
            }
            let mut state = self.state.take().context("state must be set in FrameWriteCtx")?;
            let trans = match &mut state {
                FrameWriteStates::Attempt(s) => s.step(self).await,
                FrameWriteStates::Backoff(s) => s.step(self).await,
            };
            match trans {
                Transition::Next(next, r) => {
                    r?;
                    self.state = Some(next);
                },
                Transition::Stay(r) => {
                    r?;
                    self.state = Some(state);
                },
                Transition::Done(r) => return r,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, Transport};

    #[tokio::test]
    async fn test_frame_write_succeeds_first_try() {
        let transport = MockTransport::new();
        transport.seed("AA:AA:AA:AA:AA:AA", "NEEWER-RGB1", -40);
        let conn = transport
            .connect("AA:AA:AA:AA:AA:AA", Duration::from_secs(1))
            .await
            .expect("connect");
        let step = PlanStep { frame: vec![1, 2, 3], with_response: false, extra_delay_secs: 0.0 };
        let mut ctx = FrameWriteCtx::new(conn, step, 3);
        ctx.execute(&CancellationToken::new()).await.expect("write");
    }

    #[tokio::test]
    async fn test_frame_write_exhausts_retries_on_closed_connection() {
        struct AlwaysFails;

        #[async_trait::async_trait]
        impl GattConnection for AlwaysFails {
            async fn write(&self, _c: &str, _d: &[u8], _r: bool) -> Result<()> {
                anyhow::bail!("simulated transport failure")
            }

            async fn subscribe(&self, _c: &str) -> Result<tokio::sync::mpsc::Receiver<Vec<u8>>> {
                let (_tx, rx) = tokio::sync::mpsc::channel(1);
                Ok(rx)
            }

            async fn disconnect(&self) -> Result<()> {
                Ok(())
            }

            fn is_connected(&self) -> bool {
                false
            }
        }

        impl std::fmt::Debug for AlwaysFails {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("AlwaysFails")
            }
        }

        let conn: Arc<dyn GattConnection> = Arc::new(AlwaysFails);
        let step = PlanStep { frame: vec![1], with_response: false, extra_delay_secs: 0.0 };
        let mut ctx = FrameWriteCtx::new(conn, step, 2);
        let err = ctx.execute(&CancellationToken::new()).await.expect_err("should exhaust retries");
        assert!(err.to_string().contains("simulated transport failure"));
    }
}
