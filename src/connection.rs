// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection Manager: per-fixture connect-with-retry/back-off, a
//! semaphore-bounded fan-out across all fixtures, and `hw_mac`
//! auto-population for Infinity fixtures whose address is already
//! MAC-shaped.

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use tokio::{sync::Semaphore, time::timeout};
use tracing::warn;

use crate::{
    error::CoreError,
    models::fixture::FixtureDescriptor,
    protocol::status::{FixtureStatus, channel_query_frame, decode_channel_notify, decode_power_notify, power_query_frame},
    transport::{GattConnection, NOTIFY_CHAR_UUID, Transport, WRITE_CHAR_UUID},
};

/// Drives connect attempts for a batch of fixtures, bounding concurrent
/// connect/write operations with a counting semaphore of width `parallel`.
pub struct ConnectionManager<'t> {
    transport: &'t dyn Transport,
    connect_timeout: Duration,
    connect_retries: u32,
    semaphore: Arc<Semaphore>,
}

impl<'t> ConnectionManager<'t> {
    pub fn new(transport: &'t dyn Transport, connect_timeout: Duration, connect_retries: u32, parallel: usize) -> Self {
        Self {
            transport,
            connect_timeout,
            connect_retries,
            semaphore: Arc::new(Semaphore::new(parallel.max(1))),
        }
    }

    /// Ensures `fixture` has a live session, retrying with
    /// `min(0.2·attempt, 1.0)`s back-off. A "successful" connect requires
    /// both that `connect()` returned and that the transport reports
    /// `is_connected()`.
    pub async fn ensure_session(&self, fixture: &mut FixtureDescriptor) -> Result<()> {
        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");

        if fixture.session.as_ref().is_some_and(|s| s.is_connected()) {
            return Ok(());
        }

        let mut last_err = None;
        for attempt in 1..=self.connect_retries.max(1) {
            match self.transport.connect(&fixture.address, self.connect_timeout).await {
                Ok(conn) if conn.is_connected() => {
                    fixture.session = Some(conn);
                    fixture.infer_hw_mac_on_connect();
                    return Ok(());
                },
                Ok(conn) => {
                    let _ = conn.disconnect().await;
                    last_err = Some(anyhow!("connect() returned a non-connected session"));
                },
                Err(e) => last_err = Some(e),
            }

            if attempt < self.connect_retries {
                tokio::time::sleep(Duration::from_secs_f64((0.2 * f64::from(attempt)).min(1.0))).await;
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("connect failed for {}", fixture.address)))
    }

    /// Idempotent disconnect; best-effort, never raises.
    pub async fn release(&self, fixture: &mut FixtureDescriptor) {
        if let Some(session) = fixture.session.take() {
            if let Err(e) = session.disconnect().await {
                warn!(address = %fixture.address, error = %e, "best-effort disconnect failed");
            }
        }
    }

    /// Runs the Status Querier against an already-connected fixture.
    /// Rejects fixtures whose `supports_status_query` resolves to `false` as
    /// `UnsupportedMode`, the one mode-rejection this crate issues before a
    /// Delivery Plan would otherwise have been built.
    pub async fn query_status(
        &self,
        fixture: &FixtureDescriptor,
        status_timeout: Duration,
    ) -> Result<FixtureStatus, CoreError> {
        if !fixture.effective_supports_status_query() {
            return Err(CoreError::UnsupportedMode(format!(
                "{} does not support status queries",
                fixture.name
            )));
        }
        let session = fixture
            .session
            .clone()
            .ok_or_else(|| CoreError::Transport("not connected".to_string()))?;

        let mut notifications = session
            .subscribe(NOTIFY_CHAR_UUID)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let mut status = FixtureStatus::default();

        session
            .write(WRITE_CHAR_UUID, &power_query_frame(), false)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        let power_payload = timeout(status_timeout, wait_for_byte1(&mut notifications, 2))
            .await
            .map_err(|_| CoreError::Timeout("power query".to_string()))?;
        if let Some(payload) = power_payload {
            decode_power_notify(&mut status, &payload);
        }

        session
            .write(WRITE_CHAR_UUID, &channel_query_frame(), false)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        let channel_payload = timeout(status_timeout, wait_for_byte1(&mut notifications, 1))
            .await
            .map_err(|_| CoreError::Timeout("channel query".to_string()))?;
        if let Some(payload) = channel_payload {
            decode_channel_notify(&mut status, &payload);
        }

        Ok(status)
    }
}

/// Drains `notifications` until a payload whose byte 1 matches `tag` arrives,
/// or the channel closes.
async fn wait_for_byte1(
    notifications: &mut tokio::sync::mpsc::Receiver<Vec<u8>>,
    tag: u8,
) -> Option<Vec<u8>> {
    while let Some(payload) = notifications.recv().await {
        if payload.len() >= 2 && payload[1] == tag {
            return Some(payload);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[tokio::test]
    async fn test_ensure_session_succeeds_first_try() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "NEEWER-RGB1", -40);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 3, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "AA:BB:CC:DD:EE:FF", -40);
        manager.ensure_session(&mut fixture).await.expect("connect");
        assert!(fixture.session.is_some());
    }

    #[tokio::test]
    async fn test_ensure_session_retries_then_succeeds() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "NEEWER-RGB1", -40);
        transport.fail_connects("AA:BB:CC:DD:EE:FF", 2);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 3, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "AA:BB:CC:DD:EE:FF", -40);
        manager.ensure_session(&mut fixture).await.expect("connect");
        assert!(fixture.session.is_some());
    }

    #[tokio::test]
    async fn test_ensure_session_exhausts_retries() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "NEEWER-RGB1", -40);
        transport.fail_connects("AA:BB:CC:DD:EE:FF", 10);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 2, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "AA:BB:CC:DD:EE:FF", -40);
        assert!(manager.ensure_session(&mut fixture).await.is_err());
        assert!(fixture.session.is_none());
    }

    #[tokio::test]
    async fn test_ensure_session_infers_hw_mac_for_infinity_fixture() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "NEEWER-RGB1", -40);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 3, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "AA:BB:CC:DD:EE:FF", -40);
        manager.ensure_session(&mut fixture).await.expect("connect");
        assert_eq!(fixture.hw_mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "NEEWER-RGB1", -40);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 3, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("NEEWER-RGB1", "AA:BB:CC:DD:EE:FF", -40);
        manager.ensure_session(&mut fixture).await.expect("connect");
        manager.release(&mut fixture).await;
        manager.release(&mut fixture).await;
        assert!(fixture.session.is_none());
    }

    #[tokio::test]
    async fn test_query_status_decodes_power_and_channel() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "SL90", -40);
        transport.seed_notify("AA:BB:CC:DD:EE:FF", crate::transport::NOTIFY_CHAR_UUID, vec![120, 2, 1, 1]);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 3, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("SL90", "AA:BB:CC:DD:EE:FF", -40);
        manager.ensure_session(&mut fixture).await.expect("connect");

        let status = manager
            .query_status(&fixture, Duration::from_millis(200))
            .await
            .expect("query");
        assert_eq!(status.power_on, Some(true));
    }

    #[tokio::test]
    async fn test_query_status_rejects_unsupported_fixture() {
        let transport = MockTransport::new();
        transport.seed("AA:BB:CC:DD:EE:FF", "FS150B", -40);
        let manager = ConnectionManager::new(&transport, Duration::from_secs(1), 3, 2);
        let mut fixture = FixtureDescriptor::from_advertisement("FS150B", "AA:BB:CC:DD:EE:FF", -40);
        manager.ensure_session(&mut fixture).await.expect("connect");

        let err = manager
            .query_status(&fixture, Duration::from_millis(200))
            .await
            .expect_err("should reject");
        assert!(matches!(err, CoreError::UnsupportedMode(_)));
    }
}
