// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The pluggable BLE transport boundary.
//!
//! [`Transport`] describes the GATT operations the rest of the crate needs:
//! scan, connect, write a characteristic, subscribe to notifications,
//! disconnect. A real implementation wires this to a BLE HAL; tests and the
//! bundled CLI's default path use [`MockTransport`].

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Neewer GATT service UUID.
pub const SERVICE_UUID: &str = "69400001-B5A3-F393-E0A9-E50E24DCCA99";
/// Write characteristic UUID (command input).
pub const WRITE_CHAR_UUID: &str = "69400002-B5A3-F393-E0A9-E50E24DCCA99";
/// Notify characteristic UUID (status replies).
pub const NOTIFY_CHAR_UUID: &str = "69400003-B5A3-F393-E0A9-E50E24DCCA99";

/// One advertisement observed during a scan.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub address: String,
    pub name: String,
    pub rssi: i16,
}

/// A connected handle to one fixture's GATT server.
#[async_trait]
pub trait GattConnection: Send + Sync + std::fmt::Debug {
    async fn write(&self, characteristic: &str, data: &[u8], with_response: bool) -> Result<()>;
    async fn subscribe(&self, characteristic: &str) -> Result<mpsc::Receiver<Vec<u8>>>;
    async fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// The transport boundary the connection manager drives.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one scan pass, returning every advertisement observed.
    async fn scan(&self, timeout: std::time::Duration) -> Result<Vec<Advertisement>>;
    /// Connects to `address`, returning a live GATT handle.
    async fn connect(
        &self,
        address: &str,
        timeout: std::time::Duration,
    ) -> Result<Arc<dyn GattConnection>>;
}

/// In-memory [`Transport`] used by tests and as the CLI's default when no
/// real BLE adapter is wired in. Fixtures are pre-seeded via
/// [`MockTransport::seed`]; writes are recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    fixtures: DashMap<String, Advertisement>,
    connect_failures: DashMap<String, usize>,
    notify_replies: DashMap<String, DashMap<String, Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, address: &str, name: &str, rssi: i16) {
        self.fixtures.insert(
            address.to_string(),
            Advertisement { address: address.to_string(), name: name.to_string(), rssi },
        );
    }

    /// Makes the next `count` connect attempts to `address` fail before
    /// succeeding, to exercise the connection manager's retry path.
    pub fn fail_connects(&self, address: &str, count: usize) {
        self.connect_failures.insert(address.to_string(), count);
    }

    /// Pre-arms the payload `subscribe(characteristic)` replays for the next
    /// connection made to `address`, to exercise the status query decoder.
    pub fn seed_notify(&self, address: &str, characteristic: &str, payload: Vec<u8>) {
        self.notify_replies
            .entry(address.to_string())
            .or_default()
            .insert(characteristic.to_string(), payload);
    }
}

#[derive(Debug)]
pub struct MockGattConnection {
    pub address: String,
    pub writes: Arc<DashMap<String, Vec<(String, Vec<u8>, bool)>>>,
    notify_replies: Arc<DashMap<String, Vec<u8>>>,
    connected: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl GattConnection for MockGattConnection {
    async fn write(&self, characteristic: &str, data: &[u8], with_response: bool) -> Result<()> {
        self.writes
            .entry(self.address.clone())
            .or_default()
            .push((characteristic.to_string(), data.to_vec(), with_response));
        Ok(())
    }

    async fn subscribe(&self, characteristic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(1);
        if let Some(payload) = self.notify_replies.get(characteristic) {
            let _ = tx.send(payload.clone()).await;
        }
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn scan(&self, _timeout: std::time::Duration) -> Result<Vec<Advertisement>> {
        Ok(self.fixtures.iter().map(|e| e.value().clone()).collect())
    }

    async fn connect(
        &self,
        address: &str,
        _timeout: std::time::Duration,
    ) -> Result<Arc<dyn GattConnection>> {
        if let Some(mut remaining) = self.connect_failures.get_mut(address) {
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("simulated connect failure for {address}");
            }
        }
        let notify_replies = Arc::new(DashMap::new());
        if let Some(per_address) = self.notify_replies.get(address) {
            for entry in per_address.iter() {
                notify_replies.insert(entry.key().clone(), entry.value().clone());
            }
        }
        Ok(Arc::new(MockGattConnection {
            address: address.to_string(),
            writes: Arc::new(DashMap::new()),
            notify_replies,
            connected: std::sync::atomic::AtomicBool::new(true),
        }))
    }
}

/// Static lights known only from configuration, keyed by address; consulted
/// by discovery when an address is requested but never seen on the air.
pub type StaticLightTable = HashMap<String, Advertisement>;
